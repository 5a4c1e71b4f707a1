//! Pointer pipeline: mice, trackpoints and absolute pointing devices
//!
//! Relative deltas run through the acceleration filter, wheels become axis
//! events with a fixed click angle, buttons are tracked for the seat
//! counters. Two small state machines sit in front of the button stream:
//! middle-button emulation (left+right pressed nearly simultaneously emit a
//! middle button) and on-button-down scrolling (motion while the scroll
//! button is held becomes scroll events; a quick press without motion is
//! replayed as a click).

use smallvec::SmallVec;

use super::DispatchCtx;
use crate::device::{Device, ScrollMethod};
use crate::evdev::{codes, AbsInfo, EvdevEvent, EventKind};
use crate::event::{Axis, AxisSource, ButtonState, Event, PointerMotionAbsoluteEvent};
use crate::filter::MotionFilter;
use crate::timer::{timeouts, TimerKind};
use crate::utils::{Point, Raw};

/// Degrees of rotation per wheel detent
const WHEEL_CLICK_ANGLE: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MiddleState {
    Idle,
    /// One of the pair is down, waiting for the other or the timeout
    Pending { first: u16 },
    /// Timeout passed; the first button was flushed as itself
    Passthrough { button: u16 },
    /// Both were down in time; a middle press is out
    Middle,
    /// Middle released on the first up; the second up is swallowed
    Ghost { remaining: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ButtonScrollState {
    Idle,
    /// Scroll button down, timeout pending; a quick release replays a click
    Pending,
    /// Timeout passed, motion will scroll
    Ready,
    /// Motion arrived; axis events are flowing
    Scrolling,
}

#[derive(Debug)]
pub(crate) struct PointerDispatch {
    filter: MotionFilter,
    dpi: u32,
    abs_x: Option<AbsInfo>,
    abs_y: Option<AbsInfo>,

    pending_rel: Point<Raw>,
    pending_abs: Option<(f64, f64)>,
    pending_wheel: i32,
    pending_hwheel: i32,
    /// Raw button transitions of this frame, before emulation
    pending_buttons: SmallVec<[(u16, bool); 4]>,

    middle: MiddleState,
    scroll: ButtonScrollState,
    /// Emitted button codes currently down
    buttons_down: SmallVec<[u16; 4]>,
}

impl PointerDispatch {
    pub(crate) fn new(device: &Device) -> Self {
        let config = device.config();
        let info = device.info();
        PointerDispatch {
            filter: MotionFilter::new(config.accel_profile, info.dpi),
            dpi: info.dpi,
            abs_x: info.abs_info(codes::ABS_X),
            abs_y: info.abs_info(codes::ABS_Y),
            pending_rel: Point::origin(),
            pending_abs: None,
            pending_wheel: 0,
            pending_hwheel: 0,
            pending_buttons: SmallVec::new(),
            middle: MiddleState::Idle,
            scroll: ButtonScrollState::Idle,
            buttons_down: SmallVec::new(),
        }
    }

    pub(crate) fn process(&mut self, _ctx: &mut DispatchCtx<'_>, event: &EvdevEvent) {
        match event.kind {
            EventKind::Relative => match event.code {
                codes::REL_X => self.pending_rel.x += event.value as f64,
                codes::REL_Y => self.pending_rel.y += event.value as f64,
                codes::REL_WHEEL => self.pending_wheel += event.value,
                codes::REL_HWHEEL => self.pending_hwheel += event.value,
                _ => {}
            },
            EventKind::Absolute => {
                let (x, y) = self
                    .pending_abs
                    .unwrap_or_else(|| self.last_abs_or_default());
                match event.code {
                    codes::ABS_X => self.pending_abs = Some((event.value as f64, y)),
                    codes::ABS_Y => self.pending_abs = Some((x, event.value as f64)),
                    _ => {}
                }
            }
            EventKind::Key if event.value != 2 => {
                self.pending_buttons.push((event.code, event.value != 0));
            }
            _ => {}
        }
    }

    fn last_abs_or_default(&self) -> (f64, f64) {
        (
            self.abs_x.map(|i| i.minimum as f64).unwrap_or(0.0),
            self.abs_y.map(|i| i.minimum as f64).unwrap_or(0.0),
        )
    }

    /// Swap left/right for left-handed operation
    fn transform_button(&self, ctx: &DispatchCtx<'_>, button: u16) -> u16 {
        if ctx.device.config().left_handed.current {
            match button {
                codes::BTN_LEFT => codes::BTN_RIGHT,
                codes::BTN_RIGHT => codes::BTN_LEFT,
                other => other,
            }
        } else {
            button
        }
    }

    fn emit_button(&mut self, ctx: &mut DispatchCtx<'_>, time: u64, button: u16, pressed: bool) {
        if pressed {
            if self.buttons_down.contains(&button) {
                tracing::error!(button, "button pressed twice without release, dropping");
                return;
            }
            self.buttons_down.push(button);
        } else {
            let Some(idx) = self.buttons_down.iter().position(|b| *b == button) else {
                tracing::error!(button, "release for a button that is not down, dropping");
                return;
            };
            self.buttons_down.swap_remove(idx);
        }
        let state = if pressed {
            ButtonState::Pressed
        } else {
            ButtonState::Released
        };
        ctx.button_event(time, button as u32, state);
    }

    /// Run one raw transition through middle-button emulation
    ///
    /// Returns the transitions to emit downstream.
    fn middle_filter(
        &mut self,
        ctx: &mut DispatchCtx<'_>,
        time: u64,
        button: u16,
        pressed: bool,
    ) -> SmallVec<[(u16, bool); 2]> {
        let mut out = SmallVec::new();
        if !ctx.device.config().middle_emulation
            || !matches!(button, codes::BTN_LEFT | codes::BTN_RIGHT)
        {
            out.push((button, pressed));
            return out;
        }
        let other = if button == codes::BTN_LEFT {
            codes::BTN_RIGHT
        } else {
            codes::BTN_LEFT
        };

        match self.middle {
            MiddleState::Idle if pressed => {
                self.middle = MiddleState::Pending { first: button };
                ctx.set_timer(TimerKind::MiddleButton, time + timeouts::MIDDLEBUTTON);
            }
            MiddleState::Idle => out.push((button, pressed)),

            MiddleState::Pending { first } if pressed && button != first => {
                ctx.cancel_timer(TimerKind::MiddleButton);
                self.middle = MiddleState::Middle;
                out.push((codes::BTN_MIDDLE, true));
            }
            MiddleState::Pending { first } if !pressed && button == first => {
                // quick tap of a single button: replay it
                ctx.cancel_timer(TimerKind::MiddleButton);
                self.middle = MiddleState::Idle;
                out.push((button, true));
                out.push((button, false));
            }
            MiddleState::Pending { .. } => {}

            MiddleState::Passthrough { button: held } if !pressed && button == held => {
                self.middle = MiddleState::Idle;
                out.push((button, false));
            }
            MiddleState::Passthrough { .. } => out.push((button, pressed)),

            MiddleState::Middle if !pressed => {
                self.middle = MiddleState::Ghost { remaining: other };
                out.push((codes::BTN_MIDDLE, false));
            }
            MiddleState::Middle => {}

            MiddleState::Ghost { remaining } if !pressed && button == remaining => {
                self.middle = MiddleState::Idle;
            }
            MiddleState::Ghost { .. } => {}
        }
        out
    }

    pub(crate) fn frame(&mut self, ctx: &mut DispatchCtx<'_>, time: u64) {
        let config = ctx.device.config();
        // button-neutral is the application point for a wanted left-handed flip
        if self.buttons_down.is_empty() {
            ctx.device
                .with_config(|c| c.left_handed.current = c.left_handed.wanted);
        }
        self.filter.set_speed(config.accel_speed);
        self.filter.set_profile(config.accel_profile);

        let mut presses: SmallVec<[(u16, bool); 4]> = SmallVec::new();
        let mut releases: SmallVec<[(u16, bool); 4]> = SmallVec::new();
        let mut replays: SmallVec<[(u16, bool); 4]> = SmallVec::new();

        for (raw, pressed) in std::mem::take(&mut self.pending_buttons) {
            let button = self.transform_button(ctx, raw);

            // on-button-down scrolling claims its button before emulation
            if config.scroll_method == ScrollMethod::OnButtonDown
                && button as u32 == config.scroll_button
            {
                match (self.scroll, pressed) {
                    (ButtonScrollState::Idle, true) => {
                        self.scroll = ButtonScrollState::Pending;
                        ctx.set_timer(TimerKind::ButtonScroll, time + timeouts::BUTTON_SCROLL);
                    }
                    (ButtonScrollState::Pending, false) => {
                        ctx.cancel_timer(TimerKind::ButtonScroll);
                        self.scroll = ButtonScrollState::Idle;
                        replays.push((button, true));
                        replays.push((button, false));
                    }
                    (ButtonScrollState::Ready, false) => {
                        self.scroll = ButtonScrollState::Idle;
                        replays.push((button, true));
                        replays.push((button, false));
                    }
                    (ButtonScrollState::Scrolling, false) => {
                        self.scroll = ButtonScrollState::Idle;
                        ctx.axis_event(time, Axis::Vertical, 0.0, AxisSource::Continuous);
                    }
                    _ => {}
                }
                continue;
            }

            for (code, p) in self.middle_filter(ctx, time, button, pressed) {
                if p {
                    presses.push((code, true));
                } else {
                    releases.push((code, false));
                }
            }
        }

        // frame emission order: releases, motion, scroll, presses
        for (code, _) in releases {
            self.emit_button(ctx, time, code, false);
        }

        let rel = std::mem::take(&mut self.pending_rel);
        let scrolling_by_button = matches!(
            self.scroll,
            ButtonScrollState::Ready | ButtonScrollState::Scrolling
        );
        if rel != Point::origin() {
            if scrolling_by_button {
                self.scroll = ButtonScrollState::Scrolling;
                if rel.y != 0.0 {
                    ctx.axis_event(time, Axis::Vertical, rel.y, AxisSource::Continuous);
                }
                if rel.x != 0.0 {
                    ctx.axis_event(time, Axis::Horizontal, rel.x, AxisSource::Continuous);
                }
            } else if self.scroll != ButtonScrollState::Pending {
                let normalized = Point::<Raw>::new(
                    rel.x * 1000.0 / self.dpi as f64,
                    rel.y * 1000.0 / self.dpi as f64,
                );
                let accel = self.filter.dispatch(normalized, time);
                ctx.motion_event(time, (accel.x, accel.y), (normalized.x, normalized.y));
            }
        }

        if let Some((x, y)) = self.pending_abs.take() {
            if let (Some(abs_x), Some(abs_y)) = (self.abs_x, self.abs_y) {
                ctx.queue.push(Event::PointerMotionAbsolute {
                    event: PointerMotionAbsoluteEvent {
                        device: ctx.device.clone(),
                        time,
                        x,
                        y,
                        abs_x,
                        abs_y,
                    },
                });
            }
        }

        let wheel = std::mem::take(&mut self.pending_wheel);
        if wheel != 0 {
            // positive REL_WHEEL is rotation away from the user, i.e. scroll up
            ctx.axis_event(
                time,
                Axis::Vertical,
                -wheel as f64 * WHEEL_CLICK_ANGLE,
                AxisSource::Wheel,
            );
        }
        let hwheel = std::mem::take(&mut self.pending_hwheel);
        if hwheel != 0 {
            ctx.axis_event(
                time,
                Axis::Horizontal,
                hwheel as f64 * WHEEL_CLICK_ANGLE,
                AxisSource::Wheel,
            );
        }

        for (code, _) in presses {
            self.emit_button(ctx, time, code, true);
        }
        for (code, pressed) in replays {
            self.emit_button(ctx, time, code, pressed);
        }
    }

    pub(crate) fn timeout(&mut self, ctx: &mut DispatchCtx<'_>, kind: TimerKind, time: u64) {
        match kind {
            TimerKind::MiddleButton => {
                if let MiddleState::Pending { first } = self.middle {
                    // the partner button never came; the press was real
                    self.middle = MiddleState::Passthrough { button: first };
                    self.emit_button(ctx, time, first, true);
                }
            }
            TimerKind::ButtonScroll => {
                if self.scroll == ButtonScrollState::Pending {
                    self.scroll = ButtonScrollState::Ready;
                }
            }
            _ => tracing::error!(?kind, "stray timer on a pointer device"),
        }
    }

    pub(crate) fn suspend(&mut self, ctx: &mut DispatchCtx<'_>, time: u64) {
        if self.scroll == ButtonScrollState::Scrolling {
            ctx.axis_event(time, Axis::Vertical, 0.0, AxisSource::Continuous);
        }
        self.scroll = ButtonScrollState::Idle;
        self.middle = MiddleState::Idle;
        self.pending_buttons.clear();
        self.pending_rel = Point::origin();
        self.pending_abs = None;
        for button in std::mem::take(&mut self.buttons_down) {
            ctx.button_event(time, button as u32, ButtonState::Released);
        }
        self.filter.restart();
    }
}
