//! Tablet pipeline: tool proximity, axis normalization and stylus buttons
//!
//! A tablet has at most one tool in proximity at any time; the tool's
//! identity is announced through `BTN_TOOL_*` transitions, refined by the
//! hardware tool id in `ABS_MISC` and the serial in `MSC_SERIAL`. Axis values
//! are normalized before emission (pressure/distance/slider to `[0, 1]`,
//! tilt to `[-1, 1]`, rotation to degrees), and two quirks of the wire format
//! are resolved here: pressure and distance are mutually exclusive in any
//! emitted frame, and mouse/lens tools report their rotation through the
//! tilt axes.

use bitflags::bitflags;
use smallvec::SmallVec;

use super::{calibrate, DispatchCtx};
use crate::device::Device;
use crate::evdev::{codes, AbsInfo, EvdevEvent, EventKind};
use crate::event::tablet::{
    AxisMask, AxisSnapshot, ProximityState, TabletTool, TabletToolAxisEvent,
    TabletToolButtonEvent, TabletToolProximityEvent, TabletToolTipEvent, TabletToolType,
    TipState,
};
use crate::event::{ButtonState, Event};

pub(crate) mod tool;

/// Degrees of wheel rotation per click on tablet tool wheels
const WHEEL_CLICK_ANGLE: f64 = 15.0;

/// Mouse and lens tools sit rotated by this much in the hand; the reported
/// zero orientation is 5 degrees off the physical one.
const MOUSE_ROTATION_BIAS: f64 = 5.0;

bitflags! {
    /// Frame-scoped status of the tablet state machine
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub(crate) struct TabletStatus: u32 {
        const OUT_OF_PROX = 1 << 0;
        const ENTERING_PROX = 1 << 1;
        const LEAVING_PROX = 1 << 2;
        const IN_CONTACT = 1 << 3;
        const ENTERING_CONTACT = 1 << 4;
        const LEAVING_CONTACT = 1 << 5;
        const AXES_UPDATED = 1 << 6;
        const BUTTONS_PRESSED = 1 << 7;
        const BUTTONS_RELEASED = 1 << 8;
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct RawAxes {
    x: i32,
    y: i32,
    pressure: i32,
    distance: i32,
    tilt_x: i32,
    tilt_y: i32,
    slider: i32,
    rotation: i32,
}

#[derive(Debug)]
pub(crate) struct TabletDispatch {
    status: TabletStatus,
    changed: AxisMask,
    raw: RawAxes,
    axes: AxisSnapshot,
    prev: AxisSnapshot,

    abs_x: AbsInfo,
    abs_y: AbsInfo,
    abs_pressure: Option<AbsInfo>,
    abs_distance: Option<AbsInfo>,
    abs_tilt_x: Option<AbsInfo>,
    abs_tilt_y: Option<AbsInfo>,
    abs_slider: Option<AbsInfo>,
    abs_rotation: Option<AbsInfo>,

    tool: Option<TabletTool>,
    local_tools: Vec<TabletTool>,
    tool_id: u64,
    pending_serial: Option<u64>,
    pending_tool_down: Option<TabletToolType>,
    pending_tool_up: bool,
    tip_pending: Option<bool>,

    wheel_clicks: i32,
    buttons_down: SmallVec<[u16; 4]>,
    pending_buttons: SmallVec<[(u16, bool); 4]>,
    /// The clamp-to-zero for out-of-contact pressure was already emitted
    pressure_zeroed: bool,
}

impl TabletDispatch {
    pub(crate) fn new(device: &Device) -> Self {
        let info = device.info();
        TabletDispatch {
            status: TabletStatus::OUT_OF_PROX,
            changed: AxisMask::empty(),
            raw: RawAxes::default(),
            axes: AxisSnapshot::default(),
            prev: AxisSnapshot::default(),
            abs_x: info.abs_info(codes::ABS_X).unwrap_or(AbsInfo::new(0, 0, 0)),
            abs_y: info.abs_info(codes::ABS_Y).unwrap_or(AbsInfo::new(0, 0, 0)),
            abs_pressure: info.abs_info(codes::ABS_PRESSURE),
            abs_distance: info.abs_info(codes::ABS_DISTANCE),
            abs_tilt_x: info.abs_info(codes::ABS_TILT_X),
            abs_tilt_y: info.abs_info(codes::ABS_TILT_Y),
            abs_slider: info.abs_info(codes::ABS_WHEEL),
            abs_rotation: info.abs_info(codes::ABS_Z),
            tool: None,
            local_tools: Vec::new(),
            tool_id: 0,
            pending_serial: None,
            pending_tool_down: None,
            pending_tool_up: false,
            tip_pending: None,
            wheel_clicks: 0,
            buttons_down: SmallVec::new(),
            pending_buttons: SmallVec::new(),
            pressure_zeroed: false,
        }
    }

    pub(crate) fn process(&mut self, _ctx: &mut DispatchCtx<'_>, event: &EvdevEvent) {
        match event.kind {
            EventKind::Absolute => match event.code {
                codes::ABS_X => {
                    self.raw.x = event.value;
                    self.changed |= AxisMask::X;
                }
                codes::ABS_Y => {
                    self.raw.y = event.value;
                    self.changed |= AxisMask::Y;
                }
                codes::ABS_PRESSURE => {
                    self.raw.pressure = event.value;
                    self.changed |= AxisMask::PRESSURE;
                }
                codes::ABS_DISTANCE => {
                    self.raw.distance = event.value;
                    self.changed |= AxisMask::DISTANCE;
                }
                codes::ABS_TILT_X => {
                    self.raw.tilt_x = event.value;
                    self.changed |= AxisMask::TILT_X;
                }
                codes::ABS_TILT_Y => {
                    self.raw.tilt_y = event.value;
                    self.changed |= AxisMask::TILT_Y;
                }
                codes::ABS_WHEEL => {
                    self.raw.slider = event.value;
                    self.changed |= AxisMask::SLIDER;
                }
                codes::ABS_Z => {
                    self.raw.rotation = event.value;
                    self.changed |= AxisMask::ROTATION_Z;
                }
                codes::ABS_MISC => {
                    self.tool_id = event.value as u32 as u64;
                }
                _ => {}
            },
            EventKind::Relative if event.code == codes::REL_WHEEL => {
                self.wheel_clicks += event.value;
                self.changed |= AxisMask::REL_WHEEL;
            }
            EventKind::Misc if event.code == codes::MSC_SERIAL => {
                self.pending_serial = Some(event.value as u32 as u64);
            }
            EventKind::Key if event.value != 2 => {
                if let Some(tool_type) = tool::tool_type_for_code(event.code) {
                    if event.value != 0 {
                        self.pending_tool_down = Some(tool_type);
                    } else {
                        self.pending_tool_up = true;
                    }
                } else if event.code == codes::BTN_TOUCH {
                    self.tip_pending = Some(event.value != 0);
                } else {
                    self.pending_buttons.push((event.code, event.value != 0));
                }
            }
            _ => {}
        }
    }

    fn normalize_axes(&mut self, ctx: &DispatchCtx<'_>) {
        let config = ctx.device.config();
        let left_handed = config.left_handed.current;

        let (mut raw_x, mut raw_y) = (self.raw.x as f64, self.raw.y as f64);
        if left_handed {
            // 180 degree rotation of the working area
            raw_x = (self.abs_x.minimum + self.abs_x.maximum) as f64 - raw_x;
            raw_y = (self.abs_y.minimum + self.abs_y.maximum) as f64 - raw_y;
        }
        let (x, y) = calibrate(raw_x, raw_y, &self.abs_x, &self.abs_y, &config.calibration);
        self.axes.x = x;
        self.axes.y = y;

        if let Some(info) = self.abs_pressure {
            self.axes.pressure = info.normalize(self.raw.pressure);
        }
        if let Some(info) = self.abs_distance {
            self.axes.distance = info.normalize(self.raw.distance);
        }
        let tilt_sign = if left_handed { -1.0 } else { 1.0 };
        if let Some(info) = self.abs_tilt_x {
            self.axes.tilt_x = tilt_sign * (info.normalize(self.raw.tilt_x) * 2.0 - 1.0);
        }
        if let Some(info) = self.abs_tilt_y {
            self.axes.tilt_y = tilt_sign * (info.normalize(self.raw.tilt_y) * 2.0 - 1.0);
        }
        if let Some(info) = self.abs_slider {
            self.axes.slider = info.normalize(self.raw.slider);
        }
        if let Some(info) = self.abs_rotation {
            self.axes.rotation = info.normalize(self.raw.rotation) * 360.0;
        }
        self.axes.wheel = self.wheel_clicks as f64 * WHEEL_CLICK_ANGLE;

        // mouse and lens tools report rotation through the tilt axes
        if matches!(
            self.tool.as_ref().map(|t| t.tool_type()),
            Some(TabletToolType::Mouse | TabletToolType::Lens)
        ) && self
            .changed
            .intersects(AxisMask::TILT_X | AxisMask::TILT_Y)
        {
            self.axes.rotation = (360.0
                + (-self.axes.tilt_x).atan2(self.axes.tilt_y).to_degrees()
                - MOUSE_ROTATION_BIAS)
                % 360.0;
            self.axes.tilt_x = 0.0;
            self.axes.tilt_y = 0.0;
            self.changed.remove(AxisMask::TILT_X | AxisMask::TILT_Y);
            self.changed |= AxisMask::ROTATION_Z;
        }

        // pressure and distance are mutually exclusive in an emitted frame
        if self.axes.pressure > 0.0 && self.axes.distance > 0.0 {
            self.axes.distance = 0.0;
            self.changed.remove(AxisMask::DISTANCE);
        }
        // out of contact, pressure is clamped to exactly zero once and then
        // stays silent until the next contact
        if self.axes.pressure == 0.0 && !self.status.contains(TabletStatus::IN_CONTACT) {
            if self.changed.contains(AxisMask::PRESSURE) {
                if self.pressure_zeroed {
                    self.changed.remove(AxisMask::PRESSURE);
                } else {
                    self.pressure_zeroed = true;
                }
            }
        } else if self.axes.pressure > 0.0 {
            self.pressure_zeroed = false;
        }
    }

    fn deltas(&self) -> AxisSnapshot {
        AxisSnapshot {
            x: self.axes.x - self.prev.x,
            y: self.axes.y - self.prev.y,
            pressure: self.axes.pressure - self.prev.pressure,
            distance: self.axes.distance - self.prev.distance,
            tilt_x: self.axes.tilt_x - self.prev.tilt_x,
            tilt_y: self.axes.tilt_y - self.prev.tilt_y,
            slider: self.axes.slider - self.prev.slider,
            rotation: self.axes.rotation - self.prev.rotation,
            wheel: self.axes.wheel,
        }
    }

    fn emit_button(&mut self, ctx: &mut DispatchCtx<'_>, time: u64, button: u16, pressed: bool) {
        let Some(tool) = self.tool.clone() else {
            return;
        };
        if pressed {
            if self.buttons_down.contains(&button) {
                return;
            }
            self.buttons_down.push(button);
            self.status |= TabletStatus::BUTTONS_PRESSED;
        } else {
            let Some(idx) = self.buttons_down.iter().position(|b| *b == button) else {
                return;
            };
            self.buttons_down.swap_remove(idx);
            self.status |= TabletStatus::BUTTONS_RELEASED;
        }
        let count = ctx.device.seat().update_button_count(button as u32, pressed);
        ctx.queue.push(Event::TabletToolButton {
            event: TabletToolButtonEvent {
                device: ctx.device.clone(),
                time,
                tool,
                button: button as u32,
                state: if pressed {
                    ButtonState::Pressed
                } else {
                    ButtonState::Released
                },
                seat_button_count: count,
            },
        });
    }

    fn force_prox_out(&mut self, ctx: &mut DispatchCtx<'_>, time: u64) {
        let Some(tool) = self.tool.clone() else {
            return;
        };
        // every pressed stylus button gets its release no later than prox-out
        for button in std::mem::take(&mut self.buttons_down) {
            let count = ctx.device.seat().update_button_count(button as u32, false);
            ctx.queue.push(Event::TabletToolButton {
                event: TabletToolButtonEvent {
                    device: ctx.device.clone(),
                    time,
                    tool: tool.clone(),
                    button: button as u32,
                    state: ButtonState::Released,
                    seat_button_count: count,
                },
            });
        }
        if self.status.contains(TabletStatus::IN_CONTACT) {
            self.status.remove(TabletStatus::IN_CONTACT);
            ctx.queue.push(Event::TabletToolTip {
                event: TabletToolTipEvent {
                    device: ctx.device.clone(),
                    time,
                    tool: tool.clone(),
                    state: TipState::Up,
                    changed: AxisMask::empty(),
                    axes: self.axes,
                },
            });
        }
        ctx.queue.push(Event::TabletToolProximity {
            event: TabletToolProximityEvent {
                device: ctx.device.clone(),
                time,
                tool,
                state: ProximityState::Out,
                changed: AxisMask::empty(),
                axes: self.axes,
            },
        });
        self.tool = None;
        self.status = TabletStatus::OUT_OF_PROX;
        self.pressure_zeroed = false;
    }

    pub(crate) fn frame(&mut self, ctx: &mut DispatchCtx<'_>, time: u64) {
        // resolve the tool first so normalization knows mouse/lens semantics
        if let Some(tool_type) = self.pending_tool_down.take() {
            if self.tool.is_some() {
                tracing::error!(
                    device = ctx.device.sysname(),
                    "tool entered proximity while another is in proximity, forcing the old one out"
                );
                self.normalize_axes(ctx);
                self.force_prox_out(ctx, time);
            }
            let serial = self.pending_serial.take().unwrap_or(0);
            let tool = if serial != 0 {
                tool::lookup_or_create(ctx.serial_tools, tool_type, self.tool_id, serial)
            } else {
                tool::lookup_or_create(&mut self.local_tools, tool_type, self.tool_id, serial)
            };
            self.tool = Some(tool);
            self.status.remove(TabletStatus::OUT_OF_PROX);
            self.status |= TabletStatus::ENTERING_PROX;
        }
        if self.pending_tool_up {
            self.pending_tool_up = false;
            self.status |= TabletStatus::LEAVING_PROX;
        }

        self.normalize_axes(ctx);

        if self.tool.is_none() {
            // axis noise without a tool; nothing to attribute it to
            self.changed = AxisMask::empty();
            self.wheel_clicks = 0;
            self.pending_buttons.clear();
            self.finish_frame(ctx);
            return;
        }
        let tool = self.tool.clone().unwrap();

        let tip_change = self.tip_pending.take();
        if let Some(down) = tip_change {
            if down {
                self.status |= TabletStatus::ENTERING_CONTACT | TabletStatus::IN_CONTACT;
                self.pressure_zeroed = false;
            } else {
                self.status |= TabletStatus::LEAVING_CONTACT;
                self.status.remove(TabletStatus::IN_CONTACT);
            }
        }

        let changed = self.changed;
        let deltas = self.deltas();
        let wheel_discrete = self.wheel_clicks;

        let entering = self.status.contains(TabletStatus::ENTERING_PROX);
        if entering {
            ctx.queue.push(Event::TabletToolProximity {
                event: TabletToolProximityEvent {
                    device: ctx.device.clone(),
                    time,
                    tool: tool.clone(),
                    state: ProximityState::In,
                    changed,
                    axes: self.axes,
                },
            });
            self.status.remove(TabletStatus::ENTERING_PROX);
        }
        if let Some(down) = tip_change {
            // a tip transition swallows the frame's axis changes
            ctx.queue.push(Event::TabletToolTip {
                event: TabletToolTipEvent {
                    device: ctx.device.clone(),
                    time,
                    tool: tool.clone(),
                    state: if down { TipState::Down } else { TipState::Up },
                    changed,
                    axes: self.axes,
                },
            });
        } else if !entering && !changed.is_empty() && !self.status.contains(TabletStatus::LEAVING_PROX) {
            self.status |= TabletStatus::AXES_UPDATED;
            ctx.queue.push(Event::TabletToolAxis {
                event: TabletToolAxisEvent {
                    device: ctx.device.clone(),
                    time,
                    tool: tool.clone(),
                    changed,
                    axes: self.axes,
                    deltas,
                    wheel_discrete,
                },
            });
        }

        for (button, pressed) in std::mem::take(&mut self.pending_buttons) {
            if self.status.contains(TabletStatus::LEAVING_PROX) && pressed {
                continue;
            }
            self.emit_button(ctx, time, button, pressed);
        }

        if self.status.contains(TabletStatus::LEAVING_PROX) {
            self.status.remove(TabletStatus::LEAVING_PROX);
            self.force_prox_out(ctx, time);
        }

        self.finish_frame(ctx);
    }

    /// Save the frame's state as the previous state and apply deferred config
    fn finish_frame(&mut self, ctx: &mut DispatchCtx<'_>) {
        self.prev = self.axes;
        self.changed = AxisMask::empty();
        self.wheel_clicks = 0;
        self.status.remove(
            TabletStatus::AXES_UPDATED
                | TabletStatus::ENTERING_CONTACT
                | TabletStatus::LEAVING_CONTACT
                | TabletStatus::BUTTONS_PRESSED
                | TabletStatus::BUTTONS_RELEASED,
        );
        // left-handed only flips while no tool is in proximity
        if self.tool.is_none() {
            ctx.device
                .with_config(|c| c.left_handed.current = c.left_handed.wanted);
        }
    }

    pub(crate) fn suspend(&mut self, ctx: &mut DispatchCtx<'_>, time: u64) {
        self.pending_buttons.clear();
        self.pending_tool_down = None;
        self.pending_tool_up = false;
        self.tip_pending = None;
        self.changed = AxisMask::empty();
        self.wheel_clicks = 0;
        self.force_prox_out(ctx, time);
    }
}
