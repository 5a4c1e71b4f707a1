//! Touchpad gesture engine
//!
//! The touchpad pipeline owns a fixed array of touch-slot records and runs,
//! on every frame, the classification passes that decide what each finger
//! *is* — pointer, scroll finger, palm, thumb, hovering, edge-scroll
//! candidate or typing-muted — before any event is emitted. The pointing
//! finger's motion goes through the acceleration filter; two eligible
//! fingers become kinetic scrolling; the tap machine interprets quick
//! touches; a physical click on a clickpad is resolved through the
//! soft-button regions or the clickfinger count.
//!
//! A frame emits its events in a fixed order — button releases, then motion,
//! then scroll, then button presses — so a consumer redrawing on every event
//! never observes an inconsistent cursor at a release site.

use smallvec::SmallVec;

use super::{DispatchCtx, KeyNotify};
use crate::device::{ClickMethod, Device, DeviceInfo, ScrollMethod};
use crate::evdev::{codes, AbsInfo, EvdevEvent, EventKind};
use crate::event::{Axis, AxisSource, ButtonState, Event};
use crate::filter::MotionFilter;
use crate::timer::{timeouts, TimerKind};
use crate::utils::{Point, Raw};

use buttons::{ClickMachine, Region};
use dwt::Dwt;
use edge_scroll::{Edge, EdgeState, EDGE_TRIGGER_MM};
use gestures::Gestures;
use tap::{TapEvent, TapMachine, TapOutput};

mod buttons;
mod dwt;
mod edge_scroll;
mod gestures;
mod tap;

/// Raw `ABS_MT_PRESSURE` below this is a hovering finger
const HOVER_PRESSURE: i32 = 5;
/// Raw `ABS_MT_PRESSURE` at or above this at touch begin is a resting thumb
const THUMB_PRESSURE: i32 = 150;
/// Tap-eligible motion budget in mm; beyond it the contact is a move
const TAP_MOTION_MM: f64 = 1.3;
/// Two-finger travel in mm that starts a scroll
const SCROLL_TRIGGER_MM: f64 = 2.0;
/// Fraction of the width forming each lateral palm strip
const PALM_STRIP_FRACTION: f64 = 0.05;
/// Pads at least this wide also treat the top corners as palm territory
const CORNER_PALM_MIN_WIDTH_MM: f64 = 70.0;
/// Fraction of the height forming the bottom soft-button strip
const BUTTON_STRIP_FRACTION: f64 = 0.2;
/// Fraction of the height forming the top soft-button strip
const TOP_STRIP_FRACTION: f64 = 0.15;
/// Fraction of the width/height forming the edge-scroll strips
const EDGE_STRIP_FRACTION: f64 = 0.07;

#[derive(Debug)]
struct Geometry {
    /// Device units per mm, at least 1
    res_x: f64,
    res_y: f64,
    width_mm: f64,
    palm_left: f64,
    palm_right: f64,
    corner_palm: bool,
    corner_left: f64,
    corner_right: f64,
    corner_top: f64,
    edge_right: f64,
    edge_bottom: f64,
    button_strip_top: f64,
    top_strip_bottom: f64,
    thirds_left: f64,
    thirds_right: f64,
    topbuttonpad: bool,
}

impl Geometry {
    fn new(info: &DeviceInfo) -> Self {
        let abs_x = info
            .abs_info(codes::ABS_MT_POSITION_X)
            .unwrap_or(AbsInfo::new(0, 0, 0));
        let abs_y = info
            .abs_info(codes::ABS_MT_POSITION_Y)
            .unwrap_or(AbsInfo::new(0, 0, 0));
        let res_x = (abs_x.resolution.max(1)) as f64;
        let res_y = (abs_y.resolution.max(1)) as f64;
        let width_mm = abs_x.range() / res_x;
        let (min_x, max_x) = (abs_x.minimum as f64, abs_x.maximum as f64);
        let (min_y, max_y) = (abs_y.minimum as f64, abs_y.maximum as f64);
        let w = abs_x.range();
        let h = abs_y.range();
        Geometry {
            res_x,
            res_y,
            width_mm,
            palm_left: min_x + w * PALM_STRIP_FRACTION,
            palm_right: max_x - w * PALM_STRIP_FRACTION,
            corner_palm: width_mm >= CORNER_PALM_MIN_WIDTH_MM,
            corner_left: min_x + w * 0.15,
            corner_right: max_x - w * 0.15,
            corner_top: min_y + h * 0.1,
            edge_right: max_x - w * EDGE_STRIP_FRACTION,
            edge_bottom: max_y - h * EDGE_STRIP_FRACTION,
            button_strip_top: max_y - h * BUTTON_STRIP_FRACTION,
            top_strip_bottom: min_y + h * TOP_STRIP_FRACTION,
            thirds_left: min_x + w / 3.0,
            thirds_right: min_x + w * 2.0 / 3.0,
            topbuttonpad: info.quirks.topbuttonpad,
        }
    }

    fn to_mm(&self, delta: Point<Raw>) -> Point<Raw> {
        Point::new(delta.x / self.res_x, delta.y / self.res_y)
    }

    fn in_palm_strip(&self, p: Point<Raw>) -> bool {
        p.x < self.palm_left || p.x > self.palm_right
    }

    fn in_palm_corner(&self, p: Point<Raw>) -> bool {
        self.corner_palm && p.y < self.corner_top && (p.x < self.corner_left || p.x > self.corner_right)
    }

    fn edge_of(&self, p: Point<Raw>) -> Option<Edge> {
        if p.x >= self.edge_right {
            Some(Edge::Right)
        } else if p.y >= self.edge_bottom {
            Some(Edge::Bottom)
        } else {
            None
        }
    }

    fn thirds(&self, p: Point<Raw>) -> Region {
        if p.x < self.thirds_left {
            Region::Left
        } else if p.x < self.thirds_right {
            Region::Middle
        } else {
            Region::Right
        }
    }

    /// The soft-button region under `p`, bottom strip or (on top-button
    /// pads) top strip; `None` in the main area
    fn button_region(&self, p: Point<Raw>) -> Option<Region> {
        if p.y >= self.button_strip_top {
            Some(self.thirds(p))
        } else if self.topbuttonpad && p.y <= self.top_strip_bottom {
            Some(self.thirds(p))
        } else {
            None
        }
    }

    fn in_top_strip(&self, p: Point<Raw>) -> bool {
        self.topbuttonpad && p.y <= self.top_strip_bottom
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TouchChange {
    None,
    Begin,
    Update,
    End,
}

#[derive(Debug, Clone, Copy)]
struct Touch {
    active: bool,
    change: TouchChange,
    point: Point<Raw>,
    prev: Point<Raw>,
    initial: Point<Raw>,
    begin_time: u64,
    pressure: i32,
    palm: bool,
    thumb: bool,
    hovering: bool,
    dwt_muted: bool,
    tap_counted: bool,
    tap_moved: bool,
    button_armed: bool,
    edge: EdgeState,
}

impl Touch {
    fn idle() -> Self {
        Touch {
            active: false,
            change: TouchChange::None,
            point: Point::origin(),
            prev: Point::origin(),
            initial: Point::origin(),
            begin_time: 0,
            pressure: 0,
            palm: false,
            thumb: false,
            hovering: false,
            dwt_muted: false,
            tap_counted: false,
            tap_moved: false,
            button_armed: false,
            edge: EdgeState::None,
        }
    }

    /// A contact that may move the pointer, tap or scroll
    fn eligible(&self) -> bool {
        self.active
            && !self.palm
            && !self.thumb
            && !self.hovering
            && !self.dwt_muted
            && matches!(self.edge, EdgeState::None | EdgeState::Area)
    }
}

#[derive(Debug, Default)]
struct FrameStage {
    releases: SmallVec<[(u64, u16); 4]>,
    motion: Option<((f64, f64), (f64, f64))>,
    scrolls: SmallVec<[(Axis, f64); 4]>,
    gestures: SmallVec<[Event; 4]>,
    presses: SmallVec<[(u64, u16); 4]>,
}

#[derive(Debug)]
pub(crate) struct TouchpadDispatch {
    geom: Geometry,
    has_pressure: bool,
    clickpad: bool,
    touches: Vec<Touch>,
    current_slot: usize,
    filter: MotionFilter,
    tap: TapMachine,
    click: ClickMachine,
    dwt: Dwt,
    gestures: Gestures,

    scrolling: bool,
    scroll_accum: Point<Raw>,
    scroll_axes: (bool, bool),
    in_handoff: bool,
    motion_quiet: bool,

    pending_buttons: SmallVec<[(u16, bool); 2]>,
    stage: FrameStage,
}

impl TouchpadDispatch {
    pub(crate) fn new(device: &Device) -> Self {
        let info = device.info();
        let config = device.config();
        TouchpadDispatch {
            geom: Geometry::new(info),
            has_pressure: info.abs_info(codes::ABS_MT_PRESSURE).is_some(),
            clickpad: info.quirks.clickpad,
            touches: vec![Touch::idle(); info.slot_count.max(1) as usize],
            current_slot: 0,
            filter: MotionFilter::new(config.accel_profile, info.dpi),
            tap: TapMachine::new(),
            click: ClickMachine::new(),
            dwt: Dwt::new(),
            gestures: Gestures::new(),
            scrolling: false,
            scroll_accum: Point::origin(),
            scroll_axes: (false, false),
            in_handoff: false,
            motion_quiet: true,
            pending_buttons: SmallVec::new(),
            stage: FrameStage::default(),
        }
    }

    pub(crate) fn post_added(&mut self, ctx: &mut DispatchCtx<'_>) {
        tracing::debug!(
            device = ctx.device.sysname(),
            clickpad = self.clickpad,
            width_mm = self.geom.width_mm,
            "touchpad ready"
        );
    }

    pub(crate) fn process(&mut self, _ctx: &mut DispatchCtx<'_>, event: &EvdevEvent) {
        match (event.kind, event.code) {
            (EventKind::Absolute, codes::ABS_MT_SLOT) => {
                let idx = event.value.max(0) as usize;
                if idx < self.touches.len() {
                    self.current_slot = idx;
                } else {
                    tracing::error!(slot = idx, "MT slot beyond advertised count, clamping");
                    self.current_slot = self.touches.len() - 1;
                }
            }
            (EventKind::Absolute, codes::ABS_MT_TRACKING_ID) => {
                let touch = &mut self.touches[self.current_slot];
                if event.value >= 0 {
                    touch.change = TouchChange::Begin;
                } else if touch.active || touch.change == TouchChange::Begin {
                    touch.change = TouchChange::End;
                }
            }
            (EventKind::Absolute, codes::ABS_MT_POSITION_X) => {
                let touch = &mut self.touches[self.current_slot];
                touch.point.x = event.value as f64;
                if touch.change == TouchChange::None {
                    touch.change = TouchChange::Update;
                }
            }
            (EventKind::Absolute, codes::ABS_MT_POSITION_Y) => {
                let touch = &mut self.touches[self.current_slot];
                touch.point.y = event.value as f64;
                if touch.change == TouchChange::None {
                    touch.change = TouchChange::Update;
                }
            }
            (EventKind::Absolute, codes::ABS_MT_PRESSURE) => {
                self.touches[self.current_slot].pressure = event.value;
            }
            (EventKind::Key, codes::BTN_LEFT | codes::BTN_RIGHT | codes::BTN_MIDDLE)
                if event.value != 2 =>
            {
                self.pending_buttons.push((event.code, event.value != 0));
            }
            _ => {}
        }
    }

    fn apply_tap_output(&mut self, ctx: &mut DispatchCtx<'_>, out: TapOutput, staged: bool) {
        for (ts, button, pressed) in out.events {
            if staged {
                if pressed {
                    self.stage.presses.push((ts, button));
                } else {
                    self.stage.releases.push((ts, button));
                }
            } else {
                let state = if pressed {
                    ButtonState::Pressed
                } else {
                    ButtonState::Released
                };
                ctx.button_event(ts, button as u32, state);
            }
        }
        if out.cancel_tap_timer {
            ctx.cancel_timer(TimerKind::Tap);
        }
        if out.cancel_drag_timer {
            ctx.cancel_timer(TimerKind::TapDrag);
        }
        if let Some(expiry) = out.set_tap_timer {
            ctx.set_timer(TimerKind::Tap, expiry);
        }
        if let Some(expiry) = out.set_drag_timer {
            ctx.set_timer(TimerKind::TapDrag, expiry);
        }
    }

    fn feed_tap(&mut self, ctx: &mut DispatchCtx<'_>, event: TapEvent, time: u64, staged: bool) {
        // disabled tapping starts no new gesture; one in flight finishes
        if !ctx.device.config().tap_enabled && self.tap.idle() {
            return;
        }
        let out = self.tap.handle(event, time);
        self.apply_tap_output(ctx, out, staged);
    }

    /// Classification pass over the frame's touch transitions
    fn update_touches(&mut self, ctx: &mut DispatchCtx<'_>, time: u64) {
        let config = ctx.device.config();
        let edge_method = config.scroll_method == ScrollMethod::Edge;
        let palm_enabled = ctx.device.info().quirks.palm_detection;
        let mut tap_events: SmallVec<[(TapEvent, u64); 4]> = SmallVec::new();
        let mut edge_timer_needed = false;

        for idx in 0..self.touches.len() {
            let change = std::mem::replace(&mut self.touches[idx].change, TouchChange::None);
            match change {
                TouchChange::None => {}
                TouchChange::Begin => {
                    let point = self.touches[idx].point;
                    let pressure = self.touches[idx].pressure;
                    let hovering = self.has_pressure && pressure < HOVER_PRESSURE;

                    let mut edge = EdgeState::None;
                    if edge_method && !hovering {
                        if let Some(e) = self.geom.edge_of(point) {
                            if self.dwt.active() {
                                // typing: the strip does not activate
                                edge = EdgeState::Area;
                            } else {
                                edge = EdgeState::New {
                                    edge: e,
                                    since: time,
                                };
                                edge_timer_needed = true;
                            }
                        }
                    }

                    // a touch beginning inside the strip is a palm for life;
                    // an edge-scroll candidate claims the strip first
                    let palm = palm_enabled
                        && matches!(edge, EdgeState::None)
                        && (self.geom.in_palm_strip(point) || self.geom.in_palm_corner(point));
                    let thumb = self.has_pressure && pressure >= THUMB_PRESSURE;

                    let touch = &mut self.touches[idx];
                    touch.active = true;
                    touch.initial = point;
                    touch.prev = point;
                    touch.begin_time = time;
                    touch.hovering = hovering;
                    touch.palm = palm;
                    touch.thumb = thumb;
                    touch.dwt_muted = self.dwt.active();
                    touch.tap_counted = false;
                    touch.tap_moved = false;
                    touch.edge = edge;
                    touch.button_armed = self.geom.button_region(point).is_some();

                    if touch.eligible() {
                        touch.tap_counted = true;
                        tap_events.push((TapEvent::Down, time));
                    }
                }
                TouchChange::Update => {
                    let touch = &mut self.touches[idx];
                    if !touch.active {
                        continue;
                    }
                    let point = touch.point;
                    let pressure = touch.pressure;

                    // hover transitions
                    if self.has_pressure {
                        if touch.hovering && pressure >= HOVER_PRESSURE {
                            touch.hovering = false;
                            touch.initial = point;
                            touch.prev = point;
                            touch.begin_time = time;
                            self.filter.restart();
                            if touch.eligible() {
                                touch.tap_counted = true;
                                tap_events.push((TapEvent::Down, time));
                            }
                        } else if !touch.hovering && pressure < HOVER_PRESSURE {
                            touch.hovering = true;
                            if touch.tap_counted {
                                touch.tap_counted = false;
                                tap_events.push((TapEvent::Up, time));
                            }
                        }
                    }

                    // edge-scroll life cycle
                    match touch.edge {
                        EdgeState::New { edge, .. } => {
                            let travel = edge.travel(self.geom.to_mm(point - touch.initial));
                            if travel.abs() >= EDGE_TRIGGER_MM && !self.dwt.active() {
                                touch.edge = EdgeState::Active { edge };
                            } else if self.geom.edge_of(point) != Some(edge) {
                                touch.edge = EdgeState::Area;
                                if touch.eligible() {
                                    touch.tap_counted = true;
                                    touch.initial = point;
                                    tap_events.push((TapEvent::Down, time));
                                }
                            }
                        }
                        _ => {}
                    }

                    // tap motion budget
                    let touch = &mut self.touches[idx];
                    if touch.tap_counted && !touch.tap_moved {
                        let moved = self.geom.to_mm(point - touch.initial).hypot();
                        if moved > TAP_MOTION_MM {
                            touch.tap_moved = true;
                            tap_events.push((TapEvent::Motion, time));
                        }
                    }

                    // entering the button strip only arms the soft buttons
                    // after the pad has been quiet for the lock-in timeout
                    if !touch.button_armed
                        && self.geom.button_region(point).is_some()
                        && self.motion_quiet
                    {
                        touch.button_armed = true;
                    }
                }
                TouchChange::End => {
                    let touch = &mut self.touches[idx];
                    touch.active = false;
                    if touch.tap_counted {
                        touch.tap_counted = false;
                        tap_events.push((TapEvent::Up, time));
                    }
                    if let EdgeState::Active { edge } = touch.edge {
                        // scroll stop, exactly once per edge-scroll sequence
                        self.stage.scrolls.push((edge.axis(), 0.0));
                    }
                    touch.edge = EdgeState::None;
                    touch.hovering = false;
                    touch.pressure = 0;
                }
            }
        }

        if edge_timer_needed {
            let earliest = self
                .touches
                .iter()
                .filter_map(|t| match t.edge {
                    EdgeState::New { since, .. } => Some(since + timeouts::EDGE_SCROLL),
                    _ => None,
                })
                .min();
            if let Some(expiry) = earliest {
                ctx.set_timer(TimerKind::EdgeScroll, expiry);
            }
        }

        for (event, ts) in tap_events {
            self.feed_tap(ctx, event, ts, true);
        }
    }

    fn update_scroll(&mut self, ctx: &mut DispatchCtx<'_>, time: u64) {
        let config = ctx.device.config();

        // edge scrolling: active fingers emit their travel along the strip
        for idx in 0..self.touches.len() {
            let touch = self.touches[idx];
            if !touch.active {
                continue;
            }
            if let EdgeState::Active { edge } = touch.edge {
                let travel = edge.travel(self.geom.to_mm(touch.point - touch.prev));
                if travel != 0.0 {
                    self.stage.scrolls.push((edge.axis(), travel));
                }
            }
        }

        if config.scroll_method != ScrollMethod::TwoFinger {
            return;
        }

        let scroll_touches: SmallVec<[usize; 4]> = self
            .touches
            .iter()
            .enumerate()
            .filter(|(_, t)| t.eligible())
            .map(|(i, _)| i)
            .collect();

        if scroll_touches.len() == 2 {
            let mut delta = Point::origin();
            for &i in &scroll_touches {
                delta += self.geom.to_mm(self.touches[i].point - self.touches[i].prev);
            }
            let delta = Point::new(delta.x / 2.0, delta.y / 2.0);

            if !self.scrolling {
                self.scroll_accum += delta;
                if self.scroll_accum.x.abs() >= SCROLL_TRIGGER_MM
                    || self.scroll_accum.y.abs() >= SCROLL_TRIGGER_MM
                {
                    self.scrolling = true;
                    // terminate ongoing motion with a zero-delta flush
                    self.stage.motion = Some(((0.0, 0.0), (0.0, 0.0)));
                    let first = self.scroll_accum;
                    self.scroll_accum = Point::origin();
                    if first.y != 0.0 {
                        self.stage.scrolls.push((Axis::Vertical, first.y));
                        self.scroll_axes.0 = true;
                    }
                    if first.x != 0.0 {
                        self.stage.scrolls.push((Axis::Horizontal, first.x));
                        self.scroll_axes.1 = true;
                    }
                }
            } else {
                if delta.y != 0.0 {
                    self.stage.scrolls.push((Axis::Vertical, delta.y));
                    self.scroll_axes.0 = true;
                }
                if delta.x != 0.0 {
                    self.stage.scrolls.push((Axis::Horizontal, delta.x));
                    self.scroll_axes.1 = true;
                }
            }
        } else {
            if self.scrolling {
                self.stop_two_finger_scroll(ctx, time);
            }
            self.scroll_accum = Point::origin();
        }
    }

    fn stop_two_finger_scroll(&mut self, ctx: &mut DispatchCtx<'_>, time: u64) {
        self.scrolling = false;
        if self.scroll_axes.0 {
            self.stage.scrolls.push((Axis::Vertical, 0.0));
        }
        if self.scroll_axes.1 {
            self.stage.scrolls.push((Axis::Horizontal, 0.0));
        }
        self.scroll_axes = (false, false);
        self.in_handoff = true;
        ctx.set_timer(TimerKind::FingerSwitch, time + timeouts::FINGER_SWITCH);
    }

    fn update_motion(&mut self, ctx: &mut DispatchCtx<'_>, time: u64) {
        if self.scrolling || self.in_handoff || self.gestures.active() {
            return;
        }
        // two eligible fingers under the two-finger method are a scroll
        // candidate; the pointer holds still while the trigger accumulates
        if ctx.device.config().scroll_method == ScrollMethod::TwoFinger
            && self.touches.iter().filter(|t| t.eligible()).count() >= 2
        {
            return;
        }
        // the pointing finger is the most recently landed eligible contact
        let Some(idx) = self
            .touches
            .iter()
            .enumerate()
            .filter(|(_, t)| t.eligible())
            .max_by_key(|(_, t)| t.begin_time)
            .map(|(i, _)| i)
        else {
            return;
        };
        let touch = self.touches[idx];
        let delta = self.geom.to_mm(touch.point - touch.prev);
        if delta == Point::origin() {
            return;
        }
        let accel = self.filter.dispatch(delta, time);
        // the zero-flush staged at scroll start must stay a zero-flush
        if self.stage.motion.is_none() {
            self.stage.motion = Some(((accel.x, accel.y), (delta.x, delta.y)));
        }
        self.motion_quiet = false;
        ctx.set_timer(TimerKind::SoftButton, time + timeouts::SOFTBUTTON);
    }

    fn update_buttons(&mut self, ctx: &mut DispatchCtx<'_>, time: u64) {
        let config = ctx.device.config();
        let left_handed = config.left_handed.current;
        let trackpoint = ctx.device.info().quirks.trackpoint_attached;

        for (code, pressed) in std::mem::take(&mut self.pending_buttons) {
            if self.clickpad && code == codes::BTN_LEFT {
                if pressed {
                    self.feed_tap(ctx, TapEvent::Button, time, true);

                    // region of the oldest armed touch at the moment of the press
                    let first = self
                        .touches
                        .iter()
                        .filter(|t| t.active && !t.hovering && t.button_armed)
                        .min_by_key(|t| t.begin_time);
                    let region = first.and_then(|t| self.geom.button_region(t.point));
                    let in_top = first.map_or(false, |t| self.geom.in_top_strip(t.point));

                    // top buttons stay geometric for trackpoint users even
                    // under clickfinger
                    let method = if in_top && trackpoint {
                        ClickMethod::ButtonAreas
                    } else {
                        config.click_method
                    };
                    // resting thumbs and palms do not count as clicking fingers
                    let fingers = self
                        .touches
                        .iter()
                        .filter(|t| t.active && !t.palm && !t.thumb && !t.hovering)
                        .count() as u32;

                    if let Some(button) = self.click.press(method, fingers, region, left_handed) {
                        self.stage.presses.push((time, button));
                    }
                } else if let Some(button) = self.click.release() {
                    self.stage.releases.push((time, button));
                }
            } else {
                // physical button pads: pass through with the left-handed swap
                let button = match (code, left_handed) {
                    (codes::BTN_LEFT, true) => codes::BTN_RIGHT,
                    (codes::BTN_RIGHT, true) => codes::BTN_LEFT,
                    (other, _) => other,
                };
                if pressed {
                    self.feed_tap(ctx, TapEvent::Button, time, true);
                    self.stage.presses.push((time, button));
                } else {
                    self.stage.releases.push((time, button));
                }
            }
        }
    }

    fn flush_stage(&mut self, ctx: &mut DispatchCtx<'_>, time: u64) {
        let stage = std::mem::take(&mut self.stage);
        for (ts, button) in stage.releases {
            ctx.button_event(ts, button as u32, ButtonState::Released);
        }
        if let Some((accel, unaccel)) = stage.motion {
            ctx.motion_event(time, accel, unaccel);
        }
        for (axis, value) in stage.scrolls {
            ctx.axis_event(time, axis, value, AxisSource::Finger);
        }
        for event in stage.gestures {
            ctx.queue.push(event);
        }
        for (ts, button) in stage.presses {
            ctx.button_event(ts, button as u32, ButtonState::Pressed);
        }
    }

    pub(crate) fn frame(&mut self, ctx: &mut DispatchCtx<'_>, time: u64) {
        // gesture-neutral config application
        if !self.click.is_pressed() {
            ctx.device.with_config(|c| {
                c.click_method = c.click_method_wanted;
                if self.tap.idle() {
                    c.left_handed.current = c.left_handed.wanted;
                }
            });
        }
        let config = ctx.device.config();
        self.filter.set_speed(config.accel_speed);
        self.filter.set_profile(config.accel_profile);

        self.update_touches(ctx, time);
        self.update_buttons(ctx, time);
        self.update_scroll(ctx, time);
        let gesture_events = self
            .gestures
            .update(ctx.device, &self.geom, &self.touches, time);
        self.stage.gestures.extend(gesture_events);
        self.update_motion(ctx, time);
        self.flush_stage(ctx, time);

        for touch in &mut self.touches {
            touch.prev = touch.point;
        }
    }

    pub(crate) fn timeout(&mut self, ctx: &mut DispatchCtx<'_>, kind: TimerKind, time: u64) {
        match kind {
            TimerKind::Tap => self.feed_tap(ctx, TapEvent::TimeoutTap, time, false),
            TimerKind::TapDrag => self.feed_tap(ctx, TapEvent::TimeoutDrag, time, false),
            TimerKind::SoftButton => self.motion_quiet = true,
            TimerKind::FingerSwitch => self.in_handoff = false,
            TimerKind::Dwt => self.dwt.expired(),
            TimerKind::EdgeScroll => {
                let mut tap_downs = 0;
                let mut next = None;
                for touch in &mut self.touches {
                    if let EdgeState::New { edge, since } = touch.edge {
                        if time >= since + timeouts::EDGE_SCROLL {
                            let still_in = self.geom.edge_of(touch.point) == Some(edge);
                            if still_in && !self.dwt.active() {
                                touch.edge = EdgeState::Active { edge };
                            } else {
                                touch.edge = EdgeState::Area;
                                if touch.eligible() {
                                    touch.tap_counted = true;
                                    touch.initial = touch.point;
                                    tap_downs += 1;
                                }
                            }
                        } else {
                            next = Some(
                                next.unwrap_or(u64::MAX)
                                    .min(since + timeouts::EDGE_SCROLL),
                            );
                        }
                    }
                }
                for _ in 0..tap_downs {
                    self.feed_tap(ctx, TapEvent::Down, time, false);
                }
                if let Some(expiry) = next {
                    ctx.set_timer(TimerKind::EdgeScroll, expiry);
                }
            }
            _ => tracing::error!(?kind, "stray timer on a touchpad"),
        }
    }

    pub(crate) fn keyboard_activity(&mut self, ctx: &mut DispatchCtx<'_>, notify: KeyNotify) {
        let config = ctx.device.config();
        if !config.dwt_available || !config.dwt_enabled {
            return;
        }
        if let Some(expiry) = self.dwt.keyboard_event(notify.time, notify.code, notify.state) {
            ctx.set_timer(TimerKind::Dwt, expiry);
        }
    }

    pub(crate) fn suspend(&mut self, ctx: &mut DispatchCtx<'_>, time: u64) {
        if let Some(event) = self.gestures.cancel(ctx.device, time) {
            ctx.queue.push(event);
        }
        let out = self.tap.reset(time);
        self.apply_tap_output(ctx, out, false);
        if self.click.is_pressed() {
            if let Some(button) = self.click.release() {
                ctx.button_event(time, button as u32, ButtonState::Released);
            }
        }
        if self.scrolling {
            self.stop_two_finger_scroll(ctx, time);
        }
        for touch in &mut self.touches {
            if touch.active {
                if let EdgeState::Active { edge } = touch.edge {
                    self.stage.scrolls.push((edge.axis(), 0.0));
                }
            }
            *touch = Touch::idle();
        }
        self.flush_stage(ctx, time);
        self.pending_buttons.clear();
        self.in_handoff = false;
        self.dwt.reset();
        self.filter.restart();
    }
}
