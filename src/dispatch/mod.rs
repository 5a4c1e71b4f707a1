//! Per-device event processing pipelines
//!
//! Each device owns exactly one dispatcher for its whole lifetime, selected
//! by device class at registration. A dispatcher consumes the device's raw
//! evdev records, mutates internal state and, on frame end (`SYN_REPORT`) or
//! when one of its timers fires, emits semantic events through the shared
//! [`DispatchCtx`].

use smallvec::SmallVec;

use crate::context::EventQueue;
use crate::device::{Device, DeviceClass};
use crate::evdev::EvdevEvent;
use crate::event::tablet::TabletTool;
use crate::event::{
    Axis, AxisSource, ButtonState, Event, KeyState, KeyboardKeyEvent, PointerAxisEvent,
    PointerButtonEvent, PointerMotionEvent,
};
use crate::timer::{TimerKind, TimerToken, TimerWheel};

pub(crate) mod buttonset;
pub(crate) mod halfkey;
pub(crate) mod keyboard;
pub(crate) mod pointer;
pub(crate) mod tablet;
pub(crate) mod touch;
pub(crate) mod touchpad;

/// Keyboard activity noted during a dispatch, fanned out to the
/// disable-while-typing interlock of same-seat touchpads afterwards.
#[derive(Debug, Clone, Copy)]
pub(crate) struct KeyNotify {
    pub(crate) time: u64,
    pub(crate) code: u32,
    pub(crate) state: KeyState,
}

/// Everything a dispatcher may touch while processing
pub(crate) struct DispatchCtx<'a> {
    pub(crate) device: &'a Device,
    pub(crate) queue: &'a mut EventQueue,
    pub(crate) timers: &'a mut TimerWheel,
    /// Context-global registry of tools with hardware serials
    pub(crate) serial_tools: &'a mut Vec<TabletTool>,
    /// Key transitions to fan out to DWT after this device's frame
    pub(crate) key_notify: &'a mut SmallVec<[KeyNotify; 4]>,
}

impl std::fmt::Debug for DispatchCtx<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchCtx")
            .field("device", &self.device.sysname())
            .finish_non_exhaustive()
    }
}

impl DispatchCtx<'_> {
    pub(crate) fn set_timer(&mut self, kind: TimerKind, expiry: u64) {
        self.timers.set(
            TimerToken {
                device: self.device.id(),
                kind,
            },
            expiry,
        );
    }

    pub(crate) fn cancel_timer(&mut self, kind: TimerKind) {
        self.timers.cancel(TimerToken {
            device: self.device.id(),
            kind,
        });
    }

    /// Emit a keyboard key event, updating the seat-wide counter
    pub(crate) fn key_event(&mut self, time: u64, code: u32, state: KeyState) {
        let count = self
            .device
            .seat()
            .update_key_count(code, state == KeyState::Pressed);
        self.queue.push(Event::Keyboard {
            event: KeyboardKeyEvent {
                device: self.device.clone(),
                time,
                code,
                state,
                seat_key_count: count,
            },
        });
        self.key_notify.push(KeyNotify { time, code, state });
    }

    /// Emit a pointer button event, updating the seat-wide counter
    pub(crate) fn button_event(&mut self, time: u64, button: u32, state: ButtonState) {
        let count = self
            .device
            .seat()
            .update_button_count(button, state == ButtonState::Pressed);
        self.queue.push(Event::PointerButton {
            event: PointerButtonEvent {
                device: self.device.clone(),
                time,
                button,
                state,
                seat_button_count: count,
            },
        });
    }

    /// Emit an accelerated relative motion event
    pub(crate) fn motion_event(&mut self, time: u64, accel: (f64, f64), unaccel: (f64, f64)) {
        self.queue.push(Event::PointerMotion {
            event: PointerMotionEvent {
                device: self.device.clone(),
                time,
                dx: accel.0,
                dy: accel.1,
                dx_unaccel: unaccel.0,
                dy_unaccel: unaccel.1,
            },
        });
    }

    /// Emit a scroll event; natural-scroll inversion happens here, at the
    /// emission boundary, so no state machine has to care
    pub(crate) fn axis_event(&mut self, time: u64, axis: Axis, value: f64, source: AxisSource) {
        let value = if self.device.config().natural_scroll {
            -value
        } else {
            value
        };
        self.queue.push(Event::PointerAxis {
            event: PointerAxisEvent {
                device: self.device.clone(),
                time,
                axis,
                value,
                source,
            },
        });
    }
}

/// The class-tagged dispatcher owned by each device
#[derive(Debug)]
pub(crate) enum DeviceDispatch {
    Keyboard(keyboard::KeyboardDispatch),
    Pointer(pointer::PointerDispatch),
    Touch(touch::TouchDispatch),
    Touchpad(touchpad::TouchpadDispatch),
    Tablet(tablet::TabletDispatch),
    Buttonset(buttonset::ButtonsetDispatch),
}

impl DeviceDispatch {
    pub(crate) fn for_device(device: &Device) -> Self {
        match device.class() {
            DeviceClass::Keyboard => DeviceDispatch::Keyboard(keyboard::KeyboardDispatch::new()),
            DeviceClass::Pointer => DeviceDispatch::Pointer(pointer::PointerDispatch::new(device)),
            DeviceClass::Touchscreen => DeviceDispatch::Touch(touch::TouchDispatch::new(device)),
            DeviceClass::Touchpad => {
                DeviceDispatch::Touchpad(touchpad::TouchpadDispatch::new(device))
            }
            DeviceClass::Tablet => DeviceDispatch::Tablet(tablet::TabletDispatch::new(device)),
            DeviceClass::Buttonset => {
                DeviceDispatch::Buttonset(buttonset::ButtonsetDispatch::new(device))
            }
        }
    }

    /// Hook run after the device-added event was queued
    pub(crate) fn post_added(&mut self, ctx: &mut DispatchCtx<'_>) {
        if let DeviceDispatch::Touchpad(tp) = self {
            tp.post_added(ctx);
        }
    }

    /// Feed one non-SYN record into the pipeline
    pub(crate) fn process(&mut self, ctx: &mut DispatchCtx<'_>, event: &EvdevEvent) {
        match self {
            DeviceDispatch::Keyboard(d) => d.process(ctx, event),
            DeviceDispatch::Pointer(d) => d.process(ctx, event),
            DeviceDispatch::Touch(d) => d.process(ctx, event),
            DeviceDispatch::Touchpad(d) => d.process(ctx, event),
            DeviceDispatch::Tablet(d) => d.process(ctx, event),
            DeviceDispatch::Buttonset(d) => d.process(ctx, event),
        }
    }

    /// Handle a `SYN_REPORT`: publish the frame's semantic events
    pub(crate) fn frame(&mut self, ctx: &mut DispatchCtx<'_>, time: u64) {
        match self {
            DeviceDispatch::Keyboard(d) => d.frame(ctx, time),
            DeviceDispatch::Pointer(d) => d.frame(ctx, time),
            DeviceDispatch::Touch(d) => d.frame(ctx, time),
            DeviceDispatch::Touchpad(d) => d.frame(ctx, time),
            DeviceDispatch::Tablet(d) => d.frame(ctx, time),
            DeviceDispatch::Buttonset(d) => d.frame(ctx, time),
        }
    }

    /// One of this device's timers fired
    pub(crate) fn timeout(&mut self, ctx: &mut DispatchCtx<'_>, kind: TimerKind, time: u64) {
        match self {
            DeviceDispatch::Pointer(d) => d.timeout(ctx, kind, time),
            DeviceDispatch::Touchpad(d) => d.timeout(ctx, kind, time),
            _ => {
                tracing::error!(device = ctx.device.sysname(), ?kind, "stray timer");
            }
        }
    }

    /// Terminal transition: force-release everything and go quiescent
    ///
    /// Used for device removal, context suspend and send-events disabling.
    /// Pressed buttons and keys get release events, active touches are
    /// cancelled, tools leave proximity, then every timer of the device is
    /// cancelled.
    pub(crate) fn suspend(&mut self, ctx: &mut DispatchCtx<'_>, time: u64) {
        match self {
            DeviceDispatch::Keyboard(d) => d.suspend(ctx, time),
            DeviceDispatch::Pointer(d) => d.suspend(ctx, time),
            DeviceDispatch::Touch(d) => d.suspend(ctx, time),
            DeviceDispatch::Touchpad(d) => d.suspend(ctx, time),
            DeviceDispatch::Tablet(d) => d.suspend(ctx, time),
            DeviceDispatch::Buttonset(d) => d.suspend(ctx, time),
        }
        ctx.timers.cancel_device(ctx.device.id());
    }

    /// Keyboard activity on a same-seat device, for disable-while-typing
    pub(crate) fn keyboard_activity(&mut self, ctx: &mut DispatchCtx<'_>, notify: KeyNotify) {
        if let DeviceDispatch::Touchpad(tp) = self {
            tp.keyboard_activity(ctx, notify);
        }
    }
}

/// Apply a 2x3 calibration matrix to an absolute position
///
/// The matrix operates on coordinates normalized to the unit square, the way
/// the kernel's `LIBINPUT_CALIBRATION_MATRIX` udev property is specified, so
/// it is independent of the device's resolution.
pub(crate) fn calibrate(
    x: f64,
    y: f64,
    abs_x: &crate::evdev::AbsInfo,
    abs_y: &crate::evdev::AbsInfo,
    matrix: &[f32; 6],
) -> (f64, f64) {
    if *matrix == crate::device::CALIBRATION_IDENTITY {
        return (x, y);
    }
    let nx = abs_x.normalize(x as i32);
    let ny = abs_y.normalize(y as i32);
    let cx = matrix[0] as f64 * nx + matrix[1] as f64 * ny + matrix[2] as f64;
    let cy = matrix[3] as f64 * nx + matrix[4] as f64 * ny + matrix[5] as f64;
    (
        abs_x.minimum as f64 + cx.clamp(0.0, 1.0) * abs_x.range(),
        abs_y.minimum as f64 + cy.clamp(0.0, 1.0) * abs_y.range(),
    )
}

/// Diff two button bitmasks into per-bit transitions
///
/// Calls `emit(bit, pressed)` for every bit that differs, releases first.
pub(crate) fn diff_button_bits(prev: u64, cur: u64, mut emit: impl FnMut(u32, bool)) {
    let changed = prev ^ cur;
    for bit in 0..64 {
        if changed & (1 << bit) != 0 && prev & (1 << bit) != 0 {
            emit(bit, false);
        }
    }
    for bit in 0..64 {
        if changed & (1 << bit) != 0 && cur & (1 << bit) != 0 {
            emit(bit, true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_diff_releases_before_presses() {
        let mut seq = Vec::new();
        diff_button_bits(0b0110, 0b1010, |bit, pressed| seq.push((bit, pressed)));
        assert_eq!(seq, vec![(2, false), (3, true)]);
    }
}
