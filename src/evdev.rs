//! The pinned inbound interface: evdev event records and their source
//!
//! The library does not read `/dev/input` itself; the host supplies, per
//! device, an [`EventSource`] delivering decoded `(time, type, code, value)`
//! records, framed by `SYN_REPORT`. The constants in [`codes`] mirror the
//! kernel's `input-event-codes.h` for the subset of codes the processing
//! pipelines interpret.

use std::fmt;

/// The evdev event type of a record (the kernel `EV_*` class)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `EV_SYN`: synchronization markers, most importantly `SYN_REPORT`
    Syn,
    /// `EV_KEY`: keys and buttons
    Key,
    /// `EV_REL`: relative axes
    Relative,
    /// `EV_ABS`: absolute axes
    Absolute,
    /// `EV_MSC`: miscellaneous, e.g. `MSC_SERIAL`
    Misc,
    /// `EV_SW`: switches
    Switch,
}

impl EventKind {
    /// Map a raw kernel event type to its kind, if it is one this library consumes
    pub fn from_raw(ty: u16) -> Option<Self> {
        match ty {
            0x00 => Some(EventKind::Syn),
            0x01 => Some(EventKind::Key),
            0x02 => Some(EventKind::Relative),
            0x03 => Some(EventKind::Absolute),
            0x04 => Some(EventKind::Misc),
            0x05 => Some(EventKind::Switch),
            _ => None,
        }
    }
}

/// One decoded evdev record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvdevEvent {
    /// Millisecond monotonic timestamp of the kernel frame
    pub time: u64,
    /// Event class
    pub kind: EventKind,
    /// Event code within the class (`REL_X`, `BTN_LEFT`, ...)
    pub code: u16,
    /// Event value
    pub value: i32,
}

impl EvdevEvent {
    /// A `SYN_REPORT` frame terminator
    pub fn syn(time: u64) -> Self {
        EvdevEvent {
            time,
            kind: EventKind::Syn,
            code: codes::SYN_REPORT,
            value: 0,
        }
    }

    /// A key or button record
    pub fn key(time: u64, code: u16, pressed: bool) -> Self {
        EvdevEvent {
            time,
            kind: EventKind::Key,
            code,
            value: pressed as i32,
        }
    }

    /// A relative axis record
    pub fn rel(time: u64, code: u16, value: i32) -> Self {
        EvdevEvent {
            time,
            kind: EventKind::Relative,
            code,
            value,
        }
    }

    /// An absolute axis record
    pub fn abs(time: u64, code: u16, value: i32) -> Self {
        EvdevEvent {
            time,
            kind: EventKind::Absolute,
            code,
            value,
        }
    }

    /// A miscellaneous record
    pub fn msc(time: u64, code: u16, value: i32) -> Self {
        EvdevEvent {
            time,
            kind: EventKind::Misc,
            code,
            value,
        }
    }

    /// Whether this record terminates a frame
    #[inline]
    pub fn is_frame_end(&self) -> bool {
        self.kind == EventKind::Syn && self.code == codes::SYN_REPORT
    }
}

/// Range and resolution of an absolute axis, as advertised by the kernel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbsInfo {
    /// Smallest reportable value
    pub minimum: i32,
    /// Largest reportable value
    pub maximum: i32,
    /// Device units per millimeter, 0 if unknown
    pub resolution: i32,
}

impl AbsInfo {
    /// An axis spanning `0..=maximum` with the given resolution
    pub fn new(minimum: i32, maximum: i32, resolution: i32) -> Self {
        AbsInfo {
            minimum,
            maximum,
            resolution,
        }
    }

    /// Width of the range in device units
    #[inline]
    pub fn range(&self) -> f64 {
        (self.maximum - self.minimum) as f64
    }

    /// Normalize a raw value into `[0, 1]`
    pub fn normalize(&self, value: i32) -> f64 {
        if self.maximum <= self.minimum {
            return 0.0;
        }
        ((value - self.minimum) as f64 / self.range()).clamp(0.0, 1.0)
    }

    /// Scale a raw value into `[0, extent)` of some target space
    pub fn transform(&self, value: i32, extent: u32) -> f64 {
        self.normalize(value) * extent as f64
    }

    /// Convert a raw value to millimeters from the range start
    pub fn to_mm(&self, value: i32) -> f64 {
        if self.resolution > 0 {
            (value - self.minimum) as f64 / self.resolution as f64
        } else {
            (value - self.minimum) as f64
        }
    }

    /// Physical length of the whole range in millimeters, if the resolution is known
    pub fn size_mm(&self) -> Option<f64> {
        (self.resolution > 0).then(|| self.range() / self.resolution as f64)
    }
}

/// Failure modes of an [`EventSource`]
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The device vanished underneath the source (the kernel returned `ENODEV`)
    ///
    /// The owning device transitions all of its state machines to a terminal
    /// state and is removed from the context.
    #[error("the device backing this source is gone")]
    Gone,
    /// Any other read error; the current dispatch is aborted and surfaced to the caller
    #[error("failed to read from the event source")]
    Io(#[from] std::io::Error),
}

/// Per-device stream of decoded evdev records
///
/// `next_event` is called repeatedly during [`Context::dispatch`]
/// (see [`crate::context::Context::dispatch`]) until it returns `Ok(None)`,
/// which means the kernel buffer is drained for this wakeup. Implementations
/// must not block.
pub trait EventSource: fmt::Debug {
    /// Pull the next decoded record, `Ok(None)` when drained
    fn next_event(&mut self) -> Result<Option<EvdevEvent>, SourceError>;

    /// The pollable file descriptor behind this source, if it has one
    ///
    /// When present it is registered on the context's epoll so readability of
    /// the device wakes the caller; synthetic sources may return `None`.
    fn poll_fd(&self) -> Option<std::os::unix::io::BorrowedFd<'_>> {
        None
    }
}

/// Kernel event codes interpreted by the processing pipelines
///
/// Values mirror `linux/input-event-codes.h`.
#[allow(missing_docs)]
pub mod codes {
    pub const SYN_REPORT: u16 = 0x00;

    // Relative axes
    pub const REL_X: u16 = 0x00;
    pub const REL_Y: u16 = 0x01;
    pub const REL_HWHEEL: u16 = 0x06;
    pub const REL_DIAL: u16 = 0x07;
    pub const REL_WHEEL: u16 = 0x08;

    // Absolute axes
    pub const ABS_X: u16 = 0x00;
    pub const ABS_Y: u16 = 0x01;
    pub const ABS_Z: u16 = 0x02;
    pub const ABS_RX: u16 = 0x03;
    pub const ABS_RY: u16 = 0x04;
    pub const ABS_THROTTLE: u16 = 0x06;
    pub const ABS_WHEEL: u16 = 0x08;
    pub const ABS_PRESSURE: u16 = 0x18;
    pub const ABS_DISTANCE: u16 = 0x19;
    pub const ABS_TILT_X: u16 = 0x1a;
    pub const ABS_TILT_Y: u16 = 0x1b;
    pub const ABS_MISC: u16 = 0x28;
    pub const ABS_MT_SLOT: u16 = 0x2f;
    pub const ABS_MT_TOUCH_MAJOR: u16 = 0x30;
    pub const ABS_MT_POSITION_X: u16 = 0x35;
    pub const ABS_MT_POSITION_Y: u16 = 0x36;
    pub const ABS_MT_TRACKING_ID: u16 = 0x39;
    pub const ABS_MT_PRESSURE: u16 = 0x3a;

    // Miscellaneous
    pub const MSC_SERIAL: u16 = 0x00;

    // Buttons
    pub const BTN_LEFT: u16 = 0x110;
    pub const BTN_RIGHT: u16 = 0x111;
    pub const BTN_MIDDLE: u16 = 0x112;
    pub const BTN_SIDE: u16 = 0x113;
    pub const BTN_EXTRA: u16 = 0x114;

    // Tablet tools
    pub const BTN_TOOL_PEN: u16 = 0x140;
    pub const BTN_TOOL_RUBBER: u16 = 0x141;
    pub const BTN_TOOL_BRUSH: u16 = 0x142;
    pub const BTN_TOOL_PENCIL: u16 = 0x143;
    pub const BTN_TOOL_AIRBRUSH: u16 = 0x144;
    pub const BTN_TOOL_FINGER: u16 = 0x145;
    pub const BTN_TOOL_MOUSE: u16 = 0x146;
    pub const BTN_TOOL_LENS: u16 = 0x147;
    pub const BTN_TOOL_QUINTTAP: u16 = 0x148;
    pub const BTN_STYLUS3: u16 = 0x149;
    pub const BTN_TOUCH: u16 = 0x14a;
    pub const BTN_STYLUS: u16 = 0x14b;
    pub const BTN_STYLUS2: u16 = 0x14c;
    pub const BTN_TOOL_DOUBLETAP: u16 = 0x14d;
    pub const BTN_TOOL_TRIPLETAP: u16 = 0x14e;
    pub const BTN_TOOL_QUADTAP: u16 = 0x14f;

    // Pad buttons
    pub const BTN_0: u16 = 0x100;
    pub const BTN_1: u16 = 0x101;
    pub const BTN_2: u16 = 0x102;
    pub const BTN_3: u16 = 0x103;
    pub const BTN_4: u16 = 0x104;
    pub const BTN_5: u16 = 0x105;
    pub const BTN_6: u16 = 0x106;
    pub const BTN_7: u16 = 0x107;
    pub const BTN_8: u16 = 0x108;
    pub const BTN_9: u16 = 0x109;

    // Keys used by the halfkey remapper's mirror table
    pub const KEY_ESC: u16 = 1;
    pub const KEY_BACKSPACE: u16 = 14;
    pub const KEY_TAB: u16 = 15;
    pub const KEY_Q: u16 = 16;
    pub const KEY_W: u16 = 17;
    pub const KEY_E: u16 = 18;
    pub const KEY_R: u16 = 19;
    pub const KEY_T: u16 = 20;
    pub const KEY_Y: u16 = 21;
    pub const KEY_U: u16 = 22;
    pub const KEY_I: u16 = 23;
    pub const KEY_O: u16 = 24;
    pub const KEY_P: u16 = 25;
    pub const KEY_ENTER: u16 = 28;
    pub const KEY_LEFTCTRL: u16 = 29;
    pub const KEY_A: u16 = 30;
    pub const KEY_S: u16 = 31;
    pub const KEY_D: u16 = 32;
    pub const KEY_F: u16 = 33;
    pub const KEY_G: u16 = 34;
    pub const KEY_H: u16 = 35;
    pub const KEY_J: u16 = 36;
    pub const KEY_K: u16 = 37;
    pub const KEY_L: u16 = 38;
    pub const KEY_SEMICOLON: u16 = 39;
    pub const KEY_LEFTSHIFT: u16 = 42;
    pub const KEY_Z: u16 = 44;
    pub const KEY_X: u16 = 45;
    pub const KEY_C: u16 = 46;
    pub const KEY_V: u16 = 47;
    pub const KEY_B: u16 = 48;
    pub const KEY_N: u16 = 49;
    pub const KEY_M: u16 = 50;
    pub const KEY_COMMA: u16 = 51;
    pub const KEY_DOT: u16 = 52;
    pub const KEY_SLASH: u16 = 53;
    pub const KEY_RIGHTSHIFT: u16 = 54;
    pub const KEY_LEFTALT: u16 = 56;
    pub const KEY_SPACE: u16 = 57;
    pub const KEY_CAPSLOCK: u16 = 58;
    pub const KEY_RIGHTCTRL: u16 = 97;
    pub const KEY_RIGHTALT: u16 = 100;
    pub const KEY_LEFTMETA: u16 = 125;
}
