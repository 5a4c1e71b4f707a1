//! The outbound semantic event stream
//!
//! Dispatching one kernel frame may emit zero or more of these events into the
//! context queue; the consumer drains them with
//! [`Context::next_event`](crate::context::Context::next_event) until empty.
//! Each input event carries the originating [`Device`] and the millisecond
//! monotonic timestamp of the kernel frame's `SYN_REPORT`.

use crate::device::Device;
use crate::evdev::AbsInfo;

pub mod tablet;

pub use self::tablet::{
    TabletToolAxisEvent, TabletToolButtonEvent, TabletToolProximityEvent, TabletToolTipEvent,
};

/// State of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyState {
    /// Key is released
    Released,
    /// Key is pressed
    Pressed,
}

/// State of a button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonState {
    /// Button is released
    Released,
    /// Button is pressed
    Pressed,
}

/// Direction of a scroll axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Vertical scrolling
    Vertical,
    /// Horizontal scrolling
    Horizontal,
}

/// Source of a scroll axis event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisSource {
    /// A physical wheel with detents
    Wheel,
    /// Fingers on a touch surface
    Finger,
    /// Continuous motion converted to scrolling, e.g. button-hold scrolling
    Continuous,
}

/// The axis subdevice of a button-set (pad) axis event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonsetAxis {
    /// A circular absolute controller
    Ring {
        /// Index of the ring on the pad
        index: u32,
    },
    /// A linear absolute controller
    Strip {
        /// Index of the strip on the pad
        index: u32,
    },
}

/// A key was pressed or released on a keyboard device
#[derive(Debug, Clone)]
pub struct KeyboardKeyEvent {
    /// Originating device
    pub device: Device,
    /// Frame timestamp in milliseconds
    pub time: u64,
    /// Kernel key code, passed through untranslated
    pub code: u32,
    /// New state of the key
    pub state: KeyState,
    /// Number of keys of this code currently pressed across the whole seat,
    /// counted after this event was applied
    pub seat_key_count: u32,
}

/// The pointer moved by an accelerated delta
#[derive(Debug, Clone)]
pub struct PointerMotionEvent {
    /// Originating device
    pub device: Device,
    /// Frame timestamp in milliseconds
    pub time: u64,
    /// Accelerated horizontal delta
    pub dx: f64,
    /// Accelerated vertical delta
    pub dy: f64,
    /// Horizontal delta before acceleration, in device-normalized units
    pub dx_unaccel: f64,
    /// Vertical delta before acceleration, in device-normalized units
    pub dy_unaccel: f64,
}

/// An absolute pointing device reported a new position
#[derive(Debug, Clone)]
pub struct PointerMotionAbsoluteEvent {
    /// Originating device
    pub device: Device,
    /// Frame timestamp in milliseconds
    pub time: u64,
    /// Horizontal position in device coordinates
    pub x: f64,
    /// Vertical position in device coordinates
    pub y: f64,
    pub(crate) abs_x: AbsInfo,
    pub(crate) abs_y: AbsInfo,
}

impl PointerMotionAbsoluteEvent {
    /// Horizontal position scaled into `[0, width)`
    pub fn x_transformed(&self, width: u32) -> f64 {
        self.abs_x.transform(self.x as i32, width)
    }

    /// Vertical position scaled into `[0, height)`
    pub fn y_transformed(&self, height: u32) -> f64 {
        self.abs_y.transform(self.y as i32, height)
    }
}

/// A pointer button changed state
#[derive(Debug, Clone)]
pub struct PointerButtonEvent {
    /// Originating device
    pub device: Device,
    /// Frame timestamp in milliseconds
    pub time: u64,
    /// Kernel button code (`BTN_LEFT`, ...)
    pub button: u32,
    /// New state of the button
    pub state: ButtonState,
    /// Number of buttons of this code currently pressed across the whole
    /// seat, counted after this event was applied
    pub seat_button_count: u32,
}

/// Scroll motion along one axis
///
/// A `value` of exactly `0.0` with source [`AxisSource::Finger`] or
/// [`AxisSource::Continuous`] signals the end of a scroll sequence.
#[derive(Debug, Clone)]
pub struct PointerAxisEvent {
    /// Originating device
    pub device: Device,
    /// Frame timestamp in milliseconds
    pub time: u64,
    /// Scrolled axis
    pub axis: Axis,
    /// Scroll value; degrees of wheel rotation for wheels, motion-equivalent
    /// units for finger and continuous sources
    pub value: f64,
    /// What generated this scroll
    pub source: AxisSource,
}

/// A new touch appeared on a touch device
#[derive(Debug, Clone)]
pub struct TouchDownEvent {
    /// Originating device
    pub device: Device,
    /// Frame timestamp in milliseconds
    pub time: u64,
    /// Device-local slot of the touch
    pub slot: u32,
    /// Seat-wide dense slot, stable for the lifetime of the touch
    pub seat_slot: u32,
    /// Horizontal position in device coordinates
    pub x: f64,
    /// Vertical position in device coordinates
    pub y: f64,
    pub(crate) abs_x: AbsInfo,
    pub(crate) abs_y: AbsInfo,
}

impl TouchDownEvent {
    /// Horizontal position scaled into `[0, width)`
    pub fn x_transformed(&self, width: u32) -> f64 {
        self.abs_x.transform(self.x as i32, width)
    }

    /// Vertical position scaled into `[0, height)`
    pub fn y_transformed(&self, height: u32) -> f64 {
        self.abs_y.transform(self.y as i32, height)
    }
}

/// A touch changed position
#[derive(Debug, Clone)]
pub struct TouchMotionEvent {
    /// Originating device
    pub device: Device,
    /// Frame timestamp in milliseconds
    pub time: u64,
    /// Device-local slot of the touch
    pub slot: u32,
    /// Seat-wide dense slot, stable for the lifetime of the touch
    pub seat_slot: u32,
    /// Horizontal position in device coordinates
    pub x: f64,
    /// Vertical position in device coordinates
    pub y: f64,
    pub(crate) abs_x: AbsInfo,
    pub(crate) abs_y: AbsInfo,
}

impl TouchMotionEvent {
    /// Horizontal position scaled into `[0, width)`
    pub fn x_transformed(&self, width: u32) -> f64 {
        self.abs_x.transform(self.x as i32, width)
    }

    /// Vertical position scaled into `[0, height)`
    pub fn y_transformed(&self, height: u32) -> f64 {
        self.abs_y.transform(self.y as i32, height)
    }
}

/// A touch lifted
#[derive(Debug, Clone)]
pub struct TouchUpEvent {
    /// Originating device
    pub device: Device,
    /// Frame timestamp in milliseconds
    pub time: u64,
    /// Device-local slot of the touch
    pub slot: u32,
    /// Seat-wide dense slot the touch held
    pub seat_slot: u32,
}

/// A touch sequence was cancelled by the device or the library
///
/// Consumers must discard the whole sequence rather than treat this as an up.
#[derive(Debug, Clone)]
pub struct TouchCancelEvent {
    /// Originating device
    pub device: Device,
    /// Frame timestamp in milliseconds
    pub time: u64,
    /// Device-local slot of the touch
    pub slot: u32,
    /// Seat-wide dense slot the touch held
    pub seat_slot: u32,
}

/// End of a touch frame; the touch state published since the last frame is
/// now consistent and may be acted upon
#[derive(Debug, Clone)]
pub struct TouchFrameEvent {
    /// Originating device
    pub device: Device,
    /// Frame timestamp in milliseconds
    pub time: u64,
}

/// A button on a pad button-set changed state
#[derive(Debug, Clone)]
pub struct ButtonsetButtonEvent {
    /// Originating device
    pub device: Device,
    /// Frame timestamp in milliseconds
    pub time: u64,
    /// Kernel button code on the pad
    pub button: u32,
    /// New state of the button
    pub state: ButtonState,
}

/// A ring or strip on a pad button-set moved
#[derive(Debug, Clone)]
pub struct ButtonsetAxisEvent {
    /// Originating device
    pub device: Device,
    /// Frame timestamp in milliseconds
    pub time: u64,
    /// Which controller moved
    pub axis: ButtonsetAxis,
    /// Absolute position: `[0, 1)` clockwise from logical north for rings,
    /// `[0, 1]` for strips
    pub position: f64,
    /// Signed change since the previous reading; rings take the shortest way
    /// around the wrap, a fresh strip touch reports `0.0`
    pub delta: f64,
    /// Ring movement in physical wheel clicks, when the ring has a known
    /// click resolution
    pub delta_discrete: Option<i32>,
}

/// A multi-finger swipe gesture began
#[derive(Debug, Clone)]
pub struct GestureSwipeBeginEvent {
    /// Originating device
    pub device: Device,
    /// Frame timestamp in milliseconds
    pub time: u64,
    /// Number of fingers in the gesture
    pub fingers: u32,
}

/// The fingers of a swipe gesture moved
#[derive(Debug, Clone)]
pub struct GestureSwipeUpdateEvent {
    /// Originating device
    pub device: Device,
    /// Frame timestamp in milliseconds
    pub time: u64,
    /// Horizontal centroid movement
    pub dx: f64,
    /// Vertical centroid movement
    pub dy: f64,
}

/// A swipe gesture ended
#[derive(Debug, Clone)]
pub struct GestureSwipeEndEvent {
    /// Originating device
    pub device: Device,
    /// Frame timestamp in milliseconds
    pub time: u64,
    /// The gesture was interrupted (device removal, suspend) rather than
    /// finished by lifting the fingers
    pub cancelled: bool,
}

/// A multi-finger pinch gesture began
#[derive(Debug, Clone)]
pub struct GesturePinchBeginEvent {
    /// Originating device
    pub device: Device,
    /// Frame timestamp in milliseconds
    pub time: u64,
    /// Number of fingers in the gesture
    pub fingers: u32,
}

/// The fingers of a pinch gesture moved
#[derive(Debug, Clone)]
pub struct GesturePinchUpdateEvent {
    /// Originating device
    pub device: Device,
    /// Frame timestamp in milliseconds
    pub time: u64,
    /// Horizontal centroid movement
    pub dx: f64,
    /// Vertical centroid movement
    pub dy: f64,
    /// Absolute scale relative to the start of the gesture
    pub scale: f64,
    /// Rotation in degrees since the previous update, clockwise
    pub rotation: f64,
}

/// A pinch gesture ended
#[derive(Debug, Clone)]
pub struct GesturePinchEndEvent {
    /// Originating device
    pub device: Device,
    /// Frame timestamp in milliseconds
    pub time: u64,
    /// The gesture was interrupted rather than finished
    pub cancelled: bool,
}

/// An event from the library, pulled off the context queue
#[derive(Debug, Clone)]
pub enum Event {
    /// A device was added to the context and may now be configured
    DeviceAdded {
        /// The new device
        device: Device,
    },
    /// A device was removed; all its gesture state was force-released before this event
    DeviceRemoved {
        /// The removed device; read queries on held references keep working
        device: Device,
    },
    /// See [`KeyboardKeyEvent`]
    Keyboard {
        /// Event payload
        event: KeyboardKeyEvent,
    },
    /// See [`PointerMotionEvent`]
    PointerMotion {
        /// Event payload
        event: PointerMotionEvent,
    },
    /// See [`PointerMotionAbsoluteEvent`]
    PointerMotionAbsolute {
        /// Event payload
        event: PointerMotionAbsoluteEvent,
    },
    /// See [`PointerButtonEvent`]
    PointerButton {
        /// Event payload
        event: PointerButtonEvent,
    },
    /// See [`PointerAxisEvent`]
    PointerAxis {
        /// Event payload
        event: PointerAxisEvent,
    },
    /// See [`TouchDownEvent`]
    TouchDown {
        /// Event payload
        event: TouchDownEvent,
    },
    /// See [`TouchMotionEvent`]
    TouchMotion {
        /// Event payload
        event: TouchMotionEvent,
    },
    /// See [`TouchUpEvent`]
    TouchUp {
        /// Event payload
        event: TouchUpEvent,
    },
    /// See [`TouchCancelEvent`]
    TouchCancel {
        /// Event payload
        event: TouchCancelEvent,
    },
    /// See [`TouchFrameEvent`]
    TouchFrame {
        /// Event payload
        event: TouchFrameEvent,
    },
    /// See [`TabletToolAxisEvent`]
    TabletToolAxis {
        /// Event payload
        event: TabletToolAxisEvent,
    },
    /// See [`TabletToolProximityEvent`]
    TabletToolProximity {
        /// Event payload
        event: TabletToolProximityEvent,
    },
    /// See [`TabletToolTipEvent`]
    TabletToolTip {
        /// Event payload
        event: TabletToolTipEvent,
    },
    /// See [`TabletToolButtonEvent`]
    TabletToolButton {
        /// Event payload
        event: TabletToolButtonEvent,
    },
    /// See [`GestureSwipeBeginEvent`]
    GestureSwipeBegin {
        /// Event payload
        event: GestureSwipeBeginEvent,
    },
    /// See [`GestureSwipeUpdateEvent`]
    GestureSwipeUpdate {
        /// Event payload
        event: GestureSwipeUpdateEvent,
    },
    /// See [`GestureSwipeEndEvent`]
    GestureSwipeEnd {
        /// Event payload
        event: GestureSwipeEndEvent,
    },
    /// See [`GesturePinchBeginEvent`]
    GesturePinchBegin {
        /// Event payload
        event: GesturePinchBeginEvent,
    },
    /// See [`GesturePinchUpdateEvent`]
    GesturePinchUpdate {
        /// Event payload
        event: GesturePinchUpdateEvent,
    },
    /// See [`GesturePinchEndEvent`]
    GesturePinchEnd {
        /// Event payload
        event: GesturePinchEndEvent,
    },
    /// See [`ButtonsetButtonEvent`]
    ButtonsetButton {
        /// Event payload
        event: ButtonsetButtonEvent,
    },
    /// See [`ButtonsetAxisEvent`]
    ButtonsetAxis {
        /// Event payload
        event: ButtonsetAxisEvent,
    },
}

impl Event {
    /// The device this event originated from, if it is an input event
    pub fn device(&self) -> Option<&Device> {
        match self {
            Event::DeviceAdded { device } | Event::DeviceRemoved { device } => Some(device),
            Event::Keyboard { event } => Some(&event.device),
            Event::PointerMotion { event } => Some(&event.device),
            Event::PointerMotionAbsolute { event } => Some(&event.device),
            Event::PointerButton { event } => Some(&event.device),
            Event::PointerAxis { event } => Some(&event.device),
            Event::TouchDown { event } => Some(&event.device),
            Event::TouchMotion { event } => Some(&event.device),
            Event::TouchUp { event } => Some(&event.device),
            Event::TouchCancel { event } => Some(&event.device),
            Event::TouchFrame { event } => Some(&event.device),
            Event::TabletToolAxis { event } => Some(&event.device),
            Event::TabletToolProximity { event } => Some(&event.device),
            Event::TabletToolTip { event } => Some(&event.device),
            Event::TabletToolButton { event } => Some(&event.device),
            Event::GestureSwipeBegin { event } => Some(&event.device),
            Event::GestureSwipeUpdate { event } => Some(&event.device),
            Event::GestureSwipeEnd { event } => Some(&event.device),
            Event::GesturePinchBegin { event } => Some(&event.device),
            Event::GesturePinchUpdate { event } => Some(&event.device),
            Event::GesturePinchEnd { event } => Some(&event.device),
            Event::ButtonsetButton { event } => Some(&event.device),
            Event::ButtonsetAxis { event } => Some(&event.device),
        }
    }
}
