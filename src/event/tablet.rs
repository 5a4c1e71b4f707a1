//! Tablet tool events and the tool vocabulary
//!
//! A [`TabletTool`] describes the physical pen, eraser or puck currently (or
//! previously) in proximity of a tablet. Tools with a hardware serial number
//! are shared across every tablet on the same context, so the same physical
//! pen resolves to the same [`TabletTool`] wherever it shows up; serial-less
//! tools are scoped to the tablet that saw them.

use bitflags::bitflags;
use std::sync::Arc;

use crate::device::Device;
use crate::event::ButtonState;

/// Describes the physical type of tool. The physical type of tool generally
/// defines its base usage.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum TabletToolType {
    /// A generic pen.
    Pen,
    /// Eraser
    Eraser,
    /// A paintbrush-like tool.
    Brush,
    /// Physical drawing tool, e.g. Wacom Inking Pen
    Pencil,
    /// An airbrush-like tool.
    Airbrush,
    /// A finger on a tablet surface.
    Finger,
    /// A mouse bound to the tablet.
    Mouse,
    /// A mouse tool with a lens.
    Lens,
}

bitflags! {
    /// Extra axis capabilities of a tablet tool.
    ///
    /// Any tool provides x and y values; everything else is tool-specific.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ToolCapabilities: u32 {
        /// Tilt axes
        const TILT = 1 << 0;
        /// Pressure axis
        const PRESSURE = 1 << 1;
        /// Distance axis
        const DISTANCE = 1 << 2;
        /// Z-rotation axis
        const ROTATION = 1 << 3;
        /// Slider axis
        const SLIDER = 1 << 4;
        /// Relative wheel
        const WHEEL = 1 << 5;
    }
}

bitflags! {
    /// Set of tablet axes that changed within one frame.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct AxisMask: u32 {
        /// Horizontal position
        const X = 1 << 0;
        /// Vertical position
        const Y = 1 << 1;
        /// Tip pressure
        const PRESSURE = 1 << 2;
        /// Hover distance
        const DISTANCE = 1 << 3;
        /// Tilt around the x axis
        const TILT_X = 1 << 4;
        /// Tilt around the y axis
        const TILT_Y = 1 << 5;
        /// Slider position
        const SLIDER = 1 << 6;
        /// Rotation around the tool's own axis
        const ROTATION_Z = 1 << 7;
        /// Relative wheel
        const REL_WHEEL = 1 << 8;
    }
}

/// Snapshot of every tablet axis at one point in time
///
/// Pressure, distance and slider are normalized to `[0, 1]`, tilt to
/// `[-1, 1]`, x/y are in device units, rotation in degrees clockwise from the
/// tool's logical neutral position and the wheel is a delta in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AxisSnapshot {
    /// Horizontal position in device units
    pub x: f64,
    /// Vertical position in device units
    pub y: f64,
    /// Normalized tip pressure
    pub pressure: f64,
    /// Normalized hover distance
    pub distance: f64,
    /// Normalized tilt around the x axis
    pub tilt_x: f64,
    /// Normalized tilt around the y axis
    pub tilt_y: f64,
    /// Normalized slider position
    pub slider: f64,
    /// Rotation in degrees
    pub rotation: f64,
    /// Wheel delta in degrees
    pub wheel: f64,
}

/// Whether a tool is within the tablet's detection range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProximityState {
    /// Out of proximity
    Out,
    /// In proximity
    In,
}

/// Whether the tool tip touches the tablet surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TipState {
    /// Not touching the surface
    Up,
    /// Touching the surface
    Down,
}

#[derive(Debug)]
pub(crate) struct ToolInner {
    pub(crate) tool_type: TabletToolType,
    pub(crate) tool_id: u64,
    pub(crate) serial: u64,
    pub(crate) capabilities: ToolCapabilities,
    pub(crate) buttons: Vec<u16>,
}

/// Handle to a physical tablet tool
///
/// Handles compare equal when they refer to the same physical tool; a handle
/// stays valid (for read queries) as long as the caller holds it, even after
/// the tool left proximity or its tablet was removed.
#[derive(Debug, Clone)]
pub struct TabletTool {
    pub(crate) inner: Arc<ToolInner>,
}

impl TabletTool {
    pub(crate) fn new(
        tool_type: TabletToolType,
        tool_id: u64,
        serial: u64,
        capabilities: ToolCapabilities,
        buttons: Vec<u16>,
    ) -> Self {
        TabletTool {
            inner: Arc::new(ToolInner {
                tool_type,
                tool_id,
                serial,
                capabilities,
                buttons,
            }),
        }
    }

    /// The physical type of this tool
    pub fn tool_type(&self) -> TabletToolType {
        self.inner.tool_type
    }

    /// The hardware tool id, 0 if the tablet does not report one
    pub fn tool_id(&self) -> u64 {
        self.inner.tool_id
    }

    /// The hardware serial number, 0 for tools without one
    ///
    /// Tools with a nonzero serial are tracked across all tablets on the
    /// context.
    pub fn serial(&self) -> u64 {
        self.inner.serial
    }

    /// Axis capabilities beyond x/y
    pub fn capabilities(&self) -> ToolCapabilities {
        self.inner.capabilities
    }

    /// Whether this tool has the given axis capability
    pub fn has_capability(&self, cap: ToolCapabilities) -> bool {
        self.inner.capabilities.contains(cap)
    }

    /// The stylus button codes this tool can report
    pub fn buttons(&self) -> &[u16] {
        &self.inner.buttons
    }
}

impl PartialEq for TabletTool {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for TabletTool {}

/// One or more tablet axes changed while the tool was in proximity
#[derive(Debug, Clone)]
pub struct TabletToolAxisEvent {
    /// Originating device
    pub device: Device,
    /// Frame timestamp in milliseconds
    pub time: u64,
    /// The tool that moved
    pub tool: TabletTool,
    /// Which axes changed in this frame
    pub changed: AxisMask,
    /// Current value of every axis
    pub axes: AxisSnapshot,
    /// Difference from the previous frame, for the changed axes
    pub deltas: AxisSnapshot,
    /// Wheel movement in discrete clicks
    pub wheel_discrete: i32,
}

/// A tool entered or left the tablet's detection range
///
/// Proximity-in carries a full snapshot of the axes at entry; after
/// proximity-out the tool no longer generates events.
#[derive(Debug, Clone)]
pub struct TabletToolProximityEvent {
    /// Originating device
    pub device: Device,
    /// Frame timestamp in milliseconds
    pub time: u64,
    /// The tool that changed proximity
    pub tool: TabletTool,
    /// The new proximity state
    pub state: ProximityState,
    /// Which axes have values at entry
    pub changed: AxisMask,
    /// Current value of every axis
    pub axes: AxisSnapshot,
}

/// The tool tip touched or left the tablet surface
#[derive(Debug, Clone)]
pub struct TabletToolTipEvent {
    /// Originating device
    pub device: Device,
    /// Frame timestamp in milliseconds
    pub time: u64,
    /// The tool whose tip changed state
    pub tool: TabletTool,
    /// The new tip state
    pub state: TipState,
    /// Axes that changed in the same frame
    pub changed: AxisMask,
    /// Current value of every axis
    pub axes: AxisSnapshot,
}

/// A stylus button changed state
#[derive(Debug, Clone)]
pub struct TabletToolButtonEvent {
    /// Originating device
    pub device: Device,
    /// Frame timestamp in milliseconds
    pub time: u64,
    /// The tool the button belongs to
    pub tool: TabletTool,
    /// Kernel button code (`BTN_STYLUS`, ...)
    pub button: u32,
    /// New state of the button
    pub state: ButtonState,
    /// Seat-wide pressed count for this code after the event
    pub seat_button_count: u32,
}
