//! Devices and their registration descriptors
//!
//! A [`Device`] is created by the context from a [`DeviceInfo`] descriptor —
//! the library does not probe the kernel itself, the enumeration front end
//! (udev or explicit path-add) is the host's business. The descriptor carries
//! everything the processing pipelines need: the device class (which selects
//! the dispatcher), absolute axis ranges, slot count and the quirk flags that
//! would otherwise come from a hardware database.
//!
//! Device handles are reference counted: a handle held by the caller keeps
//! answering read queries after the device was removed from the context.

use bitflags::bitflags;
use std::sync::{Arc, Mutex};

use crate::evdev::AbsInfo;
use crate::seat::Seat;

mod config;

pub use config::{AccelProfile, ClickMethod, ConfigStatus, ScrollMethod, SendEventsMode};
pub(crate) use config::{DeviceConfig, CALIBRATION_IDENTITY};

/// Internal device key, unique per context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub(crate) u32);

bitflags! {
    /// Capability set of a device
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct DeviceCapabilities: u32 {
        /// Produces keyboard key events
        const KEYBOARD = 1 << 0;
        /// Produces pointer motion/button/axis events
        const POINTER = 1 << 1;
        /// Produces touch events
        const TOUCH = 1 << 2;
        /// Produces tablet tool events
        const TABLET_TOOL = 1 << 3;
        /// Produces button-set (pad) events
        const BUTTONSET = 1 << 4;
    }
}

/// Device class, selecting the event-processing pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    /// Keyboards; optionally run through the halfkey remapper
    Keyboard,
    /// Relative or absolute pointing devices (mice, trackpoints)
    Pointer,
    /// Direct-touch devices (touchscreens)
    Touchscreen,
    /// Indirect multitouch devices with the full gesture engine
    Touchpad,
    /// Graphics tablets with tool proximity tracking
    Tablet,
    /// Pad button-sets with rings, strips and express keys
    Buttonset,
}

impl DeviceClass {
    /// The capabilities a device of this class advertises
    pub fn capabilities(self) -> DeviceCapabilities {
        match self {
            DeviceClass::Keyboard => DeviceCapabilities::KEYBOARD,
            DeviceClass::Pointer | DeviceClass::Touchpad => DeviceCapabilities::POINTER,
            DeviceClass::Touchscreen => DeviceCapabilities::TOUCH,
            DeviceClass::Tablet => DeviceCapabilities::TABLET_TOOL,
            DeviceClass::Buttonset => DeviceCapabilities::BUTTONSET,
        }
    }
}

/// Hardware-database flags, externalized so no vendor ids live in this crate
///
/// The enumeration front end is expected to fill these from udev properties
/// or its own quirk storage.
#[derive(Debug, Clone, Copy)]
pub struct DeviceQuirks {
    /// Single physical button under the whole touchpad surface
    pub clickpad: bool,
    /// Clickpad with an additional soft-button strip at the top
    pub topbuttonpad: bool,
    /// Run the palm detector on this device
    pub palm_detection: bool,
    /// Participate in disable-while-typing
    pub dwt: bool,
    /// A trackpoint is attached next to this touchpad
    pub trackpoint_attached: bool,
}

impl Default for DeviceQuirks {
    fn default() -> Self {
        DeviceQuirks {
            clickpad: false,
            topbuttonpad: false,
            palm_detection: true,
            dwt: true,
            trackpoint_attached: false,
        }
    }
}

/// Ring/strip/button layout of a pad button-set
#[derive(Debug, Clone)]
pub struct ButtonsetInfo {
    /// Number of rings
    pub rings: u32,
    /// Number of strips
    pub strips: u32,
    /// Physical clicks per full ring revolution, if the kernel reports one
    pub ring_resolution: Option<u32>,
    /// Button codes present on the pad
    pub buttons: Vec<u16>,
}

/// Registration descriptor for a device
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Kernel sysname, e.g. `event7`; used to re-open the device at resume
    pub sysname: String,
    /// Human readable device name
    pub name: String,
    /// Physical name of the seat this device belongs to
    pub seat: String,
    /// Device class
    pub class: DeviceClass,
    /// Absolute axis ranges, keyed by `ABS_*` code
    pub abs: Vec<(u16, AbsInfo)>,
    /// Number of MT slots for touch devices
    pub slot_count: u32,
    /// Hardware resolution of relative pointing devices
    pub dpi: u32,
    /// Hardware-database flags
    pub quirks: DeviceQuirks,
    /// Pad layout for button-set devices
    pub buttonset: Option<ButtonsetInfo>,
    /// Opaque key correlating devices of one physical unit
    pub group: Option<String>,
}

impl DeviceInfo {
    fn base(sysname: &str, name: &str, class: DeviceClass) -> Self {
        DeviceInfo {
            sysname: sysname.to_owned(),
            name: name.to_owned(),
            seat: "seat0".to_owned(),
            class,
            abs: Vec::new(),
            slot_count: 0,
            dpi: 1000,
            quirks: DeviceQuirks::default(),
            buttonset: None,
            group: None,
        }
    }

    /// Descriptor for a keyboard
    pub fn keyboard(sysname: &str, name: &str) -> Self {
        Self::base(sysname, name, DeviceClass::Keyboard)
    }

    /// Descriptor for a relative pointing device
    pub fn pointer(sysname: &str, name: &str) -> Self {
        Self::base(sysname, name, DeviceClass::Pointer)
    }

    /// Descriptor for a touchpad with the given x/y ranges and slot count
    pub fn touchpad(sysname: &str, name: &str, abs_x: AbsInfo, abs_y: AbsInfo, slots: u32) -> Self {
        let mut info = Self::base(sysname, name, DeviceClass::Touchpad);
        info.abs = vec![
            (crate::evdev::codes::ABS_MT_POSITION_X, abs_x),
            (crate::evdev::codes::ABS_MT_POSITION_Y, abs_y),
        ];
        info.slot_count = slots;
        info
    }

    /// Descriptor for a touchscreen with the given x/y ranges and slot count
    pub fn touchscreen(sysname: &str, name: &str, abs_x: AbsInfo, abs_y: AbsInfo, slots: u32) -> Self {
        let mut info = Self::base(sysname, name, DeviceClass::Touchscreen);
        info.abs = vec![
            (crate::evdev::codes::ABS_MT_POSITION_X, abs_x),
            (crate::evdev::codes::ABS_MT_POSITION_Y, abs_y),
        ];
        info.slot_count = slots;
        info
    }

    /// Descriptor for a tablet; axis ranges beyond x/y are added via [`DeviceInfo::with_abs`]
    pub fn tablet(sysname: &str, name: &str, abs_x: AbsInfo, abs_y: AbsInfo) -> Self {
        let mut info = Self::base(sysname, name, DeviceClass::Tablet);
        info.abs = vec![
            (crate::evdev::codes::ABS_X, abs_x),
            (crate::evdev::codes::ABS_Y, abs_y),
        ];
        info
    }

    /// Descriptor for a pad button-set
    pub fn buttonset(sysname: &str, name: &str, layout: ButtonsetInfo) -> Self {
        let mut info = Self::base(sysname, name, DeviceClass::Buttonset);
        info.buttonset = Some(layout);
        info
    }

    /// Add an absolute axis range
    pub fn with_abs(mut self, code: u16, info: AbsInfo) -> Self {
        self.abs.retain(|(c, _)| *c != code);
        self.abs.push((code, info));
        self
    }

    /// Set the seat this device belongs to
    pub fn on_seat(mut self, seat: &str) -> Self {
        self.seat = seat.to_owned();
        self
    }

    /// Set the quirk flags
    pub fn with_quirks(mut self, quirks: DeviceQuirks) -> Self {
        self.quirks = quirks;
        self
    }

    /// Set the physical-unit group key
    pub fn in_group(mut self, group: &str) -> Self {
        self.group = Some(group.to_owned());
        self
    }

    /// Look up an absolute axis range
    pub fn abs_info(&self, code: u16) -> Option<AbsInfo> {
        self.abs.iter().find(|(c, _)| *c == code).map(|(_, i)| *i)
    }

    /// Physical width and height in mm, when the x/y resolutions are known
    pub fn size_mm(&self) -> Option<(f64, f64)> {
        let (x, y) = match self.class {
            DeviceClass::Touchpad | DeviceClass::Touchscreen => (
                self.abs_info(crate::evdev::codes::ABS_MT_POSITION_X)?,
                self.abs_info(crate::evdev::codes::ABS_MT_POSITION_Y)?,
            ),
            _ => (
                self.abs_info(crate::evdev::codes::ABS_X)?,
                self.abs_info(crate::evdev::codes::ABS_Y)?,
            ),
        };
        Some((x.size_mm()?, y.size_mm()?))
    }
}

#[derive(Debug)]
struct GroupRc;

/// Opaque set of devices that physically belong together
///
/// For example a tablet pen device and its pad device. Groups exist only so
/// external code can correlate devices; they compare by identity and live as
/// long as their last member.
#[derive(Debug, Clone)]
pub struct DeviceGroup {
    rc: Arc<GroupRc>,
}

impl DeviceGroup {
    pub(crate) fn new() -> Self {
        DeviceGroup { rc: Arc::new(GroupRc) }
    }
}

impl PartialEq for DeviceGroup {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.rc, &other.rc)
    }
}

impl Eq for DeviceGroup {}

#[derive(Debug)]
pub(crate) struct DeviceState {
    pub(crate) alive: bool,
    pub(crate) config: DeviceConfig,
}

#[derive(Debug)]
pub(crate) struct DeviceRc {
    pub(crate) id: DeviceId,
    pub(crate) info: DeviceInfo,
    pub(crate) seat: Seat,
    pub(crate) group: DeviceGroup,
    pub(crate) state: Mutex<DeviceState>,
}

/// Handle to a device known to the context
///
/// Handles can be cloned and compare equal when they refer to the same device
/// record. A re-seated device is destroyed and a new device created, so two
/// handles obtained before and after re-seating are not equal even though
/// they name the same hardware.
#[derive(Debug, Clone)]
pub struct Device {
    pub(crate) rc: Arc<DeviceRc>,
}

impl Device {
    pub(crate) fn new(id: DeviceId, info: DeviceInfo, seat: Seat, group: DeviceGroup) -> Self {
        let config = DeviceConfig::for_info(&info);
        Device {
            rc: Arc::new(DeviceRc {
                id,
                info,
                seat,
                group,
                state: Mutex::new(DeviceState { alive: true, config }),
            }),
        }
    }

    pub(crate) fn id(&self) -> DeviceId {
        self.rc.id
    }

    /// Kernel sysname of the device
    pub fn sysname(&self) -> &str {
        &self.rc.info.sysname
    }

    /// Human readable name of the device
    pub fn name(&self) -> &str {
        &self.rc.info.name
    }

    /// The seat this device belongs to
    pub fn seat(&self) -> Seat {
        self.rc.seat.clone()
    }

    /// The group of devices this device physically belongs to
    pub fn device_group(&self) -> DeviceGroup {
        self.rc.group.clone()
    }

    /// The capability set of this device
    pub fn capabilities(&self) -> DeviceCapabilities {
        self.rc.info.class.capabilities()
    }

    /// Whether the device has the given capability
    pub fn has_capability(&self, cap: DeviceCapabilities) -> bool {
        self.capabilities().contains(cap)
    }

    /// Whether the device is still part of its context
    ///
    /// Read queries keep working on dead handles; configuration calls return
    /// [`ConfigStatus::Unsupported`].
    pub fn alive(&self) -> bool {
        self.rc.state.lock().unwrap().alive
    }

    pub(crate) fn mark_dead(&self) {
        self.rc.state.lock().unwrap().alive = false;
    }

    pub(crate) fn class(&self) -> DeviceClass {
        self.rc.info.class
    }

    pub(crate) fn info(&self) -> &DeviceInfo {
        &self.rc.info
    }

    pub(crate) fn config(&self) -> DeviceConfig {
        self.rc.state.lock().unwrap().config.clone()
    }

    pub(crate) fn with_config<R>(&self, f: impl FnOnce(&mut DeviceConfig) -> R) -> R {
        f(&mut self.rc.state.lock().unwrap().config)
    }
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.rc, &other.rc)
    }
}

impl Eq for Device {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_capabilities() {
        assert!(DeviceClass::Touchpad
            .capabilities()
            .contains(DeviceCapabilities::POINTER));
        assert!(DeviceClass::Touchscreen
            .capabilities()
            .contains(DeviceCapabilities::TOUCH));
        assert!(!DeviceClass::Keyboard
            .capabilities()
            .contains(DeviceCapabilities::POINTER));
    }

    #[test]
    fn abs_lookup_and_size() {
        let info = DeviceInfo::touchpad(
            "event5",
            "test pad",
            AbsInfo::new(0, 1000, 10),
            AbsInfo::new(0, 600, 10),
            5,
        );
        assert_eq!(
            info.abs_info(crate::evdev::codes::ABS_MT_POSITION_X),
            Some(AbsInfo::new(0, 1000, 10))
        );
        assert_eq!(info.size_mm(), Some((100.0, 60.0)));
    }
}
