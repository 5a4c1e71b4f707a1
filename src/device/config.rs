//! Per-device configuration surface
//!
//! Every option exposes the same quintet: is-available, get-current,
//! get-default, set and reset. `set` validates synchronously and never leaves
//! partial state behind; options that cannot apply mid-gesture record the
//! wanted value and the owning dispatcher applies it at the next
//! gesture-neutral point (a tablet applies left-handed only while the tool is
//! out of proximity, a click-method change waits for the running
//! press/release cycle, the halfkey remapper waits for an empty key bitmap).

use crate::device::{Device, DeviceClass, DeviceInfo};
use crate::evdev::codes;

/// Result of a configuration `set` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigStatus {
    /// The value was accepted
    Success,
    /// The device does not support this option
    Unsupported,
    /// The value is outside the accepted range
    Invalid,
}

/// Scroll method of a pointing device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollMethod {
    /// No scrolling
    NoScroll,
    /// Two fingers on a touchpad
    TwoFinger,
    /// Single finger on the touchpad edge
    Edge,
    /// Motion while the scroll button is held
    OnButtonDown,
}

/// Click method of a clickpad
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickMethod {
    /// Physical clicks only, no software interpretation
    None,
    /// Software button regions at the bottom (and top) of the pad
    ButtonAreas,
    /// Button chosen by the number of fingers on the pad
    Clickfinger,
}

/// Whether the device delivers events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendEventsMode {
    /// Events are processed normally
    Enabled,
    /// The device is muted; pending buttons and touches were released
    Disabled,
}

/// Pointer acceleration profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccelProfile {
    /// Flat-then-linear curve used for touchpads, driven by the speed setting
    Linear,
    /// Piecewise-smoothed curve for variable-dpi pointer devices
    SmoothSimple,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct LeftHandedState {
    pub(crate) current: bool,
    pub(crate) wanted: bool,
}

/// Identity calibration matrix
pub(crate) const CALIBRATION_IDENTITY: [f32; 6] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0];

#[derive(Debug, Clone)]
pub(crate) struct DeviceConfig {
    pub(crate) tap_available: bool,
    pub(crate) tap_enabled: bool,
    pub(crate) tap_default: bool,
    pub(crate) tap_finger_count: u32,

    pub(crate) left_handed_available: bool,
    pub(crate) left_handed: LeftHandedState,

    pub(crate) natural_scroll_available: bool,
    pub(crate) natural_scroll: bool,

    pub(crate) scroll_methods: &'static [ScrollMethod],
    pub(crate) scroll_method: ScrollMethod,
    pub(crate) scroll_method_default: ScrollMethod,
    pub(crate) scroll_button: u32,

    pub(crate) click_methods: &'static [ClickMethod],
    pub(crate) click_method: ClickMethod,
    pub(crate) click_method_wanted: ClickMethod,
    pub(crate) click_method_default: ClickMethod,

    pub(crate) send_events: SendEventsMode,

    pub(crate) rotation_available: bool,
    pub(crate) rotation: u32,

    pub(crate) accel_available: bool,
    pub(crate) accel_speed: f64,
    pub(crate) accel_profile: AccelProfile,
    pub(crate) accel_profile_default: AccelProfile,

    pub(crate) dwt_available: bool,
    pub(crate) dwt_enabled: bool,

    pub(crate) halfkey_available: bool,
    pub(crate) halfkey_wanted: bool,

    pub(crate) calibration_available: bool,
    pub(crate) calibration: [f32; 6],

    pub(crate) middle_emulation_available: bool,
    pub(crate) middle_emulation: bool,
}

impl DeviceConfig {
    pub(crate) fn for_info(info: &DeviceInfo) -> Self {
        let class = info.class;
        let touchpad = class == DeviceClass::Touchpad;
        let pointer = class == DeviceClass::Pointer;

        let scroll_methods: &'static [ScrollMethod] = match class {
            DeviceClass::Touchpad => {
                if info.slot_count >= 2 {
                    &[ScrollMethod::NoScroll, ScrollMethod::TwoFinger, ScrollMethod::Edge]
                } else {
                    &[ScrollMethod::NoScroll, ScrollMethod::Edge]
                }
            }
            DeviceClass::Pointer => &[ScrollMethod::NoScroll, ScrollMethod::OnButtonDown],
            _ => &[],
        };
        let scroll_method_default = match class {
            DeviceClass::Touchpad if info.slot_count >= 2 => ScrollMethod::TwoFinger,
            DeviceClass::Touchpad => ScrollMethod::Edge,
            _ => ScrollMethod::NoScroll,
        };

        let click_methods: &'static [ClickMethod] = if touchpad && info.quirks.clickpad {
            &[ClickMethod::None, ClickMethod::ButtonAreas, ClickMethod::Clickfinger]
        } else {
            &[]
        };
        let click_method_default = if touchpad && info.quirks.clickpad {
            ClickMethod::ButtonAreas
        } else {
            ClickMethod::None
        };

        let accel_profile_default = if touchpad {
            AccelProfile::Linear
        } else {
            AccelProfile::SmoothSimple
        };

        DeviceConfig {
            tap_available: touchpad,
            tap_enabled: false,
            tap_default: false,
            tap_finger_count: if touchpad { info.slot_count.min(3) } else { 0 },

            left_handed_available: touchpad || pointer || class == DeviceClass::Tablet,
            left_handed: LeftHandedState::default(),

            natural_scroll_available: touchpad || pointer,
            natural_scroll: false,

            scroll_methods,
            scroll_method: scroll_method_default,
            scroll_method_default,
            scroll_button: codes::BTN_MIDDLE as u32,

            click_methods,
            click_method: click_method_default,
            click_method_wanted: click_method_default,
            click_method_default,

            send_events: SendEventsMode::Enabled,

            rotation_available: class == DeviceClass::Buttonset,
            rotation: 0,

            accel_available: touchpad || pointer,
            accel_speed: 0.0,
            accel_profile: accel_profile_default,
            accel_profile_default,

            dwt_available: touchpad && info.quirks.dwt,
            dwt_enabled: touchpad && info.quirks.dwt,

            halfkey_available: class == DeviceClass::Keyboard,
            halfkey_wanted: false,

            calibration_available: matches!(class, DeviceClass::Touchscreen | DeviceClass::Tablet),
            calibration: CALIBRATION_IDENTITY,

            middle_emulation_available: pointer,
            middle_emulation: false,
        }
    }
}

macro_rules! config_guard {
    ($self:ident, $field:ident) => {
        if !$self.alive() || !$self.config().$field {
            return ConfigStatus::Unsupported;
        }
    };
}

/// Configuration accessors
///
/// Every `set` call returns a [`ConfigStatus`]; getters on unsupported
/// options return the neutral default.
impl Device {
    /// Whether tap-to-click is supported
    pub fn config_tap_is_available(&self) -> bool {
        self.config().tap_available
    }

    /// Number of fingers that can generate distinct tap buttons (read-only)
    pub fn config_tap_finger_count(&self) -> u32 {
        self.config().tap_finger_count
    }

    /// Whether tapping is currently enabled
    pub fn config_tap_enabled(&self) -> bool {
        self.config().tap_enabled
    }

    /// Whether tapping is enabled by default
    pub fn config_tap_default(&self) -> bool {
        self.config().tap_default
    }

    /// Enable or disable tap-to-click
    pub fn config_tap_set_enabled(&self, enabled: bool) -> ConfigStatus {
        config_guard!(self, tap_available);
        self.with_config(|c| c.tap_enabled = enabled);
        ConfigStatus::Success
    }

    /// Reset tapping to its default
    pub fn config_tap_reset(&self) -> ConfigStatus {
        let default = self.config().tap_default;
        self.config_tap_set_enabled(default)
    }

    /// Whether left-handed mode is supported
    pub fn config_left_handed_is_available(&self) -> bool {
        self.config().left_handed_available
    }

    /// The left-handed state the device currently operates with
    pub fn config_left_handed(&self) -> bool {
        self.config().left_handed.current
    }

    /// The default left-handed state
    pub fn config_left_handed_default(&self) -> bool {
        false
    }

    /// Request left-handed mode
    ///
    /// Takes effect at the next gesture-neutral point: immediately when no
    /// button is held (and, for tablets, no tool is in proximity), otherwise
    /// when the current interaction ends.
    pub fn config_left_handed_set(&self, left_handed: bool) -> ConfigStatus {
        config_guard!(self, left_handed_available);
        self.with_config(|c| c.left_handed.wanted = left_handed);
        ConfigStatus::Success
    }

    /// Reset left-handed mode to its default
    pub fn config_left_handed_reset(&self) -> ConfigStatus {
        self.config_left_handed_set(false)
    }

    /// Whether natural (inverted) scrolling is supported
    pub fn config_natural_scroll_is_available(&self) -> bool {
        self.config().natural_scroll_available
    }

    /// Whether natural scrolling is enabled
    pub fn config_natural_scroll_enabled(&self) -> bool {
        self.config().natural_scroll
    }

    /// The default natural scrolling state
    pub fn config_natural_scroll_default(&self) -> bool {
        false
    }

    /// Enable or disable natural scrolling
    pub fn config_natural_scroll_set_enabled(&self, enabled: bool) -> ConfigStatus {
        config_guard!(self, natural_scroll_available);
        self.with_config(|c| c.natural_scroll = enabled);
        ConfigStatus::Success
    }

    /// Reset natural scrolling to its default
    pub fn config_natural_scroll_reset(&self) -> ConfigStatus {
        self.config_natural_scroll_set_enabled(false)
    }

    /// The scroll methods this device supports
    pub fn config_scroll_methods(&self) -> &'static [ScrollMethod] {
        self.config().scroll_methods
    }

    /// The active scroll method
    pub fn config_scroll_method(&self) -> ScrollMethod {
        self.config().scroll_method
    }

    /// The default scroll method
    pub fn config_scroll_method_default(&self) -> ScrollMethod {
        self.config().scroll_method_default
    }

    /// Select the scroll method
    pub fn config_scroll_set_method(&self, method: ScrollMethod) -> ConfigStatus {
        if !self.alive() {
            return ConfigStatus::Unsupported;
        }
        let config = self.config();
        if config.scroll_methods.is_empty() && method == ScrollMethod::NoScroll {
            return ConfigStatus::Success;
        }
        if !config.scroll_methods.contains(&method) {
            return ConfigStatus::Unsupported;
        }
        self.with_config(|c| c.scroll_method = method);
        ConfigStatus::Success
    }

    /// Reset the scroll method to its default
    pub fn config_scroll_reset_method(&self) -> ConfigStatus {
        let default = self.config().scroll_method_default;
        self.config_scroll_set_method(default)
    }

    /// The button that activates on-button-down scrolling
    pub fn config_scroll_button(&self) -> u32 {
        self.config().scroll_button
    }

    /// Set the button for on-button-down scrolling
    pub fn config_scroll_set_button(&self, button: u32) -> ConfigStatus {
        if !self.alive() || !self.config().scroll_methods.contains(&ScrollMethod::OnButtonDown) {
            return ConfigStatus::Unsupported;
        }
        if !(codes::BTN_LEFT as u32..=codes::BTN_EXTRA as u32).contains(&button) {
            return ConfigStatus::Invalid;
        }
        self.with_config(|c| c.scroll_button = button);
        ConfigStatus::Success
    }

    /// The click methods this device supports
    pub fn config_click_methods(&self) -> &'static [ClickMethod] {
        self.config().click_methods
    }

    /// The active click method
    pub fn config_click_method(&self) -> ClickMethod {
        self.config().click_method
    }

    /// The default click method
    pub fn config_click_method_default(&self) -> ClickMethod {
        self.config().click_method_default
    }

    /// Select the click method
    ///
    /// A press/release cycle in flight completes under the previous method.
    pub fn config_click_set_method(&self, method: ClickMethod) -> ConfigStatus {
        if !self.alive() {
            return ConfigStatus::Unsupported;
        }
        let config = self.config();
        if config.click_methods.is_empty() && method == ClickMethod::None {
            return ConfigStatus::Success;
        }
        if !config.click_methods.contains(&method) {
            return ConfigStatus::Unsupported;
        }
        self.with_config(|c| c.click_method_wanted = method);
        ConfigStatus::Success
    }

    /// Reset the click method to its default
    pub fn config_click_reset_method(&self) -> ConfigStatus {
        let default = self.config().click_method_default;
        self.config_click_set_method(default)
    }

    /// The current send-events mode
    pub fn config_send_events_mode(&self) -> SendEventsMode {
        self.config().send_events
    }

    /// The default send-events mode
    pub fn config_send_events_mode_default(&self) -> SendEventsMode {
        SendEventsMode::Enabled
    }

    /// Switch the send-events mode
    ///
    /// Disabling force-releases pending buttons and touches during the next
    /// dispatch, then mutes the device.
    pub fn config_send_events_set_mode(&self, mode: SendEventsMode) -> ConfigStatus {
        if !self.alive() {
            return ConfigStatus::Unsupported;
        }
        self.with_config(|c| c.send_events = mode);
        ConfigStatus::Success
    }

    /// Whether ring rotation is supported
    pub fn config_rotation_is_available(&self) -> bool {
        self.config().rotation_available
    }

    /// The ring rotation in degrees clockwise
    pub fn config_rotation(&self) -> u32 {
        self.config().rotation
    }

    /// The default ring rotation
    pub fn config_rotation_default(&self) -> u32 {
        0
    }

    /// Set the ring rotation in degrees clockwise, `0..360`
    pub fn config_rotation_set(&self, degrees: u32) -> ConfigStatus {
        config_guard!(self, rotation_available);
        if degrees >= 360 {
            return ConfigStatus::Invalid;
        }
        self.with_config(|c| c.rotation = degrees);
        ConfigStatus::Success
    }

    /// Reset the ring rotation to its default
    pub fn config_rotation_reset(&self) -> ConfigStatus {
        self.config_rotation_set(0)
    }

    /// Whether pointer acceleration is configurable
    pub fn config_accel_is_available(&self) -> bool {
        self.config().accel_available
    }

    /// The normalized acceleration speed in `[-1, 1]`
    pub fn config_accel_speed(&self) -> f64 {
        self.config().accel_speed
    }

    /// The default acceleration speed
    pub fn config_accel_speed_default(&self) -> f64 {
        0.0
    }

    /// Set the normalized acceleration speed in `[-1, 1]`
    pub fn config_accel_set_speed(&self, speed: f64) -> ConfigStatus {
        config_guard!(self, accel_available);
        if !(-1.0..=1.0).contains(&speed) || speed.is_nan() {
            return ConfigStatus::Invalid;
        }
        self.with_config(|c| c.accel_speed = speed);
        ConfigStatus::Success
    }

    /// The active acceleration profile
    pub fn config_accel_profile(&self) -> AccelProfile {
        self.config().accel_profile
    }

    /// The default acceleration profile
    pub fn config_accel_profile_default(&self) -> AccelProfile {
        self.config().accel_profile_default
    }

    /// Select the acceleration profile
    pub fn config_accel_set_profile(&self, profile: AccelProfile) -> ConfigStatus {
        config_guard!(self, accel_available);
        self.with_config(|c| c.accel_profile = profile);
        ConfigStatus::Success
    }

    /// Reset speed and profile to their defaults
    pub fn config_accel_reset(&self) -> ConfigStatus {
        config_guard!(self, accel_available);
        self.with_config(|c| {
            c.accel_speed = 0.0;
            c.accel_profile = c.accel_profile_default;
        });
        ConfigStatus::Success
    }

    /// Whether disable-while-typing is supported
    pub fn config_dwt_is_available(&self) -> bool {
        self.config().dwt_available
    }

    /// Whether disable-while-typing is enabled
    pub fn config_dwt_enabled(&self) -> bool {
        self.config().dwt_enabled
    }

    /// Whether disable-while-typing is enabled by default
    pub fn config_dwt_default(&self) -> bool {
        self.config().dwt_available
    }

    /// Enable or disable disable-while-typing
    pub fn config_dwt_set_enabled(&self, enabled: bool) -> ConfigStatus {
        config_guard!(self, dwt_available);
        self.with_config(|c| c.dwt_enabled = enabled);
        ConfigStatus::Success
    }

    /// Reset disable-while-typing to its default
    pub fn config_dwt_reset(&self) -> ConfigStatus {
        let default = self.config_dwt_default();
        self.config_dwt_set_enabled(default)
    }

    /// Whether the halfkey remapper is supported
    pub fn config_halfkey_is_available(&self) -> bool {
        self.config().halfkey_available
    }

    /// Whether the halfkey remapper is (or is about to be) enabled
    pub fn config_halfkey_enabled(&self) -> bool {
        self.config().halfkey_wanted
    }

    /// Enable or disable the halfkey remapper
    ///
    /// The change is deferred until no remapped key is held down, so runtime
    /// reconfiguration cannot leave stuck keys behind.
    pub fn config_halfkey_set_enabled(&self, enabled: bool) -> ConfigStatus {
        config_guard!(self, halfkey_available);
        self.with_config(|c| c.halfkey_wanted = enabled);
        ConfigStatus::Success
    }

    /// Whether the halfkey remapper is enabled by default
    pub fn config_halfkey_default(&self) -> bool {
        false
    }

    /// Reset the halfkey remapper to its default
    pub fn config_halfkey_reset(&self) -> ConfigStatus {
        self.config_halfkey_set_enabled(false)
    }

    /// Whether a calibration matrix can be applied
    pub fn config_calibration_is_available(&self) -> bool {
        self.config().calibration_available
    }

    /// The active calibration matrix, row-major 2x3
    pub fn config_calibration_matrix(&self) -> [f32; 6] {
        self.config().calibration
    }

    /// The default (identity) calibration matrix
    pub fn config_calibration_matrix_default(&self) -> [f32; 6] {
        CALIBRATION_IDENTITY
    }

    /// Apply a calibration matrix to the device's absolute coordinates
    pub fn config_calibration_set_matrix(&self, matrix: [f32; 6]) -> ConfigStatus {
        config_guard!(self, calibration_available);
        if matrix.iter().any(|v| !v.is_finite()) {
            return ConfigStatus::Invalid;
        }
        self.with_config(|c| c.calibration = matrix);
        ConfigStatus::Success
    }

    /// Whether middle-button emulation is supported
    pub fn config_middle_emulation_is_available(&self) -> bool {
        self.config().middle_emulation_available
    }

    /// Whether middle-button emulation is enabled
    pub fn config_middle_emulation_enabled(&self) -> bool {
        self.config().middle_emulation
    }

    /// Enable or disable middle-button emulation
    pub fn config_middle_emulation_set_enabled(&self, enabled: bool) -> ConfigStatus {
        config_guard!(self, middle_emulation_available);
        self.with_config(|c| c.middle_emulation = enabled);
        ConfigStatus::Success
    }

    /// Reset the calibration matrix to identity
    pub fn config_calibration_reset(&self) -> ConfigStatus {
        self.config_calibration_set_matrix(CALIBRATION_IDENTITY)
    }
}
