//! Coarse monotonic timer set driving the gesture state machines
//!
//! Timers are owned by dispatchers and identified by `(device, kind)`; setting
//! an already-set timer moves its expiry, cancelling a not-set timer is a
//! no-op. The wheel itself is passive: the context polls
//! [`TimerWheel::pop_expired`] from `dispatch` and routes each fired token to
//! the owning dispatcher, and re-arms the OS timerfd to
//! [`TimerWheel::next_expiry`] so the caller wakes up in time.

use crate::device::DeviceId;

/// Default gesture timeouts in milliseconds.
pub(crate) mod timeouts {
    /// Tap finalization
    pub(crate) const TAP: u64 = 180;
    /// Drag release grace
    pub(crate) const TAP_N_DRAG: u64 = 300;
    /// Soft-button area lock-in
    pub(crate) const SOFTBUTTON: u64 = 200;
    /// Edge-scroll activation
    pub(crate) const EDGE_SCROLL: u64 = 300;
    /// Trackpoint button-hold scroll
    pub(crate) const BUTTON_SCROLL: u64 = 200;
    /// Middle-button emulation
    pub(crate) const MIDDLEBUTTON: u64 = 50;
    /// Post-release grace after a key
    pub(crate) const DWT_SHORT: u64 = 100;
    /// After sustained typing
    pub(crate) const DWT_LONG: u64 = 500;
    /// Two-finger-scroll to motion hand-off
    pub(crate) const FINGER_SWITCH: u64 = 120;
}

/// Which of a device's timers fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerKind {
    Tap,
    TapDrag,
    SoftButton,
    EdgeScroll,
    ButtonScroll,
    MiddleButton,
    Dwt,
    FingerSwitch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TimerToken {
    pub(crate) device: DeviceId,
    pub(crate) kind: TimerKind,
}

#[derive(Debug)]
struct TimerEntry {
    token: TimerToken,
    expiry: u64,
}

/// The set of armed timers, ordered by expiry
#[derive(Debug, Default)]
pub(crate) struct TimerWheel {
    entries: Vec<TimerEntry>,
}

impl TimerWheel {
    pub(crate) fn new() -> Self {
        TimerWheel::default()
    }

    /// Arm (or move) the timer for `token` to fire at `expiry` ms
    pub(crate) fn set(&mut self, token: TimerToken, expiry: u64) {
        self.cancel(token);
        self.entries.push(TimerEntry { token, expiry });
    }

    /// Disarm the timer for `token`; no-op if it is not set
    pub(crate) fn cancel(&mut self, token: TimerToken) {
        self.entries.retain(|e| e.token != token);
    }

    /// Disarm every timer owned by `device`
    pub(crate) fn cancel_device(&mut self, device: DeviceId) {
        self.entries.retain(|e| e.token.device != device);
    }

    /// Whether the timer for `token` is currently armed
    #[cfg(test)]
    pub(crate) fn is_set(&self, token: TimerToken) -> bool {
        self.entries.iter().any(|e| e.token == token)
    }

    /// Earliest armed expiry, if any timer is set
    pub(crate) fn next_expiry(&self) -> Option<u64> {
        self.entries.iter().map(|e| e.expiry).min()
    }

    /// Remove and return the earliest timer with `expiry <= now`
    ///
    /// Returns the token together with its programmed expiry; callbacks run
    /// with the expiry as their notion of "current time" so emitted events
    /// carry deterministic timestamps.
    pub(crate) fn pop_expired(&mut self, now: u64) -> Option<(TimerToken, u64)> {
        let idx = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.expiry <= now)
            .min_by_key(|(_, e)| e.expiry)
            .map(|(i, _)| i)?;
        let entry = self.entries.swap_remove(idx);
        Some((entry.token, entry.expiry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(dev: u32, kind: TimerKind) -> TimerToken {
        TimerToken {
            device: DeviceId(dev),
            kind,
        }
    }

    #[test]
    fn fires_in_expiry_order() {
        let mut wheel = TimerWheel::new();
        wheel.set(tok(1, TimerKind::Tap), 200);
        wheel.set(tok(1, TimerKind::SoftButton), 100);
        wheel.set(tok(2, TimerKind::Tap), 300);

        assert_eq!(wheel.next_expiry(), Some(100));
        assert_eq!(wheel.pop_expired(250), Some((tok(1, TimerKind::SoftButton), 100)));
        assert_eq!(wheel.pop_expired(250), Some((tok(1, TimerKind::Tap), 200)));
        assert_eq!(wheel.pop_expired(250), None);
        assert_eq!(wheel.next_expiry(), Some(300));
    }

    #[test]
    fn set_moves_existing_timer() {
        let mut wheel = TimerWheel::new();
        wheel.set(tok(1, TimerKind::Tap), 200);
        wheel.set(tok(1, TimerKind::Tap), 500);
        assert_eq!(wheel.pop_expired(300), None);
        assert_eq!(wheel.pop_expired(500), Some((tok(1, TimerKind::Tap), 500)));
    }

    #[test]
    fn cancel_unset_is_noop() {
        let mut wheel = TimerWheel::new();
        wheel.cancel(tok(1, TimerKind::Tap));
        assert_eq!(wheel.next_expiry(), None);
        wheel.set(tok(1, TimerKind::Tap), 100);
        wheel.cancel_device(DeviceId(1));
        assert!(!wheel.is_set(tok(1, TimerKind::Tap)));
    }
}
