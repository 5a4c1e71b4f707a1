//! Clickpad button interpretation: soft-button regions and click methods
//!
//! A clickpad has one physical switch under the whole surface; what button a
//! click means is software's decision. Under the button-areas method the pad
//! is partitioned into soft-button regions and the finger position at the
//! moment of the click picks the region; under clickfinger the number of
//! fingers on the pad picks the button. Whatever is chosen is locked in until
//! the physical release, however the fingers move in between, and a method
//! change while the button is down only applies to the next click.

use crate::device::ClickMethod;
use crate::evdev::codes;

/// Geometric soft-button region under a finger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Region {
    Left,
    Middle,
    Right,
}

impl Region {
    /// The button a bottom/top-strip region maps to, honoring left-handed
    ///
    /// Only geometric regions swap; clickfinger and tap mappings never do.
    fn button(self, left_handed: bool) -> u16 {
        match (self, left_handed) {
            (Region::Left, false) | (Region::Right, true) => codes::BTN_LEFT,
            (Region::Right, false) | (Region::Left, true) => codes::BTN_RIGHT,
            (Region::Middle, _) => codes::BTN_MIDDLE,
        }
    }
}

#[derive(Debug)]
pub(super) struct ClickMachine {
    /// Button emitted for the press in flight; `None` while released,
    /// `Some(None)` for a suppressed (four-plus-finger clickfinger) press
    held: Option<Option<u16>>,
}

impl ClickMachine {
    pub(super) fn new() -> Self {
        ClickMachine { held: None }
    }

    pub(super) fn is_pressed(&self) -> bool {
        self.held.is_some()
    }

    /// Resolve a physical press into the button to emit, locking the choice
    pub(super) fn press(
        &mut self,
        method: ClickMethod,
        fingers: u32,
        region: Option<Region>,
        left_handed: bool,
    ) -> Option<u16> {
        if self.held.is_some() {
            tracing::error!("physical press while a press is in flight, ignoring");
            return None;
        }
        let button = match method {
            ClickMethod::ButtonAreas => {
                Some(region.map_or(codes::BTN_LEFT, |r| r.button(left_handed)))
            }
            ClickMethod::Clickfinger => match fingers {
                0 | 1 => Some(codes::BTN_LEFT),
                2 => Some(codes::BTN_RIGHT),
                3 => Some(codes::BTN_MIDDLE),
                _ => None,
            },
            ClickMethod::None => Some(codes::BTN_LEFT),
        };
        self.held = Some(button);
        button
    }

    /// Resolve the physical release; returns the locked button to release
    pub(super) fn release(&mut self) -> Option<u16> {
        match self.held.take() {
            Some(button) => button,
            None => {
                tracing::error!("physical release without a press, ignoring");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evdev::codes::{BTN_LEFT, BTN_MIDDLE, BTN_RIGHT};

    #[test]
    fn button_areas_map_regions() {
        let mut m = ClickMachine::new();
        assert_eq!(
            m.press(ClickMethod::ButtonAreas, 1, Some(Region::Right), false),
            Some(BTN_RIGHT)
        );
        assert_eq!(m.release(), Some(BTN_RIGHT));
        assert_eq!(
            m.press(ClickMethod::ButtonAreas, 1, None, false),
            Some(BTN_LEFT)
        );
        assert_eq!(m.release(), Some(BTN_LEFT));
    }

    #[test]
    fn left_handed_swaps_regions_only() {
        let mut m = ClickMachine::new();
        assert_eq!(
            m.press(ClickMethod::ButtonAreas, 1, Some(Region::Right), true),
            Some(BTN_LEFT)
        );
        assert_eq!(m.release(), Some(BTN_LEFT));
        // clickfinger ignores handedness
        assert_eq!(
            m.press(ClickMethod::Clickfinger, 2, None, true),
            Some(BTN_RIGHT)
        );
        assert_eq!(m.release(), Some(BTN_RIGHT));
    }

    #[test]
    fn clickfinger_counts_fingers() {
        let mut m = ClickMachine::new();
        assert_eq!(m.press(ClickMethod::Clickfinger, 1, None, false), Some(BTN_LEFT));
        m.release();
        assert_eq!(m.press(ClickMethod::Clickfinger, 3, None, false), Some(BTN_MIDDLE));
        m.release();
        // four fingers suppress the click, including its release
        assert_eq!(m.press(ClickMethod::Clickfinger, 4, None, false), None);
        assert_eq!(m.release(), None);
    }

    #[test]
    fn choice_locks_until_release() {
        let mut m = ClickMachine::new();
        m.press(ClickMethod::ButtonAreas, 1, Some(Region::Middle), false);
        // the caller re-resolving mid-press is a bug; the lock holds
        assert_eq!(
            m.press(ClickMethod::ButtonAreas, 1, Some(Region::Left), false),
            None
        );
        assert_eq!(m.release(), Some(BTN_MIDDLE));
    }
}
