//! Disable-while-typing interlock
//!
//! Keyboard activity on the same seat mutes the touchpad for a short window:
//! touches that begin while the window is open are tracked but never produce
//! pointer motion, scroll or tap events, for their whole lifetime. Touches
//! that were already down keep working, so typing never cuts a stroke in
//! half. Sustained typing widens the window.

use crate::evdev::codes;
use crate::event::KeyState;
use crate::timer::timeouts;

/// Keys counted toward sustained typing within this window are kept
const TYPING_WINDOW_MS: u64 = 100;

/// This many key presses inside the window mean sustained typing
const TYPING_BURST: usize = 5;

/// Pure modifiers do not count as typing; chording ctrl while pointing is fine
fn is_modifier(code: u32) -> bool {
    matches!(
        code as u16,
        codes::KEY_LEFTCTRL
            | codes::KEY_RIGHTCTRL
            | codes::KEY_LEFTALT
            | codes::KEY_RIGHTALT
            | codes::KEY_LEFTSHIFT
            | codes::KEY_RIGHTSHIFT
            | codes::KEY_LEFTMETA
            | codes::KEY_CAPSLOCK
    )
}

#[derive(Debug)]
pub(super) struct Dwt {
    active: bool,
    /// Press timestamps of the recent burst, oldest first
    recent_presses: [u64; TYPING_BURST],
    recent_count: usize,
}

impl Dwt {
    pub(super) fn new() -> Self {
        Dwt {
            active: false,
            recent_presses: [0; TYPING_BURST],
            recent_count: 0,
        }
    }

    /// Whether new touches must be muted right now
    pub(super) fn active(&self) -> bool {
        self.active
    }

    /// Note a key transition; returns the new expiry for the DWT timer
    pub(super) fn keyboard_event(&mut self, time: u64, code: u32, state: KeyState) -> Option<u64> {
        if is_modifier(code) {
            return None;
        }
        if state == KeyState::Pressed {
            // slide the burst window
            let mut kept = 0;
            for i in 0..self.recent_count {
                if time.saturating_sub(self.recent_presses[i]) <= TYPING_WINDOW_MS {
                    self.recent_presses[kept] = self.recent_presses[i];
                    kept += 1;
                }
            }
            if kept == TYPING_BURST {
                kept -= 1;
                self.recent_presses.rotate_left(1);
            }
            self.recent_presses[kept] = time;
            self.recent_count = kept + 1;
        }
        self.active = true;
        let timeout = if self.recent_count >= TYPING_BURST {
            timeouts::DWT_LONG
        } else {
            timeouts::DWT_SHORT
        };
        Some(time + timeout)
    }

    /// The DWT timer expired; new touches work again
    pub(super) fn expired(&mut self) {
        self.active = false;
    }

    pub(super) fn reset(&mut self) {
        self.active = false;
        self.recent_count = 0;
    }
}
