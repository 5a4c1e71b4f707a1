//! The halfkey keyboard remapper
//!
//! A modal state machine that lets one hand type both halves of the keyboard:
//! while space is held, every key is replaced by its mirror image across the
//! `G`/`H` axis of the QWERTY layout, with `BACKSPACE`/`TAB` and
//! `ENTER`/`CAPSLOCK` swapped as well. A brief space tap still types a space,
//! injected retroactively on release.
//!
//! The machine rewrites the key stream before seat counters or any consumer
//! see it, so downstream only ever observes consistent press/release pairs of
//! the *emitted* codes.

use smallvec::SmallVec;

use crate::evdev::codes;

/// Mirror image of a key code across the QWERTY `G`/`H` axis
///
/// Returns `None` for keys without a mirror (modifiers, space itself, keys
/// off the three letter rows).
pub(crate) fn mirror_code(code: u16) -> Option<u16> {
    use codes::*;
    let mirrored = match code {
        // top row
        KEY_Q => KEY_P,
        KEY_W => KEY_O,
        KEY_E => KEY_I,
        KEY_R => KEY_U,
        KEY_T => KEY_Y,
        KEY_Y => KEY_T,
        KEY_U => KEY_R,
        KEY_I => KEY_E,
        KEY_O => KEY_W,
        KEY_P => KEY_Q,
        // home row
        KEY_A => KEY_SEMICOLON,
        KEY_S => KEY_L,
        KEY_D => KEY_K,
        KEY_F => KEY_J,
        KEY_G => KEY_H,
        KEY_H => KEY_G,
        KEY_J => KEY_F,
        KEY_K => KEY_D,
        KEY_L => KEY_S,
        KEY_SEMICOLON => KEY_A,
        // bottom row
        KEY_Z => KEY_SLASH,
        KEY_X => KEY_DOT,
        KEY_C => KEY_COMMA,
        KEY_V => KEY_M,
        KEY_B => KEY_N,
        KEY_N => KEY_B,
        KEY_M => KEY_V,
        KEY_COMMA => KEY_C,
        KEY_DOT => KEY_X,
        KEY_SLASH => KEY_Z,
        // specials
        KEY_BACKSPACE => KEY_TAB,
        KEY_TAB => KEY_BACKSPACE,
        KEY_ENTER => KEY_CAPSLOCK,
        KEY_CAPSLOCK => KEY_ENTER,
        _ => return None,
    };
    Some(mirrored)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Space is up; everything passes through
    Idle,
    /// Space is down, nothing else happened yet; the tap may still be a space
    Pressed,
    /// Space is down and has modified at least one key
    Modified,
}

/// Key events the remapper decided to emit, `(code, pressed)`
pub(crate) type HalfkeyOutput = SmallVec<[(u16, bool); 4]>;

#[derive(Debug)]
pub(crate) struct Halfkey {
    state: State,
    enabled: bool,
    /// Mirrored codes currently virtually down, keyed by emitted code
    virtual_down: [u64; 4],
}

impl Halfkey {
    pub(crate) fn new() -> Self {
        Halfkey {
            state: State::Idle,
            enabled: false,
            virtual_down: [0; 4],
        }
    }

    fn bitmap_set(&mut self, code: u16, down: bool) {
        let (word, bit) = (code as usize / 64, code as usize % 64);
        if let Some(w) = self.virtual_down.get_mut(word) {
            if down {
                *w |= 1 << bit;
            } else {
                *w &= !(1 << bit);
            }
        }
    }

    fn bitmap_get(&self, code: u16) -> bool {
        let (word, bit) = (code as usize / 64, code as usize % 64);
        self.virtual_down
            .get(word)
            .map_or(false, |w| w & (1 << bit) != 0)
    }

    fn bitmap_empty(&self) -> bool {
        self.virtual_down.iter().all(|w| *w == 0)
    }

    /// Whether a runtime enable/disable may apply right now
    ///
    /// Reconfiguration is deferred until no virtual key is down, otherwise a
    /// release could reach downstream with a code whose press was rewritten.
    pub(crate) fn is_neutral(&self) -> bool {
        self.state == State::Idle && self.bitmap_empty()
    }

    /// Apply a wanted enable state if the machine is neutral
    pub(crate) fn sync_enabled(&mut self, wanted: bool) {
        if self.enabled != wanted && self.is_neutral() {
            self.enabled = wanted;
        }
    }

    #[cfg(test)]
    pub(crate) fn enabled(&self) -> bool {
        self.enabled
    }

    /// Rewrite one key transition into zero or more emitted transitions
    pub(crate) fn process(&mut self, code: u16, pressed: bool) -> HalfkeyOutput {
        let mut out = HalfkeyOutput::new();
        if !self.enabled {
            out.push((code, pressed));
            return out;
        }

        let is_space = code == codes::KEY_SPACE;
        let mirror = mirror_code(code);

        match (self.state, is_space, pressed) {
            // space down arms the modal layer and is swallowed for now
            (State::Idle, true, true) => {
                self.state = State::Pressed;
            }
            // brief tap: the user still gets their space, injected retroactively
            (State::Pressed, true, false) => {
                out.push((codes::KEY_SPACE, true));
                out.push((codes::KEY_SPACE, false));
                self.state = State::Idle;
            }
            (State::Modified, true, false) => {
                self.state = State::Idle;
            }
            // repeated space down in a non-idle state: clamp, keep the layer
            (_, true, true) => {}
            (State::Idle, true, false) => {
                // release without a tracked press, e.g. enabled mid-hold
                out.push((code, pressed));
            }

            (State::Pressed | State::Modified, false, true) => {
                if let Some(m) = mirror {
                    self.bitmap_set(m, true);
                    out.push((m, true));
                    self.state = State::Modified;
                } else {
                    out.push((code, pressed));
                }
            }
            (State::Pressed | State::Modified, false, false) => {
                // release inversion: if we sent the mirror down, send the
                // mirror up no matter which layer the release arrives in
                if let Some(m) = mirror.filter(|m| self.bitmap_get(*m)) {
                    self.bitmap_set(m, false);
                    out.push((m, false));
                } else {
                    out.push((code, pressed));
                }
            }

            (State::Idle, false, _) => {
                if !pressed {
                    if let Some(m) = mirror.filter(|m| self.bitmap_get(*m)) {
                        // original released after space was let go
                        self.bitmap_set(m, false);
                        out.push((m, false));
                        return out;
                    }
                }
                out.push((code, pressed));
            }
        }
        out
    }

    /// Force-release every virtually-down key, for device teardown
    pub(crate) fn drain(&mut self) -> HalfkeyOutput {
        let mut out = HalfkeyOutput::new();
        for word in 0..self.virtual_down.len() {
            for bit in 0..64 {
                if self.virtual_down[word] & (1u64 << bit) != 0 {
                    out.push(((word * 64 + bit) as u16, false));
                }
            }
        }
        self.virtual_down = [0; 4];
        self.state = State::Idle;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evdev::codes::*;

    fn enabled() -> Halfkey {
        let mut hk = Halfkey::new();
        hk.sync_enabled(true);
        hk
    }

    #[test]
    fn mirror_table_is_an_involution() {
        for code in 0..200u16 {
            if let Some(m) = mirror_code(code) {
                assert_eq!(mirror_code(m), Some(code), "mirror of {code} not symmetric");
            }
        }
    }

    #[test]
    fn plain_typing_passes_through() {
        let mut hk = enabled();
        assert_eq!(hk.process(KEY_A, true).as_slice(), &[(KEY_A, true)]);
        assert_eq!(hk.process(KEY_A, false).as_slice(), &[(KEY_A, false)]);
    }

    #[test]
    fn space_tap_is_retroactively_injected() {
        let mut hk = enabled();
        assert!(hk.process(KEY_SPACE, true).is_empty());
        assert_eq!(
            hk.process(KEY_SPACE, false).as_slice(),
            &[(KEY_SPACE, true), (KEY_SPACE, false)]
        );
    }

    #[test]
    fn held_space_mirrors_keys() {
        let mut hk = enabled();
        hk.process(KEY_SPACE, true);
        assert_eq!(hk.process(KEY_J, true).as_slice(), &[(KEY_F, true)]);
        assert_eq!(hk.process(KEY_J, false).as_slice(), &[(KEY_F, false)]);
        // space up after modification types nothing
        assert!(hk.process(KEY_SPACE, false).is_empty());
    }

    #[test]
    fn release_after_space_up_still_releases_mirror() {
        let mut hk = enabled();
        hk.process(KEY_SPACE, true);
        assert_eq!(hk.process(KEY_O, true).as_slice(), &[(KEY_W, true)]);
        hk.process(KEY_SPACE, false);
        // O released only now; downstream saw W down, must see W up
        assert_eq!(hk.process(KEY_O, false).as_slice(), &[(KEY_W, false)]);
    }

    #[test]
    fn no_stuck_mirrors_for_any_release_order() {
        // property 9: every mirrored-down has exactly one mirrored-up
        let keys = [KEY_Q, KEY_F, KEY_M, KEY_BACKSPACE];
        for release_space_first in [true, false] {
            let mut hk = enabled();
            let mut down = std::collections::HashMap::<u16, i32>::new();
            let mut track = |out: HalfkeyOutput| {
                for (code, pressed) in out {
                    *down.entry(code).or_default() += if pressed { 1 } else { -1 };
                }
            };
            track(hk.process(KEY_SPACE, true));
            for k in keys {
                track(hk.process(k, true));
            }
            if release_space_first {
                track(hk.process(KEY_SPACE, false));
            }
            for k in keys {
                track(hk.process(k, false));
            }
            if !release_space_first {
                track(hk.process(KEY_SPACE, false));
            }
            assert!(down.values().all(|v| *v == 0), "stuck keys: {down:?}");
            assert!(hk.is_neutral());
        }
    }

    #[test]
    fn reconfiguration_defers_until_neutral() {
        let mut hk = enabled();
        hk.process(KEY_SPACE, true);
        hk.process(KEY_J, true);
        hk.sync_enabled(false);
        assert!(hk.enabled(), "disable applied with a mirror held");
        hk.process(KEY_J, false);
        hk.process(KEY_SPACE, false);
        hk.sync_enabled(false);
        assert!(!hk.enabled());
    }
}
