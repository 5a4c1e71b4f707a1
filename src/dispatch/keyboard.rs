//! Keyboard pipeline: key passthrough, seat counters and the halfkey remapper
//!
//! Key codes are passed through untranslated (keymap handling is the
//! consumer's business); the pipeline maintains the seat-wide pressed
//! counters, drops kernel autorepeat, and optionally rewrites the stream
//! through the [`halfkey`](super::halfkey) state machine.

use super::{halfkey::Halfkey, DispatchCtx};
use crate::evdev::{EvdevEvent, EventKind};
use crate::event::KeyState;

#[derive(Debug)]
pub(crate) struct KeyboardDispatch {
    halfkey: Halfkey,
    /// Emitted key codes currently down, for force-release on teardown
    pressed: Vec<u16>,
}

impl KeyboardDispatch {
    pub(crate) fn new() -> Self {
        KeyboardDispatch {
            halfkey: Halfkey::new(),
            pressed: Vec::new(),
        }
    }

    fn emit(&mut self, ctx: &mut DispatchCtx<'_>, time: u64, code: u16, pressed: bool) {
        if pressed {
            if self.pressed.contains(&code) {
                tracing::error!(code, "key pressed twice without release, dropping");
                return;
            }
            self.pressed.push(code);
        } else {
            let Some(idx) = self.pressed.iter().position(|c| *c == code) else {
                tracing::error!(code, "release for a key that is not down, dropping");
                return;
            };
            self.pressed.swap_remove(idx);
        }
        let state = if pressed {
            KeyState::Pressed
        } else {
            KeyState::Released
        };
        ctx.key_event(time, code as u32, state);
    }

    pub(crate) fn process(&mut self, ctx: &mut DispatchCtx<'_>, event: &EvdevEvent) {
        if event.kind != EventKind::Key {
            return;
        }
        // kernel autorepeat is not forwarded; consumers repeat themselves
        if event.value == 2 {
            return;
        }

        // a wanted halfkey toggle applies only at a neutral point, so a
        // rewritten press always gets its matching rewritten release
        self.halfkey
            .sync_enabled(ctx.device.config().halfkey_wanted);

        let rewritten = self.halfkey.process(event.code, event.value != 0);
        for (code, pressed) in rewritten {
            self.emit(ctx, event.time, code, pressed);
        }
    }

    pub(crate) fn frame(&mut self, ctx: &mut DispatchCtx<'_>, _time: u64) {
        self.halfkey
            .sync_enabled(ctx.device.config().halfkey_wanted);
    }

    pub(crate) fn suspend(&mut self, ctx: &mut DispatchCtx<'_>, time: u64) {
        for (code, pressed) in self.halfkey.drain() {
            debug_assert!(!pressed);
            if let Some(idx) = self.pressed.iter().position(|c| *c == code) {
                self.pressed.swap_remove(idx);
                ctx.key_event(time, code as u32, KeyState::Released);
            }
        }
        for code in std::mem::take(&mut self.pressed) {
            ctx.key_event(time, code as u32, KeyState::Released);
        }
    }
}
