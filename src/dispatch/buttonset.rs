//! Pad button-set pipeline: rings, strips and express keys
//!
//! Rings are circular absolute controllers; their reading is normalized to
//! `[0, 1)` clockwise from the ring's logical north (shifted by the
//! user-configured rotation) and deltas take the shortest way around the
//! wrap, so a 0.9 to 0.1 transition scrolls forward by 0.2 rather than
//! backward by 0.8. Strips report their position as a single set bit and are
//! normalized logarithmically; a raw value of 0 means the finger lifted and
//! is suppressed entirely, and the first reading of a fresh touch carries a
//! zero delta. Pad buttons are diffed against the previous frame's bitmask,
//! releases first.

use super::{diff_button_bits, DispatchCtx};
use crate::device::{ButtonsetInfo, Device};
use crate::evdev::{codes, AbsInfo, EvdevEvent, EventKind};
use crate::event::{
    ButtonState, ButtonsetAxis, ButtonsetAxisEvent, ButtonsetButtonEvent, Event,
};

const MAX_STRIPS: usize = 2;
const MAX_RINGS: usize = 2;

#[derive(Debug)]
pub(crate) struct ButtonsetDispatch {
    layout: ButtonsetInfo,
    ring_abs: [AbsInfo; MAX_RINGS],
    ring_prev: [Option<f64>; MAX_RINGS],
    ring_pending: [Option<i32>; MAX_RINGS],
    strip_abs: [AbsInfo; MAX_STRIPS],
    strip_prev: [Option<f64>; MAX_STRIPS],
    strip_pending: [Option<i32>; MAX_STRIPS],
    buttons_cur: u64,
    buttons_prev: u64,
}

impl ButtonsetDispatch {
    pub(crate) fn new(device: &Device) -> Self {
        let info = device.info();
        let layout = info.buttonset.clone().unwrap_or(ButtonsetInfo {
            rings: 0,
            strips: 0,
            ring_resolution: None,
            buttons: Vec::new(),
        });
        // Wacom-style defaults: 72-position ring, 13-bit strips
        let ring_default = AbsInfo::new(0, 71, 0);
        let strip_default = AbsInfo::new(0, 4096, 0);
        ButtonsetDispatch {
            layout,
            ring_abs: [
                info.abs_info(codes::ABS_WHEEL).unwrap_or(ring_default),
                info.abs_info(codes::ABS_THROTTLE).unwrap_or(ring_default),
            ],
            ring_prev: [None; MAX_RINGS],
            ring_pending: [None; MAX_RINGS],
            strip_abs: [
                info.abs_info(codes::ABS_RX).unwrap_or(strip_default),
                info.abs_info(codes::ABS_RY).unwrap_or(strip_default),
            ],
            strip_prev: [None; MAX_STRIPS],
            strip_pending: [None; MAX_STRIPS],
            buttons_cur: 0,
            buttons_prev: 0,
        }
    }

    fn button_bit(&self, code: u16) -> Option<u32> {
        self.layout
            .buttons
            .iter()
            .position(|c| *c == code)
            .map(|i| i as u32)
    }

    pub(crate) fn process(&mut self, _ctx: &mut DispatchCtx<'_>, event: &EvdevEvent) {
        match event.kind {
            EventKind::Absolute => match event.code {
                codes::ABS_WHEEL if self.layout.rings > 0 => {
                    self.ring_pending[0] = Some(event.value)
                }
                codes::ABS_THROTTLE if self.layout.rings > 1 => {
                    self.ring_pending[1] = Some(event.value)
                }
                codes::ABS_RX if self.layout.strips > 0 => {
                    self.strip_pending[0] = Some(event.value)
                }
                codes::ABS_RY if self.layout.strips > 1 => {
                    self.strip_pending[1] = Some(event.value)
                }
                _ => {}
            },
            EventKind::Key if event.value != 2 => {
                if let Some(bit) = self.button_bit(event.code) {
                    if event.value != 0 {
                        self.buttons_cur |= 1 << bit;
                    } else {
                        self.buttons_cur &= !(1 << bit);
                    }
                }
            }
            _ => {}
        }
    }

    /// Normalize a raw ring reading to `[0, 1)` past the configured rotation
    fn ring_position(&self, ring: usize, raw: i32, rotation: u32) -> f64 {
        let range = self.ring_abs[ring].range() + 1.0;
        let norm = (raw - self.ring_abs[ring].minimum) as f64 / range;
        (norm - rotation as f64 / 360.0).rem_euclid(1.0)
    }

    /// Shortest signed distance between two ring positions
    ///
    /// The candidates are the direct difference and the two one-turn detours;
    /// the smallest in magnitude wins, so the delta never exceeds a half
    /// revolution.
    fn ring_delta(old: f64, new: f64) -> f64 {
        let candidates = [new - old, new + 1.0 - old, new - 1.0 - old];
        candidates
            .into_iter()
            .min_by(|a, b| a.abs().total_cmp(&b.abs()))
            .unwrap()
    }

    /// Normalize a one-set-bit strip reading to `[0, 1]`
    fn strip_position(&self, strip: usize, raw: i32) -> f64 {
        let max = self.strip_abs[strip].maximum.max(2) as f64;
        ((raw.max(1) as f64).ln() / max.ln()).clamp(0.0, 1.0)
    }

    pub(crate) fn frame(&mut self, ctx: &mut DispatchCtx<'_>, time: u64) {
        let rotation = ctx.device.config().rotation;

        for ring in 0..self.layout.rings.min(MAX_RINGS as u32) as usize {
            let Some(raw) = self.ring_pending[ring].take() else {
                continue;
            };
            let position = self.ring_position(ring, raw, rotation);
            let delta = match self.ring_prev[ring] {
                Some(prev) => Self::ring_delta(prev, position),
                None => 0.0,
            };
            self.ring_prev[ring] = Some(position);
            let delta_discrete = self
                .layout
                .ring_resolution
                .map(|res| (delta * res as f64).round() as i32);
            ctx.queue.push(Event::ButtonsetAxis {
                event: ButtonsetAxisEvent {
                    device: ctx.device.clone(),
                    time,
                    axis: ButtonsetAxis::Ring { index: ring as u32 },
                    position,
                    delta,
                    delta_discrete,
                },
            });
        }

        for strip in 0..self.layout.strips.min(MAX_STRIPS as u32) as usize {
            let Some(raw) = self.strip_pending[strip].take() else {
                continue;
            };
            if raw == 0 {
                // finger released; no event, and the next touch starts fresh
                self.strip_prev[strip] = None;
                continue;
            }
            let position = self.strip_position(strip, raw);
            let delta = self.strip_prev[strip].map_or(0.0, |prev| position - prev);
            self.strip_prev[strip] = Some(position);
            ctx.queue.push(Event::ButtonsetAxis {
                event: ButtonsetAxisEvent {
                    device: ctx.device.clone(),
                    time,
                    axis: ButtonsetAxis::Strip {
                        index: strip as u32,
                    },
                    position,
                    delta,
                    delta_discrete: None,
                },
            });
        }

        let (prev, cur) = (self.buttons_prev, self.buttons_cur);
        if prev != cur {
            let device = ctx.device.clone();
            diff_button_bits(prev, cur, |bit, pressed| {
                let code = self.layout.buttons[bit as usize];
                ctx.queue.push(Event::ButtonsetButton {
                    event: ButtonsetButtonEvent {
                        device: device.clone(),
                        time,
                        button: code as u32,
                        state: if pressed {
                            ButtonState::Pressed
                        } else {
                            ButtonState::Released
                        },
                    },
                });
            });
        }
        self.buttons_prev = self.buttons_cur;
    }

    pub(crate) fn suspend(&mut self, ctx: &mut DispatchCtx<'_>, time: u64) {
        self.ring_pending = [None; MAX_RINGS];
        self.strip_pending = [None; MAX_STRIPS];
        self.strip_prev = [None; MAX_STRIPS];
        self.buttons_cur = 0;
        self.frame(ctx, time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_delta_takes_shortest_way() {
        // property: |delta| <= 0.5 and old + delta == new (mod 1)
        for a in 0..20 {
            for b in 0..20 {
                let (old, new) = (a as f64 / 20.0, b as f64 / 20.0);
                let delta = ButtonsetDispatch::ring_delta(old, new);
                assert!(delta.abs() <= 0.5 + 1e-9, "delta {delta} for {old}->{new}");
                let wrapped = (old + delta).rem_euclid(1.0);
                assert!(
                    (wrapped - new).abs() < 1e-9 || (wrapped - new).abs() > 1.0 - 1e-9,
                    "delta {delta} does not connect {old}->{new}"
                );
            }
        }
    }

    #[test]
    fn ring_wrap_is_forward() {
        // 0.95 -> 0.05 crosses north forward: +0.1, never -0.9
        let delta = ButtonsetDispatch::ring_delta(0.95, 0.05);
        assert!((delta - 0.1).abs() < 1e-9);
    }
}
