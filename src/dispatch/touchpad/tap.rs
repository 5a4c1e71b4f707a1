//! Tap-to-click state machine
//!
//! One machine per touchpad. Quick touches become button clicks: one finger
//! taps left, two fingers right, three fingers middle; a tap immediately
//! followed by a finger landing again becomes a button-hold drag, optionally
//! chained across short lifts. Four or more fingers, motion past the
//! threshold, a timeout with the finger still down, or a physical click all
//! kill the tap in progress.
//!
//! The machine is pure: it consumes touch/timer inputs and returns the button
//! events to emit plus the timer operations to apply, which keeps every
//! timing decision in one place.
//!
//! Timing model: the tap timer is armed at touch-down; a single-finger tap's
//! release fires when that timer expires. Completing a multi-finger tap or a
//! multitap continuation re-arms the timer at the finishing touch-up, so
//! chained taps are finalized one pair per timer cycle with the saved
//! press times of the actual finger contacts.

use smallvec::SmallVec;

use crate::evdev::codes;
use crate::timer::timeouts;

/// Buttons a tap can produce, by finger count
fn button_for(fingers: u32) -> Option<u16> {
    match fingers {
        1 => Some(codes::BTN_LEFT),
        2 => Some(codes::BTN_RIGHT),
        3 => Some(codes::BTN_MIDDLE),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    /// `n` fingers have participated; the contact may still become a tap
    Touch { fingers: u32 },
    /// Tap complete, button pressed; the release rides on the tap timer
    Tapped { button: u16 },
    /// Finger landed again right after a tap: drag or double tap, the timer decides
    DraggingOrTap { button: u16, down_time: u64 },
    /// Confirmed drag, button held
    Dragging { button: u16 },
    /// Drag finger lifted; a re-landing within the grace period resumes
    DraggingWait { button: u16 },
    /// A second finger joined the drag
    Dragging2 { button: u16 },
    /// One finished pair is waiting for the timer while the next tap may start
    Multitap {
        button: u16,
        down_time: u64,
        up_time: u64,
    },
    /// Not a tap; ignore everything until all fingers lift
    Dead,
}

/// Inputs to the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum TapEvent {
    /// An eligible touch landed
    Down,
    /// An eligible touch lifted
    Up,
    /// A tap-eligible touch moved past the motion threshold
    Motion,
    /// A physical button click arrived
    Button,
    /// The tap timer fired
    TimeoutTap,
    /// The drag-wait timer fired
    TimeoutDrag,
}

/// What the caller must do after feeding an event
#[derive(Debug, Default)]
pub(super) struct TapOutput {
    /// `(timestamp, button, pressed)` in emission order
    pub(super) events: SmallVec<[(u64, u16, bool); 4]>,
    pub(super) set_tap_timer: Option<u64>,
    pub(super) cancel_tap_timer: bool,
    pub(super) set_drag_timer: Option<u64>,
    pub(super) cancel_drag_timer: bool,
}

impl TapOutput {
    fn press(&mut self, time: u64, button: u16) {
        self.events.push((time, button, true));
    }
    fn release(&mut self, time: u64, button: u16) {
        self.events.push((time, button, false));
    }
}

#[derive(Debug)]
pub(super) struct TapMachine {
    state: State,
    /// Eligible fingers currently on the pad
    down: u32,
}

impl TapMachine {
    pub(super) fn new() -> Self {
        TapMachine {
            state: State::Idle,
            down: 0,
        }
    }

    /// Whether the machine is between gestures
    pub(super) fn idle(&self) -> bool {
        self.state == State::Idle
    }

    pub(super) fn handle(&mut self, event: TapEvent, time: u64) -> TapOutput {
        let mut out = TapOutput::default();
        match event {
            TapEvent::Down => self.down += 1,
            TapEvent::Up => self.down = self.down.saturating_sub(1),
            _ => {}
        }

        self.state = match self.state {
            State::Idle => match event {
                TapEvent::Down => {
                    out.set_tap_timer = Some(time + timeouts::TAP);
                    State::Touch { fingers: 1 }
                }
                _ => State::Idle,
            },

            State::Touch { fingers } => match event {
                TapEvent::Down => {
                    if fingers >= 3 {
                        out.cancel_tap_timer = true;
                        State::Dead
                    } else {
                        out.set_tap_timer = Some(time + timeouts::TAP);
                        State::Touch {
                            fingers: fingers + 1,
                        }
                    }
                }
                TapEvent::Up if self.down == 0 => match button_for(fingers) {
                    Some(button) => {
                        out.press(time, button);
                        if fingers > 1 {
                            // multi-finger taps finalize from the finishing up
                            out.set_tap_timer = Some(time + timeouts::TAP);
                        }
                        State::Tapped { button }
                    }
                    None => {
                        out.cancel_tap_timer = true;
                        State::Idle
                    }
                },
                TapEvent::Up => State::Touch { fingers },
                TapEvent::Motion | TapEvent::Button => {
                    out.cancel_tap_timer = true;
                    State::Dead
                }
                TapEvent::TimeoutTap => State::Dead,
                TapEvent::TimeoutDrag => State::Touch { fingers },
            },

            State::Tapped { button } => match event {
                TapEvent::TimeoutTap => {
                    out.release(time, button);
                    State::Idle
                }
                TapEvent::Down => State::DraggingOrTap {
                    button,
                    down_time: time,
                },
                TapEvent::Button => {
                    out.release(time, button);
                    out.cancel_tap_timer = true;
                    State::Idle
                }
                _ => State::Tapped { button },
            },

            State::DraggingOrTap { button, down_time } => match event {
                TapEvent::Up => State::Multitap {
                    button,
                    down_time,
                    up_time: time,
                },
                TapEvent::TimeoutTap => State::Dragging { button },
                TapEvent::Motion => {
                    out.cancel_tap_timer = true;
                    State::Dragging { button }
                }
                TapEvent::Down => {
                    out.cancel_tap_timer = true;
                    State::Dragging2 { button }
                }
                TapEvent::Button => {
                    out.release(time, button);
                    out.cancel_tap_timer = true;
                    State::Dead
                }
                TapEvent::TimeoutDrag => State::DraggingOrTap { button, down_time },
            },

            State::Multitap {
                button,
                down_time,
                up_time,
            } => match event {
                TapEvent::TimeoutTap => {
                    // finalize the previous pair, open the next with the
                    // saved press time of the actual contact
                    out.release(time, button);
                    out.press(down_time, button);
                    out.set_tap_timer = Some(up_time + timeouts::TAP);
                    State::Tapped { button }
                }
                TapEvent::Down => {
                    out.release(time, button);
                    out.press(down_time, button);
                    out.set_tap_timer = Some(time + timeouts::TAP);
                    State::DraggingOrTap {
                        button,
                        down_time: time,
                    }
                }
                TapEvent::Button => {
                    out.release(time, button);
                    out.press(down_time, button);
                    out.release(time, button);
                    out.cancel_tap_timer = true;
                    State::Idle
                }
                _ => State::Multitap {
                    button,
                    down_time,
                    up_time,
                },
            },

            State::Dragging { button } => match event {
                TapEvent::Up => {
                    out.set_drag_timer = Some(time + timeouts::TAP_N_DRAG);
                    State::DraggingWait { button }
                }
                TapEvent::Down => State::Dragging2 { button },
                TapEvent::Button => {
                    out.release(time, button);
                    State::Dead
                }
                _ => State::Dragging { button },
            },

            State::DraggingWait { button } => match event {
                TapEvent::Down => {
                    out.cancel_drag_timer = true;
                    State::Dragging { button }
                }
                TapEvent::TimeoutDrag => {
                    out.release(time, button);
                    State::Idle
                }
                TapEvent::Button => {
                    out.release(time, button);
                    out.cancel_drag_timer = true;
                    State::Idle
                }
                _ => State::DraggingWait { button },
            },

            State::Dragging2 { button } => match event {
                TapEvent::Down => {
                    // a third finger ends the drag
                    out.release(time, button);
                    State::Dead
                }
                TapEvent::Up => State::Dragging { button },
                TapEvent::Button => {
                    out.release(time, button);
                    State::Dead
                }
                _ => State::Dragging2 { button },
            },

            State::Dead => {
                if self.down == 0 {
                    State::Idle
                } else {
                    State::Dead
                }
            }
        };
        out
    }

    /// Force the machine back to idle, releasing a held button
    pub(super) fn reset(&mut self, time: u64) -> TapOutput {
        let mut out = TapOutput::default();
        match self.state {
            State::Tapped { button }
            | State::DraggingOrTap { button, .. }
            | State::Dragging { button }
            | State::DraggingWait { button }
            | State::Dragging2 { button } => out.release(time, button),
            State::Multitap {
                button, down_time, ..
            } => {
                out.release(time, button);
                out.press(down_time, button);
                out.release(time, button);
            }
            _ => {}
        }
        out.cancel_tap_timer = true;
        out.cancel_drag_timer = true;
        self.state = State::Idle;
        self.down = 0;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test harness that applies timer ops and lets taps drive themselves
    struct Harness {
        machine: TapMachine,
        tap_timer: Option<u64>,
        drag_timer: Option<u64>,
        events: Vec<(u64, u16, bool)>,
    }

    impl Harness {
        fn new() -> Self {
            Harness {
                machine: TapMachine::new(),
                tap_timer: None,
                drag_timer: None,
                events: Vec::new(),
            }
        }

        fn apply(&mut self, out: TapOutput) {
            self.events.extend(out.events);
            if out.cancel_tap_timer {
                self.tap_timer = None;
            }
            if out.cancel_drag_timer {
                self.drag_timer = None;
            }
            if let Some(t) = out.set_tap_timer {
                self.tap_timer = Some(t);
            }
            if let Some(t) = out.set_drag_timer {
                self.drag_timer = Some(t);
            }
        }

        /// Fire any timer expiring before `time`, in order
        fn run_timers_until(&mut self, time: u64) {
            loop {
                let next_tap = self.tap_timer.filter(|t| *t <= time);
                let next_drag = self.drag_timer.filter(|t| *t <= time);
                let (event, expiry) = match (next_tap, next_drag) {
                    (Some(a), Some(b)) if a <= b => (TapEvent::TimeoutTap, a),
                    (Some(_), Some(b)) => (TapEvent::TimeoutDrag, b),
                    (Some(a), None) => (TapEvent::TimeoutTap, a),
                    (None, Some(b)) => (TapEvent::TimeoutDrag, b),
                    (None, None) => return,
                };
                if event == TapEvent::TimeoutTap {
                    self.tap_timer = None;
                } else {
                    self.drag_timer = None;
                }
                let out = self.machine.handle(event, expiry);
                self.apply(out);
            }
        }

        fn feed(&mut self, event: TapEvent, time: u64) {
            self.run_timers_until(time);
            let out = self.machine.handle(event, time);
            self.apply(out);
        }

        fn settle(&mut self) {
            self.run_timers_until(u64::MAX);
        }
    }

    use crate::evdev::codes::{BTN_LEFT, BTN_MIDDLE, BTN_RIGHT};

    #[test]
    fn single_tap() {
        let mut h = Harness::new();
        h.feed(TapEvent::Down, 0);
        h.feed(TapEvent::Up, 50);
        h.settle();
        assert_eq!(h.events, vec![(50, BTN_LEFT, true), (180, BTN_LEFT, false)]);
    }

    #[test]
    fn doubletap_timings() {
        // scenario: down@0 up@50 down@100 up@150, then the timers run out
        let mut h = Harness::new();
        h.feed(TapEvent::Down, 0);
        h.feed(TapEvent::Up, 50);
        h.feed(TapEvent::Down, 100);
        h.feed(TapEvent::Up, 150);
        h.settle();
        assert_eq!(
            h.events,
            vec![
                (50, BTN_LEFT, true),
                (180, BTN_LEFT, false),
                (100, BTN_LEFT, true),
                (330, BTN_LEFT, false),
            ]
        );
    }

    #[test]
    fn two_finger_tap_is_right_button() {
        // down@0, down@5, both up by 60
        let mut h = Harness::new();
        h.feed(TapEvent::Down, 0);
        h.feed(TapEvent::Down, 5);
        h.feed(TapEvent::Up, 55);
        h.feed(TapEvent::Up, 60);
        h.settle();
        assert_eq!(
            h.events,
            vec![(60, BTN_RIGHT, true), (240, BTN_RIGHT, false)]
        );
    }

    #[test]
    fn three_finger_tap_is_middle_button() {
        let mut h = Harness::new();
        h.feed(TapEvent::Down, 0);
        h.feed(TapEvent::Down, 5);
        h.feed(TapEvent::Down, 10);
        h.feed(TapEvent::Up, 40);
        h.feed(TapEvent::Up, 45);
        h.feed(TapEvent::Up, 50);
        h.settle();
        assert_eq!(
            h.events,
            vec![(50, BTN_MIDDLE, true), (230, BTN_MIDDLE, false)]
        );
    }

    #[test]
    fn four_fingers_kill_the_tap() {
        let mut h = Harness::new();
        for t in [0, 5, 10, 15] {
            h.feed(TapEvent::Down, t);
        }
        for t in [40, 45, 50, 55] {
            h.feed(TapEvent::Up, t);
        }
        h.settle();
        assert!(h.events.is_empty());
        assert!(h.machine.idle());
    }

    #[test]
    fn motion_kills_the_tap() {
        let mut h = Harness::new();
        h.feed(TapEvent::Down, 0);
        h.feed(TapEvent::Motion, 30);
        h.feed(TapEvent::Up, 60);
        h.settle();
        assert!(h.events.is_empty());
    }

    #[test]
    fn hold_without_release_is_not_a_tap() {
        let mut h = Harness::new();
        h.feed(TapEvent::Down, 0);
        h.feed(TapEvent::Up, 400);
        h.settle();
        assert!(h.events.is_empty());
    }

    #[test]
    fn tap_and_drag() {
        // tap, re-land, drag past the motion threshold, lift, grace expires
        let mut h = Harness::new();
        h.feed(TapEvent::Down, 0);
        h.feed(TapEvent::Up, 50);
        h.feed(TapEvent::Down, 100);
        h.feed(TapEvent::Motion, 120);
        h.feed(TapEvent::Up, 400);
        h.settle();
        assert_eq!(
            h.events,
            vec![(50, BTN_LEFT, true), (700, BTN_LEFT, false)]
        );
        assert!(h.machine.idle());
    }

    #[test]
    fn drag_resumes_within_grace() {
        let mut h = Harness::new();
        h.feed(TapEvent::Down, 0);
        h.feed(TapEvent::Up, 50);
        h.feed(TapEvent::Down, 100);
        h.feed(TapEvent::Motion, 120);
        h.feed(TapEvent::Up, 200);
        // re-land inside TAP_N_DRAG: the drag continues
        h.feed(TapEvent::Down, 300);
        h.feed(TapEvent::Up, 600);
        h.settle();
        assert_eq!(
            h.events,
            vec![(50, BTN_LEFT, true), (900, BTN_LEFT, false)]
        );
    }

    #[test]
    fn third_finger_ends_drag() {
        let mut h = Harness::new();
        h.feed(TapEvent::Down, 0);
        h.feed(TapEvent::Up, 50);
        h.feed(TapEvent::Down, 100);
        h.feed(TapEvent::Motion, 120);
        h.feed(TapEvent::Down, 200);
        h.feed(TapEvent::Down, 210);
        assert_eq!(
            h.events,
            vec![(50, BTN_LEFT, true), (210, BTN_LEFT, false)]
        );
    }

    #[test]
    fn physical_click_ends_drag_with_release_first() {
        let mut h = Harness::new();
        h.feed(TapEvent::Down, 0);
        h.feed(TapEvent::Up, 50);
        h.feed(TapEvent::Down, 100);
        h.feed(TapEvent::Motion, 120);
        h.feed(TapEvent::Button, 200);
        assert_eq!(
            h.events,
            vec![(50, BTN_LEFT, true), (200, BTN_LEFT, false)]
        );
    }

    #[test]
    fn multitap_pairs_are_ordered() {
        // property: N quick taps produce N ordered press/release pairs
        for n in 1..=8u64 {
            let mut h = Harness::new();
            for i in 0..n {
                h.feed(TapEvent::Down, i * 100);
                h.feed(TapEvent::Up, i * 100 + 50);
            }
            h.settle();
            assert_eq!(h.events.len() as u64, 2 * n, "tap count {n}");
            let mut presses = Vec::new();
            let mut releases = Vec::new();
            for chunk in h.events.chunks(2) {
                let [(pt, pb, pp), (rt, rb, rp)] = chunk else {
                    panic!("odd event count");
                };
                assert!(*pp && !*rp, "pair out of order for {n} taps");
                assert_eq!((*pb, *rb), (BTN_LEFT, BTN_LEFT));
                assert!(pt < rt, "press {pt} not before release {rt}");
                presses.push(*pt);
                releases.push(*rt);
            }
            assert!(presses.windows(2).all(|w| w[0] < w[1]));
            assert!(releases.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
