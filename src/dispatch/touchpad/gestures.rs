//! Multi-finger swipe and pinch recognition
//!
//! Three or four eligible fingers open a gesture. What kind it is stays
//! undecided until the fingers have travelled far enough to classify: when
//! they all head the same way it is a swipe, otherwise a pinch. Swipes report
//! centroid motion; pinches additionally report the scale relative to the
//! initial finger spread and the incremental rotation of the finger pair.
//! Lifting below three fingers finishes the gesture; teardown cancels it.

use smallvec::SmallVec;

use super::{Geometry, Touch};
use crate::device::Device;
use crate::event::{
    Event, GesturePinchBeginEvent, GesturePinchEndEvent, GesturePinchUpdateEvent,
    GestureSwipeBeginEvent, GestureSwipeEndEvent, GestureSwipeUpdateEvent,
};
use crate::utils::{Point, Raw};

/// Travel in mm before an open gesture is classified
const CLASSIFY_TRAVEL_MM: f64 = 3.0;

/// Fingers that moved less than this do not vote on the direction
const DIRECTION_VOTE_MM: f64 = 1.0;

#[derive(Debug, Clone, Copy)]
struct Participant {
    slot: usize,
    start: Point<Raw>,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    None,
    /// Fingers down, classification pending
    Unknown,
    Swipe,
    Pinch { initial_spread: f64, last_angle: f64 },
}

#[derive(Debug)]
pub(super) struct Gestures {
    phase: Phase,
    fingers: u32,
    participants: SmallVec<[Participant; 4]>,
}

impl Gestures {
    pub(super) fn new() -> Self {
        Gestures {
            phase: Phase::None,
            fingers: 0,
            participants: SmallVec::new(),
        }
    }

    /// Whether a gesture owns the fingers right now
    pub(super) fn active(&self) -> bool {
        !matches!(self.phase, Phase::None)
    }

    fn centroid(&self, touches: &[Touch]) -> Point<Raw> {
        let mut c = Point::origin();
        for p in &self.participants {
            c += touches[p.slot].point;
        }
        Point::new(
            c.x / self.participants.len() as f64,
            c.y / self.participants.len() as f64,
        )
    }

    /// Mean finger distance from the centroid, in mm
    fn spread(&self, geom: &Geometry, touches: &[Touch]) -> f64 {
        let centroid = self.centroid(touches);
        let mut sum = 0.0;
        for p in &self.participants {
            sum += geom.to_mm(touches[p.slot].point - centroid).hypot();
        }
        (sum / self.participants.len() as f64).max(f64::EPSILON)
    }

    /// Orientation of the first finger pair, degrees clockwise from north
    fn pair_angle(&self, touches: &[Touch]) -> f64 {
        let a = touches[self.participants[0].slot].point;
        let b = touches[self.participants[1].slot].point;
        (b.x - a.x).atan2(-(b.y - a.y)).to_degrees()
    }

    fn begin_unknown(&mut self, touches: &[Touch], active: &[usize]) {
        self.fingers = active.len() as u32;
        self.participants = active
            .iter()
            .map(|&slot| Participant {
                slot,
                start: touches[slot].point,
            })
            .collect();
        self.phase = Phase::Unknown;
    }

    fn end_event(&mut self, device: &Device, time: u64, cancelled: bool) -> Option<Event> {
        let event = match self.phase {
            Phase::Swipe => Some(Event::GestureSwipeEnd {
                event: GestureSwipeEndEvent {
                    device: device.clone(),
                    time,
                    cancelled,
                },
            }),
            Phase::Pinch { .. } => Some(Event::GesturePinchEnd {
                event: GesturePinchEndEvent {
                    device: device.clone(),
                    time,
                    cancelled,
                },
            }),
            _ => None,
        };
        self.phase = Phase::None;
        self.participants.clear();
        event
    }

    /// Interrupt the running gesture, e.g. for device teardown
    pub(super) fn cancel(&mut self, device: &Device, time: u64) -> Option<Event> {
        self.end_event(device, time, true)
    }

    /// Per-frame gesture pass; returns the events to stage
    pub(super) fn update(
        &mut self,
        device: &Device,
        geom: &Geometry,
        touches: &[Touch],
        time: u64,
    ) -> SmallVec<[Event; 4]> {
        let mut out = SmallVec::new();
        let active: SmallVec<[usize; 4]> = touches
            .iter()
            .enumerate()
            .filter(|(_, t)| t.eligible())
            .map(|(i, _)| i)
            .collect();

        if matches!(self.phase, Phase::None) {
            if (3..=4).contains(&active.len()) {
                self.begin_unknown(touches, &active);
            }
            return out;
        }

        // a finger joined or lifted: the running gesture is over
        let set_changed = active.len() != self.participants.len()
            || self.participants.iter().any(|p| !active.contains(&p.slot));
        if set_changed {
            if let Some(event) = self.end_event(device, time, false) {
                out.push(event);
            }
            if (3..=4).contains(&active.len()) {
                self.begin_unknown(touches, &active);
            }
            return out;
        }

        match self.phase {
            Phase::Unknown => {
                let deltas: SmallVec<[Point<Raw>; 4]> = self
                    .participants
                    .iter()
                    .map(|p| geom.to_mm(touches[p.slot].point - p.start))
                    .collect();
                if !deltas.iter().any(|d| d.hypot() >= CLASSIFY_TRAVEL_MM) {
                    return out;
                }
                let voters: SmallVec<[Point<Raw>; 4]> = deltas
                    .iter()
                    .copied()
                    .filter(|d| d.hypot() >= DIRECTION_VOTE_MM)
                    .collect();
                let same_direction = voters.iter().all(|a| {
                    voters
                        .iter()
                        .all(|b| a.x * b.x + a.y * b.y >= 0.0)
                });
                if same_direction {
                    self.phase = Phase::Swipe;
                    out.push(Event::GestureSwipeBegin {
                        event: GestureSwipeBeginEvent {
                            device: device.clone(),
                            time,
                            fingers: self.fingers,
                        },
                    });
                } else {
                    self.phase = Phase::Pinch {
                        initial_spread: self.spread(geom, touches),
                        last_angle: self.pair_angle(touches),
                    };
                    out.push(Event::GesturePinchBegin {
                        event: GesturePinchBeginEvent {
                            device: device.clone(),
                            time,
                            fingers: self.fingers,
                        },
                    });
                }
            }
            Phase::Swipe => {
                let mut delta = Point::origin();
                for p in &self.participants {
                    let t = &touches[p.slot];
                    delta += geom.to_mm(t.point - t.prev);
                }
                let n = self.participants.len() as f64;
                let delta = Point::<Raw>::new(delta.x / n, delta.y / n);
                if delta != Point::origin() {
                    out.push(Event::GestureSwipeUpdate {
                        event: GestureSwipeUpdateEvent {
                            device: device.clone(),
                            time,
                            dx: delta.x,
                            dy: delta.y,
                        },
                    });
                }
            }
            Phase::Pinch {
                initial_spread,
                last_angle,
            } => {
                let mut delta = Point::origin();
                let mut moved = false;
                for p in &self.participants {
                    let t = &touches[p.slot];
                    if t.point != t.prev {
                        moved = true;
                    }
                    delta += geom.to_mm(t.point - t.prev);
                }
                if !moved {
                    return out;
                }
                let n = self.participants.len() as f64;
                let spread = self.spread(geom, touches);
                let angle = self.pair_angle(touches);
                let mut rotation = angle - last_angle;
                if rotation > 180.0 {
                    rotation -= 360.0;
                } else if rotation < -180.0 {
                    rotation += 360.0;
                }
                self.phase = Phase::Pinch {
                    initial_spread,
                    last_angle: angle,
                };
                out.push(Event::GesturePinchUpdate {
                    event: GesturePinchUpdateEvent {
                        device: device.clone(),
                        time,
                        dx: delta.x / n,
                        dy: delta.y / n,
                        scale: spread / initial_spread,
                        rotation,
                    },
                });
            }
            Phase::None => {}
        }
        out
    }
}
