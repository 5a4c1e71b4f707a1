//! Pointer acceleration
//!
//! A motion filter takes device-unit deltas with their frame timestamps and
//! produces accelerated deltas suitable for on-screen motion. The filter is
//! deterministic: the same sequence of `(delta, time)` samples always yields
//! the same output, independent of wall-clock drift.
//!
//! Velocity is estimated from a short history of samples and smoothed before
//! it is fed into a [`profile`] function; the raw delta is multiplied by the
//! profile's factor. Touchpads use the [`AccelProfile::Linear`] profile in
//! millimeters, pointer devices the [`AccelProfile::SmoothSimple`] profile in
//! dpi-normalized units.

use crate::device::AccelProfile;
use crate::utils::{Point, Raw};

pub(crate) mod profile;

/// Number of samples the velocity tracker keeps
const HISTORY_SIZE: usize = 16;

/// Samples further apart than this do not belong to the same motion
const MOTION_TIMEOUT_MS: u64 = 300;

/// Velocity is estimated over at least this much history
const VELOCITY_WINDOW_MS: u64 = 10;

/// Weight of the newest velocity estimate in the smoothed value
const SMOOTHING: f64 = 0.6;

#[derive(Debug, Clone, Copy, Default)]
struct Sample {
    delta: Point<Raw>,
    time: u64,
}

/// Ring buffer of recent motion used to estimate finger/pointer velocity
#[derive(Debug)]
pub(crate) struct VelocityTracker {
    history: [Sample; HISTORY_SIZE],
    next: usize,
    count: usize,
}

impl VelocityTracker {
    pub(crate) fn new() -> Self {
        VelocityTracker {
            history: [Sample::default(); HISTORY_SIZE],
            next: 0,
            count: 0,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.next = 0;
        self.count = 0;
    }

    pub(crate) fn push(&mut self, delta: Point<Raw>, time: u64) {
        // a long pause starts a new motion; stale samples would drag the
        // velocity estimate toward zero
        if let Some(last) = self.last() {
            if time.saturating_sub(last.time) > MOTION_TIMEOUT_MS {
                self.reset();
            }
        }
        self.history[self.next] = Sample { delta, time };
        self.next = (self.next + 1) % HISTORY_SIZE;
        self.count = (self.count + 1).min(HISTORY_SIZE);
    }

    fn last(&self) -> Option<Sample> {
        if self.count == 0 {
            return None;
        }
        let idx = (self.next + HISTORY_SIZE - 1) % HISTORY_SIZE;
        Some(self.history[idx])
    }

    /// Instantaneous velocity in units per millisecond
    ///
    /// Walks backwards from the newest sample until the accumulated window
    /// spans at least [`VELOCITY_WINDOW_MS`], then divides travelled distance
    /// by elapsed time. Samples recorded at the same millisecond collapse
    /// into one distance contribution.
    pub(crate) fn velocity(&self) -> f64 {
        let Some(newest) = self.last() else {
            return 0.0;
        };
        let mut distance = newest.delta.hypot();
        let mut oldest = newest.time;

        for i in 1..self.count {
            let idx = (self.next + HISTORY_SIZE - 1 - i) % HISTORY_SIZE;
            let sample = self.history[idx];
            if newest.time.saturating_sub(sample.time) > MOTION_TIMEOUT_MS {
                break;
            }
            distance += sample.delta.hypot();
            oldest = sample.time;
            if newest.time - oldest >= VELOCITY_WINDOW_MS {
                break;
            }
        }

        let dt = (newest.time - oldest).max(1) as f64;
        distance / dt
    }
}

/// The pointer-acceleration filter attached to a pointing device
#[derive(Debug)]
pub(crate) struct MotionFilter {
    tracker: VelocityTracker,
    profile: AccelProfile,
    /// Normalized speed setting in `[-1, 1]`
    speed: f64,
    /// Hardware resolution, used by the smooth-simple profile
    dpi: u32,
    smoothed_velocity: f64,
}

impl MotionFilter {
    pub(crate) fn new(profile: AccelProfile, dpi: u32) -> Self {
        MotionFilter {
            tracker: VelocityTracker::new(),
            profile,
            speed: 0.0,
            dpi,
            smoothed_velocity: 0.0,
        }
    }

    /// Feed one delta through the filter, producing the accelerated delta
    pub(crate) fn dispatch(&mut self, delta: Point<Raw>, time: u64) -> Point<Raw> {
        self.tracker.push(delta, time);
        let velocity = self.tracker.velocity();
        self.smoothed_velocity =
            SMOOTHING * velocity + (1.0 - SMOOTHING) * self.smoothed_velocity;

        let factor = match self.profile {
            AccelProfile::Linear => profile::linear(self.smoothed_velocity, self.speed),
            AccelProfile::SmoothSimple => {
                profile::smooth_simple(self.smoothed_velocity, self.speed, self.dpi)
            }
        };
        Point::new(delta.x * factor, delta.y * factor)
    }

    /// Change the normalized speed setting
    pub(crate) fn set_speed(&mut self, speed: f64) {
        self.speed = speed.clamp(-1.0, 1.0);
    }

    /// Change the acceleration profile
    pub(crate) fn set_profile(&mut self, profile: AccelProfile) {
        self.profile = profile;
    }

    /// Forget accumulated motion, e.g. when a finger goes from hover to contact
    ///
    /// The next deltas start from zero velocity, suppressing the spurious
    /// jump a contact transition would otherwise produce.
    pub(crate) fn restart(&mut self) {
        self.tracker.reset();
        self.smoothed_velocity = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_constant(filter: &mut MotionFilter, step: f64, n: usize) -> Point<Raw> {
        let mut out = Point::origin();
        for i in 0..n {
            out = filter.dispatch(Point::new(step, 0.0), (i as u64 + 1) * 8);
        }
        out
    }

    #[test]
    fn tracker_estimates_constant_velocity() {
        let mut tracker = VelocityTracker::new();
        // 2 units every 4ms -> 0.5 units/ms
        for i in 0..8 {
            tracker.push(Point::new(2.0, 0.0), i * 4);
        }
        let v = tracker.velocity();
        assert!((v - 0.5).abs() < 0.15, "velocity {v} not near 0.5");
    }

    #[test]
    fn tracker_resets_after_pause() {
        let mut tracker = VelocityTracker::new();
        tracker.push(Point::new(100.0, 0.0), 0);
        tracker.push(Point::new(0.1, 0.0), 1000);
        // the old burst must not inflate the velocity of the new motion
        assert!(tracker.velocity() < 1.0);
    }

    #[test]
    fn slow_motion_keeps_precision() {
        let mut filter = MotionFilter::new(AccelProfile::Linear, 1000);
        let out = feed_constant(&mut filter, 0.05, 20);
        // at very low speed the factor is flat and below 1
        assert!(out.x <= 0.05);
        assert!(out.x > 0.0);
    }

    #[test]
    fn fast_motion_is_accelerated() {
        let mut filter = MotionFilter::new(AccelProfile::Linear, 1000);
        let out = feed_constant(&mut filter, 8.0, 20);
        assert!(out.x > 8.0, "fast delta {} not amplified", out.x);
    }

    #[test]
    fn speed_setting_shifts_output() {
        let mut slow = MotionFilter::new(AccelProfile::Linear, 1000);
        slow.set_speed(-1.0);
        let mut fast = MotionFilter::new(AccelProfile::Linear, 1000);
        fast.set_speed(1.0);

        let out_slow = feed_constant(&mut slow, 2.0, 20);
        let out_fast = feed_constant(&mut fast, 2.0, 20);
        assert!(out_fast.x > out_slow.x);
    }

    #[test]
    fn restart_drops_velocity() {
        let mut filter = MotionFilter::new(AccelProfile::Linear, 1000);
        feed_constant(&mut filter, 8.0, 20);
        filter.restart();
        let out = filter.dispatch(Point::new(0.05, 0.0), 500);
        // behaves like the first event of a fresh motion
        assert!(out.x <= 0.05);
    }

    #[test]
    fn deterministic_for_same_inputs(){
        let run = || {
            let mut filter = MotionFilter::new(AccelProfile::SmoothSimple, 800);
            (0..30)
                .map(|i| filter.dispatch(Point::new((i % 7) as f64, 1.0), i * 6).x)
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }
}
