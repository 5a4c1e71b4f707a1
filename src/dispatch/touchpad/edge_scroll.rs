//! Edge scrolling
//!
//! On touchpads without two-finger scrolling (or when configured), a single
//! finger landing in the right-edge vertical strip or the bottom-edge
//! horizontal strip and dwelling there becomes a scroll finger: its travel
//! along the strip turns into scroll events, and once scrolling has begun the
//! finger may wander out of the strip — the dominant axis keeps scrolling
//! until lift, which emits a scroll stop.

use crate::event::Axis;
use crate::utils::{Point, Raw};

/// Which strip a touch landed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Edge {
    /// Rightmost vertical strip, scrolls vertically
    Right,
    /// Bottommost horizontal strip, scrolls horizontally
    Bottom,
}

impl Edge {
    /// The scroll axis of this strip
    pub(super) fn axis(self) -> Axis {
        match self {
            Edge::Right => Axis::Vertical,
            Edge::Bottom => Axis::Horizontal,
        }
    }

    /// The component of `delta` along this strip's scroll axis
    pub(super) fn travel(self, delta: Point<Raw>) -> f64 {
        match self {
            Edge::Right => delta.y,
            Edge::Bottom => delta.x,
        }
    }
}

/// Edge-scroll life cycle of one touch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum EdgeState {
    /// Not an edge touch
    None,
    /// Landed in a strip; waiting for the dwell timeout or trigger motion
    New { edge: Edge, since: u64 },
    /// Scrolling; travel along the axis becomes scroll events
    Active { edge: Edge },
    /// Demoted to a normal touch (left the strip before activating)
    Area,
}

/// Travel along the strip axis that activates scrolling before the timeout
pub(super) const EDGE_TRIGGER_MM: f64 = 2.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scroll_their_axis() {
        let delta = Point::new(3.0, -7.0);
        assert_eq!(Edge::Right.axis(), Axis::Vertical);
        assert_eq!(Edge::Right.travel(delta), -7.0);
        assert_eq!(Edge::Bottom.axis(), Axis::Horizontal);
        assert_eq!(Edge::Bottom.travel(delta), 3.0);
    }
}
