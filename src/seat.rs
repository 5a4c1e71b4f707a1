//! Seats: groups of input devices nominally controlled by one user
//!
//! A seat is identified by a (physical-name, logical-name) pair. The physical
//! name is supplied by the host and immutable; the logical name may change,
//! which destroys and recreates the member devices (see
//! [`Context::set_seat_logical_name`](crate::context::Context::set_seat_logical_name)).
//!
//! The seat also owns the cross-device bookkeeping the event stream exposes:
//! monotonically maintained pressed-counters per key and button code, and the
//! dense seat-slot index space shared by every touch device on the seat.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct SeatInner {
    logical_name: String,
    key_counts: HashMap<u32, u32>,
    button_counts: HashMap<u32, u32>,
    slots: Vec<bool>,
}

#[derive(Debug)]
pub(crate) struct SeatRc {
    physical_name: String,
    inner: Mutex<SeatInner>,
}

/// A Seat handle
///
/// This is a handle to the inner logic, it can be cloned; handles compare
/// equal when they refer to the same seat.
#[derive(Debug, Clone)]
pub struct Seat {
    pub(crate) rc: Arc<SeatRc>,
}

impl Seat {
    pub(crate) fn new(physical_name: &str, logical_name: &str) -> Self {
        Seat {
            rc: Arc::new(SeatRc {
                physical_name: physical_name.to_owned(),
                inner: Mutex::new(SeatInner {
                    logical_name: logical_name.to_owned(),
                    ..Default::default()
                }),
            }),
        }
    }

    /// The physical name of the seat, fixed at creation
    pub fn physical_name(&self) -> &str {
        &self.rc.physical_name
    }

    /// The current logical name of the seat
    pub fn logical_name(&self) -> String {
        self.rc.inner.lock().unwrap().logical_name.clone()
    }

    pub(crate) fn set_logical_name(&self, name: &str) {
        self.rc.inner.lock().unwrap().logical_name = name.to_owned();
    }

    /// Number of keys of `code` currently pressed across the seat
    pub fn key_count(&self, code: u32) -> u32 {
        *self
            .rc
            .inner
            .lock()
            .unwrap()
            .key_counts
            .get(&code)
            .unwrap_or(&0)
    }

    /// Number of buttons of `code` currently pressed across the seat
    pub fn button_count(&self, code: u32) -> u32 {
        *self
            .rc
            .inner
            .lock()
            .unwrap()
            .button_counts
            .get(&code)
            .unwrap_or(&0)
    }

    /// Apply a key transition, returning the post-transition seat count
    pub(crate) fn update_key_count(&self, code: u32, pressed: bool) -> u32 {
        let mut inner = self.rc.inner.lock().unwrap();
        let count = inner.key_counts.entry(code).or_insert(0);
        if pressed {
            *count += 1;
        } else if *count > 0 {
            *count -= 1;
        } else {
            tracing::error!(code, "key released with a zero seat count");
        }
        *count
    }

    /// Apply a button transition, returning the post-transition seat count
    pub(crate) fn update_button_count(&self, code: u32, pressed: bool) -> u32 {
        let mut inner = self.rc.inner.lock().unwrap();
        let count = inner.button_counts.entry(code).or_insert(0);
        if pressed {
            *count += 1;
        } else if *count > 0 {
            *count -= 1;
        } else {
            tracing::error!(code, "button released with a zero seat count");
        }
        *count
    }

    /// Reserve the lowest free seat slot
    ///
    /// Seat slots form a contiguous set of assigned integers: a new touch
    /// always takes the smallest index not currently in use.
    pub(crate) fn acquire_slot(&self) -> u32 {
        let mut inner = self.rc.inner.lock().unwrap();
        if let Some(idx) = inner.slots.iter().position(|used| !used) {
            inner.slots[idx] = true;
            idx as u32
        } else {
            inner.slots.push(true);
            (inner.slots.len() - 1) as u32
        }
    }

    /// Return a seat slot to the pool
    pub(crate) fn release_slot(&self, slot: u32) {
        let mut inner = self.rc.inner.lock().unwrap();
        match inner.slots.get_mut(slot as usize) {
            Some(used @ true) => *used = false,
            _ => tracing::error!(slot, "released a seat slot that was not assigned"),
        }
    }
}

impl PartialEq for Seat {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.rc, &other.rc)
    }
}

impl Eq for Seat {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_counts_follow_transitions() {
        let seat = Seat::new("seat0", "default");
        assert_eq!(seat.update_key_count(30, true), 1);
        assert_eq!(seat.update_key_count(30, true), 2);
        assert_eq!(seat.update_key_count(30, false), 1);
        assert_eq!(seat.key_count(30), 1);
        assert_eq!(seat.update_key_count(30, false), 0);
    }

    #[test]
    fn slots_are_dense() {
        let seat = Seat::new("seat0", "default");
        assert_eq!(seat.acquire_slot(), 0);
        assert_eq!(seat.acquire_slot(), 1);
        assert_eq!(seat.acquire_slot(), 2);
        seat.release_slot(1);
        // lowest free index is reused
        assert_eq!(seat.acquire_slot(), 1);
        assert_eq!(seat.acquire_slot(), 3);
    }

    #[test]
    fn handles_compare_by_identity() {
        let a = Seat::new("seat0", "default");
        let b = a.clone();
        let c = Seat::new("seat0", "default");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
