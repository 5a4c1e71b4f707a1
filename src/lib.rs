#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
// Allow acronyms like DWT
#![allow(clippy::upper_case_acronyms)]

//! # smithay-input: an input-device processing library
//!
//! This crate turns raw kernel evdev byte streams from pointing, touch, keyboard,
//! tablet and pad devices into a semantically clean, device-independent event
//! stream suitable for a wayland compositor — "pointer moved", "two-finger
//! scrolled", "pen entered proximity" instead of `ABS_MT_SLOT 3,
//! ABS_MT_TRACKING_ID 247`.
//!
//! ## Structure of the crate
//!
//! The [`context`] module holds the process-wide [`Context`](context::Context):
//! it owns the outgoing event queue, the device registry, the seats and the
//! timer wheel, and drives every per-device state machine from its
//! [`dispatch`](context::Context::dispatch) call. Devices are described to the
//! context through [`device::DeviceInfo`] and fed through the pinned
//! [`evdev::EventSource`] interface; everything the library produces comes back
//! out as [`event::Event`] values pulled from the context queue.
//!
//! The per-device processing pipelines — the touchpad gesture engine with its
//! tap, soft-button, edge-scroll and disable-while-typing machinery, the
//! tablet tool proximity engine, the pad ring/strip engine and the keyboard
//! remapper — are internal to the crate; they are configured through the
//! option surface on [`device::Device`] and observed through the event stream
//! only.
//!
//! ## Concurrency model
//!
//! The context is single-threaded and cooperative: all state mutation happens
//! inside calls made from the thread owning the [`Context`](context::Context).
//! The only suspension point is the caller's blocking wait on
//! [`Context::fd`](context::Context::fd); timers do not run on their own
//! thread but are polled and fired from within `dispatch`.
//!
//! ## Logging
//!
//! This crate logs through [`tracing`]. Install a subscriber (for example
//! `tracing_subscriber::fmt`) to see device lifecycle messages and state
//! machine diagnostics.

pub mod context;
pub mod device;
pub mod evdev;
pub mod event;
pub mod seat;
pub mod utils;

pub(crate) mod dispatch;
pub(crate) mod filter;
pub(crate) mod timer;

pub use context::Context;
pub use device::Device;
pub use event::Event;
pub use seat::Seat;
