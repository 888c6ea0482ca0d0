// MIT/Apache2 License

//! `gui-events` is the event-delivery core of a windowing toolkit: a priority event queue with a
//! dispatch worker, the modal blocking protocol, and the type-ahead queue that keeps key events
//! in line with focus changes.
//!
//! ## Overview
//!
//! * [`queue`] - The event queue. Events are posted from any thread into one of four priority
//!   lanes, coalesced where possible, and drained by a single dispatch worker. Queues stack, and
//!   secondary loops pump events while a caller waits.
//! * [`modal`] - The modality space, which decides which windows a modal dialog blocks.
//! * [`focus`] - The type-ahead queue and the focus manager.
//! * [`runtime`] - Ties the above together and routes every dispatched event to the target
//!   registered for its source.
//!
//! ## Features
//!
//! * `pl` - Enables use of `parking_lot` mutexes, read/write locks and condition variables instead
//!   of the ones in the standard library.

#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod event;
pub mod focus;
pub mod geometry;
pub mod modal;
pub(crate) mod mutex;
pub mod queue;
pub mod runtime;
pub(crate) mod util;

pub use error::*;
