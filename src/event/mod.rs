// MIT/Apache2 License

//! Events and the identities they are addressed to.
//!
//! An [`Event`] is created by the platform translation layer (or synthesized by the focus and
//! modality coordinators), posted to an [`EventQueue`](crate::queue::EventQueue) and finally
//! handed to the [`Deliverable`] registered for its source. The queue never looks inside an
//! event beyond its [`Priority`] and its coalescing class.

mod event;
mod peer;
mod priority;
mod source;

pub use event::*;
pub use peer::*;
pub use priority::*;
pub use source::*;

/// Operations of the event loop
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EventLoopAction {
    Continue,
    Break,
}

impl EventLoopAction {
    #[inline]
    pub fn is_break(&self) -> bool {
        match self {
            Self::Continue => false,
            Self::Break => true,
        }
    }
}
