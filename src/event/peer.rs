// MIT/Apache2 License

use super::Priority;
use core::{any::Any, fmt, ops};
use std::sync::Arc;

/// The payload of a peer event: a message from the native peer layer that the toolkit does not
/// interpret, but that may know how to merge itself with a newer message of the same sort.
pub trait PeerPayload: fmt::Debug + Send + Sync + 'static {
    /// Merge `newer` into this pending payload. Returning `None` keeps both events queued.
    #[inline]
    fn coalesce(&self, newer: &dyn PeerPayload) -> Option<Arc<dyn PeerPayload>> {
        let _ = newer;
        None
    }

    fn as_any(&self) -> &dyn Any;
}

/// Flags that select the lane a peer event is posted to.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct PeerFlags(u8);

impl PeerFlags {
    pub const NONE: PeerFlags = PeerFlags(0);
    /// Post to the high priority lane.
    pub const PRIORITY: PeerFlags = PeerFlags(1);
    /// Post to the ultimate lane, ahead of everything else.
    pub const ULTIMATE: PeerFlags = PeerFlags(1 << 1);
    /// Post to the low priority lane.
    pub const LOW: PeerFlags = PeerFlags(1 << 2);

    #[inline]
    pub fn contains(self, other: PeerFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl ops::BitOr for PeerFlags {
    type Output = PeerFlags;

    #[inline]
    fn bitor(self, rhs: PeerFlags) -> PeerFlags {
        PeerFlags(self.0 | rhs.0)
    }
}

/// A peer-originated event.
#[derive(Debug, Clone)]
pub struct PeerEvent {
    flags: PeerFlags,
    payload: Arc<dyn PeerPayload>,
}

impl PeerEvent {
    #[inline]
    pub fn new<P: PeerPayload>(flags: PeerFlags, payload: P) -> Self {
        Self {
            flags,
            payload: Arc::new(payload),
        }
    }

    #[inline]
    pub fn flags(&self) -> PeerFlags {
        self.flags
    }

    #[inline]
    pub fn payload(&self) -> &dyn PeerPayload {
        &*self.payload
    }

    /// Ultimate wins over priority, which wins over low.
    #[inline]
    pub fn priority(&self) -> Priority {
        if self.flags.contains(PeerFlags::ULTIMATE) {
            Priority::Ultimate
        } else if self.flags.contains(PeerFlags::PRIORITY) {
            Priority::High
        } else if self.flags.contains(PeerFlags::LOW) {
            Priority::Low
        } else {
            Priority::Normal
        }
    }

    /// Ask the pending payload to absorb `newer`. On success the payload is replaced in place.
    #[inline]
    pub(crate) fn coalesce_with(&mut self, newer: &PeerEvent) -> bool {
        match self.payload.coalesce(newer.payload()) {
            Some(merged) => {
                self.payload = merged;
                true
            }
            None => false,
        }
    }
}
