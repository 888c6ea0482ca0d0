// MIT/Apache2 License

//! Configuration for the event queue and the modality space.

use crate::modal::ModalityType;
use std::time::Duration;

/// Properties of an event queue stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// The name given to the dispatch worker thread.
    pub thread_name: String,
    /// Whether posting starts a dispatch worker. Without one, the owner of the queue pumps it
    /// by hand with `pop_blocking` and `dispatch_event`.
    pub dispatch_worker: bool,
    /// How long an idle worker waits on an empty queue before it retires. `None` parks it
    /// until the stack closes or a shutdown wakeup arrives.
    pub idle_timeout: Option<Duration>,
    /// Whether paint, mouse motion and peer events are coalesced.
    pub coalescing: bool,
}

impl Default for QueueConfig {
    #[inline]
    fn default() -> Self {
        Self {
            thread_name: String::from("gui-events-dispatch"),
            dispatch_worker: true,
            idle_timeout: None,
            coalescing: true,
        }
    }
}

impl QueueConfig {
    /// A configuration without a dispatch worker, for queues pumped by their owner.
    #[inline]
    pub fn manual() -> Self {
        Self::default().with_dispatch_worker(false)
    }

    #[inline]
    pub fn with_thread_name<S: Into<String>>(mut self, name: S) -> Self {
        self.thread_name = name.into();
        self
    }

    #[inline]
    pub fn with_dispatch_worker(mut self, dispatch_worker: bool) -> Self {
        self.dispatch_worker = dispatch_worker;
        self
    }

    #[inline]
    pub fn with_idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    #[inline]
    pub fn with_coalescing(mut self, coalescing: bool) -> Self {
        self.coalescing = coalescing;
        self
    }
}

/// Properties of a modality space.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ModalityConfig {
    // one bit per modality type
    supported: u8,
    /// Whether toolkit-modal dialogs may be created at all.
    pub allow_toolkit_modal: bool,
}

impl Default for ModalityConfig {
    #[inline]
    fn default() -> Self {
        Self {
            supported: ModalityType::ALL
                .iter()
                .fold(0, |bits, ty| bits | ty.bit()),
            allow_toolkit_modal: false,
        }
    }
}

impl ModalityConfig {
    /// Is this modality type available? Modeless always is.
    #[inline]
    pub fn is_supported(&self, ty: ModalityType) -> bool {
        ty == ModalityType::Modeless || self.supported & ty.bit() != 0
    }

    #[inline]
    pub fn with_supported(mut self, ty: ModalityType, supported: bool) -> Self {
        if supported {
            self.supported |= ty.bit();
        } else {
            self.supported &= !ty.bit();
        }
        self
    }

    #[inline]
    pub fn with_toolkit_modal(mut self, allow: bool) -> Self {
        self.allow_toolkit_modal = allow;
        self
    }
}
