// MIT/Apache2 License

use super::Event;
use crate::util::DebugContainer;
use core::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};
use std::sync::Arc;

// ids handed out by `SourceId::next`; zero is reserved for the toolkit itself
static NEXT_SOURCE: AtomicU64 = AtomicU64::new(1);

/// An opaque handle naming the window, component or tray icon an event belongs to.
///
/// The core never dereferences a source. It is resolved against a registry at delivery time,
/// and a source whose registration has disappeared is simply skipped.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceId(u64);

impl SourceId {
    /// The source used for events the toolkit posts to itself, such as invocations.
    pub const TOOLKIT: SourceId = SourceId(0);

    /// Allocate a fresh, process-unique source id.
    #[inline]
    pub fn next() -> SourceId {
        SourceId(NEXT_SOURCE.fetch_add(1, Ordering::Relaxed))
    }

    /// Get a `SourceId` from the raw value.
    #[inline]
    pub const fn from_raw(raw: u64) -> SourceId {
        SourceId(raw)
    }

    /// Get the raw value of this `SourceId`.
    #[inline]
    pub const fn into_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SourceId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The capability to receive an event on the dispatch thread.
pub trait Deliverable: Send + Sync {
    fn deliver(&self, event: &Event);
}

impl<F: Fn(&Event) + Send + Sync> Deliverable for F {
    #[inline]
    fn deliver(&self, event: &Event) {
        (self)(event)
    }
}

/// Something that can be registered as the destination of a source's events.
#[derive(Clone)]
pub enum DeliveryTarget {
    /// A top-level window.
    Window(Arc<dyn Deliverable>),
    /// A visual component living inside a container. `parent` is either another component or
    /// the window that contains it.
    Component {
        parent: SourceId,
        handler: Arc<dyn Deliverable>,
    },
    /// A tray-like object that lives outside of any window.
    Tray(Arc<dyn Deliverable>),
}

impl DeliveryTarget {
    /// Register a closure as a window target.
    #[inline]
    pub fn window<F: Fn(&Event) + Send + Sync + 'static>(f: F) -> Self {
        Self::Window(Arc::new(f))
    }

    /// Register a closure as a component target inside of `parent`.
    #[inline]
    pub fn component<F: Fn(&Event) + Send + Sync + 'static>(parent: SourceId, f: F) -> Self {
        Self::Component {
            parent,
            handler: Arc::new(f),
        }
    }

    /// Register a closure as a tray target.
    #[inline]
    pub fn tray<F: Fn(&Event) + Send + Sync + 'static>(f: F) -> Self {
        Self::Tray(Arc::new(f))
    }

    /// The container of this target, if it is a component.
    #[inline]
    pub fn parent(&self) -> Option<SourceId> {
        match self {
            Self::Component { parent, .. } => Some(*parent),
            _ => None,
        }
    }

    #[inline]
    pub fn is_window(&self) -> bool {
        matches!(self, Self::Window(_))
    }
}

impl Deliverable for DeliveryTarget {
    #[inline]
    fn deliver(&self, event: &Event) {
        match self {
            Self::Window(w) => w.deliver(event),
            Self::Component { handler, .. } => handler.deliver(event),
            Self::Tray(t) => t.deliver(event),
        }
    }
}

impl fmt::Debug for DeliveryTarget {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Window(w) => f
                .debug_tuple("Window")
                .field(&DebugContainer::new(w))
                .finish(),
            Self::Component { parent, handler } => f
                .debug_struct("Component")
                .field("parent", parent)
                .field("handler", &DebugContainer::new(handler))
                .finish(),
            Self::Tray(t) => f.debug_tuple("Tray").field(&DebugContainer::new(t)).finish(),
        }
    }
}
