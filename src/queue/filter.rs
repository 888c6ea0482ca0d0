// MIT/Apache2 License

use crate::event::Event;
use std::sync::Arc;

/// What an [`EventFilter`] wants done with an event.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FilterAction {
    /// Let the next filter down the stack decide.
    Accept,
    /// Consume the event without delivering it.
    Reject,
    /// Deliver the event without asking the remaining filters.
    AcceptImmediately,
}

/// A filter installed by a secondary loop for as long as the loop runs.
pub trait EventFilter: Send + Sync {
    fn accept(&self, event: &Event) -> FilterAction;
}

impl<F: Fn(&Event) -> FilterAction + Send + Sync> EventFilter for F {
    #[inline]
    fn accept(&self, event: &Event) -> FilterAction {
        (self)(event)
    }
}

/// Run `event` through the filter stack, innermost loop first.
pub(crate) fn accepts(filters: &[Arc<dyn EventFilter>], event: &Event) -> bool {
    for filter in filters.iter().rev() {
        match filter.accept(event) {
            FilterAction::Reject => return false,
            FilterAction::AcceptImmediately => return true,
            FilterAction::Accept => (),
        }
    }

    true
}
