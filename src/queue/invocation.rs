// MIT/Apache2 License

use super::EventQueue;
use crate::event::{Event, Invocation, InvocationOutcome};

impl EventQueue {
    /// Post `f` to be run on the dispatch thread, after every event already queued in its lane.
    ///
    /// # Errors
    ///
    /// Fails like [`EventQueue::post`].
    #[inline]
    pub fn invoke_later<F: FnOnce() + Send + 'static>(&self, f: F) -> crate::Result {
        self.post(Event::invocation(Invocation::new(f)))
    }

    /// Post `f` to be run on the dispatch thread and block until it has run.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvokeFromDispatchThread` immediately when called from the dispatch
    /// thread, since waiting there could never finish. Returns `Error::InvocationPanicked` if
    /// `f` panicked, and `Error::InvocationDropped` if the event was disposed of before it ran
    /// (for instance because the queue was closed).
    pub fn invoke_and_wait<F: FnOnce() + Send + 'static>(&self, f: F) -> crate::Result {
        if self.is_dispatch_thread() {
            return Err(crate::Error::InvokeFromDispatchThread);
        }

        let (tx, rx) = flume::bounded(1);
        self.post(Event::invocation(Invocation::with_notifier(f, tx)))?;

        match rx.recv() {
            Ok(InvocationOutcome::Completed) => Ok(()),
            Ok(InvocationOutcome::Panicked) => Err(crate::Error::InvocationPanicked),
            Err(_) => Err(crate::Error::InvocationDropped),
        }
    }
}
