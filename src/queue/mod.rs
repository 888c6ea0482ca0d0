// MIT/Apache2 License

//! The event queue.
//!
//! An [`EventQueue`] holds events in four priority lanes (low, normal, high and ultimate).
//! Higher lanes always drain first; within a lane events come out in the order they were
//! posted. Paint, mouse-motion and peer events are coalesced with an equivalent event of the
//! same source that is still pending, which bounds queue growth while the dispatch thread is
//! busy.
//!
//! Queues live in a stack. [`EventQueue::push`] installs a new queue on top that intercepts all
//! further traffic, and [`EventQueue::pop`] removes it again; pending events move along in
//! both directions. Posting through any handle of the stack always lands in the top queue, and
//! the dispatch worker always drains the top queue.
//!
//! The worker thread is started lazily by the first post and delivers every event to the
//! [`Dispatch`] the stack was created with. [`SecondaryLoop`] lets a caller block until some
//! condition holds while events keep flowing, which is what modal dialogs are built on.
//!
//! ```
//! use gui_events::{
//!     config::QueueConfig,
//!     event::{Event, SourceId},
//!     queue::EventQueue,
//! };
//!
//! // without a dispatch worker, the caller pumps the queue itself
//! let queue = EventQueue::new(QueueConfig::default().with_dispatch_worker(false), |_ev: Event| {});
//! let source = SourceId::next();
//! queue.post(Event::custom(source, 1)).unwrap();
//! queue.post(Event::custom(source, 2)).unwrap();
//!
//! let first = queue.pop_blocking().unwrap();
//! assert_eq!(first.source(), source);
//! assert_eq!(queue.len(), 1);
//! ```

mod coalesce;
mod filter;
mod invocation;
mod lanes;
mod secondary;
mod stack;
mod worker;

pub use coalesce::{Coalesce, SourceCoalescer};
pub use filter::{EventFilter, FilterAction};
pub use secondary::SecondaryLoop;

use crate::{
    config::QueueConfig,
    event::{Event, EventClass, SourceId},
};
use core::{
    fmt,
    sync::atomic::Ordering,
};
use lanes::Posted;
use stack::{QueueId, Shared};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

/// Receives every event the dispatch thread takes off the queue, apart from invocations,
/// which the queue runs itself.
pub trait Dispatch: Send + Sync {
    fn dispatch(&self, event: Event);
}

impl<F: Fn(Event) + Send + Sync> Dispatch for F {
    #[inline]
    fn dispatch(&self, event: Event) {
        (self)(event)
    }
}

/// A handle to one queue of a queue stack. Handles are cheap to clone.
///
/// When the last handle of a stack is dropped the stack closes: the worker retires and pending
/// events are disposed of.
pub struct EventQueue {
    shared: Arc<Shared>,
    id: QueueId,
}

impl EventQueue {
    /// Create a new queue stack with a single queue in it.
    #[inline]
    pub fn new<D: Dispatch + 'static>(config: QueueConfig, dispatcher: D) -> Self {
        Self::with_dispatcher(config, Arc::new(dispatcher))
    }

    /// Create a new queue stack that delivers to a shared dispatcher.
    #[inline]
    pub fn with_dispatcher(config: QueueConfig, dispatcher: Arc<dyn Dispatch>) -> Self {
        let id = QueueId::next();
        let shared = Arc::new(Shared::new(id, config, dispatcher));
        Self::attach(&shared, id)
    }

    #[inline]
    fn attach(shared: &Arc<Shared>, id: QueueId) -> Self {
        shared.handles.fetch_add(1, Ordering::AcqRel);
        Self {
            shared: Arc::clone(shared),
            id,
        }
    }

    /// The configuration this queue stack was created with.
    #[inline]
    pub fn config(&self) -> &QueueConfig {
        &self.shared.config
    }

    /// Post an event. It lands in the top queue of the stack, whichever handle is used.
    ///
    /// If an equivalent event of the same source is still pending, the two may be coalesced,
    /// in which case no new entry is added. The first post starts the dispatch worker.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidEvent` if the event already went through a queue, and
    /// `Error::QueueDetached` if this queue was popped off its stack. In both cases nothing is
    /// queued. If the dispatch worker cannot be spawned, the event is not queued either.
    pub fn post(&self, mut event: Event) -> crate::Result {
        if event.is_posted() {
            return Err(crate::Error::InvalidEvent("the event was already posted"));
        }

        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        state.check_attached(self.id)?;

        if self.shared.config.dispatch_worker && state.worker.is_none() {
            worker::start(&self.shared, state)?;
        }

        log::trace!(
            "Posting event {} ({:?}) from {} at {:?}",
            event.id(),
            event.class(),
            event.source(),
            event.priority()
        );

        event.mark_posted();
        let was_empty = state.top().lanes.is_empty();
        if state.enqueue(event, self.shared.config.coalescing) == Posted::Appended {
            state.busy = true;
            if was_empty {
                self.shared.cond.notify_all();
            }
        }

        Ok(())
    }

    /// Remove the next event, blocking while the stack is empty.
    ///
    /// # Errors
    ///
    /// Returns `Error::ShutDown` if a shutdown wakeup arrives (or the stack closes) while
    /// waiting, and `Error::QueueDetached` if this queue is popped off the stack.
    #[inline]
    pub fn pop_blocking(&self) -> crate::Result<Event> {
        match self.next_event(None)? {
            Some(event) => Ok(event),
            None => Err(crate::Error::ShutDown),
        }
    }

    /// Like [`pop_blocking`](EventQueue::pop_blocking), but gives up after `timeout`.
    ///
    /// # Errors
    ///
    /// See [`pop_blocking`](EventQueue::pop_blocking).
    #[inline]
    pub fn pop_timeout(&self, timeout: Duration) -> crate::Result<Option<Event>> {
        self.next_event(Some(Instant::now() + timeout))
    }

    fn next_event(&self, deadline: Option<Instant>) -> crate::Result<Option<Event>> {
        let mut state = self.shared.state.lock();
        state.check_attached(self.id)?;
        let shutdown_seen = state.shutdown_generation;

        loop {
            if let Some(event) = state.pop_next() {
                return Ok(Some(event));
            }
            if state.closed || state.shutdown_generation != shutdown_seen {
                return Err(crate::Error::ShutDown);
            }

            match deadline {
                None => state = self.shared.cond.wait(state),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(None);
                    }
                    let (s, _) = self.shared.cond.wait_timeout(state, deadline - now);
                    state = s;
                }
            }

            state.check_attached(self.id)?;
        }
    }

    /// Deliver an event the way the dispatch worker would: through the filters of every
    /// running secondary loop, then to the dispatcher. Used when pumping a stack that has no
    /// dispatch worker.
    #[inline]
    pub fn dispatch_event(&self, event: Event) {
        let _pumping = self.shared.pumping();
        let filters = self.shared.state.lock().filters();
        worker::deliver(&self.shared, event, &filters);
        self.shared.after_dispatch();
    }

    /// Look at the next event without removing it.
    ///
    /// # Errors
    ///
    /// Returns `Error::QueueDetached` if this queue was popped off its stack.
    #[inline]
    pub fn peek<R, F: FnOnce(&Event) -> R>(&self, f: F) -> crate::Result<Option<R>> {
        let state = self.shared.state.lock();
        state.check_attached(self.id)?;
        Ok(state.top().lanes.peek().map(f))
    }

    /// Look at the first pending event of the given class, highest lane first.
    ///
    /// # Errors
    ///
    /// Returns `Error::QueueDetached` if this queue was popped off its stack.
    #[inline]
    pub fn peek_class<R, F: FnOnce(&Event) -> R>(
        &self,
        class: EventClass,
        f: F,
    ) -> crate::Result<Option<R>> {
        let state = self.shared.state.lock();
        state.check_attached(self.id)?;
        Ok(state.top().lanes.peek_class(class).map(f))
    }

    /// The number of pending events.
    #[inline]
    pub fn len(&self) -> usize {
        self.shared.state.lock().top().lanes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.shared.state.lock().top().lanes.is_empty()
    }

    /// `true` when nothing is pending and the worker has drained everything it was handed.
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.shared.state.lock().is_idle()
    }

    /// Wake every thread waiting on this stack so it re-evaluates what it is waiting for.
    /// With `is_shutdown`, blocking pops fail with `Error::ShutDown` and the dispatch worker
    /// retires as soon as the queue is empty. Does nothing if nobody is waiting.
    #[inline]
    pub fn wakeup(&self, is_shutdown: bool) {
        {
            let mut state = self.shared.state.lock();
            state.wake_generation += 1;
            if is_shutdown {
                state.shutdown_generation += 1;
            }
        }
        self.shared.cond.notify_all();
    }

    /// Install a new queue on top of the stack and return a handle to it. Every pending event
    /// moves into the new queue, in order, and the dispatch worker drains it from now on.
    ///
    /// # Errors
    ///
    /// Returns `Error::QueueDetached` if this queue was popped off its stack.
    pub fn push(&self) -> crate::Result<EventQueue> {
        let id = QueueId::next();
        {
            let mut state = self.shared.state.lock();
            state.check_attached(self.id)?;
            let below = state.top().id;
            state.push_layer(id);
            log::debug!(
                "Pushed {} over {} ({} pending events moved)",
                id,
                below,
                state.top().lanes.len()
            );
        }
        self.shared.cond.notify_all();
        Ok(Self::attach(&self.shared, id))
    }

    /// Remove the top queue of the stack, moving its pending events into the queue below.
    /// Handles to the removed queue stop accepting events.
    ///
    /// # Errors
    ///
    /// Returns `Error::EmptyQueueStack` if there is no queue below the top, and
    /// `Error::QueueDetached` if this queue was already popped off its stack.
    pub fn pop(&self) -> crate::Result {
        {
            let mut state = self.shared.state.lock();
            state.check_attached(self.id)?;
            let popped = state.pop_layer()?;
            log::debug!(
                "Popped {}, {} is on top ({} pending events moved)",
                popped,
                state.top().id,
                state.top().lanes.len()
            );
        }
        self.shared.cond.notify_all();
        Ok(())
    }

    /// The number of queues in the stack.
    #[inline]
    pub fn depth(&self) -> usize {
        self.shared.state.lock().depth()
    }

    /// Is this the top queue of its stack, the one that accepts posts and feeds the worker?
    #[inline]
    pub fn is_top(&self) -> bool {
        self.shared.state.lock().top().id == self.id
    }

    /// Is this handle still part of its stack?
    #[inline]
    pub fn is_attached(&self) -> bool {
        self.shared.state.lock().contains(self.id)
    }

    /// Is the dispatch worker running, and is this the queue it drains?
    #[inline]
    pub fn owns_dispatch_worker(&self) -> bool {
        let state = self.shared.state.lock();
        state.worker.is_some() && state.top().id == self.id
    }

    /// Is the calling thread dispatching events of this stack? That is the worker, or a thread
    /// inside [`dispatch_event`](EventQueue::dispatch_event) or a pumping secondary loop.
    #[inline]
    pub fn is_dispatch_thread(&self) -> bool {
        self.shared.state.lock().is_worker_thread()
    }

    /// Remove every pending event of `source`, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `Error::QueueDetached` if this queue was popped off its stack.
    pub fn remove_source_events(&self, source: SourceId) -> crate::Result<usize> {
        let removed = {
            let mut state = self.shared.state.lock();
            state.check_attached(self.id)?;
            state.remove_source(source)
        };
        log::debug!("Removed {} pending events of {}", removed.len(), source);
        Ok(removed.len())
    }

    /// Register a hook deciding how paint and mouse events of `source` coalesce.
    #[inline]
    pub fn set_source_coalescer<C: SourceCoalescer + 'static>(&self, source: SourceId, coalescer: C) {
        self.shared
            .state
            .lock()
            .coalescers
            .insert(source, Arc::new(coalescer));
    }

    #[inline]
    pub fn remove_source_coalescer(&self, source: SourceId) {
        self.shared.state.lock().coalescers.remove(&source);
    }

    /// Create a secondary loop on this stack.
    #[inline]
    pub fn secondary_loop(&self) -> SecondaryLoop {
        SecondaryLoop::new(self.clone())
    }
}

impl Clone for EventQueue {
    #[inline]
    fn clone(&self) -> Self {
        Self::attach(&self.shared, self.id)
    }
}

impl Drop for EventQueue {
    #[inline]
    fn drop(&mut self) {
        if self.shared.handles.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.shared.close();
        }
    }
}

impl fmt::Debug for EventQueue {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventQueue({})", self.id)
    }
}
