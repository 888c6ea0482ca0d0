// MIT/Apache2 License

use super::{
    coalesce::SourceCoalescer,
    filter::EventFilter,
    lanes::{Lanes, Posted},
    secondary::LoopId,
    worker::WorkerState,
    Dispatch,
};
use crate::{
    config::QueueConfig,
    event::{Event, SourceId},
    mutex::{Condvar, Mutex},
    util::Map,
};
use core::{
    fmt,
    sync::atomic::{AtomicU64, AtomicUsize, Ordering},
};
use std::{
    sync::Arc,
    thread::{self, ThreadId},
};

static NEXT_QUEUE: AtomicU64 = AtomicU64::new(1);

/// Identifies one queue within a stack.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(crate) struct QueueId(u64);

impl QueueId {
    #[inline]
    pub(crate) fn next() -> QueueId {
        QueueId(NEXT_QUEUE.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for QueueId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "queue-{}", self.0)
    }
}

pub(crate) struct Layer {
    pub(crate) id: QueueId,
    pub(crate) lanes: Lanes,
}

impl Layer {
    #[inline]
    pub(crate) fn new(id: QueueId) -> Self {
        Self {
            id,
            lanes: Lanes::default(),
        }
    }
}

/// A secondary loop that is currently running, and the filter it installed.
pub(crate) struct LoopEntry {
    pub(crate) id: LoopId,
    pub(crate) filter: Option<Arc<dyn EventFilter>>,
}

/// Everything guarded by the stack lock: every queue in the stack, the worker bookkeeping and
/// the set of running secondary loops.
pub(crate) struct StackState {
    bottom: Layer,
    // pushed queues, innermost last
    pushed: Vec<Layer>,
    next_seq: u64,
    pub(crate) worker: Option<WorkerState>,
    pub(crate) worker_generation: u64,
    // set on post, cleared when the worker finds the queue empty
    pub(crate) busy: bool,
    // bumped by every wakeup and every push/pop so waiters re-evaluate
    pub(crate) wake_generation: u64,
    pub(crate) shutdown_generation: u64,
    pub(crate) dispatch_generation: u64,
    pub(crate) loops: Vec<LoopEntry>,
    pub(crate) foreign_waiters: usize,
    // threads pumping events by hand, outside the worker
    pumping: Vec<ThreadId>,
    pub(crate) coalescers: Map<SourceId, Arc<dyn SourceCoalescer>>,
    pub(crate) closed: bool,
}

impl StackState {
    #[inline]
    pub(crate) fn new(root: QueueId) -> Self {
        Self {
            bottom: Layer::new(root),
            pushed: Vec::new(),
            next_seq: 0,
            worker: None,
            worker_generation: 0,
            busy: false,
            wake_generation: 0,
            shutdown_generation: 0,
            dispatch_generation: 0,
            loops: Vec::new(),
            foreign_waiters: 0,
            pumping: Vec::new(),
            coalescers: Map::default(),
            closed: false,
        }
    }

    /// The authoritative queue: the only one that holds events and the one the worker drains.
    #[inline]
    pub(crate) fn top(&self) -> &Layer {
        self.pushed.last().unwrap_or(&self.bottom)
    }

    #[inline]
    pub(crate) fn top_mut(&mut self) -> &mut Layer {
        match self.pushed.last_mut() {
            Some(layer) => layer,
            None => &mut self.bottom,
        }
    }

    #[inline]
    pub(crate) fn depth(&self) -> usize {
        self.pushed.len() + 1
    }

    #[inline]
    pub(crate) fn contains(&self, id: QueueId) -> bool {
        self.bottom.id == id || self.pushed.iter().any(|layer| layer.id == id)
    }

    #[inline]
    pub(crate) fn check_attached(&self, id: QueueId) -> crate::Result {
        if self.contains(id) {
            Ok(())
        } else {
            Err(crate::Error::QueueDetached)
        }
    }

    /// Install a new, empty queue on top and move every pending event into it.
    pub(crate) fn push_layer(&mut self, id: QueueId) {
        let mut layer = Layer::new(id);
        self.top_mut().lanes.drain_into(&mut layer.lanes);
        self.pushed.push(layer);
        self.wake_generation += 1;
    }

    /// Remove the top queue, moving its pending events into the one below.
    pub(crate) fn pop_layer(&mut self) -> crate::Result<QueueId> {
        let mut top = self.pushed.pop().ok_or(crate::Error::EmptyQueueStack)?;
        top.lanes.drain_into(&mut self.top_mut().lanes);
        self.wake_generation += 1;
        Ok(top.id)
    }

    #[inline]
    pub(crate) fn enqueue(&mut self, event: Event, coalescing: bool) -> Posted {
        let seq = self.next_seq;
        self.next_seq += 1;
        let custom = self.coalescers.get(&event.source()).cloned();
        self.top_mut()
            .lanes
            .insert(event, seq, coalescing, custom.as_deref())
    }

    #[inline]
    pub(crate) fn pop_next(&mut self) -> Option<Event> {
        self.top_mut().lanes.pop_front()
    }

    /// Filters of every running secondary loop, outermost first.
    #[inline]
    pub(crate) fn filters(&self) -> Vec<Arc<dyn EventFilter>> {
        self.loops
            .iter()
            .filter_map(|entry| entry.filter.clone())
            .collect()
    }

    #[inline]
    pub(crate) fn loop_active(&self, id: LoopId) -> bool {
        self.loops.iter().any(|entry| entry.id == id)
    }

    #[inline]
    pub(crate) fn remove_loop(&mut self, id: LoopId) -> bool {
        let before = self.loops.len();
        self.loops.retain(|entry| entry.id != id);
        before != self.loops.len()
    }

    #[inline]
    pub(crate) fn is_idle(&self) -> bool {
        !self.busy && self.top().lanes.is_empty()
    }

    /// Is the calling thread dispatching events of this stack, either as the worker or by
    /// pumping them itself?
    #[inline]
    pub(crate) fn is_worker_thread(&self) -> bool {
        let current = thread::current().id();
        self.worker.as_ref().map_or(false, |w| w.thread == current)
            || self.pumping.contains(&current)
    }

    /// Every pending event of every queue, for disposal.
    pub(crate) fn take_all(&mut self) -> Vec<Event> {
        let mut events = self.bottom.lanes.take_all();
        for layer in self.pushed.iter_mut() {
            events.extend(layer.lanes.take_all());
        }
        events
    }

    pub(crate) fn remove_source(&mut self, source: SourceId) -> Vec<Event> {
        let mut events = self.bottom.lanes.remove_source(source);
        for layer in self.pushed.iter_mut() {
            events.extend(layer.lanes.remove_source(source));
        }
        events
    }
}

/// State shared between every handle of a queue stack and its dispatch worker.
pub(crate) struct Shared {
    pub(crate) state: Mutex<StackState>,
    pub(crate) cond: Condvar,
    pub(crate) config: QueueConfig,
    pub(crate) dispatcher: Arc<dyn Dispatch>,
    // live `EventQueue` handles; the stack closes when the last one goes away
    pub(crate) handles: AtomicUsize,
}

impl Shared {
    #[inline]
    pub(crate) fn new(root: QueueId, config: QueueConfig, dispatcher: Arc<dyn Dispatch>) -> Self {
        Self {
            state: Mutex::new(StackState::new(root)),
            cond: Condvar::new(),
            config,
            dispatcher,
            handles: AtomicUsize::new(0),
        }
    }

    /// Record that an event was dispatched, waking foreign threads whose secondary loop
    /// predicate may have changed.
    #[inline]
    pub(crate) fn after_dispatch(&self) {
        let mut state = self.state.lock();
        state.dispatch_generation += 1;
        if state.foreign_waiters > 0 {
            self.cond.notify_all();
        }
    }

    /// Mark the calling thread as a dispatch thread until the guard is dropped.
    #[inline]
    pub(crate) fn pumping(&self) -> Pumping<'_> {
        self.state.lock().pumping.push(thread::current().id());
        Pumping { shared: self }
    }

    /// Shut the stack down: the worker retires and every pending event is disposed of.
    pub(crate) fn close(&self) {
        let disposed = {
            let mut state = self.state.lock();
            state.closed = true;
            state.loops.clear();
            state.take_all()
        };
        self.cond.notify_all();

        log::debug!(
            "Closing event queue stack, disposing of {} pending events",
            disposed.len()
        );
        // dropped outside the lock, since invocations run arbitrary destructors
        drop(disposed);
    }
}

/// Returned by [`Shared::pumping`].
pub(crate) struct Pumping<'a> {
    shared: &'a Shared,
}

impl Drop for Pumping<'_> {
    #[inline]
    fn drop(&mut self) {
        let current = thread::current().id();
        let mut state = self.shared.state.lock();
        if let Some(index) = state.pumping.iter().rposition(|&t| t == current) {
            state.pumping.swap_remove(index);
        }
    }
}
