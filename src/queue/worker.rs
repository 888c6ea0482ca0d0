// MIT/Apache2 License

//! The dispatch worker: the single thread that drains the top queue of a stack.
//!
//! The worker is started lazily by the first post and parks when the queue runs dry. It only
//! retires when the stack is closed, after a shutdown wakeup once the queue is empty, or when
//! the configured idle timeout elapses on a provably empty queue with no secondary loop
//! running. Retirement clears the worker slot so the next post starts a fresh one.

use super::{
    filter::{self, EventFilter},
    stack::{Shared, StackState},
};
use crate::{
    event::{Event, EventKind},
    util::panic_message,
};
use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    thread::{self, ThreadId},
};

/// Bookkeeping for the running worker.
#[derive(Debug, Copy, Clone)]
pub(crate) struct WorkerState {
    pub(crate) thread: ThreadId,
    pub(crate) generation: u64,
}

/// Spawn a new dispatch worker. Must be called with the stack lock held and no worker running.
pub(crate) fn start(shared: &Arc<Shared>, state: &mut StackState) -> crate::Result {
    state.worker_generation += 1;
    let generation = state.worker_generation;
    let worker_shared = Arc::clone(shared);

    let handle = thread::Builder::new()
        .name(shared.config.thread_name.clone())
        .spawn(move || run(worker_shared, generation))?;

    state.worker = Some(WorkerState {
        thread: handle.thread().id(),
        generation,
    });
    log::debug!("Started dispatch worker #{}", generation);
    Ok(())
}

#[inline]
fn retire(state: &mut StackState, generation: u64) {
    if state.worker.map_or(false, |w| w.generation == generation) {
        state.worker = None;
    }
}

fn run(shared: Arc<Shared>, generation: u64) {
    let mut shutdown_seen = shared.state.lock().shutdown_generation;
    let mut retiring = false;

    loop {
        let next = {
            let mut state = shared.state.lock();
            loop {
                if state.closed {
                    retire(&mut state, generation);
                    break None;
                }

                if state.shutdown_generation != shutdown_seen {
                    shutdown_seen = state.shutdown_generation;
                    retiring = true;
                }

                if let Some(event) = state.pop_next() {
                    let filters = state.filters();
                    break Some((event, filters));
                }

                state.busy = false;
                if retiring && state.loops.is_empty() {
                    retire(&mut state, generation);
                    break None;
                }

                match shared.config.idle_timeout {
                    Some(timeout) => {
                        let (s, timed_out) = shared.cond.wait_timeout(state, timeout);
                        state = s;
                        if timed_out && state.is_idle() && state.loops.is_empty() {
                            log::debug!("Dispatch worker #{} idled out", generation);
                            retire(&mut state, generation);
                            break None;
                        }
                    }
                    None => state = shared.cond.wait(state),
                }
            }
        };

        match next {
            Some((event, filters)) => {
                deliver(&shared, event, &filters);
                shared.after_dispatch();
            }
            None => break,
        }
    }

    log::debug!("Dispatch worker #{} retired", generation);
}

/// Deliver one event: run it through the filter stack, then either execute it (invocations)
/// or hand it to the stack's dispatcher. A panic in a filter or while delivering is logged and
/// swallowed, and the event is dropped.
pub(crate) fn deliver(shared: &Shared, event: Event, filters: &[Arc<dyn EventFilter>]) {
    let id = event.id();
    let guarded = AssertUnwindSafe(move || deliver_unguarded(shared, event, filters));
    if let Err(payload) = panic::catch_unwind(guarded) {
        log::error!(
            "Panic while delivering event {}: {}",
            id,
            panic_message(&*payload)
        );
    }
}

fn deliver_unguarded(shared: &Shared, mut event: Event, filters: &[Arc<dyn EventFilter>]) {
    if !filter::accepts(filters, &event) {
        log::debug!(
            "Event {} ({:?}) from {} was rejected by an event filter",
            event.id(),
            event.class(),
            event.source()
        );
        return;
    }

    log::trace!("Dispatching event {} ({:?})", event.id(), event.class());
    if let EventKind::Invocation(invocation) = event.kind_mut() {
        invocation.run();
        return;
    }

    shared.dispatcher.dispatch(event);
}
