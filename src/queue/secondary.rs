// MIT/Apache2 License

use super::{filter::EventFilter, stack::LoopEntry, worker, EventQueue};
use core::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};
use std::sync::Arc;

static NEXT_LOOP: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(crate) struct LoopId(u64);

impl fmt::Display for LoopId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loop-{}", self.0)
    }
}

enum Pumped {
    Event(crate::event::Event, Vec<Arc<dyn EventFilter>>),
    Recheck,
    Exit,
}

/// A nested, cancellable event pump.
///
/// [`enter`](SecondaryLoop::enter) blocks the calling thread until the loop's predicate turns
/// false or [`exit`](SecondaryLoop::exit) is called. On the dispatch thread (or on any thread
/// when the stack runs without a dispatch worker) it keeps pumping events while it waits;
/// anywhere else it just waits while the worker keeps dispatching.
///
/// Whether the loop is running is recorded under the stack lock, the same lock its wait
/// condition uses, so `exit` can never be lost against a concurrent `enter`.
#[derive(Clone)]
pub struct SecondaryLoop {
    queue: EventQueue,
    id: LoopId,
}

impl SecondaryLoop {
    #[inline]
    pub(crate) fn new(queue: EventQueue) -> Self {
        Self {
            queue,
            id: LoopId(NEXT_LOOP.fetch_add(1, Ordering::Relaxed)),
        }
    }

    /// Run the loop until `predicate` returns false or the loop is exited. While it runs,
    /// `filter` is consulted for every dispatched event.
    ///
    /// Returns `Ok(false)` without blocking if the loop is already running.
    ///
    /// # Errors
    ///
    /// Fails if the queue was popped off its stack, or if the dispatch worker had to be started
    /// and could not be.
    pub fn enter<P: FnMut() -> bool>(
        &self,
        mut predicate: P,
        filter: Option<Arc<dyn EventFilter>>,
    ) -> crate::Result<bool> {
        let shared = &self.queue.shared;
        let pump_here = {
            let mut guard = shared.state.lock();
            let state = &mut *guard;
            state.check_attached(self.queue.id)?;
            if state.loop_active(self.id) {
                log::debug!("Secondary loop {} is already running", self.id);
                return Ok(false);
            }

            state.loops.push(LoopEntry {
                id: self.id,
                filter,
            });

            let on_worker = state.is_worker_thread();
            if !on_worker && shared.config.dispatch_worker && state.worker.is_none() {
                if let Err(e) = worker::start(shared, state) {
                    state.remove_loop(self.id);
                    return Err(e);
                }
            }

            on_worker || !shared.config.dispatch_worker
        };

        log::debug!(
            "Entering secondary loop {} ({})",
            self.id,
            if pump_here { "pumping" } else { "waiting" }
        );

        // also uninstalls the loop if the predicate panics
        let _entered = Entered { secondary: self };
        if pump_here {
            self.pump(&mut predicate);
        } else {
            self.wait(&mut predicate);
        }
        Ok(true)
    }

    /// Stop the loop. Returns `false` if it was not running, in which case nothing happens.
    pub fn exit(&self) -> bool {
        let shared = &self.queue.shared;
        let was_running = {
            let mut state = shared.state.lock();
            let was_running = state.remove_loop(self.id);
            if was_running {
                state.wake_generation += 1;
            }
            was_running
        };

        if was_running {
            shared.cond.notify_all();
        }
        was_running
    }

    /// Is this loop currently running?
    #[inline]
    pub fn is_running(&self) -> bool {
        self.queue.shared.state.lock().loop_active(self.id)
    }

    fn pump(&self, predicate: &mut dyn FnMut() -> bool) {
        let shared = &self.queue.shared;
        let _pumping = shared.pumping();
        loop {
            let wake_seen = {
                let state = shared.state.lock();
                if state.closed || !state.loop_active(self.id) {
                    return;
                }
                state.wake_generation
            };

            // evaluated without the stack lock, since it may query other subsystems
            if !predicate() {
                return;
            }

            let next = {
                let mut state = shared.state.lock();
                loop {
                    if state.closed || !state.loop_active(self.id) {
                        break Pumped::Exit;
                    }
                    if let Some(event) = state.pop_next() {
                        let filters = state.filters();
                        break Pumped::Event(event, filters);
                    }
                    if state.wake_generation != wake_seen {
                        break Pumped::Recheck;
                    }
                    state = shared.cond.wait(state);
                }
            };

            match next {
                Pumped::Event(event, filters) => {
                    worker::deliver(shared, event, &filters);
                    shared.after_dispatch();
                }
                Pumped::Recheck => (),
                Pumped::Exit => return,
            }
        }
    }

    fn wait(&self, predicate: &mut dyn FnMut() -> bool) {
        let shared = &self.queue.shared;
        loop {
            let seen = {
                let state = shared.state.lock();
                if state.closed || !state.loop_active(self.id) {
                    return;
                }
                (state.dispatch_generation, state.wake_generation)
            };

            if !predicate() {
                return;
            }

            let mut state = shared.state.lock();
            if state.closed || !state.loop_active(self.id) {
                return;
            }
            // something was dispatched while the predicate ran; check it again
            if (state.dispatch_generation, state.wake_generation) != seen {
                continue;
            }

            state.foreign_waiters += 1;
            let mut state = shared.cond.wait(state);
            state.foreign_waiters -= 1;
        }
    }
}

/// Removes a loop from the stack once `enter` is done with it.
struct Entered<'a> {
    secondary: &'a SecondaryLoop,
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        let shared = &self.secondary.queue.shared;
        shared.state.lock().remove_loop(self.secondary.id);
        shared.cond.notify_all();
        log::debug!("Left secondary loop {}", self.secondary.id);
    }
}

impl fmt::Debug for SecondaryLoop {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecondaryLoop({})", self.id)
    }
}
