// MIT/Apache2 License

//! The runtime for the event core.
//!
//! The runtime ties the pieces of this crate together:
//!
//! * An [`EventQueue`] stack and its dispatch worker.
//! * A [`ModalitySpace`] that knows which windows are blocked by modal dialogs.
//! * A [`TypeAheadQueue`] and a [`FocusManager`] that keep key events in line with focus changes.
//! * A registry of delivery targets, one per window, component or tray icon.
//!
//! Every event the dispatch worker takes off the queue is routed through the focus and modal
//! machinery and then handed to the target registered for its source. Targets are looked up at
//! dispatch time; an event whose target is gone is dropped.
//!
//! # Creating a Runtime
//!
//! ```
//! use gui_events::runtime::Runtime;
//!
//! let runtime = Runtime::new();
//! ```
//!
//! `Runtime` is a cheaply clonable pointer to a `RuntimeInternal`, and its clones refer to the
//! same runtime. The runtime shuts down when the last clone is dropped.
//!
//! # Event Management
//!
//! If you want to operate on events before they are delivered, add a "peeker". A peeker is a
//! function that takes the runtime and the event being "peeked" at. Returning
//! `EventLoopAction::Break` consumes the event.
//!
//! * Add a static reference to a peeker function via the `Runtime::add_peeker` method.
//!
//! ```
//! # use gui_events::runtime::Runtime;
//! # let runtime = Runtime::new();
//! use gui_events::{event::{Event, EventLoopAction}, Result};
//!
//! fn peeker(_runtime: &Runtime, event: &Event) -> Result<EventLoopAction> {
//!     println!("Processing event: {:?}", event);
//!     Ok(EventLoopAction::Continue)
//! }
//!
//! runtime.add_peeker(&peeker);
//! ```
//!
//! * Use a closure as a peeker via the `Runtime::add_peeker_owned` method.
//!
//! ```
//! # use gui_events::runtime::Runtime;
//! # let runtime = Runtime::new();
//! use gui_events::event::EventLoopAction;
//!
//! runtime.add_peeker_owned(|_r, event| {
//!     println!("Processing event: {:?}", event);
//!     Ok(EventLoopAction::Continue)
//! });
//! ```
//!
//! # Modal Dialogs
//!
//! [`Runtime::show_dialog`] shows a dialog. For a modal dialog it does not return until the
//! dialog is hidden again through [`Runtime::hide_window`], and events keep being delivered in
//! the meantime, except input to the windows the dialog blocks.

mod filter;
mod route;

use crate::{
    config::{ModalityConfig, QueueConfig},
    event::{DeliveryTarget, Event, EventLoopAction, SourceId},
    focus::{ComponentTree, FocusManager, TypeAheadQueue},
    modal::{ModalityType, ModalitySpace, WindowSpec},
    mutex::{Mutex, RwLock},
    queue::{EventFilter, EventQueue, SecondaryLoop},
    util::Map,
};
use core::fmt;
use filter::ModalEventFilter;
use std::{
    sync::{Arc, Weak},
    time::Duration,
};

/// The runtime for the event core.
///
/// See the module-level documentation for more information.
#[derive(Clone)]
#[repr(transparent)]
pub struct Runtime(Arc<RuntimeInternal>);

type PeekerFn = dyn Fn(&Runtime, &Event) -> crate::Result<EventLoopAction> + Send + Sync;

#[derive(Clone)]
pub(crate) enum Peeker {
    Unowned(&'static PeekerFn),
    Owned(Arc<PeekerFn>),
}

impl Peeker {
    #[inline]
    fn call(&self, runtime: &Runtime, event: &Event) -> crate::Result<EventLoopAction> {
        match self {
            Self::Unowned(f) => f(runtime, event),
            Self::Owned(ref b) => b(runtime, event),
        }
    }
}

/// The internal runtime that the `Runtime` struct points to. You will probably not need to interact
/// with this.
pub struct RuntimeInternal {
    queue: EventQueue,
    modality: ModalitySpace,
    type_ahead: TypeAheadQueue,
    focus: FocusManager,

    // who receives the events of each source
    targets: RwLock<Map<SourceId, Arc<DeliveryTarget>>>,

    // people to inform of new events
    peekers: RwLock<Vec<Peeker>>,

    // secondary loops of the modal dialogs currently shown
    modal_loops: Mutex<Map<SourceId, SecondaryLoop>>,
}

impl ComponentTree for RuntimeInternal {
    #[inline]
    fn parent_of(&self, id: SourceId) -> Option<SourceId> {
        self.targets.read().get(&id).and_then(|t| t.parent())
    }

    #[inline]
    fn is_window(&self, id: SourceId) -> bool {
        self.targets.read().get(&id).map_or(false, |t| t.is_window())
    }
}

impl Default for Runtime {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// Create a new runtime with the default configuration.
    #[inline]
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default(), ModalityConfig::default())
    }

    /// Create a new runtime with a specific queue and modality configuration.
    pub fn with_config(queue: QueueConfig, modality: ModalityConfig) -> Self {
        let internal = Arc::new_cyclic(|weak: &Weak<RuntimeInternal>| {
            let weak = weak.clone();
            let queue = EventQueue::new(queue, move |event: Event| {
                // the runtime may be going away while the worker finishes up
                if let Some(internal) = weak.upgrade() {
                    Runtime(internal).route(event);
                }
            });

            RuntimeInternal {
                queue,
                modality: ModalitySpace::new(modality),
                type_ahead: TypeAheadQueue::new(),
                focus: FocusManager::new(),
                targets: RwLock::new(Map::default()),
                peekers: RwLock::new(Vec::new()),
                modal_loops: Mutex::new(Map::default()),
            }
        });

        Self(internal)
    }

    #[inline]
    fn inner(&self) -> &RuntimeInternal {
        &*self.0
    }

    /// The bottom queue of the runtime's queue stack.
    #[inline]
    pub fn queue(&self) -> &EventQueue {
        &self.inner().queue
    }

    #[inline]
    pub fn modality(&self) -> &ModalitySpace {
        &self.inner().modality
    }

    #[inline]
    pub fn type_ahead(&self) -> &TypeAheadQueue {
        &self.inner().type_ahead
    }

    #[inline]
    pub fn focus(&self) -> &FocusManager {
        &self.inner().focus
    }

    /// Post an event to the runtime's queue.
    ///
    /// # Errors
    ///
    /// See [`EventQueue::post`].
    #[inline]
    pub fn post(&self, event: Event) -> crate::Result {
        self.inner().queue.post(event)
    }

    /// Run `f` on the dispatch thread, after the events already queued.
    ///
    /// # Errors
    ///
    /// See [`EventQueue::invoke_later`].
    #[inline]
    pub fn invoke_later<F: FnOnce() + Send + 'static>(&self, f: F) -> crate::Result {
        self.inner().queue.invoke_later(f)
    }

    /// Run `f` on the dispatch thread and wait for it.
    ///
    /// # Errors
    ///
    /// See [`EventQueue::invoke_and_wait`].
    #[inline]
    pub fn invoke_and_wait<F: FnOnce() + Send + 'static>(&self, f: F) -> crate::Result {
        self.inner().queue.invoke_and_wait(f)
    }

    /// Add a static reference to a peeker function.
    #[inline]
    pub fn add_peeker(
        &self,
        peeker: &'static (dyn Fn(&Runtime, &Event) -> crate::Result<EventLoopAction> + Send + Sync),
    ) {
        self.inner().peekers.write().push(Peeker::Unowned(peeker));
    }

    /// Add a closure as a peeker.
    #[inline]
    pub fn add_peeker_owned<
        F: Fn(&Runtime, &Event) -> crate::Result<EventLoopAction> + Send + Sync + 'static,
    >(
        &self,
        peeker: F,
    ) {
        self.inner()
            .peekers
            .write()
            .push(Peeker::Owned(Arc::new(peeker)));
    }

    /// Register who receives the events of `id`. Replaces any earlier registration.
    #[inline]
    pub fn register_target(&self, id: SourceId, target: DeliveryTarget) {
        self.inner().targets.write().insert(id, Arc::new(target));
    }

    /// Register a window: its delivery target and its modal properties.
    #[inline]
    pub fn register_window(&self, id: SourceId, target: DeliveryTarget, spec: WindowSpec) {
        self.register_target(id, target);
        self.inner().modality.register_window(id, spec);
    }

    /// Register a dialog, returning the modality it actually got.
    ///
    /// # Errors
    ///
    /// See [`ModalitySpace::register_dialog`]. Nothing is registered on failure.
    #[inline]
    pub fn register_dialog(
        &self,
        id: SourceId,
        target: DeliveryTarget,
        spec: WindowSpec,
        modality: ModalityType,
    ) -> crate::Result<ModalityType> {
        let modality = self.inner().modality.register_dialog(id, spec, modality)?;
        self.register_target(id, target);
        Ok(modality)
    }

    #[inline]
    pub fn is_registered(&self, id: SourceId) -> bool {
        self.inner().targets.read().contains_key(&id)
    }

    /// Tear down everything known about `id`: pending events, type-ahead markers, modal state,
    /// focus and the delivery target itself.
    pub fn unregister_target(&self, id: SourceId) -> crate::Result {
        let inner = self.inner();
        let removed = inner.queue.remove_source_events(id)?;
        let purged = inner.type_ahead.discard(id, inner);

        if inner.modality.is_registered(id) {
            self.close_modal_loop(id);
            inner.modality.unregister(id)?;
        }
        inner.focus.forget(id);
        inner.targets.write().remove(&id);

        log::debug!(
            "Unregistered {} ({} pending events, {} held key events dropped)",
            id,
            removed,
            purged
        );
        Ok(())
    }

    /// Request keyboard focus for `target`. Key events stamped after `when` are held until the
    /// change completes.
    ///
    /// # Errors
    ///
    /// Fails if the focus events cannot be posted, in which case no key events are held back
    /// for the request.
    pub fn request_focus(&self, target: SourceId, when: i64) -> crate::Result {
        let inner = self.inner();
        let previous = inner.focus.focus_owner();
        if previous == Some(target) {
            return Ok(());
        }

        inner.type_ahead.enqueue(when, target);
        let posted = match previous {
            Some(previous) => inner
                .queue
                .post(Event::focus_lost(previous, Some(target)).with_when(when)),
            None => Ok(()),
        }
        .and_then(|()| {
            inner
                .queue
                .post(Event::focus_gained(target, previous).with_when(when))
        });

        if let Err(e) = posted {
            inner.type_ahead.dequeue(when, target);
            return Err(e);
        }
        Ok(())
    }

    /// Show a window. For a modal dialog, this blocks until the dialog is hidden, while events
    /// keep flowing.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownWindow` if `id` was never registered, and
    /// `Error::SecondaryLoopActive` if `id` is a modal dialog that is already being shown.
    pub fn show_dialog(&self, id: SourceId) -> crate::Result {
        let inner = self.inner();
        if inner.modal_loops.lock().contains_key(&id) {
            return Err(crate::Error::SecondaryLoopActive);
        }

        inner.modality.show_window(id)?;
        if !inner.modality.is_modal(id) {
            return Ok(());
        }

        let secondary = inner.queue.secondary_loop();
        inner.modal_loops.lock().insert(id, secondary.clone());

        let filter: Arc<dyn EventFilter> =
            Arc::new(ModalEventFilter::new(Arc::downgrade(&self.0), id));
        let res = secondary.enter(|| inner.modality.is_visible(id), Some(filter));

        inner.modal_loops.lock().remove(&id);
        res.map(|_| ())
    }

    /// Show a window without waiting, even if it is a modal dialog.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownWindow` if `id` was never registered.
    #[inline]
    pub fn show_window(&self, id: SourceId) -> crate::Result {
        self.inner().modality.show_window(id)
    }

    /// Hide a window. If it is a modal dialog shown through [`Runtime::show_dialog`], that call
    /// returns.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownWindow` if `id` was never registered.
    pub fn hide_window(&self, id: SourceId) -> crate::Result {
        self.inner().modality.hide_window(id)?;
        self.close_modal_loop(id);
        self.inner().queue.wakeup(false);
        Ok(())
    }

    #[inline]
    fn close_modal_loop(&self, id: SourceId) {
        let secondary = self.inner().modal_loops.lock().remove(&id);
        if let Some(secondary) = secondary {
            secondary.exit();
        }
    }

    /// Dispatch pending events on the calling thread, for runtimes without a dispatch worker.
    /// Waits up to `timeout` for the first event, then dispatches until the queue is empty.
    /// Returns how many events were dispatched.
    ///
    /// # Errors
    ///
    /// Returns `Error::ShutDown` if a shutdown wakeup arrives while waiting.
    pub fn dispatch_pending(&self, timeout: Duration) -> crate::Result<usize> {
        let queue = &self.inner().queue;
        let mut count = 0;
        let mut wait = timeout;

        while let Some(event) = queue.pop_timeout(wait)? {
            queue.dispatch_event(event);
            count += 1;
            wait = Duration::from_millis(0);
        }
        Ok(count)
    }
}

impl fmt::Debug for Runtime {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("queue", &self.inner().queue)
            .field("targets", &self.inner().targets.read().len())
            .field("modal_dialogs", &self.inner().modality.modal_dialogs())
            .finish()
    }
}
