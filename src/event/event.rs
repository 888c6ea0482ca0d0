// MIT/Apache2 License

use super::{PeerEvent, Priority, SourceId};
use crate::{
    geometry::{Point, UpdateRect},
    util::{panic_message, DebugContainer},
};
use core::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};
use std::panic::{self, AssertUnwindSafe};

// global event id
static EVENT_ID: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum WindowEventKind {
    Opened,
    Activated,
    Deactivated,
    GainedFocus,
    LostFocus,
    Closing,
    Closed,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FocusEventKind {
    Gained,
    Lost,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum KeyAction {
    Pressed,
    Released,
    Typed,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub action: KeyAction,
    pub code: u32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MouseAction {
    Pressed,
    Released,
    Clicked,
    Moved,
    Dragged,
    Entered,
    Exited,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MouseEvent {
    pub action: MouseAction,
    pub position: Point,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PaintKind {
    /// The whole area must be repainted.
    Paint,
    /// The area must be updated on top of the current contents.
    Update,
}

/// The kind of an event, along with the data that comes with it.
#[derive(Debug)]
pub enum EventKind {
    Window(WindowEventKind),
    Focus {
        kind: FocusEventKind,
        temporary: bool,
    },
    Key(KeyEvent),
    Mouse(MouseEvent),
    Paint {
        kind: PaintKind,
        rect: UpdateRect,
    },
    Peer(PeerEvent),
    /// A runnable that the dispatch thread executes itself.
    Invocation(Invocation),
    /// An application-defined event, identified by a number.
    Custom(u32),
}

/// The kind of the event, but without the inlined data.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EventClass {
    Window,
    Focus,
    Key,
    Mouse,
    Paint,
    Peer,
    Invocation,
    Custom,
}

impl EventKind {
    #[inline]
    pub fn class(&self) -> EventClass {
        match self {
            Self::Window(_) => EventClass::Window,
            Self::Focus { .. } => EventClass::Focus,
            Self::Key(_) => EventClass::Key,
            Self::Mouse(_) => EventClass::Mouse,
            Self::Paint { .. } => EventClass::Paint,
            Self::Peer(_) => EventClass::Peer,
            Self::Invocation(_) => EventClass::Invocation,
            Self::Custom(_) => EventClass::Custom,
        }
    }
}

/// An event.
#[derive(Debug)]
pub struct Event {
    kind: EventKind,
    // the window, component or tray icon this event is about
    source: SourceId,
    // unique ID of an event
    id: u64,
    // milliseconds; key events need this for type-ahead ordering
    when: Option<i64>,
    // the other party of a focus or activation change
    opposite: Option<SourceId>,
    posted: bool,
}

impl Event {
    /// Create a new event.
    #[inline]
    pub fn new(source: SourceId, kind: EventKind) -> Self {
        Self {
            kind,
            source,
            id: EVENT_ID.fetch_add(1, Ordering::Relaxed),
            when: None,
            opposite: None,
            posted: false,
        }
    }

    #[inline]
    pub fn key(source: SourceId, action: KeyAction, code: u32, when: i64) -> Self {
        Self::new(source, EventKind::Key(KeyEvent { action, code })).with_when(when)
    }

    #[inline]
    pub fn mouse(source: SourceId, action: MouseAction, position: Point) -> Self {
        Self::new(source, EventKind::Mouse(MouseEvent { action, position }))
    }

    #[inline]
    pub fn paint(source: SourceId, rect: UpdateRect) -> Self {
        Self::new(
            source,
            EventKind::Paint {
                kind: PaintKind::Paint,
                rect,
            },
        )
    }

    #[inline]
    pub fn update(source: SourceId, rect: UpdateRect) -> Self {
        Self::new(
            source,
            EventKind::Paint {
                kind: PaintKind::Update,
                rect,
            },
        )
    }

    #[inline]
    pub fn focus_gained(source: SourceId, opposite: Option<SourceId>) -> Self {
        Self::focus(source, FocusEventKind::Gained, opposite)
    }

    #[inline]
    pub fn focus_lost(source: SourceId, opposite: Option<SourceId>) -> Self {
        Self::focus(source, FocusEventKind::Lost, opposite)
    }

    #[inline]
    fn focus(source: SourceId, kind: FocusEventKind, opposite: Option<SourceId>) -> Self {
        let mut ev = Self::new(
            source,
            EventKind::Focus {
                kind,
                temporary: false,
            },
        );
        ev.opposite = opposite;
        ev
    }

    #[inline]
    pub fn window(source: SourceId, kind: WindowEventKind) -> Self {
        Self::new(source, EventKind::Window(kind))
    }

    #[inline]
    pub fn peer(source: SourceId, peer: PeerEvent) -> Self {
        Self::new(source, EventKind::Peer(peer))
    }

    #[inline]
    pub fn custom(source: SourceId, id: u32) -> Self {
        Self::new(source, EventKind::Custom(id))
    }

    #[inline]
    pub fn invocation(invocation: Invocation) -> Self {
        Self::new(SourceId::TOOLKIT, EventKind::Invocation(invocation))
    }

    /// Set the timestamp of this event, in milliseconds.
    #[inline]
    pub fn with_when(mut self, when: i64) -> Self {
        self.when = Some(when);
        self
    }

    /// Set the opposite party of this event, e.g. the window losing focus to this one.
    #[inline]
    pub fn with_opposite(mut self, opposite: SourceId) -> Self {
        self.opposite = Some(opposite);
        self
    }

    #[inline]
    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    #[inline]
    pub(crate) fn kind_mut(&mut self) -> &mut EventKind {
        &mut self.kind
    }

    #[inline]
    pub fn class(&self) -> EventClass {
        self.kind.class()
    }

    #[inline]
    pub fn source(&self) -> SourceId {
        self.source
    }

    /// Readdress the event, e.g. a key event to the current focus owner.
    #[inline]
    pub(crate) fn retarget(&mut self, source: SourceId) {
        self.source = source;
    }

    /// Get the ID of this event.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn when(&self) -> Option<i64> {
        self.when
    }

    #[inline]
    pub fn opposite(&self) -> Option<SourceId> {
        self.opposite
    }

    /// Has this event gone through an event queue?
    #[inline]
    pub fn is_posted(&self) -> bool {
        self.posted
    }

    #[inline]
    pub(crate) fn mark_posted(&mut self) {
        self.posted = true;
    }

    /// Keyboard and mouse events are input events.
    #[inline]
    pub fn is_input(&self) -> bool {
        matches!(self.kind, EventKind::Key(_) | EventKind::Mouse(_))
    }

    #[inline]
    pub fn is_focus_gained(&self) -> bool {
        matches!(
            self.kind,
            EventKind::Focus {
                kind: FocusEventKind::Gained,
                ..
            }
        )
    }

    /// The lane this event belongs in. This is computed once, when the event is posted.
    #[inline]
    pub fn priority(&self) -> Priority {
        match self.kind {
            EventKind::Peer(ref peer) => peer.priority(),
            EventKind::Paint { .. } => Priority::Low,
            _ => Priority::Normal,
        }
    }
}

/// The outcome of running an invocation, as reported to a synchronous waiter.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum InvocationOutcome {
    Completed,
    Panicked,
}

/// A runnable carried by an event and executed on the dispatch thread.
///
/// Dropping an invocation that never ran releases the runnable (and everything it captured)
/// and wakes any thread waiting on it with `Error::InvocationDropped`.
pub struct Invocation {
    runnable: Option<DebugContainer<Box<dyn FnOnce() + Send>>>,
    notifier: Option<flume::Sender<InvocationOutcome>>,
}

impl Invocation {
    #[inline]
    pub fn new<F: FnOnce() + Send + 'static>(f: F) -> Self {
        Self {
            runnable: Some(DebugContainer::new(Box::new(f))),
            notifier: None,
        }
    }

    #[inline]
    pub(crate) fn with_notifier<F: FnOnce() + Send + 'static>(
        f: F,
        notifier: flume::Sender<InvocationOutcome>,
    ) -> Self {
        Self {
            runnable: Some(DebugContainer::new(Box::new(f))),
            notifier: Some(notifier),
        }
    }

    /// Has the runnable already been executed?
    #[inline]
    pub fn is_dispatched(&self) -> bool {
        self.runnable.is_none()
    }

    pub(crate) fn run(&mut self) {
        let runnable = match self.runnable.take() {
            Some(runnable) => runnable.into_inner(),
            None => return,
        };

        let outcome = match panic::catch_unwind(AssertUnwindSafe(runnable)) {
            Ok(()) => InvocationOutcome::Completed,
            Err(payload) => {
                log::error!("Invocation panicked: {}", panic_message(&*payload));
                InvocationOutcome::Panicked
            }
        };

        if let Some(notifier) = self.notifier.take() {
            // the waiter may have given up already
            let _ = notifier.send(outcome);
        }
    }
}

impl fmt::Debug for Invocation {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("runnable", &self.runnable)
            .field("waited_on", &self.notifier.is_some())
            .finish()
    }
}
