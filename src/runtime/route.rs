// MIT/Apache2 License

use super::{Peeker, Runtime};
use crate::{
    event::{Deliverable, Event, EventClass, EventKind, FocusEventKind, SourceId, WindowEventKind},
    focus::{FocusOutcome, KeyAdmission},
};

impl Runtime {
    /// Route an event taken off the queue. Runs on the dispatch thread.
    pub(crate) fn route(&self, event: Event) {
        let inner = self.inner();
        let peekers = inner.peekers.read().clone();
        if !self.peeker_loop(&peekers, &event) {
            return;
        }

        // keys released since the last event went through
        for released in inner.type_ahead.pump_approved() {
            self.deliver_key(released);
        }

        if event.class() == EventClass::Key {
            if let KeyAdmission::Dispatch(event) = inner.type_ahead.admit(event) {
                self.deliver_key(event);
            }
            return;
        }

        if event.is_focus_gained() {
            self.focus_gained(event);
            return;
        }

        match event.kind() {
            EventKind::Focus {
                kind: FocusEventKind::Lost,
                ..
            } => inner.focus.focus_lost(event.source()),
            EventKind::Window(WindowEventKind::Activated) => {
                inner.focus.window_activated(event.source())
            }
            EventKind::Window(WindowEventKind::Deactivated) => {
                inner.focus.window_deactivated(event.source())
            }
            _ => (),
        }
        self.deliver(event);
    }

    #[inline]
    fn peeker_loop(&self, peekers: &[Peeker], event: &Event) -> bool {
        for peek in peekers {
            match peek.call(self, event) {
                Err(e) => log::error!("Peeker failed on event {}: {}", event.id(), e),
                Ok(action) if action.is_break() => return false,
                Ok(_) => (),
            }
        }

        true
    }

    fn focus_gained(&self, event: Event) {
        let inner = self.inner();
        let target = event.source();
        let window = self.window_of(target);
        let outcome = inner
            .focus
            .focus_gained(target, window, event.opposite(), |id| self.is_registered(id));

        let released = match outcome {
            FocusOutcome::Gained => {
                inner.type_ahead.focus_gained(target);
                self.deliver(event);
                inner.type_ahead.pump_approved()
            }
            FocusOutcome::Restored(previous) => {
                let released = inner.type_ahead.dequeue(-1, target);
                self.deliver(Event::focus_gained(previous, Some(target)));
                released
            }
            FocusOutcome::Cleared => inner.type_ahead.dequeue(-1, target),
        };

        for key in released {
            self.deliver_key(key);
        }
    }

    /// Key events go to the focus owner, if there is one.
    #[inline]
    fn deliver_key(&self, mut event: Event) {
        if let Some(owner) = self.inner().focus.focus_owner() {
            event.retarget(owner);
        }
        self.deliver(event);
    }

    fn deliver(&self, event: Event) {
        let target = self.inner().targets.read().get(&event.source()).cloned();
        match target {
            Some(target) => target.deliver(&event),
            None => log::warn!(
                "No delivery target for {}, dropping event {} ({:?})",
                event.source(),
                event.id(),
                event.class()
            ),
        }
    }

    /// The window a source belongs to: itself if it is a window, else the closest window
    /// among its ancestors.
    pub(crate) fn window_of(&self, source: SourceId) -> Option<SourceId> {
        let targets = self.inner().targets.read();
        let mut current = source;
        for _ in 0..=targets.len() {
            let target = targets.get(&current)?;
            if target.is_window() {
                return Some(current);
            }
            current = target.parent()?;
        }

        None
    }
}
