// MIT/Apache2 License

use crate::{
    event::{Event, SourceId},
    mutex::Mutex,
};
use std::collections::VecDeque;

/// A pending focus change. Key events stamped later than `after` are held until
/// `until_focused` confirms it gained focus.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TypeAheadMarker {
    pub after: i64,
    pub until_focused: SourceId,
}

/// What to do with a key event that reached the dispatch thread.
#[derive(Debug)]
pub enum KeyAdmission {
    /// No focus change gates this event; deliver it now.
    Dispatch(Event),
    /// The event was typed after a pending focus change and is held until it completes.
    Held,
}

/// The component hierarchy, as far as discarding markers needs to know it.
pub trait ComponentTree {
    /// The parent of a component, or `None` for top-level windows and unknown components.
    fn parent_of(&self, id: SourceId) -> Option<SourceId>;

    /// Whether the component is a window. Subtrees never extend past a window.
    fn is_window(&self, id: SourceId) -> bool;
}

#[derive(Default)]
struct TypeAheadState {
    // sorted by `after`, ascending
    markers: VecDeque<TypeAheadMarker>,
    held: VecDeque<Event>,
}

impl TypeAheadState {
    #[inline]
    fn gate(&self) -> i64 {
        self.markers.front().map_or(i64::MAX, |m| m.after)
    }

    /// Release held events up to the first marker, in the order they arrived.
    fn pump(&mut self) -> Vec<Event> {
        let gate = self.gate();
        let mut approved = Vec::new();
        while let Some(event) = self.held.front() {
            if stamp(event) > gate {
                break;
            }
            approved.extend(self.held.pop_front());
        }
        approved
    }

    /// Drop held events stamped in `(start, end]`; `end = None` means unbounded.
    fn purge(&mut self, start: i64, end: Option<i64>) -> usize {
        let before = self.held.len();
        self.held.retain(|event| {
            let when = stamp(event);
            !(start < when && end.map_or(true, |end| when <= end))
        });
        before - self.held.len()
    }
}

// key events without a timestamp count as typed just now
#[inline]
fn stamp(event: &Event) -> i64 {
    event.when().unwrap_or(i64::MAX)
}

/// Holds key events typed while a focus change is pending, so they reach the component that
/// is about to gain focus instead of the one losing it.
///
/// Each requested focus change adds a marker. A key event stamped after the oldest marker is
/// held. When the marker's component gains focus, the marker goes away and the held events it
/// gated are released, strictly in the order they arrived.
#[derive(Default)]
pub struct TypeAheadQueue {
    state: Mutex<TypeAheadState>,
}

impl TypeAheadQueue {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a marker, keeping markers sorted by timestamp. Adding the same marker twice has no
    /// effect.
    pub fn enqueue(&self, after: i64, until_focused: SourceId) {
        let marker = TypeAheadMarker {
            after,
            until_focused,
        };
        let mut state = self.state.lock();
        if state.markers.contains(&marker) {
            return;
        }

        let index = state
            .markers
            .iter()
            .rposition(|m| m.after <= after)
            .map_or(0, |i| i + 1);
        state.markers.insert(index, marker);
        log::debug!(
            "Holding key events after {} until {} gains focus",
            after,
            until_focused
        );
    }

    /// Remove a marker and return the held events that no longer have to wait.
    ///
    /// With a negative `after`, the oldest marker for `until_focused` is removed. Otherwise
    /// only the marker with exactly that timestamp is.
    pub fn dequeue(&self, after: i64, until_focused: SourceId) -> Vec<Event> {
        let mut state = self.state.lock();
        let index = if after < 0 {
            state
                .markers
                .iter()
                .position(|m| m.until_focused == until_focused)
        } else {
            state
                .markers
                .iter()
                .rposition(|m| m.until_focused == until_focused && m.after == after)
        };

        if let Some(index) = index {
            state.markers.remove(index);
            log::debug!("Dropped type-ahead marker for {}", until_focused);
        }
        state.pump()
    }

    /// Remove every marker for `root` or a component below it, along with the held events
    /// those markers gated. Returns how many held events were purged.
    pub fn discard<T: ComponentTree + ?Sized>(&self, root: SourceId, tree: &T) -> usize {
        let in_subtree = |id: SourceId| {
            let mut current = Some(id);
            while let Some(c) = current {
                if c == root {
                    return true;
                }
                if tree.is_window(c) {
                    return false;
                }
                current = tree.parent_of(c);
            }
            false
        };

        let mut state = self.state.lock();
        let markers = std::mem::take(&mut state.markers);
        let mut purged = 0;
        let mut start = None;

        for marker in markers {
            if in_subtree(marker.until_focused) {
                // the first of a run of removed markers opens the span
                start.get_or_insert(marker.after);
            } else {
                if let Some(start) = start.take() {
                    purged += state.purge(start, Some(marker.after));
                }
                state.markers.push_back(marker);
            }
        }
        if let Some(start) = start {
            purged += state.purge(start, None);
        }

        if purged > 0 {
            log::debug!("Discarded {} held key events for {}", purged, root);
        }
        purged
    }

    /// Decide whether a key event is delivered now or held behind a pending focus change.
    pub fn admit(&self, event: Event) -> KeyAdmission {
        let mut state = self.state.lock();
        if !state.markers.is_empty() && stamp(&event) > state.gate() {
            log::trace!("Holding key event {} behind a focus change", event.id());
            state.held.push_back(event);
            KeyAdmission::Held
        } else {
            KeyAdmission::Dispatch(event)
        }
    }

    /// `target` gained focus. Its first marker, every marker before it and every marker for
    /// `target` right after it are removed. Returns `false` if there was no marker for it.
    ///
    /// Call [`pump_approved`](TypeAheadQueue::pump_approved) once the focus event itself has
    /// been delivered.
    pub fn focus_gained(&self, target: SourceId) -> bool {
        let mut state = self.state.lock();
        let first = match state.markers.iter().position(|m| m.until_focused == target) {
            Some(first) => first,
            None => {
                log::trace!("{} gained focus without a type-ahead marker", target);
                return false;
            }
        };

        let run = state
            .markers
            .iter()
            .skip(first)
            .take_while(|m| m.until_focused == target)
            .count();
        state.markers.drain(..first + run);
        true
    }

    /// Release the held events no marker gates anymore, in the order they arrived.
    #[inline]
    pub fn pump_approved(&self) -> Vec<Event> {
        self.state.lock().pump()
    }

    /// Drop every marker and release every held event.
    #[inline]
    pub fn clear(&self) -> Vec<Event> {
        let mut state = self.state.lock();
        state.markers.clear();
        state.pump()
    }

    #[inline]
    pub fn has_marker(&self, target: SourceId) -> bool {
        self.state
            .lock()
            .markers
            .iter()
            .any(|m| m.until_focused == target)
    }

    #[inline]
    pub fn markers(&self) -> Vec<TypeAheadMarker> {
        self.state.lock().markers.iter().copied().collect()
    }

    #[inline]
    pub fn held_len(&self) -> usize {
        self.state.lock().held.len()
    }
}
