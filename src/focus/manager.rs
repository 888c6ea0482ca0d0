// MIT/Apache2 License

use crate::{
    event::SourceId,
    mutex::{Mutex, RwLock},
};
use std::sync::Arc;

/// Gets a say in every focus change.
pub trait FocusVeto: Send + Sync {
    /// Return `false` to keep `proposed` from becoming the focus owner.
    fn approve(&self, current: Option<SourceId>, proposed: SourceId) -> bool;
}

impl<F: Fn(Option<SourceId>, SourceId) -> bool + Send + Sync> FocusVeto for F {
    #[inline]
    fn approve(&self, current: Option<SourceId>, proposed: SourceId) -> bool {
        (self)(current, proposed)
    }
}

/// How a focus-gained event ended up.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FocusOutcome {
    /// The target is the focus owner.
    Gained,
    /// The change was refused; focus went back to the component that had it.
    Restored(SourceId),
    /// The change was refused and the previous owner is gone, so nothing has focus.
    Cleared,
}

#[derive(Debug, Default)]
struct FocusState {
    owner: Option<SourceId>,
    focused_window: Option<SourceId>,
    active_window: Option<SourceId>,
}

/// Tracks the focus owner, the focused window and the active window.
#[derive(Default)]
pub struct FocusManager {
    state: Mutex<FocusState>,
    vetoes: RwLock<Vec<Arc<dyn FocusVeto>>>,
}

impl FocusManager {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add_veto<V: FocusVeto + 'static>(&self, veto: V) {
        self.vetoes.write().push(Arc::new(veto));
    }

    #[inline]
    pub fn focus_owner(&self) -> Option<SourceId> {
        self.state.lock().owner
    }

    #[inline]
    pub fn focused_window(&self) -> Option<SourceId> {
        self.state.lock().focused_window
    }

    #[inline]
    pub fn active_window(&self) -> Option<SourceId> {
        self.state.lock().active_window
    }

    /// Try to make `proposed` the focus owner. Returns the owner afterwards.
    fn set_owner(&self, proposed: SourceId) -> Option<SourceId> {
        let current = self.focus_owner();
        let vetoes = self.vetoes.read().clone();
        if vetoes.iter().any(|v| !v.approve(current, proposed)) {
            log::debug!("Focus change from {:?} to {} was vetoed", current, proposed);
            return current;
        }

        let mut state = self.state.lock();
        state.owner = Some(proposed);
        state.owner
    }

    /// `target` received a focus-gained event, taking focus from `opposite`.
    ///
    /// If the change does not stick, focus goes back to `opposite` when `is_live` says it still
    /// exists, and is cleared otherwise.
    pub fn focus_gained<L: Fn(SourceId) -> bool>(
        &self,
        target: SourceId,
        window: Option<SourceId>,
        opposite: Option<SourceId>,
        is_live: L,
    ) -> FocusOutcome {
        if self.set_owner(target) == Some(target) {
            if let Some(window) = window {
                self.state.lock().focused_window = Some(window);
            }
            return FocusOutcome::Gained;
        }

        let mut state = self.state.lock();
        match opposite.filter(|&o| is_live(o)) {
            Some(previous) => {
                log::debug!("Restoring focus to {}", previous);
                state.owner = Some(previous);
                FocusOutcome::Restored(previous)
            }
            None => {
                log::debug!("Clearing focus after a refused change to {}", target);
                state.owner = None;
                FocusOutcome::Cleared
            }
        }
    }

    /// `target` lost focus. The owner is only cleared if it still is `target`.
    #[inline]
    pub fn focus_lost(&self, target: SourceId) {
        let mut state = self.state.lock();
        if state.owner == Some(target) {
            state.owner = None;
        }
    }

    #[inline]
    pub fn window_activated(&self, window: SourceId) {
        self.state.lock().active_window = Some(window);
    }

    #[inline]
    pub fn window_deactivated(&self, window: SourceId) {
        let mut state = self.state.lock();
        if state.active_window == Some(window) {
            state.active_window = None;
        }
    }

    /// Forget a component or window that went away.
    pub fn forget(&self, id: SourceId) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        for slot in [
            &mut state.owner,
            &mut state.focused_window,
            &mut state.active_window,
        ] {
            if *slot == Some(id) {
                *slot = None;
            }
        }
    }
}
