// MIT/Apache2 License

use super::{AppContextId, ModalExclusion, ModalityType, WindowPeer, WindowSpec};
use crate::{config::ModalityConfig, event::SourceId, mutex::Mutex, util::Map};
use std::sync::Arc;

struct WindowRecord {
    owner: Option<SourceId>,
    owned: Vec<SourceId>,
    app_context: AppContextId,
    exclusion: ModalExclusion,
    peer: Option<Arc<dyn WindowPeer>>,
    // `Modeless` for plain windows
    modality: ModalityType,
    visible: bool,
    in_hide: bool,
    blocker: Option<SourceId>,
    // windows this dialog blocks, in the order it blocked them
    blocked: Vec<SourceId>,
}

impl WindowRecord {
    #[inline]
    fn new(spec: WindowSpec, modality: ModalityType) -> Self {
        Self {
            owner: spec.owner,
            owned: Vec::new(),
            app_context: spec.app_context,
            exclusion: spec.exclusion,
            peer: spec.peer,
            modality,
            visible: false,
            in_hide: false,
            blocker: None,
            blocked: Vec::new(),
        }
    }
}

/// A notification for a window peer, sent once the space lock is released.
enum PeerCall {
    Blocked(Arc<dyn WindowPeer>, bool),
    ToFront(Arc<dyn WindowPeer>),
}

impl PeerCall {
    #[inline]
    fn run(self) {
        match self {
            PeerCall::Blocked(peer, blocked) => peer.set_blocked(blocked),
            PeerCall::ToFront(peer) => peer.to_front(),
        }
    }
}

#[derive(Default)]
struct SpaceState {
    windows: Map<SourceId, WindowRecord>,
    // registration order; blocking passes walk windows in this order
    order: Vec<SourceId>,
    // open modal dialogs, in the order they were shown
    modal_dialogs: Vec<SourceId>,
}

/// Walks a window and its owners, stopping at unregistered windows and at ownership cycles.
struct Ancestors<'a> {
    state: &'a SpaceState,
    next: Option<SourceId>,
    remaining: usize,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = SourceId;

    #[inline]
    fn next(&mut self) -> Option<SourceId> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let current = self.next.take()?;
        let record = self.state.windows.get(&current)?;
        self.next = record.owner;
        Some(current)
    }
}

impl SpaceState {
    #[inline]
    fn ancestors(&self, id: SourceId) -> Ancestors<'_> {
        Ancestors {
            state: self,
            next: Some(id),
            remaining: self.windows.len(),
        }
    }

    #[inline]
    fn is_ancestor(&self, ancestor: SourceId, of: SourceId) -> bool {
        self.ancestors(of).any(|id| id == ancestor)
    }

    #[inline]
    fn document_root(&self, id: SourceId) -> Option<SourceId> {
        self.ancestors(id).last()
    }

    #[inline]
    fn is_modal(&self, id: SourceId) -> bool {
        self.windows
            .get(&id)
            .map_or(false, |w| w.modality != ModalityType::Modeless)
    }

    #[inline]
    fn modality(&self, id: SourceId) -> ModalityType {
        self.windows.get(&id).map_or(ModalityType::Modeless, |w| w.modality)
    }

    #[inline]
    fn blocker(&self, id: SourceId) -> Option<SourceId> {
        self.windows.get(&id).and_then(|w| w.blocker)
    }

    /// Exclusion is inherited from owners.
    #[inline]
    fn is_excluded(&self, id: SourceId, level: ModalExclusion) -> bool {
        self.ancestors(id)
            .filter_map(|a| self.windows.get(&a))
            .any(|w| w.exclusion >= level)
    }

    #[inline]
    fn modal_index(&self, id: SourceId) -> isize {
        self.modal_dialogs
            .iter()
            .position(|&d| d == id)
            .map_or(-1, |i| i as isize)
    }

    fn should_block(&self, dialog: SourceId, window: SourceId) -> bool {
        let (d, w) = match (self.windows.get(&dialog), self.windows.get(&window)) {
            (Some(d), Some(w)) => (d, w),
            _ => return false,
        };

        if dialog == window
            || !d.visible
            || d.in_hide
            || d.modality == ModalityType::Modeless
            || !w.visible
            || w.in_hide
        {
            return false;
        }

        // the dialog never blocks its own hierarchy, nor the hierarchies of its blockers
        let mut blocker = Some(dialog);
        let mut steps = self.windows.len();
        while let Some(b) = blocker {
            if self.is_ancestor(b, window) {
                return false;
            }
            if steps == 0 {
                break;
            }
            steps -= 1;
            blocker = self.blocker(b);
        }

        match d.modality {
            ModalityType::Modeless => false,
            ModalityType::DocumentModal => {
                if self.is_excluded(window, ModalExclusion::ApplicationExclude) {
                    self.is_ancestor(window, dialog)
                } else {
                    self.document_root(dialog) == self.document_root(window)
                }
            }
            ModalityType::ApplicationModal => {
                !self.is_excluded(window, ModalExclusion::ApplicationExclude)
                    && d.app_context == w.app_context
            }
            ModalityType::ToolkitModal => !self.is_excluded(window, ModalExclusion::ToolkitExclude),
        }
    }

    fn block_window(&mut self, dialog: SourceId, window: SourceId, calls: &mut Vec<PeerCall>) {
        let peer = match self.windows.get_mut(&window) {
            Some(w) if w.blocker.is_none() => {
                w.blocker = Some(dialog);
                w.peer.clone()
            }
            _ => return,
        };
        if let Some(d) = self.windows.get_mut(&dialog) {
            d.blocked.push(window);
        }

        log::debug!("{} is now blocked by {}", window, dialog);
        if let Some(peer) = peer {
            calls.push(PeerCall::Blocked(peer, true));
        }
    }

    fn unblock_window(&mut self, dialog: SourceId, window: SourceId, calls: &mut Vec<PeerCall>) {
        let peer = match self.windows.get_mut(&window) {
            Some(w) if w.blocker == Some(dialog) => {
                w.blocker = None;
                w.peer.clone()
            }
            _ => return,
        };
        if let Some(d) = self.windows.get_mut(&dialog) {
            d.blocked.retain(|&b| b != window);
        }

        log::debug!("{} is no longer blocked by {}", window, dialog);
        if let Some(peer) = peer {
            calls.push(PeerCall::Blocked(peer, false));
        }
    }

    /// Block `window` by the first open modal dialog whose scope covers it.
    fn check_should_be_blocked(&mut self, window: SourceId, calls: &mut Vec<PeerCall>) {
        let blocker = self
            .modal_dialogs
            .iter()
            .copied()
            .find(|&d| self.should_block(d, window));
        if let Some(dialog) = blocker {
            self.block_window(dialog, window, calls);
        }
    }

    /// Compute everything a modal dialog that is being shown blocks, and what blocks it.
    fn modal_show(&mut self, this: SourceId, calls: &mut Vec<PeerCall>) {
        // open dialogs that block this one
        let mut blockers: Vec<SourceId> = self
            .modal_dialogs
            .iter()
            .copied()
            .filter(|&d| {
                self.should_block(d, this)
                    && (self.is_ancestor(this, d)
                        || !self.should_block(this, d)
                        || self.modality(this) < self.modality(d))
            })
            .collect();

        // close the set under the blocking relation
        let mut i = 0;
        while i < blockers.len() {
            if let Some(outer) = self.blocker(blockers[i]) {
                if !blockers.contains(&outer) {
                    blockers.insert(i + 1, outer);
                }
            }
            i += 1;
        }

        if let Some(&first) = blockers.first() {
            self.block_window(first, this, calls);
            if let Some(peer) = self.windows.get(&first).and_then(|d| d.peer.clone()) {
                calls.push(PeerCall::ToFront(peer));
            }
        }

        // windows owned by any blocker stay out of reach
        let mut hierarchies = blockers;
        let mut k = 0;
        while k < hierarchies.len() {
            if let Some(w) = self.windows.get(&hierarchies[k]) {
                for &owned in w.owned.iter() {
                    if !hierarchies.contains(&owned) {
                        hierarchies.push(owned);
                    }
                }
            }
            k += 1;
        }

        let this_index = self.modal_index(this);
        let to_block: Vec<SourceId> = self
            .order
            .iter()
            .copied()
            .filter(|&w| self.blocker(w).is_none())
            .filter(|&w| self.should_block(this, w) && !hierarchies.contains(&w))
            .filter(|&w| {
                // a modal dialog shown later that would block this one is left alone
                !(self.is_modal(w)
                    && self.should_block(w, this)
                    && self.modal_index(w) > this_index - 1)
            })
            .collect();

        for window in to_block {
            self.block_window(this, window, calls);
        }

        if self.blocker(this).is_none() {
            self.update_children_blocking(this, calls);
        }
    }

    /// Unblock every visible window owned, directly or not, by `this`.
    fn update_children_blocking(&mut self, this: SourceId, calls: &mut Vec<PeerCall>) {
        let mut hierarchy = self
            .windows
            .get(&this)
            .map(|w| w.owned.clone())
            .unwrap_or_default();

        let mut k = 0;
        while k < hierarchy.len() {
            let window = hierarchy[k];
            k += 1;

            let (visible, blocker, owned) = match self.windows.get(&window) {
                Some(w) => (w.visible, w.blocker, w.owned.clone()),
                None => continue,
            };
            if !visible {
                continue;
            }

            if let Some(blocker) = blocker {
                self.unblock_window(blocker, window, calls);
            }
            for owned in owned {
                if owned != this && !hierarchy.contains(&owned) {
                    hierarchy.push(owned);
                }
            }
        }
    }

    /// Unblock everything a hidden dialog blocked, then block each window again if another
    /// open dialog covers it.
    fn modal_hide(&mut self, this: SourceId, calls: &mut Vec<PeerCall>) {
        let formerly = self
            .windows
            .get(&this)
            .map(|w| w.blocked.clone())
            .unwrap_or_default();

        for &window in formerly.iter() {
            self.unblock_window(this, window, calls);
        }

        for window in formerly {
            if self.is_modal(window) {
                self.modal_show(window, calls);
            } else {
                self.check_should_be_blocked(window, calls);
            }
        }
    }

    fn show(&mut self, id: SourceId, calls: &mut Vec<PeerCall>) -> crate::Result {
        let record = self
            .windows
            .get_mut(&id)
            .ok_or(crate::Error::UnknownWindow(id))?;
        if record.visible {
            return Ok(());
        }
        record.visible = true;
        record.in_hide = false;
        let modal = record.modality != ModalityType::Modeless;

        if modal {
            if !self.modal_dialogs.contains(&id) {
                self.modal_dialogs.push(id);
            }
            self.modal_show(id, calls);
        } else {
            self.check_should_be_blocked(id, calls);
        }

        log::debug!("Showed {} ({:?})", id, self.modality(id));
        Ok(())
    }

    fn hide(&mut self, id: SourceId, calls: &mut Vec<PeerCall>) -> crate::Result {
        let record = self
            .windows
            .get_mut(&id)
            .ok_or(crate::Error::UnknownWindow(id))?;
        if !record.visible {
            return Ok(());
        }
        record.in_hide = true;
        let modal = record.modality != ModalityType::Modeless;

        if modal {
            self.modal_dialogs.retain(|&d| d != id);
            self.modal_hide(id, calls);
        }
        if let Some(blocker) = self.blocker(id) {
            self.unblock_window(blocker, id, calls);
        }

        if let Some(record) = self.windows.get_mut(&id) {
            record.visible = false;
            record.in_hide = false;
        }
        log::debug!("Hid {}", id);
        Ok(())
    }

    /// Hide and forget a window. Returns `None` if it was not registered.
    fn remove(&mut self, id: SourceId, calls: &mut Vec<PeerCall>) -> Option<WindowRecord> {
        // hiding only fails for unknown windows
        self.hide(id, calls).ok()?;
        let record = self.windows.remove(&id)?;
        if let Some(owner) = record.owner.and_then(|o| self.windows.get_mut(&o)) {
            owner.owned.retain(|&o| o != id);
        }
        self.order.retain(|&w| w != id);
        Some(record)
    }
}

/// The modal bookkeeping of a set of windows.
///
/// All state sits behind one lock. Peer notifications are collected while it is held and sent
/// afterwards, so a peer may call back into the space.
pub struct ModalitySpace {
    config: ModalityConfig,
    state: Mutex<SpaceState>,
}

impl Default for ModalitySpace {
    #[inline]
    fn default() -> Self {
        Self::new(ModalityConfig::default())
    }
}

impl ModalitySpace {
    #[inline]
    pub fn new(config: ModalityConfig) -> Self {
        Self {
            config,
            state: Mutex::new(SpaceState::default()),
        }
    }

    #[inline]
    pub fn config(&self) -> &ModalityConfig {
        &self.config
    }

    #[inline]
    fn with_state<R, F: FnOnce(&mut SpaceState, &mut Vec<PeerCall>) -> R>(&self, f: F) -> R {
        let mut calls = Vec::new();
        let result = {
            let mut state = self.state.lock();
            f(&mut *state, &mut calls)
        };
        calls.into_iter().for_each(PeerCall::run);
        result
    }

    /// Register a plain window. Registering an id twice replaces the old registration.
    #[inline]
    pub fn register_window(&self, id: SourceId, spec: WindowSpec) {
        self.insert(id, spec, ModalityType::Modeless);
    }

    /// Register a dialog, returning the modality it actually got.
    ///
    /// A modality type that is not supported falls back to `Modeless`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Security` if the dialog is toolkit-modal and toolkit-modal dialogs are not
    /// permitted. The dialog is not registered in that case.
    pub fn register_dialog(
        &self,
        id: SourceId,
        spec: WindowSpec,
        modality: ModalityType,
    ) -> crate::Result<ModalityType> {
        let modality = if self.config.is_supported(modality) {
            modality
        } else {
            log::debug!(
                "{:?} is not supported, {} falls back to a modeless dialog",
                modality,
                id
            );
            ModalityType::Modeless
        };

        if modality == ModalityType::ToolkitModal && !self.config.allow_toolkit_modal {
            return Err(crate::Error::Security(
                "creating toolkit-modal dialogs is not permitted",
            ));
        }

        self.insert(id, spec, modality);
        Ok(modality)
    }

    fn insert(&self, id: SourceId, spec: WindowSpec, modality: ModalityType) {
        self.with_state(|state, calls| {
            if state.remove(id, calls).is_some() {
                log::debug!("Replacing the registration of {}", id);
            }

            let owner = spec.owner;
            let mut record = WindowRecord::new(spec, modality);
            // windows registered earlier may already name this one as their owner
            record.owned = state
                .order
                .iter()
                .copied()
                .filter(|w| state.windows.get(w).map_or(false, |w| w.owner == Some(id)))
                .collect();

            state.windows.insert(id, record);
            state.order.push(id);
            if let Some(owner) = owner.and_then(|o| state.windows.get_mut(&o)) {
                owner.owned.push(id);
            }
        });
    }

    /// Remove a window from the space, hiding it first.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownWindow` if the window was never registered.
    pub fn unregister(&self, id: SourceId) -> crate::Result {
        self.with_state(|state, calls| {
            state
                .remove(id, calls)
                .map(drop)
                .ok_or(crate::Error::UnknownWindow(id))
        })
    }

    /// Mark a window as shown. A modal dialog starts blocking the windows in its scope; any
    /// other window is blocked by the first open modal dialog that covers it.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownWindow` if the window was never registered.
    #[inline]
    pub fn show_window(&self, id: SourceId) -> crate::Result {
        self.with_state(|state, calls| state.show(id, calls))
    }

    /// Mark a window as hidden. A modal dialog releases every window it blocked, each of which
    /// may be blocked again right away by another open dialog.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownWindow` if the window was never registered.
    #[inline]
    pub fn hide_window(&self, id: SourceId) -> crate::Result {
        self.with_state(|state, calls| state.hide(id, calls))
    }

    #[inline]
    pub fn is_registered(&self, id: SourceId) -> bool {
        self.state.lock().windows.contains_key(&id)
    }

    #[inline]
    pub fn is_visible(&self, id: SourceId) -> bool {
        self.state.lock().windows.get(&id).map_or(false, |w| w.visible)
    }

    #[inline]
    pub fn is_blocked(&self, id: SourceId) -> bool {
        self.blocker_of(id).is_some()
    }

    /// The dialog currently blocking a window.
    #[inline]
    pub fn blocker_of(&self, id: SourceId) -> Option<SourceId> {
        self.state.lock().blocker(id)
    }

    /// Every window a dialog currently blocks.
    #[inline]
    pub fn blocked_by(&self, dialog: SourceId) -> Vec<SourceId> {
        self.state
            .lock()
            .windows
            .get(&dialog)
            .map(|d| d.blocked.clone())
            .unwrap_or_default()
    }

    /// Open modal dialogs, in the order they were shown.
    #[inline]
    pub fn modal_dialogs(&self) -> Vec<SourceId> {
        self.state.lock().modal_dialogs.clone()
    }

    #[inline]
    pub fn is_modal(&self, id: SourceId) -> bool {
        self.state.lock().is_modal(id)
    }

    #[inline]
    pub fn modality_of(&self, id: SourceId) -> Option<ModalityType> {
        self.state.lock().windows.get(&id).map(|w| w.modality)
    }

    /// The topmost owner-less window above `id`.
    #[inline]
    pub fn document_root(&self, id: SourceId) -> Option<SourceId> {
        self.state.lock().document_root(id)
    }

    /// Raise the dialog blocking `window`, if there is one, and return it.
    pub fn raise_blocker(&self, window: SourceId) -> Option<SourceId> {
        let (blocker, peer) = {
            let state = self.state.lock();
            let blocker = state.blocker(window)?;
            (blocker, state.windows.get(&blocker).and_then(|d| d.peer.clone()))
        };

        if let Some(peer) = peer {
            peer.to_front();
        }
        Some(blocker)
    }

    /// Would `dialog` block `window` if it were shown now?
    #[inline]
    pub fn should_block(&self, dialog: SourceId, window: SourceId) -> bool {
        self.state.lock().should_block(dialog, window)
    }
}
