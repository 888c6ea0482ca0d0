// MIT/Apache2 License

//! Modal blocking.
//!
//! A [`ModalitySpace`] keeps track of every window and dialog of an application, which modal
//! dialogs are open, and which window each of them blocks. Blocked windows do not receive input;
//! the native layer is told about every change through [`WindowPeer::set_blocked`].
//!
//! What a modal dialog blocks depends on its [`ModalityType`]:
//!
//! * `Modeless` dialogs never block anything.
//! * `DocumentModal` dialogs block the windows that share their document root, the topmost
//!   owner-less window above them.
//! * `ApplicationModal` dialogs block every window of their application context.
//! * `ToolkitModal` dialogs block every window of the space. Creating one requires permission.
//!
//! Windows in the ownership chain of a dialog (or of the dialogs blocking it) are never blocked
//! by it, and a window can opt out through its [`ModalExclusion`].

mod space;

pub use space::ModalitySpace;

use crate::event::SourceId;
use core::fmt;
use std::sync::Arc;

/// How much of the application a modal dialog blocks.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModalityType {
    Modeless,
    DocumentModal,
    ApplicationModal,
    ToolkitModal,
}

impl ModalityType {
    pub const ALL: [ModalityType; 4] = [
        ModalityType::Modeless,
        ModalityType::DocumentModal,
        ModalityType::ApplicationModal,
        ModalityType::ToolkitModal,
    ];

    #[inline]
    pub(crate) fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl Default for ModalityType {
    #[inline]
    fn default() -> Self {
        Self::Modeless
    }
}

/// Lets a window opt out of being blocked. Each level includes the ones below it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModalExclusion {
    NoExclude,
    /// Not blocked by application-modal dialogs, nor by document-modal dialogs outside the
    /// window's own hierarchy.
    ApplicationExclude,
    /// Not blocked by any modal dialog.
    ToolkitExclude,
}

impl Default for ModalExclusion {
    #[inline]
    fn default() -> Self {
        Self::NoExclude
    }
}

/// Identifies a logical application sharing a modality space.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct AppContextId(pub u32);

/// The native side of a window, notified when its modal state changes.
pub trait WindowPeer: Send + Sync {
    /// The window was blocked or unblocked by a modal dialog.
    fn set_blocked(&self, blocked: bool);

    /// The window should be raised above other windows. Sent to a dialog that blocks a window
    /// being shown.
    #[inline]
    fn to_front(&self) {}
}

/// Everything the modality space needs to know about a window.
#[derive(Clone, Default)]
pub struct WindowSpec {
    pub(crate) owner: Option<SourceId>,
    pub(crate) app_context: AppContextId,
    pub(crate) exclusion: ModalExclusion,
    pub(crate) peer: Option<Arc<dyn WindowPeer>>,
}

impl WindowSpec {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the window that owns this one.
    #[inline]
    pub fn owner(mut self, owner: SourceId) -> Self {
        self.owner = Some(owner);
        self
    }

    #[inline]
    pub fn app_context(mut self, app_context: AppContextId) -> Self {
        self.app_context = app_context;
        self
    }

    #[inline]
    pub fn exclusion(mut self, exclusion: ModalExclusion) -> Self {
        self.exclusion = exclusion;
        self
    }

    #[inline]
    pub fn peer<P: WindowPeer + 'static>(mut self, peer: P) -> Self {
        self.peer = Some(Arc::new(peer));
        self
    }

    #[inline]
    pub fn shared_peer(mut self, peer: Arc<dyn WindowPeer>) -> Self {
        self.peer = Some(peer);
        self
    }
}

impl fmt::Debug for WindowSpec {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowSpec")
            .field("owner", &self.owner)
            .field("app_context", &self.app_context)
            .field("exclusion", &self.exclusion)
            .field("peer", &self.peer.is_some())
            .finish()
    }
}
