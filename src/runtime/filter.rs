// MIT/Apache2 License

use super::{Runtime, RuntimeInternal};
use crate::{
    event::{Event, EventKind, SourceId, WindowEventKind},
    queue::{EventFilter, FilterAction},
};
use std::sync::Weak;

/// Installed while a modal dialog's secondary loop runs. Input to the windows the dialog blocks
/// is dropped, and attempts to activate or focus them raise the dialog instead.
pub(crate) struct ModalEventFilter {
    runtime: Weak<RuntimeInternal>,
    dialog: SourceId,
}

impl ModalEventFilter {
    #[inline]
    pub(crate) fn new(runtime: Weak<RuntimeInternal>, dialog: SourceId) -> Self {
        Self { runtime, dialog }
    }
}

#[inline]
fn is_activation(event: &Event) -> bool {
    event.is_focus_gained()
        || matches!(
            event.kind(),
            EventKind::Window(WindowEventKind::Activated)
                | EventKind::Window(WindowEventKind::GainedFocus)
        )
}

impl EventFilter for ModalEventFilter {
    fn accept(&self, event: &Event) -> FilterAction {
        let activation = is_activation(event);
        if !event.is_input() && !activation {
            return FilterAction::Accept;
        }

        let runtime = match self.runtime.upgrade() {
            Some(internal) => Runtime(internal),
            None => return FilterAction::Accept,
        };
        let window = match runtime.window_of(event.source()) {
            Some(window) => window,
            None => return FilterAction::Accept,
        };
        if runtime.modality().blocker_of(window) != Some(self.dialog) {
            return FilterAction::Accept;
        }

        if activation {
            log::debug!("{} is blocked, raising {} instead", window, self.dialog);
            runtime.modality().raise_blocker(window);
        } else {
            log::trace!("Dropping input for {}, blocked by {}", window, self.dialog);
        }
        FilterAction::Reject
    }
}
