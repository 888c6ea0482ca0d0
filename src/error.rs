// MIT/Apache2 License

use crate::event::SourceId;
use core::fmt;
use std::io;

/// Container for all errors that can happen.
///
/// Every fallible function in `gui-events` returns this `Error` type. Delivery failures
/// (a target panicking while it handles an event) are not represented here: they are caught
/// by the dispatch worker and only show up in the logs.
#[derive(Debug)]
pub enum Error {
    /// The event cannot be posted, e.g. because it was already posted once.
    InvalidEvent(&'static str),
    /// `pop()` was called on a queue stack with only one queue in it.
    EmptyQueueStack,
    /// The queue handle was popped off its stack and no longer accepts events.
    QueueDetached,
    /// The secondary loop of a modal dialog is already running.
    SecondaryLoopActive,
    /// A synchronous invocation was requested from the dispatch thread itself.
    InvokeFromDispatchThread,
    /// The runnable behind a synchronous invocation panicked.
    InvocationPanicked,
    /// The runnable behind a synchronous invocation was disposed of before it could run.
    InvocationDropped,
    /// The caller lacks the permission required for the requested operation.
    Security(&'static str),
    /// The window is not registered in the modality space.
    UnknownWindow(SourceId),
    /// A blocking wait was interrupted by a shutdown wakeup.
    ShutDown,
    /// The dispatch worker thread could not be spawned.
    WorkerSpawn(io::Error),
}

impl From<io::Error> for Error {
    #[inline]
    fn from(e: io::Error) -> Error {
        Self::WorkerSpawn(e)
    }
}

impl fmt::Display for Error {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEvent(reason) => write!(f, "Invalid event: {}", reason),
            Self::EmptyQueueStack => f.write_str("There is no event queue below the top of the stack"),
            Self::QueueDetached => f.write_str("The event queue was popped off its stack"),
            Self::SecondaryLoopActive => f.write_str("The secondary loop is already running"),
            Self::InvokeFromDispatchThread => {
                f.write_str("Cannot wait for an invocation from the event dispatch thread")
            }
            Self::InvocationPanicked => f.write_str("The invoked runnable panicked"),
            Self::InvocationDropped => {
                f.write_str("The invocation event was disposed of before it was dispatched")
            }
            Self::Security(reason) => write!(f, "Security error: {}", reason),
            Self::UnknownWindow(id) => write!(f, "Window {} is not registered", id),
            Self::ShutDown => f.write_str("The event queue is shutting down"),
            Self::WorkerSpawn(ref e) => write!(f, "Unable to spawn the dispatch thread: {}", e),
        }
    }
}

impl std::error::Error for Error {
    #[inline]
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::WorkerSpawn(ref e) => Some(e),
            _ => None,
        }
    }
}

/// Result type, for convenience.
pub type Result<T = ()> = core::result::Result<T, Error>;
