// MIT/Apache2 License

use std::{any, fmt};

/// Hash map used for every id-keyed registry in the crate.
pub(crate) type Map<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;

/// Wraps a value that has no useful `Debug` output (boxed closures, trait objects) and prints
/// its type name instead.
#[repr(transparent)]
pub(crate) struct DebugContainer<T>(T);

impl<T> fmt::Debug for DebugContainer<T> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(any::type_name::<T>())
    }
}

impl<T> DebugContainer<T> {
    #[inline]
    pub(crate) fn new(t: T) -> Self {
        Self(t)
    }

    #[inline]
    pub(crate) fn into_inner(self) -> T {
        self.0
    }
}

/// Best-effort extraction of a panic message for logging.
pub(crate) fn panic_message(payload: &(dyn any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
