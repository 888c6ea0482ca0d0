// MIT/Apache2 License

//! Implementation of a mutex, a read/write lock and a condition variable. These are backed by the
//! `std::sync` primitives when the `pl` feature is not enabled, and by `parking_lot` when it is.
//!
//! Lock poisoning is ignored. Delivery runs with every lock released, so a panic never leaves
//! the queue or modality bookkeeping half-updated.

#[cfg(not(feature = "pl"))]
use std::sync::{self, PoisonError};
use std::time::Duration;

#[cfg(feature = "pl")]
pub(crate) type MutexGuard<'a, T> = parking_lot::MutexGuard<'a, T>;
#[cfg(not(feature = "pl"))]
pub(crate) type MutexGuard<'a, T> = sync::MutexGuard<'a, T>;

#[cfg(feature = "pl")]
pub(crate) type RwLockReadGuard<'a, T> = parking_lot::RwLockReadGuard<'a, T>;
#[cfg(not(feature = "pl"))]
pub(crate) type RwLockReadGuard<'a, T> = sync::RwLockReadGuard<'a, T>;

#[cfg(feature = "pl")]
pub(crate) type RwLockWriteGuard<'a, T> = parking_lot::RwLockWriteGuard<'a, T>;
#[cfg(not(feature = "pl"))]
pub(crate) type RwLockWriteGuard<'a, T> = sync::RwLockWriteGuard<'a, T>;

pub(crate) struct Mutex<T: ?Sized> {
    #[cfg(feature = "pl")]
    inner: parking_lot::Mutex<T>,
    #[cfg(not(feature = "pl"))]
    inner: sync::Mutex<T>,
}

impl<T> Mutex<T> {
    #[inline]
    pub(crate) fn new(data: T) -> Mutex<T> {
        #[cfg(feature = "pl")]
        {
            Mutex {
                inner: parking_lot::Mutex::new(data),
            }
        }
        #[cfg(not(feature = "pl"))]
        {
            Mutex {
                inner: sync::Mutex::new(data),
            }
        }
    }
}

impl<T: Default> Default for Mutex<T> {
    #[inline]
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized> Mutex<T> {
    #[cfg(feature = "pl")]
    #[inline]
    pub(crate) fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock()
    }

    #[cfg(not(feature = "pl"))]
    #[inline]
    pub(crate) fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) struct RwLock<T: ?Sized> {
    #[cfg(feature = "pl")]
    inner: parking_lot::RwLock<T>,
    #[cfg(not(feature = "pl"))]
    inner: sync::RwLock<T>,
}

impl<T> RwLock<T> {
    #[inline]
    pub(crate) fn new(data: T) -> RwLock<T> {
        #[cfg(feature = "pl")]
        {
            RwLock {
                inner: parking_lot::RwLock::new(data),
            }
        }
        #[cfg(not(feature = "pl"))]
        {
            RwLock {
                inner: sync::RwLock::new(data),
            }
        }
    }
}

impl<T: Default> Default for RwLock<T> {
    #[inline]
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized> RwLock<T> {
    #[cfg(feature = "pl")]
    #[inline]
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, T> {
        self.inner.read()
    }

    #[cfg(not(feature = "pl"))]
    #[inline]
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, T> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(feature = "pl")]
    #[inline]
    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.inner.write()
    }

    #[cfg(not(feature = "pl"))]
    #[inline]
    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) struct Condvar {
    #[cfg(feature = "pl")]
    inner: parking_lot::Condvar,
    #[cfg(not(feature = "pl"))]
    inner: sync::Condvar,
}

impl Condvar {
    #[inline]
    pub(crate) fn new() -> Condvar {
        #[cfg(feature = "pl")]
        {
            Condvar {
                inner: parking_lot::Condvar::new(),
            }
        }
        #[cfg(not(feature = "pl"))]
        {
            Condvar {
                inner: sync::Condvar::new(),
            }
        }
    }

    #[inline]
    pub(crate) fn notify_all(&self) {
        self.inner.notify_all();
    }

    #[cfg(feature = "pl")]
    #[inline]
    pub(crate) fn wait<'a, T>(&self, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
        let mut guard = guard;
        self.inner.wait(&mut guard);
        guard
    }

    #[cfg(not(feature = "pl"))]
    #[inline]
    pub(crate) fn wait<'a, T>(&self, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
        self.inner.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for a notification or until `timeout` elapses. The boolean is `true` on timeout.
    #[cfg(feature = "pl")]
    #[inline]
    pub(crate) fn wait_timeout<'a, T>(
        &self,
        guard: MutexGuard<'a, T>,
        timeout: Duration,
    ) -> (MutexGuard<'a, T>, bool) {
        let mut guard = guard;
        let res = self.inner.wait_for(&mut guard, timeout);
        (guard, res.timed_out())
    }

    /// Wait for a notification or until `timeout` elapses. The boolean is `true` on timeout.
    #[cfg(not(feature = "pl"))]
    #[inline]
    pub(crate) fn wait_timeout<'a, T>(
        &self,
        guard: MutexGuard<'a, T>,
        timeout: Duration,
    ) -> (MutexGuard<'a, T>, bool) {
        let (guard, res) = self
            .inner
            .wait_timeout(guard, timeout)
            .unwrap_or_else(PoisonError::into_inner);
        (guard, res.timed_out())
    }
}
