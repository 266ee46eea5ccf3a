use crate::sync::{ExclusiveLock, Locking, SharedLock};

///
/// Threaded
///
/// Lock family with real exclusion, backed by parking_lot.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct Threaded;

impl Locking for Threaded {
    type Lock<T> = ThreadedLock<T>;
    type RwLock<T> = ThreadedRwLock<T>;

    const NAME: &'static str = "threaded";
}

///
/// ThreadedLock
///

#[derive(Debug, Default)]
pub struct ThreadedLock<T>(parking_lot::Mutex<T>);

impl<T> ExclusiveLock<T> for ThreadedLock<T> {
    fn new(value: T) -> Self {
        Self(parking_lot::Mutex::new(value))
    }

    fn with_lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.0.lock();
        f(&mut guard)
    }

    fn into_inner(self) -> T {
        self.0.into_inner()
    }
}

///
/// ThreadedRwLock
///

#[derive(Debug, Default)]
pub struct ThreadedRwLock<T>(parking_lot::RwLock<T>);

impl<T> SharedLock<T> for ThreadedRwLock<T> {
    fn new(value: T) -> Self {
        Self(parking_lot::RwLock::new(value))
    }

    fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.0.read();
        f(&guard)
    }

    fn write<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.0.write();
        f(&mut guard)
    }

    fn into_inner(self) -> T {
        self.0.into_inner()
    }
}
