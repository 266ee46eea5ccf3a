use crate::sync::{ExclusiveLock, Locking, SharedLock};
use std::cell::RefCell;

///
/// Phony
///
/// Lock family for targets without threads. Acquisition is a borrow flag
/// check; the types are not `Sync`, so they cannot leak into threaded code.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct Phony;

impl Locking for Phony {
    type Lock<T> = PhonyLock<T>;
    type RwLock<T> = PhonyRwLock<T>;

    const NAME: &'static str = "phony";
}

///
/// PhonyLock
///

#[derive(Debug, Default)]
pub struct PhonyLock<T>(RefCell<T>);

impl<T> ExclusiveLock<T> for PhonyLock<T> {
    fn new(value: T) -> Self {
        Self(RefCell::new(value))
    }

    fn with_lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }

    fn into_inner(self) -> T {
        self.0.into_inner()
    }
}

///
/// PhonyRwLock
///

#[derive(Debug, Default)]
pub struct PhonyRwLock<T>(RefCell<T>);

impl<T> SharedLock<T> for PhonyRwLock<T> {
    fn new(value: T) -> Self {
        Self(RefCell::new(value))
    }

    fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.0.borrow())
    }

    fn write<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }

    fn into_inner(self) -> T {
        self.0.into_inner()
    }
}
