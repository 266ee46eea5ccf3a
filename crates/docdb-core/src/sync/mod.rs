//! Module: sync
//! Responsibility: the lock interfaces every shared structure is built on.
//! Does not own: what is protected; callers pick the data and the scope.
//! Boundary: `DefaultLocking` is fixed at build time by the `phony-lock` feature.

mod phony;
mod threaded;


pub use phony::{Phony, PhonyLock, PhonyRwLock};
pub use threaded::{Threaded, ThreadedLock, ThreadedRwLock};

///
/// ExclusiveLock
///
/// Mutual exclusion over one value. The closure runs with the lock held and
/// the lock is released on every exit path, unwinding included.
///

pub trait ExclusiveLock<T> {
    fn new(value: T) -> Self;

    fn with_lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> R;

    fn into_inner(self) -> T;
}

///
/// SharedLock
///
/// Shared/exclusive access over one value.
///

pub trait SharedLock<T> {
    fn new(value: T) -> Self;

    fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R;

    fn write<R>(&self, f: impl FnOnce(&mut T) -> R) -> R;

    fn into_inner(self) -> T;
}

///
/// Locking
///
/// A family of lock implementations. Dependents take it as a type parameter
/// so the choice is injected rather than looked up.
///

pub trait Locking: 'static {
    type Lock<T>: ExclusiveLock<T>;
    type RwLock<T>: SharedLock<T>;

    /// Human-readable family name, used in debug output.
    const NAME: &'static str;
}

#[cfg(not(feature = "phony-lock"))]
pub type DefaultLocking = Threaded;

#[cfg(feature = "phony-lock")]
pub type DefaultLocking = Phony;

/// Mutex of the build's default lock family.
pub type Lock<T> = <DefaultLocking as Locking>::Lock<T>;

/// Read/write lock of the build's default lock family.
pub type RwLock<T> = <DefaultLocking as Locking>::RwLock<T>;

///
/// Shareable
///
/// `Send + Sync` in threaded builds, nothing in phony builds. Used as a
/// supertrait on the trait objects that cross the lock boundary.
///

#[cfg(not(feature = "phony-lock"))]
pub trait Shareable: Send + Sync {}

#[cfg(not(feature = "phony-lock"))]
impl<T: ?Sized + Send + Sync> Shareable for T {}

#[cfg(feature = "phony-lock")]
pub trait Shareable {}

#[cfg(feature = "phony-lock")]
impl<T: ?Sized> Shareable for T {}
