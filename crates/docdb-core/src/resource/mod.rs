//! Module: resource
//! Responsibility: lifecycle of native-backed handles (cursors, sessions).
//! Does not own: what a handle releases; that is the payload's `Release`.
//! Boundary: every engine cursor handed to callers is wrapped in a `Resource`.

mod diagnostic;
mod handler;

#[cfg(test)]
mod tests;

pub use diagnostic::{LeakDiagnostic, LeakError, LeakReporter, TracingReporter};
pub use handler::Handler;

use crate::{
    error::Error,
    sync::{ExclusiveLock, Lock, Shareable},
};
use std::{
    backtrace::Backtrace,
    fmt::{self, Debug},
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

///
/// Release
///
/// Platform-specific release of a handle's native state. Called exactly
/// once per resource.
///

pub trait Release: Shareable {
    fn release(&mut self);
}

///
/// ResourceOptions
///

#[derive(Clone)]
pub struct ResourceOptions {
    /// Capture a backtrace at creation so leak diagnostics can show it.
    pub track_allocation: bool,
    /// Turn leak diagnostics into `LeakError`s instead of warnings.
    pub fail_on_bad_close: bool,
    pub reporter: Arc<dyn LeakReporter>,
}

impl Default for ResourceOptions {
    fn default() -> Self {
        Self {
            track_allocation: cfg!(debug_assertions),
            fail_on_bad_close: false,
            reporter: Arc::new(TracingReporter),
        }
    }
}

impl Debug for ResourceOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceOptions")
            .field("track_allocation", &self.track_allocation)
            .field("fail_on_bad_close", &self.fail_on_bad_close)
            .finish_non_exhaustive()
    }
}

// Handler-side view of a tracked resource.
pub(crate) trait ForceClose: Shareable {
    /// Returns whether this call did the closing.
    fn force_close(&self) -> Result<bool, LeakError>;
}

struct Tracked<R: Release> {
    id: u64,
    name: String,
    closed: AtomicBool,
    payload: Lock<Option<R>>,
    allocation: Option<Backtrace>,
    handler: Option<Handler>,
    options: ResourceOptions,
}

impl<R: Release> Tracked<R> {
    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.release();
    }

    fn release(&self) {
        if let Some(handler) = &self.handler {
            handler.remove(self.id);
        }
        if let Some(mut payload) = self.payload.with_lock(Option::take) {
            payload.release();
        }
    }
}

impl<R: Release> ForceClose for Tracked<R> {
    fn force_close(&self) -> Result<bool, LeakError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(false);
        }

        let diagnostic = LeakDiagnostic::new(&self.name, self.allocation.as_ref());
        if !self.options.fail_on_bad_close {
            self.options.reporter.report(&diagnostic);
        }

        self.release();

        if self.options.fail_on_bad_close {
            return Err(LeakError { diagnostic });
        }

        Ok(true)
    }
}

///
/// Resource
///
/// An owned handle: `Open` until `close()`, `close_bad()` or drop, then
/// `Closed` for good. The optional `Handler` only holds it weakly.
///

pub struct Resource<R: Release + 'static> {
    tracked: Arc<Tracked<R>>,
}

impl<R: Release + 'static> Resource<R> {
    pub fn new(
        name: impl Into<String>,
        payload: R,
        handler: Option<&Handler>,
        options: &ResourceOptions,
    ) -> Self {
        let allocation = options
            .track_allocation
            .then(Backtrace::force_capture);

        let tracked = Arc::new(Tracked {
            id: NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            closed: AtomicBool::new(false),
            payload: ExclusiveLock::new(Some(payload)),
            allocation,
            handler: handler.cloned(),
            options: options.clone(),
        });

        if let Some(handler) = handler {
            let weak: Weak<dyn ForceClose> = Arc::downgrade(&tracked) as Weak<dyn ForceClose>;
            handler.add(tracked.id, weak);
        }

        Self { tracked }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.tracked.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.tracked.name
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.tracked.closed.load(Ordering::Acquire)
    }

    /// Close and release. A second call does nothing.
    pub fn close(&self) {
        self.tracked.close();
    }

    /// Close a resource found open where it should not be, reporting it.
    pub fn close_bad(&self) -> Result<(), LeakError> {
        self.tracked.force_close().map(|_| ())
    }

    pub fn check_is_open(&self) -> Result<(), Error> {
        if self.is_open() {
            Ok(())
        } else {
            Err(Error::closed(self.name()))
        }
    }

    /// Run `f` against the open payload.
    pub fn with<T>(&self, f: impl FnOnce(&mut R) -> T) -> Result<T, Error> {
        self.check_is_open()?;

        self.tracked
            .payload
            .with_lock(|payload| payload.as_mut().map(f))
            .ok_or_else(|| Error::closed(self.name()))
    }
}

impl<R: Release + 'static> Debug for Resource<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("open", &self.is_open())
            .finish()
    }
}

impl<R: Release + 'static> Drop for Resource<R> {
    fn drop(&mut self) {
        self.tracked.close();
    }
}
