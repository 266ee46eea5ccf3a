use crate::{
    resource::{ForceClose, LeakError},
    sync::{ExclusiveLock, Lock},
};
use std::{
    collections::BTreeMap,
    fmt::{self, Debug},
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, Ordering},
    },
};

///
/// Handler
///
/// Scope-bound registry of open resources. Entries are weak: registering
/// never keeps a resource alive. `close()` force-closes what is left.
///

#[derive(Clone, Default)]
pub struct Handler {
    inner: Arc<HandlerInner>,
}

#[derive(Default)]
struct HandlerInner {
    closed: AtomicBool,
    open: Lock<BTreeMap<u64, Weak<dyn ForceClose>>>,
}

impl Handler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // Registration on a closed handler is dropped; the resource stays
    // usable but untracked.
    pub(crate) fn add(&self, id: u64, resource: Weak<dyn ForceClose>) {
        if self.is_closed() {
            tracing::debug!(target: "docdb::resource", id, "handler closed, resource not tracked");
            return;
        }

        self.inner.open.with_lock(|open| {
            open.insert(id, resource);
        });
    }

    pub(crate) fn remove(&self, id: u64) {
        self.inner.open.with_lock(|open| {
            open.remove(&id);
        });
    }

    /// Number of registered resources still alive.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.inner
            .open
            .with_lock(|open| open.values().filter(|weak| weak.strong_count() > 0).count())
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Force-close every registered resource, oldest first, and empty the
    /// registry. Returns how many were force-closed, or the first escalated
    /// leak when `fail_on_bad_close` is set; every resource is closed either
    /// way. The handler stays closed until `reopen()`.
    pub fn close(&self) -> Result<usize, LeakError> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(0);
        }

        // Drain first so closing resources never contends on the registry.
        let drained = self.inner.open.with_lock(std::mem::take);

        let mut forced = 0;
        let mut first_error = None;
        for resource in drained.values().filter_map(Weak::upgrade) {
            match resource.force_close() {
                Ok(true) => forced += 1,
                Ok(false) => {}
                Err(err) => {
                    forced += 1;
                    first_error.get_or_insert(err);
                }
            }
        }

        if forced > 0 {
            tracing::debug!(
                target: "docdb::resource",
                forced,
                "handler force-closed open resources"
            );
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(forced),
        }
    }

    /// Re-arm a closed handler so it tracks new resources again.
    /// Returns whether it was closed.
    pub fn reopen(&self) -> bool {
        self.inner.closed.swap(false, Ordering::AcqRel)
    }
}

impl Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("closed", &self.is_closed())
            .field("open", &self.open_count())
            .finish()
    }
}
