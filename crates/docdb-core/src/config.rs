use crate::{
    cache::{DEFAULT_MAX_CACHE_SIZE, DEFAULT_MAX_MARKERS},
    resource::{LeakReporter, ResourceOptions, TracingReporter},
};
use serde::Deserialize;
use std::{
    fmt::{self, Debug},
    sync::Arc,
};

///
/// DbOptions
///
/// Store configuration. Deserializable so embedders can keep it next to
/// their own settings; the reporter is code-only.
///

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DbOptions {
    /// Capture a backtrace for every cursor so leak reports show where it
    /// was opened. On by default in debug builds.
    pub track_closable_allocation: bool,

    /// Turn leak reports into `Error::Leak`.
    pub fail_on_bad_close: bool,

    /// Cache budget in bytes of encoded records.
    pub max_cache_size: usize,

    /// How many deleted or evicted keys the cache remembers.
    pub max_cache_markers: usize,

    #[serde(skip)]
    pub reporter: Arc<dyn LeakReporter>,
}

impl DbOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_track_closable_allocation(mut self, track: bool) -> Self {
        self.track_closable_allocation = track;
        self
    }

    #[must_use]
    pub const fn with_fail_on_bad_close(mut self, fail: bool) -> Self {
        self.fail_on_bad_close = fail;
        self
    }

    #[must_use]
    pub const fn with_max_cache_size(mut self, bytes: usize) -> Self {
        self.max_cache_size = bytes;
        self
    }

    #[must_use]
    pub const fn with_max_cache_markers(mut self, markers: usize) -> Self {
        self.max_cache_markers = markers;
        self
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn LeakReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub(crate) fn resource_options(&self) -> ResourceOptions {
        ResourceOptions {
            track_allocation: self.track_closable_allocation,
            fail_on_bad_close: self.fail_on_bad_close,
            reporter: Arc::clone(&self.reporter),
        }
    }
}

impl Default for DbOptions {
    fn default() -> Self {
        Self {
            track_closable_allocation: cfg!(debug_assertions),
            fail_on_bad_close: false,
            max_cache_size: DEFAULT_MAX_CACHE_SIZE,
            max_cache_markers: DEFAULT_MAX_MARKERS,
            reporter: Arc::new(TracingReporter),
        }
    }
}

impl Debug for DbOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbOptions")
            .field("track_closable_allocation", &self.track_closable_allocation)
            .field("fail_on_bad_close", &self.fail_on_bad_close)
            .field("max_cache_size", &self.max_cache_size)
            .field("max_cache_markers", &self.max_cache_markers)
            .finish_non_exhaustive()
    }
}
