use crate::sync::Shareable;
use std::backtrace::Backtrace;
use thiserror::Error as ThisError;

///
/// LeakDiagnostic
///
/// Report for a resource found still open when its owner gave up on it.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LeakDiagnostic {
    pub resource: String,
    pub message: String,
    pub tracked: bool,
}

impl LeakDiagnostic {
    pub(crate) fn new(resource: &str, allocation: Option<&Backtrace>) -> Self {
        let message = match allocation {
            Some(trace) => format!("{resource} must be closed. Creation stack trace:\n{trace}"),
            None => format!(
                "{resource} has not been properly closed. To track its allocation, set track_closable_allocation."
            ),
        };

        Self {
            resource: resource.to_string(),
            message,
            tracked: allocation.is_some(),
        }
    }

    /// First line of the message, without the stack trace.
    #[must_use]
    pub fn headline(&self) -> &str {
        self.message.lines().next().unwrap_or_default().trim()
    }
}

///
/// LeakError
///
/// A leak diagnostic escalated to a failure by `fail_on_bad_close`.
///

#[derive(Debug, ThisError)]
#[error("{}", diagnostic.message)]
pub struct LeakError {
    pub diagnostic: LeakDiagnostic,
}

///
/// LeakReporter
///
/// Destination of non-fatal leak diagnostics.
///

pub trait LeakReporter: Shareable {
    fn report(&self, diagnostic: &LeakDiagnostic);
}

///
/// TracingReporter
///
/// Default reporter: one `warn!` event per diagnostic.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct TracingReporter;

impl LeakReporter for TracingReporter {
    fn report(&self, diagnostic: &LeakDiagnostic) {
        tracing::warn!(
            target: "docdb::resource",
            resource = %diagnostic.resource,
            tracked = diagnostic.tracked,
            "{}",
            diagnostic.message
        );
    }
}
