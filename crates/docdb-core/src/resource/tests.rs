use crate::{
    resource::{
        Handler, LeakDiagnostic, LeakReporter, Release, Resource, ResourceOptions,
    },
    sync::{ExclusiveLock, Lock},
};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

#[derive(Default)]
struct RecordingReporter {
    entries: Lock<Vec<LeakDiagnostic>>,
}

impl RecordingReporter {
    fn headlines(&self) -> Vec<String> {
        self.entries
            .with_lock(|entries| entries.iter().map(|d| d.headline().to_string()).collect())
    }
}

impl LeakReporter for RecordingReporter {
    fn report(&self, diagnostic: &LeakDiagnostic) {
        self.entries.with_lock(|entries| entries.push(diagnostic.clone()));
    }
}

struct Counted {
    releases: Arc<AtomicUsize>,
}

impl Release for Counted {
    fn release(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

fn options(track: bool, fail: bool) -> (ResourceOptions, Arc<RecordingReporter>) {
    let reporter = Arc::new(RecordingReporter::default());
    let options = ResourceOptions {
        track_allocation: track,
        fail_on_bad_close: fail,
        reporter: reporter.clone(),
    };

    (options, reporter)
}

fn counted() -> (Counted, Arc<AtomicUsize>) {
    let releases = Arc::new(AtomicUsize::new(0));
    (
        Counted {
            releases: releases.clone(),
        },
        releases,
    )
}

#[test]
fn close_twice_releases_once() {
    let (options, reporter) = options(true, false);
    let (payload, releases) = counted();
    let resource = Resource::new("Cursor", payload, None, &options);

    resource.close();
    resource.close();
    drop(resource);

    assert_eq!(releases.load(Ordering::SeqCst), 1);
    assert!(reporter.headlines().is_empty());
}

#[test]
fn closed_resource_rejects_use() {
    let (options, _) = options(false, false);
    let (payload, _) = counted();
    let resource = Resource::new("Cursor", payload, None, &options);

    assert!(resource.with(|_| ()).is_ok());
    resource.close();

    let err = resource.check_is_open().unwrap_err();
    assert!(err.is_closed());
    assert_eq!(err.to_string(), "Cursor has been closed");
    assert!(resource.with(|_| ()).unwrap_err().is_closed());
}

#[test]
fn drop_closes_without_diagnostic() {
    let (options, reporter) = options(true, false);
    let handler = Handler::new();
    let (payload, releases) = counted();

    let resource = Resource::new("Cursor", payload, Some(&handler), &options);
    assert_eq!(handler.open_count(), 1);
    drop(resource);

    assert_eq!(handler.open_count(), 0);
    assert_eq!(releases.load(Ordering::SeqCst), 1);
    assert_eq!(handler.close().expect("nothing left to leak"), 0);
    assert!(reporter.headlines().is_empty());
}

#[test]
fn handler_close_force_closes_two_cursors() {
    let (options, reporter) = options(true, false);
    let handler = Handler::new();
    let (first_payload, first_releases) = counted();
    let (second_payload, second_releases) = counted();

    let first = Resource::new("Cursor", first_payload, Some(&handler), &options);
    let second = Resource::new("Cursor", second_payload, Some(&handler), &options);

    assert_eq!(handler.close().expect("leaks are warnings by default"), 2);

    assert!(!first.is_open());
    assert!(!second.is_open());
    assert_eq!(first_releases.load(Ordering::SeqCst), 1);
    assert_eq!(second_releases.load(Ordering::SeqCst), 1);
    assert_eq!(
        reporter.headlines(),
        vec![
            "Cursor must be closed. Creation stack trace:".to_string(),
            "Cursor must be closed. Creation stack trace:".to_string(),
        ]
    );

    // Late explicit closes are no-ops.
    first.close();
    second.close();
    assert_eq!(first_releases.load(Ordering::SeqCst), 1);
    assert_eq!(reporter.headlines().len(), 2);
}

#[test]
fn untracked_leak_recommends_tracking() {
    let (options, reporter) = options(false, false);
    let handler = Handler::new();
    let (payload, _) = counted();
    let _cursor = Resource::new("Cursor", payload, Some(&handler), &options);

    handler.close().expect("leaks are warnings by default");

    assert_eq!(
        reporter.headlines(),
        vec![
            "Cursor has not been properly closed. To track its allocation, set track_closable_allocation."
                .to_string()
        ]
    );
}

#[test]
fn fail_on_bad_close_escalates_but_still_releases() {
    let (options, reporter) = options(true, true);
    let (payload, releases) = counted();
    let resource = Resource::new("Cursor", payload, None, &options);

    let err = resource.close_bad().unwrap_err();

    assert!(err.diagnostic.tracked);
    assert!(err.to_string().starts_with("Cursor must be closed."));
    assert_eq!(releases.load(Ordering::SeqCst), 1);
    assert!(reporter.headlines().is_empty());
    assert!(!resource.is_open());

    // Already closed: nothing left to report.
    assert!(resource.close_bad().is_ok());
}

#[test]
fn handler_close_returns_first_escalated_leak_after_closing_all() {
    let (options, _) = options(false, true);
    let handler = Handler::new();
    let (first_payload, first_releases) = counted();
    let (second_payload, second_releases) = counted();
    let first = Resource::new("Cursor", first_payload, Some(&handler), &options);
    let second = Resource::new("Iterator", second_payload, Some(&handler), &options);

    let err = handler.close().unwrap_err();

    assert_eq!(err.diagnostic.resource, "Cursor");
    assert!(!first.is_open());
    assert!(!second.is_open());
    assert_eq!(first_releases.load(Ordering::SeqCst), 1);
    assert_eq!(second_releases.load(Ordering::SeqCst), 1);
}

#[test]
fn closed_handler_stays_closed_until_reopened() {
    let (options, _) = options(false, false);
    let handler = Handler::new();
    handler.close().expect("empty handler closes cleanly");
    assert!(handler.is_closed());

    let (payload, _) = counted();
    let ignored = Resource::new("Cursor", payload, Some(&handler), &options);
    assert_eq!(handler.open_count(), 0);
    assert_eq!(handler.close().expect("already closed"), 0);
    assert!(ignored.is_open());

    assert!(handler.reopen());
    assert!(!handler.is_closed());

    let (payload, _) = counted();
    let tracked = Resource::new("Cursor", payload, Some(&handler), &options);
    assert_eq!(handler.open_count(), 1);
    assert_eq!(handler.close().expect("warnings only"), 1);
    assert!(!tracked.is_open());
}

#[cfg(not(feature = "phony-lock"))]
#[test]
fn handler_tracks_resources_created_on_many_threads() {
    use std::thread;

    let (options, reporter) = options(false, false);
    let handler = Handler::new();

    let resources: Vec<_> = (0..8)
        .map(|_| {
            let handler = handler.clone();
            let options = options.clone();
            thread::spawn(move || {
                let (payload, _) = counted();
                Resource::new("Cursor", payload, Some(&handler), &options)
            })
        })
        .map(|join| join.join().expect("creator thread should not panic"))
        .collect();

    assert_eq!(handler.open_count(), 8);
    assert_eq!(handler.close().expect("warnings only"), 8);
    assert!(resources.iter().all(|resource| !resource.is_open()));
    assert_eq!(reporter.headlines().len(), 8);
}
