#![forbid(unsafe_code)]

//! Cancellable request handles and per-page tracking.
//!
//! Every HTTP call a page issues is represented by a [`RequestHandle`]:
//! a shared, settle-once handle with completion callbacks and an abort
//! operation. The transport (an [`HttpClient`] implementation) keeps a
//! clone and settles it when the response arrives; the owning page's
//! [`RequestTracker`] keeps another clone so the request can be aborted
//! if the page is abandoned mid-transition.
//!
//! # Settlement invariants
//!
//! 1. A handle settles at most once; later settles (including a late
//!    response after an abort) are ignored.
//! 2. Callbacks registered before settlement run exactly once, in
//!    registration order; callbacks registered after settlement run
//!    immediately.
//! 3. `abort` is just settlement with [`Outcome::Aborted`]: `always`
//!    callbacks fire, failure callbacks do not, so cancellation never
//!    produces a user-visible error.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use hashnav_core::params::NavParams;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// An HTTP response as seen by the navigation layer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Response body text.
    pub body: String,
}

impl Response {
    /// Convenience constructor.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Final state of a settled request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The request completed successfully.
    Done(Response),
    /// The request failed.
    Failed(Response),
    /// The request was aborted before completion.
    Aborted,
}

impl Outcome {
    /// Whether this outcome is a success.
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done(_))
    }

    /// Whether this outcome is a failure.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    /// Whether this outcome is an abort.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self, Outcome::Aborted)
    }
}

// ---------------------------------------------------------------------------
// Request handles
// ---------------------------------------------------------------------------

type Callback = Box<dyn FnOnce(&Outcome) + Send>;

enum Slot {
    Pending(Vec<Callback>),
    Settled(Outcome),
}

struct Inner {
    url: String,
    slot: Mutex<Slot>,
}

/// Shared handle to an asynchronous request.
///
/// Clones refer to the same underlying request; identity is the shared
/// allocation, compared with [`RequestHandle::same`].
#[derive(Clone)]
pub struct RequestHandle {
    inner: Arc<Inner>,
}

/// Weak counterpart of [`RequestHandle`], used by callbacks that must
/// not keep the request alive.
pub struct WeakRequestHandle {
    inner: Weak<Inner>,
}

impl WeakRequestHandle {
    /// Upgrade back to a strong handle if the request is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<RequestHandle> {
        self.inner.upgrade().map(|inner| RequestHandle { inner })
    }
}

impl RequestHandle {
    /// Create a new pending request handle for the given URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                url: url.into(),
                slot: Mutex::new(Slot::Pending(Vec::new())),
            }),
        }
    }

    /// The URL this request targets.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Whether two handles refer to the same request.
    #[must_use]
    pub fn same(&self, other: &RequestHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Downgrade to a weak handle.
    #[must_use]
    pub fn downgrade(&self) -> WeakRequestHandle {
        WeakRequestHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Whether the request has settled.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(*self.lock(), Slot::Settled(_))
    }

    /// The outcome, if settled.
    #[must_use]
    pub fn outcome(&self) -> Option<Outcome> {
        match &*self.lock() {
            Slot::Settled(outcome) => Some(outcome.clone()),
            Slot::Pending(_) => None,
        }
    }

    /// Settle the request with the given outcome.
    ///
    /// Returns `false` if the request had already settled (the outcome
    /// is discarded). The first settlement drains and runs all pending
    /// callbacks, outside the internal lock.
    pub fn settle(&self, outcome: Outcome) -> bool {
        let callbacks = {
            let mut slot = self.lock();
            match &mut *slot {
                Slot::Settled(_) => return false,
                Slot::Pending(pending) => {
                    let callbacks = std::mem::take(pending);
                    *slot = Slot::Settled(outcome.clone());
                    callbacks
                }
            }
        };
        for callback in callbacks {
            callback(&outcome);
        }
        true
    }

    /// Abort the request.
    ///
    /// Settles with [`Outcome::Aborted`]; a no-op if already settled.
    pub fn abort(&self) {
        self.settle(Outcome::Aborted);
    }

    /// Run a callback when the request completes successfully.
    pub fn on_done(&self, f: impl FnOnce(&Response) + Send + 'static) {
        self.register(Box::new(move |outcome| {
            if let Outcome::Done(response) = outcome {
                f(response);
            }
        }));
    }

    /// Run a callback when the request fails.
    ///
    /// Aborted requests do not count as failures.
    pub fn on_fail(&self, f: impl FnOnce(&Response) + Send + 'static) {
        self.register(Box::new(move |outcome| {
            if let Outcome::Failed(response) = outcome {
                f(response);
            }
        }));
    }

    /// Run a callback when the request settles, whatever the outcome.
    pub fn always(&self, f: impl FnOnce(&Outcome) + Send + 'static) {
        self.register(Box::new(f));
    }

    fn register(&self, callback: Callback) {
        let settled = {
            let mut slot = self.lock();
            match &mut *slot {
                Slot::Pending(pending) => {
                    pending.push(callback);
                    None
                }
                Slot::Settled(outcome) => Some((callback, outcome.clone())),
            }
        };
        if let Some((callback, outcome)) = settled {
            callback(&outcome);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Slot> {
        // A poisoned lock means a callback panicked; the slot itself is
        // still structurally sound.
        self.inner
            .slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandle")
            .field("url", &self.inner.url)
            .field("outcome", &self.outcome())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// The HTTP transport collaborator.
///
/// Implementations issue the request and settle the returned handle when
/// it completes; the navigation layer never blocks on them.
pub trait HttpClient: Send + Sync {
    /// Issue a GET with query parameters.
    fn get(&self, url: &str, params: &NavParams) -> RequestHandle;
    /// Issue a POST with a body.
    fn post(&self, url: &str, body: &NavParams) -> RequestHandle;
    /// Issue a PUT with a body.
    fn put(&self, url: &str, body: &NavParams) -> RequestHandle;
    /// Issue a DELETE.
    fn delete(&self, url: &str) -> RequestHandle;
}

/// User-visible notification collaborator.
///
/// Receives the generic failure messages the navigation layer raises
/// when a tracked request fails.
pub trait Notifier: Send + Sync {
    /// Surface a message to the user.
    fn notify(&self, message: &str);
}

/// [`Notifier`] that only records the message in the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        tracing::warn!(notice = message, "user notification");
    }
}

// ---------------------------------------------------------------------------
// Per-page tracking
// ---------------------------------------------------------------------------

/// Tracks a page's in-flight requests so they can be aborted together.
///
/// A tracked handle is present in the list exactly between issue and
/// settlement: tracking registers an `always` callback that removes the
/// handle once, whatever the outcome. The list is held behind its own
/// `Arc` so that removal callbacks keep only a weak reference and never
/// keep a dead page's tracker alive.
#[derive(Default)]
pub struct RequestTracker {
    in_flight: Arc<Mutex<Vec<RequestHandle>>>,
}

impl RequestTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a handle.
    pub fn track(&self, handle: &RequestHandle) {
        self.lock().push(handle.clone());
        let list = Arc::downgrade(&self.in_flight);
        let target = handle.downgrade();
        handle.always(move |_| {
            if let (Some(list), Some(target)) = (list.upgrade(), target.upgrade()) {
                list.lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .retain(|h| !h.same(&target));
            }
        });
    }

    /// Abort every tracked request.
    ///
    /// The list is drained before aborting so the per-handle removal
    /// callbacks find nothing left to remove.
    pub fn abort_all(&self) {
        let drained = std::mem::take(&mut *self.lock());
        if !drained.is_empty() {
            tracing::debug!(count = drained.len(), "aborting in-flight requests");
        }
        for handle in drained {
            handle.abort();
        }
    }

    /// Number of in-flight requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no requests are in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether a specific handle is currently tracked.
    #[must_use]
    pub fn contains(&self, handle: &RequestHandle) -> bool {
        self.lock().iter().any(|h| h.same(handle))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RequestHandle>> {
        self.in_flight
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl fmt::Debug for RequestTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestTracker")
            .field("in_flight", &self.len())
            .finish()
    }
}

/// Track a handle and attach the standard failure behavior: one generic
/// user notification plus a logged response body.
///
/// Returns the same handle so callers can attach further completion
/// callbacks.
pub fn track_with_notice(
    tracker: &RequestTracker,
    notifier: &Arc<dyn Notifier>,
    notice: &'static str,
    handle: RequestHandle,
) -> RequestHandle {
    let notifier = Arc::clone(notifier);
    let url = handle.url().to_owned();
    handle.on_fail(move |response| {
        tracing::warn!(url = %url, status = response.status, body = %response.body, "request failed");
        notifier.notify(notice);
    });
    tracker.track(&handle);
    handle
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> usize) {
        let count = Arc::new(AtomicUsize::new(0));
        let reader = {
            let count = Arc::clone(&count);
            move || count.load(Ordering::SeqCst)
        };
        (count, reader)
    }

    #[test]
    fn settle_runs_callbacks_once_in_order() {
        let handle = RequestHandle::new("/numbers/");
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let order = Arc::clone(&order);
            handle.always(move |_| order.lock().unwrap().push(tag));
        }
        assert!(handle.settle(Outcome::Done(Response::new(200, "ok"))));
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn second_settle_is_ignored() {
        let handle = RequestHandle::new("/numbers/");
        let (count, reads) = counter();
        handle.always(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        });

        assert!(handle.settle(Outcome::Aborted));
        assert!(!handle.settle(Outcome::Failed(Response::new(500, "late"))));
        assert_eq!(reads(), 1);
        assert_eq!(handle.outcome(), Some(Outcome::Aborted));
    }

    #[test]
    fn callbacks_after_settlement_run_immediately() {
        let handle = RequestHandle::new("/numbers/");
        handle.settle(Outcome::Done(Response::new(200, "ok")));

        let (count, reads) = counter();
        handle.on_done(move |response| {
            assert_eq!(response.status, 200);
            count.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(reads(), 1);
    }

    #[test]
    fn abort_skips_failure_callbacks() {
        let handle = RequestHandle::new("/numbers/");
        let (fails, read_fails) = counter();
        let (settles, read_settles) = counter();
        handle.on_fail(move |_| {
            fails.fetch_add(1, Ordering::SeqCst);
        });
        handle.always(move |_| {
            settles.fetch_add(1, Ordering::SeqCst);
        });

        handle.abort();
        assert_eq!(read_fails(), 0);
        assert_eq!(read_settles(), 1);
        assert!(handle.outcome().unwrap().is_aborted());
    }

    #[test]
    fn tracker_holds_handle_between_issue_and_settlement() {
        let tracker = Arc::new(RequestTracker::new());
        let handle = RequestHandle::new("/numbers/");
        assert!(!tracker.contains(&handle));

        tracker.track(&handle);
        assert!(tracker.contains(&handle));
        assert_eq!(tracker.len(), 1);

        handle.settle(Outcome::Done(Response::new(200, "ok")));
        assert!(!tracker.contains(&handle));
        assert!(tracker.is_empty());
    }

    #[test]
    fn tracker_removes_on_failure_too() {
        let tracker = Arc::new(RequestTracker::new());
        let handle = RequestHandle::new("/numbers/");
        tracker.track(&handle);

        handle.settle(Outcome::Failed(Response::new(500, "boom")));
        assert!(tracker.is_empty());
    }

    #[test]
    fn abort_all_aborts_everything_without_deadlock() {
        let tracker = Arc::new(RequestTracker::new());
        let handles: Vec<RequestHandle> = (0..3)
            .map(|i| {
                let handle = RequestHandle::new(format!("/req/{i}"));
                tracker.track(&handle);
                handle
            })
            .collect();

        tracker.abort_all();
        assert!(tracker.is_empty());
        for handle in &handles {
            assert!(handle.outcome().unwrap().is_aborted());
        }
    }

    #[test]
    fn late_settle_after_abort_does_not_remove_twice() {
        struct CountingNotifier(AtomicUsize);
        impl Notifier for CountingNotifier {
            fn notify(&self, _message: &str) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let tracker = Arc::new(RequestTracker::new());
        let notifier = Arc::new(CountingNotifier(AtomicUsize::new(0)));
        let notifier_dyn: Arc<dyn Notifier> = Arc::clone(&notifier) as Arc<dyn Notifier>;

        let handle = track_with_notice(
            &tracker,
            &notifier_dyn,
            "request failed",
            RequestHandle::new("/numbers/"),
        );

        tracker.abort_all();
        assert!(tracker.is_empty());

        // The transport answers after the page cancelled.
        assert!(!handle.settle(Outcome::Failed(Response::new(500, "late"))));
        assert!(tracker.is_empty());
        assert_eq!(notifier.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn track_with_notice_notifies_once_on_failure() {
        struct CountingNotifier(AtomicUsize);
        impl Notifier for CountingNotifier {
            fn notify(&self, _message: &str) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let tracker = Arc::new(RequestTracker::new());
        let notifier = Arc::new(CountingNotifier(AtomicUsize::new(0)));
        let notifier_dyn: Arc<dyn Notifier> = Arc::clone(&notifier) as Arc<dyn Notifier>;

        let handle = track_with_notice(
            &tracker,
            &notifier_dyn,
            "request failed",
            RequestHandle::new("/numbers/"),
        );
        handle.settle(Outcome::Failed(Response::new(502, "bad gateway")));
        assert_eq!(notifier.0.load(Ordering::SeqCst), 1);
        assert!(tracker.is_empty());
    }

    #[test]
    fn dropping_the_tracker_does_not_break_settlement() {
        let tracker = Arc::new(RequestTracker::new());
        let handle = RequestHandle::new("/numbers/");
        tracker.track(&handle);
        drop(tracker);

        // The weak tracker reference is gone; settling must not panic.
        assert!(handle.settle(Outcome::Done(Response::new(200, "ok"))));
    }
}
