#![forbid(unsafe_code)]

//! Page lifecycle contract.
//!
//! A page is a named, independently lifecycle-managed region of the
//! application. The navigator drives each page through the hooks in
//! [`PageHooks`]; all hooks default to no-ops so simple pages implement
//! only what they need.
//!
//! Hooks receive a [`PageCx`], the capability handle through which pages
//! issue HTTP requests. Requests issued through the context are tracked
//! against the page (so an abandoned page's requests are aborted), are
//! tagged with a cache-breaker token, and surface one generic
//! notification on failure.

use std::fmt;
use std::sync::Arc;

use hashnav_core::fragment::append_query;
use hashnav_core::params::NavParams;
use hashnav_core::token::TokenGenerator;
use serde_json::Value;

use crate::request::{
    HttpClient, Notifier, RequestHandle, RequestTracker, track_with_notice,
};

/// Query parameter carrying the cache-breaker token.
pub const CACHE_BREAKER_PARAM: &str = "cb";

const NOTICE_RETRIEVE: &str =
    "Failed to retrieve some data from the server. Please try again.";
const NOTICE_UPDATE: &str = "Failed to update the server. Please try again.";
const NOTICE_DELETE: &str = "Failed to delete from the server. Please try again.";

// ---------------------------------------------------------------------------
// Regions and definitions
// ---------------------------------------------------------------------------

/// Opaque handle naming a page's region of the host surface.
///
/// The navigator only ever passes this back to the surface collaborator;
/// it never inspects what the handle refers to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(String);

impl RegionId {
    /// Create a region handle.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The handle as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RegionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RegionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identity of a page: its unique name and the region it owns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageDef {
    name: String,
    region: RegionId,
}

impl PageDef {
    /// Define a page.
    #[must_use]
    pub fn new(name: impl Into<String>, region: impl Into<RegionId>) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
        }
    }

    /// The page's unique name, as used in URL fragments.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The region this page owns.
    #[must_use]
    pub fn region(&self) -> &RegionId {
        &self.region
    }
}

// ---------------------------------------------------------------------------
// Lifecycle hooks
// ---------------------------------------------------------------------------

/// Lifecycle hooks the navigator calls on every page.
///
/// All hooks default to no-ops.
pub trait PageHooks: Send {
    /// Populate the page from navigation parameters and optional saved
    /// state.
    ///
    /// Called after the page's region has been reset to its pristine
    /// template and before it fades in. `saved` carries the snapshot a
    /// previous visit returned from [`state`](Self::state), or `None`
    /// for a fresh instance. Requests issued through `cx` are tracked
    /// and aborted if the page is abandoned before it finishes fading
    /// in.
    fn restore_state(&mut self, cx: &PageCx, params: &NavParams, saved: Option<Value>) {
        let _ = (cx, params, saved);
    }

    /// Snapshot whatever this page needs to restore itself later.
    ///
    /// Called when the user navigates away and the page has an assigned
    /// history identifier. Pages needing no persistence return `None`.
    fn state(&self) -> Option<Value> {
        None
    }

    /// Called once the page finishes fading in.
    fn on_shown(&mut self, cx: &PageCx) {
        let _ = cx;
    }
}

/// A page with no behavior beyond being displayed.
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticPage;

impl PageHooks for StaticPage {}

// ---------------------------------------------------------------------------
// Page context
// ---------------------------------------------------------------------------

/// Capability handle passed to page hooks.
///
/// Wraps the HTTP collaborator so that every request a page issues is
/// (a) tagged with a fresh cache-breaker token, (b) tracked in the
/// page's in-flight list until it settles, and (c) reported to the user
/// with a generic notification if it fails.
pub struct PageCx {
    http: Arc<dyn HttpClient>,
    notifier: Arc<dyn Notifier>,
    tracker: Arc<RequestTracker>,
    tokens: Arc<TokenGenerator>,
}

impl PageCx {
    pub(crate) fn new(
        http: Arc<dyn HttpClient>,
        notifier: Arc<dyn Notifier>,
        tracker: Arc<RequestTracker>,
        tokens: Arc<TokenGenerator>,
    ) -> Self {
        Self {
            http,
            notifier,
            tracker,
            tokens,
        }
    }

    /// Issue a tracked GET. The cache-breaker rides in the query
    /// parameters.
    pub fn get(&self, url: &str, params: NavParams) -> RequestHandle {
        let mut params = params;
        params.insert(CACHE_BREAKER_PARAM, self.tokens.next());
        tracing::debug!(url, "GET");
        self.issue(self.http.get(url, &params), NOTICE_RETRIEVE)
    }

    /// Issue a tracked POST. The cache-breaker is appended to the URL.
    pub fn post(&self, url: &str, body: &NavParams) -> RequestHandle {
        let url = append_query(url, CACHE_BREAKER_PARAM, &self.tokens.next());
        tracing::debug!(url = %url, "POST");
        self.issue(self.http.post(&url, body), NOTICE_UPDATE)
    }

    /// Issue a tracked PUT. The cache-breaker is appended to the URL.
    pub fn put(&self, url: &str, body: &NavParams) -> RequestHandle {
        let url = append_query(url, CACHE_BREAKER_PARAM, &self.tokens.next());
        tracing::debug!(url = %url, "PUT");
        self.issue(self.http.put(&url, body), NOTICE_UPDATE)
    }

    /// Issue a tracked DELETE. The cache-breaker is appended to the URL.
    pub fn delete(&self, url: &str) -> RequestHandle {
        let url = append_query(url, CACHE_BREAKER_PARAM, &self.tokens.next());
        tracing::debug!(url = %url, "DELETE");
        self.issue(self.http.delete(&url), NOTICE_DELETE)
    }

    /// Mint a token from the shared generator, for callers building
    /// URLs by hand.
    #[must_use]
    pub fn token(&self) -> String {
        self.tokens.next()
    }

    /// The page's in-flight tracker.
    #[must_use]
    pub fn tracker(&self) -> &Arc<RequestTracker> {
        &self.tracker
    }

    fn issue(&self, handle: RequestHandle, notice: &'static str) -> RequestHandle {
        track_with_notice(&self.tracker, &self.notifier, notice, handle)
    }
}

impl fmt::Debug for PageCx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageCx")
            .field("in_flight", &self.tracker.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Registered pages (navigator-internal)
// ---------------------------------------------------------------------------

/// Runtime bookkeeping for a registered page.
pub(crate) struct PageSlot {
    pub(crate) region: RegionId,
    /// Pristine region content captured at registration time.
    pub(crate) template: String,
    /// True until the page has been displayed once; the first display
    /// skips the template reset because the region is already pristine.
    pub(crate) first_display: bool,
    pub(crate) tracker: Arc<RequestTracker>,
    pub(crate) hooks: Box<dyn PageHooks>,
}

impl PageSlot {
    pub(crate) fn new(def: PageDef, template: String, hooks: Box<dyn PageHooks>) -> Self {
        Self {
            region: def.region,
            template,
            first_display: true,
            tracker: Arc::new(RequestTracker::new()),
            hooks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{Outcome, Response};
    use std::sync::Mutex;

    struct RecordingClient {
        issued: Mutex<Vec<(String, String)>>,
    }

    impl RecordingClient {
        fn new() -> Self {
            Self {
                issued: Mutex::new(Vec::new()),
            }
        }

        fn record(&self, method: &str, url: &str) -> RequestHandle {
            self.issued
                .lock()
                .unwrap()
                .push((method.to_owned(), url.to_owned()));
            RequestHandle::new(url)
        }
    }

    impl HttpClient for RecordingClient {
        fn get(&self, url: &str, _params: &NavParams) -> RequestHandle {
            self.record("GET", url)
        }
        fn post(&self, url: &str, _body: &NavParams) -> RequestHandle {
            self.record("POST", url)
        }
        fn put(&self, url: &str, _body: &NavParams) -> RequestHandle {
            self.record("PUT", url)
        }
        fn delete(&self, url: &str) -> RequestHandle {
            self.record("DELETE", url)
        }
    }

    fn cx_with_client() -> (PageCx, Arc<RecordingClient>) {
        let client = Arc::new(RecordingClient::new());
        let cx = PageCx::new(
            Arc::clone(&client) as Arc<dyn HttpClient>,
            Arc::new(crate::request::LogNotifier),
            Arc::new(RequestTracker::new()),
            Arc::new(TokenGenerator::new(1_720_000_000_000)),
        );
        (cx, client)
    }

    #[test]
    fn get_carries_cache_breaker_in_params() {
        let (cx, _client) = cx_with_client();
        let handle = cx.get("/numbers/", NavParams::new());

        assert!(cx.tracker().contains(&handle));
        handle.settle(Outcome::Done(Response::new(200, "[]")));
        assert!(cx.tracker().is_empty());
    }

    #[test]
    fn post_appends_cache_breaker_to_url() {
        let (cx, client) = cx_with_client();
        cx.post("/numbers/", &NavParams::new());

        let issued = client.issued.lock().unwrap();
        let (method, url) = &issued[0];
        assert_eq!(method, "POST");
        assert!(url.starts_with("/numbers/?cb="), "unexpected url {url}");
    }

    #[test]
    fn each_request_gets_a_distinct_token() {
        let (cx, client) = cx_with_client();
        cx.put("/numbers/sip%3Aalice/", &NavParams::new());
        cx.delete("/numbers/sip%3Aalice/");

        let issued = client.issued.lock().unwrap();
        assert_ne!(issued[0].1, issued[1].1);
    }

    #[test]
    fn default_hooks_are_no_ops() {
        let mut page = StaticPage;
        let (cx, _client) = cx_with_client();
        page.restore_state(&cx, &NavParams::new(), None);
        page.on_shown(&cx);
        assert!(page.state().is_none());
    }
}
