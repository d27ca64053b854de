#![forbid(unsafe_code)]

//! The navigator: fragment routing and the page-transition state
//! machine.
//!
//! The navigator owns the page registry, the current page, and the
//! transition state. The host environment delivers three kinds of
//! events — fragment changes, fade-out completions, fade-in
//! completions — and the navigator responds by driving its collaborators:
//! the [`Surface`] (region content and fades), the [`HistoryHandle`]
//! (fragment read/push), the HTTP client, and the history store.
//!
//! # Transition state machine
//!
//! ```text
//!              navigate            fade-out done          fade-in done
//!   Idle ──────────────▶ FadingOut ─────────────▶ FadingIn ───────────▶ Idle
//!                          │    ▲                    │
//!          navigate again  │    │  navigate again    │
//!          (replace queued)└────┴────────────────────┘
//!                               (demote: abort requests, fade back out)
//! ```
//!
//! Transitions are strictly serialized: a new request never begins
//! rendering while another is mid-flight. A request arriving while a
//! page is still fading out simply replaces the queued incoming page
//! (which never ran `restore_state`, so there is nothing to cancel). A
//! request arriving while a page is fading in demotes that page: its
//! tracked requests are aborted, its animation halted, and it fades back
//! out before the new target fades in.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use hashnav_core::fragment::{encode_query, parse_query};
use hashnav_core::params::NavParams;
use hashnav_core::token::TokenGenerator;
use serde_json::Value;

use crate::history_store::HistoryStore;
use crate::page::{PageCx, PageDef, PageHooks, PageSlot, RegionId};
use crate::request::{HttpClient, LogNotifier, Notifier};

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// The host surface holding page regions.
///
/// The navigator treats regions as opaque: it only gets/sets their
/// content and starts fades on them. Fade completions are delivered back
/// through [`Navigator::on_fade_out_complete`] and
/// [`Navigator::on_fade_in_complete`].
pub trait Surface: Send {
    /// Read a region's current content.
    fn content(&self, region: &RegionId) -> String;
    /// Replace a region's content.
    fn set_content(&mut self, region: &RegionId, content: &str);
    /// Start fading a region out.
    fn begin_fade_out(&mut self, region: &RegionId);
    /// Start fading a region in.
    fn begin_fade_in(&mut self, region: &RegionId);
    /// Halt any animation running on a region, leaving it as-is.
    fn halt(&mut self, region: &RegionId);
}

/// The host's addressable-URL-state collaborator.
///
/// Pushing a fragment is expected to (asynchronously) come back as a
/// fragment-change event, exactly as a browser hash change would; the
/// navigator never assumes the push takes effect synchronously.
pub trait HistoryHandle: Send {
    /// The current fragment, without the leading `#`.
    fn fragment(&self) -> String;
    /// Push a new fragment as the addressable state.
    fn push_fragment(&mut self, fragment: &str);
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Navigation-configuration errors.
///
/// These are setup mistakes; they abort application bootstrap rather
/// than being recovered at runtime.
#[derive(Debug)]
pub enum NavError {
    /// A page with this name is already registered.
    DuplicatePage(String),
    /// No page with this name is registered.
    UnknownPage(String),
    /// `start` was called with no default page designated.
    MissingDefaultPage,
}

impl fmt::Display for NavError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavError::DuplicatePage(name) => write!(f, "page {name:?} is already registered"),
            NavError::UnknownPage(name) => write!(f, "page {name:?} is not registered"),
            NavError::MissingDefaultPage => write!(f, "no default page registered"),
        }
    }
}

impl std::error::Error for NavError {}

// ---------------------------------------------------------------------------
// Transition state
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct PendingNav {
    page: String,
    params: NavParams,
}

enum Transition {
    Idle,
    FadingOut {
        outgoing: Option<String>,
        incoming: PendingNav,
    },
    FadingIn {
        incoming: PendingNav,
    },
}

/// Observable phase of the transition state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionPhase {
    /// No transition in flight.
    Idle,
    /// A page is fading out; another is queued to fade in.
    FadingOut,
    /// A page is fading in.
    FadingIn,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Assembles a [`Navigator`] from its collaborators.
pub struct NavigatorBuilder {
    surface: Box<dyn Surface>,
    history: Box<dyn HistoryHandle>,
    http: Arc<dyn HttpClient>,
    notifier: Arc<dyn Notifier>,
    store: HistoryStore,
    boot_ms: u64,
}

impl NavigatorBuilder {
    /// Replace the default log-only notifier.
    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Replace the default in-memory history store.
    #[must_use]
    pub fn store(mut self, store: HistoryStore) -> Self {
        self.store = store;
        self
    }

    /// Seed the token generator with the boot time in milliseconds.
    #[must_use]
    pub fn boot_time_ms(mut self, boot_ms: u64) -> Self {
        self.boot_ms = boot_ms;
        self
    }

    /// Build the navigator.
    #[must_use]
    pub fn build(self) -> Navigator {
        Navigator {
            surface: self.surface,
            history: self.history,
            http: self.http,
            notifier: self.notifier,
            store: self.store,
            tokens: Arc::new(TokenGenerator::new(self.boot_ms)),
            pages: HashMap::new(),
            default_page: None,
            current: None,
            current_history_key: None,
            transition: Transition::Idle,
        }
    }
}

// ---------------------------------------------------------------------------
// Navigator
// ---------------------------------------------------------------------------

/// Maps fragment state to pages and drives fade transitions between
/// them.
pub struct Navigator {
    surface: Box<dyn Surface>,
    history: Box<dyn HistoryHandle>,
    http: Arc<dyn HttpClient>,
    notifier: Arc<dyn Notifier>,
    store: HistoryStore,
    tokens: Arc<TokenGenerator>,
    pages: HashMap<String, PageSlot>,
    default_page: Option<String>,
    current: Option<String>,
    current_history_key: Option<String>,
    transition: Transition,
}

impl Navigator {
    /// Start assembling a navigator.
    #[must_use]
    pub fn builder(
        surface: impl Surface + 'static,
        history: impl HistoryHandle + 'static,
        http: Arc<dyn HttpClient>,
    ) -> NavigatorBuilder {
        NavigatorBuilder {
            surface: Box::new(surface),
            history: Box::new(history),
            http,
            notifier: Arc::new(LogNotifier),
            store: HistoryStore::in_memory(),
            boot_ms: 0,
        }
    }

    /// Register a page, capturing its region's pristine template.
    ///
    /// # Errors
    ///
    /// [`NavError::DuplicatePage`] if the name is taken.
    pub fn register_page(
        &mut self,
        def: PageDef,
        hooks: impl PageHooks + 'static,
    ) -> Result<(), NavError> {
        if self.pages.contains_key(def.name()) {
            return Err(NavError::DuplicatePage(def.name().to_owned()));
        }
        let template = self.surface.content(def.region());
        tracing::debug!(page = def.name(), region = %def.region(), "registering page");
        self.pages.insert(
            def.name().to_owned(),
            PageSlot::new(def, template, Box::new(hooks)),
        );
        Ok(())
    }

    /// Designate the page used when the fragment names no registered
    /// page.
    ///
    /// # Errors
    ///
    /// [`NavError::UnknownPage`] if the name is not registered.
    pub fn set_default_page(&mut self, name: &str) -> Result<(), NavError> {
        if !self.pages.contains_key(name) {
            return Err(NavError::UnknownPage(name.to_owned()));
        }
        self.default_page = Some(name.to_owned());
        Ok(())
    }

    /// Mark an already-visible page (e.g. a splash region) as current
    /// without running a transition.
    ///
    /// # Errors
    ///
    /// [`NavError::UnknownPage`] if the name is not registered.
    pub fn set_initial_page(&mut self, name: &str) -> Result<(), NavError> {
        if !self.pages.contains_key(name) {
            return Err(NavError::UnknownPage(name.to_owned()));
        }
        self.current = Some(name.to_owned());
        Ok(())
    }

    /// Validate configuration and process the fragment the application
    /// loaded with.
    ///
    /// # Errors
    ///
    /// [`NavError::MissingDefaultPage`] if no default page was set.
    pub fn start(&mut self) -> Result<(), NavError> {
        if self.default_page.is_none() {
            return Err(NavError::MissingDefaultPage);
        }
        tracing::info!(pages = self.pages.len(), "navigator starting");
        self.on_fragment_change();
        Ok(())
    }

    /// Request a transition to a named page.
    ///
    /// Injects a fresh history identifier and the page name into
    /// `params`, then pushes the encoded fragment; the transition itself
    /// runs when the host delivers the resulting fragment-change event.
    /// Returns `false` without side effects if the page is not
    /// registered, in which case the caller falls back to default
    /// navigation behavior.
    pub fn navigate_to(&mut self, name: &str, params: NavParams) -> bool {
        if !self.pages.contains_key(name) {
            tracing::debug!(page = name, "navigation target not registered");
            return false;
        }
        let mut params = params;
        params.set_history_id(self.tokens.next());
        params.set_page_name(name);
        let fragment = encode_query(&params);
        tracing::debug!(page = name, fragment = %fragment, "pushing fragment");
        self.history.push_fragment(&fragment);
        true
    }

    /// Handle a fragment change reported by the host.
    ///
    /// Resolves the target page from the fragment, falling back to the
    /// default page when the fragment is empty or names no registered
    /// page, then runs the transition algorithm.
    pub fn on_fragment_change(&mut self) {
        let fragment = self.history.fragment();
        tracing::debug!(fragment = %fragment, "fragment changed");

        let params = parse_query(&fragment);
        let name = if fragment.is_empty() {
            String::new()
        } else {
            params.page_name().unwrap_or_default().to_owned()
        };

        let resolved = if self.pages.contains_key(&name) {
            Some(name)
        } else {
            tracing::debug!(page = %name, "page not found, using default");
            self.default_page.clone()
        };

        match resolved {
            Some(page) => self.change_page(page, params),
            None => tracing::warn!("no default page registered; fragment ignored"),
        }
    }

    /// Handle completion of the outgoing page's fade-out.
    pub fn on_fade_out_complete(&mut self) {
        if matches!(&self.transition, Transition::FadingOut { .. }) {
            self.advance_to_fade_in();
        } else {
            tracing::warn!("fade-out completion with no fade-out in flight");
        }
    }

    /// Handle completion of the incoming page's fade-in.
    pub fn on_fade_in_complete(&mut self) {
        match std::mem::replace(&mut self.transition, Transition::Idle) {
            Transition::FadingIn { incoming } => {
                tracing::debug!(page = %incoming.page, "fade-in complete");
                if let Some(slot) = self.pages.get_mut(&incoming.page) {
                    let cx = PageCx::new(
                        Arc::clone(&self.http),
                        Arc::clone(&self.notifier),
                        Arc::clone(&slot.tracker),
                        Arc::clone(&self.tokens),
                    );
                    slot.hooks.on_shown(&cx);
                }
            }
            other => {
                self.transition = other;
                tracing::warn!("fade-in completion with no fade-in in flight");
            }
        }
    }

    /// The currently displayed (or displaying) page, if any.
    #[must_use]
    pub fn current_page(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// The observable transition phase.
    #[must_use]
    pub fn transition_phase(&self) -> TransitionPhase {
        match self.transition {
            Transition::Idle => TransitionPhase::Idle,
            Transition::FadingOut { .. } => TransitionPhase::FadingOut,
            Transition::FadingIn { .. } => TransitionPhase::FadingIn,
        }
    }

    /// The history store, for hosts that also keep well-known keys in
    /// it.
    #[must_use]
    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Transition algorithm
    // -----------------------------------------------------------------------

    fn change_page(&mut self, name: String, params: NavParams) {
        tracing::debug!(
            from = self.current.as_deref().unwrap_or("<none>"),
            to = %name,
            "changing page"
        );

        self.save_outgoing_state();

        let incoming = PendingNav {
            page: name.clone(),
            params: params.clone(),
        };

        match std::mem::replace(&mut self.transition, Transition::Idle) {
            Transition::Idle => {
                let outgoing = self.current.clone();
                self.transition = Transition::FadingOut {
                    outgoing: outgoing.clone(),
                    incoming,
                };
                match outgoing.and_then(|out| self.pages.get(&out)) {
                    Some(slot) => {
                        let region = slot.region.clone();
                        self.surface.begin_fade_out(&region);
                    }
                    // Nothing is displayed yet; skip straight to the
                    // fade-in half.
                    None => self.advance_to_fade_in(),
                }
            }
            Transition::FadingOut { outgoing, incoming: superseded } => {
                // The queued page never started rendering; it is simply
                // replaced.
                tracing::debug!(superseded = %superseded.page, by = %name, "queued fade-in replaced");
                self.transition = Transition::FadingOut { outgoing, incoming };
            }
            Transition::FadingIn { incoming: demoted } => {
                // The fading-in page is abandoned: abort its requests,
                // halt its animation, and fade it back out.
                tracing::debug!(demoted = %demoted.page, by = %name, "fade-in demoted to fade-out");
                if let Some(slot) = self.pages.get(&demoted.page) {
                    slot.tracker.abort_all();
                    let region = slot.region.clone();
                    self.surface.halt(&region);
                    self.surface.begin_fade_out(&region);
                }
                self.transition = Transition::FadingOut {
                    outgoing: Some(demoted.page),
                    incoming,
                };
            }
        }

        self.current = Some(name);
        self.current_history_key = params.history_id().map(str::to_owned);
    }

    /// Persist the current page's state under its history key, if it has
    /// one. Best-effort: failures are logged inside the store.
    fn save_outgoing_state(&mut self) {
        let Some(key) = self.current_history_key.clone() else {
            return;
        };
        let Some(slot) = self.current.as_ref().and_then(|cur| self.pages.get(cur)) else {
            return;
        };
        let state = slot.hooks.state().unwrap_or(Value::Null);
        tracing::debug!(key = %key, "saving page state");
        self.store.persist(&key, state);
    }

    /// The fade-out half is done (or was skipped); reset and restore the
    /// incoming page, then start its fade-in.
    fn advance_to_fade_in(&mut self) {
        let Transition::FadingOut { incoming, .. } =
            std::mem::replace(&mut self.transition, Transition::Idle)
        else {
            return;
        };

        let saved = incoming
            .params
            .history_id()
            .and_then(|key| self.store.get(key))
            .filter(|value| !value.is_null());

        let Some(slot) = self.pages.get_mut(&incoming.page) else {
            tracing::warn!(page = %incoming.page, "incoming page vanished from registry");
            return;
        };

        if slot.first_display {
            // The region still holds the pristine template.
            slot.first_display = false;
        } else {
            self.surface.set_content(&slot.region, &slot.template);
        }

        let cx = PageCx::new(
            Arc::clone(&self.http),
            Arc::clone(&self.notifier),
            Arc::clone(&slot.tracker),
            Arc::clone(&self.tokens),
        );
        slot.hooks.restore_state(&cx, &incoming.params, saved);

        let region = slot.region.clone();
        tracing::debug!(page = %incoming.page, "fading in");
        self.surface.begin_fade_in(&region);
        self.transition = Transition::FadingIn { incoming };
    }
}

impl fmt::Debug for Navigator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Navigator")
            .field("pages", &self.pages.len())
            .field("current", &self.current)
            .field("phase", &self.transition_phase())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::StaticPage;
    use crate::request::RequestHandle;
    use std::sync::Mutex;

    struct NullSurface;

    impl Surface for NullSurface {
        fn content(&self, _region: &RegionId) -> String {
            String::new()
        }
        fn set_content(&mut self, _region: &RegionId, _content: &str) {}
        fn begin_fade_out(&mut self, _region: &RegionId) {}
        fn begin_fade_in(&mut self, _region: &RegionId) {}
        fn halt(&mut self, _region: &RegionId) {}
    }

    #[derive(Clone, Default)]
    struct FixedHistory {
        fragment: Arc<Mutex<String>>,
        pushed: Arc<Mutex<Vec<String>>>,
    }

    impl HistoryHandle for FixedHistory {
        fn fragment(&self) -> String {
            self.fragment.lock().unwrap().clone()
        }
        fn push_fragment(&mut self, fragment: &str) {
            self.pushed.lock().unwrap().push(fragment.to_owned());
        }
    }

    struct NullClient;

    impl HttpClient for NullClient {
        fn get(&self, url: &str, _params: &NavParams) -> RequestHandle {
            RequestHandle::new(url)
        }
        fn post(&self, url: &str, _body: &NavParams) -> RequestHandle {
            RequestHandle::new(url)
        }
        fn put(&self, url: &str, _body: &NavParams) -> RequestHandle {
            RequestHandle::new(url)
        }
        fn delete(&self, url: &str) -> RequestHandle {
            RequestHandle::new(url)
        }
    }

    fn navigator() -> Navigator {
        Navigator::builder(NullSurface, FixedHistory::default(), Arc::new(NullClient)).build()
    }

    #[test]
    fn duplicate_page_names_are_rejected() {
        let mut nav = navigator();
        nav.register_page(PageDef::new("dashboard", "#dashboard"), StaticPage)
            .unwrap();
        let err = nav
            .register_page(PageDef::new("dashboard", "#other"), StaticPage)
            .unwrap_err();
        assert!(matches!(err, NavError::DuplicatePage(name) if name == "dashboard"));
    }

    #[test]
    fn default_page_must_be_registered() {
        let mut nav = navigator();
        assert!(matches!(
            nav.set_default_page("dashboard"),
            Err(NavError::UnknownPage(_))
        ));
    }

    #[test]
    fn start_requires_a_default_page() {
        let mut nav = navigator();
        nav.register_page(PageDef::new("dashboard", "#dashboard"), StaticPage)
            .unwrap();
        assert!(matches!(nav.start(), Err(NavError::MissingDefaultPage)));

        nav.set_default_page("dashboard").unwrap();
        nav.start().unwrap();
    }

    #[test]
    fn navigate_to_unknown_page_is_a_no_op() {
        let mut nav = navigator();
        nav.register_page(PageDef::new("dashboard", "#dashboard"), StaticPage)
            .unwrap();
        assert!(!nav.navigate_to("missing", NavParams::new()));
        assert!(nav.current_page().is_none());
        assert_eq!(nav.transition_phase(), TransitionPhase::Idle);
    }

    #[test]
    fn navigate_to_injects_reserved_keys() {
        let history = FixedHistory::default();
        let mut nav =
            Navigator::builder(NullSurface, history.clone(), Arc::new(NullClient)).build();
        nav.register_page(PageDef::new("dashboard", "#dashboard"), StaticPage)
            .unwrap();

        let mut params = NavParams::new();
        params.insert("x", "1");
        assert!(nav.navigate_to("dashboard", params));

        let pushed = history.pushed.lock().unwrap().last().cloned().unwrap();
        let parsed = parse_query(&pushed);
        assert_eq!(parsed.page_name(), Some("dashboard"));
        assert!(parsed.history_id().is_some());
        assert_eq!(parsed.get_str("x"), Some("1"));
    }

    #[test]
    fn successive_navigations_mint_fresh_history_ids() {
        let history = FixedHistory::default();
        let mut nav =
            Navigator::builder(NullSurface, history.clone(), Arc::new(NullClient)).build();
        nav.register_page(PageDef::new("dashboard", "#dashboard"), StaticPage)
            .unwrap();

        nav.navigate_to("dashboard", NavParams::new());
        nav.navigate_to("dashboard", NavParams::new());

        let pushed = history.pushed.lock().unwrap();
        let first = parse_query(&pushed[0]).history_id().unwrap().to_owned();
        let second = parse_query(&pushed[1]).history_id().unwrap().to_owned();
        assert_ne!(first, second);
    }

    #[test]
    fn set_initial_page_requires_registration() {
        let mut nav = navigator();
        assert!(nav.set_initial_page("splash").is_err());

        nav.register_page(PageDef::new("splash", "#please-wait"), StaticPage)
            .unwrap();
        nav.set_initial_page("splash").unwrap();
        assert_eq!(nav.current_page(), Some("splash"));
    }
}
