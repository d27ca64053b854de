#![forbid(unsafe_code)]

//! hashnav public facade crate.
//!
//! This crate provides the stable, ergonomic surface area for users. It
//! re-exports common types from the internal crates and offers a
//! lightweight prelude for day-to-day usage.
//!
//! ```ignore
//! use hashnav::prelude::*;
//!
//! let mut nav = Navigator::builder(surface, history, http)
//!     .store(HistoryStore::with_file(state_path))
//!     .boot_time_ms(boot_ms)
//!     .build();
//! nav.register_page(PageDef::new("dashboard", "#dashboard"), DashboardPage::default())?;
//! nav.set_default_page("dashboard")?;
//! nav.start()?;
//! ```

// --- Core re-exports -------------------------------------------------------

pub use hashnav_core::fragment::{
    ParsedUrl, append_query, decode_component, encode_component, encode_query, form_action_url,
    parse_query, parse_url,
};
pub use hashnav_core::params::{NavParams, PARAM_HISTORY_ID, PARAM_PAGE};
pub use hashnav_core::subst::substitute;
pub use hashnav_core::token::TokenGenerator;

// --- Runtime re-exports ----------------------------------------------------

pub use hashnav_runtime::history_store::{
    FileStore, HistoryStore, MemoryStore, StoreBackend, StoreError, StoreResult,
};
pub use hashnav_runtime::navigator::{
    HistoryHandle, NavError, Navigator, NavigatorBuilder, Surface, TransitionPhase,
};
pub use hashnav_runtime::page::{
    CACHE_BREAKER_PARAM, PageCx, PageDef, PageHooks, RegionId, StaticPage,
};
pub use hashnav_runtime::request::{
    HttpClient, LogNotifier, Notifier, Outcome, RequestHandle, RequestTracker, Response,
};

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        HistoryHandle, HistoryStore, HttpClient, NavError, NavParams, Navigator, Notifier,
        Outcome, PageCx, PageDef, PageHooks, RegionId, RequestHandle, Response, StaticPage,
        Surface, TransitionPhase, encode_query, parse_query,
    };
}
