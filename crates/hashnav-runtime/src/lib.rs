#![forbid(unsafe_code)]

//! hashnav runtime
//!
//! This crate ties the core primitives into a working navigation
//! runtime for single-page applications.
//!
//! # Key Components
//!
//! - [`Navigator`] - fragment routing and the fade-transition state
//!   machine
//! - [`PageHooks`] - the lifecycle contract every page implements
//! - [`PageCx`] - the capability handle pages issue tracked HTTP
//!   requests through
//! - [`RequestHandle`] / [`RequestTracker`] - cancellable requests and
//!   per-page in-flight tracking
//! - [`HistoryStore`] - persistent page-state storage keyed by history
//!   identifiers
//!
//! # How it fits in the system
//!
//! The runtime is the orchestrator: the host delivers fragment-change
//! and fade-completion events, and the navigator responds by driving the
//! injected collaborators ([`Surface`], [`HistoryHandle`],
//! [`HttpClient`], [`Notifier`]) and the pages' lifecycle hooks. Nothing
//! here blocks; every suspension point is a host-delivered completion
//! event.

pub mod history_store;
pub mod navigator;
pub mod page;
pub mod request;

pub use history_store::{
    FileStore, HistoryStore, MemoryStore, StoreBackend, StoreError, StoreResult,
};
pub use navigator::{
    HistoryHandle, NavError, Navigator, NavigatorBuilder, Surface, TransitionPhase,
};
pub use page::{CACHE_BREAKER_PARAM, PageCx, PageDef, PageHooks, RegionId, StaticPage};
pub use request::{
    HttpClient, LogNotifier, Notifier, Outcome, RequestHandle, RequestTracker, Response,
    WeakRequestHandle, track_with_notice,
};
