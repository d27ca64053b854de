#![forbid(unsafe_code)]

//! Core primitives for the hashnav navigation runtime.
//!
//! This crate holds the pure, I/O-free building blocks shared by the
//! runtime and by host bindings:
//!
//! - [`fragment`] - percent codec and query-string parsing for URL
//!   fragments, plus small URL-assembly helpers
//! - [`params`] - [`NavParams`], the ordered key/value map carried by
//!   every navigation
//! - [`token`] - [`TokenGenerator`], producing cache-breaker and
//!   history-identifier tokens
//! - [`subst`] - `{KEY}` placeholder substitution for content templates
//!
//! # Role in hashnav
//!
//! `hashnav-core` is deliberately host-agnostic: nothing here touches a
//! DOM, a network, or storage. The runtime crate composes these types
//! with injected collaborators to drive actual navigation.

pub mod fragment;
pub mod params;
pub mod subst;
pub mod token;

pub use fragment::{
    ParsedUrl, append_query, decode_component, encode_component, encode_query, form_action_url,
    parse_query, parse_url,
};
pub use params::{NavParams, PARAM_HISTORY_ID, PARAM_PAGE};
pub use subst::substitute;
pub use token::TokenGenerator;
