#![forbid(unsafe_code)]

//! URL fragment and query-string codec.
//!
//! Navigation state travels in the URL fragment as `&`-separated
//! `key=value` pairs, percent-encoded per component. This module parses
//! and produces that encoding, and provides the small URL-assembly
//! helpers the runtime and host bindings need.
//!
//! # Leniency
//!
//! Fragments are user-editable input (the address bar), so decoding never
//! fails: malformed percent escapes are preserved literally and invalid
//! UTF-8 is replaced. A garbled fragment simply resolves to parameters
//! that match no page, and the navigator's default-page fallback takes
//! over from there.

use serde_json::Value;

use crate::params::NavParams;

// ---------------------------------------------------------------------------
// Percent codec
// ---------------------------------------------------------------------------

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~')
}

/// Percent-encode a single component.
///
/// Unreserved characters (`A-Z a-z 0-9 - _ . ~`) pass through; every
/// other byte of the UTF-8 encoding becomes `%XX`.
#[must_use]
pub fn encode_component(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    for &b in component.as_bytes() {
        if is_unreserved(b) {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(char::from_digit(u32::from(b >> 4), 16).unwrap_or('0').to_ascii_uppercase());
            out.push(char::from_digit(u32::from(b & 0xf), 16).unwrap_or('0').to_ascii_uppercase());
        }
    }
    out
}

/// Decode a percent-encoded component.
///
/// Malformed escapes (`%` not followed by two hex digits) are kept
/// literally; invalid UTF-8 in the decoded bytes is replaced rather than
/// rejected.
#[must_use]
pub fn decode_component(component: &str) -> String {
    let bytes = component.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && let Some(hex) = bytes.get(i + 1..i + 3)
            && let Ok(text) = std::str::from_utf8(hex)
            && let Ok(byte) = u8::from_str_radix(text, 16)
        {
            out.push(byte);
            i += 3;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

// ---------------------------------------------------------------------------
// Query strings
// ---------------------------------------------------------------------------

/// Parse a `&`-separated query/fragment string into parameters.
///
/// A pair with no `=` maps the bare key to boolean `true`. Empty
/// segments are skipped.
#[must_use]
pub fn parse_query(query: &str) -> NavParams {
    let mut params = NavParams::new();
    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        match pair.split_once('=') {
            Some((key, value)) => {
                params.insert(
                    decode_component(key),
                    Value::String(decode_component(value)),
                );
            }
            None => {
                params.insert(decode_component(pair), Value::Bool(true));
            }
        }
    }
    params
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Encode parameters as a `&`-separated query/fragment string.
///
/// Keys appear in sorted order, so the encoding is deterministic. String
/// values are encoded as-is; other JSON values use their compact JSON
/// text.
#[must_use]
pub fn encode_query(params: &NavParams) -> String {
    let mut out = String::new();
    for (key, value) in params {
        if !out.is_empty() {
            out.push('&');
        }
        out.push_str(&encode_component(key));
        out.push('=');
        out.push_str(&encode_component(&value_text(value)));
    }
    out
}

// ---------------------------------------------------------------------------
// Full URLs
// ---------------------------------------------------------------------------

/// A URL split into base, query, and fragment.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParsedUrl {
    /// Everything before the query string and fragment.
    pub base: String,
    /// The raw query string, without the leading `?`.
    pub query: String,
    /// The parsed query parameters.
    pub params: NavParams,
    /// The fragment, without the leading `#`, if present.
    pub fragment: Option<String>,
}

/// Split a URL into base, query parameters, and fragment.
///
/// The fragment is separated first (it follows the query string), then
/// the query.
#[must_use]
pub fn parse_url(url: &str) -> ParsedUrl {
    let (rest, fragment) = match url.split_once('#') {
        Some((rest, frag)) => (rest, Some(frag.to_owned())),
        None => (url, None),
    };
    let (base, query) = match rest.split_once('?') {
        Some((base, query)) => (base.to_owned(), query.to_owned()),
        None => (rest.to_owned(), String::new()),
    };
    let params = parse_query(&query);
    ParsedUrl {
        base,
        query,
        params,
        fragment,
    }
}

/// Append a query parameter to a URL, preserving any fragment suffix.
///
/// Chooses `?` or `&` based on whether the URL already carries a query
/// string; a URL already ending in a separator gets none added.
#[must_use]
pub fn append_query(url: &str, key: &str, value: &str) -> String {
    let (mut url, fragment) = match url.split_once('#') {
        Some((rest, frag)) => (rest.to_owned(), Some(frag)),
        None => (url.to_owned(), None),
    };
    if !url.ends_with(['?', '&']) {
        url.push(if url.contains('?') { '&' } else { '?' });
    }
    url.push_str(&encode_component(key));
    url.push('=');
    url.push_str(&encode_component(value));
    if let Some(frag) = fragment {
        url.push('#');
        url.push_str(frag);
    }
    url
}

/// Build a form action URL carrying `onsuccess`/`onfailure` redirect
/// targets.
#[must_use]
pub fn form_action_url(action: &str, on_success: &str, on_failure: &str) -> String {
    let url = append_query(action, "onsuccess", on_success);
    append_query(&url, "onfailure", on_failure)
}
