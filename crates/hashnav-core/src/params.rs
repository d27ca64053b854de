#![forbid(unsafe_code)]

//! Navigation parameter maps.
//!
//! A [`NavParams`] is the bag of key/value pairs carried by a navigation:
//! the parsed contents of a URL fragment on the way in, or the parameters
//! handed to `navigate_to` on the way out. Values are JSON values so that
//! a params snapshot can be persisted alongside page state and restored
//! with full fidelity.
//!
//! Two keys are reserved for the navigator itself and are injected into
//! every pushed fragment:
//!
//! - [`PARAM_HISTORY_ID`] - correlates a history entry with a persisted
//!   page-state snapshot
//! - [`PARAM_PAGE`] - names the target page

use std::collections::BTreeMap;
use std::collections::btree_map;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved fragment key carrying the history identifier.
pub const PARAM_HISTORY_ID: &str = "u";

/// Reserved fragment key carrying the target page name.
pub const PARAM_PAGE: &str = "l";

/// Ordered map of navigation parameters.
///
/// Keys are strings; values are JSON values. Iteration and encoding order
/// is the sorted key order, which keeps encoded fragments deterministic.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NavParams {
    entries: BTreeMap<String, Value>,
}

impl NavParams {
    /// Create an empty parameter map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a parameter, replacing any previous value under the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    /// Look up a parameter value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Look up a parameter as a string slice.
    ///
    /// Returns `None` for absent keys and for non-string values.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(Value::as_str)
    }

    /// Remove a parameter, returning its previous value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    /// Whether a key is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over parameters in sorted key order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.entries.iter()
    }

    /// The history identifier, if one is carried.
    #[must_use]
    pub fn history_id(&self) -> Option<&str> {
        self.get_str(PARAM_HISTORY_ID)
    }

    /// Set the history identifier.
    pub fn set_history_id(&mut self, id: impl Into<String>) {
        self.insert(PARAM_HISTORY_ID, Value::String(id.into()));
    }

    /// The target page name, if one is carried.
    #[must_use]
    pub fn page_name(&self) -> Option<&str> {
        self.get_str(PARAM_PAGE)
    }

    /// Set the target page name.
    pub fn set_page_name(&mut self, name: impl Into<String>) {
        self.insert(PARAM_PAGE, Value::String(name.into()));
    }
}

impl FromIterator<(String, Value)> for NavParams {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a NavParams {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl IntoIterator for NavParams {
    type Item = (String, Value);
    type IntoIter = btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insert_and_lookup() {
        let mut params = NavParams::new();
        assert!(params.is_empty());

        params.insert("x", json!(1));
        params.insert("name", "alice");
        assert_eq!(params.len(), 2);
        assert_eq!(params.get("x"), Some(&json!(1)));
        assert_eq!(params.get_str("name"), Some("alice"));
        assert_eq!(params.get_str("x"), None);
        assert!(params.get("missing").is_none());
    }

    #[test]
    fn reserved_key_accessors() {
        let mut params = NavParams::new();
        assert!(params.history_id().is_none());
        assert!(params.page_name().is_none());

        params.set_history_id("1a2b_0");
        params.set_page_name("dashboard");
        assert_eq!(params.history_id(), Some("1a2b_0"));
        assert_eq!(params.page_name(), Some("dashboard"));
        assert_eq!(params.get_str(PARAM_HISTORY_ID), Some("1a2b_0"));
        assert_eq!(params.get_str(PARAM_PAGE), Some("dashboard"));
    }

    #[test]
    fn iteration_is_key_ordered() {
        let mut params = NavParams::new();
        params.insert("b", "2");
        params.insert("a", "1");
        params.insert("c", "3");

        let keys: Vec<&str> = params.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn json_round_trip() {
        let mut params = NavParams::new();
        params.insert("x", json!(1));
        params.insert("nested", json!({"a": [1, 2, 3]}));

        let text = serde_json::to_string(&params).unwrap();
        let back: NavParams = serde_json::from_str(&text).unwrap();
        assert_eq!(back, params);
    }
}
