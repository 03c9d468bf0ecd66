// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Attribute storage.
//!
//! This module provides [`Attributes`], the keyed value mapping held by a
//! [`Model`](crate::Model), together with the value-equality diff used to
//! compare live attributes against a baseline.

use alloc::string::String;

use hashbrown::HashMap;
use serde_json::{Map, Value};

/// A mapping from attribute name to value.
///
/// Values are JSON values, compared by value equality. A key that is absent
/// from the mapping reads as "undefined", which is distinct from
/// [`Value::Null`].
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use understory_model::Attributes;
///
/// let baseline = Attributes::from_json(json!({ "name": "John Cage" }));
/// let live = Attributes::from_json(json!({ "name": "John Cage", "work": "4'33\"" }));
///
/// let diff = live.diff_from(&baseline);
/// assert_eq!(diff.len(), 1);
/// assert_eq!(diff.get("work"), Some(&json!("4'33\"")));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attributes {
    values: HashMap<String, Value>,
}

impl Attributes {
    /// Creates an empty attribute mapping.
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Builds a mapping from a JSON object.
    ///
    /// Anything other than an object yields an empty mapping.
    #[must_use]
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(map) => map.into_iter().collect(),
            _ => Self::new(),
        }
    }

    /// Converts the mapping into a JSON object.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Value::Object(map)
    }

    /// Returns the value stored under `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns `true` if `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Stores `value` under `key`, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(key.into(), value)
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if there are no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over `(name, value)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates over attribute names in unspecified order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Returns the entries of `self` whose value differs from `baseline`.
    ///
    /// A key absent from `baseline` always counts as different. Keys only
    /// present in `baseline` are not reported.
    #[must_use]
    pub fn diff_from(&self, baseline: &Self) -> Self {
        self.values
            .iter()
            .filter(|(k, v)| baseline.values.get(k.as_str()) != Some(*v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Overlays every entry of `other` onto `self`.
    pub fn merge(&mut self, other: &Self) {
        for (k, v) in &other.values {
            self.values.insert(k.clone(), v.clone());
        }
    }
}

impl FromIterator<(String, Value)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl<'a> FromIterator<(&'a str, Value)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (&'a str, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = (&'a String, &'a Value);
    type IntoIter = hashbrown::hash_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

impl From<Value> for Attributes {
    fn from(value: Value) -> Self {
        Self::from_json(value)
    }
}
