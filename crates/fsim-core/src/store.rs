//! Opaque structured key/value persistence.
//!
//! The engine never owns a file format: sequences, tear-stream seeds and
//! stream snapshots are written as named fields into nested groups of a
//! [`StructuredStore`]. [`MemoryStore`] is the in-process tree used by tests
//! and by the project crate's JSON backend.

use std::collections::BTreeMap;

use crate::{CoreError, CoreResult};

/// Writer/reader of named fields arranged in nested groups.
pub trait StructuredStore {
    fn write_attribute(&mut self, key: &str, value: i64);
    fn read_attribute(&self, key: &str) -> Option<i64>;

    fn write_reals(&mut self, key: &str, values: &[f64]);
    fn read_reals(&self, key: &str) -> Option<Vec<f64>>;

    fn write_strings(&mut self, key: &str, values: &[String]);
    fn read_strings(&self, key: &str) -> Option<Vec<String>>;

    /// Get or create a child group.
    fn group_mut(&mut self, name: &str) -> &mut dyn StructuredStore;
    fn group(&self, name: &str) -> Option<&dyn StructuredStore>;

    fn require_attribute(&self, key: &str) -> CoreResult<i64> {
        self.read_attribute(key).ok_or_else(|| CoreError::MissingField {
            key: key.to_string(),
            context: "attribute".to_string(),
        })
    }

    fn require_group(&self, name: &str) -> CoreResult<&dyn StructuredStore> {
        self.group(name).ok_or_else(|| CoreError::MissingField {
            key: name.to_string(),
            context: "group".to_string(),
        })
    }
}

/// Field value held by a [`MemoryStore`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum StoreValue {
    Attribute(i64),
    Reals(Vec<f64>),
    Strings(Vec<String>),
}

/// In-memory tree of groups and fields.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemoryStore {
    #[cfg_attr(feature = "serde", serde(default))]
    pub fields: BTreeMap<String, StoreValue>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub groups: BTreeMap<String, MemoryStore>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.groups.is_empty()
    }
}

impl StructuredStore for MemoryStore {
    fn write_attribute(&mut self, key: &str, value: i64) {
        self.fields
            .insert(key.to_string(), StoreValue::Attribute(value));
    }

    fn read_attribute(&self, key: &str) -> Option<i64> {
        match self.fields.get(key) {
            Some(StoreValue::Attribute(v)) => Some(*v),
            _ => None,
        }
    }

    fn write_reals(&mut self, key: &str, values: &[f64]) {
        self.fields
            .insert(key.to_string(), StoreValue::Reals(values.to_vec()));
    }

    fn read_reals(&self, key: &str) -> Option<Vec<f64>> {
        match self.fields.get(key) {
            Some(StoreValue::Reals(v)) => Some(v.clone()),
            // untagged deserialization cannot tell an empty list apart
            Some(StoreValue::Strings(v)) if v.is_empty() => Some(Vec::new()),
            _ => None,
        }
    }

    fn write_strings(&mut self, key: &str, values: &[String]) {
        self.fields
            .insert(key.to_string(), StoreValue::Strings(values.to_vec()));
    }

    fn read_strings(&self, key: &str) -> Option<Vec<String>> {
        match self.fields.get(key) {
            Some(StoreValue::Strings(v)) => Some(v.clone()),
            Some(StoreValue::Reals(v)) if v.is_empty() => Some(Vec::new()),
            _ => None,
        }
    }

    fn group_mut(&mut self, name: &str) -> &mut dyn StructuredStore {
        self.groups.entry(name.to_string()).or_default()
    }

    fn group(&self, name: &str) -> Option<&dyn StructuredStore> {
        self.groups
            .get(name)
            .map(|g| g as &dyn StructuredStore)
    }
}
