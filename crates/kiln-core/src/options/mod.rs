//! Compiler options.
//!
//! This module provides:
//! - [`ConfigValue`], the nested option value handed to the compiler
//! - Key-wise merging of option maps
//! - The textual encoding the compiler process reads (see [`encode`])

mod encode;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use encode::{encode, encode_shell_arg, shell_quote};

/// A compiler option value.
///
/// Strings follow the notation's conventions when encoded: a leading `:`
/// marks a keyword and a leading `'` marks raw notation. Maps are ordered by
/// key so that an encoded value is stable across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Str(String),
    /// Raw notation, emitted without quoting or escaping.
    Literal(String),
    Vector(Vec<ConfigValue>),
    Map(BTreeMap<String, ConfigValue>),
}

impl ConfigValue {
    /// An empty map.
    pub fn empty_map() -> Self {
        Self::Map(BTreeMap::new())
    }

    /// Build a map from key/value pairs.
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<ConfigValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build a vector from values.
    pub fn vector<V, I>(values: I) -> Self
    where
        V: Into<ConfigValue>,
        I: IntoIterator<Item = V>,
    {
        Self::Vector(values.into_iter().map(Into::into).collect())
    }

    /// Look up a key if this value is a map.
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        match self {
            Self::Map(entries) => entries.get(key),
            _ => None,
        }
    }

    /// Insert a key, turning a non-map value into a map first.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        if !matches!(self, Self::Map(_)) {
            *self = Self::empty_map();
        }
        if let Self::Map(entries) = self {
            entries.insert(key.into(), value.into());
        }
    }

    /// Merge `overrides` on top of `self`.
    ///
    /// When both sides are maps the merge recurses key by key; in every
    /// other case the override replaces the base value outright.
    pub fn merged_with(&self, overrides: &ConfigValue) -> ConfigValue {
        match (self, overrides) {
            (Self::Map(base), Self::Map(over)) => {
                let mut merged = base.clone();
                for (key, value) in over {
                    let next = match merged.get(key) {
                        Some(existing) => existing.merged_with(value),
                        None => value.clone(),
                    };
                    merged.insert(key.clone(), next);
                }
                Self::Map(merged)
            }
            (_, over) => over.clone(),
        }
    }
}

impl Default for ConfigValue {
    fn default() -> Self {
        Self::empty_map()
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Vec<ConfigValue>> for ConfigValue {
    fn from(values: Vec<ConfigValue>) -> Self {
        Self::Vector(values)
    }
}
