//! Attribute extraction and normalization.
//!
//! Every deduplication lookup starts from an [`AttributeSource`]: a bare
//! mapping, a scalar identifier, or a record-like value exposing its own
//! attribute set. Extraction normalizes all three into an ordered
//! [`AttributeMap`] from which the fingerprint is built.

use std::fmt;

use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Attribute name under which a bare scalar identifier is filed.
pub const SCALAR_ATTRIBUTE: &str = "id";

#[derive(Debug, Error)]
pub enum AttributeError {
    #[error("unsupported attribute source: {kind}")]
    UnsupportedInput { kind: &'static str },
}

impl AttributeError {
    fn unsupported(kind: &'static str) -> Self {
        Self::UnsupportedInput { kind }
    }
}

/// Scalar attribute value with a canonical string rendering.
///
/// Renderings are locale-independent: integers and floats in plain decimal,
/// booleans as `true`/`false`, UUIDs hyphenated lowercase.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Uuid(Uuid),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(value) => f.write_str(value),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Uuid(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Uuid> for AttributeValue {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

/// Ordered mapping from attribute name to scalar value.
///
/// Iteration order is insertion order; re-inserting an existing name
/// replaces the value in place without moving it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeMap {
    entries: Vec<(String, AttributeValue)>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>, V: Into<AttributeValue>> FromIterator<(N, V)> for AttributeMap {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}

/// Record-like values expose the attribute set their cache identity is
/// built from.
pub trait CacheIdentity {
    /// Entity-type identifier namespacing this record's fingerprints.
    fn cache_type(&self) -> &'static str;

    /// Attribute names participating in the identity, in fingerprint order.
    fn identity_keys(&self) -> &'static [&'static str];

    /// The record's attribute set (shallow copy).
    fn cache_attributes(&self) -> AttributeMap;
}

/// Input accepted by the deduplication cache.
pub enum AttributeSource<'a> {
    /// A bare attribute mapping, owned by this lookup.
    Mapping(AttributeMap),
    /// A scalar identifier, filed under [`SCALAR_ATTRIBUTE`] in string form.
    Scalar(AttributeValue),
    /// A record-like value exposing its own attribute set.
    Record(&'a dyn CacheIdentity),
}

impl AttributeSource<'_> {
    /// Normalize into an owned attribute mapping.
    pub fn into_attributes(self) -> AttributeMap {
        match self {
            Self::Mapping(map) => map,
            Self::Scalar(value) => {
                let mut map = AttributeMap::new();
                map.insert(SCALAR_ATTRIBUTE, value.to_string());
                map
            }
            Self::Record(record) => record.cache_attributes(),
        }
    }

    /// Build a source from loosely-typed JSON.
    ///
    /// Objects become mappings, strings and numbers become scalar
    /// identifiers. Nulls, booleans, arrays, and nested values are rejected:
    /// they indicate a programming error at the call site.
    pub fn from_json(value: &Value) -> Result<AttributeSource<'static>, AttributeError> {
        match value {
            Value::Object(fields) => {
                let mut map = AttributeMap::new();
                for (name, field) in fields {
                    map.insert(name.clone(), Self::scalar_from_json(field)?);
                }
                Ok(AttributeSource::Mapping(map))
            }
            Value::String(_) | Value::Number(_) => {
                Ok(AttributeSource::Scalar(Self::scalar_from_json(value)?))
            }
            Value::Bool(_) => Err(AttributeError::unsupported("boolean")),
            Value::Null => Err(AttributeError::unsupported("null")),
            Value::Array(_) => Err(AttributeError::unsupported("array")),
        }
    }

    fn scalar_from_json(value: &Value) -> Result<AttributeValue, AttributeError> {
        match value {
            Value::String(text) => Ok(AttributeValue::Str(text.clone())),
            Value::Number(number) => {
                if let Some(int) = number.as_i64() {
                    Ok(AttributeValue::Int(int))
                } else if let Some(float) = number.as_f64() {
                    Ok(AttributeValue::Float(float))
                } else {
                    Err(AttributeError::unsupported("number"))
                }
            }
            Value::Bool(_) => Err(AttributeError::unsupported("boolean")),
            Value::Null => Err(AttributeError::unsupported("null")),
            Value::Array(_) => Err(AttributeError::unsupported("nested array")),
            Value::Object(_) => Err(AttributeError::unsupported("nested object")),
        }
    }
}
