//! Permissive tree over decoded JSON responses.
//!
//! [`Envelope`] lets callers walk deeply nested responses without checking
//! every level. Reading a key that does not exist returns a shared, falsy
//! [`Envelope::Empty`] instead of failing, so chains like
//! `update["message"]["chat"]["id"]` are always safe.
//!
//! Reads never mutate. Writes go through [`Envelope::entry`] and
//! [`Envelope::set`], which create intermediate mappings on demand.
//!
//! # Example
//!
//! ```
//! use botwire::Envelope;
//! use serde_json::json;
//!
//! let mut user = Envelope::from(json!({"name": "lonami", "hobby": "developer"}));
//! assert_eq!(user["name"].as_str(), Some("lonami"));
//! assert!(!user["age"].is_truthy());
//!
//! user.entry("friend").set("name", "kate");
//! assert_eq!(user["friend"]["name"].as_str(), Some("kate"));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;

use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::Result;

static EMPTY: Envelope = Envelope::Empty;

/// Decoded response tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Envelope {
    /// JSON object.
    Mapping(BTreeMap<String, Envelope>),
    /// JSON array.
    List(Vec<Envelope>),
    /// Any JSON leaf: string, number, bool or null.
    Scalar(Value),
    /// Absent value. Falsy, and converts back to an empty object.
    #[default]
    Empty,
}

impl Envelope {
    /// Look up `key` in a mapping.
    ///
    /// Returns the shared empty sentinel when `self` is not a mapping or the
    /// key is absent.
    pub fn get(&self, key: &str) -> &Envelope {
        match self {
            Envelope::Mapping(map) => map.get(key).unwrap_or(&EMPTY),
            _ => &EMPTY,
        }
    }

    /// Look up position `index` in a list, with the same fallback as [`get`](Self::get).
    pub fn at(&self, index: usize) -> &Envelope {
        match self {
            Envelope::List(items) => items.get(index).unwrap_or(&EMPTY),
            _ => &EMPTY,
        }
    }

    /// Mutable access to `key`, inserting an empty child if it is missing.
    ///
    /// A non-mapping `self` is replaced by a new mapping first.
    pub fn entry(&mut self, key: &str) -> &mut Envelope {
        if !matches!(self, Envelope::Mapping(_)) {
            *self = Envelope::Mapping(BTreeMap::new());
        }
        match self {
            Envelope::Mapping(map) => map.entry(key.to_owned()).or_default(),
            _ => unreachable!("self was converted to a mapping above"),
        }
    }

    /// Assign `value` under `key`. See [`entry`](Self::entry).
    pub fn set(&mut self, key: &str, value: impl Into<Envelope>) {
        *self.entry(key) = value.into();
    }

    /// Remove `key` from a mapping, returning its previous value.
    pub fn remove(&mut self, key: &str) -> Option<Envelope> {
        match self {
            Envelope::Mapping(map) => map.remove(key),
            _ => None,
        }
    }

    /// Whether a mapping holds `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        matches!(self, Envelope::Mapping(map) if map.contains_key(key))
    }

    /// Truthiness in the JSON sense: empty containers, `null`, `false`,
    /// zero and the empty string are falsy, as is [`Envelope::Empty`].
    pub fn is_truthy(&self) -> bool {
        match self {
            Envelope::Mapping(map) => !map.is_empty(),
            Envelope::List(items) => !items.is_empty(),
            Envelope::Scalar(Value::Null) => false,
            Envelope::Scalar(Value::Bool(b)) => *b,
            Envelope::Scalar(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Envelope::Scalar(Value::String(s)) => !s.is_empty(),
            Envelope::Scalar(_) => true,
            Envelope::Empty => false,
        }
    }

    /// Whether this is the absent-value variant.
    #[inline]
    pub fn is_missing(&self) -> bool {
        matches!(self, Envelope::Empty)
    }

    /// String leaf.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Envelope::Scalar(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Integer leaf.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Envelope::Scalar(v) => v.as_i64(),
            _ => None,
        }
    }

    /// Floating point leaf (integers are widened).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Envelope::Scalar(v) => v.as_f64(),
            _ => None,
        }
    }

    /// Boolean leaf.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Envelope::Scalar(v) => v.as_bool(),
            _ => None,
        }
    }

    /// List items; empty for anything that is not a list.
    pub fn as_list(&self) -> &[Envelope] {
        match self {
            Envelope::List(items) => items,
            _ => &[],
        }
    }

    /// Mapping entries, if this is a mapping.
    pub fn as_mapping(&self) -> Option<&BTreeMap<String, Envelope>> {
        match self {
            Envelope::Mapping(map) => Some(map),
            _ => None,
        }
    }

    /// Iterate list items (nothing for non-lists).
    pub fn iter(&self) -> std::slice::Iter<'_, Envelope> {
        self.as_list().iter()
    }

    /// Number of entries in a mapping or items in a list; zero otherwise.
    pub fn len(&self) -> usize {
        match self {
            Envelope::Mapping(map) => map.len(),
            Envelope::List(items) => items.len(),
            _ => 0,
        }
    }

    /// Whether [`len`](Self::len) is zero.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert back to a plain JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            Envelope::Mapping(map) => {
                Value::Object(map.iter().map(|(k, v)| (k.clone(), v.to_value())).collect())
            }
            Envelope::List(items) => Value::Array(items.iter().map(Envelope::to_value).collect()),
            Envelope::Scalar(v) => v.clone(),
            Envelope::Empty => Value::Object(serde_json::Map::new()),
        }
    }

    /// Consuming variant of [`to_value`](Self::to_value).
    pub fn into_value(self) -> Value {
        match self {
            Envelope::Mapping(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, v.into_value())).collect())
            }
            Envelope::List(items) => {
                Value::Array(items.into_iter().map(Envelope::into_value).collect())
            }
            Envelope::Scalar(v) => v,
            Envelope::Empty => Value::Object(serde_json::Map::new()),
        }
    }

    /// Deserialize this subtree into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.to_value())?)
    }
}

impl Index<&str> for Envelope {
    type Output = Envelope;

    fn index(&self, key: &str) -> &Envelope {
        self.get(key)
    }
}

impl Index<usize> for Envelope {
    type Output = Envelope;

    fn index(&self, index: usize) -> &Envelope {
        self.at(index)
    }
}

impl<'a> IntoIterator for &'a Envelope {
    type Item = &'a Envelope;
    type IntoIter = std::slice::Iter<'a, Envelope>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl From<Value> for Envelope {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => {
                Envelope::Mapping(map.into_iter().map(|(k, v)| (k, Envelope::from(v))).collect())
            }
            Value::Array(items) => Envelope::List(items.into_iter().map(Envelope::from).collect()),
            leaf => Envelope::Scalar(leaf),
        }
    }
}

impl From<&str> for Envelope {
    fn from(value: &str) -> Self {
        Envelope::Scalar(Value::from(value))
    }
}

impl From<String> for Envelope {
    fn from(value: String) -> Self {
        Envelope::Scalar(Value::from(value))
    }
}

impl From<bool> for Envelope {
    fn from(value: bool) -> Self {
        Envelope::Scalar(Value::from(value))
    }
}

impl From<i64> for Envelope {
    fn from(value: i64) -> Self {
        Envelope::Scalar(Value::from(value))
    }
}

impl From<i32> for Envelope {
    fn from(value: i32) -> Self {
        Envelope::Scalar(Value::from(value))
    }
}

impl From<f64> for Envelope {
    fn from(value: f64) -> Self {
        Envelope::Scalar(Value::from(value))
    }
}

impl From<Vec<Envelope>> for Envelope {
    fn from(items: Vec<Envelope>) -> Self {
        Envelope::List(items)
    }
}

impl Serialize for Envelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Envelope::Mapping(map) => map.serialize(serializer),
            Envelope::List(items) => items.serialize(serializer),
            Envelope::Scalar(v) => v.serialize(serializer),
            Envelope::Empty => serializer.serialize_map(Some(0))?.end(),
        }
    }
}

impl<'de> Deserialize<'de> for Envelope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Envelope::from)
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}
