//! Cache key composition.
//!
//! Parameters arrive as a loose [`KeyPart`] tree and leave as a canonical
//! [`KeyValue`] tree. Two logically equal parameter objects always land on the
//! same [`QueryKey`]:
//!
//! - object members are sorted by name
//! - `Undefined` members are dropped at every depth
//! - ignored flags (default `enabled`) are stripped from top-level segments
//! - array positions are preserved (`Undefined` becomes `Null`)

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::KeyError;

/// A shared, possibly self-referencing container.
pub type SharedPart = Arc<Mutex<KeyPart>>;

/// Raw key material.
#[derive(Clone)]
pub enum KeyPart {
    /// An absent value. Dropped from objects, `null` inside arrays.
    Undefined,
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<KeyPart>),
    /// A plain object. Member order does not matter.
    Object(Vec<(String, KeyPart)>),
    /// A non-plain value, keyed by its identity string and never recursed into.
    Opaque(String),
    /// A container that may be referenced from several places.
    Shared(SharedPart),
}

impl KeyPart {
    /// Build an object part.
    pub fn object<I, K>(members: I) -> Self
    where
        I: IntoIterator<Item = (K, KeyPart)>,
        K: Into<String>,
    {
        KeyPart::Object(members.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build an opaque part.
    pub fn opaque(identity: impl fmt::Display) -> Self {
        KeyPart::Opaque(identity.to_string())
    }

    /// Wrap this part in a shared container.
    pub fn into_shared(self) -> SharedPart {
        Arc::new(Mutex::new(self))
    }

    /// Convert any serializable value.
    ///
    /// `null` object members (a `None` field) are treated as absent.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, KeyError> {
        Ok(KeyPart::from(serde_json::to_value(value)?))
    }

    fn from_json(value: Value, in_object: bool) -> Self {
        match value {
            Value::Null if in_object => KeyPart::Undefined,
            Value::Null => KeyPart::Null,
            Value::Bool(b) => KeyPart::Bool(b),
            Value::Number(n) => KeyPart::Number(n),
            Value::String(s) => KeyPart::String(s),
            Value::Array(items) => KeyPart::Array(
                items
                    .into_iter()
                    .map(|v| KeyPart::from_json(v, false))
                    .collect(),
            ),
            Value::Object(map) => KeyPart::Object(
                map.into_iter()
                    .map(|(k, v)| (k, KeyPart::from_json(v, true)))
                    .collect(),
            ),
        }
    }
}

// Shared containers may be cyclic, so Debug never follows them.
impl fmt::Debug for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Undefined => f.write_str("Undefined"),
            KeyPart::Null => f.write_str("Null"),
            KeyPart::Bool(b) => write!(f, "Bool({b})"),
            KeyPart::Number(n) => write!(f, "Number({n})"),
            KeyPart::String(s) => write!(f, "String({s:?})"),
            KeyPart::Array(items) => f.debug_tuple("Array").field(items).finish(),
            KeyPart::Object(members) => f.debug_tuple("Object").field(members).finish(),
            KeyPart::Opaque(id) => write!(f, "Opaque({id:?})"),
            KeyPart::Shared(shared) => write!(f, "Shared({:p})", Arc::as_ptr(shared)),
        }
    }
}

impl From<Value> for KeyPart {
    fn from(value: Value) -> Self {
        KeyPart::from_json(value, false)
    }
}

impl From<&str> for KeyPart {
    fn from(s: &str) -> Self {
        KeyPart::String(s.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(s: String) -> Self {
        KeyPart::String(s)
    }
}

impl From<bool> for KeyPart {
    fn from(b: bool) -> Self {
        KeyPart::Bool(b)
    }
}

impl From<i64> for KeyPart {
    fn from(n: i64) -> Self {
        KeyPart::Number(n.into())
    }
}

impl From<u64> for KeyPart {
    fn from(n: u64) -> Self {
        KeyPart::Number(n.into())
    }
}

impl From<u32> for KeyPart {
    fn from(n: u32) -> Self {
        KeyPart::Number(n.into())
    }
}

impl From<f64> for KeyPart {
    fn from(n: f64) -> Self {
        Number::from_f64(n).map_or(KeyPart::Null, KeyPart::Number)
    }
}

impl<T: Into<KeyPart>> From<Option<T>> for KeyPart {
    fn from(value: Option<T>) -> Self {
        value.map_or(KeyPart::Undefined, Into::into)
    }
}

impl From<Vec<KeyPart>> for KeyPart {
    fn from(items: Vec<KeyPart>) -> Self {
        KeyPart::Array(items)
    }
}

impl From<SharedPart> for KeyPart {
    fn from(shared: SharedPart) -> Self {
        KeyPart::Shared(shared)
    }
}

/// A canonical key segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyValue {
    Null,
    Bool(bool),
    Number(NumberKey),
    String(String),
    Array(Vec<KeyValue>),
    Object(BTreeMap<String, KeyValue>),
    Opaque(String),
}

/// A JSON number compared by its canonical text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NumberKey(String);

impl From<&Number> for NumberKey {
    fn from(n: &Number) -> Self {
        NumberKey(n.to_string())
    }
}

impl fmt::Display for NumberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl KeyValue {
    /// Get the string payload, if this is a string segment.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            KeyValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for KeyValue {
    fn from(s: &str) -> Self {
        KeyValue::String(s.to_string())
    }
}

impl From<String> for KeyValue {
    fn from(s: String) -> Self {
        KeyValue::String(s)
    }
}

impl From<&String> for KeyValue {
    fn from(s: &String) -> Self {
        KeyValue::String(s.clone())
    }
}

impl<T: Into<KeyValue>> From<Option<T>> for KeyValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(KeyValue::Null, Into::into)
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Null => f.write_str("null"),
            KeyValue::Bool(b) => write!(f, "{b}"),
            KeyValue::Number(n) => write!(f, "{n}"),
            KeyValue::String(s) => write!(f, "{s:?}"),
            KeyValue::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            KeyValue::Object(members) => {
                f.write_str("{")?;
                for (i, (k, v)) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{k:?}:{v}")?;
                }
                f.write_str("}")
            }
            KeyValue::Opaque(id) => write!(f, "<{id}>"),
        }
    }
}

/// Namespace prefix shared by every key of one client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(Vec<String>);

impl Namespace {
    /// Create a namespace from ordered parts.
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// Get the namespace parts.
    pub fn parts(&self) -> &[String] {
        &self.0
    }

    /// The key holding only the namespace.
    pub fn key(&self) -> QueryKey {
        QueryKey(self.0.iter().map(KeyValue::from).collect())
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new(["commerce"])
    }
}

impl From<&str> for Namespace {
    fn from(s: &str) -> Self {
        Self::new([s])
    }
}

impl From<Vec<String>> for Namespace {
    fn from(parts: Vec<String>) -> Self {
        Self(parts)
    }
}

/// A cache key: an ordered list of canonical segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Vec<KeyValue>);

impl QueryKey {
    /// Create a key from canonical segments.
    pub fn from_segments(segments: Vec<KeyValue>) -> Self {
        Self(segments)
    }

    /// Append a segment.
    pub fn with(mut self, segment: impl Into<KeyValue>) -> Self {
        self.0.push(segment.into());
        self
    }

    /// Get the segments.
    pub fn segments(&self) -> &[KeyValue] {
        &self.0
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the key has no segments.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check whether `prefix` matches the leading segments of this key.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", KeyValue::Array(self.0.clone()))
    }
}

/// Turns key material into canonical segments.
#[derive(Debug, Clone)]
pub struct Canonicalizer {
    ignore: BTreeSet<String>,
}

impl Default for Canonicalizer {
    fn default() -> Self {
        Self {
            ignore: BTreeSet::from(["enabled".to_string()]),
        }
    }
}

impl Canonicalizer {
    /// Create a canonicalizer that strips `enabled`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a canonicalizer that strips nothing.
    pub fn strict() -> Self {
        Self {
            ignore: BTreeSet::new(),
        }
    }

    /// Strip another top-level member name.
    pub fn ignore(mut self, name: impl Into<String>) -> Self {
        self.ignore.insert(name.into());
        self
    }

    /// Get the ignored member names.
    pub fn ignored(&self) -> &BTreeSet<String> {
        &self.ignore
    }

    /// Canonicalize one segment. A top-level `Undefined` becomes `Null`.
    pub fn canonicalize(&self, part: &KeyPart) -> Result<KeyValue, KeyError> {
        let mut path = Vec::new();
        Ok(self
            .walk(part, &mut path, true)?
            .unwrap_or(KeyValue::Null))
    }

    /// Build a key from a namespace and raw segments.
    pub fn build(&self, namespace: &Namespace, segments: &[KeyPart]) -> Result<QueryKey, KeyError> {
        let mut key = namespace.key();
        for segment in segments {
            key.0.push(self.canonicalize(segment)?);
        }
        Ok(key)
    }

    /// Canonicalize a serializable value as one segment.
    pub fn canonicalize_serialize<T: Serialize + ?Sized>(
        &self,
        value: &T,
    ) -> Result<KeyValue, KeyError> {
        self.canonicalize(&KeyPart::from_serialize(value)?)
    }

    fn walk(
        &self,
        part: &KeyPart,
        path: &mut Vec<*const Mutex<KeyPart>>,
        top_level: bool,
    ) -> Result<Option<KeyValue>, KeyError> {
        let value = match part {
            KeyPart::Undefined => return Ok(None),
            KeyPart::Null => KeyValue::Null,
            KeyPart::Bool(b) => KeyValue::Bool(*b),
            KeyPart::Number(n) => KeyValue::Number(n.into()),
            KeyPart::String(s) => KeyValue::String(s.clone()),
            KeyPart::Opaque(id) => KeyValue::Opaque(id.clone()),
            KeyPart::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.walk(item, path, false)?.unwrap_or(KeyValue::Null));
                }
                KeyValue::Array(out)
            }
            KeyPart::Object(members) => {
                let mut out = BTreeMap::new();
                for (name, member) in members {
                    if top_level && self.ignore.contains(name) {
                        continue;
                    }
                    if let Some(v) = self.walk(member, path, false)? {
                        out.insert(name.clone(), v);
                    }
                }
                KeyValue::Object(out)
            }
            KeyPart::Shared(shared) => {
                let ptr = Arc::as_ptr(shared);
                if path.contains(&ptr) {
                    return Err(KeyError::CircularReference { depth: path.len() });
                }
                path.push(ptr);
                let inner = shared.lock().unwrap_or_else(PoisonError::into_inner);
                let result = self.walk(&inner, path, top_level);
                drop(inner);
                path.pop();
                return result;
            }
        };
        Ok(Some(value))
    }
}
