//! # Query Keys
//!
//! An ordered, hashable tuple identifying one cache entry, e.g.
//! `["foods", "list", {"q": "apple"}]` or `["workouts", "detail", "w1"]`.
//! Two keys are equal iff their parts are deep-equal; prefix matching backs
//! the `exact: false` mode that updates a whole logical resource family.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One segment of a query key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyPart {
    /// String segment
    Str(String),
    /// Integer segment
    Int(i64),
    /// Boolean segment
    Bool(bool),
    /// Structured segment, held in canonical JSON form so equality and
    /// hashing are deep and order-independent
    Json(String),
}

impl KeyPart {
    /// Structured segment from an arbitrary JSON value
    pub fn json(value: &Value) -> Self {
        KeyPart::Json(canonical_json(value))
    }
}

impl From<&str> for KeyPart {
    fn from(s: &str) -> Self {
        KeyPart::Str(s.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(s: String) -> Self {
        KeyPart::Str(s)
    }
}

impl From<i64> for KeyPart {
    fn from(n: i64) -> Self {
        KeyPart::Int(n)
    }
}

impl From<bool> for KeyPart {
    fn from(b: bool) -> Self {
        KeyPart::Bool(b)
    }
}

impl std::fmt::Display for KeyPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyPart::Str(s) => write!(f, "{}", s),
            KeyPart::Int(n) => write!(f, "{}", n),
            KeyPart::Bool(b) => write!(f, "{}", b),
            KeyPart::Json(j) => write!(f, "{}", j),
        }
    }
}

/// Render a JSON value with object keys sorted recursively, so two
/// structurally equal values always produce the same string.
fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let inner: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{}:{}", Value::String(k.clone()), canonical_json(&map[k])))
                .collect();
            format!("{{{}}}", inner.join(","))
        }
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", inner.join(","))
        }
        other => other.to_string(),
    }
}

/// An ordered, hashable cache-entry identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct QueryKey {
    parts: Vec<KeyPart>,
}

impl QueryKey {
    /// Empty key (matches everything as a prefix)
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a key from parts
    pub fn of(parts: impl IntoIterator<Item = KeyPart>) -> Self {
        Self {
            parts: parts.into_iter().collect(),
        }
    }

    /// Append a part, builder style
    pub fn with(mut self, part: impl Into<KeyPart>) -> Self {
        self.parts.push(part.into());
        self
    }

    /// The parts, in order
    pub fn parts(&self) -> &[KeyPart] {
        &self.parts
    }

    /// Number of parts
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Whether the key has no parts
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Whether this key starts with the given prefix (part-wise deep equality)
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        if prefix.parts.len() > self.parts.len() {
            return false;
        }
        self.parts
            .iter()
            .zip(prefix.parts.iter())
            .all(|(a, b)| a == b)
    }
}

// Slash-separated rendering for log lines.
impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<String> = self.parts.iter().map(|p| p.to_string()).collect();
        write!(f, "{}", rendered.join("/"))
    }
}

impl<P: Into<KeyPart>> FromIterator<P> for QueryKey {
    fn from_iter<T: IntoIterator<Item = P>>(iter: T) -> Self {
        Self {
            parts: iter.into_iter().map(Into::into).collect(),
        }
    }
}
