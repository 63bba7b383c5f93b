//! # Record Identity
//!
//! Every domain record exposes a stable primary identity field (`id`, or a
//! compound like `exercise_id` + `user_id`). All dedup/replace/remove logic
//! keys on identity, never on structural equality.

use serde_json::Value;

/// Ordered list of fields forming a record's identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityFields(Vec<String>);

impl IdentityFields {
    /// Single-field identity
    pub fn single(field: impl Into<String>) -> Self {
        Self(vec![field.into()])
    }

    /// Compound identity over multiple fields
    pub fn compound(fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(fields.into_iter().map(Into::into).collect())
    }

    /// The field names, in order
    pub fn fields(&self) -> &[String] {
        &self.0
    }
}

impl Default for IdentityFields {
    fn default() -> Self {
        Self::single("id")
    }
}

impl From<&str> for IdentityFields {
    fn from(field: &str) -> Self {
        Self::single(field)
    }
}

/// A record's extracted identity, canonicalized for comparison
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    /// Canonical string form, usable as a key segment
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical rendering of one identity field value.
///
/// Strings render without quotes so `"f1"` and a key part `"f1"` compare
/// equal; everything else uses its JSON form.
fn canonical(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Extract the identity of a row.
///
/// Returns None when any identity field is absent or null; such a row can
/// never be matched and callers treat the event as a no-op.
pub fn identity_of(row: &Value, fields: &IdentityFields) -> Option<Identity> {
    let mut parts = Vec::with_capacity(fields.fields().len());
    for field in fields.fields() {
        let value = row.get(field)?;
        if value.is_null() {
            return None;
        }
        parts.push(canonical(value));
    }
    // Unit separator keeps compound identities unambiguous
    Some(Identity(parts.join("\u{1f}")))
}

/// Position of the item with the given identity inside a list of records
pub fn item_position(items: &[Value], id: &Identity, fields: &IdentityFields) -> Option<usize> {
    items
        .iter()
        .position(|item| identity_of(item, fields).as_ref() == Some(id))
}
