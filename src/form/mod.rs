//! Form data model: field keys, typed field values and the value bag
//!
//! A form is described by a [`schema::FormSchema`]. The values a user enters
//! are kept in a [`FormValues`] map keyed by [`FieldKey`]; a key that is not
//! present in the map is "undefined", which is distinct from an empty text
//! value.

pub mod builtin;
pub mod loader;
pub mod schema;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Values entered so far, keyed by field
pub type FormValues = BTreeMap<FieldKey, FieldValue>;

/// Stable identifier for one form input across the whole wizard
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldKey(String);

impl FieldKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for FieldKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&FieldKey> for FieldKey {
    fn from(key: &FieldKey) -> Self {
        key.clone()
    }
}

/// Reference to a file the user picked. Upload happens elsewhere; the wizard
/// only keeps enough metadata to validate and persist the choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHandle {
    /// File name as shown to the user
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// MIME type, if the host knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
}

/// A single field value. Serialized untagged so a draft reads like plain JSON
/// (`"Ana"`, `87.5`, `true`, `["math"]`, `{"name": ..}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Multi(Vec<String>),
    File(FileHandle),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn multi<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldValue::Multi(values.into_iter().map(Into::into).collect())
    }

    /// Whether the value counts as "nothing entered" for required checks
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::Multi(items) => items.iter().all(|i| i.trim().is_empty()),
            FieldValue::File(file) => file.name.trim().is_empty(),
            FieldValue::Bool(_) | FieldValue::Number(_) => false,
        }
    }

    /// Whether the value can be written as JSON. `NaN` and infinities cannot.
    pub fn is_finite(&self) -> bool {
        match self {
            FieldValue::Number(n) => n.is_finite(),
            _ => true,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Short human-readable rendering used by hosts and log lines
    pub fn display(&self) -> String {
        match self {
            FieldValue::Bool(b) => if *b { "yes" } else { "no" }.to_string(),
            FieldValue::Number(n) => format_number(*n),
            FieldValue::Text(s) => s.clone(),
            FieldValue::Multi(items) => items.join(", "),
            FieldValue::File(file) => format!("{} ({} bytes)", file.name, file.size),
        }
    }
}

/// Render a number without a trailing `.0` for whole values
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
