//! Credential store document traits

use std::fmt::Debug;

use serde::{de::DeserializeOwned, Serialize};

/// A record persisted in one credential store collection
///
/// Documents are stored as JSON; secondary lookups match top-level string
/// fields of that JSON representation.
pub trait Document: Clone + Debug + Send + Sync + Serialize + DeserializeOwned {
    /// Collection (table) the document lives in
    const COLLECTION: &'static str;

    /// Top-level fields that must be unique across the collection
    const UNIQUE_FIELDS: &'static [&'static str] = &[];

    /// Primary identifier of the document
    fn id(&self) -> &str;
}

/// Reads a top-level string field from a document's JSON form
pub fn field_value<D: Document>(document: &D, field: &str) -> Option<String> {
    let value = serde_json::to_value(document).ok()?;

    match value.get(field)? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}
