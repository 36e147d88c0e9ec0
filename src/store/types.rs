//! Document store types
//!
//! Paths, field values, documents and snapshots shared by every store backend.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tokio::sync::mpsc;

use super::error::{StoreError, StoreResult};

/// Field name → value map of a document
pub type Fields = BTreeMap<String, FieldValue>;

/// Address of a single document: collection name plus document key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath {
    collection: String,
    key: String,
}

impl DocumentPath {
    /// Build a path, rejecting empty segments and segments containing `/`
    pub fn new(collection: impl Into<String>, key: impl Into<String>) -> StoreResult<Self> {
        let collection = collection.into();
        let key = key.into();

        for (what, segment) in [("collection", &collection), ("key", &key)] {
            if segment.is_empty() {
                return Err(StoreError::InvalidPath(format!("{} cannot be empty", what)));
            }
            if segment.contains('/') {
                return Err(StoreError::InvalidPath(format!(
                    "{} '{}' must not contain '/'",
                    what, segment
                )));
            }
        }

        Ok(Self { collection, key })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.key)
    }
}

/// A single field value
///
/// `ServerTimestamp` is a write-only sentinel: the store replaces it with
/// its own clock at write time, so it never appears in a read.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    Map(Fields),
    Array(Vec<FieldValue>),
    ServerTimestamp,
}

impl Serialize for FieldValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Null => serializer.serialize_none(),
            FieldValue::Boolean(b) => serializer.serialize_bool(*b),
            FieldValue::Integer(i) => serializer.serialize_i64(*i),
            FieldValue::Double(d) => serializer.serialize_f64(*d),
            FieldValue::String(s) => serializer.serialize_str(s),
            FieldValue::Timestamp(ts) => serializer.serialize_str(&ts.to_rfc3339()),
            FieldValue::Map(fields) => fields.serialize(serializer),
            FieldValue::Array(values) => values.serialize(serializer),
            FieldValue::ServerTimestamp => serializer.serialize_str("<server timestamp>"),
        }
    }
}

impl FieldValue {
    /// Numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Double(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(value)
    }
}

/// A stored document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub path: DocumentPath,
    pub fields: Fields,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
}

impl Document {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }
}

/// Point-in-time contents of a document as delivered to a reader
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub path: DocumentPath,
    pub document: Option<Document>,
}

impl Snapshot {
    pub fn missing(path: DocumentPath) -> Self {
        Self {
            path,
            document: None,
        }
    }

    pub fn found(document: Document) -> Self {
        Self {
            path: document.path.clone(),
            document: Some(document),
        }
    }

    pub fn exists(&self) -> bool {
        self.document.is_some()
    }

    /// Field lookup; `None` when the document is missing or lacks the field
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.document.as_ref().and_then(|doc| doc.get(field))
    }

    pub fn update_time(&self) -> Option<DateTime<Utc>> {
        self.document.as_ref().and_then(|doc| doc.update_time)
    }
}

/// Standing subscription to one document
///
/// Deliveries arrive in store order. A transport failure is delivered as an
/// `Err` item. Dropping the subscription (or calling [`Subscription::close`])
/// disposes it; the store stops delivering once it notices.
pub struct Subscription {
    path: DocumentPath,
    receiver: mpsc::UnboundedReceiver<StoreResult<Snapshot>>,
}

impl Subscription {
    pub fn new(
        path: DocumentPath,
        receiver: mpsc::UnboundedReceiver<StoreResult<Snapshot>>,
    ) -> Self {
        Self { path, receiver }
    }

    pub fn path(&self) -> &DocumentPath {
        &self.path
    }

    /// Wait for the next delivery; `None` once the store has ended the stream
    pub async fn next(&mut self) -> Option<StoreResult<Snapshot>> {
        self.receiver.recv().await
    }

    /// Take a delivery that is already queued, without waiting
    pub fn try_next(&mut self) -> Option<StoreResult<Snapshot>> {
        self.receiver.try_recv().ok()
    }

    pub fn close(&mut self) {
        self.receiver.close();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_path_validation() {
        let path = DocumentPath::new("usuarios", "8362361029").unwrap();
        assert_eq!(path.collection(), "usuarios");
        assert_eq!(path.key(), "8362361029");
        assert_eq!(path.to_string(), "usuarios/8362361029");

        assert!(DocumentPath::new("", "abc").is_err());
        assert!(DocumentPath::new("usuarios", "").is_err());
        assert!(matches!(
            DocumentPath::new("usuarios", "a/b"),
            Err(StoreError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_snapshot_field_lookup() {
        let path = DocumentPath::new("usuarios", "1").unwrap();
        let missing = Snapshot::missing(path.clone());
        assert!(!missing.exists());
        assert!(missing.get("fc_balance").is_none());

        let mut fields = Fields::new();
        fields.insert("fc_balance".to_string(), FieldValue::Integer(150));
        let found = Snapshot::found(Document {
            path,
            fields,
            create_time: None,
            update_time: None,
        });
        assert!(found.exists());
        assert_eq!(found.get("fc_balance").and_then(|v| v.as_f64()), Some(150.0));
    }

    #[test]
    fn test_field_value_serialize_untagged() {
        let json = serde_json::to_string(&FieldValue::Integer(5)).unwrap();
        assert_eq!(json, "5");

        let json = serde_json::to_string(&FieldValue::from("Sembrador")).unwrap();
        assert_eq!(json, "\"Sembrador\"");

        let json = serde_json::to_string(&FieldValue::Null).unwrap();
        assert_eq!(json, "null");
    }
}
