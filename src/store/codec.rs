//! Wire encoding for the hosted document store's REST API
//!
//! Values travel as single-key objects naming their type
//! (`{"integerValue": "150"}`, `{"stringValue": "Ana"}`, ...). Integers are
//! sent as strings. Server timestamps are not values on the wire; they become
//! field transforms on the commit request.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::error::{StoreError, StoreResult};
use super::types::{Document, DocumentPath, FieldValue, Fields};

/// Document resource as returned by a GET
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawDocument {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
    pub create_time: Option<String>,
    pub update_time: Option<String>,
}

/// Error envelope returned with non-2xx responses
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorDetail {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: String,
}

pub(crate) fn encode_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => json!({ "nullValue": null }),
        FieldValue::Boolean(b) => json!({ "booleanValue": b }),
        FieldValue::Integer(i) => json!({ "integerValue": i.to_string() }),
        FieldValue::Double(d) => json!({ "doubleValue": d }),
        FieldValue::String(s) => json!({ "stringValue": s }),
        FieldValue::Timestamp(ts) => json!({ "timestampValue": ts.to_rfc3339() }),
        FieldValue::Map(fields) => json!({ "mapValue": { "fields": encode_fields(fields) } }),
        FieldValue::Array(values) => {
            let values: Vec<Value> = values.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        // Filtered out by `split_transforms`; never reaches the wire as a value.
        FieldValue::ServerTimestamp => json!({ "nullValue": null }),
    }
}

pub(crate) fn encode_fields(fields: &Fields) -> Map<String, Value> {
    fields
        .iter()
        .filter(|(_, v)| !matches!(v, FieldValue::ServerTimestamp))
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect()
}

pub(crate) fn decode_value(raw: &Value) -> StoreResult<FieldValue> {
    let obj = raw
        .as_object()
        .ok_or_else(|| StoreError::Serialization(format!("Expected value object, got {}", raw)))?;
    let (kind, inner) = obj
        .iter()
        .next()
        .ok_or_else(|| StoreError::Serialization("Empty value object".to_string()))?;

    let value = match kind.as_str() {
        "nullValue" => FieldValue::Null,
        "booleanValue" => FieldValue::Boolean(inner.as_bool().unwrap_or(false)),
        "integerValue" => {
            let parsed = match inner {
                Value::String(s) => s.parse::<i64>().ok(),
                other => other.as_i64(),
            };
            FieldValue::Integer(parsed.ok_or_else(|| {
                StoreError::Serialization(format!("Invalid integerValue: {}", inner))
            })?)
        }
        "doubleValue" => FieldValue::Double(inner.as_f64().ok_or_else(|| {
            StoreError::Serialization(format!("Invalid doubleValue: {}", inner))
        })?),
        "stringValue" | "referenceValue" => {
            FieldValue::String(inner.as_str().unwrap_or_default().to_string())
        }
        "timestampValue" => {
            let text = inner.as_str().unwrap_or_default();
            FieldValue::Timestamp(parse_timestamp(text)?)
        }
        "mapValue" => {
            let fields = inner
                .get("fields")
                .and_then(Value::as_object)
                .map(decode_fields)
                .transpose()?
                .unwrap_or_default();
            FieldValue::Map(fields)
        }
        "arrayValue" => {
            let values = inner
                .get("values")
                .and_then(Value::as_array)
                .map(|vals| vals.iter().map(decode_value).collect::<StoreResult<Vec<_>>>())
                .transpose()?
                .unwrap_or_default();
            FieldValue::Array(values)
        }
        other => {
            tracing::debug!(kind = %other, "Unsupported field type decoded as null");
            FieldValue::Null
        }
    };

    Ok(value)
}

pub(crate) fn decode_fields(raw: &Map<String, Value>) -> StoreResult<Fields> {
    raw.iter()
        .map(|(k, v)| decode_value(v).map(|value| (k.clone(), value)))
        .collect()
}

pub(crate) fn decode_document(path: &DocumentPath, raw: RawDocument) -> StoreResult<Document> {
    Ok(Document {
        path: path.clone(),
        fields: decode_fields(&raw.fields)?,
        create_time: raw.create_time.as_deref().map(parse_timestamp).transpose()?,
        update_time: raw.update_time.as_deref().map(parse_timestamp).transpose()?,
    })
}

fn parse_timestamp(text: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Serialization(format!("Invalid timestamp '{}': {}", text, e)))
}

/// Field paths that must be set from the server clock
pub(crate) fn server_timestamp_fields(fields: &Fields) -> Vec<String> {
    fields
        .iter()
        .filter(|(_, v)| matches!(v, FieldValue::ServerTimestamp))
        .map(|(k, _)| k.clone())
        .collect()
}

/// Body of a `documents:commit` request holding a single write
///
/// Without a mask the write replaces the whole document; with `merge` only
/// the given fields change and the document must already exist.
pub(crate) fn commit_body(document_name: &str, fields: &Fields, merge: bool) -> Value {
    let mut write = Map::new();
    write.insert(
        "update".to_string(),
        json!({ "name": document_name, "fields": encode_fields(fields) }),
    );

    if merge {
        let mask: Vec<&String> = fields
            .iter()
            .filter(|(_, v)| !matches!(v, FieldValue::ServerTimestamp))
            .map(|(k, _)| k)
            .collect();
        write.insert("updateMask".to_string(), json!({ "fieldPaths": mask }));
        write.insert("currentDocument".to_string(), json!({ "exists": true }));
    }

    let transforms: Vec<Value> = server_timestamp_fields(fields)
        .into_iter()
        .map(|field| json!({ "fieldPath": field, "setToServerValue": "REQUEST_TIME" }))
        .collect();
    if !transforms.is_empty() {
        write.insert("updateTransforms".to_string(), Value::Array(transforms));
    }

    json!({ "writes": [Value::Object(write)] })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fields() -> Fields {
        let mut fields = Fields::new();
        fields.insert("propietario".to_string(), FieldValue::from("Ana"));
        fields.insert("fc_balance".to_string(), FieldValue::Integer(0));
        fields.insert("fecha_creacion".to_string(), FieldValue::ServerTimestamp);
        fields
    }

    #[test]
    fn test_encode_integer_as_string() {
        let encoded = encode_value(&FieldValue::Integer(150));
        assert_eq!(encoded, json!({ "integerValue": "150" }));
    }

    #[test]
    fn test_decode_document() {
        let raw: RawDocument = serde_json::from_value(json!({
            "name": "projects/p/databases/(default)/documents/usuarios/8362361029",
            "fields": {
                "fc_balance": { "integerValue": "150" },
                "ingresos_mes": { "doubleValue": 320.5 },
                "nivel": { "stringValue": "Sembrador" },
                "fecha_creacion": { "timestampValue": "2024-05-01T10:00:00.123456Z" },
                "extras": { "mapValue": { "fields": { "ok": { "booleanValue": true } } } }
            },
            "createTime": "2024-05-01T10:00:00.123456Z",
            "updateTime": "2024-05-02T08:30:00Z"
        }))
        .unwrap();

        let path = DocumentPath::new("usuarios", "8362361029").unwrap();
        let doc = decode_document(&path, raw).unwrap();

        assert_eq!(doc.get("fc_balance"), Some(&FieldValue::Integer(150)));
        assert_eq!(doc.get("ingresos_mes"), Some(&FieldValue::Double(320.5)));
        assert_eq!(doc.get("nivel"), Some(&FieldValue::from("Sembrador")));
        assert!(doc.get("fecha_creacion").unwrap().as_timestamp().is_some());
        assert!(matches!(doc.get("extras"), Some(FieldValue::Map(_))));
        assert!(doc.update_time.unwrap() > doc.create_time.unwrap());
    }

    #[test]
    fn test_decode_rejects_bad_integer() {
        let result = decode_value(&json!({ "integerValue": "lots" }));
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }

    #[test]
    fn test_commit_body_replace_with_server_timestamp() {
        let body = commit_body("projects/p/documents/usuarios/555111", &sample_fields(), false);
        let write = &body["writes"][0];

        assert!(write.get("updateMask").is_none());
        assert!(write["update"]["fields"].get("fecha_creacion").is_none());
        assert_eq!(write["update"]["fields"]["fc_balance"], json!({ "integerValue": "0" }));
        assert_eq!(write["updateTransforms"][0]["fieldPath"], "fecha_creacion");
        assert_eq!(write["updateTransforms"][0]["setToServerValue"], "REQUEST_TIME");
    }

    #[test]
    fn test_commit_body_merge_sets_mask() {
        let mut fields = Fields::new();
        fields.insert("fc_balance".to_string(), FieldValue::Integer(25));

        let body = commit_body("projects/p/documents/usuarios/555111", &fields, true);
        let write = &body["writes"][0];

        assert_eq!(write["updateMask"]["fieldPaths"], json!(["fc_balance"]));
        assert_eq!(write["currentDocument"]["exists"], true);
        assert!(write.get("updateTransforms").is_none());
    }
}
