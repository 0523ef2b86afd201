use crate::types::{DocumentId, SerializableBsonDocument};
use crate::utils::json::bson_document_to_json;
use bson::{Bson, Document as BsonDocument};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const NATIVE_ID_FIELD: &str = "_id";
pub const CREATED_AT_FIELD: &str = "created_at";
pub const UPDATED_AT_FIELD: &str = "updated_at";

/// A stored record. `data` always carries `_id` mirroring `id`, first in field order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub data: SerializableBsonDocument,
}

impl Document {
    /// Creates a document with a fresh native identifier and insert timestamps.
    #[must_use]
    pub fn new(data: BsonDocument) -> Self {
        Self::with_id(DocumentId::new(), data)
    }

    #[must_use]
    pub fn with_id(id: DocumentId, data: BsonDocument) -> Self {
        let mut out = BsonDocument::new();
        out.insert(NATIVE_ID_FIELD, Bson::String(id.to_string()));
        for (k, v) in data {
            if k != NATIVE_ID_FIELD {
                out.insert(k, v);
            }
        }
        let now = now_timestamp();
        if !out.contains_key(CREATED_AT_FIELD) {
            out.insert(CREATED_AT_FIELD, Bson::String(now.clone()));
        }
        if !out.contains_key(UPDATED_AT_FIELD) {
            out.insert(UPDATED_AT_FIELD, Bson::String(now));
        }
        Self { id, data: SerializableBsonDocument(out) }
    }

    #[must_use]
    pub const fn record(&self) -> &BsonDocument {
        &self.data.0
    }

    /// Refreshes `updated_at`.
    pub fn touch(&mut self) {
        self.data.0.insert(UPDATED_AT_FIELD, Bson::String(now_timestamp()));
    }

    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        bson_document_to_json(&self.data.0)
    }
}

/// RFC 3339 UTC with fixed millisecond precision so timestamps sort as strings.
#[must_use]
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
