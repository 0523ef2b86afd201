use crate::document::Document;
use bson::Document as BsonDocument;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

pub type CollectionName = String;

/// Store-native identifier, rendered as the `_id` field of every record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub Uuid);

impl DocumentId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses a native identifier. Returns `None` for anything that is not a UUID.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s.trim()).ok().map(Self)
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// A wrapper for `bson::Document` that serializes as raw BSON bytes inside the log frames.
#[derive(Debug, Clone, PartialEq)]
pub struct SerializableBsonDocument(pub BsonDocument);

impl Serialize for SerializableBsonDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut bytes = Vec::new();
        self.0.to_writer(&mut bytes).map_err(serde::ser::Error::custom)?;
        serializer.serialize_bytes(&bytes)
    }
}

impl<'de> Deserialize<'de> for SerializableBsonDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = serde_bytes::ByteBuf::deserialize(deserializer)?;
        let doc = BsonDocument::from_reader(bytes.as_slice()).map_err(serde::de::Error::custom)?;
        Ok(Self(doc))
    }
}

/// Mutations recorded by the storage engine, replayed in order on open.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum Operation {
    Insert { collection: CollectionName, document: Document },
    Update { collection: CollectionName, document: Document },
    Delete { collection: CollectionName, document_id: DocumentId },
}

impl Operation {
    #[must_use]
    pub fn collection(&self) -> &str {
        match self {
            Self::Insert { collection, .. }
            | Self::Update { collection, .. }
            | Self::Delete { collection, .. } => collection,
        }
    }
}
