//! Dual identity: a record can be addressed by its application `id` field or by the
//! store-native `_id`. Lookups try both so clients never need to know which one they hold.

use bson::Bson;

use crate::document::NATIVE_ID_FIELD;
use crate::query::Filter;
use crate::types::DocumentId;

/// Application-level identifier field.
pub const ID_FIELD: &str = "id";

#[derive(Debug, Clone, PartialEq)]
pub enum Identity {
    /// Any value that is not a native identifier; only the `id` field can hold it.
    External(Bson),
    /// A string that parses as a native identifier. `raw` is kept as given for the `id` arm.
    Native { raw: String, id: DocumentId },
}

impl Identity {
    #[must_use]
    pub fn classify(value: &Bson) -> Self {
        match value {
            Bson::String(s) => DocumentId::parse(s)
                .map_or_else(|| Self::External(value.clone()), |id| Self::Native { raw: s.clone(), id }),
            other => Self::External(other.clone()),
        }
    }

    /// Identity taken from a URL path segment.
    #[must_use]
    pub fn from_path(segment: &str) -> Self {
        Self::classify(&Bson::String(segment.to_string()))
    }

    #[must_use]
    pub fn filter(&self) -> Filter {
        match self {
            Self::External(v) => Filter::eq(ID_FIELD, v.clone()),
            Self::Native { raw, id } => Filter::Or(vec![
                Filter::eq(ID_FIELD, raw.clone()),
                Filter::eq(NATIVE_ID_FIELD, id.to_string()),
            ]),
        }
    }
}

/// `id == value`, or additionally `_id == value` when `value` is a valid native identifier.
#[must_use]
pub fn identity_filter(value: &Bson) -> Filter {
    Identity::classify(value).filter()
}

#[must_use]
pub fn is_identity_key(key: &str) -> bool {
    key == ID_FIELD || key == NATIVE_ID_FIELD
}
