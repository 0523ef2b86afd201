//! Update-or-insert of one record or a batch, keyed on a caller-chosen conflict field.
//!
//! A batch runs strictly in array order and is not atomic: the first failing record aborts
//! the rest while earlier records stay committed.

use bson::{Bson, Document as BsonDocument};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::collection::Collection;
use crate::document::{Document, NATIVE_ID_FIELD};
use crate::errors::DbError;
use crate::identity::{self, ID_FIELD};
use crate::query::{Filter, insert_one, upsert_one};
use crate::types::DocumentId;
use crate::utils::json::json_value_to_record;

/// A single value or an array of them; responses mirror whichever shape came in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    /// Applies `f` in order, stopping at the first error.
    ///
    /// # Errors
    /// Returns the first error produced by `f`.
    pub fn try_map<U, E, F>(self, mut f: F) -> Result<OneOrMany<U>, E>
    where
        F: FnMut(T) -> Result<U, E>,
    {
        match self {
            Self::One(item) => f(item).map(OneOrMany::One),
            Self::Many(items) => items.into_iter().map(f).collect::<Result<Vec<_>, E>>().map(OneOrMany::Many),
        }
    }

    pub fn map<U, F: FnMut(T) -> U>(self, mut f: F) -> OneOrMany<U> {
        match self {
            Self::One(item) => OneOrMany::One(f(item)),
            Self::Many(items) => OneOrMany::Many(items.into_iter().map(f).collect()),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Many(items) => items.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Body of `POST /api/:table/upsert`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpsertRequest {
    pub data: OneOrMany<Value>,
    #[serde(default, rename = "onConflict", alias = "on_conflict")]
    pub on_conflict: Option<String>,
}

impl UpsertRequest {
    #[must_use]
    pub fn conflict_key(&self) -> &str {
        self.on_conflict.as_deref().map(str::trim).filter(|k| !k.is_empty()).unwrap_or(ID_FIELD)
    }
}

/// Missing, `null` and `""` all count as "no conflict value".
#[must_use]
pub fn conflict_value<'a>(record: &'a BsonDocument, key: &str) -> Option<&'a Bson> {
    match record.get(key) {
        None | Some(Bson::Null) => None,
        Some(Bson::String(s)) if s.is_empty() => None,
        Some(v) => Some(v),
    }
}

/// Filter that decides whether `record` updates an existing row or inserts a new one.
///
/// Identity keys go through the dual-identity filter, other keys match by equality. With no
/// conflict value the filter targets a freshly generated `_id`, so the upsert always inserts.
#[must_use]
pub fn resolve_filter(record: &BsonDocument, conflict_key: &str) -> Filter {
    match conflict_value(record, conflict_key) {
        Some(v) if identity::is_identity_key(conflict_key) => identity::identity_filter(v),
        Some(v) => Filter::eq(conflict_key, v.clone()),
        None => Filter::eq(NATIVE_ID_FIELD, DocumentId::new().to_string()),
    }
}

/// Upserts every record of `request` into `col`, in order.
///
/// # Errors
/// Returns the first validation or storage error; records before it remain committed.
pub fn upsert_records(
    col: &Collection,
    request: UpsertRequest,
    defaults: &BsonDocument,
) -> Result<OneOrMany<Document>, DbError> {
    let key = request.conflict_key().to_string();
    let mut inserted = 0usize;
    let total = request.data.len();
    let out = request.data.try_map(|value| {
        let mut payload = json_value_to_record(&value)?;
        let filter = resolve_filter(&payload, &key);
        payload.remove(NATIVE_ID_FIELD);
        let outcome = upsert_one(col, &filter, payload, defaults)?;
        inserted += usize::from(outcome.inserted);
        Ok::<_, DbError>(outcome.document)
    });
    match &out {
        Ok(_) => log::info!("upsert {}: {total} records on '{key}', {inserted} inserted", col.name()),
        Err(e) => log::warn!("upsert {} aborted after {inserted} inserts: {e}", col.name()),
    }
    out
}

/// Inserts one record or a batch, in order. Any client-supplied `_id` is ignored.
///
/// # Errors
/// Returns the first validation or storage error; records before it remain committed.
pub fn insert_records(
    col: &Collection,
    data: OneOrMany<Value>,
    defaults: &BsonDocument,
) -> Result<OneOrMany<Document>, DbError> {
    data.try_map(|value| {
        let mut payload = json_value_to_record(&value)?;
        payload.remove(NATIVE_ID_FIELD);
        insert_one(col, payload, defaults)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use serde_json::json;

    #[test]
    fn conflict_value_presence() {
        let r = doc! {"a": "", "b": Bson::Null, "c": 0, "d": "x"};
        assert!(conflict_value(&r, "a").is_none());
        assert!(conflict_value(&r, "b").is_none());
        assert!(conflict_value(&r, "missing").is_none());
        assert_eq!(conflict_value(&r, "c"), Some(&Bson::Int32(0)));
        assert_eq!(conflict_value(&r, "d"), Some(&Bson::String("x".into())));
    }

    #[test]
    fn filter_for_each_kind_of_key() {
        assert_eq!(resolve_filter(&doc! {"slug": "home"}, "slug"), Filter::eq("slug", "home"));
        assert_eq!(resolve_filter(&doc! {"id": "s1"}, "id"), Filter::eq("id", "s1"));
        match resolve_filter(&doc! {"name": "B"}, "id") {
            Filter::Cmp { path, value: Bson::String(s), .. } => {
                assert_eq!(path, "_id");
                assert!(DocumentId::parse(&s).is_some());
            }
            other => panic!("unexpected filter {other:?}"),
        }
    }

    #[test]
    fn request_shapes() {
        let one: UpsertRequest = serde_json::from_value(json!({"data": {"id": 1}})).unwrap();
        assert!(matches!(one.data, OneOrMany::One(_)));
        assert_eq!(one.conflict_key(), "id");

        let many: UpsertRequest =
            serde_json::from_value(json!({"data": [{"slug": "a"}], "onConflict": "slug"})).unwrap();
        assert_eq!(many.data.len(), 1);
        assert_eq!(many.conflict_key(), "slug");

        let snake: UpsertRequest = serde_json::from_value(json!({"data": [], "on_conflict": " "})).unwrap();
        assert!(snake.data.is_empty());
        assert_eq!(snake.conflict_key(), "id");
    }

    #[test]
    fn try_map_stops_at_first_error() {
        let mut seen = Vec::new();
        let out: Result<OneOrMany<i32>, String> = OneOrMany::Many(vec![1, -1, 2]).try_map(|n| {
            seen.push(n);
            if n < 0 { Err(format!("bad {n}")) } else { Ok(n) }
        });
        assert_eq!(out, Err("bad -1".to_string()));
        assert_eq!(seen, vec![1, -1]);
    }
}
