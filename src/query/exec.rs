use crate::collection::Collection;
use crate::document::{Document, NATIVE_ID_FIELD};
use crate::errors::DbError;
use crate::telemetry;
use crate::types::DocumentId;
use bson::{Bson, Document as BsonDocument};
use std::time::Instant;

use super::eval::{eval_filter, project, sort_docs};
use super::types::{DeleteReport, Filter, FindOptions, MAX_PROJECTION_FIELDS, UpdateDoc};

/// Result of a single-record update-or-insert.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertOutcome {
    pub document: Document,
    pub inserted: bool,
}

pub fn find_docs(col: &Collection, filter: &Filter, opts: &FindOptions) -> Vec<Document> {
    select(col, filter, opts, false).0
}

/// Like [`find_docs`], plus the total number of matches ignoring `limit`. Both come from
/// the same scan, so the count always describes the returned page's snapshot.
pub fn find_docs_with_count(col: &Collection, filter: &Filter, opts: &FindOptions) -> (Vec<Document>, usize) {
    select(col, filter, opts, true)
}

fn select(col: &Collection, filter: &Filter, opts: &FindOptions, count_all: bool) -> (Vec<Document>, usize) {
    let start = Instant::now();
    let mut docs = Vec::new();
    let early_limit = if opts.sort.is_none() && !count_all { opts.limit } else { None };
    col.scan(|d| {
        if early_limit.is_some_and(|l| docs.len() >= l) {
            return;
        }
        if eval_filter(d.record(), filter) {
            docs.push(d.clone());
        }
    });
    let total = docs.len();
    if let Some(specs) = &opts.sort {
        sort_docs(&mut docs, specs);
    }
    if let Some(limit) = opts.limit {
        docs.truncate(limit);
    }
    if let Some(fields) = &opts.projection {
        let limited: Vec<String> = fields.iter().take(MAX_PROJECTION_FIELDS).cloned().collect();
        for d in &mut docs {
            d.data.0 = project(&d.data.0, &limited);
        }
    }
    telemetry::log_query(col.name(), filter.kind(), start.elapsed().as_millis(), opts.limit, Some(docs.len()));
    (docs, total)
}

pub fn count_docs(col: &Collection, filter: &Filter) -> usize {
    let start = Instant::now();
    let mut n = 0usize;
    col.scan(|d| {
        if eval_filter(d.record(), filter) {
            n += 1;
        }
    });
    telemetry::log_query(col.name(), filter.kind(), start.elapsed().as_millis(), None, Some(n));
    n
}

/// Inserts a new record. Table `defaults` fill fields the payload does not carry.
///
/// # Errors
/// Returns an error if the storage append fails.
pub fn insert_one(col: &Collection, payload: BsonDocument, defaults: &BsonDocument) -> Result<Document, DbError> {
    let document = Document::new(with_defaults(payload, defaults));
    col.write().insert(document.clone())?;
    Ok(document)
}

/// Replaces fields on the first matching record and returns it post-update.
///
/// # Errors
/// Returns an error if the storage append fails.
pub fn find_one_and_update(col: &Collection, filter: &Filter, update: &UpdateDoc) -> Result<Option<Document>, DbError> {
    let mut w = col.write();
    let Some(mut doc) = w.find_first(filter) else { return Ok(None) };
    apply_update(&mut doc, update);
    w.replace(doc.clone())?;
    Ok(Some(doc))
}

/// Removes the first matching record and returns it.
///
/// # Errors
/// Returns an error if the storage append fails.
pub fn find_one_and_delete(col: &Collection, filter: &Filter) -> Result<Option<Document>, DbError> {
    let mut w = col.write();
    let Some(doc) = w.find_first(filter) else { return Ok(None) };
    w.remove(&doc.id)
}

/// Removes at most one matching record.
///
/// # Errors
/// Returns an error if the storage append fails.
pub fn delete_one(col: &Collection, filter: &Filter) -> Result<DeleteReport, DbError> {
    let deleted = u64::from(find_one_and_delete(col, filter)?.is_some());
    Ok(DeleteReport { deleted })
}

/// # Errors
/// Returns an error if a storage append fails; records removed before the failure stay removed.
pub fn delete_many(col: &Collection, filter: &Filter) -> Result<DeleteReport, DbError> {
    let mut w = col.write();
    let mut deleted = 0u64;
    for id in w.matching_ids(filter) {
        if w.remove(&id)?.is_some() {
            deleted += 1;
        }
    }
    Ok(DeleteReport { deleted })
}

/// Atomic update-or-insert of one record.
///
/// With a match, every payload field replaces the stored one. Without, a record is created
/// from the filter's equality fields overlaid with the payload; an `_id` equality becomes the
/// new record's native identifier. Defaults only apply on insert.
///
/// # Errors
/// Returns an error if the storage append fails.
pub fn upsert_one(
    col: &Collection,
    filter: &Filter,
    payload: BsonDocument,
    defaults: &BsonDocument,
) -> Result<UpsertOutcome, DbError> {
    let mut w = col.write();
    if let Some(mut doc) = w.find_first(filter) {
        apply_update(&mut doc, &UpdateDoc { set: payload });
        w.replace(doc.clone())?;
        return Ok(UpsertOutcome { document: doc, inserted: false });
    }
    let mut id = None;
    let mut seed = BsonDocument::new();
    for (field, value) in filter.equality_fields() {
        if field == NATIVE_ID_FIELD {
            id = match &value {
                Bson::String(s) => DocumentId::parse(s),
                _ => None,
            };
        } else {
            seed.insert(field, value);
        }
    }
    for (k, v) in payload {
        seed.insert(k, v);
    }
    let data = with_defaults(seed, defaults);
    let document = match id {
        Some(id) => Document::with_id(id, data),
        None => Document::new(data),
    };
    w.insert(document.clone())?;
    Ok(UpsertOutcome { document, inserted: true })
}

/// Sets every field of `upd.set` on `doc`; `_id` is never overwritten. Returns whether
/// anything changed. `updated_at` is refreshed either way.
pub fn apply_update(doc: &mut Document, upd: &UpdateDoc) -> bool {
    let mut modified = false;
    for (k, v) in &upd.set {
        if k == NATIVE_ID_FIELD {
            continue;
        }
        if doc.data.0.get(k) != Some(v) {
            doc.data.0.insert(k.clone(), v.clone());
            modified = true;
        }
    }
    doc.touch();
    modified
}

fn with_defaults(mut data: BsonDocument, defaults: &BsonDocument) -> BsonDocument {
    for (k, v) in defaults {
        if !data.contains_key(k) {
            data.insert(k.clone(), v.clone());
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::query::{CmpOp, Order, SortSpec};
    use bson::doc;

    #[test]
    fn find_docs_projection_sort_and_limit() {
        let e = Engine::in_memory();
        let col = e.create_collection("u_find");
        col.insert_document(Document::new(doc! {"k": 1, "v": 3})).unwrap();
        col.insert_document(Document::new(doc! {"k": 2, "v": 1})).unwrap();
        col.insert_document(Document::new(doc! {"k": 3, "v": 2})).unwrap();
        let opts = FindOptions {
            projection: Some(vec!["k".into()]),
            sort: Some(vec![SortSpec { field: "v".into(), order: Order::Asc }]),
            limit: Some(2),
        };
        let docs = find_docs(&col, &Filter::True, &opts);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].record().get_i32("k").unwrap(), 2);
        assert_eq!(docs[1].record().get_i32("k").unwrap(), 3);
        assert!(docs[0].record().get("v").is_none());
        assert!(docs[0].record().get("_id").is_some());
    }

    #[test]
    fn count_ignores_limit_but_shares_the_scan() {
        let e = Engine::in_memory();
        let col = e.create_collection("u_count");
        for k in 0..5 {
            col.insert_document(Document::new(doc! {"k": k, "even": k % 2 == 0})).unwrap();
        }
        let even = Filter::Cmp { path: "even".into(), op: CmpOp::Eq, value: true.into() };
        let opts = FindOptions { limit: Some(1), ..FindOptions::default() };
        let (page, total) = find_docs_with_count(&col, &even, &opts);
        assert_eq!(page.len(), 1);
        assert_eq!(total, 3);
        assert_eq!(total, count_docs(&col, &even));
    }

    #[test]
    fn upsert_copies_equality_fields_and_native_id() {
        let e = Engine::in_memory();
        let col = e.create_collection("u_upsert");
        let fresh = DocumentId::new();
        let filter = Filter::And(vec![
            Filter::eq("_id", fresh.to_string()),
            Filter::eq("slug", "welcome"),
        ]);
        let out = upsert_one(&col, &filter, doc! {"title": "Hi"}, &doc! {"published": false}).unwrap();
        assert!(out.inserted);
        assert_eq!(out.document.id, fresh);
        assert_eq!(out.document.record().get_str("slug").unwrap(), "welcome");
        assert!(!out.document.record().get_bool("published").unwrap());

        let again = upsert_one(&col, &filter, doc! {"title": "Hello"}, &doc! {"published": true}).unwrap();
        assert!(!again.inserted);
        assert_eq!(again.document.record().get_str("title").unwrap(), "Hello");
        assert!(!again.document.record().get_bool("published").unwrap());
        assert_eq!(col.len(), 1);
    }

    #[test]
    fn apply_update_never_touches_native_id() {
        let mut d = Document::new(doc! {"x": 1});
        let before = d.id.to_string();
        let changed = apply_update(&mut d, &UpdateDoc { set: doc! {"_id": "other", "x": 1} });
        assert!(!changed);
        assert_eq!(d.record().get_str("_id").unwrap(), before);
    }

    #[test]
    fn delete_many_removes_only_matches() {
        let e = Engine::in_memory();
        let col = e.create_collection("u_delete");
        for grade in ["7", "8", "8"] {
            col.insert_document(Document::new(doc! {"grade": grade})).unwrap();
        }
        let report = delete_many(&col, &Filter::Cmp { path: "grade".into(), op: CmpOp::Eq, value: "8".into() }).unwrap();
        assert_eq!(report.deleted, 2);
        assert_eq!(col.len(), 1);
        assert_eq!(delete_one(&col, &Filter::True).unwrap().deleted, 1);
        assert_eq!(delete_one(&col, &Filter::True).unwrap().deleted, 0);
    }
}
