use bson::{Bson, Document as BsonDocument};
use std::cmp::Ordering;

use super::types::{CmpOp, Filter, MAX_PATH_DEPTH, Order, SortSpec};
use crate::document::{Document, NATIVE_ID_FIELD};

/// Evaluates `filter` against a stored record.
///
/// Comparisons against an array field match when any element matches, the same way
/// equality on a tag list behaves for callers filtering `?tags=news`.
#[must_use]
pub fn eval_filter(doc: &BsonDocument, filter: &Filter) -> bool {
    match filter {
        Filter::True => true,
        Filter::And(fs) => fs.iter().all(|f| eval_filter(doc, f)),
        Filter::Or(fs) => fs.iter().any(|f| eval_filter(doc, f)),
        Filter::In { path, values } => get_path(doc, path)
            .is_some_and(|v| candidates(v).any(|c| values.iter().any(|x| bson_equal(c, x)))),
        Filter::Cmp { path, op, value } => match (get_path(doc, path), op) {
            (Some(v), CmpOp::Eq) => matches_eq(v, value),
            (Some(v), CmpOp::Ne) => !matches_eq(v, value),
            (None, CmpOp::Ne) => !value.eq(&Bson::Null),
            (None, CmpOp::Eq) => value.eq(&Bson::Null),
            (Some(v), CmpOp::Gte) => {
                candidates(v).any(|c| bson_cmp(c, value).is_some_and(|o| o != Ordering::Less))
            }
            (Some(v), CmpOp::Lte) => {
                candidates(v).any(|c| bson_cmp(c, value).is_some_and(|o| o != Ordering::Greater))
            }
            (None, CmpOp::Gte | CmpOp::Lte) => false,
        },
    }
}

fn matches_eq(v: &Bson, value: &Bson) -> bool {
    bson_equal(v, value) || candidates(v).any(|c| bson_equal(c, value))
}

/// The value itself, or its elements when it is an array.
fn candidates(v: &Bson) -> Box<dyn Iterator<Item = &Bson> + '_> {
    match v {
        Bson::Array(items) => Box::new(items.iter()),
        other => Box::new(std::iter::once(other)),
    }
}

pub(crate) fn get_path<'a>(doc: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    let mut iter = path.split('.');
    let first = iter.next()?;
    let mut depth = 1usize;
    let mut cur: Option<&Bson> = doc.get(first);
    for part in iter {
        depth += 1;
        if depth > MAX_PATH_DEPTH {
            return None;
        }
        match cur {
            Some(Bson::Document(d)) => cur = d.get(part),
            _ => return None,
        }
    }
    cur
}

#[allow(clippy::cast_precision_loss)]
fn to_f64(b: &Bson) -> Option<f64> {
    match b {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        _ => None,
    }
}

#[allow(clippy::float_cmp)]
pub(crate) fn bson_equal(a: &Bson, b: &Bson) -> bool {
    match (to_f64(a), to_f64(b)) {
        (Some(x), Some(y)) if !matches!((a, b), (Bson::Int64(_), Bson::Int64(_))) => x == y,
        _ => a == b,
    }
}

pub(crate) fn bson_cmp(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let (Bson::Int64(x), Bson::Int64(y)) = (a, b) {
        return Some(x.cmp(y));
    }
    if let (Some(af), Some(bf)) = (to_f64(a), to_f64(b)) {
        return af.partial_cmp(&bf);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Keeps only `fields` (dotted paths allowed) plus `_id`.
#[must_use]
pub fn project(doc: &BsonDocument, fields: &[String]) -> BsonDocument {
    let mut out = BsonDocument::new();
    if let Some(id) = doc.get(NATIVE_ID_FIELD) {
        out.insert(NATIVE_ID_FIELD, id.clone());
    }
    for f in fields {
        if let Some(v) = get_path(doc, f) {
            out.insert(f.clone(), v.clone());
        }
    }
    out
}

pub fn sort_docs(docs: &mut [Document], specs: &[SortSpec]) {
    docs.sort_by(|a, b| compare_docs(a.record(), b.record(), specs));
}

/// Missing fields sort before present ones; incomparable values compare equal.
fn compare_docs(a: &BsonDocument, b: &BsonDocument, specs: &[SortSpec]) -> Ordering {
    for s in specs {
        let ord = match (get_path(a, &s.field), get_path(b, &s.field)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(ax), Some(bx)) => bson_cmp(ax, bx).unwrap_or(Ordering::Equal),
        };
        if ord != Ordering::Equal {
            return if s.order == Order::Asc { ord } else { ord.reverse() };
        }
    }
    Ordering::Equal
}
