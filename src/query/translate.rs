//! Query-string to filter translation for the read and delete endpoints.
//!
//! Keys carry an optional operator suffix (`_gte`, `_lte`, `_neq`, `_in`, checked in that
//! order). Every condition on a base field lands in one entry, so `age_gte=5&age_lte=10`
//! is a single range on `age`. Values stay strings except the literals `true`/`false`.

use bson::Bson;
use serde_json::{Map, Value};

use super::types::{CmpOp, Filter};
use crate::utils::json::{bson_to_json, json_to_bson};

/// Control keys consumed by the read endpoint; never translated into filters.
pub const RESERVED_KEYS: [&str; 6] = ["select", "sort", "order", "limit", "count", "head"];

#[derive(Debug, Clone, Copy)]
enum Suffix {
    Gte,
    Lte,
    Neq,
    In,
}

const SUFFIXES: [(&str, Suffix); 4] =
    [("_gte", Suffix::Gte), ("_lte", Suffix::Lte), ("_neq", Suffix::Neq), ("_in", Suffix::In)];

/// One query-string key's value(s). Repeated keys collect into `Many`, in request order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    One(String),
    Many(Vec<String>),
}

impl ParamValue {
    #[must_use]
    pub fn values(&self) -> &[String] {
        match self {
            Self::One(v) => std::slice::from_ref(v),
            Self::Many(vs) => vs,
        }
    }

    /// The value that wins for single-valued control keys.
    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.values().last().map(String::as_str)
    }
}

/// Groups raw `(key, value)` pairs by key, keeping first-seen key order.
pub fn group_params<I, K, V>(pairs: I) -> Vec<(String, ParamValue)>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let mut out: Vec<(String, ParamValue)> = Vec::new();
    for (k, v) in pairs {
        let (k, v) = (k.into(), v.into());
        match out.iter_mut().find(|(key, _)| *key == k) {
            Some((_, slot)) => {
                let prev = std::mem::replace(slot, ParamValue::Many(Vec::new()));
                let mut all = match prev {
                    ParamValue::One(p) => vec![p],
                    ParamValue::Many(ps) => ps,
                };
                all.push(v);
                *slot = ParamValue::Many(all);
            }
            None => out.push((k, ParamValue::One(v))),
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Cmp { op: CmpOp, value: Bson },
    In(Vec<Bson>),
}

/// Translator output: base field -> conditions, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFilter {
    entries: Vec<(String, Vec<Condition>)>,
}

impl QueryFilter {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&[Condition]> {
        self.entries.iter().find(|(f, _)| f == field).map(|(_, c)| c.as_slice())
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(f, _)| f.as_str())
    }

    fn push(&mut self, field: &str, cond: Condition) {
        match self.entries.iter_mut().find(|(f, _)| f == field) {
            Some((_, conds)) => conds.push(cond),
            None => self.entries.push((field.to_string(), vec![cond])),
        }
    }

    /// Store filter: the conjunction of every condition.
    #[must_use]
    pub fn to_filter(&self) -> Filter {
        let mut parts: Vec<Filter> = self
            .entries
            .iter()
            .flat_map(|(path, conds)| {
                conds.iter().map(move |c| match c {
                    Condition::Cmp { op, value } => Filter::Cmp { path: path.clone(), op: *op, value: value.clone() },
                    Condition::In(values) => Filter::In { path: path.clone(), values: values.clone() },
                })
            })
            .collect();
        match parts.len() {
            0 => Filter::True,
            1 => parts.remove(0),
            _ => Filter::And(parts),
        }
    }

    /// Mapping form: a lone equality renders as the bare value, anything else as an
    /// operator object (`{"$gte": .., "$lte": ..}`).
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        for (field, conds) in &self.entries {
            let rendered = match conds.as_slice() {
                [Condition::Cmp { op: CmpOp::Eq, value }] => bson_to_json(value),
                _ => {
                    let mut ops = Map::new();
                    for c in conds {
                        match c {
                            Condition::Cmp { op, value } => {
                                ops.insert(op.operator().to_string(), bson_to_json(value));
                            }
                            Condition::In(values) => {
                                ops.insert("$in".into(), Value::Array(values.iter().map(bson_to_json).collect()));
                            }
                        }
                    }
                    Value::Object(ops)
                }
            };
            out.insert(field.clone(), rendered);
        }
        Value::Object(out)
    }
}

/// Translates query parameters into a filter. Never fails: an `_in` value that is not
/// valid JSON degrades to equality on the raw string.
#[must_use]
pub fn translate(params: &[(String, ParamValue)]) -> QueryFilter {
    let mut out = QueryFilter::default();
    for (key, value) in params {
        if RESERVED_KEYS.contains(&key.as_str()) {
            continue;
        }
        let (field, suffix) = split_suffix(key);
        for raw in value.values() {
            let cond = match suffix {
                None => Condition::Cmp { op: CmpOp::Eq, value: coerce(raw) },
                Some(Suffix::Gte) => Condition::Cmp { op: CmpOp::Gte, value: coerce(raw) },
                Some(Suffix::Lte) => Condition::Cmp { op: CmpOp::Lte, value: coerce(raw) },
                Some(Suffix::Neq) => Condition::Cmp { op: CmpOp::Ne, value: coerce(raw) },
                Some(Suffix::In) => membership(field, raw),
            };
            out.push(field, cond);
        }
    }
    out
}

fn split_suffix(key: &str) -> (&str, Option<Suffix>) {
    for (suffix, kind) in SUFFIXES {
        if let Some(base) = key.strip_suffix(suffix).filter(|b| !b.is_empty()) {
            return (base, Some(kind));
        }
    }
    (key, None)
}

fn coerce(raw: &str) -> Bson {
    match raw {
        "true" => Bson::Boolean(true),
        "false" => Bson::Boolean(false),
        other => Bson::String(other.to_string()),
    }
}

fn membership(field: &str, raw: &str) -> Condition {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => Condition::In(items.iter().map(json_to_bson).collect()),
        Ok(scalar) => Condition::In(vec![json_to_bson(&scalar)]),
        Err(e) => {
            log::warn!("{field}_in: value is not JSON ({e}); matching it literally");
            Condition::Cmp { op: CmpOp::Eq, value: Bson::String(raw.to_string()) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, ParamValue)> {
        group_params(pairs.iter().map(|(k, v)| (*k, *v)))
    }

    #[test]
    fn reserved_keys_are_skipped() {
        let q = translate(&params(&[("select", "name"), ("sort", "name"), ("limit", "3"), ("head", "true")]));
        assert!(q.is_empty());
    }

    #[test]
    fn suffix_order_prefers_gte_over_in() {
        // `_gte` is checked first, so a field literally named `x_in` gets a range.
        let q = translate(&params(&[("x_in_gte", "4")]));
        assert_eq!(q.get("x_in"), Some(&[Condition::Cmp { op: CmpOp::Gte, value: "4".into() }][..]));
    }

    #[test]
    fn bare_suffix_is_a_plain_key() {
        let q = translate(&params(&[("_in", "[1]")]));
        assert_eq!(q.get("_in"), Some(&[Condition::Cmp { op: CmpOp::Eq, value: "[1]".into() }][..]));
    }

    #[test]
    fn repeated_keys_accumulate() {
        let q = translate(&params(&[("tags", "a"), ("tags", "b")]));
        assert_eq!(q.get("tags").map(<[Condition]>::len), Some(2));
        assert!(matches!(q.to_filter(), Filter::And(parts) if parts.len() == 2));
    }

    #[test]
    fn neq_and_booleans() {
        let q = translate(&params(&[("published_neq", "false")]));
        assert_eq!(q.to_json(), serde_json::json!({"published": {"$ne": false}}));
    }

    #[test]
    fn in_with_scalar_json_is_single_membership() {
        let q = translate(&params(&[("grade_in", "7")]));
        assert_eq!(q.get("grade"), Some(&[Condition::In(vec![Bson::Int32(7)])][..]));
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert_eq!(translate(&[]).to_filter(), Filter::True);
    }
}
