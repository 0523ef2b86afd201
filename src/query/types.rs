use bson::{Bson, Document as BsonDocument};
use serde::{Deserialize, Serialize};

// Safety limits to prevent resource abuse
pub(crate) const MAX_PATH_DEPTH: usize = 32;
pub(crate) const MAX_PROJECTION_FIELDS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub order: Order,
}

/// Options for `find_docs`.
///
/// Sorting is applied before the limit; projection last.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindOptions {
    pub projection: Option<Vec<String>>,
    pub sort: Option<Vec<SortSpec>>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gte,
    Lte,
}

impl CmpOp {
    #[must_use]
    pub const fn operator(self) -> &'static str {
        match self {
            Self::Eq => "$eq",
            Self::Ne => "$ne",
            Self::Gte => "$gte",
            Self::Lte => "$lte",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    True,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    In { path: String, values: Vec<Bson> },
    Cmp { path: String, op: CmpOp, value: Bson },
}

impl Filter {
    #[must_use]
    pub fn eq(path: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::Cmp { path: path.into(), op: CmpOp::Eq, value: value.into() }
    }

    /// Short operator label used in query log lines.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::True => "true",
            Self::And(_) => "$and",
            Self::Or(_) => "$or",
            Self::In { .. } => "$in",
            Self::Cmp { op, .. } => op.operator(),
        }
    }

    /// Top-level equality constraints, copied into a document created by an upsert.
    #[must_use]
    pub fn equality_fields(&self) -> Vec<(String, Bson)> {
        match self {
            Self::Cmp { path, op: CmpOp::Eq, value } if !path.contains('.') => {
                vec![(path.clone(), value.clone())]
            }
            Self::And(parts) => parts.iter().flat_map(Self::equality_fields).collect(),
            _ => Vec::new(),
        }
    }
}

/// Field replacement applied to a matched document (`$set` semantics on top-level fields).
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UpdateDoc {
    pub set: BsonDocument,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeleteReport {
    pub deleted: u64,
}
