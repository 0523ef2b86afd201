// Submodules for separation of concerns
mod eval;
mod exec;
mod options;
mod translate;
mod types;

pub use eval::{eval_filter, project, sort_docs};
pub use exec::{
    UpsertOutcome, apply_update, count_docs, delete_many, delete_one, find_docs, find_docs_with_count, find_one_and_delete,
    find_one_and_update, insert_one, upsert_one,
};
pub use options::ReadOptions;
pub use translate::{Condition, ParamValue, QueryFilter, RESERVED_KEYS, group_params, translate};
pub use types::{CmpOp, DeleteReport, Filter, FindOptions, Order, SortSpec, UpdateDoc};
