use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde_json::{Value, json};

use super::error::ApiError;
use super::state::AppState;
use crate::document::{Document, NATIVE_ID_FIELD};
use crate::errors::DbError;
use crate::identity::Identity;
use crate::query::{
    FindOptions, ReadOptions, UpdateDoc, count_docs, delete_many, find_docs, find_docs_with_count, find_one_and_delete,
    find_one_and_update, group_params, translate,
};
use crate::telemetry;
use crate::upsert::{OneOrMany, UpsertRequest, insert_records, upsert_records};
use crate::utils::json::json_value_to_record;

type Params = Result<Query<Vec<(String, String)>>, QueryRejection>;
type Body = Result<Json<Value>, JsonRejection>;

/// Runs a store call on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, DbError> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await??)
}

fn missing(table: &str, id: &str) -> ApiError {
    DbError::NoSuchDocument(format!("'{id}' in {table}")).into()
}

fn documents_json(docs: OneOrMany<Document>) -> Value {
    match docs.map(|d| d.to_json()) {
        OneOrMany::One(v) => v,
        OneOrMany::Many(vs) => Value::Array(vs),
    }
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "metrics": telemetry::metrics_snapshot(),
    }))
}

/// `GET /api/:table`
pub async fn list(State(state): State<AppState>, Path(table): Path<String>, params: Params) -> Result<Json<Value>, ApiError> {
    let Query(pairs) = params?;
    let (col, _) = state.table(&table)?;
    let params = group_params(pairs);
    let filter = translate(&params).to_filter();
    let opts = ReadOptions::from_params(&params);

    blocking(move || {
        if opts.head {
            return Ok(json!({ "count": count_docs(&col, &filter) }));
        }
        if opts.count {
            let (docs, count) = find_docs_with_count(&col, &filter, &opts.find);
            let data: Vec<Value> = docs.iter().map(Document::to_json).collect();
            return Ok(json!({ "data": data, "count": count }));
        }
        Ok(Value::Array(find_docs(&col, &filter, &opts.find).iter().map(Document::to_json).collect()))
    })
    .await
    .map(Json)
}

/// `GET /api/:table/:id`
pub async fn get_one(State(state): State<AppState>, Path((table, id)): Path<(String, String)>) -> Result<Json<Value>, ApiError> {
    let (col, _) = state.table(&table)?;
    let filter = Identity::from_path(&id).filter();
    let found = blocking(move || {
        let opts = FindOptions { limit: Some(1), ..FindOptions::default() };
        Ok(find_docs(&col, &filter, &opts).into_iter().next())
    })
    .await?;
    found
        .map(|d| Json(d.to_json()))
        .ok_or_else(|| missing(&table, &id))
}

/// `POST /api/:table`
pub async fn insert(
    State(state): State<AppState>,
    Path(table): Path<String>,
    body: Body,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(body) = body?;
    let (col, defaults) = state.table(&table)?;
    let data = match body {
        Value::Array(items) => OneOrMany::Many(items),
        other => OneOrMany::One(other),
    };
    let stored = blocking(move || insert_records(&col, data, &defaults)).await?;
    Ok((StatusCode::CREATED, Json(documents_json(stored))))
}

/// `PATCH /api/:table/:id`
pub async fn update(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
    body: Body,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body?;
    let (col, _) = state.table(&table)?;
    let mut set = json_value_to_record(&body)?;
    set.remove(NATIVE_ID_FIELD);
    let filter = Identity::from_path(&id).filter();
    let updated = blocking(move || find_one_and_update(&col, &filter, &UpdateDoc { set })).await?;
    updated
        .map(|d| Json(d.to_json()))
        .ok_or_else(|| missing(&table, &id))
}

/// `DELETE /api/:table/:id`
pub async fn delete_one(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let (col, _) = state.table(&table)?;
    let filter = Identity::from_path(&id).filter();
    let removed = blocking(move || find_one_and_delete(&col, &filter)).await?;
    removed
        .map(|d| Json(d.to_json()))
        .ok_or_else(|| missing(&table, &id))
}

/// `DELETE /api/:table?<filters>`; refuses to run without a filter.
pub async fn delete_by_filter(
    State(state): State<AppState>,
    Path(table): Path<String>,
    params: Params,
) -> Result<Json<Value>, ApiError> {
    let Query(pairs) = params?;
    let (col, _) = state.table(&table)?;
    let query = translate(&group_params(pairs));
    if query.is_empty() {
        return Err(ApiError::bad_request("refusing to delete without a filter"));
    }
    let filter = query.to_filter();
    let report = blocking(move || delete_many(&col, &filter)).await?;
    log::info!("deleted {} records from {table} matching {}", report.deleted, query.to_json());
    Ok(Json(json!({ "deleted": report.deleted })))
}

/// `POST /api/:table/upsert`
pub async fn upsert(State(state): State<AppState>, Path(table): Path<String>, body: Body) -> Result<Json<Value>, ApiError> {
    let Json(body) = body?;
    let (col, defaults) = state.table(&table)?;
    let request: UpsertRequest =
        serde_json::from_value(body).map_err(|e| ApiError::bad_request(format!("invalid upsert body: {e}")))?;
    let stored = blocking(move || upsert_records(&col, request, &defaults)).await?;
    Ok(Json(documents_json(stored)))
}
