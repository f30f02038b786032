use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use log::info;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::engine::matcher::{Descriptor, Matcher};
use crate::engine::record::Record;
use crate::engine::store::ResultSet;
use crate::server::registry::Registry;
use crate::Error;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    /// Directory that registry snapshots are written into.
    pub data_dir: PathBuf,
}

impl AppState {
    pub fn new(registry: Arc<Registry>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            data_dir: data_dir.into(),
        }
    }
}

/// Builds the REST router over a registry of named stores.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/collections", get(list_collections))
        .route(
            "/collections/:name",
            post(create_collection).delete(drop_collection),
        )
        .route(
            "/collections/:name/records",
            get(find_records).post(add_record).delete(delete_record),
        )
        .route("/collections/:name/records/:id", put(update_record))
        .route("/persist", post(persist_stores))
        .with_state(state)
}

/// Errors surfaced to HTTP clients as `{"error": ...}` bodies.
pub enum ApiError {
    NotFound(String),
    Store(Error),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::Store(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message.clone()),
            ApiError::Store(err) => {
                let status = match err {
                    Error::AmbiguousDelete(_) => StatusCode::CONFLICT,
                    Error::MissingField(_)
                    | Error::Incomparable { .. }
                    | Error::DuplicateId(_)
                    | Error::Decryption(_) => StatusCode::BAD_REQUEST,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

fn collection_not_found(name: &str) -> ApiError {
    ApiError::NotFound(format!("collection `{name}` not found"))
}

/// Turns `field=value` query pairs into a descriptor of literal matchers.
/// Values are parsed as JSON where possible so numbers and booleans can be
/// queried; anything else is matched as a plain string.
fn descriptor_from_query(pairs: Vec<(String, String)>) -> Descriptor {
    let mut desc = Descriptor::new();
    for (field, raw) in pairs {
        let value = serde_json::from_str::<Value>(&raw).unwrap_or_else(|_| Value::String(raw));
        desc = desc.field(field, Matcher::Literal(value));
    }
    desc
}

async fn list_collections(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.registry.names())
}

async fn create_collection(
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Json<Vec<Record>> {
    state.registry.create(&name);
    info!("created collection `{name}`");
    Json(Vec::new())
}

async fn drop_collection(
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Record>>, ApiError> {
    let store = state
        .registry
        .remove(&name)
        .ok_or_else(|| collection_not_found(&name))?;
    info!("dropped collection `{name}` ({} records)", store.len());
    Ok(Json(store.into_records()))
}

async fn find_records(
    Path(name): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
    State(state): State<AppState>,
) -> Result<Json<ResultSet>, ApiError> {
    let store = state
        .registry
        .get(&name)
        .ok_or_else(|| collection_not_found(&name))?;
    let desc = descriptor_from_query(pairs);
    let results = store.read().unwrap().find(&desc)?;
    Ok(Json(results))
}

async fn add_record(
    Path(name): Path<String>,
    State(state): State<AppState>,
    Json(record): Json<Record>,
) -> Result<Json<Record>, ApiError> {
    let store = state
        .registry
        .get(&name)
        .ok_or_else(|| collection_not_found(&name))?;
    let stored = store.write().unwrap().add_record(record);
    Ok(Json(stored))
}

async fn delete_record(
    Path(name): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
    State(state): State<AppState>,
) -> Result<Json<Record>, ApiError> {
    let store = state
        .registry
        .get(&name)
        .ok_or_else(|| collection_not_found(&name))?;
    let desc = descriptor_from_query(pairs);
    let removed = store.write().unwrap().del_record(&desc)?;
    removed
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("no record matches the descriptor".to_string()))
}

async fn update_record(
    Path((name, id)): Path<(String, String)>,
    State(state): State<AppState>,
    Json(patch): Json<Map<String, Value>>,
) -> Result<Json<Record>, ApiError> {
    let store = state
        .registry
        .get(&name)
        .ok_or_else(|| collection_not_found(&name))?;
    let desc = Descriptor::new().field(crate::ID_FIELD, Matcher::literal(id.clone()));

    let mut store = store.write().unwrap();
    let matches = store.find(&desc)?;
    if matches.len() != 1 {
        return Err(ApiError::NotFound(format!(
            "one unique record with id `{id}` could not be located"
        )));
    }

    let mut record = matches.into_records().remove(0);
    record.merge(&patch);
    store.del_record(&desc)?;
    let updated = store.add_record(record);
    Ok(Json(updated))
}

#[derive(Deserialize)]
struct PersistParams {
    filename: Option<String>,
    password: Option<String>,
}

async fn persist_stores(
    State(state): State<AppState>,
    Query(params): Query<PersistParams>,
) -> Result<Json<Value>, ApiError> {
    let filename = params.filename.unwrap_or_else(|| "globstore".to_string());
    let path = state.data_dir.join(filename);
    state
        .registry
        .persist_all(&path, params.password.as_deref())?;
    info!("persisted registry snapshot to {}", path.display());
    Ok(Json(json!({})))
}
