use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use spindex_core::{DocId, IndexConfig, IndexError, IndexStore, Representation, ScoredDoc};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default)]
    pub compressed: bool,
}

#[derive(Deserialize)]
pub struct RankParams {
    pub q: String,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub doc_ids: Vec<DocId>,
}

#[derive(Serialize)]
pub struct RankResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<ScoredDoc>,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<IndexStore>,
}

/// Error body returned to clients; malformed queries are 400, everything else 500.
pub enum ApiError {
    Index(IndexError),
    Internal(String),
}

impl From<IndexError> for ApiError {
    fn from(e: IndexError) -> Self {
        Self::Index(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Index(e) if e.is_user_error() => (StatusCode::BAD_REQUEST, e.to_string()),
            Self::Index(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            Self::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        if status.is_server_error() {
            tracing::error!(error = %message, "request failed");
        }
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub fn build_app(config: &IndexConfig) -> Router {
    build_app_with_store(Arc::new(IndexStore::open(config)))
}

pub fn build_app_with_store(store: Arc<IndexStore>) -> Router {
    let app_state = AppState { store };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/rank", get(rank_handler))
        .route("/warm", post(warm_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Index loads are blocking file reads; keep them off the async workers.
async fn blocking<T, F>(store: Arc<IndexStore>, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&IndexStore) -> spindex_core::Result<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(move || f(&store)).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(e) => Err(ApiError::Internal(format!("query task failed: {e}"))),
    }
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let start = Instant::now();
    let repr = if params.compressed { Representation::Compressed } else { Representation::Uncompressed };
    let query = params.q.clone();
    let doc_ids = blocking(state.store, move |store| store.boolean_search(&query, repr)).await?;
    Ok(Json(SearchResponse {
        query: params.q,
        took_s: start.elapsed().as_secs_f64(),
        total_hits: doc_ids.len(),
        doc_ids,
    }))
}

pub async fn rank_handler(
    State(state): State<AppState>,
    Query(params): Query<RankParams>,
) -> Result<Json<RankResponse>, ApiError> {
    let start = Instant::now();
    let query = params.q.clone();
    let results = blocking(state.store, move |store| store.rank(&query)).await?;
    Ok(Json(RankResponse {
        query: params.q,
        took_s: start.elapsed().as_secs_f64(),
        total_hits: results.len(),
        results,
    }))
}

async fn warm_handler(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let start = Instant::now();
    blocking(state.store, |store| store.warm()).await?;
    Ok(Json(serde_json::json!({ "warm": true, "took_s": start.elapsed().as_secs_f64() })))
}
