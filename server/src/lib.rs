use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use trawl_core::{Answer, DataPaths, Field, InvertedIndex, SearchError, Searcher, SharedIndex};

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_ms: u128,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<Answer>,
}

#[derive(Deserialize)]
pub struct DocParams {
    pub url: String,
}

#[derive(Serialize)]
pub struct DocResponse {
    pub id: u64,
    pub url: String,
    pub title: String,
    pub indexed_at: i64,
    pub title_length: usize,
    pub body_length: usize,
}

#[derive(Deserialize)]
pub struct RemoveRequest {
    pub url: String,
}

type ApiError = (StatusCode, String);

#[derive(Clone)]
pub struct AppState {
    pub index: SharedIndex,
    pub admin_token: Option<String>,
}

impl AppState {
    pub fn new(index: SharedIndex, admin_token: Option<String>) -> Self {
        Self { index, admin_token }
    }
}

/// Load `<data_dir>/index.json` and serve it. The admin token comes from `ADMIN_TOKEN`.
pub fn build_app(data_dir: String) -> Result<Router> {
    let paths = DataPaths::new(&data_dir);
    let index = InvertedIndex::load(paths.index())?;
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    tracing::info!(
        data_dir = %data_dir,
        urls = index.indexed_url_count(),
        title_tokens = index.entry_count(Field::Title),
        body_tokens = index.entry_count(Field::Body),
        admin = admin_token.is_some(),
        "search index ready"
    );
    let index = index.into_shared();
    Ok(router(AppState::new(index, admin_token)))
}

pub fn router(state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
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
        .route("/doc", get(doc_handler))
        .route("/index/remove", post(index_remove))
        .route("/index/commit", post(index_commit))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let mut results = {
        let index = state.index.read();
        match Searcher::new(&index).query(&params.q) {
            Ok(answers) => answers,
            Err(SearchError::EmptyQuery) => {
                return Err((StatusCode::BAD_REQUEST, "query must not be empty".into()))
            }
        }
    };
    let total_hits = results.len();
    results.truncate(params.k.clamp(1, 100));

    let elapsed = start.elapsed();
    tracing::info!(query = %params.q, total_hits, took_ms = elapsed.as_millis() as u64, "search served");
    Ok(Json(SearchResponse {
        query: params.q,
        took_ms: elapsed.as_millis(),
        took_s: elapsed.as_secs_f64(),
        total_hits,
        results,
    }))
}

pub async fn doc_handler(
    State(state): State<AppState>,
    Query(params): Query<DocParams>,
) -> Result<Json<DocResponse>, ApiError> {
    let index = state.index.read();
    let meta = index
        .document(&params.url)
        .ok_or_else(|| (StatusCode::NOT_FOUND, "not found".to_string()))?;
    Ok(Json(DocResponse {
        id: meta.id,
        url: params.url.clone(),
        title: meta.title.clone(),
        indexed_at: meta.indexed_at,
        title_length: meta.title_length,
        body_length: meta.body_length,
    }))
}

// --- Admin endpoints ---
async fn index_remove(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RemoveRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    let mut index = state.index.write();
    index.remove_document(&req.url);
    Ok(Json(serde_json::json!({ "removed": req.url, "urls": index.indexed_url_count() })))
}

async fn index_commit(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    let index = state.index.read();
    index
        .dump()
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    Ok(Json(serde_json::json!({ "committed": index.indexed_url_count() })))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
