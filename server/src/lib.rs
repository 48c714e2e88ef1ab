use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use engine::boolean::BooleanEngine;
use engine::parser::parse;
use engine::ranked::RankedEngine;
use engine::{DocId, Index};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}

fn default_k() -> usize {
    10
}

#[derive(Deserialize)]
pub struct BooleanParams {
    pub q: String,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub score: f32,
}

#[derive(Serialize)]
pub struct BooleanResponse {
    pub query: String,
    pub took_s: f64,
    pub doc_ids: Vec<DocId>,
}

#[derive(Clone)]
pub struct AppState {
    pub index: Arc<Index>,
}

pub fn build_app(index_dir: &str) -> Result<Router> {
    // the index header is loaded once; each request opens its own
    // postings cursor
    let index = Index::open(index_dir)?;
    let state = AppState { index: Arc::new(index) };

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/boolean", get(boolean_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);
    Ok(app)
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    let start = Instant::now();
    let query = if params.q.contains('"') || params.q.contains("AND") {
        params.q.replace("AND", " ").replace('"', " ")
    } else {
        params.q.clone()
    };

    let mut engine = RankedEngine::new(&state.index).map_err(internal)?;
    let k = params.k.clamp(1, 100);
    let ranked = engine.rank(&query, Some(k)).map_err(internal)?;

    let results: Vec<SearchHit> = ranked
        .iter()
        .map(|s| SearchHit { doc_id: s.doc_id, score: s.score })
        .collect();
    Ok(Json(SearchResponse {
        query: params.q,
        took_s: start.elapsed().as_secs_f64(),
        total_hits: results.len(),
        results,
    }))
}

pub async fn boolean_handler(
    State(state): State<AppState>,
    Query(params): Query<BooleanParams>,
) -> Result<Json<BooleanResponse>, (StatusCode, String)> {
    let start = Instant::now();
    let postfix = parse(&params.q).map_err(bad_request)?;

    let mut engine = BooleanEngine::new(&state.index).map_err(internal)?;
    let doc_ids = engine.evaluate(&postfix).map_err(internal)?;

    Ok(Json(BooleanResponse {
        query: params.q,
        took_s: start.elapsed().as_secs_f64(),
        doc_ids,
    }))
}

fn internal(err: anyhow::Error) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

fn bad_request(err: anyhow::Error) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, err.to_string())
}
