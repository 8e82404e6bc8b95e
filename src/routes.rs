use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::config::SortTiebreak;
use crate::db::{Article, Database};
use crate::fetcher::Fetcher;

pub struct AppState {
    pub db: Arc<Database>,
    pub fetcher: Arc<Fetcher>,
    pub sort_tiebreak: SortTiebreak,
    pub shuffle_results: bool,
}

/// Error taxonomy surfaced to API callers. Client mistakes (missing field,
/// unknown article) map to 4xx, everything else to 500.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("no article matches the given link")]
    ArticleNotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::MissingField(_) => StatusCode::BAD_REQUEST,
            ApiError::ArticleNotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Serialize)]
pub struct FetchResponse {
    pub inserted: u64,
    pub skipped: bool,
}

#[derive(Serialize)]
pub struct FetchStatusResponse {
    pub fetching: bool,
}

#[derive(Deserialize)]
pub struct TrackViewRequest {
    pub link: Option<String>,
}

// Route handlers

/// All stored articles, most viewed first. When `shuffle_results` is set
/// the sorted list is shuffled before returning, trading the ordering for
/// display variety.
pub async fn get_news(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Article>>, ApiError> {
    let mut articles = state.db.list_articles(state.sort_tiebreak).await?;

    if state.shuffle_results {
        articles.shuffle(&mut rand::thread_rng());
    }

    Ok(Json(articles))
}

/// Run a fetch cycle and report how many articles were newly stored. When
/// a cycle is already in flight nothing is fetched and the response carries
/// `skipped: true` instead of a (meaningless) zero count.
pub async fn fetch_news(
    State(state): State<Arc<AppState>>,
) -> Result<Json<FetchResponse>, ApiError> {
    match state.fetcher.run_fetch_cycle().await? {
        Some(inserted) => Ok(Json(FetchResponse {
            inserted,
            skipped: false,
        })),
        None => Ok(Json(FetchResponse {
            inserted: 0,
            skipped: true,
        })),
    }
}

pub async fn fetch_status(
    State(state): State<Arc<AppState>>,
) -> Json<FetchStatusResponse> {
    Json(FetchStatusResponse {
        fetching: state.fetcher.is_fetching().await,
    })
}

/// Record one view of the article identified by its link.
pub async fn track_view(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TrackViewRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let link = request
        .link
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .ok_or(ApiError::MissingField("link"))?;

    if state.db.increment_view(link).await? {
        Ok(Json(json!({ "success": true })))
    } else {
        Err(ApiError::ArticleNotFound)
    }
}

pub async fn health() -> impl IntoResponse {
    "OK"
}
