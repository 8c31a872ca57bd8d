use axum::{
    extract::{Path, Query, State},
    http::{header::HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::analytics::{LinkStats, StatsAggregator, VisitorClicks};
use crate::models::{CreateLinkRequest, Shortlink};
use crate::shortener::{ShortenError, ShortenerService};
use crate::storage::Storage;

pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub shortener: Arc<ShortenerService>,
    pub stats: StatsAggregator,
    pub public_host: Option<String>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    pub owner: Option<String>,
}

fn default_limit() -> i64 {
    50
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn shorten_error(err: ShortenError) -> ApiError {
    let status = match &err {
        ShortenError::EmptyKeyword => StatusCode::BAD_REQUEST,
        ShortenError::KeywordTaken => StatusCode::CONFLICT,
        ShortenError::AlreadyShortlink => StatusCode::UNPROCESSABLE_ENTITY,
        ShortenError::UnreachableTarget => StatusCode::UNPROCESSABLE_ENTITY,
        ShortenError::Other(inner) => {
            tracing::error!(error = %inner, "shortlink creation failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal server error");
        }
    };

    error_response(status, err.to_string())
}

impl AppState {
    /// Host used by the recursion guard: the request's Host header, falling
    /// back to the configured public host.
    fn request_host(&self, headers: &HeaderMap) -> String {
        headers
            .get("host")
            .and_then(|h| h.to_str().ok())
            .map(str::to_string)
            .or_else(|| self.public_host.clone())
            .unwrap_or_default()
    }
}

/// Create a shortlink. An explicit keyword in the payload selects the
/// validated flow; otherwise a keyword is allocated from the sequence.
pub async fn create_link(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateLinkRequest>,
) -> Result<(StatusCode, Json<Shortlink>), ApiError> {
    if payload.url.is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "URL cannot be empty",
        ));
    }

    let host = state.request_host(&headers);

    let result = match payload.keyword.as_deref() {
        Some(keyword) => {
            state
                .shortener
                .create_explicit(
                    keyword,
                    &payload.url,
                    payload.title.as_deref(),
                    payload.owner.as_deref(),
                    &host,
                )
                .await
        }
        None => {
            state
                .shortener
                .create_random(
                    &payload.url,
                    payload.title.as_deref(),
                    payload.owner.as_deref(),
                    &host,
                )
                .await
        }
    };

    match result {
        Ok(link) => Ok((StatusCode::CREATED, Json(link))),
        Err(err) => Err(shorten_error(err)),
    }
}

/// Get a shortlink by keyword
pub async fn get_link(
    State(state): State<Arc<AppState>>,
    Path(keyword): Path<String>,
) -> Result<Json<Shortlink>, ApiError> {
    match state.storage.get_link(&keyword).await {
        Ok(Some(link)) => Ok(Json(link)),
        Ok(None) => Err(error_response(StatusCode::NOT_FOUND, "link not found")),
        Err(err) => {
            tracing::error!(keyword = %keyword, error = %err, "link lookup failed");
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error",
            ))
        }
    }
}

/// List shortlinks, optionally filtered by owner
pub async fn list_links(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Shortlink>>, ApiError> {
    match state
        .storage
        .list_links(query.limit, query.offset, query.owner.as_deref())
        .await
    {
        Ok(links) => Ok(Json(links)),
        Err(err) => {
            tracing::error!(error = %err, "link listing failed");
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error",
            ))
        }
    }
}

/// Click statistics for one shortlink
pub async fn link_stats(
    State(state): State<Arc<AppState>>,
    Path(keyword): Path<String>,
) -> Result<Json<LinkStats>, ApiError> {
    let link = find_link(&state, &keyword).await?;

    match state.stats.stats_for(&link).await {
        Ok(stats) => Ok(Json(stats)),
        Err(err) => {
            tracing::error!(keyword = %keyword, error = %err, "stats query failed");
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error",
            ))
        }
    }
}

/// Visitors of one shortlink with their click counts
pub async fn link_visitors(
    State(state): State<Arc<AppState>>,
    Path(keyword): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<VisitorClicks>>, ApiError> {
    let link = find_link(&state, &keyword).await?;

    match state
        .stats
        .visitors_for(&link, query.limit, query.offset)
        .await
    {
        Ok(visitors) => Ok(Json(visitors)),
        Err(err) => {
            tracing::error!(keyword = %keyword, error = %err, "visitor listing failed");
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error",
            ))
        }
    }
}

/// Delete a shortlink; its ledger entries and visit events cascade away
pub async fn delete_link(
    State(state): State<Arc<AppState>>,
    Path(keyword): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    match state.storage.delete_link(&keyword).await {
        Ok(true) => Ok(Json(SuccessResponse {
            message: "link deleted".to_string(),
        })),
        Ok(false) => Err(error_response(StatusCode::NOT_FOUND, "link not found")),
        Err(err) => {
            tracing::error!(keyword = %keyword, error = %err, "link deletion failed");
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error",
            ))
        }
    }
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}

async fn find_link(state: &AppState, keyword: &str) -> Result<Shortlink, ApiError> {
    match state.storage.get_link(keyword).await {
        Ok(Some(link)) => Ok(link),
        Ok(None) => Err(error_response(StatusCode::NOT_FOUND, "link not found")),
        Err(err) => {
            tracing::error!(keyword = %keyword, error = %err, "link lookup failed");
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error",
            ))
        }
    }
}
