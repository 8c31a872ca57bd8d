use axum::{
    extract::{ConnectInfo, Path, State},
    http::{header::HeaderMap, StatusCode},
    response::{IntoResponse, Redirect},
    Json,
};
use ipnet::IpNet;
use serde::Serialize;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use crate::analytics::{client_ip, GeoLookup, GeoResolver, VisitRecorder};
use crate::models::Shortlink;
use crate::storage::Storage;

pub struct RedirectState {
    pub storage: Arc<dyn Storage>,
    pub recorder: Arc<VisitRecorder>,
    pub geo_resolver: Option<Arc<dyn GeoResolver>>,
    pub geo_timeout: Duration,
    pub trusted_proxies: Vec<IpNet>,
}

/// Redirect to the shortlink target, recording the visit off the hot path.
pub async fn handle_click(
    State(state): State<Arc<RedirectState>>,
    Path(keyword): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let link = match state.storage.get_link(&keyword).await {
        Ok(Some(link)) => link,
        Ok(None) => return (StatusCode::NOT_FOUND, "link not found").into_response(),
        Err(err) => {
            tracing::error!(keyword = %keyword, error = %err, "link lookup failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response();
        }
    };

    let ip = client_ip(&headers, addr.ip(), &state.trusted_proxies);

    // Analytics must never delay the visitor, so geo resolution and ledger
    // updates run after the redirect is already on the wire.
    let task_state = Arc::clone(&state);
    let task_link = link.clone();
    tokio::spawn(async move {
        record_visit(task_state, task_link, ip).await;
    });

    Redirect::temporary(&link.target).into_response()
}

async fn record_visit(state: Arc<RedirectState>, link: Shortlink, ip: IpAddr) {
    let geo = match &state.geo_resolver {
        Some(resolver) => {
            match tokio::time::timeout(state.geo_timeout, resolver.resolve(ip)).await {
                Ok(Ok(lookup)) => lookup,
                Ok(Err(err)) => {
                    tracing::warn!(ip = %ip, error = %err, "geo resolution failed, recording without geo");
                    GeoLookup::default()
                }
                Err(_) => {
                    tracing::warn!(ip = %ip, "geo resolution timed out, recording without geo");
                    GeoLookup::default()
                }
            }
        }
        None => GeoLookup::default(),
    };

    if let Err(err) = state.recorder.record_visit(&link, ip, &geo).await {
        tracing::warn!(keyword = %link.keyword, ip = %ip, error = %err, "failed to record visit");
    }
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    #[derive(Serialize)]
    struct HealthResponse {
        status: String,
    }

    Json(HealthResponse {
        status: "OK".to_string(),
    })
}
