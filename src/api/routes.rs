use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use super::handlers::{
    create_link, delete_link, get_link, health_check, link_stats, link_visitors, list_links,
    AppState,
};

pub fn create_api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/links", post(create_link).get(list_links))
        .route("/api/links/{keyword}", get(get_link).delete(delete_link))
        .route("/api/links/{keyword}/stats", get(link_stats))
        .route("/api/links/{keyword}/visitors", get(link_visitors))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::StatsAggregator;
    use crate::shortener::{HttpProbe, ShortenerService};
    use crate::storage::{SqliteStorage, Storage};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::time::Duration;
    use tower::ServiceExt;

    async fn test_router() -> (Router, tempfile::TempDir) {
        let dir = tempfile::TempDir::new().unwrap();
        let url = format!("sqlite://{}", dir.path().join("test.db").display());

        let storage: Arc<dyn Storage> = Arc::new(SqliteStorage::new(&url, 1).await.unwrap());
        storage.init().await.unwrap();

        let probe = Arc::new(HttpProbe::new(Duration::from_secs(1)).unwrap());
        let shortener = Arc::new(ShortenerService::new(Arc::clone(&storage), probe));
        let stats = StatsAggregator::new(Arc::clone(&storage));

        let router = create_api_router(Arc::new(AppState {
            storage,
            shortener,
            stats,
            public_host: None,
        }));

        (router, dir)
    }

    #[tokio::test]
    async fn health_endpoint_responds() {
        let (router, _dir) = test_router().await;

        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_link_is_not_found() {
        let (router, _dir) = test_router().await;

        let response = router
            .oneshot(Request::get("/api/links/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
