use axum::{routing::get, Router};
use std::sync::Arc;

use super::handlers::{handle_click, health_check, RedirectState};

pub fn create_redirect_router(state: Arc<RedirectState>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/{keyword}", get(handle_click))
        .with_state(state)
}
