use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Shortlink {
    pub id: i64,
    pub keyword: String,
    pub target: String,
    pub title: String,
    pub owner: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateLinkRequest {
    pub url: String,
    /// Explicit keyword; omitted means "allocate one for me"
    pub keyword: Option<String>,
    /// Omitted or empty means "use the target page's title"
    pub title: Option<String>,
    pub owner: Option<String>,
}
