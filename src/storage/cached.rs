use crate::analytics::models::{LedgerEntry, NewVisitor, Visitor, VisitorClicks};
use crate::models::Shortlink;
use crate::storage::{PlaceKind, Storage, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Storage wrapper with a read cache for link lookups.
///
/// Only the immutable link rows are cached; counters, ledger entries, and the
/// keyword sequence always go to the database so every request sees current
/// state.
pub struct CachedStorage {
    inner: Arc<dyn Storage>,
    read_cache: Cache<String, Option<Shortlink>>,
}

impl CachedStorage {
    pub fn new(inner: Arc<dyn Storage>, max_cache_entries: u64, ttl_secs: u64) -> Self {
        let read_cache = Cache::builder()
            .max_capacity(max_cache_entries)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self { inner, read_cache }
    }
}

#[async_trait]
impl Storage for CachedStorage {
    async fn init(&self) -> Result<()> {
        self.inner.init().await
    }

    async fn create_link(
        &self,
        keyword: &str,
        target: &str,
        title: &str,
        owner: Option<&str>,
    ) -> StorageResult<Shortlink> {
        let link = self.inner.create_link(keyword, target, title, owner).await?;

        self.read_cache
            .insert(keyword.to_string(), Some(link.clone()))
            .await;

        Ok(link)
    }

    async fn get_link(&self, keyword: &str) -> Result<Option<Shortlink>> {
        if let Some(cached) = self.read_cache.get(keyword).await {
            return Ok(cached);
        }

        let link = self.inner.get_link(keyword).await?;

        self.read_cache
            .insert(keyword.to_string(), link.clone())
            .await;

        Ok(link)
    }

    async fn keyword_exists(&self, keyword: &str) -> Result<bool> {
        // Allocation correctness depends on a current answer, so this always
        // hits the database.
        self.inner.keyword_exists(keyword).await
    }

    async fn delete_link(&self, keyword: &str) -> Result<bool> {
        let deleted = self.inner.delete_link(keyword).await?;

        if deleted {
            self.read_cache.invalidate(keyword).await;
        }

        Ok(deleted)
    }

    async fn list_links(
        &self,
        limit: i64,
        offset: i64,
        owner: Option<&str>,
    ) -> Result<Vec<Shortlink>> {
        self.inner.list_links(limit, offset, owner).await
    }

    async fn next_keyword_id(&self) -> Result<i64> {
        self.inner.next_keyword_id().await
    }

    async fn resolve_place(&self, kind: PlaceKind, name: &str) -> Result<i64> {
        self.inner.resolve_place(kind, name).await
    }

    async fn find_visitor(&self, ip: &str) -> Result<Option<Visitor>> {
        self.inner.find_visitor(ip).await
    }

    async fn upsert_visitor(&self, visitor: &NewVisitor) -> Result<Visitor> {
        self.inner.upsert_visitor(visitor).await
    }

    async fn bump_ledger(&self, visitor_id: i64, link_id: i64) -> Result<LedgerEntry> {
        self.inner.bump_ledger(visitor_id, link_id).await
    }

    async fn append_visit_event(&self, ledger_id: i64, occurred_at: i64) -> Result<()> {
        self.inner.append_visit_event(ledger_id, occurred_at).await
    }

    async fn total_clicks(&self, link_id: i64) -> Result<i64> {
        self.inner.total_clicks(link_id).await
    }

    async fn unique_clicks(&self, link_id: i64) -> Result<i64> {
        self.inner.unique_clicks(link_id).await
    }

    async fn monthly_histogram(&self, link_id: i64) -> Result<[i64; 12]> {
        self.inner.monthly_histogram(link_id).await
    }

    async fn visitors_for_link(
        &self,
        link_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<VisitorClicks>> {
        self.inner.visitors_for_link(link_id, limit, offset).await
    }
}
