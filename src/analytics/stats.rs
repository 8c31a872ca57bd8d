//! Read-side click statistics

use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;

use crate::analytics::models::VisitorClicks;
use crate::models::Shortlink;
use crate::storage::Storage;

#[derive(Debug, Clone, Serialize)]
pub struct LinkStats {
    /// Sum of ledger counters: every recorded click
    pub total_clicks: i64,
    /// Number of distinct visitors
    pub unique_clicks: i64,
    /// Visit events per calendar month, January first, all years combined
    pub monthly_clicks: [i64; 12],
}

pub struct StatsAggregator {
    storage: Arc<dyn Storage>,
}

impl StatsAggregator {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn stats_for(&self, link: &Shortlink) -> Result<LinkStats> {
        let total_clicks = self.storage.total_clicks(link.id).await?;
        let unique_clicks = self.storage.unique_clicks(link.id).await?;
        let monthly_clicks = self.storage.monthly_histogram(link.id).await?;

        Ok(LinkStats {
            total_clicks,
            unique_clicks,
            monthly_clicks,
        })
    }

    pub async fn visitors_for(
        &self,
        link: &Shortlink,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<VisitorClicks>> {
        self.storage.visitors_for_link(link.id, limit, offset).await
    }
}
