//! Visit recording
//!
//! Per (visitor, link) pair the ledger moves Unseen -> first visit
//! (times = 1) -> repeat visits (times += 1), and every call appends exactly
//! one timestamped visit event. All uniqueness is enforced by database
//! constraints, so concurrent visits from the same new IP converge on one
//! visitor row and one ledger entry.

use anyhow::Result;
use std::net::IpAddr;
use std::sync::Arc;

use crate::analytics::models::{GeoLookup, LedgerEntry, NewVisitor, Visitor};
use crate::models::Shortlink;
use crate::storage::{PlaceKind, Storage};

pub struct VisitRecorder {
    storage: Arc<dyn Storage>,
}

impl VisitRecorder {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Record one visit: resolve or create the visitor, bump the ledger,
    /// append a visit event. Never skips a step: a repeat visit touches one
    /// row, a first visit from a new IP may create up to six.
    pub async fn record_visit(
        &self,
        link: &Shortlink,
        ip: IpAddr,
        geo: &GeoLookup,
    ) -> Result<LedgerEntry> {
        let visitor = self.resolve_visitor(ip, geo).await?;

        let entry = self.storage.bump_ledger(visitor.id, link.id).await?;
        self.storage
            .append_visit_event(entry.id, chrono::Utc::now().timestamp())
            .await?;

        Ok(entry)
    }

    /// Reuse the visitor row for this IP, or create it from the supplied geo
    /// attributes. Geo is captured once at first sight; an existing visitor
    /// is returned as-is even if today's lookup disagrees.
    async fn resolve_visitor(&self, ip: IpAddr, geo: &GeoLookup) -> Result<Visitor> {
        let ip = ip.to_string();

        if let Some(visitor) = self.storage.find_visitor(&ip).await? {
            return Ok(visitor);
        }

        let city_id = self.resolve_place(PlaceKind::City, geo.city.as_deref()).await?;
        let country_id = self
            .resolve_place(PlaceKind::Country, geo.country_name.as_deref())
            .await?;
        let continent_id = self
            .resolve_place(PlaceKind::Continent, geo.continent_name.as_deref())
            .await?;

        self.storage
            .upsert_visitor(&NewVisitor {
                ip,
                city_id,
                country_id,
                continent_id,
                latitude: geo.latitude.unwrap_or(0.0),
                longitude: geo.longitude.unwrap_or(0.0),
                first_seen_at: chrono::Utc::now().timestamp(),
            })
            .await
    }

    async fn resolve_place(&self, kind: PlaceKind, name: Option<&str>) -> Result<Option<i64>> {
        match name {
            Some(name) if !name.is_empty() => {
                Ok(Some(self.storage.resolve_place(kind, name).await?))
            }
            _ => Ok(None),
        }
    }
}
