//! Data models for visit analytics

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Geographic attributes for an IP address, as returned by a [`GeoResolver`].
///
/// Every field is optional; an absent attribute is a first-class `None`, not
/// a missing key. Field names follow the ipstack-style JSON payload so the
/// HTTP resolver can deserialize responses directly.
///
/// [`GeoResolver`]: crate::analytics::geo::GeoResolver
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeoLookup {
    pub city: Option<String>,
    pub country_name: Option<String>,
    pub continent_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// One distinct client, identified by IP address.
///
/// Geo references are resolved when the visitor is first seen and never
/// refreshed on later visits.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Visitor {
    pub id: i64,
    pub ip: String,
    pub city_id: Option<i64>,
    pub country_id: Option<i64>,
    pub continent_id: Option<i64>,
    pub latitude: f64,
    pub longitude: f64,
    pub first_seen_at: i64,
}

/// Insert payload for a visitor row.
#[derive(Debug, Clone)]
pub struct NewVisitor {
    pub ip: String,
    pub city_id: Option<i64>,
    pub country_id: Option<i64>,
    pub continent_id: Option<i64>,
    pub latitude: f64,
    pub longitude: f64,
    pub first_seen_at: i64,
}

/// The per-(visitor, link) click counter. At most one row per pair; `times`
/// starts at 1 and only ever increments.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LedgerEntry {
    pub id: i64,
    pub visitor_id: i64,
    pub link_id: i64,
    pub times: i64,
}

/// Read-side row for the per-link visitor listing.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct VisitorClicks {
    pub ip: String,
    pub city: Option<String>,
    pub country: Option<String>,
    pub times: i64,
}
