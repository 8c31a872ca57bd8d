//! Visitor analytics
//!
//! Everything that happens after a redirect is served: client IP extraction,
//! geolocation, the per-(visitor, link) click ledger, and the read-side
//! aggregates. Recording is designed so that none of it can delay or fail a
//! visitor-facing redirect.

pub mod geo;
pub mod ip;
pub mod models;
pub mod recorder;
pub mod stats;

pub use geo::{GeoResolver, HttpGeoResolver, MmdbGeoResolver};
pub use ip::client_ip;
pub use models::{GeoLookup, LedgerEntry, NewVisitor, Visitor, VisitorClicks};
pub use recorder::VisitRecorder;
pub use stats::{LinkStats, StatsAggregator};
