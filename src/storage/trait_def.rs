use crate::analytics::models::{LedgerEntry, NewVisitor, Visitor, VisitorClicks};
use crate::models::Shortlink;
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("keyword already exists")]
    Conflict,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Deduplicated geo lookup tables, keyed by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceKind {
    City,
    Country,
    Continent,
}

impl PlaceKind {
    pub fn table(&self) -> &'static str {
        match self {
            PlaceKind::City => "cities",
            PlaceKind::Country => "countries",
            PlaceKind::Continent => "continents",
        }
    }
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables, seed the keyword sequence)
    async fn init(&self) -> Result<()>;

    /// Create a shortlink. Keyword uniqueness is enforced by the database;
    /// a duplicate surfaces as `StorageError::Conflict`, never an overwrite.
    async fn create_link(
        &self,
        keyword: &str,
        target: &str,
        title: &str,
        owner: Option<&str>,
    ) -> StorageResult<Shortlink>;

    /// Get a shortlink by keyword
    async fn get_link(&self, keyword: &str) -> Result<Option<Shortlink>>;

    /// Check whether a keyword is taken
    async fn keyword_exists(&self, keyword: &str) -> Result<bool>;

    /// Delete a shortlink; its ledger entries and visit events go with it
    async fn delete_link(&self, keyword: &str) -> Result<bool>;

    /// List shortlinks, newest first, optionally filtered by owner
    async fn list_links(
        &self,
        limit: i64,
        offset: i64,
        owner: Option<&str>,
    ) -> Result<Vec<Shortlink>>;

    /// Atomically advance the keyword sequence counter and return the
    /// pre-increment value. Safe against concurrent callers and across
    /// service instances: the increment is a single UPDATE on one row.
    async fn next_keyword_id(&self) -> Result<i64>;

    /// Find-or-create a geo place row by name, returning its id. Rows are
    /// deduplicated by a UNIQUE(name) constraint, so concurrent resolvers of
    /// the same name converge on one row.
    async fn resolve_place(&self, kind: PlaceKind, name: &str) -> Result<i64>;

    /// Find a visitor by IP
    async fn find_visitor(&self, ip: &str) -> Result<Option<Visitor>>;

    /// Insert a visitor if the IP is new, then return the row for that IP.
    /// A concurrent insert of the same IP is not an error; the loser simply
    /// reads back the winner's row.
    async fn upsert_visitor(&self, visitor: &NewVisitor) -> Result<Visitor>;

    /// Upsert the (visitor, link) ledger entry: first visit creates it with
    /// times = 1, every later visit increments times. Single statement, so
    /// concurrent visits from one visitor never create two rows.
    async fn bump_ledger(&self, visitor_id: i64, link_id: i64) -> Result<LedgerEntry>;

    /// Append one visit event to a ledger entry. Events are append-only.
    async fn append_visit_event(&self, ledger_id: i64, occurred_at: i64) -> Result<()>;

    /// Sum of `times` across the link's ledger entries
    async fn total_clicks(&self, link_id: i64) -> Result<i64>;

    /// Number of distinct visitors with a ledger entry for the link
    async fn unique_clicks(&self, link_id: i64) -> Result<i64>;

    /// Visit events per calendar month (January first), across all years
    async fn monthly_histogram(&self, link_id: i64) -> Result<[i64; 12]>;

    /// Visitors of a link with their click counts, most recent pair first
    async fn visitors_for_link(
        &self,
        link_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<VisitorClicks>>;
}
