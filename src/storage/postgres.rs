use crate::analytics::models::{LedgerEntry, NewVisitor, Visitor, VisitorClicks};
use crate::models::Shortlink;
use crate::storage::{PlaceKind, Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS links (
                id BIGSERIAL PRIMARY KEY,
                keyword TEXT NOT NULL UNIQUE,
                target TEXT NOT NULL,
                title TEXT NOT NULL DEFAULT '',
                owner TEXT,
                created_at BIGINT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_links_owner ON links(owner)")
            .execute(self.pool.as_ref())
            .await?;

        for table in ["cities", "countries", "continents"] {
            sqlx::query(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    id BIGSERIAL PRIMARY KEY,
                    name TEXT NOT NULL UNIQUE
                )
                "#
            ))
            .execute(self.pool.as_ref())
            .await?;
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS visitors (
                id BIGSERIAL PRIMARY KEY,
                ip TEXT NOT NULL UNIQUE,
                city_id BIGINT REFERENCES cities(id) ON DELETE SET NULL,
                country_id BIGINT REFERENCES countries(id) ON DELETE SET NULL,
                continent_id BIGINT REFERENCES continents(id) ON DELETE SET NULL,
                latitude DOUBLE PRECISION NOT NULL DEFAULT 0,
                longitude DOUBLE PRECISION NOT NULL DEFAULT 0,
                first_seen_at BIGINT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS clicks (
                id BIGSERIAL PRIMARY KEY,
                visitor_id BIGINT NOT NULL REFERENCES visitors(id) ON DELETE CASCADE,
                link_id BIGINT NOT NULL REFERENCES links(id) ON DELETE CASCADE,
                times BIGINT NOT NULL DEFAULT 1,
                UNIQUE (visitor_id, link_id)
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_clicks_link ON clicks(link_id)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS click_events (
                id BIGSERIAL PRIMARY KEY,
                click_id BIGINT NOT NULL REFERENCES clicks(id) ON DELETE CASCADE,
                occurred_at BIGINT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_click_events_click ON click_events(click_id)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS keyword_sequence (
                id BIGINT PRIMARY KEY CHECK (id = 1),
                value BIGINT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            INSERT INTO keyword_sequence (id, value)
            VALUES (1, 1)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn create_link(
        &self,
        keyword: &str,
        target: &str,
        title: &str,
        owner: Option<&str>,
    ) -> StorageResult<Shortlink> {
        let created_at = chrono::Utc::now().timestamp();

        let link = sqlx::query_as::<_, Shortlink>(
            r#"
            INSERT INTO links (keyword, target, title, owner, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (keyword) DO NOTHING
            RETURNING id, keyword, target, title, owner, created_at
            "#,
        )
        .bind(keyword)
        .bind(target)
        .bind(title)
        .bind(owner)
        .bind(created_at)
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        link.ok_or(StorageError::Conflict)
    }

    async fn get_link(&self, keyword: &str) -> Result<Option<Shortlink>> {
        let link = sqlx::query_as::<_, Shortlink>(
            r#"
            SELECT id, keyword, target, title, owner, created_at
            FROM links
            WHERE keyword = $1
            "#,
        )
        .bind(keyword)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(link)
    }

    async fn keyword_exists(&self, keyword: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM links WHERE keyword = $1")
            .bind(keyword)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count > 0)
    }

    async fn delete_link(&self, keyword: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM links WHERE keyword = $1")
            .bind(keyword)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_links(
        &self,
        limit: i64,
        offset: i64,
        owner: Option<&str>,
    ) -> Result<Vec<Shortlink>> {
        let links = if let Some(owner) = owner {
            sqlx::query_as::<_, Shortlink>(
                r#"
                SELECT id, keyword, target, title, owner, created_at
                FROM links
                WHERE owner = $1
                ORDER BY created_at DESC, keyword
                LIMIT $2 OFFSET $3
                "#,
            )
            .bind(owner)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool.as_ref())
            .await?
        } else {
            sqlx::query_as::<_, Shortlink>(
                r#"
                SELECT id, keyword, target, title, owner, created_at
                FROM links
                ORDER BY created_at DESC, keyword
                LIMIT $1 OFFSET $2
                "#,
            )
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool.as_ref())
            .await?
        };

        Ok(links)
    }

    async fn next_keyword_id(&self) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            UPDATE keyword_sequence
            SET value = value + 1
            WHERE id = 1
            RETURNING value - 1
            "#,
        )
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(id)
    }

    async fn resolve_place(&self, kind: PlaceKind, name: &str) -> Result<i64> {
        let table = kind.table();

        sqlx::query(&format!(
            "INSERT INTO {table} (name) VALUES ($1) ON CONFLICT (name) DO NOTHING"
        ))
        .bind(name)
        .execute(self.pool.as_ref())
        .await?;

        let id: i64 = sqlx::query_scalar(&format!("SELECT id FROM {table} WHERE name = $1"))
            .bind(name)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(id)
    }

    async fn find_visitor(&self, ip: &str) -> Result<Option<Visitor>> {
        let visitor = sqlx::query_as::<_, Visitor>(
            r#"
            SELECT id, ip, city_id, country_id, continent_id,
                   latitude, longitude, first_seen_at
            FROM visitors
            WHERE ip = $1
            "#,
        )
        .bind(ip)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(visitor)
    }

    async fn upsert_visitor(&self, visitor: &NewVisitor) -> Result<Visitor> {
        sqlx::query(
            r#"
            INSERT INTO visitors (ip, city_id, country_id, continent_id,
                                  latitude, longitude, first_seen_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (ip) DO NOTHING
            "#,
        )
        .bind(&visitor.ip)
        .bind(visitor.city_id)
        .bind(visitor.country_id)
        .bind(visitor.continent_id)
        .bind(visitor.latitude)
        .bind(visitor.longitude)
        .bind(visitor.first_seen_at)
        .execute(self.pool.as_ref())
        .await?;

        let row = sqlx::query_as::<_, Visitor>(
            r#"
            SELECT id, ip, city_id, country_id, continent_id,
                   latitude, longitude, first_seen_at
            FROM visitors
            WHERE ip = $1
            "#,
        )
        .bind(&visitor.ip)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(row)
    }

    async fn bump_ledger(&self, visitor_id: i64, link_id: i64) -> Result<LedgerEntry> {
        let entry = sqlx::query_as::<_, LedgerEntry>(
            r#"
            INSERT INTO clicks (visitor_id, link_id, times)
            VALUES ($1, $2, 1)
            ON CONFLICT (visitor_id, link_id) DO UPDATE SET times = clicks.times + 1
            RETURNING id, visitor_id, link_id, times
            "#,
        )
        .bind(visitor_id)
        .bind(link_id)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(entry)
    }

    async fn append_visit_event(&self, ledger_id: i64, occurred_at: i64) -> Result<()> {
        sqlx::query("INSERT INTO click_events (click_id, occurred_at) VALUES ($1, $2)")
            .bind(ledger_id)
            .bind(occurred_at)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn total_clicks(&self, link_id: i64) -> Result<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(times), 0)::BIGINT FROM clicks WHERE link_id = $1",
        )
        .bind(link_id)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(total)
    }

    async fn unique_clicks(&self, link_id: i64) -> Result<i64> {
        let unique: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clicks WHERE link_id = $1")
            .bind(link_id)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(unique)
    }

    async fn monthly_histogram(&self, link_id: i64) -> Result<[i64; 12]> {
        let rows = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT EXTRACT(MONTH FROM to_timestamp(e.occurred_at))::BIGINT AS month,
                   COUNT(*) AS total
            FROM click_events e
            JOIN clicks c ON c.id = e.click_id
            WHERE c.link_id = $1
            GROUP BY month
            "#,
        )
        .bind(link_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        let mut histogram = [0i64; 12];
        for (month, total) in rows {
            if (1..=12).contains(&month) {
                histogram[(month - 1) as usize] = total;
            }
        }

        Ok(histogram)
    }

    async fn visitors_for_link(
        &self,
        link_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<VisitorClicks>> {
        let rows = sqlx::query_as::<_, VisitorClicks>(
            r#"
            SELECT v.ip, ci.name AS city, co.name AS country, c.times
            FROM clicks c
            JOIN visitors v ON v.id = c.visitor_id
            LEFT JOIN cities ci ON ci.id = v.city_id
            LEFT JOIN countries co ON co.id = v.country_id
            WHERE c.link_id = $1
            ORDER BY c.id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(link_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows)
    }
}
