use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use tautan::analytics::{GeoResolver, HttpGeoResolver, MmdbGeoResolver, StatsAggregator, VisitRecorder};
use tautan::api::{create_api_router, AppState};
use tautan::config::{Config, DatabaseBackend, GeoProvider};
use tautan::redirect::{create_redirect_router, RedirectState};
use tautan::shortener::{HttpProbe, ShortenerService};
use tautan::storage::{CachedStorage, PostgresStorage, SqliteStorage, Storage};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::from_env()?;
    info!("Loaded configuration");

    let storage: Arc<dyn Storage> = match config.database.backend {
        DatabaseBackend::Sqlite => {
            info!("Using SQLite storage: {}", config.database.url);
            Arc::new(
                SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
            )
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL storage: {}", config.database.url);
            Arc::new(
                PostgresStorage::new(&config.database.url, config.database.max_connections)
                    .await?,
            )
        }
    };

    info!("Initializing database...");
    storage.init().await?;
    info!("Database initialized successfully");

    let storage: Arc<dyn Storage> = Arc::new(CachedStorage::new(
        storage,
        config.cache.max_entries,
        config.cache.ttl_secs,
    ));

    let geo_resolver: Option<Arc<dyn GeoResolver>> = match config.geo.provider {
        GeoProvider::None => {
            info!("Geolocation disabled - visits are recorded without geo attributes");
            None
        }
        GeoProvider::Http => {
            info!("Using HTTP geolocation provider: {}", config.geo.api_url);
            Some(Arc::new(HttpGeoResolver::new(
                &config.geo.api_url,
                config.geo.api_key.clone(),
                Duration::from_millis(config.geo.timeout_ms),
            )?))
        }
        GeoProvider::Mmdb => {
            let path = config
                .geo
                .mmdb_path
                .as_deref()
                .context("GEO_MMDB_PATH must be set when GEO_PROVIDER=mmdb")?;
            info!("Using MaxMind geolocation database: {}", path);
            Some(Arc::new(MmdbGeoResolver::new(path)?))
        }
    };

    let recorder = Arc::new(VisitRecorder::new(Arc::clone(&storage)));
    let probe = Arc::new(HttpProbe::new(Duration::from_millis(config.probe.timeout_ms))?);
    let shortener = Arc::new(ShortenerService::new(Arc::clone(&storage), probe));
    let stats = StatsAggregator::new(Arc::clone(&storage));

    let api_router = create_api_router(Arc::new(AppState {
        storage: Arc::clone(&storage),
        shortener,
        stats,
        public_host: config.public_host.clone(),
    }));

    let redirect_router = create_redirect_router(Arc::new(RedirectState {
        storage: Arc::clone(&storage),
        recorder,
        geo_resolver,
        geo_timeout: Duration::from_millis(config.geo.timeout_ms),
        trusted_proxies: config.trusted_proxies.clone(),
    }));

    let api_addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr).await?;
    info!("🚀 API server listening on http://{}", api_addr);

    let redirect_addr = format!(
        "{}:{}",
        config.redirect_server.host, config.redirect_server.port
    );
    let redirect_listener = tokio::net::TcpListener::bind(&redirect_addr).await?;
    info!("🚀 Redirect server listening on http://{}", redirect_addr);

    tokio::try_join!(
        axum::serve(api_listener, api_router),
        axum::serve(
            redirect_listener,
            redirect_router.into_make_service_with_connect_info::<SocketAddr>(),
        ),
    )?;

    Ok(())
}
