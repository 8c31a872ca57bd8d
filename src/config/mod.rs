use anyhow::Context;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api_server: ServerConfig,
    pub redirect_server: ServerConfig,
    pub geo: GeoConfig,
    pub probe: ProbeConfig,
    pub cache: CacheConfig,
    /// Public host of this service, used as fallback when a creation request
    /// carries no Host header (guards against shortening our own links)
    pub public_host: Option<String>,
    /// CIDRs of proxies whose X-Forwarded-For entries are trusted
    pub trusted_proxies: Vec<IpNet>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeoProvider {
    None,
    Http,
    Mmdb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoConfig {
    pub provider: GeoProvider,
    /// Base URL of the ipstack-style HTTP provider
    pub api_url: String,
    pub api_key: Option<String>,
    /// Path to a MaxMind City .mmdb file
    pub mmdb_path: Option<String>,
    /// Upper bound on one resolution; recording proceeds with empty geo past it
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub max_entries: u64,
    pub ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend_str =
            std::env::var("DATABASE_BACKEND").unwrap_or_else(|_| "sqlite".to_string());

        let backend = match backend_str.to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            _ => DatabaseBackend::Sqlite,
        };

        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://./tautan.db".to_string());

        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()?;

        let api_host = std::env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let api_port = std::env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()?;

        let redirect_host =
            std::env::var("REDIRECT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let redirect_port = std::env::var("REDIRECT_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()?;

        let provider_str = std::env::var("GEO_PROVIDER").unwrap_or_else(|_| "none".to_string());
        let provider = match provider_str.to_lowercase().as_str() {
            "http" | "ipstack" => GeoProvider::Http,
            "mmdb" | "maxmind" => GeoProvider::Mmdb,
            "none" => GeoProvider::None,
            other => {
                tracing::warn!(
                    "Unknown GEO_PROVIDER '{other}', falling back to 'none'. Supported values: none, http, mmdb"
                );
                GeoProvider::None
            }
        };

        let api_url = std::env::var("GEO_API_URL")
            .unwrap_or_else(|_| "http://api.ipstack.com".to_string());
        let api_key = std::env::var("GEO_API_KEY").ok();

        let mmdb_path = std::env::var("GEO_MMDB_PATH").ok();
        if matches!(provider, GeoProvider::Mmdb) && mmdb_path.is_none() {
            anyhow::bail!("GEO_MMDB_PATH must be set when GEO_PROVIDER=mmdb");
        }

        let geo_timeout_ms = std::env::var("GEO_TIMEOUT_MS")
            .unwrap_or_else(|_| "1500".to_string())
            .parse::<u64>()?;

        let probe_timeout_ms = std::env::var("PROBE_TIMEOUT_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse::<u64>()?;

        let cache_max_entries = std::env::var("CACHE_MAX_ENTRIES")
            .unwrap_or_else(|_| "10000".to_string())
            .parse::<u64>()?;
        let cache_ttl_secs = std::env::var("CACHE_TTL_SECS")
            .unwrap_or_else(|_| "300".to_string())
            .parse::<u64>()?;

        let public_host = std::env::var("PUBLIC_HOST").ok();

        let trusted_proxies = match std::env::var("TRUSTED_PROXIES") {
            Ok(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<IpNet>()
                        .with_context(|| format!("invalid CIDR in TRUSTED_PROXIES: {s}"))
                })
                .collect::<anyhow::Result<Vec<_>>>()?,
            Err(_) => Vec::new(),
        };

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            api_server: ServerConfig {
                host: api_host,
                port: api_port,
            },
            redirect_server: ServerConfig {
                host: redirect_host,
                port: redirect_port,
            },
            geo: GeoConfig {
                provider,
                api_url,
                api_key,
                mmdb_path,
                timeout_ms: geo_timeout_ms,
            },
            probe: ProbeConfig {
                timeout_ms: probe_timeout_ms,
            },
            cache: CacheConfig {
                max_entries: cache_max_entries,
                ttl_secs: cache_ttl_secs,
            },
            public_host,
            trusted_proxies,
        })
    }
}
