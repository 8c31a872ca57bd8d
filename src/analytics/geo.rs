//! IP geolocation adapters
//!
//! The core consumes a [`GeoResolver`] and only cares about the result shape;
//! where the attributes come from is a deployment choice. Two adapters are
//! provided: an ipstack-style HTTP API client and a local MaxMind MMDB
//! reader. Resolver failures are never fatal to visit recording; callers
//! fall back to an empty [`GeoLookup`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use maxminddb::{geoip2, Mmap, Reader};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::analytics::models::GeoLookup;

#[async_trait]
pub trait GeoResolver: Send + Sync {
    /// Resolve geographic attributes for an IP address. Absent attributes
    /// are `None` in the result; an `Err` means the lookup itself failed.
    async fn resolve(&self, ip: IpAddr) -> Result<GeoLookup>;
}

/// ipstack-style HTTP geolocation client.
///
/// Queries `{base_url}/{ip}?access_key={key}` and deserializes the JSON
/// response straight into [`GeoLookup`]. The request is bounded by the
/// client timeout so a slow provider cannot stall recording.
pub struct HttpGeoResolver {
    client: reqwest::Client,
    base_url: String,
    access_key: Option<String>,
}

impl HttpGeoResolver {
    pub fn new(base_url: &str, access_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build geolocation HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_key,
        })
    }

    fn lookup_url(&self, ip: IpAddr) -> String {
        match &self.access_key {
            Some(key) => format!("{}/{}?access_key={}", self.base_url, ip, key),
            None => format!("{}/{}", self.base_url, ip),
        }
    }
}

#[async_trait]
impl GeoResolver for HttpGeoResolver {
    async fn resolve(&self, ip: IpAddr) -> Result<GeoLookup> {
        let response = self
            .client
            .get(self.lookup_url(ip))
            .send()
            .await
            .context("geolocation request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("geolocation provider returned {}", response.status());
        }

        let lookup = response
            .json::<GeoLookup>()
            .await
            .context("failed to decode geolocation response")?;

        Ok(lookup)
    }
}

/// MaxMind GeoLite2/GeoIP2 City database resolver.
pub struct MmdbGeoResolver {
    reader: Arc<Reader<Mmap>>,
}

impl MmdbGeoResolver {
    pub fn new(path: &str) -> Result<Self> {
        let reader = unsafe { Reader::open_mmap(path) }
            .with_context(|| format!("failed to open GeoIP database at {}", path))?;

        Ok(Self {
            reader: Arc::new(reader),
        })
    }

    fn lookup_sync(&self, ip: IpAddr) -> GeoLookup {
        let mut lookup = GeoLookup::default();

        if let Ok(result) = self.reader.lookup(ip) {
            if let Ok(Some(city)) = result.decode::<geoip2::City>() {
                lookup.city = city.city.names.english.map(|s| s.to_string());
                lookup.country_name = city.country.names.english.map(|s| s.to_string());
                lookup.continent_name = city.continent.names.english.map(|s| s.to_string());
                lookup.latitude = city.location.latitude;
                lookup.longitude = city.location.longitude;
            }
        }

        lookup
    }
}

#[async_trait]
impl GeoResolver for MmdbGeoResolver {
    async fn resolve(&self, ip: IpAddr) -> Result<GeoLookup> {
        Ok(self.lookup_sync(ip))
    }
}

impl Clone for MmdbGeoResolver {
    fn clone(&self) -> Self {
        Self {
            reader: self.reader.clone(),
        }
    }
}
