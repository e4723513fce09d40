//! Position resolution with a cached-fix fallback.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use reqwest::Client;
use serde::Deserialize;

use crate::cache::PositionCache;
use crate::types::{LocationError, Position, PositionOptions};

/// A live geolocation source.
#[async_trait]
pub trait Geolocator: Send + Sync {
    /// Obtain the current position. Implementations may return a fix they
    /// already hold when it is younger than `options.maximum_age`.
    async fn current_position(&self, options: PositionOptions) -> Result<Position, LocationError>;
}

/// Resolves a position for a weather lookup, tolerating transient failure.
///
/// One live attempt per call, bounded by `options.timeout`. A successful fix
/// replaces the cached position; a failed one falls back to it. Overlapping
/// calls are independent and the last successful writer owns the cache.
pub struct GeolocationResolver {
    geolocator: Arc<dyn Geolocator>,
    cache: PositionCache,
    options: PositionOptions,
}

impl GeolocationResolver {
    pub fn new(geolocator: Arc<dyn Geolocator>, cache: PositionCache) -> Self {
        Self::with_options(geolocator, cache, PositionOptions::default())
    }

    pub fn with_options(
        geolocator: Arc<dyn Geolocator>,
        cache: PositionCache,
        options: PositionOptions,
    ) -> Self {
        Self {
            geolocator,
            cache,
            options,
        }
    }

    /// Resolve a position, or `None` when live resolution fails and nothing
    /// is cached.
    pub async fn resolve(&self) -> Option<Position> {
        let attempt = tokio::time::timeout(
            self.options.timeout,
            self.geolocator.current_position(self.options),
        )
        .await
        .unwrap_or(Err(LocationError::Timeout));

        match attempt {
            Ok(position) => {
                tracing::debug!(
                    "Resolved position {:.4}, {:.4}",
                    position.latitude,
                    position.longitude
                );
                self.cache.store(&position);
                Some(position)
            }
            Err(e) => match self.cache.load() {
                Some(cached) => {
                    tracing::info!("Geolocation failed ({}), using cached position", e);
                    Some(cached)
                }
                None => {
                    tracing::warn!("Geolocation failed ({}) and no cached position", e);
                    None
                }
            },
        }
    }
}

impl std::fmt::Debug for GeolocationResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeolocationResolver")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Always reports the same configured position.
#[derive(Debug, Clone, Copy)]
pub struct FixedGeolocator {
    latitude: f64,
    longitude: f64,
}

impl FixedGeolocator {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

#[async_trait]
impl Geolocator for FixedGeolocator {
    async fn current_position(&self, _options: PositionOptions) -> Result<Position, LocationError> {
        Ok(Position::now(self.latitude, self.longitude))
    }
}

/// A source with no live fixes; resolution always falls back to the cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableGeolocator;

#[async_trait]
impl Geolocator for UnavailableGeolocator {
    async fn current_position(&self, _options: PositionOptions) -> Result<Position, LocationError> {
        Err(LocationError::ServiceUnavailable)
    }
}

const USER_AGENT: &str = "HappyMac/0.1.0";

#[derive(Debug, Deserialize)]
struct IpLookupResponse {
    status: Option<String>,
    message: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

/// Approximate position from the host's public IP address.
///
/// Keeps its last fix and hands it back while it is younger than the
/// request's `maximum_age`, the way a platform location service would.
#[derive(Debug)]
pub struct IpGeolocator {
    client: Client,
    lookup_url: String,
    last_fix: Mutex<Option<Position>>,
}

impl IpGeolocator {
    pub fn new(lookup_url: impl Into<String>) -> Result<Self, LocationError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| LocationError::Other(format!("Failed to create lookup client: {}", e)))?;

        Ok(Self {
            client,
            lookup_url: lookup_url.into(),
            last_fix: Mutex::new(None),
        })
    }

    fn fresh_fix(&self, maximum_age: Duration) -> Option<Position> {
        let last = *self.last_fix.lock();
        last.filter(|p| p.is_fresh(maximum_age, Utc::now()))
    }
}

#[async_trait]
impl Geolocator for IpGeolocator {
    async fn current_position(&self, options: PositionOptions) -> Result<Position, LocationError> {
        if let Some(fix) = self.fresh_fix(options.maximum_age) {
            tracing::debug!("Reusing IP fix from {}", fix.timestamp);
            return Ok(fix);
        }

        let response = self
            .client
            .get(&self.lookup_url)
            .timeout(options.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LocationError::Timeout
                } else {
                    tracing::debug!("IP lookup request failed: {}", e);
                    LocationError::ServiceUnavailable
                }
            })?;

        if !response.status().is_success() {
            return Err(LocationError::Other(format!(
                "IP lookup returned status {}",
                response.status()
            )));
        }

        let body: IpLookupResponse = response
            .json()
            .await
            .map_err(|e| LocationError::Other(format!("IP lookup parse error: {}", e)))?;

        if body.status.as_deref() == Some("fail") {
            return Err(LocationError::Other(
                body.message.unwrap_or_else(|| "IP lookup failed".to_string()),
            ));
        }

        let (latitude, longitude) = match (body.lat, body.lon) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => return Err(LocationError::Other("IP lookup returned no coordinates".into())),
        };

        let position = Position::now(latitude, longitude);
        *self.last_fix.lock() = Some(position);
        Ok(position)
    }
}
