// Remote Catalog Client: HTTP access to the hotel collection endpoint.
// The remote catalog is the source of truth; callers only touch local state after
// one of these calls has confirmed success.

use crate::hotel::{normalize_records, Hotel, HotelId, RawHotel};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{StatusCode, Url};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_AVAILABILITY_FIELD: &str = "roomsAvailable";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Hotel {0} not found")]
    NotFound(HotelId),
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Initialization error: {0}")]
    InitError(String),
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    // Collection lives at `{base_url}/hotels`
    pub base_url: String,
    // None leaves timeouts to the transport
    pub timeout_ms: Option<u64>,
    // Field name the server expects in PATCH bodies
    pub availability_field: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: None,
            availability_field: DEFAULT_AVAILABILITY_FIELD.to_string(),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ClientStats {
    pub requests_sent: usize,
    pub requests_succeeded: usize,
    pub requests_failed: usize,
    pub requests_not_found: usize,
    pub average_response_time_ms: f64,
    pub max_response_time_ms: f64,
}

impl ClientStats {
    fn record<T>(&mut self, elapsed: Duration, result: &Result<T, CatalogError>) {
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        self.requests_sent += 1;
        match result {
            Ok(_) => self.requests_succeeded += 1,
            Err(CatalogError::NotFound(_)) => {
                self.requests_failed += 1;
                self.requests_not_found += 1;
            }
            Err(CatalogError::NetworkError(_)) => self.requests_failed += 1,
        }

        let n = self.requests_sent as f64;
        self.average_response_time_ms += (elapsed_ms - self.average_response_time_ms) / n;
        self.max_response_time_ms = self.max_response_time_ms.max(elapsed_ms);
    }
}

#[async_trait]
pub trait CatalogClient: Send + Sync + 'static {
    // Full catalog in server order, already normalized
    async fn list_hotels(&self) -> Result<Vec<Hotel>, CatalogError>;

    // Set the room count of one hotel; returns the server's updated record
    async fn patch_availability(
        &self,
        id: &HotelId,
        rooms_available: u32,
    ) -> Result<Hotel, CatalogError>;

    async fn delete_hotel(&self, id: &HotelId) -> Result<(), CatalogError>;

    fn stats(&self) -> ClientStats;
}

/// [`CatalogClient`] backed by a JSON REST endpoint.
///
/// * `GET {base}/hotels`
/// * `PATCH {base}/hotels/{id}` with `{ "<availability_field>": n }`
/// * `DELETE {base}/hotels/{id}`
///
/// No retries: a failure is reported to the caller as-is.
pub struct HttpCatalogClient {
    client: reqwest::Client,
    base_url: Url,
    availability_field: String,
    stats: Mutex<ClientStats>,
}

impl HttpCatalogClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            ClientError::ConfigError(format!("invalid base url '{}': {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::ConfigError(format!(
                "base url '{}' cannot carry a path",
                config.base_url
            )));
        }
        if config.availability_field.trim().is_empty() {
            return Err(ClientError::ConfigError(
                "availability field name must not be empty".to_string(),
            ));
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout_ms) = config.timeout_ms {
            builder = builder.timeout(Duration::from_millis(timeout_ms));
        }
        let client = builder
            .build()
            .map_err(|e| ClientError::InitError(e.to_string()))?;

        info!(base_url = %base_url, "Catalog client ready");
        Ok(Self {
            client,
            base_url,
            availability_field: config.availability_field,
            stats: Mutex::new(ClientStats::default()),
        })
    }

    fn endpoint(&self, id: Option<&HotelId>) -> Url {
        let mut url = self.base_url.clone();
        // Checked in `new`: the base url can always carry path segments
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("hotels");
            if let Some(id) = id {
                segments.push(&id.to_string());
            }
        }
        url
    }

    fn record<T>(&self, started: Instant, result: &Result<T, CatalogError>) {
        self.stats.lock().record(started.elapsed(), result);
    }

    async fn fetch_hotels(&self) -> Result<Vec<Hotel>, CatalogError> {
        let url = self.endpoint(None);
        debug!(%url, "Fetching hotel catalog");

        let response = self.client.get(url).send().await.map_err(transport_error)?;
        let response = ensure_success(response, None).await?;
        let values: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| CatalogError::NetworkError(format!("invalid catalog body: {}", e)))?;

        let (hotels, dropped) = normalize_records(values, "remote catalog");
        if dropped > 0 {
            warn!(dropped, kept = hotels.len(), "Catalog contained unusable records");
        }
        Ok(hotels)
    }

    async fn send_patch(&self, id: &HotelId, rooms_available: u32) -> Result<Hotel, CatalogError> {
        let url = self.endpoint(Some(id));
        let mut body = serde_json::Map::new();
        body.insert(
            self.availability_field.clone(),
            serde_json::Value::from(rooms_available),
        );
        debug!(%url, hotel_id = %id, rooms_available, "Patching availability");

        let response = self
            .client
            .patch(url)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let response = ensure_success(response, Some(id)).await?;
        let raw: RawHotel = response
            .json()
            .await
            .map_err(|e| CatalogError::NetworkError(format!("invalid hotel body: {}", e)))?;
        let updated = Hotel::from_patch_reply(raw, &self.availability_field)
            .map_err(|e| CatalogError::NetworkError(format!("invalid hotel body: {}", e)))?;

        if updated.id != *id {
            return Err(CatalogError::NetworkError(format!(
                "server answered for hotel {} when hotel {} was patched",
                updated.id, id
            )));
        }
        Ok(updated)
    }

    async fn send_delete(&self, id: &HotelId) -> Result<(), CatalogError> {
        let url = self.endpoint(Some(id));
        debug!(%url, hotel_id = %id, "Deleting hotel");

        let response = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(transport_error)?;
        ensure_success(response, Some(id)).await?;
        Ok(())
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn list_hotels(&self) -> Result<Vec<Hotel>, CatalogError> {
        let started = Instant::now();
        let result = self.fetch_hotels().await;
        self.record(started, &result);
        result
    }

    async fn patch_availability(
        &self,
        id: &HotelId,
        rooms_available: u32,
    ) -> Result<Hotel, CatalogError> {
        let started = Instant::now();
        let result = self.send_patch(id, rooms_available).await;
        self.record(started, &result);
        result
    }

    async fn delete_hotel(&self, id: &HotelId) -> Result<(), CatalogError> {
        let started = Instant::now();
        let result = self.send_delete(id).await;
        self.record(started, &result);
        result
    }

    fn stats(&self) -> ClientStats {
        self.stats.lock().clone()
    }
}

fn transport_error(e: reqwest::Error) -> CatalogError {
    CatalogError::NetworkError(e.to_string())
}

// 404 on an item endpoint means the hotel is gone; any other failure status is a network error
async fn ensure_success(
    response: reqwest::Response,
    id: Option<&HotelId>,
) -> Result<reqwest::Response, CatalogError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        if let Some(id) = id {
            return Err(CatalogError::NotFound(id.clone()));
        }
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    Err(CatalogError::NetworkError(format!(
        "{} - {}",
        status.as_u16(),
        body
    )))
}
