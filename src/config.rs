// Configuration: where the catalog lives and where the local cache is kept.
// Read once from the environment when a view is opened.

use crate::catalog::{ClientConfig, ClientError, DEFAULT_AVAILABILITY_FIELD, DEFAULT_BASE_URL};
use std::path::PathBuf;

pub const DEFAULT_CACHE_PATH: &str = "hotel_listing_cache.json";

/// Configuration for a listing view, loaded from environment variables.
///
/// | Env Var                        | Default                    |
/// |--------------------------------|----------------------------|
/// | `HOTEL_API_BASE_URL`           | `http://localhost:3000`    |
/// | `HOTEL_API_TIMEOUT_MS`         | unset (transport default)  |
/// | `HOTEL_API_AVAILABILITY_FIELD` | `roomsAvailable`           |
/// | `HOTEL_CACHE_PATH`             | `hotel_listing_cache.json` |
#[derive(Debug, Clone)]
pub struct WidgetConfig {
    pub client: ClientConfig,
    pub cache_path: PathBuf,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            cache_path: PathBuf::from(DEFAULT_CACHE_PATH),
        }
    }
}

impl WidgetConfig {
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    // Same as `from_env`, with the variable source injected
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("HOTEL_API_BASE_URL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout_ms = match lookup("HOTEL_API_TIMEOUT_MS") {
            Some(raw) if !raw.trim().is_empty() => Some(raw.trim().parse::<u64>().map_err(|_| {
                ClientError::ConfigError(format!(
                    "HOTEL_API_TIMEOUT_MS must be a valid u64, got '{}'",
                    raw
                ))
            })?),
            _ => None,
        };

        let availability_field = lookup("HOTEL_API_AVAILABILITY_FIELD")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_AVAILABILITY_FIELD.to_string());

        let cache_path = lookup("HOTEL_CACHE_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_PATH));

        Ok(Self {
            client: ClientConfig {
                base_url,
                timeout_ms,
                availability_field,
            },
            cache_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = WidgetConfig::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config.client.base_url, "http://localhost:3000");
        assert_eq!(config.client.timeout_ms, None);
        assert_eq!(config.client.availability_field, "roomsAvailable");
        assert_eq!(config.cache_path, PathBuf::from("hotel_listing_cache.json"));
    }

    #[test]
    fn test_overrides() {
        let config = WidgetConfig::from_lookup(lookup_from(&[
            ("HOTEL_API_BASE_URL", "http://localhost:3001/api"),
            ("HOTEL_API_TIMEOUT_MS", " 2500 "),
            ("HOTEL_API_AVAILABILITY_FIELD", "rooms_available"),
            ("HOTEL_CACHE_PATH", "/tmp/hotels.json"),
        ]))
        .unwrap();

        assert_eq!(config.client.base_url, "http://localhost:3001/api");
        assert_eq!(config.client.timeout_ms, Some(2500));
        assert_eq!(config.client.availability_field, "rooms_available");
        assert_eq!(config.cache_path, PathBuf::from("/tmp/hotels.json"));
    }

    #[test]
    fn test_invalid_timeout_is_config_error() {
        let result =
            WidgetConfig::from_lookup(lookup_from(&[("HOTEL_API_TIMEOUT_MS", "soon")]));

        assert!(matches!(result, Err(ClientError::ConfigError(_))));
    }
}
