// Filter/sort selection and how it is persisted between sessions.
// Values are stored JSON-encoded; older raw spellings are still accepted on read.

use crate::local_cache::{
    KeyValueStore, LocalCache, AVAILABILITY_KEY, CITY_KEY, SEARCH_KEY, SORT_ORDER_KEY,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

pub const ALL_CITIES: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CityFilter {
    #[default]
    All,
    City(String),
}

impl CityFilter {
    pub fn parse(value: &str) -> Self {
        if value.is_empty() || value == ALL_CITIES {
            CityFilter::All
        } else {
            CityFilter::City(value.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CityFilter::All => ALL_CITIES,
            CityFilter::City(city) => city,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    #[default]
    None,
    LowToHigh,
    HighToLow,
}

impl SortOrder {
    // "default" is what older builds stored for the unsorted order
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "" | "none" | "default" => Some(SortOrder::None),
            "low-to-high" => Some(SortOrder::LowToHigh),
            "high-to-low" => Some(SortOrder::HighToLow),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::None => "none",
            SortOrder::LowToHigh => "low-to-high",
            SortOrder::HighToLow => "high-to-low",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selection {
    pub city_filter: CityFilter,
    pub availability_only: bool,
    // Case-insensitive substring of the hotel name
    pub search_text: String,
    pub sort_order: SortOrder,
}

impl Selection {
    /// Seed a selection from stored preferences.
    ///
    /// Each field is read independently; a missing or unreadable value keeps
    /// that field's default.
    pub fn from_preferences<S: KeyValueStore>(cache: &LocalCache<S>) -> Self {
        let mut selection = Selection::default();

        if let Some(raw) = cache.read_preference(CITY_KEY) {
            selection.city_filter = CityFilter::parse(&decode_string(&raw));
        }

        if let Some(raw) = cache.read_preference(AVAILABILITY_KEY) {
            match decode_availability(&raw) {
                Some(flag) => selection.availability_only = flag,
                None => warn!(value = %raw, "Ignoring unreadable availability preference"),
            }
        }

        if let Some(raw) = cache.read_preference(SEARCH_KEY) {
            selection.search_text = decode_string(&raw);
        }

        if let Some(raw) = cache.read_preference(SORT_ORDER_KEY) {
            match SortOrder::parse(&decode_string(&raw)) {
                Some(order) => selection.sort_order = order,
                None => warn!(value = %raw, "Ignoring unreadable sort preference"),
            }
        }

        debug!(?selection, "Selection seeded from preferences");
        selection
    }

    // Encoded (key, value) pairs for every field that differs from `previous`
    pub fn changed_preferences(&self, previous: &Selection) -> Vec<(&'static str, String)> {
        let mut changed = Vec::new();

        if self.city_filter != previous.city_filter {
            changed.push((CITY_KEY, encode_string(self.city_filter.as_str())));
        }
        if self.availability_only != previous.availability_only {
            changed.push((AVAILABILITY_KEY, Value::Bool(self.availability_only).to_string()));
        }
        if self.search_text != previous.search_text {
            changed.push((SEARCH_KEY, encode_string(&self.search_text)));
        }
        if self.sort_order != previous.sort_order {
            changed.push((SORT_ORDER_KEY, encode_string(self.sort_order.as_str())));
        }

        changed
    }

    /// Write every changed field to the cache; returns how many were written.
    ///
    /// Preferences are advisory, so a failed write is logged and skipped.
    pub fn persist_changes<S: KeyValueStore>(
        &self,
        previous: &Selection,
        cache: &LocalCache<S>,
    ) -> usize {
        let mut written = 0;
        for (key, value) in self.changed_preferences(previous) {
            match cache.write_preference(key, &value) {
                Ok(()) => written += 1,
                Err(e) => warn!(key, error = %e, "Failed to persist preference"),
            }
        }
        written
    }
}

fn encode_string(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

// JSON string if it is one, otherwise the raw text as stored by older builds
fn decode_string(raw: &str) -> String {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::String(s)) => s,
        _ => raw.to_string(),
    }
}

fn decode_availability(raw: &str) -> Option<bool> {
    if let Ok(Value::Bool(flag)) = serde_json::from_str::<Value>(raw) {
        return Some(flag);
    }
    match decode_string(raw).as_str() {
        "available" | "true" => Some(true),
        "all" | "false" => Some(false),
        _ => None,
    }
}
