// Canonical hotel record and the wire normalization adapter.
// Every hotel entering the crate (network or cache) passes through RawHotel,
// so the reconciler only ever sees the canonical field names.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug, PartialEq)]
pub enum NormalizeError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid price per night: {0}")]
    InvalidPrice(f64),

    #[error("Invalid room count: {0}")]
    InvalidRooms(f64),

    #[error("Field {field} has the wrong shape: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

// Hotel identifier as handed out by the catalog: either an integer or an opaque string.
// Strings in canonical decimal form collapse to the integer form, so "1" and 1
// name the same hotel; "0123" or "+7" stay text so the URL keeps the server's spelling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum HotelId {
    Number(i64),
    Text(String),
}

impl fmt::Display for HotelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HotelId::Number(n) => write!(f, "{}", n),
            HotelId::Text(s) => f.write_str(s),
        }
    }
}

impl FromStr for HotelId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.parse::<i64>() {
            Ok(n) if n.to_string() == s => HotelId::Number(n),
            _ => HotelId::Text(s.to_string()),
        })
    }
}

impl From<i64> for HotelId {
    fn from(n: i64) -> Self {
        HotelId::Number(n)
    }
}

impl From<i32> for HotelId {
    fn from(n: i32) -> Self {
        HotelId::Number(i64::from(n))
    }
}

impl From<&str> for HotelId {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(id) => id,
            Err(never) => match never {},
        }
    }
}

impl<'de> Deserialize<'de> for HotelId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum WireId {
            Number(i64),
            Text(String),
        }

        Ok(match WireId::deserialize(deserializer)? {
            WireId::Number(n) => HotelId::Number(n),
            WireId::Text(s) => HotelId::from(s.as_str()),
        })
    }
}

/// A hotel as the rest of the crate sees it.
///
/// Deserializing a `Hotel` always goes through [`RawHotel`], so any of the
/// historical field spellings are accepted; serializing writes the canonical
/// camelCase shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawHotel")]
pub struct Hotel {
    pub id: HotelId,
    pub name: String,
    pub city: String,
    pub price_per_night: f64,
    pub rooms_available: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
}

impl Hotel {
    pub fn new(
        id: impl Into<HotelId>,
        name: &str,
        city: &str,
        price_per_night: f64,
        rooms_available: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.to_string(),
            city: city.to_string(),
            price_per_night,
            rooms_available,
            image_ref: None,
        }
    }

    pub fn with_image(mut self, image_ref: &str) -> Self {
        self.image_ref = Some(image_ref.to_string());
        self
    }

    pub fn is_fully_booked(&self) -> bool {
        self.rooms_available == 0
    }

    /// Decode the record a PATCH answered with.
    ///
    /// Servers that merge the body into the stored record echo `sent_field`
    /// next to whatever spelling the record already had. The sent field holds
    /// the new count, so it takes precedence over the others.
    pub fn from_patch_reply(mut raw: RawHotel, sent_field: &str) -> Result<Self, NormalizeError> {
        if let Some(sent) = raw.0.get(sent_field).cloned() {
            raw.0.insert(ROOMS_FIELDS[0].to_string(), sent);
        }
        Self::try_from(raw)
    }
}

// Some deployments report a room count, others only a yes/no flag
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawAvailability {
    Count(u32),
    Flag(bool),
    // Counts written by JavaScript clients can arrive as `2.0`
    Real(f64),
}

impl RawAvailability {
    fn rooms(self) -> Result<u32, NormalizeError> {
        match self {
            RawAvailability::Count(n) => Ok(n),
            RawAvailability::Flag(true) => Ok(1),
            RawAvailability::Flag(false) => Ok(0),
            RawAvailability::Real(n) => {
                if n.is_finite() && n >= 0.0 && n.fract() == 0.0 && n <= f64::from(u32::MAX) {
                    Ok(n as u32)
                } else {
                    Err(NormalizeError::InvalidRooms(n))
                }
            }
        }
    }
}

// Accepted spellings per field, most canonical first. When a record carries
// several spellings of one field the first one listed wins.
const NAME_FIELDS: &[&str] = &["name"];
const CITY_FIELDS: &[&str] = &["city", "location"];
const PRICE_FIELDS: &[&str] = &["pricePerNight", "price_per_night", "price"];
const ROOMS_FIELDS: &[&str] = &[
    "roomsAvailable",
    "rooms_available",
    "available_rooms",
    "available",
    "availability",
];
const IMAGE_FIELDS: &[&str] = &["imageRef", "image_ref", "image_url", "imageUrl"];

// Wire shape of a hotel: the untouched JSON object. Spellings are resolved in
// `TryFrom`, so a record echoing two spellings of a field still decodes.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct RawHotel(pub serde_json::Map<String, serde_json::Value>);

impl RawHotel {
    // Value under the first spelling present; null counts as absent
    fn pick<T: DeserializeOwned>(
        &self,
        spellings: &[&'static str],
    ) -> Result<Option<T>, NormalizeError> {
        for &field in spellings {
            match self.0.get(field) {
                None | Some(serde_json::Value::Null) => continue,
                Some(value) => {
                    return T::deserialize(value)
                        .map(Some)
                        .map_err(|e| NormalizeError::InvalidField {
                            field,
                            reason: e.to_string(),
                        })
                }
            }
        }
        Ok(None)
    }
}

impl TryFrom<RawHotel> for Hotel {
    type Error = NormalizeError;

    fn try_from(raw: RawHotel) -> Result<Self, Self::Error> {
        let id: HotelId = raw.pick(&["id"])?.ok_or(NormalizeError::MissingField("id"))?;
        let name = raw
            .pick::<String>(NAME_FIELDS)?
            .filter(|n| !n.trim().is_empty())
            .ok_or(NormalizeError::MissingField("name"))?;
        let price_per_night: f64 = raw
            .pick(PRICE_FIELDS)?
            .ok_or(NormalizeError::MissingField("price"))?;
        if !price_per_night.is_finite() || price_per_night < 0.0 {
            return Err(NormalizeError::InvalidPrice(price_per_night));
        }
        let rooms_available = match raw.pick::<RawAvailability>(ROOMS_FIELDS)? {
            Some(availability) => availability.rooms()?,
            None => 0,
        };

        Ok(Hotel {
            id,
            name,
            city: raw.pick(CITY_FIELDS)?.unwrap_or_default(),
            price_per_night,
            rooms_available,
            image_ref: raw.pick::<String>(IMAGE_FIELDS)?.filter(|i| !i.is_empty()),
        })
    }
}

// Normalize a batch of loosely-typed records, dropping the ones that don't fit.
// Returns the surviving hotels in input order and the number dropped.
pub fn normalize_records(values: Vec<serde_json::Value>, source: &str) -> (Vec<Hotel>, usize) {
    let mut hotels = Vec::with_capacity(values.len());
    let mut dropped = 0;

    for (position, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<Hotel>(value) {
            Ok(hotel) => hotels.push(hotel),
            Err(e) => {
                dropped += 1;
                warn!(source, position, error = %e, "Dropping malformed hotel record");
            }
        }
    }

    (hotels, dropped)
}
