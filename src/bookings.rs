// Guest reservations taken through the booking form.
// These live only in the local cache and never change a hotel's room count.

use crate::hotel::HotelId;
use crate::local_cache::CacheError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("Check-out {check_out} must be after check-in {check_in}")]
    InvalidStay {
        check_in: NaiveDate,
        check_out: NaiveDate,
    },

    #[error("Guest name is required")]
    MissingGuestName,

    #[error("Invalid guest email: {0}")]
    InvalidEmail(String),

    #[error("Hotel {0} is not in the catalog")]
    UnknownHotel(HotelId),

    #[error("No booking with id {0}")]
    UnknownBooking(i64),

    #[error("Failed to store bookings: {0}")]
    Cache(#[from] CacheError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: i64,
    pub hotel_id: HotelId,
    #[serde(alias = "name")]
    pub guest_name: String,
    #[serde(alias = "email")]
    pub guest_email: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl Booking {
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub hotel_id: HotelId,
    pub guest_name: String,
    pub guest_email: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl BookingRequest {
    pub fn validate(&self) -> Result<(), BookingError> {
        if self.check_out <= self.check_in {
            return Err(BookingError::InvalidStay {
                check_in: self.check_in,
                check_out: self.check_out,
            });
        }
        if self.guest_name.trim().is_empty() {
            return Err(BookingError::MissingGuestName);
        }

        let email = self.guest_email.trim();
        let well_formed = email
            .split_once('@')
            .map_or(false, |(user, domain)| !user.is_empty() && !domain.is_empty());
        if !well_formed {
            return Err(BookingError::InvalidEmail(self.guest_email.clone()));
        }
        Ok(())
    }
}

/// Turn a validated request into a booking.
///
/// Ids come from the wall-clock millisecond, bumped past the largest existing
/// id so two bookings made within the same millisecond stay distinct.
pub fn create_booking(
    existing: &[Booking],
    request: BookingRequest,
    now: DateTime<Utc>,
) -> Result<Booking, BookingError> {
    request.validate()?;

    let next_free = existing
        .iter()
        .map(|b| b.id.saturating_add(1))
        .max()
        .unwrap_or(0);
    let id = now.timestamp_millis().max(next_free);

    Ok(Booking {
        id,
        hotel_id: request.hotel_id,
        guest_name: request.guest_name.trim().to_string(),
        guest_email: request.guest_email.trim().to_string(),
        check_in: request.check_in,
        check_out: request.check_out,
    })
}

pub fn cancel_booking(existing: &[Booking], booking_id: i64) -> Result<Vec<Booking>, BookingError> {
    if !existing.iter().any(|b| b.id == booking_id) {
        return Err(BookingError::UnknownBooking(booking_id));
    }
    Ok(existing
        .iter()
        .filter(|b| b.id != booking_id)
        .cloned()
        .collect())
}
