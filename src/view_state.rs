// View State: sole owner of the hotel list and the user's selection.
// Mutations become visible only after the catalog confirms them, and at most one
// mutation per hotel may be outstanding at a time.

use crate::bookings::{cancel_booking, create_booking, Booking, BookingError, BookingRequest};
use crate::catalog::{CatalogClient, CatalogError};
use crate::hotel::{Hotel, HotelId};
use crate::local_cache::{KeyValueStore, LocalCache};
use crate::reconciler::{self, ReconcileError};
use crate::selection::{CityFilter, Selection, SortOrder};
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ViewError {
    #[error("A {pending} request for hotel {id} is still in flight")]
    MutationInFlight { id: HotelId, pending: Mutation },

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Booking(#[from] BookingError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Booking,
    Deletion,
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::Booking => f.write_str("booking"),
            Mutation::Deletion => f.write_str("deletion"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

// Transient message for the user (a toast)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

// Oldest notices are dropped once this many are waiting
pub const MAX_PENDING_NOTICES: usize = 32;

struct ViewInner {
    all_hotels: Vec<Hotel>,
    selection: Selection,
    // Bumped each time a confirmed mutation is applied
    generation: u64,
    loads_in_flight: usize,
    // Mutations confirmed while a load was out, replayed onto its result
    replay: Vec<(u64, Confirmed)>,
}

// A mutation the catalog has confirmed
#[derive(Debug, Clone)]
enum Confirmed {
    Updated(Hotel),
    Deleted(HotelId),
}

impl Confirmed {
    fn apply(&self, hotels: &[Hotel]) -> Vec<Hotel> {
        match self {
            Confirmed::Updated(hotel) => reconciler::replace_hotel(hotels, hotel),
            Confirmed::Deleted(id) => reconciler::apply_deletion(hotels, id),
        }
    }
}

// Tracks an outstanding load; the replay log is cleared once none remain
struct LoadGuard<'a> {
    inner: &'a Mutex<ViewInner>,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        inner.loads_in_flight = inner.loads_in_flight.saturating_sub(1);
        if inner.loads_in_flight == 0 {
            inner.replay.clear();
        }
    }
}

// Clears the in-flight entry however the mutation ends
struct InFlightGuard<'a> {
    registry: &'a DashMap<HotelId, Mutation>,
    id: HotelId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.registry.remove(&self.id);
    }
}

pub struct ViewState<C, S> {
    client: C,
    cache: LocalCache<S>,
    inner: Mutex<ViewInner>,
    in_flight: DashMap<HotelId, Mutation>,
    notices: Mutex<Vec<Notice>>,
}

impl<C: CatalogClient, S: KeyValueStore> ViewState<C, S> {
    /// Build a view seeded from whatever the cache holds.
    ///
    /// The cached list may be stale or empty; call [`ViewState::load`] to
    /// fetch the authoritative catalog.
    pub fn new(client: C, cache: LocalCache<S>) -> Self {
        let selection = Selection::from_preferences(&cache);
        let all_hotels = cache.read_hotels();
        info!(cached_hotels = all_hotels.len(), "View state seeded from cache");

        Self {
            client,
            cache,
            inner: Mutex::new(ViewInner {
                all_hotels,
                selection,
                generation: 0,
                loads_in_flight: 0,
                replay: Vec::new(),
            }),
            in_flight: DashMap::new(),
            notices: Mutex::new(Vec::new()),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn cache(&self) -> &LocalCache<S> {
        &self.cache
    }

    /// Fetch the catalog and make it the current list.
    ///
    /// Mutations confirmed while the request was out are replayed onto the
    /// fetched list, so a slow load never undoes a booking or deletion that
    /// completed after it started. On failure the current list is kept as-is.
    pub async fn load(&self) -> Result<usize, ViewError> {
        let (_load, started_at) = self.begin_load();

        match self.client.list_hotels().await {
            Ok(fetched) => {
                let mut inner = self.inner.lock();
                let mut hotels = fetched;
                let mut replayed = 0;
                for (generation, change) in inner.replay.iter() {
                    if *generation > started_at {
                        hotels = change.apply(&hotels);
                        replayed += 1;
                    }
                }

                let count = hotels.len();
                inner.all_hotels = hotels;
                self.persist_hotels(&inner.all_hotels);
                info!(hotels = count, replayed, "Catalog loaded");
                Ok(count)
            }
            Err(e) => {
                warn!(error = %e, "Catalog load failed, keeping current list");
                self.notify(NoticeLevel::Error, "Error fetching hotels. Please try again!");
                Err(e.into())
            }
        }
    }

    pub fn all_hotels(&self) -> Vec<Hotel> {
        self.inner.lock().all_hotels.clone()
    }

    pub fn visible(&self) -> Vec<Hotel> {
        let inner = self.inner.lock();
        reconciler::compute_visible(&inner.all_hotels, &inner.selection)
    }

    pub fn cities(&self) -> Vec<String> {
        reconciler::distinct_cities(&self.inner.lock().all_hotels)
    }

    pub fn selection(&self) -> Selection {
        self.inner.lock().selection.clone()
    }

    // Replace the whole selection; returns the new visible list
    pub fn set_selection(&self, selection: Selection) -> Vec<Hotel> {
        self.update_selection(|current| *current = selection)
    }

    pub fn set_city_filter(&self, city_filter: CityFilter) -> Vec<Hotel> {
        self.update_selection(|current| current.city_filter = city_filter)
    }

    pub fn set_availability_only(&self, availability_only: bool) -> Vec<Hotel> {
        self.update_selection(|current| current.availability_only = availability_only)
    }

    pub fn set_search_text(&self, search_text: &str) -> Vec<Hotel> {
        self.update_selection(|current| current.search_text = search_text.to_string())
    }

    pub fn set_sort_order(&self, sort_order: SortOrder) -> Vec<Hotel> {
        self.update_selection(|current| current.sort_order = sort_order)
    }

    // A UI should disable the hotel's controls while this is true
    pub fn is_pending(&self, hotel_id: &HotelId) -> bool {
        self.in_flight.contains_key(hotel_id)
    }

    /// Book one room, confirming with the catalog before anything changes.
    ///
    /// Returns the server's record for the hotel. Rejected without a request
    /// when the hotel is fully booked or another mutation for it is pending.
    pub async fn book(&self, hotel_id: &HotelId) -> Result<Hotel, ViewError> {
        let _guard = self.begin_mutation(hotel_id, Mutation::Booking)?;
        let snapshot = self.all_hotels();

        match reconciler::apply_booking(&self.client, &snapshot, hotel_id).await {
            Ok(outcome) => {
                // Applied to the current list: other hotels may have changed meanwhile
                self.commit(Confirmed::Updated(outcome.confirmed.clone()));

                self.notify(
                    NoticeLevel::Success,
                    format!("Room booked at {}", outcome.confirmed.name),
                );
                Ok(outcome.confirmed)
            }
            Err(e) => {
                let message = match &e {
                    ReconcileError::AlreadyFullyBooked(_) => "This hotel is fully booked!",
                    ReconcileError::UnknownHotel(_) => "This hotel is no longer listed.",
                    ReconcileError::Catalog(_) => "Error booking hotel. Try again!",
                };
                warn!(hotel_id = %hotel_id, error = %e, "Booking failed");
                self.notify(NoticeLevel::Error, message);
                Err(e.into())
            }
        }
    }

    // Delete a hotel; the local list only changes once the catalog confirms
    pub async fn delete(&self, hotel_id: &HotelId) -> Result<(), ViewError> {
        let _guard = self.begin_mutation(hotel_id, Mutation::Deletion)?;

        match self.client.delete_hotel(hotel_id).await {
            Ok(()) => {
                self.commit(Confirmed::Deleted(hotel_id.clone()));

                info!(hotel_id = %hotel_id, "Hotel deleted");
                self.notify(NoticeLevel::Success, "Hotel deleted successfully!");
                Ok(())
            }
            Err(e) => {
                warn!(hotel_id = %hotel_id, error = %e, "Deletion failed");
                self.notify(NoticeLevel::Error, "Error deleting hotel. Try again!");
                Err(e.into())
            }
        }
    }

    pub fn reservations(&self) -> Vec<Booking> {
        self.cache.read_bookings()
    }

    // Record a guest reservation for a listed hotel
    pub fn reserve(&self, request: BookingRequest) -> Result<Booking, ViewError> {
        // Held for the whole read-modify-write of the bookings entry
        let inner = self.inner.lock();
        let result = self.store_reservation(&inner.all_hotels, request);
        drop(inner);

        match result {
            Ok(booking) => {
                info!(
                    booking_id = booking.id,
                    hotel_id = %booking.hotel_id,
                    nights = booking.nights(),
                    "Reservation stored"
                );
                self.notify(NoticeLevel::Success, "Booking confirmed!");
                Ok(booking)
            }
            Err(e) => {
                self.notify(NoticeLevel::Error, e.to_string());
                Err(e.into())
            }
        }
    }

    pub fn cancel_reservation(&self, booking_id: i64) -> Result<(), ViewError> {
        let inner = self.inner.lock();
        let result = cancel_booking(&self.cache.read_bookings(), booking_id)
            .and_then(|remaining| {
                self.cache
                    .write_bookings(&remaining)
                    .map_err(BookingError::from)
            });
        drop(inner);

        match result {
            Ok(()) => {
                info!(booking_id, "Reservation cancelled");
                self.notify(NoticeLevel::Success, "Booking canceled!");
                Ok(())
            }
            Err(e) => {
                self.notify(NoticeLevel::Error, e.to_string());
                Err(e.into())
            }
        }
    }

    // Draining is up to the caller; at most MAX_PENDING_NOTICES are kept
    pub fn take_notices(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.lock())
    }

    fn store_reservation(
        &self,
        all_hotels: &[Hotel],
        request: BookingRequest,
    ) -> Result<Booking, BookingError> {
        if !all_hotels.iter().any(|h| h.id == request.hotel_id) {
            return Err(BookingError::UnknownHotel(request.hotel_id));
        }

        let mut bookings = self.cache.read_bookings();
        let booking = create_booking(&bookings, request, Utc::now())?;
        bookings.push(booking.clone());
        self.cache.write_bookings(&bookings)?;
        Ok(booking)
    }

    fn update_selection<F>(&self, change: F) -> Vec<Hotel>
    where
        F: FnOnce(&mut Selection),
    {
        let mut inner = self.inner.lock();
        let previous = inner.selection.clone();
        change(&mut inner.selection);

        let written = inner.selection.persist_changes(&previous, &self.cache);
        debug!(written, selection = ?inner.selection, "Selection updated");
        reconciler::compute_visible(&inner.all_hotels, &inner.selection)
    }

    fn begin_mutation(
        &self,
        hotel_id: &HotelId,
        kind: Mutation,
    ) -> Result<InFlightGuard<'_>, ViewError> {
        match self.in_flight.entry(hotel_id.clone()) {
            Entry::Occupied(entry) => {
                let pending = *entry.get();
                debug!(hotel_id = %hotel_id, %pending, requested = %kind, "Ignoring overlapping mutation");
                Err(ViewError::MutationInFlight {
                    id: hotel_id.clone(),
                    pending,
                })
            }
            Entry::Vacant(entry) => {
                entry.insert(kind);
                Ok(InFlightGuard {
                    registry: &self.in_flight,
                    id: hotel_id.clone(),
                })
            }
        }
    }

    fn begin_load(&self) -> (LoadGuard<'_>, u64) {
        let mut inner = self.inner.lock();
        inner.loads_in_flight += 1;
        let started_at = inner.generation;
        drop(inner);
        (LoadGuard { inner: &self.inner }, started_at)
    }

    fn commit(&self, change: Confirmed) {
        let mut inner = self.inner.lock();
        inner.all_hotels = change.apply(&inner.all_hotels);
        inner.generation += 1;
        if inner.loads_in_flight > 0 {
            let generation = inner.generation;
            inner.replay.push((generation, change));
        }
        self.persist_hotels(&inner.all_hotels);
    }

    // The cache is advisory: a failed write is logged, never surfaced
    fn persist_hotels(&self, hotels: &[Hotel]) {
        if let Err(e) = self.cache.write_hotels(hotels) {
            warn!(error = %e, "Failed to mirror hotels into the local cache");
        }
    }

    fn notify(&self, level: NoticeLevel, message: impl Into<String>) {
        let message = message.into();
        debug!(?level, %message, "Notice posted");
        let mut notices = self.notices.lock();
        if notices.len() >= MAX_PENDING_NOTICES {
            notices.remove(0);
        }
        notices.push(Notice { level, message });
    }
}
