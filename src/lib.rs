// View-state core for a hotel listing: catalog client, local cache, and the
// reconciler that turns hotels plus user choices into the visible list.

pub mod bookings;
pub mod catalog;
pub mod config;
pub mod hotel;
pub mod local_cache;
pub mod reconciler;
pub mod selection;
pub mod view_state;

// Re-export key types for convenience
pub use bookings::{Booking, BookingError, BookingRequest};
pub use catalog::{
    CatalogClient, CatalogError, ClientConfig, ClientError, ClientStats, HttpCatalogClient,
};
pub use config::WidgetConfig;
pub use hotel::{Hotel, HotelId, NormalizeError};
pub use local_cache::{
    CacheError, CacheStatsReport, FileStore, KeyValueStore, LocalCache, MemoryStore,
};
pub use reconciler::{
    apply_booking, apply_deletion, compute_visible, BookingOutcome, ReconcileError,
};
pub use selection::{CityFilter, Selection, SortOrder};
pub use view_state::{Mutation, Notice, NoticeLevel, ViewError, ViewState};

// Wire a view to the configured HTTP catalog and on-disk cache
pub fn open_view(
    config: WidgetConfig,
) -> Result<ViewState<HttpCatalogClient, FileStore>, ClientError> {
    let client = HttpCatalogClient::new(config.client)?;
    let cache = LocalCache::new(FileStore::open(config.cache_path));
    Ok(ViewState::new(client, cache))
}
