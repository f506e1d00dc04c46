// Reconciler: turns (all hotels, selection) into the visible list, and applies
// confirmed mutations back onto the full list. Nothing here touches the cache.

use crate::catalog::{CatalogClient, CatalogError};
use crate::hotel::{Hotel, HotelId};
use crate::selection::{CityFilter, Selection, SortOrder};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReconcileError {
    #[error("Hotel {0} is fully booked")]
    AlreadyFullyBooked(HotelId),

    #[error("Hotel {0} is not in the catalog")]
    UnknownHotel(HotelId),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

// Result of a booking the catalog has confirmed
#[derive(Debug, Clone, PartialEq)]
pub struct BookingOutcome {
    pub hotels: Vec<Hotel>,
    // The record exactly as the server returned it
    pub confirmed: Hotel,
}

/// Filter and order `all_hotels` for display.
///
/// Filters apply in order (city, availability, name search), then an optional
/// stable sort by nightly price. Hotels with equal prices keep their catalog
/// order, so the output is fully determined by the inputs.
pub fn compute_visible(all_hotels: &[Hotel], selection: &Selection) -> Vec<Hotel> {
    let needle = selection.search_text.to_lowercase();

    let mut visible: Vec<Hotel> = all_hotels
        .iter()
        .filter(|hotel| match &selection.city_filter {
            CityFilter::All => true,
            CityFilter::City(city) => hotel.city == *city,
        })
        .filter(|hotel| !selection.availability_only || hotel.rooms_available > 0)
        .filter(|hotel| needle.is_empty() || hotel.name.to_lowercase().contains(&needle))
        .cloned()
        .collect();

    // sort_by is stable
    match selection.sort_order {
        SortOrder::None => {}
        SortOrder::LowToHigh => {
            visible.sort_by(|a, b| a.price_per_night.total_cmp(&b.price_per_night))
        }
        SortOrder::HighToLow => {
            visible.sort_by(|a, b| b.price_per_night.total_cmp(&a.price_per_night))
        }
    }

    visible
}

// City options for the filter control, in first-seen order
pub fn distinct_cities(all_hotels: &[Hotel]) -> Vec<String> {
    let mut cities: Vec<String> = Vec::new();
    for hotel in all_hotels {
        if !hotel.city.is_empty() && !cities.contains(&hotel.city) {
            cities.push(hotel.city.clone());
        }
    }
    cities
}

// Swap in `updated` wherever its id appears; other records are untouched
pub fn replace_hotel(all_hotels: &[Hotel], updated: &Hotel) -> Vec<Hotel> {
    all_hotels
        .iter()
        .map(|hotel| {
            if hotel.id == updated.id {
                updated.clone()
            } else {
                hotel.clone()
            }
        })
        .collect()
}

/// Book one room at `hotel_id`.
///
/// Fully booked or unknown hotels are rejected before any request is made.
/// Otherwise the decremented count is sent to the catalog and, once it
/// confirms, the server's record replaces the local one. Nothing is changed
/// locally if the request fails.
pub async fn apply_booking<C: CatalogClient + ?Sized>(
    client: &C,
    all_hotels: &[Hotel],
    hotel_id: &HotelId,
) -> Result<BookingOutcome, ReconcileError> {
    let hotel = all_hotels
        .iter()
        .find(|h| h.id == *hotel_id)
        .ok_or_else(|| ReconcileError::UnknownHotel(hotel_id.clone()))?;

    let Some(requested) = hotel.rooms_available.checked_sub(1) else {
        debug!(hotel_id = %hotel_id, "Booking rejected locally, no rooms left");
        return Err(ReconcileError::AlreadyFullyBooked(hotel_id.clone()));
    };

    let confirmed = client.patch_availability(hotel_id, requested).await?;
    info!(
        hotel_id = %hotel_id,
        requested,
        confirmed = confirmed.rooms_available,
        "Booking confirmed by catalog"
    );

    Ok(BookingOutcome {
        hotels: replace_hotel(all_hotels, &confirmed),
        confirmed,
    })
}

// Only call once the catalog has confirmed the deletion
pub fn apply_deletion(all_hotels: &[Hotel], hotel_id: &HotelId) -> Vec<Hotel> {
    all_hotels
        .iter()
        .filter(|hotel| hotel.id != *hotel_id)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::mock_catalog::MockCatalog;
    use test_case::test_case;

    fn scenario_catalog() -> Vec<Hotel> {
        vec![
            Hotel::new(1, "Alpha", "NYC", 100.0, 2),
            Hotel::new(2, "Beta", "LA", 50.0, 0),
        ]
    }

    fn wide_catalog() -> Vec<Hotel> {
        vec![
            Hotel::new(1, "Grand Plaza", "NYC", 250.0, 4),
            Hotel::new(2, "Budget Inn", "LA", 60.0, 0),
            Hotel::new(3, "Harbor View", "NYC", 120.0, 1),
            Hotel::new(4, "Sunset Inn", "LA", 120.0, 3),
            Hotel::new(5, "City Lodge", "Chicago", 60.0, 2),
            Hotel::new(6, "Plaza Suites", "Chicago", 120.0, 0),
        ]
    }

    fn ids(hotels: &[Hotel]) -> Vec<i64> {
        hotels
            .iter()
            .map(|h| match h.id {
                HotelId::Number(n) => n,
                HotelId::Text(_) => -1,
            })
            .collect()
    }

    fn matches_all(hotel: &Hotel, selection: &Selection) -> bool {
        let city_ok = match &selection.city_filter {
            CityFilter::All => true,
            CityFilter::City(city) => hotel.city == *city,
        };
        let rooms_ok = !selection.availability_only || hotel.rooms_available > 0;
        let name_ok = hotel
            .name
            .to_lowercase()
            .contains(&selection.search_text.to_lowercase());
        city_ok && rooms_ok && name_ok
    }

    #[test]
    fn test_available_only_sorted_low_to_high() {
        let selection = Selection {
            city_filter: CityFilter::All,
            availability_only: true,
            search_text: String::new(),
            sort_order: SortOrder::LowToHigh,
        };

        let visible = compute_visible(&scenario_catalog(), &selection);
        assert_eq!(visible, vec![Hotel::new(1, "Alpha", "NYC", 100.0, 2)]);
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let selection = Selection {
            search_text: "be".to_string(),
            ..Selection::default()
        };

        let visible = compute_visible(&scenario_catalog(), &selection);
        assert_eq!(ids(&visible), vec![2]);

        let shouting = Selection {
            search_text: "ALP".to_string(),
            ..Selection::default()
        };
        assert_eq!(ids(&compute_visible(&scenario_catalog(), &shouting)), vec![1]);
    }

    #[test]
    fn test_search_does_not_override_availability_filter() {
        let selection = Selection {
            search_text: "be".to_string(),
            availability_only: true,
            ..Selection::default()
        };

        assert!(compute_visible(&scenario_catalog(), &selection).is_empty());
    }

    #[test_case(Selection::default(), vec![1, 2, 3, 4, 5, 6]; "#1 no filters keeps catalog order")]
    #[test_case(Selection { city_filter: CityFilter::City("LA".to_string()), ..Selection::default() }, vec![2, 4]; "#2 city filter")]
    #[test_case(Selection { availability_only: true, ..Selection::default() }, vec![1, 3, 4, 5]; "#3 availability filter")]
    #[test_case(Selection { search_text: "inn".to_string(), ..Selection::default() }, vec![2, 4]; "#4 name search")]
    #[test_case(Selection { sort_order: SortOrder::LowToHigh, ..Selection::default() }, vec![2, 5, 3, 4, 6, 1]; "#5 ascending keeps ties in order")]
    #[test_case(Selection { sort_order: SortOrder::HighToLow, ..Selection::default() }, vec![1, 3, 4, 6, 2, 5]; "#6 descending keeps ties in order")]
    #[test_case(Selection { city_filter: CityFilter::City("Chicago".to_string()), availability_only: true, search_text: "LODGE".to_string(), sort_order: SortOrder::HighToLow }, vec![5]; "#7 combined")]
    #[test_case(Selection { city_filter: CityFilter::City("Paris".to_string()), ..Selection::default() }, vec![]; "#8 unknown city")]
    fn test_compute_visible(selection: Selection, expected_ids: Vec<i64>) {
        let visible = compute_visible(&wide_catalog(), &selection);
        assert_eq!(ids(&visible), expected_ids);
    }

    #[test]
    fn test_filtering_is_exact_subset() {
        let catalog = wide_catalog();
        let cities = [
            CityFilter::All,
            CityFilter::City("NYC".to_string()),
            CityFilter::City("Chicago".to_string()),
        ];

        for city_filter in cities {
            for availability_only in [false, true] {
                for search_text in ["", "inn", "PLAZA", "zzz"] {
                    for sort_order in [SortOrder::None, SortOrder::LowToHigh, SortOrder::HighToLow] {
                        let selection = Selection {
                            city_filter: city_filter.clone(),
                            availability_only,
                            search_text: search_text.to_string(),
                            sort_order,
                        };
                        let visible = compute_visible(&catalog, &selection);

                        assert!(visible.iter().all(|h| matches_all(h, &selection)));
                        let expected = catalog.iter().filter(|h| matches_all(h, &selection)).count();
                        assert_eq!(visible.len(), expected, "{:?}", selection);

                        // Same input, same output
                        assert_eq!(visible, compute_visible(&catalog, &selection));

                        // Reapplying without a sort is a no-op
                        let unsorted = Selection {
                            sort_order: SortOrder::None,
                            ..selection.clone()
                        };
                        assert_eq!(compute_visible(&visible, &unsorted), visible);
                    }
                }
            }
        }
    }

    #[test]
    fn test_sorting_only_reorders() {
        let catalog = wide_catalog();
        let unsorted = compute_visible(&catalog, &Selection::default());

        for sort_order in [SortOrder::LowToHigh, SortOrder::HighToLow] {
            let selection = Selection {
                sort_order,
                ..Selection::default()
            };
            let mut sorted_ids = ids(&compute_visible(&catalog, &selection));
            sorted_ids.sort();
            let mut catalog_ids = ids(&unsorted);
            catalog_ids.sort();
            assert_eq!(sorted_ids, catalog_ids);
        }
    }

    #[test]
    fn test_distinct_cities_first_seen_order() {
        let mut catalog = wide_catalog();
        catalog.push(Hotel::new(7, "Nowhere", "", 10.0, 1));

        assert_eq!(distinct_cities(&catalog), vec!["NYC", "LA", "Chicago"]);
    }

    #[tokio::test]
    async fn test_fully_booked_hotel_makes_no_request() {
        let catalog = scenario_catalog();
        let client = MockCatalog::new(catalog.clone());

        let result = apply_booking(&client, &catalog, &HotelId::Number(2)).await;

        assert_eq!(
            result,
            Err(ReconcileError::AlreadyFullyBooked(HotelId::Number(2)))
        );
        assert_eq!(client.patch_count(), 0);
        assert_eq!(client.hotels().await, catalog);
    }

    #[tokio::test]
    async fn test_unknown_hotel_makes_no_request() {
        let catalog = scenario_catalog();
        let client = MockCatalog::new(catalog.clone());

        let result = apply_booking(&client, &catalog, &HotelId::Number(42)).await;

        assert_eq!(result, Err(ReconcileError::UnknownHotel(HotelId::Number(42))));
        assert_eq!(client.patch_count(), 0);
    }

    #[tokio::test]
    async fn test_booking_decrements_by_exactly_one() {
        let catalog = scenario_catalog();
        let client = MockCatalog::new(catalog.clone());

        let outcome = tokio_test::assert_ok!(
            apply_booking(&client, &catalog, &HotelId::Number(1)).await
        );

        assert_eq!(outcome.confirmed.rooms_available, 1);
        assert_eq!(outcome.hotels[0], outcome.confirmed);
        assert_eq!(outcome.hotels[1], catalog[1]);
        assert_eq!(client.patch_count(), 1);
    }

    #[tokio::test]
    async fn test_booking_takes_the_server_record() {
        let catalog = scenario_catalog();
        let client = MockCatalog::new(catalog.clone());
        // Someone else booked in the meantime; the server knows better than we do
        client.set_rooms_override(Some(0));

        let outcome = tokio_test::assert_ok!(
            apply_booking(&client, &catalog, &HotelId::Number(1)).await
        );

        assert_eq!(outcome.confirmed.rooms_available, 0);
        assert_eq!(outcome.hotels[0].rooms_available, 0);
    }

    #[tokio::test]
    async fn test_failed_booking_reports_catalog_error() {
        let catalog = scenario_catalog();
        let client = MockCatalog::new(catalog.clone());
        client.fail_next_requests(1);

        let result = apply_booking(&client, &catalog, &HotelId::Number(1)).await;

        assert!(matches!(
            result,
            Err(ReconcileError::Catalog(CatalogError::NetworkError(_)))
        ));
        assert_eq!(client.hotels().await, catalog);
    }

    #[test]
    fn test_apply_deletion_removes_only_target() {
        let catalog = wide_catalog();

        let remaining = apply_deletion(&catalog, &HotelId::Number(3));
        assert_eq!(ids(&remaining), vec![1, 2, 4, 5, 6]);

        let unchanged = apply_deletion(&catalog, &HotelId::Number(99));
        assert_eq!(unchanged, catalog);
    }

    #[test]
    fn test_replace_hotel_keeps_order() {
        let catalog = wide_catalog();
        let updated = Hotel::new(4, "Sunset Inn", "LA", 110.0, 2);

        let hotels = replace_hotel(&catalog, &updated);

        assert_eq!(ids(&hotels), ids(&catalog));
        assert_eq!(hotels[3], updated);
    }
}
