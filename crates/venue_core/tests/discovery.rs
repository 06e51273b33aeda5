use venue_core::db::open_db_in_memory;
use venue_core::{
    DiscoveryError, DiscoveryService, ErrorKind, GazetteerGeocoder, GeoPoint, SqliteCatalogStore,
    Venue, VenueFilter, VenueRepository,
};

const ORIGIN: GeoPoint = GeoPoint { lat: 0.0, lng: 0.0 };

fn names(ranked: &[venue_core::NearbyVenue]) -> Vec<&str> {
    ranked.iter().map(|nearby| nearby.venue.name.as_str()).collect()
}

#[test]
fn nearby_ranks_published_venues_with_coordinates() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    store
        .insert_venue(&Venue::new("Far Grill", Some(GeoPoint::new(0.2, 0.0))))
        .unwrap();
    store
        .insert_venue(&Venue::new("Near Bakery", Some(GeoPoint::new(0.1, 0.0))))
        .unwrap();
    store
        .insert_venue(&Venue::new("Out Of Range", Some(GeoPoint::new(0.3, 0.0))))
        .unwrap();
    store.insert_venue(&Venue::new("Pop-up Stall", None)).unwrap();
    let hidden = store
        .insert_venue(&Venue::new("Hidden Bar", Some(GeoPoint::new(0.05, 0.0))))
        .unwrap();
    store.set_venue_published(hidden, false).unwrap();

    let ranked = DiscoveryService::new(store).find_nearby(ORIGIN).unwrap();
    assert_eq!(names(&ranked), vec!["Near Bakery", "Far Grill"]);
    assert!(ranked[0].distance_km < ranked[1].distance_km);
    assert_eq!(ranked[0].distance_label(), "11.1Km");
}

#[test]
fn unpublished_venue_returns_once_republished() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    let id = store
        .insert_venue(&Venue::new("Seasonal Kiosk", Some(GeoPoint::new(0.01, 0.0))))
        .unwrap();
    store.set_venue_published(id, false).unwrap();
    let service = DiscoveryService::new(store);
    assert!(service.find_nearby(ORIGIN).unwrap().is_empty());

    store.set_venue_published(id, true).unwrap();
    assert_eq!(names(&service.find_nearby(ORIGIN).unwrap()), vec!["Seasonal Kiosk"]);
}

#[test]
fn list_venues_filters_by_coordinates_and_limit() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    store.insert_venue(&Venue::new("No Pin", None)).unwrap();
    store
        .insert_venue(&Venue::new("Pinned A", Some(GeoPoint::new(1.0, 1.0))))
        .unwrap();
    store
        .insert_venue(&Venue::new("Pinned B", Some(GeoPoint::new(2.0, 2.0))))
        .unwrap();

    let all = store.list_venues(&VenueFilter::default()).unwrap();
    assert_eq!(all.len(), 3);

    let mut filter = VenueFilter::discoverable();
    filter.limit = Some(1);
    let limited = store.list_venues(&filter).unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].name, "Pinned A");
}

#[test]
fn session_recenters_to_geocoded_address() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    store
        .insert_venue(&Venue::new("Harbour Fish", Some(GeoPoint::new(0.3, 0.0))))
        .unwrap();
    store
        .insert_venue(&Venue::new("Town Cafe", Some(GeoPoint::new(0.1, 0.0))))
        .unwrap();
    let geocoder = GazetteerGeocoder::new().with_place("Old Harbour Pier", GeoPoint::new(0.3, 0.0));
    let service = DiscoveryService::new(store);

    let mut search = service.open_search(ORIGIN).unwrap();
    assert_eq!(names(&search.results()), vec!["Town Cafe"]);
    assert_eq!(search.center_label(&geocoder), "");

    let ranked = search.recenter_to_address(&geocoder, "harbour pier").unwrap();
    assert_eq!(names(&ranked), vec!["Harbour Fish", "Town Cafe"]);
    assert_eq!(ranked[0].distance_label(), "0Km");
    assert_eq!(search.center_label(&geocoder), "Old Harbour Pier");

    assert!(search.recenter_to_address(&geocoder, "atlantis").is_err());
    assert_eq!(search.center(), GeoPoint::new(0.3, 0.0));
}

#[test]
fn address_search_reports_geocode_miss() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    let service = DiscoveryService::new(store);

    let err = service
        .find_nearby_address(&GazetteerGeocoder::new(), "nowhere street")
        .unwrap_err();
    assert!(matches!(err, DiscoveryError::Recenter(_)));
    assert_eq!(err.kind(), ErrorKind::GeocodeMiss);
}

#[test]
fn invalid_center_is_invalid_input() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteCatalogStore::try_new(&conn).unwrap();

    let err = DiscoveryService::new(store)
        .find_nearby(GeoPoint::new(95.0, 0.0))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}
