use rusqlite::Connection;
use venue_core::db::open_db_in_memory;
use venue_core::{
    ErrorKind, GeoPoint, SqliteCatalogStore, Venue, VenueId, VenueRepository,
    ViewDeduplicationService, ViewLogRepository, ViewServiceError, VisitorIdentity,
};

const HOUR_MS: i64 = 60 * 60 * 1000;
const DAY_MS: i64 = 24 * HOUR_MS;
const T0: i64 = 1_700_000_000_000;

fn seed_venue(conn: &Connection) -> VenueId {
    let store = SqliteCatalogStore::try_new(conn).unwrap();
    store
        .insert_venue(&Venue::new("Dumpling House", Some(GeoPoint::new(25.03, 121.56))))
        .unwrap()
}

fn view_count(conn: &Connection, venue_id: VenueId) -> i64 {
    let store = SqliteCatalogStore::try_new(conn).unwrap();
    store.get_venue(venue_id).unwrap().unwrap().view_count
}

#[test]
fn repeat_view_within_a_day_counts_once() {
    let conn = open_db_in_memory().unwrap();
    let venue_id = seed_venue(&conn);
    let service = ViewDeduplicationService::new(SqliteCatalogStore::try_new(&conn).unwrap());
    let visitor = VisitorIdentity::anonymous("anon-1");

    let first = service.register_view_at(&visitor, venue_id, T0).unwrap();
    assert!(first.counted);
    assert_eq!(first.new_total, Some(1));

    let second = service
        .register_view_at(&visitor, venue_id, T0 + HOUR_MS)
        .unwrap();
    assert!(!second.counted);
    assert_eq!(second.new_total, None);
    assert_eq!(view_count(&conn, venue_id), 1);
}

#[test]
fn view_after_window_counts_again_and_refreshes_timestamp() {
    let conn = open_db_in_memory().unwrap();
    let venue_id = seed_venue(&conn);
    let service = ViewDeduplicationService::new(SqliteCatalogStore::try_new(&conn).unwrap());
    let visitor = VisitorIdentity::authenticated("member-7");

    service.register_view_at(&visitor, venue_id, T0).unwrap();
    let later = service
        .register_view_at(&visitor, venue_id, T0 + DAY_MS)
        .unwrap();
    assert!(later.counted);
    assert_eq!(later.new_total, Some(2));

    let entry = service.last_view(&visitor, venue_id).unwrap().unwrap();
    assert_eq!(entry.last_viewed_at, T0 + DAY_MS);
}

#[test]
fn views_just_inside_window_are_not_counted() {
    let conn = open_db_in_memory().unwrap();
    let venue_id = seed_venue(&conn);
    let service = ViewDeduplicationService::new(SqliteCatalogStore::try_new(&conn).unwrap());
    let visitor = VisitorIdentity::anonymous("anon-edge");

    service.register_view_at(&visitor, venue_id, T0).unwrap();
    let edge = service
        .register_view_at(&visitor, venue_id, T0 + DAY_MS - 1)
        .unwrap();
    assert!(!edge.counted);
    assert_eq!(view_count(&conn, venue_id), 1);
}

#[test]
fn distinct_visitors_each_count() {
    let conn = open_db_in_memory().unwrap();
    let venue_id = seed_venue(&conn);
    let service = ViewDeduplicationService::new(SqliteCatalogStore::try_new(&conn).unwrap());

    for visitor in ["anon-a", "anon-b", "anon-c"] {
        let registration = service
            .register_view_at(&VisitorIdentity::anonymous(visitor), venue_id, T0)
            .unwrap();
        assert!(registration.counted);
    }
    assert_eq!(view_count(&conn, venue_id), 3);
}

#[test]
fn unknown_venue_is_not_found_and_leaves_no_log() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    let service = ViewDeduplicationService::new(store);
    let visitor = VisitorIdentity::anonymous("anon-lost");
    let missing = uuid::Uuid::new_v4();

    let err = service.register_view_at(&visitor, missing, T0).unwrap_err();
    assert!(matches!(err, ViewServiceError::VenueNotFound(id) if id == missing));
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(store.list_view_logs("anon-lost").unwrap().is_empty());
}

#[test]
fn empty_identity_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let venue_id = seed_venue(&conn);
    let service = ViewDeduplicationService::new(SqliteCatalogStore::try_new(&conn).unwrap());

    let err = service
        .register_view_at(&VisitorIdentity::anonymous("  "), venue_id, T0)
        .unwrap_err();
    assert!(matches!(err, ViewServiceError::EmptyIdentity));
    assert_eq!(view_count(&conn, venue_id), 0);
}
