use std::path::{Path, PathBuf};
use std::sync::{Arc, Barrier};
use std::thread;
use venue_core::db::open_db;
use venue_core::{
    CommentModerationQueue, CommentRepository, CommentStatus, ErrorKind, SqliteCatalogStore,
    SubmissionRateLimiter, Venue, VenueId, VenueRepository, ViewDeduplicationService,
    VisitorIdentity,
};

const T0: i64 = 1_700_000_000_000;

fn catalog_with_venue(dir: &Path) -> (PathBuf, VenueId) {
    let path = dir.join("catalog.db");
    let conn = open_db(&path).unwrap();
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    let venue_id = store.insert_venue(&Venue::new("Shared Counter", None)).unwrap();
    (path, venue_id)
}

fn submit_pending(path: &Path, venue_id: VenueId, author: &str, count: usize) -> Vec<uuid::Uuid> {
    let conn = open_db(path).unwrap();
    let queue = CommentModerationQueue::new(SqliteCatalogStore::try_new(&conn).unwrap());
    let mut limiter = SubmissionRateLimiter::new(100, 60_000);
    let identity = VisitorIdentity::authenticated(author);
    (0..count)
        .map(|index| {
            queue
                .submit_at(
                    &mut limiter,
                    &identity,
                    venue_id,
                    &format!("note {index}"),
                    T0 + index as i64,
                )
                .unwrap()
                .id
        })
        .collect()
}

fn stored_venue(path: &Path, venue_id: VenueId) -> Venue {
    let conn = open_db(path).unwrap();
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    store.get_venue(venue_id).unwrap().unwrap()
}

#[test]
fn concurrent_views_of_one_pair_count_once() {
    let dir = tempfile::tempdir().unwrap();
    let (path, venue_id) = catalog_with_venue(dir.path());
    let workers = 8;
    let barrier = Arc::new(Barrier::new(workers));

    let handles: Vec<_> = (0..workers)
        .map(|_| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let service =
                    ViewDeduplicationService::new(SqliteCatalogStore::try_new(&conn).unwrap());
                barrier.wait();
                service
                    .register_view_at(&VisitorIdentity::anonymous("anon-race"), venue_id, T0)
                    .unwrap()
                    .counted
            })
        })
        .collect();

    let counted = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .filter(|counted| *counted)
        .count();
    assert_eq!(counted, 1);
    assert_eq!(stored_venue(&path, venue_id).view_count, 1);
}

#[test]
fn overlapping_approvals_admit_each_comment_once() {
    let dir = tempfile::tempdir().unwrap();
    let (path, venue_id) = catalog_with_venue(dir.path());
    let ids = submit_pending(&path, venue_id, "author-race", 2);
    let workers = 6;
    let barrier = Arc::new(Barrier::new(workers));

    let handles: Vec<_> = (0..workers)
        .map(|_| {
            let path = path.clone();
            let ids = ids.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let queue =
                    CommentModerationQueue::new(SqliteCatalogStore::try_new(&conn).unwrap());
                barrier.wait();
                queue.approve(&ids).unwrap().changed.len()
            })
        })
        .collect();

    let changed_total: usize = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .sum();
    assert_eq!(changed_total, 2);
    assert_eq!(stored_venue(&path, venue_id).comment_count, 2);
}

#[test]
fn failed_counter_update_rolls_back_admission() {
    let dir = tempfile::tempdir().unwrap();
    let (path, venue_id) = catalog_with_venue(dir.path());
    let ids = submit_pending(&path, venue_id, "author-rollback", 1);

    let conn = open_db(&path).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER freeze_comment_count
         BEFORE UPDATE OF comment_count ON venues
         BEGIN
             SELECT RAISE(ABORT, 'comment_count frozen');
         END;",
    )
    .unwrap();
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    let queue = CommentModerationQueue::new(store);

    let err = queue.approve(&ids).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert_eq!(
        store.get_comment(ids[0]).unwrap().unwrap().status,
        CommentStatus::Pending
    );
    assert_eq!(store.get_venue(venue_id).unwrap().unwrap().comment_count, 0);
}

#[test]
fn withdraw_clamps_counter_at_zero() {
    let dir = tempfile::tempdir().unwrap();
    let (path, venue_id) = catalog_with_venue(dir.path());
    let ids = submit_pending(&path, venue_id, "author-clamp", 1);

    let conn = open_db(&path).unwrap();
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    let queue = CommentModerationQueue::new(store);
    queue.approve(&ids).unwrap();
    conn.execute(
        "UPDATE venues SET comment_count = 0 WHERE id = ?1;",
        [venue_id.to_string()],
    )
    .unwrap();

    let receipt = queue.withdraw(ids[0], "author-clamp").unwrap();
    assert!(receipt.was_admitted);
    assert_eq!(receipt.comment_count, 0);
    assert_eq!(store.get_venue(venue_id).unwrap().unwrap().comment_count, 0);
}
