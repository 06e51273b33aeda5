use rusqlite::Connection;
use venue_core::db::open_db_in_memory;
use venue_core::{
    CommentModerationQueue, CommentRepository, CommentServiceError, CommentStatus, ErrorKind,
    SqliteCatalogStore, SubmissionRateLimiter, Venue, VenueId, VenueRepository, VisitorIdentity,
};

const T0: i64 = 1_700_000_000_000;
const MINUTE_MS: i64 = 60 * 1000;

fn seed_venue(conn: &Connection) -> VenueId {
    let store = SqliteCatalogStore::try_new(conn).unwrap();
    store.insert_venue(&Venue::new("Noodle Bar", None)).unwrap()
}

fn comment_count(store: SqliteCatalogStore<'_>, venue_id: VenueId) -> i64 {
    store.get_venue(venue_id).unwrap().unwrap().comment_count
}

fn assert_count_matches_admitted(store: SqliteCatalogStore<'_>, venue_id: VenueId) {
    assert_eq!(
        comment_count(store, venue_id),
        store.count_admitted_comments(venue_id).unwrap()
    );
}

#[test]
fn submission_is_pending_and_does_not_move_counter() {
    let conn = open_db_in_memory().unwrap();
    let venue_id = seed_venue(&conn);
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    let queue = CommentModerationQueue::new(store);
    let mut limiter = SubmissionRateLimiter::default();

    let comment = queue
        .submit_at(
            &mut limiter,
            &VisitorIdentity::authenticated("author-1"),
            venue_id,
            "  Great broth  ",
            T0,
        )
        .unwrap();
    assert_eq!(comment.status, CommentStatus::Pending);
    assert_eq!(comment.body, "Great broth");
    assert_eq!(comment_count(store, venue_id), 0);
    assert_eq!(queue.list_pending(0).unwrap(), vec![comment]);
    assert!(queue.list_public(venue_id, 0).unwrap().items.is_empty());
}

#[test]
fn approve_batch_counts_each_comment_once() {
    let conn = open_db_in_memory().unwrap();
    let venue_id = seed_venue(&conn);
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    let queue = CommentModerationQueue::new(store);
    let mut limiter = SubmissionRateLimiter::default();
    let author = VisitorIdentity::authenticated("author-2");

    let first = queue
        .submit_at(&mut limiter, &author, venue_id, "one", T0)
        .unwrap();
    let second = queue
        .submit_at(&mut limiter, &author, venue_id, "two", T0 + 1)
        .unwrap();

    let outcome = queue.approve(&[first.id, second.id, first.id]).unwrap();
    assert_eq!(outcome.changed, vec![first.id, second.id]);
    assert_eq!(outcome.venues.len(), 1);
    assert_eq!(outcome.venues[0].comment_count, 2);

    let again = queue.approve(&[first.id, second.id]).unwrap();
    assert!(again.changed.is_empty());
    assert!(again.venues.is_empty());
    assert_eq!(comment_count(store, venue_id), 2);
    assert_count_matches_admitted(store, venue_id);
}

#[test]
fn approve_ignores_unknown_ids() {
    let conn = open_db_in_memory().unwrap();
    let venue_id = seed_venue(&conn);
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    let queue = CommentModerationQueue::new(store);

    let outcome = queue.approve(&[uuid::Uuid::new_v4()]).unwrap();
    assert!(outcome.changed.is_empty());
    assert_eq!(comment_count(store, venue_id), 0);
}

#[test]
fn withdraw_admitted_comment_decrements_once() {
    let conn = open_db_in_memory().unwrap();
    let venue_id = seed_venue(&conn);
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    let queue = CommentModerationQueue::new(store);
    let mut limiter = SubmissionRateLimiter::default();
    let author = VisitorIdentity::authenticated("author-3");

    let comment = queue
        .submit_at(&mut limiter, &author, venue_id, "soon gone", T0)
        .unwrap();
    queue.approve(&[comment.id]).unwrap();

    let receipt = queue.withdraw(comment.id, "author-3").unwrap();
    assert!(receipt.was_admitted);
    assert_eq!(receipt.venue_id, venue_id);
    assert_eq!(receipt.comment_count, 0);

    let err = queue.withdraw(comment.id, "author-3").unwrap_err();
    assert!(matches!(err, CommentServiceError::CommentNotFound(id) if id == comment.id));
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(comment_count(store, venue_id), 0);
}

#[test]
fn withdraw_pending_comment_leaves_counter() {
    let conn = open_db_in_memory().unwrap();
    let venue_id = seed_venue(&conn);
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    let queue = CommentModerationQueue::new(store);
    let mut limiter = SubmissionRateLimiter::default();
    let author = VisitorIdentity::authenticated("author-4");

    let admitted = queue
        .submit_at(&mut limiter, &author, venue_id, "kept", T0)
        .unwrap();
    queue.approve(&[admitted.id]).unwrap();
    let pending = queue
        .submit_at(&mut limiter, &author, venue_id, "draft", T0 + 1)
        .unwrap();

    let receipt = queue.withdraw(pending.id, "author-4").unwrap();
    assert!(!receipt.was_admitted);
    assert_eq!(receipt.comment_count, 1);
    assert_count_matches_admitted(store, venue_id);
}

#[test]
fn withdraw_by_someone_else_is_refused() {
    let conn = open_db_in_memory().unwrap();
    let venue_id = seed_venue(&conn);
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    let queue = CommentModerationQueue::new(store);
    let mut limiter = SubmissionRateLimiter::default();

    let comment = queue
        .submit_at(
            &mut limiter,
            &VisitorIdentity::authenticated("author-5"),
            venue_id,
            "mine",
            T0,
        )
        .unwrap();
    queue.approve(&[comment.id]).unwrap();

    let err = queue.withdraw(comment.id, "intruder").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAuthor);
    assert!(store.get_comment(comment.id).unwrap().is_some());
    assert_eq!(comment_count(store, venue_id), 1);
}

#[test]
fn reject_removes_admitted_comment_from_counter() {
    let conn = open_db_in_memory().unwrap();
    let venue_id = seed_venue(&conn);
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    let queue = CommentModerationQueue::new(store);
    let mut limiter = SubmissionRateLimiter::default();
    let author = VisitorIdentity::authenticated("author-6");

    let admitted = queue
        .submit_at(&mut limiter, &author, venue_id, "first", T0)
        .unwrap();
    let pending = queue
        .submit_at(&mut limiter, &author, venue_id, "second", T0 + 1)
        .unwrap();
    queue.approve(&[admitted.id]).unwrap();

    let outcome = queue.reject(&[admitted.id, pending.id]).unwrap();
    assert_eq!(outcome.changed, vec![admitted.id, pending.id]);
    assert_eq!(comment_count(store, venue_id), 0);
    assert_eq!(
        store.get_comment(pending.id).unwrap().unwrap().status,
        CommentStatus::Rejected
    );

    let reapproved = queue.approve(&[admitted.id]).unwrap();
    assert_eq!(reapproved.changed, vec![admitted.id]);
    assert_eq!(comment_count(store, venue_id), 1);
    assert_count_matches_admitted(store, venue_id);
}

#[test]
fn anonymous_and_banned_authors_cannot_submit() {
    let conn = open_db_in_memory().unwrap();
    let venue_id = seed_venue(&conn);
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    let queue = CommentModerationQueue::new(store);
    let mut limiter = SubmissionRateLimiter::default();

    let err = queue
        .submit_at(
            &mut limiter,
            &VisitorIdentity::anonymous("anon-1"),
            venue_id,
            "hi",
            T0,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthenticated);

    queue.ban_author("troll").unwrap();
    let err = queue
        .submit_at(
            &mut limiter,
            &VisitorIdentity::authenticated("troll"),
            venue_id,
            "spam",
            T0,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Banned);
    assert!(queue.list_pending(0).unwrap().is_empty());

    queue.unban_author("troll").unwrap();
    queue
        .submit_at(
            &mut limiter,
            &VisitorIdentity::authenticated("troll"),
            venue_id,
            "sorry",
            T0,
        )
        .unwrap();
}

#[test]
fn eleventh_submission_in_a_minute_is_rate_limited() {
    let conn = open_db_in_memory().unwrap();
    let venue_id = seed_venue(&conn);
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    let queue = CommentModerationQueue::new(store);
    let mut limiter = SubmissionRateLimiter::default();
    let author = VisitorIdentity::authenticated("author-7");

    for index in 0..10 {
        queue
            .submit_at(&mut limiter, &author, venue_id, "again", T0 + index)
            .unwrap();
    }
    let err = queue
        .submit_at(&mut limiter, &author, venue_id, "again", T0 + 10)
        .unwrap_err();
    assert!(matches!(
        err,
        CommentServiceError::RateLimited { retry_after_ms } if retry_after_ms == MINUTE_MS - 10
    ));
    assert_eq!(err.kind(), ErrorKind::RateLimited);

    queue
        .submit_at(&mut limiter, &author, venue_id, "later", T0 + MINUTE_MS)
        .unwrap();
    assert_eq!(queue.list_pending(0).unwrap().len(), 5);
}

#[test]
fn invalid_bodies_do_not_consume_rate_limit() {
    let conn = open_db_in_memory().unwrap();
    let venue_id = seed_venue(&conn);
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    let queue = CommentModerationQueue::new(store);
    let mut limiter = SubmissionRateLimiter::new(1, MINUTE_MS);
    let author = VisitorIdentity::authenticated("author-8");

    let err = queue
        .submit_at(&mut limiter, &author, venue_id, " \n ", T0)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(limiter.retained(), 0);

    queue
        .submit_at(&mut limiter, &author, venue_id, "real", T0)
        .unwrap();
    assert_eq!(limiter.retained(), 1);
}

#[test]
fn submission_to_unknown_venue_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    let queue = CommentModerationQueue::new(store);
    let mut limiter = SubmissionRateLimiter::default();

    let err = queue
        .submit_at(
            &mut limiter,
            &VisitorIdentity::authenticated("author-9"),
            uuid::Uuid::new_v4(),
            "where am I",
            T0,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn public_listing_is_newest_first_in_pages_of_five() {
    let conn = open_db_in_memory().unwrap();
    let venue_id = seed_venue(&conn);
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    let queue = CommentModerationQueue::new(store);
    let mut limiter = SubmissionRateLimiter::new(100, MINUTE_MS);
    let author = VisitorIdentity::authenticated("author-10");

    let mut ids = Vec::new();
    for index in 0..7 {
        let comment = queue
            .submit_at(
                &mut limiter,
                &author,
                venue_id,
                &format!("comment {index}"),
                T0 + index,
            )
            .unwrap();
        ids.push(comment.id);
    }
    queue.approve(&ids).unwrap();

    let first_page = queue.list_public(venue_id, 0).unwrap();
    assert_eq!(first_page.items.len(), 5);
    assert_eq!(first_page.items[0].body, "comment 6");
    assert_eq!(first_page.items[4].body, "comment 2");
    assert_eq!(first_page.total_admitted, 7);
    assert!(first_page.has_more());

    let second_page = queue.list_public(venue_id, 1).unwrap();
    let bodies: Vec<&str> = second_page.items.iter().map(|c| c.body.as_str()).collect();
    assert_eq!(bodies, vec!["comment 1", "comment 0"]);
    assert!(!second_page.has_more());
    assert_count_matches_admitted(store, venue_id);
}
