//! View log persistence and the transactional dedup counter.
//!
//! # Invariants
//! - At most one row per `(visitor_id, venue_id)`.
//! - `record_view_once` checks the window, increments `view_count` in place
//!   and upserts the log row in one IMMEDIATE transaction.
//! - Reassignment keeps the newest `last_viewed_at` on pair collisions.

use crate::model::venue::VenueId;
use crate::model::view_log::ViewLogEntry;
use crate::repo::catalog_store::{parse_uuid, RepoError, RepoResult, SqliteCatalogStore};
use rusqlite::{params, Connection, OptionalExtension, Row};

const VIEW_LOG_SELECT_SQL: &str = "SELECT visitor_id, venue_id, last_viewed_at FROM view_logs";

/// Result of one dedup-checked view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewRecordOutcome {
    /// Counter incremented; `new_total` is the stored value after the write.
    Counted { new_total: i64 },
    /// A log entry inside the window already exists; nothing was written.
    AlreadyCounted,
}

pub trait ViewLogRepository {
    fn get_view_log(&self, visitor_id: &str, venue_id: VenueId)
        -> RepoResult<Option<ViewLogEntry>>;
    /// All entries owned by one visitor, ordered by venue id.
    fn list_view_logs(&self, visitor_id: &str) -> RepoResult<Vec<ViewLogEntry>>;
    fn upsert_view_log(&self, entry: &ViewLogEntry) -> RepoResult<()>;
    /// Moves every entry of `from_id` to `to_id`; returns moved row count.
    fn reassign_view_logs(&self, from_id: &str, to_id: &str) -> RepoResult<usize>;
    fn record_view_once(
        &self,
        visitor_id: &str,
        venue_id: VenueId,
        now_ms: i64,
        window_ms: i64,
    ) -> RepoResult<ViewRecordOutcome>;
}

impl ViewLogRepository for SqliteCatalogStore<'_> {
    fn get_view_log(
        &self,
        visitor_id: &str,
        venue_id: VenueId,
    ) -> RepoResult<Option<ViewLogEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "{VIEW_LOG_SELECT_SQL} WHERE visitor_id = ?1 AND venue_id = ?2;"
        ))?;
        let mut rows = stmt.query(params![visitor_id, venue_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_view_log_row(row)?));
        }
        Ok(None)
    }

    fn list_view_logs(&self, visitor_id: &str) -> RepoResult<Vec<ViewLogEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "{VIEW_LOG_SELECT_SQL} WHERE visitor_id = ?1 ORDER BY venue_id ASC;"
        ))?;
        let mut rows = stmt.query([visitor_id])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_view_log_row(row)?);
        }
        Ok(entries)
    }

    fn upsert_view_log(&self, entry: &ViewLogEntry) -> RepoResult<()> {
        upsert_view_log_on(self.conn, entry)
    }

    fn reassign_view_logs(&self, from_id: &str, to_id: &str) -> RepoResult<usize> {
        if from_id == to_id {
            return Ok(0);
        }

        let tx = self.begin_write()?;
        // The WHERE clause keeps the SELECT from being parsed as part of the
        // upsert's conflict target.
        tx.execute(
            "INSERT INTO view_logs (visitor_id, venue_id, last_viewed_at)
             SELECT ?2, venue_id, last_viewed_at
             FROM view_logs
             WHERE visitor_id = ?1
             ON CONFLICT (visitor_id, venue_id) DO UPDATE
             SET last_viewed_at = MAX(view_logs.last_viewed_at, excluded.last_viewed_at);",
            params![from_id, to_id],
        )?;
        let moved = tx.execute("DELETE FROM view_logs WHERE visitor_id = ?1;", [from_id])?;
        tx.commit()?;

        Ok(moved)
    }

    fn record_view_once(
        &self,
        visitor_id: &str,
        venue_id: VenueId,
        now_ms: i64,
        window_ms: i64,
    ) -> RepoResult<ViewRecordOutcome> {
        let venue_key = venue_id.to_string();

        let tx = self.begin_write()?;
        let previous = tx
            .query_row(
                &format!("{VIEW_LOG_SELECT_SQL} WHERE visitor_id = ?1 AND venue_id = ?2;"),
                params![visitor_id, venue_key.as_str()],
                |row| Ok(parse_view_log_row(row)),
            )
            .optional()?
            .transpose()?;
        if previous.is_some_and(|entry| entry.is_within_window(now_ms, window_ms)) {
            return Ok(ViewRecordOutcome::AlreadyCounted);
        }

        let changed = tx.execute(
            "UPDATE venues SET view_count = view_count + 1 WHERE id = ?1;",
            [venue_key.as_str()],
        )?;
        if changed == 0 {
            return Err(RepoError::VenueNotFound(venue_id));
        }
        let new_total: i64 = tx.query_row(
            "SELECT view_count FROM venues WHERE id = ?1;",
            [venue_key.as_str()],
            |row| row.get(0),
        )?;

        upsert_view_log_on(&tx, &ViewLogEntry::new(visitor_id, venue_id, now_ms))?;
        tx.commit()?;

        Ok(ViewRecordOutcome::Counted { new_total })
    }
}

fn upsert_view_log_on(conn: &Connection, entry: &ViewLogEntry) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO view_logs (visitor_id, venue_id, last_viewed_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT (visitor_id, venue_id) DO UPDATE
         SET last_viewed_at = excluded.last_viewed_at;",
        params![
            entry.visitor_id.as_str(),
            entry.venue_id.to_string(),
            entry.last_viewed_at
        ],
    )?;
    Ok(())
}

fn parse_view_log_row(row: &Row<'_>) -> RepoResult<ViewLogEntry> {
    let venue_text: String = row.get("venue_id")?;
    Ok(ViewLogEntry {
        visitor_id: row.get("visitor_id")?,
        venue_id: parse_uuid(&venue_text, "view_logs.venue_id")?,
        last_viewed_at: row.get("last_viewed_at")?,
    })
}
