//! Comment persistence and moderation transitions.
//!
//! # Responsibility
//! - Store new comments as pending rows.
//! - Apply approve/reject/withdraw transitions together with the matching
//!   `venues.comment_count` adjustment.
//!
//! # Invariants
//! - `comment_count(v) == count(status = 'admitted' AND venue_id = v)` after
//!   every committed transition.
//! - Inserts never change counters.
//! - Counter decrements are floored at 0.

use crate::model::comment::{CommentId, CommentRecord, CommentStatus};
use crate::model::venue::VenueId;
use crate::repo::catalog_store::{
    page_offset, parse_uuid, RepoError, RepoResult, SqliteCatalogStore,
};
use rusqlite::{params, OptionalExtension, Row, Transaction};
use std::collections::{BTreeMap, BTreeSet};

const COMMENT_SELECT_SQL: &str = "SELECT
    id,
    venue_id,
    author_id,
    body,
    status,
    created_at
FROM comments";

/// Counter state of one venue after a moderation transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VenueCommentCount {
    pub venue_id: VenueId,
    pub comment_count: i64,
}

/// Effect of one approve/reject batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModerationOutcome {
    /// Comments whose status actually changed.
    pub changed: Vec<CommentId>,
    /// Updated counters of every venue whose count moved.
    pub venues: Vec<VenueCommentCount>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawOutcome {
    Withdrawn {
        venue_id: VenueId,
        was_admitted: bool,
        comment_count: i64,
    },
    /// The requester did not author the comment; nothing was written.
    NotAuthor,
}

pub trait CommentRepository {
    /// Inserts a pending comment. Rejects rows in any other status.
    fn insert_comment(&self, comment: &CommentRecord) -> RepoResult<CommentId>;
    fn get_comment(&self, id: CommentId) -> RepoResult<Option<CommentRecord>>;
    /// Admitted (or pending) comments of one venue, newest first, 0-based page.
    fn list_comments(
        &self,
        venue_id: VenueId,
        admitted: bool,
        page: u32,
        page_size: u32,
    ) -> RepoResult<Vec<CommentRecord>>;
    /// Moderation queue across all venues, oldest first, 0-based page.
    fn list_pending_comments(&self, page: u32, page_size: u32) -> RepoResult<Vec<CommentRecord>>;
    fn count_admitted_comments(&self, venue_id: VenueId) -> RepoResult<i64>;
    fn admit_comments(&self, ids: &[CommentId]) -> RepoResult<ModerationOutcome>;
    fn reject_comments(&self, ids: &[CommentId]) -> RepoResult<ModerationOutcome>;
    fn withdraw_comment(&self, id: CommentId, requester_id: &str) -> RepoResult<WithdrawOutcome>;
    fn is_author_banned(&self, user_id: &str) -> RepoResult<bool>;
    fn ban_author(&self, user_id: &str, now_ms: i64) -> RepoResult<()>;
    fn unban_author(&self, user_id: &str) -> RepoResult<()>;
}

impl CommentRepository for SqliteCatalogStore<'_> {
    fn insert_comment(&self, comment: &CommentRecord) -> RepoResult<CommentId> {
        if comment.status != CommentStatus::Pending {
            return Err(RepoError::InvalidData(
                "new comments must start in pending status".to_string(),
            ));
        }

        let venue_exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM venues WHERE id = ?1);",
            [comment.venue_id.to_string()],
            |row| row.get(0),
        )?;
        if venue_exists != 1 {
            return Err(RepoError::VenueNotFound(comment.venue_id));
        }

        self.conn.execute(
            "INSERT INTO comments (
                id,
                venue_id,
                author_id,
                body,
                status,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                comment.id.to_string(),
                comment.venue_id.to_string(),
                comment.author_id.as_str(),
                comment.body.as_str(),
                CommentStatus::Pending.as_db(),
                comment.created_at,
            ],
        )?;

        Ok(comment.id)
    }

    fn get_comment(&self, id: CommentId) -> RepoResult<Option<CommentRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{COMMENT_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_comment_row(row)?));
        }
        Ok(None)
    }

    fn list_comments(
        &self,
        venue_id: VenueId,
        admitted: bool,
        page: u32,
        page_size: u32,
    ) -> RepoResult<Vec<CommentRecord>> {
        let status = if admitted {
            CommentStatus::Admitted
        } else {
            CommentStatus::Pending
        };
        let mut stmt = self.conn.prepare(&format!(
            "{COMMENT_SELECT_SQL}
             WHERE venue_id = ?1
               AND status = ?2
             ORDER BY created_at DESC, id ASC
             LIMIT ?3 OFFSET ?4;"
        ))?;
        let mut rows = stmt.query(params![
            venue_id.to_string(),
            status.as_db(),
            i64::from(page_size),
            page_offset(page, page_size),
        ])?;
        collect_comments(&mut rows)
    }

    fn list_pending_comments(&self, page: u32, page_size: u32) -> RepoResult<Vec<CommentRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{COMMENT_SELECT_SQL}
             WHERE status = 'pending'
             ORDER BY created_at ASC, id ASC
             LIMIT ?1 OFFSET ?2;"
        ))?;
        let mut rows = stmt.query(params![
            i64::from(page_size),
            page_offset(page, page_size)
        ])?;
        collect_comments(&mut rows)
    }

    fn count_admitted_comments(&self, venue_id: VenueId) -> RepoResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM comments WHERE venue_id = ?1 AND status = 'admitted';",
            [venue_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn admit_comments(&self, ids: &[CommentId]) -> RepoResult<ModerationOutcome> {
        let tx = self.begin_write()?;
        let mut changed = Vec::new();
        let mut per_venue: BTreeMap<VenueId, i64> = BTreeMap::new();

        for id in distinct(ids) {
            let Some((venue_id, status)) = load_status(&tx, id)? else {
                continue;
            };
            if status == CommentStatus::Admitted {
                continue;
            }
            set_status(&tx, id, CommentStatus::Admitted)?;
            changed.push(id);
            *per_venue.entry(venue_id).or_insert(0) += 1;
        }

        let venues = apply_count_deltas(&tx, &per_venue)?;
        tx.commit()?;
        Ok(ModerationOutcome { changed, venues })
    }

    fn reject_comments(&self, ids: &[CommentId]) -> RepoResult<ModerationOutcome> {
        let tx = self.begin_write()?;
        let mut changed = Vec::new();
        let mut per_venue: BTreeMap<VenueId, i64> = BTreeMap::new();

        for id in distinct(ids) {
            let Some((venue_id, status)) = load_status(&tx, id)? else {
                continue;
            };
            if status == CommentStatus::Rejected {
                continue;
            }
            set_status(&tx, id, CommentStatus::Rejected)?;
            changed.push(id);
            if status == CommentStatus::Admitted {
                *per_venue.entry(venue_id).or_insert(0) -= 1;
            }
        }

        let venues = apply_count_deltas(&tx, &per_venue)?;
        tx.commit()?;
        Ok(ModerationOutcome { changed, venues })
    }

    fn withdraw_comment(&self, id: CommentId, requester_id: &str) -> RepoResult<WithdrawOutcome> {
        let tx = self.begin_write()?;
        let row: Option<(String, String, String)> = tx
            .query_row(
                "SELECT venue_id, author_id, status FROM comments WHERE id = ?1;",
                [id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let Some((venue_text, author_id, status_text)) = row else {
            return Err(RepoError::CommentNotFound(id));
        };
        if author_id != requester_id {
            return Ok(WithdrawOutcome::NotAuthor);
        }

        let venue_id = parse_uuid(&venue_text, "comments.venue_id")?;
        let was_admitted = parse_status(&status_text)? == CommentStatus::Admitted;

        tx.execute("DELETE FROM comments WHERE id = ?1;", [id.to_string()])?;
        let comment_count = if was_admitted {
            let mut delta = BTreeMap::new();
            delta.insert(venue_id, -1);
            apply_count_deltas(&tx, &delta)?
                .first()
                .map(|count| count.comment_count)
                .unwrap_or(0)
        } else {
            current_comment_count(&tx, venue_id)?
        };
        tx.commit()?;

        Ok(WithdrawOutcome::Withdrawn {
            venue_id,
            was_admitted,
            comment_count,
        })
    }

    fn is_author_banned(&self, user_id: &str) -> RepoResult<bool> {
        let banned: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM banned_authors WHERE user_id = ?1);",
            [user_id],
            |row| row.get(0),
        )?;
        Ok(banned == 1)
    }

    fn ban_author(&self, user_id: &str, now_ms: i64) -> RepoResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO banned_authors (user_id, banned_at) VALUES (?1, ?2);",
            params![user_id, now_ms],
        )?;
        Ok(())
    }

    fn unban_author(&self, user_id: &str) -> RepoResult<()> {
        self.conn
            .execute("DELETE FROM banned_authors WHERE user_id = ?1;", [user_id])?;
        Ok(())
    }
}

fn distinct(ids: &[CommentId]) -> Vec<CommentId> {
    let mut seen = BTreeSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

fn load_status(tx: &Transaction<'_>, id: CommentId) -> RepoResult<Option<(VenueId, CommentStatus)>> {
    let row: Option<(String, String)> = tx
        .query_row(
            "SELECT venue_id, status FROM comments WHERE id = ?1;",
            [id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    match row {
        Some((venue_text, status_text)) => Ok(Some((
            parse_uuid(&venue_text, "comments.venue_id")?,
            parse_status(&status_text)?,
        ))),
        None => Ok(None),
    }
}

fn set_status(tx: &Transaction<'_>, id: CommentId, status: CommentStatus) -> RepoResult<()> {
    tx.execute(
        "UPDATE comments SET status = ?2 WHERE id = ?1;",
        params![id.to_string(), status.as_db()],
    )?;
    Ok(())
}

fn apply_count_deltas(
    tx: &Transaction<'_>,
    deltas: &BTreeMap<VenueId, i64>,
) -> RepoResult<Vec<VenueCommentCount>> {
    let mut counts = Vec::new();
    for (venue_id, delta) in deltas {
        if *delta == 0 {
            continue;
        }
        let changed = tx.execute(
            "UPDATE venues
             SET comment_count = MAX(comment_count + ?2, 0)
             WHERE id = ?1;",
            params![venue_id.to_string(), delta],
        )?;
        if changed == 0 {
            return Err(RepoError::VenueNotFound(*venue_id));
        }
        counts.push(VenueCommentCount {
            venue_id: *venue_id,
            comment_count: current_comment_count(tx, *venue_id)?,
        });
    }
    Ok(counts)
}

fn current_comment_count(tx: &Transaction<'_>, venue_id: VenueId) -> RepoResult<i64> {
    let count = tx.query_row(
        "SELECT comment_count FROM venues WHERE id = ?1;",
        [venue_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn collect_comments(rows: &mut rusqlite::Rows<'_>) -> RepoResult<Vec<CommentRecord>> {
    let mut comments = Vec::new();
    while let Some(row) = rows.next()? {
        comments.push(parse_comment_row(row)?);
    }
    Ok(comments)
}

fn parse_status(value: &str) -> RepoResult<CommentStatus> {
    CommentStatus::parse_db(value).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid comment status `{value}` in comments.status"))
    })
}

fn parse_comment_row(row: &Row<'_>) -> RepoResult<CommentRecord> {
    let id_text: String = row.get("id")?;
    let venue_text: String = row.get("venue_id")?;
    let status_text: String = row.get("status")?;
    Ok(CommentRecord {
        id: parse_uuid(&id_text, "comments.id")?,
        venue_id: parse_uuid(&venue_text, "comments.venue_id")?,
        author_id: row.get("author_id")?,
        body: row.get("body")?,
        created_at: row.get("created_at")?,
        status: parse_status(&status_text)?,
    })
}
