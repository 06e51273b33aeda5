//! SQLite catalog store shared by the venue, view log and comment repositories.
//!
//! # Responsibility
//! - Own the connection borrow and transaction bootstrap for all repositories.
//! - Translate SQLite failures into semantic repository errors.
//!
//! # Invariants
//! - Every counter mutation runs inside an IMMEDIATE transaction together
//!   with its companion log/flag write.
//! - Busy/locked/unopenable database errors surface as `StoreUnavailable`.

use crate::db::DbError;
use crate::model::comment::CommentId;
use crate::model::venue::{VenueId, VenueValidationError};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const REQUIRED_TABLES: &[&str] = &["venues", "view_logs", "comments", "banned_authors"];

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug)]
pub enum RepoError {
    Validation(VenueValidationError),
    Db(DbError),
    /// Transient store failure; callers may retry.
    StoreUnavailable(DbError),
    VenueNotFound(VenueId),
    CommentNotFound(CommentId),
    InvalidData(String),
    MissingRequiredTable(&'static str),
}

impl RepoError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::StoreUnavailable(err) => write!(f, "catalog store unavailable: {err}"),
            Self::VenueNotFound(id) => write!(f, "venue not found: {id}"),
            Self::CommentNotFound(id) => write!(f, "comment not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid catalog data: {message}"),
            Self::MissingRequiredTable(table) => {
                write!(f, "catalog schema is missing table `{table}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) | Self::StoreUnavailable(err) => Some(err),
            _ => None,
        }
    }
}

impl From<VenueValidationError> for RepoError {
    fn from(value: VenueValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        if value.is_unavailable() {
            Self::StoreUnavailable(value)
        } else {
            Self::Db(value)
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        DbError::Sqlite(value).into()
    }
}

/// Catalog store over one migrated connection.
///
/// Cheap to copy; every repository trait in this module is implemented on it.
#[derive(Clone, Copy)]
pub struct SqliteCatalogStore<'conn> {
    pub(crate) conn: &'conn Connection,
}

impl<'conn> SqliteCatalogStore<'conn> {
    /// Wraps a connection returned by `open_db`/`open_db_in_memory`.
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Wraps a connection after checking the catalog tables exist.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        for table in REQUIRED_TABLES {
            if !table_exists(conn, table)? {
                return Err(RepoError::MissingRequiredTable(table));
            }
        }
        Ok(Self { conn })
    }

    /// Starts a write transaction that takes the database lock up front.
    pub(crate) fn begin_write(&self) -> RepoResult<Transaction<'conn>> {
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?)
    }
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

pub(crate) fn parse_flag(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid flag value `{other}` in {column}"
        ))),
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

/// Converts a 0-based page into a SQL offset.
pub(crate) fn page_offset(page: u32, page_size: u32) -> i64 {
    i64::from(page) * i64::from(page_size)
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
