//! Venue reads and seeding.
//!
//! Counter columns are never written here; see the view log and comment
//! repositories for the only mutation paths.

use crate::model::venue::{GeoPoint, Venue, VenueId};
use crate::repo::catalog_store::{
    bool_to_int, parse_flag, parse_uuid, RepoError, RepoResult, SqliteCatalogStore,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Row};

const VENUE_SELECT_SQL: &str = "SELECT
    id,
    name,
    lat,
    lng,
    published,
    view_count,
    comment_count
FROM venues";

/// Listing filter for discovery candidates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VenueFilter {
    /// Only venues with a stored coordinate pair.
    pub has_coordinates: bool,
    /// Only published venues.
    pub published_only: bool,
    pub limit: Option<u32>,
}

impl VenueFilter {
    /// Filter used to load nearby-search candidates.
    pub fn discoverable() -> Self {
        Self {
            has_coordinates: true,
            published_only: true,
            limit: None,
        }
    }
}

pub trait VenueRepository {
    fn insert_venue(&self, venue: &Venue) -> RepoResult<VenueId>;
    fn get_venue(&self, id: VenueId) -> RepoResult<Option<Venue>>;
    /// Lists venues in insertion order.
    fn list_venues(&self, filter: &VenueFilter) -> RepoResult<Vec<Venue>>;
    fn set_venue_published(&self, id: VenueId, published: bool) -> RepoResult<()>;
}

impl VenueRepository for SqliteCatalogStore<'_> {
    fn insert_venue(&self, venue: &Venue) -> RepoResult<VenueId> {
        venue.validate()?;

        self.conn.execute(
            "INSERT INTO venues (
                id,
                name,
                lat,
                lng,
                published,
                view_count,
                comment_count
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                venue.id.to_string(),
                venue.name.trim(),
                venue.location.map(|p| p.lat),
                venue.location.map(|p| p.lng),
                bool_to_int(venue.published),
                venue.view_count,
                venue.comment_count,
            ],
        )?;

        Ok(venue.id)
    }

    fn get_venue(&self, id: VenueId) -> RepoResult<Option<Venue>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{VENUE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_venue_row(row)?));
        }
        Ok(None)
    }

    fn list_venues(&self, filter: &VenueFilter) -> RepoResult<Vec<Venue>> {
        let mut sql = format!("{VENUE_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if filter.has_coordinates {
            sql.push_str(" AND lat IS NOT NULL AND lng IS NOT NULL");
        }
        if filter.published_only {
            sql.push_str(" AND published = 1");
        }
        sql.push_str(" ORDER BY rowid ASC");
        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut venues = Vec::new();
        while let Some(row) = rows.next()? {
            venues.push(parse_venue_row(row)?);
        }
        Ok(venues)
    }

    fn set_venue_published(&self, id: VenueId, published: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE venues SET published = ?2 WHERE id = ?1;",
            params![id.to_string(), bool_to_int(published)],
        )?;
        if changed == 0 {
            return Err(RepoError::VenueNotFound(id));
        }
        Ok(())
    }
}

fn parse_venue_row(row: &Row<'_>) -> RepoResult<Venue> {
    let id_text: String = row.get("id")?;
    let lat: Option<f64> = row.get("lat")?;
    let lng: Option<f64> = row.get("lng")?;
    let location = match (lat, lng) {
        (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
        (None, None) => None,
        _ => {
            return Err(RepoError::InvalidData(format!(
                "venue `{id_text}` has a half-set coordinate pair"
            )));
        }
    };

    Ok(Venue {
        id: parse_uuid(&id_text, "venues.id")?,
        name: row.get("name")?,
        location,
        published: parse_flag(row.get("published")?, "venues.published")?,
        view_count: row.get("view_count")?,
        comment_count: row.get("comment_count")?,
    })
}
