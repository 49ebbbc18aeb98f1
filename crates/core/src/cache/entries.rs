//! Cache index operations.
//!
//! One row per cached URL. The index only does metadata bookkeeping; it never
//! touches the network or the blob directory, and keeping rows consistent with
//! files on disk is the coordinator's job.

use std::fmt;
use std::str::FromStr;

use super::connection::CacheDb;
use crate::Error;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, Row, types::Type};

const COLUMNS: &str =
    "url, local_path, entity_id, category, fetched_at, validator, size_bytes, last_accessed_at, note";

/// Classification of a cached image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Poster,
    Thumbnail,
    Screenshot,
    Banner,
    Activity,
    #[default]
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Poster,
        Category::Thumbnail,
        Category::Screenshot,
        Category::Banner,
        Category::Activity,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Poster => "poster",
            Category::Thumbnail => "thumbnail",
            Category::Screenshot => "screenshot",
            Category::Banner => "banner",
            Category::Activity => "activity",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == lowered)
            .ok_or_else(|| Error::InvalidInput(format!("unknown category: {s}")))
    }
}

/// Metadata for one cached URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub url: String,
    pub local_path: String,
    pub entity_id: Option<String>,
    pub category: Category,
    /// Last successful network fetch. Not moved by cache hits.
    pub fetched_at: DateTime<Utc>,
    /// Origin `Last-Modified` value, sent back as `If-Modified-Since`.
    pub validator: Option<String>,
    pub size_bytes: u64,
    /// Drives eviction order.
    pub last_accessed_at: DateTime<Utc>,
    pub note: Option<String>,
}

/// Aggregate view of the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CacheStats {
    pub entry_count: u64,
    pub total_size: u64,
}

/// Current time at the precision the index stores.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<CacheEntry> {
    let category: String = row.get(3)?;
    let category = category
        .parse::<Category>()
        .map_err(|e: Error| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, e.to_string().into()))?;
    let size: i64 = row.get(6)?;
    Ok(CacheEntry {
        url: row.get(0)?,
        local_path: row.get(1)?,
        entity_id: row.get(2)?,
        category,
        fetched_at: parse_timestamp(row, 4)?,
        validator: row.get(5)?,
        size_bytes: size.max(0) as u64,
        last_accessed_at: parse_timestamp(row, 7)?,
        note: row.get(8)?,
    })
}

impl CacheDb {
    /// Get the entry for a URL.
    ///
    /// Returns None if the URL has never been cached (or was purged).
    pub async fn get_entry(&self, url: &str) -> Result<Option<CacheEntry>, Error> {
        let url = url.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> {
                let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM cache_entries WHERE url = ?1"))?;

                match stmt.query_row(params![url], entry_from_row) {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Entries associated with an entity, optionally narrowed to one category.
    pub async fn entries_by_entity(
        &self, entity_id: &str, category: Option<Category>,
    ) -> Result<Vec<CacheEntry>, Error> {
        let entity_id = entity_id.to_string();
        let category = category.map(|c| c.as_str());
        self.conn
            .call(move |conn| -> Result<Vec<CacheEntry>, Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM cache_entries
                     WHERE entity_id = ?1 AND (?2 IS NULL OR category = ?2)
                     ORDER BY last_accessed_at ASC, rowid ASC"
                ))?;
                let rows = stmt.query_map(params![entity_id, category], entry_from_row)?;
                let entries = rows.collect::<Result<Vec<_>, _>>()?;
                Ok(entries)
            })
            .await
            .map_err(Error::from)
    }

    /// All entries in a category.
    pub async fn entries_by_category(&self, category: Category) -> Result<Vec<CacheEntry>, Error> {
        let category = category.as_str();
        self.conn
            .call(move |conn| -> Result<Vec<CacheEntry>, Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM cache_entries
                     WHERE category = ?1
                     ORDER BY last_accessed_at ASC, rowid ASC"
                ))?;
                let rows = stmt.query_map(params![category], entry_from_row)?;
                let entries = rows.collect::<Result<Vec<_>, _>>()?;
                Ok(entries)
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or update an entry.
    ///
    /// Uses UPSERT semantics keyed on `url`: there is never more than one row
    /// per URL.
    pub async fn upsert_entry(&self, entry: &CacheEntry) -> Result<(), Error> {
        let entry = entry.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    &format!(
                        "INSERT INTO cache_entries ({COLUMNS})
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                         ON CONFLICT(url) DO UPDATE SET
                            local_path = excluded.local_path,
                            entity_id = excluded.entity_id,
                            category = excluded.category,
                            fetched_at = excluded.fetched_at,
                            validator = excluded.validator,
                            size_bytes = excluded.size_bytes,
                            last_accessed_at = excluded.last_accessed_at,
                            note = excluded.note"
                    ),
                    params![
                        &entry.url,
                        &entry.local_path,
                        &entry.entity_id,
                        entry.category.as_str(),
                        format_timestamp(&entry.fetched_at),
                        &entry.validator,
                        entry.size_bytes as i64,
                        format_timestamp(&entry.last_accessed_at),
                        &entry.note,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Move an entry's `last_accessed_at` without rewriting the rest of the row.
    ///
    /// Returns false if the URL has no entry.
    pub async fn touch_entry(&self, url: &str, at: DateTime<Utc>) -> Result<bool, Error> {
        let url = url.to_string();
        let at = format_timestamp(&at);
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count =
                    conn.execute("UPDATE cache_entries SET last_accessed_at = ?2 WHERE url = ?1", params![url, at])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete the entry for a URL.
    ///
    /// Returns true if a row was removed.
    pub async fn delete_entry(&self, url: &str) -> Result<bool, Error> {
        let url = url.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM cache_entries WHERE url = ?1", params![url])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete the entry for a URL only if it is still the row a caller read.
    ///
    /// Matching on `fetched_at` keeps a stale reader from removing a row that a
    /// concurrent download replaced in the meantime. Returns true if a row was
    /// removed.
    pub async fn delete_entry_if_fetched_at(&self, url: &str, fetched_at: DateTime<Utc>) -> Result<bool, Error> {
        let url = url.to_string();
        let fetched_at = format_timestamp(&fetched_at);
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute(
                    "DELETE FROM cache_entries WHERE url = ?1 AND fetched_at = ?2",
                    params![url, fetched_at],
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every entry for an entity, optionally only one category.
    ///
    /// Returns the number of deleted entries.
    pub async fn delete_entries_by_entity(&self, entity_id: &str, category: Option<Category>) -> Result<u64, Error> {
        let entity_id = entity_id.to_string();
        let category = category.map(|c| c.as_str());
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute(
                    "DELETE FROM cache_entries WHERE entity_id = ?1 AND (?2 IS NULL OR category = ?2)",
                    params![entity_id, category],
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// The `limit` least recently accessed entries, oldest first.
    ///
    /// Ties on `last_accessed_at` fall back to insertion order.
    pub async fn oldest_accessed(&self, limit: usize) -> Result<Vec<CacheEntry>, Error> {
        let limit = limit as i64;
        self.conn
            .call(move |conn| -> Result<Vec<CacheEntry>, Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM cache_entries
                     ORDER BY last_accessed_at ASC, rowid ASC
                     LIMIT ?1"
                ))?;
                let rows = stmt.query_map(params![limit], entry_from_row)?;
                let entries = rows.collect::<Result<Vec<_>, _>>()?;
                Ok(entries)
            })
            .await
            .map_err(Error::from)
    }

    /// Sum of `size_bytes` over all rows.
    pub async fn total_size(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let total: i64 =
                    conn.query_row("SELECT COALESCE(SUM(size_bytes), 0) FROM cache_entries", [], |row| row.get(0))?;
                Ok(total.max(0) as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of rows in the index.
    pub async fn entry_count(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Entry count and total size in one read.
    pub async fn stats(&self) -> Result<CacheStats, Error> {
        self.conn
            .call(|conn| -> Result<CacheStats, Error> {
                let (count, total): (i64, i64) = conn.query_row(
                    "SELECT COUNT(*), COALESCE(SUM(size_bytes), 0) FROM cache_entries",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;
                Ok(CacheStats { entry_count: count as u64, total_size: total.max(0) as u64 })
            })
            .await
            .map_err(Error::from)
    }
}
