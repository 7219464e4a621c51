//! Durable attribute table: (item type, item hash) → color.

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};

use crate::{AttributeRecord, ItemType};

use super::{INSERT_ATTRIBUTE_SQL, UPDATE_COLOR_SQL};

/// Persistent attribute store consumed by the enrichment pipeline.
///
/// Records are insert-or-update; nothing is ever deleted. Implementations are used from the
/// orchestrating thread only, so they need not be `Sync`.
pub trait AttributeTable {
    /// Every record of `item_type` (including rows whose color is NULL).
    fn all_records(&self, item_type: ItemType) -> Result<Vec<AttributeRecord>>;

    /// The record for `hash`, or `None`.
    fn find_one(&self, hash: &str, item_type: ItemType) -> Result<Option<AttributeRecord>>;

    /// Insert new records. All or nothing.
    fn insert_many(&mut self, records: &[AttributeRecord]) -> Result<()>;

    /// Overwrite the color of an existing record.
    fn update_one(&mut self, hash: &str, item_type: ItemType, color: &str) -> Result<()>;
}

/// [`AttributeTable`] backed by the `libdata` SQLite table.
pub struct SqliteAttributeTable {
    conn: Connection,
}

impl SqliteAttributeTable {
    /// Wrap a connection opened with [`open_db`](super::open_db) or
    /// [`open_db_in_memory`](super::open_db_in_memory).
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Number of rows for `item_type`.
    pub fn count(&self, item_type: ItemType) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM libdata WHERE itemtype = ?1",
                [item_type.as_str()],
                |row| row.get(0),
            )
            .context("count attribute rows")?;
        Ok(n.max(0) as usize)
    }
}

impl AttributeTable for SqliteAttributeTable {
    fn all_records(&self, item_type: ItemType) -> Result<Vec<AttributeRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT itemhash, color FROM libdata WHERE itemtype = ?1")
            .context("prepare select attributes")?;
        let rows = stmt.query_map([item_type.as_str()], |row| {
            Ok(AttributeRecord {
                item_type,
                hash: row.get(0)?,
                color: row.get(1)?,
            })
        })?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn find_one(&self, hash: &str, item_type: ItemType) -> Result<Option<AttributeRecord>> {
        self.conn
            .query_row(
                "SELECT color FROM libdata WHERE itemtype = ?1 AND itemhash = ?2",
                (item_type.as_str(), hash),
                |row| {
                    Ok(AttributeRecord {
                        item_type,
                        hash: hash.to_string(),
                        color: row.get(0)?,
                    })
                },
            )
            .optional()
            .context("find attribute row")
    }

    fn insert_many(&mut self, records: &[AttributeRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let tx = self.conn.transaction().context("begin transaction")?;
        {
            let mut stmt = tx
                .prepare(INSERT_ATTRIBUTE_SQL)
                .context("prepare insert")?;
            for r in records {
                stmt.execute((r.item_type.as_str(), r.hash.as_str(), r.color.as_deref()))
                    .with_context(|| format!("insert {} {}", r.item_type, r.hash))?;
            }
        }
        tx.commit().context("commit transaction")?;
        Ok(())
    }

    fn update_one(&mut self, hash: &str, item_type: ItemType, color: &str) -> Result<()> {
        self.conn
            .execute(UPDATE_COLOR_SQL, (item_type.as_str(), hash, color))
            .with_context(|| format!("update {} {}", item_type, hash))?;
        Ok(())
    }
}
