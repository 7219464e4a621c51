//! Database operations: schema, open, and the durable attribute table.

mod attributes;
mod connection;

pub use attributes::{AttributeTable, SqliteAttributeTable};
pub use connection::{open_db, open_db_in_memory};

/// WAL tuning pragmas (synchronous, autocheckpoint, size limit).
/// Use after `PRAGMA journal_mode = WAL`.
pub(crate) const WAL_PRAGMAS: &str = r#"
        PRAGMA synchronous = NORMAL;
        PRAGMA wal_autocheckpoint = 10000;
        PRAGMA journal_size_limit = 67108864;
        "#;

/// Insert statement for a new attribute row.
pub(crate) const INSERT_ATTRIBUTE_SQL: &str =
    "INSERT INTO libdata (itemtype, itemhash, color) VALUES (?1, ?2, ?3)";

/// Overwrite the color of an existing attribute row.
pub(crate) const UPDATE_COLOR_SQL: &str =
    "UPDATE libdata SET color = ?3 WHERE itemtype = ?1 AND itemhash = ?2";

/// Schema for the attribute table. Rows are keyed by (item type, item hash) and never deleted.
pub(crate) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS libdata (
    itemtype TEXT NOT NULL,
    itemhash TEXT NOT NULL,
    color TEXT,
    PRIMARY KEY (itemtype, itemhash)
);
"#;
