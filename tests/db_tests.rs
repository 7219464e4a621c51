//! DB tests: attribute table insert/find/update, per-type keys, and file-DB persistence.

use chromadex::engine::{AttributeTable, SqliteAttributeTable, open_db, open_db_in_memory};
use chromadex::{AttributeRecord, ItemType};

fn table() -> SqliteAttributeTable {
    SqliteAttributeTable::new(open_db_in_memory().unwrap())
}

fn record(item_type: ItemType, hash: &str, color: Option<&str>) -> AttributeRecord {
    AttributeRecord {
        item_type,
        hash: hash.to_string(),
        color: color.map(String::from),
    }
}

#[test]
fn test_empty_table_has_no_records() {
    let t = table();
    assert!(t.all_records(ItemType::Album).unwrap().is_empty());
    assert_eq!(t.count(ItemType::Album).unwrap(), 0);
    assert_eq!(t.find_one("missing", ItemType::Album).unwrap(), None);
}

#[test]
fn test_insert_many_then_find_one() {
    let mut t = table();
    t.insert_many(&[
        record(ItemType::Album, "a1", Some("rgb(1, 2, 3)")),
        record(ItemType::Album, "a2", None),
    ])
    .unwrap();

    assert_eq!(
        t.find_one("a1", ItemType::Album).unwrap(),
        Some(record(ItemType::Album, "a1", Some("rgb(1, 2, 3)")))
    );
    assert_eq!(
        t.find_one("a2", ItemType::Album).unwrap(),
        Some(record(ItemType::Album, "a2", None))
    );
    assert_eq!(t.count(ItemType::Album).unwrap(), 2);
}

#[test]
fn test_insert_many_empty_is_noop() {
    let mut t = table();
    t.insert_many(&[]).unwrap();
    assert_eq!(t.count(ItemType::Album).unwrap(), 0);
}

#[test]
fn test_update_one_overwrites_color() {
    let mut t = table();
    t.insert_many(&[record(ItemType::Artist, "x", Some("rgb(0, 0, 0)"))])
        .unwrap();
    t.update_one("x", ItemType::Artist, "rgb(9, 9, 9)").unwrap();
    assert_eq!(
        t.find_one("x", ItemType::Artist).unwrap().unwrap().color,
        Some("rgb(9, 9, 9)".to_string())
    );
    assert_eq!(t.count(ItemType::Artist).unwrap(), 1);
}

#[test]
fn test_same_hash_is_distinct_per_item_type() {
    let mut t = table();
    t.insert_many(&[
        record(ItemType::Album, "same", Some("rgb(1, 1, 1)")),
        record(ItemType::Artist, "same", Some("rgb(2, 2, 2)")),
    ])
    .unwrap();

    let albums = t.all_records(ItemType::Album).unwrap();
    let artists = t.all_records(ItemType::Artist).unwrap();
    assert_eq!(albums, vec![record(ItemType::Album, "same", Some("rgb(1, 1, 1)"))]);
    assert_eq!(artists, vec![record(ItemType::Artist, "same", Some("rgb(2, 2, 2)"))]);
}

#[test]
fn test_insert_many_duplicate_key_fails_and_rolls_back() {
    let mut t = table();
    t.insert_many(&[record(ItemType::Album, "dup", Some("rgb(1, 1, 1)"))])
        .unwrap();
    let err = t.insert_many(&[
        record(ItemType::Album, "fresh", Some("rgb(2, 2, 2)")),
        record(ItemType::Album, "dup", Some("rgb(3, 3, 3)")),
    ]);
    assert!(err.is_err());
    // The whole batch is rolled back, including the row before the conflict.
    assert_eq!(t.find_one("fresh", ItemType::Album).unwrap(), None);
    assert_eq!(t.count(ItemType::Album).unwrap(), 1);
}

#[test]
fn test_file_db_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("chromadex.db");
    {
        let mut t = SqliteAttributeTable::new(open_db(&db_path).unwrap());
        t.insert_many(&[record(ItemType::Album, "keep", Some("rgb(4, 5, 6)"))])
            .unwrap();
    }
    let t = SqliteAttributeTable::new(open_db(&db_path).unwrap());
    assert_eq!(
        t.find_one("keep", ItemType::Album).unwrap().unwrap().color,
        Some("rgb(4, 5, 6)".to_string())
    );
}
