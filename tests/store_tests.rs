//! Tests for RecordStore
//!
//! These tests verify:
//! - Identifier assignment and stability
//! - Read/update/delete semantics, including misses
//! - Tombstone exclusion from scans
//! - Index agreement with the data file
//! - Free-list slot reuse
//! - In-place and relocating updates
//! - Index reconstruction on open
//! - Store lifecycle (open/close/reopen)

use std::fs;

use slotdb::data::DataFile;
use slotdb::{Config, Country, Record, RecordStore, SlotError};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn test_config(temp_dir: &TempDir) -> Config {
    Config::builder()
        .data_dir(temp_dir.path())
        .name("countries")
        .build()
}

fn setup_temp_store() -> (TempDir, RecordStore<Country>) {
    let temp_dir = TempDir::new().unwrap();
    let store = RecordStore::open(test_config(&temp_dir)).unwrap();
    (temp_dir, store)
}

fn country(name: &str, population: i64) -> Country {
    Country::new(name, population)
}

/// Every scanned record's id resolves to the offset of its live slot
fn assert_index_agrees(store: &mut RecordStore<Country>) {
    let scanned = store.scan_with_offsets().unwrap();
    for (offset, record) in &scanned {
        assert_eq!(
            store.offset_of(record.id()).unwrap(),
            Some(*offset),
            "record {}",
            record.id()
        );
    }

    let mut scanned_ids: Vec<i32> = scanned.iter().map(|(_, r)| r.id()).collect();
    scanned_ids.sort();
    assert_eq!(store.indexed_ids().unwrap(), scanned_ids);
}

// =============================================================================
// Open Tests
// =============================================================================

#[test]
fn test_open_creates_files() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path().join("nested"))
        .name("people")
        .build();

    let store: RecordStore<Country> = RecordStore::open(config).unwrap();

    assert!(store.data_path().ends_with("people.db"));
    assert!(store.index_path().ends_with("people.idx"));
    assert!(store.data_path().exists());
    assert!(store.index_path().exists());
    assert_eq!(store.last_id(), 0);
}

#[test]
fn test_open_rejects_empty_name() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder().data_dir(temp_dir.path()).name("  ").build();

    let result = RecordStore::<Country>::open(config);

    assert!(matches!(result, Err(SlotError::Config(_))));
}

#[test]
fn test_open_path_uses_default_name() {
    let temp_dir = TempDir::new().unwrap();

    let store = RecordStore::<Country>::open_path(temp_dir.path()).unwrap();

    assert_eq!(store.config().name, Config::default().name);
    assert!(store.data_path().starts_with(temp_dir.path()));
}

// =============================================================================
// Create & Read Tests
// =============================================================================

#[test]
fn test_create_assigns_sequential_ids() {
    let (_temp, mut store) = setup_temp_store();

    let ids: Vec<i32> = ["A", "B", "C"]
        .iter()
        .map(|name| store.create(&mut country(name, 1)).unwrap())
        .collect();

    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(store.last_id(), 3);
}

#[test]
fn test_identifier_stability() {
    let (_temp, mut store) = setup_temp_store();
    let original = country("Japan", 124_000_000).with_cities(["Tokyo", "Osaka"]);

    let mut to_store = original.clone();
    let id = store.create(&mut to_store).unwrap();

    assert_eq!(to_store.id(), id);
    let read = store.read(id).unwrap().unwrap();
    let mut expected = original;
    expected.set_id(id);
    assert_eq!(read, expected);
}

#[test]
fn test_read_missing_id() {
    let (_temp, mut store) = setup_temp_store();
    store.create(&mut country("A", 1)).unwrap();

    assert_eq!(store.read(99).unwrap(), None);
    assert_eq!(store.read(0).unwrap(), None);
}

#[test]
fn test_create_too_large_advances_last_id() {
    let (_temp, mut store) = setup_temp_store();
    let mut huge = country(&"x".repeat(40_000), 1);

    let result = store.create(&mut huge);

    assert!(matches!(result, Err(SlotError::RecordTooLarge { .. })));
    assert_eq!(store.last_id(), 1);
    assert_eq!(store.read(1).unwrap(), None);
    assert_eq!(store.create(&mut country("B", 2)).unwrap(), 2);
}

// =============================================================================
// Delete Tests
// =============================================================================

#[test]
fn test_tombstone_exclusion() {
    let (_temp, mut store) = setup_temp_store();
    let a = store.create(&mut country("Alpha", 1)).unwrap();
    let b = store.create(&mut country("Beta", 2)).unwrap();
    let c = store.create(&mut country("Gamma", 3)).unwrap();

    assert!(store.delete(b).unwrap());

    assert_eq!(store.read(b).unwrap(), None);
    let ids: Vec<i32> = store.scan_all().unwrap().iter().map(|r| r.id()).collect();
    assert_eq!(ids, vec![a, c]);
    assert_index_agrees(&mut store);
}

#[test]
fn test_delete_missing_id() {
    let (_temp, mut store) = setup_temp_store();
    let id = store.create(&mut country("A", 1)).unwrap();

    assert!(!store.delete(42).unwrap());
    assert!(store.delete(id).unwrap());
    assert!(!store.delete(id).unwrap());
}

#[test]
fn test_delete_stale_index_entry_does_not_relink_slot() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&temp_dir);
    let (id, offset) = {
        let mut store = RecordStore::<Country>::open(config.clone()).unwrap();
        let id = store.create(&mut country("Atlantis", 0)).unwrap();
        store.create(&mut country("Lemuria", 0)).unwrap();
        let offset = store.offset_of(id).unwrap().unwrap();
        store.close().unwrap();
        (id, offset)
    };

    // Kill the slot behind the index's back
    {
        let mut data = DataFile::open(&config.data_path(), false).unwrap();
        data.tombstone(offset).unwrap();
        data.close().unwrap();
    }

    let mut store = RecordStore::<Country>::open(config).unwrap();
    assert_eq!(store.offset_of(id).unwrap(), Some(offset));

    assert!(!store.delete(id).unwrap());

    let free = store.free_list().unwrap();
    assert_eq!(free.len(), 1);
    assert_eq!(free[0].offset, offset);
    assert_eq!(free[0].next, None);
    assert_eq!(store.offset_of(id).unwrap(), None);
    assert_eq!(store.indexed_ids().unwrap(), vec![2]);
}

#[test]
fn test_space_reuse() {
    let (_temp, mut store) = setup_temp_store();
    let mut a = country("Mauritania", 4_900_000).with_cities(["Nouakchott"]);
    let mut b = country("Chad", 18_000_000);
    assert!(b.encode().unwrap().len() < a.encode().unwrap().len());

    let a_id = store.create(&mut a).unwrap();
    let x = store.offset_of(a_id).unwrap().unwrap();
    assert!(store.delete(a_id).unwrap());
    assert_eq!(store.free_list().unwrap().len(), 1);

    let b_id = store.create(&mut b).unwrap();

    assert_eq!(store.offset_of(b_id).unwrap(), Some(x));
    assert!(store.free_list().unwrap().is_empty());
    let all = store.scan_all().unwrap();
    assert_eq!(all, vec![b.clone()]);
    assert_eq!(store.read(b_id).unwrap(), Some(b));
}

// =============================================================================
// Update Tests
// =============================================================================

#[test]
fn test_update_missing_id() {
    let (_temp, mut store) = setup_temp_store();
    let mut ghost = country("Ghost", 0);
    ghost.set_id(7);

    assert!(!store.update(&ghost).unwrap());
    assert!(store.scan_all().unwrap().is_empty());
}

#[test]
fn test_update_in_place_when_smaller() {
    let (_temp, mut store) = setup_temp_store();
    let mut record = country("United Kingdom", 68_000_000);
    let id = store.create(&mut record).unwrap();
    let offset = store.offset_of(id).unwrap();

    record.name = "UK".to_string();
    assert!(store.update(&record).unwrap());

    assert_eq!(store.offset_of(id).unwrap(), offset);
    assert_eq!(store.read(id).unwrap(), Some(record.clone()));

    // The slot keeps its original capacity, so growing back still fits
    record.name = "United Kingdom".to_string();
    assert!(store.update(&record).unwrap());
    assert_eq!(store.offset_of(id).unwrap(), offset);
    assert_eq!(store.read(id).unwrap(), Some(record));
    assert!(store.free_list().unwrap().is_empty());
}

#[test]
fn test_update_relocates_when_larger() {
    let (_temp, mut store) = setup_temp_store();
    let mut record = country("Fiji", 900_000);
    let id = store.create(&mut record).unwrap();
    let neighbour = store.create(&mut country("Tonga", 100_000)).unwrap();
    let old_offset = store.offset_of(id).unwrap().unwrap();

    record.largest_cities = vec!["Suva".into(), "Lautoka".into(), "Nadi".into()];
    assert!(store.update(&record).unwrap());

    let new_offset = store.offset_of(id).unwrap().unwrap();
    assert_ne!(new_offset, old_offset);
    assert_eq!(store.read(id).unwrap(), Some(record));
    assert_eq!(store.read(neighbour).unwrap().unwrap().name, "Tonga");

    let free = store.free_list().unwrap();
    assert_eq!(free.len(), 1);
    assert_eq!(free[0].offset, old_offset);

    let ids: Vec<i32> = store.scan_all().unwrap().iter().map(|r| r.id()).collect();
    assert_eq!(ids, vec![neighbour, id]);
    assert_index_agrees(&mut store);
}

#[test]
fn test_update_too_large_keeps_original() {
    let (_temp, mut store) = setup_temp_store();
    let mut record = country("Malta", 500_000);
    let id = store.create(&mut record).unwrap();

    let mut huge = record.clone();
    huge.name = "m".repeat(40_000);
    let result = store.update(&huge);

    assert!(matches!(result, Err(SlotError::RecordTooLarge { .. })));
    assert_eq!(store.read(id).unwrap(), Some(record));
    assert!(store.free_list().unwrap().is_empty());
}

// =============================================================================
// Scan Tests
// =============================================================================

#[test]
fn test_find_by_predicate() {
    let (_temp, mut store) = setup_temp_store();
    for (name, pop) in [("Iceland", 380_000), ("Ireland", 5_100_000), ("India", 1_400_000_000)] {
        store.create(&mut country(name, pop)).unwrap();
    }

    let found = store.find(|c| c.name.contains("land")).unwrap();
    let names: Vec<&str> = found.iter().map(|c| c.name.as_str()).collect();

    assert_eq!(names, vec!["Iceland", "Ireland"]);
}

#[test]
fn test_index_agreement_after_churn() {
    let (_temp, mut store) = setup_temp_store();
    let mut ids = Vec::new();
    for i in 0..40 {
        let mut record = country(&format!("Country {}", i), i);
        ids.push(store.create(&mut record).unwrap());
    }

    for id in ids.iter().filter(|id| *id % 3 == 0) {
        assert!(store.delete(*id).unwrap());
    }
    for id in ids.iter().filter(|id| *id % 3 == 1) {
        let mut record = store.read(*id).unwrap().unwrap();
        record.largest_cities = vec![format!("City of {}", id); (*id % 4) as usize];
        assert!(store.update(&record).unwrap());
    }
    for i in 0..10 {
        store.create(&mut country(&format!("Late {}", i), i)).unwrap();
    }

    assert_index_agrees(&mut store);
    assert_eq!(store.scan_all().unwrap().len(), 40 - 13 + 10);
}

// =============================================================================
// Rebuild & Lifecycle Tests
// =============================================================================

#[test]
fn test_reopen_preserves_records() {
    let temp_dir = TempDir::new().unwrap();
    let ids: Vec<i32> = {
        let mut store = RecordStore::<Country>::open(test_config(&temp_dir)).unwrap();
        let ids: Vec<i32> = (0..12)
            .map(|i| store.create(&mut country(&format!("C{}", i), i)).unwrap())
            .collect();
        store.delete(5).unwrap();
        store.close().unwrap();
        ids
    };

    let mut store = RecordStore::<Country>::open(test_config(&temp_dir)).unwrap();

    assert_eq!(store.last_id(), 12);
    for id in ids {
        assert_eq!(store.read(id).unwrap().is_some(), id != 5, "id {}", id);
    }
    assert_eq!(store.create(&mut country("Next", 0)).unwrap(), 13);
}

#[test]
fn test_rebuild_after_index_file_removed() {
    let temp_dir = TempDir::new().unwrap();
    let index_path = test_config(&temp_dir).index_path();
    let ids: Vec<i32> = {
        let mut store = RecordStore::<Country>::open(test_config(&temp_dir)).unwrap();
        let ids: Vec<i32> = (0..30)
            .map(|i| store.create(&mut country(&format!("N{}", i), i)).unwrap())
            .collect();
        store.close().unwrap();
        ids
    };

    fs::remove_file(&index_path).unwrap();
    let mut store = RecordStore::<Country>::open(test_config(&temp_dir)).unwrap();

    for id in ids {
        let record = store.read(id).unwrap().unwrap();
        assert_eq!(record.id(), id);
    }
    assert_index_agrees(&mut store);
}

#[test]
fn test_rebuild_skips_tombstones() {
    let temp_dir = TempDir::new().unwrap();
    let index_path = test_config(&temp_dir).index_path();
    {
        let mut store = RecordStore::<Country>::open(test_config(&temp_dir)).unwrap();
        for i in 0..6 {
            store.create(&mut country(&format!("T{}", i), i)).unwrap();
        }
        store.delete(2).unwrap();
        store.delete(4).unwrap();
        store.close().unwrap();
    }

    // An empty (zero-length) index file also triggers a rebuild
    fs::write(&index_path, b"").unwrap();
    let mut store = RecordStore::<Country>::open(test_config(&temp_dir)).unwrap();

    assert_eq!(store.indexed_ids().unwrap(), vec![1, 3, 5, 6]);
    assert_eq!(store.read(2).unwrap(), None);
    assert_eq!(store.read(4).unwrap(), None);
}

#[test]
fn test_explicit_rebuild_matches_incremental_index() {
    let (_temp, mut store) = setup_temp_store();
    for i in 0..20 {
        store.create(&mut country(&format!("R{}", i), i)).unwrap();
    }
    store.delete(7).unwrap();
    let before = store.indexed_ids().unwrap();

    let count = store.rebuild_index().unwrap();

    assert_eq!(count, 19);
    assert_eq!(store.indexed_ids().unwrap(), before);
    assert_index_agrees(&mut store);
}

#[test]
fn test_sync_writes_store() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .sync_writes(true)
        .build();
    let mut store = RecordStore::<Country>::open(config).unwrap();

    let id = store.create(&mut country("Nauru", 12_000)).unwrap();

    assert_eq!(store.read(id).unwrap().unwrap().name, "Nauru");
    store.close().unwrap();
}
