//! Tests for checkpoint storage
//!
//! These tests verify:
//! - SSTable creation, header fields and sequential reads
//! - Data CRC and format validation
//! - StorageManager checkpoint lifecycle (write, load, supersede)
//! - Cleanup of unfinished checkpoints on open
//! - Comparator identity pinning

use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use atlasrdb::storage::{Manifest, SSTableBuilder, SSTableReader, StorageManager};
use atlasrdb::AtlasError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_sstable() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.sst");
    (temp_dir, path)
}

/// Numbered entries, zero-padded so bytewise order matches insertion order
fn numbered(count: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
    (0..count)
        .map(|i| {
            (
                format!("key{:05}", i).into_bytes(),
                format!("value{}", i).into_bytes(),
            )
        })
        .collect()
}

fn build_sstable(path: &Path, entries: &[(Vec<u8>, Vec<u8>)], last_seq: u64) {
    let mut builder = SSTableBuilder::new(path, last_seq).unwrap();
    for (key, value) in entries {
        builder.add(key, value).unwrap();
    }
    builder.finish().unwrap();
}

fn write_checkpoint(manager: &StorageManager, entries: &[(Vec<u8>, Vec<u8>)], last_seq: u64) {
    manager
        .write_checkpoint(
            entries.iter().map(|(k, v)| (k.as_slice(), v.as_slice())),
            last_seq,
        )
        .unwrap();
}

fn sst_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// =============================================================================
// SSTable Tests
// =============================================================================

#[test]
fn test_builder_reports_metadata() {
    let (_temp, path) = setup_temp_sstable();
    let mut builder = SSTableBuilder::new(&path, 42).unwrap();
    for (key, value) in numbered(5) {
        builder.add(&key, &value).unwrap();
    }
    let checkpoint = builder.finish().unwrap();

    assert_eq!(checkpoint.entry_count, 5);
    assert_eq!(checkpoint.last_seq, 42);
    assert_eq!(checkpoint.file_size, fs::metadata(&path).unwrap().len());
}

#[test]
fn test_reader_reads_all_in_order() {
    let (_temp, path) = setup_temp_sstable();
    let entries = numbered(100);
    build_sstable(&path, &entries, 7);

    let mut reader = SSTableReader::open(&path).unwrap();
    assert_eq!(reader.entry_count(), 100);
    assert_eq!(reader.last_seq(), 7);
    assert_eq!(reader.read_all().unwrap(), entries);
}

#[test]
fn test_empty_sstable() {
    let (_temp, path) = setup_temp_sstable();
    build_sstable(&path, &[], 0);

    let mut reader = SSTableReader::open(&path).unwrap();
    assert_eq!(reader.entry_count(), 0);
    assert!(reader.read_all().unwrap().is_empty());
}

#[test]
fn test_empty_values_survive() {
    let (_temp, path) = setup_temp_sstable();
    let entries = vec![(b"a".to_vec(), Vec::new()), (b"b".to_vec(), b"x".to_vec())];
    build_sstable(&path, &entries, 1);

    let mut reader = SSTableReader::open(&path).unwrap();
    assert_eq!(reader.read_all().unwrap(), entries);
}

#[test]
fn test_reader_detects_data_corruption() {
    let (_temp, path) = setup_temp_sstable();
    build_sstable(&path, &numbered(3), 1);

    // flip a byte inside the first value (header 22 + lens 8 + key 8)
    let mut file = OpenOptions::new().read(true).write(true).open(&path).unwrap();
    file.seek(SeekFrom::Start(22 + 8 + 8)).unwrap();
    file.write_all(b"X").unwrap();
    file.sync_all().unwrap();

    let mut reader = SSTableReader::open(&path).unwrap();
    assert!(matches!(reader.read_all(), Err(AtlasError::Storage(_))));
}

#[test]
fn test_reader_rejects_bad_magic() {
    let (_temp, path) = setup_temp_sstable();
    build_sstable(&path, &numbered(1), 1);

    let mut file = OpenOptions::new().write(true).open(&path).unwrap();
    file.write_all(b"NOPE").unwrap();
    file.sync_all().unwrap();

    assert!(matches!(
        SSTableReader::open(&path),
        Err(AtlasError::Storage(_))
    ));
}

#[test]
fn test_reader_rejects_short_file() {
    let (_temp, path) = setup_temp_sstable();
    fs::write(&path, b"ARDB").unwrap();
    assert!(SSTableReader::open(&path).is_err());
}

// =============================================================================
// StorageManager Tests
// =============================================================================

#[test]
fn test_manager_starts_empty() {
    let temp = TempDir::new().unwrap();
    let manager = StorageManager::open(temp.path()).unwrap();

    assert!(manager.latest().is_none());
    assert!(manager.load_latest().unwrap().is_none());
    assert_eq!(manager.next_checkpoint_id(), 1);
}

#[test]
fn test_manager_write_and_load() {
    let temp = TempDir::new().unwrap();
    let manager = StorageManager::open(temp.path()).unwrap();
    let entries = numbered(10);
    write_checkpoint(&manager, &entries, 55);

    let latest = manager.latest().unwrap();
    assert_eq!(latest.id, 1);
    assert_eq!(latest.entry_count, 10);
    assert_eq!(latest.last_seq, 55);

    let (seq, loaded) = manager.load_latest().unwrap().unwrap();
    assert_eq!(seq, 55);
    assert_eq!(loaded, entries);
}

#[test]
fn test_manager_new_checkpoint_supersedes_old() {
    let temp = TempDir::new().unwrap();
    let manager = StorageManager::open(temp.path()).unwrap();
    write_checkpoint(&manager, &numbered(3), 3);
    write_checkpoint(&manager, &numbered(5), 9);

    assert_eq!(sst_files(temp.path()), vec!["checkpoint_000002.sst".to_string()]);
    let (seq, loaded) = manager.load_latest().unwrap().unwrap();
    assert_eq!(seq, 9);
    assert_eq!(loaded.len(), 5);
}

#[test]
fn test_manager_reopen_finds_latest() {
    let temp = TempDir::new().unwrap();
    {
        let manager = StorageManager::open(temp.path()).unwrap();
        write_checkpoint(&manager, &numbered(4), 12);
    }

    let manager = StorageManager::open(temp.path()).unwrap();
    assert_eq!(manager.next_checkpoint_id(), 2);
    let latest = manager.latest().unwrap();
    assert_eq!(latest.last_seq, 12);
    assert_eq!(latest.entry_count, 4);
}

#[test]
fn test_manager_open_removes_tmp_and_older_files() {
    let temp = TempDir::new().unwrap();
    build_sstable(&temp.path().join("checkpoint_000001.sst"), &numbered(1), 1);
    build_sstable(&temp.path().join("checkpoint_000003.sst"), &numbered(2), 5);
    fs::write(temp.path().join("checkpoint_000004.sst.tmp"), b"partial").unwrap();

    let manager = StorageManager::open(temp.path()).unwrap();
    assert_eq!(sst_files(temp.path()), vec!["checkpoint_000003.sst".to_string()]);
    assert_eq!(manager.latest().unwrap().id, 3);
    assert_eq!(manager.next_checkpoint_id(), 4);
}

// =============================================================================
// Manifest Tests
// =============================================================================

#[test]
fn test_manifest_records_comparator() {
    let temp = TempDir::new().unwrap();
    let manifest = Manifest::check_or_create(temp.path(), "ardb.comparator").unwrap();
    assert_eq!(manifest.comparator(), "ardb.comparator");

    let contents = fs::read_to_string(manifest.path()).unwrap();
    assert_eq!(contents.trim(), "comparator=ardb.comparator");
}

#[test]
fn test_manifest_accepts_same_comparator() {
    let temp = TempDir::new().unwrap();
    Manifest::check_or_create(temp.path(), "ardb.comparator").unwrap();
    assert!(Manifest::check_or_create(temp.path(), "ardb.comparator").is_ok());
}

#[test]
fn test_manifest_rejects_other_comparator() {
    let temp = TempDir::new().unwrap();
    Manifest::check_or_create(temp.path(), "ardb.comparator").unwrap();
    assert!(matches!(
        Manifest::check_or_create(temp.path(), "bytewise"),
        Err(AtlasError::Config(_))
    ));
}

#[test]
fn test_manifest_without_entry_fails() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("IDENTITY"), "something=else\n").unwrap();
    assert!(matches!(
        Manifest::check_or_create(temp.path(), "ardb.comparator"),
        Err(AtlasError::Config(_))
    ));
}
