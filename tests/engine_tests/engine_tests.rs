//! Tests for OrderedEngine
//!
//! These tests verify:
//! - Basic get/put/del operations on encoded keys
//! - Cursor iteration in comparator order
//! - Checkpoints (automatic, on close, on compaction)
//! - Crash recovery from the WAL
//! - Comparator identity pinning
//! - Concurrent access from independent contexts

use std::collections::HashSet;

use atlasrdb::codec::{decode_key, next_key, KeyKind, KeyObject, KeyType, ValueData};
use atlasrdb::config::{Config, WalSyncStrategy};
use atlasrdb::{
    probe_key_type, ArdbComparator, AtlasError, BytewiseComparator, Context, KeyComparator,
    KeyValueEngine, OrderedEngine,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn test_config(temp_dir: &TempDir) -> Config {
    Config::builder()
        .data_dir(temp_dir.path())
        .wal_sync_strategy(WalSyncStrategy::EveryWrite) // Sync every write for test reliability
        .build()
}

fn open_engine(config: Config) -> OrderedEngine {
    OrderedEngine::open(config).unwrap()
}

fn setup_temp_engine() -> (TempDir, OrderedEngine) {
    let temp_dir = TempDir::new().unwrap();
    let engine = open_engine(test_config(&temp_dir));
    (temp_dir, engine)
}

fn field(key: &str, name: &str) -> Vec<u8> {
    KeyObject::hash_field(0, key, ValueData::from(name)).unwrap().encode()
}

fn score(key: &str, score: i64) -> Vec<u8> {
    KeyObject::list_element(0, key, ValueData::Integer(score)).unwrap().encode()
}

/// Field names of hash `key`, read with a prefix scan
fn hash_fields(engine: &OrderedEngine, ctx: &mut Context, key: &str) -> Vec<String> {
    let probe = KeyObject::hash_field(0, key, ValueData::Empty).unwrap();
    let mut iter = engine.find(ctx, &probe.encode(), false).unwrap();
    let mut fields = Vec::new();
    while iter.valid() {
        match decode_key(iter.key(), Some(&probe)) {
            Some(KeyObject {
                kind: KeyKind::HashField { field },
                ..
            }) => fields.push(field.as_string()),
            _ => break,
        }
        iter.next();
    }
    fields
}

/// Keys in `[start, end)` under the engine's comparator, with no other stop
fn scan_range<C: KeyComparator>(
    engine: &OrderedEngine<C>,
    ctx: &mut Context,
    start: &[u8],
    end: &[u8],
) -> Vec<Vec<u8>> {
    let mut iter = engine.find(ctx, start, false).unwrap();
    let mut keys = Vec::new();
    while iter.valid() && C::compare(iter.key(), end).is_lt() {
        keys.push(iter.key().to_vec());
        iter.next();
    }
    keys
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_engine_open_creates_layout() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("mydb");

    let engine = OrderedEngine::<ArdbComparator>::open_path(&data_dir).unwrap();

    assert!(data_dir.join("IDENTITY").exists());
    assert!(data_dir.join("wal.log").exists());
    assert!(data_dir.join("checkpoints").is_dir());
    assert_eq!(engine.comparator_name(), "AtlasRDB.KeyComparator");
    assert_eq!(engine.last_sequence(), 0);
}

#[test]
fn test_engine_put_get() {
    let (_temp, engine) = setup_temp_engine();
    let mut ctx = Context::new();

    engine.put(&mut ctx, &field("user", "name"), b"alice").unwrap();
    let result = engine.get(&mut ctx, &field("user", "name"), true).unwrap();

    assert_eq!(result, Some(b"alice".to_vec()));
    assert_eq!(engine.last_sequence(), 1);
}

#[test]
fn test_engine_get_nonexistent_key() {
    let (_temp, engine) = setup_temp_engine();
    let mut ctx = Context::new();

    assert_eq!(engine.get(&mut ctx, &field("nope", "x"), false).unwrap(), None);
}

#[test]
fn test_engine_put_overwrite() {
    let (_temp, engine) = setup_temp_engine();
    let mut ctx = Context::new();
    let key = field("user", "age");

    engine.put(&mut ctx, &key, b"30").unwrap();
    engine.put(&mut ctx, &key, b"31").unwrap();

    assert_eq!(engine.get(&mut ctx, &key, false).unwrap(), Some(b"31".to_vec()));
}

#[test]
fn test_engine_delete() {
    let (_temp, engine) = setup_temp_engine();
    let mut ctx = Context::new();
    let key = field("user", "age");

    engine.put(&mut ctx, &key, b"30").unwrap();
    engine.del(&mut ctx, &key).unwrap();
    assert_eq!(engine.get(&mut ctx, &key, false).unwrap(), None);

    // deleting a missing key is not an error
    engine.del(&mut ctx, &field("ghost", "x")).unwrap();
}

#[test]
fn test_engine_keys_equal_under_comparator_share_a_slot() {
    let (_temp, engine) = setup_temp_engine();
    let mut ctx = Context::new();

    // Integer 2 and Double 2.0 are the same list score
    engine.put(&mut ctx, &score("l", 2), b"int").unwrap();
    let double = KeyObject::list_element(0, "l", ValueData::Double(2.0)).unwrap().encode();
    assert_eq!(engine.get(&mut ctx, &double, false).unwrap(), Some(b"int".to_vec()));
}

// =============================================================================
// Iterator Tests
// =============================================================================

#[test]
fn test_engine_find_walks_comparator_order() {
    let (_temp, engine) = setup_temp_engine();
    let mut ctx = Context::new();
    for s in [10, 2, 33, -1] {
        engine.put(&mut ctx, &score("list", s), s.to_string().as_bytes()).unwrap();
    }

    let mut iter = engine.find(&mut ctx, &[], false).unwrap();
    iter.seek_to_first();
    let mut values = Vec::new();
    while iter.valid() {
        values.push(String::from_utf8(iter.value().to_vec()).unwrap());
        iter.next();
    }
    assert_eq!(values, vec!["-1", "2", "10", "33"]);
}

#[test]
fn test_engine_iterator_seek_and_prev() {
    let (_temp, engine) = setup_temp_engine();
    let mut ctx = Context::new();
    for s in [1, 5, 9] {
        engine.put(&mut ctx, &score("list", s), &[s as u8]).unwrap();
    }

    let mut iter = engine.find(&mut ctx, &score("list", 4), false).unwrap();
    assert!(iter.valid());
    assert_eq!(iter.value(), &[5]);

    iter.prev();
    assert_eq!(iter.value(), &[1]);
    iter.prev();
    assert!(!iter.valid());
    assert!(iter.key().is_empty());

    iter.seek_to_last();
    assert_eq!(iter.value(), &[9]);
    iter.next();
    assert!(!iter.valid());
}

#[test]
fn test_engine_iterator_is_a_snapshot() {
    let (_temp, engine) = setup_temp_engine();
    let mut ctx = Context::new();
    engine.put(&mut ctx, &field("h", "a"), b"1").unwrap();

    let mut iter = engine.find(&mut ctx, &[], false).unwrap();
    engine.put(&mut ctx, &field("h", "b"), b"2").unwrap();
    engine.del(&mut ctx, &field("h", "a")).unwrap();

    iter.seek_to_first();
    assert_eq!(iter.value(), b"1");
    iter.next();
    assert!(!iter.valid());
}

#[test]
fn test_engine_hash_scan_stops_at_other_key() {
    let (_temp, engine) = setup_temp_engine();
    let mut ctx = Context::new();
    for name in ["email", "age", "name"] {
        engine.put(&mut ctx, &field("user", name), b"v").unwrap();
    }
    engine.put(&mut ctx, &field("users", "other"), b"v").unwrap();
    engine
        .put(&mut ctx, &KeyObject::meta(0, "user", KeyType::HashMeta).unwrap().encode(), b"m")
        .unwrap();

    assert_eq!(hash_fields(&engine, &mut ctx, "user"), vec!["age", "email", "name"]);
    assert_eq!(hash_fields(&engine, &mut ctx, "users"), vec!["other"]);
    assert!(hash_fields(&engine, &mut ctx, "nobody").is_empty());
}

#[test]
fn test_engine_prefix_scan_stops_at_next_key() {
    let temp_dir = TempDir::new().unwrap();
    let engine = OrderedEngine::<BytewiseComparator>::open(test_config(&temp_dir)).unwrap();
    let mut ctx = Context::new();
    for key in [&b"ap"[..], b"app:", b"app:9", b"app:1", b"app:2", b"app;", b"apq", b"b"] {
        engine.put(&mut ctx, key, b"v").unwrap();
    }

    let prefix = b"app:";
    let end = next_key(prefix);
    assert_eq!(end, b"app;".to_vec());
    assert_eq!(
        scan_range(&engine, &mut ctx, prefix, &end),
        vec![b"app:".to_vec(), b"app:1".to_vec(), b"app:2".to_vec(), b"app:9".to_vec()]
    );

    let end = next_key(b"z");
    assert!(scan_range(&engine, &mut ctx, b"z", &end).is_empty());
}

#[test]
fn test_engine_next_key_range_under_ardb_needs_decode_stop() {
    let (_temp, engine) = setup_temp_engine();
    let mut ctx = Context::new();
    for name in ["a", "b"] {
        engine.put(&mut ctx, &field("user", name), b"v").unwrap();
    }
    engine.put(&mut ctx, &field("user1", "x"), b"v").unwrap();
    engine.put(&mut ctx, &field("uses", "y"), b"v").unwrap();

    // header + length + user key, without the field
    let expected = KeyObject::hash_field(0, "user", ValueData::Empty).unwrap();
    let mut prefix = expected.encode();
    prefix.truncate(4 + 1 + "user".len());
    let end = next_key(&prefix);

    let raw = scan_range(&engine, &mut ctx, &prefix, &end);
    assert_eq!(raw, vec![field("user", "a"), field("user", "b"), field("user1", "x")]);

    let owned: Vec<Vec<u8>> = raw
        .into_iter()
        .filter(|key| decode_key(key, Some(&expected)).is_some())
        .collect();
    assert_eq!(owned, vec![field("user", "a"), field("user", "b")]);
    assert_eq!(hash_fields(&engine, &mut ctx, "user"), vec!["a", "b"]);
}

#[test]
fn test_engine_probe_key_type() {
    let (_temp, engine) = setup_temp_engine();
    let mut ctx = Context::new();
    engine.put(&mut ctx, &field("h", "f"), b"v").unwrap();

    let probe = KeyObject::hash_field(0, "h", ValueData::Empty).unwrap();
    assert_eq!(
        probe_key_type(&engine, &mut ctx, &probe).unwrap(),
        Some(KeyType::HashField)
    );

    let missing = KeyObject::hash_field(0, "absent", ValueData::Empty).unwrap();
    assert_eq!(probe_key_type(&engine, &mut ctx, &missing).unwrap(), None);
}

// =============================================================================
// Checkpoint Tests
// =============================================================================

#[test]
fn test_engine_manual_checkpoint() {
    let (_temp, engine) = setup_temp_engine();
    let mut ctx = Context::new();
    engine.put(&mut ctx, &field("h", "a"), b"1").unwrap();
    assert!(engine.wal_size() > 0);

    engine.checkpoint().unwrap();

    let checkpoint = engine.latest_checkpoint().unwrap();
    assert_eq!(checkpoint.entry_count, 1);
    assert_eq!(checkpoint.last_seq, 1);
    assert_eq!(engine.wal_size(), 0);
    assert_eq!(engine.get(&mut ctx, &field("h", "a"), false).unwrap(), Some(b"1".to_vec()));
}

#[test]
fn test_engine_auto_checkpoint_on_wal_limit() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .wal_sync_strategy(WalSyncStrategy::EveryWrite)
        .wal_size_limit(512)
        .build();
    let engine = open_engine(config);
    let mut ctx = Context::new();

    for i in 0..50 {
        engine
            .put(&mut ctx, &field("h", &format!("f{:03}", i)), &[b'x'; 32])
            .unwrap();
    }

    assert!(engine.latest_checkpoint().is_some());
    assert!(engine.wal_size() < 512);
    assert_eq!(hash_fields(&engine, &mut ctx, "h").len(), 50);
}

#[test]
fn test_engine_failed_auto_checkpoint_keeps_write() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .wal_sync_strategy(WalSyncStrategy::EveryWrite)
        .wal_size_limit(512)
        .build();
    let engine = open_engine(config.clone());
    let mut ctx = Context::new();

    let checkpoints = temp_dir.path().join("checkpoints");
    std::fs::remove_dir_all(&checkpoints).unwrap();

    for i in 0..20 {
        engine
            .put(&mut ctx, &field("h", &format!("f{:03}", i)), &[b'x'; 32])
            .unwrap();
    }
    assert_eq!(engine.last_sequence(), 20);
    assert!(engine.latest_checkpoint().is_none());
    assert!(engine.wal_size() >= 512);
    assert_eq!(hash_fields(&engine, &mut ctx, "h").len(), 20);

    // the next write over the limit retries once the directory is back
    std::fs::create_dir_all(&checkpoints).unwrap();
    engine.put(&mut ctx, &field("h", "last"), b"v").unwrap();
    assert!(engine.latest_checkpoint().is_some());
    assert!(engine.wal_size() < 512);
    drop(engine);

    let engine = open_engine(config);
    assert_eq!(engine.last_sequence(), 21);
    assert_eq!(hash_fields(&engine, &mut ctx, "h").len(), 21);
}

#[test]
fn test_engine_compact_range_drops_old_versions() {
    let (_temp, engine) = setup_temp_engine();
    let mut ctx = Context::new();
    let key = field("h", "counter");
    for i in 0..5u8 {
        engine.put(&mut ctx, &key, &[i]).unwrap();
    }
    assert_eq!(engine.memtable_entry_count(), 5);

    engine.compact_range(None, None).unwrap();

    assert_eq!(engine.memtable_entry_count(), 1);
    assert_eq!(engine.get(&mut ctx, &key, false).unwrap(), Some(vec![4]));
    assert!(engine.latest_checkpoint().is_some());
}

#[test]
fn test_engine_compaction_keeps_snapshot_versions() {
    let (_temp, engine) = setup_temp_engine();
    let mut ctx = Context::new();
    let key = field("h", "counter");

    engine.put(&mut ctx, &key, b"old").unwrap();
    let snapshot = engine.snapshot();
    engine.put(&mut ctx, &key, b"new").unwrap();
    engine.compact_range(None, None).unwrap();

    assert_eq!(engine.get_at(&snapshot, &key), Some(b"old".to_vec()));
    assert_eq!(engine.get(&mut ctx, &key, false).unwrap(), Some(b"new".to_vec()));
    assert_eq!(engine.live_snapshots(), 1);

    drop(snapshot);
    assert_eq!(engine.live_snapshots(), 0);
    engine.compact_range(None, None).unwrap();
    assert_eq!(engine.memtable_entry_count(), 1);
}

#[test]
fn test_engine_stats_report() {
    let (_temp, engine) = setup_temp_engine();
    let mut ctx = Context::new();
    engine.put(&mut ctx, &field("h", "a"), b"1").unwrap();
    engine.put(&mut ctx, &field("h", "b"), b"2").unwrap();
    engine.del(&mut ctx, &field("h", "a")).unwrap();
    engine.get(&mut ctx, &field("h", "b"), true).unwrap();

    let stats = engine.stats();
    assert!(stats.contains("comparator: AtlasRDB.KeyComparator"));
    assert!(stats.contains("sequence: 3"));
    assert!(stats.contains("ops.put: 2"));
    assert!(stats.contains("ops.del: 1"));
    assert!(stats.contains("ops.get: 1"));
    assert!(stats.contains("ops.fill_cache: 1"));
    assert!(stats.contains("checkpoint: none"));
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_engine_recovery_from_wal() {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = open_engine(test_config(&temp_dir));
        let mut ctx = Context::new();
        engine.put(&mut ctx, &field("h", "a"), b"1").unwrap();
        engine.put(&mut ctx, &field("h", "b"), b"2").unwrap();
        engine.del(&mut ctx, &field("h", "a")).unwrap();
        // dropped without close: only the WAL has the writes
    }

    let engine = open_engine(test_config(&temp_dir));
    let mut ctx = Context::new();
    assert_eq!(engine.get(&mut ctx, &field("h", "a"), false).unwrap(), None);
    assert_eq!(engine.get(&mut ctx, &field("h", "b"), false).unwrap(), Some(b"2".to_vec()));
    assert_eq!(engine.last_sequence(), 3);
    // replayed writes are checkpointed and the log emptied
    assert_eq!(engine.wal_size(), 0);
    assert_eq!(engine.latest_checkpoint().unwrap().last_seq, 3);
}

#[test]
fn test_engine_close_then_reopen() {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = open_engine(test_config(&temp_dir));
        let mut ctx = Context::new();
        for i in 0..20 {
            engine.put(&mut ctx, &score("l", i), &[i as u8]).unwrap();
        }
        engine.close().unwrap();
    }

    let engine = open_engine(test_config(&temp_dir));
    let mut ctx = Context::new();
    assert_eq!(engine.last_sequence(), 20);
    for i in 0..20 {
        assert_eq!(
            engine.get(&mut ctx, &score("l", i), false).unwrap(),
            Some(vec![i as u8])
        );
    }

    // sequence numbers keep counting after a restart
    engine.put(&mut ctx, &score("l", 99), b"late").unwrap();
    assert_eq!(engine.last_sequence(), 21);
}

#[test]
fn test_engine_recovery_ignores_torn_tail() {
    use std::io::Write;

    let temp_dir = TempDir::new().unwrap();
    {
        let engine = open_engine(test_config(&temp_dir));
        let mut ctx = Context::new();
        engine.put(&mut ctx, &field("h", "a"), b"1").unwrap();
    }
    let mut wal = std::fs::OpenOptions::new()
        .append(true)
        .open(temp_dir.path().join("wal.log"))
        .unwrap();
    wal.write_all(&[9, 9, 9, 9, 9]).unwrap();
    drop(wal);

    let engine = open_engine(test_config(&temp_dir));
    let mut ctx = Context::new();
    assert_eq!(engine.get(&mut ctx, &field("h", "a"), false).unwrap(), Some(b"1".to_vec()));
    assert_eq!(engine.last_sequence(), 1);
}

#[test]
fn test_engine_comparator_mismatch_fails() {
    let temp_dir = TempDir::new().unwrap();
    open_engine(test_config(&temp_dir)).close().unwrap();

    let result = OrderedEngine::<BytewiseComparator>::open(test_config(&temp_dir));
    assert!(matches!(result, Err(AtlasError::Config(_))));
}

#[test]
fn test_engine_destroy() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("store");
    {
        let engine = OrderedEngine::<ArdbComparator>::open_path(&data_dir).unwrap();
        let mut ctx = Context::new();
        engine.put(&mut ctx, &field("h", "a"), b"1").unwrap();
        engine.close().unwrap();
    }

    OrderedEngine::<ArdbComparator>::destroy(&data_dir).unwrap();
    assert!(!data_dir.exists());
    // destroying a missing store is a no-op
    OrderedEngine::<ArdbComparator>::destroy(&data_dir).unwrap();
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_engine_concurrent_writers() {
    let (_temp, engine) = setup_temp_engine();
    let threads = 4;
    let per_thread = 50;

    crossbeam::scope(|s| {
        for t in 0..threads {
            let engine = &engine;
            s.spawn(move |_| {
                let mut ctx = Context::new();
                for i in 0..per_thread {
                    let key = field(&format!("t{}", t), &format!("{:03}", i));
                    engine.put(&mut ctx, &key, &[t as u8]).unwrap();
                }
            });
        }
    })
    .unwrap();

    assert_eq!(engine.last_sequence(), (threads * per_thread) as u64);
    let mut ctx = Context::new();
    for t in 0..threads {
        assert_eq!(hash_fields(&engine, &mut ctx, &format!("t{}", t)).len(), per_thread);
    }
}

#[test]
fn test_engine_readers_see_whole_batches() {
    let (_temp, engine) = setup_temp_engine();
    let keys: Vec<Vec<u8>> = (0..8).map(|i| field("pair", &format!("k{}", i))).collect();

    crossbeam::scope(|s| {
        let writer_keys = &keys;
        let engine_ref = &engine;
        s.spawn(move |_| {
            let mut ctx = Context::new();
            for round in 0..100u8 {
                engine_ref.begin_batch_write(&mut ctx);
                for key in writer_keys {
                    engine_ref.put(&mut ctx, key, &[round]).unwrap();
                }
                engine_ref.commit_batch_write(&mut ctx).unwrap();
            }
        });

        for _ in 0..2 {
            s.spawn(move |_| {
                let mut ctx = Context::new();
                for _ in 0..100 {
                    let mut iter = engine_ref.find(&mut ctx, &writer_keys[0], false).unwrap();
                    let mut seen = HashSet::new();
                    while iter.valid() {
                        seen.insert(iter.value().to_vec());
                        iter.next();
                    }
                    // every key written by one batch, or none yet
                    assert!(seen.len() <= 1);
                }
            });
        }
    })
    .unwrap();
}
