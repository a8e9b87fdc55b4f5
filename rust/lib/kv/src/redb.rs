use std::path::Path;
use std::sync::{Arc, RwLock};

use redb::{
    Database, ReadOnlyTable, ReadTransaction, ReadableTable, Table, TableDefinition,
    WriteTransaction,
};
use tracing::debug;

use crate::error::KVError;
use crate::traits::{
    KVStore, ScoredMember, ZEntry, decode_counter, member_key, members_end, members_start,
    parse_sortable_score, sortable_score,
};

/// Plain records and counters.
const RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("records");
/// Set members: `{key}|{member}` → empty.
const SETS: TableDefinition<&str, &[u8]> = TableDefinition::new("sets");
/// Ordered-set entries: `{key}|{sortable score}|{member}` → empty.
const ZSETS: TableDefinition<&str, &[u8]> = TableDefinition::new("zsets");
/// Ordered-set score index: `{key}|{member}` → score.
const ZSCORES: TableDefinition<&str, i64> = TableDefinition::new("zscores");

const EMPTY: &[u8] = &[];

fn storage<E: std::fmt::Display>(e: E) -> KVError {
    KVError::Storage(e.to_string())
}

/// RedbStore is a KVStore implementation backed by redb, a pure-Rust embedded
/// key-value database. Each data type lives in its own table; every mutating
/// call runs in exactly one write transaction.
pub struct RedbStore {
    db: RwLock<Option<Arc<Database>>>,
}

impl RedbStore {
    /// Open or create a redb database at the given path.
    pub fn open(path: &Path) -> Result<Self, KVError> {
        let db = Database::create(path).map_err(|e| KVError::Unavailable(e.to_string()))?;

        // Ensure every table exists so read transactions can open them.
        let write_txn = db.begin_write().map_err(storage)?;
        {
            write_txn.open_table(RECORDS).map_err(storage)?;
            write_txn.open_table(SETS).map_err(storage)?;
            write_txn.open_table(ZSETS).map_err(storage)?;
            write_txn.open_table(ZSCORES).map_err(storage)?;
        }
        write_txn.commit().map_err(storage)?;

        debug!("RedbStore: opened {:?}", path);
        Ok(Self {
            db: RwLock::new(Some(Arc::new(db))),
        })
    }

    fn handle(&self) -> Result<Arc<Database>, KVError> {
        let guard = self.db.read().map_err(storage)?;
        guard
            .as_ref()
            .cloned()
            .ok_or_else(|| KVError::Unavailable("redb store is closed".to_string()))
    }

    fn read<T>(
        &self,
        f: impl FnOnce(&ReadTransaction) -> Result<T, KVError>,
    ) -> Result<T, KVError> {
        let db = self.handle()?;
        let read_txn = db.begin_read().map_err(storage)?;
        f(&read_txn)
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&WriteTransaction) -> Result<T, KVError>,
    ) -> Result<T, KVError> {
        let db = self.handle()?;
        let write_txn = db.begin_write().map_err(storage)?;
        let out = f(&write_txn)?;
        write_txn.commit().map_err(storage)?;
        Ok(out)
    }
}

/// Insert one ordered-set member inside an open write transaction.
fn zadd_in(
    zsets: &mut Table<'_, &'static str, &'static [u8]>,
    scores: &mut Table<'_, &'static str, i64>,
    key: &str,
    member: &str,
    score: i64,
) -> Result<bool, KVError> {
    let index_key = member_key(key, member);
    let previous = scores
        .get(index_key.as_str())
        .map_err(storage)?
        .map(|v| v.value());

    match previous {
        Some(old) if old == score => return Ok(false),
        Some(old) => {
            let stale = member_key(key, &format!("{}|{member}", sortable_score(old)));
            zsets.remove(stale.as_str()).map_err(storage)?;
        }
        None => {}
    }

    let entry = member_key(key, &format!("{}|{member}", sortable_score(score)));
    zsets.insert(entry.as_str(), EMPTY).map_err(storage)?;
    scores.insert(index_key.as_str(), score).map_err(storage)?;
    Ok(previous.is_none())
}

fn decode_zset_entry(key: &str, physical: &str) -> Result<ScoredMember, KVError> {
    let rest = &physical[members_start(key).len()..];
    let (hex, member) = rest
        .split_once('|')
        .ok_or_else(|| KVError::Serialization(format!("bad ordered-set entry '{physical}'")))?;
    Ok(ScoredMember {
        member: member.to_string(),
        score: parse_sortable_score(hex)?,
    })
}

fn zscan(
    table: &ReadOnlyTable<&'static str, &'static [u8]>,
    key: &str,
    limit: Option<usize>,
    reverse: bool,
) -> Result<Vec<ScoredMember>, KVError> {
    let start = members_start(key);
    let end = members_end(key);
    let range = table.range(start.as_str()..end.as_str()).map_err(storage)?;
    let limit = limit.unwrap_or(usize::MAX);

    let entries: Box<dyn Iterator<Item = _> + '_> = if reverse {
        Box::new(range.rev())
    } else {
        Box::new(range)
    };

    let mut out = Vec::new();
    for entry in entries.take(limit) {
        let (k, _) = entry.map_err(storage)?;
        out.push(decode_zset_entry(key, k.value())?);
    }
    Ok(out)
}

/// Collect then remove every key in `table` starting with `prefix`.
fn remove_prefixed<V: redb::Value + 'static>(
    table: &mut Table<'_, &'static str, V>,
    prefix: &str,
) -> Result<usize, KVError> {
    let mut doomed = Vec::new();
    for entry in table.range(prefix..).map_err(storage)? {
        let (k, _) = entry.map_err(storage)?;
        let key = k.value();
        if !key.starts_with(prefix) {
            break;
        }
        doomed.push(key.to_string());
    }
    for key in &doomed {
        table.remove(key.as_str()).map_err(storage)?;
    }
    Ok(doomed.len())
}

impl KVStore for RedbStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError> {
        self.read(|txn| {
            let table = txn.open_table(RECORDS).map_err(storage)?;
            let value = table.get(key).map_err(storage)?;
            Ok(value.map(|v| v.value().to_vec()))
        })
    }

    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>, KVError> {
        self.read(|txn| {
            let table = txn.open_table(RECORDS).map_err(storage)?;
            let mut out = Vec::with_capacity(keys.len());
            for key in keys {
                let value = table.get(*key).map_err(storage)?;
                out.push(value.map(|v| v.value().to_vec()));
            }
            Ok(out)
        })
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError> {
        self.write(|txn| {
            let mut table = txn.open_table(RECORDS).map_err(storage)?;
            table.insert(key, value).map_err(storage)?;
            Ok(())
        })
    }

    fn delete(&self, key: &str) -> Result<(), KVError> {
        self.write(|txn| {
            let mut table = txn.open_table(RECORDS).map_err(storage)?;
            table.remove(key).map_err(storage)?;
            Ok(())
        })
    }

    fn batch_set(&self, entries: &[(&str, &[u8])]) -> Result<(), KVError> {
        self.write(|txn| {
            let mut table = txn.open_table(RECORDS).map_err(storage)?;
            for (key, value) in entries {
                table.insert(*key, *value).map_err(storage)?;
            }
            Ok(())
        })
    }

    fn batch_delete(&self, keys: &[&str]) -> Result<(), KVError> {
        self.write(|txn| {
            let mut table = txn.open_table(RECORDS).map_err(storage)?;
            for key in keys {
                table.remove(*key).map_err(storage)?;
            }
            Ok(())
        })
    }

    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVError> {
        self.read(|txn| {
            let table = txn.open_table(RECORDS).map_err(storage)?;
            let mut results = Vec::new();
            for entry in table.range(prefix..).map_err(storage)? {
                let (k, v) = entry.map_err(storage)?;
                let key = k.value();
                if !key.starts_with(prefix) {
                    break;
                }
                results.push((key.to_string(), v.value().to_vec()));
            }
            Ok(results)
        })
    }

    fn incr(&self, key: &str) -> Result<u64, KVError> {
        self.write(|txn| {
            let mut table = txn.open_table(RECORDS).map_err(storage)?;
            let current = match table.get(key).map_err(storage)? {
                Some(v) => decode_counter(v.value())?,
                None => 0,
            };
            let next = current + 1;
            table
                .insert(key, next.to_be_bytes().as_slice())
                .map_err(storage)?;
            Ok(next)
        })
    }

    fn sadd(&self, key: &str, member: &str) -> Result<bool, KVError> {
        self.write(|txn| {
            let mut table = txn.open_table(SETS).map_err(storage)?;
            let physical = member_key(key, member);
            let previous = table
                .insert(physical.as_str(), EMPTY)
                .map_err(storage)?;
            Ok(previous.is_none())
        })
    }

    fn sadd_batch(&self, entries: &[(&str, &str)]) -> Result<usize, KVError> {
        if entries.is_empty() {
            return Ok(0);
        }
        self.write(|txn| {
            let mut table = txn.open_table(SETS).map_err(storage)?;
            let mut added = 0;
            for (key, member) in entries {
                let physical = member_key(key, member);
                if table
                    .insert(physical.as_str(), EMPTY)
                    .map_err(storage)?
                    .is_none()
                {
                    added += 1;
                }
            }
            Ok(added)
        })
    }

    fn srem(&self, key: &str, member: &str) -> Result<bool, KVError> {
        self.write(|txn| {
            let mut table = txn.open_table(SETS).map_err(storage)?;
            let physical = member_key(key, member);
            let previous = table.remove(physical.as_str()).map_err(storage)?;
            Ok(previous.is_some())
        })
    }

    fn smembers(&self, key: &str) -> Result<Vec<String>, KVError> {
        self.read(|txn| {
            let table = txn.open_table(SETS).map_err(storage)?;
            let start = members_start(key);
            let end = members_end(key);
            let mut members = Vec::new();
            for entry in table.range(start.as_str()..end.as_str()).map_err(storage)? {
                let (k, _) = entry.map_err(storage)?;
                members.push(k.value()[start.len()..].to_string());
            }
            Ok(members)
        })
    }

    fn scard(&self, key: &str) -> Result<usize, KVError> {
        Ok(self.smembers(key)?.len())
    }

    fn zadd(&self, key: &str, member: &str, score: i64) -> Result<bool, KVError> {
        self.write(|txn| {
            let mut zsets = txn.open_table(ZSETS).map_err(storage)?;
            let mut scores = txn.open_table(ZSCORES).map_err(storage)?;
            zadd_in(&mut zsets, &mut scores, key, member, score)
        })
    }

    fn zadd_batch(&self, entries: &[ZEntry]) -> Result<(), KVError> {
        if entries.is_empty() {
            return Ok(());
        }
        self.write(|txn| {
            let mut zsets = txn.open_table(ZSETS).map_err(storage)?;
            let mut scores = txn.open_table(ZSCORES).map_err(storage)?;
            for e in entries {
                zadd_in(&mut zsets, &mut scores, &e.key, &e.member, e.score)?;
            }
            Ok(())
        })
    }

    fn zrange(&self, key: &str, limit: Option<usize>) -> Result<Vec<ScoredMember>, KVError> {
        self.read(|txn| {
            let table = txn.open_table(ZSETS).map_err(storage)?;
            zscan(&table, key, limit, false)
        })
    }

    fn zrevrange(
        &self,
        key: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ScoredMember>, KVError> {
        self.read(|txn| {
            let table = txn.open_table(ZSETS).map_err(storage)?;
            zscan(&table, key, limit, true)
        })
    }

    fn zcard(&self, key: &str) -> Result<usize, KVError> {
        self.read(|txn| {
            let table = txn.open_table(ZSCORES).map_err(storage)?;
            let start = members_start(key);
            let end = members_end(key);
            let mut count = 0;
            for entry in table.range(start.as_str()..end.as_str()).map_err(storage)? {
                entry.map_err(storage)?;
                count += 1;
            }
            Ok(count)
        })
    }

    fn delete_prefix(&self, prefix: &str) -> Result<usize, KVError> {
        let removed = self.write(|txn| {
            let mut records = txn.open_table(RECORDS).map_err(storage)?;
            let mut sets = txn.open_table(SETS).map_err(storage)?;
            let mut zsets = txn.open_table(ZSETS).map_err(storage)?;
            let mut scores = txn.open_table(ZSCORES).map_err(storage)?;

            let mut removed = remove_prefixed(&mut records, prefix)?;
            removed += remove_prefixed(&mut sets, prefix)?;
            removed += remove_prefixed(&mut zsets, prefix)?;
            remove_prefixed(&mut scores, prefix)?;
            Ok(removed)
        })?;
        debug!("RedbStore: removed {} entries under {:?}", removed, prefix);
        Ok(removed)
    }

    fn close(&self) -> Result<(), KVError> {
        let mut guard = self.db.write().map_err(storage)?;
        if guard.take().is_some() {
            debug!("RedbStore: closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> (RedbStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStore::open(&dir.path().join("test.redb")).unwrap();
        (store, dir)
    }

    #[test]
    fn record_roundtrip_and_scan() {
        let (store, _dir) = open();
        store.set("tweet:1", b"one").unwrap();
        store.set("tweet:2", b"two").unwrap();
        store.set("tweets:1", b"other").unwrap();

        assert_eq!(store.get("tweet:1").unwrap().as_deref(), Some(&b"one"[..]));
        assert!(store.get("tweet:3").unwrap().is_none());

        let scanned = store.scan("tweet:").unwrap();
        let keys: Vec<&str> = scanned.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["tweet:1", "tweet:2"]);

        let many = store.get_many(&["tweet:2", "missing", "tweet:1"]).unwrap();
        assert_eq!(many[0].as_deref(), Some(&b"two"[..]));
        assert!(many[1].is_none());
        assert_eq!(many[2].as_deref(), Some(&b"one"[..]));
    }

    #[test]
    fn incr_starts_at_one() {
        let (store, _dir) = open();
        assert_eq!(store.incr("tweet:counter").unwrap(), 1);
        assert_eq!(store.incr("tweet:counter").unwrap(), 2);
        store.delete("tweet:counter").unwrap();
        assert_eq!(store.incr("tweet:counter").unwrap(), 1);
    }

    #[test]
    fn sets_are_idempotent() {
        let (store, _dir) = open();
        assert!(store.sadd("followers:1", "2").unwrap());
        assert!(!store.sadd("followers:1", "2").unwrap());
        assert!(store.sadd("followers:1", "3").unwrap());
        store.sadd("followers:10", "9").unwrap();

        assert_eq!(store.smembers("followers:1").unwrap(), vec!["2", "3"]);
        assert_eq!(store.scard("followers:1").unwrap(), 2);
        assert!(store.srem("followers:1", "2").unwrap());
        assert!(!store.srem("followers:1", "2").unwrap());
        assert_eq!(store.smembers("followers:1").unwrap(), vec!["3"]);
        assert!(store.smembers("followers:2").unwrap().is_empty());
    }

    #[test]
    fn sadd_batch_counts_new_members() {
        let (store, _dir) = open();
        store.sadd("followers:2", "1").unwrap();
        let added = store
            .sadd_batch(&[("following:1", "2"), ("followers:2", "1"), ("followers:3", "1")])
            .unwrap();
        assert_eq!(added, 2);
        assert_eq!(store.smembers("following:1").unwrap(), vec!["2"]);
        assert_eq!(store.smembers("followers:3").unwrap(), vec!["1"]);
    }

    #[test]
    fn ordered_set_ranges() {
        let (store, _dir) = open();
        assert!(store.zadd("timeline:1", "a", 30).unwrap());
        store.zadd("timeline:1", "b", -10).unwrap();
        store.zadd("timeline:1", "c", 20).unwrap();
        store.zadd("timeline:10", "z", 99).unwrap();

        let desc: Vec<String> = store
            .zrevrange("timeline:1", None)
            .unwrap()
            .into_iter()
            .map(|m| m.member)
            .collect();
        assert_eq!(desc, vec!["a", "c", "b"]);

        let asc = store.zrange("timeline:1", Some(2)).unwrap();
        assert_eq!(
            asc,
            vec![
                ScoredMember { member: "b".into(), score: -10 },
                ScoredMember { member: "c".into(), score: 20 },
            ]
        );
        assert_eq!(store.zcard("timeline:1").unwrap(), 3);
    }

    #[test]
    fn zadd_rescores_existing_member() {
        let (store, _dir) = open();
        store.zadd("timeline:1", "a", 10).unwrap();
        store.zadd("timeline:1", "b", 20).unwrap();
        assert!(!store.zadd("timeline:1", "a", 30).unwrap());
        assert!(!store.zadd("timeline:1", "a", 30).unwrap());

        let top = store.zrevrange("timeline:1", Some(1)).unwrap();
        assert_eq!(top[0], ScoredMember { member: "a".into(), score: 30 });
        assert_eq!(store.zcard("timeline:1").unwrap(), 2);
    }

    #[test]
    fn zadd_batch_spans_keys() {
        let (store, _dir) = open();
        let entries: Vec<ZEntry> = (1..=3)
            .map(|u| ZEntry::new(format!("timeline:{u}"), "00000000000000000001", 100))
            .collect();
        store.zadd_batch(&entries).unwrap();
        for u in 1..=3 {
            assert_eq!(store.zcard(&format!("timeline:{u}")).unwrap(), 1);
        }
    }

    #[test]
    fn delete_prefix_covers_all_types() {
        let (store, _dir) = open();
        store.set("tweet:1", b"x").unwrap();
        store.incr("tweet:counter").unwrap();
        store.set("tweets_meta", b"keep").unwrap();
        store.sadd("followers:1", "2").unwrap();
        store.zadd("timeline:2", "1", 5).unwrap();

        assert_eq!(store.delete_prefix("tweet:").unwrap(), 2);
        assert_eq!(store.delete_prefix("timeline:").unwrap(), 1);
        assert!(store.get("tweets_meta").unwrap().is_some());
        assert_eq!(store.zcard("timeline:2").unwrap(), 0);
        assert_eq!(store.smembers("followers:1").unwrap(), vec!["2"]);
    }

    #[test]
    fn closed_store_is_unavailable() {
        let (store, _dir) = open();
        store.set("k", b"v").unwrap();
        store.close().unwrap();
        assert!(matches!(store.get("k"), Err(KVError::Unavailable(_))));
        assert!(matches!(store.incr("c"), Err(KVError::Unavailable(_))));
        // Closing twice is fine.
        store.close().unwrap();
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("persist.redb");
        {
            let store = RedbStore::open(&path).unwrap();
            store.incr("tweet:counter").unwrap();
            store.zadd("timeline:1", "00000000000000000001", 7).unwrap();
        }
        let store = RedbStore::open(&path).unwrap();
        assert_eq!(store.incr("tweet:counter").unwrap(), 2);
        assert_eq!(store.zcard("timeline:1").unwrap(), 1);
    }
}
