use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::KVError;
use crate::traits::{KVStore, ScoredMember, ZEntry, decode_counter};

#[derive(Default)]
struct ZSet {
    ordered: BTreeSet<(i64, String)>,
    scores: HashMap<String, i64>,
}

impl ZSet {
    fn add(&mut self, member: &str, score: i64) -> bool {
        match self.scores.insert(member.to_string(), score) {
            Some(old) if old == score => false,
            Some(old) => {
                self.ordered.remove(&(old, member.to_string()));
                self.ordered.insert((score, member.to_string()));
                false
            }
            None => {
                self.ordered.insert((score, member.to_string()));
                true
            }
        }
    }
}

#[derive(Default)]
struct Layers {
    records: BTreeMap<String, Vec<u8>>,
    sets: BTreeMap<String, BTreeSet<String>>,
    zsets: BTreeMap<String, ZSet>,
}

/// Remove every entry of `map` whose key starts with `prefix`, returning
/// the removed values.
fn drain_prefixed<V>(map: &mut BTreeMap<String, V>, prefix: &str) -> Vec<V> {
    let doomed: Vec<String> = map
        .range(prefix.to_string()..)
        .take_while(|(k, _)| k.starts_with(prefix))
        .map(|(k, _)| k.clone())
        .collect();
    doomed.iter().filter_map(|k| map.remove(k)).collect()
}

fn scored(entries: impl Iterator<Item = (i64, String)>, limit: Option<usize>) -> Vec<ScoredMember> {
    entries
        .take(limit.unwrap_or(usize::MAX))
        .map(|(score, member)| ScoredMember { member, score })
        .collect()
}

/// MemoryStore keeps everything in process memory behind one `RwLock`.
///
/// It has the same semantics as [`crate::RedbStore`], including ordering
/// and close behaviour, and is what tests and `--backend memory` runs use.
pub struct MemoryStore {
    layers: RwLock<Option<Layers>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            layers: RwLock::new(Some(Layers::default())),
        }
    }

    fn read<T>(&self, f: impl FnOnce(&Layers) -> Result<T, KVError>) -> Result<T, KVError> {
        let guard: RwLockReadGuard<'_, Option<Layers>> = self
            .layers
            .read()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        let layers = guard
            .as_ref()
            .ok_or_else(|| KVError::Unavailable("memory store is closed".to_string()))?;
        f(layers)
    }

    fn write<T>(&self, f: impl FnOnce(&mut Layers) -> Result<T, KVError>) -> Result<T, KVError> {
        let mut guard: RwLockWriteGuard<'_, Option<Layers>> = self
            .layers
            .write()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        let layers = guard
            .as_mut()
            .ok_or_else(|| KVError::Unavailable("memory store is closed".to_string()))?;
        f(layers)
    }
}

impl KVStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError> {
        self.read(|l| Ok(l.records.get(key).cloned()))
    }

    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>, KVError> {
        self.read(|l| Ok(keys.iter().map(|k| l.records.get(*k).cloned()).collect()))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError> {
        self.write(|l| {
            l.records.insert(key.to_string(), value.to_vec());
            Ok(())
        })
    }

    fn delete(&self, key: &str) -> Result<(), KVError> {
        self.write(|l| {
            l.records.remove(key);
            Ok(())
        })
    }

    fn batch_set(&self, entries: &[(&str, &[u8])]) -> Result<(), KVError> {
        self.write(|l| {
            for (key, value) in entries {
                l.records.insert(key.to_string(), value.to_vec());
            }
            Ok(())
        })
    }

    fn batch_delete(&self, keys: &[&str]) -> Result<(), KVError> {
        self.write(|l| {
            for key in keys {
                l.records.remove(*key);
            }
            Ok(())
        })
    }

    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVError> {
        self.read(|l| {
            Ok(l.records
                .range(prefix.to_string()..)
                .take_while(|(k, _)| k.starts_with(prefix))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect())
        })
    }

    fn incr(&self, key: &str) -> Result<u64, KVError> {
        self.write(|l| {
            let current = match l.records.get(key) {
                Some(bytes) => decode_counter(bytes)?,
                None => 0,
            };
            let next = current + 1;
            l.records.insert(key.to_string(), next.to_be_bytes().to_vec());
            Ok(next)
        })
    }

    fn sadd(&self, key: &str, member: &str) -> Result<bool, KVError> {
        self.write(|l| {
            Ok(l.sets
                .entry(key.to_string())
                .or_default()
                .insert(member.to_string()))
        })
    }

    fn sadd_batch(&self, entries: &[(&str, &str)]) -> Result<usize, KVError> {
        self.write(|l| {
            let mut added = 0;
            for (key, member) in entries {
                if l.sets
                    .entry(key.to_string())
                    .or_default()
                    .insert(member.to_string())
                {
                    added += 1;
                }
            }
            Ok(added)
        })
    }

    fn srem(&self, key: &str, member: &str) -> Result<bool, KVError> {
        self.write(|l| {
            let Some(set) = l.sets.get_mut(key) else {
                return Ok(false);
            };
            let removed = set.remove(member);
            if set.is_empty() {
                l.sets.remove(key);
            }
            Ok(removed)
        })
    }

    fn smembers(&self, key: &str) -> Result<Vec<String>, KVError> {
        self.read(|l| {
            Ok(l.sets
                .get(key)
                .map(|s| s.iter().cloned().collect())
                .unwrap_or_default())
        })
    }

    fn scard(&self, key: &str) -> Result<usize, KVError> {
        self.read(|l| Ok(l.sets.get(key).map_or(0, |s| s.len())))
    }

    fn zadd(&self, key: &str, member: &str, score: i64) -> Result<bool, KVError> {
        self.write(|l| Ok(l.zsets.entry(key.to_string()).or_default().add(member, score)))
    }

    fn zadd_batch(&self, entries: &[ZEntry]) -> Result<(), KVError> {
        self.write(|l| {
            for e in entries {
                l.zsets
                    .entry(e.key.clone())
                    .or_default()
                    .add(&e.member, e.score);
            }
            Ok(())
        })
    }

    fn zrange(&self, key: &str, limit: Option<usize>) -> Result<Vec<ScoredMember>, KVError> {
        self.read(|l| {
            Ok(l.zsets
                .get(key)
                .map(|z| scored(z.ordered.iter().cloned(), limit))
                .unwrap_or_default())
        })
    }

    fn zrevrange(
        &self,
        key: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ScoredMember>, KVError> {
        self.read(|l| {
            Ok(l.zsets
                .get(key)
                .map(|z| scored(z.ordered.iter().rev().cloned(), limit))
                .unwrap_or_default())
        })
    }

    fn zcard(&self, key: &str) -> Result<usize, KVError> {
        self.read(|l| Ok(l.zsets.get(key).map_or(0, |z| z.scores.len())))
    }

    fn delete_prefix(&self, prefix: &str) -> Result<usize, KVError> {
        self.write(|l| {
            let mut removed = drain_prefixed(&mut l.records, prefix).len();
            removed += drain_prefixed(&mut l.sets, prefix)
                .iter()
                .map(|s| s.len())
                .sum::<usize>();
            removed += drain_prefixed(&mut l.zsets, prefix)
                .iter()
                .map(|z| z.scores.len())
                .sum::<usize>();
            Ok(removed)
        })
    }

    fn close(&self) -> Result<(), KVError> {
        let mut guard = self
            .layers
            .write()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        guard.take();
        Ok(())
    }
}
