use crate::error::KVError;

/// Separator between a logical key and a set / ordered-set member in the
/// physical key space. Logical keys must not contain it.
pub const MEMBER_SEP: char = '|';

/// A member of an ordered set together with its score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredMember {
    pub member: String,
    pub score: i64,
}

/// One ordered-set insert, used by [`KVStore::zadd_batch`] to write many
/// keys in a single storage transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZEntry {
    pub key: String,
    pub member: String,
    pub score: i64,
}

impl ZEntry {
    pub fn new(key: impl Into<String>, member: impl Into<String>, score: i64) -> Self {
        Self {
            key: key.into(),
            member: member.into(),
            score,
        }
    }
}

/// KVStore is the storage abstraction behind the fan-out-on-write feed.
///
/// Besides plain records it offers the handful of Redis-style primitives a
/// precomputed timeline needs: an atomic counter, unordered sets and
/// score-ordered sets. Every call is atomic on its own; nothing spans calls.
///
/// Keys follow a namespaced convention: `tweet:42`, `followers:7`,
/// `timeline:7`, etc.
pub trait KVStore: Send + Sync {
    // ── Records ──

    /// Get the value for a key. Returns None if the key does not exist.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError>;

    /// Get several keys from one consistent snapshot, in request order.
    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>, KVError>;

    /// Set a key-value pair.
    fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError>;

    /// Delete a key. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> Result<(), KVError>;

    /// Set many key-value pairs in one transaction.
    fn batch_set(&self, entries: &[(&str, &[u8])]) -> Result<(), KVError>;

    /// Delete many keys in one transaction.
    fn batch_delete(&self, keys: &[&str]) -> Result<(), KVError>;

    /// Scan all records whose key starts with `prefix`. Returns sorted pairs.
    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVError>;

    // ── Counters ──

    /// Atomically increment the counter at `key` and return the new value.
    /// A missing counter starts at 0, so the first call returns 1.
    fn incr(&self, key: &str) -> Result<u64, KVError>;

    // ── Sets ──

    /// Add `member` to the set at `key`. Returns true if it was not present.
    fn sadd(&self, key: &str, member: &str) -> Result<bool, KVError>;

    /// Add many `(key, member)` pairs, possibly across keys, in one transaction.
    /// Returns how many were not present before.
    fn sadd_batch(&self, entries: &[(&str, &str)]) -> Result<usize, KVError>;

    /// Remove `member` from the set at `key`. Returns true if it was present.
    fn srem(&self, key: &str, member: &str) -> Result<bool, KVError>;

    /// All members of the set at `key`, sorted. Empty if the set does not exist.
    fn smembers(&self, key: &str) -> Result<Vec<String>, KVError>;

    /// Number of members in the set at `key`.
    fn scard(&self, key: &str) -> Result<usize, KVError>;

    // ── Ordered sets ──

    /// Insert or re-score `member` in the ordered set at `key`.
    /// Returns true if the member was not present before.
    fn zadd(&self, key: &str, member: &str, score: i64) -> Result<bool, KVError>;

    /// Apply many ordered-set inserts, possibly across keys, in one transaction.
    fn zadd_batch(&self, entries: &[ZEntry]) -> Result<(), KVError>;

    /// Members in ascending `(score, member)` order, at most `limit` of them.
    fn zrange(&self, key: &str, limit: Option<usize>) -> Result<Vec<ScoredMember>, KVError>;

    /// Members in descending `(score, member)` order, at most `limit` of them.
    fn zrevrange(&self, key: &str, limit: Option<usize>)
        -> Result<Vec<ScoredMember>, KVError>;

    /// Number of members in the ordered set at `key`.
    fn zcard(&self, key: &str) -> Result<usize, KVError>;

    // ── Bulk delete / lifecycle ──

    /// Remove every record, set and ordered set whose logical key starts with
    /// `prefix`. Returns the number of records plus members removed.
    fn delete_prefix(&self, prefix: &str) -> Result<usize, KVError>;

    /// Release the backend. Every later call fails with `KVError::Unavailable`.
    fn close(&self) -> Result<(), KVError>;
}

/// Physical key of a set or ordered-set member.
pub(crate) fn member_key(key: &str, member: &str) -> String {
    format!("{key}{MEMBER_SEP}{member}")
}

/// Inclusive lower bound of all physical keys belonging to `key`.
pub(crate) fn members_start(key: &str) -> String {
    format!("{key}{MEMBER_SEP}")
}

/// Exclusive upper bound of all physical keys belonging to `key`
/// (the character right after the separator).
pub(crate) fn members_end(key: &str) -> String {
    format!("{key}}}")
}

/// Map a signed score onto an unsigned value with the same ordering, so the
/// hex rendering sorts lexically in score order.
pub(crate) fn sortable_score(score: i64) -> String {
    format!("{:016x}", (score as u64) ^ (1 << 63))
}

pub(crate) fn parse_sortable_score(hex: &str) -> Result<i64, KVError> {
    let raw = u64::from_str_radix(hex, 16)
        .map_err(|e| KVError::Serialization(format!("bad score '{hex}': {e}")))?;
    Ok((raw ^ (1 << 63)) as i64)
}

/// Decode a counter stored as 8 big-endian bytes.
pub(crate) fn decode_counter(bytes: &[u8]) -> Result<u64, KVError> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| KVError::Serialization(format!("counter has {} bytes", bytes.len())))?;
    Ok(u64::from_be_bytes(arr))
}
