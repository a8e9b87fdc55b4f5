use std::sync::Arc;

use feed_core::{ServiceError, check_limit};
use feed_kv::{KVStore, ZEntry};
use tracing::debug;

use crate::error::kv_err;
use crate::keys;
use crate::model::{TimelineEntry, Tweet, UserId};
use crate::tweets::TweetStore;

/// Precomputed per-user timelines: ordered sets of tweet references scored
/// by tweet timestamp.
///
/// This is derived state. It can be rebuilt from the graph and the tweet
/// store, but nothing keeps it in step with follows made after a post.
#[derive(Clone)]
pub struct Timelines {
    kv: Arc<dyn KVStore>,
}

impl Timelines {
    pub fn new(kv: Arc<dyn KVStore>) -> Self {
        Self { kv }
    }

    /// Insert one entry into each recipient's timeline with a single
    /// storage call.
    pub fn deliver(&self, entry: TimelineEntry, recipients: &[UserId]) -> Result<(), ServiceError> {
        if recipients.is_empty() {
            return Ok(());
        }
        let member = keys::tweet_member(entry.tweet_id);
        let batch: Vec<ZEntry> = recipients
            .iter()
            .map(|user| ZEntry::new(keys::timeline(*user), member.clone(), entry.tweet_ts))
            .collect();
        self.kv.zadd_batch(&batch).map_err(kv_err)
    }

    /// The newest `limit` entries of `user`'s timeline.
    pub fn entries(&self, user: UserId, limit: usize) -> Result<Vec<TimelineEntry>, ServiceError> {
        let members = self
            .kv
            .zrevrange(&keys::timeline(user), Some(limit))
            .map_err(kv_err)?;
        members
            .into_iter()
            .map(|m| {
                Ok(TimelineEntry {
                    tweet_id: keys::parse_tweet_member(&m.member)?,
                    tweet_ts: m.score,
                })
            })
            .collect()
    }

    /// Number of entries stored for `user`.
    pub fn count(&self, user: UserId) -> Result<usize, ServiceError> {
        self.kv.zcard(&keys::timeline(user)).map_err(kv_err)
    }

    /// Drop every precomputed timeline.
    pub fn clear(&self) -> Result<(), ServiceError> {
        let removed = self.kv.delete_prefix(keys::TIMELINE_PREFIX).map_err(kv_err)?;
        debug!("timelines cleared: {} entries removed", removed);
        Ok(())
    }
}

/// Serves the fan-out-on-write read path: one bounded reverse range scan
/// followed by one batched record fetch.
#[derive(Clone)]
pub struct TimelineReader {
    timelines: Timelines,
    tweets: TweetStore,
}

impl TimelineReader {
    pub fn new(timelines: Timelines, tweets: TweetStore) -> Self {
        Self { timelines, tweets }
    }

    /// The newest `limit` tweets delivered to `user`, newest first.
    ///
    /// An empty timeline is an empty result, not an error. Entries whose
    /// record has gone missing are skipped.
    pub fn timeline(&self, user: UserId, limit: usize) -> Result<Vec<Tweet>, ServiceError> {
        let limit = check_limit(limit)?;
        let entries = self.timelines.entries(user, limit)?;
        if entries.is_empty() {
            return Ok(Vec::new());
        }
        self.tweets.resolve(&entries)
    }
}
