use std::sync::Arc;

use feed_core::{ServiceError, now_micros};
use feed_kv::KVStore;
use tracing::{debug, warn};

use crate::error::kv_err;
use crate::keys;
use crate::model::{NewTweet, TimelineEntry, Tweet, TweetId, UserId};

/// Tweet bodies keyed by id, plus a per-author index of authored tweets.
///
/// Ids come from an atomic storage counter, so concurrent appends never
/// share an id. The counter only restarts through [`TweetStore::clear`].
#[derive(Clone)]
pub struct TweetStore {
    kv: Arc<dyn KVStore>,
}

impl TweetStore {
    pub fn new(kv: Arc<dyn KVStore>) -> Self {
        Self { kv }
    }

    /// Assign an id, stamp the time if absent, and store the record.
    ///
    /// The author index is written separately by [`TweetStore::index_authored`].
    pub fn append(&self, new: NewTweet) -> Result<Tweet, ServiceError> {
        let tweet_id = self.kv.incr(keys::TWEET_COUNTER).map_err(kv_err)?;
        let tweet = Tweet {
            tweet_id,
            user_id: new.user_id,
            tweet_text: new.tweet_text,
            tweet_ts: new.tweet_ts.unwrap_or_else(now_micros),
        };

        let bytes = serde_json::to_vec(&tweet)
            .map_err(|e| ServiceError::Internal(format!("serialize: {}", e)))?;
        self.kv
            .set(&keys::tweet(tweet_id), &bytes)
            .map_err(kv_err)?;

        debug!("append: tweet {} by user {}", tweet_id, tweet.user_id);
        Ok(tweet)
    }

    /// Add the tweet to its author's own index (`tweets:{user}`).
    pub fn index_authored(&self, tweet: &Tweet) -> Result<(), ServiceError> {
        self.kv
            .zadd(
                &keys::authored(tweet.user_id),
                &keys::tweet_member(tweet.tweet_id),
                tweet.tweet_ts,
            )
            .map_err(kv_err)?;
        Ok(())
    }

    /// Get a tweet by id. Returns None if it does not exist.
    pub fn get(&self, id: TweetId) -> Result<Option<Tweet>, ServiceError> {
        match self.kv.get(&keys::tweet(id)).map_err(kv_err)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Get a tweet or return NotFound.
    pub fn get_or_err(&self, id: TweetId) -> Result<Tweet, ServiceError> {
        self.get(id)?
            .ok_or_else(|| ServiceError::NotFound(format!("tweet {} not found", id)))
    }

    /// Fetch the records behind `entries` in one storage read, keeping
    /// order. Entries whose record is missing are skipped.
    pub fn resolve(&self, entries: &[TimelineEntry]) -> Result<Vec<Tweet>, ServiceError> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }
        let key_strings: Vec<String> = entries.iter().map(|e| keys::tweet(e.tweet_id)).collect();
        let key_refs: Vec<&str> = key_strings.iter().map(String::as_str).collect();
        let records = self.kv.get_many(&key_refs).map_err(kv_err)?;

        let mut tweets = Vec::with_capacity(entries.len());
        for (entry, record) in entries.iter().zip(records) {
            match record {
                Some(bytes) => tweets.push(decode(&bytes)?),
                None => warn!("resolve: tweet {} has no record, skipping", entry.tweet_id),
            }
        }
        Ok(tweets)
    }

    /// The newest `limit` entries of an author's index (all when None).
    pub fn authored_entries(
        &self,
        user: UserId,
        limit: Option<usize>,
    ) -> Result<Vec<TimelineEntry>, ServiceError> {
        let members = self
            .kv
            .zrevrange(&keys::authored(user), limit)
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

    /// Every tweet `user` authored, newest first.
    pub fn by_author(&self, user: UserId) -> Result<Vec<Tweet>, ServiceError> {
        let entries = self.authored_entries(user, None)?;
        self.resolve(&entries)
    }

    /// Remove every tweet, every author index and reset the id counter.
    pub fn clear(&self) -> Result<(), ServiceError> {
        let mut removed = self.kv.delete_prefix(keys::TWEET_PREFIX).map_err(kv_err)?;
        removed += self.kv.delete_prefix(keys::AUTHORED_PREFIX).map_err(kv_err)?;
        self.kv.delete(keys::TWEET_COUNTER).map_err(kv_err)?;
        debug!("tweets cleared: {} entries removed", removed);
        Ok(())
    }
}

fn decode(bytes: &[u8]) -> Result<Tweet, ServiceError> {
    serde_json::from_slice(bytes).map_err(|e| ServiceError::Internal(format!("deserialize: {}", e)))
}
