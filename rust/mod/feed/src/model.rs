use serde::{Deserialize, Serialize};

pub type UserId = u64;
pub type TweetId = u64;

/// Microseconds since the Unix epoch.
pub type Timestamp = i64;

/// A stored tweet. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tweet {
    pub tweet_id: TweetId,
    pub user_id: UserId,
    pub tweet_text: String,
    pub tweet_ts: Timestamp,
}

/// A tweet as submitted by a caller, before an id is assigned.
///
/// `tweet_ts` is stamped with the current time when absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTweet {
    pub user_id: UserId,
    pub tweet_text: String,
    pub tweet_ts: Option<Timestamp>,
}

impl NewTweet {
    pub fn new(user_id: UserId, tweet_text: impl Into<String>) -> Self {
        Self {
            user_id,
            tweet_text: tweet_text.into(),
            tweet_ts: None,
        }
    }

    /// Use an explicit creation time instead of the current time.
    pub fn at(mut self, tweet_ts: Timestamp) -> Self {
        self.tweet_ts = Some(tweet_ts);
        self
    }
}

/// A reference to a tweet inside a timeline: the id plus its score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineEntry {
    pub tweet_id: TweetId,
    pub tweet_ts: Timestamp,
}

impl TimelineEntry {
    /// Newest first, equal timestamps by higher id first.
    pub fn newest_first(a: &TimelineEntry, b: &TimelineEntry) -> std::cmp::Ordering {
        (b.tweet_ts, b.tweet_id).cmp(&(a.tweet_ts, a.tweet_id))
    }
}

impl From<&Tweet> for TimelineEntry {
    fn from(t: &Tweet) -> Self {
        Self {
            tweet_id: t.tweet_id,
            tweet_ts: t.tweet_ts,
        }
    }
}
