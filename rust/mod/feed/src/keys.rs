//! Key layout of the fan-out-on-write store.
//!
//! ```text
//! counter:tweet          counter   last assigned tweet id
//! tweet:{id:020}         record    JSON-encoded Tweet
//! tweets:{user}          zset      member = tweet id, score = tweet_ts (authored tweets)
//! timeline:{user}        zset      member = tweet id, score = tweet_ts (precomputed timeline)
//! followers:{user}       set       ids following {user}
//! following:{user}       set       ids {user} follows
//! ```
//!
//! Tweet ids are zero-padded to 20 digits so lexical member order equals
//! numeric order; equal scores therefore break ties by tweet id.

use feed_core::ServiceError;

use crate::model::{TweetId, UserId};

pub const TWEET_COUNTER: &str = "counter:tweet";

pub const TWEET_PREFIX: &str = "tweet:";
pub const AUTHORED_PREFIX: &str = "tweets:";
pub const TIMELINE_PREFIX: &str = "timeline:";
pub const FOLLOWERS_PREFIX: &str = "followers:";
pub const FOLLOWING_PREFIX: &str = "following:";

pub fn tweet(id: TweetId) -> String {
    format!("{TWEET_PREFIX}{}", tweet_member(id))
}

pub fn authored(user: UserId) -> String {
    format!("{AUTHORED_PREFIX}{user}")
}

pub fn timeline(user: UserId) -> String {
    format!("{TIMELINE_PREFIX}{user}")
}

pub fn followers(user: UserId) -> String {
    format!("{FOLLOWERS_PREFIX}{user}")
}

pub fn following(user: UserId) -> String {
    format!("{FOLLOWING_PREFIX}{user}")
}

/// Ordered-set member for a tweet id.
pub fn tweet_member(id: TweetId) -> String {
    format!("{id:020}")
}

pub fn parse_tweet_member(member: &str) -> Result<TweetId, ServiceError> {
    member
        .parse()
        .map_err(|_| ServiceError::Internal(format!("bad tweet id member '{member}'")))
}

pub fn parse_user_member(member: &str) -> Result<UserId, ServiceError> {
    member
        .parse()
        .map_err(|_| ServiceError::Internal(format!("bad user id member '{member}'")))
}
