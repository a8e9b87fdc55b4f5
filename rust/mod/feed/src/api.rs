use feed_core::ServiceError;

use crate::model::{NewTweet, Tweet, UserId};

/// The operations both timeline strategies expose.
///
/// Implementations are `Send + Sync`; every method may be called
/// concurrently from many threads against the same backing store.
pub trait FeedApi: Send + Sync {
    /// Short backend name for logs and reports (`"kv"`, `"sql"`).
    fn backend(&self) -> &'static str;

    /// Record that `follower` follows `followee`. Idempotent.
    fn add_follow(&self, follower: UserId, followee: UserId) -> Result<(), ServiceError>;

    /// Record many follow edges, grouped into one storage transaction.
    fn add_follows(&self, edges: &[(UserId, UserId)]) -> Result<(), ServiceError> {
        for (follower, followee) in edges {
            self.add_follow(*follower, *followee)?;
        }
        Ok(())
    }

    /// Remove a follow edge. Already materialized timeline entries stay.
    fn unfollow(&self, follower: UserId, followee: UserId) -> Result<(), ServiceError>;

    /// Ids following `user`, ascending.
    fn followers(&self, user: UserId) -> Result<Vec<UserId>, ServiceError>;

    /// Ids `user` follows, ascending.
    fn followees(&self, user: UserId) -> Result<Vec<UserId>, ServiceError>;

    /// Store a tweet and make it visible to the author's followers.
    fn post_tweet(&self, tweet: NewTweet) -> Result<Tweet, ServiceError>;

    /// The newest `limit` tweets from the accounts `user` follows.
    fn timeline(&self, user: UserId, limit: usize) -> Result<Vec<Tweet>, ServiceError>;

    /// Every tweet `user` authored, newest first.
    fn tweets_by_author(&self, user: UserId) -> Result<Vec<Tweet>, ServiceError>;

    /// A single tweet, or None.
    fn get_tweet(&self, id: u64) -> Result<Option<Tweet>, ServiceError>;

    /// Remove every follow edge.
    fn clear_follows(&self) -> Result<(), ServiceError>;

    /// Remove every tweet and derived timeline, and restart tweet ids at 1.
    fn clear_tweets(&self) -> Result<(), ServiceError>;

    /// Release the backing store.
    fn close(&self) -> Result<(), ServiceError>;
}
