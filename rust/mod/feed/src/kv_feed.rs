use std::sync::Arc;

use feed_core::{ServiceConfig, ServiceError};
use feed_kv::KVStore;
use tracing::info;

use crate::api::FeedApi;
use crate::error::kv_err;
use crate::fanout::FanoutWriter;
use crate::graph::SocialGraph;
use crate::join::JoinReader;
use crate::model::{NewTweet, Tweet, TweetId, UserId};
use crate::timeline::{TimelineReader, Timelines};
use crate::tweets::TweetStore;

/// Fan-out-on-write feed over a [`KVStore`].
///
/// Holds one store handle shared by its components; the caller owns the
/// handle's lifecycle.
pub struct KvFeed {
    kv: Arc<dyn KVStore>,
    graph: SocialGraph,
    tweets: TweetStore,
    timelines: Timelines,
    writer: FanoutWriter,
    reader: TimelineReader,
    join: JoinReader,
}

impl KvFeed {
    pub fn new(kv: Arc<dyn KVStore>, config: &ServiceConfig) -> Self {
        Self::with_batch_size(kv, config.fanout_batch_size)
    }

    pub fn with_batch_size(kv: Arc<dyn KVStore>, fanout_batch_size: usize) -> Self {
        let graph = SocialGraph::new(Arc::clone(&kv));
        let tweets = TweetStore::new(Arc::clone(&kv));
        let timelines = Timelines::new(Arc::clone(&kv));
        let writer = FanoutWriter::new(
            graph.clone(),
            tweets.clone(),
            timelines.clone(),
            fanout_batch_size,
        );
        let reader = TimelineReader::new(timelines.clone(), tweets.clone());
        let join = JoinReader::new(graph.clone(), tweets.clone());
        Self {
            kv,
            graph,
            tweets,
            timelines,
            writer,
            reader,
            join,
        }
    }

    /// Fan-out-on-read over the same data, for comparison with
    /// [`FeedApi::timeline`].
    pub fn timeline_by_join(&self, user: UserId, limit: usize) -> Result<Vec<Tweet>, ServiceError> {
        self.join.timeline(user, limit)
    }

    pub fn graph(&self) -> &SocialGraph {
        &self.graph
    }

    pub fn tweets(&self) -> &TweetStore {
        &self.tweets
    }

    pub fn timelines(&self) -> &Timelines {
        &self.timelines
    }
}

impl FeedApi for KvFeed {
    fn backend(&self) -> &'static str {
        "kv"
    }

    fn add_follow(&self, follower: UserId, followee: UserId) -> Result<(), ServiceError> {
        self.graph.add_follow(follower, followee).map(|_| ())
    }

    fn add_follows(&self, edges: &[(UserId, UserId)]) -> Result<(), ServiceError> {
        self.graph.add_follows(edges)
    }

    fn unfollow(&self, follower: UserId, followee: UserId) -> Result<(), ServiceError> {
        self.graph.remove_follow(follower, followee).map(|_| ())
    }

    fn followers(&self, user: UserId) -> Result<Vec<UserId>, ServiceError> {
        self.graph.followers(user)
    }

    fn followees(&self, user: UserId) -> Result<Vec<UserId>, ServiceError> {
        self.graph.followees(user)
    }

    fn post_tweet(&self, tweet: NewTweet) -> Result<Tweet, ServiceError> {
        self.writer.post(tweet)
    }

    fn timeline(&self, user: UserId, limit: usize) -> Result<Vec<Tweet>, ServiceError> {
        self.reader.timeline(user, limit)
    }

    fn tweets_by_author(&self, user: UserId) -> Result<Vec<Tweet>, ServiceError> {
        self.tweets.by_author(user)
    }

    fn get_tweet(&self, id: TweetId) -> Result<Option<Tweet>, ServiceError> {
        self.tweets.get(id)
    }

    fn clear_follows(&self) -> Result<(), ServiceError> {
        self.graph.clear()
    }

    fn clear_tweets(&self) -> Result<(), ServiceError> {
        self.tweets.clear()?;
        self.timelines.clear()
    }

    fn close(&self) -> Result<(), ServiceError> {
        self.kv.close().map_err(kv_err)?;
        info!("kv feed closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feed_kv::{MemoryStore, RedbStore};

    fn memory_feed() -> KvFeed {
        KvFeed::new(Arc::new(MemoryStore::new()), &ServiceConfig::default())
    }

    #[test]
    fn scenario_followers_see_post_author_does_not() {
        let feed = memory_feed();
        feed.add_follow(2, 1).unwrap();
        feed.add_follow(3, 1).unwrap();
        feed.post_tweet(NewTweet::new(1, "hello").at(100)).unwrap();

        let b = feed.timeline(2, 10).unwrap();
        assert_eq!(b.len(), 1);
        assert_eq!((b[0].user_id, b[0].tweet_text.as_str(), b[0].tweet_ts), (1, "hello", 100));
        assert!(feed.timeline(1, 10).unwrap().is_empty());
    }

    #[test]
    fn scenario_solo_poster() {
        let feed = memory_feed();
        let solo = feed.post_tweet(NewTweet::new(4, "solo").at(200)).unwrap();
        assert!(feed.timeline(4, 10).unwrap().is_empty());
        assert_eq!(feed.tweets_by_author(4).unwrap(), vec![solo]);
    }

    #[test]
    fn self_follow_shows_own_tweets() {
        let feed = memory_feed();
        feed.add_follow(1, 1).unwrap();
        let t = feed.post_tweet(NewTweet::new(1, "me")).unwrap();
        assert_eq!(feed.timeline(1, 10).unwrap(), vec![t]);
    }

    #[test]
    fn clear_tweets_restarts_ids_and_empties_timelines() {
        let feed = memory_feed();
        feed.add_follow(2, 1).unwrap();
        feed.post_tweet(NewTweet::new(1, "a")).unwrap();
        feed.clear_tweets().unwrap();

        assert!(feed.timeline(2, 10).unwrap().is_empty());
        assert_eq!(feed.timelines().count(2).unwrap(), 0);
        assert_eq!(feed.followers(1).unwrap(), vec![2]);
        assert_eq!(feed.post_tweet(NewTweet::new(1, "b")).unwrap().tweet_id, 1);
    }

    #[test]
    fn redb_backed_feed_and_close() {
        let dir = tempfile::tempdir().unwrap();
        let kv: Arc<dyn KVStore> =
            Arc::new(RedbStore::open(&dir.path().join("feed.redb")).unwrap());
        let feed = KvFeed::new(kv, &ServiceConfig::default());

        feed.add_follow(2, 1).unwrap();
        let t = feed.post_tweet(NewTweet::new(1, "persisted")).unwrap();
        assert_eq!(feed.timeline(2, 10).unwrap(), vec![t]);

        feed.close().unwrap();
        let err = feed.timeline(2, 10).unwrap_err();
        assert!(err.is_unavailable());
        let err = feed.post_tweet(NewTweet::new(1, "late")).unwrap_err();
        assert!(err.is_unavailable());
    }
}
