use feed_core::ServiceError;
use tracing::{debug, warn};

use crate::graph::SocialGraph;
use crate::model::{NewTweet, TimelineEntry, Tweet};
use crate::timeline::Timelines;
use crate::tweets::TweetStore;

/// The fan-out-on-write engine.
///
/// `post` runs four steps, each atomic on its own, none atomic together:
///
/// 1. append the tweet record (id + timestamp assigned here),
/// 2. add it to the author's authored index,
/// 3. read the author's **current** follower set,
/// 4. insert a reference into every follower's timeline, in batches of at
///    most `batch_size` followers per storage call, sequentially.
///
/// If a later step fails the earlier ones stay applied: the tweet exists
/// and some followers may never see it. The error is returned unchanged.
///
/// The follower set is read once, so a follow racing with a post may or may
/// not receive it. Follows never backfill older tweets.
#[derive(Clone)]
pub struct FanoutWriter {
    graph: SocialGraph,
    tweets: TweetStore,
    timelines: Timelines,
    batch_size: usize,
}

impl FanoutWriter {
    pub fn new(
        graph: SocialGraph,
        tweets: TweetStore,
        timelines: Timelines,
        batch_size: usize,
    ) -> Self {
        Self {
            graph,
            tweets,
            timelines,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn post(&self, new: NewTweet) -> Result<Tweet, ServiceError> {
        let tweet = self.tweets.append(new)?;
        self.tweets.index_authored(&tweet)?;

        let followers = self.graph.followers(tweet.user_id)?;
        let entry = TimelineEntry::from(&tweet);

        let mut delivered = 0;
        for chunk in followers.chunks(self.batch_size) {
            if let Err(e) = self.timelines.deliver(entry, chunk) {
                warn!(
                    "fan-out of tweet {} stopped after {}/{} followers: {}",
                    tweet.tweet_id,
                    delivered,
                    followers.len(),
                    e
                );
                return Err(e);
            }
            delivered += chunk.len();
        }

        debug!(
            "post: tweet {} by user {} delivered to {} followers",
            tweet.tweet_id, tweet.user_id, delivered
        );
        Ok(tweet)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::timeline::TimelineReader;
    use feed_kv::{KVStore, MemoryStore};

    struct Parts {
        graph: SocialGraph,
        tweets: TweetStore,
        reader: TimelineReader,
    }

    fn setup(batch_size: usize) -> (FanoutWriter, Parts) {
        let kv: Arc<dyn KVStore> = Arc::new(MemoryStore::new());
        let graph = SocialGraph::new(Arc::clone(&kv));
        let tweets = TweetStore::new(Arc::clone(&kv));
        let timelines = Timelines::new(kv);
        let writer = FanoutWriter::new(graph.clone(), tweets.clone(), timelines.clone(), batch_size);
        let reader = TimelineReader::new(timelines, tweets.clone());
        (writer, Parts { graph, tweets, reader })
    }

    #[test]
    fn post_reaches_current_followers_only() {
        let (writer, p) = setup(1000);
        p.graph.add_follow(2, 1).unwrap();
        p.graph.add_follow(3, 1).unwrap();

        let t = writer.post(NewTweet::new(1, "hello").at(100)).unwrap();

        assert_eq!(p.reader.timeline(2, 10).unwrap(), vec![t.clone()]);
        assert_eq!(p.reader.timeline(3, 10).unwrap(), vec![t.clone()]);
        assert!(p.reader.timeline(1, 10).unwrap().is_empty());
        assert_eq!(p.tweets.by_author(1).unwrap(), vec![t]);
    }

    #[test]
    fn later_follow_is_not_backfilled() {
        let (writer, p) = setup(1000);
        writer.post(NewTweet::new(1, "before").at(10)).unwrap();
        p.graph.add_follow(2, 1).unwrap();
        let after = writer.post(NewTweet::new(1, "after").at(20)).unwrap();

        assert_eq!(p.reader.timeline(2, 10).unwrap(), vec![after]);
    }

    #[test]
    fn small_batches_cover_every_follower() {
        let (writer, p) = setup(3);
        let followers: Vec<(u64, u64)> = (100..110).map(|f| (f, 1)).collect();
        p.graph.add_follows(&followers).unwrap();

        let t = writer.post(NewTweet::new(1, "wide")).unwrap();
        for (f, _) in followers {
            assert_eq!(p.reader.timeline(f, 10).unwrap(), vec![t.clone()]);
        }
    }

    #[test]
    fn zero_batch_size_is_clamped() {
        let (writer, _) = setup(0);
        assert_eq!(writer.batch_size(), 1);
    }
}
