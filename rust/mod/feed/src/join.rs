use feed_core::{ServiceError, check_limit};
use tracing::debug;

use crate::graph::SocialGraph;
use crate::model::{TimelineEntry, Tweet, UserId};
use crate::tweets::TweetStore;

/// Fan-out-on-read against the key-value store: nothing is precomputed,
/// the timeline is assembled from the followee set and each followee's
/// authored index at read time.
///
/// Only the newest `limit` entries of each followee can make the global top
/// `limit`, so each index is read with that bound before the merge.
#[derive(Clone)]
pub struct JoinReader {
    graph: SocialGraph,
    tweets: TweetStore,
}

impl JoinReader {
    pub fn new(graph: SocialGraph, tweets: TweetStore) -> Self {
        Self { graph, tweets }
    }

    pub fn timeline(&self, user: UserId, limit: usize) -> Result<Vec<Tweet>, ServiceError> {
        let limit = check_limit(limit)?;
        let followees = self.graph.followees(user)?;

        let mut merged: Vec<TimelineEntry> = Vec::new();
        for followee in &followees {
            merged.extend(self.tweets.authored_entries(*followee, Some(limit))?);
        }
        merged.sort_by(TimelineEntry::newest_first);
        merged.truncate(limit);

        debug!(
            "join timeline: user {} over {} followees -> {} entries",
            user,
            followees.len(),
            merged.len()
        );
        self.tweets.resolve(&merged)
    }
}
