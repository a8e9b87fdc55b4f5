use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Args;
use feed::{FeedApi, NewTweet, UserId};
use serde::Deserialize;
use tracing::{debug, info};

/// CSV inputs shared by `load` and `bench`.
#[derive(Args, Debug, Clone)]
pub struct LoadArgs {
    /// Follow edges, header `USER_ID,FOLLOWS_ID`.
    #[arg(long, env = "FEED_FOLLOWS_CSV", default_value = "follows.csv")]
    pub follows: PathBuf,

    /// Tweets, header `USER_ID,TWEET_TEXT`.
    #[arg(long, env = "FEED_TWEETS_CSV", default_value = "tweet.csv")]
    pub tweets: PathBuf,

    /// Keep existing data instead of clearing the backend first.
    #[arg(long)]
    pub keep: bool,

    /// Follow edges per insert group.
    #[arg(long, env = "FEED_LOAD_BATCH", default_value_t = 1000)]
    pub batch: usize,
}

#[derive(Debug, Deserialize)]
struct FollowRow {
    #[serde(rename = "USER_ID")]
    user_id: UserId,
    #[serde(rename = "FOLLOWS_ID")]
    follows_id: UserId,
}

#[derive(Debug, Deserialize)]
struct TweetRow {
    #[serde(rename = "USER_ID")]
    user_id: UserId,
    #[serde(rename = "TWEET_TEXT")]
    tweet_text: String,
}

/// What a load did.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub follows: usize,
    pub follows_elapsed: Duration,
    pub tweets: usize,
    pub tweets_elapsed: Duration,
    /// Smallest and largest follower id seen, the range `bench` samples from.
    pub user_range: Option<(UserId, UserId)>,
}

impl LoadReport {
    pub fn tweets_per_sec(&self) -> f64 {
        per_sec(self.tweets, self.tweets_elapsed)
    }

    pub fn print(&self) {
        println!(
            "Loaded {} follows in {:.2} seconds",
            self.follows,
            self.follows_elapsed.as_secs_f64()
        );
        println!(
            "Inserted {} tweets in {:.2} seconds",
            self.tweets,
            self.tweets_elapsed.as_secs_f64()
        );
        println!("postTweet: {:.2} tweets/sec", self.tweets_per_sec());
    }
}

pub(crate) fn per_sec(count: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 { count as f64 / secs } else { 0.0 }
}

/// Clear (unless `keep`), load follows in groups, then post every tweet.
pub fn run(feed: &dyn FeedApi, args: &LoadArgs) -> anyhow::Result<LoadReport> {
    if !args.keep {
        feed.clear_tweets()?;
        feed.clear_follows()?;
        info!("cleared {} backend", feed.backend());
    }

    let mut report = LoadReport::default();
    load_follows(feed, &args.follows, args.batch.max(1), &mut report)?;
    load_tweets(feed, &args.tweets, &mut report)?;
    Ok(report)
}

fn load_follows(
    feed: &dyn FeedApi,
    path: &Path,
    batch_size: usize,
    report: &mut LoadReport,
) -> anyhow::Result<()> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let start = Instant::now();
    let mut batch = Vec::with_capacity(batch_size);
    for row in reader.deserialize() {
        let row: FollowRow = row.with_context(|| format!("bad row in {}", path.display()))?;
        report.user_range = Some(match report.user_range {
            Some((lo, hi)) => (lo.min(row.user_id), hi.max(row.user_id)),
            None => (row.user_id, row.user_id),
        });
        batch.push((row.user_id, row.follows_id));
        if batch.len() >= batch_size {
            feed.add_follows(&batch)?;
            report.follows += batch.len();
            debug!("loaded {} follows", report.follows);
            batch.clear();
        }
    }
    if !batch.is_empty() {
        feed.add_follows(&batch)?;
        report.follows += batch.len();
    }
    report.follows_elapsed = start.elapsed();
    info!(
        "loaded {} follows from {} in {:.2}s",
        report.follows,
        path.display(),
        report.follows_elapsed.as_secs_f64()
    );
    Ok(())
}

fn load_tweets(feed: &dyn FeedApi, path: &Path, report: &mut LoadReport) -> anyhow::Result<()> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let start = Instant::now();
    for row in reader.deserialize() {
        let row: TweetRow = row.with_context(|| format!("bad row in {}", path.display()))?;
        feed.post_tweet(NewTweet::new(row.user_id, row.tweet_text))?;
        report.tweets += 1;
    }
    report.tweets_elapsed = start.elapsed();
    info!(
        "posted {} tweets in {:.2}s ({:.2} tweets/sec)",
        report.tweets,
        report.tweets_elapsed.as_secs_f64(),
        report.tweets_per_sec()
    );
    Ok(())
}
