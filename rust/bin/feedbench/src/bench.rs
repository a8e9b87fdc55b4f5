use std::time::{Duration, Instant};

use feed::UserId;
use rand::Rng;
use tracing::info;

use crate::config::Feed;
use crate::loader::per_sec;

/// Result of a timeline read run.
#[derive(Debug)]
pub struct TimelineStats {
    pub iterations: usize,
    pub elapsed: Duration,
    /// Reads that returned at least one tweet.
    pub non_empty: usize,
}

impl TimelineStats {
    pub fn per_sec(&self) -> f64 {
        per_sec(self.iterations, self.elapsed)
    }

    pub fn print(&self) {
        println!(
            "Timeline fetches: {} in {:.2} seconds ({} non-empty)",
            self.iterations,
            self.elapsed.as_secs_f64(),
            self.non_empty
        );
        println!("getTimeline: {:.2} timelines/sec", self.per_sec());
    }
}

/// Read `iterations` timelines for user ids drawn uniformly from `range`.
pub fn timelines(
    feed: &Feed,
    range: (UserId, UserId),
    iterations: usize,
    limit: usize,
    join: bool,
) -> anyhow::Result<TimelineStats> {
    let (lo, hi) = range;
    let mut rng = rand::thread_rng();

    let start = Instant::now();
    let mut non_empty = 0;
    for _ in 0..iterations {
        let user = rng.gen_range(lo..=hi);
        if !feed.timeline(user, limit, join)?.is_empty() {
            non_empty += 1;
        }
    }
    let stats = TimelineStats {
        iterations,
        elapsed: start.elapsed(),
        non_empty,
    };
    info!(
        "{} backend: {} timelines in {:.2}s ({:.2}/sec, join={})",
        feed.backend(),
        stats.iterations,
        stats.elapsed.as_secs_f64(),
        stats.per_sec(),
        join
    );
    Ok(stats)
}
