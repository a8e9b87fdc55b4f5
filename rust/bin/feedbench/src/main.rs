//! `feedbench` — bulk loader and benchmark harness for the feed backends.
//!
//! Usage:
//!   feedbench --backend kv load --follows follows.csv --tweets tweet.csv
//!   feedbench --backend sql bench --follows follows.csv --tweets tweet.csv
//!   feedbench --backend kv timeline 42 --limit 20 --join

mod bench;
mod config;
mod loader;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use feed_core::DEFAULT_TIMELINE_LIMIT;
use tracing::info;

use config::Backend;
use loader::LoadArgs;

/// Feed loader and benchmark harness.
#[derive(Parser, Debug)]
#[command(name = "feedbench", about = "Social feed loader and benchmark harness")]
struct Cli {
    /// Storage backend.
    #[arg(long, env = "FEED_BACKEND", value_enum, default_value = "kv", global = true)]
    backend: Backend,

    /// Directory holding the database files (default: current directory).
    #[arg(long, env = "FEED_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Follower timeline inserts per storage call.
    #[arg(long, env = "FEED_FANOUT_BATCH", default_value_t = feed_core::config::DEFAULT_FANOUT_BATCH_SIZE, global = true)]
    fanout_batch: usize,

    /// Tweets per timeline when a command does not pass `--limit`.
    #[arg(long, env = "FEED_TIMELINE_LIMIT", default_value_t = DEFAULT_TIMELINE_LIMIT, global = true)]
    timeline_limit: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load follows and tweets from CSV files, timing the posts.
    Load(LoadArgs),

    /// Load, then time random timeline reads.
    Bench {
        #[command(flatten)]
        load: LoadArgs,

        /// Number of timeline reads.
        #[arg(long, env = "FEED_ITERATIONS", default_value_t = 1000)]
        iterations: usize,

        /// Tweets per timeline.
        #[arg(long)]
        limit: Option<usize>,

        /// Read through the fan-out-on-read join (kv and memory backends).
        #[arg(long)]
        join: bool,
    },

    /// Print a user's timeline.
    Timeline {
        /// User id.
        user: u64,

        /// Tweets to show.
        #[arg(long)]
        limit: Option<usize>,

        /// Compute the timeline by join instead of reading the precomputed one.
        #[arg(long)]
        join: bool,
    },

    /// Remove all follows and tweets.
    Clear,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let service_config = feed_core::ServiceConfig {
        data_dir: cli.data_dir.clone(),
        timeline_limit: cli.timeline_limit,
        fanout_batch_size: cli.fanout_batch.max(1),
        ..Default::default()
    };
    let feed = config::open(cli.backend, &service_config)?;
    info!("backend {} ready", feed.backend());

    let result = match cli.command {
        Commands::Load(args) => loader::run(feed.api(), &args).map(|report| report.print()),
        Commands::Bench {
            load,
            iterations,
            limit,
            join,
        } => loader::run(feed.api(), &load).and_then(|report| {
            report.print();
            let range = report
                .user_range
                .ok_or_else(|| anyhow::anyhow!("no follows loaded; nothing to benchmark"))?;
            let limit = limit.unwrap_or(service_config.timeline_limit);
            let stats = bench::timelines(&feed, range, iterations, limit, join)?;
            stats.print();
            Ok(())
        }),
        Commands::Timeline { user, limit, join } => {
            let limit = limit.unwrap_or(service_config.timeline_limit);
            let tweets = feed.timeline(user, limit, join)?;
            if tweets.is_empty() {
                println!("(empty timeline)");
            }
            for t in tweets {
                println!("{:>10}  {:>8}  {:>18}  {}", t.tweet_id, t.user_id, t.tweet_ts, t.tweet_text);
            }
            Ok(())
        }
        Commands::Clear => {
            feed.api().clear_tweets()?;
            feed.api().clear_follows()?;
            println!("Cleared follows and tweets.");
            Ok(())
        }
    };

    feed.api().close()?;
    result
}
