use std::path::PathBuf;

use crate::types::DEFAULT_TIMELINE_LIMIT;

/// Default number of follower timeline inserts sent to the store per call.
pub const DEFAULT_FANOUT_BATCH_SIZE: usize = 1000;

/// Configuration shared by the feed backends and the benchmark binary.
///
/// The binary fills this from flags or `FEED_*` environment variables, then
/// passes it to storage initialization.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Directory holding the database files.
    pub data_dir: Option<PathBuf>,

    /// Path to the redb database file.
    /// Defaults to `{data_dir}/feed.redb` if not specified.
    pub db_path: Option<PathBuf>,

    /// Path to the SQLite database file.
    /// Defaults to `{data_dir}/feed.sqlite` if not specified.
    pub sqlite_path: Option<PathBuf>,

    /// Timeline size used when a read does not pass an explicit limit.
    pub timeline_limit: usize,

    /// Upper bound on follower timeline inserts per storage call.
    pub fanout_batch_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            db_path: None,
            sqlite_path: None,
            timeline_limit: DEFAULT_TIMELINE_LIMIT,
            fanout_batch_size: DEFAULT_FANOUT_BATCH_SIZE,
        }
    }
}

impl ServiceConfig {
    /// Parse configuration from command-line style arguments.
    ///
    /// Supported flags:
    /// - `--data-dir=PATH`
    /// - `--db=PATH`
    /// - `--sqlite=PATH`
    /// - `--timeline-limit=N`
    /// - `--fanout-batch=N`
    ///
    /// Unknown flags and unparsable numbers are ignored.
    pub fn from_args(args: &[String]) -> Self {
        let mut config = ServiceConfig::default();

        for arg in args {
            if let Some(val) = arg.strip_prefix("--data-dir=") {
                config.data_dir = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--db=") {
                config.db_path = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--sqlite=") {
                config.sqlite_path = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--timeline-limit=") {
                if let Ok(n) = val.parse() {
                    config.timeline_limit = n;
                }
            } else if let Some(val) = arg.strip_prefix("--fanout-batch=") {
                if let Ok(n) = val.parse::<usize>() {
                    config.fanout_batch_size = n.max(1);
                }
            }
        }

        config
    }

    /// Resolve the redb database path, falling back to `{data_dir}/feed.redb`.
    pub fn resolve_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.resolve_data_subpath("feed.redb"))
    }

    /// Resolve the SQLite database path, falling back to `{data_dir}/feed.sqlite`.
    pub fn resolve_sqlite_path(&self) -> PathBuf {
        self.sqlite_path
            .clone()
            .unwrap_or_else(|| self.resolve_data_subpath("feed.sqlite"))
    }

    fn resolve_data_subpath(&self, name: &str) -> PathBuf {
        self.data_dir
            .as_ref()
            .map(|d| d.join(name))
            .unwrap_or_else(|| PathBuf::from(name))
    }
}
