use std::sync::Arc;

use anyhow::Context;
use clap::ValueEnum;
use feed::{FeedApi, KvFeed, SqlFeed, Tweet, UserId};
use feed_core::ServiceConfig;
use tracing::info;

/// Which store backs the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Fan-out-on-write over redb.
    Kv,
    /// Fan-out-on-read over SQLite.
    Sql,
    /// Fan-out-on-write over the in-memory store; nothing persists.
    Memory,
}

/// An opened feed. The key-value variant keeps its concrete type so the
/// join read stays reachable.
pub enum Feed {
    Kv(KvFeed),
    Sql(SqlFeed),
}

impl Feed {
    pub fn api(&self) -> &dyn FeedApi {
        match self {
            Feed::Kv(f) => f,
            Feed::Sql(f) => f,
        }
    }

    pub fn backend(&self) -> &'static str {
        self.api().backend()
    }

    /// Read a timeline. On SQL every read is already a join, so `join` only
    /// changes the key-value path.
    pub fn timeline(&self, user: UserId, limit: usize, join: bool) -> anyhow::Result<Vec<Tweet>> {
        let tweets = match self {
            Feed::Kv(f) if join => f.timeline_by_join(user, limit)?,
            _ => self.api().timeline(user, limit)?,
        };
        Ok(tweets)
    }
}

/// Open the store for `backend`, creating the data directory if needed.
pub fn open(backend: Backend, config: &ServiceConfig) -> anyhow::Result<Feed> {
    if let Some(dir) = &config.data_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create data dir {}", dir.display()))?;
    }

    let feed = match backend {
        Backend::Kv => {
            let path = config.resolve_db_path();
            info!("Opening redb store at {}", path.display());
            let kv: Arc<dyn feed_kv::KVStore> = Arc::new(
                feed_kv::RedbStore::open(&path)
                    .map_err(|e| anyhow::anyhow!("failed to open KV store: {}", e))?,
            );
            Feed::Kv(KvFeed::new(kv, config))
        }
        Backend::Memory => Feed::Kv(KvFeed::new(Arc::new(feed_kv::MemoryStore::new()), config)),
        Backend::Sql => {
            let path = config.resolve_sqlite_path();
            info!("Opening SQLite store at {}", path.display());
            let sql: Arc<dyn feed_sql::SQLStore> = Arc::new(
                feed_sql::SqliteStore::open(&path)
                    .map_err(|e| anyhow::anyhow!("failed to open SQL store: {}", e))?,
            );
            Feed::Sql(SqlFeed::new(sql)?)
        }
    };
    Ok(feed)
}
