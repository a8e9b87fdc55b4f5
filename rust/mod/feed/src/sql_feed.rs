use std::sync::Arc;

use feed_core::{ServiceError, check_limit, now_micros};
use feed_sql::{Row, SQLStore, Value};
use tracing::{debug, info};

use crate::api::FeedApi;
use crate::error::sql_err;
use crate::model::{NewTweet, Tweet, TweetId, UserId};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS follows (
    follower_id INTEGER NOT NULL,
    followee_id INTEGER NOT NULL,
    PRIMARY KEY (follower_id, followee_id)
);
CREATE INDEX IF NOT EXISTS follows_followee ON follows (followee_id, follower_id);
CREATE TABLE IF NOT EXISTS tweet (
    tweet_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id    INTEGER NOT NULL,
    tweet_text TEXT NOT NULL,
    tweet_ts   INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS tweet_author_ts ON tweet (user_id, tweet_ts);
";

const INSERT_FOLLOW: &str =
    "INSERT OR IGNORE INTO follows (follower_id, followee_id) VALUES (?1, ?2)";

const INSERT_TWEET: &str = "INSERT INTO tweet (user_id, tweet_text, tweet_ts) VALUES (?1, ?2, ?3) \
     RETURNING tweet_id";

const SELECT_TIMELINE: &str = "SELECT t.tweet_id, t.user_id, t.tweet_text, t.tweet_ts \
     FROM tweet t JOIN follows f ON t.user_id = f.followee_id \
     WHERE f.follower_id = ?1 \
     ORDER BY t.tweet_ts DESC, t.tweet_id DESC \
     LIMIT ?2";

const SELECT_BY_AUTHOR: &str = "SELECT tweet_id, user_id, tweet_text, tweet_ts FROM tweet \
     WHERE user_id = ?1 ORDER BY tweet_ts DESC, tweet_id DESC";

const SELECT_TWEET: &str =
    "SELECT tweet_id, user_id, tweet_text, tweet_ts FROM tweet WHERE tweet_id = ?1";

/// Fan-out-on-read baseline over a relational store.
///
/// Posting is a single insert. Reading joins `follows` with `tweet`, sorts
/// by timestamp and limits; nothing is precomputed.
pub struct SqlFeed {
    sql: Arc<dyn SQLStore>,
}

impl SqlFeed {
    /// Wrap a store, creating the schema if it does not exist.
    pub fn new(sql: Arc<dyn SQLStore>) -> Result<Self, ServiceError> {
        sql.exec_batch(SCHEMA).map_err(sql_err)?;
        Ok(Self { sql })
    }

    fn users(&self, sql: &str, user: UserId) -> Result<Vec<UserId>, ServiceError> {
        let rows = self.sql.query(sql, &[id_value(user)]).map_err(sql_err)?;
        rows.iter()
            .map(|r| {
                r.columns
                    .first()
                    .and_then(|(_, v)| match v {
                        Value::Integer(i) => Some(*i as u64),
                        _ => None,
                    })
                    .ok_or_else(|| ServiceError::Internal("non-integer user id".to_string()))
            })
            .collect()
    }

    fn tweets(&self, sql: &str, params: &[Value]) -> Result<Vec<Tweet>, ServiceError> {
        let rows = self.sql.query(sql, params).map_err(sql_err)?;
        rows.iter().map(tweet_from_row).collect()
    }
}

fn id_value(id: u64) -> Value {
    Value::Integer(id as i64)
}

fn tweet_from_row(row: &Row) -> Result<Tweet, ServiceError> {
    let int = |name: &str| {
        row.get_i64(name)
            .ok_or_else(|| ServiceError::Internal(format!("tweet row missing {}", name)))
    };
    Ok(Tweet {
        tweet_id: int("tweet_id")? as u64,
        user_id: int("user_id")? as u64,
        tweet_text: row
            .get_str("tweet_text")
            .ok_or_else(|| ServiceError::Internal("tweet row missing tweet_text".to_string()))?
            .to_string(),
        tweet_ts: int("tweet_ts")?,
    })
}

impl FeedApi for SqlFeed {
    fn backend(&self) -> &'static str {
        "sql"
    }

    fn add_follow(&self, follower: UserId, followee: UserId) -> Result<(), ServiceError> {
        self.sql
            .exec(INSERT_FOLLOW, &[id_value(follower), id_value(followee)])
            .map_err(sql_err)?;
        Ok(())
    }

    fn add_follows(&self, edges: &[(UserId, UserId)]) -> Result<(), ServiceError> {
        let rows: Vec<Vec<Value>> = edges
            .iter()
            .map(|(follower, followee)| vec![id_value(*follower), id_value(*followee)])
            .collect();
        let added = self.sql.exec_many(INSERT_FOLLOW, &rows).map_err(sql_err)?;
        debug!("add_follows: {} of {} edges new", added, edges.len());
        Ok(())
    }

    fn unfollow(&self, follower: UserId, followee: UserId) -> Result<(), ServiceError> {
        self.sql
            .exec(
                "DELETE FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
                &[id_value(follower), id_value(followee)],
            )
            .map_err(sql_err)?;
        Ok(())
    }

    fn followers(&self, user: UserId) -> Result<Vec<UserId>, ServiceError> {
        self.users(
            "SELECT follower_id FROM follows WHERE followee_id = ?1 ORDER BY follower_id",
            user,
        )
    }

    fn followees(&self, user: UserId) -> Result<Vec<UserId>, ServiceError> {
        self.users(
            "SELECT followee_id FROM follows WHERE follower_id = ?1 ORDER BY followee_id",
            user,
        )
    }

    fn post_tweet(&self, new: NewTweet) -> Result<Tweet, ServiceError> {
        let tweet_ts = new.tweet_ts.unwrap_or_else(now_micros);
        let rows = self
            .sql
            .query(
                INSERT_TWEET,
                &[
                    id_value(new.user_id),
                    Value::Text(new.tweet_text.clone()),
                    Value::Integer(tweet_ts),
                ],
            )
            .map_err(sql_err)?;
        let tweet_id = rows
            .first()
            .and_then(|r| r.get_i64("tweet_id"))
            .ok_or_else(|| ServiceError::Internal("insert returned no tweet_id".to_string()))?;
        debug!("post_tweet: id={} author={}", tweet_id, new.user_id);
        Ok(Tweet {
            tweet_id: tweet_id as u64,
            user_id: new.user_id,
            tweet_text: new.tweet_text,
            tweet_ts,
        })
    }

    fn timeline(&self, user: UserId, limit: usize) -> Result<Vec<Tweet>, ServiceError> {
        check_limit(limit)?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.tweets(SELECT_TIMELINE, &[id_value(user), Value::Integer(limit)])
    }

    fn tweets_by_author(&self, user: UserId) -> Result<Vec<Tweet>, ServiceError> {
        self.tweets(SELECT_BY_AUTHOR, &[id_value(user)])
    }

    fn get_tweet(&self, id: TweetId) -> Result<Option<Tweet>, ServiceError> {
        Ok(self.tweets(SELECT_TWEET, &[id_value(id)])?.into_iter().next())
    }

    fn clear_follows(&self) -> Result<(), ServiceError> {
        self.sql.exec_batch("DELETE FROM follows;").map_err(sql_err)
    }

    fn clear_tweets(&self) -> Result<(), ServiceError> {
        self.sql
            .exec_batch("DELETE FROM tweet; DELETE FROM sqlite_sequence WHERE name = 'tweet';")
            .map_err(sql_err)
    }

    fn close(&self) -> Result<(), ServiceError> {
        self.sql.close().map_err(sql_err)?;
        info!("sql feed closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feed_sql::SqliteStore;

    fn feed() -> SqlFeed {
        SqlFeed::new(Arc::new(SqliteStore::open_in_memory().unwrap())).unwrap()
    }

    #[test]
    fn follow_is_idempotent() {
        let feed = feed();
        feed.add_follow(2, 1).unwrap();
        feed.add_follow(2, 1).unwrap();
        feed.add_follows(&[(3, 1), (2, 1)]).unwrap();
        assert_eq!(feed.followers(1).unwrap(), vec![2, 3]);
        assert_eq!(feed.followees(2).unwrap(), vec![1]);
    }

    #[test]
    fn timeline_joins_followees_newest_first() {
        let feed = feed();
        feed.add_follows(&[(9, 1), (9, 2)]).unwrap();
        let a = feed.post_tweet(NewTweet::new(1, "a").at(100)).unwrap();
        let b = feed.post_tweet(NewTweet::new(2, "b").at(300)).unwrap();
        let c = feed.post_tweet(NewTweet::new(1, "c").at(300)).unwrap();
        feed.post_tweet(NewTweet::new(5, "stranger").at(400)).unwrap();

        let ids: Vec<u64> = feed.timeline(9, 10).unwrap().iter().map(|t| t.tweet_id).collect();
        assert_eq!(ids, vec![c.tweet_id, b.tweet_id, a.tweet_id]);
        assert_eq!(feed.timeline(9, 1).unwrap(), vec![c]);
    }

    #[test]
    fn zero_limit_is_rejected() {
        let err = feed().timeline(1, 0).unwrap_err();
        assert_eq!(err.error_code(), feed_core::error::error_code::INVALID_ARGUMENT);
    }

    #[test]
    fn follow_after_post_sees_history() {
        // Fan-out-on-read has no materialized state to miss.
        let feed = feed();
        let t = feed.post_tweet(NewTweet::new(1, "early").at(5)).unwrap();
        feed.add_follow(2, 1).unwrap();
        assert_eq!(feed.timeline(2, 10).unwrap(), vec![t]);
    }

    #[test]
    fn clear_tweets_resets_ids() {
        let feed = feed();
        feed.post_tweet(NewTweet::new(1, "a")).unwrap();
        feed.post_tweet(NewTweet::new(1, "b")).unwrap();
        feed.clear_tweets().unwrap();
        assert!(feed.tweets_by_author(1).unwrap().is_empty());
        assert_eq!(feed.post_tweet(NewTweet::new(1, "c")).unwrap().tweet_id, 1);
        assert_eq!(feed.get_tweet(1).unwrap().unwrap().tweet_text, "c");
        assert!(feed.get_tweet(2).unwrap().is_none());
    }

    #[test]
    fn closed_store_is_unavailable() {
        let feed = feed();
        feed.close().unwrap();
        assert!(feed.add_follow(1, 2).unwrap_err().is_unavailable());
        assert!(feed.timeline(1, 10).unwrap_err().is_unavailable());
    }
}
