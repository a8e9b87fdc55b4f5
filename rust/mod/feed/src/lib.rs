//! Social feed backed by two timeline strategies.
//!
//! - [`KvFeed`]: fan-out-on-write. Posting pushes a reference to the tweet
//!   into every current follower's precomputed timeline; reading is one
//!   bounded reverse range scan plus a batched record fetch.
//! - [`SqlFeed`]: fan-out-on-read. Posting is a single insert; reading joins
//!   the follow graph with the tweet table, sorts and limits.
//!
//! Both implement [`FeedApi`] so the loader and benchmark harness can drive
//! either one.

pub mod api;
pub mod fanout;
pub mod graph;
pub mod join;
pub mod keys;
pub mod kv_feed;
pub mod model;
pub mod sql_feed;
pub mod timeline;
pub mod tweets;

mod error;

pub use api::FeedApi;
pub use fanout::FanoutWriter;
pub use graph::SocialGraph;
pub use join::JoinReader;
pub use kv_feed::KvFeed;
pub use model::{NewTweet, Timestamp, TimelineEntry, Tweet, TweetId, UserId};
pub use sql_feed::SqlFeed;
pub use timeline::{TimelineReader, Timelines};
pub use tweets::TweetStore;
