pub mod config;
pub mod error;
pub mod types;

pub use config::ServiceConfig;
pub use error::ServiceError;
pub use types::{DEFAULT_TIMELINE_LIMIT, check_limit, now_micros};
