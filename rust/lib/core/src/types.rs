use crate::ServiceError;

/// Number of entries a timeline read returns when the caller does not say.
pub const DEFAULT_TIMELINE_LIMIT: usize = 10;

/// Current time as microseconds since the Unix epoch.
pub fn now_micros() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

/// Reject a non-positive timeline limit before any storage access.
pub fn check_limit(limit: usize) -> Result<usize, ServiceError> {
    if limit == 0 {
        return Err(ServiceError::InvalidArgument(
            "limit must be positive".to_string(),
        ));
    }
    Ok(limit)
}
