use feed_core::ServiceError;
use feed_kv::KVError;
use feed_sql::SQLError;

pub(crate) fn kv_err(e: KVError) -> ServiceError {
    match e {
        KVError::Unavailable(msg) => ServiceError::StorageUnavailable(msg),
        KVError::Storage(msg) => ServiceError::Storage(msg),
        KVError::Serialization(msg) => ServiceError::Internal(msg),
    }
}

pub(crate) fn sql_err(e: SQLError) -> ServiceError {
    if e.is_unavailable() {
        ServiceError::StorageUnavailable(e.to_string())
    } else {
        ServiceError::Storage(e.to_string())
    }
}
