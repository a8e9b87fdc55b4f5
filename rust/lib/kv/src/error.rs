use thiserror::Error;

#[derive(Error, Debug)]
pub enum KVError {
    /// The store is closed or could not be opened.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
