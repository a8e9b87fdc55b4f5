use thiserror::Error;

#[derive(Error, Debug)]
pub enum SQLError {
    #[error("query error: {0}")]
    Query(String),

    #[error("execution error: {0}")]
    Execution(String),

    /// The database could not be opened.
    #[error("connection error: {0}")]
    Connection(String),

    /// The connection was closed by its owner.
    #[error("connection closed: {0}")]
    Unavailable(String),
}

impl SQLError {
    /// Whether the database cannot be reached at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, SQLError::Connection(_) | SQLError::Unavailable(_))
    }
}
