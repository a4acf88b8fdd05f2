use thiserror::Error as ThisError;

/// Category of a failure reported by this crate.
///
/// Every operation returns an [`anyhow::Error`](crate::Error), the category
/// is recovered with `error.downcast_ref::<DbError>()`. Errors raised by
/// user supplied adapters and converters are propagated untouched and do not
/// necessarily carry a `DbError`.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum DbError {
    /// Opening or closing the native handle failed.
    #[error("connection error: {0}")]
    Connection(String),
    /// Prepare, bind or step failed (syntax errors, constraint violations).
    #[error("query error: {0}")]
    Query(String),
    /// `BEGIN`, `COMMIT` or `ROLLBACK` sequencing failed.
    #[error("transaction error: {0}")]
    Transaction(String),
    /// Meant for adapter and converter implementations rejecting their input.
    #[error("conversion error: {0}")]
    Conversion(String),
    /// The cursor or connection was already closed.
    #[error("cannot operate on a closed {0}")]
    Closed(&'static str),
}

impl DbError {
    pub fn connection(message: impl Into<String>) -> crate::Error {
        DbError::Connection(message.into()).into()
    }

    pub fn query(message: impl Into<String>) -> crate::Error {
        DbError::Query(message.into()).into()
    }

    pub fn transaction(message: impl Into<String>) -> crate::Error {
        DbError::Transaction(message.into()).into()
    }

    pub fn conversion(message: impl Into<String>) -> crate::Error {
        DbError::Conversion(message.into()).into()
    }

    /// Category of `error`, looking through the context chain.
    pub fn of(error: &crate::Error) -> Option<&DbError> {
        error
            .downcast_ref::<DbError>()
            .or_else(|| error.chain().find_map(|e| e.downcast_ref::<DbError>()))
    }
}
