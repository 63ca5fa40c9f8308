use docmaint_core::StoreError;
use thiserror::Error;

/// A filter expression that produced no usable result set.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("filter expression is empty")]
    EmptyFilter,

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("item {index} could not be read as a record: {source}")]
    Decode {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("item {index} has no 'id'")]
    MissingId { index: usize },
}

/// Operator input rejected before any record is touched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Property '{0}' not found in items")]
    UnknownField(String),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("operator input closed")]
    Aborted,

    #[error("console I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Store(#[from] StoreError),
}
