use thiserror::Error;

/// Failures reported by a document store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{status} - {message}")]
    Api { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response from store: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Missing Cosmos DB account key")]
    MissingKey,

    #[error("Cosmos DB account key is not valid base64")]
    InvalidKey,
}

impl StoreError {
    /// Provider status code, when the store answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            StoreError::Api { status, .. } => Some(*status),
            StoreError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Throttling, timeouts and gateway hiccups worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Api { status, .. } => matches!(status, 408 | 429 | 449 | 503),
            StoreError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// Rejections raised while assigning a raw operator value to a record field.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    #[error("Property '{0}' not found")]
    UnknownField(String),

    #[error("'{value}' is not a valid {expected} for '{field}'")]
    InvalidValue {
        field: String,
        expected: String,
        value: String,
    },

    #[error("'id' identifies the document and cannot be updated")]
    IdentityField,
}
