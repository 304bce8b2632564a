//! Transport-level errors for the backing services

/// Error returned by any service call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Non-2xx response
    #[error("{operation} failed with status {status}{}", detail_suffix(.detail))]
    Status {
        /// Short name of the failed operation
        operation: String,
        /// HTTP status code
        status: u16,
        /// `detail` field of the error body, if any
        detail: Option<String>,
    },

    /// Request never produced a response
    #[error("{operation} failed: {message}")]
    Transport { operation: String, message: String },

    /// Response body did not match the contract
    #[error("{operation} returned an unreadable body: {message}")]
    Decode { operation: String, message: String },

    /// Base URL cannot carry request paths
    #[error("invalid base url: {0}")]
    InvalidUrl(String),
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|d| format!(": {d}"))
        .unwrap_or_default()
}

impl StoreError {
    /// Service-provided detail message, if present
    #[inline]
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Status { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    /// HTTP status, if a response was received
    #[inline]
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Build a status error
    #[inline]
    pub fn status_error(operation: impl Into<String>, status: u16, detail: Option<String>) -> Self {
        Self::Status {
            operation: operation.into(),
            status,
            detail,
        }
    }

    /// Build a transport error
    #[inline]
    pub fn transport(operation: impl Into<String>, message: impl ToString) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    /// Build a decode error
    #[inline]
    pub fn decode(operation: impl Into<String>, message: impl ToString) -> Self {
        Self::Decode {
            operation: operation.into(),
            message: message.to_string(),
        }
    }
}
