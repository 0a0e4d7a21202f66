use thiserror::Error;

/// Faults that end pagination early. The fetcher absorbs them and hands back
/// whatever it collected before the fault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("connection to the items endpoint failed on page {page}: {reason}")]
    ConnectionFault { page: u32, reason: String },
    #[error("items endpoint answered HTTP {status} on page {page}: {snippet}")]
    UnexpectedStatus {
        page: u32,
        status: u16,
        snippet: String,
    },
    #[error("page {page} is not a valid items document: {reason}")]
    MalformedResponse { page: u32, reason: String },
}

impl FetchError {
    pub fn page(&self) -> u32 {
        match self {
            FetchError::ConnectionFault { page, .. }
            | FetchError::UnexpectedStatus { page, .. }
            | FetchError::MalformedResponse { page, .. } => *page,
        }
    }

    /// Short label used in logs and report metadata.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::ConnectionFault { .. } => "connection_fault",
            FetchError::UnexpectedStatus { .. } => "unexpected_status",
            FetchError::MalformedResponse { .. } => "malformed_response",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StatsError {
    #[error("no valid numeric observations")]
    NoData,
}
