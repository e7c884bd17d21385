use crate::config::ConfigError;

/// Errors surfaced by the table engine
///
/// None of these are fatal: stale responses and not-found lookups are
/// absorbed internally, network failures become retryable placeholders.
#[derive(Debug, Clone, PartialEq)]
pub enum TableError {
    /// Transport failure or 5xx response from the page/search API
    NetworkFailure(String),
    /// The API refused the request (4xx); asking again will not help
    Rejected(String),
    /// Search lookup matched nothing
    NotFound,
    /// Navigation target outside `[1, total_rows]`
    InvalidNavigationTarget { id: i64, total_rows: u64 },
    /// Response arrived for a superseded generation
    StaleResponse { page: u64 },
    /// Response body could not be decoded
    InvalidResponse(String),
    /// Configuration rejected at mount
    Config(String),
    /// The host never reported geometry
    HostUnavailable,
}

impl std::fmt::Display for TableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableError::NetworkFailure(msg) => write!(f, "Network failure: {msg}"),
            TableError::Rejected(msg) => write!(f, "Request rejected: {msg}"),
            TableError::NotFound => write!(f, "No matching row"),
            TableError::InvalidNavigationTarget { id, total_rows } => {
                write!(f, "Row id {id} is outside 1..={total_rows}")
            }
            TableError::StaleResponse { page } => {
                write!(f, "Discarded stale response for page {page}")
            }
            TableError::InvalidResponse(msg) => write!(f, "Invalid response: {msg}"),
            TableError::Config(msg) => write!(f, "Configuration error: {msg}"),
            TableError::HostUnavailable => write!(f, "Host container is not available"),
        }
    }
}

impl std::error::Error for TableError {}

impl From<ConfigError> for TableError {
    fn from(err: ConfigError) -> Self {
        TableError::Config(err.to_string())
    }
}

impl TableError {
    /// Whether a page that failed with this error may be fetched again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TableError::NetworkFailure(_) | TableError::InvalidResponse(_)
        )
    }
}
