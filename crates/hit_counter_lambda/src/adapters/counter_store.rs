/// Failure of a counter store update, split the way callers report it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterStoreError {
    /// The store answered and rejected the request.
    Service {
        code: Option<String>,
        message: String,
    },
    /// Anything else: transport failures, unreadable responses.
    Unexpected(String),
}

impl std::fmt::Display for CounterStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Service {
                code: Some(code),
                message,
            } => write!(f, "store service error ({code}): {message}"),
            Self::Service {
                code: None,
                message,
            } => write!(f, "store service error: {message}"),
            Self::Unexpected(message) => write!(f, "unexpected store error: {message}"),
        }
    }
}

impl std::error::Error for CounterStoreError {}

pub trait CounterStore {
    /// Atomically adds one to the counter of `page_path` and returns the new
    /// value.
    fn increment(&self, page_path: &str) -> Result<u64, CounterStoreError>;
}
