use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{what} timed out after {seconds}s")]
    Timeout { what: String, seconds: u64 },

    #[error("provider http error: {0}")]
    Http(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("internal provider error: {0}")]
    Internal(String),
}
