use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("store error: {0}")]
    Store(#[from] glean_store::StoreError),

    #[error("provider error: {0}")]
    Provider(#[from] glean_providers::ProviderError),

    #[error("internal error: {0}")]
    Internal(String),
}
