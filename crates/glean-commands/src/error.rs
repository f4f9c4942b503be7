use glean_domain::{DomainError, EntityType};
use glean_providers::ProviderError;
use glean_store::StoreError;
use thiserror::Error;

/// The stable command-level error taxonomy. The HTTP layer maps each kind to
/// its status code; provider internals never leak through.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0}")]
    Validation(String),

    #[error("authentication required")]
    Authentication,

    #[error("{0}")]
    Authorization(String),

    #[error("{entity_type} '{id}' not found")]
    NotFound { entity_type: EntityType, id: String },

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidStateTransition(String),

    #[error("{0}")]
    ComplianceViolation(String),

    #[error("{0}")]
    IdempotencyViolation(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CommandError {
    pub fn validation(msg: impl Into<String>) -> Self {
        CommandError::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        CommandError::Authorization(msg.into())
    }

    /// Stable machine-readable code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            CommandError::Validation(_) => "VALIDATION_ERROR",
            CommandError::Authentication => "AUTHENTICATION_ERROR",
            CommandError::Authorization(_) => "AUTHORIZATION_ERROR",
            CommandError::NotFound { .. } => "NOT_FOUND",
            CommandError::Conflict(_) => "CONFLICT",
            CommandError::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
            CommandError::ComplianceViolation(_) => "COMPLIANCE_VIOLATION",
            CommandError::IdempotencyViolation(_) => "IDEMPOTENCY_VIOLATION",
            CommandError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            CommandError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<StoreError> for CommandError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity_type, id } => {
                CommandError::NotFound { entity_type, id }
            }
            StoreError::Conflict { .. } => CommandError::Conflict(e.to_string()),
            other => CommandError::Internal(other.to_string()),
        }
    }
}

impl From<DomainError> for CommandError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::TransitionNotAllowed { .. } | DomainError::JustificationRequired { .. } => {
                CommandError::InvalidStateTransition(e.to_string())
            }
            DomainError::InvalidField { .. } => CommandError::Validation(e.to_string()),
        }
    }
}

impl From<ProviderError> for CommandError {
    fn from(e: ProviderError) -> Self {
        // Upstream messages stay in the logs, not in client responses.
        tracing::warn!(error = %e, "provider failure surfaced to command layer");
        CommandError::ServiceUnavailable("a required provider is unavailable".to_string())
    }
}
