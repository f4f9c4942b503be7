use thiserror::Error;

use crate::types::{EntityStatus, Role};

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("transition {from} -> {to} is not allowed for role {role}")]
    TransitionNotAllowed {
        from: EntityStatus,
        to: EntityStatus,
        role: Role,
    },

    #[error("transition {from} -> {to} requires a justification")]
    JustificationRequired { from: EntityStatus, to: EntityStatus },

    #[error("invalid {field}: {message}")]
    InvalidField { field: String, message: String },
}

impl DomainError {
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        DomainError::InvalidField { field: field.into(), message: message.into() }
    }
}
