use glean_domain::EntityType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity_type} '{id}' not found")]
    NotFound { entity_type: EntityType, id: String },

    /// Optimistic version check failed: the caller observed `expected` but
    /// the store holds `found`. The caller may reload and retry.
    #[error("version conflict on {entity_type} '{id}': expected {expected}, found {found}")]
    Conflict {
        entity_type: EntityType,
        id: String,
        expected: u64,
        found: u64,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn not_found(entity_type: EntityType, id: impl Into<String>) -> Self {
        StoreError::NotFound { entity_type, id: id.into() }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}
