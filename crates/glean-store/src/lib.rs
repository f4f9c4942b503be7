pub mod audit;
pub mod datastore;
pub mod entity;
pub mod error;
pub mod events;
pub mod fingerprint;
pub mod memory;
pub mod redb_store;
pub mod repo;

pub use audit::{compute_diff, AuditEvent, AuditEventInput, AuditLog, FieldChange};
pub use fingerprint::canonical_fingerprint;
pub use datastore::Datastore;
pub use entity::StoredEntity;
pub use error::StoreError;
pub use events::{DomainEvent, EventBus, InMemoryEventBus, PublishedEvent};
pub use memory::{InMemoryAuditLog, InMemoryRepository};
pub use redb_store::{RedbAuditLog, RedbRepository, RedbStore};
pub use repo::{Repository, MAX_QUERY_LIMIT};
