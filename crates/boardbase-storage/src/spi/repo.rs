use crate::errors::StorageError;
use crate::model::{Entity, Page, QueryParams};
use async_trait::async_trait;
use boardbase_types::prelude::OwnerId;

/// Owner-scoped record access. Every method takes the owner alongside the
/// record id; an id belonging to a different owner behaves exactly like a
/// missing record.
#[async_trait]
pub trait Repository<E: Entity>: Send + Sync {
    async fn create(&self, owner: &OwnerId, entity: &E) -> Result<(), StorageError>;
    async fn patch(
        &self,
        owner: &OwnerId,
        id: &str,
        patch: serde_json::Value,
    ) -> Result<E, StorageError>;
    async fn get(&self, owner: &OwnerId, id: &str) -> Result<Option<E>, StorageError>;
    async fn select(&self, owner: &OwnerId, params: QueryParams) -> Result<Page<E>, StorageError>;
    async fn delete(&self, owner: &OwnerId, id: &str) -> Result<(), StorageError>;
}
