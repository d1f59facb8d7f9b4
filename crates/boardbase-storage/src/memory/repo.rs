use super::datastore::MemoryDatastore;
use crate::errors::StorageError;
use crate::model::{Entity, Page, QueryParams};
use crate::spi::repo::Repository;
use async_trait::async_trait;
use boardbase_types::prelude::OwnerId;
use serde_json::Value;
use std::marker::PhantomData;

#[derive(Clone)]
pub struct InMemoryRepository<E: Entity> {
    store: MemoryDatastore,
    table: &'static str,
    _marker: PhantomData<E>,
}

impl<E: Entity> InMemoryRepository<E> {
    pub fn new(store: &MemoryDatastore) -> Self {
        Self {
            store: store.clone(),
            table: E::TABLE,
            _marker: PhantomData,
        }
    }
}

fn merge_patch(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target_map), Value::Object(patch_map)) => {
            for (k, v) in patch_map {
                merge_patch(target_map.entry(k).or_insert(Value::Null), v);
            }
        }
        (slot, value) => {
            *slot = value.clone();
        }
    }
}

fn matches_filter(value: &Value, filter: &Value) -> bool {
    match (value, filter) {
        (Value::Object(data), Value::Object(filter_map)) => filter_map.iter().all(|(k, expected)| {
            data.get(k)
                .map(|actual| actual == expected)
                .unwrap_or(false)
        }),
        _ => true,
    }
}

#[async_trait]
impl<E> Repository<E> for InMemoryRepository<E>
where
    E: Entity + Send + Sync,
{
    async fn create(&self, owner: &OwnerId, entity: &E) -> Result<(), StorageError> {
        if entity.owner() != owner {
            return Err(StorageError::bad_request("owner mismatch"));
        }
        if self.store.fetch(self.table, owner, entity.id()).is_some() {
            return Err(StorageError::conflict("entity already exists"));
        }
        let value =
            serde_json::to_value(entity).map_err(|e| StorageError::internal(&e.to_string()))?;
        self.store.store(self.table, owner, entity.id(), value);
        Ok(())
    }

    async fn patch(
        &self,
        owner: &OwnerId,
        id: &str,
        patch: Value,
    ) -> Result<E, StorageError> {
        // Patching never creates: a missing compound key is a not-found,
        // whether the id is absent or belongs to another owner.
        let mut base = self
            .store
            .fetch(self.table, owner, id)
            .ok_or_else(|| StorageError::not_found("entity not found"))?;
        merge_patch(&mut base, &patch);
        let mut map = base.as_object().cloned().unwrap_or_default();
        map.insert("id".into(), Value::String(id.to_string()));
        map.insert("owner".into(), Value::String(owner.0.clone()));
        let normalized = Value::Object(map);
        let entity: E = serde_json::from_value(normalized.clone())
            .map_err(|e| StorageError::internal(&e.to_string()))?;
        self.store.store(self.table, owner, id, normalized);
        Ok(entity)
    }

    async fn get(&self, owner: &OwnerId, id: &str) -> Result<Option<E>, StorageError> {
        let value = self.store.fetch(self.table, owner, id);
        Ok(match value {
            Some(val) => Some(
                serde_json::from_value(val).map_err(|e| StorageError::internal(&e.to_string()))?,
            ),
            None => None,
        })
    }

    async fn select(&self, owner: &OwnerId, params: QueryParams) -> Result<Page<E>, StorageError> {
        let values = self.store.list(self.table, owner);
        let mut items = Vec::new();
        let limit = params.limit.unwrap_or(u32::MAX) as usize;
        for value in values {
            if !matches_filter(&value, &params.filter) {
                continue;
            }
            let entity: E = serde_json::from_value(value)
                .map_err(|e| StorageError::internal(&e.to_string()))?;
            items.push(entity);
            if items.len() >= limit {
                break;
            }
        }
        Ok(Page { items, next: None })
    }

    async fn delete(&self, owner: &OwnerId, id: &str) -> Result<(), StorageError> {
        self.store
            .remove(self.table, owner, id)
            .ok_or_else(|| StorageError::not_found("entity not found"))?;
        Ok(())
    }
}
