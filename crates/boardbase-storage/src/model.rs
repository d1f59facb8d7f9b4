use boardbase_types::prelude::OwnerId;
use serde::{Deserialize, Serialize};

/// A record stored under the compound key `(TABLE, owner, id)`. The owner
/// component is not an index hint: a record is unreachable without it.
pub trait Entity: Sized + serde::de::DeserializeOwned + Serialize + Send + Sync {
    const TABLE: &'static str;
    fn id(&self) -> &str;
    fn owner(&self) -> &OwnerId;
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryParams {
    pub filter: serde_json::Value,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            filter: serde_json::json!({}),
            limit: None,
        }
    }
}
