//! Document store abstraction.
//!
//! The maintenance workflow only needs five operations from a store: container
//! metadata, point read, paged query, upsert and delete. Every document is
//! addressed by its `id` and a partition key.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::StoreError;

/// One page of query results plus the token for the next page, if any.
#[derive(Debug, Clone, Default)]
pub struct QueryPage {
    pub documents: Vec<Value>,
    pub continuation: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContainerInfo {
    pub id: String,
    #[serde(rename = "partitionKey", default)]
    pub partition_key: Option<PartitionKeyDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartitionKeyDefinition {
    #[serde(default)]
    pub paths: Vec<String>,
}

impl ContainerInfo {
    pub fn partition_key_paths(&self) -> Vec<String> {
        self.partition_key
            .as_ref()
            .map(|pk| pk.paths.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Container metadata. A missing container is a 404 `StoreError::Api`.
    async fn read_container(&self, container: &str) -> Result<ContainerInfo, StoreError>;

    async fn read_item(
        &self,
        container: &str,
        id: &str,
        partition_key: &str,
    ) -> Result<Value, StoreError>;

    /// Execute `query`, resuming from `continuation` when given.
    async fn query_page(
        &self,
        container: &str,
        query: &str,
        continuation: Option<&str>,
    ) -> Result<QueryPage, StoreError>;

    async fn upsert_item(
        &self,
        container: &str,
        partition_key: &str,
        item: &Value,
    ) -> Result<(), StoreError>;

    async fn delete_item(
        &self,
        container: &str,
        id: &str,
        partition_key: &str,
    ) -> Result<(), StoreError>;

    /// Store name for logging.
    fn name(&self) -> &str;
}
