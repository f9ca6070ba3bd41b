use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

/// Durable key/value storage for serialized state.
#[async_trait]
pub trait Storage {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

pub type StorageBox = Arc<dyn Storage + Send + Sync>;
