use std::env;

use anyhow::Result;
use uuid::Uuid;

use super::FileStorage;
use crate::domain::models::Storage;

fn temp_storage() -> FileStorage {
    let dir = env::temp_dir().join(format!("synapse-test-{}", Uuid::new_v4()));
    return FileStorage::new(dir);
}

#[tokio::test]
async fn it_returns_none_for_missing_key() -> Result<()> {
    let storage = temp_storage();
    assert_eq!(storage.get("nothing").await?, None);

    return Ok(());
}

#[tokio::test]
async fn it_writes_and_reads_back() -> Result<()> {
    let storage = temp_storage();
    storage.set("synapse_theme", "\"light\"").await?;
    storage.set("synapse_theme", "\"dark\"").await?;

    assert_eq!(
        storage.get("synapse_theme").await?,
        Some("\"dark\"".to_string())
    );
    assert!(!storage.dir.join("synapse_theme.json.tmp").exists());

    tokio::fs::remove_dir_all(&storage.dir).await?;
    return Ok(());
}

#[tokio::test]
async fn it_removes_keys() -> Result<()> {
    let storage = temp_storage();
    storage.set("key", "1").await?;
    storage.remove("key").await?;
    storage.remove("key").await?;

    assert_eq!(storage.get("key").await?, None);

    tokio::fs::remove_dir_all(&storage.dir).await?;
    return Ok(());
}
