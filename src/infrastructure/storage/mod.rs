pub mod file;
pub mod memory;

use std::path;
use std::sync::Arc;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::StorageBox;

pub struct StorageManager {}

impl StorageManager {
    pub fn get(ephemeral: bool) -> StorageBox {
        if ephemeral {
            return Arc::new(memory::MemoryStorage::default());
        }

        let dir = path::PathBuf::from(Config::get(ConfigKey::DataDir));
        return Arc::new(file::FileStorage::new(dir));
    }
}
