use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Sled,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    #[validate(length(min = 1))]
    pub sled_path: String,
    #[validate(range(min = 1048576))] // min 1MB
    pub sled_cache_bytes: u64,
    #[validate(range(min = 1))]
    pub sled_flush_ms: u64,
    pub sled_compression: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            sled_path: "./data/chatgate.sled".into(),
            sled_cache_bytes: 67_108_864, // 64MB
            sled_flush_ms: 500,
            sled_compression: true,
        }
    }
}
