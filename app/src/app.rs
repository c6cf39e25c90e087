pub mod cache;
pub mod stats;
pub mod task;
pub mod workflow;

use anyhow::Result;
use flowdesk_base::error::FlowdeskError;
use serde::Deserialize;

/// in-process cache of workflows by id
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct MemoryCacheConfig {
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
    #[serde(default = "default_ttl_sec")]
    pub ttl_sec: u64,
}

fn default_max_capacity() -> u64 {
    10000
}

fn default_ttl_sec() -> u64 {
    60
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        tracing::info!("Use default MemoryCacheConfig (10000 entries, 60 sec).");
        Self {
            max_capacity: default_max_capacity(),
            ttl_sec: default_ttl_sec(),
        }
    }
}

pub fn load_memory_cache_config_from_env() -> Result<MemoryCacheConfig> {
    envy::prefixed("MEMORY_CACHE_")
        .from_env::<MemoryCacheConfig>()
        .map_err(|e| {
            FlowdeskError::RuntimeError(format!("cannot read memory cache config from env: {e:?}"))
                .into()
        })
}
