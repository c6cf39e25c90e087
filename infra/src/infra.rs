pub mod module;
pub mod rdb;
pub mod resource;
pub mod task;
pub mod workflow;

use anyhow::Result;
use debug_stub_derive::DebugStub;
use flowdesk_base::error::FlowdeskError;
use flowdesk_base::id_generator::{self, IDGenerator, MockIdGenerator};
use serde::Deserialize;
use std::sync::{Arc, Mutex};

use self::rdb::RdbConfig;
use self::resource::load_db_config_from_env;

#[derive(Clone, DebugStub)]
pub struct IdGeneratorWrapper {
    #[debug_stub = "IDGenerator"]
    id_generator: Arc<Mutex<IDGenerator>>,
}

impl IdGeneratorWrapper {
    pub fn new() -> Self {
        let conf = load_id_generator_config_from_env();
        IdGeneratorWrapper {
            id_generator: Arc::new(Mutex::new(id_generator::new_generator(
                conf.machine_id,
                conf.node_id,
            ))),
        }
    }
    // for test
    pub fn new_mock() -> Self {
        IdGeneratorWrapper {
            id_generator: Arc::new(Mutex::new(IDGenerator::Mock(MockIdGenerator::new()))),
        }
    }
    // thread safe
    pub fn generate_id(&self) -> Result<i64> {
        self.id_generator
            .lock()
            .map_err(|e| FlowdeskError::GenerateIdError(e.to_string()).into())
            .and_then(|mut g| g.generate())
    }
}

impl Default for IdGeneratorWrapper {
    fn default() -> Self {
        Self::new()
    }
}

pub trait UseIdGenerator {
    fn id_generator(&self) -> &IdGeneratorWrapper;
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct IdGeneratorConfig {
    #[serde(default)]
    pub machine_id: i32,
    #[serde(default)]
    pub node_id: i32,
}

pub fn load_id_generator_config_from_env() -> IdGeneratorConfig {
    envy::prefixed("ID_GENERATOR_")
        .from_env::<IdGeneratorConfig>()
        .unwrap_or_default()
}

#[derive(Deserialize, Clone, Debug)]
pub struct EventConfig {
    /// buffer of the in-process task event channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    10_000
}

impl Default for EventConfig {
    fn default() -> Self {
        tracing::info!("Use default EventConfig.");
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

pub fn load_event_config_from_env() -> Result<EventConfig> {
    envy::prefixed("EVENT_")
        .from_env::<EventConfig>()
        .map_err(|e| {
            FlowdeskError::RuntimeError(format!("cannot read event config from env: {e:?}"))
                .into()
        })
}

#[derive(Clone, Debug)]
pub struct InfraConfigModule {
    pub rdb_config: RdbConfig,
    pub event_config: Arc<EventConfig>,
}

impl InfraConfigModule {
    pub fn new_by_env() -> Self {
        Self {
            rdb_config: load_db_config_from_env().unwrap_or_else(|e| {
                tracing::warn!("{e:?}: use default rdb config");
                RdbConfig::default()
            }),
            event_config: Arc::new(load_event_config_from_env().unwrap_or_else(|e| {
                tracing::warn!("{e:?}: use default event config");
                EventConfig::default()
            })),
        }
    }
}

// using from other test
#[cfg(any(test, feature = "test-utils"))]
pub mod test {
    use super::rdb::{self, RdbConfig, RdbPool};
    use super::{EventConfig, InfraConfigModule};
    use anyhow::Result;
    use once_cell::sync::Lazy;
    use std::sync::Arc;

    pub static SQLITE_CONFIG: Lazy<RdbConfig> = Lazy::new(|| RdbConfig {
        dbname: ":memory:".to_string(),
        // an in-memory database lives and dies with its single connection
        max_connections: 1,
    });

    pub static EVENT_CONFIG: Lazy<EventConfig> = Lazy::new(|| EventConfig {
        channel_capacity: 64,
    });

    /// fresh, schema-initialized database for each call
    pub async fn setup_test_rdb() -> Result<RdbPool> {
        rdb::new_rdb_pool(&SQLITE_CONFIG, Some(super::resource::SQLITE_SCHEMA)).await
    }

    pub fn new_for_test_config_rdb() -> InfraConfigModule {
        InfraConfigModule {
            rdb_config: SQLITE_CONFIG.clone(),
            event_config: Arc::new(EVENT_CONFIG.clone()),
        }
    }
}
