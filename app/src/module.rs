use crate::app::stats::StatsAggregator;
use crate::app::task::rdb::RdbTaskAppImpl;
use crate::app::task::{TaskApp, UseTaskApp};
use crate::app::workflow::rdb::RdbWorkflowAppImpl;
use crate::app::workflow::{UseWorkflowApp, WorkflowApp};
use crate::app::{load_memory_cache_config_from_env, MemoryCacheConfig};
use anyhow::Result;
use infra::infra::module::RdbRepositoryModule;
use infra::infra::{IdGeneratorWrapper, InfraConfigModule};
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(Clone, Debug)]
pub struct AppConfigModule {
    pub infra_config: Arc<InfraConfigModule>,
    pub memory_cache_config: Arc<MemoryCacheConfig>,
}

impl AppConfigModule {
    pub fn new_by_env() -> Self {
        Self {
            infra_config: Arc::new(InfraConfigModule::new_by_env()),
            memory_cache_config: Arc::new(load_memory_cache_config_from_env().unwrap_or_else(
                |e| {
                    tracing::warn!("{e:?}: use default memory cache config");
                    MemoryCacheConfig::default()
                },
            )),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppModule {
    pub config_module: Arc<AppConfigModule>,
    pub repositories: Arc<RdbRepositoryModule>,
    pub workflow_app: Arc<dyn WorkflowApp + 'static>,
    pub task_app: Arc<dyn TaskApp + 'static>,
}

impl AppModule {
    pub async fn new_by_env(config_module: Arc<AppConfigModule>) -> Result<Self> {
        let id_generator = Arc::new(IdGeneratorWrapper::new());
        let repositories = Arc::new(
            RdbRepositoryModule::new(&config_module.infra_config, id_generator.clone()).await?,
        );
        Ok(Self::new(config_module, repositories, id_generator))
    }

    pub fn new(
        config_module: Arc<AppConfigModule>,
        repositories: Arc<RdbRepositoryModule>,
        id_generator: Arc<IdGeneratorWrapper>,
    ) -> Self {
        let workflow_app = Arc::new(RdbWorkflowAppImpl::new(
            id_generator,
            &config_module.memory_cache_config,
            repositories.clone(),
        ));
        let task_app = Arc::new(RdbTaskAppImpl::new(repositories.clone()));
        AppModule {
            config_module,
            repositories,
            workflow_app,
            task_app,
        }
    }

    /// Subscribe the stats aggregator to task events. Events published before
    /// this call are not counted.
    pub fn start_stats_aggregator(&self) -> JoinHandle<()> {
        let receiver = self.repositories.workflow_event_repository.subscribe();
        StatsAggregator::new(self.workflow_app.clone()).start(receiver)
    }
}

impl UseWorkflowApp for AppModule {
    fn workflow_app(&self) -> &Arc<dyn WorkflowApp + 'static> {
        &self.workflow_app
    }
}

impl UseTaskApp for AppModule {
    fn task_app(&self) -> &Arc<dyn TaskApp + 'static> {
        &self.task_app
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod test {
    use super::{AppConfigModule, AppModule};
    use crate::app::MemoryCacheConfig;
    use anyhow::Result;
    use infra::infra::module::test::setup_test_rdb_module;
    use infra::infra::{test::new_for_test_config_rdb, IdGeneratorWrapper};
    use std::sync::Arc;

    pub async fn create_test_app_module() -> Result<AppModule> {
        let config_module = Arc::new(AppConfigModule {
            infra_config: Arc::new(new_for_test_config_rdb()),
            memory_cache_config: Arc::new(MemoryCacheConfig {
                max_capacity: 100,
                ttl_sec: 60,
            }),
        });
        let repositories = Arc::new(setup_test_rdb_module().await?);
        Ok(AppModule::new(
            config_module,
            repositories,
            Arc::new(IdGeneratorWrapper::new_mock()),
        ))
    }
}
