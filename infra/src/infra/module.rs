use crate::infra::task::rdb::{RdbTaskRepositoryImpl, UseTaskRepository};
use crate::infra::workflow::event::{ChanWorkflowEventRepositoryImpl, UseWorkflowEventRepository};
use crate::infra::workflow::rdb::{RdbWorkflowRepositoryImpl, UseWorkflowRepository};
use crate::infra::{IdGeneratorWrapper, InfraConfigModule};
use anyhow::Result;
use std::sync::Arc;

use super::rdb::RdbPool;

pub trait UseRdbRepositoryModule {
    fn rdb_repository_module(&self) -> &RdbRepositoryModule;
}
impl<T: UseRdbRepositoryModule> UseWorkflowRepository for T {
    fn workflow_repository(&self) -> &RdbWorkflowRepositoryImpl {
        &self.rdb_repository_module().workflow_repository
    }
}
impl<T: UseRdbRepositoryModule> UseTaskRepository for T {
    fn task_repository(&self) -> &RdbTaskRepositoryImpl {
        &self.rdb_repository_module().task_repository
    }
}
impl<T: UseRdbRepositoryModule> UseWorkflowEventRepository for T {
    fn workflow_event_repository(&self) -> &ChanWorkflowEventRepositoryImpl {
        &self.rdb_repository_module().workflow_event_repository
    }
}

#[derive(Clone, Debug)]
pub struct RdbRepositoryModule {
    pub workflow_repository: RdbWorkflowRepositoryImpl,
    pub task_repository: RdbTaskRepositoryImpl,
    pub workflow_event_repository: ChanWorkflowEventRepositoryImpl,
}

impl RdbRepositoryModule {
    pub async fn new(
        config_module: &InfraConfigModule,
        id_generator: Arc<IdGeneratorWrapper>,
    ) -> Result<Self> {
        let pool = super::resource::setup_rdb(&config_module.rdb_config).await?;
        Ok(Self::new_with_pool(
            pool.clone(),
            config_module.event_config.channel_capacity,
            id_generator,
        ))
    }

    // (sqlx pools are reference counted: clones share connections)
    pub fn new_with_pool(
        pool: RdbPool,
        event_channel_capacity: usize,
        id_generator: Arc<IdGeneratorWrapper>,
    ) -> Self {
        RdbRepositoryModule {
            workflow_repository: RdbWorkflowRepositoryImpl::new(id_generator.clone(), pool.clone()),
            task_repository: RdbTaskRepositoryImpl::new(id_generator, pool),
            workflow_event_repository: ChanWorkflowEventRepositoryImpl::new(
                event_channel_capacity,
            ),
        }
    }
}

impl UseRdbRepositoryModule for RdbRepositoryModule {
    fn rdb_repository_module(&self) -> &RdbRepositoryModule {
        self
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod test {
    use super::RdbRepositoryModule;
    use crate::infra::test::{setup_test_rdb, EVENT_CONFIG};
    use crate::infra::IdGeneratorWrapper;
    use anyhow::Result;
    use std::sync::Arc;

    pub async fn setup_test_rdb_module() -> Result<RdbRepositoryModule> {
        let pool = setup_test_rdb().await?;
        Ok(RdbRepositoryModule::new_with_pool(
            pool,
            EVENT_CONFIG.channel_capacity,
            Arc::new(IdGeneratorWrapper::new_mock()),
        ))
    }
}
