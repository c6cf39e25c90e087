use super::definition::{self, DefinitionEdit};
use super::WorkflowApp;
use crate::app::cache::MokaCacheImpl;
use crate::app::MemoryCacheConfig;
use anyhow::Result;
use async_trait::async_trait;
use flowdesk_base::datetime;
use flowdesk_base::error::FlowdeskError;
use infra::infra::module::{RdbRepositoryModule, UseRdbRepositoryModule};
use infra::infra::rdb::UseRdbPool;
use infra::infra::task::rdb::{TaskRepository, UseTaskRepository};
use infra::infra::workflow::rdb::{UseWorkflowRepository, WorkflowRepository};
use infra::infra::IdGeneratorWrapper;
use model::data::{
    Step, StepData, StepId, Workflow, WorkflowData, WorkflowId, WorkflowStats,
};
use model::identity::{Identity, Role};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct RdbWorkflowAppImpl {
    id_generator: Arc<IdGeneratorWrapper>,
    memory_cache: MokaCacheImpl<Arc<String>, Workflow>,
    repositories: Arc<RdbRepositoryModule>,
}

impl RdbWorkflowAppImpl {
    pub fn new(
        id_generator: Arc<IdGeneratorWrapper>,
        cache_config: &MemoryCacheConfig,
        repositories: Arc<RdbRepositoryModule>,
    ) -> Self {
        Self {
            id_generator,
            memory_cache: MokaCacheImpl::new(cache_config),
            repositories,
        }
    }

    fn find_cache_key(id: &WorkflowId) -> String {
        ["workflow_id:", &id.value.to_string()].join("")
    }

    async fn clear_cache(&self, id: &WorkflowId) {
        let k = Arc::new(Self::find_cache_key(id));
        let _ = self.memory_cache.delete_cache(&k).await;
    }

    fn not_found(id: &WorkflowId) -> FlowdeskError {
        FlowdeskError::NotFound(format!("workflow not found: id = {}", id.value))
    }

    fn check_expected_version(
        current: &Workflow,
        expected_version: Option<i64>,
    ) -> Result<(), FlowdeskError> {
        match expected_version {
            Some(v) if v != current.data.version => {
                Err(FlowdeskError::ConcurrentModification(format!(
                    "workflow {} was modified concurrently: expected version {}, found {}",
                    current.id.value, v, current.data.version
                )))
            }
            _ => Ok(()),
        }
    }

    fn new_step_ids(&self, n: usize) -> Result<Vec<StepId>> {
        (0..n)
            .map(|_| {
                self.id_generator
                    .generate_id()
                    .map(|value| StepId { value })
            })
            .collect()
    }

    /// Read, edit and write back one workflow inside a single transaction.
    ///
    /// `edit` works on a copy of the stored definition. Tasks of the workflow
    /// are moved along with their steps and a removed step must have no live task.
    async fn edit_definition<F>(
        &self,
        id: &WorkflowId,
        expected_version: Option<i64>,
        edit: F,
    ) -> Result<Workflow>
    where
        F: FnOnce(&mut WorkflowData) -> Result<DefinitionEdit, FlowdeskError> + Send,
    {
        let repository = self.workflow_repository();
        let mut tx = repository
            .db_pool()
            .begin()
            .await
            .map_err(FlowdeskError::from)?;
        let current = repository
            .find_in_tx(&mut tx, id)
            .await?
            .ok_or_else(|| Self::not_found(id))?;
        Self::check_expected_version(&current, expected_version)?;

        let mut data = current.data.clone();
        let changes = edit(&mut data)?;

        if let Some(order) = changes.removed_step {
            let live = self
                .task_repository()
                .count_live_at_step_tx(&mut *tx, id, order)
                .await?;
            if live > 0 {
                return Err(FlowdeskError::ReferencedStep {
                    workflow_id: id.value,
                    order,
                    tasks: live,
                }
                .into());
            }
        }
        let name_touched = data.name != current.data.name
            || (data.is_active && !current.data.is_active);
        if data.is_active && name_touched {
            self.check_name_available(&mut tx, &data.name, Some(id))
                .await?;
        }

        let now = datetime::now_millis();
        data.updated_at = now;
        data.version = repository
            .update_definition(&mut tx, id, current.data.version, &data)
            .await?;
        let moved = self
            .task_repository()
            .remap_steps(&mut tx, id, &changes.task_moves, now)
            .await?;
        tx.commit().await.map_err(FlowdeskError::from)?;
        self.clear_cache(id).await;
        tracing::info!(
            "workflow updated: id = {}, version = {}, moved tasks = {}",
            id.value,
            data.version,
            moved
        );
        Ok(Workflow { id: *id, data })
    }

    async fn check_name_available(
        &self,
        tx: &mut sqlx::Transaction<'_, infra::infra::rdb::Rdb>,
        name: &str,
        exclude: Option<&WorkflowId>,
    ) -> Result<()> {
        if let Some(other) = self
            .workflow_repository()
            .find_active_row_by_name_tx(&mut **tx, name, exclude)
            .await?
        {
            return Err(FlowdeskError::validation(
                "name",
                format!(
                    "an active workflow named '{}' already exists: id = {}",
                    other.name, other.id
                ),
            )
            .into());
        }
        Ok(())
    }
}

impl UseRdbRepositoryModule for RdbWorkflowAppImpl {
    fn rdb_repository_module(&self) -> &RdbRepositoryModule {
        &self.repositories
    }
}

#[async_trait]
impl WorkflowApp for RdbWorkflowAppImpl {
    async fn create_workflow(
        &self,
        name: &str,
        description: Option<String>,
        steps: Vec<StepData>,
    ) -> Result<Workflow> {
        let name = definition::validate_workflow_name(name)?;
        let ids = self.new_step_ids(steps.len())?;
        let steps = definition::build_steps(steps, ids)?;
        let now = datetime::now_millis();
        let data = WorkflowData {
            name,
            description,
            steps,
            is_active: true,
            is_default: false,
            stats: WorkflowStats::default(),
            version: 1,
            created_at: now,
            updated_at: now,
        };

        let repository = self.workflow_repository();
        let mut tx = repository
            .db_pool()
            .begin()
            .await
            .map_err(FlowdeskError::from)?;
        self.check_name_available(&mut tx, &data.name, None).await?;
        let id = repository.create(&mut tx, &data).await?;
        tx.commit().await.map_err(FlowdeskError::from)?;
        tracing::info!("workflow created: id = {}, name = {}", id.value, data.name);
        Ok(Workflow { id, data })
    }

    async fn update_workflow(
        &self,
        id: &WorkflowId,
        name: &str,
        description: Option<String>,
        expected_version: Option<i64>,
    ) -> Result<Workflow> {
        let name = definition::validate_workflow_name(name)?;
        self.edit_definition(id, expected_version, move |data| {
            data.name = name;
            data.description = description;
            Ok(DefinitionEdit::default())
        })
        .await
    }

    async fn set_default(&self, id: &WorkflowId, identity: &Identity) -> Result<Workflow> {
        if !identity.has_role(Role::Admin) {
            tracing::warn!(
                "set_default rejected: workflow = {}, role = {}",
                id.value,
                identity.role
            );
            return Err(FlowdeskError::Forbidden(format!(
                "role '{}' cannot choose the default workflow",
                identity.role
            ))
            .into());
        }
        let repository = self.workflow_repository();
        let mut tx = repository
            .db_pool()
            .begin()
            .await
            .map_err(FlowdeskError::from)?;
        let row = repository
            .find_row_tx(&mut *tx, id)
            .await?
            .ok_or_else(|| Self::not_found(id))?;
        if !row.is_active {
            return Err(FlowdeskError::InactiveWorkflow(id.value).into());
        }
        let cleared = repository
            .set_default(&mut tx, id, datetime::now_millis())
            .await?;
        let workflow = repository
            .find_in_tx(&mut tx, id)
            .await?
            .ok_or_else(|| Self::not_found(id))?;
        tx.commit().await.map_err(FlowdeskError::from)?;
        // the previous default changed too
        self.memory_cache.clear().await;
        tracing::info!(
            "default workflow set: id = {}, cleared = {}",
            id.value,
            cleared
        );
        Ok(workflow)
    }

    async fn insert_step(
        &self,
        id: &WorkflowId,
        position: u32,
        step: StepData,
        expected_version: Option<i64>,
    ) -> Result<Workflow> {
        let step = Step {
            id: StepId {
                value: self.id_generator.generate_id()?,
            },
            data: step,
        };
        self.edit_definition(id, expected_version, move |data| {
            definition::insert_step(&mut data.steps, position, step).map(|(_, edit)| edit)
        })
        .await
    }

    async fn update_step(
        &self,
        id: &WorkflowId,
        order: u32,
        step: StepData,
        expected_version: Option<i64>,
    ) -> Result<Workflow> {
        let workflow_id = id.value;
        self.edit_definition(id, expected_version, move |data| {
            definition::replace_step(workflow_id, &mut data.steps, order, step)?;
            Ok(DefinitionEdit::default())
        })
        .await
    }

    async fn remove_step(
        &self,
        id: &WorkflowId,
        order: u32,
        expected_version: Option<i64>,
    ) -> Result<Workflow> {
        let workflow_id = id.value;
        self.edit_definition(id, expected_version, move |data| {
            definition::remove_step(workflow_id, &mut data.steps, order).map(|(_, edit)| edit)
        })
        .await
    }

    async fn reorder_steps(
        &self,
        id: &WorkflowId,
        new_order: &[StepId],
        expected_version: Option<i64>,
    ) -> Result<Workflow> {
        let new_order = new_order.to_vec();
        self.edit_definition(id, expected_version, move |data| {
            definition::reorder_steps(&mut data.steps, &new_order)
        })
        .await
    }

    async fn deactivate_workflow(
        &self,
        id: &WorkflowId,
        expected_version: Option<i64>,
    ) -> Result<Workflow> {
        let workflow_id = id.value;
        self.edit_definition(id, expected_version, move |data| {
            if data.is_default {
                return Err(FlowdeskError::validation(
                    "isActive",
                    format!("workflow {workflow_id} is the default workflow and cannot be deactivated"),
                ));
            }
            data.is_active = false;
            Ok(DefinitionEdit::default())
        })
        .await
    }

    async fn activate_workflow(
        &self,
        id: &WorkflowId,
        expected_version: Option<i64>,
    ) -> Result<Workflow> {
        self.edit_definition(id, expected_version, |data| {
            data.is_active = true;
            Ok(DefinitionEdit::default())
        })
        .await
    }

    async fn delete_workflow(&self, id: &WorkflowId) -> Result<bool> {
        let repository = self.workflow_repository();
        let mut tx = repository
            .db_pool()
            .begin()
            .await
            .map_err(FlowdeskError::from)?;
        let Some(row) = repository.find_row_tx(&mut *tx, id).await? else {
            return Ok(false);
        };
        if row.is_default {
            return Err(FlowdeskError::validation(
                "isDefault",
                format!("workflow {} is the default workflow and cannot be deleted", id.value),
            )
            .into());
        }
        let tasks = self
            .task_repository()
            .count_by_workflow_tx(&mut *tx, id)
            .await?;
        if tasks > 0 {
            return Err(FlowdeskError::ReferencedWorkflow {
                workflow_id: id.value,
                tasks,
            }
            .into());
        }
        let deleted = repository.delete_tx(&mut tx, id).await?;
        tx.commit().await.map_err(FlowdeskError::from)?;
        self.clear_cache(id).await;
        tracing::info!("workflow deleted: id = {}", id.value);
        Ok(deleted)
    }

    async fn find_workflow(&self, id: &WorkflowId) -> Result<Option<Workflow>> {
        let k = Arc::new(Self::find_cache_key(id));
        self.memory_cache
            .with_cache_if_some(&k, || async {
                tracing::debug!("find workflow from rdb: id = {}", id.value);
                self.workflow_repository().find(id).await
            })
            .await
    }

    async fn find_active_by_name(&self, name: &str) -> Result<Option<Workflow>> {
        let repository = self.workflow_repository();
        match repository
            .find_active_row_by_name_tx(repository.db_pool(), name, None)
            .await?
        {
            Some(row) => self.find_workflow(&WorkflowId { value: row.id }).await,
            None => Ok(None),
        }
    }

    async fn find_default_workflow(&self) -> Result<Option<Workflow>> {
        self.workflow_repository().find_default().await
    }

    async fn find_workflow_list(&self, include_inactive: bool) -> Result<Vec<Workflow>> {
        self.workflow_repository()
            .find_list(include_inactive, None, None)
            .await
    }

    async fn count(&self) -> Result<i64> {
        let repository = self.workflow_repository();
        repository.count_list_tx(repository.db_pool()).await
    }

    async fn record_task_assigned(&self, id: &WorkflowId) -> Result<bool> {
        let res = self.workflow_repository().increment_total_tasks(id).await;
        self.clear_cache(id).await;
        res
    }

    async fn record_task_completed(&self, id: &WorkflowId, elapsed_millis: i64) -> Result<bool> {
        let res = self
            .workflow_repository()
            .record_task_completed(id, elapsed_millis)
            .await;
        self.clear_cache(id).await;
        res
    }
}
