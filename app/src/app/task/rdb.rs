use super::{progress, TaskApp};
use anyhow::Result;
use async_trait::async_trait;
use flowdesk_base::datetime;
use flowdesk_base::error::FlowdeskError;
use infra::infra::module::{RdbRepositoryModule, UseRdbRepositoryModule};
use infra::infra::rdb::UseRdbPool;
use infra::infra::task::rdb::{TaskRepository, UseTaskRepository};
use infra::infra::workflow::event::UseWorkflowEventRepository;
use infra::infra::workflow::rdb::{UseWorkflowRepository, WorkflowRepository};
use model::data::{StepAction, Task, TaskData, TaskId, TaskStep, WorkflowId};
use model::event::WorkflowEvent;
use model::identity::Identity;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct RdbTaskAppImpl {
    repositories: Arc<RdbRepositoryModule>,
}

impl RdbTaskAppImpl {
    pub fn new(repositories: Arc<RdbRepositoryModule>) -> Self {
        Self { repositories }
    }

    fn not_found(id: &TaskId) -> FlowdeskError {
        FlowdeskError::NotFound(format!("task not found: id = {}", id.value))
    }

    // stats are eventually consistent: a lost event is logged, not returned
    fn publish(&self, event: WorkflowEvent) {
        if let Err(e) = self.workflow_event_repository().publish(event) {
            tracing::warn!("failed to publish workflow event: {:?}", e);
        }
    }
}

impl UseRdbRepositoryModule for RdbTaskAppImpl {
    fn rdb_repository_module(&self) -> &RdbRepositoryModule {
        &self.repositories
    }
}

#[async_trait]
impl TaskApp for RdbTaskAppImpl {
    async fn create_task(
        &self,
        title: &str,
        client_id: Option<String>,
        workflow_id: Option<&WorkflowId>,
    ) -> Result<Task> {
        let title = title.trim();
        if title.is_empty() {
            return Err(FlowdeskError::validation("title", "task title must not be empty").into());
        }
        let workflows = self.workflow_repository();
        let mut tx = workflows
            .db_pool()
            .begin()
            .await
            .map_err(FlowdeskError::from)?;
        let row = match workflow_id {
            Some(id) => workflows.find_row_tx(&mut *tx, id).await?.ok_or_else(|| {
                FlowdeskError::NotFound(format!("workflow not found: id = {}", id.value))
            })?,
            None => workflows
                .find_default_row_tx(&mut *tx)
                .await?
                .ok_or_else(|| FlowdeskError::NotFound("no default workflow".to_string()))?,
        };
        if !row.is_active {
            return Err(FlowdeskError::InactiveWorkflow(row.id).into());
        }
        let now = datetime::now_millis();
        let data = TaskData {
            workflow_id: WorkflowId { value: row.id },
            title: title.to_string(),
            client_id,
            current_step: TaskStep::Step(1),
            version: 1,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        let id = self.task_repository().create(&mut tx, &data).await?;
        tx.commit().await.map_err(FlowdeskError::from)?;
        tracing::info!("task created: id = {}, workflow = {}", id.value, row.id);

        self.publish(WorkflowEvent::TaskAssigned {
            workflow_id: data.workflow_id,
            task_id: id,
        });
        Ok(Task { id, data })
    }

    async fn advance_task(
        &self,
        id: &TaskId,
        action: StepAction,
        identity: &Identity,
    ) -> Result<Task> {
        let tasks = self.task_repository();
        let mut tx = tasks.db_pool().begin().await.map_err(FlowdeskError::from)?;
        let mut task = tasks
            .find_tx(&mut *tx, id)
            .await?
            .ok_or_else(|| Self::not_found(id))?;
        let workflow = self
            .workflow_repository()
            .find_in_tx(&mut tx, &task.data.workflow_id)
            .await?
            .ok_or_else(|| {
                FlowdeskError::NotFound(format!(
                    "workflow not found: id = {}",
                    task.data.workflow_id.value
                ))
            })?;

        let next = progress::advance_task(&task, &workflow.data.steps, action, identity)
            .inspect_err(|e| {
                if let FlowdeskError::UnauthorizedStepAction(m) = e {
                    tracing::warn!("step action rejected: task = {}, {}", id.value, m);
                }
            })?;
        let now = datetime::now_millis();
        task.data.version = tasks
            .update_progress(&mut tx, id, task.data.version, &next, now)
            .await?;
        tx.commit().await.map_err(FlowdeskError::from)?;

        task.data.current_step = next;
        task.data.updated_at = now;
        tracing::info!(
            "task advanced: id = {}, action = {}, step = {:?}",
            id.value,
            action,
            next
        );
        if next.is_completed() {
            task.data.completed_at = Some(now);
            self.publish(WorkflowEvent::TaskCompleted {
                workflow_id: task.data.workflow_id,
                task_id: *id,
                elapsed_millis: now - task.data.created_at,
            });
        }
        Ok(task)
    }

    async fn can_view_task(&self, id: &TaskId, identity: &Identity) -> Result<bool> {
        let task = self
            .task_repository()
            .find(id)
            .await?
            .ok_or_else(|| Self::not_found(id))?;
        let steps = self
            .workflow_repository()
            .find(&task.data.workflow_id)
            .await?
            .map(|w| w.data.steps)
            .unwrap_or_default();
        Ok(progress::can_view(&task, &steps, identity))
    }

    async fn find_task(&self, id: &TaskId) -> Result<Option<Task>> {
        self.task_repository().find(id).await
    }

    async fn find_task_list_by_workflow(&self, workflow_id: &WorkflowId) -> Result<Vec<Task>> {
        self.task_repository()
            .find_list_by_workflow(workflow_id)
            .await
    }
}
