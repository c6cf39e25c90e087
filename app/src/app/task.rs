pub mod progress;
pub mod rdb;

use anyhow::Result;
use async_trait::async_trait;
use model::data::{StepAction, Task, TaskId, WorkflowId};
use model::identity::Identity;
use std::fmt;
use std::sync::Arc;

#[async_trait]
pub trait TaskApp: fmt::Debug + Send + Sync + 'static {
    /// start a task at step 1 of the workflow (the default workflow if none is given)
    async fn create_task(
        &self,
        title: &str,
        client_id: Option<String>,
        workflow_id: Option<&WorkflowId>,
    ) -> Result<Task>;

    async fn advance_task(
        &self,
        id: &TaskId,
        action: StepAction,
        identity: &Identity,
    ) -> Result<Task>;

    async fn can_view_task(&self, id: &TaskId, identity: &Identity) -> Result<bool>;

    async fn find_task(&self, id: &TaskId) -> Result<Option<Task>>;

    async fn find_task_list_by_workflow(&self, workflow_id: &WorkflowId) -> Result<Vec<Task>>;
}

pub trait UseTaskApp {
    fn task_app(&self) -> &Arc<dyn TaskApp + 'static>;
}
