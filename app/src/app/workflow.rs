pub mod definition;
pub mod rdb;
pub mod seed;

use anyhow::Result;
use async_trait::async_trait;
use model::data::{StepData, StepId, Workflow, WorkflowId};
use model::identity::Identity;
use std::fmt;
use std::sync::Arc;

/// Workflow definitions: creation, structural edits, default selection and reads.
///
/// Mutations that take `expected_version` fail with `ConcurrentModification`
/// (and write nothing) when the stored version differs from it. Every
/// mutation returns the workflow as committed.
#[async_trait]
pub trait WorkflowApp: fmt::Debug + Send + Sync + 'static {
    async fn create_workflow(
        &self,
        name: &str,
        description: Option<String>,
        steps: Vec<StepData>,
    ) -> Result<Workflow>;

    /// rename (same rules as create) and replace the description
    async fn update_workflow(
        &self,
        id: &WorkflowId,
        name: &str,
        description: Option<String>,
        expected_version: Option<i64>,
    ) -> Result<Workflow>;

    /// make the workflow the only default (admin only)
    async fn set_default(&self, id: &WorkflowId, identity: &Identity) -> Result<Workflow>;

    /// insert at 1-based `position`, clamped to [1, len + 1]
    async fn insert_step(
        &self,
        id: &WorkflowId,
        position: u32,
        step: StepData,
        expected_version: Option<i64>,
    ) -> Result<Workflow>;

    async fn update_step(
        &self,
        id: &WorkflowId,
        order: u32,
        step: StepData,
        expected_version: Option<i64>,
    ) -> Result<Workflow>;

    async fn remove_step(
        &self,
        id: &WorkflowId,
        order: u32,
        expected_version: Option<i64>,
    ) -> Result<Workflow>;

    async fn reorder_steps(
        &self,
        id: &WorkflowId,
        new_order: &[StepId],
        expected_version: Option<i64>,
    ) -> Result<Workflow>;

    async fn deactivate_workflow(
        &self,
        id: &WorkflowId,
        expected_version: Option<i64>,
    ) -> Result<Workflow>;

    async fn activate_workflow(
        &self,
        id: &WorkflowId,
        expected_version: Option<i64>,
    ) -> Result<Workflow>;

    /// false if the workflow did not exist
    async fn delete_workflow(&self, id: &WorkflowId) -> Result<bool>;

    async fn find_workflow(&self, id: &WorkflowId) -> Result<Option<Workflow>>;

    async fn find_active_by_name(&self, name: &str) -> Result<Option<Workflow>>;

    async fn find_default_workflow(&self) -> Result<Option<Workflow>>;

    async fn find_workflow_list(&self, include_inactive: bool) -> Result<Vec<Workflow>>;

    async fn count(&self) -> Result<i64>;

    // stats (never bump the version)
    async fn record_task_assigned(&self, id: &WorkflowId) -> Result<bool>;

    async fn record_task_completed(&self, id: &WorkflowId, elapsed_millis: i64) -> Result<bool>;
}

pub trait UseWorkflowApp {
    fn workflow_app(&self) -> &Arc<dyn WorkflowApp + 'static>;
}
