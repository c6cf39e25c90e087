use super::rows::{WorkflowRow, WorkflowStepRow};
use crate::infra::rdb::{Rdb, RdbPool, UseRdbPool};
use crate::infra::{IdGeneratorWrapper, UseIdGenerator};
use anyhow::{Context, Result};
use async_trait::async_trait;
use flowdesk_base::error::FlowdeskError;
use model::data::{Step, Workflow, WorkflowData, WorkflowId};
use sqlx::{Executor, Transaction};
use std::sync::Arc;

/// comparison key of a workflow name: surrounding spaces dropped, unicode lowercase.
/// (sqlite lower() folds ascii only)
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

#[async_trait]
pub trait WorkflowRepository: UseRdbPool + UseIdGenerator + Sync + Send {
    /// insert a new workflow (version 1, stats zeroed) with its steps.
    /// steps must already carry their ids.
    async fn create(
        &self,
        tx: &mut Transaction<'_, Rdb>,
        workflow: &WorkflowData,
    ) -> Result<WorkflowId> {
        let id: i64 = self.id_generator().generate_id()?;
        let res = sqlx::query::<Rdb>(
            "INSERT INTO `workflow` (
            `id`,
            `name`,
            `name_key`,
            `description`,
            `is_active`,
            `is_default`,
            `total_tasks`,
            `completed_tasks`,
            `average_completion_time`,
            `version`,
            `created_at`,
            `updated_at`
            ) VALUES (?,?,?,?,?,?,0,0,0,1,?,?)",
        )
        .bind(id)
        .bind(&workflow.name)
        .bind(name_key(&workflow.name))
        .bind(&workflow.description)
        .bind(workflow.is_active)
        .bind(workflow.is_default)
        .bind(workflow.created_at)
        .bind(workflow.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(FlowdeskError::from)?;

        if res.rows_affected() > 0 {
            let wid = WorkflowId { value: id };
            self.insert_steps(&mut *tx, &wid, &workflow.steps).await?;
            Ok(wid)
        } else {
            // no record?
            Err(FlowdeskError::RuntimeError(format!(
                "Cannot insert workflow (logic error?): {workflow:?}"
            ))
            .into())
        }
    }

    async fn insert_steps(
        &self,
        tx: &mut Transaction<'_, Rdb>,
        workflow_id: &WorkflowId,
        steps: &[Step],
    ) -> Result<usize> {
        if steps.is_empty() {
            return Ok(0);
        }
        let values_placeholder = "(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)".to_string();
        let values: Vec<String> = std::iter::repeat_n(values_placeholder, steps.len()).collect();
        let query = format!(
            "INSERT INTO `workflow_step` (
            `id`,
            `workflow_id`,
            `step_order`,
            `name`,
            `description`,
            `color`,
            `icon`,
            `allow_client_access`,
            `requires_approval`,
            `allow_multiple_files`,
            `is_client_approval_step`
            ) VALUES {}",
            values.join(",")
        );
        let mut q = sqlx::query::<Rdb>(&query);
        for step in steps {
            let s = &step.data;
            q = q
                .bind(step.id.value)
                .bind(workflow_id.value)
                .bind(s.order as i64)
                .bind(&s.name)
                .bind(&s.description)
                .bind(&s.color)
                .bind(&s.icon)
                .bind(s.settings.allow_client_access)
                .bind(s.settings.requires_approval)
                .bind(s.settings.allow_multiple_files)
                .bind(s.settings.is_client_approval_step);
        }
        let res = q
            .execute(&mut **tx)
            .await
            .map_err(FlowdeskError::from)
            .context(format!(
                "error in insert steps: workflow_id = {}",
                workflow_id.value
            ))?;
        Ok(res.rows_affected() as usize)
    }

    // (delete then insert keeps the (workflow_id, step_order) unique index happy while renumbering)
    async fn replace_steps(
        &self,
        tx: &mut Transaction<'_, Rdb>,
        workflow_id: &WorkflowId,
        steps: &[Step],
    ) -> Result<usize> {
        sqlx::query::<Rdb>("DELETE FROM `workflow_step` WHERE `workflow_id` = ?;")
            .bind(workflow_id.value)
            .execute(&mut **tx)
            .await
            .map_err(FlowdeskError::from)
            .context(format!(
                "error deleting workflow_steps: workflow_id = {}",
                workflow_id.value
            ))?;
        self.insert_steps(&mut *tx, workflow_id, steps).await
    }

    /// update name, description, active flag and steps (compare-and-set on version).
    /// is_default and stats are never written here.
    async fn update_definition(
        &self,
        tx: &mut Transaction<'_, Rdb>,
        id: &WorkflowId,
        expected_version: i64,
        workflow: &WorkflowData,
    ) -> Result<i64> {
        let updated = sqlx::query::<Rdb>(
            "UPDATE `workflow` SET
            `name` = ?,
            `name_key` = ?,
            `description` = ?,
            `is_active` = ?,
            `version` = `version` + 1,
            `updated_at` = ?
            WHERE `id` = ? AND `version` = ?;",
        )
        .bind(&workflow.name)
        .bind(name_key(&workflow.name))
        .bind(&workflow.description)
        .bind(workflow.is_active)
        .bind(workflow.updated_at)
        .bind(id.value)
        .bind(expected_version)
        .execute(&mut **tx)
        .await
        .map_err(FlowdeskError::from)
        .context(format!("error in update workflow: id = {}", id.value))?;
        if updated.rows_affected() == 0 {
            return Err(self.version_conflict(&mut *tx, id, expected_version).await);
        }
        self.replace_steps(&mut *tx, id, &workflow.steps).await?;
        Ok(expected_version + 1)
    }

    // explain why a compare-and-set touched no row
    async fn version_conflict(
        &self,
        tx: &mut Transaction<'_, Rdb>,
        id: &WorkflowId,
        expected_version: i64,
    ) -> anyhow::Error {
        match self.find_row_tx(&mut **tx, id).await {
            Ok(Some(row)) => FlowdeskError::ConcurrentModification(format!(
                "workflow {} was modified concurrently: expected version {}, found {}",
                id.value, expected_version, row.version
            ))
            .into(),
            Ok(None) => FlowdeskError::NotFound(format!("workflow not found: id = {}", id.value))
                .into(),
            Err(e) => e,
        }
    }

    /// clear every other default and mark the target, inside the caller's transaction.
    /// the caller checks that the target exists and is active.
    async fn set_default(
        &self,
        tx: &mut Transaction<'_, Rdb>,
        id: &WorkflowId,
        updated_at: i64,
    ) -> Result<u64> {
        let cleared = sqlx::query::<Rdb>(
            "UPDATE `workflow` SET
            `is_default` = 0,
            `version` = `version` + 1,
            `updated_at` = ?
            WHERE `is_default` = 1 AND `id` <> ?;",
        )
        .bind(updated_at)
        .bind(id.value)
        .execute(&mut **tx)
        .await
        .map_err(FlowdeskError::from)
        .context("error in clearing default workflow")?
        .rows_affected();

        sqlx::query::<Rdb>(
            "UPDATE `workflow` SET
            `is_default` = 1,
            `version` = `version` + 1,
            `updated_at` = ?
            WHERE `id` = ? AND `is_active` = 1 AND `is_default` = 0;",
        )
        .bind(updated_at)
        .bind(id.value)
        .execute(&mut **tx)
        .await
        .map_err(FlowdeskError::from)
        .context(format!("error in set_default: id = {}", id.value))?;
        Ok(cleared)
    }

    async fn delete_tx(&self, tx: &mut Transaction<'_, Rdb>, id: &WorkflowId) -> Result<bool> {
        sqlx::query::<Rdb>("DELETE FROM `workflow_step` WHERE `workflow_id` = ?;")
            .bind(id.value)
            .execute(&mut **tx)
            .await
            .map_err(FlowdeskError::from)?;
        let del = sqlx::query::<Rdb>("DELETE FROM `workflow` WHERE `id` = ?;")
            .bind(id.value)
            .execute(&mut **tx)
            .await
            .map(|r| r.rows_affected() > 0)
            .map_err(FlowdeskError::from)?;
        Ok(del)
    }

    async fn find(&self, id: &WorkflowId) -> Result<Option<Workflow>> {
        let pool = self.db_pool();
        if let Some(row) = self.find_row_tx(pool, id).await? {
            let steps = self.find_steps_tx(pool, row.id).await?;
            Ok(Some(row.to_model(steps)))
        } else {
            Ok(None)
        }
    }

    // read inside a write transaction (consistent with the following update)
    async fn find_in_tx(
        &self,
        tx: &mut Transaction<'_, Rdb>,
        id: &WorkflowId,
    ) -> Result<Option<Workflow>> {
        if let Some(row) = self.find_row_tx(&mut **tx, id).await? {
            let steps = self.find_steps_tx(&mut **tx, row.id).await?;
            Ok(Some(row.to_model(steps)))
        } else {
            Ok(None)
        }
    }

    async fn find_row_tx<'c, E: Executor<'c, Database = Rdb>>(
        &self,
        tx: E,
        id: &WorkflowId,
    ) -> Result<Option<WorkflowRow>> {
        sqlx::query_as::<Rdb, WorkflowRow>("SELECT * FROM `workflow` WHERE `id` = ?;")
            .bind(id.value)
            .fetch_optional(tx)
            .await
            .map_err(FlowdeskError::from)
            .context(format!("error in find: id = {}", id.value))
    }

    async fn find_steps_tx<'c, E: Executor<'c, Database = Rdb>>(
        &self,
        tx: E,
        workflow_id: i64,
    ) -> Result<Vec<WorkflowStepRow>> {
        sqlx::query_as::<Rdb, WorkflowStepRow>(
            "SELECT * FROM `workflow_step` WHERE `workflow_id` = ? ORDER BY `step_order`;",
        )
        .bind(workflow_id)
        .fetch_all(tx)
        .await
        .map_err(FlowdeskError::from)
        .context(format!(
            "error finding steps for workflow_id = {workflow_id}"
        ))
    }

    /// active workflow with the same name ignoring case and surrounding spaces
    async fn find_active_row_by_name_tx<'c, E: Executor<'c, Database = Rdb>>(
        &self,
        tx: E,
        name: &str,
        exclude: Option<&WorkflowId>,
    ) -> Result<Option<WorkflowRow>> {
        sqlx::query_as::<Rdb, WorkflowRow>(
            "SELECT * FROM `workflow`
            WHERE `name_key` = ? AND `is_active` = 1 AND `id` <> ?
            LIMIT 1;",
        )
        .bind(name_key(name))
        .bind(exclude.map(|i| i.value).unwrap_or(0))
        .fetch_optional(tx)
        .await
        .map_err(FlowdeskError::from)
        .context(format!("error in find_active_row_by_name: name = {name}"))
    }

    async fn find_default(&self) -> Result<Option<Workflow>> {
        let pool = self.db_pool();
        if let Some(row) = self.find_default_row_tx(pool).await? {
            let steps = self.find_steps_tx(pool, row.id).await?;
            Ok(Some(row.to_model(steps)))
        } else {
            Ok(None)
        }
    }

    async fn find_default_row_tx<'c, E: Executor<'c, Database = Rdb>>(
        &self,
        tx: E,
    ) -> Result<Option<WorkflowRow>> {
        sqlx::query_as::<Rdb, WorkflowRow>(
            "SELECT * FROM `workflow` WHERE `is_default` = 1 AND `is_active` = 1 LIMIT 1;",
        )
        .fetch_optional(tx)
        .await
        .map_err(FlowdeskError::from)
        .context("error in find_default")
    }

    async fn find_list(
        &self,
        include_inactive: bool,
        limit: Option<&i32>,
        offset: Option<&i64>,
    ) -> Result<Vec<Workflow>> {
        let pool = self.db_pool();
        let rows = self
            .find_row_list_tx(pool, include_inactive, limit, offset)
            .await?;
        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            let steps = self.find_steps_tx(pool, row.id).await?;
            result.push(row.to_model(steps));
        }
        Ok(result)
    }

    async fn find_row_list_tx<'c, E: Executor<'c, Database = Rdb>>(
        &self,
        tx: E,
        include_inactive: bool,
        limit: Option<&i32>,
        offset: Option<&i64>,
    ) -> Result<Vec<WorkflowRow>> {
        // is_active >= 0 matches every row
        let min_active = if include_inactive { 0 } else { 1 };
        if let Some(l) = limit {
            sqlx::query_as::<Rdb, WorkflowRow>(
                "SELECT * FROM `workflow` WHERE `is_active` >= ? ORDER BY `id` LIMIT ? OFFSET ?;",
            )
            .bind(min_active)
            .bind(l)
            .bind(offset.unwrap_or(&0i64))
            .fetch_all(tx)
        } else {
            // fetch all!
            sqlx::query_as::<Rdb, WorkflowRow>(
                "SELECT * FROM `workflow` WHERE `is_active` >= ? ORDER BY `id`;",
            )
            .bind(min_active)
            .fetch_all(tx)
        }
        .await
        .map_err(FlowdeskError::from)
        .context(format!("error in find_list: ({limit:?}, {offset:?})"))
    }

    async fn count_list_tx<'c, E: Executor<'c, Database = Rdb>>(&self, tx: E) -> Result<i64> {
        sqlx::query_scalar("SELECT count(*) as count FROM `workflow`;")
            .fetch_one(tx)
            .await
            .map_err(FlowdeskError::from)
            .context("error in count_list".to_string())
    }

    // stats are denormalized counters: they never bump the version
    async fn increment_total_tasks(&self, id: &WorkflowId) -> Result<bool> {
        sqlx::query::<Rdb>(
            "UPDATE `workflow` SET `total_tasks` = `total_tasks` + 1 WHERE `id` = ?;",
        )
        .bind(id.value)
        .execute(self.db_pool())
        .await
        .map(|r| r.rows_affected() > 0)
        .map_err(FlowdeskError::from)
        .context(format!("error in increment_total_tasks: id = {}", id.value))
    }

    async fn record_task_completed(&self, id: &WorkflowId, elapsed_millis: i64) -> Result<bool> {
        // running mean: right hand sides see the values before this update
        sqlx::query::<Rdb>(
            "UPDATE `workflow` SET
            `completed_tasks` = `completed_tasks` + 1,
            `average_completion_time` =
                (`average_completion_time` * `completed_tasks` + ?) / (`completed_tasks` + 1)
            WHERE `id` = ?;",
        )
        .bind(elapsed_millis as f64)
        .bind(id.value)
        .execute(self.db_pool())
        .await
        .map(|r| r.rows_affected() > 0)
        .map_err(FlowdeskError::from)
        .context(format!("error in record_task_completed: id = {}", id.value))
    }
}

#[derive(Clone, Debug)]
pub struct RdbWorkflowRepositoryImpl {
    id_generator: Arc<IdGeneratorWrapper>,
    pool: RdbPool,
}

pub trait UseWorkflowRepository {
    fn workflow_repository(&self) -> &RdbWorkflowRepositoryImpl;
}

impl RdbWorkflowRepositoryImpl {
    pub fn new(id_generator: Arc<IdGeneratorWrapper>, pool: RdbPool) -> Self {
        Self { id_generator, pool }
    }
}

impl UseRdbPool for RdbWorkflowRepositoryImpl {
    fn db_pool(&self) -> &RdbPool {
        &self.pool
    }
}

impl UseIdGenerator for RdbWorkflowRepositoryImpl {
    fn id_generator(&self) -> &IdGeneratorWrapper {
        &self.id_generator
    }
}

impl WorkflowRepository for RdbWorkflowRepositoryImpl {}
