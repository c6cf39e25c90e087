use super::rows::TaskRow;
use crate::infra::rdb::{Rdb, RdbPool, UseRdbPool};
use crate::infra::{IdGeneratorWrapper, UseIdGenerator};
use anyhow::{Context, Result};
use async_trait::async_trait;
use flowdesk_base::error::FlowdeskError;
use itertools::Itertools;
use model::data::{Task, TaskData, TaskId, TaskStep, WorkflowId};
use sqlx::{Executor, Transaction};
use std::sync::Arc;

#[async_trait]
pub trait TaskRepository: UseRdbPool + UseIdGenerator + Sync + Send {
    async fn create(&self, tx: &mut Transaction<'_, Rdb>, task: &TaskData) -> Result<TaskId> {
        let id: i64 = self.id_generator().generate_id()?;
        let res = sqlx::query::<Rdb>(
            "INSERT INTO `task` (
            `id`,
            `workflow_id`,
            `title`,
            `client_id`,
            `current_step`,
            `version`,
            `created_at`,
            `updated_at`,
            `completed_at`
            ) VALUES (?,?,?,?,?,1,?,?,?)",
        )
        .bind(id)
        .bind(task.workflow_id.value)
        .bind(&task.title)
        .bind(&task.client_id)
        .bind(TaskRow::from_task_step(&task.current_step))
        .bind(task.created_at)
        .bind(task.updated_at)
        .bind(task.completed_at)
        .execute(&mut **tx)
        .await
        .map_err(FlowdeskError::from)?;
        if res.rows_affected() > 0 {
            Ok(TaskId { value: id })
        } else {
            Err(FlowdeskError::RuntimeError(format!(
                "Cannot insert task (logic error?): {task:?}"
            ))
            .into())
        }
    }

    /// compare-and-set the progress of a task. returns the new version.
    async fn update_progress(
        &self,
        tx: &mut Transaction<'_, Rdb>,
        id: &TaskId,
        expected_version: i64,
        current_step: &TaskStep,
        updated_at: i64,
    ) -> Result<i64> {
        let completed_at = if current_step.is_completed() {
            Some(updated_at)
        } else {
            None
        };
        let updated = sqlx::query::<Rdb>(
            "UPDATE `task` SET
            `current_step` = ?,
            `completed_at` = ?,
            `version` = `version` + 1,
            `updated_at` = ?
            WHERE `id` = ? AND `version` = ?;",
        )
        .bind(TaskRow::from_task_step(current_step))
        .bind(completed_at)
        .bind(updated_at)
        .bind(id.value)
        .bind(expected_version)
        .execute(&mut **tx)
        .await
        .map_err(FlowdeskError::from)
        .context(format!("error in update_progress: id = {}", id.value))?;
        if updated.rows_affected() == 0 {
            return match self.find_tx(&mut **tx, id).await? {
                Some(t) => Err(FlowdeskError::ConcurrentModification(format!(
                    "task {} was modified concurrently: expected version {}, found {}",
                    id.value, expected_version, t.data.version
                ))
                .into()),
                None => Err(
                    FlowdeskError::NotFound(format!("task not found: id = {}", id.value)).into(),
                ),
            };
        }
        Ok(expected_version + 1)
    }

    /// move live tasks of the workflow from old step orders to new ones
    /// (pairs with equal orders are skipped). returns the number of moved tasks.
    async fn remap_steps(
        &self,
        tx: &mut Transaction<'_, Rdb>,
        workflow_id: &WorkflowId,
        mapping: &[(u32, u32)],
        updated_at: i64,
    ) -> Result<u64> {
        let moves: Vec<(u32, u32)> = mapping
            .iter()
            .filter(|(old, new)| old != new)
            .copied()
            .collect();
        if moves.is_empty() {
            return Ok(0);
        }
        // single statement: every row is rewritten from its pre-update value
        let query = format!(
            "UPDATE `task` SET
            `current_step` = CASE `current_step` {} END,
            `version` = `version` + 1,
            `updated_at` = ?
            WHERE `workflow_id` = ? AND `current_step` IN ({});",
            moves.iter().map(|_| "WHEN ? THEN ?").join(" "),
            moves.iter().map(|_| "?").join(",")
        );
        let mut q = sqlx::query::<Rdb>(&query);
        for (old, new) in &moves {
            q = q.bind(*old as i64).bind(*new as i64);
        }
        q = q.bind(updated_at).bind(workflow_id.value);
        for (old, _) in &moves {
            q = q.bind(*old as i64);
        }
        let res = q
            .execute(&mut **tx)
            .await
            .map_err(FlowdeskError::from)
            .context(format!(
                "error in remap_steps: workflow_id = {}",
                workflow_id.value
            ))?;
        Ok(res.rows_affected())
    }

    async fn find(&self, id: &TaskId) -> Result<Option<Task>> {
        self.find_tx(self.db_pool(), id).await
    }

    async fn find_tx<'c, E: Executor<'c, Database = Rdb>>(
        &self,
        tx: E,
        id: &TaskId,
    ) -> Result<Option<Task>> {
        sqlx::query_as::<Rdb, TaskRow>("SELECT * FROM `task` WHERE `id` = ?;")
            .bind(id.value)
            .fetch_optional(tx)
            .await
            .map(|r| r.map(|r| r.to_model()))
            .map_err(FlowdeskError::from)
            .context(format!("error in find task: id = {}", id.value))
    }

    async fn find_list_by_workflow(&self, workflow_id: &WorkflowId) -> Result<Vec<Task>> {
        sqlx::query_as::<Rdb, TaskRow>(
            "SELECT * FROM `task` WHERE `workflow_id` = ? ORDER BY `id`;",
        )
        .bind(workflow_id.value)
        .fetch_all(self.db_pool())
        .await
        .map(|rows| rows.iter().map(|r| r.to_model()).collect())
        .map_err(FlowdeskError::from)
        .context(format!(
            "error in find_list_by_workflow: workflow_id = {}",
            workflow_id.value
        ))
    }

    /// live (not completed) tasks currently at the step
    async fn count_live_at_step_tx<'c, E: Executor<'c, Database = Rdb>>(
        &self,
        tx: E,
        workflow_id: &WorkflowId,
        order: u32,
    ) -> Result<i64> {
        sqlx::query_scalar(
            "SELECT count(*) as count FROM `task` WHERE `workflow_id` = ? AND `current_step` = ?;",
        )
        .bind(workflow_id.value)
        .bind(order as i64)
        .fetch_one(tx)
        .await
        .map_err(FlowdeskError::from)
        .context(format!(
            "error in count_live_at_step: workflow_id = {}, order = {}",
            workflow_id.value, order
        ))
    }

    async fn count_by_workflow_tx<'c, E: Executor<'c, Database = Rdb>>(
        &self,
        tx: E,
        workflow_id: &WorkflowId,
    ) -> Result<i64> {
        sqlx::query_scalar("SELECT count(*) as count FROM `task` WHERE `workflow_id` = ?;")
            .bind(workflow_id.value)
            .fetch_one(tx)
            .await
            .map_err(FlowdeskError::from)
            .context(format!(
                "error in count_by_workflow: workflow_id = {}",
                workflow_id.value
            ))
    }
}

#[derive(Clone, Debug)]
pub struct RdbTaskRepositoryImpl {
    id_generator: Arc<IdGeneratorWrapper>,
    pool: RdbPool,
}

pub trait UseTaskRepository {
    fn task_repository(&self) -> &RdbTaskRepositoryImpl;
}

impl RdbTaskRepositoryImpl {
    pub fn new(id_generator: Arc<IdGeneratorWrapper>, pool: RdbPool) -> Self {
        Self { id_generator, pool }
    }
}

impl UseRdbPool for RdbTaskRepositoryImpl {
    fn db_pool(&self) -> &RdbPool {
        &self.pool
    }
}

impl UseIdGenerator for RdbTaskRepositoryImpl {
    fn id_generator(&self) -> &IdGeneratorWrapper {
        &self.id_generator
    }
}

impl TaskRepository for RdbTaskRepositoryImpl {}

#[cfg(test)]
mod test {
    use super::{RdbTaskRepositoryImpl, TaskRepository};
    use crate::infra::rdb::UseRdbPool;
    use crate::infra::IdGeneratorWrapper;
    use anyhow::Result;
    use flowdesk_base::error::FlowdeskError;
    use model::data::{TaskData, TaskStep, WorkflowId};
    use std::sync::Arc;

    fn task_data(workflow_id: i64, step: TaskStep) -> TaskData {
        TaskData {
            workflow_id: WorkflowId { value: workflow_id },
            title: "post for instagram".to_string(),
            client_id: Some("acme".to_string()),
            current_step: step,
            version: 1,
            created_at: 100,
            updated_at: 100,
            completed_at: None,
        }
    }

    async fn setup() -> Result<RdbTaskRepositoryImpl> {
        let pool = crate::infra::test::setup_test_rdb().await?;
        Ok(RdbTaskRepositoryImpl::new(
            Arc::new(IdGeneratorWrapper::new_mock()),
            pool,
        ))
    }

    #[tokio::test]
    async fn test_create_and_progress() -> Result<()> {
        let repository = setup().await?;
        let db = repository.db_pool();
        let mut tx = db.begin().await?;
        let id = repository
            .create(&mut tx, &task_data(1, TaskStep::Step(1)))
            .await?;
        tx.commit().await?;

        let found = repository.find(&id).await?.expect("created task");
        assert_eq!(found.data, task_data(1, TaskStep::Step(1)));

        let mut tx = db.begin().await?;
        let v = repository
            .update_progress(&mut tx, &id, 1, &TaskStep::Step(2), 200)
            .await?;
        assert_eq!(v, 2);
        let err = repository
            .update_progress(&mut tx, &id, 1, &TaskStep::Step(3), 300)
            .await
            .expect_err("stale version");
        assert!(matches!(
            err.downcast_ref::<FlowdeskError>(),
            Some(FlowdeskError::ConcurrentModification(_))
        ));
        repository
            .update_progress(&mut tx, &id, 2, &TaskStep::Completed, 400)
            .await?;
        tx.commit().await?;

        let found = repository.find(&id).await?.unwrap();
        assert_eq!(found.data.current_step, TaskStep::Completed);
        assert_eq!(found.data.completed_at, Some(400));
        assert_eq!(found.data.version, 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_remap_steps_swaps_without_collision() -> Result<()> {
        let repository = setup().await?;
        let db = repository.db_pool();
        let mut tx = db.begin().await?;
        let at1 = repository
            .create(&mut tx, &task_data(1, TaskStep::Step(1)))
            .await?;
        let at2 = repository
            .create(&mut tx, &task_data(1, TaskStep::Step(2)))
            .await?;
        let done = repository
            .create(&mut tx, &task_data(1, TaskStep::Completed))
            .await?;
        let other = repository
            .create(&mut tx, &task_data(2, TaskStep::Step(1)))
            .await?;
        tx.commit().await?;

        let mut tx = db.begin().await?;
        let moved = repository
            .remap_steps(&mut tx, &WorkflowId { value: 1 }, &[(1, 2), (2, 1), (3, 3)], 500)
            .await?;
        assert_eq!(moved, 2);
        let wid = WorkflowId { value: 1 };
        assert_eq!(repository.count_live_at_step_tx(&mut *tx, &wid, 1).await?, 1);
        tx.commit().await?;

        assert_eq!(
            repository.find(&at1).await?.unwrap().data.current_step,
            TaskStep::Step(2)
        );
        assert_eq!(
            repository.find(&at2).await?.unwrap().data.current_step,
            TaskStep::Step(1)
        );
        assert_eq!(
            repository.find(&done).await?.unwrap().data.current_step,
            TaskStep::Completed
        );
        assert_eq!(
            repository.find(&other).await?.unwrap().data.current_step,
            TaskStep::Step(1)
        );
        assert_eq!(repository.count_by_workflow_tx(db, &wid).await?, 3);
        assert_eq!(repository.find_list_by_workflow(&wid).await?.len(), 3);
        Ok(())
    }
}
