use model::data::{Task, TaskData, TaskId, TaskStep, WorkflowId};

// db row definitions
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct TaskRow {
    pub id: i64,
    pub workflow_id: i64,
    pub title: String,
    pub client_id: Option<String>,
    pub current_step: Option<i64>, // None: completed
    pub version: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub completed_at: Option<i64>,
}

impl TaskRow {
    pub fn to_model(&self) -> Task {
        Task {
            id: TaskId { value: self.id },
            data: TaskData {
                workflow_id: WorkflowId {
                    value: self.workflow_id,
                },
                title: self.title.clone(),
                client_id: self.client_id.clone(),
                current_step: Self::to_task_step(self.current_step),
                version: self.version,
                created_at: self.created_at,
                updated_at: self.updated_at,
                completed_at: self.completed_at,
            },
        }
    }
    pub fn to_task_step(current_step: Option<i64>) -> TaskStep {
        match current_step {
            Some(o) => TaskStep::Step(o as u32),
            None => TaskStep::Completed,
        }
    }
    pub fn from_task_step(step: &TaskStep) -> Option<i64> {
        step.order().map(|o| o as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_step_column() {
        assert_eq!(TaskRow::to_task_step(Some(3)), TaskStep::Step(3));
        assert_eq!(TaskRow::to_task_step(None), TaskStep::Completed);
        assert_eq!(TaskRow::from_task_step(&TaskStep::Step(5)), Some(5));
        assert_eq!(TaskRow::from_task_step(&TaskStep::Completed), None);
    }
}
