use crate::data::{TaskId, WorkflowId};
use serde::{Deserialize, Serialize};

/// Task lifecycle events consumed by the stats aggregator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkflowEvent {
    #[serde(rename_all = "camelCase")]
    TaskAssigned {
        workflow_id: WorkflowId,
        task_id: TaskId,
    },
    #[serde(rename_all = "camelCase")]
    TaskCompleted {
        workflow_id: WorkflowId,
        task_id: TaskId,
        elapsed_millis: i64,
    },
}

impl WorkflowEvent {
    pub fn workflow_id(&self) -> &WorkflowId {
        match self {
            WorkflowEvent::TaskAssigned { workflow_id, .. } => workflow_id,
            WorkflowEvent::TaskCompleted { workflow_id, .. } => workflow_id,
        }
    }
}
