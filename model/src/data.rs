use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkflowId {
    pub value: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StepId {
    pub value: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId {
    pub value: i64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSettings {
    pub allow_client_access: bool,
    pub requires_approval: bool,
    pub allow_multiple_files: bool,
    pub is_client_approval_step: bool,
}

impl StepSettings {
    // a client approval step is an approval step whoever set the flags
    pub fn needs_approval(&self) -> bool {
        self.requires_approval || self.is_client_approval_step
    }
}

/// Editable content of a step. `order` is owned by the workflow and is
/// overwritten by every structural edit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepData {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub order: u32,
    pub color: String,
    pub icon: String,
    #[serde(default)]
    pub settings: StepSettings,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    #[serde(flatten)]
    pub data: StepData,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStats {
    pub total_tasks: i64,
    pub completed_tasks: i64,
    /// milliseconds
    pub average_completion_time: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowData {
    pub name: String,
    pub description: Option<String>,
    pub steps: Vec<Step>,
    pub is_active: bool,
    pub is_default: bool,
    pub stats: WorkflowStats,
    pub version: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl WorkflowData {
    pub fn step_at(&self, order: u32) -> Option<&Step> {
        self.steps.iter().find(|s| s.data.order == order)
    }
    pub fn step_ids(&self) -> Vec<StepId> {
        self.steps.iter().map(|s| s.id).collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    #[serde(flatten)]
    pub data: WorkflowData,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStep {
    /// `order` of the step the task is at
    Step(u32),
    Completed,
}

impl TaskStep {
    pub fn order(&self) -> Option<u32> {
        match self {
            TaskStep::Step(o) => Some(*o),
            TaskStep::Completed => None,
        }
    }
    pub fn is_completed(&self) -> bool {
        matches!(self, TaskStep::Completed)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskData {
    pub workflow_id: WorkflowId,
    pub title: String,
    pub client_id: Option<String>,
    pub current_step: TaskStep,
    pub version: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub completed_at: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    #[serde(flatten)]
    pub data: TaskData,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum StepAction {
    Approve,
    Reject,
    ForceAdvance,
}
