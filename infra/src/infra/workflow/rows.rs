use model::data::{
    Step, StepData, StepId, StepSettings, Workflow, WorkflowData, WorkflowId, WorkflowStats,
};

// db row definitions
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct WorkflowRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub is_default: bool,
    pub total_tasks: i64,
    pub completed_tasks: i64,
    pub average_completion_time: f64,
    pub version: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl WorkflowRow {
    // steps of other workflows are ignored
    pub fn to_model(&self, steps: Vec<WorkflowStepRow>) -> Workflow {
        let mut steps: Vec<WorkflowStepRow> = steps
            .into_iter()
            .filter(|s| s.workflow_id == self.id)
            .collect();
        steps.sort_by_key(|s| s.step_order);
        Workflow {
            id: WorkflowId { value: self.id },
            data: WorkflowData {
                name: self.name.clone(),
                description: self.description.clone(),
                steps: steps.into_iter().map(|s| s.to_model()).collect(),
                is_active: self.is_active,
                is_default: self.is_default,
                stats: WorkflowStats {
                    total_tasks: self.total_tasks,
                    completed_tasks: self.completed_tasks,
                    average_completion_time: self.average_completion_time,
                },
                version: self.version,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct WorkflowStepRow {
    pub id: i64,
    pub workflow_id: i64,
    pub step_order: i64, // u32
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub icon: String,
    pub allow_client_access: bool,
    pub requires_approval: bool,
    pub allow_multiple_files: bool,
    pub is_client_approval_step: bool,
}

impl WorkflowStepRow {
    pub fn to_model(&self) -> Step {
        Step {
            id: StepId { value: self.id },
            data: StepData {
                name: self.name.clone(),
                description: self.description.clone(),
                order: self.step_order as u32,
                color: self.color.clone(),
                icon: self.icon.clone(),
                settings: StepSettings {
                    allow_client_access: self.allow_client_access,
                    requires_approval: self.requires_approval,
                    allow_multiple_files: self.allow_multiple_files,
                    is_client_approval_step: self.is_client_approval_step,
                },
            },
        }
    }
}
