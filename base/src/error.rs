use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowdeskError {
    #[error("ValidationError({field}: {message})")]
    Validation { field: String, message: String },
    #[error("NotFound({0})")]
    NotFound(String),
    #[error("InactiveWorkflow(workflow {0} is not active)")]
    InactiveWorkflow(i64),
    #[error("LastStep(workflow {0} must keep at least one step)")]
    LastStep(i64),
    #[error("InvalidPermutation({0})")]
    InvalidPermutation(String),
    #[error("ReferencedStep(workflow {workflow_id} step {order} is the current step of {tasks} live task(s))")]
    ReferencedStep {
        workflow_id: i64,
        order: u32,
        tasks: i64,
    },
    #[error("ReferencedWorkflow(workflow {workflow_id} is referenced by {tasks} task(s))")]
    ReferencedWorkflow { workflow_id: i64, tasks: i64 },
    #[error("InvalidStep({field}: {message})")]
    InvalidStep { field: String, message: String },
    #[error("AwaitingApproval(task {task_id} is waiting for approval at step {order})")]
    AwaitingApproval { task_id: i64, order: u32 },
    #[error("UnauthorizedStepAction({0})")]
    UnauthorizedStepAction(String),
    #[error("Forbidden({0})")]
    Forbidden(String),
    #[error("TaskCompleted(task {0} is already completed)")]
    TaskCompleted(i64),
    #[error("ConcurrentModification({0})")]
    ConcurrentModification(String),
    #[error("GenerateIdError({0})")]
    GenerateIdError(String),
    #[error("DBError({0:?})")]
    DBError(sqlx::Error),
    #[error("RuntimeError({0})")]
    RuntimeError(String),
}

impl FlowdeskError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        FlowdeskError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn invalid_step(field: impl Into<String>, message: impl Into<String>) -> Self {
        FlowdeskError::InvalidStep {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Only a conflicting concurrent write is worth retrying (after re-reading state).
    /// Every other kind is a deterministic rejection of the input or the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FlowdeskError::ConcurrentModification(_))
    }
}

// a lock held by another connection: SQLITE_BUSY (5) with its extended codes
// (BUSY_RECOVERY 261, BUSY_SNAPSHOT 517, BUSY_TIMEOUT 773) and SQLITE_LOCKED (6)
// with LOCKED_SHAREDCACHE (262). all of them are write conflicts.
const SQLITE_BUSY_CODES: [&str; 6] = ["5", "261", "517", "773", "6", "262"];

pub fn is_sqlite_busy_code(code: &str) -> bool {
    SQLITE_BUSY_CODES.contains(&code)
}

impl From<sqlx::Error> for FlowdeskError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db
                .code()
                .map(|c| is_sqlite_busy_code(c.as_ref()))
                .unwrap_or(false)
            {
                return FlowdeskError::ConcurrentModification(format!("database is busy: {db}"));
            }
        }
        FlowdeskError::DBError(e)
    }
}
