//! Step progression rules of a task (pure functions over a task and its workflow steps).

use flowdesk_base::error::FlowdeskError;
use model::data::{Step, StepAction, Task, TaskStep};
use model::identity::{Identity, Role};

fn current_step<'a>(task: &Task, steps: &'a [Step]) -> Result<(u32, &'a Step), FlowdeskError> {
    let order = match task.data.current_step {
        TaskStep::Completed => return Err(FlowdeskError::TaskCompleted(task.id.value)),
        TaskStep::Step(o) => o,
    };
    steps
        .iter()
        .find(|s| s.data.order == order)
        .map(|s| (order, s))
        .ok_or_else(|| {
            FlowdeskError::NotFound(format!(
                "step not found: workflow_id = {}, order = {}",
                task.data.workflow_id.value, order
            ))
        })
}

fn next_step(order: u32, steps: &[Step]) -> TaskStep {
    if order as usize >= steps.len() {
        TaskStep::Completed
    } else {
        TaskStep::Step(order + 1)
    }
}

/// Compute the step the task moves to. Never skips a step.
pub fn advance_task(
    task: &Task,
    steps: &[Step],
    action: StepAction,
    identity: &Identity,
) -> Result<TaskStep, FlowdeskError> {
    let (order, step) = current_step(task, steps)?;
    let settings = &step.data.settings;
    match action {
        StepAction::ForceAdvance => {
            if !identity.has_role(Role::Admin) {
                return Err(FlowdeskError::UnauthorizedStepAction(format!(
                    "only admin can force task {} past step '{}'",
                    task.id.value, step.data.name
                )));
            }
        }
        StepAction::Reject if settings.needs_approval() => {
            return Err(FlowdeskError::AwaitingApproval {
                task_id: task.id.value,
                order,
            });
        }
        StepAction::Reject => {
            return Err(FlowdeskError::validation(
                "action",
                format!(
                    "reject is not valid at step '{}' (no approval required)",
                    step.data.name
                ),
            ));
        }
        StepAction::Approve if settings.is_client_approval_step => {
            if !identity.is_client_of(task.data.client_id.as_deref()) {
                return Err(FlowdeskError::UnauthorizedStepAction(format!(
                    "step '{}' of task {} must be approved by its client",
                    step.data.name, task.id.value
                )));
            }
        }
        StepAction::Approve => {
            if !identity.is_internal() {
                return Err(FlowdeskError::UnauthorizedStepAction(format!(
                    "role '{}' cannot complete step '{}' of task {}",
                    identity.role, step.data.name, task.id.value
                )));
            }
        }
    }
    Ok(next_step(order, steps))
}

/// Internal identities see every task. A client sees its own tasks while they are
/// at a step open to clients, or once they are completed.
pub fn can_view(task: &Task, steps: &[Step], identity: &Identity) -> bool {
    if identity.is_internal() {
        return true;
    }
    if !identity.is_client_of(task.data.client_id.as_deref()) {
        return false;
    }
    match task.data.current_step {
        TaskStep::Completed => true,
        TaskStep::Step(order) => steps
            .iter()
            .find(|s| s.data.order == order)
            .map(|s| s.data.settings.allow_client_access)
            .unwrap_or(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::workflow::definition::build_steps;
    use crate::app::workflow::seed::social_media_steps;
    use model::data::{StepId, TaskData, TaskId, WorkflowId};

    fn steps() -> Vec<Step> {
        let inputs = social_media_steps();
        let ids = (1..=inputs.len() as i64).map(|value| StepId { value }).collect();
        build_steps(inputs, ids).unwrap()
    }

    fn task_at(step: TaskStep) -> Task {
        Task {
            id: TaskId { value: 7 },
            data: TaskData {
                workflow_id: WorkflowId { value: 1 },
                title: "launch post".to_string(),
                client_id: Some("acme".to_string()),
                current_step: step,
                version: 1,
                created_at: 0,
                updated_at: 0,
                completed_at: None,
            },
        }
    }

    #[test]
    fn test_approve_plain_step() {
        let steps = steps();
        let task = task_at(TaskStep::Step(1));
        assert_eq!(
            advance_task(&task, &steps, StepAction::Approve, &Identity::user()).unwrap(),
            TaskStep::Step(2)
        );
        assert!(matches!(
            advance_task(&task, &steps, StepAction::Approve, &Identity::client("acme")),
            Err(FlowdeskError::UnauthorizedStepAction(_))
        ));
        assert!(matches!(
            advance_task(&task, &steps, StepAction::Reject, &Identity::user()),
            Err(FlowdeskError::Validation { ref field, .. }) if field == "action"
        ));
    }

    #[test]
    fn test_reject_at_internal_review_awaits_approval() {
        let steps = steps();
        // Revisão Interna
        let task = task_at(TaskStep::Step(3));
        for identity in [Identity::admin(), Identity::user(), Identity::client("acme")] {
            assert!(matches!(
                advance_task(&task, &steps, StepAction::Reject, &identity),
                Err(FlowdeskError::AwaitingApproval {
                    task_id: 7,
                    order: 3
                })
            ));
        }
        assert_eq!(task.data.current_step, TaskStep::Step(3));
        assert_eq!(
            advance_task(&task, &steps, StepAction::Approve, &Identity::user()).unwrap(),
            TaskStep::Step(4)
        );
        assert!(matches!(
            advance_task(&task, &steps, StepAction::Approve, &Identity::client("acme")),
            Err(FlowdeskError::UnauthorizedStepAction(_))
        ));
    }

    #[test]
    fn test_client_approval_step() {
        let steps = steps();
        // Aprovação do Cliente
        let task = task_at(TaskStep::Step(5));
        assert_eq!(
            advance_task(&task, &steps, StepAction::Approve, &Identity::client("acme")).unwrap(),
            TaskStep::Step(6)
        );
        for identity in [
            Identity::client("other"),
            Identity::user(),
            Identity::admin(),
        ] {
            assert!(matches!(
                advance_task(&task, &steps, StepAction::Approve, &identity),
                Err(FlowdeskError::UnauthorizedStepAction(_))
            ));
        }
        let mut anonymous = task_at(TaskStep::Step(5));
        anonymous.data.client_id = None;
        assert!(matches!(
            advance_task(&anonymous, &steps, StepAction::Approve, &Identity::client("acme")),
            Err(FlowdeskError::UnauthorizedStepAction(_))
        ));
    }

    #[test]
    fn test_force_advance_is_admin_only() {
        let steps = steps();
        let task = task_at(TaskStep::Step(5));
        assert_eq!(
            advance_task(&task, &steps, StepAction::ForceAdvance, &Identity::admin()).unwrap(),
            TaskStep::Step(6)
        );
        assert!(matches!(
            advance_task(&task, &steps, StepAction::ForceAdvance, &Identity::user()),
            Err(FlowdeskError::UnauthorizedStepAction(_))
        ));
    }

    #[test]
    fn test_last_step_completes_and_completed_is_terminal() {
        let steps = steps();
        let task = task_at(TaskStep::Step(8));
        assert_eq!(
            advance_task(&task, &steps, StepAction::Approve, &Identity::user()).unwrap(),
            TaskStep::Completed
        );
        let done = task_at(TaskStep::Completed);
        assert!(matches!(
            advance_task(&done, &steps, StepAction::ForceAdvance, &Identity::admin()),
            Err(FlowdeskError::TaskCompleted(7))
        ));
        let lost = task_at(TaskStep::Step(42));
        assert!(matches!(
            advance_task(&lost, &steps, StepAction::Approve, &Identity::user()),
            Err(FlowdeskError::NotFound(_))
        ));
    }

    #[test]
    fn test_walk_whole_workflow() {
        let steps = steps();
        let mut task = task_at(TaskStep::Step(1));
        let mut visited = vec![];
        while let TaskStep::Step(order) = task.data.current_step {
            visited.push(order);
            let identity = if order == 5 {
                Identity::client("acme")
            } else {
                Identity::user()
            };
            task.data.current_step =
                advance_task(&task, &steps, StepAction::Approve, &identity).unwrap();
        }
        assert_eq!(visited, (1..=8).collect::<Vec<u32>>());
    }

    #[test]
    fn test_can_view() {
        let steps = steps();
        let internal_only = task_at(TaskStep::Step(3));
        let open = task_at(TaskStep::Step(5));
        let done = task_at(TaskStep::Completed);
        assert!(can_view(&internal_only, &steps, &Identity::user()));
        assert!(can_view(&internal_only, &steps, &Identity::admin()));
        assert!(!can_view(&internal_only, &steps, &Identity::client("acme")));
        assert!(can_view(&open, &steps, &Identity::client("acme")));
        assert!(!can_view(&open, &steps, &Identity::client("other")));
        assert!(can_view(&done, &steps, &Identity::client("acme")));
    }
}
