use anyhow::Result;
use app::app::task::{TaskApp, UseTaskApp};
use app::app::workflow::seed::seed_default_workflow;
use app::app::workflow::{UseWorkflowApp, WorkflowApp};
use app::module::test::create_test_app_module;
use app::module::AppModule;
use flowdesk_base::error::FlowdeskError;
use model::data::{StepAction, TaskStep, WorkflowId, WorkflowStats};
use model::identity::Identity;
use std::time::Duration;

fn flowdesk_error(err: &anyhow::Error) -> &FlowdeskError {
    err.downcast_ref::<FlowdeskError>()
        .unwrap_or_else(|| panic!("not a flowdesk error: {err:?}"))
}

// stats are written by the background aggregator
async fn wait_for_stats(
    module: &AppModule,
    id: &WorkflowId,
    done: impl Fn(&WorkflowStats) -> bool,
) -> Result<WorkflowStats> {
    for _ in 0..100 {
        let stats = module
            .workflow_app()
            .find_workflow_list(true)
            .await?
            .into_iter()
            .find(|w| w.id == *id)
            .map(|w| w.data.stats)
            .unwrap_or_default();
        if done(&stats) {
            return Ok(stats);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    anyhow::bail!("stats not updated in time")
}

#[tokio::test]
async fn test_create_task_needs_a_default_workflow() -> Result<()> {
    let module = create_test_app_module().await?;
    let err = module
        .task_app()
        .create_task("post", None, None)
        .await
        .unwrap_err();
    assert!(matches!(flowdesk_error(&err), FlowdeskError::NotFound(_)));

    let id = seed_default_workflow(module.workflow_app().as_ref()).await?;
    let task = module.task_app().create_task(" post ", None, None).await?;
    assert_eq!(task.data.workflow_id, id);
    assert_eq!(task.data.title, "post");
    assert_eq!(task.data.current_step, TaskStep::Step(1));

    let err = module
        .task_app()
        .create_task("  ", None, None)
        .await
        .unwrap_err();
    assert!(matches!(
        flowdesk_error(&err),
        FlowdeskError::Validation { field, .. } if field == "title"
    ));
    Ok(())
}

#[tokio::test]
async fn test_reject_at_internal_review() -> Result<()> {
    let module = create_test_app_module().await?;
    seed_default_workflow(module.workflow_app().as_ref()).await?;
    let tasks = module.task_app().clone();
    let user = Identity::user();
    let task = tasks.create_task("reel", Some("acme".to_string()), None).await?;
    tasks.advance_task(&task.id, StepAction::Approve, &user).await?;
    let at_review = tasks.advance_task(&task.id, StepAction::Approve, &user).await?;
    assert_eq!(at_review.data.current_step, TaskStep::Step(3));

    let err = tasks
        .advance_task(&task.id, StepAction::Reject, &user)
        .await
        .unwrap_err();
    assert!(matches!(
        flowdesk_error(&err),
        FlowdeskError::AwaitingApproval { order: 3, .. }
    ));
    let unchanged = tasks.find_task(&task.id).await?.unwrap();
    assert_eq!(unchanged.data.current_step, TaskStep::Step(3));
    assert_eq!(unchanged.data.version, at_review.data.version);

    let err = tasks
        .advance_task(&task.id, StepAction::ForceAdvance, &user)
        .await
        .unwrap_err();
    assert!(matches!(
        flowdesk_error(&err),
        FlowdeskError::UnauthorizedStepAction(_)
    ));
    let forced = tasks
        .advance_task(&task.id, StepAction::ForceAdvance, &Identity::admin())
        .await?;
    assert_eq!(forced.data.current_step, TaskStep::Step(4));
    Ok(())
}

#[tokio::test]
async fn test_full_run_updates_stats() -> Result<()> {
    let module = create_test_app_module().await?;
    let aggregator = module.start_stats_aggregator();
    let workflow_id = seed_default_workflow(module.workflow_app().as_ref()).await?;
    let tasks = module.task_app().clone();

    let task = tasks.create_task("carousel", Some("acme".to_string()), None).await?;
    let other = tasks.create_task("story", Some("acme".to_string()), None).await?;
    let stats = wait_for_stats(&module, &workflow_id, |s| s.total_tasks == 2).await?;
    assert_eq!(stats.completed_tasks, 0);

    let mut current = task.clone();
    while let TaskStep::Step(order) = current.data.current_step {
        let identity = if order == 5 {
            // Aprovação do Cliente
            let err = tasks
                .advance_task(&task.id, StepAction::Approve, &Identity::user())
                .await
                .unwrap_err();
            assert!(matches!(
                flowdesk_error(&err),
                FlowdeskError::UnauthorizedStepAction(_)
            ));
            Identity::client("acme")
        } else {
            Identity::user()
        };
        current = tasks
            .advance_task(&task.id, StepAction::Approve, &identity)
            .await?;
    }
    assert!(current.data.completed_at.is_some());
    let err = tasks
        .advance_task(&task.id, StepAction::Approve, &Identity::admin())
        .await
        .unwrap_err();
    assert!(matches!(flowdesk_error(&err), FlowdeskError::TaskCompleted(_)));

    let stats = wait_for_stats(&module, &workflow_id, |s| s.completed_tasks == 1).await?;
    assert_eq!(stats.total_tasks, 2);
    assert!(stats.average_completion_time >= 0.0);
    assert_eq!(
        tasks.find_task(&other.id).await?.unwrap().data.current_step,
        TaskStep::Step(1)
    );
    // stats never bump the definition version
    let workflow = module
        .workflow_app()
        .find_workflow(&workflow_id)
        .await?
        .unwrap();
    assert_eq!(workflow.data.version, 2);
    aggregator.abort();
    Ok(())
}

#[tokio::test]
async fn test_client_visibility() -> Result<()> {
    let module = create_test_app_module().await?;
    seed_default_workflow(module.workflow_app().as_ref()).await?;
    let tasks = module.task_app().clone();
    let acme = Identity::client("acme");
    let task = tasks.create_task("video", Some("acme".to_string()), None).await?;

    // Briefing is internal
    assert!(tasks.can_view_task(&task.id, &Identity::user()).await?);
    assert!(!tasks.can_view_task(&task.id, &acme).await?);

    for _ in 0..4 {
        tasks
            .advance_task(&task.id, StepAction::Approve, &Identity::user())
            .await?;
    }
    // Aprovação do Cliente is open to the client
    assert!(tasks.can_view_task(&task.id, &acme).await?);
    assert!(!tasks
        .can_view_task(&task.id, &Identity::client("other"))
        .await?);

    let err = tasks
        .can_view_task(&model::data::TaskId { value: 999_999 }, &acme)
        .await
        .unwrap_err();
    assert!(matches!(flowdesk_error(&err), FlowdeskError::NotFound(_)));
    Ok(())
}
