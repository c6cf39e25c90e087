use super::workflow::WorkflowApp;
use anyhow::Result;
use model::event::WorkflowEvent;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

/// Folds task lifecycle events into the stats of their workflows.
#[derive(Clone, Debug)]
pub struct StatsAggregator {
    workflow_app: Arc<dyn WorkflowApp + 'static>,
}

impl StatsAggregator {
    pub fn new(workflow_app: Arc<dyn WorkflowApp + 'static>) -> Self {
        Self { workflow_app }
    }

    /// false if the workflow no longer exists
    pub async fn apply(&self, event: &WorkflowEvent) -> Result<bool> {
        match event {
            WorkflowEvent::TaskAssigned { workflow_id, .. } => {
                self.workflow_app.record_task_assigned(workflow_id).await
            }
            WorkflowEvent::TaskCompleted {
                workflow_id,
                elapsed_millis,
                ..
            } => {
                self.workflow_app
                    .record_task_completed(workflow_id, *elapsed_millis)
                    .await
            }
        }
    }

    /// Consume events until every sender is dropped.
    pub async fn run(&self, mut receiver: broadcast::Receiver<WorkflowEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => match self.apply(&event).await {
                    Ok(true) => tracing::debug!("stats updated: {:?}", event),
                    Ok(false) => tracing::debug!(
                        "stats skipped, workflow not found: {}",
                        event.workflow_id().value
                    ),
                    Err(e) => tracing::error!("failed to update stats: {:?}: {:?}", event, e),
                },
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!("stats aggregator lagged: {} events dropped", n);
                }
                Err(RecvError::Closed) => {
                    tracing::info!("workflow event channel closed, stats aggregator stopped");
                    break;
                }
            }
        }
    }

    pub fn start(self, receiver: broadcast::Receiver<WorkflowEvent>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(receiver).await })
    }
}
