use anyhow::Result;
use model::event::WorkflowEvent;
use tokio::sync::broadcast;

/// In-process broadcast of task lifecycle events (consumed by the stats aggregator).
#[derive(Clone, Debug)]
pub struct ChanWorkflowEventRepositoryImpl {
    sender: broadcast::Sender<WorkflowEvent>,
}

impl ChanWorkflowEventRepositoryImpl {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    // false: no subscriber received the event
    pub fn publish(&self, event: WorkflowEvent) -> Result<bool> {
        match self.sender.send(event) {
            Ok(n) => Ok(n > 0),
            Err(broadcast::error::SendError(e)) => {
                tracing::debug!("no subscriber for workflow event: {:?}", e);
                Ok(false)
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.sender.subscribe()
    }
}

pub trait UseWorkflowEventRepository {
    fn workflow_event_repository(&self) -> &ChanWorkflowEventRepositoryImpl;
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::data::{TaskId, WorkflowId};
    use tokio::time::Duration;

    #[tokio::test]
    async fn test_publish_and_subscribe() -> Result<()> {
        let repo = ChanWorkflowEventRepositoryImpl::new(16);
        let mut receiver = repo.subscribe();
        let event = WorkflowEvent::TaskAssigned {
            workflow_id: WorkflowId { value: 1 },
            task_id: TaskId { value: 2 },
        };
        assert!(repo.publish(event.clone())?);
        let received = tokio::time::timeout(Duration::from_secs(1), receiver.recv()).await??;
        assert_eq!(received, event);
        Ok(())
    }

    #[tokio::test]
    async fn test_publish_without_subscriber() -> Result<()> {
        let repo = ChanWorkflowEventRepositoryImpl::new(16);
        let published = repo.publish(WorkflowEvent::TaskCompleted {
            workflow_id: WorkflowId { value: 1 },
            task_id: TaskId { value: 2 },
            elapsed_millis: 10,
        })?;
        assert!(!published);
        Ok(())
    }
}
