use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use crate::models::job::JobSnapshot;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum JobEvent {
    Updated(JobSnapshot),
    Deleted(Uuid),
}

impl JobEvent {
    fn job_id(&self) -> Uuid {
        match self {
            JobEvent::Updated(snapshot) => snapshot.job.id,
            JobEvent::Deleted(id) => *id,
        }
    }
}

/// Fan-out hub for job changes. One channel carries every job; subscribers
/// filter on their own id.
#[derive(Clone)]
pub struct JobEvents {
    tx: broadcast::Sender<JobEvent>,
}

impl Default for JobEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl JobEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn has_subscribers(&self) -> bool {
        self.tx.receiver_count() > 0
    }

    pub fn publish(&self, event: JobEvent) {
        // No receivers is not an error.
        let _ = self.tx.send(event);
    }

    /// Register before loading the initial snapshot so no change falls
    /// between the two.
    pub fn subscribe(&self, job_id: Uuid) -> JobSubscription {
        JobSubscription {
            job_id,
            initial: None,
            rx: self.tx.subscribe(),
        }
    }
}

/// Current state first, then every later change of one job.
pub struct JobSubscription {
    job_id: Uuid,
    initial: Option<JobSnapshot>,
    rx: broadcast::Receiver<JobEvent>,
}

impl JobSubscription {
    pub fn with_initial(mut self, snapshot: JobSnapshot) -> Self {
        self.initial = Some(snapshot);
        self
    }

    /// `None` once the job is deleted or the hub is gone.
    pub async fn next(&mut self) -> Option<JobSnapshot> {
        if let Some(initial) = self.initial.take() {
            return Some(initial);
        }
        loop {
            match self.rx.recv().await {
                Ok(event) if event.job_id() != self.job_id => continue,
                Ok(JobEvent::Updated(snapshot)) => return Some(snapshot),
                Ok(JobEvent::Deleted(_)) => return None,
                Err(RecvError::Lagged(skipped)) => {
                    // Snapshots are full state, so the next one catches up.
                    tracing::warn!(job_id = %self.job_id, skipped, "Job subscriber lagged");
                    continue;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
