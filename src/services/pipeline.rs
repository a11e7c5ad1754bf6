use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::candidate::PersistedCandidate;
use crate::models::job::{Job, JobStatus};
use crate::services::analysis_service::CandidateAnalyzer;
use crate::services::ingest_service::ResumePayload;
use crate::services::job_service::JobStore;

/// Drives a job through analysis and owns its status transitions.
#[derive(Clone)]
pub struct RankingPipeline {
    store: Arc<dyn JobStore>,
    analyzer: CandidateAnalyzer,
}

impl RankingPipeline {
    pub fn new(store: Arc<dyn JobStore>, analyzer: CandidateAnalyzer) -> Self {
        Self { store, analyzer }
    }

    /// Creates the job in `processing` when resumes came with it, otherwise
    /// straight in `completed`. The batch itself is run by the caller.
    pub async fn create_job(
        &self,
        title: &str,
        job_description: &str,
        payloads: &[ResumePayload],
    ) -> Result<Job> {
        let title = title.trim();
        let job_description = job_description.trim();
        if title.is_empty() {
            return Err(Error::Validation("Job title is required".into()));
        }
        if job_description.is_empty() {
            return Err(Error::Validation("Job description is required".into()));
        }

        let status = JobStatus::initial(!payloads.is_empty());
        let job = self.store.create_job(title, job_description, status).await?;
        tracing::info!(job_id = %job.id, resumes = payloads.len(), status = %status, "Job created");
        Ok(job)
    }

    /// Moves an existing job back to `processing` ahead of a new batch.
    /// Refused with `Conflict` while an earlier batch is still running.
    pub async fn prepare_resumes(&self, job_id: Uuid, payloads: &[ResumePayload]) -> Result<Job> {
        if payloads.is_empty() {
            return Err(Error::Validation("At least one resume is required".into()));
        }
        self.store.begin_batch(job_id).await
    }

    pub async fn add_resumes(
        &self,
        job_id: Uuid,
        payloads: Vec<ResumePayload>,
    ) -> Result<Vec<PersistedCandidate>> {
        let job = self.prepare_resumes(job_id, &payloads).await?;
        self.run_batch(job.id, &job.job_description, payloads).await
    }

    /// Analyzes one batch and commits it.
    ///
    /// Success appends every ranking and completes the job. A transient
    /// upstream failure restores `completed` without appending. Anything
    /// else marks the job `failed`.
    pub async fn run_batch(
        &self,
        job_id: Uuid,
        job_description: &str,
        payloads: Vec<ResumePayload>,
    ) -> Result<Vec<PersistedCandidate>> {
        for payload in &payloads {
            tracing::debug!(job_id = %job_id, media_type = %payload.media_type, digest = %payload.digest(), "Resume queued");
        }

        let outcome = match self.analyzer.analyze(job_description, &payloads).await {
            Ok(rankings) => self.store.append_candidates(job_id, &rankings).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(candidates) => {
                self.store.set_job_status(job_id, JobStatus::Completed).await?;
                tracing::info!(job_id = %job_id, count = candidates.len(), "Analysis batch committed");
                Ok(candidates)
            }
            Err(e) if e.is_retryable() => {
                tracing::warn!(job_id = %job_id, error = %e, "Analysis engine unavailable, batch discarded");
                self.restore_status(job_id, JobStatus::Completed).await;
                Err(e)
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Analysis batch failed");
                self.restore_status(job_id, JobStatus::Failed).await;
                Err(e)
            }
        }
    }

    pub fn spawn_batch(&self, job: &Job, payloads: Vec<ResumePayload>) -> JoinHandle<()> {
        let pipeline = self.clone();
        let job_id = job.id;
        let job_description = job.job_description.clone();
        tokio::spawn(async move {
            // Failures are already reflected in the job status.
            let _ = pipeline.run_batch(job_id, &job_description, payloads).await;
        })
    }

    async fn restore_status(&self, job_id: Uuid, status: JobStatus) {
        if let Err(e) = self.store.set_job_status(job_id, status).await {
            tracing::error!(job_id = %job_id, error = %e, status = %status, "Failed to update job status");
        }
    }
}
