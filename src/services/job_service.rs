use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::candidate::{CandidateRanking, CandidateRow, PersistedCandidate};
use crate::models::job::{Job, JobRow, JobSnapshot, JobStatus};
use crate::services::job_events::{JobEvent, JobEvents, JobSubscription};

const JOB_COLUMNS: &str = "id, title, job_description, status, created_at";
const CANDIDATE_COLUMNS: &str = "id, job_id, candidate_index, candidate_name, candidate_email, suitability_score, summary, created_at";

/// Persistence for jobs and their candidates.
///
/// Direct CRUD on a missing id is `NotFound`. `append_candidates` is all or
/// nothing.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create_job(&self, title: &str, job_description: &str, status: JobStatus) -> Result<Job>;

    async fn get_job(&self, id: Uuid) -> Result<Job>;

    async fn list_jobs(&self) -> Result<Vec<Job>>;

    async fn update_job(
        &self,
        id: Uuid,
        title: Option<&str>,
        job_description: Option<&str>,
    ) -> Result<Job>;

    async fn set_job_status(&self, id: Uuid, status: JobStatus) -> Result<Job>;

    /// Moves a settled job into `processing`. A job that is already
    /// processing is a `Conflict`, so at most one batch runs per job.
    async fn begin_batch(&self, id: Uuid) -> Result<Job>;

    async fn delete_job(&self, id: Uuid) -> Result<()>;

    async fn append_candidates(
        &self,
        job_id: Uuid,
        rankings: &[CandidateRanking],
    ) -> Result<Vec<PersistedCandidate>>;

    /// Candidates in insertion order.
    async fn list_candidates(&self, job_id: Uuid) -> Result<Vec<PersistedCandidate>>;

    /// Only the ids that still exist are returned.
    async fn get_candidates(&self, job_id: Uuid, ids: &[Uuid]) -> Result<Vec<PersistedCandidate>>;

    async fn delete_candidate(&self, job_id: Uuid, candidate_id: Uuid) -> Result<()>;

    async fn delete_all_candidates(&self, job_id: Uuid) -> Result<u64>;

    async fn subscribe(&self, job_id: Uuid) -> Result<JobSubscription>;

    async fn snapshot(&self, job_id: Uuid) -> Result<JobSnapshot> {
        let job = self.get_job(job_id).await?;
        let candidates = self.list_candidates(job_id).await?;
        Ok(JobSnapshot { job, candidates })
    }
}

#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
    events: JobEvents,
}

impl PgJobStore {
    pub fn new(pool: PgPool, events: JobEvents) -> Self {
        Self { pool, events }
    }

    async fn notify(&self, job_id: Uuid) {
        if !self.events.has_subscribers() {
            return;
        }
        match self.snapshot(job_id).await {
            Ok(snapshot) => self.events.publish(JobEvent::Updated(snapshot)),
            Err(e) => tracing::warn!(job_id = %job_id, error = %e, "Failed to load job snapshot"),
        }
    }

    /// Batches do not survive a restart. Jobs left in `processing` are
    /// marked `failed` so new resumes can be added again.
    pub async fn fail_interrupted(pool: &PgPool) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE jobs SET status = 'failed', updated_at = NOW() WHERE status = 'processing'",
        )
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn ensure_job(&self, id: Uuid) -> Result<()> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM jobs WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        if !exists {
            return Err(job_not_found(id));
        }
        Ok(())
    }
}

fn job_not_found(id: Uuid) -> Error {
    Error::NotFound(format!("Job {} not found", id))
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create_job(&self, title: &str, job_description: &str, status: JobStatus) -> Result<Job> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "INSERT INTO jobs (id, title, job_description, status) VALUES ($1, $2, $3, $4) RETURNING {}",
            JOB_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(title)
        .bind(job_description)
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await?;

        Job::try_from(row)
    }

    async fn get_job(&self, id: Uuid) -> Result<Job> {
        let row = sqlx::query_as::<_, JobRow>(&format!("SELECT {} FROM jobs WHERE id = $1", JOB_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| job_not_found(id))?;
        Job::try_from(row)
    }

    async fn list_jobs(&self) -> Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {} FROM jobs ORDER BY created_at DESC",
            JOB_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Job::try_from).collect()
    }

    async fn update_job(
        &self,
        id: Uuid,
        title: Option<&str>,
        job_description: Option<&str>,
    ) -> Result<Job> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            UPDATE jobs
            SET title = COALESCE($2, title),
                job_description = COALESCE($3, job_description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            JOB_COLUMNS
        ))
        .bind(id)
        .bind(title)
        .bind(job_description)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| job_not_found(id))?;

        let job = Job::try_from(row)?;
        self.notify(id).await;
        Ok(job)
    }

    async fn set_job_status(&self, id: Uuid, status: JobStatus) -> Result<Job> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "UPDATE jobs SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            JOB_COLUMNS
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| job_not_found(id))?;

        let job = Job::try_from(row)?;
        self.notify(id).await;
        Ok(job)
    }

    async fn begin_batch(&self, id: Uuid) -> Result<Job> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            UPDATE jobs SET status = 'processing', updated_at = NOW()
            WHERE id = $1 AND status <> 'processing'
            RETURNING {}
            "#,
            JOB_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            self.ensure_job(id).await?;
            return Err(Error::Conflict(format!(
                "Job {} is still processing a batch",
                id
            )));
        };

        let job = Job::try_from(row)?;
        self.notify(id).await;
        Ok(job)
    }

    async fn delete_job(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(job_not_found(id));
        }
        self.events.publish(JobEvent::Deleted(id));
        Ok(())
    }

    async fn append_candidates(
        &self,
        job_id: Uuid,
        rankings: &[CandidateRanking],
    ) -> Result<Vec<PersistedCandidate>> {
        let created_at = Utc::now();
        let mut tx = self.pool.begin().await?;

        let locked: Option<Uuid> = sqlx::query_scalar("SELECT id FROM jobs WHERE id = $1 FOR UPDATE")
            .bind(job_id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(job_not_found(job_id));
        }

        let mut persisted = Vec::with_capacity(rankings.len());
        for ranking in rankings {
            let candidate = PersistedCandidate::from_ranking(Uuid::new_v4(), job_id, ranking, created_at);
            sqlx::query(
                r#"
                INSERT INTO candidates
                    (id, job_id, candidate_index, candidate_name, candidate_email, suitability_score, summary, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(candidate.id)
            .bind(candidate.job_id)
            .bind(candidate.candidate_index)
            .bind(&candidate.candidate_name)
            .bind(&candidate.candidate_email)
            .bind(candidate.suitability_score)
            .bind(&candidate.summary)
            .bind(candidate.created_at)
            .execute(&mut *tx)
            .await?;
            persisted.push(candidate);
        }

        tx.commit().await?;
        tracing::info!(job_id = %job_id, count = persisted.len(), "Candidates appended");
        self.notify(job_id).await;
        Ok(persisted)
    }

    async fn list_candidates(&self, job_id: Uuid) -> Result<Vec<PersistedCandidate>> {
        let rows = sqlx::query_as::<_, CandidateRow>(&format!(
            "SELECT {} FROM candidates WHERE job_id = $1 ORDER BY created_at, candidate_index",
            CANDIDATE_COLUMNS
        ))
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(PersistedCandidate::from).collect())
    }

    async fn get_candidates(&self, job_id: Uuid, ids: &[Uuid]) -> Result<Vec<PersistedCandidate>> {
        let rows = sqlx::query_as::<_, CandidateRow>(&format!(
            "SELECT {} FROM candidates WHERE job_id = $1 AND id = ANY($2) ORDER BY created_at, candidate_index",
            CANDIDATE_COLUMNS
        ))
        .bind(job_id)
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(PersistedCandidate::from).collect())
    }

    async fn delete_candidate(&self, job_id: Uuid, candidate_id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM candidates WHERE id = $1 AND job_id = $2")
            .bind(candidate_id)
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Candidate {} not found", candidate_id)));
        }
        self.notify(job_id).await;
        Ok(())
    }

    async fn delete_all_candidates(&self, job_id: Uuid) -> Result<u64> {
        self.ensure_job(job_id).await?;
        let result = sqlx::query("DELETE FROM candidates WHERE job_id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        self.notify(job_id).await;
        Ok(result.rows_affected())
    }

    async fn subscribe(&self, job_id: Uuid) -> Result<JobSubscription> {
        let subscription = self.events.subscribe(job_id);
        let initial = self.snapshot(job_id).await?;
        Ok(subscription.with_initial(initial))
    }
}
