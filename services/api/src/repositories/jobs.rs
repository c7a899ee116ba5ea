//! Pass job queue, consumed by the worker service

use anyhow::Result;
use common::records::{JOB_COLUMNS, JobKind, JobStatus, PassJob, job_from_row};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Queue a job unless one of the same kind is already queued or running
    ///
    /// Returns the pending job in that case, and `false` as the second value.
    pub async fn enqueue(&self, event_id: &str, kind: JobKind) -> Result<(PassJob, bool)> {
        let mut tx = self.pool.begin().await?;

        // Serialize enqueues per event
        sqlx::query("SELECT id FROM events WHERE id = $1 FOR UPDATE")
            .bind(event_id)
            .execute(&mut *tx)
            .await?;

        let pending = sqlx::query(&format!(
            r#"
            SELECT {} FROM pass_jobs
            WHERE event_id = $1 AND kind = $2 AND status IN ($3, $4)
            ORDER BY created_at
            LIMIT 1
            "#,
            JOB_COLUMNS
        ))
        .bind(event_id)
        .bind(kind.as_str())
        .bind(JobStatus::Queued.as_str())
        .bind(JobStatus::Running.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(row) = pending {
            tx.commit().await?;
            return Ok((job_from_row(&row)?, false));
        }

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO pass_jobs (id, event_id, kind, status)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            JOB_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(event_id)
        .bind(kind.as_str())
        .bind(JobStatus::Queued.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((job_from_row(&row)?, true))
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<PassJob>> {
        let row = sqlx::query(&format!("SELECT {} FROM pass_jobs WHERE id = $1", JOB_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(job_from_row).transpose()?)
    }
}
