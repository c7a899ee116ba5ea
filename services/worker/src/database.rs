use anyhow::Result;
use common::records::{
    ATTENDEE_COLUMNS, EVENT_COLUMNS, JOB_COLUMNS, PassJob, attendee_from_row, event_from_row,
    job_from_row,
};
use passkit::{Attendee, Event};
use sqlx::PgPool;
use uuid::Uuid;

use crate::batch::{BatchReport, IssuedPass, PassLedger};

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Take the oldest queued job, skipping rows another worker holds
    pub async fn claim_next_job(&self) -> Result<Option<PassJob>> {
        let row = sqlx::query(&format!(
            "UPDATE pass_jobs SET status = 'running', updated_at = NOW()
             WHERE id = (
                 SELECT id FROM pass_jobs
                 WHERE status = 'queued'
                 ORDER BY created_at
                 FOR UPDATE SKIP LOCKED
                 LIMIT 1
             )
             RETURNING {}",
            JOB_COLUMNS
        ))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(job_from_row).transpose()?)
    }

    pub async fn finish_job(&self, id: Uuid, report: &BatchReport) -> Result<()> {
        sqlx::query(
            "UPDATE pass_jobs
             SET status = 'done', succeeded = $2, failed = $3, skipped = $4, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(report.succeeded as i32)
        .bind(report.failed as i32)
        .bind(report.skipped as i32)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn requeue_job(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE pass_jobs SET status = 'queued', updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn fail_job(&self, id: Uuid, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE pass_jobs SET status = 'failed', error = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_event(&self, id: &str) -> Result<Option<Event>> {
        let row = sqlx::query(&format!("SELECT {} FROM events WHERE id = $1", EVENT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(event_from_row).transpose()?)
    }

    pub async fn list_attendees(&self, event_id: &str) -> Result<Vec<Attendee>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM attendees WHERE event_id = $1 ORDER BY created_at, id",
            ATTENDEE_COLUMNS
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(attendee_from_row).collect())
    }
}

impl PassLedger for Database {
    async fn record_pass(&self, attendee_id: &str, pass: &IssuedPass) -> Result<()> {
        sqlx::query(
            "UPDATE attendees
             SET pass_url = $2, pass_config_hash = $3, pass_template_url = $4
             WHERE id = $1",
        )
        .bind(attendee_id)
        .bind(&pass.pass_url)
        .bind(&pass.config_hash)
        .bind(&pass.template_url)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_email_sent(&self, attendee_id: &str) -> Result<()> {
        sqlx::query("UPDATE attendees SET email_sent = TRUE WHERE id = $1")
            .bind(attendee_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
