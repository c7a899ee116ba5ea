//! Repositories for database operations

use anyhow::Result;
use common::records::{ATTENDEE_COLUMNS, EVENT_COLUMNS, attendee_from_row, event_from_row};
use passkit::{Attendee, Event, EventStatus, QrGeometry};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{CreateAttendeeRequest, CreateEventRequest, UpdateEventRequest, UpdateLayoutRequest};
use crate::spreadsheet::ImportRow;
use crate::verification::PassDirectory;

pub mod attendance;
pub mod jobs;

/// Record ids never contain `_` or `/`, so they survive the QR payload format
pub fn new_record_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Event repository for database operations
#[derive(Clone)]
pub struct EventRepository {
    pool: PgPool,
}

impl EventRepository {
    /// Create a new event repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new event
    pub async fn create(&self, payload: &CreateEventRequest) -> Result<Event> {
        let qr_position = match &payload.qr_position {
            Some(qr_position) => qr_position.clone(),
            None => QrGeometry::new(50.0, 50.0, 250.0, 0.0)?,
        };
        let name_position = payload
            .name_position
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO events (id, name, date, time, description, status, pass_template_url,
                                qr_position, name_position)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            EVENT_COLUMNS
        ))
        .bind(new_record_id())
        .bind(payload.name.trim())
        .bind(&payload.date)
        .bind(payload.time.as_deref().filter(|t| !t.is_empty()))
        .bind(&payload.description)
        .bind(EventStatus::Active.as_str())
        .bind(payload.pass_template_url.trim())
        .bind(serde_json::to_value(&qr_position)?)
        .bind(name_position)
        .fetch_one(&self.pool)
        .await?;

        Ok(event_from_row(&row)?)
    }

    /// All events, most recent date first
    pub async fn list(&self) -> Result<Vec<Event>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM events ORDER BY date DESC, created_at DESC",
            EVENT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(event_from_row).collect::<Result<_, _>>()?)
    }

    /// Events open for check-in
    pub async fn list_active(&self) -> Result<Vec<Event>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM events WHERE status = $1 ORDER BY date, created_at",
            EVENT_COLUMNS
        ))
        .bind(EventStatus::Active.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(event_from_row).collect::<Result<_, _>>()?)
    }

    /// Find an event by ID
    pub async fn find(&self, id: &str) -> Result<Option<Event>> {
        let row = sqlx::query(&format!("SELECT {} FROM events WHERE id = $1", EVENT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(event_from_row).transpose()?)
    }

    /// Update event details, leaving unset fields as they are
    pub async fn update(&self, id: &str, payload: &UpdateEventRequest) -> Result<Option<Event>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE events
            SET name = COALESCE($2, name),
                date = COALESCE($3, date),
                time = CASE WHEN $4::TEXT IS NULL THEN time WHEN $4 = '' THEN NULL ELSE $4 END,
                description = COALESCE($5, description),
                status = COALESCE($6, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            EVENT_COLUMNS
        ))
        .bind(id)
        .bind(payload.name.as_deref().map(str::trim))
        .bind(payload.date.as_deref())
        .bind(payload.time.as_deref())
        .bind(payload.description.as_deref())
        .bind(payload.status.map(|s| s.as_str()))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(event_from_row).transpose()?)
    }

    /// Replace the template and geometry; existing passes become outdated
    pub async fn update_layout(
        &self,
        id: &str,
        payload: &UpdateLayoutRequest,
    ) -> Result<Option<Event>> {
        let name_position = payload
            .name_position
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        let row = sqlx::query(&format!(
            r#"
            UPDATE events
            SET pass_template_url = $2, qr_position = $3, name_position = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            EVENT_COLUMNS
        ))
        .bind(id)
        .bind(payload.pass_template_url.trim())
        .bind(serde_json::to_value(&payload.qr_position)?)
        .bind(name_position)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(event_from_row).transpose()?)
    }

    /// Delete an event with its attendees, attendance and jobs
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM attendance WHERE event_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Attendee repository for database operations
#[derive(Clone)]
pub struct AttendeeRepository {
    pool: PgPool,
}

impl AttendeeRepository {
    /// Create a new attendee repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Register one attendee with a fresh verification token
    pub async fn create(&self, event_id: &str, payload: &CreateAttendeeRequest) -> Result<Attendee> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO attendees (id, event_id, name, email, branch, year, section, verification_token)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            ATTENDEE_COLUMNS
        ))
        .bind(new_record_id())
        .bind(event_id)
        .bind(payload.name.trim())
        .bind(payload.email.trim())
        .bind(payload.branch.trim())
        .bind(payload.year.trim())
        .bind(payload.section.trim())
        .bind(Uuid::new_v4().to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(attendee_from_row(&row))
    }

    /// Insert sheet rows in one transaction
    pub async fn import(&self, event_id: &str, rows: &[ImportRow]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO attendees (id, event_id, name, email, branch, year, section, verification_token)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(new_record_id())
            .bind(event_id)
            .bind(&row.name)
            .bind(&row.email)
            .bind(&row.branch)
            .bind(&row.year)
            .bind(&row.section)
            .bind(Uuid::new_v4().to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(rows.len())
    }

    /// Attendees of an event in registration order
    pub async fn list(&self, event_id: &str) -> Result<Vec<Attendee>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM attendees WHERE event_id = $1 ORDER BY created_at, id",
            ATTENDEE_COLUMNS
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(attendee_from_row).collect())
    }

    pub async fn find(&self, event_id: &str, id: &str) -> Result<Option<Attendee>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM attendees WHERE event_id = $1 AND id = $2",
            ATTENDEE_COLUMNS
        ))
        .bind(event_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(attendee_from_row))
    }

    pub async fn find_by_token(&self, event_id: &str, token: &str) -> Result<Option<Attendee>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM attendees WHERE event_id = $1 AND verification_token = $2",
            ATTENDEE_COLUMNS
        ))
        .bind(event_id)
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(attendee_from_row))
    }

    /// Remove an attendee; their attendance record stays for the history
    pub async fn delete(&self, event_id: &str, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM attendees WHERE event_id = $1 AND id = $2")
            .bind(event_id)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

impl PassDirectory for AttendeeRepository {
    async fn find_by_token(&self, event_id: &str, token: &str) -> Result<Option<Attendee>> {
        AttendeeRepository::find_by_token(self, event_id, token).await
    }

    async fn find_attendee(&self, event_id: &str, attendee_id: &str) -> Result<Option<Attendee>> {
        self.find(event_id, attendee_id).await
    }

    async fn find_event(&self, event_id: &str) -> Result<Option<Event>> {
        EventRepository::new(self.pool.clone()).find(event_id).await
    }
}
