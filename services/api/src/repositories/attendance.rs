//! Attendance repository for database operations

use anyhow::Result;
use common::records::{ATTENDANCE_COLUMNS, ATTENDEE_COLUMNS, attendance_from_row, attendee_from_row};
use chrono::{DateTime, Utc};
use passkit::{AttendanceAction, AttendanceRecord, Attendee, AttendeeProfile, attendance};
use sqlx::{PgPool, Row};
use std::collections::HashMap;

use crate::scanner::CheckInStore;

#[derive(Clone)]
pub struct AttendanceRepository {
    pool: PgPool,
}

impl AttendanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, event_id: &str, attendee_id: &str) -> Result<Option<AttendanceRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM attendance WHERE event_id = $1 AND attendee_id = $2",
            ATTENDANCE_COLUMNS
        ))
        .bind(event_id)
        .bind(attendee_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(attendance_from_row))
    }

    /// Every record of an event keyed by attendee id, including records of
    /// deleted attendees
    pub async fn list(&self, event_id: &str) -> Result<HashMap<String, AttendanceRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM attendance WHERE event_id = $1",
            ATTENDANCE_COLUMNS
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| (row.get("attendee_id"), attendance_from_row(row)))
            .collect())
    }

    /// Check-in replaces the whole record. Check-out only stamps
    /// `check_out_time`, leaving any check-in written meanwhile untouched.
    /// Either way the stored row after the write is returned.
    pub async fn record(
        &self,
        event_id: &str,
        attendee_id: &str,
        action: AttendanceAction,
        at: DateTime<Utc>,
        profile: &AttendeeProfile,
    ) -> Result<AttendanceRecord> {
        // Values for an attendee with no record yet
        let fresh = attendance::apply(None, action, at, profile);
        let on_conflict = match action {
            AttendanceAction::CheckIn => {
                "check_in_time = EXCLUDED.check_in_time,
                 check_out_time = EXCLUDED.check_out_time,
                 name = EXCLUDED.name,
                 email = EXCLUDED.email,
                 branch = EXCLUDED.branch,
                 year = EXCLUDED.year,
                 section = EXCLUDED.section"
            }
            AttendanceAction::CheckOut => "check_out_time = EXCLUDED.check_out_time",
        };

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO attendance (event_id, attendee_id, check_in_time, check_out_time,
                                    name, email, branch, year, section)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (event_id, attendee_id) DO UPDATE
            SET {}, updated_at = NOW()
            RETURNING {}
            "#,
            on_conflict, ATTENDANCE_COLUMNS
        ))
        .bind(event_id)
        .bind(attendee_id)
        .bind(fresh.check_in_time)
        .bind(fresh.check_out_time)
        .bind(&fresh.profile.name)
        .bind(&fresh.profile.email)
        .bind(&fresh.profile.branch)
        .bind(&fresh.profile.year)
        .bind(&fresh.profile.section)
        .fetch_one(&self.pool)
        .await?;

        Ok(attendance_from_row(&row))
    }

    /// Checked in and not yet checked out
    pub async fn present_count(&self, event_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM attendance
            WHERE event_id = $1 AND check_in_time IS NOT NULL AND check_out_time IS NULL
            "#,
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

impl CheckInStore for AttendanceRepository {
    async fn find_attendee(&self, event_id: &str, attendee_id: &str) -> Result<Option<Attendee>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM attendees WHERE event_id = $1 AND id = $2",
            ATTENDEE_COLUMNS
        ))
        .bind(event_id)
        .bind(attendee_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(attendee_from_row))
    }

    async fn find_record(
        &self,
        event_id: &str,
        attendee_id: &str,
    ) -> Result<Option<AttendanceRecord>> {
        self.find(event_id, attendee_id).await
    }

    async fn record_action(
        &self,
        event_id: &str,
        attendee_id: &str,
        action: AttendanceAction,
        at: DateTime<Utc>,
        profile: &AttendeeProfile,
    ) -> Result<AttendanceRecord> {
        self.record(event_id, attendee_id, action, at, profile).await
    }
}
