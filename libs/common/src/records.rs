//! Row mapping between PostgreSQL and the `passkit` domain types

use chrono::{DateTime, Utc};
use passkit::{
    AttendanceRecord, Attendee, AttendeeProfile, Event, EventStatus, NameGeometry, QrGeometry,
};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::postgres::PgRow;
use std::fmt;
use uuid::Uuid;

use crate::error::{DatabaseError, DatabaseResult};

pub const EVENT_COLUMNS: &str = "id, name, date, time, description, status, pass_template_url, \
     qr_position, name_position, created_at, updated_at";

pub const ATTENDEE_COLUMNS: &str = "id, event_id, name, email, branch, year, section, pass_url, \
     pass_config_hash, pass_template_url, email_sent, verification_token, created_at";

pub const ATTENDANCE_COLUMNS: &str =
    "attendee_id, check_in_time, check_out_time, name, email, branch, year, section";

pub const JOB_COLUMNS: &str =
    "id, event_id, kind, status, succeeded, failed, skipped, error, created_at, updated_at";

pub fn event_from_row(row: &PgRow) -> DatabaseResult<Event> {
    let id: String = row.get("id");
    let corrupt = |reason: String| DatabaseError::Corrupt {
        table: "events",
        id: id.clone(),
        reason,
    };

    let status: String = row.get("status");
    let status = EventStatus::parse(&status).ok_or_else(|| corrupt(format!("status {:?}", status)))?;

    let qr_position: serde_json::Value = row.get("qr_position");
    let qr_position: QrGeometry = serde_json::from_value(qr_position)
        .map_err(|e| corrupt(format!("qr_position: {}", e)))?;

    let name_position: Option<serde_json::Value> = row.get("name_position");
    let name_position: Option<NameGeometry> = name_position
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| corrupt(format!("name_position: {}", e)))?;

    Ok(Event {
        id: id.clone(),
        name: row.get("name"),
        date: row.get("date"),
        time: row.get("time"),
        description: row.get("description"),
        status,
        pass_template_url: row.get("pass_template_url"),
        qr_position,
        name_position,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

pub fn attendee_from_row(row: &PgRow) -> Attendee {
    Attendee {
        id: row.get("id"),
        event_id: row.get("event_id"),
        name: row.get("name"),
        email: row.get("email"),
        branch: row.get("branch"),
        year: row.get("year"),
        section: row.get("section"),
        pass_url: row.get("pass_url"),
        pass_config_hash: row.get("pass_config_hash"),
        pass_template_url: row.get("pass_template_url"),
        email_sent: row.get("email_sent"),
        verification_token: row.get("verification_token"),
        created_at: row.get("created_at"),
    }
}

pub fn attendance_from_row(row: &PgRow) -> AttendanceRecord {
    AttendanceRecord {
        check_in_time: row.get("check_in_time"),
        check_out_time: row.get("check_out_time"),
        profile: AttendeeProfile {
            name: row.get("name"),
            email: row.get("email"),
            branch: row.get("branch"),
            year: row.get("year"),
            section: row.get("section"),
        },
    }
}

/// Kind of background pass job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Generate,
    Email,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Generate => "generate",
            JobKind::Email => "email",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "generate" => Some(JobKind::Generate),
            "email" => Some(JobKind::Email),
            _ => None,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "queued" => Some(JobStatus::Queued),
            "running" => Some(JobStatus::Running),
            "done" => Some(JobStatus::Done),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

/// Queued pass generation or email run for one event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassJob {
    pub id: Uuid,
    pub event_id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub succeeded: i32,
    pub failed: i32,
    pub skipped: i32,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub fn job_from_row(row: &PgRow) -> DatabaseResult<PassJob> {
    let id: Uuid = row.get("id");
    let kind: String = row.get("kind");
    let status: String = row.get("status");
    let corrupt = |reason: String| DatabaseError::Corrupt {
        table: "pass_jobs",
        id: id.to_string(),
        reason,
    };

    Ok(PassJob {
        id,
        event_id: row.get("event_id"),
        kind: JobKind::parse(&kind).ok_or_else(|| corrupt(format!("kind {:?}", kind)))?,
        status: JobStatus::parse(&status).ok_or_else(|| corrupt(format!("status {:?}", status)))?,
        succeeded: row.get("succeeded"),
        failed: row.get("failed"),
        skipped: row.get("skipped"),
        error: row.get("error"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
