//! Events, attendees and attendance records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geometry::{NameGeometry, QrGeometry};

/// Lifecycle status of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Active,
    Completed,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Active => "active",
            EventStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(EventStatus::Active),
            "completed" => Some(EventStatus::Completed),
            _ => None,
        }
    }
}

/// Event with its pass layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub name: String,
    /// Calendar date as entered by the organizer (`YYYY-MM-DD`)
    pub date: String,
    /// Optional start time (`HH:MM`)
    pub time: Option<String>,
    pub description: String,
    pub status: EventStatus,
    /// Reference to the stored template image; empty until uploaded
    pub pass_template_url: String,
    pub qr_position: QrGeometry,
    pub name_position: Option<NameGeometry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Passes can only be generated once a template is set
    pub fn has_template(&self) -> bool {
        !self.pass_template_url.trim().is_empty()
    }
}

/// Profile fields copied into attendance records at check-in
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendeeProfile {
    pub name: String,
    pub email: String,
    pub branch: String,
    pub year: String,
    pub section: String,
}

/// Registered attendee of one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attendee {
    pub id: String,
    pub event_id: String,
    pub name: String,
    pub email: String,
    pub branch: String,
    pub year: String,
    pub section: String,
    /// Stored pass image, empty until generated
    pub pass_url: String,
    /// Fingerprint of the layout `pass_url` was rendered with
    pub pass_config_hash: Option<String>,
    /// Template the pass was rendered from; kept for older records only
    pub pass_template_url: Option<String>,
    pub email_sent: bool,
    pub verification_token: String,
    pub created_at: DateTime<Utc>,
}

impl Attendee {
    pub fn has_pass(&self) -> bool {
        !self.pass_url.is_empty()
    }

    pub fn profile(&self) -> AttendeeProfile {
        AttendeeProfile {
            name: self.name.clone(),
            email: self.email.clone(),
            branch: self.branch.clone(),
            year: self.year.clone(),
            section: self.section.clone(),
        }
    }
}

/// Attendance of one attendee at one event
///
/// Stored separately from the attendee; a missing record means the attendee
/// never checked in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub check_in_time: Option<DateTime<Utc>>,
    pub check_out_time: Option<DateTime<Utc>>,
    pub profile: AttendeeProfile,
}
