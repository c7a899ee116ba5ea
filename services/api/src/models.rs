//! API models for request and response payloads

use passkit::{
    AttendanceAction, AttendanceRecord, AttendanceState, Attendee, AttendeeProfile, Event,
    NameGeometry, QrGeometry, Staleness, staleness,
};
use serde::{Deserialize, Serialize};

/// Request for event creation
#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub name: String,
    pub date: String,
    pub time: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub pass_template_url: String,
    /// Defaults to a 250px code at (50, 50)
    pub qr_position: Option<QrGeometry>,
    pub name_position: Option<NameGeometry>,
}

/// Partial update of event details; layout is edited separately
#[derive(Debug, Default, Deserialize)]
pub struct UpdateEventRequest {
    pub name: Option<String>,
    pub date: Option<String>,
    /// Empty string clears the time
    pub time: Option<String>,
    pub description: Option<String>,
    pub status: Option<passkit::EventStatus>,
}

/// Full replacement of the pass layout
#[derive(Debug, Deserialize)]
pub struct UpdateLayoutRequest {
    pub pass_template_url: String,
    pub qr_position: QrGeometry,
    pub name_position: Option<NameGeometry>,
}

/// Request for adding a single attendee
#[derive(Debug, Deserialize)]
pub struct CreateAttendeeRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub section: String,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub imported: usize,
    /// Rows without a name or email, or with an invalid email
    pub skipped: usize,
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub payload: String,
    /// Identifies the scanning device for duplicate suppression
    #[serde(default)]
    pub station: String,
}

/// Attendee as shown at a check-in station; pass and token fields stay server-side
#[derive(Debug, Serialize)]
pub struct StationAttendee {
    pub id: String,
    pub event_id: String,
    #[serde(flatten)]
    pub profile: AttendeeProfile,
}

impl From<&Attendee> for StationAttendee {
    fn from(attendee: &Attendee) -> Self {
        Self {
            id: attendee.id.clone(),
            event_id: attendee.event_id.clone(),
            profile: attendee.profile(),
        }
    }
}

/// Response to a station scan
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScanResponse {
    Review {
        attendee: StationAttendee,
        record: Option<AttendanceRecord>,
        state: AttendanceState,
        actions: Vec<AttendanceAction>,
    },
    /// Same payload seen at this station moments ago
    Ignored,
}

#[derive(Debug, Deserialize)]
pub struct AttendanceActionRequest {
    pub action: AttendanceAction,
}

/// Attendee row of the event dashboard
#[derive(Debug, Serialize)]
pub struct AttendeeWithAttendance {
    #[serde(flatten)]
    pub attendee: Attendee,
    pub attendance: Option<AttendanceRecord>,
    pub state: AttendanceState,
}

/// Pass work a batch would do right now
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct PassPreview {
    pub total: usize,
    pub up_to_date: usize,
    pub missing: usize,
    pub outdated: usize,
    pub legacy: usize,
    /// Attendees whose pass would be rendered by a generate job
    pub pending: usize,
    /// Attendees with a pass who have not been emailed
    pub pending_email: usize,
}

impl PassPreview {
    pub fn of(event: &Event, attendees: &[Attendee]) -> Self {
        let mut preview = PassPreview {
            total: attendees.len(),
            ..Default::default()
        };

        for attendee in attendees {
            match staleness(event, attendee) {
                Staleness::Current => preview.up_to_date += 1,
                Staleness::Missing => preview.missing += 1,
                Staleness::Outdated => preview.outdated += 1,
                Staleness::Legacy => preview.legacy += 1,
            }
            if attendee.has_pass() && !attendee.email_sent {
                preview.pending_email += 1;
            }
        }

        preview.pending = preview.missing + preview.outdated + preview.legacy;
        preview
    }
}

#[derive(Debug, Deserialize)]
pub struct DeskScanRequest {
    pub code: String,
}
