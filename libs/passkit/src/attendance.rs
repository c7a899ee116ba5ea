//! Check-in / check-out lifecycle per attendee
//!
//! ```text
//! NeverCheckedIn --check-in--> CheckedIn --check-out--> CheckedOut
//!                                  ^                        |
//!                                  +-------check-in---------+
//! ```
//!
//! Both actions are accepted from every state. Checking out someone who
//! never checked in creates a record with only a check-out time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{AttendanceRecord, AttendeeProfile};

/// Where an attendee currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceState {
    NeverCheckedIn,
    CheckedIn,
    CheckedOut,
}

impl AttendanceState {
    /// No record means never checked in; a record is checked in while it has
    /// a check-in time and no check-out time, and checked out otherwise.
    pub fn of(record: Option<&AttendanceRecord>) -> Self {
        match record {
            None => AttendanceState::NeverCheckedIn,
            Some(record) if is_present(record) => AttendanceState::CheckedIn,
            Some(_) => AttendanceState::CheckedOut,
        }
    }
}

/// Operator decision after reviewing a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttendanceAction {
    CheckIn,
    CheckOut,
}

impl AttendanceAction {
    pub const ALL: [AttendanceAction; 2] = [AttendanceAction::CheckIn, AttendanceAction::CheckOut];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceAction::CheckIn => "check-in",
            AttendanceAction::CheckOut => "check-out",
        }
    }

    /// Message shown to the operator once the action is saved
    pub fn greeting(&self, name: &str) -> String {
        match self {
            AttendanceAction::CheckIn => format!("Welcome, {}!", name),
            AttendanceAction::CheckOut => format!("Goodbye, {}!", name),
        }
    }
}

/// Record after `action` is applied at `now`
///
/// Check-in stamps the time, clears any earlier check-out and refreshes the
/// profile snapshot. Check-out only stamps the check-out time; a fresh record
/// takes the current profile.
pub fn apply(
    previous: Option<&AttendanceRecord>,
    action: AttendanceAction,
    now: DateTime<Utc>,
    profile: &AttendeeProfile,
) -> AttendanceRecord {
    match action {
        AttendanceAction::CheckIn => AttendanceRecord {
            check_in_time: Some(now),
            check_out_time: None,
            profile: profile.clone(),
        },
        AttendanceAction::CheckOut => match previous {
            Some(previous) => AttendanceRecord {
                check_out_time: Some(now),
                ..previous.clone()
            },
            None => AttendanceRecord {
                check_in_time: None,
                check_out_time: Some(now),
                profile: profile.clone(),
            },
        },
    }
}

/// Checked in and not yet checked out
pub fn is_present(record: &AttendanceRecord) -> bool {
    record.check_in_time.is_some() && record.check_out_time.is_none()
}

pub fn present_count<'a>(records: impl IntoIterator<Item = &'a AttendanceRecord>) -> usize {
    records.into_iter().filter(|record| is_present(record)).count()
}

/// Attendance column of the export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStatus {
    Absent,
    CheckedIn,
    Completed,
}

impl ReportStatus {
    pub fn of(record: Option<&AttendanceRecord>) -> Self {
        match record {
            Some(AttendanceRecord {
                check_in_time: Some(_),
                check_out_time: Some(_),
                ..
            }) => ReportStatus::Completed,
            Some(AttendanceRecord {
                check_in_time: Some(_),
                ..
            }) => ReportStatus::CheckedIn,
            _ => ReportStatus::Absent,
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReportStatus::Absent => "Absent",
            ReportStatus::CheckedIn => "Checked In",
            ReportStatus::Completed => "Completed",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn profile() -> AttendeeProfile {
        AttendeeProfile {
            name: "Ada".to_string(),
            email: "ada@example.org".to_string(),
            branch: "CSE".to_string(),
            year: "3".to_string(),
            section: "B".to_string(),
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 18, 0, 0).unwrap()
    }

    #[test]
    fn test_state_without_record() {
        assert_eq!(AttendanceState::of(None), AttendanceState::NeverCheckedIn);
    }

    #[test]
    fn test_check_in_from_never() {
        let record = apply(None, AttendanceAction::CheckIn, t0(), &profile());
        assert_eq!(record.check_in_time, Some(t0()));
        assert_eq!(record.check_out_time, None);
        assert_eq!(record.profile, profile());
        assert_eq!(AttendanceState::of(Some(&record)), AttendanceState::CheckedIn);
    }

    #[test]
    fn test_double_check_in_is_safe() {
        let first = apply(None, AttendanceAction::CheckIn, t0(), &profile());
        let later = t0() + Duration::seconds(5);
        let second = apply(Some(&first), AttendanceAction::CheckIn, later, &profile());
        assert_eq!(second.check_in_time, Some(later));
        assert_eq!(second.check_out_time, None);
        assert_eq!(AttendanceState::of(Some(&second)), AttendanceState::CheckedIn);
    }

    #[test]
    fn test_cycle_check_out_and_back_in() {
        let checked_in = apply(None, AttendanceAction::CheckIn, t0(), &profile());
        let out_at = t0() + Duration::hours(1);
        let checked_out = apply(Some(&checked_in), AttendanceAction::CheckOut, out_at, &profile());
        assert_eq!(checked_out.check_in_time, Some(t0()));
        assert_eq!(checked_out.check_out_time, Some(out_at));
        assert_eq!(AttendanceState::of(Some(&checked_out)), AttendanceState::CheckedOut);

        let back_at = t0() + Duration::hours(2);
        let back_in = apply(Some(&checked_out), AttendanceAction::CheckIn, back_at, &profile());
        assert_eq!(back_in.check_in_time, Some(back_at));
        assert_eq!(back_in.check_out_time, None);
    }

    #[test]
    fn test_check_in_refreshes_snapshot() {
        let first = apply(None, AttendanceAction::CheckIn, t0(), &profile());
        let mut edited = profile();
        edited.section = "C".to_string();
        let second = apply(Some(&first), AttendanceAction::CheckIn, t0(), &edited);
        assert_eq!(second.profile.section, "C");
    }

    #[test]
    fn test_check_out_keeps_snapshot() {
        let first = apply(None, AttendanceAction::CheckIn, t0(), &profile());
        let mut edited = profile();
        edited.name = "Ada L.".to_string();
        let out = apply(Some(&first), AttendanceAction::CheckOut, t0(), &edited);
        assert_eq!(out.profile.name, "Ada");
    }

    #[test]
    fn test_check_out_without_check_in_is_allowed() {
        let record = apply(None, AttendanceAction::CheckOut, t0(), &profile());
        assert_eq!(record.check_in_time, None);
        assert_eq!(record.check_out_time, Some(t0()));
        assert_eq!(AttendanceState::of(Some(&record)), AttendanceState::CheckedOut);
        assert_eq!(ReportStatus::of(Some(&record)), ReportStatus::Absent);
        assert!(!is_present(&record));
    }

    #[test]
    fn test_present_count() {
        let a = apply(None, AttendanceAction::CheckIn, t0(), &profile());
        let b = apply(Some(&a), AttendanceAction::CheckOut, t0(), &profile());
        let c = apply(None, AttendanceAction::CheckOut, t0(), &profile());
        let d = apply(None, AttendanceAction::CheckIn, t0(), &profile());
        assert_eq!(present_count([&a, &b, &c, &d]), 2);
    }

    #[test]
    fn test_report_status_labels() {
        let checked_in = apply(None, AttendanceAction::CheckIn, t0(), &profile());
        let completed = apply(Some(&checked_in), AttendanceAction::CheckOut, t0(), &profile());
        assert_eq!(ReportStatus::of(None).to_string(), "Absent");
        assert_eq!(ReportStatus::of(Some(&checked_in)).to_string(), "Checked In");
        assert_eq!(ReportStatus::of(Some(&completed)).to_string(), "Completed");
    }

    #[test]
    fn test_action_wire_names() {
        let action: AttendanceAction = serde_json::from_str(r#""check-out""#).unwrap();
        assert_eq!(action, AttendanceAction::CheckOut);
        assert_eq!(AttendanceAction::CheckIn.greeting("Ada"), "Welcome, Ada!");
    }
}
