//! CSV attendee import and attendance export

use chrono::{DateTime, Utc};
use passkit::{AttendanceRecord, Attendee, ReportStatus};
use serde::Serialize;
use std::collections::HashMap;
use std::io::Read;
use thiserror::Error;

pub const REPORT_HEADERS: [&str; 8] = [
    "Name", "Email", "Branch", "Year", "Section", "Check In", "Check Out", "Status",
];

#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing required column: {0}")]
    MissingColumn(&'static str),

    #[error("Failed to finish CSV output: {0}")]
    Output(String),
}

/// One usable row of an attendee sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportRow {
    pub name: String,
    pub email: String,
    pub branch: String,
    pub year: String,
    pub section: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedSheet {
    pub rows: Vec<ImportRow>,
    /// Rows without a name or an email
    pub skipped: usize,
}

struct Columns {
    name: usize,
    email: usize,
    branch: Option<usize>,
    year: Option<usize>,
    section: Option<usize>,
}

impl Columns {
    fn locate(headers: &csv::StringRecord) -> Result<Self, SpreadsheetError> {
        let find = |wanted: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(wanted))
        };

        Ok(Self {
            name: find("Name").ok_or(SpreadsheetError::MissingColumn("Name"))?,
            email: find("Email").ok_or(SpreadsheetError::MissingColumn("Email"))?,
            branch: find("Branch"),
            year: find("Year"),
            section: find("Section"),
        })
    }
}

/// Read `Name, Email, Branch, Year, Section` columns in any order
pub fn parse_attendees(input: impl Read) -> Result<ParsedSheet, SpreadsheetError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let columns = Columns::locate(reader.headers()?)?;
    let mut sheet = ParsedSheet::default();

    for record in reader.records() {
        let record = record?;
        let cell = |index: Option<usize>| {
            index
                .and_then(|i| record.get(i))
                .unwrap_or_default()
                .to_string()
        };

        let name = cell(Some(columns.name));
        let email = cell(Some(columns.email));
        if name.is_empty() || email.is_empty() {
            sheet.skipped += 1;
            continue;
        }

        sheet.rows.push(ImportRow {
            name,
            email,
            branch: cell(columns.branch),
            year: cell(columns.year),
            section: cell(columns.section),
        });
    }

    Ok(sheet)
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    match time {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "-".to_string(),
    }
}

/// Attendance report for the event's current attendees
///
/// `records` is keyed by attendee id. Records whose attendee was deleted are
/// not listed.
pub fn write_report(
    attendees: &[Attendee],
    records: &HashMap<String, AttendanceRecord>,
) -> Result<Vec<u8>, SpreadsheetError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(REPORT_HEADERS)?;

    for attendee in attendees {
        let record = records.get(&attendee.id);
        let check_in = format_time(record.and_then(|r| r.check_in_time));
        let check_out = format_time(record.and_then(|r| r.check_out_time));
        let status = ReportStatus::of(record).to_string();

        writer.write_record([
            attendee.name.as_str(),
            attendee.email.as_str(),
            attendee.branch.as_str(),
            attendee.year.as_str(),
            attendee.section.as_str(),
            check_in.as_str(),
            check_out.as_str(),
            status.as_str(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| SpreadsheetError::Output(e.to_string()))
}

/// `{event name}_Attendance_Report.csv`, safe for a Content-Disposition header
pub fn report_file_name(event_name: &str) -> String {
    let name: String = event_name
        .chars()
        .map(|c| {
            if c.is_control() || matches!(c, '"' | '\\' | '/') {
                '_'
            } else {
                c
            }
        })
        .collect();
    format!("{}_Attendance_Report.csv", name.trim())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use passkit::AttendeeProfile;

    use super::*;

    #[test]
    fn test_parse_skips_rows_without_name_or_email() {
        let csv = "Name,Email,Branch,Year,Section\n\
                   Asha,asha@example.org,CSE,3,A\n\
                   ,nobody@example.org,ECE,2,B\n\
                   Ravi,,ME,1,C\n\
                   Meera,meera@example.org,,,\n";

        let sheet = parse_attendees(csv.as_bytes()).unwrap();
        assert_eq!(sheet.skipped, 2);
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0].branch, "CSE");
        assert_eq!(sheet.rows[1].name, "Meera");
        assert_eq!(sheet.rows[1].section, "");
    }

    #[test]
    fn test_parse_headers_any_case_and_order() {
        let csv = "email , SECTION, name\n  ravi@example.org , D , Ravi \n";
        let sheet = parse_attendees(csv.as_bytes()).unwrap();
        assert_eq!(
            sheet.rows,
            vec![ImportRow {
                name: "Ravi".to_string(),
                email: "ravi@example.org".to_string(),
                branch: String::new(),
                year: String::new(),
                section: "D".to_string(),
            }]
        );
    }

    #[test]
    fn test_parse_requires_name_and_email_columns() {
        let err = parse_attendees("Name,Branch\nAsha,CSE\n".as_bytes()).unwrap_err();
        assert!(matches!(err, SpreadsheetError::MissingColumn("Email")));
    }

    #[test]
    fn test_parse_short_rows() {
        let sheet = parse_attendees("Name,Email,Branch\nAsha,asha@example.org\n".as_bytes()).unwrap();
        assert_eq!(sheet.rows.len(), 1);
        assert_eq!(sheet.rows[0].branch, "");
    }

    fn attendee(id: &str, name: &str) -> Attendee {
        Attendee {
            id: id.to_string(),
            event_id: "e1".to_string(),
            name: name.to_string(),
            email: format!("{}@example.org", id),
            branch: "CSE".to_string(),
            year: "3".to_string(),
            section: "A".to_string(),
            pass_url: String::new(),
            pass_config_hash: None,
            pass_template_url: None,
            email_sent: false,
            verification_token: id.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_report_statuses_and_orphans() {
        let at = |h| Some(Utc.with_ymd_and_hms(2025, 3, 14, h, 30, 0).unwrap());
        let record = |check_in_time, check_out_time| AttendanceRecord {
            check_in_time,
            check_out_time,
            profile: AttendeeProfile::default(),
        };

        let attendees = vec![
            attendee("u1", "Asha"),
            attendee("u2", "Ravi"),
            attendee("u3", "Meera"),
            attendee("u4", "Kiran"),
        ];
        let mut records = HashMap::new();
        records.insert("u1".to_string(), record(at(9), at(17)));
        records.insert("u2".to_string(), record(at(10), None));
        records.insert("u4".to_string(), record(None, at(12)));
        records.insert("deleted".to_string(), record(at(9), None));

        let csv = String::from_utf8(write_report(&attendees, &records).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "Name,Email,Branch,Year,Section,Check In,Check Out,Status");
        assert_eq!(
            lines[1],
            "Asha,u1@example.org,CSE,3,A,2025-03-14 09:30:00,2025-03-14 17:30:00,Completed"
        );
        assert_eq!(
            lines[2],
            "Ravi,u2@example.org,CSE,3,A,2025-03-14 10:30:00,-,Checked In"
        );
        assert_eq!(lines[3], "Meera,u3@example.org,CSE,3,A,-,-,Absent");
        assert_eq!(lines[4], "Kiran,u4@example.org,CSE,3,A,-,2025-03-14 12:30:00,Absent");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_report_file_name() {
        assert_eq!(report_file_name("Tech Fest"), "Tech Fest_Attendance_Report.csv");
        assert_eq!(
            report_file_name("Say \"hi\"/2025"),
            "Say _hi__2025_Attendance_Report.csv"
        );
    }
}
