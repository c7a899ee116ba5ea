//! Public pass verification
//!
//! Attendees prove ownership of a pass with the token from their email plus
//! their email address. The verification desk can also scan a pass and see
//! whose it is.

use anyhow::Result;
use chrono::NaiveDate;
use passkit::{Attendee, Event, ScanPayload, payload};
use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("Missing required information.")]
    MissingFields,

    #[error("Invalid token. This pass may differ or does not exist.")]
    TokenMismatch,

    #[error("Email does not match the record for this token.")]
    EmailMismatch,

    #[error("Pass has not been generated yet. Please contact the organizer.")]
    PassNotGenerated,

    #[error("Invalid Pass: User not found.")]
    UnknownPass,

    #[error("Invalid QR Code Format")]
    InvalidCode,

    #[error("Verification store error: {0}")]
    Store(String),
}

impl VerifyError {
    pub fn code(&self) -> &'static str {
        match self {
            VerifyError::MissingFields => "MISSING_FIELDS",
            VerifyError::TokenMismatch => "TOKEN_MISMATCH",
            VerifyError::EmailMismatch => "EMAIL_MISMATCH",
            VerifyError::PassNotGenerated => "PASS_NOT_GENERATED",
            VerifyError::UnknownPass => "UNKNOWN_PASS",
            VerifyError::InvalidCode => "INVALID_FORMAT",
            VerifyError::Store(_) => "STORE",
        }
    }
}

impl From<anyhow::Error> for VerifyError {
    fn from(e: anyhow::Error) -> Self {
        VerifyError::Store(e.to_string())
    }
}

/// Lookups needed to verify passes
pub trait PassDirectory: Send + Sync {
    fn find_by_token(
        &self,
        event_id: &str,
        token: &str,
    ) -> impl Future<Output = Result<Option<Attendee>>> + Send;

    fn find_attendee(
        &self,
        event_id: &str,
        attendee_id: &str,
    ) -> impl Future<Output = Result<Option<Attendee>>> + Send;

    fn find_event(&self, event_id: &str) -> impl Future<Output = Result<Option<Event>>> + Send;
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    #[serde(default)]
    pub token: String,
    #[serde(default, alias = "event_id")]
    pub event_id: String,
    #[serde(default)]
    pub email: String,
}

/// Pass shown to an attendee who proved ownership
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedPass {
    pub name: String,
    pub event_name: String,
    pub pass_url: String,
    /// Suggested file name for downloading the pass image
    pub download_name: String,
}

/// Whose pass the desk just scanned
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassHolder {
    pub name: String,
    pub email: String,
    pub event_name: String,
    /// `dd-mm-yyyy`, or the stored date when it does not parse
    pub event_date: String,
}

/// Outcome of a desk scan
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DeskScan {
    Holder(PassHolder),
    /// Older email link; the desk continues with token verification
    #[serde(rename_all = "camelCase")]
    Redirect { token: String, event_id: String },
}

#[derive(Clone)]
pub struct Verifier<D> {
    directory: D,
}

impl<D: PassDirectory> Verifier<D> {
    pub fn new(directory: D) -> Self {
        Self { directory }
    }

    pub async fn verify(&self, request: &VerifyRequest) -> Result<VerifiedPass, VerifyError> {
        let token = request.token.trim();
        let event_id = request.event_id.trim();
        let email = request.email.trim();
        if token.is_empty() || event_id.is_empty() || email.is_empty() {
            return Err(VerifyError::MissingFields);
        }

        let attendee = self
            .directory
            .find_by_token(event_id, token)
            .await?
            .ok_or(VerifyError::TokenMismatch)?;

        if attendee.email.trim().to_lowercase() != email.to_lowercase() {
            return Err(VerifyError::EmailMismatch);
        }

        if !attendee.has_pass() {
            return Err(VerifyError::PassNotGenerated);
        }

        info!("Verified pass for attendee {} at event {}", attendee.id, event_id);

        let event_name = self
            .directory
            .find_event(event_id)
            .await?
            .map(|event| event.name)
            .unwrap_or_default();
        let name = if attendee.name.trim().is_empty() {
            "User".to_string()
        } else {
            attendee.name
        };

        Ok(VerifiedPass {
            download_name: download_name(&event_name, &name),
            name,
            event_name,
            pass_url: attendee.pass_url,
        })
    }

    pub async fn verify_scan(&self, code: &str) -> Result<DeskScan, VerifyError> {
        let (event_id, attendee_id) = match payload::decode(code) {
            Ok(ScanPayload::Pass {
                event_id,
                attendee_id,
            }) => (event_id, attendee_id),
            Ok(ScanPayload::LegacyLink { token, event_id }) => {
                return Ok(DeskScan::Redirect { token, event_id });
            }
            Err(_) => return Err(VerifyError::InvalidCode),
        };

        let attendee = self
            .directory
            .find_attendee(&event_id, &attendee_id)
            .await?
            .ok_or(VerifyError::UnknownPass)?;

        let (event_name, event_date) = match self.directory.find_event(&event_id).await? {
            Some(event) => (event.name, display_date(&event.date)),
            None => (String::new(), String::new()),
        };

        Ok(DeskScan::Holder(PassHolder {
            name: attendee.name,
            email: attendee.email,
            event_name,
            event_date,
        }))
    }
}

fn slug(value: &str, fallback: &str) -> String {
    let mut out = String::new();
    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let out = out.trim_matches('-');
    if out.is_empty() {
        fallback.to_string()
    } else {
        out.to_string()
    }
}

/// `Event-Pass-{event}-{name}.png` with only ASCII letters, digits and dashes
pub fn download_name(event_name: &str, attendee_name: &str) -> String {
    format!(
        "Event-Pass-{}-{}.png",
        slug(event_name, "Event"),
        slug(attendee_name, "User")
    )
}

/// `YYYY-MM-DD` as `dd-mm-yyyy`
pub fn display_date(date: &str) -> String {
    match NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d") {
        Ok(parsed) => parsed.format("%d-%m-%Y").to_string(),
        Err(_) => date.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use passkit::{EventStatus, QrGeometry};
    use std::collections::HashMap;

    use super::*;

    #[derive(Default)]
    struct MemoryDirectory {
        attendees: Vec<Attendee>,
        events: HashMap<String, Event>,
    }

    impl PassDirectory for MemoryDirectory {
        async fn find_by_token(&self, event_id: &str, token: &str) -> Result<Option<Attendee>> {
            Ok(self
                .attendees
                .iter()
                .find(|a| a.event_id == event_id && a.verification_token == token)
                .cloned())
        }

        async fn find_attendee(&self, event_id: &str, attendee_id: &str) -> Result<Option<Attendee>> {
            Ok(self
                .attendees
                .iter()
                .find(|a| a.event_id == event_id && a.id == attendee_id)
                .cloned())
        }

        async fn find_event(&self, event_id: &str) -> Result<Option<Event>> {
            Ok(self.events.get(event_id).cloned())
        }
    }

    fn attendee(id: &str, email: &str, pass_url: &str) -> Attendee {
        Attendee {
            id: id.to_string(),
            event_id: "e1".to_string(),
            name: "Ravi Kumar".to_string(),
            email: email.to_string(),
            branch: String::new(),
            year: String::new(),
            section: String::new(),
            pass_url: pass_url.to_string(),
            pass_config_hash: None,
            pass_template_url: None,
            email_sent: false,
            verification_token: format!("tok-{}", id),
            created_at: Utc::now(),
        }
    }

    fn event(date: &str) -> Event {
        Event {
            id: "e1".to_string(),
            name: "Tech Fest".to_string(),
            date: date.to_string(),
            time: None,
            description: String::new(),
            status: EventStatus::Active,
            pass_template_url: String::new(),
            qr_position: QrGeometry::new(0.0, 0.0, 100.0, 0.0).unwrap(),
            name_position: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn verifier() -> Verifier<MemoryDirectory> {
        let mut directory = MemoryDirectory::default();
        directory.attendees.push(attendee("u1", "Ravi@Example.org", "https://cdn/p/e1_u1.png"));
        directory.attendees.push(attendee("u2", "nopass@example.org", ""));
        directory.events.insert("e1".to_string(), event("2025-03-14"));
        Verifier::new(directory)
    }

    fn request(token: &str, event_id: &str, email: &str) -> VerifyRequest {
        VerifyRequest {
            token: token.to_string(),
            event_id: event_id.to_string(),
            email: email.to_string(),
        }
    }

    #[tokio::test]
    async fn test_verify_success_ignores_email_case() {
        let pass = verifier()
            .verify(&request("tok-u1", "e1", " ravi@example.ORG "))
            .await
            .unwrap();
        assert_eq!(pass.name, "Ravi Kumar");
        assert_eq!(pass.event_name, "Tech Fest");
        assert_eq!(pass.pass_url, "https://cdn/p/e1_u1.png");
        assert_eq!(pass.download_name, "Event-Pass-Tech-Fest-Ravi-Kumar.png");
    }

    #[tokio::test]
    async fn test_verify_failures() {
        let verifier = verifier();
        let cases = [
            (request("", "e1", "a@b.org"), "Missing required information."),
            (
                request("tok-zz", "e1", "ravi@example.org"),
                "Invalid token. This pass may differ or does not exist.",
            ),
            (
                request("tok-u1", "e2", "ravi@example.org"),
                "Invalid token. This pass may differ or does not exist.",
            ),
            (
                request("tok-u1", "e1", "someone@example.org"),
                "Email does not match the record for this token.",
            ),
            (
                request("tok-u2", "e1", "nopass@example.org"),
                "Pass has not been generated yet. Please contact the organizer.",
            ),
        ];

        for (request, message) in cases {
            let err = verifier.verify(&request).await.unwrap_err();
            assert_eq!(err.to_string(), message);
        }
    }

    #[tokio::test]
    async fn test_verify_scan_pass() {
        let scan = verifier().verify_scan("e1_u1").await.unwrap();
        assert_eq!(
            scan,
            DeskScan::Holder(PassHolder {
                name: "Ravi Kumar".to_string(),
                email: "Ravi@Example.org".to_string(),
                event_name: "Tech Fest".to_string(),
                event_date: "14-03-2025".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_verify_scan_legacy_link_redirects() {
        let scan = verifier()
            .verify_scan("https://passes.example.org/verify-pass?token=tok-u1&eventId=e1")
            .await
            .unwrap();
        assert_eq!(
            scan,
            DeskScan::Redirect {
                token: "tok-u1".to_string(),
                event_id: "e1".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_verify_scan_failures() {
        let verifier = verifier();
        assert_eq!(
            verifier.verify_scan("e1_ghost").await.unwrap_err().to_string(),
            "Invalid Pass: User not found."
        );
        assert_eq!(
            verifier.verify_scan("not a pass").await.unwrap_err().to_string(),
            "Invalid QR Code Format"
        );
    }

    #[test]
    fn test_download_name() {
        assert_eq!(
            download_name("  Spring Fest '25 ", "Nguyễn A."),
            "Event-Pass-Spring-Fest-25-Nguy-n-A.png"
        );
        assert_eq!(download_name("", "***"), "Event-Pass-Event-User.png");
    }

    #[test]
    fn test_display_date() {
        assert_eq!(display_date("2025-03-14"), "14-03-2025");
        assert_eq!(display_date("next friday"), "next friday");
    }
}
