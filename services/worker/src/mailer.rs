//! Pass emails sent through an EmailJS-compatible REST endpoint

use chrono::NaiveDate;
use passkit::{Attendee, Event, payload};
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::batch::Mailer;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("Failed to send email: {0}")]
    Send(String),

    #[error("Email service rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Template parameters of the pass email
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassEmail {
    pub to_name: String,
    pub to_email: String,
    pub event_name: String,
    pub event_date: String,
    pub verification_link: String,
    pub reply_to: String,
}

impl PassEmail {
    pub fn new(event: &Event, attendee: &Attendee, public_base_url: &str, reply_to: &str) -> Self {
        Self {
            to_name: attendee.name.clone(),
            to_email: attendee.email.clone(),
            event_name: event.name.clone(),
            event_date: format_event_date(&event.date, event.time.as_deref()),
            verification_link: payload::verification_link(
                public_base_url,
                &attendee.verification_token,
                &event.id,
            ),
            reply_to: reply_to.to_string(),
        }
    }
}

/// `14/03/2026 at 6:30 PM`; the date is passed through when unparseable
pub fn format_event_date(date: &str, time: Option<&str>) -> String {
    let day = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map(|d| d.format("%d/%m/%Y").to_string())
        .unwrap_or_else(|_| date.to_string());

    match time.map(str::trim).filter(|t| !t.is_empty()) {
        Some(time) => format!("{} at {}", day, format_time(time)),
        None => day,
    }
}

/// `18:05` becomes `6:05 PM`, `00:30` becomes `12:30 AM`
pub fn format_time(time: &str) -> String {
    let (hours, minutes) = time.split_once(':').unwrap_or((time, "00"));
    match hours.trim().parse::<u32>() {
        Ok(h) => {
            let suffix = if h >= 12 { "PM" } else { "AM" };
            let hour = if h % 12 == 0 { 12 } else { h % 12 };
            format!("{}:{} {}", hour, minutes, suffix)
        }
        Err(_) => time.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct EmailJsConfig {
    pub endpoint: String,
    pub service_id: String,
    pub template_id: String,
    pub public_key: String,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    template_params: &'a PassEmail,
}

#[derive(Clone)]
pub struct EmailJsMailer {
    client: Client,
    config: EmailJsConfig,
}

impl EmailJsMailer {
    pub fn new(client: Client, config: EmailJsConfig) -> Self {
        Self { client, config }
    }
}

impl Mailer for EmailJsMailer {
    async fn send(&self, email: &PassEmail) -> Result<(), MailError> {
        debug!("Sending pass email to {}", email.to_email);

        let request = SendRequest {
            service_id: &self.config.service_id,
            template_id: &self.config.template_id,
            user_id: &self.config.public_key,
            template_params: email,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| MailError::Send(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time("18:30"), "6:30 PM");
        assert_eq!(format_time("00:05"), "12:05 AM");
        assert_eq!(format_time("12:00"), "12:00 PM");
        assert_eq!(format_time("09:15"), "9:15 AM");
    }

    #[test]
    fn test_format_event_date() {
        assert_eq!(format_event_date("2026-03-14", Some("18:30")), "14/03/2026 at 6:30 PM");
        assert_eq!(format_event_date("2026-03-14", None), "14/03/2026");
        assert_eq!(format_event_date("2026-03-14", Some("  ")), "14/03/2026");
        assert_eq!(format_event_date("next friday", None), "next friday");
    }

    #[test]
    fn test_request_body_shape() {
        let email = PassEmail {
            to_name: "Ada".to_string(),
            to_email: "ada@example.org".to_string(),
            event_name: "Launch".to_string(),
            event_date: "14/03/2026".to_string(),
            verification_link: "https://x/verify-pass?token=t&eventId=e".to_string(),
            reply_to: "desk@example.org".to_string(),
        };
        let body = serde_json::to_value(SendRequest {
            service_id: "svc",
            template_id: "tpl",
            user_id: "pub",
            template_params: &email,
        })
        .unwrap();
        assert_eq!(body["user_id"], "pub");
        assert_eq!(body["template_params"]["to_email"], "ada@example.org");
        assert_eq!(body["template_params"]["verification_link"], email.verification_link);
    }
}
