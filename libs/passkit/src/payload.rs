//! Text carried by the pass QR code
//!
//! Current passes encode `{eventId}_{attendeeId}`. Older emails linked to
//! `<base>/verify-pass?token=..&eventId=..`, and those links still show up
//! at the verification desk.

use thiserror::Error;
use url::Url;

/// Path of the public verification page
pub const VERIFY_PATH: &str = "/verify-pass";

/// A decoded scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanPayload {
    /// `{eventId}_{attendeeId}`
    Pass {
        event_id: String,
        attendee_id: String,
    },
    /// Verification link from an older pass email
    LegacyLink { token: String, event_id: String },
}

impl ScanPayload {
    pub fn event_id(&self) -> &str {
        match self {
            ScanPayload::Pass { event_id, .. } | ScanPayload::LegacyLink { event_id, .. } => {
                event_id
            }
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("Invalid QR code format")]
    InvalidFormat,
}

/// Build the QR text for an attendee
pub fn encode(event_id: &str, attendee_id: &str) -> String {
    format!("{}_{}", event_id, attendee_id)
}

/// Decode a scanned string
///
/// The pass form wins over the link form: a string with `_` and no `/` is
/// split on its first `_`. Anything else must be a `/verify-pass` link with
/// both `token` and `eventId` set.
pub fn decode(raw: &str) -> Result<ScanPayload, PayloadError> {
    let raw = raw.trim();

    if raw.contains('_') && !raw.contains('/') {
        let (event_id, attendee_id) = raw.split_once('_').ok_or(PayloadError::InvalidFormat)?;
        if event_id.is_empty() || attendee_id.is_empty() {
            return Err(PayloadError::InvalidFormat);
        }
        return Ok(ScanPayload::Pass {
            event_id: event_id.to_string(),
            attendee_id: attendee_id.to_string(),
        });
    }

    if raw.contains(VERIFY_PATH) {
        return decode_link(raw);
    }

    Err(PayloadError::InvalidFormat)
}

fn decode_link(raw: &str) -> Result<ScanPayload, PayloadError> {
    let url = match Url::parse(raw) {
        Ok(url) => url,
        // Links scanned off a printout sometimes lose their origin
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse("http://localhost/")
            .and_then(|base| base.join(raw))
            .map_err(|_| PayloadError::InvalidFormat)?,
        Err(_) => return Err(PayloadError::InvalidFormat),
    };

    let mut token = None;
    let mut event_id = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "token" if !value.is_empty() => token = Some(value.into_owned()),
            "eventId" if !value.is_empty() => event_id = Some(value.into_owned()),
            _ => {}
        }
    }

    match (token, event_id) {
        (Some(token), Some(event_id)) => Ok(ScanPayload::LegacyLink { token, event_id }),
        _ => Err(PayloadError::InvalidFormat),
    }
}

/// Link sent in pass emails
pub fn verification_link(base_url: &str, token: &str, event_id: &str) -> String {
    format!(
        "{}{}?token={}&eventId={}",
        base_url.trim_end_matches('/'),
        VERIFY_PATH,
        token,
        event_id
    )
}
