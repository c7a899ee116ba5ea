//! Check-in station scan handling
//!
//! A scan never changes attendance on its own. `Scanner::scan` resolves the
//! pass and reports where the attendee stands; the operator then picks an
//! action and `Scanner::apply` records it.

use anyhow::Result;
use chrono::{DateTime, Utc};
use passkit::{
    AttendanceAction, AttendanceRecord, AttendanceState, Attendee, AttendeeProfile, ScanPayload,
    payload,
};
use serde::Serialize;
use std::future::Future;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Pass belongs to a different event!")]
    WrongEvent { scanned: String },

    #[error("User not found.")]
    AttendeeNotFound,

    #[error("Invalid QR Code Format")]
    InvalidFormat,

    #[error("Attendance store error: {0}")]
    Store(String),
}

impl ScanError {
    pub fn code(&self) -> &'static str {
        match self {
            ScanError::WrongEvent { .. } => "WRONG_EVENT",
            ScanError::AttendeeNotFound => "ATTENDEE_NOT_FOUND",
            ScanError::InvalidFormat => "INVALID_FORMAT",
            ScanError::Store(_) => "STORE",
        }
    }
}

impl From<anyhow::Error> for ScanError {
    fn from(e: anyhow::Error) -> Self {
        ScanError::Store(e.to_string())
    }
}

/// Attendee and attendance lookups the scanner needs
pub trait CheckInStore: Send + Sync {
    fn find_attendee(
        &self,
        event_id: &str,
        attendee_id: &str,
    ) -> impl Future<Output = Result<Option<Attendee>>> + Send;

    fn find_record(
        &self,
        event_id: &str,
        attendee_id: &str,
    ) -> impl Future<Output = Result<Option<AttendanceRecord>>> + Send;

    /// Apply `action` to the stored record in one atomic step and return the
    /// result. Check-out only sets the check-out time, so it never undoes a
    /// check-in made elsewhere since the record was read.
    fn record_action(
        &self,
        event_id: &str,
        attendee_id: &str,
        action: AttendanceAction,
        at: DateTime<Utc>,
        profile: &AttendeeProfile,
    ) -> impl Future<Output = Result<AttendanceRecord>> + Send;
}

/// What the operator sees after a scan
#[derive(Debug, Clone, Serialize)]
pub struct ScanReview {
    pub attendee: Attendee,
    pub record: Option<AttendanceRecord>,
    pub state: AttendanceState,
    pub actions: Vec<AttendanceAction>,
}

/// Result of an operator decision
#[derive(Debug, Clone, Serialize)]
pub struct AppliedAction {
    pub record: AttendanceRecord,
    pub state: AttendanceState,
    pub message: String,
}

#[derive(Clone)]
pub struct Scanner<S> {
    store: S,
}

impl<S: CheckInStore> Scanner<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Resolve a scanned code against the operator's selected event
    pub async fn scan(&self, selected_event_id: &str, raw: &str) -> Result<ScanReview, ScanError> {
        let (event_id, attendee_id) = match payload::decode(raw) {
            Ok(ScanPayload::Pass {
                event_id,
                attendee_id,
            }) => (event_id, attendee_id),
            // Verification links belong at the verification desk
            Ok(ScanPayload::LegacyLink { .. }) | Err(_) => return Err(ScanError::InvalidFormat),
        };

        if event_id != selected_event_id {
            warn!(
                "Scanned pass for event {} at station for event {}",
                event_id, selected_event_id
            );
            return Err(ScanError::WrongEvent { scanned: event_id });
        }

        let attendee = self
            .store
            .find_attendee(&event_id, &attendee_id)
            .await?
            .ok_or(ScanError::AttendeeNotFound)?;
        let record = self.store.find_record(&event_id, &attendee_id).await?;

        Ok(ScanReview {
            state: AttendanceState::of(record.as_ref()),
            attendee,
            record,
            actions: AttendanceAction::ALL.to_vec(),
        })
    }

    /// Record the operator's decision for an attendee
    pub async fn apply(
        &self,
        event_id: &str,
        attendee_id: &str,
        action: AttendanceAction,
    ) -> Result<AppliedAction, ScanError> {
        let attendee = self
            .store
            .find_attendee(event_id, attendee_id)
            .await?
            .ok_or(ScanError::AttendeeNotFound)?;
        let record = self
            .store
            .record_action(event_id, attendee_id, action, Utc::now(), &attendee.profile())
            .await?;

        info!(
            "Recorded {} for attendee {} at event {}",
            action.as_str(),
            attendee_id,
            event_id
        );

        Ok(AppliedAction {
            state: AttendanceState::of(Some(&record)),
            message: action.greeting(&attendee.name),
            record,
        })
    }
}
