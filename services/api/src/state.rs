//! Application state shared across handlers

use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

use crate::debounce::ScanDebouncer;
use crate::live::LiveAttendance;
use crate::middleware::JwtVerifier;
use crate::repositories::{
    AttendeeRepository, EventRepository, attendance::AttendanceRepository, jobs::JobRepository,
};
use crate::scanner::Scanner;
use crate::verification::Verifier;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub events: EventRepository,
    pub attendees: AttendeeRepository,
    pub attendance: AttendanceRepository,
    pub jobs: JobRepository,
    pub scanner: Scanner<AttendanceRepository>,
    pub verifier: Verifier<AttendeeRepository>,
    pub debouncer: ScanDebouncer,
    pub live: LiveAttendance,
    pub jwt: Arc<JwtVerifier>,
}

impl AppState {
    pub fn new(pool: PgPool, jwt: JwtVerifier, scan_debounce: Duration) -> Self {
        let attendees = AttendeeRepository::new(pool.clone());
        let attendance = AttendanceRepository::new(pool.clone());

        Self {
            events: EventRepository::new(pool.clone()),
            jobs: JobRepository::new(pool.clone()),
            scanner: Scanner::new(attendance.clone()),
            verifier: Verifier::new(attendees.clone()),
            attendees,
            attendance,
            debouncer: ScanDebouncer::new(scan_debounce),
            live: LiveAttendance::new(),
            jwt: Arc::new(jwt),
            db_pool: pool,
        }
    }
}
