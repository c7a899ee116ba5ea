//! Event pass domain: layout geometry, pass compositing, QR payloads and
//! attendance rules. No I/O beyond reading font files.

pub mod attendance;
pub mod fingerprint;
pub mod geometry;
pub mod model;
pub mod payload;
pub mod render;

pub use attendance::{AttendanceAction, AttendanceState, ReportStatus};
pub use fingerprint::{Staleness, config_fingerprint, needs_regeneration, staleness};
pub use geometry::{Color, GeometryError, NameGeometry, QrGeometry};
pub use model::{AttendanceRecord, Attendee, AttendeeProfile, Event, EventStatus};
pub use payload::{PayloadError, ScanPayload};
pub use render::{Compositor, EncodeError, FontBook, RenderError};
