//! Deciding whether an attendee's pass still matches the event layout
//!
//! Every rendered pass is stored together with a fingerprint of the layout it
//! was drawn from. Editing the template or any geometry field changes the
//! fingerprint, which marks existing passes as outdated.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::geometry::{NameGeometry, QrGeometry};
use crate::model::{Attendee, Event};

#[derive(Serialize)]
struct PassConfig<'a> {
    t: &'a str,
    q: &'a QrGeometry,
    n: Option<&'a NameGeometry>,
}

/// Hex SHA-256 over the layout serialized with a fixed field order
pub fn fingerprint(template_url: &str, qr: &QrGeometry, name: Option<&NameGeometry>) -> String {
    let config = PassConfig {
        t: template_url,
        q: qr,
        n: name,
    };
    let canonical =
        serde_json::to_vec(&config).expect("pass layout always serializes to JSON");
    format!("{:x}", Sha256::digest(&canonical))
}

/// Fingerprint of the event's current layout
pub fn config_fingerprint(event: &Event) -> String {
    fingerprint(
        &event.pass_template_url,
        &event.qr_position,
        event.name_position.as_ref(),
    )
}

/// Why a pass does or does not need to be rendered again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    /// No pass yet
    Missing,
    /// Pass predates fingerprints; rendered again so newer layout fields apply
    Legacy,
    /// Layout changed since the pass was rendered
    Outdated,
    /// Pass matches the current layout
    Current,
}

impl Staleness {
    pub fn needs_regeneration(self) -> bool {
        self != Staleness::Current
    }
}

/// Compare an attendee's pass against the event layout
///
/// Passes without a fingerprint are always stale. Older records also carry
/// the template URL they were drawn from, but it is not consulted: a matching
/// template says nothing about the name layout.
pub fn staleness(event: &Event, attendee: &Attendee) -> Staleness {
    if !attendee.has_pass() {
        return Staleness::Missing;
    }
    match attendee.pass_config_hash.as_deref() {
        None => Staleness::Legacy,
        Some(hash) if hash == config_fingerprint(event) => Staleness::Current,
        Some(_) => Staleness::Outdated,
    }
}

pub fn needs_regeneration(event: &Event, attendee: &Attendee) -> bool {
    staleness(event, attendee).needs_regeneration()
}
