//! Live present-count feed for check-in dashboards

use async_stream::stream;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

const CHANNEL_CAPACITY: usize = 256;

/// Number of attendees currently inside an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentCount {
    pub event_id: String,
    pub present: i64,
}

#[derive(Clone)]
pub struct LiveAttendance {
    sender: broadcast::Sender<PresentCount>,
}

impl Default for LiveAttendance {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveAttendance {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn publish(&self, update: PresentCount) {
        // No subscribers is not an error
        let _ = self.sender.send(update);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PresentCount> {
        self.sender.subscribe()
    }

    /// Updates for one event, starting with `initial`
    pub fn updates(
        &self,
        initial: PresentCount,
    ) -> impl Stream<Item = PresentCount> + Send + use<> {
        let mut receiver = self.subscribe();
        let event_id = initial.event_id.clone();

        stream! {
            yield initial;
            loop {
                match receiver.recv().await {
                    Ok(update) if update.event_id == event_id => yield update,
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Live feed for event {} skipped {} updates", event_id, skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    /// Server-sent events carrying `PresentCount` as JSON
    pub fn sse(
        &self,
        initial: PresentCount,
    ) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>> + Send + use<>> {
        let updates = self.updates(initial);
        let events = stream! {
            for await update in updates {
                match SseEvent::default().event("present").json_data(&update) {
                    Ok(event) => yield Ok(event),
                    Err(e) => warn!("Failed to encode live update: {}", e),
                }
            }
        };

        Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
    }
}
