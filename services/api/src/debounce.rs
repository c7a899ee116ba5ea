//! Suppresses repeated reads of the same pass at one station
//!
//! Cameras report the same code many times while it stays in frame. A scan
//! is dropped when the same station saw the same payload within the window.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ScanDebouncer {
    window: Duration,
    last_seen: Arc<Mutex<HashMap<String, (String, Instant)>>>,
}

impl ScanDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_seen: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// `true` when the scan should be processed
    pub async fn accept(&self, station: &str, payload: &str) -> bool {
        self.accept_at(station, payload, Instant::now()).await
    }

    async fn accept_at(&self, station: &str, payload: &str, now: Instant) -> bool {
        let mut last_seen = self.last_seen.lock().await;

        if let Some((previous, at)) = last_seen.get(station) {
            if previous == payload && now.duration_since(*at) < self.window {
                debug!("Dropping repeated scan at station {}", station);
                return false;
            }
        }

        // Prune stations idle for longer than the window
        last_seen.retain(|_, (_, at)| now.duration_since(*at) < self.window);
        last_seen.insert(station.to_string(), (payload.to_string(), now));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_repeat_within_window_is_dropped() {
        let debouncer = ScanDebouncer::new(Duration::from_secs(3));
        let start = Instant::now();

        assert!(debouncer.accept_at("gate-1", "e1_u1", start).await);
        assert!(
            !debouncer
                .accept_at("gate-1", "e1_u1", start + Duration::from_secs(1))
                .await
        );
        assert!(
            debouncer
                .accept_at("gate-1", "e1_u1", start + Duration::from_secs(3))
                .await
        );
    }

    #[tokio::test]
    async fn test_other_station_or_payload_passes() {
        let debouncer = ScanDebouncer::new(Duration::from_secs(3));
        let start = Instant::now();

        assert!(debouncer.accept_at("gate-1", "e1_u1", start).await);
        assert!(debouncer.accept_at("gate-2", "e1_u1", start).await);
        assert!(debouncer.accept_at("gate-1", "e1_u2", start).await);
        // gate-1 moved on to u2, so u1 is fresh again
        assert!(debouncer.accept_at("gate-1", "e1_u1", start).await);
    }

    #[tokio::test]
    async fn test_zero_window_never_drops() {
        let debouncer = ScanDebouncer::new(Duration::ZERO);
        assert!(debouncer.accept("gate-1", "e1_u1").await);
        assert!(debouncer.accept("gate-1", "e1_u1").await);
    }
}
