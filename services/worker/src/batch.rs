//! Sequential pass generation and email runs over an event's attendees
//!
//! One attendee's failure never stops the run: it is logged, counted and the
//! loop moves on.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use passkit::{Attendee, Compositor, Event, RenderError, fingerprint, payload};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::mailer::{MailError, PassEmail};

/// Persistence the runs write back to
pub trait PassLedger: Send + Sync {
    fn record_pass(
        &self,
        attendee_id: &str,
        pass: &IssuedPass,
    ) -> impl Future<Output = Result<()>> + Send;

    fn mark_email_sent(&self, attendee_id: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Fetches template images by URL
pub trait TemplateSource: Send + Sync {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// Stores rendered passes and returns their public URL
pub trait ImageStore: Send + Sync {
    fn upload(&self, key: &str, png: Vec<u8>) -> impl Future<Output = Result<String>> + Send;
}

pub trait Mailer: Send + Sync {
    fn send(&self, email: &PassEmail) -> impl Future<Output = Result<(), MailError>> + Send;
}

/// Values stored on the attendee after a successful render
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedPass {
    pub pass_url: String,
    pub config_hash: String,
    pub template_url: String,
}

/// Outcome counts of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub succeeded: u32,
    pub failed: u32,
    pub skipped: u32,
}

#[derive(Error, Debug)]
pub enum PassError {
    #[error("Template unavailable: {0}")]
    Template(String),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Render task failed: {0}")]
    Task(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Failed to record pass: {0}")]
    Store(String),
}

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Event {0} has no pass template")]
    MissingTemplate(String),
}

/// Object key for an attendee's pass image
pub fn pass_key(event_id: &str, attendee_id: &str) -> String {
    format!("passes/{}_{}.png", event_id, attendee_id)
}

#[derive(Debug, Clone)]
pub struct EmailOptions {
    /// Origin of the verification page
    pub public_base_url: String,
    pub reply_to: String,
    /// Pause after each successful send
    pub throttle: Duration,
}

pub struct BatchRunner<L, T, S, M> {
    ledger: L,
    templates: T,
    store: S,
    mailer: M,
    compositor: Compositor,
    email: EmailOptions,
    cancel: Arc<AtomicBool>,
}

impl<L, T, S, M> BatchRunner<L, T, S, M>
where
    L: PassLedger,
    T: TemplateSource,
    S: ImageStore,
    M: Mailer,
{
    pub fn new(
        ledger: L,
        templates: T,
        store: S,
        mailer: M,
        compositor: Compositor,
        email: EmailOptions,
    ) -> Self {
        Self {
            ledger,
            templates,
            store,
            mailer,
            compositor,
            email,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Setting the flag stops running batches before their next attendee
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Render and store passes for every attendee whose pass is missing or stale
    pub async fn generate_all(
        &self,
        event: &Event,
        attendees: &[Attendee],
    ) -> Result<BatchReport, BatchError> {
        if !event.has_template() {
            return Err(BatchError::MissingTemplate(event.id.clone()));
        }

        let config_hash = fingerprint::config_fingerprint(event);
        let mut report = BatchReport::default();
        let mut template: Option<Result<Arc<Vec<u8>>, String>> = None;

        info!(
            "Generating passes for event {} ({} attendees)",
            event.id,
            attendees.len()
        );

        for attendee in attendees {
            if self.cancelled() {
                warn!("Pass generation for event {} cancelled", event.id);
                break;
            }

            let staleness = fingerprint::staleness(event, attendee);
            if !staleness.needs_regeneration() {
                debug!("Pass for {} is up to date", attendee.email);
                report.skipped += 1;
                continue;
            }

            // Fetched once, on the first attendee that needs it
            let fetched = match template.clone() {
                Some(fetched) => fetched,
                None => {
                    let fetched = self
                        .templates
                        .fetch(&event.pass_template_url)
                        .await
                        .map(Arc::new)
                        .map_err(|e| format!("{:#}", e));
                    if let Err(e) = &fetched {
                        error!("Failed to fetch template for event {}: {}", event.id, e);
                    }
                    template = Some(fetched.clone());
                    fetched
                }
            };
            let bytes = match fetched {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!(
                        "Failed to generate pass for {}: {}",
                        attendee.email,
                        PassError::Template(e)
                    );
                    report.failed += 1;
                    continue;
                }
            };

            match self.issue(event, attendee, bytes, &config_hash).await {
                Ok(_) => {
                    debug!("Generated pass for {} ({:?})", attendee.email, staleness);
                    report.succeeded += 1;
                }
                Err(e) => {
                    error!("Failed to generate pass for {}: {}", attendee.email, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Pass generation for event {} finished: {} generated, {} failed, {} up to date",
            event.id, report.succeeded, report.failed, report.skipped
        );
        Ok(report)
    }

    async fn issue(
        &self,
        event: &Event,
        attendee: &Attendee,
        template: Arc<Vec<u8>>,
        config_hash: &str,
    ) -> Result<IssuedPass, PassError> {
        let compositor = self.compositor.clone();
        let qr = event.qr_position.clone();
        let name = event.name_position.clone();
        let attendee_name = attendee.name.clone();
        let code = payload::encode(&event.id, &attendee.id);

        let png = tokio::task::spawn_blocking(move || {
            compositor.composite(&template, &qr, name.as_ref(), &attendee_name, &code)
        })
        .await
        .map_err(|e| PassError::Task(e.to_string()))??;

        let pass_url = self
            .store
            .upload(&pass_key(&event.id, &attendee.id), png)
            .await
            .map_err(|e| PassError::Upload(format!("{:#}", e)))?;

        let issued = IssuedPass {
            pass_url,
            config_hash: config_hash.to_string(),
            template_url: event.pass_template_url.clone(),
        };
        self.ledger
            .record_pass(&attendee.id, &issued)
            .await
            .map_err(|e| PassError::Store(format!("{:#}", e)))?;
        Ok(issued)
    }

    /// Email every attendee that has a pass and has not been emailed yet
    pub async fn email_all(&self, event: &Event, attendees: &[Attendee]) -> BatchReport {
        let mut report = BatchReport::default();
        info!(
            "Sending pass emails for event {} ({} attendees)",
            event.id,
            attendees.len()
        );

        for attendee in attendees {
            if self.cancelled() {
                warn!("Pass emails for event {} cancelled", event.id);
                break;
            }
            if !attendee.has_pass() || attendee.email_sent {
                report.skipped += 1;
                continue;
            }

            let email = PassEmail::new(
                event,
                attendee,
                &self.email.public_base_url,
                &self.email.reply_to,
            );
            if let Err(e) = self.mailer.send(&email).await {
                error!("Failed to send email to {}: {}", attendee.email, e);
                report.failed += 1;
                continue;
            }

            // Sent but not marked: the next run sends it again
            if let Err(e) = self.ledger.mark_email_sent(&attendee.id).await {
                error!("Failed to mark email sent for {}: {:#}", attendee.email, e);
                report.failed += 1;
                continue;
            }
            report.succeeded += 1;

            if !self.email.throttle.is_zero() {
                tokio::time::sleep(self.email.throttle).await;
            }
        }

        info!(
            "Pass emails for event {} finished: {} sent, {} failed, {} skipped",
            event.id, report.succeeded, report.failed, report.skipped
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use passkit::{EventStatus, QrGeometry};
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    #[derive(Default, Clone)]
    struct MemoryLedger {
        passes: Arc<Mutex<HashMap<String, IssuedPass>>>,
        emailed: Arc<Mutex<Vec<String>>>,
    }

    impl PassLedger for MemoryLedger {
        async fn record_pass(&self, attendee_id: &str, pass: &IssuedPass) -> Result<()> {
            self.passes
                .lock()
                .unwrap()
                .insert(attendee_id.to_string(), pass.clone());
            Ok(())
        }

        async fn mark_email_sent(&self, attendee_id: &str) -> Result<()> {
            self.emailed.lock().unwrap().push(attendee_id.to_string());
            Ok(())
        }
    }

    #[derive(Default, Clone)]
    struct StaticTemplate {
        fail: bool,
        fetches: Arc<AtomicUsize>,
    }

    impl TemplateSource for StaticTemplate {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("404 Not Found");
            }
            let image = RgbImage::from_pixel(120, 120, Rgb([255, 255, 255]));
            let mut png = Cursor::new(Vec::new());
            DynamicImage::ImageRgb8(image).write_to(&mut png, ImageFormat::Png)?;
            Ok(png.into_inner())
        }
    }

    #[derive(Default, Clone)]
    struct MemoryStore {
        fail_for: Option<String>,
        objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl ImageStore for MemoryStore {
        async fn upload(&self, key: &str, png: Vec<u8>) -> Result<String> {
            if let Some(bad) = &self.fail_for {
                if key.contains(bad.as_str()) {
                    anyhow::bail!("connection reset");
                }
            }
            self.objects.lock().unwrap().insert(key.to_string(), png);
            Ok(format!("https://cdn.example.org/{}", key))
        }
    }

    #[derive(Default, Clone)]
    struct RecordingMailer {
        fail_for: Option<String>,
        sent: Arc<Mutex<Vec<PassEmail>>>,
    }

    impl Mailer for RecordingMailer {
        async fn send(&self, email: &PassEmail) -> Result<(), MailError> {
            if self.fail_for.as_deref() == Some(email.to_email.as_str()) {
                return Err(MailError::Send("mailbox unavailable".to_string()));
            }
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    type TestRunner = BatchRunner<MemoryLedger, StaticTemplate, MemoryStore, RecordingMailer>;

    fn runner(templates: StaticTemplate, store: MemoryStore, mailer: RecordingMailer) -> TestRunner {
        BatchRunner::new(
            MemoryLedger::default(),
            templates,
            store,
            mailer,
            Compositor::default(),
            EmailOptions {
                public_base_url: "https://passes.example.org".to_string(),
                reply_to: "desk@example.org".to_string(),
                throttle: Duration::ZERO,
            },
        )
    }

    fn event() -> Event {
        Event {
            id: "e1".to_string(),
            name: "Launch Night".to_string(),
            date: "2026-03-14".to_string(),
            time: Some("18:30".to_string()),
            description: String::new(),
            status: EventStatus::Active,
            pass_template_url: "https://img.example.org/t.png".to_string(),
            qr_position: QrGeometry::new(10.0, 10.0, 80.0, 0.0).unwrap(),
            name_position: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn attendee(id: &str) -> Attendee {
        Attendee {
            id: id.to_string(),
            event_id: "e1".to_string(),
            name: format!("Guest {}", id),
            email: format!("{}@example.org", id),
            branch: String::new(),
            year: String::new(),
            section: String::new(),
            pass_url: String::new(),
            pass_config_hash: None,
            pass_template_url: None,
            email_sent: false,
            verification_token: format!("tok-{}", id),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_one_failure_does_not_stop_the_batch() {
        let store = MemoryStore {
            fail_for: Some("_u2".to_string()),
            ..Default::default()
        };
        let runner = runner(StaticTemplate::default(), store.clone(), RecordingMailer::default());
        let event = event();
        let attendees = [attendee("u1"), attendee("u2"), attendee("u3")];

        let report = runner.generate_all(&event, &attendees).await.unwrap();
        assert_eq!(
            report,
            BatchReport {
                succeeded: 2,
                failed: 1,
                skipped: 0
            }
        );

        let passes = runner.ledger().passes.lock().unwrap().clone();
        assert_eq!(passes.len(), 2);
        assert!(!passes.contains_key("u2"));
        let expected_hash = fingerprint::config_fingerprint(&event);
        for id in ["u1", "u3"] {
            let pass = &passes[id];
            assert_eq!(pass.config_hash, expected_hash);
            assert_eq!(pass.template_url, event.pass_template_url);
            assert_eq!(
                pass.pass_url,
                format!("https://cdn.example.org/passes/e1_{}.png", id)
            );
        }

        let objects = store.objects.lock().unwrap();
        let png = &objects["passes/e1_u1.png"];
        let decoded = image::load_from_memory(png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (120, 120));
    }

    #[tokio::test]
    async fn test_current_pass_is_skipped() {
        let templates = StaticTemplate::default();
        let store = MemoryStore::default();
        let runner = runner(templates.clone(), store.clone(), RecordingMailer::default());
        let event = event();
        let mut current = attendee("u1");
        current.pass_url = "https://cdn.example.org/passes/e1_u1.png".to_string();
        current.pass_config_hash = Some(fingerprint::config_fingerprint(&event));

        let report = runner.generate_all(&event, &[current]).await.unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.succeeded, 0);
        assert_eq!(templates.fetches.load(Ordering::SeqCst), 0);
        assert!(store.objects.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_legacy_and_outdated_passes_are_regenerated() {
        let runner = runner(
            StaticTemplate::default(),
            MemoryStore::default(),
            RecordingMailer::default(),
        );
        let event = event();
        let mut legacy = attendee("u1");
        legacy.pass_url = "https://old/u1.png".to_string();
        legacy.pass_template_url = Some(event.pass_template_url.clone());
        let mut outdated = attendee("u2");
        outdated.pass_url = "https://old/u2.png".to_string();
        outdated.pass_config_hash = Some("stale".to_string());

        let report = runner.generate_all(&event, &[legacy, outdated]).await.unwrap();
        assert_eq!(report.succeeded, 2);
    }

    #[tokio::test]
    async fn test_template_fetch_failure_fails_each_pending_attendee() {
        let templates = StaticTemplate {
            fail: true,
            ..Default::default()
        };
        let runner = runner(templates.clone(), MemoryStore::default(), RecordingMailer::default());

        let report = runner
            .generate_all(&event(), &[attendee("u1"), attendee("u2")])
            .await
            .unwrap();
        assert_eq!(report.failed, 2);
        assert_eq!(report.succeeded, 0);
        assert_eq!(templates.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_template_is_rejected() {
        let runner = runner(
            StaticTemplate::default(),
            MemoryStore::default(),
            RecordingMailer::default(),
        );
        let mut event = event();
        event.pass_template_url = String::new();
        let result = runner.generate_all(&event, &[attendee("u1")]).await;
        assert!(matches!(result, Err(BatchError::MissingTemplate(id)) if id == "e1"));
    }

    #[tokio::test]
    async fn test_cancelled_batch_stops_before_next_attendee() {
        let store = MemoryStore::default();
        let runner = runner(StaticTemplate::default(), store.clone(), RecordingMailer::default());
        runner.cancel_handle().store(true, Ordering::SeqCst);

        let report = runner.generate_all(&event(), &[attendee("u1")]).await.unwrap();
        assert_eq!(report, BatchReport::default());
        assert!(store.objects.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_email_skips_and_marks() {
        let mailer = RecordingMailer {
            fail_for: Some("u4@example.org".to_string()),
            ..Default::default()
        };
        let runner = runner(StaticTemplate::default(), MemoryStore::default(), mailer.clone());

        let no_pass = attendee("u1");
        let mut already_sent = attendee("u2");
        already_sent.pass_url = "https://cdn/u2.png".to_string();
        already_sent.email_sent = true;
        let mut ready = attendee("u3");
        ready.pass_url = "https://cdn/u3.png".to_string();
        let mut bouncing = attendee("u4");
        bouncing.pass_url = "https://cdn/u4.png".to_string();

        let report = runner
            .email_all(&event(), &[no_pass, already_sent, ready, bouncing])
            .await;
        assert_eq!(
            report,
            BatchReport {
                succeeded: 1,
                failed: 1,
                skipped: 2
            }
        );

        assert_eq!(*runner.ledger().emailed.lock().unwrap(), vec!["u3".to_string()]);
        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to_email, "u3@example.org");
        assert_eq!(
            sent[0].verification_link,
            "https://passes.example.org/verify-pass?token=tok-u3&eventId=e1"
        );
        assert_eq!(sent[0].reply_to, "desk@example.org");
    }

    #[tokio::test]
    async fn test_email_throttles_after_each_success() {
        let mut runner = runner(
            StaticTemplate::default(),
            MemoryStore::default(),
            RecordingMailer::default(),
        );
        runner.email.throttle = Duration::from_millis(25);

        let attendees: Vec<Attendee> = ["u1", "u2", "u3"]
            .into_iter()
            .map(|id| {
                let mut a = attendee(id);
                a.pass_url = format!("https://cdn/{}.png", id);
                a
            })
            .collect();

        let started = Instant::now();
        let report = runner.email_all(&event(), &attendees).await;
        assert_eq!(report.succeeded, 3);
        assert!(started.elapsed() >= Duration::from_millis(75));
    }
}
