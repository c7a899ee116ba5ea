use std::sync::Arc;

use anyhow::Result;
use common::records::{JobKind, PassJob};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info};

use crate::batch::{BatchReport, BatchRunner};
use crate::database::Database;
use crate::mailer::EmailJsMailer;
use crate::storage::{S3ImageStore, TemplateFetcher};

pub type PassRunner = BatchRunner<Database, TemplateFetcher, S3ImageStore, EmailJsMailer>;

/// Admits one batch at a time
#[derive(Clone, Default)]
pub struct BatchGate {
    busy: Arc<Mutex<()>>,
}

impl BatchGate {
    /// `None` while another batch holds the gate
    pub fn try_enter(&self) -> Option<OwnedMutexGuard<()>> {
        Arc::clone(&self.busy).try_lock_owned().ok()
    }

    /// Wait for the running batch to finish and keep new ones out
    pub async fn drain(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.busy).lock_owned().await
    }
}

/// Polls `pass_jobs` and runs one job at a time
#[derive(Clone)]
pub struct JobPoller {
    runner: Arc<PassRunner>,
    gate: BatchGate,
}

impl JobPoller {
    pub fn new(runner: PassRunner) -> Self {
        Self {
            runner: Arc::new(runner),
            gate: BatchGate::default(),
        }
    }

    /// Block until the in-flight job, if any, has been recorded
    pub async fn drain(&self) -> OwnedMutexGuard<()> {
        self.gate.drain().await
    }

    /// Run the oldest queued job, if any. Returns whether a job was claimed.
    pub async fn poll_once(&self) -> Result<bool> {
        // A tick that fires while a batch is still running is dropped
        let Some(_guard) = self.gate.try_enter() else {
            debug!("Previous batch still running, skipping tick");
            return Ok(false);
        };

        let Some(job) = self.runner.ledger().claim_next_job().await? else {
            return Ok(false);
        };

        info!("Claimed {} job {} for event {}", job.kind, job.id, job.event_id);
        match self.run_job(&job).await {
            Ok(_) if self.runner.cancelled() => {
                // Finished attendees are skipped when the job runs again
                self.runner.ledger().requeue_job(job.id).await?;
                info!("Job {} interrupted by shutdown, requeued", job.id);
            }
            Ok(report) => {
                self.runner.ledger().finish_job(job.id, &report).await?;
                info!(
                    "Job {} done: {} succeeded, {} failed, {} skipped",
                    job.id, report.succeeded, report.failed, report.skipped
                );
            }
            Err(e) => {
                error!("Job {} failed: {:#}", job.id, e);
                self.runner
                    .ledger()
                    .fail_job(job.id, &format!("{:#}", e))
                    .await?;
            }
        }
        Ok(true)
    }

    async fn run_job(&self, job: &PassJob) -> Result<BatchReport> {
        let database = self.runner.ledger();
        let event = database
            .get_event(&job.event_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Event {} not found", job.event_id))?;
        let attendees = database.list_attendees(&event.id).await?;

        match job.kind {
            JobKind::Generate => Ok(self.runner.generate_all(&event, &attendees).await?),
            JobKind::Email => Ok(self.runner.email_all(&event, &attendees).await),
        }
    }

    pub async fn start_polling(&self, schedule: &str) -> Result<JobScheduler> {
        let poller = self.clone();
        let scheduler = JobScheduler::new().await?;

        let job = Job::new_async(schedule, move |_, _| {
            let poller = poller.clone();
            Box::pin(async move {
                if let Err(e) = poller.poll_once().await {
                    error!("Failed to poll pass jobs: {:#}", e);
                }
            })
        })?;

        scheduler.add(job).await?;
        scheduler.start().await?;

        info!("Started pass job scheduler with schedule: {}", schedule);
        Ok(scheduler)
    }
}
