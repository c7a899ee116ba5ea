use anyhow::Result;
use aws_config::BehaviorVersion;
use common::database::{DatabaseConfig, init_pool, requeue_stale_jobs, run_migrations};
use common::settings::Settings;
use passkit::{Compositor, FontBook};
use std::sync::atomic::Ordering;
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;

mod batch;
mod database;
mod mailer;
mod poller;
mod storage;

use batch::{BatchRunner, EmailOptions};
use database::Database;
use mailer::{EmailJsConfig, EmailJsMailer};
use poller::JobPoller;
use storage::{S3ImageStore, TemplateFetcher};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_max_level(Level::INFO)
        .init();

    info!("Starting pass worker");

    let settings = Settings::load()?;

    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;
    run_migrations(&pool).await?;

    let requeued = requeue_stale_jobs(&pool, settings.worker.job_lease()).await?;
    if requeued > 0 {
        warn!("Requeued {} pass job(s) left running past their lease", requeued);
    }

    let aws = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let s3_client = aws_sdk_s3::Client::new(&aws);
    let http = reqwest::Client::new();

    let fonts = FontBook::load_dir(&settings.fonts.dir, &settings.fonts.default_family)?;
    let mailer = EmailJsMailer::new(
        http.clone(),
        EmailJsConfig {
            endpoint: settings.email.endpoint.clone(),
            service_id: settings.email.service_id.clone(),
            template_id: settings.email.template_id.clone(),
            public_key: settings.email.public_key.clone(),
        },
    );

    let runner = BatchRunner::new(
        Database::new(pool),
        TemplateFetcher::new(http, s3_client.clone()),
        S3ImageStore::new(
            s3_client,
            settings.storage.bucket.clone(),
            settings.storage.public_url.clone(),
        ),
        mailer,
        Compositor::new(fonts),
        EmailOptions {
            public_base_url: settings.server.public_base_url.clone(),
            reply_to: settings.email.reply_to.clone(),
            throttle: settings.email.throttle(),
        },
    );
    let cancel = runner.cancel_handle();

    let poller = JobPoller::new(runner);
    let mut scheduler = poller.start_polling(&settings.worker.schedule).await?;

    info!("Pass worker started successfully");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down pass worker");
    cancel.store(true, Ordering::Relaxed);
    // Let the in-flight job record its outcome before the runtime goes away
    let _idle = poller.drain().await;
    scheduler.shutdown().await?;

    Ok(())
}
