//! Layered service settings
//!
//! Values come from built-in defaults, then an optional `config/gatepass.toml`,
//! then `GATEPASS__<SECTION>__<KEY>` environment variables, e.g.
//! `GATEPASS__SCAN__DEBOUNCE_MS=1500`.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

use crate::error::SettingsError;

pub const DEFAULT_CONFIG_FILE: &str = "config/gatepass";
pub const ENV_PREFIX: &str = "GATEPASS";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub auth: AuthSettings,
    pub scan: ScanSettings,
    pub fonts: FontSettings,
    pub storage: StorageSettings,
    pub email: EmailSettings,
    pub worker: WorkerSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub listen_addr: String,
    /// Origin used to build verification links
    pub public_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// PEM-encoded RSA public key for staff tokens
    pub jwt_public_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanSettings {
    /// Identical payloads from one station within this window are dropped
    pub debounce_ms: u64,
}

impl ScanSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FontSettings {
    pub dir: String,
    pub default_family: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    pub bucket: String,
    /// Public prefix prepended to object keys
    pub public_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailSettings {
    pub endpoint: String,
    pub service_id: String,
    pub template_id: String,
    pub public_key: String,
    pub reply_to: String,
    /// Pause after every successful send
    pub throttle_ms: u64,
}

impl EmailSettings {
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerSettings {
    /// Cron expression (with seconds) for polling queued jobs
    pub schedule: String,
    /// Age after which a `running` job is presumed abandoned
    pub job_lease_secs: u64,
}

impl WorkerSettings {
    pub fn job_lease(&self) -> Duration {
        Duration::from_secs(self.job_lease_secs)
    }
}

impl Settings {
    /// Load from `config/gatepass.*` (if present) and the environment
    pub fn load() -> Result<Self, SettingsError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    pub fn load_from(file: &str) -> Result<Self, SettingsError> {
        let settings: Settings = Config::builder()
            .set_default("server.listen_addr", "0.0.0.0:3000")?
            .set_default("server.public_base_url", "http://localhost:3000")?
            .set_default("auth.jwt_public_key", "")?
            .set_default("scan.debounce_ms", 3000_i64)?
            .set_default("fonts.dir", "fonts")?
            .set_default("fonts.default_family", passkit::geometry::DEFAULT_FONT_FAMILY)?
            .set_default("storage.bucket", "gatepass-passes")?
            .set_default("storage.public_url", "http://localhost:9000/gatepass-passes")?
            .set_default("email.endpoint", "https://api.emailjs.com/api/v1.0/email/send")?
            .set_default("email.service_id", "")?
            .set_default("email.template_id", "")?
            .set_default("email.public_key", "")?
            .set_default("email.reply_to", "")?
            .set_default("email.throttle_ms", 500_i64)?
            .set_default("worker.schedule", "0/5 * * * * *")?
            .set_default("worker.job_lease_secs", 3600_i64)?
            .add_source(File::with_name(file).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        let base = self.server.public_base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(SettingsError::Invalid {
                key: "server.public_base_url",
                reason: format!("expected an http(s) URL, got {:?}", base),
            });
        }
        if self.worker.schedule.trim().is_empty() {
            return Err(SettingsError::Invalid {
                key: "worker.schedule",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const NO_FILE: &str = "/nonexistent/gatepass-settings";

    #[test]
    #[serial]
    fn test_defaults() {
        let settings = Settings::load_from(NO_FILE).unwrap();
        assert_eq!(settings.server.listen_addr, "0.0.0.0:3000");
        assert_eq!(settings.scan.debounce(), Duration::from_secs(3));
        assert_eq!(settings.email.throttle(), Duration::from_millis(500));
        assert_eq!(settings.fonts.default_family, "Arial");
        assert_eq!(settings.worker.schedule, "0/5 * * * * *");
        assert_eq!(settings.worker.job_lease(), Duration::from_secs(3600));
    }

    #[test]
    #[serial]
    fn test_environment_overrides() {
        unsafe {
            std::env::set_var("GATEPASS__SCAN__DEBOUNCE_MS", "1500");
            std::env::set_var("GATEPASS__STORAGE__BUCKET", "event-passes");
        }

        let settings = Settings::load_from(NO_FILE);

        unsafe {
            std::env::remove_var("GATEPASS__SCAN__DEBOUNCE_MS");
            std::env::remove_var("GATEPASS__STORAGE__BUCKET");
        }

        let settings = settings.unwrap();
        assert_eq!(settings.scan.debounce_ms, 1500);
        assert_eq!(settings.storage.bucket, "event-passes");
    }

    #[test]
    #[serial]
    fn test_invalid_base_url_is_rejected() {
        unsafe {
            std::env::set_var("GATEPASS__SERVER__PUBLIC_BASE_URL", "passes.example.org");
        }

        let result = Settings::load_from(NO_FILE);

        unsafe {
            std::env::remove_var("GATEPASS__SERVER__PUBLIC_BASE_URL");
        }

        assert!(matches!(
            result,
            Err(SettingsError::Invalid {
                key: "server.public_base_url",
                ..
            })
        ));
    }
}
