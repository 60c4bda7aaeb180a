// src/config.rs
//! Monitor configuration: paths, poll cadence, and probe knobs.
//!
//! Everything has a default so the service boots with no config file at all.
//! `config/monitor.toml` overrides the defaults; a handful of environment
//! variables override the file (deployment secrets like the webhook URL only
//! ever come from the environment).

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::poll::types::{
    PollOptions, DEFAULT_CONCURRENCY, DEFAULT_DEADLINE_SECS, DEFAULT_PIPELINE_ID,
    DEFAULT_TIMEOUT_SECS,
};

pub const DEFAULT_MONITOR_CONFIG_PATH: &str = "config/monitor.toml";
pub const DEFAULT_REGISTRY_PATH: &str = "config/sources.json";
pub const DEFAULT_EXPORT_PATH: &str = "exports/sources.csv";
pub const DEFAULT_INTERVAL_SECS: u64 = 6 * 60 * 60; // four runs a day

pub const ENV_MONITOR_CONFIG_PATH: &str = "MONITOR_CONFIG_PATH";
pub const ENV_REGISTRY_PATH: &str = "REGISTRY_PATH";
pub const ENV_POLL_INTERVAL_SECS: &str = "POLL_INTERVAL_SECS";
pub const ENV_WEBHOOK_URL: &str = "WEBHOOK_URL";

fn default_registry_path() -> PathBuf {
    PathBuf::from(DEFAULT_REGISTRY_PATH)
}

fn default_report_path() -> PathBuf {
    PathBuf::from(crate::report::DEFAULT_REPORT_STATE_PATH)
}

fn default_export_path() -> PathBuf {
    PathBuf::from(DEFAULT_EXPORT_PATH)
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_deadline_secs() -> u64 {
    DEFAULT_DEADLINE_SECS
}

fn default_pipeline() -> String {
    DEFAULT_PIPELINE_ID.to_string()
}

fn default_user_agent() -> String {
    crate::poll::http::DEFAULT_USER_AGENT.to_string()
}

fn default_webhook_timeout_secs() -> u64 {
    crate::notify::webhook::DEFAULT_WEBHOOK_TIMEOUT_SECS
}

fn default_webhook_retries() -> u8 {
    crate::notify::webhook::DEFAULT_WEBHOOK_RETRIES
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorConfig {
    /// Source registry JSON, the file the curator rewrites.
    pub registry_path: PathBuf,
    /// Where the latest report artifact is persisted after each run.
    pub report_path: PathBuf,
    /// Derived one-row-per-source CSV, regenerated on every registry change.
    pub export_path: PathBuf,
    /// Seconds between scheduled poll runs.
    pub interval_secs: u64,
    /// Per-request probe timeout, seconds.
    pub timeout_secs: u64,
    /// Worker limit across all in-flight probes.
    pub concurrency: usize,
    /// Global budget for one poll run, seconds.
    pub deadline_secs: u64,
    /// Identifier stamped on every report row.
    pub pipeline: String,
    /// User-Agent sent with every probe, so site operators can identify us.
    pub user_agent: String,
    /// Alert webhook for problematic-set changes. Env-only in deployments;
    /// allowed in the file for local testing.
    pub webhook_url: Option<String>,
    /// Per-delivery timeout for alert webhooks, seconds.
    pub webhook_timeout_secs: u64,
    /// Delivery attempts per alert before giving up.
    pub webhook_retries: u8,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            registry_path: default_registry_path(),
            report_path: default_report_path(),
            export_path: default_export_path(),
            interval_secs: default_interval_secs(),
            timeout_secs: default_timeout_secs(),
            concurrency: default_concurrency(),
            deadline_secs: default_deadline_secs(),
            pipeline: default_pipeline(),
            user_agent: default_user_agent(),
            webhook_url: None,
            webhook_timeout_secs: default_webhook_timeout_secs(),
            webhook_retries: default_webhook_retries(),
        }
    }
}

impl MonitorConfig {
    /// Load using env + fallbacks:
    /// 1) $MONITOR_CONFIG_PATH (must exist if set)
    /// 2) config/monitor.toml if present
    /// 3) built-in defaults
    /// then apply the env overrides on top.
    pub fn load() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_MONITOR_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                anyhow::bail!("{ENV_MONITOR_CONFIG_PATH} points to non-existent path");
            }
            Self::from_path(&pb)?
        } else {
            let default = PathBuf::from(DEFAULT_MONITOR_CONFIG_PATH);
            if default.exists() {
                Self::from_path(&default)?
            } else {
                Self::default()
            }
        };
        cfg.apply_env();
        Ok(cfg)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading monitor config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: MonitorConfig = toml::from_str(s).context("parsing monitor config")?;
        anyhow::ensure!(cfg.interval_secs > 0, "interval_secs must be positive");
        anyhow::ensure!(cfg.timeout_secs > 0, "timeout_secs must be positive");
        Ok(cfg)
    }

    fn apply_env(&mut self) {
        if let Ok(p) = std::env::var(ENV_REGISTRY_PATH) {
            self.registry_path = PathBuf::from(p);
        }
        if let Some(secs) = std::env::var(ENV_POLL_INTERVAL_SECS)
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.interval_secs = secs;
        }
        if let Ok(url) = std::env::var(ENV_WEBHOOK_URL) {
            if !url.is_empty() {
                self.webhook_url = Some(url);
            }
        }
    }

    pub fn poll_options(&self) -> PollOptions {
        PollOptions::default()
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_concurrency(self.concurrency)
            .with_deadline(Duration::from_secs(self.deadline_secs))
            .with_pipeline(self.pipeline.clone())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Alert notifier with the configured delivery knobs; `None` when no
    /// webhook is configured.
    pub fn notifier(&self) -> Option<crate::notify::WebhookNotifier> {
        self.webhook_url.clone().map(|url| {
            crate::notify::WebhookNotifier::new(url)
                .with_timeout(self.webhook_timeout_secs)
                .with_retries(self.webhook_retries)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn defaults_are_sane() {
        let cfg = MonitorConfig::default();
        assert_eq!(cfg.registry_path, PathBuf::from("config/sources.json"));
        assert_eq!(cfg.timeout_secs, 10);
        assert!(cfg.webhook_url.is_none());
        assert_eq!(cfg.poll_options().concurrency, DEFAULT_CONCURRENCY);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let cfg = MonitorConfig::from_toml_str(
            r#"
            interval_secs = 900
            concurrency = 4
            "#,
        )
        .unwrap();
        assert_eq!(cfg.interval_secs, 900);
        assert_eq!(cfg.concurrency, 4);
        assert_eq!(cfg.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(cfg.pipeline, DEFAULT_PIPELINE_ID);
        assert_eq!(cfg.webhook_timeout_secs, 5);
        assert_eq!(cfg.webhook_retries, 3);
    }

    #[test]
    fn notifier_follows_the_webhook_config() {
        assert!(MonitorConfig::default().notifier().is_none());

        let cfg = MonitorConfig::from_toml_str(
            r#"
            webhook_url = "https://hooks.example.test/alert"
            webhook_timeout_secs = 2
            webhook_retries = 5
            "#,
        )
        .unwrap();
        assert!(cfg.notifier().is_some());
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(MonitorConfig::from_toml_str("interval_secs = 0").is_err());
    }

    #[test]
    fn unknown_key_is_rejected() {
        assert!(MonitorConfig::from_toml_str("intervall_secs = 900").is_err());
    }

    #[test]
    #[serial]
    fn env_overrides_file_values() {
        std::env::set_var(ENV_REGISTRY_PATH, "/tmp/other.json");
        std::env::set_var(ENV_POLL_INTERVAL_SECS, "120");
        std::env::set_var(ENV_WEBHOOK_URL, "https://hooks.example.test/alert");

        let mut cfg = MonitorConfig::default();
        cfg.apply_env();
        assert_eq!(cfg.registry_path, PathBuf::from("/tmp/other.json"));
        assert_eq!(cfg.interval_secs, 120);
        assert_eq!(
            cfg.webhook_url.as_deref(),
            Some("https://hooks.example.test/alert")
        );

        std::env::remove_var(ENV_REGISTRY_PATH);
        std::env::remove_var(ENV_POLL_INTERVAL_SECS);
        std::env::remove_var(ENV_WEBHOOK_URL);
    }
}
