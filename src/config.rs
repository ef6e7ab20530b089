use crate::monitor::MonitorConfig;
use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "meeting-sentinel".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// NATS server URL
    pub nats_url: String,
    /// Subject prefix; each job listens on `{prefix}.job-{job_id}`
    pub subject_prefix: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            nats_url: "nats://localhost:4222".to_string(),
            subject_prefix: "meeting.events".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub min_substantive_chars: usize,
    pub min_samples: usize,
    pub window_size: usize,
    pub banner_threshold: u32,
    pub audible_threshold: u32,
    pub repeat_seconds: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        let monitor = MonitorConfig::default();
        Self {
            min_substantive_chars: monitor.min_substantive_chars,
            min_samples: monitor.min_samples,
            window_size: monitor.window_size,
            banner_threshold: monitor.banner_threshold,
            audible_threshold: monitor.audible_threshold,
            repeat_seconds: monitor.repeat_interval.as_secs(),
        }
    }
}

impl AlertConfig {
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            min_substantive_chars: self.min_substantive_chars,
            min_samples: self.min_samples,
            window_size: self.window_size,
            banner_threshold: self.banner_threshold,
            audible_threshold: self.audible_threshold,
            // a zero period would panic the repeat interval
            repeat_interval: Duration::from_secs(self.repeat_seconds.max(1)),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Like `load`, but a missing file falls back to defaults.
    pub fn load_or_default(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
