use crate::reconcile::ClassificationLog;
use crate::session::JobStatus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{info, warn};

/// Alert thresholds and window sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Minimum trimmed character count for an utterance to count.
    pub min_substantive_chars: usize,
    /// Below this many substantive utterances the monitor stays quiet.
    pub min_samples: usize,
    /// How many of the most recent substantive utterances to average.
    pub window_size: usize,
    /// Window average at or below this shows the drift banner.
    pub banner_threshold: u32,
    /// Window average at or below this raises the audible alert.
    pub audible_threshold: u32,
    /// Repeat interval for an active audible alert.
    pub repeat_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            min_substantive_chars: 10,
            min_samples: 3,
            window_size: 10,
            banner_threshold: 40,
            audible_threshold: 60,
            repeat_interval: Duration::from_secs(20),
        }
    }
}

/// One drift notification, immediate or repeated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftNotice {
    pub job_id: String,
    /// Window average at the moment the alert was raised.
    pub window_average: u32,
}

/// Sink for drift notifications.
///
/// Called once when an alert is raised and again on every repeat until the
/// alert is cancelled. Implementations decide how a notice reaches a human.
#[async_trait]
pub trait DriftNotifier: Send + Sync {
    async fn notify(&self, notice: DriftNotice);
}

/// Notifier that writes drift notices to the log.
pub struct LogNotifier;

#[async_trait]
impl DriftNotifier for LogNotifier {
    async fn notify(&self, notice: DriftNotice) {
        warn!(
            "Job {}: conversation drifting off agenda (window average {}%)",
            notice.job_id, notice.window_average
        );
    }
}

/// Point-in-time view of the monitor's decision state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertState {
    /// Current window average, if enough substantive utterances exist.
    pub window_average: Option<u32>,
    /// Whether the drift banner is showing.
    pub banner_visible: bool,
    /// Whether the audible alert is active.
    pub alert_active: bool,
    /// When a notification last went out, immediate or repeat.
    pub last_notified_at: Option<DateTime<Utc>>,
}

/// Rolling average of recent substantive classifications, averaged over the
/// most recent window.
///
/// `None` until at least `min_samples` substantive utterances exist, and
/// `None` whenever the window itself is empty (degenerate sizing such as a
/// zero window or a zero sample floor over an empty log).
pub fn windowed_average(log: &ClassificationLog, config: &MonitorConfig) -> Option<u32> {
    let alignments: Vec<u32> = log
        .substantive(config.min_substantive_chars)
        .map(|entry| entry.alignment)
        .collect();
    if alignments.len() < config.min_samples {
        return None;
    }
    let window = &alignments[alignments.len().saturating_sub(config.window_size)..];
    if window.is_empty() {
        return None;
    }
    let sum: u64 = window.iter().map(|&alignment| u64::from(alignment)).sum();
    Some((sum / window.len() as u64) as u32)
}

/// Watches the classification log for agenda drift.
///
/// Recomputed after every classification update. The audible alert is
/// edge-triggered: crossing the threshold notifies once immediately and
/// starts a repeating background notification, and recomputing while the
/// alert is already active never stacks a second one. Recovering above the
/// threshold, losing the data floor, or leaving the streaming state cancels
/// the alert and its repeats.
pub struct AlignmentMonitor {
    job_id: String,
    config: MonitorConfig,
    notifier: Arc<dyn DriftNotifier>,
    window_average: Option<u32>,
    banner_visible: bool,
    alert_active: bool,
    last_notified: Arc<Mutex<Option<DateTime<Utc>>>>,
    repeat_task: Option<JoinHandle<()>>,
}

impl AlignmentMonitor {
    pub fn new(
        job_id: impl Into<String>,
        config: MonitorConfig,
        notifier: Arc<dyn DriftNotifier>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            config,
            notifier,
            window_average: None,
            banner_visible: false,
            alert_active: false,
            last_notified: Arc::new(Mutex::new(None)),
            repeat_task: None,
        }
    }

    pub fn window_average(&self) -> Option<u32> {
        self.window_average
    }

    pub fn alert_active(&self) -> bool {
        self.alert_active
    }

    pub async fn state(&self) -> AlertState {
        AlertState {
            window_average: self.window_average,
            banner_visible: self.banner_visible,
            alert_active: self.alert_active,
            last_notified_at: *self.last_notified.lock().await,
        }
    }

    /// Re-evaluate banner and alert against the current log.
    pub async fn recompute(&mut self, log: &ClassificationLog, status: JobStatus) {
        if !status.is_streaming() {
            self.shutdown();
            return;
        }
        self.window_average = windowed_average(log, &self.config);
        let Some(average) = self.window_average else {
            self.banner_visible = false;
            self.cancel_alert();
            return;
        };
        self.banner_visible = average <= self.config.banner_threshold;
        if average <= self.config.audible_threshold {
            self.raise_alert(average).await;
        } else {
            self.cancel_alert();
        }
    }

    /// Cancel any active alert and its pending repeats, and take down the
    /// banner. The last computed average stays readable for final stats.
    /// Safe to call at any point in the session lifecycle, any number of
    /// times.
    pub fn shutdown(&mut self) {
        self.cancel_alert();
        self.banner_visible = false;
    }

    /// Discard everything from the previous run: cancel the alert the same
    /// way `shutdown` does, then forget the computed average and the
    /// notification history.
    pub async fn reset(&mut self) {
        self.shutdown();
        self.window_average = None;
        *self.last_notified.lock().await = None;
    }

    async fn raise_alert(&mut self, average: u32) {
        if self.alert_active {
            // already ringing; the repeat task carries on
            return;
        }
        self.alert_active = true;
        let notice = DriftNotice {
            job_id: self.job_id.clone(),
            window_average: average,
        };
        info!(
            "Job {}: drift alert raised at window average {}%",
            self.job_id, average
        );
        self.notifier.notify(notice.clone()).await;
        *self.last_notified.lock().await = Some(Utc::now());

        let notifier = Arc::clone(&self.notifier);
        let last_notified = Arc::clone(&self.last_notified);
        let period = self.config.repeat_interval;
        self.repeat_task = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                notifier.notify(notice.clone()).await;
                *last_notified.lock().await = Some(Utc::now());
            }
        }));
    }

    fn cancel_alert(&mut self) {
        if let Some(task) = self.repeat_task.take() {
            task.abort();
        }
        if self.alert_active {
            info!("Job {}: drift alert cancelled", self.job_id);
        }
        self.alert_active = false;
    }
}

impl Drop for AlignmentMonitor {
    fn drop(&mut self) {
        if let Some(task) = self.repeat_task.take() {
            task.abort();
        }
    }
}
