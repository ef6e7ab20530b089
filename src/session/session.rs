use super::config::SessionConfig;
use super::stats::SessionStats;
use super::status::JobStatus;
use crate::channel::{ChannelAdapter, ChannelEvent, EventTransport, JobChannel};
use crate::monitor::{AlertState, AlignmentMonitor, DriftNotifier, MeetingTimer, TimerState};
use crate::reconcile::{
    Applied, Classification, ClassificationLog, TranscriptLog, TranscriptSegment,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, error, info, warn};

/// A meeting session that follows one job's event channel and keeps the
/// reconciled meeting state: transcript, classifications, drift alerts and
/// the meeting timer.
///
/// All channel events funnel through a single pump task, so the logs only
/// ever mutate from one place. Everything else reads snapshots.
pub struct MeetingSession {
    /// Session configuration
    config: SessionConfig,

    /// Opens and retires the job's event channel
    adapter: ChannelAdapter,

    /// Lifecycle status, observable via `watch_status`
    status_tx: Arc<watch::Sender<JobStatus>>,

    /// Reconciled transcript
    transcript: Arc<Mutex<TranscriptLog>>,

    /// Reconciled classifications
    classifications: Arc<Mutex<ClassificationLog>>,

    /// Drift banner and audible alert state
    monitor: Arc<Mutex<AlignmentMonitor>>,

    /// Elapsed streaming time against the agenda schedule
    timer: Arc<Mutex<MeetingTimer>>,

    /// Error string from a failed start or an upstream error event
    failure: Arc<Mutex<Option<String>>>,

    /// Malformed messages dropped on the current channel
    dropped: Arc<AtomicU64>,

    /// When the current run started
    started_at: DateTime<Utc>,

    /// Handle for the event pump task
    event_task: Option<JoinHandle<()>>,

    /// Handle for the once-per-second timer task
    tick_task: Option<JoinHandle<()>>,
}

impl MeetingSession {
    /// Create a session for one job. Nothing is opened until `start`.
    pub fn new(
        config: SessionConfig,
        transport: Arc<dyn EventTransport>,
        notifier: Arc<dyn DriftNotifier>,
    ) -> Self {
        info!("Creating meeting session for job {}", config.job_id);

        let monitor = AlignmentMonitor::new(&config.job_id, config.monitor.clone(), notifier);
        let timer = MeetingTimer::from_agenda(&config.agenda_text);
        if let Some(minutes) = timer.scheduled_minutes() {
            info!("Job {}: scheduled for {} minutes", config.job_id, minutes);
        }
        let (status_tx, _) = watch::channel(JobStatus::Idle);

        Self {
            config,
            adapter: ChannelAdapter::new(transport),
            status_tx: Arc::new(status_tx),
            transcript: Arc::new(Mutex::new(TranscriptLog::new())),
            classifications: Arc::new(Mutex::new(ClassificationLog::new())),
            monitor: Arc::new(Mutex::new(monitor)),
            timer: Arc::new(Mutex::new(timer)),
            failure: Arc::new(Mutex::new(None)),
            dropped: Arc::new(AtomicU64::new(0)),
            started_at: Utc::now(),
            event_task: None,
            tick_task: None,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.config.job_id
    }

    pub fn status(&self) -> JobStatus {
        *self.status_tx.borrow()
    }

    /// Watch status transitions without polling.
    pub fn watch_status(&self) -> watch::Receiver<JobStatus> {
        self.status_tx.subscribe()
    }

    /// Open the job's event channel and begin reconciling.
    ///
    /// Starting over an already-running session closes the previous channel
    /// first and begins a fresh run: the logs are cleared and the timer
    /// restarts, since upstream replays the job's backlog on a new channel.
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting meeting session for job {}", self.config.job_id);

        // Retire any previous run before touching state
        self.adapter.close();
        self.shutdown_tasks().await;

        // Fresh run, fresh state
        self.transcript.lock().await.clear();
        self.classifications.lock().await.clear();
        self.monitor.lock().await.reset().await;
        self.timer.lock().await.reset();
        *self.failure.lock().await = None;
        self.started_at = Utc::now();

        let channel = match self.adapter.open(&self.config.job_id).await {
            Ok(channel) => channel,
            Err(e) => {
                *self.failure.lock().await = Some(format!("{e:#}"));
                self.status_tx.send_replace(JobStatus::Error);
                return Err(e);
            }
        };
        self.dropped = channel.dropped_counter();
        self.status_tx.send_replace(JobStatus::Streaming);

        self.spawn_event_pump(channel);
        self.spawn_tick();

        info!("Meeting session started for job {}", self.config.job_id);
        Ok(())
    }

    /// Close the channel, stop the background tasks and return final stats.
    ///
    /// A manually stopped job goes back to idle; a completed or failed one
    /// keeps its terminal status. Safe to call more than once.
    pub async fn stop(&mut self) -> Result<SessionStats> {
        info!("Stopping meeting session for job {}", self.config.job_id);

        self.adapter.close();
        self.shutdown_tasks().await;

        if self.status() == JobStatus::Streaming {
            self.status_tx.send_replace(JobStatus::Idle);
        }
        self.monitor.lock().await.shutdown();

        info!("Meeting session stopped for job {}", self.config.job_id);
        Ok(self.stats().await)
    }

    /// Current session statistics.
    pub async fn stats(&self) -> SessionStats {
        let timer = self.timer.lock().await.state();
        let alert = self.monitor.lock().await.state().await;
        let transcript_segments = self.transcript.lock().await.len();
        let classifications = self.classifications.lock().await.len();

        SessionStats {
            job_id: self.config.job_id.clone(),
            status: self.status(),
            started_at: self.started_at,
            elapsed_seconds: timer.elapsed_seconds,
            scheduled_minutes: timer.scheduled_minutes,
            time_band: timer.band,
            transcript_segments,
            classifications,
            dropped_messages: self.dropped.load(Ordering::Relaxed),
            window_average: alert.window_average,
            banner_visible: alert.banner_visible,
            alert_active: alert.alert_active,
        }
    }

    /// Reconciled transcript, in first-append order.
    pub async fn transcript(&self) -> Vec<TranscriptSegment> {
        self.transcript.lock().await.segments().to_vec()
    }

    /// Reconciled classifications, in first-seen order.
    pub async fn classifications(&self) -> Vec<Classification> {
        self.classifications.lock().await.entries().to_vec()
    }

    /// Current drift banner and alert state.
    pub async fn alert_state(&self) -> AlertState {
        self.monitor.lock().await.state().await
    }

    /// Current meeting timer state.
    pub async fn timer_state(&self) -> TimerState {
        self.timer.lock().await.state()
    }

    /// Most recent error string, from a failed start or an upstream error
    /// event. Cleared on the next start.
    pub async fn failure(&self) -> Option<String> {
        self.failure.lock().await.clone()
    }

    /// Spawn the task that drains the job channel into the logs. This is
    /// the only place session state mutates once a run is live.
    fn spawn_event_pump(&mut self, mut channel: JobChannel) {
        let transcript = Arc::clone(&self.transcript);
        let classifications = Arc::clone(&self.classifications);
        let monitor = Arc::clone(&self.monitor);
        let failure = Arc::clone(&self.failure);
        let status_tx = Arc::clone(&self.status_tx);
        let job_id = self.config.job_id.clone();

        let event_task = tokio::spawn(async move {
            info!("Event pump started for job {}", job_id);

            while let Some(event) = channel.next_event().await {
                match event {
                    ChannelEvent::Transcript { action, payload } => {
                        let applied = transcript.lock().await.apply(action, payload);
                        if applied == Applied::Skipped {
                            // update for a segment we never saw; upstream
                            // will resend it as an append if it matters
                            debug!("Job {}: transcript update for unknown segment", job_id);
                        }
                    }
                    ChannelEvent::Classification { action, payload } => {
                        let mut log = classifications.lock().await;
                        log.apply(action, payload);
                        let status = *status_tx.borrow();
                        monitor.lock().await.recompute(&log, status).await;
                    }
                    ChannelEvent::Complete => {
                        info!("Job {}: stream complete", job_id);
                        monitor.lock().await.shutdown();
                        status_tx.send_replace(JobStatus::Complete);
                    }
                    ChannelEvent::Error { message } => {
                        warn!("Job {}: upstream error: {}", job_id, message);
                        *failure.lock().await = Some(message);
                    }
                }
            }

            // A stream that dies without completing leaves no live channel;
            // the job drops back to idle so the timer and the drift alert
            // stop with it
            if !channel.was_detached() && status_tx.borrow().is_streaming() {
                warn!("Job {}: event channel closed without completion", job_id);
                monitor.lock().await.shutdown();
                status_tx.send_replace(JobStatus::Idle);
            }
            info!("Event pump stopped for job {}", job_id);
        });
        self.event_task = Some(event_task);
    }

    /// Spawn the once-per-second tick that advances the meeting timer while
    /// the job is streaming. The task ends on its own once the job leaves
    /// the streaming state.
    fn spawn_tick(&mut self) {
        let timer = Arc::clone(&self.timer);
        let mut status_rx = self.status_tx.subscribe();

        let tick_task = tokio::spawn(async move {
            let period = Duration::from_secs(1);
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if status_rx.borrow().is_streaming() {
                            timer.lock().await.tick();
                        }
                    }
                    changed = status_rx.changed() => {
                        match changed {
                            Ok(()) if status_rx.borrow().is_streaming() => continue,
                            _ => break,
                        }
                    }
                }
            }
        });
        self.tick_task = Some(tick_task);
    }

    /// Wait out the event pump and stop the ticker. The channel must be
    /// closed first or the pump will not end.
    async fn shutdown_tasks(&mut self) {
        if let Some(task) = self.event_task.take() {
            if let Err(e) = task.await {
                error!("Event pump task panicked: {}", e);
            }
        }
        if let Some(task) = self.tick_task.take() {
            task.abort();
        }
    }
}

impl Drop for MeetingSession {
    fn drop(&mut self) {
        self.adapter.close();
        if let Some(task) = self.event_task.take() {
            task.abort();
        }
        if let Some(task) = self.tick_task.take() {
            task.abort();
        }
        if let Ok(mut monitor) = self.monitor.try_lock() {
            monitor.shutdown();
        }
    }
}
