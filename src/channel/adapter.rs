use super::messages::{classify, ChannelEvent};
use super::transport::{ChannelHandle, EventTransport};
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Observed lifecycle of a job channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Receiving events.
    Open,
    /// An upstream `error` event was seen. The channel keeps receiving
    /// until the caller closes it.
    Errored,
    /// Detached; no further events will surface.
    Closed,
}

/// A live, typed event channel for one job.
///
/// Wraps a transport handle and hands well-formed [`ChannelEvent`]s to the
/// caller. Malformed messages are dropped with a warning and counted; they
/// never surface and never disturb channel state. A `complete` event closes
/// the channel from the inside, so the caller cannot receive past the end
/// of the stream.
pub struct JobChannel {
    handle: ChannelHandle,
    shutdown: watch::Receiver<bool>,
    state: ChannelState,
    dropped: Arc<AtomicU64>,
    detached: bool,
}

impl JobChannel {
    pub fn job_id(&self) -> &str {
        self.handle.job_id()
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Shared counter of malformed messages dropped on this channel.
    pub fn dropped_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.dropped)
    }

    /// Whether the channel ended because the adapter closed or replaced it,
    /// as opposed to the stream ending on the transport side.
    pub fn was_detached(&self) -> bool {
        self.detached
    }

    /// Next well-formed event, or `None` once the channel is closed.
    ///
    /// Returns immediately with `None` after the adapter that opened this
    /// channel closes it or replaces it, even mid-wait. The shutdown signal
    /// is checked before the transport, so a close wins over any message
    /// still sitting in the buffer.
    pub async fn next_event(&mut self) -> Option<ChannelEvent> {
        loop {
            if self.state == ChannelState::Closed {
                return None;
            }
            let raw = tokio::select! {
                biased;
                _ = self.shutdown.changed() => {
                    self.detached = true;
                    self.close();
                    return None;
                }
                raw = self.handle.recv() => raw,
            };
            let Some(raw) = raw else {
                self.close();
                return None;
            };
            match classify(&raw) {
                Ok(ChannelEvent::Complete) => {
                    self.close();
                    return Some(ChannelEvent::Complete);
                }
                Ok(ChannelEvent::Error { message }) => {
                    self.state = ChannelState::Errored;
                    return Some(ChannelEvent::Error { message });
                }
                Ok(event) => return Some(event),
                Err(err) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        "Job {}: dropping malformed channel message: {}",
                        self.handle.job_id(),
                        err
                    );
                }
            }
        }
    }

    /// Detach from the transport. Idempotent.
    pub fn close(&mut self) {
        self.handle.close();
        self.state = ChannelState::Closed;
    }
}

/// Opens and retires job channels over a transport.
///
/// The adapter enforces one live channel per caller: opening a channel
/// implicitly closes whichever one this adapter opened before, even if that
/// channel has since been moved into another task.
pub struct ChannelAdapter {
    transport: Arc<dyn EventTransport>,
    active: Option<watch::Sender<bool>>,
}

impl ChannelAdapter {
    pub fn new(transport: Arc<dyn EventTransport>) -> Self {
        Self {
            transport,
            active: None,
        }
    }

    /// Open the event channel for `job_id`, closing any previously opened
    /// channel first.
    pub async fn open(&mut self, job_id: &str) -> Result<JobChannel> {
        self.close();
        let handle = self
            .transport
            .open(job_id)
            .await
            .with_context(|| format!("Failed to open event channel for job {job_id}"))?;
        let (tx, rx) = watch::channel(false);
        self.active = Some(tx);
        info!("Event channel open for job {}", job_id);
        Ok(JobChannel {
            handle,
            shutdown: rx,
            state: ChannelState::Open,
            dropped: Arc::new(AtomicU64::new(0)),
            detached: false,
        })
    }

    /// Close the channel this adapter last opened, if any. Idempotent.
    pub fn close(&mut self) {
        if let Some(tx) = self.active.take() {
            let _ = tx.send(true);
        }
    }
}

impl Drop for ChannelAdapter {
    fn drop(&mut self) {
        self.close();
    }
}
