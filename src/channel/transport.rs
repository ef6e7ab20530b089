use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// The raw message stream for one job, as delivered by a transport.
///
/// The handle owns the underlying subscription. Closing it (explicitly or
/// by drop) detaches the subscription and no message is delivered through
/// [`ChannelHandle::recv`] afterwards, buffered or not.
pub struct ChannelHandle {
    job_id: String,
    rx: mpsc::Receiver<Vec<u8>>,
    pump: Option<JoinHandle<()>>,
    closed: bool,
}

impl ChannelHandle {
    pub fn new(
        job_id: impl Into<String>,
        rx: mpsc::Receiver<Vec<u8>>,
        pump: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            rx,
            pump,
            closed: false,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Next raw message, or `None` once the channel has closed from either
    /// side.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        if self.closed {
            return None;
        }
        self.rx.recv().await
    }

    /// Detach from the transport. Idempotent, and effective immediately:
    /// no further message is delivered once this returns.
    pub fn close(&mut self) {
        self.closed = true;
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        self.rx.close();
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Source of per-job event channels.
///
/// A transport only moves raw bytes; parsing and lifecycle interpretation
/// happen above it in the adapter.
#[async_trait]
pub trait EventTransport: Send + Sync {
    /// Open the inbound message channel for one job.
    async fn open(&self, job_id: &str) -> Result<ChannelHandle>;
}

/// In-memory transport for tests and offline runs.
///
/// A job is registered up front, which hands back the sending half of its
/// channel; `open` then claims the receiving half. Each registration backs
/// exactly one open.
#[derive(Default)]
pub struct LocalTransport {
    pending: Mutex<HashMap<String, mpsc::Receiver<Vec<u8>>>>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job and return the sender that feeds its channel.
    pub async fn register(&self, job_id: &str) -> mpsc::Sender<Vec<u8>> {
        let (tx, rx) = mpsc::channel(64);
        self.pending.lock().await.insert(job_id.to_string(), rx);
        tx
    }
}

#[async_trait]
impl EventTransport for LocalTransport {
    async fn open(&self, job_id: &str) -> Result<ChannelHandle> {
        let rx = self
            .pending
            .lock()
            .await
            .remove(job_id)
            .with_context(|| format!("No registered channel for job {job_id}"))?;
        Ok(ChannelHandle::new(job_id, rx, None))
    }
}
