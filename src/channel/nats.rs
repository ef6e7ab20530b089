use super::messages::ChannelEvent;
use super::transport::{ChannelHandle, EventTransport};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Job channels carried over NATS pub/sub.
///
/// Each job maps to one subject, `{prefix}.job-{job_id}`. Subscriptions are
/// per job; the subscriber task forwards raw payloads into the channel
/// handle and ends when the handle closes.
pub struct NatsTransport {
    client: async_nats::Client,
    subject_prefix: String,
}

impl NatsTransport {
    pub async fn connect(url: &str, subject_prefix: impl Into<String>) -> Result<Self> {
        info!("Connecting to NATS at {}", url);
        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;
        Ok(Self {
            client,
            subject_prefix: subject_prefix.into(),
        })
    }

    fn subject_for(&self, job_id: &str) -> String {
        format!("{}.job-{}", self.subject_prefix, job_id)
    }

    /// Publish one event onto a job's channel. This is the producer side,
    /// used by upstream services and by test drivers.
    pub async fn publish(&self, job_id: &str, event: &ChannelEvent) -> Result<()> {
        let subject = self.subject_for(job_id);
        let payload = serde_json::to_vec(event).context("Failed to serialize channel event")?;
        self.client
            .publish(subject, payload.into())
            .await
            .context("Failed to publish channel event")?;
        Ok(())
    }
}

#[async_trait]
impl EventTransport for NatsTransport {
    async fn open(&self, job_id: &str) -> Result<ChannelHandle> {
        let subject = self.subject_for(job_id);
        info!("Subscribing to {}", subject);
        let mut subscriber = self
            .client
            .subscribe(subject.clone())
            .await
            .with_context(|| format!("Failed to subscribe to {subject}"))?;

        let (tx, rx) = mpsc::channel(256);
        let pump = tokio::spawn(async move {
            while let Some(message) = subscriber.next().await {
                if tx.send(message.payload.to_vec()).await.is_err() {
                    // receiving side closed the channel
                    break;
                }
            }
            debug!("Subscription on {} ended", subject);
        });

        Ok(ChannelHandle::new(job_id, rx, Some(pump)))
    }
}
