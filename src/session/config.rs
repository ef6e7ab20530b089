use crate::monitor::MonitorConfig;
use serde::{Deserialize, Serialize};

/// Configuration for one meeting job session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Job identifier; also the channel routing key.
    pub job_id: String,

    /// Raw agenda text. The scheduled duration is extracted from it once,
    /// when the session is built.
    pub agenda_text: String,

    /// Drift alert thresholds and window sizing.
    pub monitor: MonitorConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            job_id: format!("job-{}", uuid::Uuid::new_v4()),
            agenda_text: String::new(),
            monitor: MonitorConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn for_job(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            ..Self::default()
        }
    }
}
