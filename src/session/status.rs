use serde::{Deserialize, Serialize};

/// Externally visible lifecycle of one meeting job.
///
/// `Error` is reserved for failures to start the stream at all. A fault
/// reported mid-stream arrives as an event and leaves the job streaming,
/// since upstream may still deliver after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// No live channel.
    Idle,
    /// Channel open, events flowing.
    Streaming,
    /// Upstream declared the job finished.
    Complete,
    /// The stream could not be started.
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Idle => "idle",
            JobStatus::Streaming => "streaming",
            JobStatus::Complete => "complete",
            JobStatus::Error => "error",
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, JobStatus::Streaming)
    }

    /// Whether the job has reached a state it will not leave on its own.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Error)
    }
}
