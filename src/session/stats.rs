use super::status::JobStatus;
use crate::monitor::TimeBand;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time summary of a meeting session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Job this session follows.
    pub job_id: String,

    /// Current lifecycle status.
    pub status: JobStatus,

    /// When the current run started.
    pub started_at: DateTime<Utc>,

    /// Seconds of streaming time accumulated by the meeting timer.
    pub elapsed_seconds: u64,

    /// Scheduled duration read from the agenda, if one was found.
    pub scheduled_minutes: Option<u32>,

    /// Elapsed-versus-scheduled color band.
    pub time_band: TimeBand,

    /// Transcript segments currently reconciled.
    pub transcript_segments: usize,

    /// Classification entries currently reconciled.
    pub classifications: usize,

    /// Malformed channel messages dropped since the channel opened.
    pub dropped_messages: u64,

    /// Current drift window average, if enough data exists.
    pub window_average: Option<u32>,

    /// Whether the drift banner is showing.
    pub banner_visible: bool,

    /// Whether the audible drift alert is active.
    pub alert_active: bool,
}
