use crate::reconcile::{Classification, TranscriptSegment};
use serde::{Deserialize, Serialize};

/// How an event applies to the stored log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventAction {
    /// Insert a new entry (merge if the key is already known).
    #[default]
    Append,
    /// Revise an existing entry.
    Update,
}

/// One typed event on a job channel.
///
/// The wire form is a JSON object tagged by `type`; unknown extra fields
/// are ignored so upstream can grow the payloads without breaking us.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChannelEvent {
    /// A transcript utterance, new or revised.
    Transcript {
        #[serde(default)]
        action: EventAction,
        payload: TranscriptSegment,
    },
    /// An agenda-alignment verdict, new or revised.
    Classification {
        #[serde(default)]
        action: EventAction,
        payload: Classification,
    },
    /// Upstream finished the job; nothing further will arrive.
    Complete,
    /// Upstream hit a fault. The channel stays open; later events may
    /// still arrive.
    Error { message: String },
}

/// Parse one raw channel message into a typed event.
///
/// Anything that does not parse as a known event shape is rejected; the
/// caller drops it without disturbing already-reconciled state.
pub fn classify(raw: &[u8]) -> Result<ChannelEvent, serde_json::Error> {
    serde_json::from_slice(raw)
}
