use super::Applied;
use crate::channel::EventAction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A single transcript utterance as delivered over the job channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Utterance index assigned upstream. Monotonically assigned, but not
    /// necessarily contiguous and not necessarily in arrival order.
    pub index: u64,

    /// Opaque upstream result identifier. When present it is the
    /// authoritative merge key for this segment.
    #[serde(default)]
    pub result_id: Option<String>,

    /// Display speaker label (after upstream speaker mapping).
    pub speaker: String,

    /// Raw upstream speaker tag, before mapping (e.g. "spk_0").
    #[serde(default)]
    pub raw_speaker: Option<String>,

    /// Transcribed text. May be replaced wholesale by a later event.
    pub text: String,

    /// Display timestamp assigned upstream; opaque to the reconciler.
    pub timestamp: String,
}

/// Merge identity of a transcript segment: the upstream `result_id` when
/// present, otherwise the utterance index.
///
/// Every merge operation derives keys through [`SegmentKey::for_segment`],
/// so the two key styles are never special-cased anywhere else.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SegmentKey {
    Result(String),
    Index(u64),
}

impl SegmentKey {
    pub fn for_segment(segment: &TranscriptSegment) -> Self {
        match &segment.result_id {
            Some(id) => Self::Result(id.clone()),
            None => Self::Index(segment.index),
        }
    }
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Result(id) => write!(f, "{id}"),
            Self::Index(index) => write!(f, "idx-{index}"),
        }
    }
}

/// The ordered, deduplicated transcript of one meeting job.
///
/// Segments are kept in first-append order and never reordered; later
/// events for a known key replace the stored fields in place. The log is
/// safe against retransmission (a duplicate append merges instead of
/// duplicating) and against reordering of updates relative to their append.
#[derive(Debug, Default)]
pub struct TranscriptLog {
    segments: Vec<TranscriptSegment>,
    positions: HashMap<SegmentKey, usize>,
}

impl TranscriptLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one transcript event.
    ///
    /// `append` inserts at the tail for an unknown key and merge-replaces
    /// in place for a known one. `update` merge-replaces a known key and is
    /// a no-op for an unknown key: an update alone never materializes a
    /// segment.
    pub fn apply(&mut self, action: EventAction, segment: TranscriptSegment) -> Applied {
        let key = SegmentKey::for_segment(&segment);
        if let Some(&position) = self.positions.get(&key) {
            self.segments[position] = segment;
            return Applied::Replaced;
        }
        match action {
            EventAction::Append => {
                self.positions.insert(key, self.segments.len());
                self.segments.push(segment);
                Applied::Inserted
            }
            EventAction::Update => Applied::Skipped,
        }
    }

    /// Segments in first-append order.
    pub fn segments(&self) -> &[TranscriptSegment] {
        &self.segments
    }

    pub fn get(&self, key: &SegmentKey) -> Option<&TranscriptSegment> {
        self.positions
            .get(key)
            .map(|&position| &self.segments[position])
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn clear(&mut self) {
        self.segments.clear();
        self.positions.clear();
    }
}
