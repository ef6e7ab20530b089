//! Ordered reconciliation of job channel events into meeting state.
//!
//! Transcript and classification events arrive over a lossy, reordering
//! channel. The logs here absorb duplicates, replays and out-of-order
//! revisions so that the stored state converges on what upstream last said.

pub mod classification;
pub mod transcript;

pub use classification::{is_substantive, Classification, ClassificationLog, ClassificationMethod};
pub use transcript::{SegmentKey, TranscriptLog, TranscriptSegment};

/// Outcome of applying one event to a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// A new entry was added at the tail.
    Inserted,
    /// An existing entry was replaced in place.
    Replaced,
    /// The event referenced an unknown entry and was ignored.
    Skipped,
}
