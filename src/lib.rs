pub mod channel;
pub mod config;
pub mod monitor;
pub mod reconcile;
pub mod session;

pub use channel::{
    classify, ChannelAdapter, ChannelEvent, ChannelHandle, ChannelState, EventAction,
    EventTransport, JobChannel, LocalTransport, NatsTransport,
};
pub use config::Config;
pub use monitor::{
    extract_scheduled_minutes, windowed_average, AlertState, AlignmentMonitor, DriftNotice,
    DriftNotifier, LogNotifier, MeetingTimer, MonitorConfig, TimeBand, TimerState,
};
pub use reconcile::{
    is_substantive, Applied, Classification, ClassificationLog, ClassificationMethod, SegmentKey,
    TranscriptLog, TranscriptSegment,
};
pub use session::{JobStatus, MeetingSession, SessionConfig, SessionStats};
