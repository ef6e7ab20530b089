//! Meeting-health monitoring: agenda drift alerts and the meeting timer.

pub mod alignment;
pub mod timer;

pub use alignment::{
    windowed_average, AlertState, AlignmentMonitor, DriftNotice, DriftNotifier, LogNotifier,
    MonitorConfig,
};
pub use timer::{extract_scheduled_minutes, MeetingTimer, TimeBand, TimerState};
