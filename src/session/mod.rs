//! Meeting session management
//!
//! This module provides the `MeetingSession` abstraction that manages:
//! - The job's event channel lifecycle (open, restart, teardown)
//! - Transcript and classification reconciliation
//! - Agenda drift monitoring and alert state
//! - The elapsed-versus-scheduled meeting timer
//! - Session statistics and status reporting

mod config;
mod session;
mod stats;
mod status;

pub use config::SessionConfig;
pub use session::MeetingSession;
pub use stats::SessionStats;
pub use status::JobStatus;
