use regex::Regex;
use serde::{Deserialize, Serialize};

/// Remaining-time fraction at or below which the timer turns amber.
const WARNING_REMAINING_PERCENT: i64 = 15;

/// Pull a scheduled duration in minutes out of free-form agenda text.
///
/// Minutes notations win over hour notations when both appear, so
/// "研修は90分、枠は2時間" reads as 90. Japanese and English units are
/// recognized; anything else yields no schedule.
pub fn extract_scheduled_minutes(agenda: &str) -> Option<u32> {
    let minutes = Regex::new(r"([0-9]+)\s*(?:分|minutes?)").unwrap();
    if let Some(captures) = minutes.captures(agenda) {
        if let Ok(value) = captures[1].parse::<u32>() {
            return Some(value);
        }
    }
    let hours = Regex::new(r"([0-9]+)\s*(?:時間|hours?)").unwrap();
    if let Some(captures) = hours.captures(agenda) {
        if let Ok(value) = captures[1].parse::<u32>() {
            return Some(value.saturating_mul(60));
        }
    }
    None
}

/// Color band for elapsed-versus-scheduled time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeBand {
    Normal,
    /// 15% or less of the scheduled time remains.
    Warning,
    /// The scheduled time is used up.
    Danger,
}

impl TimeBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeBand::Normal => "normal",
            TimeBand::Warning => "warning",
            TimeBand::Danger => "danger",
        }
    }
}

/// Snapshot of the timer for display and stats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerState {
    pub elapsed_seconds: u64,
    pub scheduled_minutes: Option<u32>,
    pub band: TimeBand,
}

/// Elapsed wall-clock meter for one meeting job.
///
/// The timer itself is passive: the session ticks it once per second while
/// the job is streaming and leaves it frozen otherwise, so elapsed time
/// measures streaming time, not session lifetime. Without a scheduled
/// duration the band stays `Normal` forever.
#[derive(Debug, Clone)]
pub struct MeetingTimer {
    elapsed_seconds: u64,
    scheduled_minutes: Option<u32>,
}

impl MeetingTimer {
    /// Build a timer whose schedule is read from agenda text.
    pub fn from_agenda(agenda: &str) -> Self {
        Self {
            elapsed_seconds: 0,
            scheduled_minutes: extract_scheduled_minutes(agenda),
        }
    }

    /// Advance one second.
    pub fn tick(&mut self) {
        self.elapsed_seconds = self.elapsed_seconds.saturating_add(1);
    }

    /// Restart from zero, keeping the schedule.
    pub fn reset(&mut self) {
        self.elapsed_seconds = 0;
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    pub fn scheduled_minutes(&self) -> Option<u32> {
        self.scheduled_minutes
    }

    /// Current band. Exact integer math: the warning edge is
    /// `remaining * 100 <= total * 15`, so 15.0% remaining is already
    /// warning territory.
    pub fn band(&self) -> TimeBand {
        let Some(minutes) = self.scheduled_minutes else {
            return TimeBand::Normal;
        };
        let total = i64::from(minutes) * 60;
        let remaining = total - self.elapsed_seconds as i64;
        if remaining <= 0 {
            TimeBand::Danger
        } else if remaining * 100 <= total * WARNING_REMAINING_PERCENT {
            TimeBand::Warning
        } else {
            TimeBand::Normal
        }
    }

    pub fn state(&self) -> TimerState {
        TimerState {
            elapsed_seconds: self.elapsed_seconds,
            scheduled_minutes: self.scheduled_minutes,
            band: self.band(),
        }
    }
}
