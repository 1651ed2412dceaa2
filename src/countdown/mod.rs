//! Time-remaining labels and the re-tick cadence that goes with them.
//!
//! A "month" is always 30 days here, both for the compact tier threshold and for
//! the verbose breakdown.

use std::time::Duration;

use strum::{Display, IntoStaticStr};
use time::OffsetDateTime;

pub mod scheduler;

pub use scheduler::{
    CountdownHandle, CountdownScheduler, CountdownSink, CountdownSlot, SinkStatus, SlotSink,
    TaskStatus,
};

const SECOND_MS: i64 = 1_000;
const MINUTE_MS: i64 = 60 * SECOND_MS;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;
const MONTH_MS: i64 = 30 * DAY_MS;

const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 60 * SECONDS_PER_MINUTE;
const SECONDS_PER_DAY: i64 = 24 * SECONDS_PER_HOUR;
const SECONDS_PER_MONTH: i64 = 30 * SECONDS_PER_DAY;

pub const PASSED_LABEL: &str = "Deadline Passed";
pub const UNAVAILABLE_LABEL: &str = "Deadline Not Available";
pub const UNAVAILABLE_SHORT_LABEL: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownStyle {
    /// One dominant unit; cards and list rows.
    Compact,
    /// Full breakdown re-rendered every second; detail view.
    Verbose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Success,
    Warning,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownFrame {
    pub text: String,
    pub severity: Severity,
    /// `None` once the deadline has passed; nothing further to schedule.
    pub next_tick: Option<Duration>,
}

impl CountdownFrame {
    fn passed() -> Self {
        Self {
            text: PASSED_LABEL.to_string(),
            severity: Severity::Danger,
            next_tick: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.next_tick.is_none()
    }
}

pub fn remaining_millis(target: OffsetDateTime, now: OffsetDateTime) -> i64 {
    let millis = (target - now).whole_milliseconds();
    millis.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

pub fn frame_for(style: CountdownStyle, target: OffsetDateTime, now: OffsetDateTime) -> CountdownFrame {
    let remaining = remaining_millis(target, now);
    match style {
        CountdownStyle::Compact => compact_frame(remaining),
        CountdownStyle::Verbose => verbose_frame(remaining),
    }
}

pub fn compact_frame(remaining_ms: i64) -> CountdownFrame {
    if remaining_ms <= 0 {
        return CountdownFrame::passed();
    }
    let (text, severity, next_tick) = if remaining_ms >= MONTH_MS {
        (
            format!("in {}", unit(remaining_ms / MONTH_MS, "month")),
            Severity::Success,
            Duration::from_secs(24 * 60 * 60),
        )
    } else if remaining_ms >= DAY_MS {
        (
            format!("in {}", unit(remaining_ms / DAY_MS, "day")),
            Severity::Warning,
            Duration::from_secs(60 * 60),
        )
    } else if remaining_ms >= HOUR_MS {
        (
            format!("in {}", unit(remaining_ms / HOUR_MS, "hour")),
            Severity::Danger,
            Duration::from_secs(60),
        )
    } else {
        let minutes = remaining_ms / MINUTE_MS;
        let seconds = (remaining_ms % MINUTE_MS) / SECOND_MS;
        (
            format!("in {} {}", unit(minutes, "minute"), unit(seconds, "second")),
            Severity::Danger,
            Duration::from_secs(1),
        )
    };
    CountdownFrame {
        text,
        severity,
        next_tick: Some(next_tick),
    }
}

pub fn verbose_frame(remaining_ms: i64) -> CountdownFrame {
    if remaining_ms <= 0 {
        return CountdownFrame::passed();
    }
    let total = remaining_ms / SECOND_MS;
    let months = total / SECONDS_PER_MONTH;
    let days = (total % SECONDS_PER_MONTH) / SECONDS_PER_DAY;
    let hours = (total % SECONDS_PER_DAY) / SECONDS_PER_HOUR;
    let minutes = (total % SECONDS_PER_HOUR) / SECONDS_PER_MINUTE;
    let seconds = total % SECONDS_PER_MINUTE;

    let severity = if months > 0 {
        Severity::Success
    } else if days > 0 {
        Severity::Warning
    } else {
        Severity::Danger
    };

    let mut parts = Vec::with_capacity(5);
    if months > 0 {
        parts.push(unit(months, "month"));
    }
    if days > 0 {
        parts.push(unit(days, "day"));
    }
    parts.push(unit(hours, "hour"));
    if minutes > 0 {
        parts.push(unit(minutes, "minute"));
    }
    parts.push(unit(seconds, "second"));

    CountdownFrame {
        text: format!("in {}", parts.join(" ")),
        severity,
        next_tick: Some(Duration::from_secs(1)),
    }
}

/// "1 day", "0 days", "2 days".
pub fn unit(count: i64, word: &str) -> String {
    if count == 1 {
        format!("{count} {word}")
    } else {
        format!("{count} {word}s")
    }
}
