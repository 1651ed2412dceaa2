use time::format_description::well_known::Rfc3339;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::model::DeadlineRecord;

const LONG_DISPLAY: &[FormatItem<'static>] =
    format_description!("[month repr:long] [day padding:none], [year]");
const SHORT_DISPLAY: &[FormatItem<'static>] =
    format_description!("[month repr:short] [day padding:none], [year]");

pub const INVALID_DATE_LABEL: &str = "Invalid Date";

const NAIVE_DATETIME_FORMATS: [&[FormatItem<'static>]; 4] = [
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]"),
];

const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// A deadline field resolved once at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    Concrete(OffsetDateTime),
    Rolling,
    NotAvailable,
    /// Neither a special token nor a recognisable date.
    Invalid,
}

/// Ordering key: concrete instants ascending, everything else after them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DeadlineKey {
    At(OffsetDateTime),
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonthStyle {
    Long,
    Short,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDeadline {
    pub deadline: Deadline,
    pub display: String,
}

impl Deadline {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("rolling") {
            return Deadline::Rolling;
        }
        if trimmed.eq_ignore_ascii_case("n/a") {
            return Deadline::NotAvailable;
        }
        parse_instant(trimmed)
            .map(Deadline::Concrete)
            .unwrap_or(Deadline::Invalid)
    }

    /// True for the "Rolling" / "N/A" tokens.
    pub fn is_special(&self) -> bool {
        matches!(self, Deadline::Rolling | Deadline::NotAvailable)
    }

    pub fn instant(&self) -> Option<OffsetDateTime> {
        match self {
            Deadline::Concrete(at) => Some(*at),
            _ => None,
        }
    }

    pub fn sort_key(&self) -> DeadlineKey {
        match self {
            Deadline::Concrete(at) => DeadlineKey::At(*at),
            _ => DeadlineKey::Never,
        }
    }

    pub fn is_past(&self, now: OffsetDateTime) -> bool {
        matches!(self, Deadline::Concrete(at) if *at < now)
    }
}

fn parse_instant(input: &str) -> Option<OffsetDateTime> {
    if input.is_empty() {
        return None;
    }
    if let Ok(at) = OffsetDateTime::parse(input, &Rfc3339) {
        return Some(at);
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = PrimitiveDateTime::parse(input, format) {
            return Some(naive.assume_utc());
        }
    }
    Date::parse(input, DATE_FORMAT)
        .ok()
        .map(|date| date.midnight().assume_utc())
}

/// `<Month> <Day>, <Year>` in UTC.
pub fn format_date(at: OffsetDateTime, style: MonthStyle) -> String {
    let format = match style {
        MonthStyle::Long => LONG_DISPLAY,
        MonthStyle::Short => SHORT_DISPLAY,
    };
    at.to_offset(UtcOffset::UTC)
        .format(format)
        .unwrap_or_else(|err| {
            tracing::warn!(%err, "formatting deadline date");
            INVALID_DATE_LABEL.to_string()
        })
}

pub fn parse_deadline(record: &DeadlineRecord, style: MonthStyle) -> ParsedDeadline {
    let deadline = record.due;
    let display = match deadline {
        Deadline::Concrete(at) => format_date(at, style),
        Deadline::Rolling | Deadline::NotAvailable => record.deadline_raw().to_string(),
        Deadline::Invalid => INVALID_DATE_LABEL.to_string(),
    };
    ParsedDeadline { deadline, display }
}
