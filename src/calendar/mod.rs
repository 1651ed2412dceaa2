//! iCalendar files and Google Calendar links for single deadlines.

use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use thiserror::Error;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, UtcOffset};
use uuid::Uuid;

use crate::model::DeadlineRecord;

const ALL_DAY_FORMAT: &[FormatItem<'static>] = format_description!("[year][month][day]");
const STAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year][month][day]T[hour][minute][second]Z");

static FILE_NAME_SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s,&/]+").expect("valid file name regex"));

static GOOGLE_RENDER_URL: Lazy<Url> = Lazy::new(|| {
    Url::parse("https://calendar.google.com/calendar/render").expect("valid google calendar url")
});

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("formatting calendar date")]
    Format(#[from] time::error::Format),
    #[error("writing calendar file {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// All-day event date for a concrete deadline, in UTC.
fn event_date(record: &DeadlineRecord) -> Option<Date> {
    record
        .due
        .instant()
        .map(|at| at.to_offset(UtcOffset::UTC).date())
}

fn description_lines(record: &DeadlineRecord) -> [String; 7] {
    [
        format!("Full Name: {}", record.name_full()),
        format!("Submission Type: {}", record.submission_type()),
        format!("Venue: {}", record.venue_type()),
        format!("Archival: {}", record.archival()),
        format!("Location: {}", record.location()),
        format!("Event Dates: {}", record.event_dates()),
        format!("Notes: {}", record.notes()),
    ]
}

/// TEXT value escaping from RFC 5545 section 3.3.11.
pub fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            other => out.push(other),
        }
    }
    out
}

/// One all-day VEVENT on the deadline's UTC date. `None` unless the deadline is concrete.
pub fn generate_ics(
    record: &DeadlineRecord,
    stamp: OffsetDateTime,
    uid: &str,
) -> Result<Option<String>, CalendarError> {
    let Some(date) = event_date(record) else {
        return Ok(None);
    };
    let description = description_lines(record)
        .iter()
        .map(|line| escape_text(line))
        .collect::<Vec<_>>()
        .join("\\n\\n");
    let lines = [
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        "BEGIN:VEVENT".to_string(),
        format!("UID:{uid}@deadline-hub"),
        format!(
            "DTSTAMP:{}",
            stamp.to_offset(UtcOffset::UTC).format(STAMP_FORMAT)?
        ),
        format!("DTSTART;VALUE=DATE:{}", date.format(ALL_DAY_FORMAT)?),
        format!("SUMMARY:{}", escape_text(record.name_display())),
        format!("DESCRIPTION:{description}"),
        "END:VEVENT".to_string(),
        "END:VCALENDAR".to_string(),
    ];
    Ok(Some(lines.join("\r\n")))
}

/// `generate_ics` stamped now with a fresh random uid.
pub fn ics_for(record: &DeadlineRecord) -> Result<Option<String>, CalendarError> {
    let uid = Uuid::new_v4().to_string();
    generate_ics(record, OffsetDateTime::now_utc(), &uid)
}

pub fn ics_file_name(name_display: &str) -> String {
    format!(
        "{}-deadline.ics",
        FILE_NAME_SEPARATORS.replace_all(name_display, "-")
    )
}

/// Write the event into `dir`, creating it if needed. `None` for special deadlines.
pub fn write_ics(record: &DeadlineRecord, dir: &Path) -> Result<Option<PathBuf>, CalendarError> {
    let Some(content) = ics_for(record)? else {
        tracing::info!(id = record.id, "no concrete deadline; skipping ics export");
        return Ok(None);
    };
    let path = dir.join(ics_file_name(record.name_display()));
    let write_error = |source| CalendarError::Write {
        path: path.clone(),
        source,
    };
    fs::create_dir_all(dir).map_err(write_error)?;
    fs::write(&path, content).map_err(write_error)?;
    tracing::info!(id = record.id, path = %path.display(), "exported ics");
    Ok(Some(path))
}

/// Pre-filled "add event" link for a one-day event on the deadline date.
pub fn google_calendar_url(record: &DeadlineRecord) -> Result<Option<String>, CalendarError> {
    let Some(start) = event_date(record) else {
        return Ok(None);
    };
    let end = start.saturating_add(Duration::days(1));
    let dates = format!(
        "{}/{}",
        start.format(ALL_DAY_FORMAT)?,
        end.format(ALL_DAY_FORMAT)?
    );
    let details = description_lines(record).join("\n\n");

    let mut url = GOOGLE_RENDER_URL.clone();
    url.query_pairs_mut()
        .append_pair("action", "TEMPLATE")
        .append_pair("text", record.name_display())
        .append_pair("dates", &dates)
        .append_pair("details", &details)
        .append_pair("location", &record.location());
    Ok(Some(url.to_string()))
}
