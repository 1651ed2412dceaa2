use std::borrow::Cow;

use indexmap::IndexSet;
use strum::{EnumIter, EnumString, IntoStaticStr};
use time::OffsetDateTime;

use crate::model::DeadlineRecord;

/// The four multi-select filter dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, IntoStaticStr)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum FilterCategory {
    #[strum(serialize = "topics", serialize = "topic")]
    Topic,
    SubmissionType,
    VenueType,
    Archival,
}

impl FilterCategory {
    pub fn label(self) -> &'static str {
        match self {
            FilterCategory::Topic => "Topics",
            FilterCategory::SubmissionType => "Submission Type",
            FilterCategory::VenueType => "Venue Type",
            FilterCategory::Archival => "Archival",
        }
    }

    /// Values a record contributes to this category (topics may yield several).
    pub fn values_of(self, record: &DeadlineRecord) -> Vec<&str> {
        match self {
            FilterCategory::Topic => record.topics().iter().map(String::as_str).collect(),
            FilterCategory::SubmissionType => vec![record.submission_type()],
            FilterCategory::VenueType => vec![record.venue_type()],
            FilterCategory::Archival => vec![record.archival()],
        }
    }
}

/// Everything the filter engine needs from one snapshot of application state.
#[derive(Debug, Clone, Default)]
pub struct FilterCriteria {
    pub query: String,
    pub show_past: bool,
    pub topics: IndexSet<String>,
    pub submission_types: IndexSet<String>,
    pub venue_types: IndexSet<String>,
    pub archival: IndexSet<String>,
}

impl FilterCriteria {
    pub fn has_selections(&self) -> bool {
        !self.topics.is_empty()
            || !self.submission_types.is_empty()
            || !self.venue_types.is_empty()
            || !self.archival.is_empty()
    }

    pub fn matches(&self, record: &DeadlineRecord, now: OffsetDateTime) -> bool {
        let needle = self.query.to_lowercase();
        self.matches_with_needle(record, &needle, now)
    }

    fn matches_with_needle(
        &self,
        record: &DeadlineRecord,
        needle: &str,
        now: OffsetDateTime,
    ) -> bool {
        if !self.show_past && record.due.is_past(now) {
            return false;
        }
        if !needle.is_empty() && !matches_text(record, needle) {
            return false;
        }
        if !self.topics.is_empty()
            && !record
                .topics()
                .iter()
                .any(|topic| self.topics.contains(topic))
        {
            return false;
        }
        if !selection_allows(&self.submission_types, record.submission_type()) {
            return false;
        }
        if !selection_allows(&self.venue_types, record.venue_type()) {
            return false;
        }
        selection_allows(&self.archival, record.archival())
    }
}

/// Keep records passing every criterion, in their original order.
pub fn filter_deadlines<'a>(
    records: &'a [DeadlineRecord],
    criteria: &FilterCriteria,
    now: OffsetDateTime,
) -> Vec<&'a DeadlineRecord> {
    let needle = criteria.query.to_lowercase();
    records
        .iter()
        .filter(|record| criteria.matches_with_needle(record, &needle, now))
        .collect()
}

fn selection_allows(selected: &IndexSet<String>, value: &str) -> bool {
    selected.is_empty() || selected.contains(value)
}

/// String forms of every field value, topics joined with commas.
pub fn searchable_values(record: &DeadlineRecord) -> Vec<Cow<'_, str>> {
    let entry = &record.entry;
    let mut values = vec![
        Cow::Owned(record.id.to_string()),
        Cow::Borrowed(entry.name_display.as_str()),
        Cow::Borrowed(entry.name_full.as_str()),
        Cow::Borrowed(entry.link.as_str()),
        Cow::Borrowed(entry.venue_type.as_str()),
        Cow::Borrowed(entry.submission_type.as_str()),
        Cow::Borrowed(entry.archival.as_str()),
        Cow::Borrowed(entry.city.as_str()),
        Cow::Borrowed(entry.country.as_str()),
        Cow::Borrowed(entry.event_dates.as_str()),
        Cow::Borrowed(entry.deadline.as_str()),
        Cow::Borrowed(entry.notes.as_str()),
        Cow::Owned(entry.topics.join(",")),
    ];
    if let Some(stage) = entry.submission_stage.as_deref() {
        values.push(Cow::Borrowed(stage));
    }
    values
}

fn matches_text(record: &DeadlineRecord, needle: &str) -> bool {
    searchable_values(record)
        .iter()
        .any(|value| value.to_lowercase().contains(needle))
}
