use serde::{Deserialize, Serialize, Serializer};

use crate::deadline::Deadline;

/// One object from the JSON feed, exactly as published.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedEntry {
    pub name_display: String,
    pub name_full: String,
    pub link: String,
    pub venue_type: String,
    pub submission_type: String,
    pub archival: String,
    pub city: String,
    pub country: String,
    pub event_dates: String,
    pub deadline: String,
    pub notes: String,
    pub topics: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_stage: Option<String>,
}

/// A feed entry after load: positional id assigned and deadline parsed once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeadlineRecord {
    pub id: usize,
    #[serde(flatten)]
    pub entry: FeedEntry,
    #[serde(skip)]
    pub due: Deadline,
}

impl DeadlineRecord {
    pub fn from_entry(id: usize, entry: FeedEntry) -> Self {
        let due = Deadline::parse(&entry.deadline);
        Self { id, entry, due }
    }

    pub fn name_display(&self) -> &str {
        &self.entry.name_display
    }

    pub fn name_full(&self) -> &str {
        &self.entry.name_full
    }

    pub fn link(&self) -> &str {
        &self.entry.link
    }

    pub fn venue_type(&self) -> &str {
        &self.entry.venue_type
    }

    pub fn submission_type(&self) -> &str {
        &self.entry.submission_type
    }

    pub fn archival(&self) -> &str {
        &self.entry.archival
    }

    pub fn city(&self) -> &str {
        &self.entry.city
    }

    pub fn country(&self) -> &str {
        &self.entry.country
    }

    pub fn event_dates(&self) -> &str {
        &self.entry.event_dates
    }

    pub fn notes(&self) -> &str {
        &self.entry.notes
    }

    pub fn topics(&self) -> &[String] {
        &self.entry.topics
    }

    /// Raw deadline text from the feed ("2026-03-15T23:59:59Z", "Rolling", ...).
    pub fn deadline_raw(&self) -> &str {
        &self.entry.deadline
    }

    /// Stage label for multi-stage venues. Empty strings count as absent.
    pub fn submission_stage(&self) -> Option<&str> {
        self.entry
            .submission_stage
            .as_deref()
            .filter(|stage| !stage.is_empty())
    }

    pub fn location(&self) -> String {
        format!("{}, {}", self.city(), self.country())
    }
}

/// Several stages of one venue collapsed into a single render item.
///
/// Shared fields come from the first member; `entries` keeps sorted order and
/// always holds at least two records once grouping has finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupedView<'a> {
    pub name_display: &'a str,
    pub name_full: String,
    pub link: &'a str,
    pub venue_type: &'a str,
    pub submission_type: &'a str,
    pub archival: &'a str,
    pub city: &'a str,
    pub country: &'a str,
    pub event_dates: &'a str,
    pub topics: &'a [String],
    pub entries: Vec<&'a DeadlineRecord>,
}

impl<'a> GroupedView<'a> {
    pub fn location(&self) -> String {
        format!("{}, {}", self.city, self.country)
    }

    /// Id of the first stage; stable handle for the group within one load.
    pub fn anchor_id(&self) -> usize {
        self.entries.first().map(|entry| entry.id).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderItem<'a> {
    Single(&'a DeadlineRecord),
    Group(GroupedView<'a>),
}

impl<'a> RenderItem<'a> {
    pub fn is_group(&self) -> bool {
        matches!(self, RenderItem::Group(_))
    }

    pub fn name_display(&self) -> &'a str {
        match self {
            RenderItem::Single(record) => &record.entry.name_display,
            RenderItem::Group(group) => group.name_display,
        }
    }

    /// Member records in display order; a single record yields itself.
    pub fn records(&self) -> Vec<&'a DeadlineRecord> {
        match self {
            RenderItem::Single(record) => vec![*record],
            RenderItem::Group(group) => group.entries.clone(),
        }
    }
}

#[derive(Serialize)]
struct GroupedViewJson<'g, 'a> {
    #[serde(rename = "isGroup")]
    is_group: bool,
    name_display: &'a str,
    name_full: &'g str,
    link: &'a str,
    venue_type: &'a str,
    submission_type: &'a str,
    archival: &'a str,
    city: &'a str,
    country: &'a str,
    event_dates: &'a str,
    topics: &'a [String],
    entries: &'g [&'a DeadlineRecord],
}

impl Serialize for RenderItem<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RenderItem::Single(record) => record.serialize(serializer),
            RenderItem::Group(group) => GroupedViewJson {
                is_group: true,
                name_display: group.name_display,
                name_full: &group.name_full,
                link: group.link,
                venue_type: group.venue_type,
                submission_type: group.submission_type,
                archival: group.archival,
                city: group.city,
                country: group.country,
                event_dates: group.event_dates,
                topics: group.topics,
                entries: &group.entries,
            }
            .serialize(serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult<T = ()> = anyhow::Result<T>;

    #[test]
    fn feed_entry_defaults_missing_fields() -> TestResult {
        let entry: FeedEntry =
            serde_json::from_str(r#"{"name_display":"ACL","deadline":"Rolling"}"#)?;
        assert_eq!(entry.name_display, "ACL");
        assert!(entry.topics.is_empty());
        assert!(entry.submission_stage.is_none());
        Ok(())
    }

    #[test]
    fn only_empty_stage_counts_as_absent() {
        let stage = |raw: &str| {
            let entry = FeedEntry {
                submission_stage: Some(raw.into()),
                deadline: "N/A".into(),
                ..FeedEntry::default()
            };
            DeadlineRecord::from_entry(0, entry)
        };
        assert_eq!(stage("").submission_stage(), None);
        assert_eq!(stage("  ").submission_stage(), Some("  "));
    }

    #[test]
    fn single_item_serializes_without_group_marker() -> TestResult {
        let entry = FeedEntry {
            name_display: "ICWSM".into(),
            deadline: "2099-01-15".into(),
            ..FeedEntry::default()
        };
        let record = DeadlineRecord::from_entry(3, entry);
        let value = serde_json::to_value(RenderItem::Single(&record))?;
        assert_eq!(value["id"], 3);
        assert_eq!(value["name_display"], "ICWSM");
        assert!(value.get("isGroup").is_none());
        Ok(())
    }
}
