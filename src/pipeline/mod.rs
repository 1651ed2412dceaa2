//! Filter → sort → group, the pass that turns loaded records into what gets drawn.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use time::OffsetDateTime;

use crate::model::{DeadlineRecord, GroupedView, RenderItem};
use crate::search::{filter_deadlines, FilterCriteria};

pub mod facets;

pub use facets::{facet_counts, upcoming, venue_names, FacetList, FacetValue};

static TRAILING_PARENTHETICAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\([^()]*\)\s*$").expect("valid suffix regex"));

/// Stable ascending sort by deadline; "Rolling"/"N/A" (and unparseable dates) go last.
pub fn sort_deadlines<'a>(records: &[&'a DeadlineRecord]) -> Vec<&'a DeadlineRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by_key(|record| record.due.sort_key());
    sorted
}

/// Collapse stage records sharing `(name_display, submission_type)` into groups.
///
/// A group sits where its first member appeared; later members are appended in
/// input order even when other items came in between. Groups left with a single
/// member are unwrapped back into a plain record at the same position.
pub fn group_deadlines<'a>(sorted: &[&'a DeadlineRecord]) -> Vec<RenderItem<'a>> {
    let mut items: Vec<RenderItem<'a>> = Vec::with_capacity(sorted.len());
    let mut positions: HashMap<(&'a str, &'a str), usize> = HashMap::new();

    for &record in sorted {
        if record.submission_stage().is_none() {
            items.push(RenderItem::Single(record));
            continue;
        }
        let key = (
            record.entry.name_display.as_str(),
            record.entry.submission_type.as_str(),
        );
        match positions.get(&key) {
            Some(&index) => {
                if let RenderItem::Group(group) = &mut items[index] {
                    group.entries.push(record);
                }
            }
            None => {
                positions.insert(key, items.len());
                items.push(RenderItem::Group(seed_group(record)));
            }
        }
    }

    items
        .into_iter()
        .map(|item| match item {
            RenderItem::Group(group) if group.entries.len() == 1 => {
                RenderItem::Single(group.entries[0])
            }
            other => other,
        })
        .collect()
}

fn seed_group(record: &DeadlineRecord) -> GroupedView<'_> {
    let entry = &record.entry;
    GroupedView {
        name_display: &entry.name_display,
        name_full: strip_parenthetical(&entry.name_full),
        link: &entry.link,
        venue_type: &entry.venue_type,
        submission_type: &entry.submission_type,
        archival: &entry.archival,
        city: &entry.city,
        country: &entry.country,
        event_dates: &entry.event_dates,
        topics: &entry.topics,
        entries: vec![record],
    }
}

/// "Foo Conference (Workshop)" -> "Foo Conference".
pub fn strip_parenthetical(name: &str) -> String {
    TRAILING_PARENTHETICAL.replace(name, "").trim().to_string()
}

/// One full render pass over a consistent snapshot.
pub fn render_list<'a>(
    records: &'a [DeadlineRecord],
    criteria: &FilterCriteria,
    now: OffsetDateTime,
) -> Vec<RenderItem<'a>> {
    let filtered = filter_deadlines(records, criteria, now);
    let sorted = sort_deadlines(&filtered);
    let items = group_deadlines(&sorted);
    tracing::debug!(
        total = records.len(),
        filtered = filtered.len(),
        rendered = items.len(),
        "render pass complete"
    );
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FeedEntry;
    use assert_matches::assert_matches;
    use time::macros::datetime;

    type TestResult<T = ()> = anyhow::Result<T>;

    const NOW: OffsetDateTime = datetime!(2026-10-17 12:00:00 UTC);

    fn entry(name: &str, submission_type: &str, deadline: &str) -> FeedEntry {
        FeedEntry {
            name_display: name.into(),
            name_full: format!("{name} Annual Meeting"),
            submission_type: submission_type.into(),
            deadline: deadline.into(),
            ..FeedEntry::default()
        }
    }

    fn staged(name: &str, submission_type: &str, stage: &str, deadline: &str) -> FeedEntry {
        FeedEntry {
            submission_stage: Some(stage.into()),
            ..entry(name, submission_type, deadline)
        }
    }

    fn load(entries: Vec<FeedEntry>) -> Vec<DeadlineRecord> {
        entries
            .into_iter()
            .enumerate()
            .map(|(id, entry)| DeadlineRecord::from_entry(id, entry))
            .collect()
    }

    fn ids(records: &[&DeadlineRecord]) -> Vec<usize> {
        records.iter().map(|r| r.id).collect()
    }

    #[test]
    fn sort_is_stable_for_equal_deadlines() {
        let records = load(vec![
            entry("B", "Paper", "2099-05-01"),
            entry("A", "Paper", "2099-01-01"),
            entry("C", "Paper", "2099-05-01"),
            entry("D", "Paper", "2099-05-01"),
        ]);
        let refs: Vec<_> = records.iter().collect();
        assert_eq!(ids(&sort_deadlines(&refs)), vec![1, 0, 2, 3]);
    }

    #[test]
    fn special_values_sort_last_in_any_case() {
        let records = load(vec![
            entry("R", "Paper", "Rolling"),
            entry("N", "Paper", "n/a"),
            entry("Late", "Paper", "2999-12-31"),
            entry("U", "Paper", "N/A"),
            entry("Early", "Paper", "2001-01-01"),
        ]);
        let refs: Vec<_> = records.iter().collect();
        assert_eq!(ids(&sort_deadlines(&refs)), vec![4, 2, 0, 1, 3]);
    }

    #[test]
    fn sort_leaves_input_untouched() {
        let records = load(vec![
            entry("B", "Paper", "2099-05-01"),
            entry("A", "Paper", "2099-01-01"),
        ]);
        let refs: Vec<_> = records.iter().collect();
        let _ = sort_deadlines(&refs);
        assert_eq!(ids(&refs), vec![0, 1]);
    }

    #[test]
    fn two_stages_form_one_group_in_order() {
        let records = load(vec![
            staged("X", "A", "S1", "2099-01-01"),
            staged("X", "A", "S2", "2099-02-01"),
        ]);
        let refs: Vec<_> = records.iter().collect();
        let items = group_deadlines(&refs);
        assert_eq!(items.len(), 1);
        assert_matches!(&items[0], RenderItem::Group(group) => {
            let stages: Vec<_> = group.entries.iter().filter_map(|e| e.submission_stage()).collect();
            assert_eq!(stages, vec!["S1", "S2"]);
        });
    }

    #[test]
    fn lone_stage_degrades_to_plain_record() {
        let records = load(vec![staged("X", "A", "S1", "2099-01-01")]);
        let refs: Vec<_> = records.iter().collect();
        let items = group_deadlines(&refs);
        assert_matches!(items.as_slice(), [RenderItem::Single(record)] => {
            assert_eq!(record.id, 0);
        });
        assert!(!items[0].is_group());
    }

    #[test]
    fn submission_type_is_part_of_the_group_key() {
        let records = load(vec![
            staged("X", "A", "S1", "2099-01-01"),
            staged("X", "B", "S1", "2099-01-02"),
        ]);
        let refs: Vec<_> = records.iter().collect();
        let items = group_deadlines(&refs);
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|item| !item.is_group()));
    }

    #[test]
    fn non_adjacent_stages_merge_at_first_position() {
        let records = load(vec![
            staged("X", "A", "Abstract", "2099-01-01"),
            entry("Y", "A", "2099-01-15"),
            staged("X", "A", "Full paper", "2099-02-01"),
            entry("Z", "A", "2099-03-01"),
        ]);
        let refs: Vec<_> = records.iter().collect();
        let items = group_deadlines(&refs);
        let shape: Vec<_> = items
            .iter()
            .map(|item| (item.name_display(), item.records().len()))
            .collect();
        assert_eq!(shape, vec![("X", 2), ("Y", 1), ("Z", 1)]);
    }

    #[test]
    fn group_strips_trailing_parenthetical_from_full_name() {
        let mut first = staged("ICWSM", "Paper", "Abstract", "2099-01-01");
        first.name_full = "Conference on Web and Social Media (Workshop) ".into();
        let second = staged("ICWSM", "Paper", "Full", "2099-01-08");
        let records = load(vec![first, second]);
        let refs: Vec<_> = records.iter().collect();
        let items = group_deadlines(&refs);
        assert_matches!(&items[0], RenderItem::Group(group) => {
            assert_eq!(group.name_full, "Conference on Web and Social Media");
            assert_eq!(group.anchor_id(), 0);
        });
    }

    #[test]
    fn group_serializes_with_marker_and_ordered_entries() -> TestResult {
        let mut first = staged("X", "Paper", "Abstract", "2099-01-01");
        first.name_full = "X Conf (Main Track)".into();
        let records = load(vec![staged("X", "Paper", "Full", "2099-02-01"), first]);
        let refs: Vec<_> = records.iter().collect();
        let items = group_deadlines(&sort_deadlines(&refs));

        let value = serde_json::to_value(&items)?;
        assert_eq!(value[0]["isGroup"], true);
        assert_eq!(value[0]["name_full"], "X Conf");
        let stages: Vec<serde_json::Value> = value[0]["entries"]
            .as_array()
            .map(|entries| entries.iter().map(|e| e["submission_stage"].clone()).collect())
            .unwrap_or_default();
        assert_eq!(stages, vec!["Abstract", "Full"]);
        assert_eq!(value[0]["entries"][0]["id"], 1);
        Ok(())
    }

    #[test]
    fn strip_parenthetical_only_touches_the_suffix() {
        assert_eq!(strip_parenthetical("ACM (SIGCHI) Conference"), "ACM (SIGCHI) Conference");
        assert_eq!(strip_parenthetical("Plain name"), "Plain name");
        assert_eq!(strip_parenthetical("Name (Main Track)"), "Name");
    }

    #[test]
    fn end_to_end_drops_past_and_orders_rolling_last() {
        let mut entries = vec![
            entry("Future", "Paper", "2099-01-01"),
            entry("Open", "Paper", "Rolling"),
            entry("Gone", "Paper", "2001-01-01"),
        ];
        for entry in &mut entries {
            entry.topics = vec!["AI".into()];
        }
        let records = load(entries);
        let items = render_list(&records, &FilterCriteria::default(), NOW);
        let deadlines: Vec<_> = items
            .iter()
            .flat_map(|item| item.records())
            .map(|record| record.deadline_raw())
            .collect();
        assert_eq!(deadlines, vec!["2099-01-01", "Rolling"]);
    }

    #[test]
    fn render_pass_sorts_before_grouping() {
        let records = load(vec![
            staged("X", "A", "Full", "2099-03-01"),
            entry("Y", "A", "2099-02-01"),
            staged("X", "A", "Abstract", "2099-01-01"),
        ]);
        let items = render_list(&records, &FilterCriteria::default(), NOW);
        assert_eq!(items.len(), 2);
        assert_matches!(&items[0], RenderItem::Group(group) => {
            let order: Vec<_> = group.entries.iter().map(|e| e.id).collect();
            assert_eq!(order, vec![2, 0]);
        });
        assert_eq!(items[1].name_display(), "Y");
    }
}
