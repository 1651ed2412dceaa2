use indexmap::{IndexMap, IndexSet};
use time::{Date, UtcOffset};

use crate::model::DeadlineRecord;
use crate::search::FilterCategory;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetValue {
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone)]
pub struct FacetList {
    pub category: FilterCategory,
    pub values: Vec<FacetValue>,
}

impl FacetList {
    /// First `limit` values are always shown; the rest sit behind "show more".
    pub fn split(&self, limit: usize) -> (&[FacetValue], &[FacetValue]) {
        let cut = limit.min(self.values.len());
        self.values.split_at(cut)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FacetValue> {
        self.values.get(index)
    }
}

/// Count how often each value of `category` occurs, most frequent first.
/// Ties keep the order in which values were first seen.
pub fn facet_counts<'a, I>(records: I, category: FilterCategory) -> FacetList
where
    I: IntoIterator<Item = &'a DeadlineRecord>,
{
    let mut counts: IndexMap<&'a str, usize> = IndexMap::new();
    for record in records {
        for value in category.values_of(record) {
            *counts.entry(value).or_insert(0) += 1;
        }
    }
    let mut values: Vec<FacetValue> = counts
        .into_iter()
        .map(|(value, count)| FacetValue {
            value: value.to_string(),
            count,
        })
        .collect();
    values.sort_by(|a, b| b.count.cmp(&a.count));
    FacetList { category, values }
}

/// Concrete deadlines whose UTC date falls on or after `today` (and on or
/// before `cutoff`), ordered by that date.
pub fn upcoming<'a>(
    records: &'a [DeadlineRecord],
    today: Date,
    cutoff: Option<Date>,
) -> Vec<(Date, &'a DeadlineRecord)> {
    let mut hits: Vec<(Date, &DeadlineRecord)> = records
        .iter()
        .filter_map(|record| {
            let date = record.due.instant()?.to_offset(UtcOffset::UTC).date();
            if date < today {
                return None;
            }
            if cutoff.is_some_and(|limit| date > limit) {
                return None;
            }
            Some((date, record))
        })
        .collect();
    hits.sort_by_key(|(date, _)| *date);
    hits
}

/// Distinct full venue names in first-seen order.
pub fn venue_names(records: &[DeadlineRecord]) -> Vec<&str> {
    records
        .iter()
        .map(|record| record.name_full())
        .filter(|name| !name.trim().is_empty())
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}
