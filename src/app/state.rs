use indexmap::IndexSet;
use strum::IntoEnumIterator;
use time::OffsetDateTime;
use unicode_segmentation::UnicodeSegmentation;

use crate::config::{DisplayOptions, ViewMode};
use crate::feed::into_records;
use crate::model::{DeadlineRecord, FeedEntry, RenderItem};
use crate::pipeline::{self, facet_counts, FacetList};
use crate::search::{FilterCategory, FilterCriteria};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailOverlay {
    /// Ids of the records shown, in render order; a group contributes every stage.
    pub record_ids: Vec<usize>,
    pub stage: usize,
}

impl DetailOverlay {
    pub fn current_id(&self) -> Option<usize> {
        self.record_ids.get(self.stage).copied()
    }

    pub fn move_stage(&mut self, delta: isize) {
        self.stage = step(self.stage, delta, self.record_ids.len());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetOverlay {
    pub category: FilterCategory,
    pub cursor: usize,
    pub show_more: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayState {
    Detail(DetailOverlay),
    Facets(FacetOverlay),
    CalendarLink { title: String, url: String },
}

/// Everything the browser knows: loaded records, filter selections and view state.
#[derive(Debug, Clone)]
pub struct AppState {
    records: Vec<DeadlineRecord>,
    topics: IndexSet<String>,
    submission_types: IndexSet<String>,
    venue_types: IndexSet<String>,
    archival: IndexSet<String>,
    search_query: String,
    show_past: bool,
    generation: u64,
    pub view_mode: ViewMode,
    pub selected: usize,
    pub search_active: bool,
    pub overlay: Option<OverlayState>,
    pub status_message: Option<String>,
    pub loading: bool,
    pub facet_visible_limit: usize,
    pub notes_preview_chars: usize,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(&DisplayOptions::default())
    }
}

impl AppState {
    pub fn new(display: &DisplayOptions) -> Self {
        Self {
            records: Vec::new(),
            topics: IndexSet::new(),
            submission_types: IndexSet::new(),
            venue_types: IndexSet::new(),
            archival: IndexSet::new(),
            search_query: String::new(),
            show_past: display.show_past,
            generation: 0,
            view_mode: display.default_view,
            selected: 0,
            search_active: false,
            overlay: None,
            status_message: None,
            loading: false,
            facet_visible_limit: display.facet_visible_limit,
            notes_preview_chars: display.notes_preview_chars,
        }
    }

    /// Replace the record set; ids follow feed order.
    pub fn set_deadlines(&mut self, entries: Vec<FeedEntry>) {
        self.records = into_records(entries);
        self.selected = 0;
        self.overlay = None;
        self.bump();
    }

    pub fn deadlines(&self) -> &[DeadlineRecord] {
        &self.records
    }

    pub fn record(&self, id: usize) -> Option<&DeadlineRecord> {
        self.records.get(id)
    }

    pub fn selected(&self, category: FilterCategory) -> &IndexSet<String> {
        match category {
            FilterCategory::Topic => &self.topics,
            FilterCategory::SubmissionType => &self.submission_types,
            FilterCategory::VenueType => &self.venue_types,
            FilterCategory::Archival => &self.archival,
        }
    }

    fn selected_mut(&mut self, category: FilterCategory) -> &mut IndexSet<String> {
        match category {
            FilterCategory::Topic => &mut self.topics,
            FilterCategory::SubmissionType => &mut self.submission_types,
            FilterCategory::VenueType => &mut self.venue_types,
            FilterCategory::Archival => &mut self.archival,
        }
    }

    /// Remove the value if selected, otherwise add it. Returns whether it is now selected.
    pub fn toggle(&mut self, category: FilterCategory, value: &str) -> bool {
        let set = self.selected_mut(category);
        let now_selected = if set.shift_remove(value) {
            false
        } else {
            set.insert(value.to_string());
            true
        };
        self.bump();
        now_selected
    }

    pub fn toggle_topic(&mut self, value: &str) -> bool {
        self.toggle(FilterCategory::Topic, value)
    }

    pub fn toggle_submission_type(&mut self, value: &str) -> bool {
        self.toggle(FilterCategory::SubmissionType, value)
    }

    pub fn toggle_venue_type(&mut self, value: &str) -> bool {
        self.toggle(FilterCategory::VenueType, value)
    }

    pub fn toggle_archival(&mut self, value: &str) -> bool {
        self.toggle(FilterCategory::Archival, value)
    }

    pub fn clear_all_filters(&mut self) {
        for category in FilterCategory::iter() {
            self.selected_mut(category).clear();
        }
        self.search_query.clear();
        self.bump();
    }

    pub fn has_active_filters(&self) -> bool {
        self.criteria().has_selections() || !self.search_query.is_empty()
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn set_search_query<S: Into<String>>(&mut self, query: S) {
        self.search_query = query.into();
        self.bump();
    }

    pub fn begin_search(&mut self) {
        self.search_active = true;
        self.overlay = None;
    }

    pub fn finish_search(&mut self) {
        self.search_active = false;
    }

    /// Leave search mode and drop the query.
    pub fn cancel_search(&mut self) {
        self.search_active = false;
        if !self.search_query.is_empty() {
            self.search_query.clear();
            self.bump();
        }
    }

    pub fn push_search_char(&mut self, ch: char) {
        self.search_query.push(ch);
        self.bump();
    }

    pub fn pop_search_char(&mut self) {
        if self.search_query.pop().is_some() {
            self.bump();
        }
    }

    pub fn show_past(&self) -> bool {
        self.show_past
    }

    pub fn toggle_show_past(&mut self) -> bool {
        self.show_past = !self.show_past;
        self.bump();
        self.show_past
    }

    pub fn toggle_view(&mut self) -> ViewMode {
        self.view_mode = self.view_mode.toggled();
        self.bump();
        self.view_mode
    }

    pub fn criteria(&self) -> FilterCriteria {
        FilterCriteria {
            query: self.search_query.clone(),
            show_past: self.show_past,
            topics: self.topics.clone(),
            submission_types: self.submission_types.clone(),
            venue_types: self.venue_types.clone(),
            archival: self.archival.clone(),
        }
    }

    /// Filter, sort and group the current snapshot. Never mutates state.
    pub fn render_list(&self, now: OffsetDateTime) -> Vec<RenderItem<'_>> {
        pipeline::render_list(&self.records, &self.criteria(), now)
    }

    /// Changes whenever a new render pass is needed.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn bump(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn move_selection(&mut self, delta: isize, len: usize) {
        self.selected = step(self.selected, delta, len);
    }

    pub fn clamp_selection(&mut self, len: usize) {
        if len == 0 {
            self.selected = 0;
        } else if self.selected >= len {
            self.selected = len - 1;
        }
    }

    /// Show the records of one render item; see [`item_record_ids`].
    pub fn open_detail(&mut self, record_ids: Vec<usize>) {
        self.overlay = Some(OverlayState::Detail(DetailOverlay {
            record_ids,
            stage: 0,
        }));
    }

    pub fn detail(&self) -> Option<&DetailOverlay> {
        match &self.overlay {
            Some(OverlayState::Detail(detail)) => Some(detail),
            _ => None,
        }
    }

    pub fn move_detail_stage(&mut self, delta: isize) {
        if let Some(OverlayState::Detail(detail)) = self.overlay.as_mut() {
            detail.move_stage(delta);
        }
    }

    pub fn open_facets(&mut self) {
        self.overlay = Some(OverlayState::Facets(FacetOverlay {
            category: FilterCategory::Topic,
            cursor: 0,
            show_more: false,
        }));
    }

    pub fn facet_overlay(&self) -> Option<&FacetOverlay> {
        match &self.overlay {
            Some(OverlayState::Facets(facets)) => Some(facets),
            _ => None,
        }
    }

    fn facet_overlay_mut(&mut self) -> Option<&mut FacetOverlay> {
        match &mut self.overlay {
            Some(OverlayState::Facets(facets)) => Some(facets),
            _ => None,
        }
    }

    /// Value counts over every loaded record.
    pub fn facets(&self, category: FilterCategory) -> FacetList {
        facet_counts(&self.records, category)
    }

    /// How many facet values the picker currently exposes.
    pub fn visible_facet_count(&self, overlay: &FacetOverlay) -> usize {
        let list = self.facets(overlay.category);
        if overlay.show_more {
            list.len()
        } else {
            list.split(self.facet_visible_limit).0.len()
        }
    }

    pub fn cycle_facet_category(&mut self, delta: isize) {
        let Some(overlay) = self.facet_overlay_mut() else {
            return;
        };
        let categories: Vec<FilterCategory> = FilterCategory::iter().collect();
        let current = categories
            .iter()
            .position(|category| *category == overlay.category)
            .unwrap_or(0);
        let len = categories.len() as isize;
        let next = (current as isize + delta).rem_euclid(len) as usize;
        overlay.category = categories[next];
        overlay.cursor = 0;
        overlay.show_more = false;
    }

    pub fn move_facet_cursor(&mut self, delta: isize) {
        let Some(overlay) = self.facet_overlay().cloned() else {
            return;
        };
        let len = self.visible_facet_count(&overlay);
        if let Some(overlay) = self.facet_overlay_mut() {
            overlay.cursor = step(overlay.cursor, delta, len);
        }
    }

    pub fn toggle_show_more(&mut self) {
        let limit = self.facet_visible_limit;
        if let Some(overlay) = self.facet_overlay_mut() {
            overlay.show_more = !overlay.show_more;
            if !overlay.show_more && overlay.cursor >= limit {
                overlay.cursor = limit.saturating_sub(1);
            }
        }
    }

    /// Toggle the facet value under the picker cursor.
    pub fn toggle_facet_under_cursor(&mut self) -> Option<(String, bool)> {
        let overlay = self.facet_overlay()?.clone();
        let list = self.facets(overlay.category);
        let value = list.get(overlay.cursor)?.value.clone();
        let selected = self.toggle(overlay.category, &value);
        Some((value, selected))
    }

    pub fn close_overlay(&mut self) {
        self.overlay = None;
    }

    pub fn set_status_message<S: Into<String>>(&mut self, message: Option<S>) {
        self.status_message = message.map(Into::into);
    }
}

pub fn item_record_ids(item: &RenderItem<'_>) -> Vec<usize> {
    item.records().iter().map(|record| record.id).collect()
}

fn step(current: usize, delta: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let next = current as isize + delta;
    next.clamp(0, len as isize - 1) as usize
}

/// First `max` graphemes of the notes, with "..." appended when cut.
pub fn notes_preview(notes: &str, max: usize) -> String {
    let mut graphemes = notes.graphemes(true);
    let head: String = graphemes.by_ref().take(max).collect();
    if graphemes.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2026-10-17 12:00:00 UTC);

    fn entry(name: &str, deadline: &str, topics: &[&str]) -> FeedEntry {
        FeedEntry {
            name_display: name.into(),
            name_full: format!("{name} Conference"),
            submission_type: "Paper".into(),
            venue_type: "Conference".into(),
            archival: "Yes".into(),
            deadline: deadline.into(),
            topics: topics.iter().map(|t| t.to_string()).collect(),
            ..FeedEntry::default()
        }
    }

    fn loaded() -> AppState {
        let mut state = AppState::default();
        state.set_deadlines(vec![
            entry("ACL", "2099-03-01", &["NLP"]),
            entry("CHI", "2099-01-01", &["HCI"]),
            entry("OLD", "2001-01-01", &["HCI"]),
            entry("JOSS", "Rolling", &["Software"]),
        ]);
        state
    }

    fn names(state: &AppState) -> Vec<String> {
        state
            .render_list(NOW)
            .iter()
            .map(|item| item.name_display().to_string())
            .collect()
    }

    #[test]
    fn set_deadlines_assigns_positional_ids() {
        let state = loaded();
        let ids: Vec<_> = state.deadlines().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(state.record(1).map(|r| r.name_display()), Some("CHI"));
    }

    #[test]
    fn toggle_adds_then_removes() {
        let mut state = loaded();
        assert!(state.toggle_topic("HCI"));
        assert!(state.selected(FilterCategory::Topic).contains("HCI"));
        assert_eq!(names(&state), vec!["CHI"]);
        assert!(!state.toggle_topic("HCI"));
        assert!(state.selected(FilterCategory::Topic).is_empty());
    }

    #[test]
    fn per_category_toggles_hit_their_own_set() {
        let mut state = loaded();
        state.toggle_submission_type("Poster");
        state.toggle_venue_type("Journal");
        state.toggle_archival("No");
        assert_eq!(state.criteria().submission_types.len(), 1);
        assert_eq!(state.criteria().venue_types.len(), 1);
        assert_eq!(state.criteria().archival.len(), 1);
        assert!(state.render_list(NOW).is_empty());
    }

    #[test]
    fn clear_all_filters_empties_sets_and_query() {
        let mut state = loaded();
        state.toggle_topic("NLP");
        state.toggle_venue_type("Conference");
        state.set_search_query("acl");
        assert!(state.has_active_filters());

        state.clear_all_filters();
        assert!(!state.has_active_filters());
        assert_eq!(state.search_query(), "");
        assert_eq!(names(&state), vec!["CHI", "ACL", "JOSS"]);
    }

    #[test]
    fn show_past_brings_back_expired_records() {
        let mut state = loaded();
        assert!(!names(&state).contains(&"OLD".to_string()));
        assert!(state.toggle_show_past());
        assert_eq!(names(&state), vec!["OLD", "CHI", "ACL", "JOSS"]);
    }

    #[test]
    fn render_pass_leaves_state_untouched() {
        let state = loaded();
        let before = state.generation();
        let _ = state.render_list(NOW);
        let _ = state.render_list(NOW);
        assert_eq!(state.generation(), before);
        assert_eq!(state.criteria().query, "");
    }

    #[test]
    fn search_editing_bumps_generation() {
        let mut state = loaded();
        let start = state.generation();
        state.begin_search();
        state.push_search_char('c');
        state.push_search_char('h');
        assert_eq!(state.search_query(), "ch");
        assert!(state.generation() > start);
        assert_eq!(names(&state), vec!["CHI"]);

        state.cancel_search();
        assert!(!state.search_active);
        assert_eq!(state.search_query(), "");
    }

    #[test]
    fn selection_is_clamped_to_the_list() {
        let mut state = loaded();
        state.move_selection(10, 3);
        assert_eq!(state.selected, 2);
        state.move_selection(-5, 3);
        assert_eq!(state.selected, 0);
        state.selected = 7;
        state.clamp_selection(2);
        assert_eq!(state.selected, 1);
        state.clamp_selection(0);
        assert_eq!(state.selected, 0);
    }

    #[test]
    fn facet_picker_toggles_value_under_cursor() {
        let mut state = loaded();
        state.open_facets();
        state.move_facet_cursor(1);
        assert_eq!(state.toggle_facet_under_cursor(), Some(("NLP".to_string(), true)));
        assert!(state.selected(FilterCategory::Topic).contains("NLP"));

        state.cycle_facet_category(1);
        assert_matches!(state.facet_overlay(), Some(FacetOverlay { category: FilterCategory::SubmissionType, cursor: 0, .. }));
        state.cycle_facet_category(-2);
        assert_matches!(state.facet_overlay(), Some(FacetOverlay { category: FilterCategory::Archival, .. }));
    }

    #[test]
    fn facet_cursor_respects_show_more() {
        let mut state = AppState::default();
        state.facet_visible_limit = 2;
        state.set_deadlines(
            ["A", "B", "C", "D"]
                .iter()
                .map(|topic| entry(topic, "Rolling", &[topic]))
                .collect(),
        );
        state.open_facets();
        state.move_facet_cursor(10);
        assert_eq!(state.facet_overlay().map(|o| o.cursor), Some(1));
        state.toggle_show_more();
        state.move_facet_cursor(10);
        assert_eq!(state.facet_overlay().map(|o| o.cursor), Some(3));
        state.toggle_show_more();
        assert_eq!(state.facet_overlay().map(|o| o.cursor), Some(1));
    }

    #[test]
    fn detail_overlay_walks_group_stages() {
        let mut state = AppState::default();
        let mut abstract_stage = entry("CSCW", "2099-01-01", &[]);
        abstract_stage.submission_stage = Some("Abstract".into());
        let mut paper_stage = entry("CSCW", "2099-01-08", &[]);
        paper_stage.submission_stage = Some("Paper".into());
        state.set_deadlines(vec![paper_stage, abstract_stage]);

        let ids = item_record_ids(&state.render_list(NOW)[0]);
        state.open_detail(ids);
        let detail = state.detail().cloned();
        assert_matches!(detail, Some(DetailOverlay { ref record_ids, stage: 0 }) if record_ids == &vec![1, 0]);

        state.move_detail_stage(1);
        state.move_detail_stage(1);
        assert_eq!(state.detail().and_then(DetailOverlay::current_id), Some(0));
    }

    #[test]
    fn notes_preview_cuts_on_graphemes() {
        assert_eq!(notes_preview("short", 60), "short");
        assert_eq!(notes_preview("abcdef", 3), "abc...");
        assert_eq!(notes_preview("e\u{301}e\u{301}e\u{301}", 2), "e\u{301}e\u{301}...");
        assert_eq!(notes_preview("exact", 5), "exact");
    }
}
