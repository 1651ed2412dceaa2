use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use regex::Regex;
use strum::IntoEnumIterator;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::app::state::{notes_preview, AppState, FacetOverlay, OverlayState};
use crate::app::{CountdownBoard, Surface};
use crate::config::ViewMode;
use crate::countdown::{Severity, UNAVAILABLE_LABEL, UNAVAILABLE_SHORT_LABEL};
use crate::deadline::{parse_deadline, Deadline, MonthStyle};
use crate::highlight::{build_highlight_regex, highlight_spans};
use crate::model::{DeadlineRecord, GroupedView, RenderItem};
use crate::search::FilterCategory;

/// One frame's worth of borrowed render inputs.
pub struct ViewContext<'v, 'a> {
    pub state: &'v AppState,
    pub items: &'v [RenderItem<'a>],
    pub countdowns: &'v CountdownBoard,
}

struct Palette {
    highlight: Style,
    muted: Style,
    bold: Style,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            highlight: Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
            muted: Style::default().fg(Color::Gray),
            bold: Style::default().add_modifier(Modifier::BOLD),
        }
    }
}

pub fn draw_app(frame: &mut Frame, view: &ViewContext<'_, '_>, list_state: &mut ListState) {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(2),
        ])
        .split(frame.size());

    let palette = Palette::default();
    let regex = build_highlight_regex(view.state.search_query());

    frame.render_widget(build_search_bar(view.state, &palette), vertical[0]);

    if view.items.is_empty() {
        let message = if view.state.loading {
            "Loading deadlines..."
        } else if view.state.deadlines().is_empty() {
            "No deadlines loaded. Press r to reload."
        } else {
            "No deadlines match the current filters. Press c to clear them."
        };
        let empty = Paragraph::new(message)
            .style(palette.muted)
            .block(Block::default().title("Deadlines").borders(Borders::ALL));
        frame.render_widget(empty, vertical[1]);
    } else {
        match view.state.view_mode {
            ViewMode::Cards => draw_cards(frame, view, regex.as_ref(), &palette, vertical[1], list_state),
            ViewMode::List => draw_rows(frame, view, regex.as_ref(), &palette, vertical[1], list_state),
        }
    }

    let status = Paragraph::new(build_status_line(view)).style(palette.muted);
    frame.render_widget(status, vertical[2]);

    render_overlay(frame, view, regex.as_ref(), &palette);
}

fn build_search_bar(state: &AppState, palette: &Palette) -> Paragraph<'static> {
    let mut spans = vec![Span::styled("Search: ", palette.bold)];
    if state.search_active {
        spans.push(Span::raw(format!("{}▌", state.search_query())));
    } else if state.search_query().is_empty() {
        spans.push(Span::styled("press / to search", palette.muted));
    } else {
        spans.push(Span::styled(state.search_query().to_string(), palette.highlight));
    }

    for category in FilterCategory::iter() {
        let selected = state.selected(category);
        if selected.is_empty() {
            continue;
        }
        let values: Vec<&str> = selected.iter().map(String::as_str).collect();
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("[{}: {}]", category.label(), values.join(", ")),
            Style::default().fg(Color::Cyan),
        ));
    }

    let border = if state.search_active {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    Paragraph::new(Line::from(spans)).block(
        Block::default()
            .title("Deadline Hub")
            .borders(Borders::ALL)
            .border_style(border),
    )
}

fn draw_cards(
    frame: &mut Frame,
    view: &ViewContext<'_, '_>,
    regex: Option<&Regex>,
    palette: &Palette,
    area: Rect,
    list_state: &mut ListState,
) {
    let items: Vec<ListItem> = view
        .items
        .iter()
        .map(|item| {
            let lines = match item {
                RenderItem::Single(record) => single_card(view, record, regex, palette),
                RenderItem::Group(group) => group_card(view, group, regex, palette),
            };
            ListItem::new(lines)
        })
        .collect();
    let list = List::new(items)
        .block(
            Block::default()
                .title(format!("Deadlines ({})", view.items.len()))
                .borders(Borders::ALL),
        )
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("▸ ");
    frame.render_stateful_widget(list, area, list_state);
}

fn single_card(
    view: &ViewContext<'_, '_>,
    record: &DeadlineRecord,
    regex: Option<&Regex>,
    palette: &Palette,
) -> Vec<Line<'static>> {
    let mut title = highlight_spans(record.name_display(), regex, palette.highlight, palette.bold);
    title.push(Span::styled(format!("  {}", record.submission_type()), palette.muted));
    if let Some(stage) = record.submission_stage() {
        title.push(Span::styled(format!(" · {stage}"), palette.muted));
    }

    let parsed = parse_deadline(record, MonthStyle::Long);
    let mut deadline = vec![Span::raw(format!("Deadline: {}  ", parsed.display))];
    deadline.push(countdown_span(view.countdowns, Surface::Row, record, UNAVAILABLE_LABEL));

    let mut lines = vec![
        Line::from(title),
        Line::from(highlight_spans(record.name_full(), regex, palette.highlight, Style::default())),
        Line::from(deadline),
        Line::from(highlight_spans(
            &format!("{} · {}", record.location(), record.event_dates()),
            regex,
            palette.highlight,
            palette.muted,
        )),
    ];
    if let Some(topics) = topics_line(record.topics(), regex, palette) {
        lines.push(topics);
    }
    if !record.notes().trim().is_empty() {
        let preview = notes_preview(record.notes(), view.state.notes_preview_chars);
        lines.push(Line::from(highlight_spans(
            &preview,
            regex,
            palette.highlight,
            palette.muted.add_modifier(Modifier::ITALIC),
        )));
    }
    lines.push(Line::from(""));
    lines
}

fn group_card(
    view: &ViewContext<'_, '_>,
    group: &GroupedView<'_>,
    regex: Option<&Regex>,
    palette: &Palette,
) -> Vec<Line<'static>> {
    let mut title = highlight_spans(group.name_display, regex, palette.highlight, palette.bold);
    title.push(Span::styled(
        format!("  {} · {} stages", group.submission_type, group.entries.len()),
        palette.muted,
    ));

    let mut lines = vec![
        Line::from(title),
        Line::from(highlight_spans(&group.name_full, regex, palette.highlight, Style::default())),
    ];
    for record in &group.entries {
        let parsed = parse_deadline(record, MonthStyle::Short);
        let stage = record.submission_stage().unwrap_or("Deadline");
        lines.push(Line::from(vec![
            Span::raw(format!("  {stage} deadline: {}  ", parsed.display)),
            countdown_span(view.countdowns, Surface::Row, record, UNAVAILABLE_LABEL),
        ]));
    }
    lines.push(Line::from(highlight_spans(
        &format!("{} · {}", group.location(), group.event_dates),
        regex,
        palette.highlight,
        palette.muted,
    )));
    if let Some(topics) = topics_line(group.topics, regex, palette) {
        lines.push(topics);
    }
    lines.push(Line::from(""));
    lines
}

fn topics_line(topics: &[String], regex: Option<&Regex>, palette: &Palette) -> Option<Line<'static>> {
    if topics.is_empty() {
        return None;
    }
    let tag_style = Style::default().fg(Color::Cyan);
    let mut spans = Vec::new();
    for (index, topic) in topics.iter().enumerate() {
        if index > 0 {
            spans.push(Span::raw(" "));
        }
        spans.push(Span::styled("#", tag_style));
        spans.extend(highlight_spans(topic, regex, palette.highlight, tag_style));
    }
    Some(Line::from(spans))
}

const ROW_COLUMNS: [(&str, usize); 5] = [
    ("Name", 18),
    ("Type", 16),
    ("Deadline", 14),
    ("Time Left", 26),
    ("Location", 24),
];

fn draw_rows(
    frame: &mut Frame,
    view: &ViewContext<'_, '_>,
    regex: Option<&Regex>,
    palette: &Palette,
    area: Rect,
    list_state: &mut ListState,
) {
    let block = Block::default()
        .title(format!("Deadlines ({})", view.items.len()))
        .borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(1)])
        .split(inner);

    let mut header = String::from("  ");
    for (title, width) in ROW_COLUMNS {
        header.push_str(&fit(title, width));
        header.push(' ');
    }
    header.push_str("Event Dates");
    frame.render_widget(
        Paragraph::new(Span::styled(header, palette.bold.add_modifier(Modifier::UNDERLINED))),
        sections[0],
    );

    let rows: Vec<ListItem> = view
        .items
        .iter()
        .map(|item| ListItem::new(Line::from(row_spans(view, item, regex, palette))))
        .collect();
    let list = List::new(rows)
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("▸ ");
    frame.render_stateful_widget(list, sections[1], list_state);
}

fn row_spans(
    view: &ViewContext<'_, '_>,
    item: &RenderItem<'_>,
    regex: Option<&Regex>,
    palette: &Palette,
) -> Vec<Span<'static>> {
    let records = item.records();
    let Some(first) = records.first().copied() else {
        return Vec::new();
    };
    let (name, location, event_dates) = match item {
        RenderItem::Single(record) => (record.name_display(), record.location(), record.event_dates()),
        RenderItem::Group(group) => (group.name_display, group.location(), group.event_dates),
    };
    let mut deadline = parse_deadline(first, MonthStyle::Short).display;
    if records.len() > 1 {
        deadline = format!("{deadline} +{}", records.len() - 1);
    }
    let (name_width, type_width, deadline_width, countdown_width, location_width) = (
        ROW_COLUMNS[0].1,
        ROW_COLUMNS[1].1,
        ROW_COLUMNS[2].1,
        ROW_COLUMNS[3].1,
        ROW_COLUMNS[4].1,
    );

    let mut spans = highlight_spans(&fit(name, name_width), regex, palette.highlight, palette.bold);
    spans.push(Span::raw(" "));
    spans.push(Span::raw(fit(first.submission_type(), type_width)));
    spans.push(Span::raw(" "));
    spans.push(Span::raw(fit(&deadline, deadline_width)));
    spans.push(Span::raw(" "));
    let countdown = countdown_span(view.countdowns, Surface::Row, first, UNAVAILABLE_SHORT_LABEL);
    let style = countdown.style;
    spans.push(Span::styled(fit(&countdown.content, countdown_width), style));
    spans.push(Span::raw(" "));
    spans.push(Span::styled(fit(&location, location_width), palette.muted));
    spans.push(Span::raw(" "));
    spans.push(Span::styled(event_dates.to_string(), palette.muted));
    spans
}

fn countdown_span(
    board: &CountdownBoard,
    surface: Surface,
    record: &DeadlineRecord,
    unavailable: &'static str,
) -> Span<'static> {
    match record.due {
        Deadline::Rolling | Deadline::NotAvailable | Deadline::Invalid => {
            Span::styled(unavailable, Style::default().fg(Color::Cyan))
        }
        Deadline::Concrete(_) => match board.frame(surface, record.id) {
            Some(frame) => Span::styled(frame.text, severity_style(frame.severity)),
            None => Span::raw(""),
        },
    }
}

pub fn severity_style(severity: Severity) -> Style {
    let color = match severity {
        Severity::Success => Color::Green,
        Severity::Warning => Color::Yellow,
        Severity::Danger => Color::Red,
    };
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

fn build_status_line(view: &ViewContext<'_, '_>) -> Text<'static> {
    let state = view.state;
    let shown = view.items.len();
    let position = if shown == 0 {
        "0/0".to_string()
    } else {
        format!("{}/{}", state.selected + 1, shown)
    };
    let past = if state.show_past() { "shown" } else { "hidden" };

    let mut spans = vec![
        Span::raw(format!("Loaded: {} ", state.deadlines().len())),
        Span::raw(" | Selected: "),
        Span::styled(position, Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" | View: "),
        Span::styled(state.view_mode.to_string(), Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(format!(" | Past: {past}")),
        Span::raw(format!(" | Ticking: {}", view.countdowns.active())),
    ];
    if state.loading {
        spans.push(Span::styled(
            " | loading…",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
        ));
    }

    let second = match &state.status_message {
        Some(message) => Line::from(Span::styled(message.clone(), Style::default().fg(Color::White))),
        None => Line::from(
            "j/k move • Enter details • / search • f filters • c clear • v view • p past • i .ics • g Google • r reload • q quit",
        ),
    };
    Text::from(vec![Line::from(spans), second])
}

fn render_overlay(frame: &mut Frame, view: &ViewContext<'_, '_>, regex: Option<&Regex>, palette: &Palette) {
    match &view.state.overlay {
        Some(OverlayState::Detail(detail)) => {
            let area = centered_rect(70, 80, frame.size());
            frame.render_widget(Clear, area);
            let records: Vec<&DeadlineRecord> = detail
                .record_ids
                .iter()
                .filter_map(|id| view.state.record(*id))
                .collect();
            let Some(first) = records.first().copied() else {
                return;
            };
            let mut lines = vec![
                Line::from(highlight_spans(first.name_display(), regex, palette.highlight, palette.bold)),
                Line::from(highlight_spans(first.name_full(), regex, palette.highlight, Style::default())),
                Line::from(Span::styled(first.link().to_string(), Style::default().fg(Color::Blue))),
                Line::from(""),
                Line::from(format!(
                    "Submission Type: {}   Venue: {}   Archival: {}",
                    first.submission_type(),
                    first.venue_type(),
                    first.archival()
                )),
                Line::from(format!("Location: {}", first.location())),
                Line::from(format!("Event Dates: {}", first.event_dates())),
            ];
            if let Some(topics) = topics_line(first.topics(), regex, palette) {
                lines.push(topics);
            }
            for (index, record) in records.iter().enumerate() {
                lines.push(Line::from(""));
                let marker = if index == detail.stage { "▸ " } else { "  " };
                let label = record.submission_stage().unwrap_or("Deadline");
                let parsed = parse_deadline(record, MonthStyle::Long);
                lines.push(Line::from(vec![
                    Span::styled(marker, palette.highlight),
                    Span::styled(format!("{label}: "), palette.bold),
                    Span::raw(parsed.display),
                ]));
                lines.push(Line::from(vec![
                    Span::raw("  "),
                    countdown_span(view.countdowns, Surface::Detail, record, UNAVAILABLE_LABEL),
                ]));
                if !record.notes().trim().is_empty() {
                    lines.push(Line::from(Span::styled(
                        format!("  {}", record.notes()),
                        palette.muted,
                    )));
                }
            }
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                "j/k stage • i export .ics • g Google Calendar • Esc close",
                palette.muted,
            )));
            let title = if records.len() > 1 { "Submission Stages" } else { "Details" };
            let paragraph = Paragraph::new(lines)
                .block(
                    Block::default()
                        .title(title)
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(Color::Cyan)),
                )
                .wrap(Wrap { trim: false });
            frame.render_widget(paragraph, area);
        }
        Some(OverlayState::Facets(overlay)) => {
            let area = centered_rect(60, 70, frame.size());
            frame.render_widget(Clear, area);
            let paragraph = Paragraph::new(facet_lines(view.state, overlay, palette))
                .block(
                    Block::default()
                        .title("Filters")
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(Color::Cyan)),
                )
                .wrap(Wrap { trim: false });
            frame.render_widget(paragraph, area);
        }
        Some(OverlayState::CalendarLink { title, url }) => {
            let area = centered_rect(70, 40, frame.size());
            frame.render_widget(Clear, area);
            let paragraph = Paragraph::new(vec![
                Line::from(Span::styled(
                    format!("Add {title} to Google Calendar"),
                    palette.bold,
                )),
                Line::from(""),
                Line::from(Span::styled(url.clone(), Style::default().fg(Color::Blue))),
                Line::from(""),
                Line::from(Span::styled("Open the link in a browser • Esc to close", palette.muted)),
            ])
            .block(
                Block::default()
                    .title("Google Calendar")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            )
            .wrap(Wrap { trim: false });
            frame.render_widget(paragraph, area);
        }
        None => {}
    }
}

fn facet_lines(state: &AppState, overlay: &FacetOverlay, palette: &Palette) -> Vec<Line<'static>> {
    let mut tabs = Vec::new();
    for category in FilterCategory::iter() {
        let style = if category == overlay.category {
            Style::default().fg(Color::Black).bg(Color::Cyan)
        } else {
            palette.muted
        };
        tabs.push(Span::styled(format!(" {} ", category.label()), style));
        tabs.push(Span::raw(" "));
    }

    let list = state.facets(overlay.category);
    let selected = state.selected(overlay.category);
    let (visible, hidden) = list.split(state.facet_visible_limit);
    let shown = if overlay.show_more {
        list.values.as_slice()
    } else {
        visible
    };

    let mut lines = vec![Line::from(tabs), Line::from("")];
    for (index, facet) in shown.iter().enumerate() {
        let mark = if selected.contains(&facet.value) { "[x]" } else { "[ ]" };
        let style = if index == overlay.cursor {
            Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        lines.push(Line::from(Span::styled(
            format!("{mark} {} ({})", facet.value, facet.count),
            style,
        )));
    }
    if list.is_empty() {
        lines.push(Line::from(Span::styled("No values", palette.muted)));
    }
    if !hidden.is_empty() {
        let label = if overlay.show_more {
            "m: show less".to_string()
        } else {
            format!("m: show {} more", hidden.len())
        };
        lines.push(Line::from(Span::styled(label, palette.muted)));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "h/l category • j/k move • space toggle • c clear all • Esc close",
        palette.muted,
    )));
    lines
}

/// Truncate or pad to exactly `width` display columns.
fn fit(text: &str, width: usize) -> String {
    if text.width() <= width {
        let padding = width - text.width();
        return format!("{text}{}", " ".repeat(padding));
    }
    let mut out = String::new();
    let mut used = 0;
    for grapheme in text.graphemes(true) {
        let w = grapheme.width();
        if used + w + 1 > width {
            break;
        }
        out.push_str(grapheme);
        used += w;
    }
    out.push('…');
    used += 1;
    out.push_str(&" ".repeat(width.saturating_sub(used)));
    out
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(vertical[1])[1]
}
