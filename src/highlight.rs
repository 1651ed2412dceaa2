use ratatui::style::Style;
use ratatui::text::Span;
use regex::{Regex, RegexBuilder};

/// Case-insensitive literal matcher for the active search query.
pub fn build_highlight_regex(query: &str) -> Option<Regex> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return None;
    }
    RegexBuilder::new(&regex::escape(query))
        .case_insensitive(true)
        .build()
        .ok()
}

/// Split `text` into spans, styling every query match with `highlight_style`.
pub fn highlight_spans(
    text: &str,
    regex: Option<&Regex>,
    highlight_style: Style,
    base_style: Style,
) -> Vec<Span<'static>> {
    let Some(re) = regex else {
        return vec![Span::styled(text.to_string(), base_style)];
    };
    let mut spans = Vec::new();
    let mut last = 0;
    for mat in re.find_iter(text) {
        if mat.start() > last {
            spans.push(Span::styled(text[last..mat.start()].to_string(), base_style));
        }
        spans.push(Span::styled(mat.as_str().to_string(), highlight_style));
        last = mat.end();
    }
    if last < text.len() {
        spans.push(Span::styled(text[last..].to_string(), base_style));
    }
    if spans.is_empty() {
        spans.push(Span::styled(text.to_string(), base_style));
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::style::{Color, Modifier};

    #[test]
    fn blank_query_highlights_nothing() {
        assert!(build_highlight_regex("").is_none());
        assert!(build_highlight_regex("   ").is_none());
    }

    #[test]
    fn query_is_literal_and_case_insensitive() {
        let regex = build_highlight_regex("c++ (").expect("regex");
        assert!(regex.is_match("Intro to C++ (part 1)"));
        let regex = build_highlight_regex("web").expect("regex");
        let matches: Vec<_> = regex.find_iter("Web and WEB").map(|m| m.as_str()).collect();
        assert_eq!(matches, vec!["Web", "WEB"]);
    }

    #[test]
    fn spans_alternate_base_and_highlight() {
        let regex = build_highlight_regex("social");
        let hl = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
        let spans = highlight_spans("Web and Social Media", regex.as_ref(), hl, Style::default());
        let parts: Vec<_> = spans.iter().map(|s| (s.content.as_ref(), s.style == hl)).collect();
        assert_eq!(
            parts,
            vec![("Web and ", false), ("Social", true), (" Media", false)]
        );
    }

    #[test]
    fn no_regex_yields_single_span() {
        let spans = highlight_spans("ICWSM", None, Style::default(), Style::default());
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].content, "ICWSM");
    }
}
