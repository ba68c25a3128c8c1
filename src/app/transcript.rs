use std::sync::LazyLock;

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd, html};
use regex::Regex;

static BOLD_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*\*(\d{2}:\d{2}(?:\s*-\s*\d{2}:\d{2})?)\*\*").expect("valid timestamp regex")
});

static BRACKET_TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d{2}:\d{2})\]").expect("valid timestamp regex"));

fn markdown_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

/// GFM-flavoured markdown to HTML. Single newlines become `<br />`.
pub(crate) fn markdown_to_html(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let parser = Parser::new_ext(text, markdown_options()).map(|event| match event {
        Event::SoftBreak => Event::HardBreak,
        other => other,
    });
    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Wraps `**MM:SS**`, `**MM:SS - MM:SS**` and `[MM:SS]` in timestamp spans.
pub(crate) fn highlight_timestamps(text: &str) -> String {
    let bold = BOLD_TIMESTAMP.replace_all(text, r#"<span class="timestamp">$1</span>"#);
    BRACKET_TIMESTAMP
        .replace_all(&bold, r#"<span class="timestamp">[$1]</span>"#)
        .into_owned()
}

pub(crate) fn transcript_to_html(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    markdown_to_html(&highlight_timestamps(text))
}

/// Markdown flattened to display lines for the terminal.
pub(crate) fn markdown_to_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut list_depth = 0usize;

    let flush = |current: &mut String, lines: &mut Vec<String>| {
        lines.push(std::mem::take(current));
    };

    for event in Parser::new_ext(text, markdown_options()) {
        match event {
            Event::Start(Tag::List(_)) => list_depth += 1,
            Event::End(TagEnd::List(_)) => {
                list_depth = list_depth.saturating_sub(1);
                if list_depth == 0 {
                    lines.push(String::new());
                }
            }
            Event::Start(Tag::Item) => {
                if !current.is_empty() {
                    flush(&mut current, &mut lines);
                }
                current.push_str(&"  ".repeat(list_depth.saturating_sub(1)));
                current.push_str("• ");
            }
            Event::End(TagEnd::Item) => {
                if !current.is_empty() {
                    flush(&mut current, &mut lines);
                }
            }
            Event::End(TagEnd::Paragraph) | Event::End(TagEnd::Heading(_)) => {
                flush(&mut current, &mut lines);
                if list_depth == 0 {
                    lines.push(String::new());
                }
            }
            Event::Text(text) | Event::Code(text) => current.push_str(&text),
            Event::SoftBreak | Event::HardBreak => flush(&mut current, &mut lines),
            Event::Rule => {
                lines.push("────────".to_string());
                lines.push(String::new());
            }
            _ => {}
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soft_breaks_become_line_breaks() {
        let html = markdown_to_html("first line\nsecond line");
        assert!(html.contains("first line<br />"), "unexpected html: {html}");
        assert!(html.contains("second line"));
    }

    #[test]
    fn renders_gfm_tables_and_strikethrough() {
        let html = markdown_to_html("| a | b |\n|---|---|\n| 1 | 2 |\n\n~~gone~~");
        assert!(html.contains("<table>"), "unexpected html: {html}");
        assert!(html.contains("<del>gone</del>"), "unexpected html: {html}");
    }

    #[test]
    fn highlights_bold_and_bracket_timestamps() {
        let text = "**00:15** intro\n**01:00 - 02:30** topic\n[03:45] aside";
        let highlighted = highlight_timestamps(text);
        assert!(highlighted.contains(r#"<span class="timestamp">00:15</span> intro"#));
        assert!(highlighted.contains(r#"<span class="timestamp">01:00 - 02:30</span> topic"#));
        assert!(highlighted.contains(r#"<span class="timestamp">[03:45]</span> aside"#));
    }

    #[test]
    fn leaves_other_bold_text_alone() {
        let highlighted = highlight_timestamps("**Speaker A** and [link](https://example.test)");
        assert_eq!(highlighted, "**Speaker A** and [link](https://example.test)");
    }

    #[test]
    fn transcript_html_keeps_timestamp_spans() {
        let html = transcript_to_html("**00:15** Hello\n**Speaker** hi");
        assert!(html.contains(r#"<span class="timestamp">00:15</span> Hello<br />"#));
        assert!(html.contains("<strong>Speaker</strong> hi"));
    }

    #[test]
    fn empty_text_renders_nothing() {
        assert_eq!(transcript_to_html(""), "");
        assert!(markdown_to_lines("").is_empty());
    }

    #[test]
    fn plain_lines_strip_markup() {
        let lines = markdown_to_lines("# Title\n\nSome **bold** text\nnext\n\n- one\n- two\n");
        assert_eq!(
            lines,
            vec![
                "Title".to_string(),
                String::new(),
                "Some bold text".to_string(),
                "next".to_string(),
                String::new(),
                "• one".to_string(),
                "• two".to_string(),
            ]
        );
    }
}
