use std::collections::HashMap;

use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, BorderType, Borders, Cell, Clear, Gauge, Padding, Paragraph, Row, Table, TableState,
    Wrap,
};

use crate::config::SiteConfig;

use super::super::detail::find_adjacent;
use super::super::episode::{Episode, format_tags, single_line, truncate};
use super::super::listing::SortOrder;
use super::super::share::{share_links, spotify_embed_url};
use super::super::transcript::markdown_to_lines;
use super::{BrowserList, DetailView, InputMode, PendingNotice, TranscriptState};

const ACCENT: Color = Color::Rgb(110, 170, 255);
const MUTED: Color = Color::Rgb(185, 195, 210);
const TEXT: Color = Color::Rgb(230, 230, 230);

#[allow(clippy::too_many_arguments)]
pub(super) fn draw_list(
    frame: &mut Frame,
    config: &SiteConfig,
    list: &BrowserList,
    table_state: &mut TableState,
    input_mode: InputMode,
    status: &str,
    pending_notice: Option<&PendingNotice>,
) {
    let bg = Block::default().style(Style::default().bg(Color::Black));
    frame.render_widget(bg, frame.area());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            config.podcast.short_name.to_uppercase(),
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ),
        Span::styled("   ", Style::default()),
        Span::styled(
            format!("{} episodes", list.episodes().len()),
            Style::default().fg(MUTED),
        ),
        Span::styled("   ", Style::default()),
        Span::styled(
            format!("{} match", list.filtered_len()),
            Style::default().fg(MUTED),
        ),
        Span::styled("   ", Style::default()),
        Span::styled(
            format!("{} tags", list.tags().len()),
            Style::default().fg(MUTED),
        ),
    ]))
    .alignment(Alignment::Center)
    .block(panel_block("Episodes"));
    frame.render_widget(header, chunks[0]);

    let filter = list.filter();
    let search_style = if input_mode == InputMode::Search {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(TEXT)
    };
    let cursor = if input_mode == InputMode::Search { "▏" } else { "" };
    let search = Paragraph::new(Line::from(vec![
        Span::styled("Search ", Style::default().fg(MUTED)),
        Span::styled(format!("{}{cursor}", filter.query), search_style),
        Span::styled("   Tag ", Style::default().fg(MUTED)),
        Span::styled(
            filter.tag.clone().unwrap_or_else(|| "all".to_string()),
            Style::default().fg(Color::Yellow),
        ),
    ]))
    .block(panel_block("Filter"));
    frame.render_widget(search, chunks[1]);

    let body_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(64), Constraint::Percentage(36)])
        .split(chunks[2]);
    let details_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(8), Constraint::Length(3)])
        .split(body_chunks[1]);

    let displayed = list.displayed();
    let rows: Vec<Row> = displayed
        .iter()
        .map(|episode| {
            Row::new(vec![
                Cell::from(format!("ep{}", episode.number)),
                Cell::from(episode.date.clone()),
                Cell::from(episode.title.clone()),
                Cell::from(format_tags(&episode.tags)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(8),
            Constraint::Length(12),
            Constraint::Percentage(55),
            Constraint::Percentage(45),
        ],
    )
    .header(
        Row::new(vec!["EP", "Date", "Title", "Tags"])
            .style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)),
    )
    .block(panel_block("List"))
    .row_highlight_style(
        Style::default()
            .bg(ACCENT)
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("▸ ");
    frame.render_stateful_widget(table, body_chunks[0], table_state);

    let selection_text = match table_state.selected().and_then(|idx| displayed.get(idx)) {
        Some(episode) => format!(
            "Title\n{}\n\nEpisode\nep{}  {}  {}\n\nTags\n{}\n\n{}",
            truncate(&episode.title, 40),
            episode.number,
            episode.date,
            episode.duration,
            truncate(&format_tags(&episode.tags), 40),
            truncate(&single_line(episode.headline()), 160),
        ),
        None if list.is_loading() => "Loading episodes...".to_string(),
        None if list.episodes().is_empty() => "No episodes published yet.".to_string(),
        None => "No episodes match.\n\nPress c to clear filters.".to_string(),
    };
    let selection = Paragraph::new(selection_text)
        .style(Style::default().fg(TEXT))
        .wrap(Wrap { trim: true })
        .block(panel_block("Selected"))
        .alignment(Alignment::Left);
    frame.render_widget(selection, details_chunks[0]);

    let filtered = list.filtered_len();
    if filtered > 0 {
        let shown = list.window_len();
        let label = if list.has_more() {
            format!("{shown} of {filtered}  (scroll for more)")
        } else {
            format!("{shown} of {filtered}")
        };
        let coverage = Gauge::default()
            .block(panel_block("Loaded"))
            .gauge_style(
                Style::default()
                    .fg(Color::Rgb(130, 190, 255))
                    .bg(Color::Black)
                    .add_modifier(Modifier::BOLD),
            )
            .label(label)
            .ratio((shown as f64 / filtered as f64).clamp(0.0, 1.0));
        frame.render_widget(coverage, details_chunks[1]);
    }

    let command_bar = Paragraph::new(sort_selector_line(filter.sort))
        .alignment(Alignment::Center)
        .block(panel_block("Controls"));
    frame.render_widget(command_bar, chunks[3]);

    render_status(frame, status, chunks[4]);
    render_notice(frame, pending_notice);
}

#[allow(clippy::too_many_arguments)]
pub(super) fn draw_detail(
    frame: &mut Frame,
    config: &SiteConfig,
    list: &BrowserList,
    detail: DetailView,
    transcripts: &HashMap<String, TranscriptState>,
    status: &str,
    pending_notice: Option<&PendingNotice>,
) {
    let bg = Block::default().style(Style::default().bg(Color::Black));
    frame.render_widget(bg, frame.area());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let Some(found) = list
        .episodes()
        .iter()
        .find(|episode| episode.id == detail.episode_id)
    else {
        let missing = Paragraph::new("Episode not found.")
            .alignment(Alignment::Center)
            .block(panel_block("Episode"));
        frame.render_widget(missing, chunks[1]);
        render_status(frame, status, chunks[3]);
        return;
    };

    let state = transcripts.get(&found.number);
    let mut episode = found.clone();
    if let Some(transcript) = state.and_then(TranscriptState::transcript) {
        episode.apply_transcript(transcript.clone());
    }

    let header = Paragraph::new(vec![
        Line::from(Span::styled(
            episode.title.clone(),
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            format!(
                "ep{}  {}  {}   {}",
                episode.number,
                episode.date,
                episode.duration,
                format_tags(&episode.tags)
            ),
            Style::default().fg(MUTED),
        )),
    ])
    .block(panel_block("Episode"));
    frame.render_widget(header, chunks[0]);

    let loading = state.is_none_or(TranscriptState::is_loading);
    let body = Paragraph::new(detail_lines(config, &episode, loading))
        .style(Style::default().fg(TEXT))
        .wrap(Wrap { trim: false })
        .scroll((detail.scroll, 0))
        .block(panel_block("Detail"));
    frame.render_widget(body, chunks[1]);

    let adjacent = find_adjacent(list.episodes(), episode.id, list.store().as_ref());
    let neighbour = |label: &'static str, target: Option<&Episode>| match target {
        Some(episode) => Span::styled(
            format!("{label} ep{} {}", episode.number, truncate(&episode.title, 32)),
            Style::default().fg(TEXT),
        ),
        None => Span::styled(format!("{label} -"), Style::default().fg(MUTED)),
    };
    let navigation = Paragraph::new(Line::from(vec![
        neighbour("←", adjacent.previous),
        Span::styled("     ", Style::default()),
        neighbour("→", adjacent.next),
    ]))
    .alignment(Alignment::Center)
    .block(panel_block("Navigate"));
    frame.render_widget(navigation, chunks[2]);

    render_status(frame, status, chunks[3]);
    render_notice(frame, pending_notice);
}

fn detail_lines(config: &SiteConfig, episode: &Episode, loading: bool) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let headline = episode.headline();
    if !headline.is_empty() {
        lines.extend(headline.lines().map(|line| Line::from(line.to_string())));
        lines.push(Line::default());
    }

    let sections = [
        ("Summary", &episode.transcript.summary),
        ("Details", &episode.transcript.detailed_description),
    ];
    for (label, text) in sections {
        if text.trim().is_empty() {
            continue;
        }
        lines.push(section_title(label));
        lines.extend(markdown_to_lines(text).into_iter().map(Line::from));
    }

    let links = episode.valid_links();
    if !links.is_empty() {
        lines.push(section_title("Links"));
        for link in links {
            let title = if link.title.trim().is_empty() {
                link.url.clone()
            } else {
                link.title.clone()
            };
            lines.push(Line::from(vec![
                Span::raw(format!("• {title}  ")),
                Span::styled(link.url.clone(), Style::default().fg(MUTED)),
            ]));
        }
        lines.push(Line::default());
    }

    let share = share_links(config, episode);
    lines.push(section_title("Listen & Share"));
    if !episode.spotify_url.is_empty() {
        lines.push(labelled("Spotify", episode.spotify_url.clone()));
    }
    lines.push(labelled("Player", spotify_embed_url(config, &episode.spotify_url)));
    lines.push(labelled("Page", share.url));
    lines.push(labelled("X", share.twitter));
    lines.push(labelled("Facebook", share.facebook));
    lines.push(labelled("LINE", share.line));
    lines.push(Line::default());

    lines.push(section_title("Transcript"));
    let transcript = episode.transcript.transcript.trim();
    if loading {
        lines.push(Line::styled("Loading...", Style::default().fg(MUTED)));
    } else if transcript.is_empty() {
        lines.push(Line::styled(
            "No transcript available.",
            Style::default().fg(MUTED),
        ));
    } else {
        lines.extend(markdown_to_lines(transcript).into_iter().map(Line::from));
    }
    lines
}

fn section_title(label: &'static str) -> Line<'static> {
    Line::styled(label, Style::default().fg(ACCENT).add_modifier(Modifier::BOLD))
}

fn labelled(label: &'static str, value: String) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{label:<9}"), Style::default().fg(MUTED)),
        Span::raw(value),
    ])
}

fn render_status(frame: &mut Frame, status: &str, area: Rect) {
    let status_widget = Paragraph::new(status.to_string())
        .style(status_style(status))
        .block(panel_block("Status"));
    frame.render_widget(status_widget, area);
}

fn render_notice(frame: &mut Frame, pending_notice: Option<&PendingNotice>) {
    let Some(notice) = pending_notice else {
        return;
    };
    let popup_area = popup_rect_for_text(frame.area(), &notice.message);
    render_popup_shadow(frame, popup_area);
    frame.render_widget(Clear, popup_area);
    let popup = Paragraph::new(notice.message.clone())
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(modal_block(notice.title));
    frame.render_widget(popup, popup_area);
}

fn panel_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Rgb(125, 135, 150)))
        .title(title)
}

fn modal_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(
            Style::default()
                .fg(Color::Rgb(160, 190, 235))
                .add_modifier(Modifier::BOLD),
        )
        .title(title)
        .padding(Padding::new(2, 2, 1, 1))
}

fn pill_style(active: bool) -> Style {
    if active {
        Style::default()
            .bg(ACCENT)
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
            .bg(Color::Rgb(72, 82, 96))
            .fg(Color::Rgb(230, 235, 242))
    }
}

fn sort_selector_line(current: SortOrder) -> Line<'static> {
    Line::from(vec![
        Span::styled(" NEWEST ", pill_style(current == SortOrder::Newest)),
        Span::styled(" ", Style::default()),
        Span::styled(" OLDEST ", pill_style(current == SortOrder::Oldest)),
        Span::styled(
            "   ↑/↓ move  / search  t tag  x all tags  o sort  c clear  e export  Enter open  q quit",
            Style::default().fg(MUTED),
        ),
    ])
}

fn status_style(status: &str) -> Style {
    if status.starts_with("ERROR:") {
        Style::default()
            .fg(Color::Rgb(255, 145, 120))
            .add_modifier(Modifier::BOLD)
    } else if status.starts_with("INFO:") {
        Style::default().fg(Color::Rgb(205, 165, 255))
    } else {
        Style::default().fg(Color::Rgb(230, 235, 242))
    }
}

fn centered_fixed_rect(width: u16, height: u16, area: Rect) -> Rect {
    let clamped_width = width.min(area.width.max(1));
    let clamped_height = height.min(area.height.max(1));
    let x = area.x + area.width.saturating_sub(clamped_width) / 2;
    let y = area.y + area.height.saturating_sub(clamped_height) / 2;
    Rect::new(x, y, clamped_width, clamped_height)
}

fn render_popup_shadow(frame: &mut Frame, popup_area: Rect) {
    let area = frame.area();
    let shadow = Rect::new(
        (popup_area.x + 1).min(area.x + area.width.saturating_sub(1)),
        (popup_area.y + 1).min(area.y + area.height.saturating_sub(1)),
        popup_area.width.saturating_sub(1),
        popup_area.height.saturating_sub(1),
    );
    if shadow.width == 0 || shadow.height == 0 {
        return;
    }
    let shadow_block = Block::default().style(Style::default().bg(Color::Rgb(14, 16, 24)));
    frame.render_widget(shadow_block, shadow);
}

fn popup_rect_for_text(area: Rect, text: &str) -> Rect {
    let max_line_width = text
        .lines()
        .map(|line| line.chars().count() as u16)
        .max()
        .unwrap_or(0);
    let line_count = text.lines().count() as u16;

    let available_width = area.width.saturating_sub(2).max(1);
    let min_width = 40.min(available_width);
    let max_width = 80.min(available_width);
    let width = max_line_width.saturating_add(10).clamp(min_width, max_width);

    let available_height = area.height.saturating_sub(2).max(1);
    let min_height = 8.min(available_height);
    let max_height = 16.min(available_height);
    let height = line_count.saturating_add(6).clamp(min_height, max_height);

    centered_fixed_rect(width, height, area)
}
