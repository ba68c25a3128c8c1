mod actions;
mod render;
mod session;

use std::collections::HashMap;
use std::io;
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::TableState;

use crate::config::SiteConfig;
use crate::db::SessionStore;

use super::episode::{Episode, Transcript};
use super::listing::{EpisodeList, ScrollRestore};
use super::restore_policy;
use super::source::{EpisodeSource, load_episodes_or_log};

use self::actions::{
    drain_transcript_results, ensure_transcript, export_all, move_selection, open_adjacent,
    reset_selection, select_restored, status_error, status_info,
};
use self::render::{draw_detail, draw_list};
use self::session::TuiSession;

type BrowserList = EpisodeList<Box<dyn SessionStore>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum InputMode {
    Normal,
    Search,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct DetailView {
    pub(super) episode_id: i64,
    pub(super) scroll: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    List,
    Detail(DetailView),
}

#[derive(Debug, Clone)]
pub(super) struct PendingNotice {
    pub(super) title: &'static str,
    pub(super) message: String,
}

#[derive(Debug, Clone)]
pub(super) struct TranscriptFetchResult {
    pub(super) number: String,
    pub(super) transcript: Option<Transcript>,
}

#[derive(Debug, Clone)]
pub(super) enum TranscriptState {
    Loading,
    Ready(Option<Transcript>),
}

impl TranscriptState {
    pub(super) fn transcript(&self) -> Option<&Transcript> {
        match self {
            Self::Ready(Some(transcript)) => Some(transcript),
            Self::Loading | Self::Ready(None) => None,
        }
    }

    pub(super) fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

/// Rows from the bottom of the window at which the next page is loaded.
const LOAD_MORE_MARGIN: usize = 3;
const PAGE_JUMP: usize = 10;

pub(crate) fn run_tui(
    config: &SiteConfig,
    source: &EpisodeSource,
    store: Box<dyn SessionStore>,
) -> Result<()> {
    let mut list: BrowserList = EpisodeList::new(
        store,
        config.pagination.items_per_page,
        restore_policy(config),
    );
    let mut status = match load_episodes_or_log(source) {
        Some(episodes) => {
            list.load(episodes);
            if list.episodes().is_empty() {
                status_info("No episodes published yet.")
            } else {
                status_info(&format!("Loaded {} episodes.", list.episodes().len()))
            }
        }
        None => {
            list.fail_load();
            status_error(&format!(
                "Episode data could not be loaded from {}.",
                source.describe()
            ))
        }
    };

    let mut session = TuiSession::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))
        .context("failed to initialize terminal backend")?;
    terminal.clear()?;

    let mut table_state = TableState::default();
    select_restored(&list, &mut table_state);
    let mut scroll_restore: Option<ScrollRestore> = list.take_scroll_restore();
    let mut view = View::List;
    let mut input_mode = InputMode::Normal;
    let mut pending_notice = None::<PendingNotice>;
    let mut transcripts: HashMap<String, TranscriptState> = HashMap::new();
    let (transcript_tx, transcript_rx) = mpsc::channel::<TranscriptFetchResult>();

    loop {
        drain_transcript_results(&transcript_rx, &mut transcripts);
        if let View::Detail(detail) = view
            && let Some(episode) = find_episode(&list, detail.episode_id)
        {
            ensure_transcript(source, episode, &mut transcripts, &transcript_tx);
        }

        terminal.draw(|frame| match view {
            View::List => draw_list(
                frame,
                config,
                &list,
                &mut table_state,
                input_mode,
                &status,
                pending_notice.as_ref(),
            ),
            View::Detail(detail) => draw_detail(
                frame,
                config,
                &list,
                detail,
                &transcripts,
                &status,
                pending_notice.as_ref(),
            ),
        })?;

        if view == View::List
            && let Some(restore) = scroll_restore.as_mut()
        {
            let applied = restore.next_offset(table_state.offset());
            if let Some(offset) = applied {
                log::debug!("re-applying list offset {offset}");
                *table_state.offset_mut() = offset;
            }
            if restore.is_done() {
                scroll_restore = None;
            }
            if applied.is_some() {
                continue;
            }
        }

        if !event::poll(Duration::from_millis(200))? {
            continue;
        }

        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if pending_notice.is_some() {
            pending_notice = None;
            continue;
        }

        match view {
            View::List if input_mode == InputMode::Search => {
                if handle_search_key(key, &mut list, &mut table_state) {
                    input_mode = InputMode::Normal;
                    status = status_info(&format!("{} episodes match.", list.filtered_len()));
                }
            }
            View::List => match key.code {
                KeyCode::Char('q') => {
                    remember_viewport(&mut list, &table_state);
                    list.save_state();
                    break;
                }
                KeyCode::Up | KeyCode::Char('k') => {
                    move_selection(&mut list, &mut table_state, -1, LOAD_MORE_MARGIN);
                }
                KeyCode::Down | KeyCode::Char('j') | KeyCode::PageDown => {
                    let step = if key.code == KeyCode::PageDown {
                        PAGE_JUMP as isize
                    } else {
                        1
                    };
                    if let Some(added) =
                        move_selection(&mut list, &mut table_state, step, LOAD_MORE_MARGIN)
                    {
                        status = status_info(&format!(
                            "Loaded {added} more ({} of {}).",
                            list.window_len(),
                            list.filtered_len()
                        ));
                    }
                }
                KeyCode::PageUp => {
                    move_selection(
                        &mut list,
                        &mut table_state,
                        -(PAGE_JUMP as isize),
                        LOAD_MORE_MARGIN,
                    );
                }
                KeyCode::Home | KeyCode::Char('g') => {
                    if list.window_len() > 0 {
                        table_state.select(Some(0));
                    }
                }
                KeyCode::End | KeyCode::Char('G') => {
                    if list.window_len() > 0 {
                        table_state.select(Some(list.window_len() - 1));
                    }
                }
                KeyCode::Char('/') => {
                    input_mode = InputMode::Search;
                    status = status_info("Search: type to filter, Enter or Esc to finish.");
                }
                KeyCode::Char('t') => {
                    list.cycle_tag();
                    reset_selection(&list, &mut table_state);
                    status = status_info(&format!(
                        "Tag: {} ({} episodes).",
                        list.filter().tag.as_deref().unwrap_or("all"),
                        list.filtered_len()
                    ));
                }
                KeyCode::Char('x') => {
                    list.set_tag(None);
                    reset_selection(&list, &mut table_state);
                    status = status_info("Tag filter cleared.");
                }
                KeyCode::Char('o') => {
                    let sort = list.filter().sort.toggle();
                    list.set_sort(sort);
                    reset_selection(&list, &mut table_state);
                    status = status_info(&format!("Sorted {}.", sort.label()));
                }
                KeyCode::Char('c') => {
                    list.clear_filters();
                    reset_selection(&list, &mut table_state);
                    status = status_info("Filters cleared.");
                }
                KeyCode::Char('e') => match export_all(&list) {
                    Ok(path) => {
                        pending_notice = Some(PendingNotice {
                            title: "Export",
                            message: format!(
                                "Exported {} episodes.\n\n{}\n\nPress any key to continue.",
                                list.episodes().len(),
                                path.display()
                            ),
                        });
                        status = status_info("CSV export written.");
                    }
                    Err(err) => {
                        log::error!("CSV export failed: {err:#}");
                        status = status_error(&format!("Export failed: {err}"));
                    }
                },
                KeyCode::Enter => {
                    let Some(episode) = table_state
                        .selected()
                        .and_then(|idx| list.displayed().get(idx).map(|episode| episode.id))
                    else {
                        continue;
                    };
                    remember_viewport(&mut list, &table_state);
                    list.save_state();
                    view = View::Detail(DetailView {
                        episode_id: episode,
                        scroll: 0,
                    });
                    status = status_info("←/→ previous/next  ↑/↓ scroll  Esc back");
                }
                _ => {}
            },
            View::Detail(mut detail) => match key.code {
                KeyCode::Char('q') => break,
                KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('b') => {
                    list.reenter();
                    select_restored(&list, &mut table_state);
                    scroll_restore = list.take_scroll_restore();
                    if let Some(restore) = &scroll_restore {
                        log::debug!("restoring list offset {}", restore.target());
                    }
                    view = View::List;
                    status = status_info(&format!(
                        "Back to list ({} of {}).",
                        list.window_len(),
                        list.filtered_len()
                    ));
                }
                KeyCode::Left | KeyCode::Char('p') => {
                    match open_adjacent(&list, detail.episode_id, false) {
                        Some(id) => {
                            view = View::Detail(DetailView {
                                episode_id: id,
                                scroll: 0,
                            })
                        }
                        None => {
                            pending_notice = Some(PendingNotice {
                                title: "Start of List",
                                message: "No previous episode.\n\nPress any key to continue."
                                    .to_string(),
                            });
                        }
                    }
                }
                KeyCode::Right | KeyCode::Char('n') => {
                    match open_adjacent(&list, detail.episode_id, true) {
                        Some(id) => {
                            view = View::Detail(DetailView {
                                episode_id: id,
                                scroll: 0,
                            })
                        }
                        None => {
                            pending_notice = Some(PendingNotice {
                                title: "End of List",
                                message: "No next episode.\n\nPress any key to continue."
                                    .to_string(),
                            });
                        }
                    }
                }
                KeyCode::Up | KeyCode::Char('k') => {
                    detail.scroll = detail.scroll.saturating_sub(1);
                    view = View::Detail(detail);
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    detail.scroll = detail.scroll.saturating_add(1);
                    view = View::Detail(detail);
                }
                KeyCode::PageUp => {
                    detail.scroll = detail.scroll.saturating_sub(PAGE_JUMP as u16);
                    view = View::Detail(detail);
                }
                KeyCode::PageDown => {
                    detail.scroll = detail.scroll.saturating_add(PAGE_JUMP as u16);
                    view = View::Detail(detail);
                }
                _ => {}
            },
        }
    }

    terminal.show_cursor()?;
    session.leave()?;
    Ok(())
}

fn find_episode(list: &BrowserList, id: i64) -> Option<&Episode> {
    list.episodes().iter().find(|episode| episode.id == id)
}

fn remember_viewport(list: &mut BrowserList, table_state: &TableState) {
    let selected = table_state
        .selected()
        .and_then(|idx| list.displayed().get(idx).map(|episode| episode.number.clone()));
    list.note_viewport(table_state.offset(), selected);
}

/// Returns true when search input is finished.
fn handle_search_key(
    key: KeyEvent,
    list: &mut BrowserList,
    table_state: &mut TableState,
) -> bool {
    match key.code {
        KeyCode::Enter | KeyCode::Esc => return true,
        KeyCode::Backspace => {
            let mut query = list.filter().query.clone();
            if query.pop().is_none() {
                return false;
            }
            list.set_query(&query);
        }
        KeyCode::Char(ch) => {
            let mut query = list.filter().query.clone();
            query.push(ch);
            list.set_query(&query);
        }
        _ => return false,
    }
    reset_selection(list, table_state);
    false
}
