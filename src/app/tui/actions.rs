use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use anyhow::Result;
use chrono::Local;
use ratatui::widgets::TableState;

use super::super::detail::find_adjacent;
use super::super::episode::Episode;
use super::super::export::write_csv_export;
use super::super::source::{EpisodeSource, load_transcript_or_log};
use super::{BrowserList, TranscriptFetchResult, TranscriptState};

pub(super) fn status_info(msg: &str) -> String {
    format!("INFO: {msg}")
}

pub(super) fn status_error(msg: &str) -> String {
    format!("ERROR: {msg}")
}

/// Selects the episode that was selected when the list was left, falling
/// back to the first row.
pub(super) fn select_restored(list: &BrowserList, table_state: &mut TableState) {
    if list.window_len() == 0 {
        table_state.select(None);
        return;
    }
    table_state.select(Some(list.restored_selection().unwrap_or(0)));
}

pub(super) fn reset_selection(list: &BrowserList, table_state: &mut TableState) {
    *table_state.offset_mut() = 0;
    if list.window_len() == 0 {
        table_state.select(None);
    } else {
        table_state.select(Some(0));
    }
}

/// Moves the selection by `delta` rows. Getting within `margin` rows of the
/// end of the window loads the next page; returns how many were added.
pub(super) fn move_selection(
    list: &mut BrowserList,
    table_state: &mut TableState,
    delta: isize,
    margin: usize,
) -> Option<usize> {
    if list.window_len() == 0 {
        table_state.select(None);
        return None;
    }

    let current = table_state.selected().unwrap_or(0);
    let mut target = current.saturating_add_signed(delta);

    let mut added = 0;
    if delta > 0 && target + margin >= list.window_len() && list.has_more() {
        added = list.load_more();
    }
    target = target.min(list.window_len() - 1);
    table_state.select(Some(target));

    (added > 0).then_some(added)
}

/// Previous (or next) episode id in the saved filtered order.
pub(super) fn open_adjacent(list: &BrowserList, id: i64, forward: bool) -> Option<i64> {
    let adjacent = find_adjacent(list.episodes(), id, list.store().as_ref());
    let target = if forward {
        adjacent.next
    } else {
        adjacent.previous
    };
    target.map(|episode| episode.id)
}

pub(super) fn export_all(list: &BrowserList) -> Result<PathBuf> {
    let today = Local::now().date_naive();
    write_csv_export(list.episodes(), Path::new("."), today)
}

pub(super) fn ensure_transcript(
    source: &EpisodeSource,
    episode: &Episode,
    transcripts: &mut HashMap<String, TranscriptState>,
    tx: &mpsc::Sender<TranscriptFetchResult>,
) {
    if transcripts.contains_key(&episode.number) {
        return;
    }

    transcripts.insert(episode.number.clone(), TranscriptState::Loading);
    let number = episode.number.clone();
    let source = source.clone();
    let tx = tx.clone();
    std::thread::spawn(move || {
        let transcript = load_transcript_or_log(&source, &number);
        let _ = tx.send(TranscriptFetchResult { number, transcript });
    });
}

pub(super) fn drain_transcript_results(
    rx: &mpsc::Receiver<TranscriptFetchResult>,
    transcripts: &mut HashMap<String, TranscriptState>,
) {
    while let Ok(result) = rx.try_recv() {
        transcripts.insert(result.number, TranscriptState::Ready(result.transcript));
    }
}
