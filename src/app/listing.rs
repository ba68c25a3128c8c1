use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::SessionStore;

use super::episode::{
    Episode, collect_tags, compare_newest_first, compare_oldest_first, parse_episode_date,
};

pub(crate) const FILTER_STATE_KEY: &str = "episodeFilterState";
pub(crate) const FILTERED_NUMBERS_KEY: &str = "filteredEpisodeNumbers";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum SortOrder {
    #[default]
    Newest,
    Oldest,
}

impl SortOrder {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::Oldest => "oldest",
        }
    }

    pub(crate) fn toggle(self) -> Self {
        match self {
            Self::Newest => Self::Oldest,
            Self::Oldest => Self::Newest,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct FilterState {
    pub(crate) query: String,
    pub(crate) tag: Option<String>,
    pub(crate) sort: SortOrder,
}

impl FilterState {
    pub(crate) fn is_default(&self) -> bool {
        self.query.is_empty() && self.tag.is_none() && self.sort == SortOrder::Newest
    }

    pub(crate) fn matches(&self, episode: &Episode) -> bool {
        matches_query(episode, &self.query.to_lowercase())
            && self.tag.as_deref().is_none_or(|tag| episode.has_tag(tag))
    }
}

/// What goes into the session store under [`FILTER_STATE_KEY`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SavedFilterState {
    #[serde(default)]
    pub(crate) search_query: String,
    #[serde(default)]
    pub(crate) selected_tag: Option<String>,
    #[serde(default)]
    pub(crate) sort_order: SortOrder,
    #[serde(default)]
    pub(crate) scroll_position: usize,
    #[serde(default)]
    pub(crate) current_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) selected_number: Option<String>,
}

fn matches_query(episode: &Episode, query_lower: &str) -> bool {
    if query_lower.is_empty() {
        return true;
    }
    episode.title.to_lowercase().contains(query_lower)
        || episode.description.to_lowercase().contains(query_lower)
        || episode.number.to_lowercase().contains(query_lower)
        || episode
            .tags
            .iter()
            .any(|tag| tag.to_lowercase().contains(query_lower))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RestorePolicy {
    pub(crate) max_attempts: u32,
    pub(crate) tolerance: usize,
}

/// Best-effort re-application of a saved scroll offset. Layout can still
/// move after the first paint, so the offset is re-applied while it has
/// drifted beyond `tolerance`, for at most `max_attempts` frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ScrollRestore {
    target: usize,
    attempts_left: u32,
    tolerance: usize,
    applied_once: bool,
}

impl ScrollRestore {
    pub(crate) fn new(target: usize, policy: RestorePolicy) -> Option<Self> {
        if target == 0 || policy.max_attempts == 0 {
            return None;
        }
        Some(Self {
            target,
            attempts_left: policy.max_attempts,
            tolerance: policy.tolerance,
            applied_once: false,
        })
    }

    pub(crate) fn target(&self) -> usize {
        self.target
    }

    /// Consumes one attempt and returns the offset to apply, if any.
    pub(crate) fn next_offset(&mut self, current: usize) -> Option<usize> {
        if self.attempts_left == 0 {
            return None;
        }
        self.attempts_left -= 1;
        if !self.applied_once {
            self.applied_once = true;
            return Some(self.target);
        }
        (current.abs_diff(self.target) > self.tolerance).then_some(self.target)
    }

    pub(crate) fn is_done(&self) -> bool {
        self.attempts_left == 0
    }
}

/// Owns the episode collection and the filter/sort/window state of the list
/// view. Every mutation is mirrored into the session store.
pub(crate) struct EpisodeList<S: SessionStore> {
    episodes: Vec<Episode>,
    dates: Vec<Option<NaiveDate>>,
    tags: Vec<String>,
    filter: FilterState,
    filtered: Vec<usize>,
    displayed: usize,
    page_size: usize,
    loading: bool,
    scroll_position: usize,
    selected_number: Option<String>,
    restore_policy: RestorePolicy,
    pending_restore: Option<ScrollRestore>,
    store: S,
}

impl<S: SessionStore> EpisodeList<S> {
    pub(crate) fn new(store: S, page_size: usize, restore_policy: RestorePolicy) -> Self {
        Self {
            episodes: Vec::new(),
            dates: Vec::new(),
            tags: Vec::new(),
            filter: FilterState::default(),
            filtered: Vec::new(),
            displayed: 0,
            page_size: page_size.max(1),
            loading: true,
            scroll_position: 0,
            selected_number: None,
            restore_policy,
            pending_restore: None,
            store,
        }
    }

    /// Installs a freshly fetched collection, restoring any saved state
    /// before the first window is built.
    pub(crate) fn load(&mut self, episodes: Vec<Episode>) {
        self.dates = episodes
            .iter()
            .map(|episode| parse_episode_date(&episode.date))
            .collect();
        self.tags = collect_tags(&episodes);
        self.episodes = episodes;
        self.loading = false;
        self.reenter();
    }

    /// Loading failed upstream; the list stays empty and inert.
    pub(crate) fn fail_load(&mut self) {
        self.episodes.clear();
        self.dates.clear();
        self.tags.clear();
        self.filtered.clear();
        self.displayed = 0;
        self.loading = false;
    }

    /// Re-enters the list view: saved filter values and window size are
    /// applied before anything is painted, the scroll offset is queued.
    pub(crate) fn reenter(&mut self) {
        let saved = self.read_saved_state();
        let restored_window = match saved {
            Some(saved) => {
                self.filter = FilterState {
                    query: saved.search_query,
                    tag: saved.selected_tag,
                    sort: saved.sort_order,
                };
                self.scroll_position = saved.scroll_position;
                self.selected_number = saved.selected_number;
                self.pending_restore =
                    ScrollRestore::new(saved.scroll_position, self.restore_policy);
                log::info!(
                    "restored list state: scroll={} shown={}",
                    saved.scroll_position,
                    saved.current_index
                );
                Some(if saved.current_index > 0 {
                    saved.current_index
                } else {
                    self.page_size
                })
            }
            None => {
                self.scroll_position = 0;
                self.selected_number = None;
                self.pending_restore = None;
                None
            }
        };

        self.refilter();
        match restored_window {
            Some(count) => self.displayed = count.min(self.filtered.len()),
            None => self.reset_window(),
        }
        self.persist();
    }

    pub(crate) fn set_query(&mut self, query: &str) {
        self.filter.query = query.to_string();
        self.apply_filter();
    }

    pub(crate) fn set_tag(&mut self, tag: Option<String>) {
        self.filter.tag = tag;
        self.apply_filter();
    }

    pub(crate) fn set_sort(&mut self, sort: SortOrder) {
        self.filter.sort = sort;
        self.apply_filter();
    }

    /// Cycles the tag filter through the catalogue, then back to none.
    pub(crate) fn cycle_tag(&mut self) {
        let next = match self.filter.tag.as_deref() {
            None => self.tags.first().cloned(),
            Some(current) => self
                .tags
                .iter()
                .position(|tag| tag == current)
                .and_then(|idx| self.tags.get(idx + 1))
                .cloned(),
        };
        self.set_tag(next);
    }

    pub(crate) fn clear_filters(&mut self) {
        self.filter = FilterState::default();
        self.apply_filter();
        for key in [FILTER_STATE_KEY, FILTERED_NUMBERS_KEY] {
            if let Err(err) = self.store.remove(key) {
                log::warn!("failed to clear session entry {key}: {err:#}");
            }
        }
    }

    /// Appends up to one page to the display window; returns how many
    /// episodes were added.
    pub(crate) fn load_more(&mut self) -> usize {
        if !self.has_more() {
            return 0;
        }
        let end = (self.displayed + self.page_size).min(self.filtered.len());
        let added = end - self.displayed;
        self.displayed = end;
        added
    }

    /// Records the viewport so the next save carries it.
    pub(crate) fn note_viewport(&mut self, scroll_position: usize, selected_number: Option<String>) {
        self.scroll_position = scroll_position;
        self.selected_number = selected_number;
    }

    /// Saves everything needed to come back to this exact window, e.g.
    /// before leaving for a detail view.
    pub(crate) fn save_state(&mut self) {
        self.persist();
        log::info!(
            "saved list state: scroll={} shown={}",
            self.scroll_position,
            self.displayed
        );
    }

    pub(crate) fn take_scroll_restore(&mut self) -> Option<ScrollRestore> {
        self.pending_restore.take()
    }

    pub(crate) fn is_loading(&self) -> bool {
        self.loading
    }

    pub(crate) fn has_more(&self) -> bool {
        self.displayed < self.filtered.len()
    }

    pub(crate) fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub(crate) fn tags(&self) -> &[String] {
        &self.tags
    }

    pub(crate) fn episodes(&self) -> &[Episode] {
        &self.episodes
    }

    pub(crate) fn window_len(&self) -> usize {
        self.displayed
    }

    pub(crate) fn filtered_len(&self) -> usize {
        self.filtered.len()
    }

    pub(crate) fn displayed(&self) -> Vec<&Episode> {
        self.filtered[..self.displayed]
            .iter()
            .map(|&idx| &self.episodes[idx])
            .collect()
    }

    pub(crate) fn filtered(&self) -> Vec<&Episode> {
        self.filtered
            .iter()
            .map(|&idx| &self.episodes[idx])
            .collect()
    }

    pub(crate) fn filtered_numbers(&self) -> Vec<String> {
        self.filtered()
            .into_iter()
            .map(|episode| episode.number.clone())
            .collect()
    }

    /// Window position of the episode that was selected when state was
    /// last saved, if it is still displayed.
    pub(crate) fn restored_selection(&self) -> Option<usize> {
        let number = self.selected_number.as_deref()?;
        self.filtered[..self.displayed]
            .iter()
            .position(|&idx| self.episodes[idx].number == number)
    }

    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    fn apply_filter(&mut self) {
        self.refilter();
        self.reset_window();
        self.persist();
    }

    fn refilter(&mut self) {
        let mut indices = (0..self.episodes.len())
            .filter(|&idx| self.filter.matches(&self.episodes[idx]))
            .collect::<Vec<_>>();
        let dates = &self.dates;
        match self.filter.sort {
            SortOrder::Newest => {
                indices.sort_by(|&a, &b| compare_newest_first(dates[a], dates[b]))
            }
            SortOrder::Oldest => {
                indices.sort_by(|&a, &b| compare_oldest_first(dates[a], dates[b]))
            }
        }
        self.filtered = indices;
    }

    fn reset_window(&mut self) {
        self.displayed = 0;
        self.load_more();
    }

    fn read_saved_state(&self) -> Option<SavedFilterState> {
        let raw = match self.store.get(FILTER_STATE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                log::error!("failed to read saved list state: {err:#}");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(saved) => Some(saved),
            Err(err) => {
                log::error!("ignoring malformed saved list state: {err}");
                None
            }
        }
    }

    fn persist(&mut self) {
        let saved = SavedFilterState {
            search_query: self.filter.query.clone(),
            selected_tag: self.filter.tag.clone(),
            sort_order: self.filter.sort,
            scroll_position: self.scroll_position,
            current_index: self.displayed,
            selected_number: self.selected_number.clone(),
        };
        let numbers = self.filtered_numbers();
        let encoded = serde_json::to_string(&saved)
            .and_then(|state| serde_json::to_string(&numbers).map(|numbers| (state, numbers)));
        let (state, numbers) = match encoded {
            Ok(encoded) => encoded,
            Err(err) => {
                log::error!("failed to encode list state: {err}");
                return;
            }
        };
        if let Err(err) = self.store.set(FILTER_STATE_KEY, &state) {
            log::error!("failed to save list state: {err:#}");
        }
        if let Err(err) = self.store.set(FILTERED_NUMBERS_KEY, &numbers) {
            log::error!("failed to save filtered episode numbers: {err:#}");
        }
    }
}

/// Reads the ordered episode numbers saved by the list view.
pub(crate) fn saved_filtered_numbers(store: &dyn SessionStore) -> Option<Vec<String>> {
    let raw = match store.get(FILTERED_NUMBERS_KEY) {
        Ok(raw) => raw?,
        Err(err) => {
            log::error!("failed to read filtered episode numbers: {err:#}");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(numbers) => Some(numbers),
        Err(err) => {
            log::error!("ignoring malformed filtered episode numbers: {err}");
            None
        }
    }
}

/// Drops both list entries, as when a detail view is entered from outside
/// the list.
pub(crate) fn forget_list_state(store: &mut dyn SessionStore) {
    for key in [FILTER_STATE_KEY, FILTERED_NUMBERS_KEY] {
        if let Err(err) = store.remove(key) {
            log::warn!("failed to clear session entry {key}: {err:#}");
        }
    }
}
