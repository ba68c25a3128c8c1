use crate::db::SessionStore;

use super::episode::{Episode, find_by_number};
use super::listing::saved_filtered_numbers;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Adjacent<'a> {
    pub(crate) previous: Option<&'a Episode>,
    pub(crate) next: Option<&'a Episode>,
}

/// Order used for previous/next: the list view's saved filtered order when
/// one exists, otherwise the whole collection as published.
pub(crate) fn navigation_order<'a>(
    episodes: &'a [Episode],
    store: &dyn SessionStore,
) -> Vec<&'a Episode> {
    match saved_filtered_numbers(store) {
        Some(numbers) => {
            let order = numbers
                .iter()
                .filter_map(|number| find_by_number(episodes, number))
                .collect::<Vec<_>>();
            log::debug!("navigating within saved filtered order ({})", order.len());
            order
        }
        None => episodes.iter().collect(),
    }
}

pub(crate) fn adjacent_in<'a>(order: &[&'a Episode], id: i64) -> Adjacent<'a> {
    let Some(idx) = order.iter().position(|episode| episode.id == id) else {
        return Adjacent::default();
    };
    Adjacent {
        previous: idx.checked_sub(1).and_then(|prev| order.get(prev)).copied(),
        next: order.get(idx + 1).copied(),
    }
}

pub(crate) fn find_adjacent<'a>(
    episodes: &'a [Episode],
    id: i64,
    store: &dyn SessionStore,
) -> Adjacent<'a> {
    adjacent_in(&navigation_order(episodes, store), id)
}
