use std::borrow::Cow;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;

use super::episode::Episode;

const BOM: &str = "\u{FEFF}";

pub(crate) const CSV_HEADERS: [&str; 8] = [
    "Episode",
    "Title",
    "Date",
    "Duration",
    "Description",
    "Tags",
    "Spotify URL",
    "Transcript",
];

/// Quotes a value containing a comma, newline or double quote, doubling
/// inner quotes. Anything else passes through untouched.
pub(crate) fn escape_csv(value: &str) -> Cow<'_, str> {
    if value.contains([',', '\n', '"']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

fn csv_row<'a>(cells: impl IntoIterator<Item = &'a str>) -> String {
    cells
        .into_iter()
        .map(escape_csv)
        .collect::<Vec<_>>()
        .join(",")
}

/// Header plus one row per episode, rows joined with `\n`, no BOM.
pub(crate) fn episodes_to_csv(episodes: &[Episode]) -> String {
    let mut rows = Vec::with_capacity(episodes.len() + 1);
    rows.push(csv_row(CSV_HEADERS));
    for episode in episodes {
        let tags = episode.tags.join("; ");
        let transcript = if episode.has_transcript { "yes" } else { "no" };
        rows.push(csv_row([
            episode.number.as_str(),
            episode.title.as_str(),
            episode.date.as_str(),
            episode.duration.as_str(),
            episode.description.as_str(),
            tags.as_str(),
            episode.spotify_url.as_str(),
            transcript,
        ]));
    }
    rows.join("\n")
}

pub(crate) fn default_export_file_name(today: NaiveDate) -> String {
    format!("episodes_{}.csv", today.format("%Y%m%d"))
}

/// Writes the BOM-prefixed CSV. A directory target gets the dated default
/// file name inside it.
pub(crate) fn write_csv_export(
    episodes: &[Episode],
    target: &Path,
    today: NaiveDate,
) -> Result<PathBuf> {
    let path = if target.is_dir() {
        target.join(default_export_file_name(today))
    } else {
        target.to_path_buf()
    };
    let content = format!("{BOM}{}", episodes_to_csv(episodes));
    std::fs::write(&path, content)
        .with_context(|| format!("failed to write CSV export {}", path.display()))?;
    log::info!("exported {} episodes to {}", episodes.len(), path.display());
    Ok(path)
}
