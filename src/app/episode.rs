use std::cmp::Ordering;
use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub(crate) struct EpisodeLink {
    #[serde(default)]
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) url: String,
}

/// Fields that live in `transcripts/ep{number}.json` and are merged into an
/// episode when its detail view loads.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub(crate) struct Transcript {
    #[serde(default)]
    pub(crate) transcript: String,
    #[serde(default)]
    pub(crate) summary: String,
    #[serde(default)]
    pub(crate) sub_title: String,
    #[serde(default)]
    pub(crate) detailed_description: String,
}

impl Transcript {
    pub(crate) fn is_empty(&self) -> bool {
        self.transcript.trim().is_empty()
            && self.summary.trim().is_empty()
            && self.sub_title.trim().is_empty()
            && self.detailed_description.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub(crate) struct Episode {
    pub(crate) id: i64,
    #[serde(default)]
    pub(crate) number: String,
    #[serde(default)]
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) description: String,
    #[serde(default)]
    pub(crate) date: String,
    #[serde(default)]
    pub(crate) duration: String,
    #[serde(default)]
    pub(crate) tags: Vec<String>,
    #[serde(rename = "spotifyUrl", default)]
    pub(crate) spotify_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) thumbnail: Option<String>,
    #[serde(default, deserialize_with = "deserialize_links")]
    pub(crate) links: Vec<EpisodeLink>,
    #[serde(default)]
    pub(crate) has_transcript: bool,
    #[serde(flatten)]
    pub(crate) transcript: Transcript,
}

#[derive(Debug, Deserialize)]
struct EpisodeCatalog {
    episodes: Vec<Episode>,
}

// `links` is hand-edited upstream; anything that is not a list of objects
// with a url is dropped instead of failing the whole catalogue.
fn deserialize_links<'de, D>(deserializer: D) -> Result<Vec<EpisodeLink>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let serde_json::Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<EpisodeLink>(item).ok())
        .collect())
}

pub(crate) fn parse_catalog(raw: &str) -> Result<Vec<Episode>> {
    let catalog: EpisodeCatalog =
        serde_json::from_str(raw).context("episodes document is not valid JSON")?;
    Ok(catalog.episodes)
}

pub(crate) fn parse_transcript(raw: &str) -> Result<Transcript> {
    serde_json::from_str(raw).context("transcript document is not valid JSON")
}

impl Episode {
    pub(crate) fn apply_transcript(&mut self, transcript: Transcript) {
        self.transcript = transcript;
    }

    /// Subtitle from the transcript when present, otherwise the description.
    pub(crate) fn headline(&self) -> &str {
        let sub_title = self.transcript.sub_title.trim();
        if sub_title.is_empty() {
            self.description.trim()
        } else {
            sub_title
        }
    }

    pub(crate) fn valid_links(&self) -> Vec<&EpisodeLink> {
        self.links
            .iter()
            .filter(|link| !link.url.trim().is_empty())
            .collect()
    }

    pub(crate) fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|candidate| candidate == tag)
    }
}

pub(crate) fn parse_episode_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|dt| dt.date_naive())
}

/// Newest first. Undated episodes go last and keep their relative order.
pub(crate) fn compare_newest_first(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(left), Some(right)) => right.cmp(&left),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Oldest first. Undated episodes go last and keep their relative order.
pub(crate) fn compare_oldest_first(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(left), Some(right)) => left.cmp(&right),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Distinct tags in first-seen order.
pub(crate) fn collect_tags(episodes: &[Episode]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tags = Vec::new();
    for tag in episodes.iter().flat_map(|episode| episode.tags.iter()) {
        if seen.insert(tag.as_str()) {
            tags.push(tag.clone());
        }
    }
    tags
}

pub(crate) fn latest_episodes(episodes: &[Episode], count: usize) -> Vec<&Episode> {
    let mut sorted = episodes.iter().collect::<Vec<_>>();
    sorted.sort_by(|a, b| {
        compare_newest_first(parse_episode_date(&a.date), parse_episode_date(&b.date))
    });
    sorted.truncate(count);
    sorted
}

pub(crate) fn find_by_number<'a>(episodes: &'a [Episode], number: &str) -> Option<&'a Episode> {
    episodes.iter().find(|episode| episode.number == number)
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    let mut out = s.to_string();
    if out.chars().count() > max {
        out = out.chars().take(max.saturating_sub(3)).collect::<String>() + "...";
    }
    out
}

pub(crate) fn format_tags(tags: &[String]) -> String {
    if tags.is_empty() {
        "-".to_string()
    } else {
        tags.join(", ")
    }
}

pub(crate) fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
