use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate};
use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;
use serde_json::{Map, Value, json};

use crate::config::SiteConfig;
use crate::http::get_text;

static EPISODE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)ep(\d+\.\d+\.\d+)").expect("valid episode number regex"));
static HTML_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid html tag regex"));
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));
static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s<>"')]+[^\s<>"'.,:;)\]}]"#).expect("valid url regex")
});

pub(crate) const RELATED_LINK_TITLE: &str = "関連リンク";
const FALLBACK_TAG: &str = "雑談";
const MAX_TAGS: usize = 3;

/// Tags in priority order with the lowercase keywords that select them.
const TAG_KEYWORDS: &[(&str, &[&str])] = &[
    ("ゲスト", &["ゲスト", "guest", "突撃", "quiet talk", "メンバーファイル"]),
    ("イベント", &["イベント", "ふりかえり", "ランキング", "アドベントカレンダー", "advent"]),
    ("Code for", &["code for", "summit", "ブリゲード", "コミュニティ"]),
    ("シビックテック", &["シビックテック", "civictech", "civic tech"]),
    ("データ", &["データ", "オープンデータ", "data", "api", "統計", "プラットフォーム"]),
    (
        "技術",
        &["ai", "gpt", "sora", "システム", "アプリ", "github", "プログラミング", "開発", "chatgpt"],
    ),
    ("地域", &["地域", "富山", "長崎", "東京", "金沢", "福井", "石川", "都市", "市", "町"]),
    (
        "ライフスタイル",
        &["お店", "グルメ", "日本酒", "おいしい", "買ってよかった", "クリスマス"],
    ),
    ("文化", &["歴史", "文化", "社会", "教育", "猫"]),
    ("雑談", &["雑談", "予想", "占う"]),
];

/// Hosts whose URLs are the episode itself or its audio, not related links.
const PLAYER_HOSTS: [&str; 3] = ["spotify.com", "anchor.fm", "cloudfront.net"];

/// One `<item>` of the podcast feed, as raw text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FeedItem {
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) summary: String,
    pub(crate) link: String,
    pub(crate) pub_date: String,
    pub(crate) duration: String,
}

#[derive(Debug, Clone, Copy)]
enum ItemField {
    Title,
    Description,
    Summary,
    Link,
    PubDate,
    Duration,
}

impl ItemField {
    fn from_tag(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Self::Title),
            b"description" => Some(Self::Description),
            b"itunes:summary" => Some(Self::Summary),
            b"link" => Some(Self::Link),
            b"pubDate" => Some(Self::PubDate),
            b"itunes:duration" => Some(Self::Duration),
            _ => None,
        }
    }

    fn slot<'a>(&self, item: &'a mut FeedItem) -> &'a mut String {
        match self {
            Self::Title => &mut item.title,
            Self::Description => &mut item.description,
            Self::Summary => &mut item.summary,
            Self::Link => &mut item.link,
            Self::PubDate => &mut item.pub_date,
            Self::Duration => &mut item.duration,
        }
    }
}

/// Items of an RSS document in feed order (newest first for podcast feeds).
pub(crate) fn parse_feed(xml: &str) -> Result<Vec<FeedItem>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut current: Option<FeedItem> = None;
    let mut field: Option<ItemField> = None;

    loop {
        let event = reader
            .read_event()
            .with_context(|| format!("malformed feed at byte {}", reader.buffer_position()))?;
        match event {
            Event::Start(tag) => match tag.name().as_ref() {
                b"item" => current = Some(FeedItem::default()),
                name if current.is_some() => field = ItemField::from_tag(name),
                _ => {}
            },
            Event::End(tag) => {
                if tag.name().as_ref() == b"item"
                    && let Some(item) = current.take()
                {
                    items.push(item);
                }
                field = None;
            }
            Event::Text(text) => {
                if let (Some(item), Some(field)) = (current.as_mut(), field) {
                    let text = text
                        .unescape()
                        .map(|text| text.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&text).into_owned());
                    field.slot(item).push_str(&text);
                }
            }
            Event::CData(data) => {
                if let (Some(item), Some(field)) = (current.as_mut(), field) {
                    field
                        .slot(item)
                        .push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(items)
}

/// `ep1.0.16 2025年ランキング` -> `1.0.16`
pub(crate) fn parse_episode_number(title: &str) -> Option<String> {
    EPISODE_NUMBER_RE
        .captures(title)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Feed durations as `M:SS`: `00:14:22` -> `14:22`, `01:02:03` -> `62:03`.
/// Two-part values are kept; anything else is `0:00`.
pub(crate) fn format_duration(raw: &str) -> String {
    let raw = raw.trim();
    let parts: Vec<&str> = raw.split(':').collect();
    match parts.as_slice() {
        [hours, minutes, seconds] => {
            match (hours.parse::<u32>(), minutes.parse::<u32>()) {
                (Ok(hours), Ok(minutes)) => format!("{}:{seconds}", hours * 60 + minutes),
                _ => "0:00".to_string(),
            }
        }
        [_, _] => raw.to_string(),
        _ => "0:00".to_string(),
    }
}

/// RFC 2822 `pubDate` as `YYYY-MM-DD`, falling back to `today`.
pub(crate) fn parse_pub_date(raw: &str, today: NaiveDate) -> String {
    match DateTime::parse_from_rfc2822(raw.trim()) {
        Ok(date) => date.date_naive().format("%Y-%m-%d").to_string(),
        Err(err) => {
            log::warn!("unparseable pubDate `{raw}` ({err}); using today");
            today.format("%Y-%m-%d").to_string()
        }
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Strips HTML tags and collapses whitespace.
pub(crate) fn clean_description(html: &str) -> String {
    let text = HTML_TAG_RE.replace_all(html, " ");
    let text = decode_entities(&text);
    WHITESPACE_RE.replace_all(&text, " ").trim().to_string()
}

/// Removes URLs from `text` and returns the remaining text with the URLs in
/// first-seen order, without duplicates.
pub(crate) fn extract_urls(text: &str) -> (String, Vec<String>) {
    let mut urls: Vec<String> = Vec::new();
    for found in URL_RE.find_iter(text) {
        if !urls.iter().any(|url| url == found.as_str()) {
            urls.push(found.as_str().to_string());
        }
    }
    let stripped = URL_RE.replace_all(text, "");
    let cleaned = WHITESPACE_RE.replace_all(&stripped, " ").trim().to_string();
    (cleaned, urls)
}

/// Up to three tags by keyword, in priority order.
pub(crate) fn generate_tags(title: &str, description: &str) -> Vec<String> {
    let text = format!("{title} {description}").to_lowercase();
    let tags: Vec<String> = TAG_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|keyword| text.contains(keyword)))
        .take(MAX_TAGS)
        .map(|(tag, _)| tag.to_string())
        .collect();
    if tags.is_empty() {
        vec![FALLBACK_TAG.to_string()]
    } else {
        tags
    }
}

fn is_player_url(url: &str) -> bool {
    PLAYER_HOSTS.iter().any(|host| url.contains(host))
}

/// Values the feed does not carry.
#[derive(Debug, Clone)]
pub(crate) struct EpisodeDefaults {
    pub(crate) show_url: String,
    pub(crate) thumbnail: String,
}

impl EpisodeDefaults {
    pub(crate) fn from_config(config: &SiteConfig) -> Self {
        Self {
            show_url: config.platforms.spotify.clone(),
            thumbnail: config.default_image.clone(),
        }
    }
}

/// Catalogue entry for a feed item, without an id. Items whose title has no
/// episode number are skipped.
pub(crate) fn episode_from_item(
    item: &FeedItem,
    defaults: &EpisodeDefaults,
    today: NaiveDate,
) -> Option<Value> {
    let title = item.title.trim();
    let Some(number) = parse_episode_number(title) else {
        log::warn!("no episode number in feed item `{title}`");
        return None;
    };

    let raw_description = if item.description.trim().is_empty() {
        &item.summary
    } else {
        &item.description
    };
    let (description, urls) = extract_urls(&clean_description(raw_description));
    let tags = generate_tags(title, &description);

    let link = item.link.trim();
    let spotify_url = if link.contains("spotify.com") {
        link.to_string()
    } else {
        log::debug!("ep{number}: no episode URL in feed; using the show URL");
        defaults.show_url.clone()
    };

    let links: Vec<Value> = urls
        .iter()
        .filter(|url| !is_player_url(url))
        .map(|url| json!({ "title": RELATED_LINK_TITLE, "url": url }))
        .collect();

    Some(json!({
        "number": number,
        "title": title,
        "date": parse_pub_date(&item.pub_date, today),
        "duration": format_duration(&item.duration),
        "description": description,
        "thumbnail": defaults.thumbnail,
        "spotifyUrl": spotify_url,
        "tags": tags,
        "transcript": "",
        "links": links,
    }))
}

fn text_field<'a>(episode: &'a Value, key: &str) -> &'a str {
    episode.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn links_missing(links: Option<&Value>) -> bool {
    match links {
        None | Some(Value::Null) => true,
        Some(Value::Array(links)) => links.is_empty(),
        Some(Value::String(links)) => links.is_empty(),
        Some(_) => false,
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MergeOutcome {
    pub(crate) episodes: Vec<Value>,
    pub(crate) added: usize,
    pub(crate) updated: usize,
    pub(crate) unchanged: usize,
}

impl MergeOutcome {
    pub(crate) fn changed(&self) -> bool {
        self.added > 0 || self.updated > 0
    }
}

/// Fills an existing entry's episode URL (while it still points at the show)
/// and its links (while it has none). Returns whether anything changed.
fn refresh_entry(current: &mut Map<String, Value>, fresh: &Value, show_url: &str) -> bool {
    let number = text_field(fresh, "number");
    let mut changed = false;

    let old_url = current
        .get("spotifyUrl")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let new_url = text_field(fresh, "spotifyUrl");
    if old_url == show_url && new_url != show_url && new_url.contains("episodes") {
        log::info!("ep{number}: episode URL filled in");
        current.insert("spotifyUrl".into(), Value::String(new_url.to_string()));
        changed = true;
    }

    if let Some(new_links) = fresh.get("links")
        && new_links.as_array().is_some_and(|links| !links.is_empty())
        && links_missing(current.get("links"))
    {
        log::info!("ep{number}: related links added");
        current.insert("links".into(), new_links.clone());
        changed = true;
    }

    changed
}

/// Adds unknown episode numbers at the front and refreshes known ones.
/// Existing entries keep everything else. Ids are renumbered from 1 only
/// when something changed.
pub(crate) fn merge_episodes(
    mut existing: Vec<Value>,
    fresh: Vec<Value>,
    show_url: &str,
) -> MergeOutcome {
    let index: HashMap<String, usize> = existing
        .iter()
        .enumerate()
        .map(|(idx, episode)| (text_field(episode, "number").to_string(), idx))
        .collect();
    let mut added_numbers = HashSet::new();

    let mut added = Vec::new();
    let mut updated = 0;
    let mut unchanged = 0;

    for episode in fresh {
        let number = text_field(&episode, "number").to_string();
        match index.get(&number).copied() {
            Some(idx) => {
                let refreshed = existing[idx]
                    .as_object_mut()
                    .is_some_and(|current| refresh_entry(current, &episode, show_url));
                if refreshed {
                    updated += 1;
                } else {
                    unchanged += 1;
                }
            }
            None => {
                if added_numbers.insert(number) {
                    added.push(episode);
                }
            }
        }
    }

    if added.is_empty() && updated == 0 {
        return MergeOutcome {
            episodes: existing,
            added: 0,
            updated,
            unchanged,
        };
    }

    let added_count = added.len();
    let mut episodes = added;
    episodes.append(&mut existing);
    for (idx, episode) in episodes.iter_mut().enumerate() {
        if let Some(fields) = episode.as_object_mut() {
            fields.insert("id".into(), json!(idx + 1));
        }
    }

    MergeOutcome {
        episodes,
        added: added_count,
        updated,
        unchanged,
    }
}

/// Raw catalogue entries; a missing file is an empty catalogue.
pub(crate) fn load_catalogue_values(path: &Path) -> Result<Vec<Value>> {
    if !path.exists() {
        log::info!("{} does not exist yet; starting empty", path.display());
        return Ok(Vec::new());
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let mut document: Map<String, Value> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON object", path.display()))?;
    match document.remove("episodes") {
        Some(Value::Array(episodes)) => Ok(episodes),
        None => Ok(Vec::new()),
        Some(_) => bail!("`episodes` in {} is not a list", path.display()),
    }
}

pub(crate) fn catalogue_json(episodes: &[Value]) -> Result<String> {
    Ok(serde_json::to_string_pretty(&json!({ "episodes": episodes }))?)
}

/// Writes the catalogue, first copying any existing file to
/// `<name>.backup`. Returns the backup path when one was made.
pub(crate) fn save_catalogue(path: &Path, episodes: &[Value]) -> Result<Option<PathBuf>> {
    let backup = if path.exists() {
        let mut name = path.as_os_str().to_owned();
        name.push(".backup");
        let backup = PathBuf::from(name);
        fs::copy(path, &backup)
            .with_context(|| format!("failed to back up {}", path.display()))?;
        Some(backup)
    } else {
        None
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, catalogue_json(episodes)?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(backup)
}

#[derive(Debug, Clone)]
pub(crate) struct SyncRequest {
    /// Feed URL or local file.
    pub(crate) feed: String,
    /// Newest feed items to look at; `None` reads the whole feed.
    pub(crate) limit: Option<usize>,
    pub(crate) output: PathBuf,
    pub(crate) dry_run: bool,
}

#[derive(Debug)]
pub(crate) struct SyncReport {
    pub(crate) checked: usize,
    pub(crate) outcome: MergeOutcome,
    pub(crate) written: bool,
    pub(crate) backup: Option<PathBuf>,
}

fn read_feed(config: &SiteConfig, feed: &str) -> Result<String> {
    if feed.starts_with("http://") || feed.starts_with("https://") {
        Ok(get_text(
            feed,
            config.http.connect_timeout(),
            config.http.read_timeout(),
        )?)
    } else {
        fs::read_to_string(feed).with_context(|| format!("failed to read feed file {feed}"))
    }
}

/// Fetches the feed, merges it into the catalogue at `request.output` and
/// saves when something changed (unless dry-running).
pub(crate) fn sync_catalogue(
    config: &SiteConfig,
    request: &SyncRequest,
    today: NaiveDate,
) -> Result<SyncReport> {
    log::info!("syncing {} from {}", request.output.display(), request.feed);
    let xml = read_feed(config, &request.feed)?;
    let mut items = parse_feed(&xml).context("feed could not be parsed")?;
    if let Some(limit) = request.limit {
        items.truncate(limit);
    }

    let defaults = EpisodeDefaults::from_config(config);
    let fresh: Vec<Value> = items
        .iter()
        .filter_map(|item| episode_from_item(item, &defaults, today))
        .collect();
    let existing = load_catalogue_values(&request.output)?;
    let outcome = merge_episodes(existing, fresh, &defaults.show_url);

    let mut report = SyncReport {
        checked: items.len(),
        outcome,
        written: false,
        backup: None,
    };
    if report.outcome.changed() && !request.dry_run {
        report.backup = save_catalogue(&request.output, &report.outcome.episodes)?;
        report.written = true;
        log::info!(
            "saved {} episodes to {}",
            report.outcome.episodes.len(),
            request.output.display()
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::tests::{Behavior, TestServer};

    const SHOW_URL: &str = "https://open.spotify.com/show/example";

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">
  <channel>
    <title>Example Cast</title>
    <link>https://podcasters.spotify.com/pod/show/example</link>
    <item>
      <title><![CDATA[ep1.0.3 富山のオープンデータ]]></title>
      <description><![CDATA[<p>オープンデータの話。</p><p>https://example.org/open-data, https://anchor.fm/s/abc</p>]]></description>
      <link>https://podcasters.spotify.com/pod/show/example/episodes/ep1-0-3-e2abc</link>
      <pubDate>Thu, 08 Jan 2026 21:00:00 GMT</pubDate>
      <itunes:duration>00:14:22</itunes:duration>
    </item>
    <item>
      <title>Bonus &amp; outtakes</title>
      <description>No number here</description>
      <pubDate>Wed, 07 Jan 2026 21:00:00 GMT</pubDate>
    </item>
    <item>
      <title>EP1.0.2 Guest special</title>
      <itunes:summary>A quiet talk with a guest.</itunes:summary>
      <link>https://example.org/not-spotify</link>
      <pubDate>not a date</pubDate>
      <itunes:duration>01:02:03</itunes:duration>
    </item>
  </channel>
</rss>"#;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 1).expect("valid date")
    }

    fn defaults() -> EpisodeDefaults {
        EpisodeDefaults {
            show_url: SHOW_URL.to_string(),
            thumbnail: "img/logo.png".to_string(),
        }
    }

    fn stored(number: &str, spotify_url: &str, links: Value) -> Value {
        json!({
            "id": 9,
            "number": number,
            "title": format!("ep{number}"),
            "spotifyUrl": spotify_url,
            "links": links,
            "transcript": "",
            "customField": "kept",
        })
    }

    #[test]
    fn feed_items_keep_feed_order_and_skip_channel_fields() {
        let items = parse_feed(FEED).expect("feed should parse");
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].title, "ep1.0.3 富山のオープンデータ");
        assert!(items[0].description.contains("<p>オープンデータの話。</p>"));
        assert_eq!(items[0].duration, "00:14:22");
        assert_eq!(items[1].title, "Bonus & outtakes");
        assert_eq!(items[2].summary, "A quiet talk with a guest.");
        assert!(items[2].description.is_empty());
    }

    #[test]
    fn malformed_feed_is_an_error() {
        assert!(parse_feed("<rss><channel><item><title>x</channel></rss>").is_err());
    }

    #[test]
    fn episode_numbers_come_from_titles() {
        assert_eq!(
            parse_episode_number("ep1.0.16 2025年エピソードランキング").as_deref(),
            Some("1.0.16")
        );
        assert_eq!(parse_episode_number("EP2.1.0 Guest").as_deref(), Some("2.1.0"));
        assert_eq!(parse_episode_number("ep1.0 short"), None);
    }

    #[test]
    fn durations_are_minutes_and_seconds() {
        assert_eq!(format_duration("00:14:22"), "14:22");
        assert_eq!(format_duration("00:05:03"), "5:03");
        assert_eq!(format_duration("01:02:03"), "62:03");
        assert_eq!(format_duration("41:07"), "41:07");
        assert_eq!(format_duration("862"), "0:00");
        assert_eq!(format_duration(""), "0:00");
    }

    #[test]
    fn pub_dates_fall_back_to_today() {
        assert_eq!(
            parse_pub_date("Thu, 08 Jan 2026 21:00:00 GMT", today()),
            "2026-01-08"
        );
        assert_eq!(
            parse_pub_date("Fri, 09 Jan 2026 07:30:00 +0900", today()),
            "2026-01-09"
        );
        assert_eq!(parse_pub_date("yesterday", today()), "2026-02-01");
    }

    #[test]
    fn urls_are_pulled_out_of_descriptions() {
        let (text, urls) = extract_urls(
            "詳しくは https://example.org/a. と https://example.org/b) と https://example.org/a を参照",
        );
        assert_eq!(urls, vec!["https://example.org/a", "https://example.org/b"]);
        assert_eq!(text, "詳しくは . と ) と を参照");
    }

    #[test]
    fn descriptions_lose_markup() {
        assert_eq!(
            clean_description("<p>Tom &amp; Jerry</p>\n<p><a href=\"x\">link</a></p>"),
            "Tom & Jerry link"
        );
    }

    #[test]
    fn tags_follow_priority_and_cap_at_three() {
        assert_eq!(
            generate_tags("ゲスト回", "イベントのふりかえりとオープンデータとAI"),
            vec!["ゲスト", "イベント", "データ"]
        );
        assert_eq!(generate_tags("Civic Tech Night", ""), vec!["シビックテック"]);
        assert_eq!(generate_tags("hello", "world"), vec!["雑談"]);
    }

    #[test]
    fn feed_items_become_catalogue_entries() {
        let items = parse_feed(FEED).expect("feed should parse");

        let first = episode_from_item(&items[0], &defaults(), today()).expect("numbered item");
        assert_eq!(first["number"], "1.0.3");
        assert_eq!(first["date"], "2026-01-08");
        assert_eq!(first["duration"], "14:22");
        assert_eq!(first["thumbnail"], "img/logo.png");
        assert_eq!(first["transcript"], "");
        assert_eq!(
            first["spotifyUrl"],
            "https://podcasters.spotify.com/pod/show/example/episodes/ep1-0-3-e2abc"
        );
        assert_eq!(
            first["links"],
            json!([{ "title": RELATED_LINK_TITLE, "url": "https://example.org/open-data" }])
        );
        assert!(first.get("id").is_none());

        assert!(episode_from_item(&items[1], &defaults(), today()).is_none());

        let guest = episode_from_item(&items[2], &defaults(), today()).expect("numbered item");
        assert_eq!(guest["spotifyUrl"], SHOW_URL);
        assert_eq!(guest["description"], "A quiet talk with a guest.");
        assert_eq!(guest["date"], "2026-02-01");
        assert_eq!(guest["tags"], json!(["ゲスト"]));
    }

    #[test]
    fn merge_prepends_new_episodes_and_renumbers() {
        let existing = vec![stored("1.0.1", SHOW_URL, json!([]))];
        let fresh = vec![
            json!({ "number": "1.0.2", "spotifyUrl": SHOW_URL, "links": [] }),
            json!({ "number": "1.0.2", "spotifyUrl": SHOW_URL, "links": [] }),
        ];

        let outcome = merge_episodes(existing, fresh, SHOW_URL);
        assert_eq!((outcome.added, outcome.updated, outcome.unchanged), (1, 0, 0));
        let numbers: Vec<&str> = outcome
            .episodes
            .iter()
            .map(|episode| text_field(episode, "number"))
            .collect();
        assert_eq!(numbers, vec!["1.0.2", "1.0.1"]);
        assert_eq!(outcome.episodes[0]["id"], 1);
        assert_eq!(outcome.episodes[1]["id"], 2);
        assert_eq!(outcome.episodes[1]["customField"], "kept");
    }

    #[test]
    fn merge_fills_episode_url_and_empty_links_only() {
        let episode_url = "https://podcasters.spotify.com/pod/show/example/episodes/ep1-0-1";
        let existing = vec![
            stored("1.0.1", SHOW_URL, json!([])),
            stored("1.0.0", "https://hand.edited/url", json!([{ "url": "https://kept" }])),
        ];
        let fresh = vec![
            json!({
                "number": "1.0.1",
                "spotifyUrl": episode_url,
                "links": [{ "title": RELATED_LINK_TITLE, "url": "https://new" }],
                "title": "retitled upstream",
            }),
            json!({
                "number": "1.0.0",
                "spotifyUrl": episode_url,
                "links": [{ "title": RELATED_LINK_TITLE, "url": "https://other" }],
            }),
        ];

        let outcome = merge_episodes(existing, fresh, SHOW_URL);
        assert_eq!((outcome.added, outcome.updated, outcome.unchanged), (0, 1, 1));
        let refreshed = &outcome.episodes[0];
        assert_eq!(refreshed["spotifyUrl"], episode_url);
        assert_eq!(refreshed["links"][0]["url"], "https://new");
        assert_eq!(refreshed["title"], "ep1.0.1");
        assert_eq!(refreshed["id"], 1);
        assert_eq!(outcome.episodes[1]["spotifyUrl"], "https://hand.edited/url");
        assert_eq!(outcome.episodes[1]["links"][0]["url"], "https://kept");
    }

    #[test]
    fn merge_without_changes_keeps_ids() {
        let existing = vec![stored("1.0.1", "https://open.spotify.com/episode/x", json!([]))];
        let fresh = vec![json!({ "number": "1.0.1", "spotifyUrl": SHOW_URL, "links": [] })];

        let outcome = merge_episodes(existing, fresh, SHOW_URL);
        assert!(!outcome.changed());
        assert_eq!(outcome.unchanged, 1);
        assert_eq!(outcome.episodes[0]["id"], 9);
    }

    fn config_with_show_url() -> SiteConfig {
        let mut config = SiteConfig::default();
        config.platforms.spotify = SHOW_URL.to_string();
        config
    }

    #[test]
    fn sync_writes_catalogue_with_backup() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("data").join("episodes.json");
        fs::create_dir_all(output.parent().expect("parent")).expect("create data dir");
        let original = catalogue_json(&[stored("1.0.1", SHOW_URL, json!([]))]).expect("json");
        fs::write(&output, &original).expect("write catalogue");

        let server = TestServer::spawn(vec![Behavior::Respond(200, FEED.to_string())]);
        let request = SyncRequest {
            feed: format!("{}/podcast/rss", server.base_url),
            limit: None,
            output: output.clone(),
            dry_run: false,
        };

        let report =
            sync_catalogue(&config_with_show_url(), &request, today()).expect("sync should run");
        assert_eq!(report.checked, 3);
        assert_eq!(report.outcome.added, 2);
        assert!(report.written);
        assert_eq!(server.requested_paths(), vec!["/podcast/rss"]);

        let backup = report.backup.expect("existing file is backed up");
        assert_eq!(backup, dir.path().join("data").join("episodes.json.backup"));
        assert_eq!(fs::read_to_string(&backup).expect("read backup"), original);

        let saved = load_catalogue_values(&output).expect("saved catalogue parses");
        let numbers: Vec<&str> = saved.iter().map(|episode| text_field(episode, "number")).collect();
        assert_eq!(numbers, vec!["1.0.3", "1.0.2", "1.0.1"]);
        let episodes = crate::app::episode::parse_catalog(
            &fs::read_to_string(&output).expect("read catalogue"),
        )
        .expect("catalogue still loads as episodes");
        assert_eq!(episodes[0].id, 1);
        assert_eq!(episodes[0].tags, vec!["データ", "地域"]);
    }

    #[test]
    fn dry_run_and_limit_leave_files_alone() {
        let dir = tempfile::tempdir().expect("tempdir");
        let feed = dir.path().join("rss.xml");
        fs::write(&feed, FEED).expect("write feed");
        let output = dir.path().join("episodes.json");

        let request = SyncRequest {
            feed: feed.display().to_string(),
            limit: Some(1),
            output: output.clone(),
            dry_run: true,
        };
        let report =
            sync_catalogue(&config_with_show_url(), &request, today()).expect("sync should run");

        assert_eq!(report.checked, 1);
        assert_eq!(report.outcome.added, 1);
        assert!(!report.written);
        assert!(report.backup.is_none());
        assert!(!output.exists());
    }

    #[test]
    fn feed_fetch_failure_is_reported() {
        let server = TestServer::spawn(vec![Behavior::Respond(500, "boom".to_string())]);
        let dir = tempfile::tempdir().expect("tempdir");
        let request = SyncRequest {
            feed: server.base_url.clone(),
            limit: None,
            output: dir.path().join("episodes.json"),
            dry_run: false,
        };

        let err = sync_catalogue(&config_with_show_url(), &request, today())
            .expect_err("server error should fail");
        assert!(format!("{err:#}").contains("HTTP status 500"));
    }
}
