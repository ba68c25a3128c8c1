use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::paths::config_file_path;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub site_url: String,
    /// Directory or http(s) base URL that the data paths are relative to.
    pub data_root: String,
    pub podcast: PodcastInfo,
    pub platforms: Platforms,
    pub paths: DataPaths,
    pub default_image: String,
    pub key_visual: String,
    pub keywords: Vec<String>,
    pub pagination: Pagination,
    pub scroll_restore: ScrollRestoreConfig,
    pub spotify_embed: SpotifyEmbed,
    pub http: HttpConfig,
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PodcastInfo {
    pub name: String,
    pub name_en: String,
    pub short_name: String,
    pub description: String,
    pub detail_fallback_description: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Platforms {
    pub spotify: String,
    pub apple_podcasts: String,
    pub youtube: String,
    pub rss_feed: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataPaths {
    pub episodes: String,
    pub transcripts: String,
    /// Find/replace dictionary used by `fix-transcripts`.
    pub corrections: String,
    pub transcripts_backup: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Pagination {
    pub items_per_page: usize,
    pub latest_items_on_top: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScrollRestoreConfig {
    pub max_attempts: u32,
    /// Rows of drift tolerated before an attempt re-applies the offset.
    pub tolerance: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpotifyEmbed {
    pub creator_slug: String,
    pub episode_suffix: String,
    pub show_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            site_url: "https://tetsuji1122.github.io/civictech-idobata-cast".into(),
            data_root: ".".into(),
            podcast: PodcastInfo::default(),
            platforms: Platforms::default(),
            paths: DataPaths::default(),
            default_image: "img/logo.png".into(),
            key_visual: "img/keyvisual.png".into(),
            keywords: vec!["シビックテック".into(), "ポッドキャスト".into()],
            pagination: Pagination::default(),
            scroll_restore: ScrollRestoreConfig::default(),
            spotify_embed: SpotifyEmbed::default(),
            http: HttpConfig::default(),
            log_level: "info".into(),
        }
    }
}

impl Default for PodcastInfo {
    fn default() -> Self {
        Self {
            name: "シビックテック井戸端キャスト".into(),
            name_en: "Civictech Idobata Cast".into(),
            short_name: "Cキャス".into(),
            description: "ポッドキャスト文化からシビックテックの入り口を広げたい".into(),
            detail_fallback_description:
                "シビックテック井戸端キャストのエピソード詳細ページ。全文書き起こしを読むことができます。"
                    .into(),
        }
    }
}

impl Default for Platforms {
    fn default() -> Self {
        Self {
            spotify: "https://open.spotify.com/show/31JfR2D72gENOfOwq3AcKw".into(),
            apple_podcasts: "https://podcasts.apple.com/jp/podcast/id1587297171".into(),
            youtube: "https://www.youtube.com/@civictechcast".into(),
            rss_feed: "https://anchor.fm/s/6981b208/podcast/rss".into(),
        }
    }
}

impl Default for DataPaths {
    fn default() -> Self {
        Self {
            episodes: "data/episodes.json".into(),
            transcripts: "data/transcripts/".into(),
            corrections: "data/corrections.json".into(),
            transcripts_backup: "data/transcripts_backup/".into(),
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            items_per_page: 20,
            latest_items_on_top: 3,
        }
    }
}

impl Default for ScrollRestoreConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            tolerance: 3,
        }
    }
}

impl Default for SpotifyEmbed {
    fn default() -> Self {
        Self {
            creator_slug: "civictechcast".into(),
            episode_suffix: "a-acak43f".into(),
            show_id: "31JfR2D72gENOfOwq3AcKw".into(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5_000,
            read_timeout_ms: 10_000,
        }
    }
}

/// Loads the config file (explicit path, or the default location when it
/// exists), then applies environment overrides.
pub fn load_config(explicit: Option<&Path>) -> Result<SiteConfig> {
    let mut config = match explicit {
        Some(path) => read_config_file(path)?,
        None => {
            let path = config_file_path()?;
            if path.exists() {
                read_config_file(&path)?
            } else {
                SiteConfig::default()
            }
        }
    };

    if let Ok(v) = std::env::var("IDOBATA_DATA") {
        config.data_root = v;
    }
    if let Ok(v) = std::env::var("IDOBATA_SITE_URL") {
        config.site_url = v;
    }

    config.site_url = config.site_url.trim_end_matches('/').to_string();
    config.pagination.items_per_page = config.pagination.items_per_page.max(1);
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<SiteConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    parse_config(&raw).with_context(|| format!("invalid config file {}", path.display()))
}

pub fn parse_config(raw: &str) -> Result<SiteConfig> {
    Ok(toml::from_str::<SiteConfig>(raw)?)
}
