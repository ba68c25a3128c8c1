use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::SiteConfig;
use crate::http::{FetchError, get_text};

use super::episode::{Episode, Transcript, parse_catalog, parse_transcript};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DataRoot {
    Dir(PathBuf),
    Remote(String),
}

impl DataRoot {
    pub(crate) fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Self::Remote(trimmed.trim_end_matches('/').to_string())
        } else {
            Self::Dir(PathBuf::from(trimmed))
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Dir(path) => path.display().to_string(),
            Self::Remote(base) => base.clone(),
        }
    }
}

/// Where the static site data lives and how to fetch it.
#[derive(Debug, Clone)]
pub(crate) struct EpisodeSource {
    root: DataRoot,
    episodes_path: String,
    transcripts_dir: String,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl EpisodeSource {
    pub(crate) fn from_config(config: &SiteConfig) -> Self {
        Self {
            root: DataRoot::parse(&config.data_root),
            episodes_path: config.paths.episodes.clone(),
            transcripts_dir: config.paths.transcripts.clone(),
            connect_timeout: config.http.connect_timeout(),
            read_timeout: config.http.read_timeout(),
        }
    }

    pub(crate) fn describe(&self) -> String {
        self.root.describe()
    }

    pub(crate) fn transcript_path(&self, number: &str) -> String {
        let dir = self.transcripts_dir.trim_end_matches('/');
        if dir.is_empty() {
            format!("ep{number}.json")
        } else {
            format!("{dir}/ep{number}.json")
        }
    }

    pub(crate) fn load_episodes(&self) -> Result<Vec<Episode>> {
        let raw = self
            .read(&self.episodes_path)
            .with_context(|| format!("failed to load episodes from {}", self.describe()))?;
        parse_catalog(&raw)
    }

    /// Loads the transcript document for an episode. A missing document is
    /// normal and yields `Ok(None)`.
    pub(crate) fn load_transcript(&self, number: &str) -> Result<Option<Transcript>> {
        let path = self.transcript_path(number);
        match self.read(&path) {
            Ok(raw) => parse_transcript(&raw)
                .with_context(|| format!("invalid transcript for ep{number}"))
                .map(Some),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed to load transcript ep{number}")),
        }
    }

    fn read(&self, relative: &str) -> Result<String, FetchError> {
        let relative = relative.trim_start_matches('/');
        match &self.root {
            DataRoot::Dir(dir) => {
                let path = dir.join(relative);
                std::fs::read_to_string(&path).map_err(|err| match err.kind() {
                    ErrorKind::NotFound => FetchError::NotFound(path.display().to_string()),
                    _ => FetchError::Read {
                        target: path.display().to_string(),
                        message: err.to_string(),
                    },
                })
            }
            DataRoot::Remote(base) => get_text(
                &format!("{base}/{relative}"),
                self.connect_timeout,
                self.read_timeout,
            ),
        }
    }
}

/// Loads the catalogue, logging and swallowing failures.
pub(crate) fn load_episodes_or_log(source: &EpisodeSource) -> Option<Vec<Episode>> {
    match source.load_episodes() {
        Ok(episodes) => {
            log::info!(
                "loaded {} episodes from {}",
                episodes.len(),
                source.describe()
            );
            Some(episodes)
        }
        Err(err) => {
            log::error!("episode data could not be loaded: {err:#}");
            None
        }
    }
}

/// Loads a transcript, logging anything other than a missing document.
pub(crate) fn load_transcript_or_log(source: &EpisodeSource, number: &str) -> Option<Transcript> {
    match source.load_transcript(number) {
        Ok(Some(transcript)) if transcript.is_empty() => {
            log::debug!("transcript ep{number} has no content");
            None
        }
        Ok(Some(transcript)) => {
            log::info!("loaded transcript ep{number}");
            Some(transcript)
        }
        Ok(None) => None,
        Err(err) => {
            log::warn!("transcript unavailable: {err:#}");
            None
        }
    }
}
