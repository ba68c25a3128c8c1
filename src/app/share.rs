use std::sync::LazyLock;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use regex::Regex;

use crate::config::SiteConfig;

use super::episode::Episode;

/// Characters `encodeURIComponent` leaves alone.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

static PODCASTERS_EPISODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"episodes/([^/?]+)").expect("valid spotify regex"));
static OPEN_EPISODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"episode/([a-zA-Z0-9]+)").expect("valid spotify regex"));
static SHOW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"show/([a-zA-Z0-9]+)").expect("valid spotify regex"));

pub(crate) fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, URI_COMPONENT).to_string()
}

pub(crate) fn episode_url(config: &SiteConfig, episode: &Episode) -> String {
    format!("{}/episode-detail.html?id={}", config.site_url, episode.id)
}

pub(crate) fn share_title(config: &SiteConfig, episode: &Episode) -> String {
    format!("{} - {}", episode.title, config.podcast.name)
}

pub(crate) fn share_text(episode: &Episode) -> String {
    format!("{}\n{}", episode.title, episode.headline())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ShareLinks {
    pub(crate) url: String,
    pub(crate) title: String,
    pub(crate) text: String,
    pub(crate) twitter: String,
    pub(crate) facebook: String,
    pub(crate) line: String,
}

pub(crate) fn share_links(config: &SiteConfig, episode: &Episode) -> ShareLinks {
    let url = episode_url(config, episode);
    let title = share_title(config, episode);
    let encoded_url = encode_component(&url);
    let encoded_title = encode_component(&title);
    ShareLinks {
        twitter: format!(
            "https://twitter.com/intent/tweet?text={encoded_title}&url={encoded_url}"
        ),
        facebook: format!("https://www.facebook.com/sharer/sharer.php?u={encoded_url}"),
        line: format!(
            "https://social-plugins.line.me/lineit/share?url={encoded_url}&text={encoded_title}"
        ),
        text: share_text(episode),
        url,
        title,
    }
}

/// Player URL for an episode's Spotify link, falling back to the show.
pub(crate) fn spotify_embed_url(config: &SiteConfig, spotify_url: &str) -> String {
    let embed = &config.spotify_embed;
    let podcasters_prefix = format!(
        "podcasters.spotify.com/pod/show/{}/episodes/",
        embed.creator_slug
    );
    if spotify_url.contains(&podcasters_prefix)
        && let Some(caps) = PODCASTERS_EPISODE.captures(spotify_url)
    {
        return format!(
            "https://creators.spotify.com/pod/profile/{}/embed/episodes/{}/{}",
            embed.creator_slug, &caps[1], embed.episode_suffix
        );
    }

    if spotify_url.contains("open.spotify.com/episode/")
        && let Some(caps) = OPEN_EPISODE.captures(spotify_url)
    {
        return format!("https://open.spotify.com/embed/episode/{}", &caps[1]);
    }

    if spotify_url.contains("spotify.com/show/")
        && let Some(caps) = SHOW.captures(spotify_url)
    {
        return format!("https://open.spotify.com/embed/show/{}", &caps[1]);
    }

    format!("https://open.spotify.com/embed/show/{}", embed.show_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode() -> Episode {
        Episode {
            id: 42,
            number: "1.0.16".to_string(),
            title: "Ranking & Review".to_string(),
            description: "Year in review".to_string(),
            ..Default::default()
        }
    }

    fn config() -> SiteConfig {
        SiteConfig {
            site_url: "https://cast.example.test".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn encodes_like_encode_uri_component() {
        assert_eq!(encode_component("a b&c/d?e=f"), "a%20b%26c%2Fd%3Fe%3Df");
        assert_eq!(encode_component("keep-_.!~*'()"), "keep-_.!~*'()");
        assert_eq!(encode_component("井戸"), "%E4%BA%95%E6%88%B8");
    }

    #[test]
    fn builds_share_links() {
        let mut config = config();
        config.podcast.name = "Cast".to_string();
        let links = share_links(&config, &episode());
        assert_eq!(links.url, "https://cast.example.test/episode-detail.html?id=42");
        assert_eq!(links.title, "Ranking & Review - Cast");
        assert_eq!(links.text, "Ranking & Review\nYear in review");
        assert_eq!(
            links.twitter,
            "https://twitter.com/intent/tweet?text=Ranking%20%26%20Review%20-%20Cast&url=https%3A%2F%2Fcast.example.test%2Fepisode-detail.html%3Fid%3D42"
        );
        assert!(links.facebook.ends_with("?u=https%3A%2F%2Fcast.example.test%2Fepisode-detail.html%3Fid%3D42"));
        assert!(links.line.contains("&text=Ranking%20%26%20Review%20-%20Cast"));
    }

    #[test]
    fn share_text_prefers_subtitle() {
        let mut episode = episode();
        episode.transcript.sub_title = "Subtitle wins".to_string();
        assert_eq!(share_text(&episode), "Ranking & Review\nSubtitle wins");
    }

    #[test]
    fn maps_spotify_urls_to_embeds() {
        let config = config();
        assert_eq!(
            spotify_embed_url(
                &config,
                "https://podcasters.spotify.com/pod/show/civictechcast/episodes/ep1-0-3-Sora-2-e3b6vi4"
            ),
            "https://creators.spotify.com/pod/profile/civictechcast/embed/episodes/ep1-0-3-Sora-2-e3b6vi4/a-acak43f"
        );
        assert_eq!(
            spotify_embed_url(&config, "https://open.spotify.com/episode/4rOoJ6Egrf8K2IrywzwOMk?si=x"),
            "https://open.spotify.com/embed/episode/4rOoJ6Egrf8K2IrywzwOMk"
        );
        assert_eq!(
            spotify_embed_url(&config, "https://open.spotify.com/show/abc123"),
            "https://open.spotify.com/embed/show/abc123"
        );
        assert_eq!(
            spotify_embed_url(&config, "https://example.test/audio.mp3"),
            "https://open.spotify.com/embed/show/31JfR2D72gENOfOwq3AcKw"
        );
    }
}
