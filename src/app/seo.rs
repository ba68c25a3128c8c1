use serde_json::{Value, json};

use crate::config::SiteConfig;

use super::episode::Episode;
use super::share::episode_url;

#[derive(Debug, Clone, PartialEq, Eq)]
enum MetaKey {
    Name(String),
    Property(String),
}

/// In-memory `<head>`: meta and link elements are set-or-update by key, and
/// there is at most one JSON-LD block.
#[derive(Debug, Clone, Default)]
pub(crate) struct HeadDocument {
    title: Option<String>,
    metas: Vec<(MetaKey, String)>,
    links: Vec<(String, String)>,
    structured_data: Option<Value>,
}

impl HeadDocument {
    pub(crate) fn set_title(&mut self, title: &str) {
        self.title = Some(title.to_string());
    }

    pub(crate) fn set_meta_tag(&mut self, name: &str, content: &str) {
        self.upsert_meta(MetaKey::Name(name.to_string()), content);
    }

    pub(crate) fn set_meta_property(&mut self, property: &str, content: &str) {
        self.upsert_meta(MetaKey::Property(property.to_string()), content);
    }

    pub(crate) fn set_link_tag(&mut self, rel: &str, href: &str) {
        match self.links.iter_mut().find(|(existing, _)| existing == rel) {
            Some((_, value)) => *value = href.to_string(),
            None => self.links.push((rel.to_string(), href.to_string())),
        }
    }

    /// Replaces any existing JSON-LD block.
    pub(crate) fn set_structured_data(&mut self, data: Value) {
        self.structured_data = Some(data);
    }

    pub(crate) fn structured_data_mut(&mut self) -> Option<&mut Value> {
        self.structured_data.as_mut()
    }

    #[cfg(test)]
    pub(crate) fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    #[cfg(test)]
    pub(crate) fn meta_tag(&self, name: &str) -> Option<&str> {
        self.metas.iter().find_map(|(key, content)| match key {
            MetaKey::Name(existing) if existing == name => Some(content.as_str()),
            _ => None,
        })
    }

    #[cfg(test)]
    pub(crate) fn meta_property(&self, property: &str) -> Option<&str> {
        self.metas.iter().find_map(|(key, content)| match key {
            MetaKey::Property(existing) if existing == property => Some(content.as_str()),
            _ => None,
        })
    }

    #[cfg(test)]
    pub(crate) fn link(&self, rel: &str) -> Option<&str> {
        self.links
            .iter()
            .find(|(existing, _)| existing == rel)
            .map(|(_, href)| href.as_str())
    }

    #[cfg(test)]
    pub(crate) fn structured_data(&self) -> Option<&Value> {
        self.structured_data.as_ref()
    }

    pub(crate) fn element_count(&self) -> usize {
        usize::from(self.title.is_some())
            + self.metas.len()
            + self.links.len()
            + usize::from(self.structured_data.is_some())
    }

    fn upsert_meta(&mut self, key: MetaKey, content: &str) {
        match self.metas.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, value)) => *value = content.to_string(),
            None => self.metas.push((key, content.to_string())),
        }
    }

    pub(crate) fn render(&self) -> String {
        let mut out = String::new();
        if let Some(title) = &self.title {
            out.push_str(&format!("<title>{}</title>\n", escape_html(title)));
        }
        for (key, content) in &self.metas {
            let (attr, name) = match key {
                MetaKey::Name(name) => ("name", name),
                MetaKey::Property(property) => ("property", property),
            };
            out.push_str(&format!(
                "<meta {attr}=\"{}\" content=\"{}\">\n",
                escape_html(name),
                escape_html(content)
            ));
        }
        for (rel, href) in &self.links {
            out.push_str(&format!(
                "<link rel=\"{}\" href=\"{}\">\n",
                escape_html(rel),
                escape_html(href)
            ));
        }
        if let Some(data) = &self.structured_data {
            let json = serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string());
            out.push_str("<script type=\"application/ld+json\">\n");
            out.push_str(&json.replace("</", "<\\/"));
            out.push_str("\n</script>\n");
        }
        out
    }
}

pub(crate) fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn key_visual_url(config: &SiteConfig) -> String {
    format!("{}/{}", config.site_url, config.key_visual)
}

fn episode_image_url(config: &SiteConfig, episode: &Episode) -> String {
    match episode.thumbnail.as_deref().map(str::trim) {
        Some(thumbnail) if !thumbnail.is_empty() => format!("{}/{thumbnail}", config.site_url),
        _ => key_visual_url(config),
    }
}

fn published_time(date: &str) -> Option<String> {
    let date = date.trim();
    (!date.is_empty()).then(|| format!("{date}T00:00:00+09:00"))
}

/// Top page. An existing JSON-LD block keeps its content but gets the
/// canonical url and image; otherwise a series block is created.
pub(crate) fn apply_top_page(head: &mut HeadDocument, config: &SiteConfig) {
    let site_root = format!("{}/", config.site_url);
    let image = key_visual_url(config);
    head.set_link_tag("canonical", &format!("{}/index.html", config.site_url));
    head.set_meta_property("og:url", &site_root);
    head.set_meta_property("og:image", &image);
    head.set_meta_tag("twitter:image", &image);

    match head.structured_data_mut() {
        Some(Value::Object(data)) => {
            data.insert("url".to_string(), Value::String(site_root));
            data.insert("image".to_string(), Value::String(image));
        }
        Some(_) => log::error!("existing structured data is not an object; left unchanged"),
        None => head.set_structured_data(json!({
            "@context": "https://schema.org",
            "@type": "PodcastSeries",
            "name": config.podcast.name,
            "alternateName": config.podcast.name_en,
            "description": config.podcast.description,
            "url": site_root,
            "image": image,
            "webFeed": config.platforms.rss_feed,
        })),
    }
}

pub(crate) fn apply_episodes_page(head: &mut HeadDocument, config: &SiteConfig) {
    let url = format!("{}/episodes.html", config.site_url);
    head.set_link_tag("canonical", &url);
    head.set_meta_property("og:url", &url);
    head.set_meta_property("og:image", &key_visual_url(config));
}

/// Detail page before an episode has been resolved.
pub(crate) fn apply_detail_placeholder(head: &mut HeadDocument, config: &SiteConfig) {
    let url = format!("{}/episode-detail.html", config.site_url);
    let image = key_visual_url(config);
    head.set_link_tag("canonical", &url);
    head.set_meta_property("og:url", &url);
    head.set_meta_property("og:image", &image);
    head.set_meta_tag("twitter:image", &image);
}

pub(crate) fn apply_episode_detail(head: &mut HeadDocument, config: &SiteConfig, episode: &Episode) {
    let title = format!("{} - {}", episode.title, config.podcast.name);
    let description = match episode.headline() {
        "" => config.podcast.detail_fallback_description.clone(),
        headline => headline.to_string(),
    };
    let image = episode_image_url(config, episode);
    let url = episode_url(config, episode);
    let keywords = episode
        .tags
        .iter()
        .chain(config.keywords.iter())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(",");

    head.set_title(&title);
    head.set_meta_tag("description", &description);
    head.set_meta_tag("keywords", &keywords);

    head.set_meta_property("og:title", &title);
    head.set_meta_property("og:description", &description);
    head.set_meta_property("og:url", &url);
    head.set_meta_property("og:image", &image);
    if let Some(published) = published_time(&episode.date) {
        head.set_meta_property("article:published_time", &published);
    }

    head.set_meta_tag("twitter:title", &title);
    head.set_meta_tag("twitter:description", &description);
    head.set_meta_tag("twitter:image", &image);

    head.set_link_tag("canonical", &url);
    head.set_structured_data(episode_structured_data(config, episode));
}

pub(crate) fn episode_structured_data(config: &SiteConfig, episode: &Episode) -> Value {
    let duration = episode.duration.trim();
    let mut data = json!({
        "@context": "https://schema.org",
        "@type": "PodcastEpisode",
        "name": episode.title,
        "description": episode.headline(),
        "episodeNumber": episode.number,
        "datePublished": published_time(&episode.date),
        "duration": (!duration.is_empty()).then_some(duration),
        "image": episode_image_url(config, episode),
        "url": episode_url(config, episode),
        "partOfSeries": {
            "@type": "PodcastSeries",
            "name": config.podcast.name,
            "url": format!("{}/", config.site_url),
        },
    });
    if !episode.spotify_url.trim().is_empty()
        && let Value::Object(map) = &mut data
    {
        map.insert(
            "associatedMedia".to_string(),
            json!({
                "@type": "MediaObject",
                "contentUrl": episode.spotify_url,
            }),
        );
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SiteConfig {
        let mut config = SiteConfig {
            site_url: "https://cast.example.test".to_string(),
            ..Default::default()
        };
        config.podcast.name = "Example Cast".to_string();
        config.keywords = vec!["civictech".to_string(), "podcast".to_string()];
        config
    }

    fn episode() -> Episode {
        Episode {
            id: 7,
            number: "1.0.7".to_string(),
            title: "Maps & \"Data\"".to_string(),
            description: "Mapping the city".to_string(),
            date: "2025-02-01".to_string(),
            duration: "21:03".to_string(),
            tags: vec!["maps".to_string(), "opendata".to_string()],
            spotify_url: "https://open.spotify.com/episode/xyz".to_string(),
            thumbnail: Some("img/ep7.png".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn detail_page_sets_full_metadata() {
        let config = config();
        let mut head = HeadDocument::default();
        apply_episode_detail(&mut head, &config, &episode());

        assert_eq!(head.title(), Some("Maps & \"Data\" - Example Cast"));
        assert_eq!(head.meta_tag("description"), Some("Mapping the city"));
        assert_eq!(
            head.meta_tag("keywords"),
            Some("maps,opendata,civictech,podcast")
        );
        assert_eq!(
            head.meta_property("og:url"),
            Some("https://cast.example.test/episode-detail.html?id=7")
        );
        assert_eq!(
            head.meta_property("og:image"),
            Some("https://cast.example.test/img/ep7.png")
        );
        assert_eq!(
            head.meta_property("article:published_time"),
            Some("2025-02-01T00:00:00+09:00")
        );
        assert_eq!(
            head.link("canonical"),
            Some("https://cast.example.test/episode-detail.html?id=7")
        );

        let data = head.structured_data().expect("structured data");
        assert_eq!(data["@type"], "PodcastEpisode");
        assert_eq!(data["episodeNumber"], "1.0.7");
        assert_eq!(data["duration"], "21:03");
        assert_eq!(data["partOfSeries"]["url"], "https://cast.example.test/");
        assert_eq!(
            data["associatedMedia"]["contentUrl"],
            "https://open.spotify.com/episode/xyz"
        );
    }

    #[test]
    fn detail_description_falls_back() {
        let config = config();
        let mut episode = episode();
        episode.description.clear();
        episode.thumbnail = None;
        episode.spotify_url.clear();
        episode.date.clear();

        let mut head = HeadDocument::default();
        apply_episode_detail(&mut head, &config, &episode);

        assert_eq!(
            head.meta_tag("description"),
            Some(config.podcast.detail_fallback_description.as_str())
        );
        assert_eq!(
            head.meta_tag("twitter:image"),
            Some("https://cast.example.test/img/keyvisual.png")
        );
        assert_eq!(head.meta_property("article:published_time"), None);
        let data = head.structured_data().expect("structured data");
        assert!(data["datePublished"].is_null());
        assert!(data.get("associatedMedia").is_none());
    }

    #[test]
    fn repeated_application_updates_in_place() {
        let config = config();
        let mut head = HeadDocument::default();
        apply_detail_placeholder(&mut head, &config);
        apply_episode_detail(&mut head, &config, &episode());
        let count = head.element_count();

        let mut other = episode();
        other.id = 8;
        other.title = "Another".to_string();
        apply_episode_detail(&mut head, &config, &other);

        assert_eq!(head.element_count(), count);
        assert_eq!(
            head.link("canonical"),
            Some("https://cast.example.test/episode-detail.html?id=8")
        );
        assert_eq!(head.render().matches("application/ld+json").count(), 1);
    }

    #[test]
    fn top_page_updates_existing_structured_data() {
        let config = config();
        let mut head = HeadDocument::default();
        head.set_structured_data(json!({"@type": "PodcastSeries", "name": "Kept"}));

        apply_top_page(&mut head, &config);

        let data = head.structured_data().expect("structured data");
        assert_eq!(data["name"], "Kept");
        assert_eq!(data["url"], "https://cast.example.test/");
        assert_eq!(data["image"], "https://cast.example.test/img/keyvisual.png");
        assert_eq!(
            head.link("canonical"),
            Some("https://cast.example.test/index.html")
        );
    }

    #[test]
    fn episodes_page_points_at_listing() {
        let mut head = HeadDocument::default();
        apply_episodes_page(&mut head, &config());
        assert_eq!(
            head.meta_property("og:url"),
            Some("https://cast.example.test/episodes.html")
        );
        assert!(head.structured_data().is_none());
    }

    #[test]
    fn render_escapes_attributes_and_script_close() {
        let mut head = HeadDocument::default();
        head.set_meta_tag("description", "a \"quoted\" <b>& more</b>");
        head.set_structured_data(json!({"name": "</script><x>"}));

        let html = head.render();
        assert!(html.contains(
            "<meta name=\"description\" content=\"a &quot;quoted&quot; &lt;b&gt;&amp; more&lt;/b&gt;\">"
        ));
        assert!(!html.contains("</script><x>"));
        assert!(html.contains("<\\/script><x>"));
    }
}
