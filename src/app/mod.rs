mod corrections;
mod detail;
mod episode;
mod export;
mod listing;
mod seo;
mod share;
mod source;
mod sync;
mod transcript;
mod tui;


use std::path::PathBuf;

use anyhow::{Result, bail};
use chrono::Local;

use crate::cli::{Cli, Command, PageArg, SortArg};
use crate::config::SiteConfig;
use crate::db::{Database, MemoryStore, SessionStore};
use crate::paths::database_file_path;

use self::corrections::{FixTarget, collect_corrections, fix_transcript_file, target_files};
use self::detail::find_adjacent;
use self::episode::{
    Episode, collect_tags, format_tags, latest_episodes, single_line, truncate,
};
use self::export::{default_export_file_name, write_csv_export};
use self::listing::{EpisodeList, RestorePolicy, SortOrder, forget_list_state};
use self::seo::{
    HeadDocument, apply_detail_placeholder, apply_episode_detail, apply_episodes_page,
    apply_top_page,
};
use self::share::{share_links, spotify_embed_url};
use self::source::{DataRoot, EpisodeSource, load_episodes_or_log, load_transcript_or_log};
use self::sync::{SyncRequest, catalogue_json, sync_catalogue};
use self::transcript::{markdown_to_html, markdown_to_lines, transcript_to_html};

impl From<SortArg> for SortOrder {
    fn from(value: SortArg) -> Self {
        match value {
            SortArg::Newest => Self::Newest,
            SortArg::Oldest => Self::Oldest,
        }
    }
}

struct FixArgs {
    target: FixTarget,
    wrong: Vec<String>,
    correct: Vec<String>,
    use_dict: bool,
    dry_run: bool,
    yes: bool,
}

struct ListArgs {
    query: Option<String>,
    tag: Option<String>,
    sort: Option<SortArg>,
    all_tags: bool,
    clear: bool,
    more: usize,
}

pub fn run(cli: Cli, mut config: SiteConfig) -> Result<()> {
    if let Some(data) = cli.data.as_deref() {
        config.data_root = data.to_string();
    }
    let source = EpisodeSource::from_config(&config);

    match cli.command {
        Some(Command::List {
            query,
            tag,
            sort,
            all_tags,
            clear,
            more,
        }) => {
            let store = open_store(&cli.session, cli.ephemeral)?;
            let args = ListArgs {
                query,
                tag,
                sort,
                all_tags,
                clear,
                more,
            };
            run_list(&config, &source, store, args)?
        }
        Some(Command::Latest) => run_latest(&config, &source),
        Some(Command::Tags) => run_tags(&source),
        Some(Command::Show { id, html, fresh }) => {
            let store = open_store(&cli.session, cli.ephemeral)?;
            run_show(&config, &source, store, id, html, fresh)
        }
        Some(Command::Export { output }) => run_export(&source, output)?,
        Some(Command::Meta { page, id }) => run_meta(&config, &source, page, id)?,
        Some(Command::Share { id }) => run_share(&config, &source, id),
        Some(Command::Reset) => run_reset(&cli.session, cli.ephemeral)?,
        Some(Command::Sync {
            feed,
            limit,
            all,
            output,
            dry_run,
        }) => {
            let output = match output {
                Some(output) => output,
                None => local_data_dir(&config)?.join(&config.paths.episodes),
            };
            let request = SyncRequest {
                feed: feed.unwrap_or_else(|| config.platforms.rss_feed.clone()),
                limit: (!all && limit > 0).then_some(limit),
                output,
                dry_run,
            };
            run_sync(&config, &request)?
        }
        Some(Command::FixTranscripts {
            episode,
            file,
            all,
            wrong,
            correct,
            use_dict,
            dry_run,
            yes,
        }) => {
            let target = match (episode, file) {
                (Some(number), _) => FixTarget::Episode(number),
                (None, Some(name)) => FixTarget::File(name),
                (None, None) if all => FixTarget::All,
                (None, None) => bail!("pass --episode, --file or --all"),
            };
            let args = FixArgs {
                target,
                wrong,
                correct,
                use_dict,
                dry_run,
                yes,
            };
            run_fix_transcripts(&config, args)?
        }
        Some(Command::Tui) | None => {
            let store = open_store(&cli.session, cli.ephemeral)?;
            tui::run_tui(&config, &source, store)?
        }
    }

    Ok(())
}

fn open_store(session: &str, ephemeral: bool) -> Result<Box<dyn SessionStore>> {
    if ephemeral {
        return Ok(Box::new(MemoryStore::default()));
    }
    let db_path = database_file_path()?;
    let db = Database::open(&db_path, session)?;
    db.migrate()?;
    Ok(Box::new(db))
}

pub(crate) fn restore_policy(config: &SiteConfig) -> RestorePolicy {
    RestorePolicy {
        max_attempts: config.scroll_restore.max_attempts,
        tolerance: config.scroll_restore.tolerance,
    }
}

/// The data root as a local directory; commands that write need one.
fn local_data_dir(config: &SiteConfig) -> Result<PathBuf> {
    match DataRoot::parse(&config.data_root) {
        DataRoot::Dir(dir) => Ok(dir),
        DataRoot::Remote(base) => {
            bail!("{base} is remote; pass a local --data directory to change site data")
        }
    }
}

fn load_or_report(source: &EpisodeSource) -> Option<Vec<Episode>> {
    let episodes = load_episodes_or_log(source);
    if episodes.is_none() {
        println!(
            "Episode data could not be loaded from {}. See the log for details.",
            source.describe()
        );
    }
    episodes
}

fn run_list(
    config: &SiteConfig,
    source: &EpisodeSource,
    store: Box<dyn SessionStore>,
    args: ListArgs,
) -> Result<()> {
    let mut list = EpisodeList::new(
        store,
        config.pagination.items_per_page,
        restore_policy(config),
    );
    match load_or_report(source) {
        Some(episodes) => list.load(episodes),
        None => {
            list.fail_load();
            return Ok(());
        }
    }

    if args.clear {
        list.clear_filters();
    }
    if let Some(query) = args.query {
        list.set_query(&query);
    }
    if args.all_tags {
        list.set_tag(None);
    } else if let Some(tag) = args.tag {
        if !list.tags().contains(&tag) {
            println!("No episode is tagged `{tag}`.");
        }
        list.set_tag(Some(tag));
    }
    if let Some(sort) = args.sort {
        list.set_sort(sort.into());
    }
    for _ in 0..args.more {
        if list.load_more() == 0 {
            break;
        }
    }
    list.save_state();

    let filter = list.filter();
    if filter.is_default() {
        println!("All episodes, newest first.");
    } else {
        println!(
            "query: {}  tag: {}  sort: {}",
            if filter.query.is_empty() { "-" } else { filter.query.as_str() },
            filter.tag.as_deref().unwrap_or("-"),
            filter.sort.label()
        );
    }
    if list.filtered_len() == 0 {
        println!("No episodes match.");
        return Ok(());
    }

    println!("{:<10} {:<12} {:<50} TAGS", "EP", "DATE", "TITLE");
    for episode in list.displayed() {
        println!(
            "{:<10} {:<12} {:<50} {}",
            truncate(&episode.number, 10),
            episode.date,
            truncate(&episode.title, 50),
            truncate(&format_tags(&episode.tags), 40)
        );
    }
    println!(
        "\nShowing {} of {} matching episodes ({} total).",
        list.window_len(),
        list.filtered_len(),
        list.episodes().len()
    );
    if list.has_more() {
        println!("Run `idobata list --more 1` to load the next page.");
    }
    Ok(())
}

fn run_latest(config: &SiteConfig, source: &EpisodeSource) {
    let Some(episodes) = load_or_report(source) else {
        return;
    };
    let latest = latest_episodes(&episodes, config.pagination.latest_items_on_top);
    if latest.is_empty() {
        println!("No episodes published yet.");
        return;
    }
    println!("Latest from {}:", config.podcast.name);
    for episode in latest {
        println!("\n  [{}] {}", episode.id, episode.title);
        println!("  {}  {}", episode.date, episode.duration);
        println!("  {}", truncate(&single_line(episode.headline()), 100));
    }
    println!();
    for (label, url) in platform_links(config) {
        println!("{label:<16} {url}");
    }
}

fn platform_links(config: &SiteConfig) -> Vec<(&'static str, &str)> {
    let platforms = &config.platforms;
    [
        ("Spotify", platforms.spotify.as_str()),
        ("Apple Podcasts", platforms.apple_podcasts.as_str()),
        ("YouTube", platforms.youtube.as_str()),
        ("RSS", platforms.rss_feed.as_str()),
    ]
    .into_iter()
    .filter(|(_, url)| !url.trim().is_empty())
    .collect()
}

fn run_tags(source: &EpisodeSource) {
    let Some(episodes) = load_or_report(source) else {
        return;
    };
    let tags = collect_tags(&episodes);
    if tags.is_empty() {
        println!("No tags yet.");
        return;
    }
    for tag in tags {
        let count = episodes.iter().filter(|episode| episode.has_tag(&tag)).count();
        println!("{count:>4}  {tag}");
    }
}

fn run_show(
    config: &SiteConfig,
    source: &EpisodeSource,
    mut store: Box<dyn SessionStore>,
    id: i64,
    html: bool,
    fresh: bool,
) {
    let Some(mut episodes) = load_or_report(source) else {
        return;
    };
    if fresh {
        forget_list_state(store.as_mut());
    }
    let Some(pos) = episodes.iter().position(|episode| episode.id == id) else {
        println!("Episode {id} not found.");
        return;
    };
    if let Some(transcript) = load_transcript_or_log(source, &episodes[pos].number) {
        episodes[pos].apply_transcript(transcript);
    }

    let episode = &episodes[pos];
    let adjacent = find_adjacent(&episodes, id, store.as_ref());

    println!("{}", episode.title);
    println!(
        "ep{}  {}  {}",
        episode.number, episode.date, episode.duration
    );
    println!("Tags: {}", format_tags(&episode.tags));
    if !episode.headline().is_empty() {
        println!("\n{}", render_headline(episode, html));
    }
    if !episode.spotify_url.is_empty() {
        println!("\nListen: {}", episode.spotify_url);
    }
    println!("Player: {}", spotify_embed_url(config, &episode.spotify_url));

    let links = episode.valid_links();
    if !links.is_empty() {
        println!("\nLinks:");
        for link in links {
            let title = if link.title.trim().is_empty() {
                link.url.as_str()
            } else {
                link.title.as_str()
            };
            println!("  {title}: {}", link.url);
        }
    }

    let sections = [
        ("Summary", &episode.transcript.summary),
        ("Details", &episode.transcript.detailed_description),
    ];
    for (label, text) in sections {
        if text.trim().is_empty() {
            continue;
        }
        println!("\n{label}:");
        if html {
            println!("{}", markdown_to_html(text));
        } else {
            for line in markdown_to_lines(text) {
                println!("  {line}");
            }
        }
    }

    if episode.transcript.transcript.trim().is_empty() {
        println!("\nNo transcript available.");
    } else if html {
        println!("\nTranscript:\n{}", transcript_to_html(&episode.transcript.transcript));
    } else {
        println!("\nTranscript:");
        for line in markdown_to_lines(&episode.transcript.transcript) {
            println!("  {line}");
        }
    }

    println!();
    match adjacent.previous {
        Some(previous) => println!("Previous: [{}] {}", previous.id, previous.title),
        None => println!("Previous: -"),
    }
    match adjacent.next {
        Some(next) => println!("Next:     [{}] {}", next.id, next.title),
        None => println!("Next:     -"),
    }
}

fn render_headline(episode: &Episode, html: bool) -> String {
    if html {
        markdown_to_html(episode.headline())
    } else {
        episode.headline().to_string()
    }
}

fn run_export(source: &EpisodeSource, output: Option<PathBuf>) -> Result<()> {
    let Some(episodes) = load_or_report(source) else {
        return Ok(());
    };
    let today = Local::now().date_naive();
    let target = output.unwrap_or_else(|| PathBuf::from(default_export_file_name(today)));
    let path = write_csv_export(&episodes, &target, today)?;
    println!("Exported {} episodes to {}", episodes.len(), path.display());
    Ok(())
}

fn run_meta(
    config: &SiteConfig,
    source: &EpisodeSource,
    page: PageArg,
    id: Option<i64>,
) -> Result<()> {
    let head = build_head(config, source, page, id)?;
    log::debug!("rendered {} head elements", head.element_count());
    print!("{}", head.render());
    Ok(())
}

fn build_head(
    config: &SiteConfig,
    source: &EpisodeSource,
    page: PageArg,
    id: Option<i64>,
) -> Result<HeadDocument> {
    let mut head = HeadDocument::default();
    match (page, id) {
        (PageArg::Top, None) => apply_top_page(&mut head, config),
        (PageArg::Episodes, None) => apply_episodes_page(&mut head, config),
        (PageArg::Top | PageArg::Episodes, Some(_)) => {
            bail!("--id only applies to the detail page (`meta detail --id N`)")
        }
        (PageArg::Detail, id) => {
            apply_detail_placeholder(&mut head, config);
            if let Some(id) = id {
                apply_detail_for(&mut head, config, source, id);
            }
        }
    }
    Ok(head)
}

fn apply_detail_for(head: &mut HeadDocument, config: &SiteConfig, source: &EpisodeSource, id: i64) {
    let Some(mut episodes) = load_episodes_or_log(source) else {
        return;
    };
    let Some(episode) = episodes.iter_mut().find(|episode| episode.id == id) else {
        log::warn!("episode {id} not found; keeping placeholder metadata");
        return;
    };
    if let Some(transcript) = load_transcript_or_log(source, &episode.number) {
        episode.apply_transcript(transcript);
    }
    apply_episode_detail(head, config, episode);
}

fn run_share(config: &SiteConfig, source: &EpisodeSource, id: i64) {
    let Some(episodes) = load_or_report(source) else {
        return;
    };
    let Some(episode) = episodes.iter().find(|episode| episode.id == id) else {
        println!("Episode {id} not found.");
        return;
    };
    let links = share_links(config, episode);
    println!("{}", links.title);
    println!("{}\n", links.text);
    println!("URL:      {}", links.url);
    println!("X:        {}", links.twitter);
    println!("Facebook: {}", links.facebook);
    println!("LINE:     {}", links.line);
}

fn run_reset(session: &str, ephemeral: bool) -> Result<()> {
    if ephemeral {
        println!("Ephemeral sessions keep no state.");
        return Ok(());
    }
    let db_path = database_file_path()?;
    let db = Database::open(&db_path, session)?;
    db.migrate()?;
    let removed = db.clear_session()?;
    println!("Cleared {removed} saved entries for session `{}`.", db.session());
    Ok(())
}

fn run_sync(config: &SiteConfig, request: &SyncRequest) -> Result<()> {
    let today = Local::now().date_naive();
    let report = sync_catalogue(config, request, today)?;
    let outcome = &report.outcome;

    println!("Checked {} feed items from {}.", report.checked, request.feed);
    println!(
        "New: {}  Updated: {}  Unchanged: {}  Total: {}",
        outcome.added,
        outcome.updated,
        outcome.unchanged,
        outcome.episodes.len()
    );
    if !outcome.changed() {
        println!("Nothing to update.");
        return Ok(());
    }
    if request.dry_run {
        let preview: Vec<_> = outcome.episodes.iter().take(3).cloned().collect();
        println!("\nDry run; {} would become:", request.output.display());
        println!("{}", catalogue_json(&preview)?);
        if outcome.episodes.len() > preview.len() {
            println!("... and {} more", outcome.episodes.len() - preview.len());
        }
        return Ok(());
    }
    if let Some(backup) = &report.backup {
        println!("Backup: {}", backup.display());
    }
    if report.written {
        println!("Saved {}", request.output.display());
    }
    Ok(())
}

fn run_fix_transcripts(config: &SiteConfig, args: FixArgs) -> Result<()> {
    let data_dir = local_data_dir(config)?;
    let corrections = collect_corrections(
        &args.wrong,
        &args.correct,
        args.use_dict,
        &data_dir.join(&config.paths.corrections),
    )?;
    let files = target_files(&data_dir.join(&config.paths.transcripts), &args.target)?;
    if files.is_empty() {
        println!("No transcript files found.");
        return Ok(());
    }
    if args.target == FixTarget::All && !args.dry_run && !args.yes {
        println!(
            "This rewrites all {} transcript files. Re-run with --yes, or check first with --dry-run.",
            files.len()
        );
        return Ok(());
    }

    println!("Using {} correction rules.", corrections.len());
    let backup_dir = data_dir.join(&config.paths.transcripts_backup);
    let now = Local::now().naive_local();
    let mut modified = 0;
    for path in &files {
        let fix = fix_transcript_file(path, &corrections, &backup_dir, args.dry_run, now)?;
        let name = fix
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !fix.modified() {
            println!("{name}: no changes");
            continue;
        }
        modified += 1;
        let fields = fix
            .fields
            .iter()
            .map(|(field, count)| format!("{field} {count}"))
            .collect::<Vec<_>>()
            .join(", ");
        println!("{name}: {} corrections ({fields})", fix.total());
        if let Some(backup) = &fix.backup {
            println!("  backup: {}", backup.display());
        }
    }

    let verb = if args.dry_run { "would change" } else { "changed" };
    println!("{modified} of {} files {verb}.", files.len());
    Ok(())
}
