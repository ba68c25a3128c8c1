use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "idobata",
    version,
    about = "Browse, filter and export episodes of a static podcast showcase site"
)]
pub struct Cli {
    /// Site data root: a directory or an http(s) base URL
    #[arg(long, global = true)]
    pub data: Option<String>,

    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Named session whose list state is restored and saved
    #[arg(long, global = true, default_value = "default")]
    pub session: String,

    /// Keep session state in memory only
    #[arg(long, global = true)]
    pub ephemeral: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive list and detail views
    Tui,
    /// Print the filtered episode list, continuing from the saved session state
    List {
        #[arg(long, short)]
        query: Option<String>,
        #[arg(long, short)]
        tag: Option<String>,
        #[arg(long, value_enum)]
        sort: Option<SortArg>,
        /// Drop the tag filter
        #[arg(long, conflicts_with = "tag")]
        all_tags: bool,
        /// Reset query, tag and sort before applying other flags
        #[arg(long)]
        clear: bool,
        /// Extra pages to load beyond the current window
        #[arg(long, default_value_t = 0)]
        more: usize,
    },
    /// Newest episodes, as on the top page
    Latest,
    /// Every tag in the catalogue
    Tags,
    /// Episode detail with transcript and previous/next
    Show {
        id: i64,
        /// Print transcript, summary and subtitle as HTML
        #[arg(long)]
        html: bool,
        /// Ignore the saved list order (entering from the top page)
        #[arg(long)]
        fresh: bool,
    },
    /// Write every episode to a CSV file
    Export {
        /// File or directory; defaults to episodes_YYYYMMDD.csv here
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Print the generated <head> metadata for a page
    Meta {
        #[arg(value_enum, default_value_t = PageArg::Episodes)]
        page: PageArg,
        /// Episode id; only valid for the detail page
        #[arg(long)]
        id: Option<i64>,
    },
    /// Share links for an episode
    Share { id: i64 },
    /// Forget the saved list state of this session
    Reset,
    /// Add new episodes from the podcast RSS feed to episodes.json
    Sync {
        /// Feed URL or file (defaults to the configured RSS feed)
        #[arg(long)]
        feed: Option<String>,
        /// Newest feed items to check; 0 checks the whole feed
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Check the whole feed (same as --limit 0)
        #[arg(long)]
        all: bool,
        /// Catalogue to update (defaults to episodes.json under the data root)
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Show what would change without writing
        #[arg(long)]
        dry_run: bool,
    },
    /// Fix recurring typos in transcript documents
    FixTranscripts {
        /// Episode number, e.g. 1.0.18
        #[arg(
            long,
            required_unless_present_any = ["file", "all"],
            conflicts_with_all = ["file", "all"]
        )]
        episode: Option<String>,
        /// Transcript file name, e.g. ep1.0.18.json
        #[arg(long, conflicts_with = "all")]
        file: Option<String>,
        /// Every transcript document
        #[arg(long)]
        all: bool,
        /// Text to replace (repeatable, paired with --correct)
        #[arg(long, requires = "correct")]
        wrong: Vec<String>,
        /// Replacement text (repeatable, paired with --wrong)
        #[arg(long, requires = "wrong")]
        correct: Vec<String>,
        /// Also apply the corrections dictionary when --wrong is given
        #[arg(long)]
        use_dict: bool,
        /// Report matches without writing
        #[arg(long)]
        dry_run: bool,
        /// Confirm rewriting every file with --all
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortArg {
    Newest,
    Oldest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PageArg {
    Top,
    Episodes,
    Detail,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_defaults_to_twenty_items() {
        let cli = Cli::try_parse_from(["idobata", "sync", "--dry-run"]).expect("should parse");
        match cli.command {
            Some(Command::Sync {
                limit,
                all,
                dry_run,
                feed,
                output,
            }) => {
                assert_eq!(limit, 20);
                assert!(!all);
                assert!(dry_run);
                assert!(feed.is_none() && output.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn fix_transcripts_needs_a_target() {
        assert!(Cli::try_parse_from(["idobata", "fix-transcripts"]).is_err());
        assert!(
            Cli::try_parse_from(["idobata", "fix-transcripts", "--episode", "1.0.1", "--all"])
                .is_err()
        );
    }

    #[test]
    fn fix_transcripts_collects_repeated_pairs() {
        let cli = Cli::try_parse_from([
            "idobata",
            "fix-transcripts",
            "--file",
            "ep1.0.18.json",
            "--wrong",
            "井戸畑",
            "--correct",
            "井戸端",
            "--wrong",
            "シビテク",
            "--correct",
            "シビックテック",
        ])
        .expect("should parse");
        match cli.command {
            Some(Command::FixTranscripts {
                file,
                wrong,
                correct,
                ..
            }) => {
                assert_eq!(file.as_deref(), Some("ep1.0.18.json"));
                assert_eq!(wrong, vec!["井戸畑", "シビテク"]);
                assert_eq!(correct, vec!["井戸端", "シビックテック"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn wrong_without_correct_is_rejected() {
        let parsed =
            Cli::try_parse_from(["idobata", "fix-transcripts", "--all", "--wrong", "井戸畑"]);
        assert!(parsed.is_err());
    }
}
