//! dwdy CLI
//!
//! Command-line interface for dwdy - diaries, entries, and their content.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use dwdy_core::{Config, Feature, GeoPoint, Journal, LayoutKind};

mod commands;
mod editor;
mod output;

use commands::entry::Placement;
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "dwdy")]
#[command(about = "dwdy - Local-first diaries")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage diaries
    Diary {
        #[command(subcommand)]
        command: DiaryCommands,
    },
    /// Manage entries
    Entry {
        #[command(subcommand)]
        command: EntryCommands,
    },
    /// Add text to an entry
    Text {
        #[command(subcommand)]
        command: TextCommands,
    },
    /// Add or remove tags
    Tag {
        #[command(subcommand)]
        command: LabelCommands,
    },
    /// Add or remove stickers
    Sticker {
        #[command(subcommand)]
        command: LabelCommands,
    },
    /// Search a diary for a keyword
    Search {
        /// Diary ID (or prefix) or title
        diary: String,
        /// Keyword to look for
        keyword: String,
    },
    /// Check the entry links of a diary
    Check {
        /// Diary ID (or prefix) or title
        diary: String,
    },
    /// Recompute diary stats from stored content
    Reconcile {
        /// Diary ID (or prefix) or title
        diary: String,
    },
    /// Show configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum DiaryCommands {
    /// Create a new diary
    Create {
        /// Diary title
        title: String,
        /// Layout (calendar, timeline, notebook, map)
        #[arg(long)]
        layout: Option<LayoutKind>,
    },
    /// List all diaries
    List,
    /// Show diary details and stats
    Show {
        /// Diary ID (or prefix) or title
        diary: String,
    },
    /// Delete a diary
    Delete {
        /// Diary ID (or prefix) or title
        diary: String,
    },
}

#[derive(Subcommand)]
enum EntryCommands {
    /// Create an entry
    Add {
        /// Diary ID (or prefix) or title
        diary: String,
        #[command(flatten)]
        placement: PlacementArgs,
    },
    /// List entries in order
    List {
        /// Diary ID (or prefix) or title
        diary: String,
        /// Newest (last) first
        #[arg(long)]
        desc: bool,
    },
    /// Show an entry and its content
    Show {
        /// Diary ID (or prefix) or title
        diary: String,
        /// Entry key (YYYY-MM-DD accepted for day entries)
        key: String,
    },
    /// Set or clear an entry title
    Title {
        /// Diary ID (or prefix) or title
        diary: String,
        /// Entry key
        key: String,
        /// New title (omit to clear)
        title: Option<String>,
    },
    /// Move an entry
    Move {
        /// Diary ID (or prefix) or title
        diary: String,
        /// Entry key to move
        key: String,
        /// Place it directly before this entry
        #[arg(long, conflicts_with = "last", required_unless_present = "last")]
        before: Option<String>,
        /// Place it at the end
        #[arg(long)]
        last: bool,
    },
    /// Delete an entry
    Delete {
        /// Diary ID (or prefix) or title
        diary: String,
        /// Entry key
        key: String,
    },
}

#[derive(Args)]
struct PlacementArgs {
    /// Day of the entry (calendar and timeline diaries, default today)
    #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_date)]
    date: Option<NaiveDate>,
    /// Insert after this entry (notebook diaries)
    #[arg(long, value_name = "KEY", conflicts_with = "key")]
    after: Option<String>,
    /// Location of the entry (map diaries)
    #[arg(long, value_name = "LON,LAT", value_parser = commands::entry::parse_point)]
    at: Option<GeoPoint>,
    /// Explicit key when appending (notebook diaries)
    #[arg(long, value_name = "KEY")]
    key: Option<String>,
}

impl From<PlacementArgs> for Placement {
    fn from(args: PlacementArgs) -> Self {
        Placement {
            date: args.date,
            after: args.after,
            at: args.at,
            key: args.key,
        }
    }
}

#[derive(Subcommand)]
enum TextCommands {
    /// Add a text block (opens $EDITOR without --body)
    Add {
        /// Diary ID (or prefix) or title
        diary: String,
        /// Entry key
        key: String,
        /// Text to add
        #[arg(long)]
        body: Option<String>,
    },
}

#[derive(Subcommand)]
enum LabelCommands {
    /// Add a value to an entry
    Add {
        /// Diary ID (or prefix) or title
        diary: String,
        /// Entry key
        key: String,
        /// Value to add
        value: String,
    },
    /// Remove a value from an entry
    Remove {
        /// Diary ID (or prefix) or title
        diary: String,
        /// Entry key
        key: String,
        /// Value to remove
        value: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    let config_path = cli.config.clone().unwrap_or_else(Config::config_file_path);
    let config = Config::load_from_path(&config_path).context("Failed to load configuration")?;
    init_logging(&config);
    debug!("Using data directory {:?}", config.data_dir);

    let mut journal = Journal::open(config.clone()).context("Failed to open journal")?;

    match cli.command {
        Commands::Diary { command } => handle_diary_command(command, &mut journal, &output),
        Commands::Entry { command } => handle_entry_command(command, &mut journal, &output),
        Commands::Text {
            command: TextCommands::Add { diary, key, body },
        } => commands::content::add_text(&mut journal, diary, key, body, &output),
        Commands::Tag { command } => handle_label_command(Feature::Tag, command, &mut journal, &output),
        Commands::Sticker { command } => {
            handle_label_command(Feature::Sticker, command, &mut journal, &output)
        }
        Commands::Search { diary, keyword } => {
            commands::content::search(&mut journal, diary, keyword, &output)
        }
        Commands::Check { diary } => commands::maintenance::check(&journal, diary, &output),
        Commands::Reconcile { diary } => {
            commands::maintenance::reconcile(&mut journal, diary, &output)
        }
        Commands::Config { command } => match command {
            Some(ConfigCommands::Show) | None => {
                commands::config::show(&config, &config_path, &journal, &output)
            }
        },
    }
}

fn handle_diary_command(command: DiaryCommands, journal: &mut Journal, output: &Output) -> Result<()> {
    match command {
        DiaryCommands::Create { title, layout } => commands::diary::create(journal, title, layout, output),
        DiaryCommands::List => commands::diary::list(journal, output),
        DiaryCommands::Show { diary } => commands::diary::show(journal, diary, output),
        DiaryCommands::Delete { diary } => commands::diary::delete(journal, diary, output),
    }
}

fn handle_entry_command(command: EntryCommands, journal: &mut Journal, output: &Output) -> Result<()> {
    match command {
        EntryCommands::Add { diary, placement } => {
            commands::entry::add(journal, diary, placement.into(), output)
        }
        EntryCommands::List { diary, desc } => commands::entry::list(journal, diary, desc, output),
        EntryCommands::Show { diary, key } => commands::entry::show(journal, diary, key, output),
        EntryCommands::Title { diary, key, title } => {
            commands::entry::title(journal, diary, key, title, output)
        }
        // `--last` is the only alternative clap lets through when `before` is absent
        EntryCommands::Move { diary, key, before, last: _ } => {
            commands::entry::move_entry(journal, diary, key, before, output)
        }
        EntryCommands::Delete { diary, key } => commands::entry::delete(journal, diary, key, output),
    }
}

fn handle_label_command(
    feature: Feature,
    command: LabelCommands,
    journal: &mut Journal,
    output: &Output,
) -> Result<()> {
    match command {
        LabelCommands::Add { diary, key, value } => {
            commands::content::add_label(journal, feature, diary, key, value, output)
        }
        LabelCommands::Remove { diary, key, value } => {
            commands::content::remove_label(journal, feature, diary, key, value, output)
        }
    }
}

fn parse_date(input: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d").map_err(|e| format!("invalid date '{}': {}", input, e))
}

/// Log to stderr with the configured filter
///
/// `RUST_LOG` wins over `log_filter` when set.
fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .with_writer(std::io::stderr)
        .try_init();
}
