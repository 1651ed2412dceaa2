use std::env;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{ConfigLoader, CONFIG_ENV, FEED_ENV};

pub mod commands;

use self::commands::{CalendarArgs, FacetsArgs, ListArgs, NamesArgs, UpcomingArgs};

const LOG_FILE: &str = "deadline-hub.log";

#[derive(Parser, Debug)]
#[command(
    name = "deadline-hub",
    version,
    about = "Browse conference and journal submission deadlines from the terminal"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over DEADLINE_HUB_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Load deadlines from this URL or JSON file (takes precedence over DEADLINE_HUB_FEED)
    #[arg(long, global = true)]
    pub feed: Option<String>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive browser (default)
    Tui,
    /// Print the filtered, sorted and grouped deadline list
    List(ListArgs),
    /// Table of upcoming deadlines, optionally bounded by days or a date
    Upcoming(UpcomingArgs),
    /// Value counts for the filter categories
    Facets(FacetsArgs),
    /// Unique venue full names, one per line
    Names(NamesArgs),
    /// Calendar export for a single deadline
    Calendar(CalendarArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var(CONFIG_ENV, path);
    }
    if let Some(feed) = &cli.feed {
        env::set_var(FEED_ENV, feed);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    let command = cli.command.unwrap_or(Commands::Tui);
    let log_target = match command {
        Commands::Tui => LogTarget::File(&paths.log_dir),
        _ => LogTarget::Stderr,
    };
    init_tracing(&cli.log_level, log_target)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let config = Arc::new(loader.load_or_init()?);

    match command {
        Commands::Tui => commands::run_tui(config, paths),
        Commands::List(args) => commands::list_deadlines(config, args),
        Commands::Upcoming(args) => commands::upcoming_deadlines(config, args),
        Commands::Facets(args) => commands::list_facets(config, args),
        Commands::Names(args) => commands::list_names(config, args),
        Commands::Calendar(args) => commands::handle_calendar_command(config, &paths, args),
    }
}

enum LogTarget<'a> {
    Stderr,
    /// The TUI owns the terminal, so its logs go to a file in this directory.
    File(&'a Path),
}

fn init_tracing(level: &str, target: LogTarget<'_>) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        match target {
            LogTarget::Stderr => fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init(),
            LogTarget::File(dir) => {
                let path = dir.join(LOG_FILE);
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .with_context(|| format!("opening log file {}", path.display()))?;
                fmt()
                    .with_env_filter(env_filter)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .init();
            }
        }
        Ok::<(), anyhow::Error>(())
    })
    .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::FilterCategory;
    use assert_matches::assert_matches;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_means_tui() {
        let cli = Cli::parse_from(["deadline-hub"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn list_flags_repeat_and_globals_follow_subcommands() {
        let cli = Cli::parse_from([
            "deadline-hub",
            "list",
            "--topic",
            "HCI",
            "--topic",
            "NLP",
            "--show-past",
            "--feed",
            "deadlines.json",
        ]);
        assert_eq!(cli.feed.as_deref(), Some("deadlines.json"));
        assert_matches!(cli.command, Some(Commands::List(args)) => {
            assert_eq!(args.topic, vec!["HCI".to_string(), "NLP".to_string()]);
            assert!(args.show_past);
            assert!(!args.json);
        });
    }

    #[test]
    fn facets_category_parses_kebab_case() {
        let cli = Cli::parse_from(["deadline-hub", "facets", "--category", "submission-type"]);
        assert_matches!(
            cli.command,
            Some(Commands::Facets(FacetsArgs {
                category: Some(FilterCategory::SubmissionType),
                limit: None,
            }))
        );
    }

    #[test]
    fn upcoming_days_and_date_conflict() {
        let result = Cli::try_parse_from([
            "deadline-hub",
            "upcoming",
            "--days",
            "7",
            "--date",
            "2026-12-01",
        ]);
        assert!(result.is_err());
    }
}
