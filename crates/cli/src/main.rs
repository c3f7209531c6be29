// scoresync - patch LMS grade books with live exam scores

mod exit_codes;
mod preview;
mod prompt;
mod roster;
mod update;
mod util;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use scoresync_config::credentials;
use scoresync_config::{ConfigError, Settings};
use scoresync_io::LoadError;
use scoresync_recon::{Cell, ReconError, Table};

use exit_codes::{
    EXIT_CONFIG, EXIT_ERROR, EXIT_IO, EXIT_MISSING_COLUMN, EXIT_PARSE, EXIT_SUCCESS, EXIT_USAGE,
};
use roster::{RosterCache, RosterSource};
use update::UpdateArgs;

#[derive(Parser)]
#[command(name = "scoresync")]
#[command(about = "Update LMS grade book scores from a live score sheet")]
#[command(long_version = long_version())]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    /// More log output (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Settings file (default: <config dir>/scoresync/settings.toml)
    #[arg(long, global = true, env = "SCORESYNC_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge live scores into one grade book column
    #[command(after_help = "\
Examples:
  scoresync update Grades.csv Live.csv --target \"Final Exam (1234)\"
  scoresync update Grades.xlsx Live.xlsx --profile email --yes
  scoresync update Grades.csv Live.csv -t \"CA Total\" --roster roster.csv --dry-run --debug-rows
  scoresync update Grades.csv Live.csv -t Exam --json --yes > report.json

Output:
  <gradebook>_Live Score Updated.csv        full grade book
  <gradebook>_Live Score Updated_Only.csv   matched rows (overwrite-always profiles)")]
    Update(UpdateArgs),

    /// List grade book columns with their indexes
    #[command(after_help = "\
Examples:
  scoresync columns Grades.csv
  scoresync columns Live.csv --header-row 1 --json")]
    Columns {
        /// Grade book or live sheet (.csv, .tsv, .xlsx, .xls)
        file: PathBuf,

        /// Header row (0-based)
        #[arg(long, default_value_t = 0)]
        header_row: usize,

        /// Output JSON array of column names
        #[arg(long)]
        json: bool,
    },

    /// Inspect and manage the email -> student id roster
    Roster {
        #[command(subcommand)]
        command: RosterCommands,
    },

    /// List reconciliation profiles (built-in and from settings)
    Profiles {
        /// Output profiles as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum RosterCommands {
    /// Load the roster (through the cache) and print a sample
    #[command(after_help = "\
Examples:
  scoresync roster show
  scoresync roster show --roster https://docs.google.com/spreadsheets/d/<id>/export?format=csv
  scoresync roster show --refresh --sample 20")]
    Show {
        /// Roster URL or file (defaults to [roster] in settings.toml)
        #[arg(long, env = "SCORESYNC_ROSTER")]
        roster: Option<String>,

        /// Ignore the cache and fetch again
        #[arg(long)]
        refresh: bool,

        /// Records to print
        #[arg(long, default_value_t = 5)]
        sample: usize,
    },

    /// Delete every cached roster
    Clear,

    /// Store the roster bearer token in the system keychain
    #[command(after_help = "\
Examples:
  scoresync roster login --token \"$TOKEN\"
  echo \"$TOKEN\" | scoresync roster login")]
    Login {
        /// Token value (read from stdin when omitted)
        #[arg(long)]
        token: Option<String>,
    },

    /// Remove the roster token from the system keychain
    Logout,
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  scoresync-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   debug",
            "\ntarget:  ", env!("TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  scoresync-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   release",
            "\ntarget:  ", env!("TARGET"),
        )
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        None => {
            // No subcommand = show help
            eprintln!("Usage: scoresync <command> [options]");
            eprintln!("       scoresync --help for more information");
            Ok(())
        }
        Some(command) => run(command, cli.config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("error: {}", e.message);
            }
            if let Some(hint) = &e.hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(e.code)
        }
    }
}

fn run(command: Commands, config_path: Option<PathBuf>) -> Result<(), CliError> {
    match command {
        Commands::Update(args) => {
            let settings = load_settings(config_path)?;
            update::cmd_update(args, &settings)
        }
        Commands::Columns { file, header_row, json } => cmd_columns(file, header_row, json),
        Commands::Roster { command } => {
            let settings = load_settings(config_path)?;
            cmd_roster(command, &settings)
        }
        Commands::Profiles { json } => {
            let settings = load_settings(config_path)?;
            cmd_profiles(&settings, json)
        }
    }
}

fn load_settings(path: Option<PathBuf>) -> Result<Settings, CliError> {
    Settings::load(path.as_deref()).map_err(CliError::config)
}

/// CLI error with exit code, message, and optional hint.
#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self { code: EXIT_PARSE, message: msg.into(), hint: None }
    }

    /// Map a table load failure: unreadable files are IO errors, everything
    /// else (bad CSV, unknown extension, short file) is a parse error.
    pub fn load(err: LoadError) -> Self {
        match &err {
            LoadError::Io { .. } => Self::io(err.to_string()),
            LoadError::UnsupportedFormat { .. } => Self::parse(err.to_string())
                .with_hint("supported formats: .csv, .tsv, .xlsx, .xlsm, .xls"),
            LoadError::HeaderRowOutOfRange { .. } => Self::parse(err.to_string())
                .with_hint("check --live-header-row or the profile's live_header_row"),
            LoadError::Parse { .. } => Self::parse(err.to_string()),
        }
    }

    pub fn recon(err: ReconError) -> Self {
        match &err {
            ReconError::MissingColumn { .. } | ReconError::EmptyTable { .. } => Self {
                code: EXIT_MISSING_COLUMN,
                message: err.to_string(),
                hint: Some("column names must match exactly (surrounding spaces are ignored)".into()),
            },
            ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => Self {
                code: EXIT_CONFIG,
                message: err.to_string(),
                hint: None,
            },
        }
    }

    pub fn config(err: ConfigError) -> Self {
        match &err {
            ConfigError::UnknownProfile { .. } => Self::args(err.to_string())
                .with_hint("`scoresync profiles` lists the available profiles"),
            _ => Self { code: EXIT_CONFIG, message: err.to_string(), hint: None },
        }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ============================================================================
// columns
// ============================================================================

fn cmd_columns(file: PathBuf, header_row: usize, json: bool) -> Result<(), CliError> {
    let table = scoresync_io::load_table(&file, header_row).map_err(CliError::load)?;

    if json {
        let out = serde_json::to_string_pretty(table.headers())
            .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
        println!("{out}");
        return Ok(());
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    prompt::write_column_list(table.headers(), &mut out)
        .map_err(|e| CliError::io(e.to_string()))?;
    writeln!(out, "{} column(s), {} row(s)", table.headers().len(), table.len())
        .map_err(|e| CliError::io(e.to_string()))?;
    Ok(())
}

// ============================================================================
// roster
// ============================================================================

fn cmd_roster(command: RosterCommands, settings: &Settings) -> Result<(), CliError> {
    let cache = RosterCache::new(Settings::cache_dir(), settings.roster.cache_ttl_secs);

    match command {
        RosterCommands::Show { roster: flag, refresh, sample } => {
            let source = RosterSource::resolve(flag.as_deref(), &settings.roster)?;
            let token = match source {
                RosterSource::Url(_) => credentials::get_roster_token().token,
                RosterSource::File(_) => None,
            };
            let loaded = roster::load(&source, &settings.roster, &cache, refresh, token.as_deref())?;

            println!("source:  {}", source.identity());
            println!("records: {}", loaded.entries.len());
            println!(
                "fetched: {} ({})",
                loaded.fetched_at.to_rfc3339(),
                if loaded.from_cache { "cache" } else { "live" }
            );
            println!();

            let rows = loaded
                .entries
                .iter()
                .map(|e| vec![Cell::from_raw(&e.email), Cell::from_raw(&e.student_id)])
                .collect();
            let table = Table::new(
                vec![settings.roster.email_field.clone(), settings.roster.id_field.clone()],
                rows,
            );
            print!("{}", preview::render_table(&table, sample));
            Ok(())
        }
        RosterCommands::Clear => {
            let removed = cache.clear()?;
            println!("removed {removed} cached roster(s)");
            Ok(())
        }
        RosterCommands::Login { token } => {
            let token = match token {
                Some(t) => t,
                None => {
                    if atty::is(atty::Stream::Stdin) {
                        eprint!("Roster token: ");
                        io::stderr().flush().ok();
                    }
                    let mut line = String::new();
                    io::stdin()
                        .lock()
                        .read_line(&mut line)
                        .map_err(|e| CliError::io(format!("stdin: {e}")))?;
                    line
                }
            };
            let token = token.trim();
            if token.is_empty() {
                return Err(CliError::args("empty token"));
            }
            credentials::set_roster_token(token).map_err(|e| {
                CliError { code: EXIT_CONFIG, message: e, hint: None }
                    .with_hint(format!("set {} instead", credentials::TOKEN_ENV_VAR))
            })?;
            println!("roster token stored in keychain");
            Ok(())
        }
        RosterCommands::Logout => {
            credentials::delete_roster_token()
                .map_err(|e| CliError { code: EXIT_ERROR, message: e, hint: None })?;
            println!("roster token removed from keychain");
            Ok(())
        }
    }
}

// ============================================================================
// profiles
// ============================================================================

fn cmd_profiles(settings: &Settings, json: bool) -> Result<(), CliError> {
    let mut profiles = Vec::new();
    for name in settings.profile_names() {
        let mut profile = settings.profile(&name).map_err(CliError::config)?;
        if profile.name.is_empty() {
            profile.name = name;
        }
        profiles.push(profile);
    }

    if json {
        let out = serde_json::to_string_pretty(&profiles)
            .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
        println!("{out}");
        return Ok(());
    }

    for p in &profiles {
        let marker = if p.name == settings.default_profile { "*" } else { " " };
        println!("{marker} {}", p.name);
        println!("    email column:  {}", p.email_column);
        println!("    policy:        {}", p.overwrite_policy);
        println!(
            "    live sheet:    header row {}, id '{}', score '{}'{}",
            p.live_header_row,
            p.live_id_column,
            p.live_score_column,
            if p.strip_live_id_suffix { ", strip .0" } else { "" }
        );
    }
    Ok(())
}
