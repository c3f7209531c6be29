//! `scoresync update`: patch one grade book column from the live score sheet.

use std::io;
use std::path::{Path, PathBuf};

use chrono::Timelike;
use clap::{Args, ValueEnum};
use scoresync_config::credentials::get_roster_token;
use scoresync_config::Settings;
use scoresync_io::{load_table, output_base_name};
use scoresync_recon::{OverwritePolicy, ReconConfig, ReconResult, Table};
use serde::Serialize;

use crate::exit_codes;
use crate::preview;
use crate::prompt;
use crate::roster::{self, LoadedRoster, RosterCache, RosterSource};
use crate::CliError;

/// Suffix of the full updated grade book file.
pub const UPDATED_SUFFIX: &str = "_Live Score Updated";

/// Suffix of the matched-rows-only file (overwrite-always profiles).
pub const UPDATED_ONLY_SUFFIX: &str = "_Live Score Updated_Only";

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum PolicyArg {
    /// Only replace cells that currently read "0.00"
    IfZero,
    /// Replace every matched cell
    Always,
}

impl From<PolicyArg> for OverwritePolicy {
    fn from(p: PolicyArg) -> Self {
        match p {
            PolicyArg::IfZero => OverwritePolicy::OverwriteIfZero,
            PolicyArg::Always => OverwritePolicy::OverwriteAlways,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Csv,
    Xlsx,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Xlsx => "xlsx",
        }
    }
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Grade book downloaded from the LMS (.csv, .tsv, .xlsx, .xls)
    pub gradebook: PathBuf,

    /// Live score sheet (title row, then the header row)
    pub live: PathBuf,

    /// Grade book column to update (prompted for when omitted on a terminal)
    #[arg(long, short = 't')]
    pub target: Option<String>,

    /// Reconciliation profile (built-in: sis, email)
    #[arg(long, short = 'p')]
    pub profile: Option<String>,

    /// Override the profile's overwrite policy
    #[arg(long, value_enum)]
    pub policy: Option<PolicyArg>,

    /// Override the grade book email column
    #[arg(long)]
    pub email_column: Option<String>,

    /// Override the live sheet header row (0-based)
    #[arg(long)]
    pub live_header_row: Option<usize>,

    /// Roster URL or file (defaults to [roster] in settings.toml)
    #[arg(long, env = "SCORESYNC_ROSTER")]
    pub roster: Option<String>,

    /// Ignore the cached roster and fetch again
    #[arg(long)]
    pub refresh_roster: bool,

    /// Directory for output files (default: next to the grade book)
    #[arg(long, short = 'o')]
    pub out_dir: Option<PathBuf>,

    /// Output file format
    #[arg(long, value_enum, default_value = "csv")]
    pub format: OutputFormat,

    /// Write without asking for confirmation
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Reconcile and preview, but write nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Print a JSON report to stdout instead of previews
    #[arg(long)]
    pub json: bool,

    /// Rows shown in each preview
    #[arg(long, default_value_t = 10)]
    pub preview: usize,

    /// Show email / derived student id / new score for the first rows
    #[arg(long)]
    pub debug_rows: bool,
}

/// Apply command-line overrides on top of the selected profile.
pub fn effective_config(args: &UpdateArgs, settings: &Settings) -> Result<ReconConfig, CliError> {
    let name = args
        .profile
        .clone()
        .unwrap_or_else(|| settings.default_profile.clone());
    let mut config = settings.profile(&name).map_err(CliError::config)?;

    if config.name.is_empty() {
        config.name = name;
    }
    if let Some(policy) = args.policy {
        config.overwrite_policy = policy.into();
    }
    if let Some(col) = &args.email_column {
        config.email_column = col.clone();
    }
    if let Some(row) = args.live_header_row {
        config.live_header_row = row;
    }

    config.validate().map_err(CliError::recon)?;
    Ok(config)
}

/// `<dir>/<base>_Live Score Updated[.._Only].<ext>`
pub fn output_paths(
    gradebook: &Path,
    out_dir: Option<&Path>,
    format: OutputFormat,
) -> (PathBuf, PathBuf) {
    let dir = out_dir
        .map(Path::to_path_buf)
        .or_else(|| {
            gradebook
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
        })
        .unwrap_or_else(|| PathBuf::from("."));
    let base = output_base_name(gradebook);
    let ext = format.extension();
    (
        dir.join(format!("{base}{UPDATED_SUFFIX}.{ext}")),
        dir.join(format!("{base}{UPDATED_ONLY_SUFFIX}.{ext}")),
    )
}

#[derive(Serialize)]
struct RosterReport {
    source: String,
    records: usize,
    from_cache: bool,
    fetched_at: String,
}

#[derive(Serialize)]
struct UpdateReport<'a> {
    #[serde(flatten)]
    result: &'a ReconResult,
    roster: RosterReport,
    outputs: Vec<String>,
    dry_run: bool,
}

pub fn cmd_update(args: UpdateArgs, settings: &Settings) -> Result<(), CliError> {
    let config = effective_config(&args, settings)?;
    let human = !args.json;
    let interactive = atty::is(atty::Stream::Stdin) && atty::is(atty::Stream::Stdout);

    if human {
        let hour = chrono::Local::now().hour();
        println!(
            "{}! Updating {} from {} (profile {}, {})\n",
            preview::greeting(hour),
            args.gradebook.display(),
            args.live.display(),
            config.name,
            config.overwrite_policy,
        );
    }

    let grade_book = load_table(&args.gradebook, 0).map_err(CliError::load)?;
    let live_scores = load_table(&args.live, config.live_header_row).map_err(CliError::load)?;

    let source = RosterSource::resolve(args.roster.as_deref(), &settings.roster)?;
    let token = match source {
        RosterSource::Url(_) => get_roster_token().token,
        RosterSource::File(_) => None,
    };
    let cache = RosterCache::new(Settings::cache_dir(), settings.roster.cache_ttl_secs);
    let roster = roster::load(
        &source,
        &settings.roster,
        &cache,
        args.refresh_roster,
        token.as_deref(),
    )?;

    if human {
        println!("{}", roster_line(&source, &roster));
        print_preview("Preview of Grade Book", &grade_book, args.preview);
        print_preview("Preview of Live Scores Sheet", &live_scores, args.preview);
    }

    let target = match &args.target {
        Some(t) => t.clone(),
        None if interactive => {
            let stdin = io::stdin();
            prompt::choose_column(
                grade_book.headers(),
                &mut stdin.lock(),
                &mut PromptStream::for_run(args.json).writer(),
            )?
        }
        None => {
            return Err(CliError::args("no target column given").with_hint(format!(
                "pass --target <COLUMN>; `scoresync columns {}` lists them",
                args.gradebook.display()
            )))
        }
    };

    if !args.yes && !args.dry_run {
        let question = format!(
            "Update '{}' in {} row(s) with {}?",
            target,
            grade_book.len(),
            config.overwrite_policy
        );
        let accepted = interactive
            && prompt::confirm(
                &question,
                &mut io::stdin().lock(),
                &mut PromptStream::for_run(args.json).writer(),
            )?;
        if !accepted {
            let err = CliError {
                code: exit_codes::EXIT_DECLINED,
                message: "update cancelled; nothing written".into(),
                hint: None,
            };
            return Err(if interactive {
                err
            } else {
                err.with_hint("stdin is not a terminal; pass --yes to write without prompting")
            });
        }
    }

    let result = scoresync_recon::reconcile(
        &roster.entries,
        &grade_book,
        &live_scores,
        &config,
        &target,
    )
    .map_err(CliError::recon)?;

    if human {
        match &result.matched_only {
            Some(only) => print_preview("Preview of Updated Students", only, args.preview),
            None => print_preview("Preview of Updated Scores", &result.updated, args.preview),
        }
        println!("{}", preview::render_summary(&result));
        if args.debug_rows {
            println!("Debug rows");
            println!("{}", preview::render_debug_rows(&result.matches, args.preview));
        }
    }

    let outputs = if args.dry_run {
        eprintln!("dry run: nothing written");
        Vec::new()
    } else {
        write_outputs(&args, &result)?
    };

    if args.json {
        let report = UpdateReport {
            result: &result,
            roster: RosterReport {
                source: source.identity(),
                records: roster.entries.len(),
                from_cache: roster.from_cache,
                fetched_at: roster.fetched_at.to_rfc3339(),
            },
            outputs: outputs.iter().map(|p| p.display().to_string()).collect(),
            dry_run: args.dry_run,
        };
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
        println!("{json}");
    }

    let s = &result.summary;
    log::info!(
        "update done: {} matched, {} not found, {} written",
        s.updated_count,
        s.not_found_count,
        outputs.len()
    );
    Ok(())
}

fn roster_line(source: &RosterSource, roster: &LoadedRoster) -> String {
    let origin = if roster.from_cache {
        format!("cached {}", roster.fetched_at.format("%Y-%m-%d %H:%M UTC"))
    } else {
        "fetched".to_string()
    };
    format!(
        "Roster: {} record(s) from {} ({origin})\n",
        roster.entries.len(),
        source.identity()
    )
}

fn print_preview(title: &str, table: &Table, limit: usize) {
    println!("{title}");
    println!("{}", preview::render_table(table, limit));
}

fn write_outputs(args: &UpdateArgs, result: &ReconResult) -> Result<Vec<PathBuf>, CliError> {
    let (full_path, only_path) = output_paths(&args.gradebook, args.out_dir.as_deref(), args.format);

    if let Some(dir) = full_path.parent() {
        std::fs::create_dir_all(dir)
            .map_err(|e| CliError::io(format!("{}: {e}", dir.display())))?;
    }

    let mut tables = vec![(full_path, &result.updated)];
    if let Some(only) = &result.matched_only {
        tables.push((only_path, only));
    }

    // Every file is exported to a staging name first; nothing takes its final
    // name until all exports have succeeded.
    let mut staged: Vec<(PathBuf, PathBuf)> = Vec::new();
    for (path, table) in tables {
        let part = staging_path(&path);
        let exported = match args.format {
            OutputFormat::Csv => scoresync_io::csv::export(table, &part),
            OutputFormat::Xlsx => scoresync_io::xlsx::export(table, &part),
        };
        if let Err(e) = exported {
            remove_quietly(&part);
            staged.iter().for_each(|(p, _)| remove_quietly(p));
            return Err(CliError::load(e));
        }
        staged.push((part, path));
    }

    let mut written = Vec::new();
    for (i, (part, path)) in staged.iter().enumerate() {
        if let Err(e) = std::fs::rename(part, path) {
            staged[i..].iter().for_each(|(p, _)| remove_quietly(p));
            written.iter().for_each(|p: &PathBuf| remove_quietly(p));
            return Err(CliError::io(format!("{}: {e}", path.display())));
        }
        written.push(path.clone());
    }
    for path in &written {
        eprintln!("wrote {}", path.display());
    }
    Ok(written)
}

/// Hidden sibling of `path` used while the output is being written.
fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.part"))
}

fn remove_quietly(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        log::debug!("cleanup {}: {e}", path.display());
    }
}

/// Prompt destination for this run. With `--json`, stdout carries only the
/// report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptStream {
    Stdout,
    Stderr,
}

impl PromptStream {
    fn for_run(json: bool) -> Self {
        if json {
            Self::Stderr
        } else {
            Self::Stdout
        }
    }

    fn writer(self) -> Box<dyn io::Write> {
        match self {
            Self::Stdout => Box::new(io::stdout()),
            Self::Stderr => Box::new(io::stderr()),
        }
    }
}
