//! Roster source: the authoritative email -> student id mapping.
//!
//! A roster comes from an HTTP(S) URL (a published sheet's CSV export or a
//! JSON array of records) or a local CSV/JSON file. URL rosters are cached
//! on disk, keyed by a blake3 hash of the URL, so repeated runs within the
//! TTL do not hit the network.
//!
//! ## Cache file
//!
//! `<cache_dir>/roster-<hash16>.json`:
//!
//! ```json
//! { "source": "https://...", "fetched_at": "2026-10-16T09:00:00Z", "entries": [...] }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use scoresync_config::{RosterFormat, RosterSettings};
use scoresync_recon::{ReconError, RosterEntry};
use serde::{Deserialize, Serialize};

use crate::exit_codes;
use crate::CliError;

pub(crate) const USER_AGENT: &str = concat!("scoresync/", env!("CARGO_PKG_VERSION"));

/// Table name used in missing-column errors for the roster.
const ROSTER_TABLE: &str = "roster";

// ── Source ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterSource {
    Url(String),
    File(PathBuf),
}

impl RosterSource {
    /// `http://` / `https://` strings are URLs; everything else is a path.
    pub fn parse(raw: &str) -> Result<Self, CliError> {
        let raw = raw.trim();
        let lower = raw.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            url::Url::parse(raw)
                .map_err(|e| CliError::args(format!("invalid roster URL '{raw}': {e}")))?;
            Ok(Self::Url(raw.to_string()))
        } else {
            Ok(Self::File(PathBuf::from(raw)))
        }
    }

    /// Resolve from `--roster`, falling back to settings.
    pub fn resolve(flag: Option<&str>, settings: &RosterSettings) -> Result<Self, CliError> {
        match flag.map(str::to_string).or_else(|| settings.source()) {
            Some(raw) => Self::parse(&raw),
            None => Err(CliError {
                code: exit_codes::EXIT_ROSTER_UNAVAILABLE,
                message: "no roster source configured".into(),
                hint: Some(
                    "pass --roster <URL|PATH> or set [roster] url in settings.toml".into(),
                ),
            }),
        }
    }

    pub fn identity(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::File(path) => path.display().to_string(),
        }
    }
}

// ── Parsing ─────────────────────────────────────────────────────────

/// Pick CSV or JSON. Explicit settings win; otherwise content type, then
/// file extension, then the first non-blank byte of the body.
fn detect_format(
    configured: RosterFormat,
    content_type: Option<&str>,
    identity: &str,
    body: &str,
) -> RosterFormat {
    if configured != RosterFormat::Auto {
        return configured;
    }
    if let Some(ct) = content_type {
        if ct.contains("json") {
            return RosterFormat::Json;
        }
        if ct.contains("csv") {
            return RosterFormat::Csv;
        }
    }
    let path_part = identity.split(['?', '#']).next().unwrap_or(identity);
    if path_part.to_ascii_lowercase().ends_with(".json") {
        return RosterFormat::Json;
    }
    match body.trim_start().chars().next() {
        Some('[') => RosterFormat::Json,
        _ => RosterFormat::Csv,
    }
}

pub(crate) fn parse_roster(
    body: &str,
    format: RosterFormat,
    settings: &RosterSettings,
    identity: &str,
) -> Result<Vec<RosterEntry>, CliError> {
    match format {
        RosterFormat::Json => parse_json(body, settings, identity),
        RosterFormat::Csv | RosterFormat::Auto => parse_csv(body, settings, identity),
    }
}

fn parse_csv(
    body: &str,
    settings: &RosterSettings,
    identity: &str,
) -> Result<Vec<RosterEntry>, CliError> {
    let delimiter = scoresync_io::csv::sniff_delimiter(body);
    let table = scoresync_io::csv::import_from_string(Path::new(identity), body, delimiter, 0)
        .map_err(|e| malformed(identity, e.to_string()))?;

    let email_col = table
        .require_column(ROSTER_TABLE, &settings.email_field)
        .map_err(CliError::recon)?;
    let id_col = table
        .require_column(ROSTER_TABLE, &settings.id_field)
        .map_err(CliError::recon)?;

    Ok(table
        .rows()
        .iter()
        .map(|row| {
            RosterEntry::new(
                row[email_col].as_text().into_owned(),
                row[id_col].as_text().into_owned(),
            )
        })
        .collect())
}

fn parse_json(
    body: &str,
    settings: &RosterSettings,
    identity: &str,
) -> Result<Vec<RosterEntry>, CliError> {
    let records: Vec<serde_json::Map<String, serde_json::Value>> = serde_json::from_str(body)
        .map_err(|e| malformed(identity, format!("expected a JSON array of objects: {e}")))?;

    if !records.is_empty() {
        for field in [&settings.email_field, &settings.id_field] {
            if !records.iter().any(|r| json_field(r, field).is_some()) {
                return Err(CliError::recon(ReconError::MissingColumn {
                    table: ROSTER_TABLE.into(),
                    column: field.trim().into(),
                }));
            }
        }
    }

    Ok(records
        .iter()
        .map(|r| {
            RosterEntry::new(
                json_field(r, &settings.email_field).unwrap_or_default(),
                json_field(r, &settings.id_field).unwrap_or_default(),
            )
        })
        .collect())
}

/// Look a field up by trimmed key. Numbers keep serde_json's rendering, so
/// `12345.0` comes through as "12345.0".
fn json_field(record: &serde_json::Map<String, serde_json::Value>, name: &str) -> Option<String> {
    let name = name.trim();
    let value = record
        .get(name)
        .or_else(|| record.iter().find(|(k, _)| k.trim() == name).map(|(_, v)| v))?;
    Some(match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn malformed(identity: &str, message: String) -> CliError {
    CliError {
        code: exit_codes::EXIT_ROSTER_MALFORMED,
        message: format!("roster {identity}: {message}"),
        hint: Some("set [roster] format = \"csv\" or \"json\" if detection guessed wrong".into()),
    }
}

// ── Fetch ───────────────────────────────────────────────────────────

/// Read or download the roster. One attempt, no retry.
pub fn fetch(
    source: &RosterSource,
    settings: &RosterSettings,
    token: Option<&str>,
) -> Result<Vec<RosterEntry>, CliError> {
    let identity = source.identity();
    let (body, content_type) = match source {
        RosterSource::Url(url) => fetch_url(url, settings.timeout_secs, token)?,
        RosterSource::File(path) => {
            let body = scoresync_io::csv::read_file_as_utf8(path).map_err(|e| CliError {
                code: exit_codes::EXIT_ROSTER_UNAVAILABLE,
                message: format!("roster unavailable: {e}"),
                hint: None,
            })?;
            (body, None)
        }
    };

    let format = detect_format(settings.format, content_type.as_deref(), &identity, &body);
    log::debug!("parsing roster {identity} as {format:?}");
    let entries = parse_roster(&body, format, settings, &identity)?;
    log::info!("roster {identity}: {} record(s)", entries.len());
    Ok(entries)
}

fn fetch_url(
    url: &str,
    timeout_secs: u64,
    token: Option<&str>,
) -> Result<(String, Option<String>), CliError> {
    let unavailable = |message: String| CliError {
        code: exit_codes::EXIT_ROSTER_UNAVAILABLE,
        message,
        hint: None,
    };

    let http = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| unavailable(format!("failed to build HTTP client: {e}")))?;

    log::info!("fetching roster from {url}");
    let mut request = http.get(url);
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }

    let resp = request.send().map_err(|e| {
        let err = unavailable(format!("roster unavailable: {e}"));
        if e.is_timeout() {
            err.with_hint(format!(
                "no response within {timeout_secs}s; raise [roster] timeout_secs"
            ))
        } else {
            err.with_hint("check the network connection and the roster URL")
        }
    })?;

    let status = resp.status();
    if status.as_u16() == 401 || status.as_u16() == 403 {
        return Err(CliError {
            code: exit_codes::EXIT_ROSTER_AUTH,
            message: format!("roster source rejected credentials (HTTP {})", status.as_u16()),
            hint: Some(format!(
                "run `scoresync roster login` or set {}",
                scoresync_config::credentials::TOKEN_ENV_VAR
            )),
        });
    }
    if !status.is_success() {
        return Err(unavailable(format!(
            "roster unavailable: HTTP {} from {url}",
            status.as_u16()
        )));
    }

    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_ascii_lowercase());
    let body = resp
        .text()
        .map_err(|e| unavailable(format!("roster unavailable: failed to read body: {e}")))?;

    Ok((body, content_type))
}

// ── Cache ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedRoster {
    pub source: String,
    pub fetched_at: DateTime<Utc>,
    pub entries: Vec<RosterEntry>,
}

pub struct RosterCache {
    dir: PathBuf,
    ttl: chrono::Duration,
}

impl RosterCache {
    pub fn new(dir: impl Into<PathBuf>, ttl_secs: u64) -> Self {
        Self {
            dir: dir.into(),
            ttl: chrono::Duration::seconds(ttl_secs.min(u32::MAX as u64) as i64),
        }
    }

    pub fn enabled(&self) -> bool {
        self.ttl > chrono::Duration::zero()
    }

    pub fn path_for(&self, source: &str) -> PathBuf {
        let hash = blake3::hash(source.as_bytes()).to_hex();
        self.dir.join(format!("roster-{}.json", &hash[..16]))
    }

    /// Any cached copy for `source`, fresh or not.
    pub fn read(&self, source: &str) -> Option<CachedRoster> {
        let path = self.path_for(source);
        let text = fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<CachedRoster>(&text) {
            Ok(cached) if cached.source == source => Some(cached),
            Ok(_) => {
                log::debug!("cache {} belongs to another source", path.display());
                None
            }
            Err(e) => {
                log::debug!("ignoring unreadable cache {}: {e}", path.display());
                None
            }
        }
    }

    /// Cached copy younger than the TTL at `now`.
    pub fn read_fresh(&self, source: &str, now: DateTime<Utc>) -> Option<CachedRoster> {
        if !self.enabled() {
            return None;
        }
        self.read(source)
            .filter(|cached| now.signed_duration_since(cached.fetched_at) < self.ttl)
    }

    pub fn store(
        &self,
        source: &str,
        entries: &[RosterEntry],
        now: DateTime<Utc>,
    ) -> Result<PathBuf, String> {
        fs::create_dir_all(&self.dir).map_err(|e| format!("{}: {e}", self.dir.display()))?;
        let path = self.path_for(source);
        let cached = CachedRoster {
            source: source.to_string(),
            fetched_at: now,
            entries: entries.to_vec(),
        };
        let json = serde_json::to_string_pretty(&cached).map_err(|e| e.to_string())?;
        fs::write(&path, json).map_err(|e| format!("{}: {e}", path.display()))?;
        Ok(path)
    }

    /// Delete every cached roster. Returns how many files were removed.
    pub fn clear(&self) -> Result<usize, CliError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(CliError::io(format!("{}: {e}", self.dir.display()))),
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with("roster-") && name.ends_with(".json") {
                fs::remove_file(entry.path())
                    .map_err(|e| CliError::io(format!("{}: {e}", entry.path().display())))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// A roster ready for reconciliation, plus where it came from.
#[derive(Debug)]
pub struct LoadedRoster {
    pub entries: Vec<RosterEntry>,
    pub from_cache: bool,
    pub fetched_at: DateTime<Utc>,
}

/// Fetch through the cache. Local files are always read fresh; URLs are
/// served from the cache while it is within TTL unless `refresh` is set.
pub fn load(
    source: &RosterSource,
    settings: &RosterSettings,
    cache: &RosterCache,
    refresh: bool,
    token: Option<&str>,
) -> Result<LoadedRoster, CliError> {
    let identity = source.identity();
    let now = Utc::now();
    let cacheable = matches!(source, RosterSource::Url(_)) && cache.enabled();

    if cacheable && !refresh {
        if let Some(cached) = cache.read_fresh(&identity, now) {
            log::debug!(
                "roster cache hit for {identity} (fetched {})",
                cached.fetched_at.to_rfc3339()
            );
            return Ok(LoadedRoster {
                entries: cached.entries,
                from_cache: true,
                fetched_at: cached.fetched_at,
            });
        }
        log::debug!("roster cache miss for {identity}");
    }

    let entries = fetch(source, settings, token)?;

    if cacheable {
        match cache.store(&identity, &entries, now) {
            Ok(path) => log::debug!("cached roster at {}", path.display()),
            Err(e) => log::warn!("could not cache roster: {e}"),
        }
    }

    Ok(LoadedRoster {
        entries,
        from_cache: false,
        fetched_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use tempfile::tempdir;

    const CSV_BODY: &str = "email,Student ID Number,Name\n\
                            ada@miva.edu.ng,2023001.0,Ada\n\
                            alan@miva.edu.ng,2023002,Alan\n";

    fn settings() -> RosterSettings {
        RosterSettings::default()
    }

    #[test]
    fn source_parse_distinguishes_url_and_path() {
        assert_eq!(
            RosterSource::parse(" https://example.com/r.csv ").unwrap(),
            RosterSource::Url("https://example.com/r.csv".into())
        );
        assert_eq!(
            RosterSource::parse("rosters/cs201.csv").unwrap(),
            RosterSource::File(PathBuf::from("rosters/cs201.csv"))
        );
        let err = RosterSource::parse("https://exa mple.com").unwrap_err();
        assert_eq!(err.code, exit_codes::EXIT_USAGE);
    }

    #[test]
    fn resolve_without_any_source_is_unavailable() {
        let err = RosterSource::resolve(None, &settings()).unwrap_err();
        assert_eq!(err.code, exit_codes::EXIT_ROSTER_UNAVAILABLE);
        assert!(err.hint.is_some());

        let mut s = settings();
        s.url = Some("https://example.com/roster".into());
        assert_eq!(
            RosterSource::resolve(Some("local.csv"), &s).unwrap(),
            RosterSource::File(PathBuf::from("local.csv"))
        );
        assert_eq!(
            RosterSource::resolve(None, &s).unwrap(),
            RosterSource::Url("https://example.com/roster".into())
        );
    }

    #[test]
    fn detect_format_order() {
        let auto = RosterFormat::Auto;
        assert_eq!(detect_format(RosterFormat::Csv, Some("application/json"), "x", "["), RosterFormat::Csv);
        assert_eq!(detect_format(auto, Some("application/json; charset=utf-8"), "x", ""), RosterFormat::Json);
        assert_eq!(detect_format(auto, Some("text/csv"), "x.json", "["), RosterFormat::Csv);
        assert_eq!(detect_format(auto, None, "https://h/r.json?v=2", "email"), RosterFormat::Json);
        assert_eq!(detect_format(auto, Some("text/plain"), "x", "  [{}]"), RosterFormat::Json);
        assert_eq!(detect_format(auto, None, "x", "email,id"), RosterFormat::Csv);
    }

    #[test]
    fn csv_roster_keeps_raw_values() {
        let entries = parse_roster(CSV_BODY, RosterFormat::Csv, &settings(), "r.csv").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], RosterEntry::new("ada@miva.edu.ng", "2023001.0"));
    }

    #[test]
    fn csv_roster_missing_id_column() {
        let err = parse_roster("email,Matric\na@x.com,1\n", RosterFormat::Csv, &settings(), "r.csv")
            .unwrap_err();
        assert_eq!(err.code, exit_codes::EXIT_MISSING_COLUMN);
        assert_eq!(err.message, "roster: missing column 'Student ID Number'");
    }

    #[test]
    fn json_roster_stringifies_numbers() {
        let body = r#"[
            {"email": "ada@miva.edu.ng", "Student ID Number": 12345.0},
            {"email": "alan@miva.edu.ng", "Student ID Number": "2023002"},
            {"email": "nobody@miva.edu.ng", "Student ID Number": null}
        ]"#;
        let entries = parse_roster(body, RosterFormat::Json, &settings(), "r.json").unwrap();
        assert_eq!(entries[0].student_id, "12345.0");
        assert_eq!(entries[1].student_id, "2023002");
        assert_eq!(entries[2].student_id, "");
    }

    #[test]
    fn json_roster_errors() {
        let err = parse_roster("{\"email\": 1}", RosterFormat::Json, &settings(), "r.json")
            .unwrap_err();
        assert_eq!(err.code, exit_codes::EXIT_ROSTER_MALFORMED);

        let err = parse_roster(r#"[{"mail": "a@x.com", "Student ID Number": "1"}]"#, RosterFormat::Json, &settings(), "r.json")
            .unwrap_err();
        assert_eq!(err.code, exit_codes::EXIT_MISSING_COLUMN);

        assert!(parse_roster("[]", RosterFormat::Json, &settings(), "r.json").unwrap().is_empty());
    }

    #[test]
    fn fetch_csv_over_http_with_bearer_token() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/export")
                .header("authorization", "Bearer s3cret");
            then.status(200)
                .header("content-type", "text/csv")
                .body(CSV_BODY);
        });

        let source = RosterSource::Url(server.url("/export"));
        let entries = fetch(&source, &settings(), Some("s3cret")).unwrap();
        mock.assert();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].email, "alan@miva.edu.ng");
    }

    #[test]
    fn fetch_json_by_content_type() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/roster");
            then.status(200).json_body(serde_json::json!([
                {"email": "ada@miva.edu.ng", "Student ID Number": "2023001"}
            ]));
        });

        let source = RosterSource::Url(server.url("/roster"));
        let entries = fetch(&source, &settings(), None).unwrap();
        assert_eq!(entries, vec![RosterEntry::new("ada@miva.edu.ng", "2023001")]);
    }

    #[test]
    fn fetch_server_error_is_unavailable() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/roster");
            then.status(503).body("maintenance");
        });

        let err = fetch(&RosterSource::Url(server.url("/roster")), &settings(), None).unwrap_err();
        assert_eq!(err.code, exit_codes::EXIT_ROSTER_UNAVAILABLE);
        assert!(err.message.contains("503"));
    }

    #[test]
    fn fetch_forbidden_is_auth_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/roster");
            then.status(403);
        });

        let err = fetch(&RosterSource::Url(server.url("/roster")), &settings(), Some("bad")).unwrap_err();
        assert_eq!(err.code, exit_codes::EXIT_ROSTER_AUTH);
        assert!(err.hint.unwrap().contains("roster login"));
    }

    #[test]
    fn fetch_missing_local_file_is_unavailable() {
        let err = fetch(&RosterSource::File(PathBuf::from("/nonexistent/roster.csv")), &settings(), None)
            .unwrap_err();
        assert_eq!(err.code, exit_codes::EXIT_ROSTER_UNAVAILABLE);
    }

    #[test]
    fn cache_path_is_stable_per_source() {
        let cache = RosterCache::new("/tmp/scoresync-test", 60);
        let a = cache.path_for("https://example.com/a");
        assert_eq!(a, cache.path_for("https://example.com/a"));
        assert_ne!(a, cache.path_for("https://example.com/b"));
        let name = a.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("roster-") && name.ends_with(".json"));
        assert_eq!(name.len(), "roster-".len() + 16 + ".json".len());
    }

    #[test]
    fn cache_freshness_follows_ttl() {
        let dir = tempdir().unwrap();
        let cache = RosterCache::new(dir.path(), 600);
        let t0 = Utc::now();
        let entries = vec![RosterEntry::new("a@x.com", "S1")];
        cache.store("https://h/r", &entries, t0).unwrap();

        let fresh = cache.read_fresh("https://h/r", t0 + chrono::Duration::seconds(599)).unwrap();
        assert_eq!(fresh.entries, entries);
        assert!(cache.read_fresh("https://h/r", t0 + chrono::Duration::seconds(600)).is_none());
        assert!(cache.read("https://h/r").is_some());
        assert!(cache.read("https://h/other").is_none());
    }

    #[test]
    fn zero_ttl_disables_cache() {
        let dir = tempdir().unwrap();
        let cache = RosterCache::new(dir.path(), 0);
        assert!(!cache.enabled());
        cache.store("https://h/r", &[], Utc::now()).unwrap();
        assert!(cache.read_fresh("https://h/r", Utc::now()).is_none());
    }

    #[test]
    fn load_serves_second_call_from_cache() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/export");
            then.status(200).body(CSV_BODY);
        });
        let dir = tempdir().unwrap();
        let cache = RosterCache::new(dir.path(), 3600);
        let source = RosterSource::Url(server.url("/export"));

        let first = load(&source, &settings(), &cache, false, None).unwrap();
        assert!(!first.from_cache);
        let second = load(&source, &settings(), &cache, false, None).unwrap();
        assert!(second.from_cache);
        assert_eq!(second.entries, first.entries);
        let refreshed = load(&source, &settings(), &cache, true, None).unwrap();
        assert!(!refreshed.from_cache);
    }

    #[test]
    fn failed_fetch_does_not_fall_back_to_stale_cache() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/export");
            then.status(500);
        });
        let dir = tempdir().unwrap();
        let cache = RosterCache::new(dir.path(), 3600);
        let source = RosterSource::Url(server.url("/export"));
        cache
            .store(&source.identity(), &[RosterEntry::new("a@x.com", "S1")], Utc::now())
            .unwrap();

        let err = load(&source, &settings(), &cache, true, None).unwrap_err();
        assert_eq!(err.code, exit_codes::EXIT_ROSTER_UNAVAILABLE);
    }

    #[test]
    fn local_files_bypass_cache() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("roster.csv");
        fs::write(&path, CSV_BODY).unwrap();
        let cache = RosterCache::new(dir.path().join("cache"), 3600);
        let source = RosterSource::File(path);

        let loaded = load(&source, &settings(), &cache, false, None).unwrap();
        assert!(!loaded.from_cache);
        assert_eq!(loaded.entries.len(), 2);
        assert!(!dir.path().join("cache").exists());
    }

    #[test]
    fn clear_removes_only_roster_files() {
        let dir = tempdir().unwrap();
        let cache = RosterCache::new(dir.path(), 60);
        cache.store("https://h/a", &[], Utc::now()).unwrap();
        cache.store("https://h/b", &[], Utc::now()).unwrap();
        fs::write(dir.path().join("notes.txt"), "keep").unwrap();

        assert_eq!(cache.clear().unwrap(), 2);
        assert!(dir.path().join("notes.txt").exists());
        assert_eq!(RosterCache::new(dir.path().join("missing"), 60).clear().unwrap(), 0);
    }
}
