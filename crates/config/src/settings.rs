// Application settings
// Loaded from ~/.config/scoresync/settings.toml

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use scoresync_recon::ReconConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, message: String },
    Parse { path: PathBuf, message: String },
    UnknownProfile { name: String, available: Vec<String> },
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, message } => write!(f, "{}: {message}", path.display()),
            Self::Parse { path, message } => {
                write!(f, "{}: invalid settings: {message}", path.display())
            }
            Self::UnknownProfile { name, available } => write!(
                f,
                "unknown profile '{name}' (available: {})",
                available.join(", ")
            ),
            Self::Invalid(msg) => write!(f, "invalid settings: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// How the roster source is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RosterFormat {
    /// Guess from content type / extension / first byte
    #[default]
    Auto,
    Csv,
    Json,
}

/// Where the email -> student id roster comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterSettings {
    /// HTTP(S) URL, e.g. a published sheet's `export?format=csv` link
    pub url: Option<String>,

    /// Local CSV/JSON file (used when `url` is unset)
    pub path: Option<PathBuf>,

    pub format: RosterFormat,

    /// Roster column holding the login email
    pub email_field: String,

    /// Roster column holding the student id
    pub id_field: String,

    /// Seconds a fetched roster stays fresh in the cache (0 = never cache)
    pub cache_ttl_secs: u64,

    pub timeout_secs: u64,
}

impl Default for RosterSettings {
    fn default() -> Self {
        Self {
            url: None,
            path: None,
            format: RosterFormat::Auto,
            email_field: "email".to_string(),
            id_field: "Student ID Number".to_string(),
            cache_ttl_secs: 3600,
            timeout_secs: 15,
        }
    }
}

impl RosterSettings {
    /// The configured source, URL first
    pub fn source(&self) -> Option<String> {
        self.url
            .clone()
            .or_else(|| self.path.as_ref().map(|p| p.display().to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Profile used when `--profile` is not given
    pub default_profile: String,

    pub roster: RosterSettings,

    /// User profiles; a profile named `sis` or `email` replaces the built-in one
    pub profiles: BTreeMap<String, ReconConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_profile: scoresync_recon::config::PROFILE_SIS.to_string(),
            roster: RosterSettings::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("scoresync");
        config_dir.join("settings.toml")
    }

    /// Directory for the roster cache
    pub fn cache_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("scoresync")
    }

    /// Load settings from `path` (or the default location). A missing file
    /// yields defaults; a malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);

        if !path.exists() {
            log::debug!("no settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path).map_err(|e| ConfigError::Io {
            path: path.clone(),
            message: e.to_string(),
        })?;
        let settings = Self::from_toml(&contents).map_err(|e| match e {
            ConfigError::Invalid(message) => ConfigError::Parse { path: path.clone(), message },
            other => other,
        })?;
        log::debug!("loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let mut settings: Settings =
            toml::from_str(input).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        for (name, profile) in settings.profiles.iter_mut() {
            if profile.name.is_empty() {
                profile.name = name.clone();
            }
            profile
                .validate()
                .map_err(|e| ConfigError::Invalid(format!("profile '{name}': {e}")))?;
        }

        if settings.roster.url.is_some() && settings.roster.path.is_some() {
            return Err(ConfigError::Invalid(
                "roster: set either url or path, not both".into(),
            ));
        }

        Ok(settings)
    }

    /// Write settings as TOML, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |e: std::io::Error| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let text = toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        fs::write(path, text).map_err(io_err)
    }

    /// All profile names, built-ins first
    pub fn profile_names(&self) -> Vec<String> {
        let mut names: Vec<String> = [
            scoresync_recon::config::PROFILE_SIS,
            scoresync_recon::config::PROFILE_EMAIL,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        for name in self.profiles.keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }

    /// Resolve a profile by name: user profiles shadow built-ins
    pub fn profile(&self, name: &str) -> Result<ReconConfig, ConfigError> {
        if let Some(p) = self.profiles.get(name) {
            return Ok(p.clone());
        }
        ReconConfig::preset(name).ok_or_else(|| ConfigError::UnknownProfile {
            name: name.to_string(),
            available: self.profile_names(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scoresync_recon::OverwritePolicy;
    use tempfile::tempdir;

    #[test]
    fn defaults_when_file_missing() {
        let dir = tempdir().unwrap();
        let s = Settings::load(Some(&dir.path().join("nope.toml"))).unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.default_profile, "sis");
        assert_eq!(s.roster.email_field, "email");
        assert_eq!(s.roster.id_field, "Student ID Number");
        assert_eq!(s.roster.cache_ttl_secs, 3600);
    }

    #[test]
    fn parse_roster_and_custom_profile() {
        let input = r#"
default_profile = "moodle"

[roster]
url = "https://docs.google.com/spreadsheets/d/abc/export?format=csv"
cache_ttl_secs = 600

[profiles.moodle]
email_column = "Email address"
overwrite_policy = "overwrite_always"
live_header_row = 0
"#;
        let s = Settings::from_toml(input).unwrap();
        assert_eq!(s.default_profile, "moodle");
        assert_eq!(s.roster.cache_ttl_secs, 600);
        assert_eq!(s.roster.timeout_secs, 15);
        assert_eq!(s.roster.source().unwrap(), "https://docs.google.com/spreadsheets/d/abc/export?format=csv");

        let p = s.profile("moodle").unwrap();
        assert_eq!(p.name, "moodle");
        assert_eq!(p.live_header_row, 0);
        assert_eq!(p.overwrite_policy, OverwritePolicy::OverwriteAlways);
        assert_eq!(s.profile_names(), vec!["sis", "email", "moodle"]);
    }

    #[test]
    fn user_profile_shadows_builtin() {
        let input = r#"
[profiles.sis]
email_column = "Login"
overwrite_policy = "overwrite_always"
"#;
        let s = Settings::from_toml(input).unwrap();
        assert_eq!(s.profile("sis").unwrap().email_column, "Login");
        assert_eq!(s.profile("email").unwrap().email_column, "Email address");
        assert_eq!(s.profile_names(), vec!["sis", "email"]);
    }

    #[test]
    fn unknown_profile_lists_choices() {
        let err = Settings::default().profile("canvas").unwrap_err();
        assert_eq!(err.to_string(), "unknown profile 'canvas' (available: sis, email)");
    }

    #[test]
    fn invalid_profile_rejected() {
        let input = r#"
[profiles.bad]
email_column = ""
overwrite_policy = "overwrite_always"
"#;
        let err = Settings::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("profile 'bad'"));
    }

    #[test]
    fn url_and_path_are_exclusive() {
        let input = r#"
[roster]
url = "https://example.com/roster.csv"
path = "roster.csv"
"#;
        assert!(Settings::from_toml(input).is_err());
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "roster = 5").unwrap();
        let err = Settings::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("settings.toml"));
    }

    #[test]
    fn save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/settings.toml");
        let mut s = Settings::default();
        s.roster.path = Some(PathBuf::from("/srv/roster.csv"));
        s.profiles.insert("custom".into(), ReconConfig::email());
        s.save(&path).unwrap();

        let loaded = Settings::load(Some(&path)).unwrap();
        assert_eq!(loaded.roster.path, s.roster.path);
        assert_eq!(loaded.profile("custom").unwrap().email_column, "Email address");
    }
}
