use serde::{Deserialize, Serialize};

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Overwrite policy
// ---------------------------------------------------------------------------

/// When a matched live score replaces the grade-book target cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverwritePolicy {
    /// Only replace cells that currently read exactly `0.00`.
    OverwriteIfZero,
    /// Replace the cell whenever a score matched.
    OverwriteAlways,
}

impl std::fmt::Display for OverwritePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OverwriteIfZero => write!(f, "overwrite_if_zero"),
            Self::OverwriteAlways => write!(f, "overwrite_always"),
        }
    }
}

// ---------------------------------------------------------------------------
// Recon config
// ---------------------------------------------------------------------------

/// Parameters for one reconciliation profile.
///
/// The two LMS export flavours differ only in which grade-book column holds
/// the login email, how the target cell is overwritten, and whether live
/// sheet ids carry float artifacts. Everything else is shared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconConfig {
    #[serde(default)]
    pub name: String,
    /// Grade-book column holding the student's login email.
    pub email_column: String,
    pub overwrite_policy: OverwritePolicy,
    /// Zero-based row index of the live score sheet's header row.
    #[serde(default = "default_live_header_row")]
    pub live_header_row: usize,
    #[serde(default = "default_live_id_column")]
    pub live_id_column: String,
    #[serde(default = "default_live_score_column")]
    pub live_score_column: String,
    /// Also strip `.0` from live sheet ids (not just roster-derived ids).
    #[serde(default)]
    pub strip_live_id_suffix: bool,
}

fn default_live_header_row() -> usize {
    1
}

fn default_live_id_column() -> String {
    "Student ID Number".into()
}

fn default_live_score_column() -> String {
    "Total".into()
}

pub const PROFILE_SIS: &str = "sis";
pub const PROFILE_EMAIL: &str = "email";

impl ReconConfig {
    /// Gradebook keyed by `SIS Login ID`; only zero placeholders are filled.
    pub fn sis() -> Self {
        Self {
            name: PROFILE_SIS.into(),
            email_column: "SIS Login ID".into(),
            overwrite_policy: OverwritePolicy::OverwriteIfZero,
            live_header_row: default_live_header_row(),
            live_id_column: default_live_id_column(),
            live_score_column: default_live_score_column(),
            strip_live_id_suffix: false,
        }
    }

    /// Gradebook keyed by `Email address`; every matched row is overwritten.
    pub fn email() -> Self {
        Self {
            name: PROFILE_EMAIL.into(),
            email_column: "Email address".into(),
            overwrite_policy: OverwritePolicy::OverwriteAlways,
            live_header_row: default_live_header_row(),
            live_id_column: default_live_id_column(),
            live_score_column: default_live_score_column(),
            strip_live_id_suffix: true,
        }
    }

    /// Built-in profile by name.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            PROFILE_SIS => Some(Self::sis()),
            PROFILE_EMAIL => Some(Self::email()),
            _ => None,
        }
    }

    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        let named = [
            ("email_column", &self.email_column),
            ("live_id_column", &self.live_id_column),
            ("live_score_column", &self.live_score_column),
        ];
        for (field, value) in named {
            if value.trim().is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "{field} must not be blank"
                )));
            }
        }

        if self.live_id_column.trim() == self.live_score_column.trim() {
            return Err(ReconError::ConfigValidation(format!(
                "live_id_column and live_score_column are both '{}'",
                self.live_id_column.trim()
            )));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
