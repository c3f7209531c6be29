// Roster source credentials
//
// The bearer token for a private roster URL is looked up in:
// 1. System keychain (preferred)
// 2. Environment variable SCORESYNC_ROSTER_TOKEN (fallback for CI/headless)
//
// Tokens are NEVER stored in settings.toml

use std::env;

/// Service name for keychain storage
const KEYCHAIN_SERVICE: &str = "scoresync";

/// Keychain account holding the roster token
const KEYCHAIN_ACCOUNT: &str = "roster/token";

pub const TOKEN_ENV_VAR: &str = "SCORESYNC_ROSTER_TOKEN";

/// Source of a roster token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Keychain,
    Environment,
    None,
}

impl TokenSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenSource::Keychain => "keychain",
            TokenSource::Environment => "environment",
            TokenSource::None => "none",
        }
    }
}

/// Result of token lookup
#[derive(Debug, Clone)]
pub struct TokenLookup {
    pub token: Option<String>,
    pub source: TokenSource,
}

/// Resolve the roster token: keychain, then environment
pub fn get_roster_token() -> TokenLookup {
    #[cfg(feature = "keychain")]
    {
        if let Ok(entry) = keyring::Entry::new(KEYCHAIN_SERVICE, KEYCHAIN_ACCOUNT) {
            if let Ok(token) = entry.get_password() {
                return TokenLookup {
                    token: Some(token),
                    source: TokenSource::Keychain,
                };
            }
        }
    }

    token_from_env(env::var(TOKEN_ENV_VAR).ok())
}

fn token_from_env(value: Option<String>) -> TokenLookup {
    match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(token) => TokenLookup {
            token: Some(token),
            source: TokenSource::Environment,
        },
        None => TokenLookup {
            token: None,
            source: TokenSource::None,
        },
    }
}

/// Store the roster token in the system keychain
#[cfg(feature = "keychain")]
pub fn set_roster_token(token: &str) -> Result<(), String> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, KEYCHAIN_ACCOUNT)
        .map_err(|e| format!("Failed to create keychain entry: {}", e))?;

    entry
        .set_password(token)
        .map_err(|e| format!("Failed to store token in keychain: {}", e))
}

#[cfg(not(feature = "keychain"))]
pub fn set_roster_token(_token: &str) -> Result<(), String> {
    Err(format!(
        "Keychain support not enabled. Set {TOKEN_ENV_VAR} environment variable instead."
    ))
}

/// Delete the roster token from the system keychain
#[cfg(feature = "keychain")]
pub fn delete_roster_token() -> Result<(), String> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, KEYCHAIN_ACCOUNT)
        .map_err(|e| format!("Failed to access keychain entry: {}", e))?;

    entry
        .delete_credential()
        .map_err(|e| format!("Failed to delete token from keychain: {}", e))
}

#[cfg(not(feature = "keychain"))]
pub fn delete_roster_token() -> Result<(), String> {
    Err("Keychain support not enabled.".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_token_trimmed() {
        let lookup = token_from_env(Some("  abc123 \n".into()));
        assert_eq!(lookup.token.as_deref(), Some("abc123"));
        assert_eq!(lookup.source, TokenSource::Environment);
    }

    #[test]
    fn blank_env_token_is_none() {
        let lookup = token_from_env(Some("   ".into()));
        assert!(lookup.token.is_none());
        assert_eq!(lookup.source.as_str(), "none");
        assert_eq!(token_from_env(None).source, TokenSource::None);
    }
}
