//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 3-9     | update           | Input tables, reconciliation, output     |
//! | 50-59   | roster           | Roster source fetch and cache            |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unknown profile, no target column chosen.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Update (3-9)
// =============================================================================

/// Input file could not be read, or an output file could not be written.
pub const EXIT_IO: u8 = 3;

/// Input file was read but could not be parsed (bad CSV, unsupported format,
/// header row past the end of the file).
pub const EXIT_PARSE: u8 = 4;

/// A required column is missing from the grade book, live sheet or roster.
pub const EXIT_MISSING_COLUMN: u8 = 5;

/// Operator declined the confirmation prompt; nothing was written.
pub const EXIT_DECLINED: u8 = 6;

/// Settings file is unreadable or invalid.
pub const EXIT_CONFIG: u8 = 7;

// =============================================================================
// Roster (50-59)
// =============================================================================

/// Roster source unreachable (network error, timeout, non-2xx status) or
/// no roster source configured.
pub const EXIT_ROSTER_UNAVAILABLE: u8 = 50;

/// Roster source rejected credentials (401/403).
pub const EXIT_ROSTER_AUTH: u8 = 51;

/// Roster body could not be parsed as CSV or JSON records.
pub const EXIT_ROSTER_MALFORMED: u8 = 52;
