//! `scoresync-recon`: grade book / live score reconciliation engine.
//!
//! Pure engine crate: receives pre-loaded tables and the roster mapping,
//! returns the patched grade book plus a summary. No CLI or IO dependencies.

pub mod config;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod model;
pub mod normalize;

pub use config::{OverwritePolicy, ReconConfig};
pub use engine::reconcile;
pub use error::ReconError;
pub use model::{Cell, ReconResult, ReconSummary, RosterEntry, RowMatch, Table};
