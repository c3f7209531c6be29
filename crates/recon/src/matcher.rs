use std::collections::HashMap;

use crate::config::ReconConfig;
use crate::error::ReconError;
use crate::model::{RosterEntry, RowMatch, Table};
use crate::normalize::{normalize_email, normalize_student_id, parse_score};

pub const GRADE_BOOK: &str = "grade book";
pub const LIVE_SCORES: &str = "live scores";

/// Map normalized email -> student id. Later roster entries overwrite earlier ones.
pub fn build_email_to_id(roster: &[RosterEntry]) -> HashMap<String, String> {
    roster
        .iter()
        .map(|e| (normalize_email(&e.email), e.student_id.clone()))
        .collect()
}

/// Look up each grade-book row's student id through its email.
///
/// Unknown emails produce `student_id: None`. A roster id that normalizes to
/// nothing is treated the same way, so blank ids never join blank live rows.
pub fn derive_student_ids(
    grade_book: &Table,
    email_to_id: &HashMap<String, String>,
    email_column: &str,
) -> Result<Vec<RowMatch>, ReconError> {
    let email_idx = grade_book.require_column(GRADE_BOOK, email_column)?;

    Ok(grade_book
        .column_text(email_idx)
        .map(|raw| {
            let email = normalize_email(&raw);
            let student_id = email_to_id
                .get(&email)
                .map(|id| normalize_student_id(id))
                .filter(|id| !id.is_empty());
            RowMatch {
                email,
                student_id,
                new_score: None,
                overwritten: false,
            }
        })
        .collect())
}

/// Map live-sheet student id -> rounded score. Later rows overwrite earlier ones.
pub fn normalize_live_scores(
    live_scores: &Table,
    config: &ReconConfig,
) -> Result<HashMap<String, f64>, ReconError> {
    let id_idx = live_scores.require_column(LIVE_SCORES, &config.live_id_column)?;
    let score_idx = live_scores.require_column(LIVE_SCORES, &config.live_score_column)?;

    let mut scores = HashMap::with_capacity(live_scores.len());
    for (row_idx, row) in live_scores.rows().iter().enumerate() {
        let raw_id = row[id_idx].as_text();
        let id = if config.strip_live_id_suffix {
            normalize_student_id(&raw_id)
        } else {
            raw_id.trim().to_string()
        };
        if id.is_empty() {
            log::debug!("live scores row {row_idx}: blank student id, skipped");
            continue;
        }
        scores.insert(id, parse_score(&row[score_idx].as_text()));
    }
    Ok(scores)
}

/// Attach `new_score` to each row. Returns `(matched, not_found)`.
pub fn match_scores(rows: &mut [RowMatch], score_map: &HashMap<String, f64>) -> (usize, usize) {
    let mut matched = 0;
    for row in rows.iter_mut() {
        row.new_score = row
            .student_id
            .as_ref()
            .and_then(|id| score_map.get(id))
            .copied();
        if row.new_score.is_some() {
            matched += 1;
        }
    }
    (matched, rows.len() - matched)
}
