use crate::config::{OverwritePolicy, ReconConfig};
use crate::error::ReconError;
use crate::matcher::{
    build_email_to_id, derive_student_ids, match_scores, normalize_live_scores, GRADE_BOOK,
    LIVE_SCORES,
};
use crate::model::{Cell, ReconMeta, ReconResult, ReconSummary, RosterEntry, Table};
use crate::normalize::format_score;

/// Decide the replacement for one target cell. `None` leaves the cell alone.
pub fn decide_update(current: &Cell, new_score: Option<f64>, policy: OverwritePolicy) -> Option<Cell> {
    let score = new_score?;
    let write = match policy {
        OverwritePolicy::OverwriteAlways => true,
        OverwritePolicy::OverwriteIfZero => current.as_text().trim() == "0.00",
    };
    write.then(|| Cell::Text(format_score(score)))
}

/// Apply the policy to `table[row][target_col]`. Returns whether the cell was rewritten.
pub fn apply_update(
    table: &mut Table,
    row: usize,
    target_col: usize,
    new_score: Option<f64>,
    policy: OverwritePolicy,
) -> bool {
    match decide_update(table.cell(row, target_col), new_score, policy) {
        Some(cell) => {
            table.set_cell(row, target_col, cell);
            true
        }
        None => false,
    }
}

/// Run one reconciliation. Pure: no IO, inputs are never mutated.
///
/// Every required column is resolved before the first write, so a
/// `MissingColumn` error never leaves a half-updated table behind.
pub fn reconcile(
    roster: &[RosterEntry],
    grade_book: &Table,
    live_scores: &Table,
    config: &ReconConfig,
    target_column: &str,
) -> Result<ReconResult, ReconError> {
    config.validate()?;

    grade_book.require_column(GRADE_BOOK, &config.email_column)?;
    let target_col = grade_book.require_column(GRADE_BOOK, target_column)?;
    live_scores.require_column(LIVE_SCORES, &config.live_id_column)?;
    live_scores.require_column(LIVE_SCORES, &config.live_score_column)?;

    if roster.is_empty() {
        log::warn!("roster mapping is empty; no grade book row can be matched");
    }

    let email_to_id = build_email_to_id(roster);
    let mut matches = derive_student_ids(grade_book, &email_to_id, &config.email_column)?;
    let score_map = normalize_live_scores(live_scores, config)?;
    let (updated_count, not_found_count) = match_scores(&mut matches, &score_map);

    let mut updated = grade_book.clone();
    let mut overwritten_count = 0;
    for (row_idx, m) in matches.iter_mut().enumerate() {
        m.overwritten = apply_update(
            &mut updated,
            row_idx,
            target_col,
            m.new_score,
            config.overwrite_policy,
        );
        if m.overwritten {
            overwritten_count += 1;
        }
    }

    let matched_only = match config.overwrite_policy {
        OverwritePolicy::OverwriteAlways => {
            let idx: Vec<usize> = matches
                .iter()
                .enumerate()
                .filter(|(_, m)| m.new_score.is_some())
                .map(|(i, _)| i)
                .collect();
            Some(updated.select_rows(&idx))
        }
        OverwritePolicy::OverwriteIfZero => None,
    };

    let summary = ReconSummary {
        total_rows: grade_book.len(),
        updated_count,
        not_found_count,
        overwritten_count,
    };

    log::info!(
        "reconciled {} rows: {} matched, {} not found, {} overwritten ({})",
        summary.total_rows,
        summary.updated_count,
        summary.not_found_count,
        summary.overwritten_count,
        config.overwrite_policy,
    );

    Ok(ReconResult {
        meta: ReconMeta {
            profile: config.name.clone(),
            policy: config.overwrite_policy,
            target_column: updated.headers()[target_col].clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary,
        updated,
        matched_only,
        matches,
    })
}
