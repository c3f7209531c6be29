//! Plain-text previews for the terminal: tables, run summary, debug rows.

use scoresync_recon::normalize::format_score;
use scoresync_recon::{Cell, ReconResult, RowMatch, Table};

use crate::util::{display_width, pad_right};

/// Widest a preview column may get before its cells are cut with "..".
const MAX_COL_WIDTH: usize = 24;

pub fn greeting(hour: u32) -> &'static str {
    match hour {
        5..=11 => "Good morning",
        12..=16 => "Good afternoon",
        17..=20 => "Good evening",
        _ => "Hello",
    }
}

/// Render the first `limit` rows as an aligned text grid.
pub fn render_table(table: &Table, limit: usize) -> String {
    let shown = &table.rows()[..limit.min(table.len())];

    let widths: Vec<usize> = table
        .headers()
        .iter()
        .enumerate()
        .map(|(col, header)| {
            shown
                .iter()
                .map(|row| display_width(&row[col].as_text()))
                .chain(std::iter::once(display_width(header)))
                .max()
                .unwrap_or(0)
                .clamp(1, MAX_COL_WIDTH)
        })
        .collect();

    let line = |cells: Vec<String>| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(c, &w)| pad_right(c, w))
            .collect();
        padded.join("  ").trim_end().to_string()
    };

    let mut out = String::new();
    out.push_str(&line(table.headers().to_vec()));
    out.push('\n');
    out.push_str(&line(widths.iter().map(|&w| "-".repeat(w)).collect()));
    out.push('\n');
    for row in shown {
        out.push_str(&line(row.iter().map(|c| c.as_text().into_owned()).collect()));
        out.push('\n');
    }
    if table.len() > shown.len() {
        out.push_str(&format!("... {} more row(s)\n", table.len() - shown.len()));
    }
    out
}

pub fn render_summary(result: &ReconResult) -> String {
    let s = &result.summary;
    format!(
        "Summary ({} rows, profile {}, {})\n  \
         Total records updated:            {}\n  \
         Students without matching scores: {}\n  \
         Cells overwritten:                {}\n",
        s.total_rows,
        result.meta.profile,
        result.meta.policy,
        s.updated_count,
        s.not_found_count,
        s.overwritten_count,
    )
}

/// Join diagnostics: email, derived id and new score for the first rows.
pub fn render_debug_rows(matches: &[RowMatch], limit: usize) -> String {
    let rows = matches
        .iter()
        .take(limit)
        .map(|m| {
            vec![
                Cell::from_raw(&m.email),
                Cell::from_raw(m.student_id.as_deref().unwrap_or("")),
                Cell::from_raw(&m.new_score.map(format_score).unwrap_or_default()),
            ]
        })
        .collect();
    let table = Table::new(
        vec!["Email".into(), "Student ID Number".into(), "New Score".into()],
        rows,
    );
    render_table(&table, limit)
}
