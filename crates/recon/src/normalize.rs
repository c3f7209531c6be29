//! Key and value normalization shared by the roster, grade book and live sheet.

/// Lowercase + trim. Missing emails arrive here as `""` and stay that way.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Trim, then drop every literal `".0"` substring.
///
/// This is a textual replace-all, not a numeric parse: `"12345.0"` becomes
/// `"12345"`, and `"10.05"` becomes `"105"`. Exported grade books were
/// produced against this exact behavior, so it is kept as-is.
pub fn normalize_student_id(raw: &str) -> String {
    raw.trim().replace(".0", "")
}

/// Parse a live-sheet score: strip thousands separators and whitespace,
/// parse as a float, fall back to 0 on anything unparseable or non-finite,
/// then round to two decimals.
pub fn parse_score(raw: &str) -> f64 {
    let cleaned = raw.replace(',', "");
    let value = cleaned
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0);
    round2(value)
}

/// Round to two decimals, ties to even on the scaled value, so `10.125`
/// becomes `10.12` and `72.375` becomes `72.38`. Never returns `-0.0`.
pub fn round2(value: f64) -> f64 {
    let r = (value * 100.0).round_ties_even() / 100.0;
    if r == 0.0 {
        0.0
    } else {
        r
    }
}

/// Fixed two-decimal rendering written into the target column.
pub fn format_score(value: f64) -> String {
    format!("{value:.2}")
}
