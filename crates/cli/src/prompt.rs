//! Interactive prompts: target column choice and the write confirmation.
//!
//! Generic over `BufRead`/`Write` so tests can drive them with byte buffers.

use std::io::{BufRead, Write};

use crate::util::col_to_letter;
use crate::CliError;

const MAX_ATTEMPTS: usize = 3;

/// Print the numbered column list to `out`.
pub fn write_column_list<W: Write>(headers: &[String], out: &mut W) -> std::io::Result<()> {
    let digits = headers.len().saturating_sub(1).to_string().len();
    for (i, name) in headers.iter().enumerate() {
        writeln!(out, "  [{i:>digits$}] {:<3} {name}", col_to_letter(i))?;
    }
    Ok(())
}

/// Resolve an answer to a column: an index from the list or an exact
/// (trimmed) header name.
pub fn resolve_column(headers: &[String], answer: &str) -> Option<String> {
    let answer = answer.trim();
    if answer.is_empty() {
        return None;
    }
    if let Ok(idx) = answer.parse::<usize>() {
        if let Some(name) = headers.get(idx) {
            return Some(name.clone());
        }
    }
    headers.iter().find(|h| h.as_str() == answer).cloned()
}

/// Ask for the target column until a valid answer arrives.
pub fn choose_column<R: BufRead, W: Write>(
    headers: &[String],
    input: &mut R,
    out: &mut W,
) -> Result<String, CliError> {
    let io_err = |e: std::io::Error| CliError::io(format!("prompt: {e}"));

    writeln!(out, "Select the column to update:").map_err(io_err)?;
    write_column_list(headers, out).map_err(io_err)?;

    for _ in 0..MAX_ATTEMPTS {
        write!(out, "Column (number or name): ").map_err(io_err)?;
        out.flush().map_err(io_err)?;

        let mut line = String::new();
        if input.read_line(&mut line).map_err(io_err)? == 0 {
            break;
        }
        match resolve_column(headers, &line) {
            Some(name) => return Ok(name),
            None => writeln!(out, "  not a column: {}", line.trim()).map_err(io_err)?,
        }
    }

    Err(CliError::args("no target column selected")
        .with_hint("pass --target <COLUMN>; `scoresync columns <GRADEBOOK>` lists them"))
}

/// Yes/no question defaulting to no. End of input counts as no.
pub fn confirm<R: BufRead, W: Write>(
    question: &str,
    input: &mut R,
    out: &mut W,
) -> Result<bool, CliError> {
    let io_err = |e: std::io::Error| CliError::io(format!("prompt: {e}"));

    write!(out, "{question} [y/N] ").map_err(io_err)?;
    out.flush().map_err(io_err)?;

    let mut line = String::new();
    input.read_line(&mut line).map_err(io_err)?;
    let answer = line.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers() -> Vec<String> {
        ["Student", "SIS Login ID", "Final Exam (1234)"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn column_list_shows_index_and_letter() {
        let mut out = Vec::new();
        write_column_list(&headers(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "  [0] A   Student\n  [1] B   SIS Login ID\n  [2] C   Final Exam (1234)\n"
        );
    }

    #[test]
    fn resolve_by_index_or_name() {
        let h = headers();
        assert_eq!(resolve_column(&h, "2\n").as_deref(), Some("Final Exam (1234)"));
        assert_eq!(resolve_column(&h, " SIS Login ID ").as_deref(), Some("SIS Login ID"));
        assert_eq!(resolve_column(&h, "9"), None);
        assert_eq!(resolve_column(&h, "final exam (1234)"), None);
        assert_eq!(resolve_column(&h, ""), None);
    }

    #[test]
    fn choose_retries_after_bad_answer() {
        let mut input = "7\nFinal Exam (1234)\n".as_bytes();
        let mut out = Vec::new();
        let chosen = choose_column(&headers(), &mut input, &mut out).unwrap();
        assert_eq!(chosen, "Final Exam (1234)");
        assert!(String::from_utf8(out).unwrap().contains("not a column: 7"));
    }

    #[test]
    fn choose_gives_up_on_eof() {
        let mut input = "".as_bytes();
        let mut out = Vec::new();
        let err = choose_column(&headers(), &mut input, &mut out).unwrap_err();
        assert_eq!(err.code, crate::exit_codes::EXIT_USAGE);
    }

    #[test]
    fn confirm_defaults_to_no() {
        let mut out = Vec::new();
        assert!(confirm("Write?", &mut "y\n".as_bytes(), &mut out).unwrap());
        assert!(confirm("Write?", &mut "YES\n".as_bytes(), &mut out).unwrap());
        assert!(!confirm("Write?", &mut "\n".as_bytes(), &mut out).unwrap());
        assert!(!confirm("Write?", &mut "".as_bytes(), &mut out).unwrap());
        assert!(String::from_utf8(out).unwrap().starts_with("Write? [y/N] "));
    }
}
