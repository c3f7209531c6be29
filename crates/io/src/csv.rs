// CSV/TSV import/export

use std::io::Read;
use std::path::Path;

use scoresync_recon::{Cell, Table};

use crate::error::LoadError;
use crate::load::table_from_rows;

/// Import a delimited file, sniffing the delimiter. Row `header_row` becomes
/// the header; rows above it are discarded.
pub fn import(path: &Path, header_row: usize) -> Result<Table, LoadError> {
    let content = read_file_as_utf8(path)?;
    let delimiter = sniff_delimiter(&content);
    import_from_string(path, &content, delimiter, header_row)
}

pub fn import_tsv(path: &Path, header_row: usize) -> Result<Table, LoadError> {
    let content = read_file_as_utf8(path)?;
    import_from_string(path, &content, b'\t', header_row)
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
pub fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        // Must produce >1 field on the first line to be viable
        if counts.first().copied().unwrap_or(0) <= 1 {
            continue;
        }

        // Higher field count breaks ties: more columns means a more likely delimiter
        let target = counts[0];
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Read file and convert to UTF-8 if needed (handles Windows-1252, Latin-1, etc.)
pub fn read_file_as_utf8(path: &Path) -> Result<String, LoadError> {
    let io_err = |e: std::io::Error| LoadError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    let mut file = std::fs::File::open(path).map_err(io_err)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(io_err)?;

    // Excel "CSV UTF-8" exports start with a BOM
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        bytes.drain(..3);
    }

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let bytes = e.into_bytes();
            // Fall back to Windows-1252 (common for Excel-exported CSVs)
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

pub fn import_from_string(
    path: &Path,
    content: &str,
    delimiter: u8,
    header_row: usize,
) -> Result<Table, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| LoadError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        rows.push(record.iter().map(Cell::from_raw).collect());
    }

    table_from_rows(path, rows, header_row)
}

/// Render a table as comma-separated text: header line, then one line per row.
pub fn to_csv_bytes(table: &Table) -> Result<Vec<u8>, String> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());

    writer.write_record(table.headers()).map_err(|e| e.to_string())?;
    for row in table.rows() {
        writer
            .write_record(row.iter().map(|c| c.as_text().into_owned()))
            .map_err(|e| e.to_string())?;
    }

    writer.into_inner().map_err(|e| e.to_string())
}

pub fn export(table: &Table, path: &Path) -> Result<(), LoadError> {
    let bytes = to_csv_bytes(table).map_err(|message| LoadError::Parse {
        path: path.to_path_buf(),
        message,
    })?;
    std::fs::write(path, bytes).map_err(|e| LoadError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_sniff_semicolon_delimiter() {
        let content = "Name;Age;City\nAlice;30;Paris\nBob;25;London\n";
        assert_eq!(sniff_delimiter(content), b';');
    }

    #[test]
    fn test_sniff_comma_delimiter() {
        let content = "Name,Age,City\nAlice,30,Paris\nBob,25,London\n";
        assert_eq!(sniff_delimiter(content), b',');
    }

    #[test]
    fn test_sniff_tab_delimiter() {
        let content = "Name\tAge\tCity\nAlice\t30\tParis\nBob\t25\tLondon\n";
        assert_eq!(sniff_delimiter(content), b'\t');
    }

    #[test]
    fn test_sniff_semicolon_with_commas_in_values() {
        // Semicolon delimiter but commas appear inside quoted fields
        let content = "Name;Address;City\n\"Doe, Jane\";\"123 Main St, Apt 4\";Paris\nBob;\"456 Elm\";London\n";
        assert_eq!(sniff_delimiter(content), b';');
    }

    #[test]
    fn test_grade_book_header_first_row() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gradebook.csv");
        fs::write(&path, " Email address ,Exam\na@x.com,0.00\nb@x.com,\n").unwrap();

        let t = import(&path, 0).unwrap();
        assert_eq!(t.headers(), &["Email address", "Exam"]);
        assert_eq!(t.len(), 2);
        assert_eq!(t.cell(0, 1).as_text(), "0.00");
        assert_eq!(t.cell(1, 1), &Cell::Empty);
    }

    #[test]
    fn test_live_sheet_header_second_row() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("live.csv");
        fs::write(
            &path,
            "Live Scores - CSC 201,,\nStudent ID Number,Name,Total\n2023001,Ada,\"1,050\"\n",
        )
        .unwrap();

        let t = import(&path, 1).unwrap();
        assert_eq!(t.headers(), &["Student ID Number", "Name", "Total"]);
        assert_eq!(t.len(), 1);
        assert_eq!(t.cell(0, 2).as_text(), "1,050");
    }

    #[test]
    fn test_header_row_past_end() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.csv");
        fs::write(&path, "only,one\n").unwrap();

        let err = import(&path, 1).unwrap_err();
        assert!(matches!(err, LoadError::HeaderRowOutOfRange { rows: 1, .. }));
    }

    #[test]
    fn test_windows_1252_and_bom() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latin.csv");
        // "Name,Score\nJos\xe9,5\n" in Windows-1252
        fs::write(&path, b"Name,Score\nJos\xe9,5\n").unwrap();
        let t = import(&path, 0).unwrap();
        assert_eq!(t.cell(0, 0).as_text(), "Jos\u{e9}");

        let bom = dir.path().join("bom.csv");
        fs::write(&bom, b"\xEF\xBB\xBFEmail address,Exam\na@x.com,1\n").unwrap();
        let t = import(&bom, 0).unwrap();
        assert_eq!(t.headers()[0], "Email address");
    }

    #[test]
    fn test_export_quotes_and_keeps_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let table = Table::from_strings(
            &["Student", "Exam"],
            &[&["Lovelace, Ada", "10.00"], &["Hopper", ""]],
        );

        export(&table, &path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "Student,Exam\n\"Lovelace, Ada\",10.00\nHopper,\n");

        let back = import(&path, 0).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn test_tsv_import() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.tsv");
        fs::write(&path, "Name\tValue\nAlice\t42\n").unwrap();
        let t = import_tsv(&path, 0).unwrap();
        assert_eq!(t.headers(), &["Name", "Value"]);
        assert_eq!(t.cell(0, 1).as_text(), "42");
    }
}
