use std::path::Path;

use scoresync_recon::{Cell, Table};

use crate::error::LoadError;

/// Fallback stem for output files when the grade book path has none.
pub const DEFAULT_BASE_NAME: &str = "Updated_GradeBook";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Tsv,
    Excel,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" | "txt" => Some(Self::Csv),
            "tsv" | "tab" => Some(Self::Tsv),
            "xlsx" | "xlsm" | "xls" => Some(Self::Excel),
            _ => None,
        }
    }
}

/// Load a grade book or live score sheet, dispatching on the file extension.
pub fn load_table(path: &Path, header_row: usize) -> Result<Table, LoadError> {
    let format = TableFormat::from_path(path).ok_or_else(|| LoadError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;
    log::debug!("loading {} as {:?} (header row {header_row})", path.display(), format);
    let table = match format {
        TableFormat::Csv => crate::csv::import(path, header_row)?,
        TableFormat::Tsv => crate::csv::import_tsv(path, header_row)?,
        TableFormat::Excel => crate::xlsx::import(path, header_row)?,
    };
    log::info!(
        "loaded {}: {} column(s), {} row(s)",
        path.display(),
        table.headers().len(),
        table.len()
    );
    Ok(table)
}

/// Output file stem: the grade book's file name without its extension.
pub fn output_base_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_BASE_NAME)
        .to_string()
}

/// Turn raw rows into a table. Row `header_row` supplies the column names,
/// rows above it are dropped, and records with no fields at all are skipped.
/// Rows made only of empty cells (`,,,`) are kept so the written grade book
/// has the same row count as the export it came from.
pub(crate) fn table_from_rows(
    path: &Path,
    mut rows: Vec<Vec<Cell>>,
    header_row: usize,
) -> Result<Table, LoadError> {
    if header_row >= rows.len() {
        return Err(LoadError::HeaderRowOutOfRange {
            path: path.to_path_buf(),
            header_row,
            rows: rows.len(),
        });
    }

    let data = rows.split_off(header_row + 1);
    let headers: Vec<String> = rows
        .pop()
        .unwrap_or_default()
        .iter()
        .map(|c| c.as_text().into_owned())
        .collect();

    let data: Vec<Vec<Cell>> = data
        .into_iter()
        .filter(|r| !r.is_empty())
        .collect();

    Ok(Table::new(headers, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn format_from_extension() {
        assert_eq!(TableFormat::from_path(Path::new("a.CSV")), Some(TableFormat::Csv));
        assert_eq!(TableFormat::from_path(Path::new("a.tsv")), Some(TableFormat::Tsv));
        assert_eq!(TableFormat::from_path(Path::new("a.xlsx")), Some(TableFormat::Excel));
        assert_eq!(TableFormat::from_path(Path::new("a.xls")), Some(TableFormat::Excel));
        assert_eq!(TableFormat::from_path(Path::new("a.pdf")), None);
        assert_eq!(TableFormat::from_path(Path::new("noext")), None);
    }

    #[test]
    fn unsupported_extension_is_an_error() {
        let err = load_table(Path::new("scores.ods"), 0).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedFormat { .. }));
        assert!(err.to_string().contains("unsupported file format"));
    }

    #[test]
    fn base_name_from_stem() {
        assert_eq!(output_base_name(Path::new("/tmp/CSC201 Grades.csv")), "CSC201 Grades");
        assert_eq!(output_base_name(Path::new("book.tar.xlsx")), "book.tar");
        assert_eq!(output_base_name(Path::new("/")), DEFAULT_BASE_NAME);
    }

    #[test]
    fn rows_above_header_dropped_and_fieldless_records_skipped() {
        let raw = |v: &[&str]| v.iter().map(|s| Cell::from_raw(s)).collect::<Vec<_>>();
        let rows = vec![raw(&["title", ""]), raw(&["id", "total"]), Vec::new(), raw(&["S1", "5"])];
        let t = table_from_rows(&PathBuf::from("x.csv"), rows, 1).unwrap();
        assert_eq!(t.headers(), &["id", "total"]);
        assert_eq!(t.len(), 1);
        assert_eq!(t.cell(0, 0).as_text(), "S1");
    }

    #[test]
    fn rows_of_empty_cells_are_kept() {
        let raw = |v: &[&str]| v.iter().map(|s| Cell::from_raw(s)).collect::<Vec<_>>();
        let rows = vec![raw(&["id", "total"]), raw(&["S1", "5"]), raw(&["", ""]), raw(&["S2", "0.00"])];
        let t = table_from_rows(&PathBuf::from("x.csv"), rows, 0).unwrap();
        assert_eq!(t.len(), 3);
        assert!(t.cell(1, 0).is_empty());
        assert_eq!(t.cell(2, 0).as_text(), "S2");
    }

    #[test]
    fn csv_blank_cell_rows_survive_import() {
        let content = "email,Final\na@x.com,0.00\n,\nb@x.com,0.00\n\nc@x.com,0.00\n";
        let t = crate::csv::import_from_string(Path::new("g.csv"), content, b',', 0).unwrap();
        // `,` is a row of two empty fields; the bare blank line is not a record.
        assert_eq!(t.len(), 4);
        assert!(t.cell(1, 0).is_empty());
        assert_eq!(t.cell(3, 0).as_text(), "c@x.com");
    }
}
