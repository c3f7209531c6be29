use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum LoadError {
    /// File could not be read or written.
    Io { path: PathBuf, message: String },
    /// File was read but its contents could not be parsed.
    Parse { path: PathBuf, message: String },
    /// Extension is not one of csv / tsv / xlsx / xls.
    UnsupportedFormat { path: PathBuf },
    /// The requested header row lies past the end of the data.
    HeaderRowOutOfRange { path: PathBuf, header_row: usize, rows: usize },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, message } => write!(f, "{}: {message}", path.display()),
            Self::Parse { path, message } => {
                write!(f, "{}: cannot parse: {message}", path.display())
            }
            Self::UnsupportedFormat { path } => write!(
                f,
                "{}: unsupported file format (expected .csv, .tsv, .xlsx or .xls)",
                path.display()
            ),
            Self::HeaderRowOutOfRange { path, header_row, rows } => write!(
                f,
                "{}: header row {} requested but the file has only {rows} row(s)",
                path.display(),
                header_row + 1
            ),
        }
    }
}

impl std::error::Error for LoadError {}
