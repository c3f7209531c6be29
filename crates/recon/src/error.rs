use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (blank column name, bad header row, etc.).
    ConfigValidation(String),
    /// Missing required column in one of the input tables.
    MissingColumn { table: String, column: String },
    /// An input table has no header row at all.
    EmptyTable { table: String },
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::MissingColumn { table, column } => {
                write!(f, "{table}: missing column '{column}'")
            }
            Self::EmptyTable { table } => write!(f, "{table}: table has no header row"),
        }
    }
}

impl std::error::Error for ReconError {}
