// Table I/O: load grade books and live score sheets, write the patched grade book

pub mod csv;
pub mod error;
pub mod load;
pub mod xlsx;

pub use error::LoadError;
pub use load::{load_table, output_base_name, TableFormat};
