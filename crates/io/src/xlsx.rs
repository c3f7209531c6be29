// Excel import (xlsx, xlsm, xls) via calamine; xlsx export via rust_xlsxwriter

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::{Format, Workbook};
use scoresync_recon::{Cell, Table};

use crate::error::LoadError;
use crate::load::table_from_rows;

/// Maximum rows read from a sheet (grade books are a few thousand rows at most)
const MAX_ROWS: usize = 65536;

/// Import the first worksheet. Row `header_row` (counted from the top of the
/// sheet, not from the first used cell) becomes the header.
pub fn import(path: &Path, header_row: usize) -> Result<Table, LoadError> {
    let parse_err = |message: String| LoadError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let mut workbook = open_workbook_auto(path)
        .map_err(|e| parse_err(format!("failed to open Excel file: {e}")))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| parse_err("Excel file contains no sheets".into()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| parse_err(format!("failed to read sheet '{sheet_name}': {e}")))?;

    // Range start offset (data may not begin at A1)
    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); start_row as usize];

    for row in range.rows() {
        if rows.len() >= MAX_ROWS {
            log::warn!("{}: sheet truncated at {MAX_ROWS} rows", path.display());
            break;
        }
        let mut cells = vec![Cell::Empty; start_col as usize];
        cells.extend(row.iter().map(data_to_cell));
        rows.push(cells);
    }

    table_from_rows(path, rows, header_row)
}

fn data_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) if s.is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(n) => Cell::Number(*n),
        Data::Int(n) => Cell::Number(*n as f64),
        Data::Bool(b) => Cell::Text(if *b { "TRUE" } else { "FALSE" }.into()),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::Error(e) => Cell::Text(format!("#{e:?}")),
        other => Cell::Text(other.to_string()),
    }
}

/// Write the table to a single-sheet xlsx workbook with a bold header row.
/// Text cells stay text so two-decimal scores keep their formatting.
pub fn export(table: &Table, path: &Path) -> Result<(), LoadError> {
    let write_err = |e: rust_xlsxwriter::XlsxError| LoadError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();

    for (col, header) in table.headers().iter().enumerate() {
        sheet
            .write_string_with_format(0, col as u16, header, &bold)
            .map_err(write_err)?;
    }

    for (row_idx, row) in table.rows().iter().enumerate() {
        let r = (row_idx + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            match cell {
                Cell::Empty => {}
                Cell::Text(s) => {
                    sheet.write_string(r, col as u16, s).map_err(write_err)?;
                }
                Cell::Number(n) => {
                    sheet.write_number(r, col as u16, *n).map_err(write_err)?;
                }
            }
        }
    }

    workbook.save(path).map_err(write_err)
}
