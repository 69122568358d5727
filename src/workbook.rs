use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::table::{Table, Value};

/// A collection of custom errors relating to reading and writing workbooks.
#[derive(Error, Debug)]
pub enum WorkbookError {
    /// Indicates that the source workbook could not be opened or read
    #[error("failed to read workbook {path}")]
    Open {
        path: PathBuf,
        source: calamine::Error,
    },

    /// Indicates that the named sheet is not part of the workbook
    #[error("sheet '{sheet}' not found in workbook {path}")]
    MissingSheet { sheet: String, path: PathBuf },

    /// Indicates that the output workbook could not be written
    #[error("failed to write workbook {path}")]
    Write { path: PathBuf, source: XlsxError },
}

/// Read a single sheet into a table
///
/// The first row of the used range is the header row,
/// header text is kept verbatim. Empty cells become nulls
/// and rows without any value are skipped.
///
/// # Errors
///
/// `WorkbookError::Open` if the file cannot be opened or parsed
/// and `WorkbookError::MissingSheet` if the sheet does not exist
pub fn read_sheet(path: &Path, sheet: &str) -> Result<Table, WorkbookError> {
    let open_err = |source| WorkbookError::Open {
        path: path.to_path_buf(),
        source,
    };

    let mut workbook = open_workbook_auto(path).map_err(open_err)?;
    if !workbook.sheet_names().iter().any(|name| name == sheet) {
        return Err(WorkbookError::MissingSheet {
            sheet: sheet.to_string(),
            path: path.to_path_buf(),
        });
    }
    let range = workbook.worksheet_range(sheet).map_err(open_err)?;

    let mut rows = range.rows();
    let header: Vec<String> = match rows.next() {
        Some(cells) => cells.iter().map(|c| c.to_string()).collect(),
        None => vec![],
    };

    let mut table = Table::new(header);
    for cells in rows {
        let row: Vec<Value> = cells.iter().map(cell_value).collect();
        if row.iter().all(Value::is_null) {
            continue;
        }
        table.push_row(row);
    }
    Ok(table)
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::String(s) if s.trim().is_empty() => Value::Null,
        Data::String(s) => Value::Str(s.clone()),
        Data::Int(i) => Value::Int(*i),
        Data::Float(f) => Value::Float(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => Value::Date(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::Str(s.clone()),
    }
}

/// Write tables as named sheets of a new workbook
///
/// Each sheet gets a bold header row followed by one row
/// per table row, without a row-number column. Nulls are
/// left as empty cells. The workbook is assembled in memory
/// and the output file is replaced in a single save.
///
/// # Errors
///
/// `WorkbookError::Write` if a sheet cannot be built or the file
/// cannot be created
pub fn write_sheets(path: &Path, sheets: &[(&str, &Table)]) -> Result<(), WorkbookError> {
    let write_err = |source| WorkbookError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut workbook = Workbook::new();
    for (name, table) in sheets {
        let worksheet = build_worksheet(name, table).map_err(write_err)?;
        workbook.push_worksheet(worksheet);
    }
    workbook.save(path).map_err(write_err)?;
    Ok(())
}

fn build_worksheet(name: &str, table: &Table) -> Result<Worksheet, XlsxError> {
    let header = Format::new().set_bold();
    let date = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");

    let mut worksheet = Worksheet::new();
    worksheet.set_name(name)?;

    for (col, column) in table.columns().iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, column, &header)?;
    }
    for (r, row) in table.rows().iter().enumerate() {
        let r = r as u32 + 1;
        for (c, value) in row.iter().enumerate() {
            let c = c as u16;
            match value {
                Value::Null => {}
                Value::Str(s) => {
                    worksheet.write_string(r, c, s)?;
                }
                Value::Int(i) => {
                    worksheet.write_number(r, c, *i as f64)?;
                }
                // NaN and infinities have no cell representation
                Value::Float(f) if !f.is_finite() => {}
                Value::Float(f) => {
                    worksheet.write_number(r, c, *f)?;
                }
                Value::Bool(b) => {
                    worksheet.write_boolean(r, c, *b)?;
                }
                Value::Date(d) => {
                    worksheet.write_number_with_format(r, c, *d, &date)?;
                }
            }
        }
    }
    Ok(worksheet)
}
