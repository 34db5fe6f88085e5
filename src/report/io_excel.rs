// Decoding of xlsx workbooks into the cell model of county_counts.

use calamine::{DataType, Range, Reader, Xlsx};
use chrono::{NaiveDate, NaiveDateTime};
use std::io::{Cursor, Read, Seek};

use crate::report::*;

/// Decodes a workbook held in memory. `path` is only used in messages.
pub fn read_workbook_bytes(bytes: Vec<u8>, path: &str) -> ReportResult<Workbook> {
    let mut workbook: Xlsx<_> =
        Xlsx::new(Cursor::new(bytes)).context(OpeningExcelSnafu { path })?;
    read_sheets(&mut workbook, path)
}

fn read_sheets<RS: Read + Seek>(workbook: &mut Xlsx<RS>, path: &str) -> ReportResult<Workbook> {
    let names: Vec<String> = workbook.sheet_names().to_vec();
    debug!("read_sheets: {:?} has sheets {:?}", path, names);
    let mut sheets: Vec<Sheet> = Vec::new();
    for name in names {
        let wrange = workbook
            .worksheet_range(&name)
            .context(MissingSheetSnafu {
                name: name.clone(),
                path,
            })?
            .context(OpeningExcelSnafu { path })?;
        sheets.push(range_to_sheet(&name, &wrange));
    }
    Ok(Workbook::new(sheets))
}

/// Converts a calamine range into a sheet addressed from A1.
///
/// calamine starts a range at its first used cell; the rows and columns
/// before it are restored as blanks so that cell addresses stay the ones
/// displayed by spreadsheet software.
pub fn range_to_sheet(name: &str, wrange: &Range<DataType>) -> Sheet {
    let (first_row, first_col) = wrange.start().unwrap_or((0, 0));
    let mut rows: Vec<Vec<Cell>> = vec![vec![]; first_row as usize];
    for row in wrange.rows() {
        let mut cells: Vec<Cell> = vec![Cell::Blank; first_col as usize];
        cells.extend(row.iter().map(convert_cell));
        rows.push(cells);
    }
    Sheet::new(name, rows)
}

#[allow(unreachable_patterns)]
pub fn convert_cell(cell: &DataType) -> Cell {
    match cell {
        DataType::Int(i) => Cell::Int(*i),
        DataType::Float(f) => Cell::Float(*f),
        DataType::String(s) => Cell::Text(s.clone()),
        DataType::Bool(b) => Cell::Bool(*b),
        DataType::DateTime(serial) => match excel_serial_to_datetime(*serial) {
            Some(dt) => Cell::DateTime(dt),
            None => Cell::Float(*serial),
        },
        DataType::Error(e) => Cell::Error(format!("{:?}", e)),
        DataType::Empty => Cell::Blank,
        _ => Cell::Error(format!("{:?}", cell)),
    }
}

/// Excel stores dates as a number of days since 1899-12-30 (the 1900 leap
/// year bug shifts the epoch by one day).
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    let ms = (serial * 86_400_000.0).round();
    if !ms.is_finite() || ms < 0.0 {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?
        .and_hms_opt(0, 0, 0)?
        .checked_add_signed(chrono::Duration::milliseconds(ms as i64))
}
