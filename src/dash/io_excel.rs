// Reading the worksheet of an Excel export.

use std::fs::File;
use std::io::BufReader;

use calamine::{open_workbook, DataType, Range, Reader, Xlsx};
use log::debug;
use snafu::prelude::*;

use survey_tally::{Cell, Record, RowSet};

use crate::dash::{
    io_common::{excel_serial_to_text, normalize_header, simplify_file_name},
    *,
};

/// Reads a worksheet with the header in the first row.
///
/// When no worksheet name is given, the workbook must have exactly one worksheet.
pub fn read_excel_rows(path: &str, worksheet: Option<&str>) -> DashResult<RowSet> {
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    let wrange = get_range(&mut workbook, path, worksheet)?;

    let mut iter = wrange.rows();
    let header: Vec<String> = match iter.next() {
        Some(h) => h.iter().map(read_header).collect(),
        None => return EmptyInputSnafu { path }.fail(),
    };
    debug!("read_excel_rows: header: {:?}", header);
    ensure!(
        header.iter().any(|h| !h.is_empty()),
        EmptyInputSnafu { path }
    );

    let mut records: Vec<Record> = Vec::new();
    for row in iter {
        let mut record = Record::new();
        for (column, cell) in header.iter().zip(row.iter()) {
            if !column.is_empty() {
                record.insert(column, read_cell(cell));
            }
        }
        records.push(record);
    }
    debug!(
        "read_excel_rows: {}: {} rows",
        simplify_file_name(path),
        records.len()
    );
    let columns: Vec<String> = header.into_iter().filter(|h| !h.is_empty()).collect();
    Ok(RowSet::with_columns(columns, records))
}

fn get_range(
    workbook: &mut Xlsx<BufReader<File>>,
    path: &str,
    worksheet: Option<&str>,
) -> DashResult<Range<DataType>> {
    match worksheet {
        Some(name) => workbook
            .worksheet_range(name)
            .context(MissingWorksheetSnafu {
                path,
                worksheet: name,
            })?
            .context(OpeningExcelSnafu { path }),
        None => {
            let count = workbook.sheet_names().len();
            ensure!(count > 0, EmptyInputSnafu { path });
            ensure!(count == 1, AmbiguousWorksheetSnafu { path, count });
            workbook
                .worksheet_range_at(0)
                .context(EmptyInputSnafu { path })?
                .context(OpeningExcelSnafu { path })
        }
    }
}

fn read_header(cell: &DataType) -> String {
    match read_cell(cell).label() {
        Some(s) => normalize_header(&s),
        None => "".to_string(),
    }
}

fn read_cell(cell: &DataType) -> Cell {
    match cell {
        DataType::String(s) => Cell::from_text(s),
        DataType::Float(f) => Cell::Number(*f),
        DataType::Int(i) => Cell::Number(*i as f64),
        DataType::Bool(b) => Cell::Text(b.to_string()),
        DataType::DateTime(f) => match excel_serial_to_text(*f) {
            Some(s) => Cell::Text(s),
            None => Cell::Number(*f),
        },
        _ => Cell::Empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells() {
        assert_eq!(
            read_cell(&DataType::String("Yego".to_string())),
            Cell::Text("Yego".to_string())
        );
        assert_eq!(read_cell(&DataType::String(" ".to_string())), Cell::Empty);
        assert_eq!(read_cell(&DataType::Int(4)), Cell::Number(4.0));
        assert_eq!(
            read_cell(&DataType::DateTime(45352.25)),
            Cell::Text("2024-03-01T06:00:00".to_string())
        );
        assert_eq!(read_cell(&DataType::Empty), Cell::Empty);
    }

    #[test]
    fn headers() {
        assert_eq!(
            read_header(&DataType::String(" Umudugudu ".to_string())),
            "Umudugudu"
        );
        assert_eq!(read_header(&DataType::Float(2.0)), "2");
        assert_eq!(read_header(&DataType::Empty), "");
    }

    #[test]
    fn missing_file() {
        let e = read_excel_rows("/nonexistent/echis.xlsx", Some("CHW eCHIS")).unwrap_err();
        assert_eq!(e.code(), "excel_open");
    }
}
