// Primitives for reading CSV files.

use std::io::Read;

use csv::{Reader, ReaderBuilder};
use log::debug;
use snafu::prelude::*;

use survey_tally::{Cell, Record, RowSet};

use crate::dash::{
    io_common::{normalize_header, simplify_file_name},
    *,
};

pub fn read_csv_rows(path: &str) -> DashResult<RowSet> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    let rows = rows_from_reader(&mut rdr, path)?;
    debug!(
        "read_csv_rows: {}: {} rows, {} columns",
        simplify_file_name(path),
        rows.len(),
        rows.columns().len()
    );
    Ok(rows)
}

fn rows_from_reader<R: Read>(rdr: &mut Reader<R>, path: &str) -> DashResult<RowSet> {
    let header: Vec<String> = rdr
        .headers()
        .context(CsvOpenSnafu { path })?
        .iter()
        .map(normalize_header)
        .collect();
    ensure!(
        header.iter().any(|h| !h.is_empty()),
        EmptyInputSnafu { path }
    );

    let mut records: Vec<Record> = Vec::new();
    for (idx, line_r) in rdr.records().enumerate() {
        // The header is on the first line.
        let line = line_r.context(CsvLineParseSnafu { lineno: idx + 2 })?;
        let mut record = Record::new();
        for (column, value) in header.iter().zip(line.iter()) {
            if !column.is_empty() {
                record.insert(column, Cell::from_text(value));
            }
        }
        records.push(record);
    }
    let columns: Vec<String> = header.into_iter().filter(|h| !h.is_empty()).collect();
    Ok(RowSet::with_columns(columns, records))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_str(s: &str) -> DashResult<RowSet> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(s.as_bytes());
        rows_from_reader(&mut rdr, "test.csv")
    }

    #[test]
    fn header_and_rows() {
        let rows = read_str(" Igitsina ,Umudugudu,Notes\nGabo,Kabeza,\nGore,,  \nGore\n").unwrap();
        assert_eq!(
            rows.columns(),
            &[
                "Igitsina".to_string(),
                "Umudugudu".to_string(),
                "Notes".to_string()
            ]
        );
        assert_eq!(rows.len(), 3);
        let r = &rows.records()[0];
        assert_eq!(r.get("Igitsina"), &Cell::Text("Gabo".to_string()));
        assert_eq!(r.get("Notes"), &Cell::Empty);
        assert_eq!(rows.records()[1].get("Umudugudu"), &Cell::Empty);
        // Short rows are accepted, the missing cells are empty.
        assert_eq!(rows.records()[2].get("Umudugudu"), &Cell::Empty);
    }

    #[test]
    fn quoted_headers() {
        let rows = read_str("\"1.13 Niba ari yego, ni izihe mbogamizi?\"\n\"network battery\"\n").unwrap();
        assert!(rows.has_column("1.13 Niba ari yego, ni izihe mbogamizi?"));
        assert_eq!(
            rows.records()[0].get("1.13 Niba ari yego, ni izihe mbogamizi?"),
            &Cell::Text("network battery".to_string())
        );
    }

    #[test]
    fn empty_file() {
        assert!(matches!(read_str(""), Err(DashError::EmptyInput { .. })));
    }

    #[test]
    fn missing_file() {
        let e = read_csv_rows("/nonexistent/echis.csv").unwrap_err();
        assert_eq!(e.code(), "csv_open");
    }
}
