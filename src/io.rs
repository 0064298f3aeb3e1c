//! # Return Table Reader
//!
//! $$
//! \texttt{date},a_1,\dots,a_A \;\mapsto\; R\in\mathbb R^{N\times A}
//! $$
//!
//! Comma-separated return tables with an ISO date column. Fields are trimmed
//! and may be quoted. Empty cells are read as zero returns.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;
use ndarray::Array2;

use crate::error::ComovementError;
use crate::error::Result;
use crate::series::ReturnSeries;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn read_return_file(path: &Path) -> Result<ReturnSeries> {
  let file = File::open(path)?;
  read_return_table(file)
}

pub fn read_return_table<R: Read>(reader: R) -> Result<ReturnSeries> {
  let mut reader = csv::ReaderBuilder::new()
    .flexible(true)
    .trim(csv::Trim::All)
    .from_reader(reader);

  let header = reader.headers().map_err(csv_error)?.clone();
  if header.is_empty() {
    return Err(ComovementError::Parse {
      line: 1,
      message: "missing header".to_string(),
    });
  }
  let assets: Vec<String> = header.iter().skip(1).map(str::to_string).collect();

  let mut dates = Vec::new();
  let mut flat = Vec::new();
  let mut record = StringRecord::new();
  while reader.read_record(&mut record).map_err(csv_error)? {
    let line = record_line(&record);
    let (date, row) = parse_row(&record, line)?;

    if row.len() != assets.len() {
      return Err(ComovementError::Parse {
        line,
        message: format!("expected {} values, found {}", assets.len(), row.len()),
      });
    }

    dates.push(date);
    flat.extend(row);
  }

  let values = Array2::from_shape_vec((dates.len(), assets.len()), flat)
    .map_err(|e| ComovementError::InvalidSeries(e.to_string()))?;
  ReturnSeries::new(dates, assets, values)
}

fn parse_row(record: &StringRecord, line: usize) -> Result<(NaiveDate, Vec<f64>)> {
  let cell = record.get(0).unwrap_or_default();
  let date = NaiveDate::parse_from_str(cell, DATE_FORMAT).map_err(|e| ComovementError::Parse {
    line,
    message: format!("invalid date {cell:?}: {e}"),
  })?;

  let row = record
    .iter()
    .skip(1)
    .map(|cell| {
      if cell.is_empty() {
        Ok(0.0)
      } else {
        cell.parse::<f64>().map_err(|e| ComovementError::Parse {
          line,
          message: format!("invalid value {cell:?}: {e}"),
        })
      }
    })
    .collect::<Result<_>>()?;

  Ok((date, row))
}

fn record_line(record: &StringRecord) -> usize {
  record.position().map_or(0, |p| p.line() as usize)
}

fn csv_error(e: csv::Error) -> ComovementError {
  let line = e.position().map_or(0, |p| p.line() as usize);
  let message = e.to_string();
  match e.into_kind() {
    csv::ErrorKind::Io(e) => ComovementError::Io(e),
    _ => ComovementError::Parse { line, message },
  }
}

#[cfg(test)]
mod tests {
  use std::io::Cursor;
  use std::io::Write;

  use super::*;

  const TABLE: &str = "date,XLE,XLF,SPX\n\
    2007-01-02,0.01,-0.02,0.005\n\
    2007-01-03,,0.01,\n\
    \n\
    2007-01-04,0.03, 0.00 ,-0.01\n";

  #[test]
  fn reads_table_and_zero_fills_blanks() {
    let s = read_return_table(Cursor::new(TABLE)).unwrap();
    assert_eq!(s.assets(), ["XLE", "XLF", "SPX"]);
    assert_eq!(s.len(), 3);
    assert_eq!(s.column("XLE").unwrap().to_vec(), vec![0.01, 0.0, 0.03]);
    assert_eq!(s.column("SPX").unwrap().to_vec(), vec![0.005, 0.0, -0.01]);
  }

  #[test]
  fn reads_quoted_header_and_cells() {
    let table = "date,\"Energy, Select\",SPX\n\
      2007-01-02,\"0.01\",0.02\n\
      \"2007-01-03\",\"\",\" -0.03 \"\n";
    let s = read_return_table(Cursor::new(table)).unwrap();

    assert_eq!(s.assets(), ["Energy, Select", "SPX"]);
    assert_eq!(s.column("Energy, Select").unwrap().to_vec(), vec![0.01, 0.0]);
    assert_eq!(s.column("SPX").unwrap().to_vec(), vec![0.02, -0.03]);
  }

  #[test]
  fn reports_line_of_bad_cell() {
    let err = read_return_table(Cursor::new("date,A\n2007-01-02,0.1\n2007-01-03,abc\n")).unwrap_err();
    match err {
      ComovementError::Parse { line, message } => {
        assert_eq!(line, 3);
        assert!(message.contains("abc"));
      }
      other => panic!("unexpected error {other}"),
    }
  }

  #[test]
  fn rejects_ragged_rows_and_bad_dates() {
    assert!(matches!(
      read_return_table(Cursor::new("date,A,B\n2007-01-02,0.1\n")).unwrap_err(),
      ComovementError::Parse { line: 2, .. }
    ));
    assert!(read_return_table(Cursor::new("date,A\n02/01/2007,0.1\n")).is_err());
    assert!(read_return_table(Cursor::new("")).is_err());
  }

  #[test]
  fn reads_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(TABLE.as_bytes()).unwrap();
    let s = read_return_file(file.path()).unwrap();
    assert_eq!(s.n_assets(), 3);
  }
}
