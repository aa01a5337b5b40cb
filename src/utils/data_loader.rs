//! Data loading utilities
//!
//! Reads transaction tables from spreadsheets (via calamine) and delimited
//! text (via polars) into a `DataFrame`. Both file paths and in-memory upload
//! bodies go through the same format dispatch.

use crate::error::{DetectError, Result};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use polars::prelude::*;
use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Supported input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// Excel / OpenDocument workbook, first worksheet is read
    Spreadsheet,
    /// Comma separated values
    Csv,
    /// Tab separated values
    Tsv,
}

impl FileFormat {
    /// Detect the format from a file name's extension
    pub fn from_file_name(file_name: &str) -> Result<Self> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(FileFormat::Spreadsheet),
            "csv" => Ok(FileFormat::Csv),
            "tsv" => Ok(FileFormat::Tsv),
            _ => Err(DetectError::UnsupportedFormat(format!(
                "'{}' (expected .xlsx, .xls, .ods, .csv or .tsv)",
                file_name
            ))),
        }
    }
}

/// Inferred storage type of a spreadsheet column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Int,
    Float,
    Text,
}

/// Data loader for transaction tables
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Rows used by the CSV reader for schema inference
    infer_schema_length: usize,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self {
            infer_schema_length: 1000,
        }
    }

    /// Load a table from disk, choosing the reader from the extension
    pub fn load_path(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let start = Instant::now();
        let bytes = std::fs::read(path)
            .map_err(|e| DetectError::ReadError(format!("{}: {}", path.display(), e)))?;

        let file_name = path.to_string_lossy();
        let df = self.load_bytes(&file_name, &bytes)?;

        info!(
            path = %path.display(),
            rows = df.height(),
            columns = df.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded table from disk"
        );
        Ok(df)
    }

    /// Load a table from an in-memory buffer (e.g. an uploaded file)
    pub fn load_bytes(&self, file_name: &str, bytes: &[u8]) -> Result<DataFrame> {
        if bytes.is_empty() {
            return Err(DetectError::ReadError(format!("'{}' is empty", file_name)));
        }

        let format = FileFormat::from_file_name(file_name)?;
        debug!(file_name, ?format, size = bytes.len(), "Parsing table");

        match format {
            FileFormat::Spreadsheet => self.read_spreadsheet(bytes),
            FileFormat::Csv => self.read_delimited(bytes, b','),
            FileFormat::Tsv => self.read_delimited(bytes, b'\t'),
        }
    }

    fn read_delimited(&self, bytes: &[u8], separator: u8) -> Result<DataFrame> {
        let parse_opts = CsvParseOptions::default().with_separator(separator);

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(Cursor::new(bytes.to_vec()))
            .finish()
            .map_err(|e| DetectError::ReadError(e.to_string()))
    }

    fn read_spreadsheet(&self, bytes: &[u8]) -> Result<DataFrame> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

        let sheet = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| DetectError::ReadError("workbook has no worksheets".to_string()))?;
        let range = workbook.worksheet_range(&sheet)?;

        let mut rows = range.rows();
        let header = rows
            .next()
            .ok_or_else(|| DetectError::ReadError(format!("worksheet '{}' is empty", sheet)))?;
        let names = header_names(header)?;
        let body: Vec<&[Data]> = rows.collect();

        let columns = names
            .iter()
            .enumerate()
            .map(|(idx, name)| build_column(name, idx, &body))
            .collect::<Vec<Column>>();

        DataFrame::new(columns).map_err(|e| DetectError::ReadError(e.to_string()))
    }
}

/// Turn the header row into unique column names
fn header_names(header: &[Data]) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut names = Vec::with_capacity(header.len());

    for (idx, cell) in header.iter().enumerate() {
        let name = match cell {
            Data::Empty => format!("Unnamed: {}", idx),
            Data::String(s) => s.trim().to_string(),
            other => other.to_string(),
        };
        if !seen.insert(name.clone()) {
            return Err(DetectError::ReadError(format!(
                "duplicate column name '{}' in header",
                name
            )));
        }
        names.push(name);
    }

    if names.is_empty() {
        return Err(DetectError::ReadError("header row has no columns".to_string()));
    }
    Ok(names)
}

fn infer_kind(body: &[&[Data]], idx: usize) -> CellKind {
    let mut kind = CellKind::Int;
    for row in body {
        match row.get(idx) {
            None | Some(Data::Empty) | Some(Data::Int(_)) => {}
            Some(Data::Float(_)) => kind = CellKind::Float,
            Some(_) => return CellKind::Text,
        }
    }
    kind
}

fn build_column(name: &str, idx: usize, body: &[&[Data]]) -> Column {
    let cells = body.iter().map(|row| row.get(idx).unwrap_or(&Data::Empty));

    let series = match infer_kind(body, idx) {
        CellKind::Int => {
            let values: Vec<Option<i64>> = cells
                .map(|c| match c {
                    Data::Int(v) => Some(*v),
                    _ => None,
                })
                .collect();
            Series::new(name.into(), values)
        }
        CellKind::Float => {
            let values: Vec<Option<f64>> = cells
                .map(|c| match c {
                    Data::Int(v) => Some(*v as f64),
                    Data::Float(v) => Some(*v),
                    _ => None,
                })
                .collect();
            Series::new(name.into(), values)
        }
        CellKind::Text => {
            let values: Vec<Option<String>> = cells
                .map(|c| match c {
                    Data::Empty => None,
                    Data::String(s) => Some(s.clone()),
                    other => Some(other.to_string()),
                })
                .collect();
            Series::new(name.into(), values)
        }
    };

    series.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(FileFormat::from_file_name("a.xlsx").unwrap(), FileFormat::Spreadsheet);
        assert_eq!(FileFormat::from_file_name("A.XLS").unwrap(), FileFormat::Spreadsheet);
        assert_eq!(FileFormat::from_file_name("a.csv").unwrap(), FileFormat::Csv);
        assert_eq!(FileFormat::from_file_name("a.tsv").unwrap(), FileFormat::Tsv);
        assert!(matches!(
            FileFormat::from_file_name("a.parquet"),
            Err(DetectError::UnsupportedFormat(_))
        ));
        assert!(FileFormat::from_file_name("noext").is_err());
    }

    #[test]
    fn test_load_csv_bytes() {
        let csv = b"Time,Amount,merchant\n0,12.5,shop\n1,3.0,cafe\n";
        let df = DataLoader::new().load_bytes("tx.csv", csv).unwrap();

        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 3);
        assert_eq!(df.column("Time").unwrap().dtype(), &DataType::Int64);
        assert_eq!(df.column("Amount").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("merchant").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_load_tsv_bytes() {
        let tsv = b"Time\tAmount\n0\t1.5\n";
        let df = DataLoader::new().load_bytes("tx.tsv", tsv).unwrap();
        assert_eq!(df.width(), 2);
    }

    #[test]
    fn test_empty_upload_rejected() {
        let err = DataLoader::new().load_bytes("tx.csv", b"").unwrap_err();
        assert!(err.is_read());
    }

    #[test]
    fn test_garbage_spreadsheet_rejected() {
        let err = DataLoader::new()
            .load_bytes("tx.xlsx", b"definitely not a zip archive")
            .unwrap_err();
        assert!(matches!(err, DetectError::ReadError(_)));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = DataLoader::new()
            .load_path("/nonexistent/fraudscope/train.xlsx")
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/fraudscope/train.xlsx"));
    }

    #[test]
    fn test_spreadsheet_column_inference() {
        let body_rows: Vec<Vec<Data>> = vec![
            vec![Data::Int(1), Data::Float(2.5), Data::String("x".into())],
            vec![Data::Int(2), Data::Int(3), Data::Empty],
        ];
        let body: Vec<&[Data]> = body_rows.iter().map(|r| r.as_slice()).collect();

        assert_eq!(infer_kind(&body, 0), CellKind::Int);
        assert_eq!(infer_kind(&body, 1), CellKind::Float);
        assert_eq!(infer_kind(&body, 2), CellKind::Text);

        let col = build_column("Amount", 1, &body);
        assert_eq!(col.dtype(), &DataType::Float64);
        assert_eq!(col.len(), 2);

        let text = build_column("note", 2, &body);
        assert_eq!(text.null_count(), 1);
    }

    #[test]
    fn test_header_names() {
        let header = vec![Data::String(" Time ".into()), Data::Empty, Data::Float(3.0)];
        let names = header_names(&header).unwrap();
        assert_eq!(names, vec!["Time", "Unnamed: 1", "3"]);

        let dup = vec![Data::String("a".into()), Data::String("a".into())];
        assert!(header_names(&dup).is_err());
    }
}
