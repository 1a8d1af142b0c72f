//! Dataset ingress
//!
//! Loads a tabular file from a local path or an HTTP(S) URL into a
//! DataFrame. Dispatch is by extension (and content type for URLs):
//! delimited text, spreadsheets and JSON record arrays are supported.
//! Malformed or unsupported input surfaces as an `Ingest` error; there is
//! no partial load.

use crate::error::{InsightError, Result};
use calamine::Reader;
use polars::prelude::*;
use serde_json::{Map, Value};
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Load a dataset from a path or URL.
pub async fn load_dataset(source: &str) -> Result<DataFrame> {
    if source.starts_with("http://") || source.starts_with("https://") {
        load_from_url(source).await
    } else {
        load_from_path(Path::new(source))
    }
}

pub fn load_from_path(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(InsightError::Ingest(format!(
            "File not found: {}",
            path.display()
        )));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    let df = match ext.as_str() {
        "csv" => LazyCsvReader::new(path)
            .with_infer_schema_length(Some(1000))
            .with_try_parse_dates(true)
            .finish()
            .map_err(|e| InsightError::Ingest(format!("Failed to read CSV: {}", e)))?
            .collect()
            .map_err(|e| InsightError::Ingest(format!("Failed to read CSV: {}", e)))?,
        "tsv" | "txt" => {
            let text = std::fs::read_to_string(path)?;
            from_delimited_text(&text)?
        }
        "json" => {
            let text = std::fs::read_to_string(path)?;
            from_json_records(&text)?
        }
        "xlsx" | "xls" | "ods" => from_spreadsheet(path)?,
        other => {
            return Err(InsightError::Ingest(format!(
                "Unsupported file format: {}",
                other
            )))
        }
    };

    if df.width() == 0 {
        return Err(InsightError::Ingest("Dataset has no columns".to_string()));
    }
    info!(rows = df.height(), columns = df.width(), "Dataset loaded");
    Ok(df)
}

async fn load_from_url(url: &str) -> Result<DataFrame> {
    info!(url = url, "Downloading remote dataset");
    let response = reqwest::get(url)
        .await
        .map_err(|e| InsightError::Ingest(format!("Download failed: {}", e)))?;
    if !response.status().is_success() {
        return Err(InsightError::Ingest(format!(
            "Download failed with HTTP {}",
            response.status().as_u16()
        )));
    }

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_lowercase();
    let lower_url = url.to_lowercase();

    if content_type.contains("json") || lower_url.ends_with(".json") {
        let text = response
            .text()
            .await
            .map_err(|e| InsightError::Ingest(format!("Download failed: {}", e)))?;
        return from_json_records(&text);
    }

    if lower_url.ends_with(".xlsx") || lower_url.ends_with(".xls") || content_type.contains("spreadsheet") {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| InsightError::Ingest(format!("Download failed: {}", e)))?;
        // calamine wants a seekable file, so stage the payload on disk.
        let mut staged = tempfile::Builder::new()
            .suffix(".xlsx")
            .tempfile()
            .map_err(|e| InsightError::Ingest(format!("Failed to stage download: {}", e)))?;
        staged.write_all(&bytes)?;
        return from_spreadsheet(staged.path());
    }

    if content_type.contains("csv") || content_type.contains("text") || lower_url.ends_with(".csv") {
        let text = response
            .text()
            .await
            .map_err(|e| InsightError::Ingest(format!("Download failed: {}", e)))?;
        return from_delimited_text(&text);
    }

    Err(InsightError::Ingest(format!(
        "Unsupported content type: {}",
        content_type
    )))
}

/// Parse delimited text with a sniffed separator into a DataFrame.
pub fn from_delimited_text(text: &str) -> Result<DataFrame> {
    let delimiter = sniff_delimiter(text);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| InsightError::Ingest(format!("Failed to read headers: {}", e)))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| InsightError::Ingest(format!("Failed to read record: {}", e)))?;
        let mut obj = Map::new();
        for (idx, header) in headers.iter().enumerate() {
            let cell = row.get(idx).unwrap_or("");
            obj.insert(header.clone(), coerce_cell(cell));
        }
        records.push(Value::Object(obj));
    }

    frame_from_records(&headers, &records)
}

/// Parse a JSON array of flat record objects.
pub fn from_json_records(text: &str) -> Result<DataFrame> {
    let parsed: Value = serde_json::from_str(text)
        .map_err(|e| InsightError::Ingest(format!("Invalid JSON: {}", e)))?;
    let records = parsed
        .as_array()
        .ok_or_else(|| InsightError::Ingest("Expected a JSON array of records".to_string()))?;

    // Column order is first-seen across all records.
    let mut headers: Vec<String> = Vec::new();
    for record in records {
        if let Some(obj) = record.as_object() {
            for key in obj.keys() {
                if !headers.iter().any(|h| h == key) {
                    headers.push(key.clone());
                }
            }
        }
    }
    if headers.is_empty() {
        return Err(InsightError::Ingest("No record fields found".to_string()));
    }

    frame_from_records(&headers, records)
}

/// Parse the first sheet of a spreadsheet; row one is the header.
pub fn from_spreadsheet(path: &Path) -> Result<DataFrame> {
    let mut workbook = calamine::open_workbook_auto(path)
        .map_err(|e| InsightError::Ingest(format!("Failed to open spreadsheet: {}", e)))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| InsightError::Ingest("Spreadsheet has no sheets".to_string()))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| InsightError::Ingest(format!("Failed to read sheet: {}", e)))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| InsightError::Ingest("Spreadsheet sheet is empty".to_string()))?
        .iter()
        .map(|cell| cell.to_string().trim().to_string())
        .collect();

    let mut records = Vec::new();
    for row in rows {
        let mut obj = Map::new();
        for (idx, header) in headers.iter().enumerate() {
            let cell = row.get(idx).map(|c| c.to_string()).unwrap_or_default();
            obj.insert(header.clone(), coerce_cell(&cell));
        }
        records.push(Value::Object(obj));
    }

    frame_from_records(&headers, &records)
}

/// Coerce a raw cell into the narrowest JSON value.
fn coerce_cell(s: &str) -> Value {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if trimmed.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    Value::String(trimmed.to_string())
}

fn sniff_delimiter(text: &str) -> u8 {
    let first_line = text.lines().next().unwrap_or("");
    let candidates = [b',', b'\t', b';', b'|'];
    candidates
        .into_iter()
        .max_by_key(|d| first_line.bytes().filter(|b| b == d).count())
        .unwrap_or(b',')
}

/// Column type inferred across all records for one header.
#[derive(Debug, Clone, Copy, PartialEq)]
enum InferredType {
    Bool,
    Int,
    Float,
    Str,
}

/// Build a typed DataFrame from JSON record objects.
///
/// Type inference widens per column: bool -> int -> float -> string. A
/// column that mixes incompatible kinds falls back to string.
pub fn frame_from_records(headers: &[String], records: &[Value]) -> Result<DataFrame> {
    static NULL_VALUE: Value = Value::Null;
    let mut series_vec: Vec<Series> = Vec::with_capacity(headers.len());

    for header in headers {
        let cells: Vec<&Value> = records
            .iter()
            .map(|r| r.get(header).unwrap_or(&NULL_VALUE))
            .collect();

        let mut inferred: Option<InferredType> = None;
        for cell in &cells {
            let kind = match cell {
                Value::Null => continue,
                Value::Bool(_) => InferredType::Bool,
                Value::Number(n) if n.is_i64() => InferredType::Int,
                Value::Number(_) => InferredType::Float,
                _ => InferredType::Str,
            };
            inferred = Some(match inferred {
                None => kind,
                Some(prev) if prev == kind => prev,
                Some(InferredType::Int) if kind == InferredType::Float => InferredType::Float,
                Some(InferredType::Float) if kind == InferredType::Int => InferredType::Float,
                Some(_) => InferredType::Str,
            });
        }

        let series = match inferred.unwrap_or(InferredType::Str) {
            InferredType::Bool => {
                let values: Vec<Option<bool>> = cells.iter().map(|c| c.as_bool()).collect();
                Series::new(header, values)
            }
            InferredType::Int => {
                let values: Vec<Option<i64>> = cells.iter().map(|c| c.as_i64()).collect();
                Series::new(header, values)
            }
            InferredType::Float => {
                let values: Vec<Option<f64>> = cells.iter().map(|c| c.as_f64()).collect();
                Series::new(header, values)
            }
            InferredType::Str => {
                let values: Vec<Option<String>> = cells
                    .iter()
                    .map(|c| match c {
                        Value::Null => None,
                        Value::String(s) => Some(s.clone()),
                        other => Some(other.to_string()),
                    })
                    .collect();
                Series::new(header, values)
            }
        };
        series_vec.push(series);
    }

    DataFrame::new(series_vec).map_err(|e| InsightError::Ingest(format!("Invalid table: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delimited_text_with_commas() {
        let df = from_delimited_text("region,revenue\nwest,100\neast,250.5\n").unwrap();
        assert_eq!(df.shape(), (2, 2));
        assert_eq!(df.column("revenue").unwrap().dtype(), &DataType::Float64);
    }

    #[test]
    fn test_delimiter_sniffing_prefers_tabs() {
        let df = from_delimited_text("a\tb\n1\t2\n3\t4\n").unwrap();
        assert_eq!(df.shape(), (2, 2));
        assert_eq!(df.column("a").unwrap().dtype(), &DataType::Int64);
    }

    #[test]
    fn test_json_records() {
        let df = from_json_records(r#"[{"name":"a","score":1},{"name":"b","score":2}]"#).unwrap();
        assert_eq!(df.shape(), (2, 2));
    }

    #[test]
    fn test_json_must_be_an_array() {
        assert!(from_json_records(r#"{"name":"a"}"#).is_err());
    }

    #[test]
    fn test_mixed_int_float_widens_to_float() {
        let df = from_delimited_text("x\n1\n2.5\n").unwrap();
        assert_eq!(df.column("x").unwrap().dtype(), &DataType::Float64);
    }

    #[test]
    fn test_mixed_text_and_number_falls_back_to_string() {
        let df = from_delimited_text("x\n1\nhello\n").unwrap();
        assert_eq!(df.column("x").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_empty_cells_become_nulls() {
        let df = from_delimited_text("x,y\n1,\n2,3\n").unwrap();
        assert_eq!(df.column("y").unwrap().null_count(), 1);
    }

    #[test]
    fn test_missing_file_is_an_ingest_error() {
        let err = load_from_path(Path::new("/no/such/file.csv")).unwrap_err();
        assert!(matches!(err, InsightError::Ingest(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.parquet");
        std::fs::write(&path, b"x").unwrap();
        let err = load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("Unsupported"));
    }
}
