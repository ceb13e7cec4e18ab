use crate::error::{EtlError, Result};
use crate::types::SourceRecord;
use calamine::{open_workbook, Data, Reader, Xlsx};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A source of named-field records for one partition.
pub trait RecordSource {
    fn records(&self) -> Result<Vec<SourceRecord>>;
}

/// Reads the first worksheet of an Xlsx workbook, using the header row as
/// field names.
pub struct XlsxSource {
    path: PathBuf,
}

impl XlsxSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSource for XlsxSource {
    fn records(&self) -> Result<Vec<SourceRecord>> {
        let mut workbook: Xlsx<_> = open_workbook(&self.path)?;

        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| {
                EtlError::Config(format!(
                    "Workbook '{}' has no worksheets",
                    self.path.display()
                ))
            })?;
        let range = workbook.worksheet_range(&sheet_name)?;

        let mut rows = range.rows();
        let headers: Vec<String> = match rows.next() {
            Some(header_row) => header_row
                .iter()
                .map(|cell| match cell {
                    Data::String(s) => s.trim().to_string(),
                    other => other.to_string(),
                })
                .collect(),
            None => return Ok(Vec::new()),
        };

        let mut records = Vec::new();
        for row in rows {
            let mut fields = Map::new();
            for (index, cell) in row.iter().enumerate() {
                let header = headers.get(index).map(String::as_str).unwrap_or("");
                if header.is_empty() {
                    continue;
                }
                fields.insert(header.to_string(), cell_to_value(cell));
            }
            // Rows shorter than the header still carry every declared column
            for header in &headers {
                if !header.is_empty() && !fields.contains_key(header) {
                    fields.insert(header.clone(), Value::Null);
                }
            }
            if fields.values().all(Value::is_null) {
                continue;
            }
            records.push(Value::Object(fields));
        }

        debug!(
            sheet = %sheet_name,
            count = records.len(),
            "Read records from {}",
            self.path.display()
        );
        Ok(records)
    }
}

/// Convert an Excel cell to a JSON value: blanks become null, whole floats
/// become integers, date cells become ISO date text.
fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) if s.trim().is_empty() => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::Int(i) => json!(*i),
        Data::Float(f) => {
            if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                json!(*f as i64)
            } else {
                json!(*f)
            }
        }
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ts) => Value::String(ts.date().format("%Y-%m-%d").to_string()),
            None => Value::Null,
        },
        Data::DateTimeIso(s) => Value::String(s.clone()),
        Data::DurationIso(s) => Value::String(s.clone()),
        Data::Error(_) => Value::Null,
    }
}
