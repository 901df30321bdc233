use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::{Map, Value};

use super::RecordSource;

/// Column prefix for per-subject grades, e.g. `grade:Matemáticas`.
const GRADE_PREFIX: &str = "grade:";
/// Columns holding `;`-separated barrier names.
const BARRIER_COLUMNS: &[&str] = &["key_barriers", "alertas_principales"];

/// Flat export of student records, one student per row. Cells stay text;
/// the normalizer parses numbers and enums the same way as for JSON.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CsvSource { path: path.into() }
    }
}

#[async_trait]
impl RecordSource for CsvSource {
    fn describe(&self) -> String {
        format!("csv {}", self.path.display())
    }

    async fn fetch_raw(&self) -> anyhow::Result<Vec<Value>> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        records_from_reader(bytes.as_slice())
            .with_context(|| format!("failed to parse {}", self.path.display()))
    }
}

pub fn records_from_reader<R: Read>(input: R) -> anyhow::Result<Vec<Value>> {
    let mut reader = ::csv::Reader::from_reader(input);
    let headers = reader.headers()?.clone();
    let mut records = Vec::new();

    for (line, result) in reader.records().enumerate() {
        let row = result.with_context(|| format!("bad CSV row {}", line + 1))?;
        let mut object = Map::new();
        let mut grades = Map::new();

        for (header, cell) in headers.iter().zip(row.iter()) {
            let cell = cell.trim();
            if cell.is_empty() {
                continue;
            }
            if let Some(subject) = header.strip_prefix(GRADE_PREFIX) {
                grades.insert(subject.trim().to_string(), Value::String(cell.to_string()));
            } else if BARRIER_COLUMNS.contains(&header) {
                let names = cell
                    .split(';')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(|name| Value::String(name.to_string()))
                    .collect();
                object.insert(header.to_string(), Value::Array(names));
            } else {
                object.insert(header.to_string(), Value::String(cell.to_string()));
            }
        }

        if !grades.is_empty() {
            object.insert("grades".to_string(), Value::Object(grades));
        }
        records.push(Value::Object(object));
    }

    Ok(records)
}
