//! Where raw student payloads come from. The analytics functions never
//! fetch anything themselves: a caller picks one [`RecordSource`], fetches
//! once, normalizes, and passes the records down explicitly.

use anyhow::bail;
use async_trait::async_trait;
use serde_json::Value;

pub mod csv;
pub mod fixture;
pub mod http;
pub mod postgres;

pub use self::csv::CsvSource;
pub use self::fixture::FixtureSource;
pub use self::http::HttpSource;
pub use self::postgres::PgSource;

#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Short label used in logs.
    fn describe(&self) -> String;

    async fn fetch_raw(&self) -> anyhow::Result<Vec<Value>>;
}

/// Accepts a bare array of records or an envelope object carrying the array
/// under `students` or `data`.
pub fn extract_records(payload: Value) -> anyhow::Result<Vec<Value>> {
    match payload {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => {
            for key in ["students", "data"] {
                if let Some(Value::Array(items)) = map.remove(key) {
                    return Ok(items);
                }
            }
            bail!("expected an array of students or an object with a `students`/`data` array")
        }
        _ => bail!("expected an array of students, got {}", kind(&payload)),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_bare_arrays_and_envelopes() {
        assert_eq!(extract_records(json!([{"id": 1}])).unwrap().len(), 1);
        assert_eq!(
            extract_records(json!({"data": [{"id": 1}, {"id": 2}], "timestamp": "x"}))
                .unwrap()
                .len(),
            2
        );
        assert_eq!(
            extract_records(json!({"students": []})).unwrap().len(),
            0
        );
    }

    #[test]
    fn rejects_other_shapes() {
        assert!(extract_records(json!({"error": "boom"})).is_err());
        let err = extract_records(json!("nope")).unwrap_err();
        assert!(err.to_string().contains("a string"));
    }
}
