use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;

use super::{extract_records, RecordSource};

/// Raw records stored in a local JSON file, used for demos and tests in
/// place of the live backend.
#[derive(Debug, Clone)]
pub struct FixtureSource {
    path: PathBuf,
}

impl FixtureSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FixtureSource { path: path.into() }
    }
}

#[async_trait]
impl RecordSource for FixtureSource {
    fn describe(&self) -> String {
        format!("fixture {}", self.path.display())
    }

    async fn fetch_raw(&self) -> anyhow::Result<Vec<Value>> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let payload: Value = serde_json::from_str(&text)
            .with_context(|| format!("{} is not valid JSON", self.path.display()))?;
        extract_records(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_path() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures/students.json")
    }

    #[tokio::test]
    async fn reads_bundled_fixture() {
        let source = FixtureSource::new(fixture_path());
        let raws = source.fetch_raw().await.unwrap();
        assert_eq!(raws.len(), 8);
        assert!(source.describe().starts_with("fixture "));
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let source = FixtureSource::new("does/not/exist.json");
        let err = source.fetch_raw().await.unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
