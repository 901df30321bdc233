use anyhow::{bail, Context};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use super::RecordSource;

pub const DEFAULT_RELATION: &str = "early_warning.student_snapshots";

/// Reads one JSON document per row from a table or view that mirrors the
/// backend's student payload. Nothing is ever written.
#[derive(Debug, Clone)]
pub struct PgSource {
    pool: PgPool,
    relation: String,
}

impl PgSource {
    pub async fn connect(database_url: &str, relation: &str) -> anyhow::Result<Self> {
        let relation = checked_relation(relation)?;
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("failed to connect to Postgres")?;
        Ok(PgSource { pool, relation })
    }
}

#[async_trait]
impl RecordSource for PgSource {
    fn describe(&self) -> String {
        format!("postgres {}", self.relation)
    }

    async fn fetch_raw(&self) -> anyhow::Result<Vec<Value>> {
        let query = format!("SELECT to_jsonb(s) AS payload FROM {} s", self.relation);
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("failed to read {}", self.relation))?;

        let mut payloads = Vec::with_capacity(rows.len());
        for row in rows {
            payloads.push(row.try_get::<Value, _>("payload")?);
        }
        Ok(payloads)
    }
}

/// The relation name is spliced into SQL, so only plain identifiers with an
/// optional schema are allowed.
fn checked_relation(relation: &str) -> anyhow::Result<String> {
    let parts: Vec<&str> = relation.split('.').collect();
    let valid = parts.len() <= 2
        && parts.iter().all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
    if !valid {
        bail!("invalid table name {relation:?}");
    }
    Ok(relation.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_identifiers() {
        assert_eq!(
            checked_relation(DEFAULT_RELATION).unwrap(),
            "early_warning.student_snapshots"
        );
        assert!(checked_relation("students").is_ok());
    }

    #[test]
    fn rejects_anything_that_could_inject_sql() {
        for bad in ["", "students; DROP TABLE x", "a.b.c", "1students", "stu-dents", "s.\"x\""] {
            assert!(checked_relation(bad).is_err(), "{bad} should be rejected");
        }
    }
}
