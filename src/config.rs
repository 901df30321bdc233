use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};

use crate::normalize::Mode;
use crate::risk::RiskThresholds;

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format {other:?} (expected text or json)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    pub api_timeout: Duration,
    pub database_url: Option<String>,
    pub mode: Mode,
    pub max_students_return: usize,
    pub thresholds: RiskThresholds,
    pub log_format: LogFormat,
}

impl Config {
    /// Reads settings from the process environment. Call `dotenvy::dotenv()`
    /// first to pick up a local `.env`.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let timeout_secs: u64 = parse_var(&lookup, "EARLY_WARNING_API_TIMEOUT_SECS", 10)?;
        let thresholds = RiskThresholds {
            critical: parse_var(&lookup, "RISK_CRITICAL_THRESHOLD", 70.0)?,
            medium: parse_var(&lookup, "RISK_MEDIUM_THRESHOLD", 40.0)?,
        };
        if !(0.0..=100.0).contains(&thresholds.medium)
            || !(0.0..=100.0).contains(&thresholds.critical)
            || thresholds.medium >= thresholds.critical
        {
            bail!(
                "risk thresholds must satisfy 0 <= medium < critical <= 100 (got medium {}, critical {})",
                thresholds.medium,
                thresholds.critical
            );
        }

        Ok(Config {
            api_url: lookup("EARLY_WARNING_API_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            api_timeout: Duration::from_secs(timeout_secs),
            database_url: lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()),
            mode: parse_var(&lookup, "EARLY_WARNING_MODE", Mode::Tolerant)?,
            max_students_return: parse_var(&lookup, "MAX_STUDENTS_RETURN", 100)?,
            thresholds,
            log_format: parse_var(&lookup, "LOG_FORMAT", LogFormat::Text)?,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|err| anyhow::anyhow!("{err}"))
            .with_context(|| format!("invalid value {raw:?} for {key}")),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.api_timeout, Duration::from_secs(10));
        assert_eq!(config.database_url, None);
        assert_eq!(config.mode, Mode::Tolerant);
        assert_eq!(config.max_students_return, 100);
        assert_eq!(config.thresholds, RiskThresholds::default());
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn env_values_override_defaults() {
        let config = config_from(&[
            ("EARLY_WARNING_API_URL", "https://sat.example.edu/api"),
            ("EARLY_WARNING_MODE", "strict"),
            ("MAX_STUDENTS_RETURN", "25"),
            ("RISK_CRITICAL_THRESHOLD", "75"),
            ("LOG_FORMAT", "json"),
        ])
        .unwrap();
        assert_eq!(config.api_url, "https://sat.example.edu/api");
        assert_eq!(config.mode, Mode::Strict);
        assert_eq!(config.max_students_return, 25);
        assert_eq!(config.thresholds.critical, 75.0);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn bad_values_are_errors_not_defaults() {
        let err = config_from(&[("MAX_STUDENTS_RETURN", "lots")]).unwrap_err();
        assert!(err.to_string().contains("MAX_STUDENTS_RETURN"));
        assert!(config_from(&[("EARLY_WARNING_MODE", "lenient")]).is_err());
        assert!(config_from(&[("RISK_MEDIUM_THRESHOLD", "80")]).is_err());
    }
}
