//! Translation of raw backend payloads into [`StudentRecord`].
//!
//! The backend has shipped several incompatible shapes over time: Spanish
//! field names (`nombre`, `nivel_riesgo`, `academic_performance`), the current
//! English ones, and camelCase fixtures. All of them are accepted here and
//! nothing past this module ever sees a raw payload. Vocabularies are closed:
//! an unrecognized risk level, quintile, support level, or education level is
//! an error, never a default.

use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{AnalyticsError, AnalyticsResult, RecordError};
use crate::models::{
    EducationLevel, KeyBarrier, Quintile, RiskLevel, StudentRecord, SubjectGrade, SupportLevel,
};

const ID_FIELDS: &[&str] = &["id", "student_id"];
const NAME_FIELDS: &[&str] = &["name", "nombre"];
const COURSE_FIELDS: &[&str] = &["course", "curso", "grado", "grade"];
const RISK_SCORE_FIELDS: &[&str] = &[
    "risk_score",
    "riskScore",
    "score_riesgo",
    "risk_predictions.-1.risk_score",
];
const RISK_LEVEL_FIELDS: &[&str] = &[
    "risk_level",
    "riskLevel",
    "nivel_riesgo",
    "risk_predictions.-1.risk_level",
];
const QUINTILE_FIELDS: &[&str] = &["quintile", "quintil", "alerts.quintile"];
const LAPTOP_FIELDS: &[&str] = &[
    "has_laptop",
    "hasLaptop",
    "laptop",
    "alerts.hasLaptop",
    "socioeconomic_data.0.laptop",
];
const SUPPORT_FIELDS: &[&str] = &[
    "family_support",
    "familySupportLevel",
    "alerts.familySupport",
    "indice_apoyo_familiar",
    "socioeconomic_data.0.indice_apoyo_familiar",
];
const EDUCATION_FIELDS: &[&str] = &[
    "education_level",
    "nivel_instruccion_rep",
    "socioeconomic_data.0.nivel_instruccion_rep",
];
const GENDER_FIELDS: &[&str] = &["gender", "genero"];
const AVERAGE_FIELDS: &[&str] = &["overall_average", "promedio_general"];
const GRADE_FIELDS: &[&str] = &["grades", "performance", "key_grades", "academic_performance"];
const BARRIER_FIELDS: &[&str] = &["key_barriers", "keyBarriers", "mainAlerts", "alertas_principales"];

const SUBJECT_KEYS: &[&str] = &["subject", "materia"];
const STUDENT_GRADE_KEYS: &[&str] = &["studentGrade", "student_grade", "grade", "nota"];
const CLASS_AVERAGE_KEYS: &[&str] = &["classAverage", "class_average", "avg", "promedio_curso"];

/// How a batch reacts to a record that fails normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Abort on the first bad record.
    Strict,
    /// Skip bad records and report them alongside the accepted ones.
    #[default]
    Tolerant,
}

impl FromStr for Mode {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Mode::Strict),
            "tolerant" => Ok(Mode::Tolerant),
            _ => Err(AnalyticsError::unknown("mode", s)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedBatch {
    pub records: Vec<StudentRecord>,
    pub rejected: Vec<RecordError>,
}

pub fn normalize_batch(raws: &[Value], mode: Mode) -> Result<NormalizedBatch, RecordError> {
    let mut batch = NormalizedBatch::default();
    let mut seen: HashSet<String> = HashSet::new();

    for (index, raw) in raws.iter().enumerate() {
        let outcome = normalize_record(raw).and_then(|record| {
            if seen.insert(record.id.clone()) {
                Ok(record)
            } else {
                Err(AnalyticsError::DuplicateId { id: record.id })
            }
        });

        match outcome {
            Ok(record) => batch.records.push(record),
            Err(source) => {
                let err = RecordError {
                    index,
                    id: raw_id(raw),
                    source,
                };
                if mode == Mode::Strict {
                    return Err(err);
                }
                warn!(index, id = ?err.id, error = %err.source, "skipping malformed student record");
                batch.rejected.push(err);
            }
        }
    }

    debug!(
        accepted = batch.records.len(),
        rejected = batch.rejected.len(),
        "normalized student batch"
    );
    Ok(batch)
}

pub fn normalize_record(raw: &Value) -> AnalyticsResult<StudentRecord> {
    if !raw.is_object() {
        return Err(AnalyticsError::invalid_type("record", "JSON object"));
    }

    let id = match first_present(raw, ID_FIELDS) {
        Some((field, value)) => parse_id(field, value)?,
        None => return Err(AnalyticsError::missing("id")),
    };

    let score = first_present(raw, RISK_SCORE_FIELDS);
    let level = first_present(raw, RISK_LEVEL_FIELDS);
    // Score and level travel together from the backend; a level alone has no score to aggregate.
    let (risk_score, risk_level) = match (score, level) {
        (Some((score_field, score)), Some((level_field, level))) => (
            parse_bounded(score_field, score, 0.0, 100.0)?,
            parse_risk_level(level_field, expect_text(level_field, level)?)?,
        ),
        (Some(_), None) => return Err(AnalyticsError::missing("risk_level")),
        (None, _) => return Err(AnalyticsError::missing("risk_score")),
    };

    let quintile = first_present(raw, QUINTILE_FIELDS)
        .map(|(field, value)| parse_quintile(field, value))
        .transpose()?;

    let has_laptop = first_present(raw, LAPTOP_FIELDS)
        .map(|(field, value)| parse_bool(field, value))
        .transpose()?;

    let family_support_level = first_present(raw, SUPPORT_FIELDS)
        .map(|(field, value)| parse_support_level(field, expect_text(field, value)?))
        .transpose()?;

    let education_level = match first_present(raw, EDUCATION_FIELDS) {
        Some((field, value)) => parse_education_level(field, expect_text(field, value)?)?,
        None => None,
    };

    let gender = optional_text(raw, GENDER_FIELDS)?;

    let overall_average = first_present(raw, AVERAGE_FIELDS)
        .map(|(field, value)| parse_bounded(field, value, 0.0, 10.0))
        .transpose()?;

    let grades = match first_present(raw, GRADE_FIELDS) {
        Some((field, value)) => parse_grades(field, value)?,
        None => BTreeMap::new(),
    };

    let key_barriers = match first_present(raw, BARRIER_FIELDS) {
        Some((field, value)) => parse_barriers(field, value)?,
        None => Vec::new(),
    };

    Ok(StudentRecord {
        id,
        name: optional_text(raw, NAME_FIELDS)?.unwrap_or_default(),
        course: optional_text(raw, COURSE_FIELDS)?.unwrap_or_default(),
        risk_score,
        risk_level,
        quintile,
        has_laptop,
        family_support_level,
        education_level,
        gender,
        overall_average,
        grades,
        key_barriers,
    })
}

pub fn parse_risk_level(field: &str, raw: &str) -> AnalyticsResult<RiskLevel> {
    match fold(raw).as_str() {
        "alto" | "critico" | "critical" => Ok(RiskLevel::Critical),
        "medio" | "medium" => Ok(RiskLevel::Medium),
        "bajo" | "low" => Ok(RiskLevel::Low),
        _ => Err(AnalyticsError::unknown(field, raw)),
    }
}

pub fn parse_support_level(field: &str, raw: &str) -> AnalyticsResult<SupportLevel> {
    match fold(raw).as_str() {
        "bajo" | "low" => Ok(SupportLevel::Low),
        "medio" | "medium" => Ok(SupportLevel::Medium),
        "alto" | "high" => Ok(SupportLevel::High),
        _ => Err(AnalyticsError::unknown(field, raw)),
    }
}

/// `Desconocido` and blank values mean the backend has no answer.
pub fn parse_education_level(field: &str, raw: &str) -> AnalyticsResult<Option<EducationLevel>> {
    match fold(raw).as_str() {
        "" | "desconocido" | "unknown" => Ok(None),
        "primaria" => Ok(Some(EducationLevel::Primaria)),
        "basica" => Ok(Some(EducationLevel::Basica)),
        "bachillerato" => Ok(Some(EducationLevel::Bachillerato)),
        "superior" => Ok(Some(EducationLevel::Superior)),
        _ => Err(AnalyticsError::unknown(field, raw)),
    }
}

pub fn parse_quintile(field: &str, value: &Value) -> AnalyticsResult<Quintile> {
    let rejected = || AnalyticsError::unknown(field, render(value));
    match value {
        Value::Number(n) => n.as_i64().and_then(Quintile::from_number).ok_or_else(rejected),
        Value::String(s) => {
            let folded = fold(s);
            let digits = folded
                .strip_prefix("quintil")
                .or_else(|| folded.strip_prefix('q'))
                .unwrap_or(&folded)
                .trim();
            digits
                .parse::<i64>()
                .ok()
                .and_then(Quintile::from_number)
                .ok_or_else(rejected)
        }
        _ => Err(rejected()),
    }
}

/// Resolves a dotted path. Numeric segments index arrays, `-1` picks the
/// last element. JSON `null` counts as absent.
fn lookup<'a>(raw: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = raw;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => {
                let idx = if segment == "-1" {
                    items.len().checked_sub(1)?
                } else {
                    segment.parse::<usize>().ok()?
                };
                items.get(idx)?
            }
            _ => return None,
        };
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

fn first_present<'a>(raw: &'a Value, paths: &[&'static str]) -> Option<(&'static str, &'a Value)> {
    paths
        .iter()
        .find_map(|path| lookup(raw, path).map(|value| (*path, value)))
}

fn raw_id(raw: &Value) -> Option<String> {
    first_present(raw, ID_FIELDS).and_then(|(field, value)| parse_id(field, value).ok())
}

fn parse_id(field: &str, value: &Value) -> AnalyticsResult<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Value::String(_) => Err(AnalyticsError::missing(field)),
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
        _ => Err(AnalyticsError::invalid_type(field, "string or integer")),
    }
}

fn expect_text<'a>(field: &str, value: &'a Value) -> AnalyticsResult<&'a str> {
    value
        .as_str()
        .ok_or_else(|| AnalyticsError::invalid_type(field, "string"))
}

fn optional_text(raw: &Value, paths: &[&'static str]) -> AnalyticsResult<Option<String>> {
    match first_present(raw, paths) {
        Some((_, Value::String(s))) => {
            let trimmed = s.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        Some((_, Value::Number(n))) => Ok(Some(n.to_string())),
        Some((field, _)) => Err(AnalyticsError::invalid_type(field, "string")),
        None => Ok(None),
    }
}

fn parse_number(field: &str, value: &Value) -> AnalyticsResult<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| AnalyticsError::invalid_type(field, "number"))
}

fn parse_bounded(field: &str, value: &Value, min: f64, max: f64) -> AnalyticsResult<f64> {
    let number = parse_number(field, value)?;
    if number < min || number > max {
        return Err(AnalyticsError::OutOfRange {
            field: field.to_string(),
            value: number,
            min,
            max,
        });
    }
    Ok(number)
}

fn parse_bool(field: &str, value: &Value) -> AnalyticsResult<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) if n.as_i64() == Some(1) => Ok(true),
        Value::Number(n) if n.as_i64() == Some(0) => Ok(false),
        Value::String(s) => match fold(s).as_str() {
            "true" | "si" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" => Ok(false),
            _ => Err(AnalyticsError::invalid_type(field, "boolean")),
        },
        _ => Err(AnalyticsError::invalid_type(field, "boolean")),
    }
}

fn parse_grades(field: &str, value: &Value) -> AnalyticsResult<BTreeMap<String, SubjectGrade>> {
    let mut grades = BTreeMap::new();
    match value {
        Value::Object(map) => {
            for (subject, entry) in map {
                let path = format!("{field}.{subject}");
                let grade = match entry {
                    Value::Object(_) => parse_subject_grade(&path, entry)?,
                    other => SubjectGrade {
                        student_grade: parse_bounded(&path, other, 0.0, 10.0)?,
                        class_average: None,
                    },
                };
                grades.insert(subject.trim().to_string(), grade);
            }
        }
        Value::Array(items) => {
            for (i, entry) in items.iter().enumerate() {
                let path = format!("{field}[{i}]");
                let subject = match first_present(entry, SUBJECT_KEYS) {
                    Some((key, v)) => expect_text(&format!("{path}.{key}"), v)?.trim().to_string(),
                    None => return Err(AnalyticsError::missing(format!("{path}.subject"))),
                };
                grades.insert(subject, parse_subject_grade(&path, entry)?);
            }
        }
        _ => return Err(AnalyticsError::invalid_type(field, "object or array")),
    }
    Ok(grades)
}

fn parse_subject_grade(path: &str, entry: &Value) -> AnalyticsResult<SubjectGrade> {
    let student_grade = match first_present(entry, STUDENT_GRADE_KEYS) {
        Some((key, v)) => parse_bounded(&format!("{path}.{key}"), v, 0.0, 10.0)?,
        None => return Err(AnalyticsError::missing(format!("{path}.studentGrade"))),
    };
    let class_average = first_present(entry, CLASS_AVERAGE_KEYS)
        .map(|(key, v)| parse_bounded(&format!("{path}.{key}"), v, 0.0, 10.0))
        .transpose()?;
    Ok(SubjectGrade {
        student_grade,
        class_average,
    })
}

fn parse_barriers(field: &str, value: &Value) -> AnalyticsResult<Vec<KeyBarrier>> {
    let items = value
        .as_array()
        .ok_or_else(|| AnalyticsError::invalid_type(field, "array"))?;

    let mut barriers = Vec::with_capacity(items.len());
    for (i, entry) in items.iter().enumerate() {
        let path = format!("{field}[{i}]");
        let barrier = match entry {
            Value::String(name) if !name.trim().is_empty() => KeyBarrier {
                name: name.trim().to_string(),
                importance: None,
                description: None,
            },
            Value::Object(_) => {
                let name = match optional_text(entry, &["name"])? {
                    Some(name) => name,
                    None => return Err(AnalyticsError::missing(format!("{path}.name"))),
                };
                let importance = lookup(entry, "importance")
                    .map(|v| parse_number(&format!("{path}.importance"), v))
                    .transpose()?;
                let description = optional_text(entry, &["description", "impact"])?;
                KeyBarrier {
                    name,
                    importance,
                    description,
                }
            }
            Value::String(_) => return Err(AnalyticsError::missing(format!("{path}.name"))),
            _ => return Err(AnalyticsError::invalid_type(path, "string or object")),
        };
        barriers.push(barrier);
    }
    Ok(barriers)
}

/// Lowercases, trims, and strips Spanish accents so `Crítico`, `critico`
/// and ` CRITICO ` compare equal.
fn fold(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' | 'ü' => 'u',
            other => other,
        })
        .collect()
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
