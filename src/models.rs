use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    Critical,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 3] = [RiskLevel::Critical, RiskLevel::Medium, RiskLevel::Low];

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::Critical => "Critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Socioeconomic vulnerability bucket, Q1 being the most vulnerable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Quintile {
    Q1,
    Q2,
    Q3,
    Q4,
    Q5,
}

impl Quintile {
    pub fn from_number(n: i64) -> Option<Self> {
        match n {
            1 => Some(Quintile::Q1),
            2 => Some(Quintile::Q2),
            3 => Some(Quintile::Q3),
            4 => Some(Quintile::Q4),
            5 => Some(Quintile::Q5),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Quintile::Q1 => "Q1",
            Quintile::Q2 => "Q2",
            Quintile::Q3 => "Q3",
            Quintile::Q4 => "Q4",
            Quintile::Q5 => "Q5",
        }
    }

    /// Coarse grouping used by the institutional charts.
    pub fn band(self) -> &'static str {
        match self {
            Quintile::Q1 | Quintile::Q2 => "Q1-Q2",
            Quintile::Q3 => "Q3",
            Quintile::Q4 | Quintile::Q5 => "Q4-Q5",
        }
    }
}

impl fmt::Display for Quintile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SupportLevel {
    Low,
    Medium,
    High,
}

/// Highest schooling completed by the student's guardian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EducationLevel {
    Primaria,
    Basica,
    Bachillerato,
    Superior,
}

impl EducationLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            EducationLevel::Primaria => "Primaria",
            EducationLevel::Basica => "Básica",
            EducationLevel::Bachillerato => "Bachillerato",
            EducationLevel::Superior => "Superior",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectGrade {
    pub student_grade: f64,
    pub class_average: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyBarrier {
    pub name: String,
    pub importance: Option<f64>,
    pub description: Option<String>,
}

/// Canonical student record. Every backend payload variant is translated
/// into this shape before any aggregation runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub id: String,
    pub name: String,
    pub course: String,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub quintile: Option<Quintile>,
    pub has_laptop: Option<bool>,
    pub family_support_level: Option<SupportLevel>,
    pub education_level: Option<EducationLevel>,
    pub gender: Option<String>,
    pub overall_average: Option<f64>,
    pub grades: BTreeMap<String, SubjectGrade>,
    pub key_barriers: Vec<KeyBarrier>,
}

impl StudentRecord {
    /// Reported overall average if the backend sent one, otherwise the mean
    /// of the subject grades.
    pub fn average_grade(&self) -> Option<f64> {
        if let Some(avg) = self.overall_average {
            return Some(avg);
        }
        if self.grades.is_empty() {
            return None;
        }
        let total: f64 = self.grades.values().map(|g| g.student_grade).sum();
        Some(total / self.grades.len() as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub q1: f64,
    pub q3: f64,
    pub count: usize,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramData {
    pub counts: Vec<usize>,
    pub bin_edges: Vec<f64>,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaptopComparison {
    pub with_laptop: Option<DistributionStats>,
    pub without_laptop: Option<DistributionStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreDistributions {
    pub grades_by_quintile: BTreeMap<Quintile, DistributionStats>,
    pub grades_by_risk: BTreeMap<RiskLevel, DistributionStats>,
    pub risk_score_distribution: Option<DistributionStats>,
    pub laptop_comparison: LaptopComparison,
    pub grades_by_education: BTreeMap<EducationLevel, DistributionStats>,
    pub grades_by_subject: BTreeMap<String, DistributionStats>,
    pub overall_grade_histogram: Option<HistogramData>,
    pub risk_score_histogram: Option<HistogramData>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeanCount {
    pub mean: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarrierImpact {
    pub avg_grade: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRisk {
    pub subject: String,
    pub total_students: usize,
    pub at_risk: usize,
    pub risk_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightsSummary {
    pub total_students: usize,
    pub students_with_data: usize,
    pub avg_grade: f64,
    pub students_with_barriers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicInsights {
    pub grades_by_school_grade: BTreeMap<String, MeanCount>,
    pub grades_by_gender: BTreeMap<String, MeanCount>,
    pub barriers_impact: BTreeMap<String, BarrierImpact>,
    pub subjects_at_risk: Vec<SubjectRisk>,
    pub summary: InsightsSummary,
}

/// One bar or slice of a chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstitutionalSummary {
    pub total_students: usize,
    pub average_grade: f64,
    pub students_at_risk: usize,
    pub percentage_vulnerable: f64,
    pub inconsistent_levels: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstitutionalStats {
    pub risk_distribution: BTreeMap<RiskLevel, usize>,
    pub quintile_distribution: BTreeMap<String, usize>,
    pub top_barriers: Vec<ChartPoint>,
    pub laptop_impact: Vec<ChartPoint>,
    pub education_impact: Vec<ChartPoint>,
    pub summary: InstitutionalSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_grades(grades: &[(&str, f64)]) -> StudentRecord {
        StudentRecord {
            id: "EST001".to_string(),
            name: "Juan Pérez".to_string(),
            course: "10mo EGB".to_string(),
            risk_score: 72.5,
            risk_level: RiskLevel::Critical,
            quintile: Some(Quintile::Q2),
            has_laptop: Some(false),
            family_support_level: None,
            education_level: None,
            gender: None,
            overall_average: None,
            grades: grades
                .iter()
                .map(|(subject, grade)| {
                    (
                        subject.to_string(),
                        SubjectGrade {
                            student_grade: *grade,
                            class_average: None,
                        },
                    )
                })
                .collect(),
            key_barriers: Vec::new(),
        }
    }

    #[test]
    fn average_grade_prefers_reported_average() {
        let mut record = record_with_grades(&[("Matemáticas", 6.0), ("Física", 8.0)]);
        assert_eq!(record.average_grade(), Some(7.0));
        record.overall_average = Some(8.5);
        assert_eq!(record.average_grade(), Some(8.5));
    }

    #[test]
    fn average_grade_is_none_without_data() {
        let record = record_with_grades(&[]);
        assert_eq!(record.average_grade(), None);
    }

    #[test]
    fn quintile_bands_group_vulnerable_students() {
        assert_eq!(Quintile::Q1.band(), "Q1-Q2");
        assert_eq!(Quintile::Q2.band(), "Q1-Q2");
        assert_eq!(Quintile::Q3.band(), "Q3");
        assert_eq!(Quintile::Q5.band(), "Q4-Q5");
        assert_eq!(Quintile::from_number(6), None);
    }

    #[test]
    fn enum_keys_serialize_as_map_keys() {
        let mut counts = BTreeMap::new();
        counts.insert(RiskLevel::Critical, 2usize);
        counts.insert(RiskLevel::Low, 1usize);
        let json = serde_json::to_string(&counts).unwrap();
        assert_eq!(json, r#"{"Low":1,"Critical":2}"#);
    }
}
