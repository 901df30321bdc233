use serde::Serialize;
use tracing::warn;

use crate::models::{RiskLevel, StudentRecord};

/// Score cut-offs the upstream model uses to label students. The core only
/// reads them to spot records whose label disagrees with their score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskThresholds {
    pub critical: f64,
    pub medium: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        RiskThresholds {
            critical: 70.0,
            medium: 40.0,
        }
    }
}

impl RiskThresholds {
    pub fn classify(&self, score: f64) -> RiskLevel {
        if score >= self.critical {
            RiskLevel::Critical
        } else if score >= self.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityEntry {
    pub id: String,
    pub name: String,
    pub course: String,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub key_barriers: Vec<String>,
}

/// Students whose reported level does not match `thresholds.classify` of
/// their score.
pub fn inconsistent_levels<'a>(
    records: &'a [StudentRecord],
    thresholds: &RiskThresholds,
) -> Vec<&'a StudentRecord> {
    let flagged: Vec<&StudentRecord> = records
        .iter()
        .filter(|r| thresholds.classify(r.risk_score) != r.risk_level)
        .collect();

    for record in &flagged {
        warn!(
            id = %record.id,
            score = record.risk_score,
            reported = %record.risk_level,
            expected = %thresholds.classify(record.risk_score),
            "risk level disagrees with score"
        );
    }
    flagged
}

/// Highest-risk students first, ties broken by id, at most `limit` entries.
pub fn rank_students(
    records: &[StudentRecord],
    level: Option<RiskLevel>,
    limit: usize,
) -> Vec<PriorityEntry> {
    let mut ranked: Vec<&StudentRecord> = records
        .iter()
        .filter(|r| level.map_or(true, |l| r.risk_level == l))
        .collect();

    ranked.sort_by(|a, b| {
        b.risk_score
            .total_cmp(&a.risk_score)
            .then_with(|| a.id.cmp(&b.id))
    });

    ranked
        .into_iter()
        .take(limit)
        .map(|r| PriorityEntry {
            id: r.id.clone(),
            name: r.name.clone(),
            course: r.course.clone(),
            risk_score: r.risk_score,
            risk_level: r.risk_level,
            key_barriers: r.key_barriers.iter().take(3).map(|b| b.name.clone()).collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::KeyBarrier;

    fn sample_student(id: &str, risk_score: f64, risk_level: RiskLevel) -> StudentRecord {
        StudentRecord {
            id: id.to_string(),
            name: "Avery Lee".to_string(),
            course: "10mo A".to_string(),
            risk_score,
            risk_level,
            quintile: None,
            has_laptop: None,
            family_support_level: None,
            education_level: None,
            gender: None,
            overall_average: None,
            grades: Default::default(),
            key_barriers: Vec::new(),
        }
    }

    #[test]
    fn thresholds_follow_expected_tiers() {
        let thresholds = RiskThresholds::default();
        assert_eq!(thresholds.classify(85.0), RiskLevel::Critical);
        assert_eq!(thresholds.classify(70.0), RiskLevel::Critical);
        assert_eq!(thresholds.classify(55.0), RiskLevel::Medium);
        assert_eq!(thresholds.classify(40.0), RiskLevel::Medium);
        assert_eq!(thresholds.classify(15.0), RiskLevel::Low);
    }

    #[test]
    fn ranking_orders_by_score_then_id() {
        let students = vec![
            sample_student("EST003", 40.0, RiskLevel::Medium),
            sample_student("EST002", 72.0, RiskLevel::Critical),
            sample_student("EST001", 72.0, RiskLevel::Critical),
            sample_student("EST004", 15.0, RiskLevel::Low),
        ];
        let ranked = rank_students(&students, None, 3);
        let ids: Vec<&str> = ranked.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["EST001", "EST002", "EST003"]);
    }

    #[test]
    fn ranking_filters_by_level() {
        let students = vec![
            sample_student("a", 85.0, RiskLevel::Critical),
            sample_student("b", 55.0, RiskLevel::Medium),
            sample_student("c", 45.0, RiskLevel::Medium),
        ];
        let ranked = rank_students(&students, Some(RiskLevel::Medium), 10);
        assert_eq!(ranked.len(), 2);
        assert!(ranked.iter().all(|e| e.risk_level == RiskLevel::Medium));
    }

    #[test]
    fn priority_entries_keep_top_three_barriers() {
        let mut student = sample_student("a", 85.0, RiskLevel::Critical);
        student.key_barriers = ["Sin laptop", "Apoyo bajo", "Quintil Q1", "5 Faltas"]
            .iter()
            .map(|name| KeyBarrier {
                name: name.to_string(),
                importance: None,
                description: None,
            })
            .collect();
        let ranked = rank_students(&[student], None, 1);
        assert_eq!(
            ranked[0].key_barriers,
            vec!["Sin laptop", "Apoyo bajo", "Quintil Q1"]
        );
    }

    #[test]
    fn flags_levels_that_disagree_with_score() {
        let students = vec![
            sample_student("ok", 85.0, RiskLevel::Critical),
            sample_student("off", 20.0, RiskLevel::Critical),
        ];
        let flagged = inconsistent_levels(&students, &RiskThresholds::default());
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].id, "off");
    }
}
