//! Chart-ready views assembled from normalized records: score
//! distributions, academic insights, and the institutional overview.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{info, warn};

use crate::error::AnalyticsResult;
use crate::histogram::compute_histogram;
use crate::models::{
    AcademicInsights, BarrierImpact, ChartPoint, EducationLevel, HistogramData, InsightsSummary,
    InstitutionalStats, InstitutionalSummary, LaptopComparison, MeanCount, RiskLevel,
    ScoreDistributions, StudentRecord, SubjectRisk,
};
use crate::normalize::Mode;
use crate::risk::{inconsistent_levels, RiskThresholds};
use crate::stats::{compute_distribution, compute_distribution_multi, compute_single, mean, round_to};

pub const GRADE_SCALE: (f64, f64) = (0.0, 10.0);
pub const RISK_SCALE: (f64, f64) = (0.0, 100.0);
pub const HISTOGRAM_BINS: usize = 10;
/// Subject grades strictly below this mark count as at risk.
pub const AT_RISK_GRADE: f64 = 7.0;
pub const TOP_BARRIERS: usize = 10;

const EDUCATION_ORDER: [EducationLevel; 4] = [
    EducationLevel::Superior,
    EducationLevel::Bachillerato,
    EducationLevel::Basica,
    EducationLevel::Primaria,
];

pub fn build_score_distributions(
    records: &[StudentRecord],
    mode: Mode,
) -> AnalyticsResult<ScoreDistributions> {
    let average = |r: &StudentRecord| r.average_grade();

    let laptop = compute_distribution(records, |r| r.has_laptop, average);
    let laptop_comparison = LaptopComparison {
        with_laptop: laptop.get(&true).cloned(),
        without_laptop: laptop.get(&false).cloned(),
    };

    let averages: Vec<f64> = records.iter().filter_map(|r| r.average_grade()).collect();
    let risk_scores: Vec<f64> = records.iter().map(|r| r.risk_score).collect();

    let overall_grade_histogram = histogram_or_skip("average grades", &averages, GRADE_SCALE, mode)?;
    let risk_score_histogram = histogram_or_skip("risk scores", &risk_scores, RISK_SCALE, mode)?;

    Ok(ScoreDistributions {
        grades_by_quintile: compute_distribution(records, |r| r.quintile, average),
        grades_by_risk: compute_distribution(records, |r| Some(r.risk_level), average),
        risk_score_distribution: compute_single(records, |r| Some(r.risk_score)),
        laptop_comparison,
        grades_by_education: compute_distribution(records, |r| r.education_level, average),
        grades_by_subject: compute_distribution_multi(records, |r| {
            r.grades
                .iter()
                .map(|(subject, grade)| (subject.clone(), grade.student_grade))
                .collect()
        }),
        overall_grade_histogram,
        risk_score_histogram,
    })
}

fn histogram_or_skip(
    what: &str,
    values: &[f64],
    (min, max): (f64, f64),
    mode: Mode,
) -> AnalyticsResult<Option<HistogramData>> {
    match compute_histogram(values, HISTOGRAM_BINS, Some(min), Some(max)) {
        Ok(hist) => Ok(Some(hist)),
        Err(err) if mode == Mode::Tolerant => {
            warn!(what, error = %err, "histogram skipped");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

fn group_means<K, KF>(records: &[StudentRecord], key_fn: KF) -> BTreeMap<K, MeanCount>
where
    K: Ord,
    KF: Fn(&StudentRecord) -> Option<K>,
{
    compute_distribution(records, key_fn, |r| r.average_grade())
        .into_iter()
        .map(|(key, stats)| {
            (
                key,
                MeanCount {
                    mean: round_to(stats.mean, 2),
                    count: stats.count,
                },
            )
        })
        .collect()
}

pub fn build_academic_insights(records: &[StudentRecord]) -> AcademicInsights {
    let grades_by_school_grade = group_means(records, |r| {
        (!r.course.is_empty()).then(|| r.course.clone())
    });
    let grades_by_gender = group_means(records, |r| r.gender.clone());

    let mut barrier_grades: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for record in records {
        let Some(avg) = record.average_grade() else {
            continue;
        };
        let names: BTreeSet<&str> = record.key_barriers.iter().map(|b| b.name.as_str()).collect();
        for name in names {
            barrier_grades.entry(name.to_string()).or_default().push(avg);
        }
    }
    let barriers_impact = barrier_grades
        .into_iter()
        .filter_map(|(name, grades)| {
            mean(&grades).map(|avg| {
                (
                    name,
                    BarrierImpact {
                        avg_grade: round_to(avg, 2),
                        count: grades.len(),
                    },
                )
            })
        })
        .collect();

    let mut per_subject: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for record in records {
        for (subject, grade) in &record.grades {
            let entry = per_subject.entry(subject.as_str()).or_insert((0, 0));
            entry.0 += 1;
            if grade.student_grade < AT_RISK_GRADE {
                entry.1 += 1;
            }
        }
    }
    let mut subjects_at_risk: Vec<SubjectRisk> = per_subject
        .into_iter()
        .map(|(subject, (total, at_risk))| SubjectRisk {
            subject: subject.to_string(),
            total_students: total,
            at_risk,
            risk_percentage: round_to(at_risk as f64 / total as f64 * 100.0, 1),
        })
        .collect();
    subjects_at_risk.sort_by(|a, b| {
        b.risk_percentage
            .total_cmp(&a.risk_percentage)
            .then_with(|| a.subject.cmp(&b.subject))
    });

    let averages: Vec<f64> = records.iter().filter_map(|r| r.average_grade()).collect();
    let summary = InsightsSummary {
        total_students: records.len(),
        students_with_data: averages.len(),
        avg_grade: mean(&averages).map_or(0.0, |m| round_to(m, 2)),
        students_with_barriers: records.iter().filter(|r| !r.key_barriers.is_empty()).count(),
    };

    AcademicInsights {
        grades_by_school_grade,
        grades_by_gender,
        barriers_impact,
        subjects_at_risk,
        summary,
    }
}

pub fn build_institutional_stats(
    records: &[StudentRecord],
    thresholds: &RiskThresholds,
) -> InstitutionalStats {
    let mut risk_distribution: BTreeMap<RiskLevel, usize> =
        RiskLevel::ALL.iter().map(|level| (*level, 0)).collect();
    for record in records {
        *risk_distribution.entry(record.risk_level).or_default() += 1;
    }

    let mut quintile_distribution: BTreeMap<String, usize> = ["Q1-Q2", "Q3", "Q4-Q5"]
        .iter()
        .map(|band| (band.to_string(), 0))
        .collect();
    for quintile in records.iter().filter_map(|r| r.quintile) {
        *quintile_distribution
            .entry(quintile.band().to_string())
            .or_default() += 1;
    }

    let mut barrier_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for record in records {
        let names: BTreeSet<&str> = record.key_barriers.iter().map(|b| b.name.as_str()).collect();
        for name in names {
            *barrier_counts.entry(name).or_default() += 1;
        }
    }
    let mut top_barriers: Vec<(&str, usize)> = barrier_counts.into_iter().collect();
    top_barriers.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    let top_barriers = top_barriers
        .into_iter()
        .take(TOP_BARRIERS)
        .map(|(name, count)| ChartPoint {
            name: name.to_string(),
            value: count as f64,
        })
        .collect();

    let by_laptop = group_means(records, |r| r.has_laptop);
    let laptop_impact = [(true, "With laptop"), (false, "Without laptop")]
        .iter()
        .filter_map(|(has, label)| {
            by_laptop.get(has).map(|m| ChartPoint {
                name: label.to_string(),
                value: m.mean,
            })
        })
        .collect();

    let by_education = group_means(records, |r| r.education_level);
    let education_impact = EDUCATION_ORDER
        .iter()
        .filter_map(|level| {
            by_education.get(level).map(|m| ChartPoint {
                name: level.as_str().to_string(),
                value: m.mean,
            })
        })
        .collect();

    let averages: Vec<f64> = records.iter().filter_map(|r| r.average_grade()).collect();
    let total = records.len();
    let vulnerable = quintile_distribution.get("Q1-Q2").copied().unwrap_or(0);
    let students_at_risk = risk_distribution[&RiskLevel::Critical] + risk_distribution[&RiskLevel::Medium];

    let summary = InstitutionalSummary {
        total_students: total,
        average_grade: mean(&averages).map_or(0.0, |m| round_to(m, 2)),
        students_at_risk,
        percentage_vulnerable: if total == 0 {
            0.0
        } else {
            round_to(vulnerable as f64 / total as f64 * 100.0, 1)
        },
        inconsistent_levels: inconsistent_levels(records, thresholds).len(),
    };

    info!(
        total_students = total,
        students_at_risk,
        "institutional stats computed"
    );

    InstitutionalStats {
        risk_distribution,
        quintile_distribution,
        top_barriers,
        laptop_impact,
        education_impact,
        summary,
    }
}
