use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::{AcademicInsights, InstitutionalStats, RiskLevel, ScoreDistributions};
use crate::risk::PriorityEntry;

/// Everything the institutional report shows, computed up front so the
/// renderer stays a pure formatting step.
pub struct ReportInput<'a> {
    pub source: &'a str,
    pub generated_at: DateTime<Utc>,
    pub rejected: usize,
    pub distributions: &'a ScoreDistributions,
    pub insights: &'a AcademicInsights,
    pub institutional: &'a InstitutionalStats,
    pub priority: &'a [PriorityEntry],
}

pub fn build_report(input: &ReportInput<'_>) -> String {
    let mut output = String::new();
    let summary = &input.institutional.summary;

    let _ = writeln!(output, "# Student Early Warning Report");
    let _ = writeln!(
        output,
        "Generated {} from {}",
        input.generated_at.format("%Y-%m-%d %H:%M UTC"),
        input.source
    );
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "{} students, average grade {:.2}, {} at risk, {:.1}% in Q1-Q2.",
        summary.total_students,
        summary.average_grade,
        summary.students_at_risk,
        summary.percentage_vulnerable
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Mix");
    for level in RiskLevel::ALL {
        let count = input
            .institutional
            .risk_distribution
            .get(&level)
            .copied()
            .unwrap_or(0);
        let _ = writeln!(output, "- {level}: {count} students");
    }
    if let Some(risk) = &input.distributions.risk_score_distribution {
        let _ = writeln!(
            output,
            "- Risk score median {:.1} (Q1 {:.1}, Q3 {:.1}, std {:.1})",
            risk.median, risk.q1, risk.q3, risk.std
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Highest Risk Students");
    if input.priority.is_empty() {
        let _ = writeln!(output, "No students in this data set.");
    } else {
        for entry in input.priority {
            let barriers = if entry.key_barriers.is_empty() {
                "no barriers recorded".to_string()
            } else {
                entry.key_barriers.join(", ")
            };
            let _ = writeln!(
                output,
                "- {} ({}, {}) score {:.1} [{}]: {}",
                entry.name, entry.id, entry.course, entry.risk_score, entry.risk_level, barriers
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Grades by Quintile");
    if input.distributions.grades_by_quintile.is_empty() {
        let _ = writeln!(output, "No graded students with a known quintile.");
    } else {
        let _ = writeln!(output, "| Quintile | Students | Mean | Median | Q1 | Q3 |");
        let _ = writeln!(output, "|---|---|---|---|---|---|");
        for (quintile, stats) in &input.distributions.grades_by_quintile {
            let _ = writeln!(
                output,
                "| {} | {} | {:.2} | {:.2} | {:.2} | {:.2} |",
                quintile, stats.count, stats.mean, stats.median, stats.q1, stats.q3
            );
        }
    }

    let laptop = &input.distributions.laptop_comparison;
    if let (Some(with), Some(without)) = (&laptop.with_laptop, &laptop.without_laptop) {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Laptop Access");
        let _ = writeln!(
            output,
            "- With laptop: mean {:.2} across {} students",
            with.mean, with.count
        );
        let _ = writeln!(
            output,
            "- Without laptop: mean {:.2} across {} students",
            without.mean, without.count
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Subjects at Risk");
    if input.insights.subjects_at_risk.is_empty() {
        let _ = writeln!(output, "No subject grades recorded.");
    } else {
        for subject in &input.insights.subjects_at_risk {
            let _ = writeln!(
                output,
                "- {}: {} of {} students below 7.0 ({:.1}%)",
                subject.subject, subject.at_risk, subject.total_students, subject.risk_percentage
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Most Common Barriers");
    if input.institutional.top_barriers.is_empty() {
        let _ = writeln!(output, "No barriers recorded.");
    } else {
        for point in &input.institutional.top_barriers {
            let _ = writeln!(output, "- {}: {} students", point.name, point.value);
        }
    }

    if input.rejected > 0 || summary.inconsistent_levels > 0 {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Data Quality");
        if input.rejected > 0 {
            let _ = writeln!(
                output,
                "- {} records were rejected during normalization.",
                input.rejected
            );
        }
        if summary.inconsistent_levels > 0 {
            let _ = writeln!(
                output,
                "- {} students carry a risk level that disagrees with their score.",
                summary.inconsistent_levels
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::dashboard::{build_academic_insights, build_institutional_stats, build_score_distributions};
    use crate::normalize::{normalize_batch, Mode};
    use crate::risk::{rank_students, RiskThresholds};

    fn render(raws: &[serde_json::Value], rejected: usize) -> String {
        let records = normalize_batch(raws, Mode::Tolerant).unwrap().records;
        let distributions = build_score_distributions(&records, Mode::Tolerant).unwrap();
        let insights = build_academic_insights(&records);
        let institutional = build_institutional_stats(&records, &RiskThresholds::default());
        let priority = rank_students(&records, None, 10);
        build_report(&ReportInput {
            source: "fixture students.json",
            generated_at: Utc.with_ymd_and_hms(2026, 2, 2, 9, 30, 0).unwrap(),
            rejected,
            distributions: &distributions,
            insights: &insights,
            institutional: &institutional,
            priority: &priority,
        })
    }

    #[test]
    fn report_lists_sections_from_fixture() {
        let raws: Vec<serde_json::Value> =
            serde_json::from_str(include_str!("../fixtures/students.json")).unwrap();
        let report = render(&raws, 0);

        assert!(report.starts_with("# Student Early Warning Report\n"));
        assert!(report.contains("Generated 2026-02-02 09:30 UTC from fixture students.json"));
        assert!(report.contains("## Highest Risk Students"));
        assert!(report.contains("- Estudiante, Crítico A (1, 10mo A) score 85.0 [Critical]"));
        assert!(report.contains("| Quintile | Students |"));
        assert!(report.contains("## Laptop Access"));
        assert!(report.contains("- Sin laptop: 3 students"));
        assert!(report.contains("## Data Quality"));
    }

    #[test]
    fn empty_report_says_so() {
        let report = render(&[], 2);
        assert!(report.contains("No students in this data set."));
        assert!(report.contains("No subject grades recorded."));
        assert!(report.contains("- 2 records were rejected during normalization."));
        assert!(!report.contains("## Laptop Access"));
    }
}
