use std::collections::HashMap;
use std::fmt::Write;

use chrono::NaiveDate;

use crate::batch;
use crate::inference::RISK_LEVELS;
use crate::models::{RecommendationSummary, RiskSummary, StudentOutcome};

/// Risk levels from highest to lowest, with the mean predicted grade value.
pub fn summarize_by_risk(outcomes: &[StudentOutcome]) -> Vec<RiskSummary> {
    let mut totals = [(0usize, 0.0f64); RISK_LEVELS.len()];

    for outcome in outcomes {
        let entry = &mut totals[outcome.risk_index.min(RISK_LEVELS.len() - 1)];
        entry.0 += 1;
        entry.1 += outcome.result.predicted_grade_value;
    }

    totals
        .iter()
        .enumerate()
        .rev()
        .filter(|(_, (count, _))| *count > 0)
        .map(|(index, (count, total))| RiskSummary {
            risk_level: RISK_LEVELS[index].to_string(),
            count: *count,
            avg_grade_value: total / *count as f64,
        })
        .collect()
}

pub fn summarize_recommendations(outcomes: &[StudentOutcome]) -> Vec<RecommendationSummary> {
    let mut map: HashMap<&str, usize> = HashMap::new();

    for outcome in outcomes {
        for recommendation in &outcome.result.recommendations {
            *map.entry(recommendation.as_str()).or_insert(0) += 1;
        }
    }

    let mut summaries: Vec<RecommendationSummary> = map
        .into_iter()
        .map(|(recommendation, count)| RecommendationSummary {
            recommendation: recommendation.to_string(),
            count,
        })
        .collect();

    summaries.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.recommendation.cmp(&b.recommendation))
    });
    summaries
}

pub fn build_report(
    source: &str,
    generated_on: NaiveDate,
    outcomes: &[StudentOutcome],
    failures: &[(String, String)],
) -> String {
    let risk_mix = summarize_by_risk(outcomes);
    let ranked = batch::rank_by_risk(outcomes);
    let recommendations = summarize_recommendations(outcomes);

    let mut output = String::new();

    let _ = writeln!(output, "# Student Outcome Report");
    let _ = writeln!(
        output,
        "Generated on {} from {} ({} students scored)",
        generated_on,
        source,
        outcomes.len()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Mix");

    if risk_mix.is_empty() {
        let _ = writeln!(output, "No students scored.");
    } else {
        for summary in risk_mix.iter() {
            let _ = writeln!(
                output,
                "- {}: {} students (avg predicted grade {:.1})",
                summary.risk_level, summary.count, summary.avg_grade_value
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Highest Risk Students");

    if ranked.is_empty() {
        let _ = writeln!(output, "No students scored.");
    } else {
        for outcome in ranked.iter().take(10) {
            let _ = writeln!(
                output,
                "- {}: {}, {} ({}, predicted grade {:.1})",
                outcome.student,
                outcome.result.risk_level,
                outcome.result.performance_category,
                outcome.result.predicted_grade,
                outcome.result.predicted_grade_value
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Common Recommendations");

    if recommendations.is_empty() {
        let _ = writeln!(output, "No recommendations issued.");
    } else {
        for summary in recommendations.iter().take(5) {
            let _ = writeln!(output, "- {} ({} students)", summary.recommendation, summary.count);
        }
    }

    if !failures.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Rows Not Scored");
        for (student, reason) in failures {
            let _ = writeln!(output, "- {}: {}", student, reason);
        }
    }

    output
}
