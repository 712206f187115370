use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{info_span, warn};
use uuid::Uuid;

use crate::artifacts::ModelContext;
use crate::models::{CourseRequest, PredictRequest, StudentOutcome};
use crate::pipeline;

/// One student per CSV row. `courses` holds `grade:credits` pairs and
/// `certificates` holds tokens, both separated by `;`.
#[derive(Debug, Clone, Deserialize)]
pub struct StudentRow {
    pub student: String,
    pub courses: String,
    pub attendance: String,
    pub cgpa: String,
    #[serde(default)]
    pub internship: Option<String>,
    #[serde(default)]
    pub certificates: Option<String>,
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub outcomes: Vec<StudentOutcome>,
    pub failures: Vec<(String, String)>,
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(';').map(str::trim).filter(|item| !item.is_empty())
}

impl StudentRow {
    pub fn to_request(&self) -> PredictRequest {
        let courses = split_list(&self.courses)
            .map(|pair| {
                let (grade, credits) = pair.split_once(':').unwrap_or((pair, ""));
                CourseRequest {
                    grade: Some(Value::String(grade.trim().to_string())),
                    credits: match credits.trim() {
                        "" => None,
                        text => Some(Value::String(text.to_string())),
                    },
                }
            })
            .collect();

        let certificates = self.certificates.as_deref().map(|tokens| {
            Value::Array(
                split_list(tokens)
                    .map(|token| Value::String(token.to_string()))
                    .collect(),
            )
        });

        PredictRequest {
            courses: Some(courses),
            attendance: Some(Value::String(self.attendance.trim().to_string())),
            cgpa: Some(Value::String(self.cgpa.trim().to_string())),
            internship: self
                .internship
                .as_deref()
                .map(str::trim)
                .filter(|code| !code.is_empty())
                .map(|code| Value::String(code.to_string())),
            certificates,
        }
    }
}

pub fn read_rows(csv_path: &Path) -> anyhow::Result<Vec<StudentRow>> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut rows = Vec::new();

    for (index, result) in reader.deserialize::<StudentRow>().enumerate() {
        let row = result.with_context(|| format!("invalid CSV row {}", index + 1))?;
        rows.push(row);
    }

    Ok(rows)
}

/// Scores every row on its own task. The context is only ever read.
pub async fn score_rows(
    context: Arc<ModelContext>,
    rows: Vec<StudentRow>,
) -> anyhow::Result<BatchOutcome> {
    let mut tasks = JoinSet::new();

    for (position, row) in rows.into_iter().enumerate() {
        let context = Arc::clone(&context);
        tasks.spawn(async move {
            let request_id = Uuid::new_v4();
            let span = info_span!("predict", %request_id, student = %row.student);
            let evaluation = span.in_scope(|| pipeline::evaluate(&context, &row.to_request()));
            (position, row.student, evaluation)
        });
    }

    let mut scored = Vec::new();
    let mut batch = BatchOutcome::default();

    while let Some(joined) = tasks.join_next().await {
        let (position, student, evaluation) = joined.context("scoring task panicked")?;
        match evaluation {
            Ok(evaluation) => scored.push((
                position,
                StudentOutcome {
                    student,
                    risk_index: evaluation.inference.risk_index,
                    result: evaluation.result,
                },
            )),
            Err(err) => {
                warn!(student = %student, error = %err, "Skipping row that failed to score");
                batch.failures.push((student, err.to_string()));
            }
        }
    }

    scored.sort_by_key(|(position, _)| *position);
    batch.outcomes = scored.into_iter().map(|(_, outcome)| outcome).collect();
    Ok(batch)
}

pub fn rank_by_risk(outcomes: &[StudentOutcome]) -> Vec<StudentOutcome> {
    let mut ranked = outcomes.to_vec();
    ranked.sort_by(|a, b| {
        b.risk_index
            .cmp(&a.risk_index)
            .then_with(|| {
                a.result
                    .predicted_grade_value
                    .partial_cmp(&b.result.predicted_grade_value)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.student.cmp(&b.student))
    });
    ranked
}
