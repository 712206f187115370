use tracing::{error, info, info_span, warn};
use uuid::Uuid;

use crate::artifacts::ModelContext;
use crate::error::{PredictError, Result};
use crate::features;
use crate::inference::{self, InferenceOutcome};
use crate::models::{DerivedFeatures, PredictRequest, PredictionResult};
use crate::recommend;

#[derive(Debug, Clone)]
pub struct Evaluation {
    pub features: DerivedFeatures,
    pub inference: InferenceOutcome,
    pub result: PredictionResult,
}

pub fn evaluate(context: &ModelContext, request: &PredictRequest) -> Result<Evaluation> {
    let features = features::extract(request)?;
    let inference = inference::infer(context, &features)?;

    let result = PredictionResult {
        predicted_grade: inference.predicted_grade().to_string(),
        performance_category: inference.performance_category().to_string(),
        risk_level: inference.risk_level().to_string(),
        recommendations: recommend::recommend(&features, inference.risk_index),
        predicted_grade_value: features.predicted_grade_value(),
    };

    Ok(Evaluation {
        features,
        inference,
        result,
    })
}

/// Runs one JSON request body end to end and returns the status code with the
/// response body.
pub fn handle_request(context: &ModelContext, body: &str) -> (u16, serde_json::Value) {
    let request_id = Uuid::new_v4();
    let span = info_span!("predict", %request_id);
    let _guard = span.enter();

    let outcome = serde_json::from_str::<PredictRequest>(body)
        .map_err(PredictError::from)
        .and_then(|request| evaluate(context, &request));

    match outcome {
        Ok(evaluation) => {
            info!(
                mode = evaluation.inference.mode.label(),
                avg_grade = evaluation.features.avg_grade,
                predicted_grade = %evaluation.result.predicted_grade,
                risk_level = %evaluation.result.risk_level,
                recommendations = evaluation.result.recommendations.len(),
                "Prediction complete"
            );
            match serde_json::to_value(&evaluation.result) {
                Ok(value) => (200, value),
                Err(err) => {
                    let err = PredictError::Unexpected(format!("failed to encode result: {err}"));
                    error!(error = ?err, "Failed to encode prediction");
                    (err.status_code(), err.to_payload())
                }
            }
        }
        Err(err @ PredictError::MissingInput(_)) => {
            warn!(error = %err, "Rejected prediction request");
            (err.status_code(), err.to_payload())
        }
        Err(err) => {
            error!(
                error = ?err,
                code = err.error_code(),
                body = %body,
                "Error processing prediction"
            );
            (err.status_code(), err.to_payload())
        }
    }
}
