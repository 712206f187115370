use ndarray::Array2;
use tracing::{debug, warn};

use crate::artifacts::ModelContext;
use crate::error::{PredictError, Result};
use crate::models::{DerivedFeatures, FeatureMode};

pub const GRADE_BANDS: [&str; 6] = [
    "F (Below 50%)",
    "C to B (50-60%)",
    "B to B+ (60-70%)",
    "B+ to A (70-80%)",
    "A to A+ (80-90%)",
    "A+ to O (90-100%)",
];

pub const RISK_LEVELS: [&str; 3] = ["Low Risk", "Moderate Risk", "High Risk"];

pub const PERFORMANCE_CATEGORIES: [&str; 3] = [
    "Performing Well",
    "Needs Improvement",
    "Needs Immediate Intervention",
];

pub trait Classifier: Send + Sync {
    /// Predict one raw class index per row. Indices are not range-checked.
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<i64>>;

    fn expected_input_width(&self) -> Option<usize> {
        None
    }
}

pub trait Scaler: Send + Sync {
    /// Fails with `PredictError::Shape` when the width differs from the fit width.
    fn transform(&self, features: &Array2<f64>) -> Result<Array2<f64>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferenceOutcome {
    pub mode: FeatureMode,
    pub grade_index: usize,
    pub risk_index: usize,
}

impl InferenceOutcome {
    pub fn predicted_grade(&self) -> &'static str {
        GRADE_BANDS[self.grade_index]
    }

    pub fn risk_level(&self) -> &'static str {
        RISK_LEVELS[self.risk_index]
    }

    pub fn performance_category(&self) -> &'static str {
        PERFORMANCE_CATEGORIES[self.risk_index]
    }
}

pub fn clamp_index(raw: i64, len: usize) -> usize {
    let max = len.saturating_sub(1) as i64;
    raw.clamp(0, max) as usize
}

pub fn select_mode(grade: &dyn Classifier) -> FeatureMode {
    match grade.expected_input_width() {
        Some(width) if width == FeatureMode::Legacy.width() => FeatureMode::Legacy,
        _ => FeatureMode::Extended,
    }
}

/// Scales the mode's vector, retrying once with the legacy vector on a width
/// mismatch. Returns the mode that was actually scaled.
pub fn scale_features(
    scaler: &dyn Scaler,
    features: &DerivedFeatures,
    mode: FeatureMode,
) -> Result<(FeatureMode, Array2<f64>)> {
    match scaler.transform(&features.vector(mode)) {
        Ok(scaled) => Ok((mode, scaled)),
        Err(PredictError::Shape { expected, actual }) => {
            warn!(
                expected,
                actual, "Scaling failed on feature width, falling back to legacy features"
            );
            scaler
                .transform(&features.vector(FeatureMode::Legacy))
                .map(|scaled| (FeatureMode::Legacy, scaled))
                .map_err(|err| {
                    PredictError::Inference(format!("legacy feature retry failed: {err}"))
                })
        }
        Err(other) => Err(other),
    }
}

fn first_class(classifier: &dyn Classifier, scaled: &Array2<f64>, name: &str) -> Result<i64> {
    let predictions = classifier.predict(scaled).map_err(|err| match err {
        PredictError::Shape { .. } => PredictError::Inference(format!("{name} classifier: {err}")),
        other => other,
    })?;

    predictions
        .first()
        .copied()
        .ok_or_else(|| PredictError::Inference(format!("{name} classifier returned no prediction")))
}

pub fn infer(context: &ModelContext, features: &DerivedFeatures) -> Result<InferenceOutcome> {
    let requested = select_mode(context.grade());
    debug!(mode = requested.label(), "Selected feature mode");

    let (mode, scaled) = scale_features(context.scaler(), features, requested)?;

    let grade_raw = first_class(context.grade(), &scaled, "grade")?;
    let risk_raw = first_class(context.risk(), &scaled, "risk")?;
    debug!(grade_raw, risk_raw, mode = mode.label(), "Raw class indices");

    Ok(InferenceOutcome {
        mode,
        grade_index: clamp_index(grade_raw, GRADE_BANDS.len()),
        risk_index: clamp_index(risk_raw, RISK_LEVELS.len()),
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub struct FixedClassifier {
        pub width: Option<usize>,
        pub class: i64,
    }

    impl Classifier for FixedClassifier {
        fn predict(&self, features: &Array2<f64>) -> Result<Vec<i64>> {
            if let Some(expected) = self.width {
                if features.ncols() != expected {
                    return Err(PredictError::Shape {
                        expected,
                        actual: features.ncols(),
                    });
                }
            }
            Ok(vec![self.class; features.nrows()])
        }

        fn expected_input_width(&self) -> Option<usize> {
            self.width
        }
    }

    pub struct WidthScaler {
        pub width: usize,
    }

    impl Scaler for WidthScaler {
        fn transform(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
            if features.ncols() != self.width {
                return Err(PredictError::Shape {
                    expected: self.width,
                    actual: features.ncols(),
                });
            }
            Ok(features.clone())
        }
    }

    pub fn context(
        grade_width: Option<usize>,
        grade_class: i64,
        risk_class: i64,
        scaler_width: usize,
    ) -> ModelContext {
        ModelContext::new(
            Box::new(FixedClassifier {
                width: grade_width,
                class: grade_class,
            }),
            Box::new(FixedClassifier {
                width: None,
                class: risk_class,
            }),
            Box::new(WidthScaler {
                width: scaler_width,
            }),
        )
    }
}
