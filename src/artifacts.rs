use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PredictError, Result};
use crate::inference::{select_mode, Classifier, Scaler};

pub struct ModelContext {
    grade: Box<dyn Classifier>,
    risk: Box<dyn Classifier>,
    scaler: Box<dyn Scaler>,
    source: Option<PathBuf>,
}

impl ModelContext {
    pub fn new(
        grade: Box<dyn Classifier>,
        risk: Box<dyn Classifier>,
        scaler: Box<dyn Scaler>,
    ) -> Self {
        Self {
            grade,
            risk,
            scaler,
            source: None,
        }
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read model artifacts at {}", path.display()))?;
        let bundle: ArtifactBundle = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse model artifacts at {}", path.display()))?;

        let mut context = bundle.into_context()?;
        context.source = Some(path.to_path_buf());
        info!(
            path = %path.display(),
            grade_width = ?context.grade.expected_input_width(),
            mode = select_mode(context.grade()).label(),
            "Models loaded"
        );
        Ok(context)
    }

    pub fn reload(&self) -> anyhow::Result<Self> {
        match &self.source {
            Some(path) => Self::from_path(path),
            None => bail!("model context was not loaded from a file and cannot be reloaded"),
        }
    }

    pub fn grade(&self) -> &dyn Classifier {
        self.grade.as_ref()
    }

    pub fn risk(&self) -> &dyn Classifier {
        self.risk.as_ref()
    }

    pub fn scaler(&self) -> &dyn Scaler {
        self.scaler.as_ref()
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactBundle {
    pub scaler: StandardScaler,
    pub grade_model: LinearClassifier,
    pub risk_model: LinearClassifier,
}

impl ArtifactBundle {
    pub fn into_context(self) -> anyhow::Result<ModelContext> {
        self.scaler.validate().context("invalid scaler")?;
        self.grade_model.validate().context("invalid grade model")?;
        self.risk_model.validate().context("invalid risk model")?;

        Ok(ModelContext::new(
            Box::new(self.grade_model),
            Box::new(self.risk_model),
            Box::new(self.scaler),
        ))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn width(&self) -> usize {
        self.mean.len()
    }

    fn validate(&self) -> anyhow::Result<()> {
        ensure!(!self.mean.is_empty(), "scaler has no features");
        ensure!(
            self.mean.len() == self.scale.len(),
            "mean has {} entries but scale has {}",
            self.mean.len(),
            self.scale.len()
        );
        ensure!(
            self.mean.iter().chain(&self.scale).all(|v| v.is_finite()),
            "scaler contains non-finite values"
        );
        Ok(())
    }
}

impl Scaler for StandardScaler {
    fn transform(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        if features.ncols() != self.width() {
            return Err(PredictError::Shape {
                expected: self.width(),
                actual: features.ncols(),
            });
        }

        let mean = Array1::from(self.mean.clone());
        // Constant features were fit with zero variance.
        let scale = Array1::from_iter(self.scale.iter().map(|s| if *s == 0.0 { 1.0 } else { *s }));
        Ok((features - &mean) / &scale)
    }
}

/// Linear one-score-per-class model; the highest scoring class wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearClassifier {
    pub classes: Vec<i64>,
    pub weights: Vec<Vec<f64>>,
    pub intercepts: Vec<f64>,
}

impl LinearClassifier {
    pub fn width(&self) -> usize {
        self.weights.first().map(Vec::len).unwrap_or(0)
    }

    fn validate(&self) -> anyhow::Result<()> {
        ensure!(!self.classes.is_empty(), "model has no classes");
        ensure!(
            self.weights.len() == self.classes.len() && self.intercepts.len() == self.classes.len(),
            "expected {} weight rows and intercepts, got {} and {}",
            self.classes.len(),
            self.weights.len(),
            self.intercepts.len()
        );
        let width = self.width();
        ensure!(width > 0, "model has no features");
        ensure!(
            self.weights.iter().all(|row| row.len() == width),
            "weight rows differ in width"
        );
        ensure!(
            self.weights
                .iter()
                .flatten()
                .chain(&self.intercepts)
                .all(|v| v.is_finite()),
            "model contains non-finite values"
        );
        Ok(())
    }

    fn weight_matrix(&self) -> Result<Array2<f64>> {
        let flat: Vec<f64> = self.weights.iter().flatten().copied().collect();
        Array2::from_shape_vec((self.classes.len(), self.width()), flat)
            .map_err(|err| PredictError::Unexpected(format!("malformed weights: {err}")))
    }
}

impl Classifier for LinearClassifier {
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<i64>> {
        if features.ncols() != self.width() {
            return Err(PredictError::Shape {
                expected: self.width(),
                actual: features.ncols(),
            });
        }

        let intercepts = Array1::from(self.intercepts.clone());
        let scores = features.dot(&self.weight_matrix()?.t()) + &intercepts;

        Ok(scores
            .axis_iter(Axis(0))
            .map(|row| {
                let best = row
                    .iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |best, (index, score)| {
                        if *score > best.1 {
                            (index, *score)
                        } else {
                            best
                        }
                    })
                    .0;
                self.classes[best]
            })
            .collect())
    }

    fn expected_input_width(&self) -> Option<usize> {
        Some(self.width())
    }
}
