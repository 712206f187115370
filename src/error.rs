use serde_json::json;
use thiserror::Error;

/// Failures a single prediction can end in.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictError {
    /// A required request field is absent or empty
    #[error("Missing required data: {0}")]
    MissingInput(String),

    /// Feature matrix width differs from what a model was fit on
    #[error("Feature width mismatch: expected {expected}, got {actual}")]
    Shape { expected: usize, actual: usize },

    /// Inference failed even after the legacy-width retry
    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

pub type Result<T> = std::result::Result<T, PredictError>;

impl PredictError {
    pub fn status_code(&self) -> u16 {
        match self {
            PredictError::MissingInput(_) => 400,
            PredictError::Shape { .. } => 500,
            PredictError::Inference(_) => 500,
            PredictError::Unexpected(_) => 500,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            PredictError::MissingInput(_) => "MISSING_INPUT",
            PredictError::Shape { .. } => "SHAPE_MISMATCH",
            PredictError::Inference(_) => "INFERENCE_ERROR",
            PredictError::Unexpected(_) => "UNEXPECTED_ERROR",
        }
    }

    /// Error body returned in place of a prediction.
    pub fn to_payload(&self) -> serde_json::Value {
        json!({ "error": self.to_string() })
    }
}

impl From<serde_json::Error> for PredictError {
    fn from(err: serde_json::Error) -> Self {
        PredictError::Unexpected(format!("invalid request body: {err}"))
    }
}
