use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Prediction request as sent by the client. Field types stay loose here and
/// are tightened once by `features::RawInput::try_from`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub courses: Option<Vec<CourseRequest>>,
    #[serde(default)]
    pub attendance: Option<Value>,
    #[serde(default)]
    pub cgpa: Option<Value>,
    #[serde(default)]
    pub internship: Option<Value>,
    #[serde(default)]
    pub certificates: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourseRequest {
    #[serde(default)]
    pub grade: Option<Value>,
    #[serde(default)]
    pub credits: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CourseEntry {
    pub grade_range: String,
    pub credits: u32,
}

/// Scalars derived from one request, before they are laid out as a vector.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedFeatures {
    pub attendance_value: f64,
    pub cgpa_value: f64,
    pub avg_grade: f64,
    pub certificate_sum: f64,
    pub internship_value: f64,
    pub internship_code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureMode {
    /// `[attendance, cgpa, avg_grade]`
    Legacy,
    /// `[attendance, cgpa, avg_grade, certificate_sum, internship]`
    Extended,
}

impl FeatureMode {
    pub fn width(self) -> usize {
        match self {
            FeatureMode::Legacy => 3,
            FeatureMode::Extended => 5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FeatureMode::Legacy => "legacy",
            FeatureMode::Extended => "extended",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    pub predicted_grade: String,
    pub performance_category: String,
    pub risk_level: String,
    pub recommendations: Vec<String>,
    pub predicted_grade_value: f64,
}

#[derive(Debug, Clone)]
pub struct StudentOutcome {
    pub student: String,
    pub risk_index: usize,
    pub result: PredictionResult,
}

#[derive(Debug, Clone)]
pub struct RiskSummary {
    pub risk_level: String,
    pub count: usize,
    pub avg_grade_value: f64,
}

#[derive(Debug, Clone)]
pub struct RecommendationSummary {
    pub recommendation: String,
    pub count: usize,
}
