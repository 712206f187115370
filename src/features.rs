use ndarray::{arr2, Array2};
use serde_json::Value;
use tracing::warn;

use crate::error::{PredictError, Result};
use crate::models::{CourseEntry, DerivedFeatures, FeatureMode, PredictRequest};

/// Course grade bucket to 10-point grade value.
pub const GRADE_POINTS: &[(&str, f64)] = &[
    ("91-100", 10.0),
    ("81-90", 9.0),
    ("71-80", 8.0),
    ("61-70", 7.0),
    ("56-60", 6.0),
    ("51-55", 5.0),
    ("0-50", 2.0),
];

/// Attendance bucket to representative percentage.
pub const ATTENDANCE_VALUES: &[(&str, f64)] = &[
    (">95", 95.0),
    (">85", 85.0),
    (">75", 75.0),
    (">65", 65.0),
    (">50", 50.0),
];

/// CGPA bucket to its midpoint.
pub const CGPA_VALUES: &[(&str, f64)] = &[
    ("9~10", 9.5),
    ("8~9", 8.5),
    ("7~8", 7.5),
    ("6~7", 6.5),
    ("5~6", 5.5),
];

/// Value used for any bucket missing from its table.
pub const UNKNOWN_BUCKET_VALUE: f64 = 0.0;

pub const DEFAULT_INTERNSHIP_CODE: &str = "0";

pub fn encode(table: &[(&str, f64)], bucket: &str) -> f64 {
    table
        .iter()
        .find(|(key, _)| *key == bucket)
        .map(|(_, value)| *value)
        .unwrap_or(UNKNOWN_BUCKET_VALUE)
}

/// Request fields after shape validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawInput {
    pub courses: Vec<CourseEntry>,
    pub attendance_bucket: String,
    pub cgpa_bucket: String,
    pub internship_code: String,
    pub internship_value: f64,
    pub certificate_tokens: Vec<Value>,
}

impl TryFrom<&PredictRequest> for RawInput {
    type Error = PredictError;

    fn try_from(request: &PredictRequest) -> Result<Self> {
        let courses = match request.courses.as_deref() {
            Some(courses) if !courses.is_empty() => courses,
            _ => return Err(PredictError::MissingInput("courses".to_string())),
        };
        let attendance_bucket = required_bucket(request.attendance.as_ref(), "attendance")?;
        let cgpa_bucket = required_bucket(request.cgpa.as_ref(), "cgpa")?;

        let courses = courses
            .iter()
            .map(|course| {
                Ok(CourseEntry {
                    grade_range: course.grade.as_ref().map(bucket_text).unwrap_or_default(),
                    credits: parse_credits(course.credits.as_ref())?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let (internship_value, internship_code) = parse_internship(request.internship.as_ref());

        let certificate_tokens = match &request.certificates {
            Some(Value::Array(tokens)) => tokens.clone(),
            _ => Vec::new(),
        };

        Ok(RawInput {
            courses,
            attendance_bucket,
            cgpa_bucket,
            internship_code,
            internship_value,
            certificate_tokens,
        })
    }
}

/// Null, `""`, `false`, `0` and empty containers count as not supplied.
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
    }
}

/// Non-string buckets keep their JSON text, which no table matches.
fn bucket_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn required_bucket(value: Option<&Value>, field: &str) -> Result<String> {
    match value {
        Some(value) if !is_blank(value) => Ok(bucket_text(value)),
        _ => Err(PredictError::MissingInput(field.to_string())),
    }
}

fn parse_credits(value: Option<&Value>) -> Result<u32> {
    let credits = match value {
        None | Some(Value::Null) => return Ok(0),
        Some(Value::Number(number)) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64)),
        Some(Value::String(text)) => text.trim().parse::<u64>().ok(),
        Some(_) => None,
    };

    credits
        .and_then(|c| u32::try_from(c).ok())
        .ok_or_else(|| PredictError::Unexpected(format!("invalid credit value: {}", describe(value))))
}

/// Numeric value plus the code string kept for recommendation rules.
fn parse_internship(value: Option<&Value>) -> (f64, String) {
    match value {
        None | Some(Value::Null) => (0.0, DEFAULT_INTERNSHIP_CODE.to_string()),
        Some(Value::Number(number)) => {
            let numeric = number.as_f64().filter(|f| f.is_finite()).unwrap_or(0.0);
            (numeric, number.to_string())
        }
        Some(Value::String(code)) => (parse_number(code).unwrap_or(0.0), code.clone()),
        Some(other) => (0.0, other.to_string()),
    }
}

fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

fn parse_certificate(token: &Value) -> Option<f64> {
    match token {
        Value::Number(number) => number.as_f64().filter(|f| f.is_finite()),
        Value::String(text) => parse_number(text),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn describe(value: Option<&Value>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "null".to_string())
}

pub fn average_grade(courses: &[CourseEntry]) -> f64 {
    let mut total_points = 0.0;
    let mut total_credits: u64 = 0;

    for course in courses {
        total_points += encode(GRADE_POINTS, &course.grade_range) * course.credits as f64;
        total_credits += u64::from(course.credits);
    }

    total_points / total_credits.max(1) as f64
}

pub fn certificate_sum(tokens: &[Value]) -> f64 {
    tokens
        .iter()
        .filter_map(|token| {
            let parsed = parse_certificate(token);
            if parsed.is_none() {
                warn!(token = %token, "Invalid certificate value, skipping");
            }
            parsed
        })
        .sum()
}

pub fn derive(input: &RawInput) -> DerivedFeatures {
    DerivedFeatures {
        attendance_value: encode(ATTENDANCE_VALUES, &input.attendance_bucket),
        cgpa_value: encode(CGPA_VALUES, &input.cgpa_bucket),
        avg_grade: average_grade(&input.courses),
        certificate_sum: certificate_sum(&input.certificate_tokens),
        internship_value: input.internship_value,
        internship_code: input.internship_code.clone(),
    }
}

/// Validates the request and derives its features in one step.
pub fn extract(request: &PredictRequest) -> Result<DerivedFeatures> {
    let input = RawInput::try_from(request)?;
    Ok(derive(&input))
}

impl DerivedFeatures {
    /// Single-row matrix laid out for the given mode.
    pub fn vector(&self, mode: FeatureMode) -> Array2<f64> {
        match mode {
            FeatureMode::Legacy => arr2(&[[self.attendance_value, self.cgpa_value, self.avg_grade]]),
            FeatureMode::Extended => arr2(&[[
                self.attendance_value,
                self.cgpa_value,
                self.avg_grade,
                self.certificate_sum,
                self.internship_value,
            ]]),
        }
    }

    pub fn predicted_grade_value(&self) -> f64 {
        self.avg_grade * 10.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CourseRequest;
    use serde_json::json;

    fn course(grade: &str, credits: u32) -> CourseEntry {
        CourseEntry {
            grade_range: grade.to_string(),
            credits,
        }
    }

    fn request(value: serde_json::Value) -> PredictRequest {
        serde_json::from_value(value).unwrap()
    }

    fn base_request() -> serde_json::Value {
        json!({
            "courses": [{"grade": "91-100", "credits": 4}],
            "attendance": ">95",
            "cgpa": "9~10",
        })
    }

    #[test]
    fn average_is_credit_weighted() {
        let courses = vec![course("91-100", 4), course("51-55", 2), course("0-50", 2)];
        let expected = (10.0 * 4.0 + 5.0 * 2.0 + 2.0 * 2.0) / 8.0;
        assert!((average_grade(&courses) - expected).abs() < 1e-9);
    }

    #[test]
    fn zero_credits_average_to_zero() {
        let courses = vec![course("91-100", 0), course("81-90", 0)];
        assert_eq!(average_grade(&courses), 0.0);
    }

    #[test]
    fn unknown_grade_bucket_counts_credits_but_no_points() {
        let courses = vec![course("91-100", 2), course("A+", 2)];
        assert_eq!(average_grade(&courses), 5.0);
    }

    #[test]
    fn unknown_buckets_encode_to_zero() {
        assert_eq!(encode(ATTENDANCE_VALUES, "100%"), 0.0);
        assert_eq!(encode(CGPA_VALUES, "10"), 0.0);
        assert_eq!(encode(GRADE_POINTS, ""), 0.0);
        assert_eq!(encode(ATTENDANCE_VALUES, ">85"), 85.0);
        assert_eq!(encode(CGPA_VALUES, "6~7"), 6.5);
    }

    #[test]
    fn certificate_sum_skips_malformed_tokens() {
        let tokens = vec![json!("3"), json!("abc"), json!("2")];
        assert_eq!(certificate_sum(&tokens), 5.0);

        let mixed = vec![json!(1.5), json!(null), json!(" 2 "), json!("NaN"), json!([1])];
        assert_eq!(certificate_sum(&mixed), 3.5);
        assert_eq!(certificate_sum(&[]), 0.0);
    }

    #[test]
    fn boolean_certificates_count_as_one_or_zero() {
        let tokens = vec![json!(true), json!(false), json!("2")];
        assert_eq!(certificate_sum(&tokens), 3.0);
    }

    #[test]
    fn scenario_top_student_features() {
        let mut body = base_request();
        body["internship"] = json!("0");
        body["certificates"] = json!([]);
        let features = extract(&request(body)).unwrap();

        assert_eq!(features.avg_grade, 10.0);
        assert_eq!(features.attendance_value, 95.0);
        assert_eq!(features.cgpa_value, 9.5);
        assert_eq!(features.certificate_sum, 0.0);
        assert_eq!(features.internship_value, 0.0);
        assert_eq!(features.internship_code, "0");
        assert_eq!(features.predicted_grade_value(), 100.0);
    }

    #[test]
    fn internship_defaults_when_missing_or_unparseable() {
        let features = extract(&request(base_request())).unwrap();
        assert_eq!(features.internship_value, 0.0);
        assert_eq!(features.internship_code, "0");

        let mut body = base_request();
        body["internship"] = json!("unpaid");
        let features = extract(&request(body)).unwrap();
        assert_eq!(features.internship_value, 0.0);
        assert_eq!(features.internship_code, "unpaid");
    }

    #[test]
    fn numeric_internship_keeps_code_form() {
        let mut body = base_request();
        body["internship"] = json!(6);
        let features = extract(&request(body)).unwrap();
        assert_eq!(features.internship_value, 6.0);
        assert_eq!(features.internship_code, "6");
    }

    #[test]
    fn non_list_certificates_are_ignored() {
        let mut body = base_request();
        body["certificates"] = json!("5");
        let features = extract(&request(body)).unwrap();
        assert_eq!(features.certificate_sum, 0.0);
    }

    #[test]
    fn empty_courses_is_missing_input() {
        let mut body = base_request();
        body["courses"] = json!([]);
        body["internship"] = json!("10");
        body["certificates"] = json!(["9"]);
        let err = extract(&request(body)).unwrap_err();
        assert_eq!(err, PredictError::MissingInput("courses".to_string()));
    }

    #[test]
    fn null_or_absent_courses_is_missing_input() {
        let mut body = base_request();
        body["courses"] = json!(null);
        assert_eq!(
            extract(&request(body)).unwrap_err(),
            PredictError::MissingInput("courses".to_string())
        );

        let mut body = base_request();
        body.as_object_mut().unwrap().remove("courses");
        assert_eq!(
            extract(&request(body)).unwrap_err(),
            PredictError::MissingInput("courses".to_string())
        );
    }

    #[test]
    fn non_string_buckets_encode_to_zero() {
        let mut body = base_request();
        body["attendance"] = json!(95);
        body["cgpa"] = json!(9.5);
        body["courses"] = json!([{"grade": 91, "credits": 4}]);
        let features = extract(&request(body)).unwrap();

        assert_eq!(features.attendance_value, 0.0);
        assert_eq!(features.cgpa_value, 0.0);
        assert_eq!(features.avg_grade, 0.0);
    }

    #[test]
    fn falsy_buckets_are_missing_input() {
        for blank in [json!(null), json!(0), json!(false), json!([])] {
            let mut body = base_request();
            body["cgpa"] = blank;
            assert_eq!(
                extract(&request(body)).unwrap_err(),
                PredictError::MissingInput("cgpa".to_string())
            );
        }
    }

    #[test]
    fn empty_or_unset_buckets_are_missing_input() {
        let mut body = base_request();
        body["attendance"] = json!("");
        assert!(matches!(
            extract(&request(body)),
            Err(PredictError::MissingInput(field)) if field == "attendance"
        ));

        let mut body = base_request();
        body.as_object_mut().unwrap().remove("cgpa");
        assert!(matches!(
            extract(&request(body)),
            Err(PredictError::MissingInput(field)) if field == "cgpa"
        ));
    }

    #[test]
    fn credits_accept_loose_forms() {
        assert_eq!(parse_credits(None).unwrap(), 0);
        assert_eq!(parse_credits(Some(&json!("3"))).unwrap(), 3);
        assert_eq!(parse_credits(Some(&json!(4.7))).unwrap(), 4);
        assert!(matches!(
            parse_credits(Some(&json!("three"))),
            Err(PredictError::Unexpected(_))
        ));
        assert!(parse_credits(Some(&json!(-2))).is_err());
    }

    #[test]
    fn course_without_grade_contributes_zero() {
        let req = PredictRequest {
            courses: Some(vec![CourseRequest {
                grade: None,
                credits: Some(json!(3)),
            }]),
            attendance: Some(json!(">75")),
            cgpa: Some(json!("7~8")),
            ..Default::default()
        };
        let features = extract(&req).unwrap();
        assert_eq!(features.avg_grade, 0.0);
    }

    #[test]
    fn vectors_follow_mode_width() {
        let features = DerivedFeatures {
            attendance_value: 85.0,
            cgpa_value: 8.5,
            avg_grade: 7.0,
            certificate_sum: 4.0,
            internship_value: 6.0,
            internship_code: "6".to_string(),
        };
        let legacy = features.vector(FeatureMode::Legacy);
        let extended = features.vector(FeatureMode::Extended);
        assert_eq!(legacy.shape(), &[1, 3]);
        assert_eq!(extended.shape(), &[1, 5]);
        assert_eq!(extended[[0, 3]], 4.0);
        assert_eq!(extended[[0, 4]], 6.0);
    }
}
