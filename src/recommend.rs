use crate::models::DerivedFeatures;

pub const ATTENDANCE_ADVICE: &str = "Improve class attendance to at least 75%";
pub const GRADE_ADVICE: &str = "Focus on improving grades in current courses";
pub const CGPA_ADVICE: &str = "Develop better study habits to improve overall CGPA";
pub const APPLY_INTERNSHIP_ADVICE: &str =
    "Apply for an internship to enhance practical skills and improve employment prospects";
pub const PAID_INTERNSHIP_ADVICE: &str =
    "Aim for an internship at Fortune 500 companies or through institutional connections (SRM/IIT/NIT)";
pub const SMALL_COMPANY_INTERNSHIP_ADVICE: &str =
    "Consider upgrading your internship experience to Fortune 500 companies or through SRM/IIT/NIT programs";
pub const OBTAIN_CERTIFICATION_ADVICE: &str =
    "Obtain industry-recognized certifications to enhance your skills and resume";
pub const HIGHER_CERTIFICATION_ADVICE: &str =
    "Consider higher-value certifications like CISCO, CCNA, or specialized programs through NPTEL";
pub const COUNSELING_ADVICE: &str = "Consider seeking academic counseling or tutoring";
pub const CONTINUE_ADVICE: &str = "Continue with current academic performance";

pub const MIN_ATTENDANCE: f64 = 75.0;
pub const MIN_AVG_GRADE: f64 = 6.0;
pub const MIN_CGPA: f64 = 7.0;
pub const LOW_CERTIFICATE_SUM: f64 = 3.0;
/// At or above this sum no certification advice survives.
pub const STRONG_CERTIFICATE_SUM: f64 = 5.0;

const PAID_INTERNSHIP_CODE: &str = "4";
const SMALL_COMPANY_INTERNSHIP_CODE: &str = "6";

pub fn internship_advice(internship_value: f64, internship_code: &str) -> Option<&'static str> {
    if internship_value == 0.0 {
        Some(APPLY_INTERNSHIP_ADVICE)
    } else if internship_code == PAID_INTERNSHIP_CODE {
        Some(PAID_INTERNSHIP_ADVICE)
    } else if internship_code == SMALL_COMPANY_INTERNSHIP_CODE {
        Some(SMALL_COMPANY_INTERNSHIP_ADVICE)
    } else {
        None
    }
}

pub fn certificate_advice(certificate_sum: f64) -> Option<&'static str> {
    if certificate_sum == 0.0 {
        Some(OBTAIN_CERTIFICATION_ADVICE)
    } else if certificate_sum < LOW_CERTIFICATE_SUM {
        Some(HIGHER_CERTIFICATION_ADVICE)
    } else {
        None
    }
}

pub fn mentions_certification(recommendation: &str) -> bool {
    recommendation.to_lowercase().contains("certification")
}

/// Ordered advice for one student: attendance, grade, cgpa, internship,
/// certificates, counseling, then the fallback when nothing else applied.
pub fn recommend(features: &DerivedFeatures, risk_index: usize) -> Vec<String> {
    let mut recommendations: Vec<String> = Vec::new();

    if features.attendance_value < MIN_ATTENDANCE {
        recommendations.push(ATTENDANCE_ADVICE.to_string());
    }

    if features.avg_grade < MIN_AVG_GRADE {
        recommendations.push(GRADE_ADVICE.to_string());
    }

    if features.cgpa_value < MIN_CGPA {
        recommendations.push(CGPA_ADVICE.to_string());
    }

    if let Some(advice) = internship_advice(features.internship_value, &features.internship_code) {
        recommendations.push(advice.to_string());
    }

    if let Some(advice) = certificate_advice(features.certificate_sum) {
        recommendations.push(advice.to_string());
    }

    // Runs after every rule above has added its advice.
    if features.certificate_sum >= STRONG_CERTIFICATE_SUM {
        recommendations.retain(|rec| !mentions_certification(rec));
    }

    if risk_index >= 1 {
        recommendations.push(COUNSELING_ADVICE.to_string());
    }

    if recommendations.is_empty() {
        recommendations.push(CONTINUE_ADVICE.to_string());
    }

    recommendations
}
