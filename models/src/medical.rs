// models/src/medical.rs
//
// Relational-side domain records consumed by the ETL and scoring layers.
// These mirror the read-only source tables; the graph projection of the
// same entities lives in `graph.rs`.
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// Clinical urgency of a case. Also doubles as a complexity proxy in
/// priority scoring.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UrgencyLevel {
    Critical,
    High,
    Medium,
    Low,
}

impl UrgencyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrgencyLevel::Critical => "CRITICAL",
            UrgencyLevel::High => "HIGH",
            UrgencyLevel::Medium => "MEDIUM",
            UrgencyLevel::Low => "LOW",
        }
    }

    /// Weight used by urgency-sensitive scoring.
    pub fn score(&self) -> f64 {
        match self {
            UrgencyLevel::Critical => 1.0,
            UrgencyLevel::High => 0.75,
            UrgencyLevel::Medium => 0.5,
            UrgencyLevel::Low => 0.25,
        }
    }
}

impl FromStr for UrgencyLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CRITICAL" => Ok(UrgencyLevel::Critical),
            "HIGH" => Ok(UrgencyLevel::High),
            "MEDIUM" => Ok(UrgencyLevel::Medium),
            "LOW" => Ok(UrgencyLevel::Low),
            other => Err(ValidationError::InvalidUrgencyLevel(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub specialties: Vec<String>,
    #[serde(default)]
    pub facility_ids: Vec<String>,
    #[serde(default)]
    pub telehealth_enabled: bool,
    #[serde(default)]
    pub years_experience: Option<i32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MedicalCase {
    pub id: String,
    pub chief_complaint: String,
    #[serde(default)]
    pub icd10_codes: Vec<String>,
    #[serde(default)]
    pub required_specialty: Option<String>,
    #[serde(default)]
    pub urgency_level: Option<UrgencyLevel>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub facility_type: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub capacity: Option<i32>,
    #[serde(default)]
    pub current_occupancy: Option<i32>,
}

/// A doctor's recorded involvement in a past case, with outcome and an
/// optional 1-5 rating. Source of the historical-performance signal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClinicalExperience {
    pub id: String,
    pub doctor_id: String,
    pub case_id: String,
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
}

impl ClinicalExperience {
    /// Outcomes that count toward the success rate.
    pub fn is_successful(&self) -> bool {
        self.outcome
            .as_deref()
            .map(|o| o.eq_ignore_ascii_case("SUCCESS") || o.eq_ignore_ascii_case("IMPROVED"))
            .unwrap_or(false)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MedicalSpecialty {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Icd10Code {
    pub code: String,
    pub description: String,
}
