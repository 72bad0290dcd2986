// models/src/matching.rs
//
// Options and result records for the matching and routing services.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::medical::{Doctor, Facility};

fn default_max_results() -> usize {
    10
}

/// Options for doctor matching. All filters are exclusionary, never
/// score-adjusting.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchOptions {
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default)]
    pub min_score: Option<f64>,
    #[serde(default)]
    pub preferred_specialties: Vec<String>,
    #[serde(default)]
    pub require_telehealth: bool,
    #[serde(default)]
    pub preferred_facility_ids: Vec<String>,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            min_score: None,
            preferred_specialties: Vec::new(),
            require_telehealth: false,
            preferred_facility_ids: Vec::new(),
        }
    }
}

/// Options for facility routing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoutingOptions {
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default)]
    pub min_score: Option<f64>,
    #[serde(default)]
    pub preferred_facility_types: Vec<String>,
    #[serde(default)]
    pub required_capabilities: Vec<String>,
    #[serde(default)]
    pub max_distance_km: Option<f64>,
}

impl Default for RoutingOptions {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            min_score: None,
            preferred_facility_types: Vec::new(),
            required_capabilities: Vec::new(),
            max_distance_km: None,
        }
    }
}

/// Composite doctor/case score on the 0-100 scale, with the 0-1
/// component signals it was combined from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub overall_score: f64,
    pub vector_score: f64,
    pub graph_score: f64,
    pub historical_score: f64,
    pub rationale: String,
}

/// Composite facility routing score on the 0-100 scale.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteScoreResult {
    pub overall_score: f64,
    pub complexity_score: f64,
    pub historical_outcomes_score: f64,
    pub capacity_score: f64,
    pub geographic_score: f64,
    pub rationale: String,
}

/// Case priority on the 0-100 scale.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriorityScore {
    pub overall_score: f64,
    pub urgency_score: f64,
    pub complexity_score: f64,
    pub availability_score: f64,
    pub rationale: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DoctorMatch {
    pub doctor: Doctor,
    pub match_score: f64,
    pub rank: usize,
    pub rationale: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FacilityMatch {
    pub facility: Facility,
    pub route_score: f64,
    pub rank: usize,
    pub rationale: String,
}

/// Persisted match record: one per surviving candidate per ranking run,
/// kept as an audit trail rather than deduplicated across runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConsultationMatch {
    pub id: String,
    pub case_id: String,
    pub doctor_id: String,
    pub match_score: f64,
    pub rationale: String,
    pub rank: usize,
    pub status: String,
    pub computed_at: DateTime<Utc>,
}

impl ConsultationMatch {
    pub fn pending(case_id: &str, doctor_id: &str, match_score: f64, rationale: &str, rank: usize) -> Self {
        Self {
            id: crate::identifiers::generate_record_id(),
            case_id: case_id.to_string(),
            doctor_id: doctor_id.to_string(),
            match_score,
            rationale: rationale.to_string(),
            rank,
            status: "PENDING".to_string(),
            computed_at: Utc::now(),
        }
    }
}
