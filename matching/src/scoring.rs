// matching/src/scoring.rs
//
// Weighted composites over the individual signals. All component scores
// live on [0, 1]; the published scores are scaled to 0-100. Component
// failures degrade to a floor score instead of propagating, so one bad
// read never sinks a whole ranking request.
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use models::errors::GraphResult;
use models::matching::{PriorityScore, RouteScoreResult, ScoreResult};
use models::medical::{ClinicalExperience, Doctor, Facility, MedicalCase, UrgencyLevel};

use crate::repositories::{DoctorRepository, ExperienceRepository};
use crate::signals::SignalScorer;

const VECTOR_WEIGHT: f64 = 0.4;
const GRAPH_WEIGHT: f64 = 0.3;
const HISTORICAL_WEIGHT: f64 = 0.3;

const DIRECT_WEIGHT: f64 = 0.4;
const CONDITION_WEIGHT: f64 = 0.25;
const SPECIALIZATION_WEIGHT: f64 = 0.25;
const SIMILAR_WEIGHT: f64 = 0.1;

const COMPLEXITY_WEIGHT: f64 = 0.3;
const OUTCOMES_WEIGHT: f64 = 0.3;
const CAPACITY_WEIGHT: f64 = 0.2;
const GEOGRAPHIC_WEIGHT: f64 = 0.2;

const URGENCY_WEIGHT: f64 = 0.5;
const PRIORITY_COMPLEXITY_WEIGHT: f64 = 0.3;
const AVAILABILITY_WEIGHT: f64 = 0.2;

/// Ratings live on a 1-5 scale; missing ratings default to mid-range.
const DEFAULT_AVERAGE_RATING: f64 = 2.5;
/// Low (not neutral) score for a doctor with no history at all.
const NO_HISTORY_SCORE: f64 = 0.1;
/// Geographic proximity is not wired to a distance source yet, so the
/// factor is held at the neutral baseline.
const GEOGRAPHIC_BASELINE: f64 = 0.5;
/// Doctor availability has no calendar source yet.
const AVAILABILITY_BASELINE: f64 = 0.5;
/// Cap on affiliated doctors consulted for facility outcome history.
const FACILITY_DOCTOR_LIMIT: usize = 500;

/// Semantic similarity between a case and a doctor's body of work,
/// on [0, 1]. Implementations without evidence for the pair return the
/// low-confidence baseline 0.1 rather than zero.
#[async_trait]
pub trait SimilaritySource: Send + Sync {
    async fn case_doctor_similarity(&self, case: &MedicalCase, doctor: &Doctor) -> GraphResult<f64>;
}

/// Similarity source for deployments without an embedding backend:
/// every pair gets the low-confidence baseline.
pub struct BaselineSimilarity;

#[async_trait]
impl SimilaritySource for BaselineSimilarity {
    async fn case_doctor_similarity(&self, _case: &MedicalCase, _doctor: &Doctor) -> GraphResult<f64> {
        Ok(NO_HISTORY_SCORE)
    }
}

pub struct CompositeScorer {
    signals: SignalScorer,
    similarity: Arc<dyn SimilaritySource>,
    doctors: Arc<dyn DoctorRepository>,
    experiences: Arc<dyn ExperienceRepository>,
}

impl CompositeScorer {
    pub fn new(
        signals: SignalScorer,
        similarity: Arc<dyn SimilaritySource>,
        doctors: Arc<dyn DoctorRepository>,
        experiences: Arc<dyn ExperienceRepository>,
    ) -> Self {
        Self { signals, similarity, doctors, experiences }
    }

    /// Composite doctor score: vector similarity, relationship signals
    /// and historical performance, weighted onto the 0-100 scale.
    pub async fn score_doctor(&self, case: &MedicalCase, doctor: &Doctor) -> ScoreResult {
        let vector_score = match self.similarity.case_doctor_similarity(case, doctor).await {
            Ok(score) => score.clamp(0.0, 1.0),
            Err(err) => {
                warn!("similarity scoring failed for doctor {}: {err}", doctor.id);
                0.0
            }
        };
        let graph_score = match self.graph_relationship_score(case, &doctor.id).await {
            Ok(score) => score,
            Err(err) => {
                warn!("graph scoring failed for doctor {}: {err}", doctor.id);
                0.0
            }
        };
        let historical_score = match self.historical_performance_score(&doctor.id).await {
            Ok(score) => score,
            Err(err) => {
                warn!("historical scoring failed for doctor {}: {err}", doctor.id);
                0.0
            }
        };

        let overall_score = (vector_score * VECTOR_WEIGHT
            + graph_score * GRAPH_WEIGHT
            + historical_score * HISTORICAL_WEIGHT)
            * 100.0;
        let rationale = format!(
            "Vector similarity: {vector_score:.2}, Graph relationships: {graph_score:.2}, Historical performance: {historical_score:.2}"
        );
        ScoreResult { overall_score, vector_score, graph_score, historical_score, rationale }
    }

    /// Weighted blend of the four relationship signals, clamped to [0, 1].
    pub async fn graph_relationship_score(&self, case: &MedicalCase, doctor_id: &str) -> GraphResult<f64> {
        let direct = self.signals.direct_relationship_score(doctor_id, &case.id).await?;
        let condition = self.signals.condition_expertise_score(doctor_id, &case.icd10_codes).await?;
        let specialization = self
            .signals
            .specialization_score(doctor_id, case.required_specialty.as_deref())
            .await?;
        let similar = self.signals.similar_cases_score(doctor_id, &case.icd10_codes).await?;
        debug!(
            "graph signals for doctor {doctor_id} on case {}: direct={direct:.2} condition={condition:.2} specialization={specialization:.2} similar={similar:.2}",
            case.id
        );
        let combined = direct * DIRECT_WEIGHT
            + condition * CONDITION_WEIGHT
            + specialization * SPECIALIZATION_WEIGHT
            + similar * SIMILAR_WEIGHT;
        Ok(combined.clamp(0.0, 1.0))
    }

    /// Rating and success-rate blend over the doctor's clinical
    /// experiences. No history at all scores low, not neutral.
    pub async fn historical_performance_score(&self, doctor_id: &str) -> GraphResult<f64> {
        let experiences = self.experiences.find_by_doctor_id(doctor_id).await?;
        if experiences.is_empty() {
            debug!("doctor {doctor_id} has no clinical experiences, returning low historical score");
            return Ok(NO_HISTORY_SCORE);
        }
        Ok(performance_blend(&experiences))
    }

    /// Composite facility routing score on the 0-100 scale.
    pub async fn score_facility_route(&self, case: &MedicalCase, facility: &Facility) -> RouteScoreResult {
        let complexity_score = complexity_match_score(case, facility);
        let historical_outcomes_score = match self.facility_outcomes_score(&facility.id).await {
            Ok(score) => score,
            Err(err) => {
                warn!("historical outcomes scoring failed for facility {}: {err}", facility.id);
                0.5
            }
        };
        let capacity_score = capacity_score(facility);
        let geographic_score = GEOGRAPHIC_BASELINE;

        let overall_score = (complexity_score * COMPLEXITY_WEIGHT
            + historical_outcomes_score * OUTCOMES_WEIGHT
            + capacity_score * CAPACITY_WEIGHT
            + geographic_score * GEOGRAPHIC_WEIGHT)
            * 100.0;
        let rationale = format!(
            "Complexity match: {complexity_score:.2}, Historical outcomes: {historical_outcomes_score:.2}, Capacity: {capacity_score:.2}, Geographic: {geographic_score:.2}"
        );
        RouteScoreResult {
            overall_score,
            complexity_score,
            historical_outcomes_score,
            capacity_score,
            geographic_score,
            rationale,
        }
    }

    /// Outcome history aggregated over the facility's affiliated
    /// doctors. Neutral 0.5 when the facility has no affiliated doctors
    /// or no recorded experiences.
    async fn facility_outcomes_score(&self, facility_id: &str) -> GraphResult<f64> {
        let doctor_ids = self
            .doctors
            .find_doctor_ids_by_facility_id(facility_id, FACILITY_DOCTOR_LIMIT)
            .await?;
        if doctor_ids.is_empty() {
            return Ok(0.5);
        }
        let experiences = self.experiences.find_by_doctor_ids(&doctor_ids).await?;
        if experiences.is_empty() {
            return Ok(0.5);
        }
        Ok(performance_blend(&experiences))
    }
}

fn performance_blend(experiences: &[ClinicalExperience]) -> f64 {
    let ratings: Vec<f64> = experiences.iter().filter_map(|e| e.rating).collect();
    let avg_rating = if ratings.is_empty() {
        DEFAULT_AVERAGE_RATING
    } else {
        ratings.iter().sum::<f64>() / ratings.len() as f64
    };
    let success_count = experiences.iter().filter(|e| e.is_successful()).count();
    let success_rate = success_count as f64 / experiences.len() as f64;
    let normalized_rating = (avg_rating - 1.0) / 4.0;
    (normalized_rating * 0.6 + success_rate * 0.4).clamp(0.0, 1.0)
}

/// 1.0 when any facility capability appears inside the case's required
/// specialty (case-insensitive substring); 0.5 when there is nothing to
/// compare or no match.
fn complexity_match_score(case: &MedicalCase, facility: &Facility) -> f64 {
    let Some(required) = case.required_specialty.as_deref() else {
        return 0.5;
    };
    if facility.capabilities.is_empty() {
        return 0.5;
    }
    let required = required.to_lowercase();
    let matched = facility
        .capabilities
        .iter()
        .any(|capability| required.contains(&capability.to_lowercase()));
    if matched {
        1.0
    } else {
        0.5
    }
}

/// Occupancy headroom on [0, 1]; over-occupied facilities floor at 0
/// so they cannot drag the composite below the published scale.
fn capacity_score(facility: &Facility) -> f64 {
    let Some(capacity) = facility.capacity.filter(|c| *c != 0) else {
        return 0.5;
    };
    let Some(occupancy) = facility.current_occupancy else {
        return 1.0;
    };
    (1.0 - occupancy as f64 / capacity as f64).clamp(0.0, 1.0)
}

fn urgency_score(urgency: Option<UrgencyLevel>) -> f64 {
    urgency.map(|level| level.score()).unwrap_or(0.5)
}

/// Standalone case priority: urgency, complexity (urgency proxy until a
/// richer acuity model exists) and availability, on the 0-100 scale.
pub fn priority_score(case: &MedicalCase) -> PriorityScore {
    let urgency = urgency_score(case.urgency_level);
    let complexity_score = urgency;
    let availability_score = AVAILABILITY_BASELINE;
    let overall_score = (urgency * URGENCY_WEIGHT
        + complexity_score * PRIORITY_COMPLEXITY_WEIGHT
        + availability_score * AVAILABILITY_WEIGHT)
        * 100.0;
    let rationale = format!(
        "Urgency: {urgency:.2}, Complexity: {complexity_score:.2}, Availability: {availability_score:.2}"
    );
    PriorityScore {
        overall_score,
        urgency_score: urgency,
        complexity_score,
        availability_score,
        rationale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn experience(rating: Option<f64>, outcome: &str) -> ClinicalExperience {
        ClinicalExperience {
            id: "e".into(),
            doctor_id: "d1".into(),
            case_id: "c1".into(),
            outcome: Some(outcome.into()),
            rating,
        }
    }

    fn facility(capacity: Option<i32>, occupancy: Option<i32>, capabilities: &[&str]) -> Facility {
        Facility {
            id: "f1".into(),
            name: "General".into(),
            facility_type: Some("ACADEMIC".into()),
            capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
            capacity,
            current_occupancy: occupancy,
        }
    }

    fn case_with(required: Option<&str>, urgency: Option<UrgencyLevel>) -> MedicalCase {
        MedicalCase {
            id: "c1".into(),
            chief_complaint: "chest pain".into(),
            icd10_codes: Vec::new(),
            required_specialty: required.map(|s| s.to_string()),
            urgency_level: urgency,
        }
    }

    #[test]
    fn should_blend_ratings_and_success_rate() {
        // avg rating 4.0 -> normalized 0.75; one success of two -> 0.5.
        let experiences =
            vec![experience(Some(5.0), "SUCCESS"), experience(Some(3.0), "DETERIORATED")];
        let blended = performance_blend(&experiences);
        assert!((blended - (0.75 * 0.6 + 0.5 * 0.4)).abs() < 1e-9);
    }

    #[test]
    fn should_default_rating_to_mid_range_when_no_ratings_present() {
        let experiences = vec![experience(None, "IMPROVED")];
        // normalized 0.375, success rate 1.0.
        let blended = performance_blend(&experiences);
        assert!((blended - (0.375 * 0.6 + 0.4)).abs() < 1e-9);
    }

    #[test]
    fn should_match_complexity_by_capability_substring() {
        let case = case_with(Some("Interventional Cardiology"), None);
        assert_eq!(complexity_match_score(&case, &facility(None, None, &["cardiology"])), 1.0);
        assert_eq!(complexity_match_score(&case, &facility(None, None, &["neurology"])), 0.5);
        assert_eq!(complexity_match_score(&case, &facility(None, None, &[])), 0.5);
        assert_eq!(complexity_match_score(&case_with(None, None), &facility(None, None, &["x"])), 0.5);
    }

    #[test]
    fn should_score_capacity_from_occupancy_headroom() {
        assert_eq!(capacity_score(&facility(None, None, &[])), 0.5);
        assert_eq!(capacity_score(&facility(Some(0), Some(0), &[])), 0.5);
        assert_eq!(capacity_score(&facility(Some(100), None, &[])), 1.0);
        assert!((capacity_score(&facility(Some(100), Some(40), &[])) - 0.6).abs() < 1e-9);
    }

    #[test]
    fn should_floor_capacity_score_for_over_occupied_facilities() {
        assert_eq!(capacity_score(&facility(Some(100), Some(150), &[])), 0.0);
        assert_eq!(capacity_score(&facility(Some(100), Some(100), &[])), 0.0);
    }

    #[test]
    fn should_scale_priority_by_urgency() {
        let critical = priority_score(&case_with(None, Some(UrgencyLevel::Critical)));
        assert!((critical.overall_score - (1.0 * 0.5 + 1.0 * 0.3 + 0.5 * 0.2) * 100.0).abs() < 1e-9);
        assert!(critical.rationale.starts_with("Urgency: 1.00"));

        let unknown = priority_score(&case_with(None, None));
        assert!((unknown.overall_score - 50.0).abs() < 1e-9);
    }
}
