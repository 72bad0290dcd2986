// matching/src/repositories.rs
//
// Relational read interfaces consumed by the matching services, plus
// the write interface for persisted match records. Implementations live
// with the relational layer; the fixtures in this crate's tests are
// in-memory stand-ins.
use async_trait::async_trait;
use models::errors::GraphResult;
use models::matching::ConsultationMatch;
use models::medical::{ClinicalExperience, Doctor, Facility, MedicalCase};

#[async_trait]
pub trait DoctorRepository: Send + Sync {
    /// Doctors whose specialty list contains `specialty`, case-insensitive.
    async fn find_by_specialty(&self, specialty: &str, limit: usize) -> GraphResult<Vec<Doctor>>;

    async fn find_all_ids(&self, limit: usize) -> GraphResult<Vec<String>>;

    async fn find_by_ids(&self, doctor_ids: &[String]) -> GraphResult<Vec<Doctor>>;

    /// Doctor ids affiliated with a facility, capped by `limit`.
    async fn find_doctor_ids_by_facility_id(&self, facility_id: &str, limit: usize) -> GraphResult<Vec<String>>;
}

#[async_trait]
pub trait CaseRepository: Send + Sync {
    async fn find_by_id(&self, case_id: &str) -> GraphResult<Option<MedicalCase>>;
}

#[async_trait]
pub trait FacilityRepository: Send + Sync {
    async fn find_all(&self) -> GraphResult<Vec<Facility>>;
}

#[async_trait]
pub trait ExperienceRepository: Send + Sync {
    async fn find_by_doctor_id(&self, doctor_id: &str) -> GraphResult<Vec<ClinicalExperience>>;

    async fn find_by_doctor_ids(&self, doctor_ids: &[String]) -> GraphResult<Vec<ClinicalExperience>>;
}

/// Append-only persistence for ranked match records. Each ranking run
/// inserts its own records; runs are never deduplicated, so the store
/// holds the case's full match history.
#[async_trait]
pub trait ConsultationMatchStore: Send + Sync {
    async fn insert_batch(&self, matches: &[ConsultationMatch]) -> GraphResult<()>;
}
