// graph_building/src/sources.rs
//
// Read-only relational interfaces consumed by the ETL. The relational
// side owns CRUD; the builder only ever lists.
use async_trait::async_trait;
use models::errors::GraphResult;
use models::medical::{ClinicalExperience, Doctor, Facility, Icd10Code, MedicalCase, MedicalSpecialty};

#[async_trait]
pub trait DoctorSource: Send + Sync {
    async fn all_doctors(&self) -> GraphResult<Vec<Doctor>>;
}

#[async_trait]
pub trait CaseSource: Send + Sync {
    async fn all_cases(&self) -> GraphResult<Vec<MedicalCase>>;
}

#[async_trait]
pub trait CodeSource: Send + Sync {
    async fn all_codes(&self) -> GraphResult<Vec<Icd10Code>>;
}

#[async_trait]
pub trait SpecialtySource: Send + Sync {
    async fn all_specialties(&self) -> GraphResult<Vec<MedicalSpecialty>>;
}

#[async_trait]
pub trait FacilitySource: Send + Sync {
    async fn all_facilities(&self) -> GraphResult<Vec<Facility>>;
}

/// Historical involvement records feeding the TREATED and CONSULTED_ON
/// edge kinds.
#[async_trait]
pub trait ExperienceSource: Send + Sync {
    async fn all_experiences(&self) -> GraphResult<Vec<ClinicalExperience>>;

    /// `(doctor_id, case_id)` pairs for consultations that were not
    /// treatments.
    async fn all_consultations(&self) -> GraphResult<Vec<(String, String)>>;
}
