// models/src/lib.rs

// Declare all top-level modules within the 'models' crate
pub mod errors;
pub mod graph;
pub mod identifiers;
pub mod matching;
pub mod medical;
pub mod properties;

// Re-export common core types for convenience when other crates use 'models::*'
pub use errors::{GraphError, GraphResult, ValidationError, ValidationResult};
pub use graph::{EdgeKind, VertexKind};
pub use identifiers::Identifier;
pub use properties::{ParamMap, PropertyMap, PropertyValue};
pub use medical::{ClinicalExperience, Doctor, Facility, Icd10Code, MedicalCase, MedicalSpecialty, UrgencyLevel};
pub use matching::{
    ConsultationMatch, DoctorMatch, FacilityMatch, MatchOptions, PriorityScore, RouteScoreResult,
    RoutingOptions, ScoreResult,
};
