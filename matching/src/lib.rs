// matching/src/lib.rs

pub mod repositories;
pub mod scoring;
pub mod service;
pub mod signals;

pub use repositories::{
    CaseRepository, ConsultationMatchStore, DoctorRepository, ExperienceRepository, FacilityRepository,
};
pub use scoring::{priority_score, BaselineSimilarity, CompositeScorer, SimilaritySource};
pub use service::MatchingService;
pub use signals::SignalScorer;
