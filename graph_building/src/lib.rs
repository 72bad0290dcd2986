// graph_building/src/lib.rs

pub mod batch;
pub mod builder;
pub mod sources;

pub use builder::{BuildSummary, BuilderConfig, GraphBuilder, PhaseCounts};
pub use sources::{CaseSource, CodeSource, DoctorSource, ExperienceSource, FacilitySource, SpecialtySource};
