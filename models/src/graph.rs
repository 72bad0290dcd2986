// models/src/graph.rs
//! Graph projection of the relational domain: vertex kinds with fixed,
//! statically-typed property structs, and the closed set of edge kinds.

use serde::{Deserialize, Serialize};

use crate::medical::UrgencyLevel;
use crate::properties::PropertyValue;

/// Doctor vertex payload. Natural key: `id`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DoctorVertex {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Medical-case vertex payload. Natural key: `id`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaseVertex {
    pub id: String,
    pub chief_complaint: String,
    pub urgency_level: Option<UrgencyLevel>,
}

/// ICD-10 code vertex payload. Natural key: `code`, never a surrogate id.
/// A `None` description marks a degraded vertex created from an edge
/// whose canonical code record could not be resolved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CodeVertex {
    pub code: String,
    pub description: Option<String>,
}

/// Specialty vertex payload. Natural key: `name`; `id` is carried only
/// when the canonical specialty record was resolvable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpecialtyVertex {
    pub id: Option<String>,
    pub name: String,
}

/// Facility vertex payload. Natural key: `id`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FacilityVertex {
    pub id: String,
    pub name: String,
    pub facility_type: Option<String>,
}

/// Tagged vertex kind: each variant carries its fixed property struct,
/// so degraded vertices are explicit `Option` fields rather than
/// ad hoc partial property maps.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "label")]
pub enum VertexKind {
    Doctor(DoctorVertex),
    MedicalCase(CaseVertex),
    #[serde(rename = "ICD10Code")]
    Icd10Code(CodeVertex),
    MedicalSpecialty(SpecialtyVertex),
    Facility(FacilityVertex),
}

impl VertexKind {
    pub fn label(&self) -> &'static str {
        match self {
            VertexKind::Doctor(_) => "Doctor",
            VertexKind::MedicalCase(_) => "MedicalCase",
            VertexKind::Icd10Code(_) => "ICD10Code",
            VertexKind::MedicalSpecialty(_) => "MedicalSpecialty",
            VertexKind::Facility(_) => "Facility",
        }
    }

    /// Natural-key property name and value for this vertex kind.
    pub fn natural_key(&self) -> (&'static str, &str) {
        match self {
            VertexKind::Doctor(d) => ("id", d.id.as_str()),
            VertexKind::MedicalCase(c) => ("id", c.id.as_str()),
            VertexKind::Icd10Code(c) => ("code", c.code.as_str()),
            VertexKind::MedicalSpecialty(s) => ("name", s.name.as_str()),
            VertexKind::Facility(f) => ("id", f.id.as_str()),
        }
    }

    /// Non-key properties to merge onto the keyed vertex. Absent optional
    /// fields are omitted so a later upsert can fill them in without a
    /// degraded vertex ever clobbering canonical data.
    pub fn merge_properties(&self) -> Vec<(&'static str, PropertyValue)> {
        let mut props = Vec::new();
        match self {
            VertexKind::Doctor(d) => {
                props.push(("name", PropertyValue::from(d.name.as_str())));
                props.push(("email", PropertyValue::from(d.email.as_str())));
            }
            VertexKind::MedicalCase(c) => {
                props.push(("chiefComplaint", PropertyValue::from(c.chief_complaint.as_str())));
                let urgency = c.urgency_level.map(|u| u.as_str()).unwrap_or("MEDIUM");
                props.push(("urgencyLevel", PropertyValue::from(urgency)));
            }
            VertexKind::Icd10Code(c) => {
                if let Some(description) = &c.description {
                    props.push(("description", PropertyValue::from(description.as_str())));
                }
            }
            VertexKind::MedicalSpecialty(s) => {
                if let Some(id) = &s.id {
                    props.push(("id", PropertyValue::from(id.as_str())));
                }
            }
            VertexKind::Facility(f) => {
                props.push(("name", PropertyValue::from(f.name.as_str())));
                if let Some(facility_type) = &f.facility_type {
                    props.push(("facilityType", PropertyValue::from(facility_type.as_str())));
                }
            }
        }
        props
    }
}

/// The closed set of directed edge kinds in the graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    Treated,
    ConsultedOn,
    SpecializesIn,
    TreatsCondition,
    HasCondition,
    RequiresSpecialty,
    AffiliatedWith,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Treated => "TREATED",
            EdgeKind::ConsultedOn => "CONSULTED_ON",
            EdgeKind::SpecializesIn => "SPECIALIZES_IN",
            EdgeKind::TreatsCondition => "TREATS_CONDITION",
            EdgeKind::HasCondition => "HAS_CONDITION",
            EdgeKind::RequiresSpecialty => "REQUIRES_SPECIALTY",
            EdgeKind::AffiliatedWith => "AFFILIATED_WITH",
        }
    }

    /// `(label, key property)` for the source and target endpoints.
    pub fn endpoints(&self) -> ((&'static str, &'static str), (&'static str, &'static str)) {
        match self {
            EdgeKind::Treated => (("Doctor", "id"), ("MedicalCase", "id")),
            EdgeKind::ConsultedOn => (("Doctor", "id"), ("MedicalCase", "id")),
            EdgeKind::SpecializesIn => (("Doctor", "id"), ("MedicalSpecialty", "name")),
            EdgeKind::TreatsCondition => (("Doctor", "id"), ("ICD10Code", "code")),
            EdgeKind::HasCondition => (("MedicalCase", "id"), ("ICD10Code", "code")),
            EdgeKind::RequiresSpecialty => (("MedicalCase", "id"), ("MedicalSpecialty", "name")),
            EdgeKind::AffiliatedWith => (("Doctor", "id"), ("Facility", "id")),
        }
    }

    /// Whether an unresolvable target may be created as a degraded
    /// vertex carrying only its natural key.
    pub fn degraded_target_allowed(&self) -> bool {
        matches!(
            self,
            EdgeKind::SpecializesIn
                | EdgeKind::TreatsCondition
                | EdgeKind::HasCondition
                | EdgeKind::RequiresSpecialty
        )
    }

    /// The non-key property merged onto a resolvable target during
    /// batched edge creation.
    pub fn enrichment_property(&self) -> Option<&'static str> {
        match self {
            EdgeKind::TreatsCondition | EdgeKind::HasCondition => Some("description"),
            EdgeKind::SpecializesIn | EdgeKind::RequiresSpecialty => Some("id"),
            _ => None,
        }
    }

}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
