// graph_building/src/builder.rs
//
// Full-rebuild ETL: relational entities in, property graph out. Vertex
// phases run before edge phases; a relationship whose endpoints both
// exist is MATCH-MATCH-MERGEd, while the degraded-able kinds MERGE
// their target by natural key so a missing reference record never drops
// the edge. Every per-row failure is logged, counted and skipped.
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use graph_gateway::GraphGateway;
use log::{debug, info, warn};
use models::errors::{GraphError, GraphResult};
use models::graph::{CaseVertex, CodeVertex, DoctorVertex, EdgeKind, FacilityVertex, SpecialtyVertex, VertexKind};
use models::medical::{Doctor, Facility, Icd10Code, MedicalCase, MedicalSpecialty};
use models::properties::ParamMap;
use serde::Deserialize;

use crate::batch::{dedup_rows, render_batch_list, BatchRow};
use crate::sources::{CaseSource, CodeSource, DoctorSource, ExperienceSource, FacilitySource, SpecialtySource};

const VERTEX_LABELS: [&str; 5] = ["Doctor", "MedicalCase", "ICD10Code", "MedicalSpecialty", "Facility"];

fn default_batch_size() -> usize {
    1000
}

fn default_progress_interval() -> usize {
    100
}

#[derive(Clone, Debug, Deserialize)]
pub struct BuilderConfig {
    /// Rows per UNWIND-MERGE statement.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Vertex rows between progress log lines.
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self { batch_size: default_batch_size(), progress_interval: default_progress_interval() }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PhaseCounts {
    pub created: usize,
    pub failed: usize,
}

/// Per-phase outcome of a build run. The run is best-effort: callers
/// inspect `partial_failure()` to decide whether downstream phases
/// should proceed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildSummary {
    pub phases: BTreeMap<String, PhaseCounts>,
}

impl BuildSummary {
    fn record(&mut self, phase: &str, created: usize, failed: usize) {
        let entry = self.phases.entry(phase.to_string()).or_default();
        entry.created += created;
        entry.failed += failed;
    }

    pub fn total_created(&self) -> usize {
        self.phases.values().map(|p| p.created).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.phases.values().map(|p| p.failed).sum()
    }

    pub fn partial_failure(&self) -> Option<GraphError> {
        let failed = self.total_failed();
        if failed == 0 {
            return None;
        }
        Some(GraphError::PartialFailure { succeeded: self.total_created(), failed })
    }
}

/// Reference-data lookups for one build run. Built at run start from
/// the already-fetched source lists and dropped with the run, so no
/// state leaks across rebuilds.
struct ReferenceCache {
    specialty_ids: HashMap<String, String>,
    code_descriptions: HashMap<String, String>,
}

impl ReferenceCache {
    fn new(specialties: &[MedicalSpecialty], codes: &[Icd10Code]) -> Self {
        Self {
            specialty_ids: specialties.iter().map(|s| (s.name.clone(), s.id.clone())).collect(),
            code_descriptions: codes.iter().map(|c| (c.code.clone(), c.description.clone())).collect(),
        }
    }

    fn specialty_id(&self, name: &str) -> Option<&String> {
        self.specialty_ids.get(name)
    }

    fn code_description(&self, code: &str) -> Option<&String> {
        self.code_descriptions.get(code)
    }
}

pub struct GraphBuilder {
    gateway: Arc<GraphGateway>,
    doctors: Arc<dyn DoctorSource>,
    cases: Arc<dyn CaseSource>,
    codes: Arc<dyn CodeSource>,
    specialties: Arc<dyn SpecialtySource>,
    facilities: Arc<dyn FacilitySource>,
    experiences: Arc<dyn ExperienceSource>,
    config: BuilderConfig,
}

impl GraphBuilder {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gateway: Arc<GraphGateway>,
        doctors: Arc<dyn DoctorSource>,
        cases: Arc<dyn CaseSource>,
        codes: Arc<dyn CodeSource>,
        specialties: Arc<dyn SpecialtySource>,
        facilities: Arc<dyn FacilitySource>,
        experiences: Arc<dyn ExperienceSource>,
        config: BuilderConfig,
    ) -> Self {
        Self { gateway, doctors, cases, codes, specialties, facilities, experiences, config }
    }

    /// Full rebuild: vertices for every entity kind, best-effort
    /// indexes, then every edge kind from deduplicated relational join
    /// data. Idempotent end to end.
    pub async fn build_graph(&self) -> GraphResult<BuildSummary> {
        info!("starting full graph build");
        self.gateway.ensure_graph().await?;
        let mut summary = BuildSummary::default();

        let doctors = self.doctors.all_doctors().await?;
        let cases = self.cases.all_cases().await?;
        let codes = self.codes.all_codes().await?;
        let specialties = self.specialties.all_specialties().await?;
        let facilities = self.facilities.all_facilities().await?;
        let experiences = self.experiences.all_experiences().await?;
        let consultations = self.experiences.all_consultations().await?;

        self.vertex_phase("Doctor", doctors.iter().map(doctor_vertex).collect(), &mut summary).await;
        self.vertex_phase("MedicalCase", cases.iter().map(case_vertex).collect(), &mut summary).await;
        self.vertex_phase("ICD10Code", codes.iter().map(code_vertex).collect(), &mut summary).await;
        self.vertex_phase("MedicalSpecialty", specialties.iter().map(specialty_vertex).collect(), &mut summary)
            .await;
        self.vertex_phase("Facility", facilities.iter().map(facility_vertex).collect(), &mut summary).await;

        for label in VERTEX_LABELS {
            self.gateway.create_vertex_index(label).await;
        }

        let cache = ReferenceCache::new(&specialties, &codes);
        let case_codes: HashMap<&str, &Vec<String>> =
            cases.iter().map(|c| (c.id.as_str(), &c.icd10_codes)).collect();

        // TREATED / CONSULTED_ON: both endpoint kinds are materialized.
        let treated: Vec<(String, String, Option<String>)> = experiences
            .iter()
            .map(|e| (e.doctor_id.clone(), e.case_id.clone(), None))
            .collect();
        self.edge_phase(EdgeKind::Treated, treated, &mut summary).await;

        let consulted: Vec<(String, String, Option<String>)> = consultations
            .into_iter()
            .map(|(doctor_id, case_id)| (doctor_id, case_id, None))
            .collect();
        self.edge_phase(EdgeKind::ConsultedOn, consulted, &mut summary).await;

        // HAS_CONDITION: enrich with the canonical description when the
        // code record resolves, degraded natural-key vertex otherwise.
        let has_condition: Vec<(String, String, Option<String>)> = cases
            .iter()
            .flat_map(|case| {
                case.icd10_codes.iter().map(|code| {
                    (case.id.clone(), code.clone(), cache.code_description(code).cloned())
                })
            })
            .collect();
        self.edge_phase(EdgeKind::HasCondition, has_condition, &mut summary).await;

        // TREATS_CONDITION is derived: a doctor treats every condition
        // carried by the cases they treated.
        let mut treats_condition: Vec<(String, String, Option<String>)> = Vec::new();
        for e in &experiences {
            let Some(codes) = case_codes.get(e.case_id.as_str()) else {
                continue;
            };
            for code in codes.iter() {
                treats_condition.push((
                    e.doctor_id.clone(),
                    code.clone(),
                    cache.code_description(code).cloned(),
                ));
            }
        }
        self.edge_phase(EdgeKind::TreatsCondition, treats_condition, &mut summary).await;

        let specializes: Vec<(String, String, Option<String>)> = doctors
            .iter()
            .flat_map(|doctor| {
                doctor.specialties.iter().map(|name| {
                    (doctor.id.clone(), name.clone(), cache.specialty_id(name).cloned())
                })
            })
            .collect();
        self.edge_phase(EdgeKind::SpecializesIn, specializes, &mut summary).await;

        let requires: Vec<(String, String, Option<String>)> = cases
            .iter()
            .filter_map(|case| {
                case.required_specialty.as_ref().map(|name| {
                    (case.id.clone(), name.clone(), cache.specialty_id(name).cloned())
                })
            })
            .collect();
        self.edge_phase(EdgeKind::RequiresSpecialty, requires, &mut summary).await;

        let affiliated: Vec<(String, String, Option<String>)> = doctors
            .iter()
            .flat_map(|doctor| {
                doctor.facility_ids.iter().map(|facility_id| {
                    (doctor.id.clone(), facility_id.clone(), None)
                })
            })
            .collect();
        self.edge_phase(EdgeKind::AffiliatedWith, affiliated, &mut summary).await;

        info!(
            "graph build finished: {} created, {} failed",
            summary.total_created(),
            summary.total_failed()
        );
        Ok(summary)
    }

    /// Tears the graph down completely: all edges first, then all
    /// vertices. A missing graph is not an error.
    pub async fn clear_graph(&self) -> GraphResult<()> {
        if !self.gateway.graph_exists().await? {
            info!("graph does not exist, nothing to clear");
            return Ok(());
        }
        self.gateway
            .execute("MATCH ()-[e]->() DELETE e", &ParamMap::new())
            .await
            .map_err(|e| GraphError::GraphOperation(format!("failed to clear edges: {e}")))?;
        self.gateway
            .execute("MATCH (v) DELETE v", &ParamMap::new())
            .await
            .map_err(|e| GraphError::GraphOperation(format!("failed to clear vertices: {e}")))?;
        info!("graph cleared");
        Ok(())
    }

    /// Idempotent upsert by natural key: MERGE on the key, SET for the
    /// rest, so repeated runs and degraded-vertex upgrades converge on
    /// one vertex per key.
    pub async fn upsert_vertex(&self, kind: &VertexKind) -> GraphResult<()> {
        let (key_name, key_value) = kind.natural_key();
        let mut params = ParamMap::new();
        params.insert("key".to_string(), key_value.into());
        let mut query = format!("MERGE (v:{} {{{}: $key}})", kind.label(), key_name);
        let merge = kind.merge_properties();
        if !merge.is_empty() {
            let assignments: Vec<String> = merge
                .iter()
                .enumerate()
                .map(|(i, (name, _))| format!("v.{name} = $p{i}"))
                .collect();
            query.push_str(" SET ");
            query.push_str(&assignments.join(", "));
            for (i, (_, value)) in merge.into_iter().enumerate() {
                params.insert(format!("p{i}"), value);
            }
        }
        self.gateway.execute(&query, &params).await?;
        Ok(())
    }

    pub async fn create_doctor_vertex(&self, doctor: &Doctor) -> GraphResult<()> {
        self.upsert_vertex(&doctor_vertex(doctor)).await
    }

    pub async fn create_case_vertex(&self, case: &MedicalCase) -> GraphResult<()> {
        self.upsert_vertex(&case_vertex(case)).await
    }

    pub async fn create_code_vertex(&self, code: &Icd10Code) -> GraphResult<()> {
        self.upsert_vertex(&code_vertex(code)).await
    }

    pub async fn create_specialty_vertex(&self, specialty: &MedicalSpecialty) -> GraphResult<()> {
        self.upsert_vertex(&specialty_vertex(specialty)).await
    }

    pub async fn create_facility_vertex(&self, facility: &Facility) -> GraphResult<()> {
        self.upsert_vertex(&facility_vertex(facility)).await
    }

    /// Creates one edge. Degraded-able kinds MERGE their target by
    /// natural key; the rest require both endpoints to exist already
    /// (a missing endpoint makes the statement a no-op, never an
    /// implicit vertex).
    pub async fn create_relationship(&self, kind: EdgeKind, source_id: &str, target_key: &str) -> GraphResult<()> {
        let ((source_label, source_key), (target_label, target_prop)) = kind.endpoints();
        let target_clause = if kind.degraded_target_allowed() {
            format!("MERGE (y:{target_label} {{{target_prop}: $b}})")
        } else {
            format!("MATCH (y:{target_label} {{{target_prop}: $b}})")
        };
        let query = format!(
            "MATCH (x:{source_label} {{{source_key}: $a}}) {target_clause} MERGE (x)-[:{}]->(y)",
            kind.as_str()
        );
        let mut params = ParamMap::new();
        params.insert("a".to_string(), source_id.into());
        params.insert("b".to_string(), target_key.into());
        self.gateway.execute(&query, &params).await?;
        Ok(())
    }

    /// Deduplicates and flushes `(source, target)` pairs in fixed-size
    /// UNWIND-MERGE chunks. Returns `(created, failed)` row counts; a
    /// chunk is the unit of retry.
    pub async fn create_relationships_batch(
        &self,
        kind: EdgeKind,
        rows: Vec<(String, String, Option<String>)>,
    ) -> (usize, usize) {
        let mut enriched: Vec<BatchRow> = Vec::new();
        let mut degraded: Vec<BatchRow> = Vec::new();
        for (a, b, extra) in rows {
            match (extra, kind.enrichment_property()) {
                (Some(value), Some(_)) => enriched.push(vec![("a", a), ("b", b), ("c", value)]),
                _ => degraded.push(vec![("a", a), ("b", b)]),
            }
        }
        // The enrichment value is a function of the target key, so
        // full-row dedup is `(source, target)` dedup.
        let enriched = dedup_rows(enriched);
        let degraded = dedup_rows(degraded);
        if kind.degraded_target_allowed() && !degraded.is_empty() {
            debug!(
                "{}: {} rows have no resolvable target record, creating degraded vertices",
                kind.as_str(),
                degraded.len()
            );
        }

        let mut created = 0;
        let mut failed = 0;
        for (rows, with_enrichment) in [(enriched, true), (degraded, false)] {
            for chunk in rows.chunks(self.config.batch_size.max(1)) {
                let query = self.batch_query(kind, chunk, with_enrichment);
                match self.execute_chunk(&query).await {
                    Ok(()) => created += chunk.len(),
                    Err(err) => {
                        warn!("{} batch chunk of {} rows failed: {err}", kind.as_str(), chunk.len());
                        failed += chunk.len();
                    }
                }
            }
        }
        (created, failed)
    }

    fn batch_query(&self, kind: EdgeKind, chunk: &[BatchRow], with_enrichment: bool) -> String {
        let ((source_label, source_key), (target_label, target_prop)) = kind.endpoints();
        let list = render_batch_list(chunk);
        let target_clause = if kind.degraded_target_allowed() {
            match (with_enrichment, kind.enrichment_property()) {
                (true, Some(prop)) => {
                    format!("MERGE (y:{target_label} {{{target_prop}: rel.b}}) SET y.{prop} = rel.c")
                }
                _ => format!("MERGE (y:{target_label} {{{target_prop}: rel.b}})"),
            }
        } else {
            format!("MATCH (y:{target_label} {{{target_prop}: rel.b}})")
        };
        format!(
            "UNWIND {list} AS rel MATCH (x:{source_label} {{{source_key}: rel.a}}) {target_clause} MERGE (x)-[:{}]->(y)",
            kind.as_str()
        )
    }

    /// Chunk-granularity retry: one transient failure gets a second
    /// attempt before the chunk is counted as failed.
    async fn execute_chunk(&self, query: &str) -> GraphResult<()> {
        match self.gateway.execute(query, &ParamMap::new()).await {
            Ok(_) => Ok(()),
            Err(first) => {
                debug!("retrying failed chunk: {first}");
                self.gateway.execute(query, &ParamMap::new()).await.map(|_| ())
            }
        }
    }

    async fn vertex_phase(&self, phase: &str, kinds: Vec<VertexKind>, summary: &mut BuildSummary) {
        let total = kinds.len();
        let mut created = 0;
        let mut failed = 0;
        for (index, kind) in kinds.iter().enumerate() {
            match self.upsert_vertex(kind).await {
                Ok(()) => created += 1,
                Err(err) => {
                    warn!("failed to upsert {} {:?}: {err}", kind.label(), kind.natural_key().1);
                    failed += 1;
                }
            }
            let processed = index + 1;
            if processed % self.config.progress_interval.max(1) == 0 {
                info!("{phase} vertices: {processed}/{total}");
            }
        }
        info!("{phase} vertices done: {created} created, {failed} failed");
        summary.record(phase, created, failed);
    }

    async fn edge_phase(
        &self,
        kind: EdgeKind,
        rows: Vec<(String, String, Option<String>)>,
        summary: &mut BuildSummary,
    ) {
        let (created, failed) = self.create_relationships_batch(kind, rows).await;
        info!("{} edges done: {created} created, {failed} failed", kind.as_str());
        summary.record(kind.as_str(), created, failed);
    }
}

fn doctor_vertex(doctor: &Doctor) -> VertexKind {
    VertexKind::Doctor(DoctorVertex {
        id: doctor.id.clone(),
        name: doctor.name.clone(),
        email: doctor.email.clone(),
    })
}

fn case_vertex(case: &MedicalCase) -> VertexKind {
    VertexKind::MedicalCase(CaseVertex {
        id: case.id.clone(),
        chief_complaint: case.chief_complaint.clone(),
        urgency_level: case.urgency_level,
    })
}

fn code_vertex(code: &Icd10Code) -> VertexKind {
    VertexKind::Icd10Code(CodeVertex {
        code: code.code.clone(),
        description: Some(code.description.clone()),
    })
}

fn specialty_vertex(specialty: &MedicalSpecialty) -> VertexKind {
    VertexKind::MedicalSpecialty(SpecialtyVertex {
        id: Some(specialty.id.clone()),
        name: specialty.name.clone(),
    })
}

fn facility_vertex(facility: &Facility) -> VertexKind {
    VertexKind::Facility(FacilityVertex {
        id: facility.id.clone(),
        name: facility.name.clone(),
        facility_type: facility.facility_type.clone(),
    })
}
