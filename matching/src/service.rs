// matching/src/service.rs
//
// Candidate selection, filtering, ranking and persistence. Filters are
// exclusionary only; the composite score is never adjusted by them.
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, info};
use models::errors::{GraphError, GraphResult};
use models::matching::{
    ConsultationMatch, DoctorMatch, FacilityMatch, MatchOptions, PriorityScore, RoutingOptions,
};
use models::medical::{Doctor, Facility, MedicalCase};

use crate::repositories::{CaseRepository, ConsultationMatchStore, DoctorRepository, FacilityRepository};
use crate::scoring::{self, CompositeScorer};

/// Floor on the candidate pool for facility routing, so small
/// `max_results` values still scan a meaningful set.
const MIN_FACILITY_CANDIDATES: usize = 10;

pub struct MatchingService {
    cases: Arc<dyn CaseRepository>,
    doctors: Arc<dyn DoctorRepository>,
    facilities: Arc<dyn FacilityRepository>,
    match_store: Arc<dyn ConsultationMatchStore>,
    scorer: CompositeScorer,
}

impl MatchingService {
    pub fn new(
        cases: Arc<dyn CaseRepository>,
        doctors: Arc<dyn DoctorRepository>,
        facilities: Arc<dyn FacilityRepository>,
        match_store: Arc<dyn ConsultationMatchStore>,
        scorer: CompositeScorer,
    ) -> Self {
        Self { cases, doctors, facilities, match_store, scorer }
    }

    /// Ranks doctors for a case and appends one match record per
    /// surviving candidate to the case's persisted match history.
    pub async fn match_doctors_to_case(
        &self,
        case_id: &str,
        options: &MatchOptions,
    ) -> GraphResult<Vec<DoctorMatch>> {
        let case = self.resolve_case(case_id).await?;
        let candidates = self.doctor_candidates(&case, options).await?;
        debug!("case {}: {} candidate doctors before filtering", case.id, candidates.len());
        let candidates: Vec<Doctor> = candidates
            .into_iter()
            .filter(|doctor| passes_doctor_filters(doctor, options))
            .collect();

        let mut scored = Vec::new();
        for doctor in candidates {
            let score = self.scorer.score_doctor(&case, &doctor).await;
            if let Some(min_score) = options.min_score {
                if score.overall_score < min_score {
                    continue;
                }
            }
            scored.push((doctor, score));
        }
        scored.sort_by(|a, b| rank_ordering(a.1.overall_score, &a.0.id, b.1.overall_score, &b.0.id));
        scored.truncate(options.max_results);

        let matches: Vec<DoctorMatch> = scored
            .into_iter()
            .enumerate()
            .map(|(index, (doctor, score))| DoctorMatch {
                doctor,
                match_score: score.overall_score,
                rank: index + 1,
                rationale: score.rationale,
            })
            .collect();

        self.persist_matches(&case.id, &matches).await?;
        info!("case {}: ranked {} doctor matches", case.id, matches.len());
        Ok(matches)
    }

    /// Ranks facilities for a case. Routing results are advisory and
    /// are not persisted.
    pub async fn route_case_to_facilities(
        &self,
        case_id: &str,
        options: &RoutingOptions,
    ) -> GraphResult<Vec<FacilityMatch>> {
        let case = self.resolve_case(case_id).await?;
        let candidate_cap = (options.max_results * 2).max(MIN_FACILITY_CANDIDATES);
        let mut candidates: Vec<Facility> = self
            .facilities
            .find_all()
            .await?
            .into_iter()
            .filter(|facility| passes_facility_filters(facility, options))
            .collect();
        candidates.truncate(candidate_cap);
        debug!("case {}: {} candidate facilities", case.id, candidates.len());

        let mut scored = Vec::new();
        for facility in candidates {
            let score = self.scorer.score_facility_route(&case, &facility).await;
            if let Some(min_score) = options.min_score {
                if score.overall_score < min_score {
                    continue;
                }
            }
            scored.push((facility, score));
        }
        scored.sort_by(|a, b| rank_ordering(a.1.overall_score, &a.0.id, b.1.overall_score, &b.0.id));
        scored.truncate(options.max_results);

        Ok(scored
            .into_iter()
            .enumerate()
            .map(|(index, (facility, score))| FacilityMatch {
                facility,
                route_score: score.overall_score,
                rank: index + 1,
                rationale: score.rationale,
            })
            .collect())
    }

    /// Standalone priority for a case, for queue ordering upstream of
    /// any matching run.
    pub async fn case_priority(&self, case_id: &str) -> GraphResult<PriorityScore> {
        let case = self.resolve_case(case_id).await?;
        Ok(scoring::priority_score(&case))
    }

    async fn resolve_case(&self, case_id: &str) -> GraphResult<MedicalCase> {
        if case_id.trim().is_empty() {
            return Err(GraphError::InvalidRequest("case id must not be blank".into()));
        }
        let normalized = case_id.trim().to_lowercase();
        self.cases
            .find_by_id(&normalized)
            .await?
            .ok_or_else(|| GraphError::NotFound(format!("medical case not found: {normalized}")))
    }

    /// Candidate pool: preferred specialties first, the case's required
    /// specialty second, the capped full roster last. Deduplicated by
    /// doctor id, first occurrence wins.
    async fn doctor_candidates(&self, case: &MedicalCase, options: &MatchOptions) -> GraphResult<Vec<Doctor>> {
        let pool_cap = options.max_results * 2;
        let mut pool = Vec::new();
        if !options.preferred_specialties.is_empty() {
            for specialty in &options.preferred_specialties {
                pool.extend(self.doctors.find_by_specialty(specialty, pool_cap).await?);
            }
        } else if let Some(required) = case.required_specialty.as_deref() {
            pool = self.doctors.find_by_specialty(required, pool_cap).await?;
        } else {
            let ids = self.doctors.find_all_ids(pool_cap).await?;
            pool = self.doctors.find_by_ids(&ids).await?;
        }
        let mut seen = HashSet::new();
        Ok(pool.into_iter().filter(|doctor| seen.insert(doctor.id.clone())).collect())
    }

    /// Append-only: every invocation writes its own records, so the
    /// store accumulates the full match history for the case.
    async fn persist_matches(&self, case_id: &str, matches: &[DoctorMatch]) -> GraphResult<()> {
        let records: Vec<ConsultationMatch> = matches
            .iter()
            .map(|m| {
                ConsultationMatch::pending(case_id, &m.doctor.id, m.match_score, &m.rationale, m.rank)
            })
            .collect();
        if records.is_empty() {
            return Ok(());
        }
        self.match_store.insert_batch(&records).await
    }
}

/// Descending by score, ascending by candidate id on ties so equal
/// scores rank deterministically.
fn rank_ordering(score_a: f64, id_a: &str, score_b: f64, id_b: &str) -> Ordering {
    score_b
        .partial_cmp(&score_a)
        .unwrap_or(Ordering::Equal)
        .then_with(|| id_a.cmp(id_b))
}

fn passes_doctor_filters(doctor: &Doctor, options: &MatchOptions) -> bool {
    if options.require_telehealth && !doctor.telehealth_enabled {
        return false;
    }
    if !options.preferred_facility_ids.is_empty()
        && !doctor.facility_ids.iter().any(|id| options.preferred_facility_ids.contains(id))
    {
        return false;
    }
    if !options.preferred_specialties.is_empty() {
        let matched = doctor.specialties.iter().any(|own| {
            options.preferred_specialties.iter().any(|wanted| own.eq_ignore_ascii_case(wanted))
        });
        if !matched {
            return false;
        }
    }
    true
}

fn passes_facility_filters(facility: &Facility, options: &RoutingOptions) -> bool {
    if !options.preferred_facility_types.is_empty() {
        let matched = facility
            .facility_type
            .as_deref()
            .map(|own| options.preferred_facility_types.iter().any(|t| own.eq_ignore_ascii_case(t)))
            .unwrap_or(false);
        if !matched {
            return false;
        }
    }
    if !options.required_capabilities.is_empty() {
        let has_all = options.required_capabilities.iter().all(|wanted| {
            facility.capabilities.iter().any(|own| own.eq_ignore_ascii_case(wanted))
        });
        if !has_all {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use graph_gateway::{GraphGateway, MemoryGraphStore};
    use models::medical::ClinicalExperience;
    use models::properties::ParamMap;

    use super::*;
    use crate::repositories::ExperienceRepository;
    use crate::scoring::BaselineSimilarity;
    use crate::signals::SignalScorer;

    #[derive(Default)]
    struct FixtureRepos {
        doctors: Vec<Doctor>,
        cases: Vec<MedicalCase>,
        facilities: Vec<Facility>,
        experiences: Vec<ClinicalExperience>,
    }

    #[async_trait]
    impl DoctorRepository for FixtureRepos {
        async fn find_by_specialty(&self, specialty: &str, limit: usize) -> GraphResult<Vec<Doctor>> {
            Ok(self
                .doctors
                .iter()
                .filter(|d| d.specialties.iter().any(|s| s.eq_ignore_ascii_case(specialty)))
                .take(limit)
                .cloned()
                .collect())
        }
        async fn find_all_ids(&self, limit: usize) -> GraphResult<Vec<String>> {
            Ok(self.doctors.iter().take(limit).map(|d| d.id.clone()).collect())
        }
        async fn find_by_ids(&self, doctor_ids: &[String]) -> GraphResult<Vec<Doctor>> {
            Ok(self
                .doctors
                .iter()
                .filter(|d| doctor_ids.contains(&d.id))
                .cloned()
                .collect())
        }
        async fn find_doctor_ids_by_facility_id(&self, facility_id: &str, limit: usize) -> GraphResult<Vec<String>> {
            Ok(self
                .doctors
                .iter()
                .filter(|d| d.facility_ids.iter().any(|f| f == facility_id))
                .take(limit)
                .map(|d| d.id.clone())
                .collect())
        }
    }

    #[async_trait]
    impl CaseRepository for FixtureRepos {
        async fn find_by_id(&self, case_id: &str) -> GraphResult<Option<MedicalCase>> {
            Ok(self.cases.iter().find(|c| c.id == case_id).cloned())
        }
    }

    #[async_trait]
    impl FacilityRepository for FixtureRepos {
        async fn find_all(&self) -> GraphResult<Vec<Facility>> {
            Ok(self.facilities.clone())
        }
    }

    #[async_trait]
    impl ExperienceRepository for FixtureRepos {
        async fn find_by_doctor_id(&self, doctor_id: &str) -> GraphResult<Vec<ClinicalExperience>> {
            Ok(self
                .experiences
                .iter()
                .filter(|e| e.doctor_id == doctor_id)
                .cloned()
                .collect())
        }
        async fn find_by_doctor_ids(&self, doctor_ids: &[String]) -> GraphResult<Vec<ClinicalExperience>> {
            Ok(self
                .experiences
                .iter()
                .filter(|e| doctor_ids.contains(&e.doctor_id))
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    struct RecordingMatchStore {
        records: Mutex<Vec<ConsultationMatch>>,
    }

    #[async_trait]
    impl ConsultationMatchStore for RecordingMatchStore {
        async fn insert_batch(&self, matches: &[ConsultationMatch]) -> GraphResult<()> {
            self.records
                .lock()
                .map_err(|_| GraphError::StorageError("match store lock poisoned".into()))?
                .extend_from_slice(matches);
            Ok(())
        }
    }

    fn doctor(id: &str, specialties: &[&str], telehealth: bool) -> Doctor {
        Doctor {
            id: id.into(),
            name: format!("Dr {id}"),
            email: format!("{id}@example.org"),
            specialties: specialties.iter().map(|s| s.to_string()).collect(),
            facility_ids: Vec::new(),
            telehealth_enabled: telehealth,
            years_experience: None,
        }
    }

    fn case(id: &str, required: Option<&str>) -> MedicalCase {
        MedicalCase {
            id: id.into(),
            chief_complaint: "chest pain".into(),
            icd10_codes: Vec::new(),
            required_specialty: required.map(|s| s.to_string()),
            urgency_level: None,
        }
    }

    fn facility(id: &str, facility_type: &str, capabilities: &[&str]) -> Facility {
        Facility {
            id: id.into(),
            name: format!("Facility {id}"),
            facility_type: Some(facility_type.into()),
            capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
            capacity: Some(100),
            current_occupancy: Some(50),
        }
    }

    async fn seeded_gateway() -> Arc<GraphGateway> {
        let gateway = Arc::new(GraphGateway::new(Arc::new(MemoryGraphStore::new())));
        gateway.ensure_graph().await.unwrap();
        let statements = [
            "MERGE (d:Doctor {id: 'd1'})",
            "MERGE (d:Doctor {id: 'd2'})",
            "MERGE (d:Doctor {id: 'd3'})",
            "MERGE (c:MedicalCase {id: 'c1'})",
            "MERGE (s:MedicalSpecialty {name: 'Cardiology'})",
            "MATCH (d:Doctor {id: 'd1'}) MATCH (s:MedicalSpecialty {name: 'Cardiology'}) MERGE (d)-[:SPECIALIZES_IN]->(s)",
            "MATCH (d:Doctor {id: 'd1'}) MATCH (c:MedicalCase {id: 'c1'}) MERGE (d)-[:TREATED]->(c)",
        ];
        for statement in statements {
            gateway.execute(statement, &ParamMap::new()).await.unwrap();
        }
        gateway
    }

    async fn service_with(repos: FixtureRepos) -> (MatchingService, Arc<RecordingMatchStore>) {
        let _ = env_logger::builder().is_test(true).try_init();
        let repos = Arc::new(repos);
        let store = Arc::new(RecordingMatchStore::default());
        let gateway = seeded_gateway().await;
        let scorer = CompositeScorer::new(
            SignalScorer::new(gateway),
            Arc::new(BaselineSimilarity),
            repos.clone(),
            repos.clone(),
        );
        let service =
            MatchingService::new(repos.clone(), repos.clone(), repos, store.clone(), scorer);
        (service, store)
    }

    #[tokio::test]
    async fn should_reject_blank_case_id() {
        let (service, _) = service_with(FixtureRepos::default()).await;
        let err = service.match_doctors_to_case("  ", &MatchOptions::default()).await.unwrap_err();
        assert!(matches!(err, GraphError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn should_fail_fast_when_case_is_unknown() {
        let (service, _) = service_with(FixtureRepos::default()).await;
        let err = service.match_doctors_to_case("missing", &MatchOptions::default()).await.unwrap_err();
        assert!(matches!(err, GraphError::NotFound(_)));
    }

    #[tokio::test]
    async fn should_return_only_doctors_holding_the_preferred_specialty() {
        let repos = FixtureRepos {
            doctors: vec![doctor("d1", &["Cardiology"], true), doctor("d2", &["Neurology"], true)],
            cases: vec![case("c1", Some("Cardiology"))],
            ..Default::default()
        };
        let (service, store) = service_with(repos).await;
        let options = MatchOptions {
            preferred_specialties: vec!["Cardiology".into()],
            ..Default::default()
        };

        let matches = service.match_doctors_to_case(" C1 ", &options).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].doctor.id, "d1");
        assert_eq!(matches[0].rank, 1);

        let records = store.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].doctor_id, "d1");
        assert_eq!(records[0].status, "PENDING");
    }

    #[tokio::test]
    async fn should_drop_candidates_below_min_score() {
        let repos = FixtureRepos {
            doctors: vec![doctor("d1", &["Cardiology"], true)],
            cases: vec![case("c1", Some("Cardiology"))],
            ..Default::default()
        };
        let (service, store) = service_with(repos).await;
        let options = MatchOptions { min_score: Some(99.0), ..Default::default() };

        let matches = service.match_doctors_to_case("c1", &options).await.unwrap();
        assert!(matches.is_empty());
        assert!(store.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_truncate_to_max_results_with_ascending_id_tiebreak() {
        // d2 and d3 have identical (zero-signal) scores.
        let repos = FixtureRepos {
            doctors: vec![
                doctor("d3", &["Cardiology"], true),
                doctor("d1", &["Cardiology"], true),
                doctor("d2", &["Cardiology"], true),
            ],
            cases: vec![case("c1", Some("Cardiology"))],
            ..Default::default()
        };
        let (service, _) = service_with(repos).await;
        let options = MatchOptions { max_results: 2, ..Default::default() };

        let matches = service.match_doctors_to_case("c1", &options).await.unwrap();
        assert_eq!(matches.len(), 2);
        // d1 carries the TREATED and SPECIALIZES_IN edges, so it leads;
        // d2 beats d3 on the id tie-break.
        assert_eq!(matches[0].doctor.id, "d1");
        assert_eq!(matches[1].doctor.id, "d2");
        assert!(matches[0].match_score >= matches[1].match_score);
    }

    #[tokio::test]
    async fn should_exclude_doctors_without_telehealth_when_required() {
        let repos = FixtureRepos {
            doctors: vec![doctor("d1", &["Cardiology"], false), doctor("d2", &["Cardiology"], true)],
            cases: vec![case("c1", Some("Cardiology"))],
            ..Default::default()
        };
        let (service, _) = service_with(repos).await;
        let options = MatchOptions { require_telehealth: true, ..Default::default() };

        let matches = service.match_doctors_to_case("c1", &options).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].doctor.id, "d2");
    }

    #[tokio::test]
    async fn should_accumulate_match_records_across_reruns() {
        let repos = FixtureRepos {
            doctors: vec![doctor("d1", &["Cardiology"], true)],
            cases: vec![case("c1", Some("Cardiology"))],
            ..Default::default()
        };
        let (service, store) = service_with(repos).await;

        service.match_doctors_to_case("c1", &MatchOptions::default()).await.unwrap();
        service.match_doctors_to_case("c1", &MatchOptions::default()).await.unwrap();

        // One record per invocation: the match history is append-only.
        let records = store.records.lock().unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.case_id == "c1" && r.doctor_id == "d1"));
        assert_ne!(records[0].id, records[1].id);
    }

    #[tokio::test]
    async fn should_route_only_to_facilities_of_the_preferred_type() {
        let repos = FixtureRepos {
            cases: vec![case("c1", None)],
            facilities: vec![
                facility("f1", "ACADEMIC", &["cardiology"]),
                facility("f2", "COMMUNITY", &["cardiology"]),
            ],
            ..Default::default()
        };
        let (service, _) = service_with(repos).await;
        let options = RoutingOptions {
            preferred_facility_types: vec!["ACADEMIC".into()],
            ..Default::default()
        };

        let routed = service.route_case_to_facilities("c1", &options).await.unwrap();
        assert_eq!(routed.len(), 1);
        assert_eq!(routed[0].facility.id, "f1");
        assert_eq!(routed[0].rank, 1);
    }

    #[tokio::test]
    async fn should_require_all_requested_capabilities() {
        let repos = FixtureRepos {
            cases: vec![case("c1", None)],
            facilities: vec![
                facility("f1", "ACADEMIC", &["cardiology", "icu"]),
                facility("f2", "ACADEMIC", &["cardiology"]),
            ],
            ..Default::default()
        };
        let (service, _) = service_with(repos).await;
        let options = RoutingOptions {
            required_capabilities: vec!["Cardiology".into(), "ICU".into()],
            ..Default::default()
        };

        let routed = service.route_case_to_facilities("c1", &options).await.unwrap();
        assert_eq!(routed.len(), 1);
        assert_eq!(routed[0].facility.id, "f1");
    }

    #[tokio::test]
    async fn should_compute_priority_for_resolved_case() {
        let repos = FixtureRepos { cases: vec![case("c1", None)], ..Default::default() };
        let (service, _) = service_with(repos).await;
        let priority = service.case_priority("c1").await.unwrap();
        assert!((priority.overall_score - 50.0).abs() < 1e-9);
    }
}
