// matching/src/signals.rs
//
// The four relationship signals, each a [0, 1] score for one doctor
// against one case. Every signal is a handful of count queries; the
// neutral 0.5 is returned wherever the case itself carries no evidence
// to check against.
use std::sync::Arc;

use graph_gateway::GraphGateway;
use models::errors::GraphResult;
use models::properties::ParamMap;

pub struct SignalScorer {
    gateway: Arc<GraphGateway>,
}

impl SignalScorer {
    pub fn new(gateway: Arc<GraphGateway>) -> Self {
        Self { gateway }
    }

    /// 1.0 when any TREATED or CONSULTED_ON edge ties the doctor to the
    /// case; the two kinds are OR-ed, never summed.
    pub async fn direct_relationship_score(&self, doctor_id: &str, case_id: &str) -> GraphResult<f64> {
        let mut params = ParamMap::new();
        params.insert("doctorId".into(), doctor_id.into());
        params.insert("caseId".into(), case_id.into());

        let treated = self
            .count(
                "MATCH (d:Doctor {id: $doctorId})-[:TREATED]->(c:MedicalCase {id: $caseId}) RETURN count(*)",
                &params,
            )
            .await?;
        if treated > 0 {
            return Ok(1.0);
        }
        let consulted = self
            .count(
                "MATCH (d:Doctor {id: $doctorId})-[:CONSULTED_ON]->(c:MedicalCase {id: $caseId}) RETURN count(*)",
                &params,
            )
            .await?;
        Ok(if consulted > 0 { 1.0 } else { 0.0 })
    }

    /// Fraction of the case's ICD-10 codes the doctor has a
    /// TREATS_CONDITION edge for. Neutral 0.5 when the case carries no
    /// codes.
    pub async fn condition_expertise_score(&self, doctor_id: &str, icd10_codes: &[String]) -> GraphResult<f64> {
        if icd10_codes.is_empty() {
            return Ok(0.5);
        }
        let mut matched = 0usize;
        for code in icd10_codes {
            let mut params = ParamMap::new();
            params.insert("doctorId".into(), doctor_id.into());
            params.insert("icd10Code".into(), code.as_str().into());
            let count = self
                .count(
                    "MATCH (d:Doctor {id: $doctorId})-[:TREATS_CONDITION]->(i:ICD10Code {code: $icd10Code}) RETURN count(*)",
                    &params,
                )
                .await?;
            if count > 0 {
                matched += 1;
            }
        }
        Ok(matched as f64 / icd10_codes.len() as f64)
    }

    /// 1.0 when a SPECIALIZES_IN edge exists to the required specialty,
    /// 0.0 otherwise; neutral 0.5 when the case requires none.
    pub async fn specialization_score(&self, doctor_id: &str, required_specialty: Option<&str>) -> GraphResult<f64> {
        let Some(specialty) = required_specialty.filter(|s| !s.trim().is_empty()) else {
            return Ok(0.5);
        };
        let mut params = ParamMap::new();
        params.insert("doctorId".into(), doctor_id.into());
        params.insert("specialtyName".into(), specialty.into());
        let count = self
            .count(
                "MATCH (d:Doctor {id: $doctorId})-[:SPECIALIZES_IN]->(s:MedicalSpecialty {name: $specialtyName}) RETURN count(*)",
                &params,
            )
            .await?;
        Ok(if count > 0 { 1.0 } else { 0.0 })
    }

    /// Maximum per-code count of other cases the doctor has TREATED that
    /// HAS_CONDITION the same code, bucketed. The max (not the sum)
    /// keeps overlapping codes from double-counting. Neutral 0.5 when
    /// the case carries no codes.
    pub async fn similar_cases_score(&self, doctor_id: &str, icd10_codes: &[String]) -> GraphResult<f64> {
        if icd10_codes.is_empty() {
            return Ok(0.5);
        }
        let mut max_count = 0i64;
        for code in icd10_codes {
            let mut params = ParamMap::new();
            params.insert("doctorId".into(), doctor_id.into());
            params.insert("icd10Code".into(), code.as_str().into());
            let count = self
                .count(
                    "MATCH (d:Doctor {id: $doctorId})-[:TREATED]->(c:MedicalCase)-[:HAS_CONDITION]->(i:ICD10Code {code: $icd10Code}) RETURN count(*)",
                    &params,
                )
                .await?;
            max_count = max_count.max(count);
        }
        Ok(bucket_similar_count(max_count))
    }

    async fn count(&self, query: &str, params: &ParamMap) -> GraphResult<i64> {
        let rows = self.gateway.execute(query, params).await?;
        Ok(rows
            .first()
            .and_then(|row| row.get("c"))
            .and_then(|value| value.trim().parse::<i64>().ok())
            .unwrap_or(0))
    }
}

/// Dampening buckets for similar-case volume. The cutoffs are a tunable
/// heuristic kept for compatibility with historical scores.
pub fn bucket_similar_count(count: i64) -> f64 {
    match count {
        i64::MIN..=0 => 0.0,
        1 => 0.5,
        2..=5 => 0.75,
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use graph_gateway::MemoryGraphStore;
    use models::properties::ParamMap;

    use super::*;

    async fn seeded_scorer() -> SignalScorer {
        let gateway = Arc::new(GraphGateway::new(Arc::new(MemoryGraphStore::new())));
        gateway.ensure_graph().await.unwrap();
        let statements = [
            "MERGE (d:Doctor {id: 'd1'})",
            "MERGE (d:Doctor {id: 'd2'})",
            "MERGE (c:MedicalCase {id: 'c1'})",
            "MERGE (c:MedicalCase {id: 'c2'})",
            "MERGE (i:ICD10Code {code: 'I21.9'})",
            "MERGE (i:ICD10Code {code: 'E11.9'})",
            "MERGE (s:MedicalSpecialty {name: 'Cardiology'})",
        ];
        for statement in statements {
            gateway.execute(statement, &ParamMap::new()).await.unwrap();
        }
        let edges = [
            "MATCH (d:Doctor {id: 'd1'}) MATCH (c:MedicalCase {id: 'c1'}) MERGE (d)-[:TREATED]->(c)",
            "MATCH (d:Doctor {id: 'd1'}) MATCH (c:MedicalCase {id: 'c2'}) MERGE (d)-[:TREATED]->(c)",
            "MATCH (d:Doctor {id: 'd2'}) MATCH (c:MedicalCase {id: 'c1'}) MERGE (d)-[:CONSULTED_ON]->(c)",
            "MATCH (d:Doctor {id: 'd1'}) MATCH (i:ICD10Code {code: 'I21.9'}) MERGE (d)-[:TREATS_CONDITION]->(i)",
            "MATCH (d:Doctor {id: 'd1'}) MATCH (s:MedicalSpecialty {name: 'Cardiology'}) MERGE (d)-[:SPECIALIZES_IN]->(s)",
            "MATCH (c:MedicalCase {id: 'c1'}) MATCH (i:ICD10Code {code: 'I21.9'}) MERGE (c)-[:HAS_CONDITION]->(i)",
            "MATCH (c:MedicalCase {id: 'c2'}) MATCH (i:ICD10Code {code: 'I21.9'}) MERGE (c)-[:HAS_CONDITION]->(i)",
        ];
        for statement in edges {
            gateway.execute(statement, &ParamMap::new()).await.unwrap();
        }
        SignalScorer::new(gateway)
    }

    #[tokio::test]
    async fn should_score_one_for_any_direct_tie_and_zero_otherwise() {
        let scorer = seeded_scorer().await;
        // TREATED tie.
        assert_eq!(scorer.direct_relationship_score("d1", "c1").await.unwrap(), 1.0);
        // CONSULTED_ON alone is enough.
        assert_eq!(scorer.direct_relationship_score("d2", "c1").await.unwrap(), 1.0);
        assert_eq!(scorer.direct_relationship_score("d2", "c2").await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn should_score_condition_expertise_as_matched_fraction() {
        let scorer = seeded_scorer().await;
        assert_eq!(scorer.condition_expertise_score("d1", &[]).await.unwrap(), 0.5);
        let codes = vec!["I21.9".to_string(), "E11.9".to_string()];
        assert_eq!(scorer.condition_expertise_score("d1", &codes).await.unwrap(), 0.5);
        let single = vec!["I21.9".to_string()];
        assert_eq!(scorer.condition_expertise_score("d1", &single).await.unwrap(), 1.0);
        assert_eq!(scorer.condition_expertise_score("d2", &single).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn should_score_specialization_against_required_specialty() {
        let scorer = seeded_scorer().await;
        assert_eq!(scorer.specialization_score("d1", Some("Cardiology")).await.unwrap(), 1.0);
        assert_eq!(scorer.specialization_score("d2", Some("Cardiology")).await.unwrap(), 0.0);
        assert_eq!(scorer.specialization_score("d2", None).await.unwrap(), 0.5);
        assert_eq!(scorer.specialization_score("d2", Some("  ")).await.unwrap(), 0.5);
    }

    #[tokio::test]
    async fn should_take_maximum_per_code_similar_case_count() {
        let scorer = seeded_scorer().await;
        // d1 treated two cases carrying I21.9, none carrying E11.9.
        let codes = vec!["E11.9".to_string(), "I21.9".to_string()];
        assert_eq!(scorer.similar_cases_score("d1", &codes).await.unwrap(), 0.75);
        assert_eq!(scorer.similar_cases_score("d2", &codes).await.unwrap(), 0.0);
        assert_eq!(scorer.similar_cases_score("d2", &[]).await.unwrap(), 0.5);
    }

    #[test]
    fn should_bucket_similar_counts_at_fixed_thresholds() {
        assert_eq!(bucket_similar_count(0), 0.0);
        assert_eq!(bucket_similar_count(1), 0.5);
        for count in 2..=5 {
            assert_eq!(bucket_similar_count(count), 0.75);
        }
        assert_eq!(bucket_similar_count(6), 1.0);
        assert_eq!(bucket_similar_count(40), 1.0);
    }
}
