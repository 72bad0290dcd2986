// graph_decoding/src/stats.rs
//
// Graph statistics. The store's query language cannot combine DISTINCT
// with aggregates, so grouped counts are emulated: enumerate distinct
// type labels first, then count each type with its own query. BTreeMap
// keeps counts sorted by type name for deterministic output.
use std::collections::BTreeMap;

use graph_gateway::GraphGateway;
use log::debug;
use models::errors::GraphResult;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStatistics {
    pub graph_exists: bool,
    pub vertex_counts: BTreeMap<String, i64>,
    pub edge_counts: BTreeMap<String, i64>,
    pub total_vertices: i64,
    pub total_edges: i64,
}

/// Client-side GROUP BY emulation for vertex labels.
pub async fn count_vertices_by_distinct_type(gateway: &GraphGateway) -> GraphResult<BTreeMap<String, i64>> {
    let mut counts = BTreeMap::new();
    for vertex_type in gateway.distinct_vertex_types().await? {
        let count = gateway.count_vertices_by_type(&vertex_type).await?.unwrap_or(0);
        counts.insert(vertex_type, count);
    }
    Ok(counts)
}

/// Client-side GROUP BY emulation for edge types.
pub async fn count_edges_by_distinct_type(gateway: &GraphGateway) -> GraphResult<BTreeMap<String, i64>> {
    let mut counts = BTreeMap::new();
    for edge_type in gateway.distinct_edge_types().await? {
        let count = gateway.count_edges_by_type(&edge_type).await?.unwrap_or(0);
        counts.insert(edge_type, count);
    }
    Ok(counts)
}

pub async fn collect_statistics(gateway: &GraphGateway) -> GraphResult<GraphStatistics> {
    if !gateway.graph_exists().await? {
        debug!("graph does not exist, returning empty statistics");
        return Ok(GraphStatistics::default());
    }
    let vertex_counts = count_vertices_by_distinct_type(gateway).await?;
    let edge_counts = count_edges_by_distinct_type(gateway).await?;
    let total_vertices = vertex_counts.values().sum();
    let total_edges = edge_counts.values().sum();
    Ok(GraphStatistics {
        graph_exists: true,
        vertex_counts,
        edge_counts,
        total_vertices,
        total_edges,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use graph_gateway::{GraphGateway, MemoryGraphStore};
    use models::properties::ParamMap;
    use models::PropertyValue;

    use super::*;

    async fn seeded_gateway() -> GraphGateway {
        let gateway = GraphGateway::new(Arc::new(MemoryGraphStore::new()));
        gateway.ensure_graph().await.unwrap();
        for id in ["d1", "d2"] {
            let mut params = ParamMap::new();
            params.insert("id".into(), PropertyValue::from(id));
            gateway.execute("MERGE (d:Doctor {id: $id})", &params).await.unwrap();
        }
        let mut params = ParamMap::new();
        params.insert("id".into(), PropertyValue::from("c1"));
        gateway.execute("MERGE (c:MedicalCase {id: $id})", &params).await.unwrap();
        let mut params = ParamMap::new();
        params.insert("doctorId".into(), PropertyValue::from("d1"));
        params.insert("caseId".into(), PropertyValue::from("c1"));
        gateway
            .execute(
                "MATCH (a:Doctor {id: $doctorId}) MATCH (b:MedicalCase {id: $caseId}) MERGE (a)-[:TREATED]->(b)",
                &params,
            )
            .await
            .unwrap();
        gateway
    }

    #[tokio::test]
    async fn should_report_empty_statistics_when_graph_is_missing() {
        let gateway = GraphGateway::new(Arc::new(MemoryGraphStore::new()));
        let stats = collect_statistics(&gateway).await.unwrap();
        assert!(!stats.graph_exists);
        assert_eq!(stats.total_vertices, 0);
        assert!(stats.vertex_counts.is_empty());
    }

    #[tokio::test]
    async fn should_count_vertices_and_edges_per_type_sorted_by_name() {
        let gateway = seeded_gateway().await;
        let stats = collect_statistics(&gateway).await.unwrap();
        assert!(stats.graph_exists);
        assert_eq!(stats.total_vertices, 3);
        assert_eq!(stats.total_edges, 1);
        let types: Vec<&String> = stats.vertex_counts.keys().collect();
        assert_eq!(types, vec!["Doctor", "MedicalCase"]);
        assert_eq!(stats.vertex_counts["Doctor"], 2);
        assert_eq!(stats.edge_counts["TREATED"], 1);
    }
}
