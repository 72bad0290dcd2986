// graph_gateway/src/gateway.rs
use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, info, warn};
use models::errors::{GraphError, GraphResult};
use models::properties::ParamMap;

use crate::store::{GraphStore, Row};

/// Issues parameterized graph queries against the backing store.
///
/// Owns graph-lifecycle bootstrapping: a query that fails because the
/// graph object does not exist triggers a create-then-retry recovery,
/// exactly once. Every call runs in its own independent transaction
/// scope on the store side, so bootstrapping is never lost to an
/// enclosing rollback. No query results are cached in-process.
pub struct GraphGateway {
    store: Arc<dyn GraphStore>,
}

impl GraphGateway {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Executes a query, recovering once from a missing graph.
    ///
    /// A second failure after the recovery surfaces as
    /// `GraphError::GraphOperation`; all other store errors pass through
    /// untouched.
    pub async fn execute(&self, query: &str, params: &ParamMap) -> GraphResult<Vec<Row>> {
        match self.store.execute(query, params).await {
            Ok(rows) => Ok(rows),
            Err(err) if err.is_graph_missing() => {
                warn!("graph missing during query execution, creating and retrying once");
                // Re-check before creating to avoid a double-create race.
                if !self.store.graph_exists().await? {
                    self.store.create_graph().await.map_err(|e| {
                        GraphError::GraphOperation(format!("failed to create graph during recovery: {e}"))
                    })?;
                }
                self.store.execute(query, params).await.map_err(|e| {
                    GraphError::GraphOperation(format!("query failed after graph recovery: {e}"))
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Executes a query and extracts one field from each row, dropping
    /// rows without the field and deduplicating while preserving order.
    pub async fn execute_and_extract(
        &self,
        query: &str,
        params: &ParamMap,
        result_field: &str,
    ) -> GraphResult<Vec<String>> {
        let rows = self.execute(query, params).await?;
        let mut seen = HashSet::new();
        let mut values = Vec::new();
        for row in rows {
            if let Some(value) = row.get(result_field) {
                if !value.is_empty() && seen.insert(value.clone()) {
                    values.push(value.clone());
                }
            }
        }
        Ok(values)
    }

    pub async fn graph_exists(&self) -> GraphResult<bool> {
        self.store.graph_exists().await
    }

    /// Creates the graph if it does not exist yet. Idempotent.
    pub async fn ensure_graph(&self) -> GraphResult<()> {
        if self.store.graph_exists().await? {
            debug!("graph already exists, nothing to create");
            return Ok(());
        }
        self.store.create_graph().await?;
        info!("graph created");
        Ok(())
    }

    /// Best-effort vertex index creation; failures are logged, not raised.
    pub async fn create_vertex_index(&self, label: &str) {
        if let Err(err) = validate_label(label) {
            warn!("skipping index for invalid label {label}: {err}");
            return;
        }
        if let Err(err) = self.store.create_vertex_index(label).await {
            warn!("index creation for label {label} failed (continuing): {err}");
        }
    }

    pub async fn distinct_vertex_types(&self) -> GraphResult<Vec<String>> {
        let rows = self
            .execute("MATCH (v) RETURN DISTINCT labels(v)[0] as type", &ParamMap::new())
            .await?;
        Ok(collect_single_column(rows, "type"))
    }

    pub async fn distinct_edge_types(&self) -> GraphResult<Vec<String>> {
        let rows = self
            .execute("MATCH ()-[e]->() RETURN DISTINCT type(e) as type", &ParamMap::new())
            .await?;
        Ok(collect_single_column(rows, "type"))
    }

    pub async fn count_vertices_by_type(&self, vertex_type: &str) -> GraphResult<Option<i64>> {
        validate_label(vertex_type)?;
        let query = format!("MATCH (v:{vertex_type}) RETURN count(v) as cnt");
        let rows = self.execute(&query, &ParamMap::new()).await?;
        Ok(first_count(&rows, "cnt"))
    }

    pub async fn count_edges_by_type(&self, edge_type: &str) -> GraphResult<Option<i64>> {
        validate_label(edge_type)?;
        let query = format!("MATCH ()-[e:{edge_type}]->() RETURN count(e) as cnt");
        let rows = self.execute(&query, &ParamMap::new()).await?;
        Ok(first_count(&rows, "cnt"))
    }

    /// Edges with their endpoint vertices, as raw rows for the decoder.
    pub async fn edges(&self, limit: usize) -> GraphResult<Vec<Row>> {
        let query =
            format!("MATCH (a)-[e]->(b) RETURN a as source, e as edge, b as target LIMIT {limit}");
        self.execute(&query, &ParamMap::new()).await
    }

    /// Vertices as raw rows for the decoder, optionally filtered by type.
    pub async fn vertices(&self, limit: usize, vertex_type: Option<&str>) -> GraphResult<Vec<Row>> {
        let query = match vertex_type {
            Some(label) => {
                validate_label(label)?;
                format!("MATCH (v:{label}) RETURN v ORDER BY id(v) LIMIT {limit}")
            }
            None => format!("MATCH (v) RETURN v ORDER BY id(v) LIMIT {limit}"),
        };
        self.execute(&query, &ParamMap::new()).await
    }
}

/// Labels and edge types are interpolated into query text, so only
/// identifier-safe characters are allowed through.
pub fn validate_label(label: &str) -> GraphResult<()> {
    if label.is_empty() || !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(GraphError::QueryError(format!("invalid label: {label:?}")));
    }
    Ok(())
}

/// Single-column results surface under `c`; named aliases are the
/// fallback for stores that keep the alias.
fn collect_single_column(rows: Vec<Row>, alias: &str) -> Vec<String> {
    rows.into_iter()
        .filter_map(|row| row.get("c").or_else(|| row.get(alias)).cloned())
        .filter(|value| !value.is_empty())
        .collect()
}

fn first_count(rows: &[Row], alias: &str) -> Option<i64> {
    rows.first()
        .and_then(|row| row.get("c").or_else(|| row.get(alias)))
        .and_then(|value| value.trim().parse::<i64>().ok())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use models::errors::{GraphError, GraphResult};
    use models::properties::ParamMap;

    use super::*;
    use crate::memory::MemoryGraphStore;
    use crate::store::GraphStore;

    /// Store that reports the graph missing until it has been created,
    /// counting create calls.
    struct FlakyStore {
        inner: MemoryGraphStore,
        creates: AtomicUsize,
    }

    #[async_trait]
    impl GraphStore for FlakyStore {
        async fn execute(&self, query: &str, params: &ParamMap) -> GraphResult<Vec<Row>> {
            self.inner.execute(query, params).await
        }
        async fn graph_exists(&self) -> GraphResult<bool> {
            self.inner.graph_exists().await
        }
        async fn create_graph(&self) -> GraphResult<()> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            self.inner.create_graph().await
        }
        async fn create_vertex_index(&self, label: &str) -> GraphResult<()> {
            self.inner.create_vertex_index(label).await
        }
    }

    /// Store whose graph can never be created, to exercise the fatal path.
    struct BrokenStore;

    #[async_trait]
    impl GraphStore for BrokenStore {
        async fn execute(&self, _query: &str, _params: &ParamMap) -> GraphResult<Vec<Row>> {
            Err(GraphError::GraphMissing("no graph".into()))
        }
        async fn graph_exists(&self) -> GraphResult<bool> {
            Ok(false)
        }
        async fn create_graph(&self) -> GraphResult<()> {
            Ok(())
        }
        async fn create_vertex_index(&self, _label: &str) -> GraphResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn should_create_graph_and_retry_once_when_graph_is_missing() {
        let store = Arc::new(FlakyStore {
            inner: MemoryGraphStore::new(),
            creates: AtomicUsize::new(0),
        });
        let gateway = GraphGateway::new(store.clone());

        let mut params = ParamMap::new();
        params.insert("id".into(), "d1".into());
        let rows = gateway
            .execute("MERGE (d:Doctor {id: $id})", &params)
            .await
            .unwrap();
        assert!(rows.is_empty());
        assert_eq!(store.creates.load(Ordering::SeqCst), 1);
        assert!(gateway.graph_exists().await.unwrap());
    }

    #[tokio::test]
    async fn should_surface_graph_operation_error_when_retry_fails() {
        let gateway = GraphGateway::new(Arc::new(BrokenStore));
        let err = gateway
            .execute("MATCH (v) RETURN count(v) as cnt", &ParamMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::GraphOperation(_)));
    }

    #[tokio::test]
    async fn should_be_idempotent_when_ensuring_graph() {
        let gateway = GraphGateway::new(Arc::new(MemoryGraphStore::new()));
        gateway.ensure_graph().await.unwrap();
        gateway.ensure_graph().await.unwrap();
        assert!(gateway.graph_exists().await.unwrap());
    }

    #[tokio::test]
    async fn should_extract_distinct_non_empty_field_values_in_order() {
        let store = Arc::new(MemoryGraphStore::new());
        let gateway = GraphGateway::new(store);
        gateway.ensure_graph().await.unwrap();

        for id in ["d1", "d2", "d1"] {
            let mut params = ParamMap::new();
            params.insert("id".into(), id.into());
            gateway.execute("MERGE (d:Doctor {id: $id})", &params).await.unwrap();
        }

        let types = gateway.distinct_vertex_types().await.unwrap();
        assert_eq!(types, vec!["Doctor".to_string()]);
        assert_eq!(gateway.count_vertices_by_type("Doctor").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn should_reject_labels_with_unsafe_characters() {
        let gateway = GraphGateway::new(Arc::new(MemoryGraphStore::new()));
        let err = gateway.count_vertices_by_type("Doctor) DELETE (v").await.unwrap_err();
        assert!(matches!(err, GraphError::QueryError(_)));
    }
}
