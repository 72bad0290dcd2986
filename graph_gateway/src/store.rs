// graph_gateway/src/store.rs
use std::collections::HashMap;

use async_trait::async_trait;
use models::errors::GraphResult;
use models::properties::ParamMap;

/// One result row: column name to the store's opaque text rendering of
/// the value (scalar, vertex blob or edge blob).
pub type Row = HashMap<String, String>;

/// The consumed graph-store interface.
///
/// Queries are written in a Cypher-like pattern language; parameters are
/// passed separately and bound by the store. Implementations signal an
/// uninitialized graph with `GraphError::GraphMissing` so the gateway can
/// run its one-shot create-and-retry recovery.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn execute(&self, query: &str, params: &ParamMap) -> GraphResult<Vec<Row>>;

    async fn graph_exists(&self) -> GraphResult<bool>;

    /// Creates the graph object. Must be idempotent.
    async fn create_graph(&self) -> GraphResult<()>;

    /// Best-effort secondary index on a vertex label's property storage.
    async fn create_vertex_index(&self, label: &str) -> GraphResult<()>;
}
