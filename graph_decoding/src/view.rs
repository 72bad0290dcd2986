// graph_decoding/src/view.rs
//
// Presentation-layer graph data: decoded nodes/edges with client-side
// pagination. Synthetic `node_<ordinal>` identifiers appear ONLY here;
// scoring and persistence never consume them.
use std::collections::HashSet;

use graph_gateway::{GraphGateway, Row};
use log::debug;
use models::errors::GraphResult;
use serde::{Deserialize, Serialize};

use crate::decode::{decode_vertex, edge_columns, extract_edge_type, extract_property, extract_vertex_id};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphEdgeView {
    pub id: String,
    pub source: String,
    pub target: String,
    pub edge_type: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdgeView>,
}

/// Offset emulation: the store has no native row-skip, so callers fetch
/// `limit + offset` rows and this discards the first `offset`.
pub fn client_side_paginate<T>(rows: Vec<T>, offset: usize) -> Vec<T> {
    if offset == 0 {
        return rows;
    }
    if offset >= rows.len() {
        return Vec::new();
    }
    rows.into_iter().skip(offset).collect()
}

fn vertex_blob(row: &Row) -> Option<&String> {
    row.get("c").or_else(|| row.get("v"))
}

/// Fetches and decodes a page of the graph for presentation consumers.
pub async fn graph_data(
    gateway: &GraphGateway,
    limit: usize,
    offset: usize,
    vertex_type: Option<&str>,
) -> GraphResult<GraphData> {
    let fetch_limit = limit + offset;
    let raw_vertices = gateway.vertices(fetch_limit, vertex_type).await?;
    let raw_vertices = client_side_paginate(raw_vertices, offset);

    let mut nodes = Vec::new();
    let mut known_ids = HashSet::new();
    for (ordinal, row) in raw_vertices.iter().enumerate() {
        let blob = match vertex_blob(row) {
            Some(blob) => blob,
            None => continue,
        };
        let node = match decode_vertex(blob) {
            Some(decoded) => GraphNode {
                name: extract_property(blob, "name"),
                id: decoded.id,
                label: decoded.label,
            },
            None => {
                // Undecodable row: keep the batch going with a synthetic
                // presentation-only identifier.
                debug!("could not decode vertex row {ordinal}, assigning synthetic id");
                GraphNode { id: format!("node_{ordinal}"), label: "Unknown".to_string(), name: None }
            }
        };
        if known_ids.insert(node.id.clone()) {
            nodes.push(node);
        }
    }

    let mut edges = Vec::new();
    let raw_edges = gateway.edges(limit).await?;
    for (index, row) in raw_edges.iter().enumerate() {
        let (source_blob, edge_blob, target_blob) = match edge_columns(row) {
            Some(columns) => columns,
            None => continue,
        };
        let source_id = match extract_vertex_id(source_blob) {
            Some(id) => id,
            None => continue,
        };
        let target_id = match extract_vertex_id(target_blob) {
            Some(id) => id,
            None => continue,
        };
        // Endpoints outside the fetched vertex page still need a node
        // for the edge to attach to.
        for (endpoint_id, blob) in [(&source_id, source_blob), (&target_id, target_blob)] {
            if known_ids.insert(endpoint_id.clone()) {
                let decoded = decode_vertex(blob);
                nodes.push(GraphNode {
                    id: endpoint_id.clone(),
                    label: decoded.map(|d| d.label).unwrap_or_else(|| "Unknown".to_string()),
                    name: extract_property(blob, "name"),
                });
            }
        }
        edges.push(GraphEdgeView {
            id: format!("e{index}"),
            source: source_id,
            target: target_id,
            edge_type: extract_edge_type(edge_blob).unwrap_or_else(|| "RELATED".to_string()),
        });
    }

    Ok(GraphData { nodes, edges })
}
