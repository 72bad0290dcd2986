// graph_decoding/src/lib.rs

pub mod decode;
pub mod stats;
pub mod view;

pub use decode::{decode_vertex, edge_columns, extract_edge_type, extract_property, extract_vertex_id, DecodedVertex};
pub use stats::{collect_statistics, GraphStatistics};
pub use view::{client_side_paginate, graph_data, GraphData, GraphEdgeView, GraphNode};
