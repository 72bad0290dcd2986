// graph_gateway/src/lib.rs

pub mod gateway;
pub mod memory;
pub mod store;

pub use gateway::GraphGateway;
pub use memory::MemoryGraphStore;
pub use store::{GraphStore, Row};
