pub mod client;
pub mod types;

pub use client::GraphClient;
pub use types::{
    validate_graph_payload, GraphData, GraphEdge, GraphNode, GraphType, SavedGraphMeta,
};
