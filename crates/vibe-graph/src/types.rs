use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use vibe_core::{Result, VibeError};

/// A typed node in the architecture graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub layer: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// A directed edge between two graph nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from_id: String,
    pub to_id: String,
    #[serde(rename = "type", default = "GraphEdge::default_kind")]
    pub kind: String,
}

impl GraphEdge {
    fn default_kind() -> String {
        "LINKED_TO".to_string()
    }
}

/// A full node/edge snapshot of the live graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Category of a saved graph snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphType {
    Nfr,
    ApplicationArchitecture,
}

impl GraphType {
    pub fn parse(raw: &str) -> Result<GraphType> {
        match raw {
            "nfr" => Ok(GraphType::Nfr),
            "application_architecture" => Ok(GraphType::ApplicationArchitecture),
            other => Err(VibeError::InvalidInput(format!(
                "graph_type must be 'nfr' or 'application_architecture', got '{}'",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GraphType::Nfr => "nfr",
            GraphType::ApplicationArchitecture => "application_architecture",
        }
    }
}

impl fmt::Display for GraphType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Listing entry for a saved graph snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedGraphMeta {
    pub name: String,
    pub graph_type: String,
    pub created_at: Option<String>,
    pub nodes_count: i64,
    pub edges_count: i64,
}

/// Structurally validate a bulk import payload before any write happens.
///
/// Requires `nodes` and `edges` arrays; every node needs `id` and `name`,
/// every edge needs `from_id` and `to_id`.
pub fn validate_graph_payload(payload: &Value) -> Result<GraphData> {
    let nodes = payload
        .get("nodes")
        .and_then(Value::as_array)
        .ok_or_else(|| VibeError::InvalidInput("payload must contain a 'nodes' array".into()))?;
    let edges = payload
        .get("edges")
        .and_then(Value::as_array)
        .ok_or_else(|| VibeError::InvalidInput("payload must contain an 'edges' array".into()))?;

    let mut parsed_nodes = Vec::with_capacity(nodes.len());
    for (i, node) in nodes.iter().enumerate() {
        let node: GraphNode = serde_json::from_value(node.clone())
            .map_err(|e| VibeError::InvalidInput(format!("invalid node at index {}: {}", i, e)))?;
        if node.id.trim().is_empty() {
            return Err(VibeError::InvalidInput(format!(
                "node at index {} has an empty id",
                i
            )));
        }
        parsed_nodes.push(node);
    }

    let mut parsed_edges = Vec::with_capacity(edges.len());
    for (i, edge) in edges.iter().enumerate() {
        let edge: GraphEdge = serde_json::from_value(edge.clone())
            .map_err(|e| VibeError::InvalidInput(format!("invalid edge at index {}: {}", i, e)))?;
        if edge.from_id.trim().is_empty() || edge.to_id.trim().is_empty() {
            return Err(VibeError::InvalidInput(format!(
                "edge at index {} is missing endpoints",
                i
            )));
        }
        parsed_edges.push(edge);
    }

    Ok(GraphData {
        nodes: parsed_nodes,
        edges: parsed_edges,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn graph_type_parsing_is_strict() {
        assert_eq!(GraphType::parse("nfr").unwrap(), GraphType::Nfr);
        assert_eq!(
            GraphType::parse("application_architecture").unwrap(),
            GraphType::ApplicationArchitecture
        );
        assert!(GraphType::parse("misc").is_err());
    }

    #[test]
    fn import_validation_accepts_well_formed_payloads() {
        let payload = json!({
            "nodes": [{"id": "a", "name": "A", "layer": "ux", "type": "quality"}],
            "edges": [{"from_id": "a", "to_id": "a"}]
        });
        let data = validate_graph_payload(&payload).unwrap();
        assert_eq!(data.nodes.len(), 1);
        assert_eq!(data.edges[0].kind, "LINKED_TO");
    }

    #[test]
    fn import_validation_rejects_missing_arrays_and_ids() {
        assert!(validate_graph_payload(&json!({"nodes": []})).is_err());
        assert!(validate_graph_payload(&json!({"edges": []})).is_err());

        let missing_id = json!({
            "nodes": [{"name": "A"}],
            "edges": []
        });
        assert!(validate_graph_payload(&missing_id).is_err());

        let empty_id = json!({
            "nodes": [{"id": "  ", "name": "A"}],
            "edges": []
        });
        assert!(validate_graph_payload(&empty_id).is_err());
    }

    #[test]
    fn node_kind_uses_wire_name_type() {
        let node = GraphNode {
            id: "n1".into(),
            name: "N".into(),
            description: String::new(),
            layer: "core".into(),
            kind: "service".into(),
        };
        let rendered = serde_json::to_value(&node).unwrap();
        assert_eq!(rendered["type"], "service");
        assert!(rendered.get("kind").is_none());
    }
}
