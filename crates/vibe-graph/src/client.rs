use std::time::Duration;

use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use vibe_core::{GraphConfig, Result, VibeError};

use crate::types::{GraphData, GraphEdge, GraphNode, GraphType, SavedGraphMeta};

/// Thin gateway over the Neo4j transactional HTTP API.
///
/// Every statement batch is sent to `/db/{database}/tx/commit`; hard
/// failures surface as `VibeError::Graph` for handlers to translate 1:1
/// into error envelopes.
pub struct GraphClient {
    http: Client,
    base_url: String,
    database: String,
    username: String,
    password: Option<String>,
}

impl GraphClient {
    pub fn new(config: &GraphConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| VibeError::Graph(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.uri.trim_end_matches('/').to_string(),
            database: config.database.clone(),
            username: config.username.clone(),
            password: config
                .password
                .as_ref()
                .map(|p| p.expose_secret().to_string()),
        })
    }

    async fn run(&self, statements: Vec<CypherStatement>) -> Result<Vec<CypherResult>> {
        let url = format!("{}/db/{}/tx/commit", self.base_url, self.database);
        let request = CypherRequest { statements };

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.username, self.password.as_deref())
            .json(&request)
            .send()
            .await
            .map_err(|e| VibeError::Graph(format!("graph store unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(VibeError::Graph(format!(
                "graph store error ({}): {}",
                status, body
            )));
        }

        let parsed: CypherResponse = response
            .json()
            .await
            .map_err(|e| VibeError::Graph(format!("invalid graph store response: {}", e)))?;

        if let Some(error) = parsed.errors.first() {
            return Err(VibeError::Graph(format!(
                "{}: {}",
                error.code, error.message
            )));
        }

        Ok(parsed.results)
    }

    async fn run_one(&self, statement: &str, parameters: Value) -> Result<CypherResult> {
        let mut results = self.run(vec![cypher(statement, parameters)]).await?;
        results
            .pop()
            .ok_or_else(|| VibeError::Graph("graph store returned no result".to_string()))
    }

    /// Connectivity probe; never raises.
    pub async fn is_connected(&self) -> bool {
        self.run_one("RETURN 1", json!({})).await.is_ok()
    }

    pub async fn create_node(&self, node: &GraphNode) -> Result<GraphNode> {
        self.run_one(
            "MERGE (n:Node {id: $id}) \
             SET n.name = $name, n.description = $description, n.layer = $layer, \
                 n.type = $type, n.created_at = datetime(), n.updated_at = datetime() \
             RETURN n.id",
            json!({
                "id": node.id,
                "name": node.name,
                "description": node.description,
                "layer": node.layer,
                "type": node.kind,
            }),
        )
        .await?;
        Ok(node.clone())
    }

    pub async fn update_node(&self, node_id: &str, node: &GraphNode) -> Result<GraphNode> {
        let result = self
            .run_one(
                "MATCH (n:Node {id: $id}) \
                 SET n.name = $name, n.description = $description, n.layer = $layer, \
                     n.type = $type, n.updated_at = datetime() \
                 RETURN count(n) AS updated",
                json!({
                    "id": node_id,
                    "name": node.name,
                    "description": node.description,
                    "layer": node.layer,
                    "type": node.kind,
                }),
            )
            .await?;

        if first_i64(&result) == 0 {
            return Err(VibeError::NotFound(format!("node {} not found", node_id)));
        }
        Ok(node.clone())
    }

    pub async fn delete_node(&self, node_id: &str) -> Result<bool> {
        let result = self
            .run_one(
                "MATCH (n:Node {id: $id}) DETACH DELETE n RETURN count(n) AS deleted",
                json!({"id": node_id}),
            )
            .await?;
        Ok(first_i64(&result) > 0)
    }

    pub async fn create_edge(&self, edge: &GraphEdge) -> Result<GraphEdge> {
        let rel_type = sanitize_rel_type(&edge.kind)?;
        let result = self
            .run_one(
                &format!(
                    "MATCH (a:Node {{id: $from_id}}) MATCH (b:Node {{id: $to_id}}) \
                     MERGE (a)-[r:{}]->(b) SET r.created_at = datetime() \
                     RETURN count(r) AS linked",
                    rel_type
                ),
                json!({"from_id": edge.from_id, "to_id": edge.to_id}),
            )
            .await?;

        if first_i64(&result) == 0 {
            return Err(VibeError::NotFound(
                "edge endpoints not found in graph".to_string(),
            ));
        }
        Ok(edge.clone())
    }

    pub async fn delete_edge(&self, from_id: &str, to_id: &str, kind: Option<&str>) -> Result<bool> {
        let result = match kind {
            Some(kind) => {
                let rel_type = sanitize_rel_type(kind)?;
                self.run_one(
                    &format!(
                        "MATCH (a:Node {{id: $from_id}})-[r:{}]->(b:Node {{id: $to_id}}) \
                         DELETE r RETURN count(r) AS deleted",
                        rel_type
                    ),
                    json!({"from_id": from_id, "to_id": to_id}),
                )
                .await?
            }
            None => {
                self.run_one(
                    "MATCH (a:Node {id: $from_id})-[r]->(b:Node {id: $to_id}) \
                     DELETE r RETURN count(r) AS deleted",
                    json!({"from_id": from_id, "to_id": to_id}),
                )
                .await?
            }
        };
        Ok(first_i64(&result) > 0)
    }

    /// All nodes and edges of the live graph, nodes ordered by layer then
    /// name.
    pub async fn get_graph(&self) -> Result<GraphData> {
        let results = self
            .run(vec![
                cypher(
                    "MATCH (n:Node) \
                     RETURN n.id, n.name, n.description, n.layer, n.type \
                     ORDER BY n.layer, n.name",
                    json!({}),
                ),
                cypher(
                    "MATCH (a:Node)-[r]->(b:Node) RETURN a.id, b.id, type(r)",
                    json!({}),
                ),
            ])
            .await?;

        let nodes = results
            .first()
            .map(|r| r.data.iter().filter_map(row_to_node).collect())
            .unwrap_or_default();
        let edges = results
            .get(1)
            .map(|r| r.data.iter().filter_map(row_to_edge).collect())
            .unwrap_or_default();

        Ok(GraphData { nodes, edges })
    }

    /// Delete all nodes in a layer plus its custom-layer definition;
    /// returns the number of nodes removed.
    pub async fn delete_layer(&self, layer_name: &str) -> Result<i64> {
        let results = self
            .run(vec![
                cypher(
                    "MATCH (n:Node {layer: $layer}) DETACH DELETE n RETURN count(n) AS deleted",
                    json!({"layer": layer_name}),
                ),
                cypher(
                    "MATCH (l:CustomLayer {name: $layer}) DELETE l RETURN count(l) AS deleted",
                    json!({"layer": layer_name}),
                ),
            ])
            .await?;

        let deleted = results.first().map(first_i64).unwrap_or(0);
        info!("Deleted {} nodes from layer '{}'", deleted, layer_name);
        Ok(deleted)
    }

    /// Custom layer definitions plus distinct node layers, sorted, deduped.
    pub async fn list_layers(&self) -> Result<Vec<String>> {
        let results = self
            .run(vec![
                cypher("MATCH (l:CustomLayer) RETURN l.name ORDER BY l.name", json!({})),
                cypher(
                    "MATCH (n:Node) WHERE n.layer IS NOT NULL \
                     RETURN DISTINCT n.layer ORDER BY n.layer",
                    json!({}),
                ),
            ])
            .await?;

        let mut layers: Vec<String> = results
            .iter()
            .flat_map(|r| r.data.iter())
            .filter_map(|row| row.row.first().and_then(Value::as_str).map(str::to_string))
            .collect();
        layers.sort();
        layers.dedup();
        Ok(layers)
    }

    pub async fn create_layer(&self, name: &str, description: &str) -> Result<()> {
        let existing = self
            .run_one(
                "MATCH (l:CustomLayer {name: $name}) RETURN count(l) AS existing",
                json!({"name": name}),
            )
            .await?;
        if first_i64(&existing) > 0 {
            return Err(VibeError::InvalidInput(format!(
                "layer '{}' already exists",
                name
            )));
        }

        self.run_one(
            "CREATE (l:CustomLayer {name: $name, description: $description, created_at: datetime()})",
            json!({"name": name, "description": description}),
        )
        .await?;
        Ok(())
    }

    /// Rename a custom layer and move its member nodes along.
    pub async fn update_layer(&self, old_name: &str, new_name: &str, description: &str) -> Result<()> {
        let result = self
            .run_one(
                "MATCH (l:CustomLayer {name: $old_name}) \
                 SET l.name = $new_name, l.description = $description \
                 RETURN count(l) AS updated",
                json!({"old_name": old_name, "new_name": new_name, "description": description}),
            )
            .await?;
        if first_i64(&result) == 0 {
            return Err(VibeError::NotFound(format!("layer {} not found", old_name)));
        }

        self.run_one(
            "MATCH (n:Node {layer: $old_name}) SET n.layer = $new_name",
            json!({"old_name": old_name, "new_name": new_name}),
        )
        .await?;
        Ok(())
    }

    /// Clear the live graph while preserving saved snapshots.
    pub async fn clear_all(&self) -> Result<()> {
        self.run_one(
            "MATCH (n) WHERE NOT n:SavedGraph AND NOT n:SavedNode AND NOT n:SavedEdge \
             DETACH DELETE n",
            json!({}),
        )
        .await?;
        info!("All main graph data cleared (saved graphs preserved)");
        Ok(())
    }

    /// Persist a named snapshot of the supplied graph, replacing any
    /// existing snapshot with the same name.
    pub async fn save_graph(
        &self,
        name: &str,
        graph_type: GraphType,
        data: &GraphData,
    ) -> Result<()> {
        let mut statements = vec![
            cypher(
                "MATCH (sn:SavedNode {graph_name: $name}) DELETE sn",
                json!({"name": name}),
            ),
            cypher(
                "MATCH (se:SavedEdge {graph_name: $name}) DELETE se",
                json!({"name": name}),
            ),
            cypher(
                "MATCH (sg:SavedGraph {name: $name}) DELETE sg",
                json!({"name": name}),
            ),
            cypher(
                "CREATE (sg:SavedGraph {name: $name, graph_type: $graph_type, \
                 created_at: datetime(), nodes_count: $nodes_count, edges_count: $edges_count})",
                json!({
                    "name": name,
                    "graph_type": graph_type.as_str(),
                    "nodes_count": data.nodes.len(),
                    "edges_count": data.edges.len(),
                }),
            ),
        ];

        for node in &data.nodes {
            statements.push(cypher(
                "CREATE (sn:SavedNode {graph_name: $name, id: $id, name: $node_name, \
                 description: $description, layer: $layer, type: $type})",
                json!({
                    "name": name,
                    "id": node.id,
                    "node_name": node.name,
                    "description": node.description,
                    "layer": node.layer,
                    "type": node.kind,
                }),
            ));
        }
        for edge in &data.edges {
            statements.push(cypher(
                "CREATE (se:SavedEdge {graph_name: $name, from_id: $from_id, \
                 to_id: $to_id, type: $type})",
                json!({
                    "name": name,
                    "from_id": edge.from_id,
                    "to_id": edge.to_id,
                    "type": edge.kind,
                }),
            ));
        }

        self.run(statements).await?;
        info!("Graph '{}' saved successfully", name);
        Ok(())
    }

    pub async fn list_saved_graphs(&self) -> Result<Vec<SavedGraphMeta>> {
        let result = self
            .run_one(
                "MATCH (sg:SavedGraph) \
                 RETURN sg.name, sg.graph_type, toString(sg.created_at), \
                        sg.nodes_count, sg.edges_count \
                 ORDER BY sg.created_at DESC",
                json!({}),
            )
            .await?;

        Ok(result
            .data
            .iter()
            .filter_map(|row| {
                Some(SavedGraphMeta {
                    name: row.row.first()?.as_str()?.to_string(),
                    graph_type: row
                        .row
                        .get(1)
                        .and_then(Value::as_str)
                        .unwrap_or("application_architecture")
                        .to_string(),
                    created_at: row.row.get(2).and_then(Value::as_str).map(str::to_string),
                    nodes_count: row.row.get(3).and_then(Value::as_i64).unwrap_or(0),
                    edges_count: row.row.get(4).and_then(Value::as_i64).unwrap_or(0),
                })
            })
            .collect())
    }

    /// Read a saved snapshot without loading it into the live graph.
    pub async fn get_saved_graph(&self, name: &str) -> Result<GraphData> {
        self.require_saved_graph(name).await?;

        let results = self
            .run(vec![
                cypher(
                    "MATCH (sn:SavedNode {graph_name: $name}) \
                     RETURN sn.id, sn.name, sn.description, sn.layer, sn.type",
                    json!({"name": name}),
                ),
                cypher(
                    "MATCH (se:SavedEdge {graph_name: $name}) \
                     RETURN se.from_id, se.to_id, se.type",
                    json!({"name": name}),
                ),
            ])
            .await?;

        let nodes = results
            .first()
            .map(|r| r.data.iter().filter_map(row_to_node).collect())
            .unwrap_or_default();
        let edges = results
            .get(1)
            .map(|r| r.data.iter().filter_map(row_to_edge).collect())
            .unwrap_or_default();

        Ok(GraphData { nodes, edges })
    }

    /// Merge a saved snapshot into the live graph.
    pub async fn load_graph(&self, name: &str) -> Result<()> {
        let data = self.get_saved_graph(name).await?;
        self.import_graph(&data).await?;
        info!("Graph '{}' loaded successfully", name);
        Ok(())
    }

    pub async fn delete_saved_graph(&self, name: &str) -> Result<bool> {
        self.require_saved_graph(name).await?;

        self.run(vec![
            cypher(
                "MATCH (sn:SavedNode {graph_name: $name}) DELETE sn",
                json!({"name": name}),
            ),
            cypher(
                "MATCH (se:SavedEdge {graph_name: $name}) DELETE se",
                json!({"name": name}),
            ),
            cypher(
                "MATCH (sg:SavedGraph {name: $name}) DELETE sg",
                json!({"name": name}),
            ),
        ])
        .await?;

        info!("Deleted saved graph: {}", name);
        Ok(true)
    }

    /// Export the live graph as a bulk payload.
    pub async fn export_graph(&self) -> Result<GraphData> {
        self.get_graph().await
    }

    /// Write an already-validated bulk payload into the live graph.
    pub async fn import_graph(&self, data: &GraphData) -> Result<()> {
        let mut statements = Vec::with_capacity(data.nodes.len() + data.edges.len());

        for node in &data.nodes {
            statements.push(cypher(
                "MERGE (n:Node {id: $id}) \
                 SET n.name = $name, n.description = $description, n.layer = $layer, \
                     n.type = $type, n.created_at = datetime(), n.updated_at = datetime()",
                json!({
                    "id": node.id,
                    "name": node.name,
                    "description": node.description,
                    "layer": node.layer,
                    "type": node.kind,
                }),
            ));
        }
        for edge in &data.edges {
            let rel_type = sanitize_rel_type(&edge.kind)?;
            statements.push(cypher(
                &format!(
                    "MATCH (a:Node {{id: $from_id}}) MATCH (b:Node {{id: $to_id}}) \
                     MERGE (a)-[r:{}]->(b) SET r.created_at = datetime()",
                    rel_type
                ),
                json!({"from_id": edge.from_id, "to_id": edge.to_id}),
            ));
        }

        if statements.is_empty() {
            return Ok(());
        }
        self.run(statements).await?;
        Ok(())
    }

    /// Seed the demo non-functional-requirement graph.
    pub async fn populate_sample_data(&self) -> Result<GraphData> {
        let data = sample_graph();
        self.import_graph(&data).await?;
        info!(
            "Populated sample graph: {} nodes, {} edges",
            data.nodes.len(),
            data.edges.len()
        );
        Ok(data)
    }

    async fn require_saved_graph(&self, name: &str) -> Result<()> {
        let result = self
            .run_one(
                "MATCH (sg:SavedGraph {name: $name}) RETURN count(sg) AS found",
                json!({"name": name}),
            )
            .await?;
        if first_i64(&result) == 0 {
            return Err(VibeError::NotFound(format!(
                "saved graph '{}' not found",
                name
            )));
        }
        Ok(())
    }
}

fn cypher(statement: &str, parameters: Value) -> CypherStatement {
    CypherStatement {
        statement: statement.to_string(),
        parameters,
    }
}

/// Relationship types are interpolated into Cypher and must stay
/// identifier-shaped.
fn sanitize_rel_type(kind: &str) -> Result<String> {
    if kind.is_empty() || !kind.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(VibeError::InvalidInput(format!(
            "relationship type must be alphanumeric/underscore, got '{}'",
            kind
        )));
    }
    Ok(kind.to_string())
}

fn first_i64(result: &CypherResult) -> i64 {
    result
        .data
        .first()
        .and_then(|row| row.row.first())
        .and_then(Value::as_i64)
        .unwrap_or(0)
}

fn row_to_node(row: &CypherRow) -> Option<GraphNode> {
    Some(GraphNode {
        id: row.row.first()?.as_str()?.to_string(),
        name: row
            .row
            .get(1)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        description: row
            .row
            .get(2)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        layer: row
            .row
            .get(3)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        kind: row
            .row
            .get(4)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}

fn row_to_edge(row: &CypherRow) -> Option<GraphEdge> {
    Some(GraphEdge {
        from_id: row.row.first()?.as_str()?.to_string(),
        to_id: row.row.get(1)?.as_str()?.to_string(),
        kind: row
            .row
            .get(2)
            .and_then(Value::as_str)
            .unwrap_or("LINKED_TO")
            .to_string(),
    })
}

fn sample_graph() -> GraphData {
    let node = |id: &str, name: &str, description: &str, layer: &str| GraphNode {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        layer: layer.to_string(),
        kind: "quality".to_string(),
    };
    let edge = |from: &str, to: &str| GraphEdge {
        from_id: from.to_string(),
        to_id: to.to_string(),
        kind: "LINKED_TO".to_string(),
    };

    GraphData {
        nodes: vec![
            node(
                "ux.usability",
                "Usability",
                "System should be intuitive and pleasant for the user.",
                "ux",
            ),
            node(
                "ux.accessibility",
                "Accessibility",
                "Interfaces meet accessibility guidelines.",
                "ux",
            ),
            node(
                "security.authentication",
                "Authentication",
                "All access is authenticated.",
                "security",
            ),
            node(
                "security.data_protection",
                "Data Protection",
                "Sensitive data is encrypted at rest and in transit.",
                "security",
            ),
            node(
                "performance.latency",
                "Latency",
                "Interactive requests respond within 200ms.",
                "performance",
            ),
            node(
                "performance.scalability",
                "Scalability",
                "The system scales horizontally under load.",
                "performance",
            ),
        ],
        edges: vec![
            edge("ux.usability", "performance.latency"),
            edge("security.authentication", "security.data_protection"),
            edge("performance.latency", "performance.scalability"),
        ],
    }
}

// Transactional HTTP API request/response types

#[derive(Debug, Serialize)]
struct CypherStatement {
    statement: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
struct CypherRequest {
    statements: Vec<CypherStatement>,
}

#[derive(Debug, Deserialize)]
struct CypherResponse {
    #[serde(default)]
    results: Vec<CypherResult>,
    #[serde(default)]
    errors: Vec<CypherError>,
}

#[derive(Debug, Deserialize)]
struct CypherResult {
    #[allow(dead_code)]
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    data: Vec<CypherRow>,
}

#[derive(Debug, Deserialize)]
struct CypherRow {
    #[serde(default)]
    row: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct CypherError {
    code: String,
    message: String,
}
