use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use vibe_graph::{validate_graph_payload, GraphEdge, GraphNode, GraphType};

use crate::{ApiError, ApiResult, AppState};

#[derive(Deserialize)]
pub struct EdgeRequest {
    pub from_id: Option<String>,
    pub to_id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Deserialize)]
pub struct LayerRequest {
    pub name: Option<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Deserialize)]
pub struct SaveGraphRequest {
    pub name: Option<String>,
    pub graph_type: Option<String>,
    pub graph_data: Option<Value>,
}

/// Probe the graph store before any operation; unavailable stores surface
/// as 503 rather than opaque statement failures.
async fn ensure_graph_available(state: &AppState) -> ApiResult<()> {
    if state.graph.is_connected().await {
        Ok(())
    } else {
        Err(ApiError::ServiceUnavailable(
            "Graph store not connected".to_string(),
        ))
    }
}

pub async fn get_graph(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    ensure_graph_available(&state).await?;
    let graph = state.graph.get_graph().await?;
    Ok(Json(json!({"success": true, "graph": graph})))
}

pub async fn create_node(
    State(state): State<AppState>,
    Json(node): Json<GraphNode>,
) -> ApiResult<Json<Value>> {
    if node.id.trim().is_empty() || node.name.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Node id and name are required".to_string(),
        ));
    }
    ensure_graph_available(&state).await?;

    let created = state.graph.create_node(&node).await?;
    Ok(Json(json!({"success": true, "node": created})))
}

pub async fn update_node(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
    Json(node): Json<GraphNode>,
) -> ApiResult<Json<Value>> {
    ensure_graph_available(&state).await?;
    let updated = state.graph.update_node(&node_id, &node).await?;
    Ok(Json(json!({"success": true, "node": updated})))
}

pub async fn delete_node(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
) -> ApiResult<Json<Value>> {
    ensure_graph_available(&state).await?;
    let deleted = state.graph.delete_node(&node_id).await?;
    if !deleted {
        return Err(ApiError::NotFound(format!("Node {} not found", node_id)));
    }
    Ok(Json(json!({"success": true})))
}

pub async fn create_edge(
    State(state): State<AppState>,
    Json(request): Json<EdgeRequest>,
) -> ApiResult<Json<Value>> {
    let (from_id, to_id) = match (request.from_id, request.to_id) {
        (Some(from_id), Some(to_id)) => (from_id, to_id),
        _ => {
            return Err(ApiError::BadRequest(
                "from_id and to_id are required".to_string(),
            ))
        }
    };
    ensure_graph_available(&state).await?;

    let edge = GraphEdge {
        from_id,
        to_id,
        kind: request.kind.unwrap_or_else(|| "LINKED_TO".to_string()),
    };
    let created = state.graph.create_edge(&edge).await?;
    Ok(Json(json!({"success": true, "edge": created})))
}

pub async fn delete_edge(
    State(state): State<AppState>,
    Json(request): Json<EdgeRequest>,
) -> ApiResult<Json<Value>> {
    let (from_id, to_id) = match (request.from_id, request.to_id) {
        (Some(from_id), Some(to_id)) => (from_id, to_id),
        _ => {
            return Err(ApiError::BadRequest(
                "from_id and to_id are required".to_string(),
            ))
        }
    };
    ensure_graph_available(&state).await?;

    let deleted = state
        .graph
        .delete_edge(&from_id, &to_id, request.kind.as_deref())
        .await?;
    Ok(Json(json!({"success": true, "deleted": deleted})))
}

pub async fn list_layers(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    ensure_graph_available(&state).await?;
    let layers = state.graph.list_layers().await?;
    Ok(Json(json!({"success": true, "layers": layers})))
}

pub async fn create_layer(
    State(state): State<AppState>,
    Json(request): Json<LayerRequest>,
) -> ApiResult<Json<Value>> {
    let name = request
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Layer name is required".to_string()))?;
    ensure_graph_available(&state).await?;

    state.graph.create_layer(&name, &request.description).await?;
    Ok(Json(json!({"success": true, "layer": name})))
}

pub async fn update_layer(
    State(state): State<AppState>,
    Path(layer_name): Path<String>,
    Json(request): Json<LayerRequest>,
) -> ApiResult<Json<Value>> {
    let new_name = request.name.unwrap_or_else(|| layer_name.clone());
    ensure_graph_available(&state).await?;

    state
        .graph
        .update_layer(&layer_name, &new_name, &request.description)
        .await?;
    Ok(Json(json!({"success": true, "layer": new_name})))
}

pub async fn delete_layer(
    State(state): State<AppState>,
    Path(layer_name): Path<String>,
) -> ApiResult<Json<Value>> {
    ensure_graph_available(&state).await?;
    let deleted_count = state.graph.delete_layer(&layer_name).await?;
    Ok(Json(json!({"success": true, "deleted_count": deleted_count})))
}

pub async fn save_graph(
    State(state): State<AppState>,
    Json(request): Json<SaveGraphRequest>,
) -> ApiResult<Json<Value>> {
    let name = request
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Graph name is required".to_string()))?;
    let graph_type = GraphType::parse(
        request
            .graph_type
            .as_deref()
            .unwrap_or("application_architecture"),
    )?;
    let payload = request
        .graph_data
        .ok_or_else(|| ApiError::BadRequest("graph_data is required".to_string()))?;
    let data = validate_graph_payload(&payload)?;

    ensure_graph_available(&state).await?;
    state.graph.save_graph(&name, graph_type, &data).await?;

    Ok(Json(json!({
        "success": true,
        "name": name,
        "graph_type": graph_type.as_str(),
        "nodes_count": data.nodes.len(),
        "edges_count": data.edges.len(),
    })))
}

pub async fn list_saved_graphs(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    ensure_graph_available(&state).await?;
    let graphs = state.graph.list_saved_graphs().await?;
    Ok(Json(json!({"success": true, "graphs": graphs})))
}

pub async fn get_saved_graph(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Value>> {
    ensure_graph_available(&state).await?;
    let graph = state.graph.get_saved_graph(&name).await?;
    Ok(Json(json!({"success": true, "graph": graph})))
}

pub async fn delete_saved_graph(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Value>> {
    ensure_graph_available(&state).await?;
    state.graph.delete_saved_graph(&name).await?;
    Ok(Json(json!({"success": true})))
}

pub async fn load_graph(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Value>> {
    ensure_graph_available(&state).await?;
    state.graph.load_graph(&name).await?;
    Ok(Json(json!({"success": true, "loaded": name})))
}

pub async fn export_graph(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    ensure_graph_available(&state).await?;
    let graph = state.graph.export_graph().await?;
    Ok(Json(json!({"success": true, "graph": graph})))
}

pub async fn import_graph(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> ApiResult<Json<Value>> {
    let data = validate_graph_payload(&payload)?;
    ensure_graph_available(&state).await?;

    state.graph.import_graph(&data).await?;
    Ok(Json(json!({
        "success": true,
        "nodes_count": data.nodes.len(),
        "edges_count": data.edges.len(),
    })))
}

pub async fn clear_graph(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    ensure_graph_available(&state).await?;
    state.graph.clear_all().await?;
    Ok(Json(json!({"success": true})))
}

pub async fn populate_sample_data(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    ensure_graph_available(&state).await?;
    let data = state.graph.populate_sample_data().await?;
    Ok(Json(json!({"success": true, "graph": data})))
}
