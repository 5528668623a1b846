use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};
use vibe_core::{ArchitectureInput, EnhancementRequest, FileRef};
use vibe_prompt::validate_custom_instructions;

use crate::{ApiError, ApiResult, AppState};

#[derive(Deserialize)]
pub struct EnhancePromptRequest {
    pub prompt: Option<String>,
    #[serde(default)]
    pub selected_files: Vec<FileRef>,
    #[serde(default)]
    pub enhancement_type: Option<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub custom_instructions: Option<String>,
    #[serde(default)]
    pub architecture_layers: Option<Value>,
    #[serde(default)]
    pub consider_architecture: bool,
}

#[derive(Deserialize)]
pub struct GenerateSpecificationRequest {
    pub enhanced_prompt: Option<String>,
    #[serde(default)]
    pub nfr_requirements: Vec<String>,
    #[serde(default)]
    pub file_context: String,
}

#[derive(Deserialize)]
pub struct AnalyzePromptRequest {
    pub prompt: Option<String>,
    #[serde(default)]
    pub architecture_layers: Option<Value>,
}

#[derive(Deserialize)]
pub struct UpdateRequirementsRequest {
    pub task_type: Option<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let settings = state.settings.read().await;
    Json(json!({
        "status": "healthy",
        "service": "vibe-assistant",
        "version": option_env!("CARGO_PKG_VERSION").unwrap_or("0.1.0"),
        "environment": {
            "llm_configured": settings.llm.api_key.is_some(),
            "github_configured": settings.github.token.is_some(),
            "github_repo_set": !settings.github.default_repo.is_empty(),
        }
    }))
}

pub async fn get_config(State(state): State<AppState>) -> Json<Value> {
    let settings = state.settings.read().await;
    Json(json!({"success": true, "config": settings.masked_view()}))
}

pub async fn update_config(
    State(state): State<AppState>,
    Json(patch): Json<Value>,
) -> ApiResult<Json<Value>> {
    let mut settings = state.settings.write().await;
    settings.update_preferences(&patch)?;
    Ok(Json(json!({"success": true, "config": settings.masked_view()})))
}

pub async fn get_requirements(State(state): State<AppState>) -> Json<Value> {
    let settings = state.settings.read().await;
    Json(json!({
        "success": true,
        "requirements": settings.preferences.non_functional_requirements,
    }))
}

pub async fn update_requirements(
    State(state): State<AppState>,
    Json(request): Json<UpdateRequirementsRequest>,
) -> ApiResult<Json<Value>> {
    let task_type = request
        .task_type
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Task type is required".to_string()))?;

    let mut settings = state.settings.write().await;
    let requirements = settings.update_requirements(task_type, request.requirements)?;
    Ok(Json(json!({"success": true, "requirements": requirements})))
}

pub async fn enhance_prompt(
    State(state): State<AppState>,
    Json(request): Json<EnhancePromptRequest>,
) -> ApiResult<Json<Value>> {
    let prompt = request
        .prompt
        .ok_or_else(|| ApiError::BadRequest("Prompt is required".to_string()))?;

    let custom_instructions = match request.custom_instructions.as_deref() {
        Some(raw) if !raw.is_empty() => Some(validate_custom_instructions(raw)?),
        _ => None,
    };
    let custom_instructions_length = custom_instructions.as_ref().map(String::len).unwrap_or(0);
    let custom_instructions_used = custom_instructions.is_some();

    info!(
        "Processing enhance-prompt request: {:.100}...",
        prompt.replace('\n', " ")
    );
    state.reqlog.log_api_request(
        "/api/enhance-prompt",
        json!({
            "prompt": prompt.clone(),
            "enhancement_type": request.enhancement_type.clone(),
            "selected_files_count": request.selected_files.len(),
        }),
        None,
        None,
    );

    // Probe connectivity before any expensive work.
    if !state.llm.test_connection().await {
        state
            .reqlog
            .log_error("llm_connection", "LLM connectivity probe failed", json!({}));
        return Err(ApiError::ServiceUnavailable(
            "AI service temporarily unavailable".to_string(),
        ));
    }

    let architecture = parse_architecture(request.architecture_layers, request.consider_architecture)?;

    let enhancement_request = EnhancementRequest {
        user_input: Some(prompt.clone()),
        requirements: request.requirements,
        file_context: request.selected_files,
        architecture,
        enhancement_type: request
            .enhancement_type
            .unwrap_or_else(|| "enhanced_prompt".to_string()),
        custom_instructions,
    };

    let result = state.enhancement.enhance(&enhancement_request).await;

    if !result.success {
        let message = result
            .error
            .unwrap_or_else(|| "enhancement failed".to_string());
        error!("Error in enhance-prompt endpoint: {}", message);
        state.reqlog.log_error(
            "enhance_prompt",
            &message,
            json!({"prompt": prompt.chars().take(100).collect::<String>()}),
        );
        return Err(ApiError::Internal(format!(
            "Failed to enhance prompt: {}",
            message
        )));
    }

    let metadata = result.metadata.as_ref();
    state.reqlog.log_api_request(
        "/api/enhance-prompt",
        json!({"prompt": result.original_input.clone()}),
        Some(json!({"success": true, "enhanced_length": result.enhanced_text.len()})),
        None,
    );

    Ok(Json(json!({
        "success": true,
        "enhanced_prompt": result.enhanced_text,
        "original_input": result.original_input,
        "enhancement_type": metadata.map(|m| m.enhancement_type.clone()),
        "metadata": {
            "requirement_count": metadata.map(|m| m.requirement_count).unwrap_or(0),
            "file_count": metadata.map(|m| m.file_count).unwrap_or(0),
            "architecture_included": metadata.map(|m| m.architecture_included).unwrap_or(false),
            "architecture_layer_count": metadata.map(|m| m.architecture_layer_count).unwrap_or(0),
            "timestamp": metadata.map(|m| m.timestamp),
            "custom_instructions_used": custom_instructions_used,
            "custom_instructions_length": custom_instructions_length,
            "model_used": state.llm.model_id(),
        }
    })))
}

pub async fn generate_specification(
    State(state): State<AppState>,
    Json(request): Json<GenerateSpecificationRequest>,
) -> ApiResult<Json<Value>> {
    let enhanced_prompt = request
        .enhanced_prompt
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Enhanced prompt is required".to_string()))?;

    let specification = state
        .enhancement
        .generate_specification(&enhanced_prompt, &request.nfr_requirements, &request.file_context)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to generate specification: {}", e)))?;

    Ok(Json(json!({
        "success": true,
        "specification": specification,
        "enhanced_prompt": enhanced_prompt,
        "nfr_requirements": request.nfr_requirements,
    })))
}

pub async fn analyze_prompt(
    State(state): State<AppState>,
    Json(request): Json<AnalyzePromptRequest>,
) -> ApiResult<Json<Value>> {
    let prompt = request
        .prompt
        .ok_or_else(|| ApiError::BadRequest("Prompt is required".to_string()))?;

    let architecture = parse_architecture(request.architecture_layers, true)?;
    let analysis = state
        .enhancement
        .analyze_complexity(&prompt, architecture.as_ref());
    let suggestions = state.enhancement.suggest_improvements(&prompt);
    let file_references = state.enhancement.extract_file_references(&prompt);

    Ok(Json(json!({
        "success": true,
        "analysis": analysis,
        "suggestions": suggestions,
        "file_references": file_references,
    })))
}

pub async fn prompt_catalog_status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({"success": true, "status": state.loader.status()}))
}

pub async fn reload_prompt_catalog(State(state): State<AppState>) -> Json<Value> {
    let loaded = state.loader.reload();
    Json(json!({"success": true, "config_loaded": loaded}))
}

pub async fn log_frontend_error(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> ApiResult<Json<Value>> {
    if payload.is_null() {
        return Err(ApiError::BadRequest("No data provided".to_string()));
    }

    let message = payload
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("Unknown frontend error")
        .to_string();

    state.reqlog.log_error(
        "frontend_error",
        &message,
        json!({
            "frontend_data": payload,
            "timestamp": payload.get("timestamp"),
            "url": payload.get("url"),
            "user_agent": payload.get("userAgent"),
        }),
    );

    Ok(Json(json!({"success": true, "message": "Error logged successfully"})))
}

/// Parse the caller-supplied architecture layers; `consider_architecture`
/// gates whether they are used at all.
fn parse_architecture(
    layers: Option<Value>,
    consider_architecture: bool,
) -> ApiResult<Option<ArchitectureInput>> {
    if !consider_architecture {
        return Ok(None);
    }
    match layers {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value::<ArchitectureInput>(value)
            .map(Some)
            .map_err(|_| {
                ApiError::BadRequest(
                    "architecture_layers must be a list of layers or a {layers: [...]} object"
                        .to_string(),
                )
            }),
    }
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound("Endpoint not found".to_string())
}
