use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use crate::{ApiError, ApiResult, AppState};

#[derive(Deserialize)]
pub struct RepositoryFilesRequest {
    pub repo_url: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
}

#[derive(Deserialize)]
pub struct FileContentRequest {
    pub repo_url: Option<String>,
    pub file_path: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
}

#[derive(Deserialize)]
pub struct FolderRequest {
    pub repo_url: Option<String>,
    pub path: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
}

pub async fn get_repository_files(
    State(state): State<AppState>,
    Json(request): Json<RepositoryFilesRequest>,
) -> ApiResult<Json<Value>> {
    let repo_url = request
        .repo_url
        .ok_or_else(|| ApiError::BadRequest("Repository URL is required".to_string()))?;

    let files = state
        .github
        .get_repository_files(&repo_url, request.branch.as_deref())
        .await
        .map_err(|e| {
            error!("Error getting repository files: {}", e);
            ApiError::from(e)
        })?;

    Ok(Json(json!({"success": true, "files": files})))
}

pub async fn get_file_content(
    State(state): State<AppState>,
    Json(request): Json<FileContentRequest>,
) -> ApiResult<Json<Value>> {
    let (repo_url, file_path) = match (request.repo_url, request.file_path) {
        (Some(repo_url), Some(file_path)) => (repo_url, file_path),
        _ => {
            return Err(ApiError::BadRequest(
                "Repository URL and file path are required".to_string(),
            ))
        }
    };

    let content = state
        .github
        .get_file_content(&repo_url, &file_path, request.branch.as_deref())
        .await
        .map_err(|e| {
            error!("Error getting file content: {}", e);
            ApiError::from(e)
        })?;

    Ok(Json(json!({"success": true, "content": content})))
}

pub async fn list_folder(
    State(state): State<AppState>,
    Json(request): Json<FolderRequest>,
) -> ApiResult<Json<Value>> {
    let (repo_url, path) = match (request.repo_url, request.path) {
        (Some(repo_url), Some(path)) => (repo_url, path),
        _ => {
            return Err(ApiError::BadRequest(
                "Repository URL and folder path are required".to_string(),
            ))
        }
    };

    let entries = state
        .github
        .list_folder(&repo_url, &path, request.branch.as_deref())
        .await?;

    Ok(Json(json!({"success": true, "entries": entries})))
}
