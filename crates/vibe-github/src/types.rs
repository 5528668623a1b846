use serde::{Deserialize, Serialize};

/// One entry in the nested repository tree returned to callers.
#[derive(Debug, Clone, Serialize)]
pub struct TreeNode {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub sha: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TreeNode>>,
    #[serde(rename = "isExpanded", skip_serializing_if = "Option::is_none")]
    pub is_expanded: Option<bool>,
}

/// Repository metadata attached to a tree listing.
#[derive(Debug, Clone, Serialize)]
pub struct RepositoryInfo {
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub default_branch: String,
    pub languages: Vec<String>,
}

/// A file tree plus the repository it came from.
#[derive(Debug, Clone, Serialize)]
pub struct RepositoryFiles {
    pub tree: Vec<TreeNode>,
    pub repository: RepositoryInfo,
}

/// Decoded content of a single repository file.
#[derive(Debug, Clone, Serialize)]
pub struct FileContent {
    pub content: String,
    pub encoding: String,
    pub size: u64,
    pub sha: String,
    pub path: String,
    pub name: String,
}

// GitHub REST API wire types

#[derive(Debug, Deserialize)]
pub(crate) struct RepoMeta {
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub default_branch: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GitTreeResponse {
    #[serde(default)]
    pub tree: Vec<GitTreeEntry>,
    #[serde(default)]
    pub truncated: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GitTreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub size: Option<u64>,
    pub sha: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContentsEntry {
    pub name: String,
    pub path: String,
    pub sha: String,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}
