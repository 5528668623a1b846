use std::collections::BTreeMap;
use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::warn;
use vibe_core::{GitHubConfig, Result, VibeError};

use crate::types::{
    ContentsEntry, FileContent, GitTreeEntry, GitTreeResponse, RepoMeta, RepositoryFiles,
    RepositoryInfo, TreeNode,
};

const GITHUB_API_BASE: &str = "https://api.github.com";

/// Thin gateway to the GitHub REST API. A token is optional; without one
/// requests run with unauthenticated rate limits.
pub struct GitHubClient {
    http: Client,
    api_base: String,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("vibe-assistant")
            .build()
            .map_err(|e| VibeError::Repository(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: GITHUB_API_BASE.to_string(),
            token: config
                .token
                .as_ref()
                .map(|t| t.expose_secret().to_string()),
        })
    }

    /// Resolve a repository identifier to an `(owner, name)` pair. Accepts
    /// `https://github.com/owner/repo(.git)` URLs and bare `owner/repo`.
    pub fn parse_repo_url(repo_url: &str) -> Result<(String, String)> {
        let path = if let Some(stripped) = repo_url.strip_prefix("https://github.com/") {
            stripped
        } else if repo_url.starts_with("http://") || repo_url.starts_with("https://") {
            return Err(VibeError::InvalidInput(format!(
                "Invalid repository URL: {}",
                repo_url
            )));
        } else {
            repo_url
        };

        let path = path.trim_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);

        let mut parts = path.split('/');
        match (parts.next(), parts.next()) {
            (Some(owner), Some(name)) if !owner.is_empty() && !name.is_empty() => {
                Ok((owner.to_string(), name.to_string()))
            }
            _ => Err(VibeError::InvalidInput(format!(
                "Invalid repository URL: {}",
                repo_url
            ))),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut request = self.http.get(url).header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| VibeError::Repository(format!("request failed: {}", e)))?;

        match response.status() {
            status if status.is_success() => response
                .json()
                .await
                .map_err(|e| VibeError::Repository(format!("invalid response: {}", e))),
            StatusCode::NOT_FOUND => Err(VibeError::NotFound(format!("not found: {}", url))),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(VibeError::Repository(format!(
                    "GitHub API error ({}): {}",
                    status, body
                )))
            }
        }
    }

    /// Fetch the full file tree of a repository, nested with directories
    /// first. `main` falls back to `master` when absent.
    pub async fn get_repository_files(
        &self,
        repo_url: &str,
        branch: Option<&str>,
    ) -> Result<RepositoryFiles> {
        let (owner, name) = Self::parse_repo_url(repo_url)?;

        let meta: RepoMeta = self
            .get_json(&format!("{}/repos/{}/{}", self.api_base, owner, name))
            .await?;
        let languages: BTreeMap<String, u64> = self
            .get_json(&format!(
                "{}/repos/{}/{}/languages",
                self.api_base, owner, name
            ))
            .await
            .unwrap_or_default();

        let mut branch = branch.unwrap_or("main").to_string();
        let tree_url = |branch: &str| {
            format!(
                "{}/repos/{}/{}/git/trees/{}?recursive=1",
                self.api_base, owner, name, branch
            )
        };

        let listing: GitTreeResponse = match self.get_json(&tree_url(&branch)).await {
            Ok(listing) => listing,
            Err(VibeError::NotFound(_)) if branch == "main" => {
                branch = "master".to_string();
                self.get_json(&tree_url(&branch)).await?
            }
            Err(e) => return Err(e),
        };

        if listing.truncated {
            warn!(
                "Tree listing for {}/{} was truncated by the API",
                owner, name
            );
        }

        Ok(RepositoryFiles {
            tree: build_tree(&listing.tree),
            repository: RepositoryInfo {
                name: meta.name,
                full_name: meta.full_name,
                description: meta.description,
                default_branch: branch,
                languages: languages.into_keys().collect(),
            },
        })
    }

    /// Fetch and decode a single file's content.
    pub async fn get_file_content(
        &self,
        repo_url: &str,
        file_path: &str,
        branch: Option<&str>,
    ) -> Result<FileContent> {
        let (owner, name) = Self::parse_repo_url(repo_url)?;

        let mut url = format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base, owner, name, file_path
        );
        if let Some(branch) = branch {
            url.push_str(&format!("?ref={}", branch));
        }

        let entry: ContentsEntry = self.get_json(&url).await?;
        if entry.kind != "file" {
            return Err(VibeError::InvalidInput(format!(
                "{} is not a file",
                file_path
            )));
        }

        let encoding = entry.encoding.unwrap_or_else(|| "none".to_string());
        let content = match (encoding.as_str(), entry.content) {
            ("base64", Some(raw)) => decode_base64_content(&raw)?,
            (_, Some(raw)) => raw,
            (_, None) => String::new(),
        };

        Ok(FileContent {
            content,
            encoding,
            size: entry.size,
            sha: entry.sha,
            path: entry.path,
            name: entry.name,
        })
    }

    /// Immediate children of one directory (non-recursive).
    pub async fn list_folder(
        &self,
        repo_url: &str,
        folder_path: &str,
        branch: Option<&str>,
    ) -> Result<Vec<TreeNode>> {
        let (owner, name) = Self::parse_repo_url(repo_url)?;

        let mut url = format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base, owner, name, folder_path
        );
        if let Some(branch) = branch {
            url.push_str(&format!("?ref={}", branch));
        }

        let entries: Vec<ContentsEntry> = self.get_json(&url).await?;
        let mut nodes: Vec<TreeNode> = entries
            .into_iter()
            .map(|entry| {
                let is_dir = entry.kind == "dir";
                TreeNode {
                    name: entry.name,
                    path: entry.path,
                    kind: if is_dir { "dir".into() } else { "file".into() },
                    size: if is_dir { None } else { Some(entry.size) },
                    sha: entry.sha,
                    children: None,
                    is_expanded: is_dir.then_some(false),
                }
            })
            .collect();
        sort_siblings(&mut nodes);
        Ok(nodes)
    }
}

fn decode_base64_content(raw: &str) -> Result<String> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| VibeError::Repository(format!("invalid base64 content: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| VibeError::Repository(format!("file content is not UTF-8: {}", e)))
}

/// Assemble a nested tree from the flat recursive listing, directories
/// first and alphabetical at every level.
fn build_tree(entries: &[GitTreeEntry]) -> Vec<TreeNode> {
    build_subtree(entries, "")
}

fn build_subtree(entries: &[GitTreeEntry], prefix: &str) -> Vec<TreeNode> {
    let mut nodes: Vec<TreeNode> = entries
        .iter()
        .filter(|entry| {
            entry.path.strip_prefix(prefix).is_some_and(|rest| {
                !rest.is_empty() && !rest.contains('/')
            })
        })
        .map(|entry| {
            let name = entry
                .path
                .rsplit('/')
                .next()
                .unwrap_or(&entry.path)
                .to_string();
            if entry.kind == "tree" {
                let child_prefix = format!("{}/", entry.path);
                TreeNode {
                    name,
                    path: entry.path.clone(),
                    kind: "dir".to_string(),
                    size: None,
                    sha: entry.sha.clone(),
                    children: Some(build_subtree(entries, &child_prefix)),
                    is_expanded: Some(false),
                }
            } else {
                TreeNode {
                    name,
                    path: entry.path.clone(),
                    kind: "file".to_string(),
                    size: entry.size,
                    sha: entry.sha.clone(),
                    children: None,
                    is_expanded: None,
                }
            }
        })
        .collect();
    sort_siblings(&mut nodes);
    nodes
}

fn sort_siblings(nodes: &mut [TreeNode]) {
    nodes.sort_by(|a, b| {
        (a.kind != "dir")
            .cmp(&(b.kind != "dir"))
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, kind: &str) -> GitTreeEntry {
        GitTreeEntry {
            path: path.to_string(),
            kind: kind.to_string(),
            size: (kind == "blob").then_some(10),
            sha: format!("sha-{}", path),
        }
    }

    #[test]
    fn parses_url_and_shorthand_forms() {
        assert_eq!(
            GitHubClient::parse_repo_url("https://github.com/owner/repo").unwrap(),
            ("owner".to_string(), "repo".to_string())
        );
        assert_eq!(
            GitHubClient::parse_repo_url("https://github.com/owner/repo.git").unwrap(),
            ("owner".to_string(), "repo".to_string())
        );
        assert_eq!(
            GitHubClient::parse_repo_url("owner/repo").unwrap(),
            ("owner".to_string(), "repo".to_string())
        );
    }

    #[test]
    fn rejects_malformed_repository_identifiers() {
        assert!(GitHubClient::parse_repo_url("https://gitlab.com/owner/repo").is_err());
        assert!(GitHubClient::parse_repo_url("just-a-name").is_err());
        assert!(GitHubClient::parse_repo_url("").is_err());
    }

    #[test]
    fn builds_nested_tree_with_directories_first() {
        let entries = vec![
            entry("zz.txt", "blob"),
            entry("src", "tree"),
            entry("src/main.rs", "blob"),
            entry("src/lib.rs", "blob"),
            entry("README.md", "blob"),
        ];

        let tree = build_tree(&entries);
        assert_eq!(tree.len(), 3);
        assert_eq!(tree[0].name, "src");
        assert_eq!(tree[0].kind, "dir");
        assert_eq!(tree[0].is_expanded, Some(false));
        assert_eq!(tree[1].name, "README.md");
        assert_eq!(tree[2].name, "zz.txt");

        let children = tree[0].children.as_ref().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].name, "lib.rs");
        assert_eq!(children[1].name, "main.rs");
    }

    #[test]
    fn decodes_wrapped_base64_content() {
        let encoded = general_purpose::STANDARD.encode("hello world");
        let wrapped = format!("{}\n{}\n", &encoded[..8], &encoded[8..]);
        assert_eq!(decode_base64_content(&wrapped).unwrap(), "hello world");
    }
}
