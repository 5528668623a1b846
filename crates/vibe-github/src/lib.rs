pub mod client;
pub mod types;

pub use client::GitHubClient;
pub use types::{FileContent, RepositoryFiles, RepositoryInfo, TreeNode};
