use std::{
    env, fs,
    path::{Path, PathBuf},
};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::{Result, VibeError};

const MASKED: &str = "***HIDDEN***";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5000,
        }
    }
}

/// Credentials and model selection for the hosted LLM, environment-only.
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub model: String,
}

/// Source-repository provider credentials, environment-only.
#[derive(Debug, Clone, Default)]
pub struct GitHubConfig {
    pub token: Option<SecretString>,
    pub default_repo: String,
}

/// Graph-store connection settings, environment-only.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub uri: String,
    pub username: String,
    pub password: Option<SecretString>,
    pub database: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "http://localhost:7474".into(),
            username: "neo4j".into(),
            password: None,
            database: "neo4j".into(),
        }
    }
}

/// Behavior preferences kept alongside the requirement catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorPreferences {
    #[serde(default)]
    pub auto_enhance_prompts: bool,
    #[serde(default = "BehaviorPreferences::default_true")]
    pub include_file_context: bool,
    #[serde(default = "BehaviorPreferences::default_max_file_size_kb")]
    pub max_file_size_kb: u64,
    #[serde(default = "BehaviorPreferences::default_editor_theme")]
    pub editor_theme: String,
}

impl BehaviorPreferences {
    fn default_true() -> bool {
        true
    }

    fn default_max_file_size_kb() -> u64 {
        1000
    }

    fn default_editor_theme() -> String {
        "light".to_string()
    }
}

impl Default for BehaviorPreferences {
    fn default() -> Self {
        Self {
            auto_enhance_prompts: false,
            include_file_context: true,
            max_file_size_kb: Self::default_max_file_size_kb(),
            editor_theme: Self::default_editor_theme(),
        }
    }
}

/// File-backed preference store: the non-functional-requirement catalog plus
/// behavior preferences. Persisted as JSON, updated by whole-file rewrite
/// (last writer wins).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default = "Preferences::default_requirements")]
    pub non_functional_requirements: serde_json::Map<String, Value>,
    #[serde(default)]
    pub preferences: BehaviorPreferences,
}

impl Preferences {
    fn default_requirements() -> serde_json::Map<String, Value> {
        let value = json!({
            "development": [
                "Implement proper error handling with user feedback",
                "Follow REST API conventions for endpoints and HTTP status codes",
                "Include unit tests with at least 80% code coverage",
                "Implement proper input validation and sanitization",
                "Follow security best practices (authentication, authorization, data protection)",
                "Implement logging for debugging and monitoring purposes"
            ],
            "refactoring": [
                "Maintain existing functionality while improving code structure",
                "Eliminate code duplication through proper abstraction",
                "Extract complex logic into separate, testable functions",
                "Update and maintain comprehensive test coverage",
                "Consider backward compatibility when making changes"
            ],
            "testing": [
                "Write comprehensive unit tests covering all functions and methods",
                "Include integration tests for API endpoints and external interactions",
                "Test edge cases, boundary conditions, and error scenarios",
                "Implement mocking for external dependencies and services",
                "Ensure tests are independent and can run in any order"
            ]
        });
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    pub fn requirements_for(&self, task_type: &str) -> Vec<String> {
        self.non_functional_requirements
            .get(task_type)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Read the preference file, creating it with defaults when missing.
    pub fn load_or_create(path: &Path) -> Result<Preferences> {
        if !path.exists() {
            let defaults = Preferences::default();
            defaults.save(path)?;
            info!("Created default preference file: {}", path.display());
            return Ok(defaults);
        }

        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| VibeError::Config(format!("preference file is corrupted: {}", e)))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(path, raw)?;
        Ok(())
    }
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            non_functional_requirements: Self::default_requirements(),
            preferences: BehaviorPreferences::default(),
        }
    }
}

/// Validation report for the merged configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Merged configuration view: an immutable environment snapshot layered over
/// the mutable file-backed preference store. Assembled once at process start
/// and handed to components by constructor injection.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub github: GitHubConfig,
    pub graph: GraphConfig,
    pub preferences: Preferences,
    pub preferences_path: PathBuf,
    pub logs_dir: PathBuf,
    pub prompt_catalog_path: PathBuf,
}

impl Settings {
    /// Snapshot the environment and load (or create) the preference file.
    pub fn load() -> Result<Settings> {
        let preferences_path = PathBuf::from(
            env::var("VIBE_CONFIG_PATH").unwrap_or_else(|_| "config/user_config.json".into()),
        );
        let logs_dir = PathBuf::from(env::var("VIBE_LOGS_DIR").unwrap_or_else(|_| "logs".into()));
        let prompt_catalog_path = PathBuf::from(
            env::var("VIBE_PROMPT_CATALOG").unwrap_or_else(|_| "config/prompt_config.json".into()),
        );

        let preferences = Preferences::load_or_create(&preferences_path)?;

        Ok(Settings {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
                port: env::var("PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(5000),
            },
            llm: LlmConfig {
                api_key: env_secret("ANTHROPIC_API_KEY"),
                model: env::var("ANTHROPIC_MODEL_ID")
                    .unwrap_or_else(|_| "claude-3-5-sonnet-20241022".into()),
            },
            github: GitHubConfig {
                token: env_secret("GITHUB_TOKEN"),
                default_repo: env::var("GITHUB_DEFAULT_REPO").unwrap_or_default(),
            },
            graph: GraphConfig {
                uri: env::var("NEO4J_HTTP_URI").unwrap_or_else(|_| "http://localhost:7474".into()),
                username: env::var("NEO4J_USERNAME").unwrap_or_else(|_| "neo4j".into()),
                password: env_secret("NEO4J_PASSWORD"),
                database: env::var("NEO4J_DATABASE").unwrap_or_else(|_| "neo4j".into()),
            },
            preferences,
            preferences_path,
            logs_dir,
            prompt_catalog_path,
        })
    }

    /// Apply a preference patch: deep-merge into the file store, rewrite the
    /// file, and return the refreshed preferences. Secrets are env-only and
    /// cannot be updated through this path.
    pub fn update_preferences(&mut self, patch: &Value) -> Result<Preferences> {
        let mut current = serde_json::to_value(&self.preferences)?;
        deep_merge(&mut current, patch);
        let merged: Preferences = serde_json::from_value(current)
            .map_err(|e| VibeError::Config(format!("invalid preference update: {}", e)))?;
        merged.save(&self.preferences_path)?;
        self.preferences = merged.clone();
        info!("Configuration updated successfully");
        Ok(merged)
    }

    /// Replace the requirement list for one task type and persist.
    pub fn update_requirements(
        &mut self,
        task_type: &str,
        requirements: Vec<String>,
    ) -> Result<serde_json::Map<String, Value>> {
        self.preferences
            .non_functional_requirements
            .insert(task_type.to_string(), json!(requirements));
        self.preferences.save(&self.preferences_path)?;
        info!("Requirements updated for task type: {}", task_type);
        Ok(self.preferences.non_functional_requirements.clone())
    }

    /// Merged settings view with secret material masked, suitable for
    /// returning to callers or exporting.
    pub fn masked_view(&self) -> Value {
        json!({
            "non_functional_requirements": self.preferences.non_functional_requirements,
            "preferences": self.preferences.preferences,
            "llm": {
                "model": self.llm.model,
                "api_key": mask(&self.llm.api_key),
            },
            "github": {
                "token": mask(&self.github.token),
                "default_repo": self.github.default_repo,
            },
            "graph": {
                "uri": self.graph.uri,
                "username": self.graph.username,
                "password": mask(&self.graph.password),
                "database": self.graph.database,
            },
        })
    }

    pub fn validate(&self) -> ConfigValidation {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if self.llm.api_key.is_none() {
            errors.push("LLM credentials not configured (ANTHROPIC_API_KEY)".to_string());
        }
        if self.github.token.is_none() {
            warnings.push("GitHub token not configured".to_string());
        }
        for task_type in ["development", "refactoring", "testing"] {
            if self.preferences.requirements_for(task_type).is_empty() {
                warnings.push(format!("No requirements defined for {}", task_type));
            }
        }

        ConfigValidation {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

fn env_secret(key: &str) -> Option<SecretString> {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from)
}

fn mask(secret: &Option<SecretString>) -> Value {
    match secret {
        Some(s) if !s.expose_secret().is_empty() => json!(MASKED),
        _ => json!(""),
    }
}

/// Recursively merge `patch` into `base`; objects merge key-wise, everything
/// else is replaced.
pub fn deep_merge(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                match base_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base_slot, patch_value) => {
            *base_slot = patch_value.clone();
        }
    }
}

/// Warn-level startup summary of which credentials are present, mirroring
/// the secrets themselves only by presence.
pub fn log_environment_status(settings: &Settings) {
    info!("Environment status:");
    for (name, present) in [
        ("ANTHROPIC_API_KEY", settings.llm.api_key.is_some()),
        ("GITHUB_TOKEN", settings.github.token.is_some()),
        ("NEO4J_PASSWORD", settings.graph.password.is_some()),
    ] {
        if present {
            info!("  {}: set", name);
        } else {
            warn!("  {}: NOT SET", name);
        }
    }
}
