use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which instruction template and system-prompt framing to apply.
///
/// `Custom` is never selected directly by the caller; it is forced when a
/// request carries sanitized custom instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnhancementType {
    FullSpecification,
    EnhancedPrompt,
    Rephrase,
    Custom,
}

impl EnhancementType {
    /// Canonical catalog key for this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            EnhancementType::FullSpecification => "full_specification",
            EnhancementType::EnhancedPrompt => "enhanced_prompt",
            EnhancementType::Rephrase => "rephrase",
            EnhancementType::Custom => "custom",
        }
    }

    /// Map a raw caller-supplied type string to a canonical type.
    ///
    /// Legacy aliases are mapped first; anything unrecognized after mapping
    /// coerces to `EnhancedPrompt` with a logged warning. Selecting `custom`
    /// explicitly is not supported through this path.
    pub fn resolve(raw: &str) -> EnhancementType {
        let mapped = match raw {
            "maximum_detail" => "full_specification",
            "balanced" => "enhanced_prompt",
            "key_requirements" => "rephrase",
            other => other,
        };

        match mapped {
            "full_specification" => EnhancementType::FullSpecification,
            "enhanced_prompt" => EnhancementType::EnhancedPrompt,
            "rephrase" => EnhancementType::Rephrase,
            other => {
                tracing::warn!(
                    "Unknown enhancement type '{}', falling back to enhanced_prompt",
                    other
                );
                EnhancementType::EnhancedPrompt
            }
        }
    }
}

impl fmt::Display for EnhancementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for EnhancementType {
    fn default() -> Self {
        EnhancementType::EnhancedPrompt
    }
}

/// A file selected by the caller as context for prompt construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRef {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(rename = "type", default = "FileRef::default_kind")]
    pub kind: String,
}

impl FileRef {
    fn default_kind() -> String {
        "file".to_string()
    }

    /// Display name: `name`, falling back to `path`, then a placeholder.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.path.as_deref())
            .unwrap_or("Unknown")
    }
}

/// A single component inside an architecture layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentRef {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A named grouping of components, used only as prompt-construction input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchitectureLayer {
    pub name: String,
    #[serde(default)]
    pub node_count: usize,
    #[serde(default)]
    pub nodes: Vec<ComponentRef>,
}

/// Caller-supplied architecture: either a bare list of layers or a
/// `{layers: [...]}` wrapper kept for backward compatibility.
///
/// Entries are raw JSON values so a malformed layer can be skipped with a
/// warning instead of failing the whole request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArchitectureInput {
    Wrapped { layers: Vec<serde_json::Value> },
    Layers(Vec<serde_json::Value>),
}

impl ArchitectureInput {
    pub fn layer_values(&self) -> &[serde_json::Value] {
        match self {
            ArchitectureInput::Wrapped { layers } => layers,
            ArchitectureInput::Layers(layers) => layers,
        }
    }

    /// Parse the raw layer values, skipping entries that are not objects or
    /// do not deserialize into a layer.
    pub fn parsed_layers(&self) -> Vec<ArchitectureLayer> {
        self.layer_values()
            .iter()
            .filter_map(|value| {
                if !value.is_object() {
                    tracing::warn!("Skipping non-object architecture layer entry: {}", value);
                    return None;
                }
                match serde_json::from_value::<ArchitectureLayer>(value.clone()) {
                    Ok(layer) => Some(layer),
                    Err(e) => {
                        tracing::warn!("Skipping malformed architecture layer: {}", e);
                        None
                    }
                }
            })
            .collect()
    }
}

/// Inputs to a single prompt-enhancement pass.
#[derive(Debug, Clone, Default)]
pub struct EnhancementRequest {
    /// The raw user request. `None` is the only rejected shape; an empty
    /// string is tolerated.
    pub user_input: Option<String>,
    pub requirements: Vec<String>,
    pub file_context: Vec<FileRef>,
    pub architecture: Option<ArchitectureInput>,
    /// Pre-mapping enhancement type string as supplied by the caller.
    pub enhancement_type: String,
    /// Sanitized custom instructions; when present they replace the
    /// template-driven instruction path entirely.
    pub custom_instructions: Option<String>,
}

/// Metadata describing one constructed prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMetadata {
    pub requirement_count: usize,
    pub file_count: usize,
    pub architecture_included: bool,
    pub architecture_layer_count: usize,
    pub enhancement_type: String,
    pub timestamp: DateTime<Utc>,
}

/// The two prompt strings produced by the constructor, plus metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstructedPrompt {
    pub system_prompt: String,
    pub user_prompt: String,
    pub metadata: PromptMetadata,
}

/// Normalized enhancement envelope returned by the service regardless of
/// the underlying failure mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancementResult {
    pub success: bool,
    pub enhanced_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub original_input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PromptMetadata>,
}

impl EnhancementResult {
    pub fn failure(original_input: String, message: String) -> Self {
        Self {
            success: false,
            enhanced_text: format!("Enhancement failed: {}", message),
            error: Some(message),
            original_input,
            metadata: None,
        }
    }
}

/// Estimated prompt complexity bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
    Unknown,
}

/// Heuristic complexity analysis of a prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplexityReport {
    pub length: usize,
    pub word_count: usize,
    pub has_file_references: bool,
    pub estimated_complexity: Complexity,
    pub recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComplexityReport {
    /// Report returned when analysis itself failed; never raised to callers.
    pub fn unknown(error: String) -> Self {
        Self {
            length: 0,
            word_count: 0,
            has_file_references: false,
            estimated_complexity: Complexity::Unknown,
            recommendations: Vec::new(),
            error: Some(error),
        }
    }
}
