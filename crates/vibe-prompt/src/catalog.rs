use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use vibe_core::EnhancementType;

/// Instruction block for one enhancement type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructionTemplate {
    pub title: String,
    /// May contain a legacy `{task_type}` placeholder.
    pub description: String,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub structure: Option<Vec<String>>,
    #[serde(default)]
    pub output_format: Option<Vec<String>>,
    #[serde(default)]
    pub important_note: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilePatterns {
    #[serde(default)]
    pub regex_patterns: Vec<String>,
}

/// One parsed prompt catalog: system prompts, instruction templates,
/// validation rules, file patterns.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogData {
    #[serde(default)]
    pub system_prompts: BTreeMap<String, String>,
    #[serde(default)]
    pub instruction_templates: BTreeMap<String, InstructionTemplate>,
    #[serde(default)]
    pub validation_rules: BTreeMap<String, i64>,
    #[serde(default)]
    pub file_patterns: FilePatterns,
    #[serde(default)]
    pub architecture_guidelines: Vec<String>,
}

/// One tier of the template resolution chain.
pub trait TemplateSource: Send + Sync {
    fn system_prompt(&self, key: &str) -> Option<String>;
    fn instructions(&self, key: &str) -> Option<InstructionTemplate>;
    fn validation_rule(&self, name: &str) -> Option<i64>;
    fn file_patterns(&self) -> Option<Vec<String>>;
    fn architecture_guidelines(&self) -> Option<Vec<String>>;
}

impl TemplateSource for CatalogData {
    fn system_prompt(&self, key: &str) -> Option<String> {
        self.system_prompts.get(key).cloned()
    }

    fn instructions(&self, key: &str) -> Option<InstructionTemplate> {
        self.instruction_templates.get(key).cloned()
    }

    fn validation_rule(&self, name: &str) -> Option<i64> {
        self.validation_rules.get(name).copied()
    }

    fn file_patterns(&self) -> Option<Vec<String>> {
        if self.file_patterns.regex_patterns.is_empty() {
            None
        } else {
            Some(self.file_patterns.regex_patterns.clone())
        }
    }

    fn architecture_guidelines(&self) -> Option<Vec<String>> {
        if self.architecture_guidelines.is_empty() {
            None
        } else {
            Some(self.architecture_guidelines.clone())
        }
    }
}

/// File tier: a JSON catalog on disk. Missing or malformed files contribute
/// nothing; loading never fails.
pub struct FileCatalog {
    path: PathBuf,
    data: RwLock<Option<CatalogData>>,
}

impl FileCatalog {
    pub fn load(path: &Path) -> Self {
        let catalog = Self {
            path: path.to_path_buf(),
            data: RwLock::new(None),
        };
        catalog.reload();
        catalog
    }

    /// Re-read the backing file wholesale. Returns whether a catalog is now
    /// loaded.
    pub fn reload(&self) -> bool {
        let parsed = match fs::read_to_string(&self.path) {
            Ok(raw) => match serde_json::from_str::<CatalogData>(&raw) {
                Ok(data) => {
                    info!("Loaded prompt catalog from {}", self.path.display());
                    Some(data)
                }
                Err(e) => {
                    warn!(
                        "Invalid JSON in prompt catalog {}: {}",
                        self.path.display(),
                        e
                    );
                    None
                }
            },
            Err(_) => {
                warn!("Prompt catalog not found: {}", self.path.display());
                None
            }
        };

        let loaded = parsed.is_some();
        *self.data.write() = parsed;
        loaded
    }

    pub fn is_loaded(&self) -> bool {
        self.data.read().is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TemplateSource for FileCatalog {
    fn system_prompt(&self, key: &str) -> Option<String> {
        self.data.read().as_ref()?.system_prompt(key)
    }

    fn instructions(&self, key: &str) -> Option<InstructionTemplate> {
        self.data.read().as_ref()?.instructions(key)
    }

    fn validation_rule(&self, name: &str) -> Option<i64> {
        self.data.read().as_ref()?.validation_rule(name)
    }

    fn file_patterns(&self) -> Option<Vec<String>> {
        self.data.read().as_ref()?.file_patterns()
    }

    fn architecture_guidelines(&self) -> Option<Vec<String>> {
        self.data.read().as_ref()?.architecture_guidelines()
    }
}

static EMBEDDED_CATALOG: Lazy<CatalogData> = Lazy::new(|| {
    match serde_json::from_str(include_str!("../assets/default_catalog.json")) {
        Ok(data) => data,
        Err(e) => {
            warn!("Embedded default catalog failed to parse: {}", e);
            CatalogData::default()
        }
    }
});

/// Embedded tier: the default catalog compiled into the binary.
pub struct EmbeddedCatalog;

impl TemplateSource for EmbeddedCatalog {
    fn system_prompt(&self, key: &str) -> Option<String> {
        EMBEDDED_CATALOG.system_prompt(key)
    }

    fn instructions(&self, key: &str) -> Option<InstructionTemplate> {
        EMBEDDED_CATALOG.instructions(key)
    }

    fn validation_rule(&self, name: &str) -> Option<i64> {
        EMBEDDED_CATALOG.validation_rule(name)
    }

    fn file_patterns(&self) -> Option<Vec<String>> {
        EMBEDDED_CATALOG.file_patterns()
    }

    fn architecture_guidelines(&self) -> Option<Vec<String>> {
        EMBEDDED_CATALOG.architecture_guidelines()
    }
}

const FALLBACK_SYSTEM_PROMPT: &str =
    "You are an expert AI coding assistant. Provide detailed, actionable specifications for coding projects.";

const FALLBACK_ARCHITECTURE_GUIDELINES: [&str; 3] = [
    "Respect the existing layer boundaries; new components belong to exactly one layer",
    "Prefer extending existing components over introducing parallel ones",
    "Route cross-layer communication through the interfaces the architecture already defines",
];

/// Last-resort instruction block when every catalog tier failed. Matches the
/// embedded default's structure exactly.
fn fallback_template() -> InstructionTemplate {
    InstructionTemplate {
        title: "Enhanced Specification".to_string(),
        description: "Enhance the request above into a clear, actionable specification."
            .to_string(),
        requirements: vec![
            "State the objective".to_string(),
            "List the concrete deliverables".to_string(),
            "Note constraints and assumptions".to_string(),
        ],
        structure: None,
        output_format: None,
        important_note: Some("Provide a detailed, actionable specification.".to_string()),
    }
}

/// Catalog status report for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogStatus {
    pub config_loaded: bool,
    pub config_path: String,
    pub config_exists: bool,
    pub system_prompt_count: usize,
    pub template_count: usize,
    pub available_system_prompts: Vec<String>,
    pub last_loaded: DateTime<Utc>,
}

/// Three-tier template resolution: file catalog, then the embedded default,
/// then hardcoded literals. Every lookup succeeds.
pub struct TemplateLoader {
    file: FileCatalog,
    embedded: EmbeddedCatalog,
}

impl TemplateLoader {
    pub fn new(catalog_path: &Path) -> Self {
        Self {
            file: FileCatalog::load(catalog_path),
            embedded: EmbeddedCatalog,
        }
    }

    fn sources(&self) -> [&dyn TemplateSource; 2] {
        [&self.file, &self.embedded]
    }

    /// Base system prompt for the given type: its own catalog entry, else
    /// the catalog default, else a hardcoded literal.
    pub fn system_prompt(&self, ty: EnhancementType) -> String {
        for source in self.sources() {
            if let Some(prompt) = source.system_prompt(ty.as_str()) {
                return prompt;
            }
        }
        for source in self.sources() {
            if let Some(prompt) = source.system_prompt("default") {
                return prompt;
            }
        }
        FALLBACK_SYSTEM_PROMPT.to_string()
    }

    fn template_for(&self, ty: EnhancementType) -> InstructionTemplate {
        for source in self.sources() {
            if let Some(template) = source.instructions(ty.as_str()) {
                return template;
            }
        }
        warn!(
            "No instruction template for '{}', using the default block",
            ty.as_str()
        );
        for source in self.sources() {
            if let Some(template) = source.instructions("default") {
                return template;
            }
        }
        fallback_template()
    }

    /// Formatted multi-section instruction block for the given type.
    pub fn format_instructions(&self, ty: EnhancementType) -> String {
        let template = self.template_for(ty);
        let description = template.description.replace("{task_type}", ty.as_str());

        let mut sections = vec![
            "## ENHANCEMENT INSTRUCTIONS".to_string(),
            String::new(),
            format!("**{}**", template.title),
            String::new(),
            description,
        ];

        if !template.requirements.is_empty() {
            sections.push(String::new());
            sections.push("Please provide:".to_string());
            for (i, req) in template.requirements.iter().enumerate() {
                sections.push(format!("{}. {}", i + 1, req));
            }
        }

        if let Some(structure) = &template.structure {
            sections.push(String::new());
            sections.push("Structure:".to_string());
            for item in structure {
                sections.push(format!("- {}", item));
            }
        }

        if let Some(output_format) = &template.output_format {
            sections.push(String::new());
            sections.push("Output format:".to_string());
            for item in output_format {
                sections.push(format!("- {}", item));
            }
        }

        if let Some(note) = &template.important_note {
            sections.push(String::new());
            sections.push(format!("**IMPORTANT:** {}", note));
        }

        sections.join("\n")
    }

    /// Numeric validation rule with a caller-supplied default.
    pub fn validation_rule(&self, name: &str, default: i64) -> i64 {
        for source in self.sources() {
            if let Some(value) = source.validation_rule(name) {
                return value;
            }
        }
        default
    }

    pub fn max_file_display(&self) -> usize {
        clamp_to_usize(self.validation_rule("max_file_display", 10), 10)
    }

    pub fn max_components_per_layer(&self) -> usize {
        clamp_to_usize(self.validation_rule("max_components_per_layer", 10), 10)
    }

    pub fn file_patterns(&self) -> Vec<String> {
        for source in self.sources() {
            if let Some(patterns) = source.file_patterns() {
                return patterns;
            }
        }
        Vec::new()
    }

    pub fn architecture_guidelines(&self) -> Vec<String> {
        for source in self.sources() {
            if let Some(guidelines) = source.architecture_guidelines() {
                return guidelines;
            }
        }
        FALLBACK_ARCHITECTURE_GUIDELINES
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Re-read the file tier. Returns whether the file catalog is loaded.
    pub fn reload(&self) -> bool {
        self.file.reload()
    }

    pub fn status(&self) -> CatalogStatus {
        let known_keys = ["default", "full_specification", "enhanced_prompt", "rephrase"];

        let available: Vec<String> = known_keys
            .iter()
            .filter(|key| self.sources().iter().any(|s| s.system_prompt(key).is_some()))
            .map(|key| key.to_string())
            .collect();
        let template_count = known_keys
            .iter()
            .filter(|key| self.sources().iter().any(|s| s.instructions(key).is_some()))
            .count();

        CatalogStatus {
            config_loaded: self.file.is_loaded(),
            config_path: self.file.path().display().to_string(),
            config_exists: self.file.path().exists(),
            system_prompt_count: available.len(),
            template_count,
            available_system_prompts: available,
            last_loaded: Utc::now(),
        }
    }
}

fn clamp_to_usize(value: i64, default: usize) -> usize {
    usize::try_from(value).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn loader_without_file() -> TemplateLoader {
        TemplateLoader::new(Path::new("does/not/exist/prompt_config.json"))
    }

    #[test]
    fn missing_file_falls_back_to_embedded_catalog() {
        let loader = loader_without_file();
        let prompt = loader.system_prompt(EnhancementType::Rephrase);
        assert!(prompt.contains("rephrase"));
        assert_eq!(loader.max_file_display(), 10);
    }

    #[test]
    fn instructions_contain_configured_title_for_all_types_and_aliases() {
        let loader = loader_without_file();

        for (raw, title) in [
            ("full_specification", "Comprehensive Business Requirements"),
            ("enhanced_prompt", "Structured Implementation Plan"),
            ("rephrase", "Concise Rephrased Request"),
            ("maximum_detail", "Comprehensive Business Requirements"),
            ("balanced", "Structured Implementation Plan"),
            ("key_requirements", "Concise Rephrased Request"),
        ] {
            let ty = EnhancementType::resolve(raw);
            let block = loader.format_instructions(ty);
            assert!(!block.is_empty());
            assert!(block.contains(title), "missing '{}' for '{}'", title, raw);
        }
    }

    #[test]
    fn absent_template_uses_default_block() {
        let loader = loader_without_file();
        let block = loader.format_instructions(EnhancementType::Custom);
        assert!(block.contains("Enhanced Specification"));
    }

    #[test]
    fn file_tier_wins_over_embedded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt_config.json");
        let mut f = std::fs::File::create(&path).unwrap();
        write!(
            f,
            r#"{{"system_prompts": {{"rephrase": "custom rephrase prompt"}},
                "validation_rules": {{"max_file_display": 3}}}}"#
        )
        .unwrap();

        let loader = TemplateLoader::new(&path);
        assert_eq!(
            loader.system_prompt(EnhancementType::Rephrase),
            "custom rephrase prompt"
        );
        assert_eq!(loader.max_file_display(), 3);
        // Keys the file tier lacks fall through to the embedded default.
        assert!(loader
            .system_prompt(EnhancementType::FullSpecification)
            .contains("business analyst"));
    }

    #[test]
    fn malformed_file_never_raises() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt_config.json");
        std::fs::write(&path, "{broken").unwrap();

        let loader = TemplateLoader::new(&path);
        assert!(!loader.status().config_loaded);
        assert!(!loader.system_prompt(EnhancementType::EnhancedPrompt).is_empty());
    }

    #[test]
    fn description_placeholder_is_substituted() {
        let loader = loader_without_file();
        let block = loader.format_instructions(EnhancementType::FullSpecification);
        assert!(block.contains("full_specification effort"));
        assert!(!block.contains("{task_type}"));
    }

    #[test]
    fn reload_picks_up_new_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt_config.json");

        let loader = TemplateLoader::new(&path);
        assert!(!loader.status().config_loaded);

        std::fs::write(
            &path,
            r#"{"system_prompts": {"default": "from disk"}}"#,
        )
        .unwrap();
        assert!(loader.reload());
        assert_eq!(loader.system_prompt(EnhancementType::Custom), "from disk");
    }
}
