use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;
use vibe_core::{
    ArchitectureLayer, ConstructedPrompt, EnhancementRequest, EnhancementType, FileRef,
    PromptMetadata, Result, VibeError,
};

use crate::catalog::TemplateLoader;
use crate::sniff::{default_sniffer, Framing};

const ARCHITECTURE_AWARENESS: &str =
    "An application architecture was provided; keep the output consistent with its layers and components.";

/// Deterministic prompt assembly: no network, no persistence, logging only.
pub struct PromptConstructor {
    loader: Arc<TemplateLoader>,
    sniffer: Box<dyn Fn(&str) -> Vec<Framing> + Send + Sync>,
}

impl PromptConstructor {
    pub fn new(loader: Arc<TemplateLoader>) -> Self {
        Self {
            loader,
            sniffer: Box::new(default_sniffer),
        }
    }

    /// Swap the keyword-sniffing strategy without touching the rest of the
    /// constructor.
    pub fn with_sniffer(
        mut self,
        sniffer: impl Fn(&str) -> Vec<Framing> + Send + Sync + 'static,
    ) -> Self {
        self.sniffer = Box::new(sniffer);
        self
    }

    /// Assemble the system and user prompts for one enhancement request.
    ///
    /// The only rejected input is a missing (`None`) user input; anything
    /// else degrades gracefully section by section.
    pub fn construct(&self, request: &EnhancementRequest) -> Result<ConstructedPrompt> {
        let user_input = request
            .user_input
            .as_deref()
            .ok_or_else(|| VibeError::InvalidInput("user input is required".to_string()))?;

        let custom_instructions = request
            .custom_instructions
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        // Custom instructions override the template-driven path entirely.
        let resolved = if custom_instructions.is_some() {
            EnhancementType::Custom
        } else {
            EnhancementType::resolve(&request.enhancement_type)
        };

        let architecture_included = request.architecture.is_some();
        let layers: Vec<ArchitectureLayer> = request
            .architecture
            .as_ref()
            .map(|a| a.parsed_layers())
            .unwrap_or_default();

        let timestamp = Utc::now();
        let system_prompt = self.build_system_prompt(resolved, user_input, architecture_included);
        let main_prompt = self.build_main_prompt(
            user_input,
            &request.requirements,
            architecture_included,
            &layers,
            &request.file_context,
            resolved,
            timestamp,
        );

        let instructions = match custom_instructions {
            Some(custom) => format_custom_instructions(custom),
            None => self.loader.format_instructions(resolved),
        };

        let user_prompt = format!("{}\n\n{}", main_prompt, instructions);

        debug!(
            enhancement_type = %resolved,
            requirement_count = request.requirements.len(),
            file_count = request.file_context.len(),
            "Constructed enhancement prompt"
        );

        Ok(ConstructedPrompt {
            system_prompt,
            user_prompt,
            metadata: PromptMetadata {
                requirement_count: request.requirements.len(),
                file_count: request.file_context.len(),
                architecture_included,
                architecture_layer_count: layers.len(),
                enhancement_type: resolved.as_str().to_string(),
                timestamp,
            },
        })
    }

    fn build_system_prompt(
        &self,
        resolved: EnhancementType,
        user_input: &str,
        architecture_included: bool,
    ) -> String {
        let base = self.loader.system_prompt(resolved);

        let mut context: Vec<&str> = (self.sniffer)(user_input)
            .iter()
            .map(Framing::guidance)
            .collect();
        if architecture_included {
            context.push(ARCHITECTURE_AWARENESS);
        }

        if context.is_empty() {
            return base;
        }

        let bullets: Vec<String> = context.iter().map(|line| format!("- {}", line)).collect();
        format!("{}\n\nAdditional Context:\n{}", base, bullets.join("\n"))
    }

    #[allow(clippy::too_many_arguments)]
    fn build_main_prompt(
        &self,
        user_input: &str,
        requirements: &[String],
        architecture_included: bool,
        layers: &[ArchitectureLayer],
        file_context: &[FileRef],
        resolved: EnhancementType,
        timestamp: DateTime<Utc>,
    ) -> String {
        let mut sections: Vec<String> = Vec::new();

        sections.push("# VIBE ASSISTANT - ENHANCED SPECIFICATION REQUEST".to_string());
        sections.push(format!("**Enhancement Type:** {}", resolved));
        sections.push(format!(
            "**Timestamp:** {}",
            timestamp.format("%Y-%m-%d %H:%M:%S")
        ));
        sections.push(String::new());

        sections.push("## ORIGINAL USER REQUEST".to_string());
        sections.push(format!("```\n{}\n```", user_input));
        sections.push(String::new());

        if !requirements.is_empty() {
            sections.push("## NON-FUNCTIONAL REQUIREMENTS".to_string());
            sections.push(
                "The following non-functional requirements must be incorporated:".to_string(),
            );
            for (i, req) in requirements.iter().enumerate() {
                sections.push(format!("{}. {}", i + 1, req));
            }
            sections.push(String::new());
        }

        if architecture_included {
            self.push_architecture_section(&mut sections, layers);
        }

        if !file_context.is_empty() {
            self.push_file_section(&mut sections, file_context);
        }

        // Trim the trailing blank separator so the instructions join cleanly.
        while sections.last().is_some_and(String::is_empty) {
            sections.pop();
        }

        sections.join("\n")
    }

    fn push_architecture_section(&self, sections: &mut Vec<String>, layers: &[ArchitectureLayer]) {
        let max_components = self.loader.max_components_per_layer();

        sections.push("## APPLICATION ARCHITECTURE CONTEXT".to_string());
        sections.push(format!(
            "The application follows a layered architecture ({} layers):",
            layers.len()
        ));

        for layer in layers {
            sections.push(format!(
                "### {} ({} components)",
                layer.name, layer.node_count
            ));
            for component in layer.nodes.iter().take(max_components) {
                let kind = component.kind.as_deref().unwrap_or("component");
                sections.push(format!("- **{}** ({})", component.name, kind));
            }
            if layer.nodes.len() > max_components {
                sections.push(format!(
                    "- ... and {} more components",
                    layer.nodes.len() - max_components
                ));
            }
        }

        sections.push(String::new());
        sections.push("Architectural considerations:".to_string());
        for guideline in self.loader.architecture_guidelines() {
            sections.push(format!("- {}", guideline));
        }
        sections.push(String::new());
    }

    fn push_file_section(&self, sections: &mut Vec<String>, file_context: &[FileRef]) {
        let max_files = self.loader.max_file_display();

        sections.push("## CODEBASE CONTEXT".to_string());
        sections.push(format!(
            "Selected files for context ({} files):",
            file_context.len()
        ));
        for file in file_context.iter().take(max_files) {
            sections.push(format!("- **{}** ({})", file.display_name(), file.kind));
        }
        if file_context.len() > max_files {
            sections.push(format!(
                "- ... and {} more files",
                file_context.len() - max_files
            ));
        }
        sections.push(String::new());
    }
}

fn format_custom_instructions(custom: &str) -> String {
    format!(
        "## ENHANCEMENT INSTRUCTIONS\n\nFollow these custom instructions exactly:\n\n{}\n\nApply them to the original user request above; do not add template-driven guidance.",
        custom
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::Path;
    use vibe_core::ArchitectureInput;

    fn constructor() -> PromptConstructor {
        let loader = Arc::new(TemplateLoader::new(Path::new("missing/prompt_config.json")));
        PromptConstructor::new(loader)
    }

    fn minimal_request(input: &str) -> EnhancementRequest {
        EnhancementRequest {
            user_input: Some(input.to_string()),
            enhancement_type: "enhanced_prompt".to_string(),
            ..EnhancementRequest::default()
        }
    }

    fn strip_timestamp(prompt: &str) -> String {
        prompt
            .lines()
            .filter(|line| !line.starts_with("**Timestamp:**"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn missing_user_input_is_rejected() {
        let request = EnhancementRequest::default();
        assert!(constructor().construct(&request).is_err());
    }

    #[test]
    fn empty_user_input_is_tolerated() {
        let request = minimal_request("");
        assert!(constructor().construct(&request).is_ok());
    }

    #[test]
    fn minimal_prompt_has_one_fenced_request_and_no_optional_sections() {
        let request = minimal_request("Summarize the login flow");
        let prompt = constructor().construct(&request).unwrap();

        let fenced = format!("```\n{}\n```", "Summarize the login flow");
        assert_eq!(prompt.user_prompt.matches(&fenced).count(), 1);
        assert!(!prompt.user_prompt.contains("NON-FUNCTIONAL REQUIREMENTS"));
        assert!(!prompt.user_prompt.contains("APPLICATION ARCHITECTURE CONTEXT"));
        assert!(!prompt.user_prompt.contains("CODEBASE CONTEXT"));
    }

    #[test]
    fn file_overflow_is_summarized_and_count_stays_truthful() {
        let mut request = minimal_request("build the dashboard");
        request.file_context = (0..14)
            .map(|i| FileRef {
                name: Some(format!("file_{}.ts", i)),
                path: None,
                kind: "file".to_string(),
            })
            .collect();

        let prompt = constructor().construct(&request).unwrap();
        assert!(prompt.user_prompt.contains("... and 4 more files"));
        assert!(prompt.user_prompt.contains("(14 files)"));
        assert_eq!(prompt.metadata.file_count, 14);
    }

    #[test]
    fn requirements_are_numbered_in_order() {
        let mut request = minimal_request("add checkout");
        request.requirements = vec!["Use TypeScript".to_string(), "Add tests".to_string()];

        let prompt = constructor().construct(&request).unwrap();
        assert!(prompt.user_prompt.contains("1. Use TypeScript"));
        assert!(prompt.user_prompt.contains("2. Add tests"));
        assert_eq!(prompt.metadata.requirement_count, 2);
    }

    #[test]
    fn wrapped_and_bare_architecture_render_identically() {
        let layer = json!({
            "name": "Backend",
            "node_count": 2,
            "nodes": [{"name": "API", "type": "service"}, {"name": "Worker"}]
        });

        let mut bare = minimal_request("extend the API");
        bare.architecture =
            Some(serde_json::from_value::<ArchitectureInput>(json!([layer.clone()])).unwrap());
        let mut wrapped = minimal_request("extend the API");
        wrapped.architecture =
            Some(serde_json::from_value::<ArchitectureInput>(json!({"layers": [layer]})).unwrap());

        let c = constructor();
        let a = c.construct(&bare).unwrap();
        let b = c.construct(&wrapped).unwrap();
        assert_eq!(strip_timestamp(&a.user_prompt), strip_timestamp(&b.user_prompt));
        assert!(a.user_prompt.contains("### Backend (2 components)"));
        assert!(a.user_prompt.contains("Architectural considerations:"));
    }

    #[test]
    fn layer_component_overflow_is_summarized() {
        let nodes: Vec<_> = (0..13).map(|i| json!({"name": format!("svc{}", i)})).collect();
        let mut request = minimal_request("extend the API");
        request.architecture = Some(
            serde_json::from_value::<ArchitectureInput>(
                json!([{ "name": "Services", "node_count": 13, "nodes": nodes }]),
            )
            .unwrap(),
        );

        let prompt = constructor().construct(&request).unwrap();
        assert!(prompt.user_prompt.contains("... and 3 more components"));
        assert_eq!(prompt.metadata.architecture_layer_count, 1);
    }

    #[test]
    fn custom_instructions_replace_templated_instructions() {
        let mut request = minimal_request("build a parser");
        request.custom_instructions = Some("Answer in exactly three bullet points.".to_string());

        let prompt = constructor().construct(&request).unwrap();
        assert!(prompt
            .user_prompt
            .contains("Follow these custom instructions exactly:"));
        assert!(prompt
            .user_prompt
            .contains("Answer in exactly three bullet points."));
        assert!(!prompt.user_prompt.contains("Structured Implementation Plan"));
        assert_eq!(prompt.metadata.enhancement_type, "custom");
    }

    #[test]
    fn system_prompt_gains_framing_and_architecture_context() {
        let mut request = minimal_request("implement and test the importer");
        request.architecture = Some(
            serde_json::from_value::<ArchitectureInput>(json!([{ "name": "Core" }])).unwrap(),
        );

        let prompt = constructor().construct(&request).unwrap();
        assert!(prompt.system_prompt.contains("Additional Context:"));
        assert!(prompt.system_prompt.contains("feature development"));
        assert!(prompt.system_prompt.contains("testing or debugging"));
        assert!(prompt.system_prompt.contains("application architecture was provided"));
    }

    #[test]
    fn construction_is_deterministic_apart_from_timestamp() {
        let mut request = minimal_request("refactor the cache layer");
        request.requirements = vec!["Keep the public API stable".to_string()];
        request.file_context = vec![FileRef {
            name: Some("cache.rs".to_string()),
            path: None,
            kind: "file".to_string(),
        }];

        let c = constructor();
        let a = c.construct(&request).unwrap();
        let b = c.construct(&request).unwrap();
        assert_eq!(strip_timestamp(&a.user_prompt), strip_timestamp(&b.user_prompt));
        assert_eq!(a.system_prompt, b.system_prompt);
    }

    #[test]
    fn sniffer_strategy_is_replaceable() {
        let loader = Arc::new(TemplateLoader::new(Path::new("missing/prompt_config.json")));
        let constructor =
            PromptConstructor::new(loader).with_sniffer(|_| vec![Framing::Refactoring]);

        let prompt = constructor
            .construct(&minimal_request("anything at all"))
            .unwrap();
        assert!(prompt.system_prompt.contains("improve existing code"));
    }
}
