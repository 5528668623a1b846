pub mod catalog;
pub mod constructor;
pub mod sanitize;
pub mod service;
pub mod sniff;

pub use catalog::{CatalogStatus, InstructionTemplate, TemplateLoader, TemplateSource};
pub use constructor::PromptConstructor;
pub use sanitize::{validate_custom_instructions, MAX_CUSTOM_INSTRUCTIONS_CHARS};
pub use service::EnhancementService;
pub use sniff::{default_sniffer, Framing};
