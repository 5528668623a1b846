use once_cell::sync::Lazy;
use regex::Regex;
use vibe_core::{Result, VibeError};

/// Upper bound on custom instructions, in characters.
pub const MAX_CUSTOM_INSTRUCTIONS_CHARS: usize = 2000;

static SCRIPT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").expect("valid script regex"));
static JAVASCRIPT_URI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)javascript:").expect("valid javascript-uri regex"));

/// Validate and sanitize caller-supplied custom instructions.
///
/// Rejects oversized input, strips script blocks and `javascript:` URIs,
/// and rejects input that is empty after sanitization.
pub fn validate_custom_instructions(raw: &str) -> Result<String> {
    if raw.chars().count() > MAX_CUSTOM_INSTRUCTIONS_CHARS {
        return Err(VibeError::InvalidInput(format!(
            "custom_instructions must be at most {} characters",
            MAX_CUSTOM_INSTRUCTIONS_CHARS
        )));
    }

    let without_scripts = SCRIPT_BLOCK.replace_all(raw, "");
    let sanitized = JAVASCRIPT_URI.replace_all(&without_scripts, "");
    let sanitized = sanitized.trim();

    if sanitized.is_empty() {
        return Err(VibeError::InvalidInput(
            "custom_instructions is empty after sanitization".to_string(),
        ));
    }

    Ok(sanitized.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_2000_characters_is_accepted() {
        let input = "a".repeat(2000);
        assert_eq!(validate_custom_instructions(&input).unwrap(), input);
    }

    #[test]
    fn exactly_2001_characters_is_rejected() {
        let input = "a".repeat(2001);
        assert!(validate_custom_instructions(&input).is_err());
    }

    #[test]
    fn script_blocks_are_stripped() {
        let out =
            validate_custom_instructions("keep this <script>alert(1)</script> and this").unwrap();
        assert_eq!(out, "keep this  and this");
    }

    #[test]
    fn javascript_uris_are_stripped() {
        let out = validate_custom_instructions("open javascript:alert(1) carefully").unwrap();
        assert!(!out.to_lowercase().contains("javascript:"));
    }

    #[test]
    fn input_empty_after_sanitization_is_rejected() {
        assert!(validate_custom_instructions("<script>alert(1)</script>").is_err());
        assert!(validate_custom_instructions("   ").is_err());
    }
}
