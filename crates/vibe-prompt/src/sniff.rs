/// Framing tags derived from lightweight keyword sniffing of user input.
///
/// This is a best-effort heuristic, not a classifier: multiple tags may
/// apply, ties are not broken, and the strategy is replaceable wholesale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    FeatureDevelopment,
    Refactoring,
    Testing,
}

impl Framing {
    /// Sentence contributed to the system prompt's additional-context block.
    pub fn guidance(&self) -> &'static str {
        match self {
            Framing::FeatureDevelopment => {
                "The user is asking for new functionality. Frame the work as feature development with clear scope and acceptance criteria."
            }
            Framing::Refactoring => {
                "The user wants to improve existing code. Preserve behavior while improving structure, performance, and maintainability."
            }
            Framing::Testing => {
                "The user is focused on testing or debugging. Emphasize reproducibility, coverage, and systematic diagnosis."
            }
        }
    }
}

/// Replaceable text-to-framing strategy.
pub type Sniffer = dyn Fn(&str) -> Vec<Framing> + Send + Sync;

const FEATURE_KEYWORDS: [&str; 4] = ["create", "add", "implement", "build"];
const REFACTOR_KEYWORDS: [&str; 3] = ["refactor", "optimize", "improve"];
const TESTING_KEYWORDS: [&str; 3] = ["test", "debug", "fix"];

/// Default keyword sniffer: case-insensitive substring checks, emitted in
/// fixed order (feature, refactor, testing).
pub fn default_sniffer(text: &str) -> Vec<Framing> {
    let lowered = text.to_lowercase();
    let mut tags = Vec::new();

    if FEATURE_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        tags.push(Framing::FeatureDevelopment);
    }
    if REFACTOR_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        tags.push(Framing::Refactoring);
    }
    if TESTING_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        tags.push(Framing::Testing);
    }

    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_each_category() {
        assert_eq!(
            default_sniffer("Create a login page"),
            vec![Framing::FeatureDevelopment]
        );
        assert_eq!(
            default_sniffer("REFACTOR the session handling"),
            vec![Framing::Refactoring]
        );
        assert_eq!(default_sniffer("debug the crash"), vec![Framing::Testing]);
    }

    #[test]
    fn multiple_matches_keep_fixed_order() {
        let tags = default_sniffer("implement the parser, then test and optimize it");
        assert_eq!(
            tags,
            vec![
                Framing::FeatureDevelopment,
                Framing::Refactoring,
                Framing::Testing
            ]
        );
    }

    #[test]
    fn neutral_text_yields_no_tags() {
        assert!(default_sniffer("what does this service do?").is_empty());
    }
}
