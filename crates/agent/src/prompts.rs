//! Stage instruction sets.
//!
//! Four instruction sets ship with the binary. A prompt directory given in
//! configuration replaces all four; every file must be present there.

use finqa_core::{Error, Result};
use std::path::Path;
use tracing::debug;

const BASELINE: &str = include_str!("../prompts/baseline.md");
const PLANNER: &str = include_str!("../prompts/planner.md");
const ANALYST: &str = include_str!("../prompts/analyst.md");
const REVIEWER: &str = include_str!("../prompts/reviewer.md");

/// File names looked up in a prompt directory.
pub const PROMPT_FILES: [&str; 4] = ["baseline.md", "planner.md", "analyst.md", "reviewer.md"];

#[derive(Debug, Clone, PartialEq)]
pub struct PromptSet {
    /// Single-call generation for Baseline conditions.
    pub baseline: String,
    pub planner: String,
    /// Plan-guided generation, also used for the correction retry.
    pub analyst: String,
    pub reviewer: String,
}

impl PromptSet {
    /// The instruction sets compiled into the binary.
    pub fn builtin() -> Self {
        Self {
            baseline: BASELINE.to_string(),
            planner: PLANNER.to_string(),
            analyst: ANALYST.to_string(),
            reviewer: REVIEWER.to_string(),
        }
    }

    /// Load all four instruction sets from `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let [baseline, planner, analyst, reviewer] = PROMPT_FILES.map(|name| read_prompt(dir, name));
        Ok(Self {
            baseline: baseline?,
            planner: planner?,
            analyst: analyst?,
            reviewer: reviewer?,
        })
    }

    /// Load from `dir` when given, otherwise use the built-in set.
    pub fn resolve(dir: Option<&Path>) -> Result<Self> {
        match dir {
            Some(dir) => Self::load(dir),
            None => Ok(Self::builtin()),
        }
    }
}

impl Default for PromptSet {
    fn default() -> Self {
        Self::builtin()
    }
}

fn read_prompt(dir: &Path, name: &str) -> Result<String> {
    let path = dir.join(name);
    let content = std::fs::read_to_string(&path).map_err(|e| Error::Config {
        message: format!("Missing prompt {}: {e}", path.display()),
    })?;
    if content.trim().is_empty() {
        return Err(Error::Config {
            message: format!("Prompt {} is empty", path.display()),
        });
    }
    debug!(file = %path.display(), "Loaded prompt override");
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_prompts_are_present() {
        let prompts = PromptSet::builtin();
        for text in [&prompts.baseline, &prompts.planner, &prompts.analyst, &prompts.reviewer] {
            assert!(!text.trim().is_empty());
        }
        assert!(prompts.analyst.contains("<feedback>"));
        assert!(prompts.reviewer.contains("<proposed_expression>"));
        assert_eq!(PromptSet::default(), prompts);
    }

    #[test]
    fn load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        for name in PROMPT_FILES {
            std::fs::write(dir.path().join(name), format!("custom {name}")).unwrap();
        }

        let prompts = PromptSet::resolve(Some(dir.path())).unwrap();
        assert_eq!(prompts.baseline, "custom baseline.md");
        assert_eq!(prompts.reviewer, "custom reviewer.md");
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("baseline.md"), "only one").unwrap();

        let err = PromptSet::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("planner.md"));
    }

    #[test]
    fn empty_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        for name in PROMPT_FILES {
            std::fs::write(dir.path().join(name), "  \n").unwrap();
        }
        assert!(PromptSet::load(dir.path()).is_err());
    }

    #[test]
    fn no_directory_uses_builtin() {
        assert_eq!(PromptSet::resolve(None).unwrap(), PromptSet::builtin());
    }
}
