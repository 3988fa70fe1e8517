//! Prompt templates
//!
//! Each prompt has a fixed key, a set of declared `{{placeholder}}` names and
//! a built-in default. A prompts directory may override any template with a
//! `<key>.txt` file.

use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

/// Coarse sentence selection prompt key
pub const COARSE_PROMPT: &str = "annotation_coarse_user";

/// Boundary refinement prompt key
pub const BOUNDARY_PROMPT: &str = "annotation_boundary_user";

/// Prompt errors
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Unknown prompt key: {0}")]
    UnknownPrompt(String),

    #[error("Missing placeholder '{placeholder}' for prompt '{key}'")]
    MissingPlaceholder { key: String, placeholder: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PromptPlaceholder {
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    pub key: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub placeholders: &'static [PromptPlaceholder],
    default: &'static str,
}

impl PromptTemplate {
    pub fn filename(&self) -> String {
        format!("{}.txt", self.key)
    }
}

pub static PROMPT_TEMPLATES: &[PromptTemplate] = &[
    PromptTemplate {
        key: COARSE_PROMPT,
        title: "Annotation Coarse Match Prompt",
        description: "Selects candidate sentence IDs for each rule.",
        placeholders: &[
            PromptPlaceholder {
                name: "rule_descriptions",
                description: "List of rule IDs and text.",
            },
            PromptPlaceholder {
                name: "sentence_block",
                description: "Sentence IDs and sentence text.",
            },
        ],
        default: include_str!("defaults/annotation_coarse_user.txt"),
    },
    PromptTemplate {
        key: BOUNDARY_PROMPT,
        title: "Annotation Boundary Prompt",
        description: "Refines a candidate token range to exact boundaries.",
        placeholders: &[
            PromptPlaceholder {
                name: "rule_id",
                description: "ID of the active rule.",
            },
            PromptPlaceholder {
                name: "rule_terms",
                description: "Rule text/terms.",
            },
            PromptPlaceholder {
                name: "plain_text",
                description: "Candidate plain text for the range.",
            },
            PromptPlaceholder {
                name: "token_lines",
                description: "Indexed token lines for the range.",
            },
        ],
        default: include_str!("defaults/annotation_boundary_user.txt"),
    },
];

fn template(key: &str) -> Result<&'static PromptTemplate, PromptError> {
    PROMPT_TEMPLATES
        .iter()
        .find(|s| s.key == key)
        .ok_or_else(|| PromptError::UnknownPrompt(key.to_string()))
}

/// Listing entry for a prompt
#[derive(Debug, Clone, Serialize)]
pub struct PromptInfo {
    pub key: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub placeholders: Vec<PromptPlaceholder>,
    pub content: String,
}

/// Loaded prompt templates
#[derive(Debug, Clone)]
pub struct PromptStore {
    templates: HashMap<&'static str, String>,
}

impl Default for PromptStore {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PromptStore {
    /// Built-in templates only
    pub fn builtin() -> Self {
        Self {
            templates: PROMPT_TEMPLATES
                .iter()
                .map(|s| (s.key, s.default.to_string()))
                .collect(),
        }
    }

    /// Built-in templates with overrides from `dir`, if given
    pub fn load(dir: Option<&Path>) -> Result<Self, PromptError> {
        let mut store = Self::builtin();
        let Some(dir) = dir else {
            return Ok(store);
        };

        for prompt in PROMPT_TEMPLATES {
            let path = dir.join(prompt.filename());
            if path.is_file() {
                let content = std::fs::read_to_string(&path)?;
                tracing::info!(prompt = prompt.key, path = %path.display(), "Loaded prompt override");
                store.templates.insert(prompt.key, content);
            }
        }

        Ok(store)
    }

    /// Write built-in templates for every prompt missing from `dir`
    pub fn write_defaults(dir: &Path) -> Result<usize, PromptError> {
        std::fs::create_dir_all(dir)?;
        let mut written = 0;
        for prompt in PROMPT_TEMPLATES {
            let path = dir.join(prompt.filename());
            if !path.exists() {
                std::fs::write(&path, prompt.default)?;
                written += 1;
            }
        }
        Ok(written)
    }

    pub fn get(&self, key: &str) -> Result<&str, PromptError> {
        let prompt = template(key)?;
        Ok(self
            .templates
            .get(prompt.key)
            .map(String::as_str)
            .unwrap_or(prompt.default))
    }

    /// Substitute every declared placeholder. Each must be supplied.
    ///
    /// Substitution is a single pass over the template, so `{{...}}` inside
    /// a supplied value is kept literally.
    pub fn render(&self, key: &str, values: &[(&str, &str)]) -> Result<String, PromptError> {
        let prompt = template(key)?;

        let mut resolved: HashMap<&str, &str> = HashMap::new();
        for placeholder in prompt.placeholders {
            let value = values
                .iter()
                .find(|(name, _)| *name == placeholder.name)
                .map(|(_, value)| *value)
                .ok_or_else(|| PromptError::MissingPlaceholder {
                    key: key.to_string(),
                    placeholder: placeholder.name.to_string(),
                })?;
            resolved.insert(placeholder.name, value);
        }

        let mut rest = self.get(key)?;
        let mut out = String::with_capacity(rest.len());
        while let Some(open) = rest.find("{{") {
            out.push_str(&rest[..open]);
            let after = &rest[open + 2..];
            match after.find("}}").and_then(|close| resolved.get(&after[..close]).map(|v| (close, v))) {
                Some((close, value)) => {
                    out.push_str(value);
                    rest = &after[close + 2..];
                }
                None => {
                    out.push_str("{{");
                    rest = after;
                }
            }
        }
        out.push_str(rest);

        Ok(out)
    }

    pub fn list(&self) -> Vec<PromptInfo> {
        PROMPT_TEMPLATES
            .iter()
            .map(|prompt| PromptInfo {
                key: prompt.key,
                title: prompt.title,
                description: prompt.description,
                placeholders: prompt.placeholders.to_vec(),
                content: self.get(prompt.key).unwrap_or(prompt.default).to_string(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_templates_declare_their_placeholders() {
        let store = PromptStore::builtin();
        for prompt in PROMPT_TEMPLATES {
            let template = store.get(prompt.key).unwrap();
            for p in prompt.placeholders {
                assert!(template.contains(&format!("{{{{{}}}}}", p.name)), "{} lacks {}", prompt.key, p.name);
            }
        }
    }

    #[test]
    fn test_render_substitutes_values() {
        let store = PromptStore::builtin();
        let prompt = store
            .render(
                COARSE_PROMPT,
                &[
                    ("rule_descriptions", "- ID \"R1\": tests"),
                    ("sentence_block", "S1: We validated the results experimentally."),
                ],
            )
            .unwrap();
        assert!(prompt.contains("- ID \"R1\": tests"));
        assert!(prompt.contains("S1: We validated"));
        assert!(!prompt.contains("{{"));
    }

    #[test]
    fn test_render_missing_placeholder() {
        let store = PromptStore::builtin();
        let err = store
            .render(BOUNDARY_PROMPT, &[("rule_id", "R1")])
            .unwrap_err();
        assert!(matches!(err, PromptError::MissingPlaceholder { ref placeholder, .. } if placeholder == "rule_terms"));
    }

    #[test]
    fn test_values_are_not_substituted_again() {
        let store = PromptStore::builtin();
        let prompt = store
            .render(
                COARSE_PROMPT,
                &[
                    ("rule_descriptions", "- ID \"R1\": quotes {{sentence_block}} verbatim"),
                    ("sentence_block", "S1: Only here."),
                ],
            )
            .unwrap();
        assert!(prompt.contains("quotes {{sentence_block}} verbatim"));
        assert_eq!(prompt.matches("S1: Only here.").count(), 1);
    }

    #[test]
    fn test_unknown_braces_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("annotation_coarse_user.txt"),
            "{{rule_descriptions}} {{other}} {{ {{sentence_block}}",
        )
        .unwrap();

        let store = PromptStore::load(Some(dir.path())).unwrap();
        let prompt = store
            .render(COARSE_PROMPT, &[("rule_descriptions", "R"), ("sentence_block", "S")])
            .unwrap();
        assert_eq!(prompt, "R {{other}} {{ S");
    }

    #[test]
    fn test_list_reports_current_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("annotation_boundary_user.txt"), "custom {{rule_id}}").unwrap();

        let store = PromptStore::load(Some(dir.path())).unwrap();
        let listed = store.list();

        assert_eq!(listed.len(), PROMPT_TEMPLATES.len());
        let boundary = listed.iter().find(|p| p.key == BOUNDARY_PROMPT).unwrap();
        assert_eq!(boundary.content, "custom {{rule_id}}");
        assert_eq!(
            boundary.placeholders.iter().map(|p| p.name).collect::<Vec<_>>(),
            vec!["rule_id", "rule_terms", "plain_text", "token_lines"]
        );
        let coarse = listed.iter().find(|p| p.key == COARSE_PROMPT).unwrap();
        assert!(coarse.content.contains("{{sentence_block}}"));
    }

    #[test]
    fn test_unknown_key() {
        let store = PromptStore::builtin();
        assert!(matches!(store.get("query_system"), Err(PromptError::UnknownPrompt(_))));
    }

    #[test]
    fn test_overrides_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("annotation_boundary_user.txt"),
            "{{rule_id}}|{{rule_terms}}|{{plain_text}}|{{token_lines}}",
        )
        .unwrap();

        let store = PromptStore::load(Some(dir.path())).unwrap();
        let rendered = store
            .render(
                BOUNDARY_PROMPT,
                &[
                    ("rule_id", "R1"),
                    ("rule_terms", "tests"),
                    ("plain_text", "a b"),
                    ("token_lines", "0: a\n1: b"),
                ],
            )
            .unwrap();
        assert_eq!(rendered, "R1|tests|a b|0: a\n1: b");

        // Coarse prompt keeps its default
        assert!(store.get(COARSE_PROMPT).unwrap().contains("{{sentence_block}}"));
    }

    #[test]
    fn test_write_defaults_only_fills_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("annotation_coarse_user.txt"), "custom").unwrap();

        let written = PromptStore::write_defaults(dir.path()).unwrap();
        assert_eq!(written, 1);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("annotation_coarse_user.txt")).unwrap(),
            "custom"
        );
    }
}
