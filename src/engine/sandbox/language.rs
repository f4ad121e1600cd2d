use std::{collections::HashMap, path::Path};

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

/// How one language is materialized and started inside a sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageSpec {
    /// File name the source is written to inside the execution context.
    pub source_file: String,
    /// Container image used by the docker backend.
    pub image: String,
    /// argv, resolved relative to the execution context directory.
    pub command: Vec<String>,
}

impl LanguageSpec {
    fn validate(&self, name: &str) -> anyhow::Result<()> {
        if self.command.is_empty() || self.command[0].trim().is_empty() {
            bail!("language {name}: command must not be empty");
        }
        let file = self.source_file.as_str();
        if file.is_empty()
            || file == "."
            || file == ".."
            || file == super::INPUT_FILE
            || file.contains('/')
            || file.contains('\\')
        {
            bail!("language {name}: invalid source file name {file:?}");
        }
        Ok(())
    }
}

/// Language tag -> execution environment. Tags are case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct LanguageRegistry {
    languages: HashMap<String, LanguageSpec>,
}

impl LanguageRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        Self::empty()
            .with(
                "javascript",
                LanguageSpec {
                    source_file: "code.js".to_string(),
                    image: "node:22-alpine".to_string(),
                    command: vec!["node".to_string(), "code.js".to_string()],
                },
            )
            .with(
                "python",
                LanguageSpec {
                    source_file: "code.py".to_string(),
                    image: "python:3.12-alpine".to_string(),
                    command: vec!["python3".to_string(), "-B".to_string(), "code.py".to_string()],
                },
            )
    }

    pub fn with(mut self, name: &str, spec: LanguageSpec) -> Self {
        self.languages.insert(name.to_ascii_lowercase(), spec);
        self
    }

    /// Built-in languages overlaid with a JSON object of `name -> spec`.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read language config {}", path.display()))?;
        let extra: HashMap<String, LanguageSpec> = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse language config {}", path.display()))?;
        let mut registry = Self::builtin();
        for (name, spec) in extra {
            spec.validate(&name)?;
            registry = registry.with(&name, spec);
        }
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<&LanguageSpec> {
        self.languages.get(&name.to_ascii_lowercase())
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.languages.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
