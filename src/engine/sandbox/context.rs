use std::path::Path;

use anyhow::Context;
use tempfile::TempDir;
use uuid::Uuid;

use crate::engine::sandbox::{INPUT_FILE, LanguageSpec};

/// Scratch directory for exactly one sandbox invocation. The directory and
/// everything in it is removed when the context is dropped, whichever way
/// the invocation ends.
#[derive(Debug)]
pub struct ExecutionContext {
    dir: TempDir,
    label: String,
}

impl ExecutionContext {
    pub async fn create(
        root: Option<&Path>,
        submission_id: Uuid,
        case_index: usize,
        language: &LanguageSpec,
        code: &str,
        input: &str,
    ) -> anyhow::Result<Self> {
        let prefix = format!("judge-{}-{}-", submission_id.simple(), case_index);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let dir = match root {
            Some(root) => {
                tokio::fs::create_dir_all(root)
                    .await
                    .with_context(|| format!("failed to create work root {}", root.display()))?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .context("failed to create execution context")?;

        let label = dir
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(prefix);

        tokio::fs::write(dir.path().join(&language.source_file), code)
            .await
            .context("failed to write source file")?;
        tokio::fs::write(dir.path().join(INPUT_FILE), input)
            .await
            .context("failed to write input file")?;

        Ok(Self { dir, label })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Unique, docker-safe name for whatever runs in this context.
    pub fn label(&self) -> &str {
        &self.label
    }
}
