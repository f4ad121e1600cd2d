use std::{collections::HashMap, path::Path, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

use crate::engine::models::Problem;

#[derive(Debug, Error)]
pub enum ProblemError {
    #[error("failed to read problem set {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse problem set {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("duplicate problem id {0}")]
    Duplicate(String),
    #[error("problem lookup failed: {0}")]
    Backend(String),
}

/// Read-only view of the problem catalogue.
#[async_trait]
pub trait ProblemSource: Send + Sync {
    async fn find(&self, problem_id: &str) -> Result<Option<Problem>, ProblemError>;
}

#[derive(Clone, Default)]
pub struct InMemoryProblems {
    problems: Arc<HashMap<String, Problem>>,
}

impl InMemoryProblems {
    pub fn new(problems: Vec<Problem>) -> Result<Self, ProblemError> {
        let mut by_id = HashMap::with_capacity(problems.len());
        for problem in problems {
            if by_id.contains_key(&problem.id) {
                return Err(ProblemError::Duplicate(problem.id));
            }
            by_id.insert(problem.id.clone(), problem);
        }
        Ok(Self {
            problems: Arc::new(by_id),
        })
    }

    /// Loads a JSON array of problems.
    pub async fn load(path: &Path) -> Result<Self, ProblemError> {
        let display = path.display().to_string();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ProblemError::Io {
                path: display.clone(),
                source,
            })?;
        let problems: Vec<Problem> =
            serde_json::from_str(&raw).map_err(|source| ProblemError::Parse {
                path: display,
                source,
            })?;
        Self::new(problems)
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }
}

#[async_trait]
impl ProblemSource for InMemoryProblems {
    async fn find(&self, problem_id: &str) -> Result<Option<Problem>, ProblemError> {
        Ok(self.problems.get(problem_id).cloned())
    }
}
