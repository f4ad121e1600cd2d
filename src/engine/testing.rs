//! Fakes shared by the engine's unit tests.

use std::{sync::Mutex, time::Duration};

use async_trait::async_trait;

use crate::engine::{
    models::{Problem, TestCase},
    problems::InMemoryProblems,
    sandbox::{CaseResult, Outcome, RunSpec, Sandbox, TIME_LIMIT_MESSAGE},
};

type Script = Box<dyn Fn(&RunSpec) -> CaseResult + Send + Sync>;

/// Sandbox that answers from a script and records every invocation.
pub struct ScriptedSandbox {
    script: Script,
    delay: Duration,
    calls: Mutex<Vec<RunSpec>>,
}

impl ScriptedSandbox {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&RunSpec) -> CaseResult + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Interprets the submitted code as a tiny program:
    /// `echo` prints its input, `crash` fails, `loop` never ends, anything
    /// else prints itself.
    pub fn interpreter() -> Self {
        Self::new(|spec| match &*spec.code {
            "echo" => ok(&spec.input),
            "crash" => result(Outcome::RuntimeError, "boom"),
            "loop" => result(Outcome::TimeLimitExceeded, TIME_LIMIT_MESSAGE),
            other => ok(other),
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<RunSpec> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sandbox for ScriptedSandbox {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn execute(&self, spec: RunSpec) -> CaseResult {
        self.calls.lock().unwrap().push(spec.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.script)(&spec)
    }
}

pub fn ok(output: &str) -> CaseResult {
    result(Outcome::Accepted, output)
}

pub fn result(outcome: Outcome, output: &str) -> CaseResult {
    CaseResult {
        outcome,
        output: output.to_string(),
        duration_ms: 1,
    }
}

pub fn problem(id: &str, cases: &[(&str, &str)]) -> Problem {
    Problem {
        id: id.to_string(),
        title: id.to_string(),
        test_cases: cases
            .iter()
            .map(|(input, expected)| TestCase {
                input: input.to_string(),
                expected_output: expected.to_string(),
            })
            .collect(),
    }
}

/// `echo` passes every case of `three`; `five` expects a trailing newline.
pub fn problem_set() -> InMemoryProblems {
    InMemoryProblems::new(vec![
        problem("three", &[("1", "1"), ("2", "2"), ("3", "3")]),
        problem("five", &[("5", "5\n")]),
    ])
    .unwrap()
}
