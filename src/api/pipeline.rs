//! Stage and pipeline definitions, assembled once and validated up front.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::error::{InvokeError, PipelineError};
use super::invoke::{FnInvoke, Invoke};
use super::pool::VariablePool;

/// Name of the initial input variable when none is given.
pub const DEFAULT_INPUT_KEY: &str = "input";

/// A single named step: reads one variable, writes another.
#[derive(Clone)]
pub struct Stage {
    name: String,
    input_key: Option<String>,
    output_key: String,
    invoker: Arc<dyn Invoke>,
}

impl Stage {
    /// Creates a stage. `input_key = None` reads the pipeline's initial input.
    pub fn new(
        name: impl Into<String>,
        input_key: Option<&str>,
        output_key: impl Into<String>,
        invoker: Arc<dyn Invoke>,
    ) -> Self {
        Self {
            name: name.into(),
            input_key: input_key.map(str::to_string),
            output_key: output_key.into(),
            invoker,
        }
    }

    /// Creates a stage backed by a synchronous closure.
    pub fn from_fn<F>(
        name: impl Into<String>,
        input_key: Option<&str>,
        output_key: impl Into<String>,
        func: F,
    ) -> Self
    where
        F: Fn(&str) -> Result<String, InvokeError> + Send + Sync + 'static,
    {
        Self::new(name, input_key, output_key, Arc::new(FnInvoke::new(func)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_key(&self) -> Option<&str> {
        self.input_key.as_deref()
    }

    pub fn output_key(&self) -> &str {
        &self.output_key
    }

    pub(crate) fn invoker(&self) -> &dyn Invoke {
        self.invoker.as_ref()
    }

    /// Description of the collaborator behind this stage.
    pub fn describe(&self) -> String {
        self.invoker.describe()
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("input_key", &self.input_key)
            .field("output_key", &self.output_key)
            .finish_non_exhaustive()
    }
}

/// An ordered, validated chain of stages.
///
/// A `Pipeline` is immutable once built and can be shared between concurrent
/// runs; every run gets its own [`VariablePool`].
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub(crate) input_key: String,
    pub(crate) output_key: String,
    pub(crate) stages: Vec<Stage>,
}

impl Pipeline {
    /// Assembles a pipeline, checking the chain invariant before anything runs.
    pub fn new(
        input_key: impl Into<String>,
        output_key: impl Into<String>,
        stages: Vec<Stage>,
    ) -> Result<Self, PipelineError> {
        let pipeline = Self {
            input_key: input_key.into(),
            output_key: output_key.into(),
            stages,
        };
        pipeline.validate()?;
        Ok(pipeline)
    }

    /// Starts a fluent pipeline definition.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn input_key(&self) -> &str {
        &self.input_key
    }

    pub fn output_key(&self) -> &str {
        &self.output_key
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// The variable a stage reads, resolving the initial-input default.
    pub fn resolved_input<'a>(&'a self, stage: &'a Stage) -> &'a str {
        stage.input_key().unwrap_or(&self.input_key)
    }

    fn validate(&self) -> Result<(), PipelineError> {
        if self.stages.is_empty() {
            return Err(PipelineError::invalid("pipeline has no stages"));
        }
        if self.input_key.trim().is_empty() {
            return Err(PipelineError::invalid("initial input key is empty"));
        }

        let mut names = HashSet::new();
        let mut available: HashSet<&str> = HashSet::new();
        available.insert(&self.input_key);

        for (i, stage) in self.stages.iter().enumerate() {
            if stage.name.trim().is_empty() {
                return Err(PipelineError::invalid(format!(
                    "stage #{} has an empty name",
                    i + 1
                )));
            }
            if !names.insert(stage.name.as_str()) {
                return Err(PipelineError::invalid(format!(
                    "stage name '{}' is used more than once",
                    stage.name
                )));
            }
            if stage.output_key.trim().is_empty() {
                return Err(PipelineError::invalid(format!(
                    "stage '{}' has an empty output key",
                    stage.name
                )));
            }

            let input = self.resolved_input(stage);
            if !available.contains(input) {
                let later = self.stages[i + 1..]
                    .iter()
                    .find(|s| s.output_key == input);
                return Err(PipelineError::invalid(match later {
                    Some(producer) => format!(
                        "stage '{}' reads '{}' before stage '{}' produces it",
                        stage.name, input, producer.name
                    ),
                    None => format!(
                        "stage '{}' reads '{}', which is neither the initial input \
                         nor produced by an earlier stage",
                        stage.name, input
                    ),
                }));
            }

            if !available.insert(&stage.output_key) {
                let what = if stage.output_key == self.input_key {
                    "the initial input"
                } else {
                    "an earlier stage's output"
                };
                return Err(PipelineError::invalid(format!(
                    "stage '{}' writes '{}', which is already {}",
                    stage.name, stage.output_key, what
                )));
            }
        }

        if !self.stages.iter().any(|s| s.output_key == self.output_key) {
            return Err(PipelineError::invalid(format!(
                "final output key '{}' is not produced by any stage",
                self.output_key
            )));
        }

        Ok(())
    }
}

/// Fluent builder for [`Pipeline`].
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    input_key: Option<String>,
    output_key: Option<String>,
    stages: Vec<Stage>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the name of the initial input variable (default `"input"`).
    pub fn input_key(mut self, key: &str) -> Self {
        self.input_key = Some(key.to_string());
        self
    }

    /// Sets the variable returned at the end (default: last stage's output).
    pub fn output_key(mut self, key: &str) -> Self {
        self.output_key = Some(key.to_string());
        self
    }

    /// Appends a stage.
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Appends a closure-backed stage.
    pub fn stage_fn<F>(
        self,
        name: &str,
        input_key: Option<&str>,
        output_key: &str,
        func: F,
    ) -> Self
    where
        F: Fn(&str) -> Result<String, InvokeError> + Send + Sync + 'static,
    {
        self.stage(Stage::from_fn(name, input_key, output_key, func))
    }

    /// Validates and freezes the pipeline.
    pub fn build(self) -> Result<Pipeline, PipelineError> {
        let output_key = match self.output_key {
            Some(key) => key,
            None => self
                .stages
                .last()
                .map(|s| s.output_key.clone())
                .ok_or_else(|| PipelineError::invalid("pipeline has no stages"))?,
        };
        Pipeline::new(
            self.input_key
                .unwrap_or_else(|| DEFAULT_INPUT_KEY.to_string()),
            output_key,
            self.stages,
        )
    }
}

/// Progress of a single run, reported to an observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Running {
        index: usize,
        total: usize,
        stage: String,
    },
    StageFinished {
        index: usize,
        total: usize,
        stage: String,
        elapsed: Duration,
    },
    Completed,
    Failed {
        index: usize,
        stage: String,
    },
}

/// Result of a successful run with every variable it produced.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub output: String,
    pub variables: VariablePool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn echo(name: &str, input: Option<&str>, output: &str) -> Stage {
        Stage::from_fn(name, input, output, |s: &str| Ok(s.to_string()))
    }

    fn invalid_reason(result: Result<Pipeline, PipelineError>) -> String {
        match result {
            Err(PipelineError::InvalidPipelineDefinition(reason)) => reason,
            other => panic!("expected InvalidPipelineDefinition, got {:?}", other),
        }
    }

    #[test]
    fn test_builder_defaults() {
        let pipeline = Pipeline::builder()
            .stage(echo("one", None, "a"))
            .stage(echo("two", Some("a"), "b"))
            .build()
            .unwrap();

        assert_eq!(pipeline.input_key(), DEFAULT_INPUT_KEY);
        assert_eq!(pipeline.output_key(), "b");
        assert_eq!(pipeline.stages().len(), 2);
        assert_eq!(pipeline.resolved_input(&pipeline.stages()[0]), "input");
    }

    #[test]
    fn test_empty_pipeline_rejected() {
        let reason = invalid_reason(Pipeline::builder().build());
        assert!(reason.contains("no stages"));

        let reason = invalid_reason(Pipeline::new("input", "out", vec![]));
        assert!(reason.contains("no stages"));
    }

    #[test]
    fn test_dangling_input_rejected_without_invoking() {
        let calls = Arc::new(AtomicUsize::new(0));
        let spy = {
            let calls = Arc::clone(&calls);
            move |s: &str| -> Result<String, InvokeError> {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(s.to_string())
            }
        };

        let result = Pipeline::builder()
            .stage_fn("first", None, "a", spy.clone())
            .stage_fn("second", Some("nowhere"), "b", spy)
            .build();

        let reason = invalid_reason(result);
        assert!(reason.contains("'nowhere'"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_forward_reference_rejected() {
        let reason = invalid_reason(
            Pipeline::builder()
                .stage(echo("first", Some("b"), "a"))
                .stage(echo("second", None, "b"))
                .build(),
        );
        assert!(reason.contains("before stage 'second' produces it"));
    }

    #[test]
    fn test_duplicate_output_rejected() {
        let reason = invalid_reason(
            Pipeline::builder()
                .stage(echo("first", None, "same"))
                .stage(echo("second", Some("same"), "same"))
                .build(),
        );
        assert!(reason.contains("writes 'same'"));
    }

    #[test]
    fn test_output_shadowing_initial_input_rejected() {
        let reason = invalid_reason(
            Pipeline::builder()
                .stage(echo("first", None, "input"))
                .build(),
        );
        assert!(reason.contains("the initial input"));
    }

    #[test]
    fn test_unreachable_final_key_rejected() {
        let reason = invalid_reason(
            Pipeline::builder()
                .stage(echo("first", None, "a"))
                .output_key("missing")
                .build(),
        );
        assert!(reason.contains("'missing'"));

        // The initial input alone is not a valid final output.
        let reason = invalid_reason(Pipeline::new("input", "input", vec![echo("x", None, "a")]));
        assert!(reason.contains("not produced by any stage"));
    }

    #[test]
    fn test_duplicate_stage_name_rejected() {
        let reason = invalid_reason(
            Pipeline::builder()
                .stage(echo("same", None, "a"))
                .stage(echo("same", Some("a"), "b"))
                .build(),
        );
        assert!(reason.contains("used more than once"));
    }

    #[test]
    fn test_blank_names_rejected() {
        invalid_reason(Pipeline::builder().stage(echo(" ", None, "a")).build());
        invalid_reason(Pipeline::builder().stage(echo("x", None, "")).build());
        invalid_reason(
            Pipeline::builder()
                .input_key("")
                .stage(echo("x", None, "a"))
                .build(),
        );
    }

    #[test]
    fn test_stage_debug_hides_invoker() {
        let stage = echo("draft", None, "a");
        let rendered = format!("{:?}", stage);
        assert!(rendered.contains("draft"));
        assert_eq!(stage.describe(), "fn");
    }
}
