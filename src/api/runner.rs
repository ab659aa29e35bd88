//! Sequential execution of a validated pipeline.

use std::time::Instant;

use tracing::{debug, info, Instrument};

use super::error::PipelineError;
use super::pipeline::{Pipeline, PipelineOutput, RunState};
use super::pool::VariablePool;

/// Observer callback for run progress.
pub type Observer<'o> = dyn FnMut(RunState) + Send + 'o;

/// Runs `pipeline` on `input` and returns the final output.
pub async fn run(pipeline: &Pipeline, input: impl Into<String>) -> Result<String, PipelineError> {
    pipeline.run(input).await
}

impl Pipeline {
    /// Runs every stage in order and returns the final output.
    pub async fn run(&self, input: impl Into<String>) -> Result<String, PipelineError> {
        self.run_traced(input).await.map(|out| out.output)
    }

    /// Runs the pipeline and keeps every variable the run produced.
    pub async fn run_traced(
        &self,
        input: impl Into<String>,
    ) -> Result<PipelineOutput, PipelineError> {
        self.run_observed(input, &mut |_| {}).await
    }

    /// Runs the pipeline, reporting each state transition to `observer`.
    pub async fn run_observed(
        &self,
        input: impl Into<String>,
        observer: &mut Observer<'_>,
    ) -> Result<PipelineOutput, PipelineError> {
        let mut variables = VariablePool::new(self.input_key.clone(), input);
        let output = self.execute(&mut variables, observer).await?;
        Ok(PipelineOutput { output, variables })
    }

    /// Runs the stages against a caller-supplied pool.
    ///
    /// On failure the pool is left exactly as it was when the failing stage
    /// started; nothing is rolled back and nothing partial is written.
    pub async fn execute(
        &self,
        pool: &mut VariablePool,
        observer: &mut Observer<'_>,
    ) -> Result<String, PipelineError> {
        let total = self.stages.len();
        info!(stages = total, input_key = %self.input_key, "pipeline run started");

        for (index, stage) in self.stages.iter().enumerate() {
            observer(RunState::Running {
                index,
                total,
                stage: stage.name().to_string(),
            });

            let span = tracing::info_span!("stage", name = %stage.name(), index);
            let started = Instant::now();
            let result = self
                .run_stage(index, pool)
                .instrument(span)
                .await;

            if let Err(err) = result {
                debug!(stage = %stage.name(), index, error = %err, "pipeline run aborted");
                observer(RunState::Failed {
                    index,
                    stage: stage.name().to_string(),
                });
                return Err(err);
            }

            observer(RunState::StageFinished {
                index,
                total,
                stage: stage.name().to_string(),
                elapsed: started.elapsed(),
            });
        }

        let output = pool
            .get(&self.output_key)
            .map(str::to_string)
            .ok_or_else(|| PipelineError::MissingVariable {
                key: self.output_key.clone(),
                needed_by: "the pipeline output".to_string(),
            })?;

        observer(RunState::Completed);
        info!(variables = pool.len(), "pipeline run completed");
        Ok(output)
    }

    async fn run_stage(&self, index: usize, pool: &mut VariablePool) -> Result<(), PipelineError> {
        let stage = &self.stages[index];
        let input_key = self.resolved_input(stage);

        let input = pool
            .get(input_key)
            .ok_or_else(|| PipelineError::MissingVariable {
                key: input_key.to_string(),
                needed_by: format!("stage '{}'", stage.name()),
            })?;

        let started = Instant::now();
        let output = stage
            .invoker()
            .invoke(input)
            .await
            .map_err(|source| PipelineError::StageInvocationFailed {
                stage: stage.name().to_string(),
                source,
            })?;

        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            output_len = output.len(),
            "stage completed"
        );

        pool.insert(stage.output_key(), output)
            .map_err(|exists| PipelineError::DuplicateVariable {
                key: exists.0,
                stage: stage.name().to_string(),
            })
    }
}
