//! High-level API for assembling and running prompt pipelines.

mod error;
mod invoke;
mod llm_bridge;
mod pipeline;
mod pool;
mod runner;

pub use error::{ConfigError, InvokeError, PipelineError, RunError, StageError};
pub use invoke::{FnInvoke, Invoke};
pub use llm_bridge::{LlmStage, PromptTemplate, ProviderSettings, TemplateStage};
pub use pipeline::{
    Pipeline, PipelineBuilder, PipelineOutput, RunState, Stage, DEFAULT_INPUT_KEY,
};
pub use pool::{VariableExists, VariablePool};
pub use runner::{run, Observer};
