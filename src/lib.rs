pub mod api;
pub mod cli;
pub mod commands;
pub mod core;

pub use api::{
    run, ConfigError, Invoke, Pipeline, PipelineBuilder, PipelineError, PipelineOutput, RunError,
    Stage, VariablePool,
};
