//! Error types for the library API.

use llm::error::LLMError;
use thiserror::Error;

/// Error returned by a stage's invocation collaborator.
pub type InvokeError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while assembling or running a pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The chain invariant does not hold. Only raised while assembling.
    #[error("Invalid pipeline definition: {0}")]
    InvalidPipelineDefinition(String),

    /// A variable was read before anything wrote it.
    #[error("Variable '{key}' needed by {needed_by} is missing")]
    MissingVariable { key: String, needed_by: String },

    /// A stage tried to write a variable that already exists.
    #[error("Stage '{stage}' tried to overwrite variable '{key}'")]
    DuplicateVariable { key: String, stage: String },

    /// The stage's invocation collaborator failed.
    #[error("Stage '{stage}' failed: {source}")]
    StageInvocationFailed {
        stage: String,
        #[source]
        source: InvokeError,
    },
}

impl PipelineError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        PipelineError::InvalidPipelineDefinition(msg.into())
    }
}

/// Errors produced by LLM-backed stages.
#[derive(Error, Debug)]
pub enum StageError {
    /// An error originating from the underlying LLM backend.
    #[error("LLM backend error: {0}")]
    LLM(#[from] LLMError),

    /// The provider answered without any text content.
    #[error("Provider '{0}' returned an empty response")]
    EmptyResponse(String),
}

/// Errors related to loading a pipeline definition and wiring its providers.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The definition file could not be read or written.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The TOML definition could not be parsed.
    #[error("Failed to parse TOML definition: {0}")]
    Toml(#[from] toml::de::Error),

    /// The definition could not be rendered as TOML.
    #[error("Failed to write TOML definition: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    /// The YAML definition could not be parsed or rendered.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A stage refers to a provider that is not declared.
    #[error("Stage '{stage}' uses unknown provider '{provider}'")]
    UnknownProvider { stage: String, provider: String },

    /// The backend name is not one the llm crate knows.
    #[error("Invalid backend '{backend}' for provider '{provider}'")]
    InvalidBackend { provider: String, backend: String },

    /// The provider's API key variable is not set.
    #[error("Environment variable '{var}' not set for provider '{provider}'")]
    MissingApiKey { var: String, provider: String },

    /// A prompt template references a variable the stage cannot see.
    #[error("Stage '{stage}' prompt references unknown variable '{placeholder}'")]
    UnknownPlaceholder { stage: String, placeholder: String },

    /// The API was used with an invalid configuration.
    #[error("Configuration error: {0}")]
    Invalid(String),

    /// Building a provider client failed.
    #[error("Failed to build provider '{provider}': {source}")]
    Provider {
        provider: String,
        #[source]
        source: LLMError,
    },

    /// The assembled stages do not form a valid chain.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// A comprehensive error type for CLI operations.
#[derive(Error, Debug)]
pub enum RunError {
    /// An error originating from the pipeline definition.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An error raised while running the pipeline.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// The pipeline input could not be read or is unusable.
    #[error("Input error: {0}")]
    Input(String),

    /// An underlying I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize the run output.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_failure_keeps_source() {
        let err = PipelineError::StageInvocationFailed {
            stage: "draft".to_string(),
            source: "connection reset".into(),
        };

        assert_eq!(err.to_string(), "Stage 'draft' failed: connection reset");
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("connection reset"));
    }

    #[test]
    fn test_pipeline_error_is_transparent_in_config_error() {
        let err: ConfigError = PipelineError::invalid("pipeline has no stages").into();
        assert_eq!(
            err.to_string(),
            "Invalid pipeline definition: pipeline has no stages"
        );
    }
}
