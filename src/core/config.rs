//! Loading pipeline definitions and wiring their stages to LLM providers.

use llm::builder::LLMBackend;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::api::{
    ConfigError, Invoke, LlmStage, Pipeline, PromptTemplate, ProviderSettings, Stage,
    TemplateStage, DEFAULT_INPUT_KEY,
};

/// Environment variable that points at the pipeline definition.
pub const CONFIG_ENV: &str = "PROMPT_PIPELINE_CONFIG";

/// A pipeline definition as written on disk.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PipelineFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
    pub stages: Vec<StageConfig>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub backend: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    #[default]
    Llm,
    Template,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StageConfig {
    pub name: String,
    #[serde(default)]
    pub kind: StageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Defaults to the previous stage's output (or the initial input).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    /// Defaults to the stage name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// How stages are wired when assembling a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    /// LLM stages call their providers.
    Live,
    /// Every stage renders its prompt locally; no keys, no network.
    DryRun,
}

/// Resolves the definition path: explicit flag, then `$PROMPT_PIPELINE_CONFIG`,
/// then `~/.prompt-pipeline/pipeline.toml`.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Ok(path) = env::var(CONFIG_ENV) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    let home = env::var("HOME")
        .map_err(|_| ConfigError::Invalid("Unable to determine HOME directory".to_string()))?;
    Ok(PathBuf::from(home)
        .join(".prompt-pipeline")
        .join("pipeline.toml"))
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|s| s.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Reads a TOML or YAML definition, chosen by file extension.
pub fn load_pipeline_file(path: &Path) -> Result<PipelineFile, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    if is_yaml(path) {
        PipelineFile::from_yaml_str(&content)
    } else {
        PipelineFile::from_toml_str(&content)
    }
}

/// Writes a definition as TOML or YAML, chosen by file extension.
pub fn save_pipeline_file(path: &Path, file: &PipelineFile) -> Result<(), ConfigError> {
    let content = if is_yaml(path) {
        file.to_yaml_string()?
    } else {
        file.to_toml_string()?
    };
    fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// The environment variable a backend reads its key from by default.
fn default_api_key_env(backend: &LLMBackend) -> Option<&'static str> {
    match backend {
        LLMBackend::OpenAI => Some("OPENAI_API_KEY"),
        LLMBackend::Anthropic => Some("ANTHROPIC_API_KEY"),
        LLMBackend::Google => Some("GOOGLE_API_KEY"),
        LLMBackend::Groq => Some("GROQ_API_KEY"),
        LLMBackend::XAI => Some("XAI_API_KEY"),
        LLMBackend::Cohere => Some("COHERE_API_KEY"),
        LLMBackend::DeepSeek => Some("DEEPSEEK_API_KEY"),
        LLMBackend::Mistral => Some("MISTRAL_API_KEY"),
        // Ollama and other local backends run without a key.
        _ => None,
    }
}

impl PipelineFile {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn input_key(&self) -> &str {
        self.input_key.as_deref().unwrap_or(DEFAULT_INPUT_KEY)
    }

    fn provider_for<'a>(
        &'a self,
        stage: &'a StageConfig,
    ) -> Result<(&'a str, &'a ProviderConfig), ConfigError> {
        let name = stage.provider.as_deref().ok_or_else(|| {
            ConfigError::Invalid(format!("Stage '{}' is missing a provider.", stage.name))
        })?;
        let conf = self
            .providers
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProvider {
                stage: stage.name.clone(),
                provider: name.to_string(),
            })?;
        Ok((name, conf))
    }

    /// Turns one provider entry into settings, looking its key up through `env`.
    fn provider_settings<F>(
        &self,
        name: &str,
        conf: &ProviderConfig,
        mode: BuildMode,
        env: &F,
    ) -> Result<ProviderSettings, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = ProviderSettings {
            name: name.to_string(),
            backend: conf.backend.clone(),
            model: conf.model.clone(),
            api_key: None,
            base_url: conf.base_url.clone(),
            temperature: conf.temperature,
            max_tokens: conf.max_tokens,
            timeout_seconds: conf.timeout_seconds,
        };
        let backend = settings.parsed_backend()?;

        if mode == BuildMode::Live {
            let var = conf
                .api_key_env
                .clone()
                .or_else(|| default_api_key_env(&backend).map(str::to_string));
            if let Some(var) = var {
                let key = env(&var).filter(|k| !k.trim().is_empty()).ok_or_else(|| {
                    ConfigError::MissingApiKey {
                        var: var.clone(),
                        provider: name.to_string(),
                    }
                })?;
                settings.api_key = Some(key);
            }
        }
        Ok(settings)
    }

    /// Assembles the pipeline, reading API keys from the process environment.
    pub fn build(&self, mode: BuildMode) -> Result<Pipeline, ConfigError> {
        self.build_with(mode, |var| env::var(var).ok())
    }

    /// Assembles the pipeline with a custom key lookup.
    pub fn build_with<F>(&self, mode: BuildMode, env: F) -> Result<Pipeline, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let input_key = self.input_key().to_string();
        let mut resolved: HashMap<&str, ProviderSettings> = HashMap::new();
        let mut stages = Vec::with_capacity(self.stages.len());
        let mut previous = input_key.clone();

        for conf in &self.stages {
            let input = conf.input.clone().unwrap_or_else(|| previous.clone());
            let output = conf.output.clone().unwrap_or_else(|| conf.name.clone());
            let template = PromptTemplate::new(conf.prompt.clone().unwrap_or_default());

            if let Some(placeholder) = template.unknown_placeholder(&input) {
                return Err(ConfigError::UnknownPlaceholder {
                    stage: conf.name.clone(),
                    placeholder: placeholder.to_string(),
                });
            }

            let invoker: Arc<dyn Invoke> = match conf.kind {
                StageKind::Template => {
                    if conf.provider.is_some() || conf.system.is_some() {
                        return Err(ConfigError::Invalid(format!(
                            "Template stage '{}' cannot have a provider or system instruction.",
                            conf.name
                        )));
                    }
                    Arc::new(TemplateStage::new(template, &input))
                }
                StageKind::Llm => {
                    let (name, provider) = self.provider_for(conf)?;
                    if !resolved.contains_key(name) {
                        let settings = self.provider_settings(name, provider, mode, &env)?;
                        resolved.insert(name, settings);
                    }
                    match mode {
                        BuildMode::Live => Arc::new(LlmStage::new(
                            &resolved[name],
                            conf.system.as_deref(),
                            template,
                            &input,
                        )?),
                        BuildMode::DryRun => Arc::new(TemplateStage::new(template, &input)),
                    }
                }
            };

            stages.push(Stage::new(&conf.name, Some(input.as_str()), &output, invoker));
            previous = output;
        }

        for name in self.providers.keys() {
            if !resolved.contains_key(name.as_str()) {
                debug!(provider = %name, "provider is not used by any stage");
            }
        }

        let output_key = self.output_key.clone().unwrap_or(previous);
        Ok(Pipeline::new(input_key, output_key, stages)?)
    }

    /// A four-stage draft, critique, revise, polish pipeline.
    pub fn sample() -> Self {
        let mut providers = BTreeMap::new();
        providers.insert(
            "fast".to_string(),
            ProviderConfig {
                backend: "openai".to_string(),
                model: "gpt-4o-mini".to_string(),
                api_key_env: Some("OPENAI_API_KEY".to_string()),
                base_url: None,
                temperature: Some(0.5),
                max_tokens: Some(1024),
                timeout_seconds: Some(120),
            },
        );
        providers.insert(
            "strong".to_string(),
            ProviderConfig {
                backend: "anthropic".to_string(),
                model: "claude-3-5-sonnet-20240620".to_string(),
                api_key_env: Some("ANTHROPIC_API_KEY".to_string()),
                base_url: None,
                temperature: None,
                max_tokens: Some(2048),
                timeout_seconds: Some(120),
            },
        );

        let stage = |name: &str, provider: &str, system: &str, prompt: &str| StageConfig {
            name: name.to_string(),
            kind: StageKind::Llm,
            provider: Some(provider.to_string()),
            system: Some(system.to_string()),
            prompt: Some(prompt.to_string()),
            input: None,
            output: None,
        };

        Self {
            input_key: Some("topic".to_string()),
            output_key: Some("final".to_string()),
            providers,
            stages: vec![
                stage(
                    "draft",
                    "fast",
                    "You are a concise technical writer.",
                    "Write a short first draft about: {{topic}}",
                ),
                stage(
                    "critique",
                    "strong",
                    "You are a demanding editor.",
                    "List the weaknesses of this draft:\n\n{{draft}}",
                ),
                stage(
                    "revision",
                    "fast",
                    "You rewrite text based on editorial notes.",
                    "Rewrite a better draft that fixes these issues:\n\n{{critique}}",
                ),
                StageConfig {
                    output: Some("final".to_string()),
                    ..stage(
                        "polish",
                        "strong",
                        "You polish prose without changing its meaning.",
                        "Polish the following text:\n\n{{input}}",
                    )
                },
            ],
        }
    }
}
