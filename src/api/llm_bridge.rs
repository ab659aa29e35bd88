//! Stage invokers backed by the `llm` crate, plus local prompt templates.

use async_trait::async_trait;
use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::ChatMessage;
use llm::LLMProvider;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use super::error::{ConfigError, InvokeError, StageError};
use super::invoke::Invoke;

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*([^{}\s]+)\s*\}\}").expect("placeholder pattern is valid")
    })
}

/// A prompt with `{{ name }}` placeholders.
///
/// Only the stage's own input can be referenced, either as `{{input}}` or by
/// its variable name. An empty template passes the input through untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptTemplate {
    source: String,
}

impl PromptTemplate {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Placeholder names in order of appearance.
    pub fn placeholders(&self) -> Vec<&str> {
        placeholder_re()
            .captures_iter(&self.source)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect()
    }

    /// Returns the first placeholder that does not name the stage input.
    pub fn unknown_placeholder(&self, variable: &str) -> Option<&str> {
        self.placeholders()
            .into_iter()
            .find(|name| *name != "input" && *name != variable)
    }

    /// Substitutes the stage input into the template.
    pub fn render(&self, input: &str, variable: &str) -> String {
        if self.source.trim().is_empty() {
            return input.to_string();
        }
        placeholder_re()
            .replace_all(&self.source, |caps: &regex::Captures| {
                let key = &caps[1];
                if key == "input" || key == variable {
                    input.to_string()
                } else {
                    String::new()
                }
            })
            .into_owned()
    }
}

/// Everything needed to build a client for one provider.
#[derive(Clone, PartialEq)]
pub struct ProviderSettings {
    pub name: String,
    pub backend: String,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout_seconds: Option<u64>,
}

impl ProviderSettings {
    /// `backend:model`, as shown to users.
    pub fn label(&self) -> String {
        format!("{}:{}", self.backend, self.model)
    }

    pub fn parsed_backend(&self) -> Result<LLMBackend, ConfigError> {
        LLMBackend::from_str(&self.backend).map_err(|_| ConfigError::InvalidBackend {
            provider: self.name.clone(),
            backend: self.backend.clone(),
        })
    }

    /// Builds a dedicated client carrying the stage's system instruction.
    pub fn client(&self, system: Option<&str>) -> Result<Box<dyn LLMProvider>, ConfigError> {
        let mut builder = LLMBuilder::new()
            .backend(self.parsed_backend()?)
            .model(&self.model);

        if let Some(key) = &self.api_key {
            builder = builder.api_key(key);
        }
        if let Some(url) = &self.base_url {
            builder = builder.base_url(url);
        }
        if let Some(t) = self.temperature {
            builder = builder.temperature(t);
        }
        if let Some(n) = self.max_tokens {
            builder = builder.max_tokens(n);
        }
        if let Some(secs) = self.timeout_seconds {
            builder = builder.timeout_seconds(secs);
        }
        if let Some(system) = system.filter(|s| !s.trim().is_empty()) {
            builder = builder.system(system);
        }

        builder.build().map_err(|source| ConfigError::Provider {
            provider: self.name.clone(),
            source,
        })
    }
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("name", &self.name)
            .field("backend", &self.backend)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

/// A stage that sends its rendered prompt to a language model.
pub struct LlmStage {
    provider: Box<dyn LLMProvider>,
    template: PromptTemplate,
    variable: String,
    label: String,
}

impl LlmStage {
    pub fn new(
        settings: &ProviderSettings,
        system: Option<&str>,
        template: PromptTemplate,
        variable: &str,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            provider: settings.client(system)?,
            template,
            variable: variable.to_string(),
            label: settings.label(),
        })
    }
}

#[async_trait]
impl Invoke for LlmStage {
    async fn invoke(&self, input: &str) -> Result<String, InvokeError> {
        let rendered = self.template.render(input, &self.variable);
        let req = ChatMessage::user().content(&rendered).build();
        let resp = self.provider.chat(&[req]).await.map_err(StageError::from)?;

        let text = resp
            .text()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| StageError::EmptyResponse(self.label.clone()))?;
        Ok(text)
    }

    fn describe(&self) -> String {
        format!("llm {}", self.label)
    }
}

/// A stage that only renders its template, without any model call.
#[derive(Debug, Clone)]
pub struct TemplateStage {
    template: PromptTemplate,
    variable: String,
}

impl TemplateStage {
    pub fn new(template: PromptTemplate, variable: &str) -> Self {
        Self {
            template,
            variable: variable.to_string(),
        }
    }
}

#[async_trait]
impl Invoke for TemplateStage {
    async fn invoke(&self, input: &str) -> Result<String, InvokeError> {
        Ok(self.template.render(input, &self.variable))
    }

    fn describe(&self) -> String {
        "template".to_string()
    }
}
