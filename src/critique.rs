//! Render critique with a vision-capable chat completion model.
//!
//! One synchronous request per critique: the system prompt, the user prompt and
//! the render embedded as a base64 data URL. No streaming and no retries; any
//! failure aborts the stage without touching the stored critique.
//!
//! # Configuration
//!
//! Defaults come from [`crate::config`]:
//! - `RENDER_CRITIC_COMPLETION_ENDPOINT`: API endpoint URL
//! - `RENDER_CRITIC_MODEL`: Model name
//! - `RENDER_CRITIC_MAX_TOKENS`: Max tokens in response
//! - `RENDER_CRITIC_COMPLETION_TIMEOUT`: Request timeout (seconds)

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::artifact::{ArtifactError, RenderArtifact};
use crate::config;
use crate::http;
use crate::session::SessionFields;

/// Result type for critique operations
pub type CritiqueResult<T> = Result<T, CritiqueError>;

/// Errors that can occur while producing a critique
#[derive(Debug, thiserror::Error)]
pub enum CritiqueError {
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("no render path is set for this session")]
    MissingRender,

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("completion service rejected the API key (HTTP {0})")]
    Authentication(u16),

    #[error("completion service returned HTTP {0}")]
    Status(u16),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("completion service returned an empty critique")]
    EmptyResponse,
}

impl From<ureq::Error> for CritiqueError {
    fn from(err: ureq::Error) -> Self {
        match http::status_of(&err) {
            Some(code) if http::is_auth_status(code) => CritiqueError::Authentication(code),
            Some(code) => CritiqueError::Status(code),
            None => CritiqueError::Transport(err.to_string()),
        }
    }
}

/// Operator-configured instructions sent with the render
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

impl PromptPair {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// Configuration for the completion request
#[derive(Debug, Clone)]
pub struct CritiqueConfig {
    /// API endpoint URL
    pub endpoint: String,
    /// Model name to use
    pub model: String,
    /// Maximum tokens in response
    pub max_tokens: u32,
    /// Request timeout (seconds)
    pub timeout: u64,
}

impl Default for CritiqueConfig {
    fn default() -> Self {
        let cfg = config::get();
        Self {
            endpoint: cfg.completion.endpoint.clone(),
            model: cfg.completion.model.clone(),
            max_tokens: cfg.completion.max_tokens,
            timeout: cfg.completion.timeout,
        }
    }
}

impl CritiqueConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds;
        self
    }
}

/// A completion service. Returns the raw text of the first choice.
pub trait CompletionClient {
    fn complete(&self, request: &serde_json::Value) -> CritiqueResult<String>;
}

/// Chat completions client over HTTPS
pub struct HttpCompletionClient {
    agent: ureq::Agent,
    endpoint: String,
    api_key: String,
}

impl HttpCompletionClient {
    pub fn new(api_key: impl Into<String>, config: &CritiqueConfig) -> Self {
        Self {
            agent: http::agent(config.timeout),
            endpoint: config.endpoint.clone(),
            api_key: api_key.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl CompletionClient for HttpCompletionClient {
    fn complete(&self, request: &serde_json::Value) -> CritiqueResult<String> {
        let body = serde_json::to_string(request)
            .map_err(|e| CritiqueError::InvalidResponse(e.to_string()))?;

        debug!(endpoint = %self.endpoint, bytes = body.len(), "sending completion request");

        let text = self
            .agent
            .post(&self.endpoint)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .send(&body)?
            .body_mut()
            .read_to_string()
            .map_err(|e| CritiqueError::Transport(e.to_string()))?;

        let completion: ChatCompletion = serde_json::from_str(&text)
            .map_err(|e| CritiqueError::InvalidResponse(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| CritiqueError::InvalidResponse("response has no choices".to_string()))
    }
}

/// Build the chat completion body for one render
pub fn build_request(
    config: &CritiqueConfig,
    prompts: &PromptPair,
    artifact: &RenderArtifact,
) -> CritiqueResult<serde_json::Value> {
    let image_url = artifact.data_url()?;

    Ok(serde_json::json!({
        "model": config.model,
        "messages": [
            {
                "role": "system",
                "content": prompts.system
            },
            {
                "role": "user",
                "content": [
                    {
                        "type": "text",
                        "text": prompts.user
                    },
                    {
                        "type": "image_url",
                        "image_url": {
                            "url": image_url
                        }
                    }
                ]
            }
        ],
        "max_tokens": config.max_tokens
    }))
}

/// Send a render for critique and return the trimmed text
pub fn analyze_render(
    client: &dyn CompletionClient,
    config: &CritiqueConfig,
    prompts: &PromptPair,
    artifact: &RenderArtifact,
) -> CritiqueResult<String> {
    if prompts.system.trim().is_empty() || prompts.user.trim().is_empty() {
        warn!("critique prompt is empty; the result will be generic");
    }

    let request = build_request(config, prompts, artifact)?;
    let critique = client.complete(&request)?.trim().to_string();

    if critique.is_empty() {
        return Err(CritiqueError::EmptyResponse);
    }
    Ok(critique)
}

/// Critique stage: analyze the session's render and store the result.
///
/// The critique field is written only when the whole call succeeds.
pub fn run_critique_stage(
    fields: &mut SessionFields,
    client: &dyn CompletionClient,
    config: &CritiqueConfig,
) -> CritiqueResult<String> {
    let artifact = fields.render.as_ref().ok_or(CritiqueError::MissingRender)?;

    info!(render = %artifact.path.display(), model = %config.model, "requesting critique");
    let critique = analyze_render(client, config, &fields.prompts, artifact)?;
    info!(chars = critique.len(), "critique received");

    fields.critique = Some(critique.clone());
    Ok(critique)
}
