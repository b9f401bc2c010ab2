//! Configuration management with environment variable support.
//!
//! Every tunable has a compiled-in default and an environment override. CLI
//! flags take precedence over both (see `main.rs`).
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `RENDER_CRITIC_COMPLETION_ENDPOINT` | Chat completions URL | OpenAI `/v1/chat/completions` |
//! | `RENDER_CRITIC_MODEL` | Vision model name | `gpt-4-turbo` |
//! | `RENDER_CRITIC_MAX_TOKENS` | Maximum tokens in a critique | `150` |
//! | `RENDER_CRITIC_COMPLETION_TIMEOUT` | Completion request timeout (s) | `120` |
//! | `RENDER_CRITIC_TRACKING_TIMEOUT` | Shotgrid request timeout (s) | `30` |
//! | `RENDER_CRITIC_PAGE_SIZE` | Records per Shotgrid search page | `500` |
//! | `RENDER_CRITIC_NOTE_SUBJECT` | Subject line of published notes | `GPT4 feedback notes` |
//! | `RENDER_CRITIC_SESSION_DIR` | Base directory for sessions | `/tmp/render-critic` |
//!
//! # Example
//!
//! ```bash
//! # Point the critique stage at a local OpenAI-compatible server
//! export RENDER_CRITIC_COMPLETION_ENDPOINT="http://localhost:11434/v1/chat/completions"
//! export RENDER_CRITIC_MODEL="llava"
//! ```

use std::env;
use std::str::FromStr;
use std::sync::OnceLock;

// ============================================================================
// Default Values
// ============================================================================

/// Default chat completions endpoint
pub const DEFAULT_COMPLETION_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Default vision model
pub const DEFAULT_MODEL: &str = "gpt-4-turbo";

/// Default output bound for a critique
pub const DEFAULT_MAX_TOKENS: u32 = 150;

/// Default completion request timeout (seconds)
pub const DEFAULT_COMPLETION_TIMEOUT: u64 = 120;

/// Default Shotgrid request timeout (seconds)
pub const DEFAULT_TRACKING_TIMEOUT: u64 = 30;

/// Default page size for Shotgrid searches
pub const DEFAULT_PAGE_SIZE: u32 = 500;

/// Default subject line for critique notes
pub const DEFAULT_NOTE_SUBJECT: &str = "GPT4 feedback notes";

/// Default session base directory
pub const DEFAULT_SESSION_DIR: &str = "/tmp/render-critic";

/// Default system prompt for new sessions
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a lighting and compositing supervisor reviewing CG renders for a VFX production.";

/// Default user prompt for new sessions
pub const DEFAULT_USER_PROMPT: &str = "Critique this frame. List the most visible technical or \
     artistic issues in a few short sentences.";

// ============================================================================
// Environment Variable Names
// ============================================================================

pub const ENV_COMPLETION_ENDPOINT: &str = "RENDER_CRITIC_COMPLETION_ENDPOINT";
pub const ENV_MODEL: &str = "RENDER_CRITIC_MODEL";
pub const ENV_MAX_TOKENS: &str = "RENDER_CRITIC_MAX_TOKENS";
pub const ENV_COMPLETION_TIMEOUT: &str = "RENDER_CRITIC_COMPLETION_TIMEOUT";
pub const ENV_TRACKING_TIMEOUT: &str = "RENDER_CRITIC_TRACKING_TIMEOUT";
pub const ENV_PAGE_SIZE: &str = "RENDER_CRITIC_PAGE_SIZE";
pub const ENV_NOTE_SUBJECT: &str = "RENDER_CRITIC_NOTE_SUBJECT";
pub const ENV_SESSION_DIR: &str = "RENDER_CRITIC_SESSION_DIR";

// ============================================================================
// Configuration Getters (with caching)
// ============================================================================

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration (initialized from environment on first access)
pub fn get() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Centralized configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub completion: CompletionSettings,
    pub tracking: TrackingSettings,
    pub session: SessionSettings,
}

/// Completion-service settings
#[derive(Debug, Clone)]
pub struct CompletionSettings {
    /// API endpoint URL
    pub endpoint: String,
    /// Model name
    pub model: String,
    /// Maximum tokens in response
    pub max_tokens: u32,
    /// Request timeout (seconds)
    pub timeout: u64,
}

/// Tracking-service settings
#[derive(Debug, Clone)]
pub struct TrackingSettings {
    /// Request timeout (seconds)
    pub timeout: u64,
    /// Records per search page
    pub page_size: u32,
    /// Subject of created notes
    pub note_subject: String,
}

/// Session-related settings
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Base directory for session storage
    pub base_dir: String,
}

impl Config {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            completion: CompletionSettings::from_env(),
            tracking: TrackingSettings::from_env(),
            session: SessionSettings::from_env(),
        }
    }

    /// Create configuration with all defaults (ignoring environment)
    pub fn defaults() -> Self {
        Self {
            completion: CompletionSettings::defaults(),
            tracking: TrackingSettings::defaults(),
            session: SessionSettings::defaults(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl CompletionSettings {
    pub fn from_env() -> Self {
        Self {
            endpoint: env_string(ENV_COMPLETION_ENDPOINT, DEFAULT_COMPLETION_ENDPOINT),
            model: env_string(ENV_MODEL, DEFAULT_MODEL),
            max_tokens: env_parsed(ENV_MAX_TOKENS, DEFAULT_MAX_TOKENS),
            timeout: env_parsed(ENV_COMPLETION_TIMEOUT, DEFAULT_COMPLETION_TIMEOUT),
        }
    }

    pub fn defaults() -> Self {
        Self {
            endpoint: DEFAULT_COMPLETION_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: DEFAULT_COMPLETION_TIMEOUT,
        }
    }
}

impl TrackingSettings {
    pub fn from_env() -> Self {
        Self {
            timeout: env_parsed(ENV_TRACKING_TIMEOUT, DEFAULT_TRACKING_TIMEOUT),
            page_size: env_parsed(ENV_PAGE_SIZE, DEFAULT_PAGE_SIZE).max(1),
            note_subject: env_string(ENV_NOTE_SUBJECT, DEFAULT_NOTE_SUBJECT),
        }
    }

    pub fn defaults() -> Self {
        Self {
            timeout: DEFAULT_TRACKING_TIMEOUT,
            page_size: DEFAULT_PAGE_SIZE,
            note_subject: DEFAULT_NOTE_SUBJECT.to_string(),
        }
    }
}

impl SessionSettings {
    pub fn from_env() -> Self {
        Self {
            base_dir: env_string(ENV_SESSION_DIR, DEFAULT_SESSION_DIR),
        }
    }

    pub fn defaults() -> Self {
        Self {
            base_dir: DEFAULT_SESSION_DIR.to_string(),
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: FromStr>(name: &str, default: T) -> T {
    parse_or(env::var(name).ok().as_deref(), default)
}

/// Parse an optional raw value, keeping the default when absent or invalid
fn parse_or<T: FromStr>(raw: Option<&str>, default: T) -> T {
    raw.and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}

/// Get session base directory (convenience function)
pub fn session_base_dir() -> String {
    get().session.base_dir.clone()
}
