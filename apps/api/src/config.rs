use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::generation::capability::{Capability, GenerationParams};
use crate::generation::flow::OnFailure;
use crate::llm_client::SafetySettings;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub google_api_key: String,
    pub model_name: String,
    pub model_api_base: String,
    pub model_timeout: Duration,
    pub prompts_dir: PathBuf,
    pub on_failure: OnFailure,
    pub tasker: GenerationParams,
    pub paragraph: GenerationParams,
    pub chatbot: GenerationParams,
    pub safety: SafetySettings,
    pub port: u16,
    pub rust_log: String,
    /// Origins allowed by CORS. `*` allows any origin.
    pub allowed_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            google_api_key: require_env("GOOGLE_API_KEY")?,
            model_name: env_or("MODEL_NAME", "gemini-1.5-flash"),
            model_api_base: env_or(
                "MODEL_API_BASE",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
            model_timeout: Duration::from_secs(parse_env("MODEL_TIMEOUT_SECS", 60)?),
            prompts_dir: PathBuf::from(env_or("PROMPTS_DIR", "prompts")),
            on_failure: parse_env("ON_FAILURE", OnFailure::Fallback)?,
            tasker: params_from_env("TASKER", Capability::TaskDecomposition)?,
            paragraph: params_from_env("PARAGRAPH", Capability::TextSimplification)?,
            chatbot: params_from_env("CHATBOT", Capability::ChatReply)?,
            safety: SafetySettings {
                hate_speech: parse_env("SAFETY_HATE_SPEECH", Default::default())?,
                dangerous_content: parse_env("SAFETY_DANGEROUS_CONTENT", Default::default())?,
                harassment: parse_env("SAFETY_HARASSMENT", Default::default())?,
                sexually_explicit: parse_env("SAFETY_SEXUALLY_EXPLICIT", Default::default())?,
            },
            port: parse_env("PORT", 8080)?,
            rust_log: env_or("RUST_LOG", "info"),
            allowed_origins: parse_origins(&env_or("ALLOWED_ORIGINS", "*")),
        })
    }

    pub fn params(&self, capability: Capability) -> GenerationParams {
        match capability {
            Capability::TaskDecomposition => self.tasker,
            Capability::TextSimplification => self.paragraph,
            Capability::ChatReply => self.chatbot,
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow!("{key} is invalid: {e}")),
        Err(_) => Ok(default),
    }
}

fn params_from_env(prefix: &str, capability: Capability) -> Result<GenerationParams> {
    let defaults = GenerationParams::defaults_for(capability);
    Ok(GenerationParams {
        temperature: parse_env(&format!("{prefix}_TEMPERATURE"), defaults.temperature)?,
        max_output_tokens: parse_env(
            &format!("{prefix}_MAX_OUTPUT_TOKENS"),
            defaults.max_output_tokens,
        )?,
    })
}

/// Splits a comma-separated origin list, dropping blank entries.
fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(String::from)
        .collect()
}
