/// Model boundary — the single point of entry for all hosted-model calls in Clarity.
///
/// ARCHITECTURAL RULE: No other module may talk to the model provider directly.
/// The generation flow only ever sees `dyn ModelBackend`, so tests swap in a
/// scripted backend without any network dependency.
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod gemini;

pub use gemini::GeminiClient;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Request blocked by safety filters: {0}")]
    Blocked(String),

    #[error("Model returned empty content")]
    EmptyContent,
}

/// Conversation role as understood by the model provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMessage {
    pub role: Role,
    pub text: String,
}

impl ModelMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// Severity gate applied to one harm category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SafetyThreshold {
    BlockNone,
    BlockOnlyHigh,
    #[default]
    BlockMediumAndAbove,
    BlockLowAndAbove,
}

impl SafetyThreshold {
    pub fn as_str(&self) -> &'static str {
        match self {
            SafetyThreshold::BlockNone => "BLOCK_NONE",
            SafetyThreshold::BlockOnlyHigh => "BLOCK_ONLY_HIGH",
            SafetyThreshold::BlockMediumAndAbove => "BLOCK_MEDIUM_AND_ABOVE",
            SafetyThreshold::BlockLowAndAbove => "BLOCK_LOW_AND_ABOVE",
        }
    }
}

impl fmt::Display for SafetyThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SafetyThreshold {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BLOCK_NONE" => Ok(SafetyThreshold::BlockNone),
            "BLOCK_ONLY_HIGH" => Ok(SafetyThreshold::BlockOnlyHigh),
            "BLOCK_MEDIUM_AND_ABOVE" => Ok(SafetyThreshold::BlockMediumAndAbove),
            "BLOCK_LOW_AND_ABOVE" => Ok(SafetyThreshold::BlockLowAndAbove),
            other => Err(format!("unknown safety threshold '{other}'")),
        }
    }
}

/// Independent thresholds for the four harm categories the provider filters on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SafetySettings {
    pub hate_speech: SafetyThreshold,
    pub dangerous_content: SafetyThreshold,
    pub harassment: SafetyThreshold,
    pub sexually_explicit: SafetyThreshold,
}

impl SafetySettings {
    /// Provider category names paired with their thresholds, in a fixed order.
    pub fn categories(&self) -> [(&'static str, SafetyThreshold); 4] {
        [
            ("HARM_CATEGORY_HATE_SPEECH", self.hate_speech),
            ("HARM_CATEGORY_DANGEROUS_CONTENT", self.dangerous_content),
            ("HARM_CATEGORY_HARASSMENT", self.harassment),
            ("HARM_CATEGORY_SEXUALLY_EXPLICIT", self.sexually_explicit),
        ]
    }
}

/// One model invocation. Built per request by the generation flow.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// Out-of-band system instruction. `None` for single-turn capabilities,
    /// which fold the system prompt into the user turn instead.
    pub system: Option<String>,
    pub messages: Vec<ModelMessage>,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub safety: SafetySettings,
}

/// The opaque text-completion capability consumed by the generation flow.
///
/// Implementations make exactly one attempt per call. Retrying is not the
/// caller's concern: a failure is absorbed by the fallback path.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn generate(&self, request: &ModelRequest) -> Result<String, ModelError>;
}
