//! Generation Flow — runs one capability request end-to-end.
//!
//! Idle → PromptBuilt → Invoking → ExtractingResponse → Validating →
//!     Succeeded | FallbackApplied
//!
//! Under `OnFailure::Fallback` (the default) every failure along the way is
//! logged and replaced by the capability's fallback, so callers always get a
//! contract-conforming result and read `provenance` to tell the two apart.
//! `OnFailure::Propagate` surfaces the classified error instead.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::generation::assembler::{PromptCache, PromptError};
use crate::generation::capability::{CapabilityRegistry, CapabilitySettings};
use crate::generation::contract::{
    self, ChatReply, ContractViolation, OutputContract, SimplifiedText, TaskBreakdown,
};
use crate::generation::extractor::extract;
use crate::generation::prompts::{
    build_chat_system_prompt, build_single_turn_prompt, DEFAULT_GREETING,
};
use crate::llm_client::{ModelBackend, ModelError, ModelMessage, ModelRequest, Role};

// ────────────────────────────────────────────────────────────────────────────
// Policy, provenance, errors
// ────────────────────────────────────────────────────────────────────────────

/// What the flow does when any stage fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OnFailure {
    #[default]
    Fallback,
    Propagate,
}

impl FromStr for OnFailure {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fallback" => Ok(OnFailure::Fallback),
            "propagate" => Ok(OnFailure::Propagate),
            other => Err(format!("unknown failure policy '{other}'")),
        }
    }
}

/// Where a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Generated,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Generated<T> {
    pub data: T,
    pub provenance: Provenance,
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("prompt assembly failed: {0}")]
    PromptAssembly(#[from] PromptError),

    #[error("model invocation failed: {0}")]
    ModelInvocation(#[from] ModelError),

    #[error("response extraction failed: {0}")]
    ResponseExtraction(String),

    #[error("schema validation failed: {0}")]
    SchemaValidation(#[from] ContractViolation),
}

impl GenerationError {
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::PromptAssembly(_) => "prompt_assembly",
            GenerationError::ModelInvocation(_) => "model_invocation",
            GenerationError::ResponseExtraction(_) => "response_extraction",
            GenerationError::SchemaValidation(_) => "schema_validation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    PromptBuilt,
    Invoking,
    ExtractingResponse,
    Validating,
    Succeeded,
    FallbackApplied,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::PromptBuilt => "prompt_built",
            Stage::Invoking => "invoking",
            Stage::ExtractingResponse => "extracting_response",
            Stage::Validating => "validating",
            Stage::Succeeded => "succeeded",
            Stage::FallbackApplied => "fallback_applied",
        };
        f.write_str(name)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Inputs
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

/// One turn of a client-held conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub sender: Sender,
    pub text: String,
}

#[cfg(test)]
impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
        }
    }

    pub fn ai(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Ai,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Invocation<'a> {
    SingleTurn(&'a str),
    Conversation(&'a [ChatTurn]),
}

/// Maps client turns onto model roles and guarantees a trailing user turn.
///
/// Blank turns are dropped. If the history ends on an AI turn, the most
/// recent user text is repeated; with no user text at all, a neutral
/// greeting stands in.
pub fn build_chat_messages(history: &[ChatTurn]) -> Vec<ModelMessage> {
    let mut messages: Vec<ModelMessage> = history
        .iter()
        .filter(|turn| !turn.text.trim().is_empty())
        .map(|turn| match turn.sender {
            Sender::User => ModelMessage::user(turn.text.as_str()),
            Sender::Ai => ModelMessage::model(turn.text.as_str()),
        })
        .collect();

    let ends_with_user = messages
        .last()
        .is_some_and(|m| m.role == Role::User);

    if !ends_with_user {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.text.clone())
            .unwrap_or_else(|| DEFAULT_GREETING.to_string());
        messages.push(ModelMessage::user(last_user));
    }

    messages
}

// ────────────────────────────────────────────────────────────────────────────
// Flow
// ────────────────────────────────────────────────────────────────────────────

pub struct GenerationFlow {
    registry: CapabilityRegistry,
    model: Arc<dyn ModelBackend>,
    prompts: PromptCache,
    on_failure: OnFailure,
}

impl GenerationFlow {
    pub fn new(
        registry: CapabilityRegistry,
        model: Arc<dyn ModelBackend>,
        on_failure: OnFailure,
    ) -> Self {
        Self {
            registry,
            model,
            prompts: PromptCache::new(),
            on_failure,
        }
    }

    pub fn on_failure(&self) -> OnFailure {
        self.on_failure
    }

    /// Breaks free-form input into a titled list of steps.
    pub async fn decompose_task(
        &self,
        user_input: &str,
    ) -> Result<Generated<TaskBreakdown>, GenerationError> {
        self.run(Invocation::SingleTurn(user_input), || {
            TaskBreakdown::fallback(user_input)
        })
        .await
    }

    /// Rewrites text into a calmer, simpler form.
    pub async fn simplify_text(
        &self,
        user_input: &str,
    ) -> Result<Generated<SimplifiedText>, GenerationError> {
        self.run(Invocation::SingleTurn(user_input), SimplifiedText::fallback)
            .await
    }

    /// Produces the next assistant reply for a conversation.
    pub async fn chat_reply(
        &self,
        history: &[ChatTurn],
    ) -> Result<Generated<ChatReply>, GenerationError> {
        self.run(Invocation::Conversation(history), ChatReply::fallback)
            .await
    }

    async fn run<T: OutputContract>(
        &self,
        invocation: Invocation<'_>,
        fallback: impl FnOnce() -> T,
    ) -> Result<Generated<T>, GenerationError> {
        let capability = T::CAPABILITY;

        match self.attempt::<T>(invocation).await {
            Ok(data) => {
                info!(%capability, stage = %Stage::Succeeded, "Generation succeeded");
                Ok(Generated {
                    data,
                    provenance: Provenance::Generated,
                })
            }
            Err(err) => {
                match &err {
                    GenerationError::ModelInvocation(_) => {
                        error!(%capability, kind = err.kind(), "Generation failed: {err}")
                    }
                    _ => warn!(%capability, kind = err.kind(), "Generation failed: {err}"),
                }
                match self.on_failure {
                    OnFailure::Fallback => {
                        info!(%capability, stage = %Stage::FallbackApplied, "Returning fallback result");
                        Ok(Generated {
                            data: fallback(),
                            provenance: Provenance::Fallback,
                        })
                    }
                    OnFailure::Propagate => Err(err),
                }
            }
        }
    }

    async fn attempt<T: OutputContract>(
        &self,
        invocation: Invocation<'_>,
    ) -> Result<T, GenerationError> {
        let settings = self.registry.get(T::CAPABILITY);
        let capability = settings.capability;

        let system_prompt = self.system_prompt(settings)?;
        debug!(%capability, stage = %Stage::PromptBuilt, prompt_len = system_prompt.len());

        let request = build_request(settings, &system_prompt, invocation);
        debug!(%capability, stage = %Stage::Invoking, turns = request.messages.len());
        let raw = self.model.generate(&request).await?;

        debug!(%capability, stage = %Stage::ExtractingResponse, raw_len = raw.len());
        let candidate =
            extract(&raw).map_err(|e| GenerationError::ResponseExtraction(e.to_string()))?;
        let value: Value = serde_json::from_str(candidate).map_err(|e| {
            GenerationError::ResponseExtraction(format!("candidate is not valid JSON: {e}"))
        })?;

        debug!(%capability, stage = %Stage::Validating);
        Ok(contract::validate::<T>(value)?)
    }

    /// Assembled prompt for the capability. A missing or unreadable prompt
    /// directory degrades to an empty prompt unless failures propagate.
    fn system_prompt(&self, settings: &CapabilitySettings) -> Result<Arc<str>, GenerationError> {
        match self
            .prompts
            .get_or_assemble(settings.capability, &settings.prompt_dir)
        {
            Ok(prompt) => Ok(prompt),
            Err(err) if self.on_failure == OnFailure::Fallback => {
                warn!(
                    capability = %settings.capability,
                    kind = "prompt_assembly",
                    "Continuing with empty system prompt: {err}"
                );
                Ok(Arc::from(""))
            }
            Err(err) => Err(err.into()),
        }
    }
}

fn build_request(
    settings: &CapabilitySettings,
    system_prompt: &str,
    invocation: Invocation<'_>,
) -> ModelRequest {
    let (system, messages) = match invocation {
        Invocation::SingleTurn(input) => (
            None,
            vec![ModelMessage::user(build_single_turn_prompt(
                system_prompt,
                input,
                settings.capability,
            ))],
        ),
        Invocation::Conversation(history) => (
            Some(build_chat_system_prompt(system_prompt)),
            build_chat_messages(history),
        ),
    };

    ModelRequest {
        system,
        messages,
        temperature: settings.params.temperature,
        max_output_tokens: settings.params.max_output_tokens,
        safety: settings.safety,
    }
}
