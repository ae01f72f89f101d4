//! Output Contracts — the structured result each capability must produce,
//! plus the deterministic fallback that satisfies the same contract.
//!
//! Validation fails closed: one out-of-bounds field rejects the whole object.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::generation::capability::Capability;

pub const TITLE_MAX_CHARS: usize = 200;
pub const MAX_STEPS: usize = 20;

pub const DEFAULT_TASK_TITLE: &str = "New Task";
pub const FALLBACK_STEP: &str = "Process your request";
pub const FALLBACK_ADAPTED_TEXT: &str = "I am here to help you understand this clearly.";
pub const FALLBACK_REPLY: &str =
    "I'm here with you. Can you tell me a bit more about what's going on?";

#[derive(Debug, Error)]
pub enum ContractViolation {
    #[error("result has the wrong shape: {0}")]
    Shape(#[from] serde_json::Error),

    #[error("field `{field}` {reason}")]
    Field { field: String, reason: String },
}

fn violation(field: impl Into<String>, reason: impl Into<String>) -> ContractViolation {
    ContractViolation::Field {
        field: field.into(),
        reason: reason.into(),
    }
}

/// A capability's structured result type.
pub trait OutputContract: Serialize + DeserializeOwned + Send + Sync + 'static {
    const CAPABILITY: Capability;

    /// Checks every constraint that serde's type mapping cannot express.
    fn check(&self) -> Result<(), ContractViolation>;
}

/// Maps a parsed candidate onto `T` and enforces its constraints.
pub fn validate<T: OutputContract>(candidate: Value) -> Result<T, ContractViolation> {
    let result: T = serde_json::from_value(candidate)?;
    result.check()?;
    Ok(result)
}

// ────────────────────────────────────────────────────────────────────────────
// Task decomposition
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStep {
    /// Signed so that a zero or negative number is a contract violation
    /// rather than a shape error.
    #[serde(alias = "stepNumber")]
    pub number: i64,
    pub description: String,
    #[serde(default, alias = "completed")]
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskBreakdown {
    #[serde(alias = "taskTitle")]
    pub title: String,
    pub steps: Vec<TaskStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
}

impl TaskBreakdown {
    /// Echoes the user's input as the title with one generic step.
    pub fn fallback(user_input: &str) -> Self {
        let input = user_input.trim();
        let title = if input.is_empty() {
            DEFAULT_TASK_TITLE.to_string()
        } else {
            input.chars().take(TITLE_MAX_CHARS).collect::<String>().trim_end().to_string()
        };
        Self {
            title,
            steps: vec![TaskStep {
                number: 1,
                description: FALLBACK_STEP.to_string(),
                done: false,
            }],
            estimated_duration: None,
            difficulty: None,
        }
    }
}

impl OutputContract for TaskBreakdown {
    const CAPABILITY: Capability = Capability::TaskDecomposition;

    fn check(&self) -> Result<(), ContractViolation> {
        let title_len = self.title.chars().count();
        if self.title.trim().is_empty() {
            return Err(violation("title", "must not be empty"));
        }
        if title_len > TITLE_MAX_CHARS {
            return Err(violation(
                "title",
                format!("is {title_len} chars, max {TITLE_MAX_CHARS}"),
            ));
        }

        if self.steps.is_empty() {
            return Err(violation("steps", "must contain at least one step"));
        }
        if self.steps.len() > MAX_STEPS {
            return Err(violation(
                "steps",
                format!("has {} items, max {MAX_STEPS}", self.steps.len()),
            ));
        }

        for (i, step) in self.steps.iter().enumerate() {
            if step.number <= 0 {
                return Err(violation(
                    format!("steps[{i}].number"),
                    format!("must be positive, got {}", step.number),
                ));
            }
            if step.description.trim().is_empty() {
                return Err(violation(
                    format!("steps[{i}].description"),
                    "must not be empty",
                ));
            }
        }

        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Text simplification
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimplifiedText {
    #[serde(alias = "adapted_text")]
    pub adapted_text: String,
}

impl SimplifiedText {
    pub fn fallback() -> Self {
        Self {
            adapted_text: FALLBACK_ADAPTED_TEXT.to_string(),
        }
    }
}

impl OutputContract for SimplifiedText {
    const CAPABILITY: Capability = Capability::TextSimplification;

    fn check(&self) -> Result<(), ContractViolation> {
        if self.adapted_text.trim().is_empty() {
            return Err(violation("adaptedText", "must not be empty"));
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Chat reply
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
}

impl ChatReply {
    pub fn fallback() -> Self {
        Self {
            reply: FALLBACK_REPLY.to_string(),
        }
    }
}

impl OutputContract for ChatReply {
    const CAPABILITY: Capability = Capability::ChatReply;

    fn check(&self) -> Result<(), ContractViolation> {
        if self.reply.trim().is_empty() {
            return Err(violation("reply", "must not be empty"));
        }
        Ok(())
    }
}
