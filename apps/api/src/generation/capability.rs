//! Capability Registry — maps each capability to its prompt directory and
//! model invocation parameters. Built once at startup from `Config`.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::llm_client::SafetySettings;

/// The fixed set of AI-backed transformations offered by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    TaskDecomposition,
    TextSimplification,
    ChatReply,
}

impl Capability {
    pub const ALL: [Capability; 3] = [
        Capability::TaskDecomposition,
        Capability::TextSimplification,
        Capability::ChatReply,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::TaskDecomposition => "task-decomposition",
            Capability::TextSimplification => "text-simplification",
            Capability::ChatReply => "chat-reply",
        }
    }

    /// Name of the prompt fragment directory under the prompts root.
    pub fn prompt_dir_name(&self) -> &'static str {
        match self {
            Capability::TaskDecomposition => "tasker",
            Capability::TextSimplification => "paragraph",
            Capability::ChatReply => "chatbot",
        }
    }

    fn index(&self) -> usize {
        match self {
            Capability::TaskDecomposition => 0,
            Capability::TextSimplification => 1,
            Capability::ChatReply => 2,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Temperature and token ceiling for one capability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl GenerationParams {
    pub fn defaults_for(capability: Capability) -> Self {
        match capability {
            Capability::TaskDecomposition => Self {
                temperature: 0.7,
                max_output_tokens: 2048,
            },
            Capability::TextSimplification => Self {
                temperature: 0.5,
                max_output_tokens: 4096,
            },
            Capability::ChatReply => Self {
                temperature: 0.8,
                max_output_tokens: 2048,
            },
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("{capability}: temperature {value} is outside [0, 1]")]
    Temperature { capability: Capability, value: f32 },

    #[error("{capability}: max output tokens must be positive")]
    TokenCeiling { capability: Capability },
}

/// Resolved, immutable configuration for one capability.
#[derive(Debug, Clone)]
pub struct CapabilitySettings {
    pub capability: Capability,
    pub prompt_dir: PathBuf,
    pub params: GenerationParams,
    pub safety: SafetySettings,
}

#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    settings: [CapabilitySettings; 3],
}

impl CapabilityRegistry {
    /// Builds the registry. `params` supplies per-capability overrides; any
    /// capability it returns `None` for keeps its defaults.
    pub fn new(
        prompts_root: &Path,
        safety: SafetySettings,
        params: impl Fn(Capability) -> Option<GenerationParams>,
    ) -> Result<Self, RegistryError> {
        let build = |capability: Capability| -> Result<CapabilitySettings, RegistryError> {
            let params =
                params(capability).unwrap_or_else(|| GenerationParams::defaults_for(capability));
            if !(0.0..=1.0).contains(&params.temperature) {
                return Err(RegistryError::Temperature {
                    capability,
                    value: params.temperature,
                });
            }
            if params.max_output_tokens == 0 {
                return Err(RegistryError::TokenCeiling { capability });
            }
            Ok(CapabilitySettings {
                capability,
                prompt_dir: prompts_root.join(capability.prompt_dir_name()),
                params,
                safety,
            })
        };

        let [tasker, paragraph, chatbot] = Capability::ALL.map(build);
        Ok(Self {
            settings: [tasker?, paragraph?, chatbot?],
        })
    }

    /// Registry with default parameters and safety thresholds.
    #[cfg(test)]
    pub fn with_defaults(prompts_root: &Path) -> Self {
        Self {
            settings: Capability::ALL.map(|capability| CapabilitySettings {
                capability,
                prompt_dir: prompts_root.join(capability.prompt_dir_name()),
                params: GenerationParams::defaults_for(capability),
                safety: SafetySettings::default(),
            }),
        }
    }

    pub fn get(&self, capability: Capability) -> &CapabilitySettings {
        &self.settings[capability.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &CapabilitySettings> {
        self.settings.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::SafetyThreshold;

    #[test]
    fn test_defaults_resolve_prompt_dirs() {
        let registry = CapabilityRegistry::with_defaults(Path::new("/srv/prompts"));
        assert_eq!(
            registry.get(Capability::TaskDecomposition).prompt_dir,
            PathBuf::from("/srv/prompts/tasker")
        );
        assert_eq!(
            registry.get(Capability::ChatReply).prompt_dir,
            PathBuf::from("/srv/prompts/chatbot")
        );
    }

    #[test]
    fn test_default_params_per_capability() {
        let registry = CapabilityRegistry::with_defaults(Path::new("prompts"));
        let para = registry.get(Capability::TextSimplification).params;
        assert!((para.temperature - 0.5).abs() < f32::EPSILON);
        assert_eq!(para.max_output_tokens, 4096);
        assert_eq!(
            registry.get(Capability::ChatReply).params.max_output_tokens,
            2048
        );
    }

    #[test]
    fn test_overrides_apply_to_named_capability_only() {
        let registry = CapabilityRegistry::new(Path::new("p"), SafetySettings::default(), |c| {
            (c == Capability::ChatReply).then_some(GenerationParams {
                temperature: 0.3,
                max_output_tokens: 512,
            })
        })
        .unwrap();
        assert_eq!(registry.get(Capability::ChatReply).params.max_output_tokens, 512);
        assert_eq!(
            registry.get(Capability::TaskDecomposition).params,
            GenerationParams::defaults_for(Capability::TaskDecomposition)
        );
    }

    #[test]
    fn test_rejects_temperature_out_of_range() {
        let err = CapabilityRegistry::new(Path::new("p"), SafetySettings::default(), |c| {
            (c == Capability::TaskDecomposition).then_some(GenerationParams {
                temperature: 1.5,
                max_output_tokens: 100,
            })
        })
        .unwrap_err();
        assert!(matches!(err, RegistryError::Temperature { .. }));
    }

    #[test]
    fn test_rejects_zero_token_ceiling() {
        let err = CapabilityRegistry::new(Path::new("p"), SafetySettings::default(), |_| {
            Some(GenerationParams {
                temperature: 0.2,
                max_output_tokens: 0,
            })
        })
        .unwrap_err();
        assert_eq!(
            err,
            RegistryError::TokenCeiling {
                capability: Capability::TaskDecomposition
            }
        );
    }

    #[test]
    fn test_safety_is_carried_into_every_capability() {
        let safety = SafetySettings {
            hate_speech: SafetyThreshold::BlockLowAndAbove,
            ..Default::default()
        };
        let registry = CapabilityRegistry::new(Path::new("p"), safety, |_| None).unwrap();
        assert!(registry.iter().all(|s| s.safety == safety));
    }
}
