// Output-format instructions appended to every model call.
// The on-disk fragments describe tone and behaviour; these constants pin the
// JSON shape each output contract expects, so they ship with the code.

use crate::generation::capability::Capability;

/// Single-turn prompt template. Replace: {system_prompt}, {user_input}, {output_instruction}
pub const SINGLE_TURN_TEMPLATE: &str = "{system_prompt}

USER INPUT:
{user_input}

{output_instruction}";

pub const TASKER_OUTPUT_INSTRUCTION: &str = r#"Please break down this task into clear, actionable steps. Return your response as JSON with the following structure:
{
  "title": "A clear, concise title for the task",
  "steps": [
    {
      "number": 1,
      "description": "First step description",
      "done": false
    }
  ],
  "estimatedDuration": "optional estimate like '30 minutes' or '2 hours'",
  "difficulty": "easy|medium|hard"
}

HARD RULES:
1. `title` is 1 to 200 characters
2. Between 1 and 20 steps, numbered from 1
3. Every `description` is a short, concrete action
4. Respond with the JSON object only"#;

pub const PARAGRAPH_OUTPUT_INSTRUCTION: &str = r#"Rewrite the text above so it is calm, clear and easy to read. Return your response as JSON:
{
  "adaptedText": "the rewritten text"
}

Respond with the JSON object only."#;

/// Appended to the chat system prompt, which travels out-of-band.
pub const CHAT_OUTPUT_INSTRUCTION: &str = r#"Always answer with a JSON object of this exact shape and nothing else:
{
  "reply": "your message to the user"
}"#;

/// Neutral opening turn used when a conversation holds no user message.
pub const DEFAULT_GREETING: &str = "Hello";

pub fn output_instruction(capability: Capability) -> &'static str {
    match capability {
        Capability::TaskDecomposition => TASKER_OUTPUT_INSTRUCTION,
        Capability::TextSimplification => PARAGRAPH_OUTPUT_INSTRUCTION,
        Capability::ChatReply => CHAT_OUTPUT_INSTRUCTION,
    }
}

/// Folds system prompt, user input and output instruction into one prompt.
/// An empty system prompt drops its section instead of leaving a blank head.
pub fn build_single_turn_prompt(
    system_prompt: &str,
    user_input: &str,
    capability: Capability,
) -> String {
    let template = if system_prompt.is_empty() {
        SINGLE_TURN_TEMPLATE.replace("{system_prompt}\n\n", "")
    } else {
        SINGLE_TURN_TEMPLATE.replace("{system_prompt}", system_prompt)
    };
    // User text goes in last so placeholders inside it stay literal.
    template
        .replace("{output_instruction}", output_instruction(capability))
        .replace("{user_input}", user_input.trim())
}

/// System instruction for conversational capabilities.
pub fn build_chat_system_prompt(system_prompt: &str) -> String {
    if system_prompt.is_empty() {
        CHAT_OUTPUT_INSTRUCTION.to_string()
    } else {
        format!("{system_prompt}\n\n{CHAT_OUTPUT_INSTRUCTION}")
    }
}
