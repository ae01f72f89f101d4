// Structured generation: prompt assembly, model invocation, response
// extraction, contract validation and fallback.
// All model calls go through llm_client — no direct provider calls here.

pub mod assembler;
pub mod capability;
pub mod contract;
pub mod extractor;
pub mod flow;
pub mod handlers;
pub mod prompts;
