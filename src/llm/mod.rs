//! Model API client used by the agent runtime

mod error;
mod openai;
mod types;

pub use error::LlmError;
pub use openai::{OpenAiClient, OPENAI_API_BASE};
pub use types::*;

/// Provider display names mapped to model ids
pub const MODEL_OPTIONS: &[(&str, &str)] = &[("OpenAI", "gpt-4o")];

/// Look up a provider by display name (case-insensitive), returning its
/// canonical name and model id
pub fn find_provider(provider: &str) -> Option<(&'static str, &'static str)> {
    MODEL_OPTIONS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(provider))
        .copied()
}
