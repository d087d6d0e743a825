//! Chat subsystem: the researcher assistant and its prompt builder.

pub mod prompt;
pub mod researcher;

pub use researcher::{ChatMessage, Conversation, Reply, Researcher, ResearcherProfile, parse_reply};

use crate::config::Config;
use crate::error::AppError;
use crate::llm::providers;

/// Build the configured provider and a researcher on top of it.
pub fn build(config: &Config) -> Result<Researcher, AppError> {
    let provider = providers::build(&config.llm, config.llm_api_key.clone())
        .map_err(|e| AppError::Llm(e.to_string()))?;
    tracing::info!(provider = provider.name(), "llm provider ready");
    let profile = ResearcherProfile::general(config.chat.assistant_name.clone());
    Ok(Researcher::new(profile, provider, &config.chat.prompts_dir))
}
