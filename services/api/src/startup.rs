//! Startup helpers shared by the `api` and `tutor` binaries.

use crate::config::Config;
use anyhow::Context;
use cadence_core::{DEFAULT_SYSTEM_PROMPT, OpenAICompatibleClient, PillarSource, Registry};
use std::path::Path;
use tracing::{info, warn};

const SYSTEM_PROMPT_FILE: &str = "system_prompt.md";

/// Initializes the global `tracing` subscriber. The tutor logs to stderr so
/// answers streamed to stdout stay clean.
pub fn init_tracing(config: &Config, to_stderr: bool) {
    let builder = tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339());
    if to_stderr {
        builder.with_writer(std::io::stderr).init();
    } else {
        builder.init();
    }
}

/// Loads the pillar registry from `PILLARS_PATH`, or the embedded pillars.
pub fn load_registry(config: &Config) -> Registry {
    let sources = match &config.pillars_path {
        Some(dir) => PillarSource::from_dir(dir),
        None => PillarSource::builtin(),
    };
    let registry = Registry::load(sources);
    info!(
        pillars = registry.available_pillars().count(),
        terms = registry.term_count(),
        "Knowledge pillars loaded"
    );
    registry
}

/// Reads `system_prompt.md` from the prompts directory. A missing file falls
/// back to the built-in instructions.
pub fn load_system_prompt(prompts_path: &Path) -> anyhow::Result<String> {
    let path = prompts_path.join(SYSTEM_PROMPT_FILE);
    if !path.is_file() {
        warn!(path = %path.display(), "system prompt not found, using built-in instructions");
        return Ok(DEFAULT_SYSTEM_PROMPT.to_string());
    }
    let prompt = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    if prompt.trim().is_empty() {
        warn!(path = %path.display(), "system prompt is empty, using built-in instructions");
        return Ok(DEFAULT_SYSTEM_PROMPT.to_string());
    }
    Ok(prompt.trim().to_string())
}

/// Builds the generation adapter for the configured provider.
pub fn build_adapter(config: &Config) -> OpenAICompatibleClient {
    info!(
        provider = config.provider.name(),
        model = %config.chat_model,
        "Using generation provider"
    );
    OpenAICompatibleClient::new(
        config.openai_config(),
        config.chat_model.clone(),
        config.generation,
        config.generation_timeout,
    )
}
