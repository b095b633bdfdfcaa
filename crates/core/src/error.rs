//! Error kinds surfaced by the tutoring core.
//!
//! Classification is deliberately absent here: it always produces a value.

use std::path::PathBuf;

/// A single pillar source failed to load. Never fatal to the registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryLoadError {
    #[error("failed to read pillar source {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed pillar data in {origin}: {source}")]
    Malformed {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("pillar '{0}' has no usable terms")]
    Empty(String),
    #[error("pillar '{0}' is already registered")]
    Duplicate(String),
}

/// Failures of the generation backend. Abort the current submission only.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation backend unavailable: {0}")]
    Unavailable(String),
    #[error("generation request failed: {0}")]
    Request(String),
    #[error("generation stream failed: {0}")]
    Stream(String),
    #[error("generation timed out after {0} seconds")]
    Timeout(u64),
    #[error("generation backend returned an empty response")]
    EmptyResponse,
}

/// Failures of the speech rendering capability. Always reported softly.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("speech rendering unavailable: {0}")]
    Unavailable(String),
    #[error("speech synthesis failed: {0}")]
    Synthesis(String),
    #[error("audio playback failed: {0}")]
    Playback(String),
    #[error("failed to save audio to {path}: {reason}")]
    Save { path: PathBuf, reason: String },
}

/// Errors returned from a session submission.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("message is empty")]
    EmptyInput,
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_wraps_generation_error() {
        let err: SessionError = GenerationError::Timeout(30).into();
        assert!(matches!(err, SessionError::Generation(GenerationError::Timeout(30))));
        assert_eq!(err.to_string(), "generation timed out after 30 seconds");
    }

    #[test]
    fn test_registry_error_display() {
        let err = RegistryLoadError::Empty("performance-technique".to_string());
        assert_eq!(
            err.to_string(),
            "pillar 'performance-technique' has no usable terms"
        );
    }
}
