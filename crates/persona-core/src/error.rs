//! Error types for Persona.

use std::path::PathBuf;

/// Every failure the agent can surface.
#[derive(Debug, thiserror::Error)]
pub enum PersonaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{what} not found at {}", path.display())]
    NotFound { what: String, path: PathBuf },

    #[error("Document error: {0}")]
    Document(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API key missing for provider: {0}")]
    ApiKeyMissing(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Invalid arguments for tool '{tool}': {reason}")]
    ToolArguments { tool: String, reason: String },

    #[error("Model kept requesting tools after {0} rounds")]
    ToolLimit(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl PersonaError {
    /// Upstream failures a caller may retry or show to the user.
    /// Everything else is a startup or storage failure.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Embedding(_)
                | Self::Provider(_)
                | Self::Http(_)
                | Self::ToolArguments { .. }
                | Self::ToolLimit(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PersonaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_names_the_file() {
        let err = PersonaError::NotFound {
            what: "Resume PDF".into(),
            path: PathBuf::from("me/missing.pdf"),
        };
        assert_eq!(err.to_string(), "Resume PDF not found at me/missing.pdf");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_upstream_errors_are_recoverable() {
        assert!(PersonaError::Embedding("timeout".into()).is_recoverable());
        assert!(PersonaError::Provider("500".into()).is_recoverable());
        assert!(!PersonaError::Index("disk full".into()).is_recoverable());
        assert!(!PersonaError::Config("bad".into()).is_recoverable());
    }
}
