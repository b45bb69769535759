//! Core error types for Encore

use thiserror::Error;

/// Result type alias using `EncoreError`
pub type Result<T> = std::result::Result<T, EncoreError>;

/// Core error type for Encore
#[derive(Error, Debug)]
pub enum EncoreError {
    /// No provider produced any track for a search query
    #[error("No results found for: {0}")]
    NoResults(String),

    /// Every registered provider failed to produce a stream for a track
    #[error("All sources exhausted for track: {0}")]
    AllSourcesExhausted(String),

    /// A bounded operation did not complete in time
    #[error("Timed out while {0}")]
    Timeout(String),

    /// A source provider failed
    #[error("Provider '{name}' error: {message}")]
    Provider {
        /// Provider name as registered
        name: String,
        /// Provider-supplied failure description
        message: String,
    },

    /// An extension hook failed
    #[error("Extension '{name}' error: {message}")]
    Extension {
        /// Extension name as registered
        name: String,
        /// Extension-supplied failure description
        message: String,
    },

    /// Byte-stream level failure (transcoder, pipe, transport hand-off)
    #[error("Stream error: {0}")]
    Stream(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EncoreError {
    /// Build a provider error from anything displayable
    pub fn provider(name: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Provider {
            name: name.into(),
            message: message.to_string(),
        }
    }

    /// Build an extension error from anything displayable
    pub fn extension(name: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Extension {
            name: name.into(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_error_names_track() {
        let err = EncoreError::AllSourcesExhausted("Resonance".to_string());
        assert!(err.to_string().contains("Resonance"));
    }

    #[test]
    fn provider_error_builder() {
        let err = EncoreError::provider("youtube", "rate limited");
        assert_eq!(
            err.to_string(),
            "Provider 'youtube' error: rate limited"
        );
    }
}
