//! Error types for the playback engine

use encore_core::EncoreError;
use thiserror::Error;

/// Result type for player operations
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Playback engine errors
#[derive(Debug, Error)]
pub enum PlayerError {
    /// The session has been destroyed; no further operations are valid
    #[error("Player for guild {0} has been destroyed")]
    Destroyed(encore_core::GuildId),

    /// No voice connection is attached to the session
    #[error("No voice connection attached")]
    NotConnected,

    /// Volume outside the accepted 0-200 range
    #[error("Invalid volume {0}: must be between 0 and 200")]
    InvalidVolume(u16),

    /// Queue is empty and nothing can be produced
    #[error("Queue is empty")]
    QueueEmpty,

    /// No track is currently playing
    #[error("No track is currently playing")]
    NothingPlaying,

    /// Index outside the upcoming-queue bounds
    #[error("Index out of bounds: {0}")]
    IndexOutOfBounds(usize),

    /// External transcoder process failure
    #[error("Transcoder error: {0}")]
    Transcoder(String),

    /// Voice transport failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// Error bubbled up from resolution (providers, extensions, streams)
    #[error(transparent)]
    Resolution(#[from] EncoreError),
}
