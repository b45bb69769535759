//! Encore Core
//!
//! Platform-agnostic domain types and error handling for the Encore
//! playback orchestrator.
//!
//! This crate defines:
//! - **Domain Types**: `Track`, `SearchResult`, `StreamInfo`, `AudioFilter`
//! - **Identifiers**: `GuildId` (one playback session per guild)
//! - **Error Handling**: Unified `EncoreError` and `Result` types
//!
//! The orchestration engine itself lives in `encore-playback`; concrete
//! source providers and voice transports are external collaborators that
//! exchange these types across trait boundaries.
//!
//! # Example
//!
//! ```rust
//! use encore_core::{GuildId, Track, SearchResult};
//! use std::time::Duration;
//!
//! let track = Track::new("Resonance", "https://example.com/watch?v=abc", "youtube")
//!     .with_duration(Duration::from_secs(192))
//!     .with_requester("user#1234");
//!
//! let result = SearchResult::single(track);
//! assert!(!result.is_playlist());
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod types;

// Re-export commonly used types
pub use error::{EncoreError, Result};
pub use types::{
    AudioFilter, AudioStream, FilterCategory, GuildId, Playlist, SearchResult, StreamInfo,
    StreamKind, Track,
};
