//! Encore - Playback Orchestration
//!
//! Per-session playback orchestration for voice-chat bots.
//!
//! This crate provides:
//! - Player session state machine (play/pause/skip/seek/loop/TTS-interrupt)
//! - Track queue with loop, autoplay, and history semantics
//! - Provider registry with ordered, exhaustive stream fallback
//! - Extension hook chains around every play request
//! - Filter chain driving an external ffmpeg transcoder
//! - TTS interrupt channel on a dedicated second sink
//! - Session registry keyed by guild
//!
//! # Architecture
//!
//! `encore-playback` knows nothing about concrete audio sources or voice
//! transports:
//! - Sources are [`SourceProvider`] implementations registered per session
//! - The voice transport is an [`AudioSink`] plus [`VoiceConnection`] pair
//! - Cross-cutting behavior plugs in as [`PlayerExtension`] hooks
//!
//! # Example
//!
//! ```rust,no_run
//! use encore_playback::{PlayQuery, PlayerManager, PlayerOptions};
//! use encore_core::GuildId;
//!
//! # async fn example(
//! #     primary: std::sync::Arc<dyn encore_playback::AudioSink>,
//! #     tts: std::sync::Arc<dyn encore_playback::AudioSink>,
//! # ) -> encore_playback::Result<()> {
//! let manager = PlayerManager::new(PlayerOptions::default());
//! let player = manager.create(GuildId::new(81384788765712384), primary, tts);
//!
//! // player.plugins().register(...);
//! let outcome = player
//!     .play(PlayQuery::Search("never gonna give you up".to_string()), Some("user"))
//!     .await?;
//! assert!(outcome.success);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod extensions;
pub mod filters;
pub mod manager;
pub mod player;
pub mod plugins;
pub mod queue;
pub mod sink;
pub mod volume;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::SearchCache;
pub use config::{PlayerOptions, TtsOptions};
pub use error::{PlayerError, Result};
pub use events::{EventBus, PlayerEvent};
pub use extensions::{
    ExtensionContext, ExtensionManager, HookFlow, PlayOutcome, PlayRequest, PlayResponse,
    PlayerExtension,
};
pub use filters::FilterManager;
pub use manager::PlayerManager;
pub use player::{PlayQuery, Player};
pub use plugins::{PluginManager, RelatedOptions, SourceProvider};
pub use queue::{LoopMode, TrackQueue};
pub use sink::{AudioResource, AudioSink, SinkId, SinkState, VoiceConnection};
pub use volume::{VolumeControl, MAX_VOLUME};
