//! Voice transport boundary
//!
//! The voice connection and audio sinks are external collaborators; this
//! module only fixes their contracts. A sink accepts exactly one byte-stream
//! at a time and reports discrete state transitions which the orchestrator
//! treats as its queue-advancement trigger.

use crate::error::Result;
use async_trait::async_trait;
use encore_core::{StreamInfo, Track};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Discrete playback state reported by an audio sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SinkState {
    /// Nothing loaded or playback finished
    Idle,

    /// Resource loaded, waiting for data
    Buffering,

    /// Actively transmitting audio
    Playing,

    /// Paused by the orchestrator
    Paused,

    /// Paused by the transport (no subscriber attached)
    AutoPaused,
}

/// Identifies which sink feeds the voice transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkId {
    /// Main music output
    Primary,

    /// Dedicated TTS interrupt output
    Tts,
}

/// A built audio resource ready to hand to a sink
///
/// Exclusively owned by the player; replaced wholesale, never mutated.
#[derive(Debug)]
pub struct AudioResource {
    /// The track this resource plays
    pub track: Track,

    /// Resolved (and possibly filtered) byte-stream
    pub stream: StreamInfo,

    /// Initial linear gain applied by the sink
    pub gain: f32,
}

/// One continuous audio output accepted by the voice transport
///
/// Implementations encode and transmit the byte-stream; the orchestrator
/// only loads resources and observes state transitions.
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Load a resource and begin playback
    async fn play(&self, resource: AudioResource) -> Result<()>;

    /// Pause playback; returns false when nothing was playing
    fn pause(&self) -> bool;

    /// Resume paused playback; returns false when nothing was paused
    fn resume(&self) -> bool;

    /// Stop playback and drop the loaded resource
    fn stop(&self) -> bool;

    /// Adjust output gain mid-stream
    fn set_gain(&self, gain: f32);

    /// Current sink state
    fn state(&self) -> SinkState;

    /// Watch channel following sink state transitions
    fn watch_state(&self) -> watch::Receiver<SinkState>;
}

/// An established voice-room connection
///
/// Accepts one subscribed sink at a time; swapping the subscription is how
/// the TTS interrupt borrows the output without touching the primary sink's
/// loaded resource.
pub trait VoiceConnection: Send + Sync {
    /// Route the transport to the given sink
    fn subscribe(&self, sink: SinkId);

    /// Currently subscribed sink
    fn subscribed(&self) -> SinkId;

    /// Tear the connection down
    fn disconnect(&self);
}

/// Convert a volume percentage (0-200) to linear sink gain
pub(crate) fn percent_to_gain(percent: u16) -> f32 {
    f32::from(percent) / 100.0
}
