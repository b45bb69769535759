//! Session events
//!
//! Event-based communication for host applications. Events are emitted at
//! key points: queue mutations, track transitions, state changes, filter
//! changes, TTS interrupts, and failures. Payloads carry cloned track
//! snapshots rather than live handles, so subscribers cannot reach back
//! into session state.

use encore_core::{Playlist, Track};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events emitted by a playback session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PlayerEvent {
    /// A track was appended to the queue
    QueueAdd {
        /// The enqueued track
        track: Track,
    },

    /// A batch of tracks (playlist) was appended to the queue
    QueueAddBatch {
        /// Number of tracks enqueued
        count: usize,
        /// Playlist descriptor when the batch came from a playlist
        playlist: Option<Playlist>,
    },

    /// A track was removed from the queue
    QueueRemove {
        /// The removed track
        track: Track,
    },

    /// A track is about to start (resource being built)
    WillPlay {
        /// The upcoming track
        track: Track,
    },

    /// A track started playing
    TrackStart {
        /// The now-playing track
        track: Track,
    },

    /// A track finished or was skipped
    TrackEnd {
        /// The finished track
        track: Track,
    },

    /// The queue has been exhausted
    QueueEnd,

    /// Playback paused
    Pause,

    /// Playback resumed
    Resume,

    /// Playback stopped and queue cleared
    Stop,

    /// The session was destroyed
    Destroy,

    /// Volume changed
    VolumeChange {
        /// Previous volume in percent
        from: u16,
        /// New volume in percent
        to: u16,
    },

    /// A filter was applied
    FilterApplied {
        /// Filter name
        name: String,
    },

    /// A filter was removed
    FilterRemoved {
        /// Filter name
        name: String,
    },

    /// All filters were cleared
    FiltersCleared,

    /// A TTS interrupt began
    TtsStart {
        /// The TTS track
        track: Track,
    },

    /// A TTS interrupt finished (successfully or not)
    TtsEnd {
        /// The TTS track
        track: Track,
    },

    /// A recoverable playback failure
    Error {
        /// Track involved, when known
        track: Option<Track>,
        /// Failure description
        message: String,
    },

    /// A voice transport failure (session will be destroyed)
    ConnectionError {
        /// Failure description
        message: String,
    },

    /// Diagnostic chatter (fallback attempts, cache hits, ...)
    Debug {
        /// Diagnostic message
        message: String,
    },
}

/// Broadcast bus distributing session events to subscribers
///
/// Emission is lossy: when no subscriber is attached, events are dropped
/// silently so the orchestrator never blocks on observers.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlayerEvent>,
}

impl EventBus {
    /// Create a new bus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all subscribers, ignoring the no-subscriber case
    pub fn emit(&self, event: PlayerEvent) {
        let _ = self.tx.send(event);
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(128)
    }
}
