//! Configuration for the playback engine

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a playback session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerOptions {
    /// Initial volume in percent (0-200, default: 100)
    pub volume: u16,

    /// Per-provider search timeout (default: 10s)
    pub search_timeout: Duration,

    /// Per-provider stream-resolution timeout (default: 30s)
    pub stream_timeout: Duration,

    /// Search cache capacity in entries (default: 100)
    pub search_cache_capacity: usize,

    /// Search cache entry time-to-live (default: 5 minutes)
    pub search_cache_ttl: Duration,

    /// Delay before tearing the session down after the queue empties;
    /// `None` disables the leave timer (default: 5 minutes)
    pub leave_on_end: Option<Duration>,

    /// Number of discrete steps in a volume ramp (default: 10)
    pub volume_ramp_steps: u32,

    /// Interval between volume ramp steps (default: 20ms)
    pub volume_ramp_interval: Duration,

    /// How many related tracks to request when prefetching an autoplay
    /// candidate (default: 5)
    pub autoplay_related_limit: usize,

    /// Transcoder binary invoked for filters and seeking, resolved from
    /// `PATH` (default: "ffmpeg")
    pub transcoder: String,

    /// TTS interrupt settings
    pub tts: TtsOptions,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            volume: 100,
            search_timeout: Duration::from_secs(10),
            stream_timeout: Duration::from_secs(30),
            search_cache_capacity: 100,
            search_cache_ttl: Duration::from_secs(300),
            leave_on_end: Some(Duration::from_secs(300)),
            volume_ramp_steps: 10,
            volume_ramp_interval: Duration::from_millis(20),
            autoplay_related_limit: 5,
            transcoder: "ffmpeg".to_string(),
            tts: TtsOptions::default(),
        }
    }
}

/// Settings for the TTS interrupt channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsOptions {
    /// Whether TTS interrupts are enabled (default: true)
    pub enabled: bool,

    /// Hard cap on a TTS announcement when the track declares no duration
    /// (default: 30s)
    pub max_duration: Duration,

    /// Slack added on top of a declared TTS duration before the wait is
    /// cut off (default: 2s)
    pub slack: Duration,

    /// Name of the dedicated speech-synthesis provider (default: "tts")
    pub provider: String,

    /// Query prefix that diverts a play request into the TTS flow
    /// (default: "tts:")
    pub query_prefix: String,
}

impl Default for TtsOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            max_duration: Duration::from_secs(30),
            slack: Duration::from_secs(2),
            provider: "tts".to_string(),
            query_prefix: "tts:".to_string(),
        }
    }
}
