//! Track and search-result domain types

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// A resolved, playable unit of audio metadata
///
/// Created by a provider at search time and copied by value into queue
/// entries. Immutable by convention: nothing mutates a track after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Unique track identifier (provider-supplied or generated)
    pub id: String,

    /// Track title
    pub title: String,

    /// Source URL the track was resolved from
    pub url: String,

    /// Track duration (zero when unknown)
    pub duration: Duration,

    /// Identifier of the user who requested the track
    pub requested_by: Option<String>,

    /// Name of the provider that produced this track
    pub source: String,

    /// Free-form provider metadata (thumbnails, view counts, ...)
    pub metadata: serde_json::Value,
}

impl Track {
    /// Create a new track with minimal metadata
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            url: url.into(),
            duration: Duration::ZERO,
            requested_by: None,
            source: source.into(),
            metadata: serde_json::Value::Null,
        }
    }

    /// Set the track duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Set the requesting user
    pub fn with_requester(mut self, requester: impl Into<String>) -> Self {
        self.requested_by = Some(requester.into());
        self
    }

    /// Attach free-form provider metadata
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Whether the declared duration is known
    pub fn has_duration(&self) -> bool {
        !self.duration.is_zero()
    }
}

/// Playlist descriptor attached to a multi-track search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    /// Playlist name
    pub name: String,

    /// Playlist URL
    pub url: String,

    /// Thumbnail URL (optional)
    pub thumbnail: Option<String>,
}

/// Result of a search call: tracks plus optional playlist descriptor
///
/// Transient; produced per search call and optionally cached by the
/// orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Resolved tracks, in provider order
    pub tracks: Vec<Track>,

    /// Playlist descriptor when the query resolved to a playlist
    pub playlist: Option<Playlist>,
}

impl SearchResult {
    /// Empty result (no tracks found)
    pub fn empty() -> Self {
        Self {
            tracks: Vec::new(),
            playlist: None,
        }
    }

    /// Result holding a single track
    pub fn single(track: Track) -> Self {
        Self {
            tracks: vec![track],
            playlist: None,
        }
    }

    /// Result holding a playlist of tracks
    pub fn playlist(tracks: Vec<Track>, playlist: Playlist) -> Self {
        Self {
            tracks,
            playlist: Some(playlist),
        }
    }

    /// Whether the result carries no tracks
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Whether the result describes a playlist
    pub fn is_playlist(&self) -> bool {
        self.playlist.is_some()
    }

    /// First (lead) track of the result
    pub fn first(&self) -> Option<&Track> {
        self.tracks.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_builder() {
        let track = Track::new("Song", "https://example.com/a", "youtube")
            .with_duration(Duration::from_secs(180))
            .with_requester("user#1");

        assert_eq!(track.title, "Song");
        assert_eq!(track.source, "youtube");
        assert_eq!(track.duration, Duration::from_secs(180));
        assert_eq!(track.requested_by.as_deref(), Some("user#1"));
        assert!(track.has_duration());
        assert!(!track.id.is_empty());
    }

    #[test]
    fn unknown_duration() {
        let track = Track::new("Song", "https://example.com/a", "youtube");
        assert!(!track.has_duration());
    }

    #[test]
    fn search_result_helpers() {
        let result = SearchResult::empty();
        assert!(result.is_empty());
        assert!(!result.is_playlist());
        assert!(result.first().is_none());

        let track = Track::new("Song", "https://example.com/a", "youtube");
        let result = SearchResult::single(track.clone());
        assert_eq!(result.first().unwrap().id, track.id);

        let result = SearchResult::playlist(
            vec![track],
            Playlist {
                name: "Mix".to_string(),
                url: "https://example.com/list".to_string(),
                thumbnail: None,
            },
        );
        assert!(result.is_playlist());
    }
}
