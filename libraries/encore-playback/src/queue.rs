//! Ordered track queue with loop, autoplay, and history semantics
//!
//! Structure:
//! - `current`: the track the session is playing right now
//! - `upcoming`: FIFO of tracks still to play
//! - `previous`: stack of already-played tracks (oldest first)
//! - `will_next`: single cached autoplay candidate
//! - `related`: last fetched recommendation set
//!
//! All operations are synchronous and never suspend, so queue integrity is
//! not subject to task interleaving.

use encore_core::Track;
use rand::seq::SliceRandom;
use std::collections::VecDeque;

/// Loop behavior when the queue advances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum LoopMode {
    /// Stop when the queue ends
    #[default]
    Off,

    /// Repeat the current track
    Track,

    /// Cycle the whole queue
    Queue,
}

/// Ordered track list with current-pointer and history
#[derive(Debug, Clone, Default)]
pub struct TrackQueue {
    /// Currently playing track
    current: Option<Track>,

    /// Already-played tracks, oldest first
    previous: Vec<Track>,

    /// Tracks still to play, in order
    upcoming: VecDeque<Track>,

    /// Loop behavior
    loop_mode: LoopMode,

    /// Whether autoplay continuation is enabled
    autoplay: bool,

    /// Cached autoplay candidate for when the queue empties
    will_next: Option<Track>,

    /// Last fetched recommendation set
    related: Vec<Track>,
}

impl TrackQueue {
    /// Create a new empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a track to the end of the upcoming list
    pub fn add(&mut self, track: Track) {
        self.upcoming.push_back(track);
    }

    /// Append several tracks, preserving order
    pub fn add_multiple(&mut self, tracks: impl IntoIterator<Item = Track>) {
        self.upcoming.extend(tracks);
    }

    /// Insert a track at `index` in the upcoming list (clamped to the end)
    pub fn insert(&mut self, track: Track, index: usize) {
        let index = index.min(self.upcoming.len());
        self.upcoming.insert(index, track);
    }

    /// Insert several tracks at `index`, preserving order
    pub fn insert_multiple(&mut self, tracks: impl IntoIterator<Item = Track>, index: usize) {
        let mut index = index.min(self.upcoming.len());
        for track in tracks {
            self.upcoming.insert(index, track);
            index += 1;
        }
    }

    /// Remove the upcoming track at `index`
    pub fn remove(&mut self, index: usize) -> Option<Track> {
        self.upcoming.remove(index)
    }

    /// Advance the queue, returning the track to play
    ///
    /// With loop mode `Track` and `force_skip_loop == false`, re-returns the
    /// current track without advancing. Otherwise pops the head of upcoming,
    /// refilling from history first when loop mode is `Queue` and upcoming is
    /// empty. The outgoing current track is pushed onto history before
    /// replacement. Returns `None` when nothing can be produced — the
    /// terminal-queue signal.
    pub fn next(&mut self, force_skip_loop: bool) -> Option<Track> {
        if self.loop_mode == LoopMode::Track && !force_skip_loop {
            if let Some(current) = &self.current {
                return Some(current.clone());
            }
        }

        let mut next = self.upcoming.pop_front();

        if next.is_none() && self.loop_mode == LoopMode::Queue && !self.previous.is_empty() {
            // Refill upcoming from history in original play order
            self.upcoming.extend(self.previous.drain(..));
            next = self.upcoming.pop_front();
        }

        if let Some(outgoing) = self.current.take() {
            self.previous.push(outgoing);
        }

        self.current = next.clone();
        next
    }

    /// Step back to the most recently played track
    ///
    /// The current track is returned to the head of upcoming so position
    /// is not lost.
    pub fn previous(&mut self) -> Option<Track> {
        let prev = self.previous.pop()?;

        if let Some(current) = self.current.take() {
            self.upcoming.push_front(current);
        }

        self.current = Some(prev.clone());
        Some(prev)
    }

    /// Shuffle the upcoming list; current and history are untouched
    pub fn shuffle(&mut self) {
        let mut tracks: Vec<Track> = self.upcoming.drain(..).collect();
        tracks.shuffle(&mut rand::thread_rng());
        self.upcoming.extend(tracks);
    }

    /// Clear the queue, history, and caches
    pub fn clear(&mut self) {
        self.current = None;
        self.previous.clear();
        self.upcoming.clear();
        self.will_next = None;
        self.related.clear();
    }

    /// Set loop mode, returning the previous mode
    pub fn set_loop_mode(&mut self, mode: LoopMode) -> LoopMode {
        std::mem::replace(&mut self.loop_mode, mode)
    }

    /// Current loop mode
    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    /// Enable or disable autoplay continuation
    pub fn set_autoplay(&mut self, enabled: bool) {
        self.autoplay = enabled;
    }

    /// Whether autoplay continuation is enabled
    pub fn autoplay(&self) -> bool {
        self.autoplay
    }

    /// Cache (or clear) the autoplay candidate
    pub fn set_will_next(&mut self, track: Option<Track>) {
        self.will_next = track;
    }

    /// Take the cached autoplay candidate, leaving the slot empty
    pub fn take_will_next(&mut self) -> Option<Track> {
        self.will_next.take()
    }

    /// Peek at the cached autoplay candidate
    pub fn will_next(&self) -> Option<&Track> {
        self.will_next.as_ref()
    }

    /// Replace the recommendation cache
    pub fn set_related(&mut self, tracks: Vec<Track>) {
        self.related = tracks;
    }

    /// The cached recommendation set
    pub fn related(&self) -> &[Track] {
        &self.related
    }

    /// Currently playing track
    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    /// Clear the current-pointer without touching history
    pub fn clear_current(&mut self) {
        self.current = None;
    }

    /// Upcoming tracks in play order
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.upcoming.iter()
    }

    /// Already-played tracks, oldest first
    pub fn history(&self) -> &[Track] {
        &self.previous
    }

    /// Number of upcoming tracks
    pub fn len(&self) -> usize {
        self.upcoming.len()
    }

    /// Whether the upcoming list is empty
    pub fn is_empty(&self) -> bool {
        self.upcoming.is_empty()
    }
}
