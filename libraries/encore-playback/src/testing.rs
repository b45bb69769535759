//! Test doubles for the voice transport and source providers
//!
//! Only compiled for tests; real transports and providers are external
//! collaborators.

use crate::error::{PlayerError, Result};
use crate::plugins::SourceProvider;
use crate::sink::{AudioResource, AudioSink, SinkId, SinkState, VoiceConnection};
use async_trait::async_trait;
use encore_core::{AudioStream, SearchResult, StreamInfo, StreamKind, Track};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::watch;

/// In-memory sink recording everything the player hands it
pub(crate) struct FakeSink {
    state_tx: watch::Sender<SinkState>,
    gains: Mutex<Vec<f32>>,
    played: Mutex<Vec<Track>>,
    fail_next_play: AtomicBool,
}

impl FakeSink {
    pub(crate) fn new() -> Self {
        let (state_tx, _) = watch::channel(SinkState::Idle);
        Self {
            state_tx,
            gains: Mutex::new(Vec::new()),
            played: Mutex::new(Vec::new()),
            fail_next_play: AtomicBool::new(false),
        }
    }

    /// Make the next `play` call fail
    pub(crate) fn fail_next_play(&self) {
        self.fail_next_play.store(true, Ordering::SeqCst);
    }

    /// Gains written via `set_gain`, in order
    pub(crate) fn gains(&self) -> Vec<f32> {
        self.gains.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Tracks handed to this sink, in order
    pub(crate) fn played(&self) -> Vec<Track> {
        self.played
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Simulate the loaded track finishing naturally
    pub(crate) fn finish_current(&self) {
        let _ = self.state_tx.send(SinkState::Idle);
    }
}

#[async_trait]
impl AudioSink for FakeSink {
    async fn play(&self, resource: AudioResource) -> Result<()> {
        if self.fail_next_play.swap(false, Ordering::SeqCst) {
            return Err(PlayerError::Connection("sink refused resource".to_string()));
        }

        self.played
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(resource.track);
        let _ = self.state_tx.send(SinkState::Playing);
        Ok(())
    }

    fn pause(&self) -> bool {
        if *self.state_tx.borrow() == SinkState::Playing {
            let _ = self.state_tx.send(SinkState::Paused);
            true
        } else {
            false
        }
    }

    fn resume(&self) -> bool {
        if *self.state_tx.borrow() == SinkState::Paused {
            let _ = self.state_tx.send(SinkState::Playing);
            true
        } else {
            false
        }
    }

    fn stop(&self) -> bool {
        let _ = self.state_tx.send(SinkState::Idle);
        true
    }

    fn set_gain(&self, gain: f32) {
        self.gains
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(gain);
    }

    fn state(&self) -> SinkState {
        *self.state_tx.borrow()
    }

    fn watch_state(&self) -> watch::Receiver<SinkState> {
        self.state_tx.subscribe()
    }
}

/// Connection double tracking subscription swaps
pub(crate) struct FakeConnection {
    subscribed: Mutex<SinkId>,
    disconnected: AtomicBool,
    swaps: Mutex<Vec<SinkId>>,
}

impl FakeConnection {
    pub(crate) fn new() -> Self {
        Self {
            subscribed: Mutex::new(SinkId::Primary),
            disconnected: AtomicBool::new(false),
            swaps: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    /// Subscription swaps in the order they happened
    pub(crate) fn swaps(&self) -> Vec<SinkId> {
        self.swaps.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl VoiceConnection for FakeConnection {
    fn subscribe(&self, sink: SinkId) {
        *self.subscribed.lock().unwrap_or_else(|e| e.into_inner()) = sink;
        self.swaps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(sink);
    }

    fn subscribed(&self) -> SinkId {
        *self.subscribed.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }
}

/// Programmable provider double
pub(crate) struct TestProvider {
    name: String,
    search_tracks: Mutex<Vec<Track>>,
    stream_failures: AtomicUsize,
    search_calls: AtomicUsize,
    stream_calls: AtomicUsize,
    related: Mutex<Vec<Track>>,
}

impl TestProvider {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            search_tracks: Mutex::new(Vec::new()),
            stream_failures: AtomicUsize::new(0),
            search_calls: AtomicUsize::new(0),
            stream_calls: AtomicUsize::new(0),
            related: Mutex::new(Vec::new()),
        }
    }

    /// Serve these tracks for every search
    pub(crate) fn serve(self, tracks: Vec<Track>) -> Self {
        *self.search_tracks.lock().unwrap() = tracks;
        self
    }

    /// Fail the first `count` stream resolutions
    pub(crate) fn fail_streams(self, count: usize) -> Self {
        self.stream_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Serve these tracks for related-track lookups
    pub(crate) fn with_related(self, tracks: Vec<Track>) -> Self {
        *self.related.lock().unwrap() = tracks;
        self
    }

    pub(crate) fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn track(&self, title: &str) -> Track {
        Track::new(
            title,
            format!("https://{}.example.com/{}", self.name, title),
            &self.name,
        )
    }
}

#[async_trait]
impl SourceProvider for TestProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_handle(&self, query: &str) -> bool {
        query.contains(&format!("https://{}.example.com", self.name))
    }

    async fn search(&self, _query: &str, _requester: Option<&str>) -> encore_core::Result<SearchResult> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let tracks = self.search_tracks.lock().unwrap().clone();
        Ok(SearchResult {
            tracks,
            playlist: None,
        })
    }

    async fn get_stream(&self, _track: &Track) -> encore_core::Result<StreamInfo> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);

        let remaining = self.stream_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.stream_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(encore_core::EncoreError::provider(&self.name, "unavailable"));
        }

        Ok(StreamInfo::new(
            AudioStream::new(std::io::Cursor::new(vec![0u8; 16])),
            StreamKind::OggOpus,
        ))
    }

    fn supports_related(&self) -> bool {
        !self.related.lock().unwrap().is_empty()
    }

    async fn get_related(
        &self,
        _url: &str,
        options: crate::plugins::RelatedOptions,
    ) -> encore_core::Result<Vec<Track>> {
        let related = self.related.lock().unwrap().clone();
        let limit = if options.limit == 0 {
            related.len()
        } else {
            options.limit
        };
        Ok(related.into_iter().take(limit).collect())
    }
}
