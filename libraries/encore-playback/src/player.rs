//! Per-session playback orchestrator
//!
//! A [`Player`] owns everything one voice room needs:
//! - the track queue with loop, autoplay, and history semantics
//! - the provider registry and its fallback resolution
//! - the extension hook chains around every play request
//! - the filter chain and external transcoder
//! - the primary music sink plus a dedicated TTS interrupt sink
//!
//! Queue advancement is event-driven: a watcher task follows the primary
//! sink's state channel and translates `Playing -> Idle` transitions into
//! "track ended, play the next one". `play` calls are not serialized with
//! each other; callers needing strict ordering must serialize externally.

use crate::cache::SearchCache;
use crate::config::PlayerOptions;
use crate::error::{PlayerError, Result};
use crate::events::{EventBus, PlayerEvent};
use crate::extensions::{ExtensionContext, ExtensionManager, HookFlow, PlayOutcome, PlayRequest};
use crate::filters::FilterManager;
use crate::plugins::{PluginManager, RelatedOptions};
use crate::queue::{LoopMode, TrackQueue};
use crate::sink::{AudioResource, AudioSink, SinkId, SinkState, VoiceConnection};
use crate::volume::VolumeControl;
use encore_core::{AudioFilter, EncoreError, GuildId, Playlist, SearchResult, StreamInfo, Track};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A play request as accepted by [`Player::play`]
#[derive(Debug, Clone)]
pub enum PlayQuery {
    /// Free-text query or URL to resolve through search
    Search(String),

    /// An already-resolved track to enqueue directly
    Track(Track),

    /// A pre-fetched search result (single track or playlist batch)
    Result(SearchResult),

    /// Resume paused playback, or start the queue if nothing is loaded
    Resume,
}

/// Playback offset derived from the resource start instant
///
/// Paused time is excluded: pausing folds the elapsed span into the base
/// and resuming restarts the clock.
#[derive(Debug, Default)]
struct PositionTracker {
    base: Duration,
    started: Option<Instant>,
}

impl PositionTracker {
    fn start(&mut self, offset: Duration) {
        self.base = offset;
        self.started = Some(Instant::now());
    }

    fn pause(&mut self) {
        if let Some(started) = self.started.take() {
            self.base += started.elapsed();
        }
    }

    fn resume(&mut self) {
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
    }

    fn reset(&mut self) {
        self.base = Duration::ZERO;
        self.started = None;
    }

    fn position(&self) -> Duration {
        self.base + self.started.map(|s| s.elapsed()).unwrap_or_default()
    }
}

struct PlayerInner {
    guild_id: GuildId,
    options: PlayerOptions,
    queue: Mutex<TrackQueue>,
    plugins: PluginManager,
    extensions: ExtensionManager,
    filters: FilterManager,
    cache: SearchCache,
    events: EventBus,
    volume: VolumeControl,
    connection: Mutex<Option<Arc<dyn VoiceConnection>>>,
    primary: Arc<dyn AudioSink>,
    tts_sink: Arc<dyn AudioSink>,
    destroyed: AtomicBool,
    leave_timer: Mutex<Option<JoinHandle<()>>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
    position: Mutex<PositionTracker>,
}

/// One independent playback session, keyed by guild
///
/// Cheaply cloneable handle over shared internals; every clone drives the
/// same session. Once destroyed, all operations fail with
/// [`PlayerError::Destroyed`].
#[derive(Clone)]
pub struct Player {
    inner: Arc<PlayerInner>,
}

impl Player {
    /// Create a session for `guild_id` over the given sinks
    ///
    /// Spawns the sink-state watcher that drives queue advancement; the
    /// watcher lives until [`Player::destroy`].
    pub fn new(
        guild_id: GuildId,
        options: PlayerOptions,
        primary: Arc<dyn AudioSink>,
        tts_sink: Arc<dyn AudioSink>,
    ) -> Self {
        let events = EventBus::default();
        let context = ExtensionContext {
            guild_id,
            events: events.clone(),
        };

        let inner = Arc::new(PlayerInner {
            guild_id,
            queue: Mutex::new(TrackQueue::new()),
            plugins: PluginManager::new(options.search_timeout, options.stream_timeout),
            extensions: ExtensionManager::new(context),
            filters: FilterManager::new(options.transcoder.clone()),
            cache: SearchCache::new(options.search_cache_capacity, options.search_cache_ttl),
            volume: VolumeControl::new(
                options.volume,
                options.volume_ramp_steps,
                options.volume_ramp_interval,
            ),
            events,
            connection: Mutex::new(None),
            primary,
            tts_sink,
            destroyed: AtomicBool::new(false),
            leave_timer: Mutex::new(None),
            watcher: Mutex::new(None),
            position: Mutex::new(PositionTracker::default()),
            options,
        });

        let player = Self { inner };
        player.spawn_watcher();
        player
    }

    /// Session key
    pub fn guild_id(&self) -> GuildId {
        self.inner.guild_id
    }

    /// Provider registry for this session
    pub fn plugins(&self) -> &PluginManager {
        &self.inner.plugins
    }

    /// Extension registry for this session
    pub fn extensions(&self) -> &ExtensionManager {
        &self.inner.extensions
    }

    /// Filter chain for this session
    pub fn filters(&self) -> &FilterManager {
        &self.inner.filters
    }

    /// Event bus for this session
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.inner.events.subscribe()
    }

    /// Attach a voice connection and route it to the primary sink
    pub fn connect(&self, connection: Arc<dyn VoiceConnection>) {
        connection.subscribe(SinkId::Primary);
        let mut slot = self
            .inner
            .connection
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *slot = Some(connection);
    }

    /// Detach and tear down the voice connection, if any
    pub fn disconnect(&self) {
        let taken = {
            let mut slot = self
                .inner
                .connection
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            slot.take()
        };
        if let Some(connection) = taken {
            connection.disconnect();
        }
    }

    /// Resolve and enqueue a play request
    ///
    /// Runs the full pipeline: before-play hooks (an extension may rewrite
    /// the request or own it outright), track resolution through the cache,
    /// extension search overrides, and the provider chain, TTS diversion for
    /// speech tracks, enqueueing, and starting playback when the session is
    /// idle. After-play hooks observe the outcome on success and failure
    /// alike.
    pub async fn play(&self, query: PlayQuery, requester: Option<&str>) -> Result<PlayOutcome> {
        self.ensure_alive()?;
        self.cancel_leave_timer();

        let mut playlist_info: Option<Playlist> = None;
        let mut request = match query {
            PlayQuery::Search(query) => PlayRequest {
                query: Some(query),
                requester: requester.map(str::to_string),
                ..Default::default()
            },
            PlayQuery::Track(track) => PlayRequest {
                requester: requester.map(str::to_string),
                tracks: vec![track],
                ..Default::default()
            },
            PlayQuery::Result(result) => {
                playlist_info = result.playlist.clone();
                PlayRequest {
                    requester: requester.map(str::to_string),
                    is_playlist: result.is_playlist(),
                    tracks: result.tracks,
                    ..Default::default()
                }
            }
            PlayQuery::Resume => return self.resume_request().await,
        };

        match self.inner.extensions.before_play_hooks(request.clone()).await {
            HookFlow::Handled(response) => {
                let outcome = PlayOutcome {
                    request,
                    tracks: Vec::new(),
                    handled: true,
                    success: response.success,
                    error: response.error,
                };
                self.inner.extensions.after_play_hooks(&outcome).await;
                return Ok(outcome);
            }
            HookFlow::Continue(rewritten) => request = rewritten,
        }

        // Speech queries bypass the queue entirely
        let tts = &self.inner.options.tts;
        if tts.enabled {
            if let Some(text) = request
                .query
                .as_deref()
                .and_then(|q| q.strip_prefix(tts.query_prefix.as_str()))
            {
                let text = text.trim().to_string();
                return self.play_tts_query(request, &text).await;
            }
        }

        let (tracks, playlist) = match self.resolve_tracks(&request).await {
            Ok(resolved) => resolved,
            Err(err) => return Err(self.fail(request, err).await),
        };
        let playlist = playlist.or(playlist_info);

        if tracks.is_empty() {
            let err = PlayerError::from(EncoreError::NoResults(
                request.query.clone().unwrap_or_default(),
            ));
            return Err(self.fail(request, err).await);
        }

        // A resolved speech track diverts to the interrupt channel
        if tts.enabled && tracks[0].source == tts.provider {
            let track = attach_requester(tracks[0].clone(), request.requester.as_deref());
            let result = self.say(track.clone()).await;
            let outcome = PlayOutcome {
                request,
                tracks: vec![track],
                handled: false,
                success: result.is_ok(),
                error: result.as_ref().err().map(|e| e.to_string()),
            };
            self.inner.extensions.after_play_hooks(&outcome).await;
            return result.map(|_| outcome);
        }

        let is_batch = request.is_playlist || playlist.is_some();
        let enqueued: Vec<Track> = if is_batch {
            tracks
                .into_iter()
                .map(|t| attach_requester(t, request.requester.as_deref()))
                .collect()
        } else {
            vec![attach_requester(tracks[0].clone(), request.requester.as_deref())]
        };

        {
            let mut queue = self.queue_lock();
            queue.add_multiple(enqueued.iter().cloned());
        }

        if is_batch {
            self.inner.events.emit(PlayerEvent::QueueAddBatch {
                count: enqueued.len(),
                playlist,
            });
        } else {
            self.inner.events.emit(PlayerEvent::QueueAdd {
                track: enqueued[0].clone(),
            });
        }

        if self.current().is_none() && self.inner.primary.state() == SinkState::Idle {
            self.play_next(false).await;
        }

        let outcome = PlayOutcome {
            request,
            tracks: enqueued,
            handled: false,
            success: true,
            error: None,
        };
        self.inner.extensions.after_play_hooks(&outcome).await;
        Ok(outcome)
    }

    /// Search without enqueueing: cache, then extension overrides, then the
    /// provider chain
    pub async fn search(&self, query: &str, requester: Option<&str>) -> Result<SearchResult> {
        self.ensure_alive()?;

        if let Some(hit) = self.inner.cache.get(query) {
            debug!(guild = %self.inner.guild_id, query, "search cache hit");
            return Ok(hit);
        }

        let result = match self.inner.extensions.provide_search(query, requester).await {
            Some(result) => result,
            None => self.inner.plugins.search(query, requester).await?,
        };

        self.inner.cache.insert(query, result.clone());
        Ok(result)
    }

    /// Interrupt music with a speech track on the dedicated TTS sink
    ///
    /// Pauses the primary sink, swaps the voice-transport subscription to
    /// the TTS sink, plays the track, and waits for completion bounded by
    /// the declared duration plus slack (or the configured maximum when the
    /// track declares none). The subscription swap, sink stop, and resume
    /// of prior playback happen on success and failure alike, as do the
    /// `TtsStart`/`TtsEnd` events.
    pub async fn say(&self, track: Track) -> Result<()> {
        self.ensure_alive()?;

        let was_playing = self.inner.primary.pause();
        if was_playing {
            self.position_lock().pause();
        }
        self.inner.events.emit(PlayerEvent::TtsStart {
            track: track.clone(),
        });

        let result = self.run_tts(&track).await;

        self.inner.tts_sink.stop();
        if let Some(connection) = self.connection() {
            connection.subscribe(SinkId::Primary);
        }
        if was_playing && self.inner.primary.resume() {
            self.position_lock().resume();
        }
        self.inner.events.emit(PlayerEvent::TtsEnd { track });

        result
    }

    async fn run_tts(&self, track: &Track) -> Result<()> {
        // Deliberately not extension-overridable: the track already came
        // from the dedicated speech provider
        let stream = self.inner.plugins.get_stream(track).await?;
        let resource = AudioResource {
            track: track.clone(),
            stream,
            gain: self.inner.volume.gain(),
        };

        if let Some(connection) = self.connection() {
            connection.subscribe(SinkId::Tts);
        }

        let mut state = self.inner.tts_sink.watch_state();
        self.inner.tts_sink.play(resource).await?;

        let tts = &self.inner.options.tts;
        let limit = if track.has_duration() {
            track.duration + tts.slack
        } else {
            tts.max_duration
        };

        let finished = state.wait_for(|s| *s == SinkState::Idle);
        if tokio::time::timeout(limit, finished).await.is_err() {
            debug!(track = %track.title, "announcement exceeded its window, cutting off");
        }
        Ok(())
    }

    /// Pause playback; returns false when nothing was playing
    pub fn pause(&self) -> bool {
        if self.is_destroyed() {
            return false;
        }
        if self.inner.primary.pause() {
            self.position_lock().pause();
            self.inner.events.emit(PlayerEvent::Pause);
            true
        } else {
            false
        }
    }

    /// Resume paused playback; returns false when nothing was paused
    pub fn resume(&self) -> bool {
        if self.is_destroyed() {
            return false;
        }
        if self.inner.primary.resume() {
            self.position_lock().resume();
            self.inner.events.emit(PlayerEvent::Resume);
            true
        } else {
            false
        }
    }

    /// Stop playback and clear the queue
    ///
    /// The queue is cleared before the sink stops so the watcher does not
    /// mistake the stop for a finished track and advance.
    pub fn stop(&self) -> bool {
        if self.is_destroyed() {
            return false;
        }
        self.queue_lock().clear();
        self.position_lock().reset();
        let stopped = self.inner.primary.stop();
        self.inner.events.emit(PlayerEvent::Stop);
        stopped
    }

    /// Advance to the next track, ignoring track-loop mode
    pub async fn skip(&self) -> Result<Option<Track>> {
        self.ensure_alive()?;
        if let Some(track) = self.current() {
            self.inner.events.emit(PlayerEvent::TrackEnd { track });
        }
        self.play_next(true).await;
        Ok(self.current())
    }

    /// Drop the first `index` upcoming tracks and advance
    ///
    /// `jump(0)` behaves like [`Player::skip`]; `jump(2)` on upcoming
    /// [A, B, C] begins playback of C.
    pub async fn jump(&self, index: usize) -> Result<Option<Track>> {
        self.ensure_alive()?;
        {
            let mut queue = self.queue_lock();
            if index >= queue.len() {
                return Err(PlayerError::IndexOutOfBounds(index));
            }
            for _ in 0..index {
                queue.remove(0);
            }
        }
        if let Some(track) = self.current() {
            self.inner.events.emit(PlayerEvent::TrackEnd { track });
        }
        self.play_next(true).await;
        Ok(self.current())
    }

    /// Step back to the most recently played track
    pub async fn back(&self) -> Result<Option<Track>> {
        self.ensure_alive()?;

        let previous = self.queue_lock().previous();
        let Some(track) = previous else {
            return Ok(None);
        };

        if !self.start_track(&track).await {
            self.play_next(true).await;
        }
        Ok(Some(track))
    }

    /// Rebuild the current resource at a new playback offset
    pub async fn seek(&self, position: Duration) -> Result<()> {
        self.ensure_alive()?;
        self.rebuild_current(position).await
    }

    /// Volume in percent
    pub fn volume(&self) -> u16 {
        self.inner.volume.level()
    }

    /// Ramp the session volume towards `target` percent
    ///
    /// Values outside 0-200 are rejected, leaving the current volume
    /// unchanged. Returns the previous level.
    pub fn set_volume(&self, target: u16) -> Result<u16> {
        self.ensure_alive()?;
        let previous = self.inner.volume.set(target, self.inner.primary.clone())?;
        self.inner.events.emit(PlayerEvent::VolumeChange {
            from: previous,
            to: target,
        });
        Ok(previous)
    }

    /// Append a filter to the chain
    ///
    /// Returns false when a filter of the same name is already active.
    /// While a track is playing, the resource is rebuilt at the current
    /// offset so the listener does not lose position.
    pub async fn apply_filter(&self, filter: AudioFilter) -> Result<bool> {
        self.ensure_alive()?;
        let applied = self.inner.filters.apply_filter(filter.clone());
        if applied {
            self.inner.events.emit(PlayerEvent::FilterApplied {
                name: filter.name.clone(),
            });
            self.refresh_after_filter_change().await;
        }
        Ok(applied)
    }

    /// Remove a filter by name; rebuilds the playing resource like
    /// [`Player::apply_filter`]
    pub async fn remove_filter(&self, name: &str) -> Result<bool> {
        self.ensure_alive()?;
        let removed = self.inner.filters.remove_filter(name);
        if removed {
            self.inner.events.emit(PlayerEvent::FilterRemoved {
                name: name.to_string(),
            });
            self.refresh_after_filter_change().await;
        }
        Ok(removed)
    }

    /// Clear all active filters; returns how many were removed
    pub async fn clear_filters(&self) -> Result<usize> {
        self.ensure_alive()?;
        let removed = self.inner.filters.clear_all();
        if removed > 0 {
            self.inner.events.emit(PlayerEvent::FiltersCleared);
            self.refresh_after_filter_change().await;
        }
        Ok(removed)
    }

    /// Set loop mode, returning the previous mode
    pub fn set_loop(&self, mode: LoopMode) -> LoopMode {
        self.queue_lock().set_loop_mode(mode)
    }

    /// Current loop mode
    pub fn loop_mode(&self) -> LoopMode {
        self.queue_lock().loop_mode()
    }

    /// Enable or disable autoplay continuation
    pub fn set_autoplay(&self, enabled: bool) {
        self.queue_lock().set_autoplay(enabled);
    }

    /// Shuffle the upcoming tracks
    pub fn shuffle(&self) {
        self.queue_lock().shuffle();
    }

    /// Remove the upcoming track at `index`
    pub fn remove(&self, index: usize) -> Option<Track> {
        if self.is_destroyed() {
            return None;
        }
        let removed = self.queue_lock().remove(index);
        if let Some(track) = &removed {
            self.inner.events.emit(PlayerEvent::QueueRemove {
                track: track.clone(),
            });
        }
        removed
    }

    /// Currently playing track
    pub fn current(&self) -> Option<Track> {
        self.queue_lock().current().cloned()
    }

    /// Upcoming tracks in play order
    pub fn upcoming(&self) -> Vec<Track> {
        self.queue_lock().tracks().cloned().collect()
    }

    /// Already-played tracks, oldest first
    pub fn history(&self) -> Vec<Track> {
        self.queue_lock().history().to_vec()
    }

    /// Whether the primary sink is transmitting audio
    pub fn is_playing(&self) -> bool {
        self.inner.primary.state() == SinkState::Playing
    }

    /// Whether the primary sink is paused
    pub fn is_paused(&self) -> bool {
        self.inner.primary.state() == SinkState::Paused
    }

    /// Whether the session has been destroyed
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    /// Playback offset within the current track, excluding paused time
    pub fn position(&self) -> Duration {
        self.position_lock().position()
    }

    /// Render an elapsed/duration line with a position slider
    ///
    /// Pure formatting, no I/O. Tracks without a declared duration render a
    /// zero-length slider.
    pub fn progress_bar(&self, width: usize) -> String {
        let width = width.max(2);
        let position = self.position();

        let (duration, marker) = match self.current() {
            Some(track) if track.has_duration() => {
                let ratio =
                    (position.as_secs_f64() / track.duration.as_secs_f64()).clamp(0.0, 1.0);
                let marker = (ratio * (width - 1) as f64).round() as usize;
                (track.duration, marker)
            }
            _ => (Duration::ZERO, 0),
        };

        let mut bar = String::with_capacity(width * 3);
        for i in 0..width {
            bar.push(if i == marker { '●' } else { '─' });
        }

        format!(
            "[{}] {} [{}]",
            format_timestamp(position),
            bar,
            format_timestamp(duration)
        )
    }

    /// Report a voice transport failure and tear the session down
    pub async fn handle_connection_error(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(guild = %self.inner.guild_id, %message, "voice connection failed");
        self.inner
            .events
            .emit(PlayerEvent::ConnectionError { message });
        self.destroy().await;
    }

    /// Tear the session down
    ///
    /// Idempotent. Stops both sinks, kills the transcoder, aborts the
    /// watcher and timers, clears the queue, detaches extensions, and
    /// releases the voice connection. Every later operation fails with
    /// [`PlayerError::Destroyed`].
    pub async fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(guild = %self.inner.guild_id, "destroying session");

        self.cancel_leave_timer();
        let watcher = {
            let mut slot = self.inner.watcher.lock().unwrap_or_else(|e| e.into_inner());
            slot.take()
        };
        if let Some(watcher) = watcher {
            watcher.abort();
        }

        self.inner.volume.cancel();
        self.inner.primary.stop();
        self.inner.tts_sink.stop();
        self.inner.filters.shutdown();
        self.queue_lock().clear();
        self.position_lock().reset();
        self.inner.cache.clear();
        self.inner.extensions.destroy_all().await;
        self.disconnect();

        self.inner.events.emit(PlayerEvent::Destroy);
    }

    // === internals ===

    fn ensure_alive(&self) -> Result<()> {
        if self.is_destroyed() {
            Err(PlayerError::Destroyed(self.inner.guild_id))
        } else {
            Ok(())
        }
    }

    fn queue_lock(&self) -> MutexGuard<'_, TrackQueue> {
        self.inner.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn position_lock(&self) -> MutexGuard<'_, PositionTracker> {
        self.inner.position.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn connection(&self) -> Option<Arc<dyn VoiceConnection>> {
        self.inner
            .connection
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    async fn resume_request(&self) -> Result<PlayOutcome> {
        let success = if self.is_paused() {
            self.resume()
        } else if self.current().is_none() {
            self.play_next(false).await;
            self.current().is_some()
        } else {
            true
        };

        let outcome = PlayOutcome {
            request: PlayRequest::default(),
            tracks: Vec::new(),
            handled: false,
            success,
            error: (!success).then(|| "nothing to resume".to_string()),
        };
        self.inner.extensions.after_play_hooks(&outcome).await;
        Ok(outcome)
    }

    async fn play_tts_query(&self, request: PlayRequest, text: &str) -> Result<PlayOutcome> {
        let provider_name = &self.inner.options.tts.provider;
        let result = match self.inner.plugins.get(provider_name) {
            Some(provider) => provider
                .search(text, request.requester.as_deref())
                .await
                .map_err(PlayerError::from),
            None => Err(PlayerError::from(EncoreError::provider(
                provider_name,
                "speech provider not registered",
            ))),
        };

        let track = match result.map(|r| r.first().cloned()) {
            Ok(Some(track)) => attach_requester(track, request.requester.as_deref()),
            Ok(None) => {
                let err = PlayerError::from(EncoreError::NoResults(text.to_string()));
                return Err(self.fail(request, err).await);
            }
            Err(err) => return Err(self.fail(request, err).await),
        };

        let result = self.say(track.clone()).await;
        let outcome = PlayOutcome {
            request,
            tracks: vec![track],
            handled: false,
            success: result.is_ok(),
            error: result.as_ref().err().map(|e| e.to_string()),
        };
        self.inner.extensions.after_play_hooks(&outcome).await;
        result.map(|_| outcome)
    }

    async fn resolve_tracks(&self, request: &PlayRequest) -> Result<(Vec<Track>, Option<Playlist>)> {
        if !request.tracks.is_empty() {
            return Ok((request.tracks.clone(), None));
        }

        let query = request
            .query
            .as_deref()
            .ok_or_else(|| EncoreError::NoResults("empty play request".to_string()))?;

        let result = self.search(query, request.requester.as_deref()).await?;
        Ok((result.tracks, result.playlist))
    }

    /// Build a failed outcome: emit the error event, run after-play hooks,
    /// hand the error back for propagation
    async fn fail(&self, request: PlayRequest, err: PlayerError) -> PlayerError {
        self.inner.events.emit(PlayerEvent::Error {
            track: None,
            message: err.to_string(),
        });
        let outcome = PlayOutcome {
            request,
            tracks: Vec::new(),
            handled: false,
            success: false,
            error: Some(err.to_string()),
        };
        self.inner.extensions.after_play_hooks(&outcome).await;
        err
    }

    /// Advance the queue and start whatever comes next
    ///
    /// Boxed for recursion: a failed track skips to the next one, and the
    /// autoplay candidate is enqueued and replayed through the same path.
    fn play_next(&self, force_skip_loop: bool) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            if self.is_destroyed() {
                return;
            }

            let next = self.queue_lock().next(force_skip_loop);
            let track = match next {
                Some(track) => track,
                None => {
                    let candidate = {
                        let mut queue = self.queue_lock();
                        if queue.autoplay() {
                            queue.take_will_next()
                        } else {
                            None
                        }
                    };
                    match candidate {
                        Some(candidate) => {
                            self.inner.events.emit(PlayerEvent::Debug {
                                message: format!("autoplay: continuing with '{}'", candidate.title),
                            });
                            self.queue_lock().add(candidate);
                            self.play_next(force_skip_loop).await;
                        }
                        None => {
                            self.queue_lock().clear_current();
                            self.position_lock().reset();
                            self.inner.events.emit(PlayerEvent::QueueEnd);
                            self.schedule_leave_timer();
                        }
                    }
                    return;
                }
            };

            self.cancel_leave_timer();
            self.spawn_autoplay_prefetch(track.clone());

            if !self.start_track(&track).await {
                self.play_next(true).await;
            }
        })
    }

    /// Resolve, build, and hand a track to the primary sink
    ///
    /// Returns false on failure after emitting the error event; the caller
    /// decides whether to skip-and-continue.
    async fn start_track(&self, track: &Track) -> bool {
        self.inner.events.emit(PlayerEvent::WillPlay {
            track: track.clone(),
        });

        match self.build_and_start(track, Duration::ZERO).await {
            Ok(()) => {
                self.inner.events.emit(PlayerEvent::TrackStart {
                    track: track.clone(),
                });
                true
            }
            Err(err) => {
                warn!(track = %track.title, %err, "failed to start track");
                self.inner.events.emit(PlayerEvent::Error {
                    track: Some(track.clone()),
                    message: err.to_string(),
                });
                false
            }
        }
    }

    async fn build_and_start(&self, track: &Track, offset: Duration) -> Result<()> {
        let stream = self.resolve_stream(track).await?;

        let (stream, offset) = if self.inner.filters.has_filters() || !offset.is_zero() {
            match self.inner.filters.apply_and_seek(stream, offset) {
                Ok(filtered) => (filtered, offset),
                Err(err) => {
                    // Unfiltered fallback; the offset is lost with the
                    // consumed stream
                    warn!(track = %track.title, %err, "transcoder failed, playing unfiltered");
                    (self.resolve_stream(track).await?, Duration::ZERO)
                }
            }
        } else {
            (stream, offset)
        };

        let resource = AudioResource {
            track: track.clone(),
            stream,
            gain: self.inner.volume.gain(),
        };
        self.inner.primary.play(resource).await?;
        self.position_lock().start(offset);
        Ok(())
    }

    async fn resolve_stream(&self, track: &Track) -> Result<StreamInfo> {
        match self.inner.extensions.provide_stream(track).await {
            Some(stream) => Ok(stream),
            None => Ok(self.inner.plugins.get_stream(track).await?),
        }
    }

    async fn rebuild_current(&self, offset: Duration) -> Result<()> {
        let track = self.current().ok_or(PlayerError::NothingPlaying)?;
        self.build_and_start(&track, offset).await
    }

    async fn refresh_after_filter_change(&self) {
        if self.inner.primary.state() != SinkState::Playing {
            return;
        }
        let offset = self.position();
        if let Err(err) = self.rebuild_current(offset).await {
            self.inner.events.emit(PlayerEvent::Error {
                track: self.current(),
                message: err.to_string(),
            });
        }
    }

    /// Fetch the next autoplay candidate in the background
    fn spawn_autoplay_prefetch(&self, track: Track) {
        let wanted = {
            let queue = self.queue_lock();
            queue.autoplay() && queue.will_next().is_none()
        };
        if !wanted {
            return;
        }

        let player = self.clone();
        tokio::spawn(async move {
            let history: Vec<String> = {
                let queue = player.queue_lock();
                queue.history().iter().map(|t| t.url.clone()).collect()
            };
            let options = RelatedOptions {
                limit: player.inner.options.autoplay_related_limit,
                offset: 0,
                history: history.clone(),
            };

            match player.inner.plugins.related_tracks(&track, options).await {
                Ok(related) if !related.is_empty() => {
                    let candidate = related
                        .iter()
                        .find(|t| t.url != track.url && !history.contains(&t.url))
                        .cloned();
                    let mut queue = player.queue_lock();
                    queue.set_related(related);
                    if queue.will_next().is_none() {
                        queue.set_will_next(candidate);
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    debug!(track = %track.title, %err, "autoplay prefetch failed");
                }
            }
        });
    }

    /// Watch the primary sink and advance the queue on finished tracks
    fn spawn_watcher(&self) {
        let player = self.clone();
        let mut state = self.inner.primary.watch_state();

        let handle = tokio::spawn(async move {
            let mut last = *state.borrow();
            while state.changed().await.is_ok() {
                let current = *state.borrow_and_update();
                let was = std::mem::replace(&mut last, current);
                if was == SinkState::Playing && current == SinkState::Idle {
                    player.handle_track_end().await;
                }
            }
        });

        let mut slot = self.inner.watcher.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(handle);
    }

    async fn handle_track_end(&self) {
        if self.is_destroyed() {
            return;
        }
        // `stop` clears the queue before stopping the sink, so a stop-induced
        // idle carries no current track and is ignored here
        let Some(track) = self.current() else {
            return;
        };
        self.inner.events.emit(PlayerEvent::TrackEnd { track });
        self.position_lock().reset();
        self.play_next(false).await;
    }

    fn schedule_leave_timer(&self) {
        let Some(delay) = self.inner.options.leave_on_end else {
            return;
        };

        let player = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!(guild = %player.inner.guild_id, "queue idle past the leave window");
            // Detach our own handle first so destroy does not abort this
            // task mid-teardown
            player
                .inner
                .leave_timer
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .take();
            player.destroy().await;
        });

        let mut slot = self
            .inner
            .leave_timer
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(old) = slot.replace(handle) {
            old.abort();
        }
    }

    fn cancel_leave_timer(&self) {
        let mut slot = self
            .inner
            .leave_timer
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(old) = slot.take() {
            old.abort();
        }
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("guild_id", &self.inner.guild_id)
            .field("destroyed", &self.is_destroyed())
            .finish_non_exhaustive()
    }
}

fn attach_requester(mut track: Track, requester: Option<&str>) -> Track {
    if track.requested_by.is_none() {
        track.requested_by = requester.map(str::to_string);
    }
    track
}

fn format_timestamp(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}
