//! Source providers and the fallback-resolution registry
//!
//! A provider knows how to search one source kind and turn its tracks into
//! byte-streams. The registry resolves streams with ordered, exhaustive
//! fallback: the declared provider for a track is frequently unavailable
//! (rate limits, geo-blocks, transient network errors) while a different
//! registered provider can often serve equivalent audio.

use async_trait::async_trait;
use encore_core::{EncoreError, Result, SearchResult, StreamInfo, Track};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, warn};

/// Options for a related-tracks (recommendation) lookup
#[derive(Debug, Clone, Default)]
pub struct RelatedOptions {
    /// Maximum number of tracks to return
    pub limit: usize,

    /// Pagination offset into the provider's recommendation list
    pub offset: usize,

    /// URLs already played this session, for dedup by the provider
    pub history: Vec<String>,
}

/// A pluggable audio source
///
/// The required surface is small; optional capabilities are declared
/// through the defaulted methods so the orchestrator never branches on a
/// provider's concrete identity.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Unique provider name (matched against `Track::source`)
    fn name(&self) -> &str;

    /// Whether this provider can resolve the given query or URL
    fn can_handle(&self, query: &str) -> bool;

    /// Search this source for tracks matching `query`
    async fn search(&self, query: &str, requester: Option<&str>) -> Result<SearchResult>;

    /// Resolve a track into a playable byte-stream
    async fn get_stream(&self, track: &Track) -> Result<StreamInfo>;

    // === Optional capabilities ===

    /// Whether `get_fallback` is implemented
    fn supports_fallback(&self) -> bool {
        false
    }

    /// Secondary stream resolution tried when primaries fail
    async fn get_fallback(&self, track: &Track) -> Result<StreamInfo> {
        Err(EncoreError::provider(
            self.name(),
            format!("no fallback resolution for '{}'", track.title),
        ))
    }

    /// Whether `get_related` is implemented
    fn supports_related(&self) -> bool {
        false
    }

    /// Recommend tracks related to `url`
    async fn get_related(&self, url: &str, options: RelatedOptions) -> Result<Vec<Track>> {
        let _ = (url, options);
        Ok(Vec::new())
    }

    /// Validate a URL beyond the `can_handle` predicate
    async fn validate(&self, url: &str) -> bool {
        self.can_handle(url)
    }

    /// Expand a playlist URL into its tracks
    async fn extract_playlist(&self, url: &str, requester: Option<&str>) -> Result<Vec<Track>> {
        let _ = requester;
        Err(EncoreError::provider(
            self.name(),
            format!("playlist extraction not supported for '{}'", url),
        ))
    }
}

/// Registry of source providers with ordered fallback resolution
///
/// Registration order is significant: search and fallback iterate providers
/// in the order they were registered.
pub struct PluginManager {
    providers: RwLock<Vec<Arc<dyn SourceProvider>>>,
    search_timeout: Duration,
    stream_timeout: Duration,
}

impl PluginManager {
    /// Create an empty registry with the given per-call timeouts
    pub fn new(search_timeout: Duration, stream_timeout: Duration) -> Self {
        Self {
            providers: RwLock::new(Vec::new()),
            search_timeout,
            stream_timeout,
        }
    }

    /// Register a provider at the end of the resolution order
    pub fn register(&self, provider: Arc<dyn SourceProvider>) {
        let mut providers = self.providers.write().unwrap_or_else(|e| e.into_inner());
        providers.push(provider);
    }

    /// Remove a provider by name; returns whether one was removed
    pub fn unregister(&self, name: &str) -> bool {
        let mut providers = self.providers.write().unwrap_or_else(|e| e.into_inner());
        let before = providers.len();
        providers.retain(|p| p.name() != name);
        providers.len() != before
    }

    /// Look up a provider by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn SourceProvider>> {
        self.snapshot().into_iter().find(|p| p.name() == name)
    }

    /// First registered provider whose `can_handle` accepts the string
    pub fn find_plugin(&self, query: &str) -> Option<Arc<dyn SourceProvider>> {
        self.snapshot().into_iter().find(|p| p.can_handle(query))
    }

    /// Names of all registered providers, in resolution order
    pub fn provider_names(&self) -> Vec<String> {
        self.snapshot()
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    /// Search providers in registration order until one returns tracks
    ///
    /// Each provider runs under the search timeout; failures and empty
    /// results just move resolution along to the next provider.
    pub async fn search(&self, query: &str, requester: Option<&str>) -> Result<SearchResult> {
        for provider in self.snapshot() {
            match timed(
                self.search_timeout,
                "searching",
                provider.search(query, requester),
            )
            .await
            {
                Ok(result) if !result.is_empty() => {
                    debug!(provider = provider.name(), query, "search hit");
                    return Ok(result);
                }
                Ok(_) => {
                    debug!(provider = provider.name(), query, "search returned nothing");
                }
                Err(err) => {
                    debug!(provider = provider.name(), query, %err, "search failed");
                }
            }
        }

        Err(EncoreError::NoResults(query.to_string()))
    }

    /// Resolve a track into a byte-stream with exhaustive fallback
    ///
    /// The declared provider (by `Track::source`, else the first whose
    /// `can_handle` accepts the URL) is tried first. On any error, timeout,
    /// or missing provider, every registered provider is tried in
    /// registration order — primary resolution, then its fallback when
    /// declared — each under the stream timeout. The first usable stream
    /// wins; exhausting all providers fails with an error naming the track.
    ///
    /// Timeouts are abandon-and-move-on: the timed-out future is dropped
    /// and its underlying work is not forcibly cancelled.
    pub async fn get_stream(&self, track: &Track) -> Result<StreamInfo> {
        let providers = self.snapshot();

        let declared = providers
            .iter()
            .find(|p| p.name() == track.source)
            .or_else(|| providers.iter().find(|p| p.can_handle(&track.url)));

        if let Some(provider) = declared {
            match self.try_stream(provider, track).await {
                Ok(stream) => return Ok(stream),
                Err(err) => {
                    debug!(
                        provider = provider.name(),
                        track = %track.title,
                        %err,
                        "declared provider failed, entering fallback chain"
                    );
                }
            }
        }

        for provider in &providers {
            match self.try_stream(provider, track).await {
                Ok(stream) => return Ok(stream),
                Err(err) => {
                    debug!(
                        provider = provider.name(),
                        track = %track.title,
                        %err,
                        "stream resolution failed"
                    );
                }
            }

            if provider.supports_fallback() {
                match timed(
                    self.stream_timeout,
                    "resolving fallback stream",
                    provider.get_fallback(track),
                )
                .await
                {
                    Ok(stream) => {
                        debug!(
                            provider = provider.name(),
                            track = %track.title,
                            "fallback resolution succeeded"
                        );
                        return Ok(stream);
                    }
                    Err(err) => {
                        debug!(
                            provider = provider.name(),
                            track = %track.title,
                            %err,
                            "fallback resolution failed"
                        );
                    }
                }
            }
        }

        warn!(track = %track.title, "all sources exhausted");
        Err(EncoreError::AllSourcesExhausted(track.title.clone()))
    }

    /// Fetch recommendations for a track via any capable provider
    pub async fn related_tracks(
        &self,
        track: &Track,
        options: RelatedOptions,
    ) -> Result<Vec<Track>> {
        let providers = self.snapshot();

        let mut capable: Vec<&Arc<dyn SourceProvider>> = Vec::new();
        if let Some(declared) = providers
            .iter()
            .find(|p| p.name() == track.source && p.supports_related())
        {
            capable.push(declared);
        }
        capable.extend(
            providers
                .iter()
                .filter(|p| p.supports_related() && p.name() != track.source),
        );

        for provider in capable {
            match timed(
                self.search_timeout,
                "fetching related tracks",
                provider.get_related(&track.url, options.clone()),
            )
            .await
            {
                Ok(tracks) if !tracks.is_empty() => return Ok(tracks),
                Ok(_) => {}
                Err(err) => {
                    debug!(provider = provider.name(), %err, "related lookup failed");
                }
            }
        }

        Ok(Vec::new())
    }

    fn snapshot(&self) -> Vec<Arc<dyn SourceProvider>> {
        self.providers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    async fn try_stream(
        &self,
        provider: &Arc<dyn SourceProvider>,
        track: &Track,
    ) -> Result<StreamInfo> {
        timed(
            self.stream_timeout,
            "resolving stream",
            provider.get_stream(track),
        )
        .await
    }
}

/// Race a provider call against a timer; elapsed time counts as failure
async fn timed<T>(
    limit: Duration,
    what: &str,
    fut: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(EncoreError::Timeout(what.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encore_core::{AudioStream, StreamKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Programmable test provider
    struct FakeProvider {
        name: String,
        prefix: String,
        stream_ok: bool,
        fallback_ok: bool,
        delay: Option<Duration>,
        stream_calls: AtomicUsize,
        search_calls: AtomicUsize,
    }

    impl FakeProvider {
        fn new(name: &str, stream_ok: bool) -> Self {
            Self {
                name: name.to_string(),
                prefix: format!("https://{}.example.com", name),
                stream_ok,
                fallback_ok: false,
                delay: None,
                stream_calls: AtomicUsize::new(0),
                search_calls: AtomicUsize::new(0),
            }
        }

        fn with_fallback(mut self) -> Self {
            self.fallback_ok = true;
            self
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        fn dummy_stream() -> StreamInfo {
            StreamInfo::new(
                AudioStream::new(std::io::Cursor::new(vec![0u8; 4])),
                StreamKind::Arbitrary,
            )
        }
    }

    #[async_trait]
    impl SourceProvider for FakeProvider {
        fn name(&self) -> &str {
            &self.name
        }

        fn can_handle(&self, query: &str) -> bool {
            query.starts_with(&self.prefix)
        }

        async fn search(&self, query: &str, _requester: Option<&str>) -> Result<SearchResult> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            if self.stream_ok {
                Ok(SearchResult::single(Track::new(
                    query,
                    format!("{}/track", self.prefix),
                    &self.name,
                )))
            } else {
                Ok(SearchResult::empty())
            }
        }

        async fn get_stream(&self, _track: &Track) -> Result<StreamInfo> {
            self.stream_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.stream_ok {
                Ok(Self::dummy_stream())
            } else {
                Err(EncoreError::provider(&self.name, "unavailable"))
            }
        }

        fn supports_fallback(&self) -> bool {
            self.fallback_ok
        }

        async fn get_fallback(&self, _track: &Track) -> Result<StreamInfo> {
            if self.fallback_ok {
                Ok(Self::dummy_stream())
            } else {
                Err(EncoreError::provider(&self.name, "no fallback"))
            }
        }
    }

    fn manager() -> PluginManager {
        PluginManager::new(Duration::from_millis(200), Duration::from_millis(200))
    }

    fn track_from(source: &str) -> Track {
        Track::new("Song", format!("https://{}.example.com/track", source), source)
    }

    #[tokio::test]
    async fn second_provider_recovers_first_failure() {
        let manager = manager();
        manager.register(Arc::new(FakeProvider::new("one", false)));
        manager.register(Arc::new(FakeProvider::new("two", true)));

        // Declared source is the failing provider
        let stream = manager.get_stream(&track_from("one")).await.unwrap();
        assert_eq!(stream.kind, StreamKind::Arbitrary);
    }

    #[tokio::test]
    async fn exhaustion_names_the_track() {
        let manager = manager();
        manager.register(Arc::new(FakeProvider::new("one", false)));
        manager.register(Arc::new(FakeProvider::new("two", false)));

        let err = manager.get_stream(&track_from("one")).await.unwrap_err();
        assert!(matches!(err, EncoreError::AllSourcesExhausted(_)));
        assert!(err.to_string().contains("Song"));
    }

    #[tokio::test]
    async fn fallback_resolution_is_tried() {
        let manager = manager();
        manager.register(Arc::new(FakeProvider::new("one", false).with_fallback()));

        let stream = manager.get_stream(&track_from("one")).await;
        assert!(stream.is_ok());
    }

    #[tokio::test]
    async fn timeout_moves_to_next_provider() {
        let manager = manager();
        manager.register(Arc::new(
            FakeProvider::new("slow", true).with_delay(Duration::from_secs(5)),
        ));
        manager.register(Arc::new(FakeProvider::new("fast", true)));

        let stream = manager.get_stream(&track_from("slow")).await;
        assert!(stream.is_ok());
    }

    #[tokio::test]
    async fn unknown_source_falls_back_to_url_match() {
        let manager = manager();
        let provider = Arc::new(FakeProvider::new("one", true));
        manager.register(provider.clone());

        let mut track = track_from("one");
        track.source = "unregistered".to_string();

        manager.get_stream(&track).await.unwrap();
        assert!(provider.stream_calls.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn search_stops_at_first_hit() {
        let manager = manager();
        let empty = Arc::new(FakeProvider::new("empty", false));
        let hit = Arc::new(FakeProvider::new("hit", true));
        let unreached = Arc::new(FakeProvider::new("later", true));
        manager.register(empty.clone());
        manager.register(hit.clone());
        manager.register(unreached.clone());

        let result = manager.search("some song", None).await.unwrap();
        assert_eq!(result.first().unwrap().source, "hit");
        assert_eq!(empty.search_calls.load(Ordering::SeqCst), 1);
        assert_eq!(unreached.search_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn search_exhaustion_is_no_results() {
        let manager = manager();
        manager.register(Arc::new(FakeProvider::new("empty", false)));

        let err = manager.search("nothing", None).await.unwrap_err();
        assert!(matches!(err, EncoreError::NoResults(_)));
    }

    #[test]
    fn find_plugin_first_match_wins() {
        let manager = manager();
        manager.register(Arc::new(FakeProvider::new("one", true)));
        manager.register(Arc::new(FakeProvider::new("two", true)));

        let found = manager
            .find_plugin("https://two.example.com/track")
            .unwrap();
        assert_eq!(found.name(), "two");
        assert!(manager.find_plugin("https://nowhere.example").is_none());
    }

    #[test]
    fn unregister_by_name() {
        let manager = manager();
        manager.register(Arc::new(FakeProvider::new("one", true)));

        assert!(manager.unregister("one"));
        assert!(!manager.unregister("one"));
        assert!(manager.get("one").is_none());
    }
}
