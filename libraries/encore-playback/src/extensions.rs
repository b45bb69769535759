//! Cross-cutting extension hooks
//!
//! Extensions intercept search, stream, and play behavior without the
//! orchestrator knowing concrete add-on types. Two hook phases (before/after
//! play) plus two overrides (search/stream):
//! - before-play threads a request through every extension in order, each
//!   step either rewriting it or declaring the request fully handled
//! - after-play observes a frozen outcome snapshot, for side effects only
//! - search/stream overrides are first-match-wins, short-circuiting
//!
//! Hook failures are contained: logged per extension, never propagated.

use crate::events::EventBus;
use async_trait::async_trait;
use encore_core::{GuildId, Result, SearchResult, StreamInfo, Track};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Read-only view of the owning session handed to every hook
#[derive(Debug, Clone)]
pub struct ExtensionContext {
    /// Session key
    pub guild_id: GuildId,

    /// Event bus for the session (emit-only for extensions)
    pub events: EventBus,
}

/// A play request as threaded through the before-play chain
#[derive(Debug, Clone, Default)]
pub struct PlayRequest {
    /// Textual query, when the request came in as text
    pub query: Option<String>,

    /// Requesting user
    pub requester: Option<String>,

    /// Resolved tracks supplied by a hook, bypassing search
    pub tracks: Vec<Track>,

    /// Whether hook-supplied tracks form a playlist batch
    pub is_playlist: bool,
}

/// Terminal response from an extension that fully owns a play request
#[derive(Debug, Clone)]
pub struct PlayResponse {
    /// Whether the extension handled the request successfully
    pub success: bool,

    /// Failure description when unsuccessful
    pub error: Option<String>,
}

/// Outcome of one before-play hook step
#[derive(Debug, Clone)]
pub enum HookFlow {
    /// Pass the (possibly rewritten) request to the next extension
    Continue(PlayRequest),

    /// Stop the chain; the extension owns the request
    Handled(PlayResponse),
}

/// Frozen snapshot of a completed play resolution
///
/// Constructed once per `play` call and dispatched immutably, so hooks
/// cannot mutate shared state through it.
#[derive(Debug, Clone)]
pub struct PlayOutcome {
    /// The request as it stood when resolution finished
    pub request: PlayRequest,

    /// Tracks that were enqueued (empty on failure or handled requests)
    pub tracks: Vec<Track>,

    /// Whether an extension short-circuited the request
    pub handled: bool,

    /// Whether resolution succeeded
    pub success: bool,

    /// Failure description when unsuccessful
    pub error: Option<String>,
}

/// A pluggable cross-cutting add-on
///
/// Only `name` and `active` are required; every hook defaults to a no-op
/// so extensions implement exactly the interception points they need.
#[async_trait]
pub trait PlayerExtension: Send + Sync {
    /// Unique extension name
    fn name(&self) -> &str;

    /// Wiring probe: whether the extension can attach to this session
    fn active(&self, context: &ExtensionContext) -> bool {
        let _ = context;
        true
    }

    /// Called once when the extension attaches to a session
    async fn on_register(&self, context: &ExtensionContext) {
        let _ = context;
    }

    /// Called once when the session detaches the extension
    async fn on_destroy(&self, context: &ExtensionContext) {
        let _ = context;
    }

    /// Intercept a play request before resolution
    async fn before_play(
        &self,
        context: &ExtensionContext,
        request: PlayRequest,
    ) -> Result<HookFlow> {
        let _ = context;
        Ok(HookFlow::Continue(request))
    }

    /// Observe a completed play resolution
    async fn after_play(&self, context: &ExtensionContext, outcome: &PlayOutcome) -> Result<()> {
        let _ = (context, outcome);
        Ok(())
    }

    /// Offer a search result before providers are consulted
    async fn provide_search(
        &self,
        context: &ExtensionContext,
        query: &str,
        requester: Option<&str>,
    ) -> Result<Option<SearchResult>> {
        let _ = (context, query, requester);
        Ok(None)
    }

    /// Offer a stream before the provider fallback chain runs
    async fn provide_stream(
        &self,
        context: &ExtensionContext,
        track: &Track,
    ) -> Result<Option<StreamInfo>> {
        let _ = (context, track);
        Ok(None)
    }
}

/// Ordered registry of attached extensions
pub struct ExtensionManager {
    extensions: RwLock<Vec<Arc<dyn PlayerExtension>>>,
    context: ExtensionContext,
}

impl ExtensionManager {
    /// Create an empty registry bound to one session
    pub fn new(context: ExtensionContext) -> Self {
        Self {
            extensions: RwLock::new(Vec::new()),
            context,
        }
    }

    /// Attach an extension at the end of the hook order
    ///
    /// The extension's `active` probe runs first; inactive extensions are
    /// not attached. Returns whether the extension was attached.
    pub async fn register(&self, extension: Arc<dyn PlayerExtension>) -> bool {
        if !extension.active(&self.context) {
            debug!(extension = extension.name(), "extension inactive, not attached");
            return false;
        }

        extension.on_register(&self.context).await;
        let mut extensions = self.extensions.write().unwrap_or_else(|e| e.into_inner());
        extensions.push(extension);
        true
    }

    /// Detach an extension by name; returns whether one was detached
    pub async fn unregister(&self, name: &str) -> bool {
        let removed = {
            let mut extensions = self.extensions.write().unwrap_or_else(|e| e.into_inner());
            match extensions.iter().position(|e| e.name() == name) {
                Some(index) => Some(extensions.remove(index)),
                None => None,
            }
        };

        match removed {
            Some(extension) => {
                extension.on_destroy(&self.context).await;
                true
            }
            None => false,
        }
    }

    /// Detach every extension, running their destroy hooks
    pub async fn destroy_all(&self) {
        let extensions: Vec<_> = {
            let mut extensions = self.extensions.write().unwrap_or_else(|e| e.into_inner());
            extensions.drain(..).collect()
        };

        for extension in extensions {
            extension.on_destroy(&self.context).await;
        }
    }

    /// Number of attached extensions
    pub fn len(&self) -> usize {
        self.extensions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Whether no extensions are attached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run the before-play chain as a fold over the request
    ///
    /// Each extension may rewrite the request or declare it handled, which
    /// stops the chain immediately. A hook error leaves the request as it
    /// was and moves to the next extension.
    pub async fn before_play_hooks(&self, request: PlayRequest) -> HookFlow {
        let mut request = request;

        for extension in self.snapshot() {
            match extension.before_play(&self.context, request.clone()).await {
                Ok(HookFlow::Continue(next)) => request = next,
                Ok(HookFlow::Handled(response)) => {
                    debug!(extension = extension.name(), "before-play handled request");
                    return HookFlow::Handled(response);
                }
                Err(err) => {
                    warn!(extension = extension.name(), %err, "before-play hook failed");
                }
            }
        }

        HookFlow::Continue(request)
    }

    /// Run every after-play hook with a frozen outcome snapshot
    ///
    /// Runs unconditionally on success and failure; hook errors are logged
    /// and never abort the chain or the caller's result.
    pub async fn after_play_hooks(&self, outcome: &PlayOutcome) {
        for extension in self.snapshot() {
            if let Err(err) = extension.after_play(&self.context, outcome).await {
                warn!(extension = extension.name(), %err, "after-play hook failed");
            }
        }
    }

    /// Offer the search to extensions; first non-empty result wins
    pub async fn provide_search(
        &self,
        query: &str,
        requester: Option<&str>,
    ) -> Option<SearchResult> {
        for extension in self.snapshot() {
            match extension
                .provide_search(&self.context, query, requester)
                .await
            {
                Ok(Some(result)) if !result.is_empty() => {
                    debug!(extension = extension.name(), query, "search override hit");
                    return Some(result);
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(extension = extension.name(), %err, "search override failed");
                }
            }
        }
        None
    }

    /// Offer stream resolution to extensions; first stream wins
    pub async fn provide_stream(&self, track: &Track) -> Option<StreamInfo> {
        for extension in self.snapshot() {
            match extension.provide_stream(&self.context, track).await {
                Ok(Some(stream)) => {
                    debug!(
                        extension = extension.name(),
                        track = %track.title,
                        "stream override hit"
                    );
                    return Some(stream);
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(extension = extension.name(), %err, "stream override failed");
                }
            }
        }
        None
    }

    fn snapshot(&self) -> Vec<Arc<dyn PlayerExtension>> {
        self.extensions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
