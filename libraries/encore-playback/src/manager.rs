//! Session registry
//!
//! Thin factory and lookup boundary over per-guild [`Player`] sessions.
//! Players are cheap handles over shared internals, so the registry hands
//! out clones freely.

use crate::config::PlayerOptions;
use crate::player::Player;
use crate::sink::AudioSink;
use encore_core::GuildId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Creates and tracks one [`Player`] per guild
pub struct PlayerManager {
    options: PlayerOptions,
    players: Mutex<HashMap<GuildId, Player>>,
}

impl PlayerManager {
    /// Create a registry; every session it creates uses `options`
    pub fn new(options: PlayerOptions) -> Self {
        Self {
            options,
            players: Mutex::new(HashMap::new()),
        }
    }

    /// Get the session for `guild_id`, creating one over the given sinks
    /// when none exists
    ///
    /// Idempotent: a second call for the same guild returns the existing
    /// session and ignores the sinks.
    pub fn create(
        &self,
        guild_id: GuildId,
        primary: Arc<dyn AudioSink>,
        tts_sink: Arc<dyn AudioSink>,
    ) -> Player {
        let mut players = self.players.lock().unwrap_or_else(|e| e.into_inner());
        players
            .entry(guild_id)
            .or_insert_with(|| {
                debug!(guild = %guild_id, "creating session");
                Player::new(guild_id, self.options.clone(), primary, tts_sink)
            })
            .clone()
    }

    /// Look up the session for `guild_id`
    pub fn get(&self, guild_id: GuildId) -> Option<Player> {
        self.players
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&guild_id)
            .cloned()
    }

    /// Destroy and drop the session for `guild_id`
    ///
    /// Returns whether a session existed.
    pub async fn destroy(&self, guild_id: GuildId) -> bool {
        let removed = {
            let mut players = self.players.lock().unwrap_or_else(|e| e.into_inner());
            players.remove(&guild_id)
        };

        match removed {
            Some(player) => {
                player.destroy().await;
                true
            }
            None => false,
        }
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.players
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Whether no sessions exist
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Guilds with a live session
    pub fn guild_ids(&self) -> Vec<GuildId> {
        self.players
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlayerError;
    use crate::player::PlayQuery;
    use crate::testing::FakeSink;

    fn manager() -> PlayerManager {
        PlayerManager::new(PlayerOptions::default())
    }

    fn sinks() -> (Arc<FakeSink>, Arc<FakeSink>) {
        (Arc::new(FakeSink::new()), Arc::new(FakeSink::new()))
    }

    #[tokio::test]
    async fn create_is_idempotent() {
        let manager = manager();
        let (primary, tts) = sinks();

        let first = manager.create(GuildId::new(1), primary.clone(), tts.clone());
        let second = manager.create(GuildId::new(1), primary, tts);

        assert_eq!(manager.len(), 1);
        assert_eq!(first.guild_id(), second.guild_id());
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let manager = manager();
        let (p1, t1) = sinks();
        let (p2, t2) = sinks();

        manager.create(GuildId::new(1), p1, t1);
        manager.create(GuildId::new(2), p2, t2);

        assert_eq!(manager.len(), 2);
        let mut ids = manager.guild_ids();
        ids.sort_by_key(|g| g.get());
        assert_eq!(ids, vec![GuildId::new(1), GuildId::new(2)]);
    }

    #[tokio::test]
    async fn destroy_removes_and_tears_down() {
        let manager = manager();
        let (primary, tts) = sinks();
        let player = manager.create(GuildId::new(1), primary, tts);

        assert!(manager.destroy(GuildId::new(1)).await);
        assert!(!manager.destroy(GuildId::new(1)).await);
        assert!(manager.get(GuildId::new(1)).is_none());
        assert!(manager.is_empty());

        // The handle we kept is dead too
        let err = player
            .play(PlayQuery::Search("song".to_string()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PlayerError::Destroyed(_)));
    }
}
