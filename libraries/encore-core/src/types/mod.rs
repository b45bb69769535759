//! Domain types for the Encore playback orchestrator

mod filter;
mod ids;
mod stream;
mod track;

pub use filter::{AudioFilter, FilterCategory};
pub use ids::GuildId;
pub use stream::{AudioStream, StreamInfo, StreamKind};
pub use track::{Playlist, SearchResult, Track};
