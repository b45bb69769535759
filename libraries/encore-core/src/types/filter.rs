//! Audio filter domain type and the predefined catalog

use serde::{Deserialize, Serialize};

/// Category tag for grouping filters in host UIs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterCategory {
    /// Frequency shaping (bass boost, treble, ...)
    Equalizer,

    /// Speed / pitch changes
    Tempo,

    /// Spatial and atmosphere effects
    Ambient,

    /// Voice-oriented effects
    Vocal,

    /// User-supplied ad-hoc filter
    Custom,
}

/// A named audio transform
///
/// `value` is an ffmpeg filter-graph fragment; active filters are composed
/// by comma-joining their fragments into a single `-af` argument. Filters
/// are stateless and interchangeable by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioFilter {
    /// Filter name (unique within the active set)
    pub name: String,

    /// ffmpeg filter-graph fragment
    pub value: String,

    /// Human-readable description
    pub description: String,

    /// Category tag
    pub category: FilterCategory,
}

impl AudioFilter {
    /// Create a custom ad-hoc filter
    pub fn custom(
        name: impl Into<String>,
        value: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            description: description.into(),
            category: FilterCategory::Custom,
        }
    }

    /// The predefined filter catalog
    pub fn catalog() -> Vec<AudioFilter> {
        fn preset(
            name: &str,
            value: &str,
            description: &str,
            category: FilterCategory,
        ) -> AudioFilter {
            AudioFilter {
                name: name.to_string(),
                value: value.to_string(),
                description: description.to_string(),
                category,
            }
        }

        vec![
            preset(
                "bassboost",
                "bass=g=10",
                "Boost low frequencies",
                FilterCategory::Equalizer,
            ),
            preset(
                "trebleboost",
                "treble=g=8",
                "Boost high frequencies",
                FilterCategory::Equalizer,
            ),
            preset(
                "nightcore",
                "asetrate=48000*1.25,aresample=48000",
                "Speed and pitch up",
                FilterCategory::Tempo,
            ),
            preset(
                "daycore",
                "asetrate=48000*0.8,aresample=48000",
                "Slow and pitch down",
                FilterCategory::Tempo,
            ),
            preset(
                "vaporwave",
                "asetrate=48000*0.85,aresample=48000,atempo=1.1",
                "Slowed with retained tempo",
                FilterCategory::Tempo,
            ),
            preset(
                "eightd",
                "apulsator=hz=0.09",
                "Rotating 8D audio",
                FilterCategory::Ambient,
            ),
            preset(
                "lofi",
                "aresample=8000,aformat=sample_fmts=s16:channel_layouts=stereo",
                "Low-fidelity radio sound",
                FilterCategory::Ambient,
            ),
            preset(
                "tremolo",
                "tremolo=f=6.5:d=0.8",
                "Amplitude wobble",
                FilterCategory::Ambient,
            ),
            preset(
                "karaoke",
                "pan=stereo|c0=c0-c1|c1=c1-c0",
                "Suppress center-channel vocals",
                FilterCategory::Vocal,
            ),
            preset(
                "mono",
                "pan=mono|c0=.5*c0+.5*c1",
                "Collapse to mono",
                FilterCategory::Vocal,
            ),
        ]
    }

    /// Look up a catalog filter by name
    pub fn by_name(name: &str) -> Option<AudioFilter> {
        Self::catalog().into_iter().find(|f| f.name == name)
    }
}
