//! Display layout and per-region page configuration.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::queue::ContentType;

/// An independent display area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Left,
    Right,
}

impl Region {
    /// Both regions, left first.
    pub const ALL: [Self; 2] = [Self::Left, Self::Right];
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => f.write_str("left"),
            Self::Right => f.write_str("right"),
        }
    }
}

/// How the screen is divided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    #[default]
    Single,
    Split,
}

/// Which slice of the master queue a region draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentSource {
    #[default]
    Master,
    ScheduleOnly,
    MediaOnly,
    StoryOnly,
}

impl ContentSource {
    /// Content types admitted by this source.
    #[must_use]
    pub fn content_types(self) -> &'static [ContentType] {
        match self {
            Self::Master => &ContentType::ALL,
            Self::ScheduleOnly => &[
                ContentType::Overview,
                ContentType::HeroTimeline,
                ContentType::Sauna,
            ],
            Self::MediaOnly => &[ContentType::Image, ContentType::Video, ContentType::Url],
            Self::StoryOnly => &[ContentType::Story],
        }
    }
}

/// Configuration of one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageConfig {
    pub enabled: bool,
    pub source: ContentSource,
    /// When set, every slide in the region stays this long.
    pub fixed_dwell_seconds: Option<u32>,
    /// Narrows the source filter; empty means no narrowing.
    pub allowed_types: Vec<ContentType>,
    /// Ordered references (`sauna:<name>`, `media:<id>`, …).
    pub playlist: Vec<String>,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            source: ContentSource::Master,
            fixed_dwell_seconds: None,
            allowed_types: Vec::new(),
            playlist: Vec::new(),
        }
    }
}

impl PageConfig {
    /// The region-wide dwell override, if any.
    #[must_use]
    pub fn fixed_dwell(&self) -> Option<Duration> {
        self.fixed_dwell_seconds
            .filter(|secs| *secs > 0)
            .map(|secs| Duration::from_secs(u64::from(secs)))
    }
}

/// Screen layout plus both regions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DisplayConfig {
    pub layout: LayoutMode,
    pub left: PageConfig,
    pub right: PageConfig,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            layout: LayoutMode::Single,
            left: PageConfig::default(),
            right: PageConfig {
                enabled: false,
                ..PageConfig::default()
            },
        }
    }
}

impl DisplayConfig {
    /// Page configuration for a region.
    #[must_use]
    pub fn page(&self, region: Region) -> &PageConfig {
        match region {
            Region::Left => &self.left,
            Region::Right => &self.right,
        }
    }

    /// Whether the region shows anything; the right region needs a split layout.
    #[must_use]
    pub fn is_enabled(&self, region: Region) -> bool {
        match region {
            Region::Left => self.left.enabled,
            Region::Right => self.layout == LayoutMode::Split && self.right.enabled,
        }
    }
}
