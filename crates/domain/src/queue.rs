//! Queue items — the closed set of things a region can show.
//!
//! Every item exposes a [`StableKey`] so that queues rebuilt from a new
//! configuration snapshot can be matched against playlists and against the
//! previously shown slide.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;
use crate::settings::{Region, ZoneStatus};

/// Kind of content, used by region filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentType {
    Overview,
    HeroTimeline,
    Sauna,
    Image,
    Video,
    Url,
    Story,
    WellnessTip,
}

impl ContentType {
    /// Every content type, in default queue order.
    pub const ALL: [Self; 8] = [
        Self::HeroTimeline,
        Self::Overview,
        Self::Sauna,
        Self::Image,
        Self::Video,
        Self::Url,
        Self::Story,
        Self::WellnessTip,
    ];
}

/// Deterministic identity of a queue item: type plus identifier.
///
/// Textual form: `overview`, `hero-timeline`, `sauna:<name>`,
/// `media:<id>`, `story:<id>`, `wellness:<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StableKey {
    Overview,
    HeroTimeline,
    Sauna(String),
    Media(String),
    Story(String),
    Wellness(String),
}

impl StableKey {
    /// Content types an item with this key may have.
    #[must_use]
    pub fn content_types(&self) -> &'static [ContentType] {
        match self {
            Self::Overview => &[ContentType::Overview],
            Self::HeroTimeline => &[ContentType::HeroTimeline],
            Self::Sauna(_) => &[ContentType::Sauna],
            Self::Media(_) => &[ContentType::Image, ContentType::Video, ContentType::Url],
            Self::Story(_) => &[ContentType::Story],
            Self::Wellness(_) => &[ContentType::WellnessTip],
        }
    }
}

impl fmt::Display for StableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overview => f.write_str("overview"),
            Self::HeroTimeline => f.write_str("hero-timeline"),
            Self::Sauna(name) => write!(f, "sauna:{name}"),
            Self::Media(id) => write!(f, "media:{id}"),
            Self::Story(id) => write!(f, "story:{id}"),
            Self::Wellness(id) => write!(f, "wellness:{id}"),
        }
    }
}

impl FromStr for StableKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "overview" => return Ok(Self::Overview),
            "hero-timeline" => return Ok(Self::HeroTimeline),
            _ => {}
        }
        let (kind, id) = s
            .split_once(':')
            .filter(|(_, id)| !id.is_empty())
            .ok_or_else(|| ValidationError::InvalidReference(s.to_string()))?;
        let id = id.to_string();
        match kind {
            "sauna" => Ok(Self::Sauna(id)),
            "media" => Ok(Self::Media(id)),
            "story" => Ok(Self::Story(id)),
            "wellness" => Ok(Self::Wellness(id)),
            _ => Err(ValidationError::InvalidReference(s.to_string())),
        }
    }
}

impl Serialize for StableKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StableKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Interstitial media (image, video or embedded page).
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSlide {
    pub id: String,
    pub url: String,
    pub dwell: Option<Duration>,
    /// Videos only: stay until playback completes.
    pub wait_for_completion: bool,
    /// Videos only: whether the clip plays without sound.
    pub muted: bool,
    /// Empty means every region.
    pub regions: Vec<Region>,
}

/// A narrative story slide.
#[derive(Debug, Clone, PartialEq)]
pub struct StoryItem {
    pub id: String,
    pub title: String,
    pub dwell: Option<Duration>,
    /// The renderer scrolls the story and reports when it reached the end.
    pub scroll: bool,
    pub regions: Vec<Region>,
}

/// A single wellness tip.
#[derive(Debug, Clone, PartialEq)]
pub struct TipItem {
    pub id: String,
    pub text: String,
    pub dwell: Option<Duration>,
}

/// Something a region can show.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueItem {
    Overview { dwell: Option<Duration> },
    HeroTimeline { dwell: Option<Duration> },
    Sauna {
        zone: String,
        status: ZoneStatus,
        dwell: Option<Duration>,
    },
    Image(MediaSlide),
    Video(MediaSlide),
    Url(MediaSlide),
    Story(StoryItem),
    WellnessTip(TipItem),
}

impl QueueItem {
    /// The item's stable identity.
    #[must_use]
    pub fn key(&self) -> StableKey {
        match self {
            Self::Overview { .. } => StableKey::Overview,
            Self::HeroTimeline { .. } => StableKey::HeroTimeline,
            Self::Sauna { zone, .. } => StableKey::Sauna(zone.clone()),
            Self::Image(m) | Self::Video(m) | Self::Url(m) => StableKey::Media(m.id.clone()),
            Self::Story(s) => StableKey::Story(s.id.clone()),
            Self::WellnessTip(t) => StableKey::Wellness(t.id.clone()),
        }
    }

    /// The item's content type.
    #[must_use]
    pub fn content_type(&self) -> ContentType {
        match self {
            Self::Overview { .. } => ContentType::Overview,
            Self::HeroTimeline { .. } => ContentType::HeroTimeline,
            Self::Sauna { .. } => ContentType::Sauna,
            Self::Image(_) => ContentType::Image,
            Self::Video(_) => ContentType::Video,
            Self::Url(_) => ContentType::Url,
            Self::Story(_) => ContentType::Story,
            Self::WellnessTip(_) => ContentType::WellnessTip,
        }
    }

    /// Dwell configured for this item by the settings, if any.
    #[must_use]
    pub fn configured_dwell(&self) -> Option<Duration> {
        match self {
            Self::Overview { dwell } | Self::HeroTimeline { dwell } | Self::Sauna { dwell, .. } => {
                *dwell
            }
            Self::Image(m) | Self::Video(m) | Self::Url(m) => m.dwell,
            Self::Story(s) => s.dwell,
            Self::WellnessTip(t) => t.dwell,
        }
    }

    /// Whether the renderer determines when this slide ends.
    #[must_use]
    pub fn defers_end(&self) -> bool {
        match self {
            Self::Video(m) => m.wait_for_completion,
            Self::Story(s) => s.scroll,
            _ => false,
        }
    }

    /// Whether the slide produces sound and must silence background audio.
    #[must_use]
    pub fn is_audible(&self) -> bool {
        matches!(self, Self::Video(m) if !m.muted)
    }

    /// Whether the item may be shown in `region`.
    #[must_use]
    pub fn allowed_in(&self, region: Region) -> bool {
        let regions = match self {
            Self::Image(m) | Self::Video(m) | Self::Url(m) => &m.regions,
            Self::Story(s) => &s.regions,
            _ => return true,
        };
        regions.is_empty() || regions.contains(&region)
    }

    /// Remote asset worth warming up before the slide is shown.
    #[must_use]
    pub fn preload_url(&self) -> Option<&str> {
        match self {
            Self::Image(m) | Self::Video(m) => Some(m.url.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(wait: bool, muted: bool) -> QueueItem {
        QueueItem::Video(MediaSlide {
            id: "7".to_string(),
            url: "https://cdn.example/clip.mp4".to_string(),
            dwell: None,
            wait_for_completion: wait,
            muted,
            regions: vec![Region::Right],
        })
    }

    #[test]
    fn should_parse_every_reference_form() {
        let cases = [
            ("overview", StableKey::Overview),
            ("hero-timeline", StableKey::HeroTimeline),
            ("sauna:Sauna A", StableKey::Sauna("Sauna A".to_string())),
            ("media:5", StableKey::Media("5".to_string())),
            ("story:intro", StableKey::Story("intro".to_string())),
            ("wellness:w1", StableKey::Wellness("w1".to_string())),
        ];
        for (text, key) in cases {
            assert_eq!(text.parse::<StableKey>().unwrap(), key);
            assert_eq!(key.to_string(), text);
        }
    }

    #[test]
    fn should_reject_unknown_or_empty_references() {
        assert!("poster:1".parse::<StableKey>().is_err());
        assert!("media:".parse::<StableKey>().is_err());
        assert!("sauna".parse::<StableKey>().is_err());
    }

    #[test]
    fn should_key_all_media_kinds_under_media() {
        assert_eq!(video(false, true).key(), StableKey::Media("7".to_string()));
        assert_eq!(
            StableKey::Media("7".to_string()).content_types(),
            &[ContentType::Image, ContentType::Video, ContentType::Url]
        );
    }

    #[test]
    fn should_defer_only_videos_waiting_for_completion() {
        assert!(video(true, true).defers_end());
        assert!(!video(false, true).defers_end());
        assert!(!QueueItem::Overview { dwell: None }.defers_end());
    }

    #[test]
    fn should_report_unmuted_video_as_audible() {
        assert!(video(false, false).is_audible());
        assert!(!video(false, true).is_audible());
    }

    #[test]
    fn should_respect_region_tags() {
        let item = video(false, true);
        assert!(item.allowed_in(Region::Right));
        assert!(!item.allowed_in(Region::Left));
        assert!(QueueItem::Overview { dwell: None }.allowed_in(Region::Left));
    }
}
