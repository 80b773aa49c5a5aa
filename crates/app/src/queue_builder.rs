//! Queue builder — turns one configuration snapshot into the master queue.
//!
//! Pure: the same schedule and settings always give the same queue.

use std::collections::BTreeMap;

use signage_domain::queue::{MediaSlide, QueueItem, StableKey, StoryItem, TipItem};
use signage_domain::schedule::Schedule;
use signage_domain::settings::{MediaEntry, MediaKind, Settings, ZoneStatus};

/// Every item any region may show, in presentation order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MasterQueue {
    pub items: Vec<QueueItem>,
    /// The sort-order overrides that matched, stale references removed.
    pub order: Vec<StableKey>,
}

impl MasterQueue {
    #[must_use]
    pub fn keys(&self) -> Vec<StableKey> {
        self.items.iter().map(QueueItem::key).collect()
    }
}

/// Build the master queue.
///
/// Default order is hero timeline, overview, visible zones, enabled media,
/// enabled stories, then one item per enabled wellness tip. References in
/// the sort-order override come first, in their order; everything else
/// follows in default order.
#[must_use]
pub fn build(schedule: &Schedule, settings: &Settings) -> MasterQueue {
    let statuses = settings.zone_statuses(schedule);
    let mut items = default_items(schedule, settings, &statuses);

    let mut ordered = Vec::new();
    let mut order = Vec::new();
    for reference in &settings.slides.sort_order {
        let Ok(key) = reference.parse::<StableKey>() else {
            tracing::debug!(%reference, "dropping unparsable sort-order reference");
            continue;
        };
        match items.iter().position(|item| item.key() == key) {
            Some(index) => {
                ordered.push(items.remove(index));
                order.push(key);
            }
            None => tracing::debug!(%key, "dropping stale sort-order reference"),
        }
    }
    ordered.append(&mut items);

    if ordered.is_empty() && settings.slides.show_overview {
        ordered.push(QueueItem::Overview {
            dwell: settings.slides.dwell(settings.slides.overview_seconds),
        });
    }

    MasterQueue {
        items: ordered,
        order,
    }
}

fn default_items(
    schedule: &Schedule,
    settings: &Settings,
    statuses: &BTreeMap<String, ZoneStatus>,
) -> Vec<QueueItem> {
    let policy = &settings.slides;
    let mut items = Vec::new();

    let visible: Vec<(&String, ZoneStatus)> = schedule
        .zones
        .iter()
        .filter_map(|zone| {
            let status = statuses.get(zone).copied().unwrap_or(ZoneStatus::Active);
            status.is_visible().then_some((zone, status))
        })
        .collect();

    if policy.show_hero_timeline {
        items.push(QueueItem::HeroTimeline {
            dwell: policy.dwell(policy.hero_seconds),
        });
    }
    if policy.show_overview && !visible.is_empty() {
        items.push(QueueItem::Overview {
            dwell: policy.dwell(policy.overview_seconds),
        });
    }
    items.extend(visible.into_iter().map(|(zone, status)| QueueItem::Sauna {
        zone: zone.clone(),
        status,
        dwell: policy.dwell(policy.zone_seconds.get(zone).copied()),
    }));
    items.extend(
        settings
            .media
            .iter()
            .filter(|media| media.enabled)
            .map(|media| media_item(media, settings)),
    );
    items.extend(
        settings
            .stories
            .iter()
            .filter(|story| story.enabled)
            .map(|story| {
                QueueItem::Story(StoryItem {
                    id: story.id.clone(),
                    title: story.title.clone(),
                    dwell: policy.dwell(story.duration_seconds),
                    scroll: story.scroll,
                    regions: story.regions.clone(),
                })
            }),
    );
    items.extend(
        settings
            .extras
            .wellness_tips
            .iter()
            .filter(|tip| tip.enabled)
            .map(|tip| {
                QueueItem::WellnessTip(TipItem {
                    id: tip.id.clone(),
                    text: tip.text.clone(),
                    dwell: policy.dwell(tip.duration_seconds),
                })
            }),
    );
    items
}

fn media_item(media: &MediaEntry, settings: &Settings) -> QueueItem {
    let slide = MediaSlide {
        id: media.id.clone(),
        url: media.url.clone(),
        dwell: settings.slides.dwell(media.duration_seconds),
        wait_for_completion: media.wait_for_completion,
        muted: media.muted,
        regions: media.regions.clone(),
    };
    match media.kind {
        MediaKind::Image => QueueItem::Image(slide),
        MediaKind::Video => QueueItem::Video(slide),
        MediaKind::Url => QueueItem::Url(slide),
    }
}
