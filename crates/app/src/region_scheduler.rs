//! Region scheduler — picks a region's queue out of the master queue.
//!
//! Pure: the same master queue and display configuration always give the
//! same region queue.

use std::collections::BTreeSet;

use signage_domain::queue::{ContentType, QueueItem, StableKey};
use signage_domain::settings::{DisplayConfig, PageConfig, Region};

use crate::queue_builder::MasterQueue;

/// Build the queue of one region.
///
/// A disabled region gets nothing. Otherwise the master queue is filtered
/// by the region's allowed content types and the items' region tags. With
/// a playlist, each entry claims one matching item, in playlist order, and
/// nothing else is shown.
#[must_use]
pub fn schedule(master: &MasterQueue, display: &DisplayConfig, region: Region) -> Vec<QueueItem> {
    if !display.is_enabled(region) {
        return Vec::new();
    }
    let page = display.page(region);
    let playlist = parse_playlist(page);
    let allowed = allowed_types(page, &playlist);

    let mut candidates: Vec<Option<&QueueItem>> = master
        .items
        .iter()
        .filter(|item| allowed.contains(&item.content_type()) && item.allowed_in(region))
        .map(Some)
        .collect();

    if playlist.is_empty() {
        return candidates.into_iter().flatten().cloned().collect();
    }

    let mut queue = Vec::with_capacity(playlist.len());
    for key in &playlist {
        let slot = candidates
            .iter_mut()
            .find(|candidate| candidate.is_some_and(|item| item.key() == *key));
        match slot.and_then(Option::take) {
            Some(item) => queue.push(item.clone()),
            None => tracing::debug!(%region, %key, "playlist entry has no match"),
        }
    }
    queue
}

/// Content types the region may show: the source filter, narrowed by the
/// page's own list when it has one, plus whatever the playlist names.
fn allowed_types(page: &PageConfig, playlist: &[StableKey]) -> BTreeSet<ContentType> {
    let mut allowed: BTreeSet<ContentType> = page
        .source
        .content_types()
        .iter()
        .copied()
        .filter(|kind| page.allowed_types.is_empty() || page.allowed_types.contains(kind))
        .collect();
    allowed.extend(
        playlist
            .iter()
            .flat_map(|key| key.content_types().iter().copied()),
    );
    allowed
}

fn parse_playlist(page: &PageConfig) -> Vec<StableKey> {
    page.playlist
        .iter()
        .filter_map(|reference| match reference.parse() {
            Ok(key) => Some(key),
            Err(err) => {
                tracing::debug!(%reference, error = %err, "ignoring playlist entry");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use signage_domain::queue::{MediaSlide, StoryItem};
    use signage_domain::settings::{ContentSource, LayoutMode, ZoneStatus};

    fn sauna(zone: &str) -> QueueItem {
        QueueItem::Sauna {
            zone: zone.to_string(),
            status: ZoneStatus::Active,
            dwell: None,
        }
    }

    fn image(id: &str, regions: Vec<Region>) -> QueueItem {
        QueueItem::Image(MediaSlide {
            id: id.to_string(),
            url: format!("https://cdn.example/{id}.jpg"),
            dwell: None,
            wait_for_completion: false,
            muted: true,
            regions,
        })
    }

    fn story(id: &str) -> QueueItem {
        QueueItem::Story(StoryItem {
            id: id.to_string(),
            title: id.to_string(),
            dwell: None,
            scroll: false,
            regions: Vec::new(),
        })
    }

    fn master(items: Vec<QueueItem>) -> MasterQueue {
        MasterQueue {
            items,
            order: Vec::new(),
        }
    }

    fn split() -> DisplayConfig {
        let mut display = DisplayConfig {
            layout: LayoutMode::Split,
            ..DisplayConfig::default()
        };
        display.right.enabled = true;
        display
    }

    fn keys(queue: &[QueueItem]) -> Vec<String> {
        queue.iter().map(|item| item.key().to_string()).collect()
    }

    #[test]
    fn should_pass_master_queue_through_for_master_source() {
        let master = master(vec![QueueItem::Overview { dwell: None }, sauna("A"), image("1", vec![])]);
        let queue = schedule(&master, &DisplayConfig::default(), Region::Left);
        assert_eq!(keys(&queue), ["overview", "sauna:A", "media:1"]);
    }

    #[test]
    fn should_leave_right_region_empty_in_single_layout() {
        let master = master(vec![sauna("A")]);
        let mut display = DisplayConfig::default();
        display.right.enabled = true;
        assert!(schedule(&master, &display, Region::Right).is_empty());
    }

    #[test]
    fn should_filter_by_source_and_region_tags() {
        let master = master(vec![
            sauna("A"),
            image("1", vec![Region::Left]),
            image("2", vec![]),
            story("s"),
        ]);
        let mut display = split();
        display.right.source = ContentSource::MediaOnly;

        let queue = schedule(&master, &display, Region::Right);
        assert_eq!(keys(&queue), ["media:2"]);
    }

    #[test]
    fn should_narrow_source_by_page_allowed_types() {
        let master = master(vec![sauna("A"), image("1", vec![]), story("s")]);
        let mut display = DisplayConfig::default();
        display.left.allowed_types = vec![ContentType::Story, ContentType::Sauna];

        let queue = schedule(&master, &display, Region::Left);
        assert_eq!(keys(&queue), ["sauna:A", "story:s"]);
    }

    #[test]
    fn should_yield_exactly_the_playlist_matches_in_order() {
        let master = master(vec![sauna("A"), sauna("B"), image("5", vec![]), story("s")]);
        let mut display = DisplayConfig::default();
        display.left.source = ContentSource::ScheduleOnly;
        display.left.playlist = vec![
            "story:s".to_string(),
            "sauna:B".to_string(),
            "media:5".to_string(),
        ];

        let queue = schedule(&master, &display, Region::Left);
        assert_eq!(keys(&queue), ["story:s", "sauna:B", "media:5"]);
    }

    #[test]
    fn should_consume_each_item_once_and_skip_unmatched_slots() {
        let master = master(vec![sauna("A"), sauna("B")]);
        let mut display = DisplayConfig::default();
        display.left.playlist = vec![
            "sauna:A".to_string(),
            "sauna:A".to_string(),
            "sauna:Z".to_string(),
            "bogus".to_string(),
        ];

        let queue = schedule(&master, &display, Region::Left);
        assert_eq!(keys(&queue), ["sauna:A"]);
    }

    #[test]
    fn should_give_empty_queue_when_no_playlist_entry_matches() {
        // zone A is hidden and media 5 disabled, so neither reached the master queue
        let master = master(vec![QueueItem::Overview { dwell: None }, sauna("B")]);
        let mut display = split();
        display.left.playlist = vec!["sauna:A".to_string(), "media:5".to_string()];

        assert!(schedule(&master, &display, Region::Left).is_empty());
        assert_eq!(
            keys(&schedule(&master, &display, Region::Right)),
            ["overview", "sauna:B"]
        );
    }
}
