use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use signage_app::ports::{Renderer, SlideContext, SlideHandle};
use signage_domain::error::SignageError;
use signage_domain::id::PairingCode;
use signage_domain::pairing::PairingState;
use signage_domain::queue::{QueueItem, StableKey};
use signage_domain::settings::{Region, Settings};
use signage_domain::time;

/// How long a self-timed video or scrolling story "plays" by default.
const DEFAULT_SIMULATED_MEDIA: Duration = Duration::from_secs(12);

/// What a region currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Slide(StableKey),
    Placeholder,
}

#[derive(Debug, Default)]
struct Surface {
    regions: BTreeMap<Region, Screen>,
    pairing: Option<PairingCode>,
    theme: BTreeMap<String, String>,
}

/// A renderer that logs instead of drawing.
#[derive(Debug)]
pub struct HeadlessRenderer {
    simulated_media: Duration,
    surface: Mutex<Surface>,
}

impl Default for HeadlessRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_SIMULATED_MEDIA)
    }
}

impl HeadlessRenderer {
    /// Self-timed slides report their end after `simulated_media`.
    #[must_use]
    pub fn new(simulated_media: Duration) -> Self {
        Self {
            simulated_media,
            surface: Mutex::default(),
        }
    }

    /// What `region` shows right now.
    #[must_use]
    pub fn screen(&self, region: Region) -> Option<Screen> {
        self.surface().regions.get(&region).cloned()
    }

    /// The pairing code on screen, if any.
    #[must_use]
    pub fn pairing_code(&self) -> Option<PairingCode> {
        self.surface().pairing.clone()
    }

    /// The theme tokens last applied.
    #[must_use]
    pub fn theme(&self) -> BTreeMap<String, String> {
        self.surface().theme.clone()
    }

    fn surface(&self) -> std::sync::MutexGuard<'_, Surface> {
        self.surface.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn missing_url(item: &QueueItem) -> Option<&str> {
    match item {
        QueueItem::Image(media) | QueueItem::Video(media) | QueueItem::Url(media)
            if media.url.trim().is_empty() =>
        {
            Some(media.id.as_str())
        }
        _ => None,
    }
}

impl Renderer for HeadlessRenderer {
    fn render(
        &self,
        region: Region,
        item: &QueueItem,
        ctx: SlideContext,
    ) -> Result<SlideHandle, SignageError> {
        if let Some(id) = missing_url(item) {
            return Err(SignageError::MediaPlayback(format!("media {id} has no url")));
        }

        let key = item.key();
        tracing::info!(%region, %key, kind = ?item.content_type(), "showing slide");
        self.surface()
            .regions
            .insert(region, Screen::Slide(key));

        if !item.defers_end() {
            return Ok(SlideHandle::noop());
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            // the controller's deferred-dwell ceiling moves the slide on
            return Ok(SlideHandle::noop());
        };
        let delay = self.simulated_media;
        let task = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            tracing::debug!(region = %ctx.region(), "simulated media finished");
            ctx.ready();
        });
        Ok(SlideHandle::on_release(move || task.abort()))
    }

    fn show_placeholder(&self, region: Region) {
        tracing::info!(%region, "showing placeholder");
        self.surface().regions.insert(region, Screen::Placeholder);
    }

    fn apply_theme(&self, settings: &Settings) {
        tracing::info!(
            tokens = settings.theme.len(),
            slide_style = settings.slide_style.len(),
            "applying theme"
        );
        self.surface().theme = settings.theme.clone();
    }

    fn show_pairing(&self, pairing: Option<&PairingState>) {
        match pairing {
            Some(state) => {
                let remaining = state.remaining(time::now());
                tracing::info!(
                    code = %state.code,
                    remaining_secs = remaining.as_secs(),
                    "showing pairing code"
                );
                self.surface().pairing = Some(state.code.clone());
            }
            None => {
                tracing::info!("hiding pairing screen");
                self.surface().pairing = None;
            }
        }
    }
}
