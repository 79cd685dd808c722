//! Bounded preload cache keyed by normalized media URLs.
//!
//! Each cache entry owns a hidden surface minted by the configured
//! [`SurfaceFactory`]. Requesting an entry starts a background load;
//! readiness and failure flow back to the engine as internal signals so
//! the cache itself is only ever touched from the engine task.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use tokio::sync::mpsc;
use url::Url;

use super::Internal;
use crate::surface::{ReadyState, Surface, SurfaceFactory};

/// Resolves a raw URL against the display's base URL.
///
/// Relative paths and absolute spellings of the same media collapse to
/// one canonical key, so `/videos/a.mp4` and `http://host/videos/a.mp4`
/// share a cache entry.
pub(crate) fn normalize_url(base: &Url, raw: &str) -> Result<Url, url::ParseError> {
    base.join(raw)
}

struct CacheEntry {
    surface: Arc<dyn Surface>,
    ready: bool,
}

/// URL-keyed cache of pre-warmed hidden surfaces.
///
/// Bounded: when full, the least recently requested entry is detached
/// and dropped. An entry whose load errors stays cached but never turns
/// ready, so a broken URL is fetched at most once.
pub(crate) struct PreloadCache {
    entries: LruCache<Url, CacheEntry>,
    factory: Arc<dyn SurfaceFactory>,
    signals: mpsc::Sender<Internal>,
}

impl PreloadCache {
    pub(crate) fn new(
        factory: Arc<dyn SurfaceFactory>,
        signals: mpsc::Sender<Internal>,
        capacity: usize,
    ) -> Self {
        Self {
            entries: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
            factory,
            signals,
        }
    }

    /// Starts warming `url` unless an entry for it already exists.
    ///
    /// Returns whether a new load was started. The load itself runs in a
    /// background task after `delay`; the entry is inserted immediately so
    /// duplicate requests in the same batch collapse to one load.
    pub(crate) fn request(
        &mut self,
        url: Url,
        delay: Duration,
        batch: Option<(usize, usize)>,
    ) -> bool {
        if self.entries.get(&url).is_some() {
            tracing::debug!("Already cached or loading, skipping preload: {}", url);
            return false;
        }

        let surface = self.factory.create();
        surface.set_muted(true);
        surface.set_looping(true);

        let entry = CacheEntry {
            surface: surface.clone(),
            ready: false,
        };
        if let Some((evicted_url, evicted)) = self.entries.push(url.clone(), entry) {
            tracing::debug!("Cache full, evicting least recently used: {}", evicted_url);
            detach(evicted.surface.as_ref());
        }

        spawn_load(surface, url, delay, batch, self.signals.clone());
        true
    }

    /// Marks the entry for `url` ready. Returns false if the entry is
    /// gone (evicted or cleared while its load was in flight).
    pub(crate) fn mark_ready(&mut self, url: &Url) -> bool {
        match self.entries.get_mut(url) {
            Some(entry) => {
                entry.ready = true;
                true
            }
            None => false,
        }
    }

    /// Whether a fully warmed entry exists for `url`.
    pub(crate) fn is_ready(&mut self, url: &Url) -> bool {
        self.entries.get(url).is_some_and(|entry| entry.ready)
    }

    /// Detaches every cached surface and empties the cache.
    ///
    /// Returns how many entries were dropped.
    pub(crate) fn clear(&mut self) -> usize {
        let count = self.entries.len();
        for (_, entry) in self.entries.iter() {
            detach(entry.surface.as_ref());
        }
        self.entries.clear();
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn ready_count(&self) -> usize {
        self.entries.iter().filter(|(_, entry)| entry.ready).count()
    }
}

/// Stops a cached surface and releases its media buffers.
fn detach(surface: &dyn Surface) {
    surface.pause();
    surface.clear_source();
}

fn spawn_load(
    surface: Arc<dyn Surface>,
    url: Url,
    delay: Duration,
    batch: Option<(usize, usize)>,
    signals: mpsc::Sender<Internal>,
) {
    tokio::spawn(async move {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        surface.set_source(&url);
        surface.load();

        // Full buffering preferred, but enough-to-start also counts.
        let outcome = tokio::select! {
            result = surface.wait_ready(ReadyState::CanPlayThrough) => result,
            result = surface.wait_ready(ReadyState::CanPlay) => result,
        };
        match outcome {
            Ok(()) => {
                let signal = Internal::PreloadReady {
                    url: url.clone(),
                    batch,
                };
                if signals.send(signal).await.is_err() {
                    return;
                }
                prime(surface.as_ref()).await;
            }
            Err(error) => {
                let signal = Internal::PreloadFailed {
                    url,
                    reason: error.to_string(),
                };
                let _ = signals.send(signal).await;
            }
        }
    });
}

/// Warms the decoder: start playback briefly, then park at the first frame.
async fn prime(surface: &dyn Surface) {
    match surface.play().await {
        Ok(()) => {
            surface.pause();
            surface.set_position(Duration::ZERO);
        }
        // Autoplay-style rejections are fine here, the data is buffered.
        Err(error) => tracing::debug!("Priming skipped for {}: {}", surface.label(), error),
    }
}
