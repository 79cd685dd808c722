//! Surface trait and implementations for playback targets.
//!
//! A [`Surface`] is one rendering plane the engine can load media into,
//! play, fade and seek. The engine drives exactly two of them for the
//! visible crossfade pair, plus hidden ones minted by a [`SurfaceFactory`]
//! for warming the preload cache.
//!
//! The crate provides [`MockSurface`] and [`MockSurfaceFactory`], fully
//! scriptable in-memory surfaces used by the test suite and the demos.
//! Real deployments implement [`Surface`] over their renderer (a video
//! element bridge, a GStreamer pipeline, an mpv handle, ...).

mod mock;

pub use mock::{FadeRecord, MockSurface, MockSurfaceFactory};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::SurfaceError;

/// How much of the current media a surface has buffered.
///
/// Ordered: `Empty < Loading < CanPlay < CanPlayThrough`. The engine
/// gates transitions on `CanPlay` and only takes the reload-skipping
/// fast path at `CanPlayThrough`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReadyState {
    /// No media data is available.
    Empty,
    /// A source is attached and data is being fetched.
    Loading,
    /// Enough data to start playback is available.
    CanPlay,
    /// Playback can run to the end without rebuffering.
    CanPlayThrough,
}

/// A cubic-bezier easing curve for opacity fades.
///
/// The two control points use the same convention as CSS
/// `cubic-bezier(x1, y1, x2, y2)`. The engine hands the curve to
/// [`Surface::begin_fade`]; how it is interpolated is the renderer's
/// business.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Easing {
    /// X of the first control point.
    pub x1: f32,
    /// Y of the first control point.
    pub y1: f32,
    /// X of the second control point.
    pub x2: f32,
    /// Y of the second control point.
    pub y2: f32,
}

impl Easing {
    /// The material-style standard curve, `cubic-bezier(0.4, 0.0, 0.2, 1.0)`.
    ///
    /// Eases in gently and settles slowly, which reads as a soft
    /// dissolve on ambient displays.
    pub const STANDARD: Easing = Easing {
        x1: 0.4,
        y1: 0.0,
        x2: 0.2,
        y2: 1.0,
    };
}

impl Default for Easing {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// One playback plane the engine can source, fade and seek.
///
/// The engine holds surfaces as `Arc<dyn Surface>` and calls them from
/// its own task and from the in-flight transition task, so implementations
/// must be internally synchronized.
///
/// # Implementation Notes
///
/// - Methods take `&self` - use interior mutability (`Mutex`, `RwLock`) if needed
/// - The `wait_*` methods are long-poll style: they stay pending until the
///   condition holds. The engine always wraps them in its own timeouts, so
///   an implementation never needs to time out on its own
/// - Setters are fire-and-forget commands to the renderer; getters report
///   the renderer's last known state
///
/// # Sketch
///
/// ```ignore
/// struct MpvSurface { handle: Mutex<mpv::Handle>, label: String }
///
/// #[async_trait]
/// impl Surface for MpvSurface {
///     fn label(&self) -> &str { &self.label }
///     fn set_source(&self, url: &Url) { self.handle.lock().loadfile(url.as_str()); }
///     /* ... */
/// }
/// ```
#[async_trait]
pub trait Surface: Send + Sync {
    /// Human-readable name for logging.
    fn label(&self) -> &str;

    /// Attaches a media source. Resets buffered state for the new media.
    fn set_source(&self, url: &Url);

    /// Detaches the current media source and releases its buffers.
    fn clear_source(&self);

    /// The currently attached source, if any.
    fn source(&self) -> Option<Url>;

    /// Begins fetching the attached source.
    fn load(&self);

    /// Starts playback.
    ///
    /// Resolves once the renderer has accepted the play request. Errors
    /// are recoverable; the engine aborts the affected transition and
    /// returns to idle.
    async fn play(&self) -> Result<(), SurfaceError>;

    /// Pauses playback. The attached source is kept.
    fn pause(&self);

    /// Whether playback is currently paused.
    fn is_paused(&self) -> bool;

    /// Sets whether the media loops at its end.
    fn set_looping(&self, looping: bool);

    /// Whether the media loops at its end.
    fn is_looping(&self) -> bool;

    /// Mutes or unmutes audio output.
    fn set_muted(&self, muted: bool);

    /// Jumps opacity to a value in `0.0..=1.0` without animating.
    fn set_opacity(&self, opacity: f32);

    /// The current opacity.
    fn opacity(&self) -> f32;

    /// Starts an animated opacity fade toward `target`.
    ///
    /// The fade runs renderer-side; the engine does not wait for it and
    /// never interpolates opacity itself.
    fn begin_fade(&self, target: f32, duration: Duration, easing: Easing);

    /// Marks this surface as the active (front) plane.
    ///
    /// Purely presentational - renderers use it for styling or z-order.
    fn set_active(&self, active: bool);

    /// How much of the current media is buffered.
    fn ready_state(&self) -> ReadyState;

    /// Resolves once [`ready_state`](Self::ready_state) reaches `at_least`.
    ///
    /// Resolves immediately if the state is already sufficient. Returns
    /// an error as soon as the media fails instead, so a broken load
    /// never leaves the caller hanging.
    async fn wait_ready(&self, at_least: ReadyState) -> Result<(), SurfaceError>;

    /// Duration of the current media, once metadata is known.
    fn duration(&self) -> Option<Duration>;

    /// Resolves with the media duration once metadata arrives.
    ///
    /// Resolves immediately if metadata is already known. Stays pending
    /// if the media never exposes a duration.
    async fn wait_metadata(&self) -> Option<Duration>;

    /// Current playback position within the media.
    fn position(&self) -> Duration;

    /// Seeks to a position within the media.
    fn set_position(&self, position: Duration);

    /// Resolves when the surface reports a media failure.
    ///
    /// Stays pending forever on a healthy surface. The engine races this
    /// against the fade hold so a mid-fade failure aborts the transition.
    async fn wait_failure(&self) -> SurfaceError;
}

/// Mints hidden surfaces for the preload cache.
///
/// Cache surfaces are never shown; they exist so the renderer fetches and
/// decodes media ahead of time. Each entry gets its own surface, which is
/// detached again when the entry is evicted or the cache is cleared.
///
/// # Example
///
/// ```
/// use loopsync::{MockSurfaceFactory, Surface, SurfaceFactory};
///
/// let factory = MockSurfaceFactory::ready();
/// let surface = factory.create();
/// assert!(surface.source().is_none());
/// ```
pub trait SurfaceFactory: Send + Sync {
    /// Creates a fresh, detached surface.
    fn create(&self) -> Arc<dyn Surface>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_state_ordering() {
        assert!(ReadyState::Empty < ReadyState::Loading);
        assert!(ReadyState::Loading < ReadyState::CanPlay);
        assert!(ReadyState::CanPlay < ReadyState::CanPlayThrough);
        assert!(ReadyState::CanPlayThrough >= ReadyState::CanPlay);
    }

    #[test]
    fn test_easing_default_is_standard() {
        assert_eq!(Easing::default(), Easing::STANDARD);
        assert!((Easing::STANDARD.x1 - 0.4).abs() < f32::EPSILON);
        assert!((Easing::STANDARD.y2 - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_surface_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Arc<dyn Surface>>();
        assert_send_sync::<Arc<dyn SurfaceFactory>>();
    }
}
