//! Configuration types for the crossfade engine.

use std::time::Duration;

use crate::surface::Easing;

/// Configuration for transition timing, sync cadence and preloading.
///
/// Use [`EngineConfig::default()`] for the stock ambient-display timings,
/// or customize as needed.
///
/// # Example
///
/// ```
/// use loopsync::EngineConfig;
/// use std::time::Duration;
///
/// let config = EngineConfig {
///     fade_duration: Duration::from_millis(800),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long to wait for the incoming surface to reach `CanPlay`.
    ///
    /// If the readiness signal never arrives, the transition proceeds
    /// anyway so a stalled network cannot freeze the display.
    /// Default: 3 seconds
    pub readiness_timeout: Duration,

    /// How long to wait for duration metadata before phase-syncing.
    ///
    /// If metadata does not arrive in time, the sync seek is skipped and
    /// the media starts from the top.
    /// Default: 1 second
    pub metadata_timeout: Duration,

    /// Pause between starting playback and beginning the opacity fade.
    ///
    /// Lets the first frames decode so the fade reveals moving video,
    /// not a stall.
    /// Default: 50ms
    pub play_settle_delay: Duration,

    /// Duration of the opacity crossfade on both surfaces.
    ///
    /// Default: 1.2 seconds
    pub fade_duration: Duration,

    /// How long the transition holds before swapping surface roles.
    ///
    /// Slightly longer than [`fade_duration`](Self::fade_duration) so the
    /// outgoing surface is only paused once it is fully invisible.
    /// Default: 1.3 seconds
    pub fade_hold: Duration,

    /// Interval between periodic drift checks on the active loop.
    ///
    /// Default: 30 seconds
    pub drift_check_interval: Duration,

    /// Drift below this threshold is left alone.
    ///
    /// The same margin is also kept away from the loop's wrap point, where
    /// an apparent large drift is really a sub-threshold one across the
    /// boundary. Default: 500ms
    pub drift_threshold: Duration,

    /// Spacing between the load starts of a preload batch.
    ///
    /// Staggering keeps a burst of preloads from saturating the link.
    /// Default: 500ms
    pub preload_stagger: Duration,

    /// Delay before preloading an announced follow-up URL.
    ///
    /// Keeps the next clip's load off the network while the current
    /// crossfade is still running. Default: 2 seconds
    pub followup_preload_delay: Duration,

    /// Maximum number of preloaded entries kept warm.
    ///
    /// When the cache is full the least recently requested entry is
    /// detached and dropped. Default: 32
    pub cache_capacity: usize,

    /// Easing curve applied to both opacity fades.
    ///
    /// Default: [`Easing::STANDARD`]
    pub easing: Easing,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            readiness_timeout: Duration::from_secs(3),
            metadata_timeout: Duration::from_secs(1),
            play_settle_delay: Duration::from_millis(50),
            fade_duration: Duration::from_millis(1200),
            fade_hold: Duration::from_millis(1300),
            drift_check_interval: Duration::from_secs(30),
            drift_threshold: Duration::from_millis(500),
            preload_stagger: Duration::from_millis(500),
            followup_preload_delay: Duration::from_secs(2),
            cache_capacity: 32,
            easing: Easing::STANDARD,
        }
    }
}
