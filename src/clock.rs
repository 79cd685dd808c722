//! Wall-clock source for global loop synchronization.
//!
//! Every display computes its playback position from the same formula:
//! the Unix time modulo the media duration. Machines whose clocks agree
//! (NTP-close is enough) land on the same frame without ever talking to
//! each other.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Source of the shared wall clock used for phase sync.
///
/// The engine never reads [`SystemTime`] directly - it goes through this
/// trait so tests (and replay tooling) can pin the clock to a known value.
pub trait SyncClock: Send + Sync {
    /// Returns the time elapsed since the Unix epoch.
    fn unix_now(&self) -> Duration;
}

/// The real system clock.
///
/// This is the default clock; independent displays stay in sync exactly
/// as well as their NTP does.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SyncClock for SystemClock {
    fn unix_now(&self) -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
    }
}

/// A manually driven clock for tests and demos.
///
/// Starts at the value it is created with and only moves when told to.
///
/// # Example
///
/// ```
/// use loopsync::{ManualClock, SyncClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::new(Duration::from_secs(1_000));
/// clock.advance(Duration::from_secs(30));
/// assert_eq!(clock.unix_now(), Duration::from_secs(1_030));
/// ```
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Duration>,
}

impl ManualClock {
    /// Creates a clock pinned to the given Unix time.
    #[must_use]
    pub fn new(now: Duration) -> Self {
        Self { now: Mutex::new(now) }
    }

    /// Moves the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        *self.now.lock() += delta;
    }

    /// Pins the clock to an absolute Unix time.
    pub fn set(&self, now: Duration) {
        *self.now.lock() = now;
    }
}

impl SyncClock for ManualClock {
    fn unix_now(&self) -> Duration {
        *self.now.lock()
    }
}

/// Computes the globally agreed playback offset for a looping clip.
///
/// Returns `unix_now` modulo the loop duration, or [`Duration::ZERO`] when
/// the duration is unknown or zero. Two machines that call this at the same
/// wall-clock instant get the same offset for the same clip.
///
/// # Example
///
/// ```
/// use loopsync::sync_offset;
/// use std::time::Duration;
///
/// let now = Duration::from_secs(1_695_000_007);
/// let offset = sync_offset(now, Some(Duration::from_secs(10)));
/// assert_eq!(offset, Duration::from_secs(7));
/// ```
#[must_use]
pub fn sync_offset(unix_now: Duration, loop_duration: Option<Duration>) -> Duration {
    match loop_duration {
        Some(duration) if !duration.is_zero() => {
            Duration::from_secs_f64(unix_now.as_secs_f64() % duration.as_secs_f64())
        }
        _ => Duration::ZERO,
    }
}
