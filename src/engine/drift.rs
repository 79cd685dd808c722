//! Periodic drift detection for the active loop.

use std::sync::Arc;
use std::time::Duration;

use crate::clock::{SyncClock, sync_offset};
use crate::surface::Surface;

/// A correction the drift check decided to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Correction {
    /// The wall-clock-derived position the loop should be at.
    pub expected: Duration,
    /// How far actual playback had diverged.
    pub drift: Duration,
}

/// Compares the active loop's position against the shared wall clock.
///
/// Small drift is left alone so playback is not constantly nudged, and
/// apparent drift near the loop's wrap point is ignored: a clip sitting
/// at 9.8s of a 10s loop while the clock says 0.1s is 0.3s off, not 9.7s.
pub(crate) struct DriftMonitor {
    threshold: Duration,
    clock: Arc<dyn SyncClock>,
}

impl DriftMonitor {
    pub(crate) fn new(threshold: Duration, clock: Arc<dyn SyncClock>) -> Self {
        Self { threshold, clock }
    }

    /// Checks one surface, returning the correction to apply if any.
    ///
    /// Only looping, playing media with known nonzero duration is
    /// eligible. The caller applies the seek; this method never touches
    /// the surface.
    pub(crate) fn check(&self, surface: &dyn Surface) -> Option<Correction> {
        if !surface.is_looping() || surface.is_paused() {
            return None;
        }
        let duration = surface.duration().filter(|d| !d.is_zero())?;
        let upper = duration.checked_sub(self.threshold)?;

        let expected = sync_offset(self.clock.unix_now(), Some(duration));
        let drift = expected.abs_diff(surface.position());
        if drift > self.threshold && drift < upper {
            Some(Correction { expected, drift })
        } else {
            None
        }
    }
}
