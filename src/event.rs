//! Runtime events for monitoring playback transitions.
//!
//! Events are non-fatal notifications about engine behavior. The engine
//! keeps running after events are emitted - they're for logging/metrics
//! and for driving UI state, not error handling.

use std::sync::Arc;
use std::time::Duration;

/// Runtime events emitted during crossfades and clock sync.
///
/// These are informational events, not errors. The engine continues
/// running after any event is emitted. Use the [`EventCallback`] to
/// log these or update metrics.
///
/// # Example
///
/// ```
/// use loopsync::EngineEvent;
///
/// fn handle_event(event: EngineEvent) {
///     match event {
///         EngineEvent::TransitionStarted { from_index, to_index } => {
///             eprintln!("crossfade {} -> {}", from_index, to_index);
///         }
///         EngineEvent::TransitionCompleted => {
///             eprintln!("crossfade complete");
///         }
///         EngineEvent::TransitionFailed { reason } => {
///             eprintln!("crossfade failed: {}", reason);
///         }
///         EngineEvent::DriftCorrected { amount } => {
///             eprintln!("resynced, drift was {:?}", amount);
///         }
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A crossfade was accepted and is now in flight.
    ///
    /// Exactly one transition runs at a time. Requests arriving while one
    /// is in flight are dropped (logged, never queued) and do not produce
    /// this event.
    TransitionStarted {
        /// Index of the currently visible surface (0 or 1).
        from_index: usize,
        /// Index of the surface the new media fades in on.
        to_index: usize,
    },

    /// The in-flight crossfade finished and the surface roles swapped.
    ///
    /// The surface that faded in is now active; the old one is paused
    /// with its media kept for instant reuse.
    TransitionCompleted,

    /// The in-flight crossfade was aborted.
    ///
    /// The engine returns to idle and the next play request proceeds
    /// normally. The reason is a stringified
    /// [`TransitionError`](crate::TransitionError).
    TransitionFailed {
        /// Why the transition was aborted.
        reason: String,
    },

    /// The periodic drift check snapped the active loop back in phase.
    ///
    /// Emitted when the active surface's playback position had diverged
    /// from the wall-clock-derived offset by more than the configured
    /// threshold.
    DriftCorrected {
        /// How far playback had drifted before the seek.
        amount: Duration,
    },
}

/// Callback type for receiving runtime events.
///
/// Register an event callback via [`EngineBuilder::on_event()`] to receive
/// notifications about transition lifecycle and drift corrections.
///
/// [`EngineBuilder::on_event()`]: crate::EngineBuilder::on_event
///
/// # Example
///
/// ```ignore
/// use loopsync::{CrossfadeEngine, EngineEvent};
///
/// let engine = CrossfadeEngine::builder()
///     .on_event(|event| {
///         tracing::info!(?event, "engine event");
///     })
///     .start()?;
/// ```
pub type EventCallback = Arc<dyn Fn(EngineEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// This is a convenience function for creating event callbacks without
/// manually wrapping in `Arc`.
///
/// # Example
///
/// ```
/// use loopsync::{event_callback, EngineEvent};
///
/// let callback = event_callback(|event| {
///     println!("Got event: {:?}", event);
/// });
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(EngineEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}
