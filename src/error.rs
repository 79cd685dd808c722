//! Error types for loopsync.
//!
//! Errors are split into two categories:
//! - **Fatal errors** ([`EngineError`]): Prevent the engine from starting
//! - **Recoverable failures**: Runtime issues surfaced via
//!   [`EventCallback`](crate::EventCallback) as `TransitionFailed` events

/// Fatal errors that prevent a crossfade engine from starting.
///
/// These errors are returned from [`EngineBuilder::start()`] and indicate
/// that the engine cannot be created. Runtime issues (a media load that
/// errors, a playback start that is rejected) are handled via the event
/// callback instead.
///
/// [`EngineBuilder::start()`]: crate::EngineBuilder::start
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No playback surfaces were configured before starting.
    #[error("no playback surfaces configured - use surfaces() to provide two")]
    NoSurfaces,

    /// The same surface was provided for both playback slots.
    #[error("playback surfaces must be two distinct surfaces")]
    IdenticalSurfaces,

    /// No surface factory was configured before starting.
    #[error("no surface factory configured - the preload cache needs one to mint hidden surfaces")]
    NoSurfaceFactory,

    /// The configured base URL could not be parsed.
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl {
        /// The base URL that failed to parse.
        url: String,
        /// Why it failed to parse.
        reason: String,
    },

    /// The engine task has already stopped.
    #[error("engine is not running")]
    EngineStopped,
}

/// Errors that can occur within a [`Surface`](crate::Surface) implementation.
///
/// Surface errors are recoverable - the engine aborts the affected transition,
/// emits a [`EngineEvent::TransitionFailed`] and returns to idle.
///
/// [`EngineEvent::TransitionFailed`]: crate::EngineEvent::TransitionFailed
#[derive(Debug, Clone, thiserror::Error)]
pub enum SurfaceError {
    /// The media source failed to load or decode.
    #[error("media load failed: {reason}")]
    Load {
        /// Description of what went wrong.
        reason: String,
    },

    /// The renderer refused to start playback.
    #[error("playback start rejected: {reason}")]
    PlayRejected {
        /// Why playback could not start.
        reason: String,
    },
}

impl SurfaceError {
    /// Creates a load error with the given reason.
    pub fn load(reason: impl Into<String>) -> Self {
        Self::Load {
            reason: reason.into(),
        }
    }

    /// Creates a playback rejection error with the given reason.
    pub fn play_rejected(reason: impl Into<String>) -> Self {
        Self::PlayRejected {
            reason: reason.into(),
        }
    }
}

/// Why an in-flight transition was aborted.
///
/// Carried (stringified) in [`EngineEvent::TransitionFailed`]. Every abort
/// path releases the single-flight guard, so the next play request starts
/// from a clean idle state.
///
/// [`EngineEvent::TransitionFailed`]: crate::EngineEvent::TransitionFailed
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransitionError {
    /// The incoming surface reported a media error while preparing.
    #[error("media failed to load: {reason}")]
    Load {
        /// The surface error, stringified.
        reason: String,
    },

    /// The incoming surface refused to start playback.
    #[error("playback could not start: {reason}")]
    PlayStart {
        /// The surface error, stringified.
        reason: String,
    },

    /// The incoming surface failed after the fade had begun.
    #[error("surface failed mid-fade: {reason}")]
    SurfaceFailed {
        /// The surface error, stringified.
        reason: String,
    },
}
