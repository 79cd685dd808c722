//! The crossfade protocol that moves playback between the two surfaces.
//!
//! One transition runs at a time, as a spawned task working on shared
//! surface handles. Every exit path, success or abort, reports back to
//! the engine so the single-flight guard is always released.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::timeout;
use url::Url;

use super::Internal;
use crate::TransitionError;
use crate::clock::{SyncClock, sync_offset};
use crate::config::EngineConfig;
use crate::surface::{ReadyState, Surface};

/// Where an in-flight transition currently is.
///
/// Requested and Preparing cover sourcing and buffering, Synchronizing
/// covers the global phase seek, Fading covers the opacity animation and
/// Settling covers the final role swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransitionPhase {
    Requested,
    Preparing,
    Synchronizing,
    Fading,
    Settling,
}

/// One accepted crossfade, from request to role swap.
pub(crate) struct TransitionSession {
    pub(crate) id: u64,
    pub(crate) target: Url,
    pub(crate) looping: bool,
    /// Whether the preload cache had this URL fully warmed.
    pub(crate) warm: bool,
    pub(crate) from: Arc<dyn Surface>,
    pub(crate) to: Arc<dyn Surface>,
    phase: TransitionPhase,
}

impl TransitionSession {
    pub(crate) fn new(
        id: u64,
        target: Url,
        looping: bool,
        warm: bool,
        from: Arc<dyn Surface>,
        to: Arc<dyn Surface>,
    ) -> Self {
        Self {
            id,
            target,
            looping,
            warm,
            from,
            to,
            phase: TransitionPhase::Requested,
        }
    }

    fn advance(&mut self, next: TransitionPhase) {
        tracing::debug!("Transition {}: {:?} -> {:?}", self.id, self.phase, next);
        self.phase = next;
    }
}

/// Runs one transition to completion and reports the outcome.
pub(crate) async fn run(
    mut session: TransitionSession,
    config: EngineConfig,
    clock: Arc<dyn SyncClock>,
    signals: mpsc::Sender<Internal>,
) {
    let result = drive(&mut session, &config, clock.as_ref()).await;
    if let Err(error) = &result {
        tracing::warn!(
            "Transition {} to {} aborted during {:?}: {}",
            session.id,
            session.target,
            session.phase,
            error
        );
    }
    let _ = signals
        .send(Internal::TransitionDone {
            id: session.id,
            result,
        })
        .await;
}

async fn drive(
    session: &mut TransitionSession,
    config: &EngineConfig,
    clock: &dyn SyncClock,
) -> Result<(), TransitionError> {
    session.advance(TransitionPhase::Preparing);
    let to = session.to.clone();
    to.set_opacity(0.0);
    to.set_active(false);
    to.set_muted(true);
    to.set_looping(session.looping);

    let reusable = to.source().as_ref() == Some(&session.target)
        && to.ready_state() >= ReadyState::CanPlayThrough;
    if reusable {
        tracing::debug!(
            "Surface {} already holds {}, skipping reload",
            to.label(),
            session.target
        );
    } else {
        if session.warm {
            tracing::debug!("Using preloaded media for {}", session.target);
        }
        to.set_source(&session.target);
        to.load();
        match timeout(config.readiness_timeout, to.wait_ready(ReadyState::CanPlay)).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                return Err(TransitionError::Load {
                    reason: error.to_string(),
                });
            }
            // A stalled network must never freeze the display.
            Err(_) => tracing::warn!(
                "No readiness signal after {:?}, forcing transition for {}",
                config.readiness_timeout,
                session.target
            ),
        }
    }

    session.advance(TransitionPhase::Synchronizing);
    if session.from.is_looping() && to.is_looping() {
        match timeout(config.metadata_timeout, to.wait_metadata()).await {
            Ok(Some(duration)) if !duration.is_zero() => {
                let offset = sync_offset(clock.unix_now(), Some(duration));
                to.set_position(offset);
                tracing::debug!(
                    "Synced {} to global offset {:.2}s of {:.2}s",
                    to.label(),
                    offset.as_secs_f64(),
                    duration.as_secs_f64()
                );
            }
            _ => tracing::debug!("Duration metadata unavailable, starting from the top"),
        }
    }

    to.play().await.map_err(|error| TransitionError::PlayStart {
        reason: error.to_string(),
    })?;
    tokio::time::sleep(config.play_settle_delay).await;

    session.advance(TransitionPhase::Fading);
    to.begin_fade(1.0, config.fade_duration, config.easing);
    session.from.begin_fade(0.0, config.fade_duration, config.easing);
    to.set_active(true);
    session.from.set_active(false);

    // Hold a touch longer than the fade so the swap never pops.
    tokio::select! {
        () = tokio::time::sleep(config.fade_hold) => {}
        error = to.wait_failure() => {
            return Err(TransitionError::SurfaceFailed {
                reason: error.to_string(),
            });
        }
    }

    session.advance(TransitionPhase::Settling);
    // Media stays attached so this clip can come back without a reload.
    session.from.pause();
    Ok(())
}
