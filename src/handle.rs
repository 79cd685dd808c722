//! Handle to a running crossfade engine.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::EngineError;
use crate::engine::Command;

/// Statistics about a running engine.
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    /// Transitions accepted and started.
    pub transitions_started: u64,
    /// Transitions that completed with a role swap.
    pub transitions_completed: u64,
    /// Transitions aborted by a load, play or mid-fade failure, plus
    /// play requests whose URL could not be resolved.
    pub transitions_failed: u64,
    /// Play requests dropped because a transition was already in flight.
    pub transitions_rejected: u64,
    /// Preload loads actually started (duplicates excluded).
    pub preloads_requested: u64,
    /// Preloads that reached readiness.
    pub preloads_ready: u64,
    /// Preloads whose media failed to load.
    pub preloads_failed: u64,
    /// Times the drift check snapped the active loop back in phase.
    pub drift_corrections: u64,
}

/// Internal counters shared between the handle and the engine task.
pub(crate) struct EngineState {
    pub transitions_started: AtomicU64,
    pub transitions_completed: AtomicU64,
    pub transitions_failed: AtomicU64,
    pub transitions_rejected: AtomicU64,
    pub preloads_requested: AtomicU64,
    pub preloads_ready: AtomicU64,
    pub preloads_failed: AtomicU64,
    pub drift_corrections: AtomicU64,
}

impl EngineState {
    pub fn new() -> Self {
        Self {
            transitions_started: AtomicU64::new(0),
            transitions_completed: AtomicU64::new(0),
            transitions_failed: AtomicU64::new(0),
            transitions_rejected: AtomicU64::new(0),
            preloads_requested: AtomicU64::new(0),
            preloads_ready: AtomicU64::new(0),
            preloads_failed: AtomicU64::new(0),
            drift_corrections: AtomicU64::new(0),
        }
    }
}

/// A point-in-time picture of the engine, reported by the engine task.
///
/// Unlike [`EngineStats`], which is read from shared counters, a snapshot
/// is answered by the engine itself and therefore internally consistent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSnapshot {
    /// Whether the engine currently believes the transport is up.
    pub connected: bool,
    /// Index of the active surface (0 or 1).
    pub active_index: usize,
    /// Target URL of the in-flight transition, if one is running.
    pub transitioning_to: Option<String>,
    /// Entries currently held by the preload cache.
    pub cache_entries: usize,
    /// Cache entries that are fully warmed.
    pub cache_ready: usize,
}

/// Handle to a running crossfade engine.
///
/// Returned by [`EngineBuilder::start()`]. The engine runs in a background
/// task until [`shutdown()`](EngineHandle::shutdown) is called or the
/// handle is dropped.
///
/// # Lifecycle
///
/// 1. Created by [`EngineBuilder::start()`]
/// 2. Transitions, preloads and drift checks run in the background
/// 3. Call [`shutdown()`](EngineHandle::shutdown) for graceful teardown
/// 4. Dropping the handle also stops the engine (but prefer explicit
///    `shutdown()`)
///
/// # Example
///
/// ```ignore
/// let engine = CrossfadeEngine::builder()
///     .surfaces(front, back)
///     .surface_factory(factory)
///     .start()?;
///
/// engine.preload(["/videos/dawn.mp4", "/videos/dusk.mp4"]).await?;
/// engine.play("/videos/dawn.mp4", true).await?;
///
/// engine.shutdown().await?;
/// ```
///
/// [`EngineBuilder::start()`]: crate::EngineBuilder::start
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<Command>,
    state: Arc<EngineState>,
    engine_task: Option<JoinHandle<()>>,
}

impl EngineHandle {
    /// Creates a new handle over the given engine task.
    pub(crate) fn new(
        cmd_tx: mpsc::Sender<Command>,
        state: Arc<EngineState>,
        engine_task: JoinHandle<()>,
    ) -> Self {
        Self {
            cmd_tx,
            state,
            engine_task: Some(engine_task),
        }
    }

    /// Returns `true` while the engine task is alive.
    pub fn is_running(&self) -> bool {
        !self.cmd_tx.is_closed()
    }

    /// Crossfades to a media URL.
    ///
    /// The URL is resolved against the configured base URL. If a
    /// transition is already in flight this request is dropped, not
    /// queued; watch the event callback for the outcome.
    pub async fn play(&self, url: impl Into<String>, looping: bool) -> Result<(), EngineError> {
        self.send(Command::Play {
            url: url.into(),
            looping,
            next_url: None,
        })
        .await
    }

    /// Crossfades to a media URL and preloads the announced follow-up.
    ///
    /// The follow-up starts warming shortly after the crossfade begins,
    /// so the next `play` usually hits a warm cache.
    pub async fn play_with_next(
        &self,
        url: impl Into<String>,
        looping: bool,
        next_url: impl Into<String>,
    ) -> Result<(), EngineError> {
        self.send(Command::Play {
            url: url.into(),
            looping,
            next_url: Some(next_url.into()),
        })
        .await
    }

    /// Warms the preload cache for a batch of URLs.
    ///
    /// Loads start staggered to avoid saturating the link. URLs already
    /// cached (ready or still loading, even broken) are skipped.
    pub async fn preload(
        &self,
        urls: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<(), EngineError> {
        self.send(Command::Preload {
            urls: urls.into_iter().map(Into::into).collect(),
        })
        .await
    }

    /// Tells the engine the transport (re)connected.
    ///
    /// Clears the preload cache of potentially stale media and restarts
    /// the drift check cadence.
    pub async fn reconnected(&self) -> Result<(), EngineError> {
        self.send(Command::Reconnected).await
    }

    /// Tells the engine the transport dropped.
    ///
    /// Stops drift checks and detaches every cached surface so the
    /// renderer can release buffers while offline.
    pub async fn disconnected(&self) -> Result<(), EngineError> {
        self.send(Command::Disconnected).await
    }

    /// Asks the engine task for a consistent snapshot of its state.
    pub async fn snapshot(&self) -> Result<EngineSnapshot, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot { reply }).await?;
        rx.await.map_err(|_| EngineError::EngineStopped)
    }

    /// Returns current engine statistics.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            transitions_started: self.state.transitions_started.load(Ordering::SeqCst),
            transitions_completed: self.state.transitions_completed.load(Ordering::SeqCst),
            transitions_failed: self.state.transitions_failed.load(Ordering::SeqCst),
            transitions_rejected: self.state.transitions_rejected.load(Ordering::SeqCst),
            preloads_requested: self.state.preloads_requested.load(Ordering::SeqCst),
            preloads_ready: self.state.preloads_ready.load(Ordering::SeqCst),
            preloads_failed: self.state.preloads_failed.load(Ordering::SeqCst),
            drift_corrections: self.state.drift_corrections.load(Ordering::SeqCst),
        }
    }

    /// Gracefully stops the engine.
    ///
    /// This will:
    /// 1. Abort any in-flight transition
    /// 2. Detach every cached surface
    /// 3. Pause both playback surfaces
    /// 4. Wait for the engine task to finish
    pub async fn shutdown(mut self) -> Result<(), EngineError> {
        let _ = self.cmd_tx.send(Command::Shutdown).await;
        if let Some(task) = self.engine_task.take() {
            let _ = task.await;
        }
        Ok(())
    }

    async fn send(&self, cmd: Command) -> Result<(), EngineError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| EngineError::EngineStopped)
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        if self.engine_task.is_some() {
            // Dropped without explicit shutdown() - stop in the background.
            let _ = self.cmd_tx.try_send(Command::Shutdown);
        }
    }
}
