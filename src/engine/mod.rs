//! Engine task that owns the surfaces, the preload cache and the drift loop.
//!
//! All engine state lives on this single task. Surfaces are only mutated
//! from here or from the one in-flight transition task, never from callers
//! directly, so the single-flight rule holds by construction.

mod cache;
mod drift;
mod transition;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use url::Url;

use crate::TransitionError;
use crate::clock::SyncClock;
use crate::config::EngineConfig;
use crate::event::{EngineEvent, EventCallback};
use crate::handle::{EngineSnapshot, EngineState};
use crate::surface::{Surface, SurfaceFactory};

use cache::PreloadCache;
use drift::DriftMonitor;
use transition::TransitionSession;

/// Command sent to the engine task.
#[derive(Debug)]
pub(crate) enum Command {
    /// Crossfade to a media URL.
    Play {
        url: String,
        looping: bool,
        next_url: Option<String>,
    },
    /// Warm the cache for a batch of URLs.
    Preload { urls: Vec<String> },
    /// The transport (re)connected.
    Reconnected,
    /// The transport dropped.
    Disconnected,
    /// Report current engine state.
    Snapshot {
        reply: oneshot::Sender<EngineSnapshot>,
    },
    /// Stop the engine gracefully.
    Shutdown,
}

/// Signal sent back to the engine by its own background tasks.
#[derive(Debug)]
pub(crate) enum Internal {
    TransitionDone {
        id: u64,
        result: Result<(), TransitionError>,
    },
    PreloadReady {
        url: Url,
        batch: Option<(usize, usize)>,
    },
    PreloadFailed {
        url: Url,
        reason: String,
    },
    FollowupPreload {
        url: String,
    },
}

struct InFlight {
    id: u64,
    target: Url,
    started_at: Instant,
    task: JoinHandle<()>,
}

/// The engine state machine. Owns both surfaces and every mutation of them.
pub(crate) struct Engine {
    surfaces: [Arc<dyn Surface>; 2],
    active: usize,
    in_flight: Option<InFlight>,
    next_transition_id: u64,
    cache: PreloadCache,
    drift: DriftMonitor,
    connected: bool,
    base_url: Url,
    config: EngineConfig,
    clock: Arc<dyn SyncClock>,
    state: Arc<EngineState>,
    event_callback: Option<EventCallback>,
    signals_tx: mpsc::Sender<Internal>,
}

impl Engine {
    pub(crate) fn new(
        surfaces: [Arc<dyn Surface>; 2],
        factory: Arc<dyn SurfaceFactory>,
        base_url: Url,
        config: EngineConfig,
        clock: Arc<dyn SyncClock>,
        state: Arc<EngineState>,
        signals_tx: mpsc::Sender<Internal>,
    ) -> Self {
        let cache = PreloadCache::new(factory, signals_tx.clone(), config.cache_capacity);
        let drift = DriftMonitor::new(config.drift_threshold, clock.clone());
        Self {
            surfaces,
            active: 0,
            in_flight: None,
            next_transition_id: 1,
            cache,
            drift,
            connected: true,
            base_url,
            config,
            clock,
            state,
            event_callback: None,
            signals_tx,
        }
    }

    /// Sets the event callback.
    pub(crate) fn with_event_callback(mut self, callback: EventCallback) -> Self {
        self.event_callback = Some(callback);
        self
    }

    /// Runs the engine until shutdown.
    ///
    /// This is the main entry point for the engine task.
    pub(crate) async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<Command>,
        mut signals_rx: mpsc::Receiver<Internal>,
    ) {
        // Style the resting state: first surface visible, second hidden.
        self.surfaces[0].set_opacity(1.0);
        self.surfaces[0].set_active(true);
        self.surfaces[1].set_opacity(0.0);
        self.surfaces[1].set_active(false);

        let mut drift_timer = self.new_drift_timer();
        tracing::info!(
            "Crossfade engine started: base={}, drift check every {:?}",
            self.base_url,
            self.config.drift_check_interval
        );

        loop {
            tokio::select! {
                Some(cmd) = cmd_rx.recv() => match cmd {
                    Command::Shutdown => break,
                    Command::Reconnected => {
                        self.handle_reconnected();
                        // Restart the cadence so the first check lands one
                        // full interval after the reconnect.
                        drift_timer = self.new_drift_timer();
                    }
                    other => self.handle_command(other),
                },
                Some(signal) = signals_rx.recv() => self.handle_signal(signal),
                _ = drift_timer.tick() => self.check_drift(),
                else => break,
            }
        }

        self.shutdown();
    }

    fn new_drift_timer(&self) -> Interval {
        let period = self.config.drift_check_interval;
        let mut timer = tokio::time::interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        timer
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Play {
                url,
                looping,
                next_url,
            } => self.handle_play(url, looping, next_url),
            Command::Preload { urls } => self.handle_preload(urls),
            Command::Disconnected => self.handle_disconnected(),
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            // Handled by the run loop.
            Command::Shutdown | Command::Reconnected => {}
        }
    }

    fn handle_play(&mut self, url: String, looping: bool, next_url: Option<String>) {
        // The follow-up is announced regardless of how this play turns out.
        if let Some(next) = next_url {
            self.schedule_followup(next);
        }

        let target = match cache::normalize_url(&self.base_url, &url) {
            Ok(target) => target,
            Err(error) => {
                tracing::warn!("Rejecting unplayable URL {:?}: {}", url, error);
                self.state.transitions_failed.fetch_add(1, Ordering::SeqCst);
                self.emit(EngineEvent::TransitionFailed {
                    reason: format!("invalid URL {url:?}: {error}"),
                });
                return;
            }
        };

        if let Some(in_flight) = &self.in_flight {
            tracing::warn!(
                "Transition to {} already in progress, dropping request for {}",
                in_flight.target,
                target
            );
            self.state.transitions_rejected.fetch_add(1, Ordering::SeqCst);
            return;
        }

        // The loop flag applies to both surfaces so roles can swap freely.
        for surface in &self.surfaces {
            surface.set_looping(looping);
        }

        let from_index = self.active;
        let to_index = 1 - self.active;
        let warm = self.cache.is_ready(&target);
        let id = self.next_transition_id;
        self.next_transition_id += 1;

        tracing::info!(
            "Starting crossfade from surface {} to {}: {}{}",
            from_index,
            to_index,
            target,
            if warm { " (preloaded)" } else { "" }
        );
        self.state.transitions_started.fetch_add(1, Ordering::SeqCst);
        self.emit(EngineEvent::TransitionStarted {
            from_index,
            to_index,
        });

        let session = TransitionSession::new(
            id,
            target.clone(),
            looping,
            warm,
            self.surfaces[from_index].clone(),
            self.surfaces[to_index].clone(),
        );
        let task = tokio::spawn(transition::run(
            session,
            self.config.clone(),
            self.clock.clone(),
            self.signals_tx.clone(),
        ));
        self.in_flight = Some(InFlight {
            id,
            target,
            started_at: Instant::now(),
            task,
        });
    }

    fn handle_preload(&mut self, urls: Vec<String>) {
        tracing::info!("Preloading {} videos", urls.len());
        let total = urls.len();
        for (index, raw) in urls.into_iter().enumerate() {
            let target = match cache::normalize_url(&self.base_url, &raw) {
                Ok(target) => target,
                Err(error) => {
                    tracing::warn!("Dropping unpreloadable URL {:?}: {}", raw, error);
                    continue;
                }
            };
            let delay = self.config.preload_stagger * index as u32;
            if self.cache.request(target, delay, Some((index, total))) {
                self.state.preloads_requested.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn schedule_followup(&self, url: String) {
        let delay = self.config.followup_preload_delay;
        let signals = self.signals_tx.clone();
        tracing::debug!("Scheduling follow-up preload in {:?}: {}", delay, url);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = signals.send(Internal::FollowupPreload { url }).await;
        });
    }

    fn handle_signal(&mut self, signal: Internal) {
        match signal {
            Internal::TransitionDone { id, result } => self.finish_transition(id, result),
            Internal::PreloadReady { url, batch } => {
                self.state.preloads_ready.fetch_add(1, Ordering::SeqCst);
                if self.cache.mark_ready(&url) {
                    match batch {
                        Some((index, total)) => {
                            tracing::info!("Preloaded video {}/{}: {}", index + 1, total, url);
                        }
                        None => tracing::info!("Preloaded video: {}", url),
                    }
                } else {
                    // Evicted or cleared while the load was in flight.
                    tracing::debug!("Preload finished for a dropped entry: {}", url);
                }
            }
            Internal::PreloadFailed { url, reason } => {
                self.state.preloads_failed.fetch_add(1, Ordering::SeqCst);
                tracing::warn!("Preload failed, entry stays cold: {}: {}", url, reason);
            }
            Internal::FollowupPreload { url } => {
                match cache::normalize_url(&self.base_url, &url) {
                    Ok(target) => {
                        if self.cache.request(target, Duration::ZERO, None) {
                            self.state.preloads_requested.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                    Err(error) => {
                        tracing::warn!("Dropping unpreloadable URL {:?}: {}", url, error);
                    }
                }
            }
        }
    }

    fn finish_transition(&mut self, id: u64, result: Result<(), TransitionError>) {
        let Some(in_flight) = self.in_flight.take() else {
            tracing::warn!("Outcome for transition {} arrived with none in flight", id);
            return;
        };
        if in_flight.id != id {
            // Stale signal from a superseded session; keep the real one.
            tracing::warn!("Ignoring stale outcome for transition {}", id);
            self.in_flight = Some(in_flight);
            return;
        }
        match result {
            Ok(()) => {
                self.active = 1 - self.active;
                self.state.transitions_completed.fetch_add(1, Ordering::SeqCst);
                tracing::info!(
                    "Crossfade to {} complete in {:?}, surface {} now active",
                    in_flight.target,
                    in_flight.started_at.elapsed(),
                    self.active
                );
                self.emit(EngineEvent::TransitionCompleted);
            }
            Err(error) => {
                self.state.transitions_failed.fetch_add(1, Ordering::SeqCst);
                self.emit(EngineEvent::TransitionFailed {
                    reason: error.to_string(),
                });
            }
        }
    }

    fn check_drift(&mut self) {
        if !self.connected || self.in_flight.is_some() {
            return;
        }
        let surface = &self.surfaces[self.active];
        if let Some(correction) = self.drift.check(surface.as_ref()) {
            tracing::info!(
                "Resyncing video: drift {:.2}s, seeking to {:.2}s",
                correction.drift.as_secs_f64(),
                correction.expected.as_secs_f64()
            );
            surface.set_position(correction.expected);
            self.state.drift_corrections.fetch_add(1, Ordering::SeqCst);
            self.emit(EngineEvent::DriftCorrected {
                amount: correction.drift,
            });
        }
    }

    fn handle_reconnected(&mut self) {
        self.connected = true;
        let dropped = self.cache.clear();
        tracing::info!(
            "Transport reconnected: drift sync restarted, {} cached videos dropped",
            dropped
        );
    }

    fn handle_disconnected(&mut self) {
        self.connected = false;
        let dropped = self.cache.clear();
        tracing::info!(
            "Transport disconnected: drift sync stopped, {} cached videos released",
            dropped
        );
    }

    fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            connected: self.connected,
            active_index: self.active,
            transitioning_to: self
                .in_flight
                .as_ref()
                .map(|in_flight| in_flight.target.to_string()),
            cache_entries: self.cache.len(),
            cache_ready: self.cache.ready_count(),
        }
    }

    /// Sends an event to the callback if configured.
    fn emit(&self, event: EngineEvent) {
        if let Some(ref callback) = self.event_callback {
            callback(event);
        }
    }

    fn shutdown(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.task.abort();
        }
        self.cache.clear();
        for surface in &self.surfaces {
            surface.pause();
        }
        tracing::info!("Crossfade engine stopped");
    }
}
