//! Builder pattern for the crossfade engine.

use std::sync::Arc;

use tokio::sync::mpsc;
use url::Url;

use crate::clock::{SyncClock, SystemClock};
use crate::engine::Engine;
use crate::handle::{EngineHandle, EngineState};
use crate::surface::{Surface, SurfaceFactory};
use crate::{EngineConfig, EngineError, EngineEvent, EventCallback, event_callback};

/// Channel capacity for commands flowing to the engine.
/// Commands are tiny and the transport can burst during reconnects.
const COMMAND_CHANNEL_CAPACITY: usize = 32;

/// Channel capacity for signals from transition and preload tasks.
/// A full preload batch can complete close together.
const SIGNAL_CHANNEL_CAPACITY: usize = 32;

/// Base URL used when none is configured.
///
/// Media URLs are resolved against this, so relative paths work out of
/// the box for a display that serves its own clips.
const DEFAULT_BASE_URL: &str = "http://localhost/";

/// Builder for configuring and starting a crossfade engine.
///
/// Use [`CrossfadeEngine::builder()`] to create a new builder.
///
/// # Example
///
/// ```ignore
/// use loopsync::CrossfadeEngine;
///
/// let engine = CrossfadeEngine::builder()
///     .surfaces(front, back)
///     .surface_factory(factory)
///     .base_url("http://display.local/")
///     .on_event(|event| tracing::info!(?event, "engine event"))
///     .start()?;
/// ```
///
/// [`CrossfadeEngine::builder()`]: crate::CrossfadeEngine::builder
#[must_use]
pub struct EngineBuilder {
    /// The visible crossfade pair, front first.
    surfaces: Option<[Arc<dyn Surface>; 2]>,
    /// Factory for the preload cache's hidden surfaces.
    factory: Option<Arc<dyn SurfaceFactory>>,
    /// Base URL media paths resolve against.
    base_url: String,
    /// Wall clock for global sync.
    clock: Arc<dyn SyncClock>,
    /// Event callback.
    event_callback: Option<EventCallback>,
    /// Engine configuration.
    config: EngineConfig,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            surfaces: None,
            factory: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            clock: Arc::new(SystemClock),
            event_callback: None,
            config: EngineConfig::default(),
        }
    }

    /// Sets the two playback surfaces the engine crossfades between.
    ///
    /// `front` starts visible, `back` hidden. The surfaces must be two
    /// distinct objects.
    pub fn surfaces(mut self, front: Arc<dyn Surface>, back: Arc<dyn Surface>) -> Self {
        self.surfaces = Some([front, back]);
        self
    }

    /// Sets the factory the preload cache mints hidden surfaces from.
    pub fn surface_factory(mut self, factory: Arc<dyn SurfaceFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Sets the base URL that play and preload paths resolve against.
    ///
    /// Default: `http://localhost/`
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the wall clock used for global phase sync.
    ///
    /// Defaults to the system clock. Tests pin this to a
    /// [`ManualClock`](crate::ManualClock).
    pub fn with_clock(mut self, clock: Arc<dyn SyncClock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets a callback to receive runtime events.
    ///
    /// Events cover the transition lifecycle and drift corrections.
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(EngineEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(event_callback(callback));
        self
    }

    /// Sets custom engine configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Validates the builder configuration.
    fn validate(&self) -> Result<(), EngineError> {
        let Some(surfaces) = &self.surfaces else {
            return Err(EngineError::NoSurfaces);
        };
        if std::ptr::addr_eq(Arc::as_ptr(&surfaces[0]), Arc::as_ptr(&surfaces[1])) {
            return Err(EngineError::IdenticalSurfaces);
        }
        if self.factory.is_none() {
            return Err(EngineError::NoSurfaceFactory);
        }
        Ok(())
    }

    /// Starts the engine.
    ///
    /// Returns an [`EngineHandle`] to control it. Must be called within a
    /// tokio runtime; the engine runs as a background task.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No surfaces are configured, or both slots hold the same surface
    /// - No surface factory is configured
    /// - The base URL does not parse
    pub fn start(self) -> Result<EngineHandle, EngineError> {
        self.validate()?;

        let base_url = Url::parse(&self.base_url).map_err(|error| EngineError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason: error.to_string(),
        })?;

        // validate() checked both.
        let Some(surfaces) = self.surfaces else {
            return Err(EngineError::NoSurfaces);
        };
        let Some(factory) = self.factory else {
            return Err(EngineError::NoSurfaceFactory);
        };

        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (signals_tx, signals_rx) = mpsc::channel(SIGNAL_CHANNEL_CAPACITY);
        let state = Arc::new(EngineState::new());

        let mut engine = Engine::new(
            surfaces,
            factory,
            base_url,
            self.config,
            self.clock,
            state.clone(),
            signals_tx,
        );
        if let Some(callback) = self.event_callback {
            engine = engine.with_event_callback(callback);
        }

        let engine_task = tokio::spawn(async move {
            engine.run(cmd_rx, signals_rx).await;
        });

        Ok(EngineHandle::new(cmd_tx, state, engine_task))
    }
}

/// Main entry point for loopsync.
///
/// Use [`CrossfadeEngine::builder()`] to configure and start an engine.
pub struct CrossfadeEngine;

impl CrossfadeEngine {
    /// Creates a new builder for configuring a crossfade engine.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }
}
