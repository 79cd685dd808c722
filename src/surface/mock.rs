//! Mock playback surface for testing without a renderer.

use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use url::Url;

use super::{Easing, ReadyState, Surface, SurfaceFactory};
use crate::SurfaceError;

/// One recorded [`begin_fade`](Surface::begin_fade) call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeRecord {
    /// Opacity the fade was aimed at.
    pub target: f32,
    /// Requested fade duration.
    pub duration: Duration,
    /// Requested easing curve.
    pub easing: Easing,
}

/// What [`Surface::load`] does on a mock.
#[derive(Debug, Clone)]
enum LoadBehavior {
    /// `load()` moves to `Loading`; tests drive the rest by hand.
    Manual,
    /// `load()` jumps straight to the given state and publishes metadata.
    Ready {
        state: ReadyState,
        duration: Option<Duration>,
    },
    /// `load()` reports a media failure.
    Fail { reason: String },
}

#[derive(Debug)]
struct Inner {
    source: Option<Url>,
    ready_state: ReadyState,
    duration: Option<Duration>,
    position: Duration,
    paused: bool,
    looping: bool,
    muted: bool,
    opacity: f32,
    active: bool,
    failure: Option<String>,
    reject_play: Option<String>,
    load_behavior: LoadBehavior,
    loads: u32,
    plays: u32,
    pauses: u32,
    fades: Vec<FadeRecord>,
    seeks: Vec<Duration>,
}

/// A scriptable playback surface that renders nothing.
///
/// This allows testing the full engine without a real renderer, making it
/// suitable for CI environments. Preset constructors cover the common
/// cases; driver methods change state mid-test and wake any pending
/// `wait_*` calls.
///
/// Fades do not animate: `begin_fade` records the request and jumps
/// opacity to the target value.
///
/// # Example
///
/// ```
/// use loopsync::{MockSurface, ReadyState, Surface};
/// use url::Url;
///
/// let surface = MockSurface::ready("front");
/// surface.set_source(&Url::parse("http://host/a.mp4").unwrap());
/// surface.load();
/// assert_eq!(surface.ready_state(), ReadyState::CanPlayThrough);
/// ```
#[derive(Debug)]
pub struct MockSurface {
    label: String,
    inner: Mutex<Inner>,
    signal: Notify,
}

impl MockSurface {
    /// Creates a surface whose loads go to `Loading` and stay there until
    /// a driver method intervenes.
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_behavior(label, LoadBehavior::Manual)
    }

    /// Creates a surface whose loads complete instantly (no metadata).
    pub fn ready(label: impl Into<String>) -> Self {
        Self::with_behavior(
            label,
            LoadBehavior::Ready {
                state: ReadyState::CanPlayThrough,
                duration: None,
            },
        )
    }

    /// Creates a surface whose loads complete instantly with the given
    /// media duration.
    pub fn with_media(label: impl Into<String>, duration: Duration) -> Self {
        Self::with_behavior(
            label,
            LoadBehavior::Ready {
                state: ReadyState::CanPlayThrough,
                duration: Some(duration),
            },
        )
    }

    /// Creates a surface whose loads fail with the given reason.
    pub fn failing(label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::with_behavior(
            label,
            LoadBehavior::Fail {
                reason: reason.into(),
            },
        )
    }

    /// Creates a surface that refuses to start playback.
    ///
    /// Loads complete instantly; `play()` returns a rejection until
    /// [`set_reject_play`](Self::set_reject_play) clears it.
    pub fn rejecting_play(label: impl Into<String>, reason: impl Into<String>) -> Self {
        let surface = Self::ready(label);
        surface.inner.lock().reject_play = Some(reason.into());
        surface
    }

    fn with_behavior(label: impl Into<String>, load_behavior: LoadBehavior) -> Self {
        Self {
            label: label.into(),
            inner: Mutex::new(Inner {
                source: None,
                ready_state: ReadyState::Empty,
                duration: None,
                position: Duration::ZERO,
                paused: true,
                looping: false,
                muted: false,
                opacity: 0.0,
                active: false,
                failure: None,
                reject_play: None,
                load_behavior,
                loads: 0,
                plays: 0,
                pauses: 0,
                fades: Vec::new(),
                seeks: Vec::new(),
            }),
            signal: Notify::new(),
        }
    }

    /// Drives the buffered state and wakes pending `wait_ready` calls.
    pub fn set_ready_state(&self, state: ReadyState) {
        self.inner.lock().ready_state = state;
        self.signal.notify_waiters();
    }

    /// Publishes duration metadata and wakes pending `wait_metadata` calls.
    pub fn set_duration(&self, duration: Duration) {
        self.inner.lock().duration = Some(duration);
        self.signal.notify_waiters();
    }

    /// Reports a media failure and wakes every pending `wait_*` call.
    pub fn fail(&self, reason: impl Into<String>) {
        self.inner.lock().failure = Some(reason.into());
        self.signal.notify_waiters();
    }

    /// Sets or clears the play rejection reason.
    pub fn set_reject_play(&self, reason: Option<String>) {
        self.inner.lock().reject_play = reason;
    }

    /// Moves the playback position without recording a seek.
    ///
    /// Simulates time passing inside the media, as opposed to
    /// [`set_position`](Surface::set_position) which models a seek.
    pub fn drift_to(&self, position: Duration) {
        self.inner.lock().position = position;
    }

    /// Whether this surface is currently marked active.
    pub fn is_active(&self) -> bool {
        self.inner.lock().active
    }

    /// Whether audio output is muted.
    pub fn is_muted(&self) -> bool {
        self.inner.lock().muted
    }

    /// Number of `load()` calls so far.
    pub fn load_count(&self) -> u32 {
        self.inner.lock().loads
    }

    /// Number of successful `play()` calls so far.
    pub fn play_count(&self) -> u32 {
        self.inner.lock().plays
    }

    /// Number of `pause()` calls so far.
    pub fn pause_count(&self) -> u32 {
        self.inner.lock().pauses
    }

    /// Every fade requested so far, oldest first.
    pub fn fade_log(&self) -> Vec<FadeRecord> {
        self.inner.lock().fades.clone()
    }

    /// Every seek position requested so far, oldest first.
    pub fn seek_log(&self) -> Vec<Duration> {
        self.inner.lock().seeks.clone()
    }
}

#[async_trait]
impl Surface for MockSurface {
    fn label(&self) -> &str {
        &self.label
    }

    fn set_source(&self, url: &Url) {
        let mut inner = self.inner.lock();
        inner.source = Some(url.clone());
        inner.ready_state = ReadyState::Empty;
        inner.duration = None;
        inner.position = Duration::ZERO;
        inner.failure = None;
        drop(inner);
        self.signal.notify_waiters();
    }

    fn clear_source(&self) {
        let mut inner = self.inner.lock();
        inner.source = None;
        inner.ready_state = ReadyState::Empty;
        inner.duration = None;
        inner.position = Duration::ZERO;
        inner.paused = true;
        inner.failure = None;
        drop(inner);
        self.signal.notify_waiters();
    }

    fn source(&self) -> Option<Url> {
        self.inner.lock().source.clone()
    }

    fn load(&self) {
        let mut inner = self.inner.lock();
        inner.loads += 1;
        match inner.load_behavior.clone() {
            LoadBehavior::Manual => {
                inner.ready_state = ReadyState::Loading;
            }
            LoadBehavior::Ready { state, duration } => {
                inner.ready_state = state;
                if duration.is_some() {
                    inner.duration = duration;
                }
            }
            LoadBehavior::Fail { reason } => {
                inner.failure = Some(reason);
            }
        }
        drop(inner);
        self.signal.notify_waiters();
    }

    async fn play(&self) -> Result<(), SurfaceError> {
        let mut inner = self.inner.lock();
        if let Some(reason) = &inner.reject_play {
            return Err(SurfaceError::play_rejected(reason.clone()));
        }
        if let Some(reason) = &inner.failure {
            return Err(SurfaceError::load(reason.clone()));
        }
        inner.paused = false;
        inner.plays += 1;
        Ok(())
    }

    fn pause(&self) {
        let mut inner = self.inner.lock();
        inner.paused = true;
        inner.pauses += 1;
    }

    fn is_paused(&self) -> bool {
        self.inner.lock().paused
    }

    fn set_looping(&self, looping: bool) {
        self.inner.lock().looping = looping;
    }

    fn is_looping(&self) -> bool {
        self.inner.lock().looping
    }

    fn set_muted(&self, muted: bool) {
        self.inner.lock().muted = muted;
    }

    fn set_opacity(&self, opacity: f32) {
        self.inner.lock().opacity = opacity;
    }

    fn opacity(&self) -> f32 {
        self.inner.lock().opacity
    }

    fn begin_fade(&self, target: f32, duration: Duration, easing: Easing) {
        let mut inner = self.inner.lock();
        inner.fades.push(FadeRecord {
            target,
            duration,
            easing,
        });
        inner.opacity = target;
    }

    fn set_active(&self, active: bool) {
        self.inner.lock().active = active;
    }

    fn ready_state(&self) -> ReadyState {
        self.inner.lock().ready_state
    }

    async fn wait_ready(&self, at_least: ReadyState) -> Result<(), SurfaceError> {
        loop {
            // Register the waiter before checking, so a wake landing
            // between the check and the await is not lost.
            let mut notified = pin!(self.signal.notified());
            notified.as_mut().enable();
            {
                let inner = self.inner.lock();
                if let Some(reason) = &inner.failure {
                    return Err(SurfaceError::load(reason.clone()));
                }
                if inner.ready_state >= at_least {
                    return Ok(());
                }
            }
            notified.await;
        }
    }

    fn duration(&self) -> Option<Duration> {
        self.inner.lock().duration
    }

    async fn wait_metadata(&self) -> Option<Duration> {
        loop {
            let mut notified = pin!(self.signal.notified());
            notified.as_mut().enable();
            {
                let inner = self.inner.lock();
                if inner.failure.is_some() {
                    return None;
                }
                if let Some(duration) = inner.duration {
                    return Some(duration);
                }
            }
            notified.await;
        }
    }

    fn position(&self) -> Duration {
        self.inner.lock().position
    }

    fn set_position(&self, position: Duration) {
        let mut inner = self.inner.lock();
        inner.position = position;
        inner.seeks.push(position);
    }

    async fn wait_failure(&self) -> SurfaceError {
        loop {
            let mut notified = pin!(self.signal.notified());
            notified.as_mut().enable();
            {
                let inner = self.inner.lock();
                if let Some(reason) = &inner.failure {
                    return SurfaceError::load(reason.clone());
                }
            }
            notified.await;
        }
    }
}

/// What surfaces a [`MockSurfaceFactory`] mints.
#[derive(Debug, Clone)]
enum FactoryMode {
    Ready { duration: Option<Duration> },
    Failing { reason: String },
    Unresponsive,
}

/// Mints [`MockSurface`]s and keeps handles to every one it created.
///
/// The created surfaces are labeled `cache-0`, `cache-1`, ... in creation
/// order and can be inspected afterwards via [`created`](Self::created).
///
/// # Example
///
/// ```
/// use loopsync::{MockSurfaceFactory, SurfaceFactory};
///
/// let factory = MockSurfaceFactory::ready();
/// factory.create();
/// factory.create();
/// assert_eq!(factory.created().len(), 2);
/// ```
#[derive(Debug)]
pub struct MockSurfaceFactory {
    mode: FactoryMode,
    created: Mutex<Vec<Arc<MockSurface>>>,
}

impl MockSurfaceFactory {
    /// Mints surfaces whose loads complete instantly (no metadata).
    pub fn ready() -> Self {
        Self::with_mode(FactoryMode::Ready { duration: None })
    }

    /// Mints surfaces whose loads complete instantly with the given
    /// media duration.
    pub fn with_media(duration: Duration) -> Self {
        Self::with_mode(FactoryMode::Ready {
            duration: Some(duration),
        })
    }

    /// Mints surfaces whose loads fail with the given reason.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self::with_mode(FactoryMode::Failing {
            reason: reason.into(),
        })
    }

    /// Mints surfaces whose loads never complete and never fail.
    pub fn unresponsive() -> Self {
        Self::with_mode(FactoryMode::Unresponsive)
    }

    fn with_mode(mode: FactoryMode) -> Self {
        Self {
            mode,
            created: Mutex::new(Vec::new()),
        }
    }

    /// Handles to every surface minted so far, in creation order.
    pub fn created(&self) -> Vec<Arc<MockSurface>> {
        self.created.lock().clone()
    }
}

impl SurfaceFactory for MockSurfaceFactory {
    fn create(&self) -> Arc<dyn Surface> {
        let mut created = self.created.lock();
        let label = format!("cache-{}", created.len());
        let surface = Arc::new(match &self.mode {
            FactoryMode::Ready { duration } => match duration {
                Some(duration) => MockSurface::with_media(label, *duration),
                None => MockSurface::ready(label),
            },
            FactoryMode::Failing { reason } => MockSurface::failing(label, reason.clone()),
            FactoryMode::Unresponsive => MockSurface::new(label),
        });
        created.push(surface.clone());
        surface
    }
}
