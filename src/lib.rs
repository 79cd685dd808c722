//! # loopsync
//!
//! **Note:** This crate is under active development. The API may change before 1.0.
//!
//! Clock-synchronized crossfades for ambient looping video displays.
//!
//! `loopsync` drives two playback surfaces as one seamless display: new
//! media fades in over the old, looping clips are seeked to a position
//! derived from the shared wall clock so independent displays show the
//! same frame, and a bounded preload cache keeps upcoming clips warm.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use loopsync::CrossfadeEngine;
//!
//! let engine = CrossfadeEngine::builder()
//!     .surfaces(front, back)              // your Surface impls
//!     .surface_factory(factory)           // mints cache surfaces
//!     .base_url("http://display.local/")
//!     .on_event(|e| tracing::info!(?e, "engine event"))
//!     .start()?;
//!
//! // Warm the library, then bring up the first loop.
//! engine.preload(["/videos/dawn.mp4", "/videos/dusk.mp4"]).await?;
//! engine.play_with_next("/videos/dawn.mp4", true, "/videos/dusk.mp4").await?;
//!
//! engine.shutdown().await?;
//! ```
//!
//! ## Architecture
//!
//! All mutable state lives on a single engine task:
//!
//! - **Engine Task**: Owns both surfaces, the preload cache and the drift
//!   timer; commands arrive over a channel
//! - **Transition Task**: At most one in flight, running the prepare /
//!   sync / fade / settle protocol on shared surface handles
//! - **Preload Tasks**: One per cache entry, reporting readiness back to
//!   the engine as internal signals
//!
//! This design makes the single-flight rule structural: a second play
//! request is dropped at the engine, never raced against the first.

#![warn(missing_docs)]
// These doc lints are too strict for internal implementation details
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]
// unwrap/expect allowed in tests only
#![allow(clippy::unwrap_used)]

mod builder;
mod clock;
mod config;
mod engine;
mod error;
mod event;
mod handle;
pub mod surface;

pub use builder::{CrossfadeEngine, EngineBuilder};
pub use clock::{ManualClock, SyncClock, SystemClock, sync_offset};
pub use config::EngineConfig;
pub use error::{EngineError, SurfaceError, TransitionError};
pub use event::{EngineEvent, EventCallback, event_callback};
pub use handle::{EngineHandle, EngineSnapshot, EngineStats};
pub use surface::{
    Easing, FadeRecord, MockSurface, MockSurfaceFactory, ReadyState, Surface, SurfaceFactory,
};
