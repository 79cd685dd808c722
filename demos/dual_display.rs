//! Two independent displays converging on the same loop phase.
//!
//! Starts two crossfade engines that never exchange a message, points
//! both at the same looping clip, and watches their playback positions.
//! The second display joins three seconds late yet lands mid-loop on the
//! same frame, because both derive their position from the shared wall
//! clock. One display is given a deliberately fast playhead so the
//! periodic drift correction is visible too.
//!
//! Run with: cargo run --example dual_display

use std::sync::Arc;
use std::time::Duration;

use loopsync::{
    CrossfadeEngine, EngineConfig, EngineHandle, MockSurface, MockSurfaceFactory, Surface,
};

/// The clip both displays loop.
const CLIP: &str = "/videos/aurora.mp4";

/// Loop length the mock surfaces report for the clip.
const CLIP_LENGTH: Duration = Duration::from_secs(10);

/// How fast the playhead simulation ticks.
const PLAYHEAD_TICK: Duration = Duration::from_millis(100);

/// One simulated display: an engine pair plus handles to its surfaces.
struct Display {
    name: &'static str,
    engine: EngineHandle,
    front: Arc<MockSurface>,
    back: Arc<MockSurface>,
}

impl Display {
    fn start(name: &'static str) -> Result<Self, Box<dyn std::error::Error>> {
        let front = Arc::new(MockSurface::with_media("front", CLIP_LENGTH));
        let back = Arc::new(MockSurface::with_media("back", CLIP_LENGTH));

        // Short drift cadence so the demo shows a correction within seconds.
        let config = EngineConfig {
            drift_check_interval: Duration::from_secs(6),
            ..Default::default()
        };

        let engine = CrossfadeEngine::builder()
            .surfaces(front.clone(), back.clone())
            .surface_factory(Arc::new(MockSurfaceFactory::with_media(CLIP_LENGTH)))
            .base_url("http://display.local/")
            .with_config(config)
            .on_event(move |event| println!("[{name}] event: {event:?}"))
            .start()?;

        Ok(Self {
            name,
            engine,
            front,
            back,
        })
    }

    /// Position of whichever surface is currently playing.
    fn position(&self) -> Duration {
        if self.back.is_paused() {
            self.front.position()
        } else {
            self.back.position()
        }
    }
}

/// Crude playhead: advances a surface's position in real time while it
/// plays. `rate` above 1.0 models a decoder clock running fast, which is
/// what the drift corrector exists to clean up.
fn spawn_playhead(surface: Arc<MockSurface>, rate: f64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PLAYHEAD_TICK);
        loop {
            ticker.tick().await;
            if surface.is_paused() {
                continue;
            }
            let Some(duration) = surface.duration() else {
                continue;
            };
            let step = PLAYHEAD_TICK.as_secs_f64() * rate;
            let next = (surface.position().as_secs_f64() + step) % duration.as_secs_f64();
            surface.drift_to(Duration::from_secs_f64(next));
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for debug output
    tracing_subscriber::fmt::init();

    println!("Two displays, one wall clock, no coordination.");
    println!("Display B joins 3s late and runs a 15% fast playhead.\n");

    let a = Display::start("display-a")?;
    let b = Display::start("display-b")?;

    // Each display simulates its own playback head. B's runs fast, so it
    // slides out of phase until the next drift check snaps it back.
    spawn_playhead(a.front.clone(), 1.0);
    spawn_playhead(a.back.clone(), 1.0);
    spawn_playhead(b.front.clone(), 1.15);
    spawn_playhead(b.back.clone(), 1.15);

    // Display A warms the clip, then brings it up.
    a.engine.preload([CLIP]).await?;
    a.engine.play(CLIP, true).await?;

    // Display B joins mid-loop three seconds later.
    tokio::time::sleep(Duration::from_secs(3)).await;
    b.engine.play(CLIP, true).await?;

    // Watch the two playheads: B lands in phase at join, wanders ahead,
    // and gets pulled back by the periodic drift correction.
    for _ in 0..9 {
        tokio::time::sleep(Duration::from_secs(2)).await;
        let (pos_a, pos_b) = (a.position(), b.position());
        let spread = pos_a.abs_diff(pos_b);
        println!(
            "{}: {:5.2}s  {}: {:5.2}s  spread: {:.2}s",
            a.name,
            pos_a.as_secs_f64(),
            b.name,
            pos_b.as_secs_f64(),
            spread.as_secs_f64()
        );
    }

    // Get stats before stopping (shutdown() consumes the handle)
    let stats_a = a.engine.stats();
    let stats_b = b.engine.stats();

    a.engine.shutdown().await?;
    b.engine.shutdown().await?;

    println!("\nDisplay A stats: {stats_a:?}");
    println!("Display B stats: {stats_b:?}");

    Ok(())
}
