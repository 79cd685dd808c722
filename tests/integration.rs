//! Integration tests for loopsync.
//!
//! Everything runs on tokio's paused clock: the tests advance virtual
//! time themselves, so transition and drift timings are exact without
//! real waiting. The wall clock used for phase sync is a [`ManualClock`]
//! advanced explicitly where a test needs it.

use std::sync::Arc;
use std::time::Duration;

use loopsync::{
    CrossfadeEngine, EngineEvent, EngineHandle, ManualClock, MockSurface, MockSurfaceFactory,
    Surface,
};
use parking_lot::Mutex;
use url::Url;

/// Loop length used by every clip in these tests.
const LOOP: Duration = Duration::from_secs(10);

/// Boot wall clock. Divisible by the loop length, so the global offset
/// starts at zero.
const T0: Duration = Duration::from_secs(1_000);

/// Collects engine events for later assertions.
#[derive(Clone, Default)]
struct EventLog(Arc<Mutex<Vec<EngineEvent>>>);

impl EventLog {
    fn push(&self, event: EngineEvent) {
        self.0.lock().push(event);
    }

    fn started(&self) -> usize {
        self.0
            .lock()
            .iter()
            .filter(|e| matches!(e, EngineEvent::TransitionStarted { .. }))
            .count()
    }

    fn completed(&self) -> usize {
        self.0
            .lock()
            .iter()
            .filter(|e| matches!(e, EngineEvent::TransitionCompleted))
            .count()
    }

    fn failed_reasons(&self) -> Vec<String> {
        self.0
            .lock()
            .iter()
            .filter_map(|e| match e {
                EngineEvent::TransitionFailed { reason } => Some(reason.clone()),
                _ => None,
            })
            .collect()
    }

    fn drift_amounts(&self) -> Vec<Duration> {
        self.0
            .lock()
            .iter()
            .filter_map(|e| match e {
                EngineEvent::DriftCorrected { amount } => Some(*amount),
                _ => None,
            })
            .collect()
    }
}

struct Rig {
    engine: EngineHandle,
    front: Arc<MockSurface>,
    back: Arc<MockSurface>,
    factory: Arc<MockSurfaceFactory>,
    clock: Arc<ManualClock>,
    events: EventLog,
}

fn rig() -> Rig {
    rig_with(
        Arc::new(MockSurface::with_media("front", LOOP)),
        Arc::new(MockSurface::with_media("back", LOOP)),
        Arc::new(MockSurfaceFactory::with_media(LOOP)),
        Arc::new(ManualClock::new(T0)),
    )
}

fn rig_with(
    front: Arc<MockSurface>,
    back: Arc<MockSurface>,
    factory: Arc<MockSurfaceFactory>,
    clock: Arc<ManualClock>,
) -> Rig {
    let events = EventLog::default();
    let sink = events.clone();
    let engine = CrossfadeEngine::builder()
        .surfaces(front.clone(), back.clone())
        .surface_factory(factory.clone())
        .base_url("http://display.local/")
        .with_clock(clock.clone())
        .on_event(move |event| sink.push(event))
        .start()
        .unwrap();
    Rig {
        engine,
        front,
        back,
        factory,
        clock,
        events,
    }
}

/// Advances virtual time with the wall clock pinned. Long enough for an
/// instantly-ready transition to complete.
async fn settle(duration: Duration) {
    tokio::time::sleep(duration).await;
}

fn media(path: &str) -> Url {
    Url::parse(&format!("http://display.local{path}")).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_crossfade_end_to_end() {
    let rig = rig();
    rig.engine.play("/videos/a.mp4", true).await.unwrap();
    settle(Duration::from_secs(2)).await;

    // The hidden surface took the media and is now the active plane.
    assert_eq!(rig.back.source(), Some(media("/videos/a.mp4")));
    assert!(rig.back.is_active());
    assert!((rig.back.opacity() - 1.0).abs() < f32::EPSILON);
    assert!(rig.back.is_looping());
    assert!(rig.back.is_muted());
    assert!(!rig.back.is_paused());

    // The old plane is invisible and parked, media kept.
    assert!(!rig.front.is_active());
    assert!(rig.front.opacity() < 0.01);
    assert!(rig.front.is_paused());

    // Wall clock sat at a loop boundary, so the phase seek was to zero.
    assert_eq!(rig.back.seek_log(), vec![Duration::ZERO]);

    let snapshot = rig.engine.snapshot().await.unwrap();
    assert_eq!(snapshot.active_index, 1);
    assert_eq!(snapshot.transitioning_to, None);

    let stats = rig.engine.stats();
    assert_eq!(stats.transitions_started, 1);
    assert_eq!(stats.transitions_completed, 1);
    assert_eq!(rig.events.started(), 1);
    assert_eq!(rig.events.completed(), 1);

    rig.engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_play_dropped_not_queued() {
    let rig = rig();
    rig.engine.play("/videos/a.mp4", true).await.unwrap();
    // Arrives while the first is in flight: dropped, never queued. Its
    // follow-up announcement still schedules a preload.
    rig.engine
        .play_with_next("/videos/b.mp4", true, "/videos/c.mp4")
        .await
        .unwrap();
    settle(Duration::from_secs(4)).await;

    let stats = rig.engine.stats();
    assert_eq!(stats.transitions_started, 1);
    assert_eq!(stats.transitions_completed, 1);
    assert_eq!(stats.transitions_rejected, 1);
    assert_eq!(rig.events.started(), 1);
    assert!(rig.events.failed_reasons().is_empty());

    // The dropped clip never touched either visible surface.
    assert_eq!(rig.back.source(), Some(media("/videos/a.mp4")));
    assert_eq!(rig.front.source(), None);

    // But its announced follow-up was cached anyway.
    let snapshot = rig.engine.snapshot().await.unwrap();
    assert_eq!(snapshot.cache_entries, 1);
    assert_eq!(rig.factory.created()[0].source(), Some(media("/videos/c.mp4")));

    // The engine is idle again: the next request proceeds normally.
    rig.engine.play("/videos/b.mp4", true).await.unwrap();
    settle(Duration::from_secs(2)).await;
    let snapshot = rig.engine.snapshot().await.unwrap();
    assert_eq!(snapshot.active_index, 0);
    assert_eq!(rig.front.source(), Some(media("/videos/b.mp4")));
}

#[tokio::test(start_paused = true)]
async fn test_preload_collapses_spellings_and_primes() {
    let rig = rig();
    rig.engine
        .preload([
            "/videos/x.mp4",
            "videos/x.mp4",
            "http://display.local/videos/x.mp4",
        ])
        .await
        .unwrap();
    settle(Duration::from_secs(2)).await;

    // Three spellings of one clip: one surface, one load.
    assert_eq!(rig.factory.created().len(), 1);
    let cached = &rig.factory.created()[0];
    assert_eq!(cached.load_count(), 1);
    assert_eq!(cached.source(), Some(media("/videos/x.mp4")));

    // Primed: briefly played, then parked at the first frame, muted.
    assert_eq!(cached.play_count(), 1);
    assert!(cached.is_paused());
    assert!(cached.is_muted());
    assert!(cached.is_looping());
    assert_eq!(cached.seek_log(), vec![Duration::ZERO]);
    assert_eq!(cached.position(), Duration::ZERO);

    let snapshot = rig.engine.snapshot().await.unwrap();
    assert_eq!(snapshot.cache_entries, 1);
    assert_eq!(snapshot.cache_ready, 1);

    let stats = rig.engine.stats();
    assert_eq!(stats.preloads_requested, 1);
    assert_eq!(stats.preloads_ready, 1);
}

#[tokio::test(start_paused = true)]
async fn test_preload_batch_staggers_loads() {
    let rig = rig();
    rig.engine
        .preload(["/videos/a.mp4", "/videos/b.mp4", "/videos/c.mp4"])
        .await
        .unwrap();

    // All three entries exist immediately, but loads start 500ms apart.
    settle(Duration::from_millis(100)).await;
    let snapshot = rig.engine.snapshot().await.unwrap();
    assert_eq!(snapshot.cache_entries, 3);
    assert_eq!(snapshot.cache_ready, 1);

    settle(Duration::from_millis(500)).await;
    assert_eq!(rig.engine.snapshot().await.unwrap().cache_ready, 2);

    settle(Duration::from_millis(500)).await;
    assert_eq!(rig.engine.snapshot().await.unwrap().cache_ready, 3);
}

#[tokio::test(start_paused = true)]
async fn test_broken_preload_never_blocks_playback() {
    let rig = rig_with(
        Arc::new(MockSurface::with_media("front", LOOP)),
        Arc::new(MockSurface::with_media("back", LOOP)),
        Arc::new(MockSurfaceFactory::failing("404 not found")),
        Arc::new(ManualClock::new(T0)),
    );
    rig.engine.preload(["/videos/missing.mp4"]).await.unwrap();
    settle(Duration::from_secs(1)).await;

    let stats = rig.engine.stats();
    assert_eq!(stats.preloads_failed, 1);
    let snapshot = rig.engine.snapshot().await.unwrap();
    assert_eq!(snapshot.cache_entries, 1);
    assert_eq!(snapshot.cache_ready, 0);

    // The broken entry is never retried.
    rig.engine.preload(["/videos/missing.mp4"]).await.unwrap();
    settle(Duration::from_secs(1)).await;
    assert_eq!(rig.factory.created().len(), 1);
    assert_eq!(rig.factory.created()[0].load_count(), 1);

    // Playing the same URL takes the direct-load path and still works.
    rig.engine.play("/videos/missing.mp4", true).await.unwrap();
    settle(Duration::from_secs(2)).await;
    assert_eq!(rig.engine.snapshot().await.unwrap().active_index, 1);
    assert_eq!(rig.engine.stats().transitions_completed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_drift_correction_snaps_loop_back_in_phase() {
    let rig = rig();
    rig.engine.play("/videos/loop.mp4", true).await.unwrap();
    settle(Duration::from_secs(2)).await;
    assert_eq!(rig.back.seek_log(), vec![Duration::ZERO]);

    // The playhead wanders 3s off phase before the next periodic check.
    rig.back.drift_to(Duration::from_secs(3));
    rig.clock.advance(Duration::from_secs(30));
    settle(Duration::from_secs(31)).await;

    assert_eq!(rig.engine.stats().drift_corrections, 1);
    assert_eq!(rig.events.drift_amounts(), vec![Duration::from_secs(3)]);
    assert_eq!(rig.back.position(), Duration::ZERO);

    // Sub-threshold drift is left alone on the following check.
    rig.back.drift_to(Duration::from_millis(300));
    rig.clock.advance(Duration::from_secs(30));
    settle(Duration::from_secs(30)).await;

    assert_eq!(rig.engine.stats().drift_corrections, 1);
    assert_eq!(rig.back.position(), Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn test_independent_displays_converge() {
    // Two engines, one wall clock, no coordination.
    let clock = Arc::new(ManualClock::new(T0));
    let a = rig_with(
        Arc::new(MockSurface::with_media("a-front", LOOP)),
        Arc::new(MockSurface::with_media("a-back", LOOP)),
        Arc::new(MockSurfaceFactory::with_media(LOOP)),
        clock.clone(),
    );
    let b = rig_with(
        Arc::new(MockSurface::with_media("b-front", LOOP)),
        Arc::new(MockSurface::with_media("b-back", LOOP)),
        Arc::new(MockSurfaceFactory::with_media(LOOP)),
        clock.clone(),
    );

    // Display A starts the loop first.
    a.engine.play("/videos/shared.mp4", true).await.unwrap();
    settle(Duration::from_secs(2)).await;
    assert_eq!(a.back.position(), Duration::ZERO);

    // Display B joins 3 seconds later and lands mid-loop.
    clock.advance(Duration::from_secs(3));
    b.engine.play("/videos/shared.mp4", true).await.unwrap();
    settle(Duration::from_secs(2)).await;
    assert_eq!(b.back.position(), Duration::from_secs(3));

    // One drift cycle later both sit on the same frame.
    clock.advance(Duration::from_secs(30));
    settle(Duration::from_secs(30)).await;

    assert_eq!(a.back.position(), b.back.position());
    let spread = a.back.position().abs_diff(b.back.position());
    assert!(spread <= Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_silences_drift_and_releases_cache() {
    let rig = rig();
    rig.engine.play("/videos/loop.mp4", true).await.unwrap();
    settle(Duration::from_secs(2)).await;
    rig.engine.preload(["/videos/next.mp4"]).await.unwrap();
    settle(Duration::from_secs(1)).await;
    assert_eq!(rig.engine.snapshot().await.unwrap().cache_ready, 1);

    rig.engine.disconnected().await.unwrap();
    let snapshot = rig.engine.snapshot().await.unwrap();
    assert!(!snapshot.connected);
    assert_eq!(snapshot.cache_entries, 0);
    assert_eq!(rig.factory.created()[0].source(), None);
    assert!(rig.factory.created()[0].is_paused());

    // Two full drift intervals pass with the loop far off phase: nothing.
    rig.back.drift_to(Duration::from_secs(4));
    rig.clock.advance(Duration::from_secs(60));
    settle(Duration::from_secs(61)).await;
    assert_eq!(rig.engine.stats().drift_corrections, 0);

    // Reconnect restarts the cadence; the first check lands one interval later.
    rig.engine.reconnected().await.unwrap();
    assert!(rig.engine.snapshot().await.unwrap().connected);
    rig.clock.advance(Duration::from_secs(30));
    settle(Duration::from_secs(31)).await;
    assert_eq!(rig.engine.stats().drift_corrections, 1);
    assert_eq!(rig.back.position(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_drops_stale_cache() {
    let rig = rig();
    rig.engine.preload(["/videos/a.mp4"]).await.unwrap();
    settle(Duration::from_secs(1)).await;
    assert_eq!(rig.engine.snapshot().await.unwrap().cache_entries, 1);

    // The server may have regenerated its library while we were away.
    rig.engine.reconnected().await.unwrap();
    let snapshot = rig.engine.snapshot().await.unwrap();
    assert!(snapshot.connected);
    assert_eq!(snapshot.cache_entries, 0);
    assert_eq!(rig.factory.created()[0].source(), None);
}

#[tokio::test(start_paused = true)]
async fn test_silent_surface_cannot_freeze_the_display() {
    // The incoming surface never signals readiness or metadata.
    let rig = rig_with(
        Arc::new(MockSurface::with_media("front", LOOP)),
        Arc::new(MockSurface::new("back")),
        Arc::new(MockSurfaceFactory::with_media(LOOP)),
        Arc::new(ManualClock::new(T0)),
    );
    rig.engine.play("/videos/slow.mp4", true).await.unwrap();
    settle(Duration::from_secs(6)).await;

    // Readiness and metadata both timed out, then the fade ran anyway.
    assert_eq!(rig.engine.stats().transitions_completed, 1);
    assert!(rig.back.is_active());
    assert!(rig.back.seek_log().is_empty());
    assert_eq!(rig.engine.snapshot().await.unwrap().active_index, 1);
}

#[tokio::test(start_paused = true)]
async fn test_play_rejection_fails_cleanly_then_recovers() {
    let rig = rig_with(
        Arc::new(MockSurface::with_media("front", LOOP)),
        Arc::new(MockSurface::rejecting_play("back", "autoplay blocked")),
        Arc::new(MockSurfaceFactory::with_media(LOOP)),
        Arc::new(ManualClock::new(T0)),
    );
    rig.engine.play("/videos/a.mp4", true).await.unwrap();
    settle(Duration::from_secs(2)).await;

    let reasons = rig.events.failed_reasons();
    assert_eq!(reasons.len(), 1);
    assert!(reasons[0].contains("playback could not start"));
    assert_eq!(rig.engine.stats().transitions_failed, 1);
    let snapshot = rig.engine.snapshot().await.unwrap();
    assert_eq!(snapshot.active_index, 0);
    assert_eq!(snapshot.transitioning_to, None);

    // Once the renderer allows playback, the same request succeeds.
    rig.back.set_reject_play(None);
    rig.engine.play("/videos/a.mp4", true).await.unwrap();
    settle(Duration::from_secs(3)).await;
    assert_eq!(rig.engine.stats().transitions_completed, 1);
    assert_eq!(rig.engine.snapshot().await.unwrap().active_index, 1);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_play_url_reports_failure() {
    let rig = rig();
    rig.engine.play("http://[oops", true).await.unwrap();
    settle(Duration::from_millis(10)).await;

    let reasons = rig.events.failed_reasons();
    assert_eq!(reasons.len(), 1);
    assert!(reasons[0].contains("invalid URL"));
    let stats = rig.engine.stats();
    assert_eq!(stats.transitions_started, 0);
    assert_eq!(stats.transitions_failed, 1);
    assert_eq!(rig.engine.snapshot().await.unwrap().transitioning_to, None);
}

#[tokio::test(start_paused = true)]
async fn test_returning_clip_skips_reload() {
    let rig = rig();
    rig.engine.play("/videos/a.mp4", true).await.unwrap();
    settle(Duration::from_secs(2)).await;
    rig.engine.play("/videos/b.mp4", true).await.unwrap();
    settle(Duration::from_secs(2)).await;
    assert_eq!(rig.back.load_count(), 1);
    assert_eq!(rig.front.load_count(), 1);

    // Back still holds a.mp4 fully buffered from the first crossfade.
    rig.engine.play("/videos/a.mp4", true).await.unwrap();
    settle(Duration::from_secs(2)).await;

    assert_eq!(rig.back.load_count(), 1);
    assert_eq!(rig.back.source(), Some(media("/videos/a.mp4")));
    assert!(rig.back.is_active());
    assert_eq!(rig.engine.stats().transitions_completed, 3);
}

#[tokio::test(start_paused = true)]
async fn test_followup_preload_waits_its_delay() {
    let rig = rig();
    rig.engine
        .play_with_next("/videos/a.mp4", true, "/videos/b.mp4")
        .await
        .unwrap();

    // Shortly after the play the follow-up has not been requested yet.
    settle(Duration::from_secs(1)).await;
    assert_eq!(rig.engine.snapshot().await.unwrap().cache_entries, 0);

    // After the announce delay it lands in the cache and warms up.
    settle(Duration::from_secs(2)).await;
    let snapshot = rig.engine.snapshot().await.unwrap();
    assert_eq!(snapshot.cache_entries, 1);
    assert_eq!(snapshot.cache_ready, 1);
    assert_eq!(
        rig.factory.created()[0].source(),
        Some(media("/videos/b.mp4"))
    );
}
