//! Engine-level scenarios running the real refresh thread against scripted
//! sources and capture sinks.

use anyhow::Result;
use avsync::clock::relative_time;
use avsync::{
    AudioSource, MediaSource, PassthroughScaler, PlayerState, SyncConfig, SyncEngine, SyncEvent,
    SyncSource, VideoSource,
};
use avsync_integration_tests::{
    wait_until, CaptureSink, FailingScaler, FailingSink, ScriptedVideoSource, SilentAudioSource,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn video_master_engine() -> Result<(SyncEngine, Arc<PlayerState>)> {
    let state = Arc::new(PlayerState::new());
    state.set_sync_source(SyncSource::Video);
    let engine = SyncEngine::new(
        SyncConfig::default(),
        Arc::clone(&state),
        Box::new(PassthroughScaler),
    )?;
    Ok((engine, state))
}

#[test]
fn presents_frames_in_order() -> Result<()> {
    let (engine, _state) = video_master_engine()?;
    let (sink, presented) = CaptureSink::new();
    engine.set_surface(Some(Box::new(sink)));
    let events = engine.events();

    let video = Arc::new(ScriptedVideoSource::new(32));
    video.push_sequence(0.0, 0.04, 8);
    let source: Arc<dyn VideoSource> = Arc::clone(&video) as Arc<dyn VideoSource>;

    engine.refresh_video_timer();
    engine.start(&source, None);

    assert!(wait_until(Duration::from_secs(2), || {
        presented.load(Ordering::Relaxed) >= 6
    }));
    engine.stop();

    let shown: Vec<f64> = events
        .try_iter()
        .filter_map(|event| match event {
            SyncEvent::FrameShown { pts } => Some(pts),
            _ => None,
        })
        .collect();
    assert!(shown.len() >= 6, "only {} frames shown", shown.len());
    assert!(
        shown.windows(2).all(|pair| pair[0] <= pair[1]),
        "presentation order regressed: {:?}",
        shown
    );

    // The video clock ended up anchored to a presented frame.
    let master = engine.get_master_clock();
    assert!(master >= 0.0 && master < 2.0, "master clock at {}", master);
    Ok(())
}

#[test]
fn pause_freezes_master_clock() -> Result<()> {
    let (engine, state) = video_master_engine()?;
    let (sink, presented) = CaptureSink::new();
    engine.set_surface(Some(Box::new(sink)));

    let video = Arc::new(ScriptedVideoSource::new(64));
    video.push_sequence(0.0, 0.04, 50);
    let source: Arc<dyn VideoSource> = Arc::clone(&video) as Arc<dyn VideoSource>;

    engine.refresh_video_timer();
    engine.start(&source, None);

    assert!(wait_until(Duration::from_secs(2), || {
        presented.load(Ordering::Relaxed) >= 2
    }));

    state.set_pause_requested(true);
    std::thread::sleep(Duration::from_millis(60));

    let frozen = engine.get_master_clock();
    assert!(!frozen.is_nan());
    let presented_at_pause = presented.load(Ordering::Relaxed);

    std::thread::sleep(Duration::from_millis(150));
    assert!(
        (engine.get_master_clock() - frozen).abs() < 0.02,
        "clock advanced while paused"
    );
    assert_eq!(presented.load(Ordering::Relaxed), presented_at_pause);

    state.set_pause_requested(false);
    assert!(wait_until(Duration::from_secs(2), || {
        presented.load(Ordering::Relaxed) > presented_at_pause
    }));

    engine.stop();
    Ok(())
}

#[test]
fn drops_frames_when_far_behind_audio() -> Result<()> {
    let state = Arc::new(PlayerState::new());
    let engine = SyncEngine::new(
        SyncConfig::default(),
        Arc::clone(&state),
        Box::new(PassthroughScaler),
    )?;
    let (sink, _presented) = CaptureSink::new();
    engine.set_surface(Some(Box::new(sink)));
    let events = engine.events();

    let video = Arc::new(ScriptedVideoSource::new(32));
    video.push_sequence(0.0, 0.04, 10);
    let source: Arc<dyn VideoSource> = Arc::clone(&video) as Arc<dyn VideoSource>;

    // Audio is five seconds ahead before video even starts.
    engine.update_audio_clock(5.0, relative_time());
    engine.start(&source, None);

    assert!(wait_until(Duration::from_secs(2), || {
        video.frame_queue().size() == 0
    }));
    engine.stop();

    let dropped = events
        .try_iter()
        .filter(|event| matches!(event, SyncEvent::FrameDropped { .. }))
        .count();
    assert!(dropped >= 1, "expected catch-up drops, got none");
    Ok(())
}

#[test]
fn seek_revalidates_video_clock() -> Result<()> {
    let (engine, _state) = video_master_engine()?;
    let (sink, presented) = CaptureSink::new();
    engine.set_surface(Some(Box::new(sink)));

    let video = Arc::new(ScriptedVideoSource::new(32));
    video.push_sequence(0.0, 0.04, 5);
    let source: Arc<dyn VideoSource> = Arc::clone(&video) as Arc<dyn VideoSource>;

    engine.refresh_video_timer();
    engine.start(&source, None);
    assert!(wait_until(Duration::from_secs(2), || {
        presented.load(Ordering::Relaxed) >= 2
    }));

    // Seek: the controller flushes the queue, then tells the engine to
    // re-anchor its frame timer.
    video.flush();
    assert!(wait_until(Duration::from_secs(1), || {
        engine.get_master_clock().is_nan()
    }));

    video.push_sequence(60.0, 0.04, 5);
    engine.refresh_video_timer();

    assert!(wait_until(Duration::from_secs(2), || {
        let master = engine.get_master_clock();
        !master.is_nan() && master >= 60.0
    }));

    engine.stop();
    Ok(())
}

#[test]
fn display_disable_suppresses_presentation() -> Result<()> {
    let (engine, state) = video_master_engine()?;
    state.set_display_disabled(true);
    let (sink, presented) = CaptureSink::new();
    engine.set_surface(Some(Box::new(sink)));

    let video = Arc::new(ScriptedVideoSource::new(32));
    video.push_sequence(0.0, 0.04, 6);
    let source: Arc<dyn VideoSource> = Arc::clone(&video) as Arc<dyn VideoSource>;

    engine.refresh_video_timer();
    engine.start(&source, None);

    // Timing still advances through the queue, but nothing is presented.
    assert!(wait_until(Duration::from_secs(2), || {
        video.frame_queue().size() == 0
    }));
    engine.stop();
    assert_eq!(presented.load(Ordering::Relaxed), 0);
    Ok(())
}

#[test]
fn scaler_failure_skips_render_without_stalling() -> Result<()> {
    let state = Arc::new(PlayerState::new());
    state.set_sync_source(SyncSource::Video);
    let engine = SyncEngine::new(
        SyncConfig::default(),
        Arc::clone(&state),
        Box::new(FailingScaler),
    )?;
    let (sink, presented) = CaptureSink::new();
    engine.set_surface(Some(Box::new(sink)));

    let video = Arc::new(ScriptedVideoSource::new(32));
    video.push_sequence(0.0, 0.04, 6);
    let source: Arc<dyn VideoSource> = Arc::clone(&video) as Arc<dyn VideoSource>;

    engine.refresh_video_timer();
    engine.start(&source, None);

    assert!(wait_until(Duration::from_secs(2), || {
        video.frame_queue().size() == 0
    }));
    engine.stop();
    assert_eq!(presented.load(Ordering::Relaxed), 0);
    Ok(())
}

#[test]
fn sink_failure_is_absorbed() -> Result<()> {
    let (engine, _state) = video_master_engine()?;
    engine.set_surface(Some(Box::new(FailingSink)));
    let events = engine.events();

    let video = Arc::new(ScriptedVideoSource::new(32));
    video.push_sequence(0.0, 0.04, 6);
    let source: Arc<dyn VideoSource> = Arc::clone(&video) as Arc<dyn VideoSource>;

    engine.refresh_video_timer();
    engine.start(&source, None);

    assert!(wait_until(Duration::from_secs(2), || {
        video.frame_queue().size() == 0
    }));
    engine.stop();

    assert!(!events
        .try_iter()
        .any(|event| matches!(event, SyncEvent::FrameShown { .. })));
    Ok(())
}

#[test]
fn stop_is_idempotent_and_restartable() -> Result<()> {
    let (engine, _state) = video_master_engine()?;
    let (sink, presented) = CaptureSink::new();
    engine.set_surface(Some(Box::new(sink)));

    let video = Arc::new(ScriptedVideoSource::new(64));
    video.push_sequence(0.0, 0.04, 4);
    let source: Arc<dyn VideoSource> = Arc::clone(&video) as Arc<dyn VideoSource>;

    engine.refresh_video_timer();
    engine.start(&source, None);
    assert!(wait_until(Duration::from_secs(2), || {
        presented.load(Ordering::Relaxed) >= 1
    }));

    engine.stop();
    engine.stop();

    let shown_before = presented.load(Ordering::Relaxed);
    video.push_sequence(1.0, 0.04, 4);
    engine.refresh_video_timer();
    engine.start(&source, None);

    assert!(wait_until(Duration::from_secs(2), || {
        presented.load(Ordering::Relaxed) > shown_before
    }));
    engine.stop();
    Ok(())
}

#[test]
fn video_stays_locked_to_audio() -> Result<()> {
    let state = Arc::new(PlayerState::new());
    let engine = Arc::new(SyncEngine::new(
        SyncConfig::default(),
        Arc::clone(&state),
        Box::new(PassthroughScaler),
    )?);
    let (sink, _presented) = CaptureSink::new();
    engine.set_surface(Some(Box::new(sink)));

    let video = Arc::new(ScriptedVideoSource::new(64));
    video.push_sequence(0.0, 0.04, 30);
    let source: Arc<dyn VideoSource> = Arc::clone(&video) as Arc<dyn VideoSource>;

    engine.refresh_video_timer();
    engine.start(&source, None);

    // Audio path: report wall-time progress as the audio position.
    let audio_engine = Arc::clone(&engine);
    let start = relative_time();
    let feeder = std::thread::spawn(move || {
        for _ in 0..60 {
            audio_engine.update_audio_clock(relative_time() - start, relative_time());
            std::thread::sleep(Duration::from_millis(10));
        }
    });

    std::thread::sleep(Duration::from_millis(500));
    let diff = engine.get_audio_diff_clock();
    let drift = engine.video_clock().get() - engine.audio_clock().get();
    feeder.join().ok();
    engine.stop();

    assert!(
        diff.abs() < 1e-3,
        "audio is master, so its self-difference stays near zero, got {}",
        diff
    );
    assert!(
        drift.abs() <= 0.15,
        "A/V drift {} exceeded the sync window",
        drift
    );
    Ok(())
}

#[test]
fn audio_sources_are_held_weakly() -> Result<()> {
    let state = Arc::new(PlayerState::new());
    let engine = SyncEngine::new(
        SyncConfig::default(),
        Arc::clone(&state),
        Box::new(PassthroughScaler),
    )?;

    let video = Arc::new(ScriptedVideoSource::new(16));
    let source: Arc<dyn VideoSource> = Arc::clone(&video) as Arc<dyn VideoSource>;
    let audio: Arc<dyn AudioSource> = Arc::new(SilentAudioSource::new(8));

    engine.start(&source, Some(&audio));
    drop(audio);

    // A torn-down audio decoder turns its ticks into no-ops rather than
    // keeping the object alive.
    std::thread::sleep(Duration::from_millis(50));
    engine.stop();
    Ok(())
}
