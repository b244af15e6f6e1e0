//! External-clock scenarios: master selection and buffer-driven speed
//! regulation through the running refresh loop.

use anyhow::Result;
use avsync::{
    AudioSource, PassthroughScaler, PlayerState, SyncConfig, SyncEngine, SyncEvent, SyncSource,
    VideoSource,
};
use avsync_integration_tests::{wait_until, ScriptedVideoSource, SilentAudioSource};
use std::sync::Arc;
use std::time::Duration;

fn external_engine() -> Result<(SyncEngine, Arc<PlayerState>)> {
    let state = Arc::new(PlayerState::new());
    state.set_sync_source(SyncSource::External);
    state.set_real_time(true);
    let engine = SyncEngine::new(
        SyncConfig::default(),
        Arc::clone(&state),
        Box::new(PassthroughScaler),
    )?;
    Ok((engine, state))
}

#[test]
fn external_clock_is_master() -> Result<()> {
    let (engine, _state) = external_engine()?;
    engine.update_external_clock(42.0);
    let master = engine.get_master_clock();
    assert!((master - 42.0).abs() < 0.05, "master at {}", master);
    Ok(())
}

#[test]
fn starved_queues_slow_the_external_clock() -> Result<()> {
    let (engine, _state) = external_engine()?;
    let events = engine.events();

    let video = Arc::new(ScriptedVideoSource::new(16));
    video.set_packets(1);
    let audio_impl = Arc::new(SilentAudioSource::new(5));
    let source: Arc<dyn VideoSource> = Arc::clone(&video) as Arc<dyn VideoSource>;
    let audio: Arc<dyn AudioSource> = Arc::clone(&audio_impl) as Arc<dyn AudioSource>;

    engine.start(&source, Some(&audio));

    let config = SyncConfig::default();
    assert!(wait_until(Duration::from_secs(2), || {
        engine.external_clock().speed() < 0.995
    }));
    let speed = engine.external_clock().speed();
    assert!(
        speed >= config.ext_speed_min - 1e-9,
        "speed {} fell below the floor",
        speed
    );
    assert!(events
        .try_iter()
        .any(|event| matches!(event, SyncEvent::ExternalSpeedChanged { .. })));

    // Healthy buffers pull the speed back toward real time.
    video.set_packets(20);
    audio_impl.set_packets(20);
    let recovering_from = engine.external_clock().speed();
    assert!(wait_until(Duration::from_secs(2), || {
        engine.external_clock().speed() > recovering_from
    }));

    engine.stop();
    Ok(())
}
