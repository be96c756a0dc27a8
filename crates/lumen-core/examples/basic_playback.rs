//! Basic playback example
//!
//! Drives the engine against the in-memory recording backend and prints the
//! emitted event stream. Run with: cargo run --example basic_playback

use lumen_core::{
    DrmCapability, PlayOptions, PlaybackEngine, PlaybackState, PlayerConfig, RecordingBackend,
    SeekTarget,
};
use url::Url;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("lumen_core=debug")
        .init();
    lumen_core::init();

    let backend = RecordingBackend::new(DrmCapability::None);
    let engine = PlaybackEngine::new(PlayerConfig::default(), Box::new(backend.clone()));
    let mut events = engine.subscribe();

    engine
        .play(PlayOptions::url(Url::parse("http://example.com/movie.mp4")?))
        .await?;

    // A real backend would report these from its polling tick
    engine.on_duration_change(120_000).await;
    engine.on_state(PlaybackState::Playing).await;
    engine.on_time_update(500).await;

    engine.seek("50%".parse::<SeekTarget>()?).await?;
    engine.pause().await?;
    engine.play(PlayOptions::default()).await?;
    engine.stop().await?;

    println!("--- emitted events ---");
    while let Ok(record) = events.try_recv() {
        println!("{}", serde_json::to_string(&record.event)?);
    }

    println!("--- native commands ---");
    for command in backend.commands() {
        println!("{command:?}");
    }

    Ok(())
}
