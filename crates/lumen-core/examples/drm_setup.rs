//! DRM negotiation example
//!
//! Shows how one descriptor maps to the two backend-specific artifacts.
//! Run with: cargo run --example drm_setup

use lumen_core::{negotiate, DrmCapability, DrmDescriptor};
use url::Url;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let descriptor = DrmDescriptor {
        device_id: Some("abc".to_string()),
        portal: Some("retail".to_string()),
        stream_id: Some("ch-42".to_string()),
        heartbeat_url: Some(Url::parse("https://drm.example.com/heartbeat")?),
        heartbeat_period_s: Some(30),
        ..DrmDescriptor::widevine(Url::parse("https://license.example.com/wv")?)
    };

    for capability in [DrmCapability::Widevine, DrmCapability::PlayReady] {
        println!("--- {capability} backend ---");
        match negotiate(&descriptor, capability, "LUMEN-ESN-0000")? {
            Some(artifact) => println!("{artifact:?}"),
            None => println!("content is unprotected"),
        }
    }

    Ok(())
}
