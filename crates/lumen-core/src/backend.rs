//! Native backend capability contract
//!
//! Each platform wraps its vendor media object in one adapter implementing
//! [`NativeBackend`]. The engine drives the adapter through a single command
//! sink and receives a small asynchronous callback set in return; whether the
//! adapter polls the vendor object on a tick or gets push notifications is
//! adapter-local. Duplicate and out-of-order callbacks are tolerated.

use crate::types::{PlaybackState, VideoRect};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// DRM system a backend can drive natively
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DrmCapability {
    Widevine,
    PlayReady,
    None,
}

impl std::fmt::Display for DrmCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DrmCapability::Widevine => write!(f, "WIDEVINE"),
            DrmCapability::PlayReady => write!(f, "PLAYREADY"),
            DrmCapability::None => write!(f, "NONE"),
        }
    }
}

/// Commands accepted by every backend's command sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NativeCommand {
    Play {
        url: String,
        position_ms: Option<i64>,
    },
    Pause,
    Stop,
    Seek {
        position_ms: i64,
    },
    PlaybackSpeed {
        speed: f64,
    },
    Show {
        rect: VideoRect,
    },
    Hide,
    SetVideoDimensions {
        width: u32,
        height: u32,
    },
    AudioTrack {
        index: u32,
    },
    Mute,
    Unmute,
    /// Out-of-band DRM initiator message on the backend's DRM channel
    DrmMessage {
        payload: String,
    },
}

/// The capability contract every platform adapter must satisfy
#[async_trait]
pub trait NativeBackend: Send + Sync {
    /// Acquire the vendor media object
    async fn init_native(&self) -> Result<()>;

    /// Release the vendor media object
    async fn deinit_native(&self) -> Result<()>;

    /// Single command sink; fire-and-forget once dispatched
    async fn native(&self, cmd: NativeCommand) -> Result<()>;

    /// DRM system this backend drives, declared once at boot
    fn drm_capability(&self) -> DrmCapability;
}

/// Callbacks a backend invokes asynchronously toward the engine
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    DurationChange { duration_ms: i64 },
    TimeUpdate { position_ms: i64 },
    Ended,
    Error {
        code: i32,
        message: String,
        details: Option<String>,
    },
    State { state: PlaybackState },
}

/// Handle a backend uses to deliver its callback set.
///
/// Sends are fire-and-forget; a dropped engine simply swallows them.
#[derive(Debug, Clone)]
pub struct BackendHandle {
    pub(crate) tx: mpsc::UnboundedSender<BackendEvent>,
}

impl BackendHandle {
    pub fn on_duration_change(&self, duration_ms: i64) {
        let _ = self.tx.send(BackendEvent::DurationChange { duration_ms });
    }

    pub fn on_time_update(&self, position_ms: i64) {
        let _ = self.tx.send(BackendEvent::TimeUpdate { position_ms });
    }

    pub fn on_end(&self) {
        let _ = self.tx.send(BackendEvent::Ended);
    }

    pub fn on_error(&self, code: i32, message: impl Into<String>, details: Option<String>) {
        let _ = self.tx.send(BackendEvent::Error {
            code,
            message: message.into(),
            details,
        });
    }

    /// Explicit state report; always re-emits `statechange`, even when the
    /// value is unchanged, so consumers can resynchronize their UI.
    pub fn state(&self, state: PlaybackState) {
        let _ = self.tx.send(BackendEvent::State { state });
    }
}

#[derive(Debug, Default)]
struct RecordingInner {
    commands: Mutex<Vec<NativeCommand>>,
    initialized: AtomicBool,
}

/// In-memory backend that records every command it receives.
///
/// Used by the examples and the test suite; no vendor object behind it.
#[derive(Debug, Clone)]
pub struct RecordingBackend {
    capability: DrmCapability,
    inner: Arc<RecordingInner>,
}

impl RecordingBackend {
    pub fn new(capability: DrmCapability) -> Self {
        Self {
            capability,
            inner: Arc::new(RecordingInner::default()),
        }
    }

    /// Snapshot of all commands received so far
    pub fn commands(&self) -> Vec<NativeCommand> {
        self.inner.commands.lock().unwrap().clone()
    }

    pub fn last_command(&self) -> Option<NativeCommand> {
        self.inner.commands.lock().unwrap().last().cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::SeqCst)
    }
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new(DrmCapability::None)
    }
}

#[async_trait]
impl NativeBackend for RecordingBackend {
    async fn init_native(&self) -> Result<()> {
        self.inner.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn deinit_native(&self) -> Result<()> {
        self.inner.initialized.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn native(&self, cmd: NativeCommand) -> Result<()> {
        self.inner.commands.lock().unwrap().push(cmd);
        Ok(())
    }

    fn drm_capability(&self) -> DrmCapability {
        self.capability
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_backend_lifecycle() {
        let backend = RecordingBackend::default();
        assert!(!backend.is_initialized());

        backend.init_native().await.unwrap();
        assert!(backend.is_initialized());

        backend.native(NativeCommand::Pause).await.unwrap();
        backend
            .native(NativeCommand::Seek { position_ms: 1000 })
            .await
            .unwrap();
        assert_eq!(backend.commands().len(), 2);
        assert_eq!(
            backend.last_command(),
            Some(NativeCommand::Seek { position_ms: 1000 })
        );

        backend.deinit_native().await.unwrap();
        assert!(!backend.is_initialized());
    }

    #[test]
    fn test_recording_backend_clones_share_log() {
        let backend = RecordingBackend::default();
        let clone = backend.clone();
        backend
            .inner
            .commands
            .lock()
            .unwrap()
            .push(NativeCommand::Hide);
        assert_eq!(clone.commands(), vec![NativeCommand::Hide]);
    }
}
