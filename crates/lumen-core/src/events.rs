//! Playback event contract consumed by the UI layer
//!
//! The UI subscribes to this stream to drive progress bars, play/pause
//! iconography, and throbbers. Payloads are data, not rendering hints.

use crate::types::{PlaybackState, SessionId, VideoRect};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// Events emitted by the playback engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum PlayerEvent {
    #[serde(rename = "durationchange")]
    DurationChange { duration_ms: i64 },

    #[serde(rename = "timeupdate")]
    TimeUpdate { position_ms: i64 },

    #[serde(rename = "end")]
    End { position_ms: i64 },

    #[serde(rename = "error")]
    Error {
        code: i32,
        message: String,
        details: Option<String>,
        fatal: bool,
    },

    #[serde(rename = "statechange")]
    StateChange {
        state: PlaybackState,
        previous: PlaybackState,
    },

    /// Session was reset (stop, fatal error, or new play)
    #[serde(rename = "reset")]
    Reset,

    #[serde(rename = "show")]
    Show { rect: VideoRect },

    #[serde(rename = "hide")]
    Hide,

    /// Launch URL resolved for the session, DRM token included
    #[serde(rename = "url")]
    Url { url: String },

    #[serde(rename = "play")]
    Play { url: String, position_ms: i64 },

    #[serde(rename = "pause")]
    Pause { position_ms: i64 },

    #[serde(rename = "stop")]
    Stop { position_ms: i64 },

    #[serde(rename = "seek")]
    Seek { from_ms: i64, to_ms: i64 },

    #[serde(rename = "playbackspeed")]
    PlaybackSpeed { speed: f64 },

    #[serde(rename = "seek-start")]
    SeekStart,

    #[serde(rename = "seek-end")]
    SeekEnd,

    #[serde(rename = "mute")]
    Mute,

    #[serde(rename = "unmute")]
    Unmute,
}

/// An emitted event with its metadata envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerEventRecord {
    /// Unique event ID
    pub id: Uuid,
    /// Session the event belongs to, if one is active
    pub session_id: Option<SessionId>,
    /// Emission time
    pub timestamp: DateTime<Utc>,
    /// Event payload
    pub event: PlayerEvent,
}

/// Broadcast bus carrying the event contract
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlayerEventRecord>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to the event stream
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEventRecord> {
        self.tx.subscribe()
    }

    /// Emit a single event; dropped silently when nobody listens
    pub fn emit(&self, session_id: Option<SessionId>, event: PlayerEvent) {
        let record = PlayerEventRecord {
            id: Uuid::new_v4(),
            session_id,
            timestamp: Utc::now(),
            event,
        };
        debug!(?record.session_id, event = ?record.event, "Emitting player event");
        let _ = self.tx.send(record);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
