//! Core types for Lumen playback

use crate::drm::DrmDescriptor;
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use url::Url;
use uuid::Uuid;

/// Unique identifier for a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Playback state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackState {
    /// No content loaded; engine is reusable across sessions
    Idle,
    /// Waiting for the backend to fill its pipeline
    Buffering,
    /// Content is playing
    Playing,
    /// Playback paused
    Paused,
}

impl PlaybackState {
    /// Check if transition to target state is valid
    pub fn can_transition_to(&self, target: PlaybackState) -> bool {
        use PlaybackState::*;
        matches!(
            (self, target),
            // From Idle
            (Idle, Buffering) |
            // From Buffering
            (Buffering, Playing) | (Buffering, Paused) | (Buffering, Idle) |
            // From Playing
            (Playing, Paused) | (Playing, Buffering) | (Playing, Idle) |
            // From Paused
            (Paused, Playing) | (Paused, Buffering) | (Paused, Idle)
        )
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Buffering => write!(f, "buffering"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
        }
    }
}

/// Player viewport geometry in px
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRect {
    pub width: u32,
    pub height: u32,
    pub top: i32,
    pub left: i32,
}

impl VideoRect {
    pub fn new(width: u32, height: u32, top: i32, left: i32) -> Self {
        Self {
            width,
            height,
            top,
            left,
        }
    }
}

impl Default for VideoRect {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            top: 0,
            left: 0,
        }
    }
}

/// Seek target: absolute milliseconds or a percentage of the duration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SeekTarget {
    Millis(i64),
    Percent(f64),
}

impl SeekTarget {
    /// Resolve against a duration, clamped to `[0, duration]`
    pub fn resolve(&self, duration_ms: i64) -> i64 {
        let duration_ms = duration_ms.max(0);
        let target = match self {
            SeekTarget::Millis(ms) => *ms,
            SeekTarget::Percent(pct) => ((duration_ms as f64) * pct / 100.0).round() as i64,
        };
        target.clamp(0, duration_ms)
    }
}

impl From<i64> for SeekTarget {
    fn from(ms: i64) -> Self {
        SeekTarget::Millis(ms)
    }
}

impl FromStr for SeekTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(pct) = s.strip_suffix('%') {
            let pct: f64 = pct
                .trim()
                .parse()
                .map_err(|_| Error::configuration(format!("invalid percentage seek: {s:?}")))?;
            return Ok(SeekTarget::Percent(pct));
        }
        let ms: i64 = s
            .parse()
            .map_err(|_| Error::configuration(format!("invalid seek position: {s:?}")))?;
        Ok(SeekTarget::Millis(ms))
    }
}

/// A single playback session, exclusively owned by the engine.
///
/// Created on `play()`, mutated only by engine methods and backend
/// callbacks, reset on `stop()`, fatal error, or a new `play()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackSession {
    pub id: SessionId,
    pub url: Url,
    pub duration_ms: i64,
    pub current_time_ms: i64,
    pub state: PlaybackState,
    pub previous_state: PlaybackState,
    pub speed: f64,
    pub looping: bool,
    pub is_timeshifted_live_stream: bool,
    pub geometry: VideoRect,
    pub muted: bool,
}

impl PlaybackSession {
    pub fn new(url: Url, looping: bool, timeshifted: bool, geometry: VideoRect) -> Self {
        Self {
            id: SessionId::new(),
            url,
            duration_ms: 0,
            current_time_ms: 0,
            state: PlaybackState::Idle,
            previous_state: PlaybackState::Idle,
            speed: 1.0,
            looping,
            is_timeshifted_live_stream: timeshifted,
            geometry,
            muted: false,
        }
    }
}

/// Options for starting playback
#[derive(Debug, Clone, Default)]
pub struct PlayOptions {
    /// Content URL; falls back to the current session's URL when omitted
    pub url: Option<Url>,
    /// Start position in milliseconds
    pub position_ms: Option<i64>,
    /// Restart from the beginning on natural end
    pub looping: bool,
    /// Live broadcast exposed as a seekable buffer near the live edge
    pub is_timeshifted_live_stream: bool,
}

impl PlayOptions {
    pub fn url(url: Url) -> Self {
        Self {
            url: Some(url),
            ..Default::default()
        }
    }
}

/// Player configuration
///
/// The timeout and threshold values are empirical tuning parameters
/// inherited from observed vendor behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Player geometry used by `fullscreen()`
    pub geometry: VideoRect,
    /// Default skip amount for `forward()`/`backward()` (ms)
    pub seek_step_ms: i64,
    /// Initial muted flag
    pub muted: bool,
    /// DRM descriptor for protected content
    pub drm: Option<DrmDescriptor>,
    /// Device ESN used as the default DRM device identity
    pub device_esn: String,
    /// Confirmation band for timeshift seek detection (ms)
    pub drift_confirmation_ms: i64,
    /// Seek tracker countdown budget (ms)
    pub seek_tracker_budget_ms: u64,
    /// Seek tracker tick granularity (ms)
    pub seek_tracker_tick_ms: u64,
    /// Progress-stall budget while playing (ms)
    pub stall_budget_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            geometry: VideoRect::default(),
            seek_step_ms: 20_000,
            muted: false,
            drm: None,
            device_esn: "LUMEN-ESN-0000".to_string(),
            drift_confirmation_ms: 1_500,
            seek_tracker_budget_ms: 20_000,
            seek_tracker_tick_ms: 1_000,
            stall_budget_ms: 10_000,
        }
    }
}
