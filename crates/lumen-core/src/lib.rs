//! Lumen Core - Unified playback library
//!
//! This crate provides the core playback functionality:
//! - A single playback state machine reconciling heterogeneous native
//!   player event streams
//! - DRM negotiation (URL token or out-of-band initiator message)
//! - Position reconciliation for timeshifted live streams
//! - Seek confirmation tracking
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Lumen Core                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐          │
//! │  │     DRM      │  │   Timeshift  │  │     Seek     │          │
//! │  │ Negotiation  │  │    Drift     │  │   Tracker    │          │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘          │
//! │         │                 │                 │                   │
//! │         └─────────────────┼─────────────────┘                   │
//! │                           │                                     │
//! │                    ┌──────┴──────┐                              │
//! │                    │  Playback   │                              │
//! │                    │   Engine    │                              │
//! │                    └──────┬──────┘                              │
//! │                           │                                     │
//! │  ┌──────────────┐  ┌──────┴──────┐  ┌──────────────┐           │
//! │  │    Event     │  │   Native    │  │    Named     │           │
//! │  │     Bus      │  │   Backend   │  │    Timers    │           │
//! │  └──────────────┘  └─────────────┘  └──────────────┘           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The vendor-specific adapters behind [`NativeBackend`] live outside this
//! crate; one is selected at startup by the host's device detection and
//! never swapped within a session.

pub mod backend;
pub mod drm;
pub mod engine;
pub mod error;
pub mod events;
pub mod timeshift;
pub mod types;

mod timers;
mod tracker;

pub use backend::{
    BackendEvent, BackendHandle, DrmCapability, NativeBackend, NativeCommand, RecordingBackend,
};
pub use drm::{negotiate, DrmArtifact, DrmDescriptor, DrmKind};
pub use engine::PlaybackEngine;
pub use error::{Error, Result};
pub use events::{EventBus, PlayerEvent, PlayerEventRecord};
pub use timeshift::DriftCorrector;
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the player library with default configuration
pub fn init() {
    tracing::info!(version = VERSION, "Lumen Core initialized");
}
