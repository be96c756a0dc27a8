//! Playback engine - the central state machine
//!
//! Reconciles heterogeneous, often unreliable native player event streams
//! into one consistent playback model. Composes DRM negotiation, timeshift
//! drift correction, and the seek tracker; exposes the public command
//! surface and emits the event contract the UI layer consumes.
//!
//! One engine instance lives for the whole application run and is reused
//! across sessions. Every operation is a re-entrant call on the host loop,
//! triggered either by an application command or by a backend callback; the
//! engine never retries or backs off on its own.

use crate::{
    backend::{BackendEvent, BackendHandle, NativeBackend, NativeCommand},
    drm::{self, DrmArtifact},
    error::{Error, Result},
    events::{EventBus, PlayerEvent, PlayerEventRecord},
    timers::{TimerKey, TimerRegistry},
    timeshift::DriftCorrector,
    tracker::spawn_seek_tracker,
    types::*,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Apply a state transition on the session, mirroring it to the watch
/// channel and the event bus.
///
/// Value-level idempotence: an unchanged state is a no-op unless `forced`
/// (an explicit backend `state()` report), which always re-emits
/// `statechange` so consumers can resynchronize. Entering buffering keeps
/// the remembered previous state across repeated buffering bursts.
fn apply_transition(
    session: &mut PlaybackSession,
    state_tx: &watch::Sender<PlaybackState>,
    events: &EventBus,
    new_state: PlaybackState,
    forced: bool,
) -> bool {
    let current = session.state;
    if current == new_state {
        if forced {
            events.emit(
                Some(session.id),
                PlayerEvent::StateChange {
                    state: new_state,
                    previous: session.previous_state,
                },
            );
        }
        return forced;
    }
    if !current.can_transition_to(new_state) && !forced {
        warn!(from = %current, to = %new_state, "Ignoring invalid state transition");
        return false;
    }
    if current != PlaybackState::Buffering {
        session.previous_state = current;
    }
    session.state = new_state;
    // send_replace stores the value even when no receiver is subscribed
    state_tx.send_replace(new_state);
    info!(from = %current, to = %new_state, "State transition");
    events.emit(
        Some(session.id),
        PlayerEvent::StateChange {
            state: new_state,
            previous: session.previous_state,
        },
    );
    true
}

/// Re-enter buffering when a playing backend stops reporting progress.
///
/// Buffering is an expected transient, never an error; the watchdog is
/// re-armed by the next progress observation.
fn spawn_stall_watchdog(
    session: Arc<RwLock<Option<PlaybackSession>>>,
    state_tx: watch::Sender<PlaybackState>,
    events: EventBus,
    mut progress_rx: watch::Receiver<i64>,
    budget: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match tokio::time::timeout(budget, progress_rx.changed()).await {
                Ok(Ok(())) => continue,
                Ok(Err(_)) => break,
                Err(_) => {
                    let mut guard = session.write().await;
                    let Some(s) = guard.as_mut() else { continue };
                    if s.state == PlaybackState::Playing {
                        warn!(
                            budget_ms = budget.as_millis() as u64,
                            "No playback progress within budget; re-entering buffering"
                        );
                        apply_transition(s, &state_tx, &events, PlaybackState::Buffering, false);
                    }
                }
            }
        }
    })
}

/// Unified playback engine
pub struct PlaybackEngine {
    config: PlayerConfig,
    backend: Box<dyn NativeBackend>,
    /// The only shared mutable resource; exclusively owned by the engine
    session: Arc<RwLock<Option<PlaybackSession>>>,
    /// Launch URL of the active session, DRM token included
    launch_url: RwLock<Option<String>>,
    /// Engine-wide muted flag; survives across sessions
    muted: RwLock<bool>,
    backend_ready: RwLock<bool>,
    state_tx: watch::Sender<PlaybackState>,
    /// Raw-time progress feed for the stall watchdog
    progress_tx: watch::Sender<i64>,
    events: EventBus,
    drift: RwLock<Option<DriftCorrector>>,
    timers: TimerRegistry,
}

impl PlaybackEngine {
    /// Create a new engine around a platform backend
    pub fn new(config: PlayerConfig, backend: Box<dyn NativeBackend>) -> Self {
        let (state_tx, _) = watch::channel(PlaybackState::Idle);
        let (progress_tx, _) = watch::channel(0i64);
        Self {
            muted: RwLock::new(config.muted),
            config,
            backend,
            session: Arc::new(RwLock::new(None)),
            launch_url: RwLock::new(None),
            backend_ready: RwLock::new(false),
            state_tx,
            progress_tx,
            events: EventBus::default(),
            drift: RwLock::new(None),
            timers: TimerRegistry::new(),
        }
    }

    /// Current playback state
    pub fn state(&self) -> PlaybackState {
        *self.state_tx.borrow()
    }

    /// Subscribe to state changes
    pub fn subscribe_state(&self) -> watch::Receiver<PlaybackState> {
        self.state_tx.subscribe()
    }

    /// Subscribe to the emitted event stream
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEventRecord> {
        self.events.subscribe()
    }

    /// Snapshot of the active session
    pub async fn session(&self) -> Option<PlaybackSession> {
        self.session.read().await.clone()
    }

    /// Current position in milliseconds
    pub async fn position(&self) -> i64 {
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.current_time_ms)
            .unwrap_or(0)
    }

    /// Content duration in milliseconds (live edge for timeshifted streams)
    pub async fn duration(&self) -> i64 {
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.duration_ms)
            .unwrap_or(0)
    }

    /// Create the callback handle a backend delivers its events through
    pub fn backend_handle(self: &Arc<Self>) -> BackendHandle {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                engine.dispatch_backend_event(event).await;
            }
        });
        BackendHandle { tx }
    }

    async fn dispatch_backend_event(&self, event: BackendEvent) {
        match event {
            BackendEvent::DurationChange { duration_ms } => {
                self.on_duration_change(duration_ms).await
            }
            BackendEvent::TimeUpdate { position_ms } => self.on_time_update(position_ms).await,
            BackendEvent::Ended => self.on_end().await,
            BackendEvent::Error {
                code,
                message,
                details,
            } => self.on_error(code, &message, details).await,
            BackendEvent::State { state } => self.on_state(state).await,
        }
    }

    async fn with_session<T>(&self, f: impl FnOnce(&mut PlaybackSession) -> T) -> Option<T> {
        self.session.write().await.as_mut().map(f)
    }

    async fn current_session_id(&self) -> Option<SessionId> {
        self.session.read().await.as_ref().map(|s| s.id)
    }

    // -------------------------------------------------------------------
    // Command surface
    // -------------------------------------------------------------------

    /// Start playback of a new session, or resume a paused one when called
    /// bare. Fails synchronously when no URL can be resolved.
    #[instrument(skip(self))]
    pub async fn play(&self, opts: PlayOptions) -> Result<()> {
        let existing = {
            let guard = self.session.read().await;
            guard.as_ref().map(|s| (s.url.clone(), s.state))
        };

        if let Some((_, PlaybackState::Paused)) = existing {
            if opts.url.is_none() && opts.position_ms.is_none() {
                return self.resume().await;
            }
        }

        let url = opts
            .url
            .clone()
            .or_else(|| existing.as_ref().map(|(url, _)| url.clone()))
            .ok_or_else(|| {
                Error::configuration("play() called without a URL and no session to take one from")
            })?;

        if existing.is_some() {
            self.teardown(false).await;
        }

        if !*self.backend_ready.read().await {
            self.backend.init_native().await?;
            *self.backend_ready.write().await = true;
        }

        // DRM comes first; a rejected negotiation never reaches native play
        let mut launch_url = url.to_string();
        if let Some(descriptor) = &self.config.drm {
            let capability = self.backend.drm_capability();
            match drm::negotiate(descriptor, capability, &self.config.device_esn)? {
                Some(DrmArtifact::UrlToken(token)) => {
                    launch_url = format!("{launch_url}|{token}");
                }
                Some(DrmArtifact::Initiator(message)) => {
                    self.backend
                        .native(NativeCommand::DrmMessage {
                            payload: message.to_string(),
                        })
                        .await?;
                }
                None => {}
            }
        }

        let mut session = PlaybackSession::new(
            url,
            opts.looping,
            opts.is_timeshifted_live_stream,
            self.config.geometry,
        );
        session.muted = *self.muted.read().await;
        if let Some(position) = opts.position_ms {
            session.current_time_ms = position.max(0);
        }
        let id = session.id;
        info!(
            session_id = %id,
            url = %session.url,
            timeshifted = session.is_timeshifted_live_stream,
            "Starting playback"
        );

        *self.drift.write().await = session
            .is_timeshifted_live_stream
            .then(|| DriftCorrector::new(self.config.drift_confirmation_ms));
        *self.launch_url.write().await = Some(launch_url.clone());
        *self.session.write().await = Some(session);

        self.events
            .emit(Some(id), PlayerEvent::Url { url: launch_url.clone() });
        self.events.emit(
            Some(id),
            PlayerEvent::Play {
                url: launch_url.clone(),
                position_ms: opts.position_ms.unwrap_or(0),
            },
        );

        {
            let mut guard = self.session.write().await;
            if let Some(s) = guard.as_mut() {
                apply_transition(s, &self.state_tx, &self.events, PlaybackState::Buffering, false);
            }
        }

        self.backend
            .native(NativeCommand::Play {
                url: launch_url,
                position_ms: opts.position_ms,
            })
            .await?;
        if *self.muted.read().await {
            self.backend.native(NativeCommand::Mute).await?;
        }

        let watchdog = spawn_stall_watchdog(
            Arc::clone(&self.session),
            self.state_tx.clone(),
            self.events.clone(),
            self.progress_tx.subscribe(),
            Duration::from_millis(self.config.stall_budget_ms),
        );
        self.timers.insert(TimerKey::StallWatchdog, watchdog);

        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        let Some(url) = self.launch_url.read().await.clone() else {
            return Err(Error::Internal("resume without a launch URL".into()));
        };
        self.backend
            .native(NativeCommand::Play {
                url: url.clone(),
                position_ms: None,
            })
            .await?;
        let mut guard = self.session.write().await;
        if let Some(s) = guard.as_mut() {
            apply_transition(s, &self.state_tx, &self.events, PlaybackState::Playing, false);
            self.events.emit(
                Some(s.id),
                PlayerEvent::Play {
                    url,
                    position_ms: s.current_time_ms,
                },
            );
        }
        Ok(())
    }

    /// Pause playback; leaves trick-play first
    #[instrument(skip(self))]
    pub async fn pause(&self) -> Result<()> {
        let Some((state, speed)) = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| (s.state, s.speed))
        else {
            debug!("pause ignored: no active session");
            return Ok(());
        };
        if state != PlaybackState::Playing {
            debug!(%state, "pause is a no-op outside playing");
            return Ok(());
        }
        if speed != 1.0 {
            self.playback_speed(1.0).await?;
        }
        self.backend.native(NativeCommand::Pause).await?;
        let mut guard = self.session.write().await;
        if let Some(s) = guard.as_mut() {
            apply_transition(s, &self.state_tx, &self.events, PlaybackState::Paused, false);
            self.events.emit(
                Some(s.id),
                PlayerEvent::Pause {
                    position_ms: s.current_time_ms,
                },
            );
        }
        Ok(())
    }

    /// Stop playback and reset the session
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<()> {
        let Some((id, position)) = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| (s.id, s.current_time_ms))
        else {
            debug!("stop ignored: no active session");
            return Ok(());
        };
        self.backend.native(NativeCommand::Stop).await?;
        self.events
            .emit(Some(id), PlayerEvent::Stop { position_ms: position });
        self.teardown(true).await;
        Ok(())
    }

    /// Seek to an absolute position or a percentage of the duration
    #[instrument(skip(self))]
    pub async fn seek(&self, target: SeekTarget) -> Result<()> {
        let (id, from, to, timeshifted) = {
            let mut guard = self.session.write().await;
            let Some(s) = guard.as_mut() else {
                debug!("seek ignored: no active session");
                return Ok(());
            };
            let to = target.resolve(s.duration_ms);
            let from = s.current_time_ms;
            s.current_time_ms = to;
            (s.id, from, to, s.is_timeshifted_live_stream)
        };

        if timeshifted {
            if let Some(drift) = self.drift.write().await.as_mut() {
                drift.note_seek(to - from);
            }
        }

        self.backend
            .native(NativeCommand::Seek { position_ms: to })
            .await?;
        self.events.emit(
            Some(id),
            PlayerEvent::Seek {
                from_ms: from,
                to_ms: to,
            },
        );
        self.start_seek_tracker(id);
        Ok(())
    }

    /// Skip forward by the given amount, or the configured seek step
    #[instrument(skip(self))]
    pub async fn forward(&self, skip: Option<SeekTarget>) -> Result<()> {
        self.skip_by(skip, 1).await
    }

    /// Skip backward by the given amount, or the configured seek step
    #[instrument(skip(self))]
    pub async fn backward(&self, skip: Option<SeekTarget>) -> Result<()> {
        self.skip_by(skip, -1).await
    }

    async fn skip_by(&self, skip: Option<SeekTarget>, direction: i64) -> Result<()> {
        let Some((current, duration)) = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| (s.current_time_ms, s.duration_ms))
        else {
            debug!("skip ignored: no active session");
            return Ok(());
        };
        let amount = match skip {
            None => self.config.seek_step_ms,
            Some(SeekTarget::Millis(ms)) => ms,
            Some(SeekTarget::Percent(pct)) => ((duration as f64) * pct / 100.0).round() as i64,
        };
        self.seek(SeekTarget::Millis(current + direction * amount))
            .await
    }

    /// Set the playback speed; 1.0 is normal playback
    #[instrument(skip(self))]
    pub async fn playback_speed(&self, speed: f64) -> Result<()> {
        let Some(current) = self.session.read().await.as_ref().map(|s| s.speed) else {
            debug!("playbackSpeed ignored: no active session");
            return Ok(());
        };
        if current == speed {
            return Ok(());
        }
        self.backend
            .native(NativeCommand::PlaybackSpeed { speed })
            .await?;
        let id = self.with_session(|s| {
            s.speed = speed;
            s.id
        })
        .await;
        self.events.emit(id, PlayerEvent::PlaybackSpeed { speed });
        Ok(())
    }

    /// Select an audio track by index
    #[instrument(skip(self))]
    pub async fn audio_track(&self, index: u32) -> Result<()> {
        self.backend
            .native(NativeCommand::AudioTrack { index })
            .await
    }

    /// Mute audio output
    #[instrument(skip(self))]
    pub async fn mute(&self) -> Result<()> {
        if *self.muted.read().await {
            return Ok(());
        }
        self.backend.native(NativeCommand::Mute).await?;
        *self.muted.write().await = true;
        let id = self.with_session(|s| {
            s.muted = true;
            s.id
        })
        .await;
        self.events.emit(id, PlayerEvent::Mute);
        Ok(())
    }

    /// Unmute audio output
    #[instrument(skip(self))]
    pub async fn unmute(&self) -> Result<()> {
        if !*self.muted.read().await {
            return Ok(());
        }
        self.backend.native(NativeCommand::Unmute).await?;
        *self.muted.write().await = false;
        let id = self.with_session(|s| {
            s.muted = false;
            s.id
        })
        .await;
        self.events.emit(id, PlayerEvent::Unmute);
        Ok(())
    }

    /// Show the video plane at the given geometry
    #[instrument(skip(self))]
    pub async fn show(&self, rect: VideoRect) -> Result<()> {
        self.backend.native(NativeCommand::Show { rect }).await?;
        let id = self.with_session(|s| {
            s.geometry = rect;
            s.id
        })
        .await;
        self.events.emit(id, PlayerEvent::Show { rect });
        Ok(())
    }

    /// Hide the video plane
    #[instrument(skip(self))]
    pub async fn hide(&self) -> Result<()> {
        self.backend.native(NativeCommand::Hide).await?;
        let id = self.current_session_id().await;
        self.events.emit(id, PlayerEvent::Hide);
        Ok(())
    }

    /// Show the video plane at the configured full player geometry
    #[instrument(skip(self))]
    pub async fn fullscreen(&self) -> Result<()> {
        self.show(self.config.geometry).await
    }

    /// Resize the video without moving it
    #[instrument(skip(self))]
    pub async fn set_video_dimensions(&self, width: u32, height: u32) -> Result<()> {
        self.backend
            .native(NativeCommand::SetVideoDimensions { width, height })
            .await?;
        self.with_session(|s| {
            s.geometry.width = width;
            s.geometry.height = height;
        })
        .await;
        Ok(())
    }

    // -------------------------------------------------------------------
    // Backend callbacks
    // -------------------------------------------------------------------

    /// Backend reported a new content duration (live edge for timeshift)
    pub async fn on_duration_change(&self, duration_ms: i64) {
        let Some((id, changed)) = self.with_session(|s| {
            let changed = s.duration_ms != duration_ms;
            s.duration_ms = duration_ms;
            (s.id, changed)
        })
        .await
        else {
            return;
        };
        // Duplicate reports from polling backends are absorbed
        if changed {
            self.events
                .emit(Some(id), PlayerEvent::DurationChange { duration_ms });
        }
    }

    /// Backend reported a raw playback position
    pub async fn on_time_update(&self, raw_ms: i64) {
        let (id, position, changed) = {
            let mut guard = self.session.write().await;
            let Some(s) = guard.as_mut() else { return };
            let position = if s.is_timeshifted_live_stream {
                let mut drift = self.drift.write().await;
                match drift.as_mut() {
                    Some(d) => {
                        d.observe(raw_ms);
                        d.corrected_time(s.duration_ms)
                    }
                    None => raw_ms,
                }
            } else {
                raw_ms
            };
            let changed = s.current_time_ms != position;
            s.current_time_ms = position;
            (s.id, position, changed)
        };

        // Only genuine raw progress re-arms the stall watchdog
        self.progress_tx.send_if_modified(|last| {
            let modified = *last != raw_ms;
            *last = raw_ms;
            modified
        });

        if changed {
            self.events
                .emit(Some(id), PlayerEvent::TimeUpdate { position_ms: position });
        }
    }

    /// Backend reported natural end of content
    pub async fn on_end(&self) {
        let Some((id, looping, position)) = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| (s.id, s.looping, s.current_time_ms))
        else {
            return;
        };
        self.events
            .emit(Some(id), PlayerEvent::End { position_ms: position });
        if looping {
            info!(session_id = %id, "Looping session; restarting from the beginning");
            if let Err(err) = self
                .backend
                .native(NativeCommand::Seek { position_ms: 0 })
                .await
            {
                warn!(%err, "Loop restart seek failed");
            }
            self.with_session(|s| s.current_time_ms = 0).await;
        } else {
            self.teardown(false).await;
        }
    }

    /// Backend reported a decoder/connection/format failure.
    ///
    /// Surfaced as an `error` event, non-fatal to the engine itself; the
    /// state only changes if the backend explicitly calls `state()`.
    pub async fn on_error(&self, code: i32, message: &str, details: Option<String>) {
        let id = self.current_session_id().await;
        warn!(code, message, ?details, "Native backend error");
        self.events.emit(
            id,
            PlayerEvent::Error {
                code,
                message: message.to_string(),
                details,
                fatal: false,
            },
        );
    }

    /// Backend explicitly reported its state; always re-emits `statechange`
    pub async fn on_state(&self, state: PlaybackState) {
        let mut guard = self.session.write().await;
        let Some(s) = guard.as_mut() else {
            debug!(%state, "state report ignored: no active session");
            return;
        };
        apply_transition(s, &self.state_tx, &self.events, state, true);
    }

    // -------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------

    fn start_seek_tracker(&self, id: SessionId) {
        // Restarting balances the cancelled pair before opening the next one
        if self.timers.cancel(TimerKey::SeekTracker) {
            self.events.emit(Some(id), PlayerEvent::SeekEnd);
        }
        self.events.emit(Some(id), PlayerEvent::SeekStart);
        let handle = spawn_seek_tracker(
            self.state_tx.subscribe(),
            self.events.clone(),
            id,
            Duration::from_millis(self.config.seek_tracker_budget_ms),
            Duration::from_millis(self.config.seek_tracker_tick_ms),
        );
        self.timers.insert(TimerKey::SeekTracker, handle);
    }

    /// Tear the session down; timers must never fire against a stale session
    async fn teardown(&self, deinit: bool) {
        if self.timers.cancel(TimerKey::SeekTracker) {
            let id = self.current_session_id().await;
            self.events.emit(id, PlayerEvent::SeekEnd);
        }
        self.timers.cancel_all();
        *self.drift.write().await = None;
        *self.launch_url.write().await = None;

        if let Some(mut session) = self.session.write().await.take() {
            apply_transition(
                &mut session,
                &self.state_tx,
                &self.events,
                PlaybackState::Idle,
                false,
            );
            self.events.emit(Some(session.id), PlayerEvent::Reset);
        }

        if deinit && *self.backend_ready.read().await {
            if let Err(err) = self.backend.deinit_native().await {
                warn!(%err, "deinit_native failed");
            }
            *self.backend_ready.write().await = false;
        }
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.timers.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DrmCapability, RecordingBackend};
    use tokio::sync::broadcast::error::TryRecvError;
    use tokio_test::assert_ok;
    use url::Url;

    fn engine() -> (PlaybackEngine, RecordingBackend) {
        let backend = RecordingBackend::new(DrmCapability::None);
        let engine = PlaybackEngine::new(PlayerConfig::default(), Box::new(backend.clone()));
        (engine, backend)
    }

    fn drain(rx: &mut broadcast::Receiver<PlayerEventRecord>) -> Vec<PlayerEvent> {
        let mut events = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(record) => events.push(record.event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                Err(TryRecvError::Lagged(_)) => {}
            }
        }
        events
    }

    fn content_url() -> Url {
        Url::parse("http://x/a.mp4").unwrap()
    }

    #[tokio::test]
    async fn test_play_without_url_fails_synchronously() {
        let (engine, backend) = engine();
        let err = engine.play(PlayOptions::default()).await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
        // Nothing reached the backend
        assert!(backend.commands().is_empty());
        assert_eq!(engine.state(), PlaybackState::Idle);
    }

    #[tokio::test]
    async fn test_play_enters_buffering_and_drives_backend() {
        let (engine, backend) = engine();
        assert_ok!(engine.play(PlayOptions::url(content_url())).await);

        assert_eq!(engine.state(), PlaybackState::Buffering);
        assert!(backend.is_initialized());
        assert_eq!(
            backend.last_command(),
            Some(NativeCommand::Play {
                url: "http://x/a.mp4".into(),
                position_ms: None,
            })
        );
    }

    #[tokio::test]
    async fn test_state_is_visible_without_any_subscriber() {
        // No subscribe_state() call anywhere; the watch channel must still
        // retain every transition for state() reads.
        let (engine, _backend) = engine();
        engine.play(PlayOptions::url(content_url())).await.unwrap();
        assert_eq!(engine.state(), PlaybackState::Buffering);

        engine.on_state(PlaybackState::Playing).await;
        assert_eq!(engine.state(), PlaybackState::Playing);
        assert_eq!(engine.session().await.unwrap().state, engine.state());
    }

    #[tokio::test]
    async fn test_pause_outside_playing_is_a_no_op() {
        let (engine, backend) = engine();
        engine.play(PlayOptions::url(content_url())).await.unwrap();
        let mut rx = engine.subscribe();

        // Still buffering; pause must not transition or reach the backend
        engine.pause().await.unwrap();
        assert_eq!(engine.state(), PlaybackState::Buffering);
        assert!(!backend.commands().contains(&NativeCommand::Pause));
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_explicit_backend_state_always_re_emits() {
        let (engine, _backend) = engine();
        engine.play(PlayOptions::url(content_url())).await.unwrap();
        let mut rx = engine.subscribe();

        engine.on_state(PlaybackState::Buffering).await;
        engine.on_state(PlaybackState::Buffering).await;

        let statechanges = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, PlayerEvent::StateChange { .. }))
            .count();
        assert_eq!(statechanges, 2);
        assert_eq!(engine.state(), PlaybackState::Buffering);
    }

    #[tokio::test]
    async fn test_previous_state_survives_buffering_bursts() {
        let (engine, _backend) = engine();
        engine.play(PlayOptions::url(content_url())).await.unwrap();

        engine.on_state(PlaybackState::Playing).await;
        engine.on_state(PlaybackState::Buffering).await;
        // A repeated buffering burst must not overwrite the remembered state
        engine.on_state(PlaybackState::Buffering).await;

        let session = engine.session().await.unwrap();
        assert_eq!(session.state, PlaybackState::Buffering);
        assert_eq!(session.previous_state, PlaybackState::Playing);
    }

    #[tokio::test]
    async fn test_trick_play_pause_couples_speed_reset() {
        let (engine, backend) = engine();
        engine.play(PlayOptions::url(content_url())).await.unwrap();
        engine.on_state(PlaybackState::Playing).await;

        engine.playback_speed(4.0).await.unwrap();
        engine.pause().await.unwrap();

        let commands = backend.commands();
        let speed_reset = commands
            .iter()
            .position(|c| matches!(c, NativeCommand::PlaybackSpeed { speed } if *speed == 1.0));
        let pause = commands.iter().position(|c| *c == NativeCommand::Pause);
        assert!(speed_reset.unwrap() < pause.unwrap());
        assert_eq!(engine.session().await.unwrap().speed, 1.0);
        assert_eq!(engine.state(), PlaybackState::Paused);
    }

    #[tokio::test]
    async fn test_mute_is_idempotent() {
        let (engine, backend) = engine();
        engine.play(PlayOptions::url(content_url())).await.unwrap();

        engine.mute().await.unwrap();
        engine.mute().await.unwrap();
        let mutes = backend
            .commands()
            .iter()
            .filter(|c| **c == NativeCommand::Mute)
            .count();
        assert_eq!(mutes, 1);

        engine.unmute().await.unwrap();
        assert!(backend.commands().contains(&NativeCommand::Unmute));
    }

    #[tokio::test]
    async fn test_stop_resets_to_idle_and_deinits() {
        let (engine, backend) = engine();
        engine.play(PlayOptions::url(content_url())).await.unwrap();
        let mut rx = engine.subscribe();

        engine.stop().await.unwrap();
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert!(engine.session().await.is_none());
        assert!(!backend.is_initialized());

        let events = drain(&mut rx);
        assert!(events.contains(&PlayerEvent::Stop { position_ms: 0 }));
        assert!(events.contains(&PlayerEvent::Reset));

        // Engine is reusable after stop
        engine.play(PlayOptions::url(content_url())).await.unwrap();
        assert_eq!(engine.state(), PlaybackState::Buffering);
    }

    #[tokio::test]
    async fn test_bare_play_resumes_a_paused_session() {
        let (engine, backend) = engine();
        engine.play(PlayOptions::url(content_url())).await.unwrap();
        engine.on_state(PlaybackState::Playing).await;
        engine.pause().await.unwrap();

        engine.play(PlayOptions::default()).await.unwrap();
        assert_eq!(engine.state(), PlaybackState::Playing);
        // Resume reuses the session instead of restarting it
        let plays = backend
            .commands()
            .iter()
            .filter(|c| matches!(c, NativeCommand::Play { .. }))
            .count();
        assert_eq!(plays, 2);
    }

    #[tokio::test]
    async fn test_backend_error_leaves_state_untouched() {
        let (engine, _backend) = engine();
        engine.play(PlayOptions::url(content_url())).await.unwrap();
        let mut rx = engine.subscribe();

        engine.on_error(2, "connection", None).await;

        let events = drain(&mut rx);
        assert!(matches!(
            events.as_slice(),
            [PlayerEvent::Error { code: 2, fatal: false, .. }]
        ));
        assert_eq!(engine.state(), PlaybackState::Buffering);
    }

    #[tokio::test]
    async fn test_duplicate_duration_reports_are_absorbed() {
        let (engine, _backend) = engine();
        engine.play(PlayOptions::url(content_url())).await.unwrap();
        let mut rx = engine.subscribe();

        engine.on_duration_change(120_000).await;
        engine.on_duration_change(120_000).await;

        let durations = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, PlayerEvent::DurationChange { .. }))
            .count();
        assert_eq!(durations, 1);
    }
}
