//! Seek tracker - bounded-time watchdog confirming a seek resumes playback
//!
//! Best effort by design: when the budget runs out without the state ever
//! reaching playing, the tracker still closes the pair with `seek-end`
//! rather than reporting an error.

use crate::events::{EventBus, PlayerEvent};
use crate::types::{PlaybackState, SessionId};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::debug;

/// Start the countdown for one seek. Emits exactly one `seek-end`, either
/// when the state reaches playing or when the budget is exhausted.
pub(crate) fn spawn_seek_tracker(
    state_rx: watch::Receiver<PlaybackState>,
    events: EventBus,
    session_id: SessionId,
    budget: Duration,
    tick: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let ticks = (budget.as_millis() / tick.as_millis().max(1)).max(1);
        let mut confirmed = false;
        for _ in 0..ticks {
            sleep(tick).await;
            if *state_rx.borrow() == PlaybackState::Playing {
                confirmed = true;
                break;
            }
        }
        debug!(%session_id, confirmed, "Seek tracker finished");
        events.emit(Some(session_id), PlayerEvent::SeekEnd);
    })
}
