//! Position reconciliation for timeshifted live streams
//!
//! Raw backend-reported time on a timeshifted stream can reference an
//! internal clock that resets, and a requested seek may only be satisfied
//! approximately. The corrector folds confirmed seek jumps into a single
//! accumulated offset anchored at the live edge, so the reported position
//! stays monotone between seeks and never runs past the edge.

use tracing::debug;

/// Drift corrector; lifetime is one timeshifted session
#[derive(Debug, Clone)]
pub struct DriftCorrector {
    /// Accumulated offset behind the live edge; never positive
    accumulated_offset_ms: i64,
    /// Delta of a seek awaiting confirmation
    pending_seek_delta_ms: Option<i64>,
    /// Raw backend time from the previous observation
    last_raw_time_ms: Option<i64>,
    /// Band within which an observed jump confirms the pending seek
    confirmation_band_ms: i64,
}

impl DriftCorrector {
    pub fn new(confirmation_band_ms: i64) -> Self {
        Self {
            accumulated_offset_ms: 0,
            pending_seek_delta_ms: None,
            last_raw_time_ms: None,
            confirmation_band_ms,
        }
    }

    /// Record a requested seek delta relative to the corrected position
    pub fn note_seek(&mut self, requested_delta_ms: i64) {
        self.pending_seek_delta_ms = Some(requested_delta_ms);
    }

    /// Feed a raw time observation; returns true when it confirmed a seek.
    ///
    /// A pending seek is confirmed once the observed raw-time jump lands
    /// within the confirmation band of the requested delta; the jump is then
    /// folded into the accumulated offset, clamped so the live edge is never
    /// exceeded. Ordinary playback progression never confirms a seek because
    /// its deltas sit far from any requested skip.
    pub fn observe(&mut self, raw_time_ms: i64) -> bool {
        let Some(last) = self.last_raw_time_ms.replace(raw_time_ms) else {
            return false;
        };
        let real_delta = raw_time_ms - last;

        let Some(requested) = self.pending_seek_delta_ms else {
            return false;
        };
        if (real_delta - requested).abs() > self.confirmation_band_ms {
            return false;
        }

        self.accumulated_offset_ms = (self.accumulated_offset_ms + real_delta).min(0);
        self.pending_seek_delta_ms = None;
        debug!(
            real_delta_ms = real_delta,
            requested_delta_ms = requested,
            accumulated_offset_ms = self.accumulated_offset_ms,
            "Timeshift seek confirmed"
        );
        true
    }

    /// Corrected position; `duration` is the continuously advancing live edge
    pub fn corrected_time(&self, duration_ms: i64) -> i64 {
        (duration_ms + self.accumulated_offset_ms).clamp(0, duration_ms.max(0))
    }

    pub fn accumulated_offset_ms(&self) -> i64 {
        self.accumulated_offset_ms
    }

    pub fn has_pending_seek(&self) -> bool {
        self.pending_seek_delta_ms.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backward_seek_confirmation() {
        // Live edge at 500s; seek 20s back, backend lands 21s back
        let mut drift = DriftCorrector::new(1_500);
        drift.observe(100_000);
        drift.note_seek(-20_000);

        assert!(drift.observe(79_000));
        assert_eq!(drift.accumulated_offset_ms(), -21_000);
        assert_eq!(drift.corrected_time(500_000), 479_000);
        assert!(!drift.has_pending_seek());
    }

    #[test]
    fn test_normal_progression_does_not_confirm() {
        let mut drift = DriftCorrector::new(1_500);
        drift.observe(100_000);
        drift.note_seek(-20_000);

        // Regular 500ms ticks are nowhere near the requested delta
        assert!(!drift.observe(100_500));
        assert!(!drift.observe(101_000));
        assert_eq!(drift.accumulated_offset_ms(), 0);
        assert!(drift.has_pending_seek());

        // The jump finally shows up and confirms
        assert!(drift.observe(81_400));
        assert!(!drift.has_pending_seek());
    }

    #[test]
    fn test_offset_never_positive() {
        let mut drift = DriftCorrector::new(1_500);
        drift.observe(50_000);
        drift.note_seek(30_000);

        // A forward jump past the edge clamps the offset to zero
        assert!(drift.observe(80_500));
        assert_eq!(drift.accumulated_offset_ms(), 0);
        assert_eq!(drift.corrected_time(500_000), 500_000);
    }

    #[test]
    fn test_corrected_time_never_exceeds_live_edge() {
        let drift = DriftCorrector::new(1_500);
        assert_eq!(drift.corrected_time(500_000), 500_000);
        assert_eq!(drift.corrected_time(0), 0);
    }

    #[test]
    fn test_corrected_time_monotone_between_seeks() {
        let mut drift = DriftCorrector::new(1_500);
        drift.observe(10_000);
        drift.note_seek(-60_000);
        assert!(drift.observe(-50_500));

        // The live edge keeps advancing; corrected time follows it
        let mut previous = drift.corrected_time(300_000);
        for edge in [301_000, 302_000, 305_000, 310_000] {
            let corrected = drift.corrected_time(edge);
            assert!(corrected >= previous);
            assert!(corrected <= edge);
            previous = corrected;
        }
    }

    #[test]
    fn test_successive_seeks_accumulate() {
        let mut drift = DriftCorrector::new(1_500);
        drift.observe(100_000);

        drift.note_seek(-20_000);
        assert!(drift.observe(80_000));
        drift.note_seek(-10_000);
        assert!(drift.observe(70_500));

        assert_eq!(drift.accumulated_offset_ms(), -29_500);
        assert_eq!(drift.corrected_time(500_000), 470_500);
    }

    #[test]
    fn test_raw_clock_reset_without_pending_seek_is_ignored() {
        let mut drift = DriftCorrector::new(1_500);
        drift.observe(90_000);
        // Internal clock reset produces a wild delta; no pending seek, no fold
        assert!(!drift.observe(500));
        assert_eq!(drift.accumulated_offset_ms(), 0);
    }
}
