//! Hands-free stop.
//!
//! Two independent triggers end a set: a stall (no meaningful velocity for the
//! stall window) and a range edge (handles released in the bottom of the range
//! for the shorter edge window). Neither is evaluated until the rep counter has
//! a meaningful range of motion.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::rep_counter::RepCounter;
use crate::types::{AutoStopConfig, TelemetrySample};

/// Which condition ended the set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopTrigger {
    /// Velocity stayed low for the stall window
    Stall,
    /// Handles released at the bottom of the range for the edge window
    RangeEdge,
}

impl fmt::Display for StopTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stall => write!(f, "stall"),
            Self::RangeEdge => write!(f, "range edge"),
        }
    }
}

/// Progress of the leading stop trigger, for a countdown ring
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AutoStopStatus {
    /// Trigger closest to firing, if any timer is running
    pub leading: Option<StopTrigger>,
    /// Fraction of its window elapsed (0.0 - 1.0)
    pub progress: f32,
}

/// Stall and range-edge detector
#[derive(Debug, Default)]
pub struct AutoStopController {
    config: AutoStopConfig,
    stall_since: Option<u64>,
    edge_since: Option<u64>,
    last_seen_ms: Option<u64>,
    fired: Option<StopTrigger>,
}

impl AutoStopController {
    /// Create a detector with default windows
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detector with custom windows
    #[must_use]
    pub fn with_config(config: AutoStopConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Clear timers and re-arm after a trigger
    pub fn reset(&mut self) {
        self.stall_since = None;
        self.edge_since = None;
        self.last_seen_ms = None;
        self.fired = None;
    }

    /// Trigger that already fired, if any
    #[must_use]
    pub const fn fired(&self) -> Option<StopTrigger> {
        self.fired
    }

    /// Watchdog period configured for [`AutoStopController::poll`]
    #[must_use]
    pub const fn watchdog_interval_ms(&self) -> u64 {
        self.config.watchdog_interval_ms
    }

    /// Feed a telemetry sample
    ///
    /// Returns the trigger the first time one fires; afterwards `None` until
    /// [`AutoStopController::reset`].
    pub fn process(
        &mut self,
        sample: &TelemetrySample,
        counter: &RepCounter,
    ) -> Option<StopTrigger> {
        if self.fired.is_some() {
            return None;
        }

        let now = sample.timestamp_ms;
        self.last_seen_ms = Some(now);

        let threshold = counter.config().meaningful_range_mm;
        if !counter.has_meaningful_range(threshold) {
            self.stall_since = None;
            self.edge_since = None;
            return None;
        }

        let velocity = sample.max_abs_velocity();
        if velocity < self.config.stall_velocity_low_mm_s {
            self.stall_since.get_or_insert(now);
        } else if velocity > self.config.stall_velocity_high_mm_s {
            self.stall_since = None;
        }

        let in_zone = counter.is_in_danger_zone(sample.position_a, sample.position_b, threshold);
        if in_zone && self.is_released(sample, counter) {
            self.edge_since.get_or_insert(now);
        } else {
            self.edge_since = None;
        }

        self.poll(now)
    }

    /// Evaluate running timers without a new sample
    ///
    /// Called from a watchdog so windows still elapse when telemetry pauses.
    pub fn poll(&mut self, now_ms: u64) -> Option<StopTrigger> {
        if self.fired.is_some() {
            return None;
        }

        if elapsed(self.edge_since, now_ms) >= Some(self.config.edge_window_ms) {
            return self.fire(StopTrigger::RangeEdge, now_ms);
        }
        if elapsed(self.stall_since, now_ms) >= Some(self.config.stall_window_ms) {
            return self.fire(StopTrigger::Stall, now_ms);
        }
        None
    }

    /// Progress of the leading trigger as of the last sample
    #[must_use]
    pub fn status(&self) -> AutoStopStatus {
        let Some(now) = self.last_seen_ms else {
            return AutoStopStatus::default();
        };

        let stall = ratio(elapsed(self.stall_since, now), self.config.stall_window_ms);
        let edge = ratio(elapsed(self.edge_since, now), self.config.edge_window_ms);

        match (stall, edge) {
            (Some(stall), Some(edge)) if edge >= stall => AutoStopStatus {
                leading: Some(StopTrigger::RangeEdge),
                progress: edge,
            },
            (Some(stall), _) => AutoStopStatus {
                leading: Some(StopTrigger::Stall),
                progress: stall,
            },
            (None, Some(edge)) => AutoStopStatus {
                leading: Some(StopTrigger::RangeEdge),
                progress: edge,
            },
            (None, None) => AutoStopStatus::default(),
        }
    }

    // Both cables must read as put down: near the bottom of their own range or
    // below the absolute release position.
    fn is_released(&self, sample: &TelemetrySample, counter: &RepCounter) -> bool {
        let ranges = counter.rep_ranges();
        let released = |position: f32, min: Option<f32>| {
            position < self.config.release_position_mm
                || min.is_some_and(|min| position <= min + self.config.release_tolerance_mm)
        };
        released(sample.position_a, ranges.a.min_pos)
            && released(sample.position_b, ranges.b.min_pos)
    }

    fn fire(&mut self, trigger: StopTrigger, now_ms: u64) -> Option<StopTrigger> {
        info!(%trigger, at_ms = now_ms, "Auto-stop triggered");
        self.fired = Some(trigger);
        self.stall_since = None;
        self.edge_since = None;
        Some(trigger)
    }
}

fn elapsed(since: Option<u64>, now_ms: u64) -> Option<u64> {
    since.map(|since| now_ms.saturating_sub(since))
}

#[allow(clippy::cast_precision_loss)]
fn ratio(elapsed: Option<u64>, window_ms: u64) -> Option<f32> {
    let elapsed = elapsed?;
    if window_ms == 0 {
        return Some(1.0);
    }
    Some((elapsed as f32 / window_ms as f32).min(1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StatusFlags;

    fn sample(timestamp_ms: u64, position: f32, velocity: f32) -> TelemetrySample {
        TelemetrySample {
            timestamp_ms,
            ticks: 0,
            position_a: position,
            position_b: 0.0,
            load_a: 0.0,
            load_b: 0.0,
            velocity_a: velocity,
            velocity_b: 0.0,
            status: StatusFlags::default(),
        }
    }

    fn calibrated_counter() -> RepCounter {
        let mut counter = RepCounter::new();
        counter.update_position_ranges_continuously(5.0, 0.0);
        counter.update_position_ranges_continuously(600.0, 0.0);
        counter
    }

    #[test]
    fn test_no_trigger_without_meaningful_range() {
        let counter = RepCounter::new();
        let mut stop = AutoStopController::new();

        for t in (0..20_000).step_by(100) {
            assert_eq!(stop.process(&sample(t, 3.0, 0.0), &counter), None);
        }
        assert_eq!(stop.poll(30_000), None);
    }

    #[test]
    fn test_stall_fires_after_window() {
        let counter = calibrated_counter();
        let mut stop = AutoStopController::new();

        assert_eq!(stop.process(&sample(0, 300.0, 1.0), &counter), None);
        assert_eq!(stop.process(&sample(4_900, 300.0, 1.0), &counter), None);
        assert_eq!(
            stop.process(&sample(5_000, 300.0, 1.0), &counter),
            Some(StopTrigger::Stall)
        );
    }

    #[test]
    fn test_stall_hysteresis() {
        let counter = calibrated_counter();
        let mut stop = AutoStopController::new();

        stop.process(&sample(0, 300.0, 1.0), &counter);
        // Inside the band: timer keeps running
        stop.process(&sample(3_000, 300.0, 6.0), &counter);
        assert_eq!(
            stop.process(&sample(5_000, 300.0, 1.0), &counter),
            Some(StopTrigger::Stall)
        );

        let mut stop = AutoStopController::new();
        stop.process(&sample(0, 300.0, 1.0), &counter);
        // Above the band: timer clears
        stop.process(&sample(3_000, 300.0, 40.0), &counter);
        assert_eq!(stop.process(&sample(5_000, 300.0, 1.0), &counter), None);
        assert_eq!(
            stop.process(&sample(10_000, 300.0, 1.0), &counter),
            Some(StopTrigger::Stall)
        );
    }

    #[test]
    fn test_range_edge_fires_before_stall() {
        let counter = calibrated_counter();
        let mut stop = AutoStopController::new();

        assert_eq!(stop.process(&sample(0, 8.0, 0.0), &counter), None);
        assert_eq!(stop.process(&sample(2_400, 8.0, 0.0), &counter), None);
        assert_eq!(
            stop.process(&sample(2_500, 8.0, 0.0), &counter),
            Some(StopTrigger::RangeEdge)
        );
    }

    #[test]
    fn test_range_edge_needs_release() {
        let counter = calibrated_counter();
        let mut stop = AutoStopController::new();

        // In the danger zone (boundary 34.75) but not near the ROM minimum
        for t in (0..=3_000).step_by(100) {
            assert_eq!(stop.process(&sample(t, 30.0, 20.0), &counter), None);
        }
    }

    #[test]
    fn test_fires_once_until_reset() {
        let counter = calibrated_counter();
        let mut stop = AutoStopController::new();

        stop.process(&sample(0, 8.0, 0.0), &counter);
        assert_eq!(
            stop.process(&sample(2_500, 8.0, 0.0), &counter),
            Some(StopTrigger::RangeEdge)
        );
        assert_eq!(stop.process(&sample(6_000, 8.0, 0.0), &counter), None);
        assert_eq!(stop.poll(10_000), None);
        assert_eq!(stop.fired(), Some(StopTrigger::RangeEdge));

        stop.reset();
        assert_eq!(stop.fired(), None);
        stop.process(&sample(11_000, 8.0, 0.0), &counter);
        assert_eq!(
            stop.process(&sample(13_500, 8.0, 0.0), &counter),
            Some(StopTrigger::RangeEdge)
        );
    }

    #[test]
    fn test_watchdog_poll_fires_without_samples() {
        let counter = calibrated_counter();
        let mut stop = AutoStopController::new();

        stop.process(&sample(1_000, 300.0, 0.0), &counter);
        assert_eq!(stop.poll(5_900), None);
        assert_eq!(stop.poll(6_000), Some(StopTrigger::Stall));
    }

    #[test]
    fn test_status_reports_leading_trigger() {
        let counter = calibrated_counter();
        let mut stop = AutoStopController::new();
        assert_eq!(stop.status(), AutoStopStatus::default());

        stop.process(&sample(0, 300.0, 0.0), &counter);
        stop.process(&sample(2_500, 300.0, 0.0), &counter);
        let status = stop.status();
        assert_eq!(status.leading, Some(StopTrigger::Stall));
        assert!((status.progress - 0.5).abs() < 1e-4);

        let mut stop = AutoStopController::new();
        stop.process(&sample(0, 8.0, 0.0), &counter);
        stop.process(&sample(1_250, 8.0, 0.0), &counter);
        let status = stop.status();
        assert_eq!(status.leading, Some(StopTrigger::RangeEdge));
        assert!((status.progress - 0.5).abs() < 1e-4);
    }
}
