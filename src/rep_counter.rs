//! Rep counting from machine counters.
//!
//! The trainer reports reps through two directional counters: `up` increments at
//! the top of a stroke, `down` at the bottom. Both are 16-bit and wrap. Newer
//! firmware also reports explicit warm-up and working counts, which this module
//! trusts over its own classification.
//!
//! Range of motion is calibrated only from positions captured at a confirmed
//! counter increment, except for [`RepCounter::update_position_ranges_continuously`],
//! which exists for the pre-set arming window. ROM survives
//! [`RepCounter::reset_counts_only`] so hands-free stop keeps working across sets.

use std::collections::VecDeque;

use tracing::{debug, info, warn};

use crate::types::{
    CableRange, RepCount, RepCounterConfig, RepEvent, RepNotification, RepPhase, RepRanges,
    WorkoutParameters,
};

/// Increment between two readings of a 16-bit wrapping counter
///
/// `0xFFFF → 0x0000` is an increment of one; equal readings are zero.
#[must_use]
pub const fn counter_delta(last: u16, current: u16) -> u16 {
    current.wrapping_sub(last)
}

#[derive(Debug, Default)]
struct CableTracker {
    range: CableRange,
    tops: VecDeque<f32>,
    bottoms: VecDeque<f32>,
}

impl CableTracker {
    fn record_top(&mut self, position: f32, window: usize) {
        push_bounded(&mut self.tops, position, window);
        self.range.max_pos = average(&self.tops);
        self.range.top_band = band(&self.tops);
        self.range.last_top = Some(position);
    }

    fn record_bottom(&mut self, position: f32, window: usize) {
        push_bounded(&mut self.bottoms, position, window);
        self.range.min_pos = average(&self.bottoms);
        self.range.bottom_band = band(&self.bottoms);
        self.range.last_bottom = Some(position);
    }

    fn track(&mut self, position: f32) {
        self.range.min_pos = Some(self.range.min_pos.map_or(position, |min| min.min(position)));
        self.range.max_pos = Some(self.range.max_pos.map_or(position, |max| max.max(position)));
    }

    fn is_meaningful(&self, threshold: f32) -> bool {
        self.range.span().is_some_and(|span| span > threshold)
    }

    fn in_danger_zone(&self, position: f32, threshold: f32, fraction: f32) -> bool {
        match (self.range.min_pos, self.range.span()) {
            (Some(min), Some(span)) if span > threshold => position <= min + span * fraction,
            _ => false,
        }
    }
}

fn push_bounded(window: &mut VecDeque<f32>, value: f32, capacity: usize) {
    window.push_back(value);
    while window.len() > capacity.max(1) {
        window.pop_front();
    }
}

fn average(window: &VecDeque<f32>) -> Option<f32> {
    if window.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let len = window.len() as f32;
    Some(window.iter().sum::<f32>() / len)
}

fn band(window: &VecDeque<f32>) -> Option<(f32, f32)> {
    let min = window.iter().copied().reduce(f32::min)?;
    let max = window.iter().copied().reduce(f32::max)?;
    Some((min, max))
}

#[derive(Debug, Default)]
struct PhaseTracker {
    window: VecDeque<f32>,
    phase: RepPhase,
    start: f32,
    peak: f32,
    progress: f32,
}

/// Stateful rep counting engine for one set
///
/// Drive it from a single consumer in notification order. Every call to
/// [`RepCounter::process`] returns the lifecycle events it produced.
#[derive(Debug, Default)]
pub struct RepCounter {
    config: RepCounterConfig,

    warmup_target: u32,
    working_target: u32,
    is_just_lift: bool,
    stop_at_top: bool,
    is_amrap: bool,

    warmup_reps: u32,
    working_reps: u32,
    should_stop: bool,
    has_pending_rep: bool,

    last_up: Option<u16>,
    last_down: Option<u16>,

    cable_a: CableTracker,
    cable_b: CableTracker,
    phase: PhaseTracker,
}

impl RepCounter {
    /// Create a rep counter with default tuning
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a rep counter with custom tuning
    #[must_use]
    pub fn with_config(config: RepCounterConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Set targets and completion policy for the next set
    pub fn configure(
        &mut self,
        warmup_target: u32,
        working_target: u32,
        is_just_lift: bool,
        stop_at_top: bool,
        is_amrap: bool,
    ) {
        debug!(
            warmup_target,
            working_target, is_just_lift, stop_at_top, is_amrap, "Rep counter configured"
        );
        self.warmup_target = warmup_target;
        self.working_target = working_target;
        self.is_just_lift = is_just_lift;
        self.stop_at_top = stop_at_top;
        self.is_amrap = is_amrap;
    }

    /// Configure from a workout parameter snapshot
    pub fn configure_from(&mut self, params: &WorkoutParameters) {
        self.configure(
            u32::from(params.warmup_reps),
            u32::from(params.reps),
            params.is_just_lift,
            params.stop_at_top,
            params.is_amrap,
        );
    }

    /// Clear counts, counter baselines, phase and range of motion
    pub fn reset(&mut self) {
        self.reset_counts_only();
        self.cable_a = CableTracker::default();
        self.cable_b = CableTracker::default();
    }

    /// Clear counts, counter baselines and phase; keep range of motion
    pub fn reset_counts_only(&mut self) {
        self.warmup_reps = 0;
        self.working_reps = 0;
        self.should_stop = false;
        self.has_pending_rep = false;
        self.last_up = None;
        self.last_down = None;
        self.phase = PhaseTracker::default();
    }

    /// Process one rep notification
    ///
    /// `position_a`/`position_b` are the latest cable positions and are recorded
    /// as top or bottom samples when the matching counter increments.
    pub fn process(
        &mut self,
        notification: &RepNotification,
        position_a: f32,
        position_b: f32,
    ) -> Vec<RepEvent> {
        let mut events = Vec::new();

        let up_delta = observe(&mut self.last_up, notification.up, "up");
        let down_delta = observe(&mut self.last_down, notification.down, "down");

        if up_delta > 0 {
            self.record_top(position_a, position_b);
        }
        if down_delta > 0 {
            self.record_bottom(position_a, position_b);
        }

        match notification.machine {
            None => {
                if up_delta > 0 {
                    self.count_legacy_rep(&mut events);
                }
            }
            Some(machine) => {
                if up_delta > 0 {
                    self.on_top_reached(&mut events);
                }
                self.sync_warmup(u32::from(machine.warmup_count), &mut events);
                self.sync_working(u32::from(machine.working_count), &mut events);
            }
        }

        events
    }

    /// Feed a cable position sample for phase tracking
    ///
    /// Phase tracking stays idle until warm-up is complete. A single sample never
    /// establishes a direction.
    pub fn observe_position(&mut self, position_a: f32, position_b: f32) {
        if !self.is_warmup_complete() {
            if !self.phase.window.is_empty() {
                self.phase = PhaseTracker::default();
            }
            return;
        }

        let position = position_a.max(position_b);
        push_bounded(&mut self.phase.window, position, self.config.phase_window);

        let (Some(&first), Some(&last)) = (self.phase.window.front(), self.phase.window.back())
        else {
            return;
        };
        if self.phase.window.len() < 2 {
            return;
        }

        let displacement = last - first;
        let direction = if displacement > self.config.min_phase_movement_mm {
            RepPhase::Concentric
        } else if displacement < -self.config.min_phase_movement_mm {
            RepPhase::Eccentric
        } else {
            self.phase.phase
        };

        if direction != self.phase.phase {
            self.phase.phase = direction;
            self.phase.start = match direction {
                RepPhase::Concentric => self.phase.window.iter().copied().fold(last, f32::min),
                RepPhase::Eccentric => self.phase.window.iter().copied().fold(last, f32::max),
                RepPhase::Idle => last,
            };
            self.phase.peak = self.phase.start;
        }
        if direction == RepPhase::Concentric {
            self.phase.peak = self.phase.peak.max(position);
        }

        let active = self.active_range();
        self.phase.progress = match direction {
            RepPhase::Idle => 0.0,
            RepPhase::Concentric => {
                let target = active.max_pos.unwrap_or(self.phase.peak);
                fraction(position - self.phase.start, target - self.phase.start)
            }
            RepPhase::Eccentric => {
                let floor = active.min_pos.unwrap_or(0.0);
                fraction(self.phase.start - position, self.phase.start - floor)
            }
        };
    }

    /// Track range of motion from every sample, with no rep semantics
    ///
    /// Used while waiting for the handles to be grabbed, before any counter has
    /// incremented.
    pub fn update_position_ranges_continuously(&mut self, position_a: f32, position_b: f32) {
        self.cable_a.track(position_a);
        self.cable_b.track(position_b);
    }

    /// Current rep count snapshot
    #[must_use]
    pub fn rep_count(&self) -> RepCount {
        let pending_progress =
            if self.has_pending_rep && self.phase.phase == RepPhase::Eccentric {
                self.phase.progress
            } else {
                0.0
            };

        RepCount {
            warmup_reps: self.warmup_reps,
            working_reps: self.working_reps,
            total_reps: self.working_reps,
            is_warmup_complete: self.is_warmup_complete(),
            has_pending_rep: self.has_pending_rep,
            pending_progress,
            active_phase: self.phase.phase,
            phase_progress: self.phase.progress,
        }
    }

    /// Current range of motion for both cables
    #[must_use]
    pub const fn rep_ranges(&self) -> RepRanges {
        RepRanges {
            a: self.cable_a.range,
            b: self.cable_b.range,
        }
    }

    /// Whether the working target has been reached
    #[must_use]
    pub const fn should_stop_workout(&self) -> bool {
        self.should_stop
    }

    /// Whether warm-up is done
    #[must_use]
    pub const fn is_warmup_complete(&self) -> bool {
        self.warmup_reps >= self.warmup_target
    }

    /// Whether either cable has travelled more than `threshold` mm
    #[must_use]
    pub fn has_meaningful_range(&self, threshold: f32) -> bool {
        self.cable_a.is_meaningful(threshold) || self.cable_b.is_meaningful(threshold)
    }

    /// Whether an active cable sits in the bottom of its range
    ///
    /// A cable only counts when its travel exceeds `min_range_threshold`, so an
    /// unused cable in a single-cable exercise is never flagged.
    #[must_use]
    pub fn is_in_danger_zone(
        &self,
        position_a: f32,
        position_b: f32,
        min_range_threshold: f32,
    ) -> bool {
        let fraction = self.config.danger_zone_fraction;
        self.cable_a
            .in_danger_zone(position_a, min_range_threshold, fraction)
            || self
                .cable_b
                .in_danger_zone(position_b, min_range_threshold, fraction)
    }

    /// Tuning in use
    #[must_use]
    pub const fn config(&self) -> &RepCounterConfig {
        &self.config
    }

    fn rom_window(&self) -> usize {
        if self.is_warmup_complete() {
            self.config.working_rom_window
        } else {
            self.config.warmup_rom_window
        }
    }

    fn record_top(&mut self, position_a: f32, position_b: f32) {
        let window = self.rom_window();
        self.cable_a.record_top(position_a, window);
        self.cable_b.record_top(position_b, window);
    }

    fn record_bottom(&mut self, position_a: f32, position_b: f32) {
        let window = self.rom_window();
        self.cable_a.record_bottom(position_a, window);
        self.cable_b.record_bottom(position_b, window);
    }

    fn active_range(&self) -> CableRange {
        let span_a = self.cable_a.range.span().unwrap_or(0.0);
        let span_b = self.cable_b.range.span().unwrap_or(0.0);
        if span_b > span_a {
            self.cable_b.range
        } else {
            self.cable_a.range
        }
    }

    const fn counts_to_target(&self) -> bool {
        self.working_target > 0 && !self.is_just_lift && !self.is_amrap
    }

    fn count_legacy_rep(&mut self, events: &mut Vec<RepEvent>) {
        let total = self.warmup_reps + self.working_reps + 1;
        if total <= self.warmup_target {
            self.warmup_reps += 1;
            debug!(warmup_reps = self.warmup_reps, "Warm-up rep completed");
            events.push(RepEvent::WarmupRepCompleted {
                warmup_reps: self.warmup_reps,
            });
            if self.warmup_reps == self.warmup_target {
                events.push(RepEvent::WarmupComplete);
            }
        } else {
            self.complete_working_rep(self.working_reps + 1, events);
        }
    }

    fn on_top_reached(&mut self, events: &mut Vec<RepEvent>) {
        if !self.is_warmup_complete() || self.should_stop {
            return;
        }

        if self.stop_at_top {
            if self.counts_to_target() && self.working_reps + 1 == self.working_target {
                debug!("Final rep confirmed at the top");
                self.complete_working_rep(self.working_target, events);
            }
        } else if !self.has_pending_rep {
            self.has_pending_rep = true;
            events.push(RepEvent::WorkingRepPending {
                rep: self.working_reps + 1,
            });
        }
    }

    fn sync_warmup(&mut self, machine_count: u32, events: &mut Vec<RepEvent>) {
        let count = machine_count.min(self.warmup_target);
        if count <= self.warmup_reps {
            return;
        }

        for warmup_reps in self.warmup_reps + 1..=count {
            events.push(RepEvent::WarmupRepCompleted { warmup_reps });
        }
        self.warmup_reps = count;
        debug!(warmup_reps = count, "Warm-up reps synced from machine");

        if self.is_warmup_complete() {
            events.push(RepEvent::WarmupComplete);
        }
    }

    // The machine owns the warm-up/working boundary: a working rep it reports
    // closes warm-up here even if the warm-up counter has not caught up.
    fn sync_working(&mut self, machine_count: u32, events: &mut Vec<RepEvent>) {
        if machine_count <= self.working_reps {
            return;
        }

        if !self.is_warmup_complete() {
            warn!(
                warmup_reps = self.warmup_reps,
                warmup_target = self.warmup_target,
                "Machine reported a working rep before warm-up completed locally"
            );
            self.warmup_reps = self.warmup_target;
            events.push(RepEvent::WarmupComplete);
        }

        self.complete_working_rep(machine_count, events);
    }

    fn complete_working_rep(&mut self, count: u32, events: &mut Vec<RepEvent>) {
        self.has_pending_rep = false;
        for working_reps in self.working_reps + 1..=count {
            events.push(RepEvent::WorkingRepCompleted { working_reps });
        }
        self.working_reps = count;
        debug!(working_reps = count, "Working rep completed");

        if !self.should_stop && self.counts_to_target() && self.working_reps >= self.working_target
        {
            self.should_stop = true;
            info!(working_reps = self.working_reps, "Working target reached");
            events.push(RepEvent::WorkoutComplete {
                working_reps: self.working_reps,
            });
        }
    }
}

/// Update a counter baseline and return the increment
///
/// The first reading only sets the baseline.
fn observe(last: &mut Option<u16>, current: u16, name: &str) -> u16 {
    let delta = last.map_or(0, |previous| counter_delta(previous, current));
    *last = Some(current);
    if delta > 1 {
        debug!(counter = name, delta, "Counter advanced by more than one");
    }
    delta
}

fn fraction(distance: f32, span: f32) -> f32 {
    if span <= f32::EPSILON {
        return 0.0;
    }
    (distance / span).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MachineRepCounters;

    fn modern(up: u16, down: u16, warmup_count: u16, working_count: u16) -> RepNotification {
        RepNotification {
            up,
            down,
            position_a: 0.0,
            position_b: Some(0.0),
            machine: Some(MachineRepCounters {
                warmup_count,
                warmup_target: 3,
                working_count,
                working_target: 10,
                range_top: 0.0,
                range_bottom: 0.0,
            }),
        }
    }

    fn legacy(up: u16, down: u16) -> RepNotification {
        RepNotification {
            up,
            down,
            position_a: 0.0,
            position_b: None,
            machine: None,
        }
    }

    fn count_of(events: &[RepEvent], wanted: RepEvent) -> usize {
        events.iter().filter(|event| **event == wanted).count()
    }

    #[test]
    fn test_counter_delta_wraps() {
        assert_eq!(counter_delta(0xFFFF, 0x0000), 1);
        assert_eq!(counter_delta(0xFFFE, 0x0001), 3);
        assert_eq!(counter_delta(10, 12), 2);
        assert_eq!(counter_delta(7, 7), 0);
    }

    #[test]
    fn test_counter_delta_matches_reference_formula() {
        for last in (0..=u16::MAX).step_by(251).chain([0xFFFE, 0xFFFF]) {
            for current in (0..=u16::MAX).step_by(239).chain([0x0000, 0x0001, 0xFFFF]) {
                let expected = if current >= last {
                    u32::from(current - last)
                } else {
                    0xFFFF - u32::from(last) + u32::from(current) + 1
                };
                assert_eq!(u32::from(counter_delta(last, current)), expected);
            }
        }
    }

    #[test]
    fn test_modern_warmup_then_working() {
        let mut counter = RepCounter::new();
        counter.configure(3, 10, false, false, false);

        let mut events = counter.process(&modern(0, 0, 0, 0), 0.0, 0.0);
        for warmup in 1..=3 {
            events.extend(counter.process(&modern(0, 0, warmup, 0), 0.0, 0.0));
        }
        events.extend(counter.process(&modern(0, 0, 3, 1), 0.0, 0.0));

        let count = counter.rep_count();
        assert_eq!(count.warmup_reps, 3);
        assert_eq!(count.working_reps, 1);
        assert_eq!(count.total_reps, 1);
        assert!(count.is_warmup_complete);
        assert_eq!(count_of(&events, RepEvent::WarmupComplete), 1);
        assert_eq!(
            count_of(&events, RepEvent::WorkingRepCompleted { working_reps: 1 }),
            1
        );
    }

    #[test]
    fn test_machine_warmup_complete_then_first_working() {
        let mut counter = RepCounter::new();
        counter.configure(3, 10, false, false, false);

        let mut events = counter.process(&modern(0, 0, 3, 0), 0.0, 0.0);
        events.extend(counter.process(&modern(0, 0, 3, 1), 0.0, 0.0));

        let count = counter.rep_count();
        assert_eq!(count.warmup_reps, 3);
        assert_eq!(count.working_reps, 1);
        assert!(count.is_warmup_complete);
        assert_eq!(count_of(&events, RepEvent::WarmupComplete), 1);
    }

    #[test]
    fn test_warmup_never_exceeds_target_and_never_decreases() {
        let mut counter = RepCounter::new();
        counter.configure(3, 10, false, false, false);

        let mut previous = 0;
        for warmup in [0, 1, 1, 2, 5, 9, 2] {
            counter.process(&modern(0, 0, warmup, 0), 0.0, 0.0);
            let reps = counter.rep_count().warmup_reps;
            assert!(reps <= 3);
            assert!(reps >= previous);
            previous = reps;
        }
        assert_eq!(previous, 3);
    }

    #[test]
    fn test_working_counter_forces_warmup_complete() {
        let mut counter = RepCounter::new();
        counter.configure(3, 10, false, false, false);

        counter.process(&modern(0, 0, 1, 0), 0.0, 0.0);
        let events = counter.process(&modern(0, 0, 1, 1), 0.0, 0.0);

        let count = counter.rep_count();
        assert_eq!(count.warmup_reps, 3);
        assert_eq!(count.working_reps, 1);
        assert_eq!(
            events,
            vec![
                RepEvent::WarmupComplete,
                RepEvent::WorkingRepCompleted { working_reps: 1 }
            ]
        );
    }

    #[test]
    fn test_workout_complete_fires_once() {
        let mut counter = RepCounter::new();
        counter.configure(0, 5, false, false, false);

        let mut events = Vec::new();
        for working in 0..=7 {
            events.extend(counter.process(&modern(0, 0, 0, working), 0.0, 0.0));
            if working == 4 {
                assert!(!counter.should_stop_workout());
            }
        }

        assert!(counter.should_stop_workout());
        assert_eq!(count_of(&events, RepEvent::WorkoutComplete { working_reps: 5 }), 1);
        assert_eq!(
            events
                .iter()
                .filter(|event| matches!(event, RepEvent::WorkoutComplete { .. }))
                .count(),
            1
        );
    }

    #[test]
    fn test_amrap_and_just_lift_never_complete_by_count() {
        for (is_just_lift, is_amrap) in [(false, true), (true, false)] {
            let mut counter = RepCounter::new();
            counter.configure(0, 5, is_just_lift, false, is_amrap);

            let mut events = Vec::new();
            for working in 0..=6 {
                events.extend(counter.process(&modern(0, 0, 0, working), 0.0, 0.0));
            }

            assert!(!counter.should_stop_workout());
            assert_eq!(counter.rep_count().working_reps, 6);
            assert!(!events
                .iter()
                .any(|event| matches!(event, RepEvent::WorkoutComplete { .. })));
        }
    }

    #[test]
    fn test_pending_rep_raised_at_top_and_cleared_at_bottom() {
        let mut counter = RepCounter::new();
        counter.configure(0, 10, false, false, false);

        counter.process(&modern(0, 0, 0, 0), 0.0, 0.0);
        let events = counter.process(&modern(1, 0, 0, 0), 400.0, 0.0);
        assert_eq!(events, vec![RepEvent::WorkingRepPending { rep: 1 }]);
        assert!(counter.rep_count().has_pending_rep);

        let events = counter.process(&modern(1, 1, 0, 1), 50.0, 0.0);
        assert_eq!(events, vec![RepEvent::WorkingRepCompleted { working_reps: 1 }]);
        assert!(!counter.rep_count().has_pending_rep);
    }

    #[test]
    fn test_no_pending_during_warmup() {
        let mut counter = RepCounter::new();
        counter.configure(3, 10, false, false, false);

        counter.process(&modern(0, 0, 0, 0), 0.0, 0.0);
        let events = counter.process(&modern(1, 0, 0, 0), 400.0, 0.0);
        assert!(events.is_empty());
        assert!(!counter.rep_count().has_pending_rep);
    }

    #[test]
    fn test_stop_at_top_confirms_final_rep_at_top() {
        let mut counter = RepCounter::new();
        counter.configure(0, 5, false, true, false);

        counter.process(&modern(0, 0, 0, 0), 0.0, 0.0);
        for rep in 1..=4u16 {
            let events = counter.process(&modern(rep, rep - 1, 0, rep - 1), 400.0, 0.0);
            assert!(events.is_empty(), "no pending state with stop-at-top");
            counter.process(&modern(rep, rep, 0, rep), 50.0, 0.0);
        }
        assert_eq!(counter.rep_count().working_reps, 4);

        let events = counter.process(&modern(5, 4, 0, 4), 400.0, 0.0);
        assert_eq!(counter.rep_count().working_reps, 5);
        assert!(counter.should_stop_workout());
        assert_eq!(
            events,
            vec![
                RepEvent::WorkingRepCompleted { working_reps: 5 },
                RepEvent::WorkoutComplete { working_reps: 5 }
            ]
        );

        let events = counter.process(&modern(5, 5, 0, 5), 50.0, 0.0);
        assert!(events.is_empty());
        assert_eq!(counter.rep_count().working_reps, 5);
    }

    #[test]
    fn test_legacy_classifies_warmup_then_working() {
        let mut counter = RepCounter::new();
        counter.configure(2, 3, false, false, false);

        counter.process(&legacy(0, 0), 0.0, 0.0);
        let mut events = Vec::new();
        for up in 1..=5 {
            events.extend(counter.process(&legacy(up, up - 1), 0.0, 0.0));
        }

        assert_eq!(
            events,
            vec![
                RepEvent::WarmupRepCompleted { warmup_reps: 1 },
                RepEvent::WarmupRepCompleted { warmup_reps: 2 },
                RepEvent::WarmupComplete,
                RepEvent::WorkingRepCompleted { working_reps: 1 },
                RepEvent::WorkingRepCompleted { working_reps: 2 },
                RepEvent::WorkingRepCompleted { working_reps: 3 },
                RepEvent::WorkoutComplete { working_reps: 3 },
            ]
        );
    }

    #[test]
    fn test_legacy_counts_across_wraparound() {
        let mut counter = RepCounter::new();
        counter.configure(0, 10, false, false, false);

        counter.process(&legacy(0xFFFE, 0xFFFE), 0.0, 0.0);
        counter.process(&legacy(0xFFFF, 0xFFFE), 0.0, 0.0);
        counter.process(&legacy(0x0000, 0xFFFF), 0.0, 0.0);
        counter.process(&legacy(0x0000, 0x0000), 0.0, 0.0);

        assert_eq!(counter.rep_count().working_reps, 2);
    }

    #[test]
    fn test_first_notification_only_sets_baseline() {
        let mut counter = RepCounter::new();
        counter.configure(0, 10, false, false, false);

        assert!(counter.process(&legacy(42, 41), 0.0, 0.0).is_empty());
        assert!(counter.process(&legacy(42, 41), 0.0, 0.0).is_empty());
        assert_eq!(counter.rep_count().working_reps, 0);
        assert_eq!(counter.rep_ranges(), RepRanges::default());
    }

    #[test]
    fn test_rom_window_averages_confirmed_samples() {
        let mut counter = RepCounter::new();
        counter.configure(2, 10, false, false, false);

        counter.process(&legacy(0, 0), 0.0, 0.0);
        // Warm-up: window of two
        counter.process(&legacy(1, 0), 500.0, 0.0);
        counter.process(&legacy(1, 1), 100.0, 0.0);
        counter.process(&legacy(2, 1), 520.0, 0.0);
        counter.process(&legacy(2, 2), 110.0, 0.0);

        let ranges = counter.rep_ranges();
        assert_eq!(ranges.a.max_pos, Some(510.0));
        assert_eq!(ranges.a.min_pos, Some(105.0));
        assert_eq!(ranges.a.top_band, Some((500.0, 520.0)));
        assert_eq!(ranges.a.last_top, Some(520.0));

        // Working: window of three
        counter.process(&legacy(3, 2), 530.0, 0.0);
        counter.process(&legacy(4, 2), 540.0, 0.0);
        let ranges = counter.rep_ranges();
        assert_eq!(ranges.a.max_pos, Some(530.0));
        assert_eq!(ranges.a.top_band, Some((520.0, 540.0)));
        assert_eq!(ranges.a.last_top, Some(540.0));
        assert_eq!(ranges.a.last_bottom, Some(110.0));
    }

    #[test]
    fn test_reset_counts_only_preserves_range() {
        let mut counter = RepCounter::new();
        counter.configure(0, 10, false, false, false);

        counter.process(&legacy(0, 0), 0.0, 0.0);
        counter.process(&legacy(1, 0), 600.0, 0.0);
        counter.process(&legacy(1, 1), 80.0, 0.0);
        assert!(counter.has_meaningful_range(50.0));
        assert_eq!(counter.rep_count().working_reps, 1);

        counter.reset_counts_only();
        assert_eq!(counter.rep_count().working_reps, 0);
        assert_eq!(counter.rep_count().warmup_reps, 0);
        assert!(counter.has_meaningful_range(50.0));

        counter.reset();
        assert!(!counter.has_meaningful_range(50.0));
    }

    #[test]
    fn test_danger_zone() {
        let mut counter = RepCounter::new();
        counter.update_position_ranges_continuously(100.0, 0.0);
        counter.update_position_ranges_continuously(1000.0, 0.0);

        assert!(counter.is_in_danger_zone(110.0, 0.0, 50.0));
        assert!(counter.is_in_danger_zone(140.0, 0.0, 50.0));
        assert!(!counter.is_in_danger_zone(200.0, 0.0, 50.0));
    }

    #[test]
    fn test_danger_zone_ignores_small_range() {
        let mut counter = RepCounter::new();
        counter.update_position_ranges_continuously(100.0, 0.0);
        counter.update_position_ranges_continuously(120.0, 0.0);

        assert!(!counter.has_meaningful_range(50.0));
        for position in [0.0, 100.0, 101.0, 110.0, 120.0] {
            assert!(!counter.is_in_danger_zone(position, position, 50.0));
        }
    }

    #[test]
    fn test_phase_tracking_waits_for_warmup() {
        let mut counter = RepCounter::new();
        counter.configure(1, 10, false, false, false);

        counter.observe_position(100.0, 0.0);
        counter.observe_position(300.0, 0.0);
        assert_eq!(counter.rep_count().active_phase, RepPhase::Idle);
    }

    #[test]
    fn test_phase_tracking_directions_and_progress() {
        let mut counter = RepCounter::new();
        counter.configure(0, 10, false, false, false);
        counter.update_position_ranges_continuously(100.0, 0.0);
        counter.update_position_ranges_continuously(500.0, 0.0);

        counter.observe_position(100.0, 0.0);
        assert_eq!(counter.rep_count().active_phase, RepPhase::Idle);

        counter.observe_position(150.0, 0.0);
        let count = counter.rep_count();
        assert_eq!(count.active_phase, RepPhase::Concentric);
        assert!((count.phase_progress - 0.125).abs() < 1e-4);

        counter.observe_position(300.0, 0.0);
        assert!((counter.rep_count().phase_progress - 0.5).abs() < 1e-4);

        for position in [250.0, 200.0, 150.0] {
            counter.observe_position(position, 0.0);
        }
        let count = counter.rep_count();
        assert_eq!(count.active_phase, RepPhase::Eccentric);
        assert!((count.phase_progress - 0.75).abs() < 1e-4);
    }
}
