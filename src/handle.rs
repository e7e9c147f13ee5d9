use tracing::{debug, info, warn};

use crate::types::{HandleConfig, HandleState, TelemetrySample};

/// Detects whether the handles are resting, released or picked up
///
/// Only consumes telemetry while enabled. Enabling is debounced so that two
/// triggers firing back to back do not restart a grab that is already being
/// timed.
#[derive(Debug, Default)]
pub struct HandleStateMachine {
    config: HandleConfig,
    enabled: bool,
    state: HandleState,
    last_enable_ms: Option<u64>,
    non_rest_since: Option<u64>,
    grab_since: Option<u64>,
}

impl HandleStateMachine {
    /// Create a disabled detector with default thresholds
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a disabled detector with custom thresholds
    #[must_use]
    pub fn with_config(config: HandleConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Enable detection and re-arm to [`HandleState::WaitingForRest`]
    ///
    /// Returns `false` when the call falls inside the debounce window of the
    /// previous accepted call; nothing changes in that case.
    pub fn enable(&mut self, now_ms: u64) -> bool {
        if let Some(last) = self.last_enable_ms {
            if now_ms.saturating_sub(last) < self.config.enable_debounce_ms {
                debug!(
                    since_last_ms = now_ms.saturating_sub(last),
                    "Ignoring repeated handle detection enable"
                );
                return false;
            }
        }

        info!("Handle detection enabled");
        self.last_enable_ms = Some(now_ms);
        self.enabled = true;
        self.state = HandleState::WaitingForRest;
        self.non_rest_since = None;
        self.grab_since = None;
        true
    }

    /// Stop consuming telemetry
    ///
    /// The next [`HandleStateMachine::enable`] is always accepted; the debounce
    /// only guards a detector that is still running.
    pub fn disable(&mut self) {
        if self.enabled {
            info!("Handle detection disabled");
        }
        self.enabled = false;
        self.last_enable_ms = None;
        self.state = HandleState::WaitingForRest;
        self.non_rest_since = None;
        self.grab_since = None;
    }

    /// Whether telemetry is being consumed
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> HandleState {
        self.state
    }

    /// Feed one telemetry sample; returns the new state on a transition
    pub fn process(&mut self, sample: &TelemetrySample) -> Option<HandleState> {
        if !self.enabled {
            return None;
        }

        let now = sample.timestamp_ms;
        let at_rest = sample.position_a < self.config.rest_threshold_mm
            && sample.position_b < self.config.rest_threshold_mm;

        match self.state {
            HandleState::WaitingForRest => {
                if at_rest {
                    self.non_rest_since = None;
                    return self.transition(HandleState::Released);
                }

                let since = *self.non_rest_since.get_or_insert(now);
                let waited = now.saturating_sub(since);
                if waited >= self.config.rest_timeout_ms {
                    warn!(
                        waited_ms = waited,
                        position_a = sample.position_a,
                        position_b = sample.position_b,
                        "Handles never came to rest, arming anyway"
                    );
                    self.non_rest_since = None;
                    return self.transition(HandleState::Released);
                }
                None
            }
            HandleState::Released => self.detect_grab(sample),
            HandleState::Grabbed | HandleState::Moving if at_rest => {
                self.transition(HandleState::Released)
            }
            HandleState::Grabbed
                if sample.max_abs_velocity() > self.config.moving_velocity_threshold_mm_s =>
            {
                self.transition(HandleState::Moving)
            }
            HandleState::Grabbed | HandleState::Moving => None,
        }
    }

    // Velocity only has to be present to start the dwell; position must hold
    // above the grab threshold for the whole dwell.
    fn detect_grab(&mut self, sample: &TelemetrySample) -> Option<HandleState> {
        let now = sample.timestamp_ms;
        let lifted = sample.max_position() > self.config.grab_position_threshold_mm;

        if !lifted {
            self.grab_since = None;
            return None;
        }

        let since = match self.grab_since {
            Some(since) => since,
            None if sample.max_abs_velocity() > self.config.grab_velocity_threshold_mm_s => {
                self.grab_since = Some(now);
                now
            }
            None => return None,
        };

        if now.saturating_sub(since) >= self.config.grab_dwell_ms {
            return self.transition(HandleState::Grabbed);
        }
        None
    }

    fn transition(&mut self, to: HandleState) -> Option<HandleState> {
        debug!(from = %self.state, to = %to, "Handle state transition");
        self.state = to;
        self.grab_since = None;
        Some(to)
    }
}
