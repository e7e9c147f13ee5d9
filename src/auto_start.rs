//! Hands-free start.
//!
//! Grabbing the handles starts a countdown; when the countdown elapses the
//! controller re-validates everything it depends on before allowing START to be
//! written. The countdown timer itself lives with the caller (see
//! [`crate::session`]); this module only decides.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::types::{AutoStartConfig, HandleState};

/// Controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AutoStartState {
    /// Hands-free start not requested
    #[default]
    Idle,
    /// Waiting for the handles to be grabbed
    Armed,
    /// Countdown running
    Counting,
    /// Countdown elapsed; final checks in progress
    ///
    /// Only held inside [`AutoStartController::on_countdown_elapsed`], which
    /// always leaves `Started`, `Armed` or `Idle` behind. Log lines emitted
    /// during the checks carry it.
    Guarding,
    /// START was approved
    Started,
}

impl fmt::Display for AutoStartState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Armed => write!(f, "Armed"),
            Self::Counting => write!(f, "Counting"),
            Self::Guarding => write!(f, "Guarding"),
            Self::Started => write!(f, "Started"),
        }
    }
}

/// Identity of one countdown
///
/// Every new countdown and every cancellation bumps the generation, so a token
/// held by a timer that outlived its countdown no longer matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CountdownToken {
    generation: u64,
    epoch: u64,
}

impl CountdownToken {
    /// Countdown generation
    #[must_use]
    pub const fn generation(self) -> u64 {
        self.generation
    }

    /// Session epoch captured when the countdown began
    #[must_use]
    pub const fn epoch(self) -> u64 {
        self.epoch
    }
}

/// What the caller should do with its countdown timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownAction {
    /// Start a timer for this token
    Begin(CountdownToken),
    /// Stop the running timer
    Cancel,
}

/// Fresh readings taken at the moment the countdown elapses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardContext {
    /// Current handle state
    pub handle_state: HandleState,
    /// Whether the workout configuration still asks for hands-free start
    pub auto_start_enabled: bool,
    /// Current session epoch
    pub session_epoch: u64,
}

/// Why an elapsed countdown did not start the set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The countdown was cancelled or replaced
    Superseded,
    /// Handles are no longer held
    HandlesReleased(HandleState),
    /// Hands-free start was turned off
    AutoStartDisabled,
    /// The session moved on while the countdown ran
    SessionChanged,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Superseded => write!(f, "countdown superseded"),
            Self::HandlesReleased(state) => write!(f, "handles no longer held ({state})"),
            Self::AutoStartDisabled => write!(f, "auto-start no longer requested"),
            Self::SessionChanged => write!(f, "session changed during countdown"),
        }
    }
}

/// Outcome of the final guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartDecision {
    /// Write START now
    Launch,
    /// Do nothing
    Abort(AbortReason),
}

/// Hands-free start state machine
#[derive(Debug, Default)]
pub struct AutoStartController {
    config: AutoStartConfig,
    state: AutoStartState,
    generation: u64,
    active: Option<CountdownToken>,
}

impl AutoStartController {
    /// Create an idle controller with the default countdown
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an idle controller with a custom countdown
    #[must_use]
    pub fn with_config(config: AutoStartConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Wait for a grab
    pub fn arm(&mut self) {
        self.invalidate();
        self.state = AutoStartState::Armed;
        debug!("Auto-start armed");
    }

    /// Stop waiting and invalidate any running countdown
    pub fn disarm(&mut self) {
        self.invalidate();
        self.state = AutoStartState::Idle;
        debug!("Auto-start disarmed");
    }

    /// React to a handle state change
    pub fn on_handle_state(
        &mut self,
        handle_state: HandleState,
        session_epoch: u64,
    ) -> Option<CountdownAction> {
        match self.state {
            AutoStartState::Armed if handle_state.is_grabbed() => {
                self.generation = self.generation.wrapping_add(1);
                let token = CountdownToken {
                    generation: self.generation,
                    epoch: session_epoch,
                };
                self.active = Some(token);
                self.state = AutoStartState::Counting;
                info!(
                    generation = token.generation,
                    seconds = self.config.countdown_seconds,
                    "Auto-start countdown started"
                );
                Some(CountdownAction::Begin(token))
            }
            AutoStartState::Counting if !handle_state.is_grabbed() => {
                self.invalidate();
                self.state = AutoStartState::Armed;
                info!(handle_state = %handle_state, "Auto-start countdown cancelled");
                Some(CountdownAction::Cancel)
            }
            _ => None,
        }
    }

    /// Whether `token` belongs to the countdown that is still running
    #[must_use]
    pub fn is_current(&self, token: CountdownToken) -> bool {
        self.active == Some(token)
    }

    /// Final guard, run in the same step that would write START
    ///
    /// Every input is read fresh by the caller. Any failed check aborts and is
    /// logged; nothing here is an error.
    pub fn on_countdown_elapsed(
        &mut self,
        token: CountdownToken,
        context: GuardContext,
    ) -> StartDecision {
        if !self.is_current(token) {
            return self.abort(AbortReason::Superseded);
        }

        self.state = AutoStartState::Guarding;
        self.active = None;

        let reason = if !context.handle_state.is_grabbed() {
            Some(AbortReason::HandlesReleased(context.handle_state))
        } else if !context.auto_start_enabled {
            Some(AbortReason::AutoStartDisabled)
        } else if context.session_epoch != token.epoch {
            Some(AbortReason::SessionChanged)
        } else {
            None
        };

        if let Some(reason) = reason {
            let decision = self.abort(reason);
            self.state = if context.auto_start_enabled && context.session_epoch == token.epoch {
                AutoStartState::Armed
            } else {
                AutoStartState::Idle
            };
            return decision;
        }

        self.state = AutoStartState::Started;
        info!(generation = token.generation, "Auto-start approved");
        StartDecision::Launch
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> AutoStartState {
        self.state
    }

    /// Countdown length in seconds
    #[must_use]
    pub const fn countdown_seconds(&self) -> u8 {
        self.config.countdown_seconds
    }

    /// Time between countdown ticks in milliseconds
    #[must_use]
    pub const fn tick_interval_ms(&self) -> u64 {
        self.config.tick_interval_ms
    }

    fn invalidate(&mut self) {
        if self.active.take().is_some() {
            self.generation = self.generation.wrapping_add(1);
        }
    }

    fn abort(&self, reason: AbortReason) -> StartDecision {
        info!(%reason, state = %self.state, "Auto-start aborted");
        StartDecision::Abort(reason)
    }
}
