use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, TrainerError};

/// Maximum resistance the trainer accepts per cable, in kilograms
pub const MAX_WEIGHT_PER_CABLE_KG: f32 = 100.0;

/// Force-curve program modes understood by the trainer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProgramMode {
    /// Constant resistance in both directions
    OldSchool,
    /// Fast, light-feeling reps with quick load ramp
    Pump,
    /// Time under tension
    Tut,
    /// Time under tension with a heavier eccentric
    TutBeast,
    /// Load applied only while lowering
    EccentricOnly,
}

impl ProgramMode {
    /// All program modes, in profile-table order
    pub const ALL: [Self; 5] = [
        Self::OldSchool,
        Self::Pump,
        Self::Tut,
        Self::TutBeast,
        Self::EccentricOnly,
    ];
}

impl fmt::Display for ProgramMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OldSchool => write!(f, "Old School"),
            Self::Pump => write!(f, "Pump"),
            Self::Tut => write!(f, "TUT"),
            Self::TutBeast => write!(f, "TUT Beast"),
            Self::EccentricOnly => write!(f, "Eccentric Only"),
        }
    }
}

/// Echo mode intensity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EchoLevel {
    /// Lowest gain
    Hard = 0,
    /// Medium gain
    Harder = 1,
    /// High gain
    Hardest = 2,
    /// Maximum gain
    Epic = 3,
}

impl From<u8> for EchoLevel {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Hard,
            1 => Self::Harder,
            2 => Self::Hardest,
            _ => Self::Epic,
        }
    }
}

impl fmt::Display for EchoLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hard => write!(f, "Hard"),
            Self::Harder => write!(f, "Harder"),
            Self::Hardest => write!(f, "Hardest"),
            Self::Epic => write!(f, "Epic"),
        }
    }
}

/// Workout mode selecting which configuration frame is sent before START
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WorkoutMode {
    /// Weight-based program mode (PROGRAM frame)
    Program(ProgramMode),
    /// Adaptive echo mode (ECHO frame)
    Echo {
        /// Intensity level
        level: EchoLevel,
        /// Eccentric load as a percentage of concentric effort
        eccentric_pct: u16,
    },
}

impl fmt::Display for WorkoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Program(mode) => write!(f, "{mode}"),
            Self::Echo {
                level,
                eccentric_pct,
            } => write!(f, "Echo ({level}, {eccentric_pct}% eccentric)"),
        }
    }
}

/// Immutable snapshot of a set's configuration, supplied at set start
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkoutParameters {
    /// Workout mode
    pub mode: WorkoutMode,
    /// Configured resistance per cable (kg)
    pub weight_per_cable_kg: f32,
    /// Progression (positive) or regression (negative) offset per rep (kg)
    pub progression_kg: f32,
    /// Working rep target
    pub reps: u8,
    /// Warm-up rep target
    pub warmup_reps: u8,
    /// Hands-free continuous set with no rep target
    pub is_just_lift: bool,
    /// Final rep is confirmed at full contraction instead of full release
    pub stop_at_top: bool,
    /// As many reps as possible; never completes by count
    pub is_amrap: bool,
    /// Start automatically once the handles are grabbed
    pub auto_start: bool,
}

impl WorkoutParameters {
    /// Whether the set has no fixed rep target on the wire
    #[must_use]
    pub const fn is_unlimited(&self) -> bool {
        self.is_just_lift || self.is_amrap
    }

    /// Validate parameter ranges before the set is configured
    ///
    /// # Errors
    ///
    /// Returns [`TrainerError::InvalidParameters`] if the weight is negative, not
    /// finite or above [`MAX_WEIGHT_PER_CABLE_KG`], or if a counted set has no reps.
    pub fn validate(&self) -> Result<()> {
        if !self.weight_per_cable_kg.is_finite()
            || !(0.0..=MAX_WEIGHT_PER_CABLE_KG).contains(&self.weight_per_cable_kg)
        {
            return Err(TrainerError::InvalidParameters(format!(
                "Weight {:.1} kg per cable is out of range (0.0 - {MAX_WEIGHT_PER_CABLE_KG:.1})",
                self.weight_per_cable_kg
            )));
        }

        if !self.progression_kg.is_finite() {
            return Err(TrainerError::InvalidParameters(
                "Progression offset must be finite".to_string(),
            ));
        }

        if !self.is_unlimited() && self.reps == 0 {
            return Err(TrainerError::InvalidParameters(
                "A counted set needs at least one working rep".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for WorkoutParameters {
    fn default() -> Self {
        Self {
            mode: WorkoutMode::Program(ProgramMode::OldSchool),
            weight_per_cable_kg: 10.0,
            progression_kg: 0.0,
            reps: 10,
            warmup_reps: 3,
            is_just_lift: false,
            stop_at_top: false,
            is_amrap: false,
            auto_start: false,
        }
    }
}

/// Status bitmask carried in the monitor frame
///
/// Bits this crate does not name are preserved as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusFlags(pub u16);

impl StatusFlags {
    /// Load is about to be released because the cable went slack
    pub const DELOAD_WARNING: u16 = 0x0001;
    /// Cable travelled past the calibrated top of the range
    pub const ROM_OUTSIDE_HIGH: u16 = 0x0002;
    /// Cable travelled past the calibrated bottom of the range
    pub const ROM_OUTSIDE_LOW: u16 = 0x0004;
    /// Machine-side rep counter was reset
    pub const REP_COUNTER_RESET: u16 = 0x0008;
    /// Load was released
    pub const DELOAD_OCCURRED: u16 = 0x8000;

    /// Check whether every bit in `mask` is set
    #[must_use]
    pub const fn contains(self, mask: u16) -> bool {
        self.0 & mask == mask
    }

    /// Deload warning bit
    #[must_use]
    pub const fn deload_warning(self) -> bool {
        self.contains(Self::DELOAD_WARNING)
    }

    /// Deload occurred bit
    #[must_use]
    pub const fn deload_occurred(self) -> bool {
        self.contains(Self::DELOAD_OCCURRED)
    }
}

/// One decoded monitor sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Host receive time in milliseconds
    pub timestamp_ms: u64,
    /// Machine tick counter
    pub ticks: u32,
    /// Cable A position (mm)
    pub position_a: f32,
    /// Cable B position (mm)
    pub position_b: f32,
    /// Cable A load (kg)
    pub load_a: f32,
    /// Cable B load (kg)
    pub load_b: f32,
    /// Cable A velocity (mm/s), derived from the previous sample
    pub velocity_a: f32,
    /// Cable B velocity (mm/s), derived from the previous sample
    pub velocity_b: f32,
    /// Status bitmask
    pub status: StatusFlags,
}

impl TelemetrySample {
    /// Larger of the two cable positions
    #[must_use]
    pub fn max_position(&self) -> f32 {
        self.position_a.max(self.position_b)
    }

    /// Larger of the two absolute cable velocities
    #[must_use]
    pub fn max_abs_velocity(&self) -> f32 {
        self.velocity_a.abs().max(self.velocity_b.abs())
    }

    /// Derive velocities from the previous sample
    ///
    /// Samples with no elapsed time keep zero velocity rather than dividing by zero.
    #[must_use]
    pub fn with_velocity_from(mut self, previous: &Self) -> Self {
        let dt_ms = self.timestamp_ms.saturating_sub(previous.timestamp_ms);
        if dt_ms == 0 {
            self.velocity_a = 0.0;
            self.velocity_b = 0.0;
            return self;
        }

        #[allow(clippy::cast_precision_loss)]
        let dt_s = dt_ms as f32 / 1000.0;
        self.velocity_a = (self.position_a - previous.position_a) / dt_s;
        self.velocity_b = (self.position_b - previous.position_b) / dt_s;
        self
    }
}

/// Explicit counters carried only by the modern rep notification
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MachineRepCounters {
    /// Machine warm-up rep count
    pub warmup_count: u16,
    /// Machine warm-up target
    pub warmup_target: u16,
    /// Machine working rep count
    pub working_count: u16,
    /// Machine working target
    pub working_target: u16,
    /// Machine-calibrated top of range (mm)
    pub range_top: f32,
    /// Machine-calibrated bottom of range (mm)
    pub range_bottom: f32,
}

/// One decoded rep notification
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RepNotification {
    /// Top-of-stroke counter (16-bit, wrapping)
    pub up: u16,
    /// Bottom-of-stroke counter (16-bit, wrapping)
    pub down: u16,
    /// Cable A position snapshot (mm)
    pub position_a: f32,
    /// Cable B position snapshot (mm), absent in the legacy frame
    pub position_b: Option<f32>,
    /// Explicit counters, present only in the modern frame
    pub machine: Option<MachineRepCounters>,
}

impl RepNotification {
    /// Legacy frames carry no warm-up/working split
    #[must_use]
    pub const fn is_legacy_format(&self) -> bool {
        self.machine.is_none()
    }
}

/// Movement phase within a rep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RepPhase {
    /// No direction established yet
    #[default]
    Idle,
    /// Lifting
    Concentric,
    /// Lowering
    Eccentric,
}

impl fmt::Display for RepPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Concentric => write!(f, "Concentric"),
            Self::Eccentric => write!(f, "Eccentric"),
        }
    }
}

/// Snapshot of the rep counter for display
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RepCount {
    /// Completed warm-up reps
    pub warmup_reps: u32,
    /// Completed working reps
    pub working_reps: u32,
    /// Displayed total; warm-up reps are excluded
    pub total_reps: u32,
    /// Warm-up target reached
    pub is_warmup_complete: bool,
    /// Top reached, bottom not yet confirmed
    pub has_pending_rep: bool,
    /// Progress of the pending rep towards the bottom (0.0 - 1.0)
    pub pending_progress: f32,
    /// Current movement phase
    pub active_phase: RepPhase,
    /// Progress within the current phase (0.0 - 1.0)
    pub phase_progress: f32,
}

/// Calibrated range of motion for one cable
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CableRange {
    /// Averaged bottom position (mm)
    pub min_pos: Option<f32>,
    /// Averaged top position (mm)
    pub max_pos: Option<f32>,
    /// Raw spread of recent bottom samples (min, max)
    pub bottom_band: Option<(f32, f32)>,
    /// Raw spread of recent top samples (min, max)
    pub top_band: Option<(f32, f32)>,
    /// Latest confirmed top sample
    pub last_top: Option<f32>,
    /// Latest confirmed bottom sample
    pub last_bottom: Option<f32>,
}

impl CableRange {
    /// Averaged travel, if both ends are known
    #[must_use]
    pub fn span(&self) -> Option<f32> {
        match (self.min_pos, self.max_pos) {
            (Some(min), Some(max)) => Some(max - min),
            _ => None,
        }
    }
}

/// Range of motion for both cables
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RepRanges {
    /// Cable A
    pub a: CableRange,
    /// Cable B
    pub b: CableRange,
}

/// Handle detection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HandleState {
    /// Waiting for both handles to be at rest before arming
    #[default]
    WaitingForRest,
    /// Armed; handles are down
    Released,
    /// Handles picked up
    Grabbed,
    /// Handles picked up and moving
    Moving,
}

impl HandleState {
    /// Grabbed or actively moving
    #[must_use]
    pub const fn is_grabbed(self) -> bool {
        matches!(self, Self::Grabbed | Self::Moving)
    }
}

impl fmt::Display for HandleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WaitingForRest => write!(f, "Waiting For Rest"),
            Self::Released => write!(f, "Released"),
            Self::Grabbed => write!(f, "Grabbed"),
            Self::Moving => write!(f, "Moving"),
        }
    }
}

/// Rep lifecycle event returned from [`crate::rep_counter::RepCounter::process`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepEvent {
    /// A warm-up rep finished
    WarmupRepCompleted {
        /// Warm-up reps so far
        warmup_reps: u32,
    },
    /// Warm-up target reached
    WarmupComplete,
    /// Top of a working rep reached, bottom not yet confirmed
    WorkingRepPending {
        /// Rep number being previewed
        rep: u32,
    },
    /// A working rep finished
    WorkingRepCompleted {
        /// Working reps so far
        working_reps: u32,
    },
    /// Working target reached
    WorkoutComplete {
        /// Final working rep count
        working_reps: u32,
    },
}

/// RGB colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rgb {
    /// Red
    pub r: u8,
    /// Green
    pub g: u8,
    /// Blue
    pub b: u8,
}

impl Rgb {
    /// Create a colour
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// LED colour scheme: brightness and two groups of three colours
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorScheme {
    /// LED brightness (0.0 - 1.0)
    pub brightness: f32,
    /// Colour triples, one group per LED strip
    pub colors: [[Rgb; 3]; 2],
}

impl ColorScheme {
    /// Blue gradient
    pub const BLUE: Self = Self::uniform(
        0.4,
        [Rgb::new(0x00, 0xA8, 0xDD), Rgb::new(0x00, 0xCF, 0xFC), Rgb::new(0x5D, 0xDF, 0xFC)],
    );
    /// Green gradient
    pub const GREEN: Self = Self::uniform(
        0.4,
        [Rgb::new(0x7D, 0xC1, 0x47), Rgb::new(0xA1, 0xD8, 0x6A), Rgb::new(0xBA, 0xE0, 0x94)],
    );
    /// Red gradient
    pub const RED: Self = Self::uniform(
        0.4,
        [Rgb::new(0xDA, 0x21, 0x6D), Rgb::new(0xFF, 0x00, 0x00), Rgb::new(0xFF, 0x56, 0x38)],
    );

    /// Same three colours on both strips
    #[must_use]
    pub const fn uniform(brightness: f32, colors: [Rgb; 3]) -> Self {
        Self {
            brightness,
            colors: [colors, colors],
        }
    }
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self::BLUE
    }
}

/// Rep counter tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepCounterConfig {
    /// ROM window size while warm-up is in progress
    pub warmup_rom_window: usize,
    /// ROM window size once warm-up is complete
    pub working_rom_window: usize,
    /// Number of position samples in the phase window
    pub phase_window: usize,
    /// Minimum displacement across the phase window to count as movement (mm)
    pub min_phase_movement_mm: f32,
    /// Minimum max−min travel for a cable to count as active (mm)
    pub meaningful_range_mm: f32,
    /// Fraction of the range, from the bottom, treated as the danger zone
    pub danger_zone_fraction: f32,
}

impl Default for RepCounterConfig {
    fn default() -> Self {
        Self {
            warmup_rom_window: 2,
            working_rom_window: 3,
            phase_window: 4,
            min_phase_movement_mm: 5.0,
            meaningful_range_mm: 50.0,
            danger_zone_fraction: 0.05,
        }
    }
}

/// Handle detection tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandleConfig {
    /// Both positions below this read as rest (mm)
    pub rest_threshold_mm: f32,
    /// Position above this may be a grab (mm)
    pub grab_position_threshold_mm: f32,
    /// Velocity above this may be a grab (mm/s)
    pub grab_velocity_threshold_mm_s: f32,
    /// Velocity above this while grabbed reads as moving (mm/s)
    pub moving_velocity_threshold_mm_s: f32,
    /// Grab condition must hold this long (ms)
    pub grab_dwell_ms: u64,
    /// Continuous non-rest time before arming anyway (ms)
    pub rest_timeout_ms: u64,
    /// Repeated enable calls inside this window are ignored (ms)
    pub enable_debounce_ms: u64,
}

impl Default for HandleConfig {
    fn default() -> Self {
        Self {
            rest_threshold_mm: 5.0,
            grab_position_threshold_mm: 8.0,
            grab_velocity_threshold_mm_s: 50.0,
            moving_velocity_threshold_mm_s: 100.0,
            grab_dwell_ms: 200,
            rest_timeout_ms: 3_000,
            enable_debounce_ms: 500,
        }
    }
}

/// Hands-free start tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoStartConfig {
    /// Countdown length in seconds
    pub countdown_seconds: u8,
    /// Time between countdown ticks (ms)
    pub tick_interval_ms: u64,
}

impl Default for AutoStartConfig {
    fn default() -> Self {
        Self {
            countdown_seconds: 5,
            tick_interval_ms: 1_000,
        }
    }
}

/// Hands-free stop tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoStopConfig {
    /// Max velocity below this starts the stall timer (mm/s)
    pub stall_velocity_low_mm_s: f32,
    /// Max velocity above this clears the stall timer (mm/s)
    pub stall_velocity_high_mm_s: f32,
    /// Stall duration that stops the set (ms)
    pub stall_window_ms: u64,
    /// Danger-zone release duration that stops the set (ms)
    pub edge_window_ms: u64,
    /// Positions below this always read as released (mm)
    pub release_position_mm: f32,
    /// Positions within this of the ROM minimum read as released (mm)
    pub release_tolerance_mm: f32,
    /// Watchdog period for evaluating timers without new telemetry (ms)
    pub watchdog_interval_ms: u64,
}

impl Default for AutoStopConfig {
    fn default() -> Self {
        Self {
            stall_velocity_low_mm_s: 2.5,
            stall_velocity_high_mm_s: 10.0,
            stall_window_ms: 5_000,
            edge_window_ms: 2_500,
            release_position_mm: 10.0,
            release_tolerance_mm: 10.0,
            watchdog_interval_ms: 100,
        }
    }
}

/// All controller tuning in one place
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Rep counter
    pub rep_counter: RepCounterConfig,
    /// Handle detection
    pub handle: HandleConfig,
    /// Hands-free start
    pub auto_start: AutoStartConfig,
    /// Hands-free stop
    pub auto_stop: AutoStopConfig,
}
