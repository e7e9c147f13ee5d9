use crate::{
    error::DecodeError,
    types::{
        ColorScheme, EchoLevel, MachineRepCounters, ProgramMode, RepNotification, Rgb,
        StatusFlags, TelemetrySample, WorkoutMode, WorkoutParameters,
    },
    MONITOR_CHAR_UUID, REPS_CHAR_UUID,
};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use uuid::Uuid;

/// PROGRAM configuration frame size in bytes
pub const PROGRAM_FRAME_LEN: usize = 96;

/// ECHO control frame size in bytes
pub const ECHO_FRAME_LEN: usize = 32;

/// COLOR SCHEME frame size in bytes
pub const COLOR_FRAME_LEN: usize = 34;

/// Monitor frame size with status word
pub const MONITOR_FRAME_LEN: usize = 18;

/// Monitor frame size on firmware without the status word
pub const MONITOR_FRAME_LEGACY_LEN: usize = 16;

/// Legacy rep notification size
pub const REPS_LEGACY_LEN: usize = 6;

/// Modern rep notification size
pub const REPS_MODERN_LEN: usize = 24;

/// Rep byte value meaning "no target"
pub const UNLIMITED_REPS: u8 = 0xFF;

/// Offset added to the configured weight in the effective-weight field (kg)
pub const EFFECTIVE_WEIGHT_OFFSET_KG: f32 = 10.0;

/// INIT/RESET frame
pub const INIT_FRAME: [u8; 4] = [0x0A, 0x00, 0x00, 0x00];

/// START frame
pub const START_FRAME: [u8; 4] = [0x03, 0x00, 0x00, 0x00];

/// Primary STOP frame
pub const STOP_FRAME: [u8; 4] = [0x05, 0x00, 0x00, 0x00];

/// Soft-stop that also clears a fault/blink state
pub const OFFICIAL_STOP_FRAME: [u8; 2] = [0x50, 0x00];

const PROFILE_OFFSET: usize = 0x30;
const PROFILE_LEN: usize = 32;
const WEIGHT_OFFSET: usize = 0x54;

// Bytes 0x05..0x30 of every PROGRAM frame.
const PROGRAM_HEADER: [u8; PROFILE_OFFSET - 0x05] = [
    0x03, 0x03, 0x00, // 0x05
    0x00, 0x00, 0xA0, 0x40, // 0x08: 5.0f
    0x00, 0x00, 0xA0, 0x40, // 0x0C: 5.0f
    0x00, 0x00, 0x00, 0x00, // 0x10
    0xFA, 0x00, 0xFA, 0x00, 0xC8, 0x00, 0x1E, 0x00, // 0x14
    0x00, 0x00, 0xA0, 0x40, // 0x1C: 5.0f
    0x00, 0x00, 0x00, 0x00, // 0x20
    0xFA, 0x00, 0xFA, 0x00, 0xC8, 0x00, 0x1E, 0x00, // 0x24
    0xFA, 0x00, 0x50, 0x00, // 0x2C
];

/// Command ids, the leading field of every outgoing frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandId {
    /// Start the configured set
    Start = 0x03,
    /// PROGRAM configuration
    Program = 0x04,
    /// Primary stop
    Stop = 0x05,
    /// Init/reset
    Init = 0x0A,
    /// LED colour scheme
    ColorScheme = 0x11,
    /// ECHO configuration
    Echo = 0x4E,
    /// Soft-stop / clear fault
    OfficialStop = 0x50,
}

impl CommandId {
    /// Convert from the wire value
    #[must_use]
    pub const fn from_u32(value: u32) -> Option<Self> {
        match value {
            0x03 => Some(Self::Start),
            0x04 => Some(Self::Program),
            0x05 => Some(Self::Stop),
            0x0A => Some(Self::Init),
            0x11 => Some(Self::ColorScheme),
            0x4E => Some(Self::Echo),
            0x50 => Some(Self::OfficialStop),
            _ => None,
        }
    }
}

/// One segment of a force-curve profile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceSegment {
    /// Segment start
    pub start: i16,
    /// Segment end
    pub end: i16,
    /// Segment rate
    pub rate: f32,
}

const fn seg(start: i16, end: i16, rate: f32) -> ForceSegment {
    ForceSegment { start, end, rate }
}

/// Per-mode force-curve profile, the 32-byte block at 0x30 of the PROGRAM frame
///
/// Four `(i16, i16, f32)` segments. The values are machine constants and are
/// written exactly as listed in [`ModeProfile::for_mode`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeProfile {
    /// Profile segments in wire order
    pub segments: [ForceSegment; 4],
}

impl ModeProfile {
    /// Profile table entry for a program mode
    #[must_use]
    pub const fn for_mode(mode: ProgramMode) -> Self {
        let segments = match mode {
            ProgramMode::OldSchool => [
                seg(0, 20, 3.0),
                seg(75, 600, 50.0),
                seg(-1300, -1200, 100.0),
                seg(-260, -110, 0.0),
            ],
            ProgramMode::Pump => [
                seg(50, 450, 10.0),
                seg(500, 600, 50.0),
                seg(-700, -550, 1.0),
                seg(-100, -50, 1.0),
            ],
            ProgramMode::Tut => [
                seg(250, 250, 20.0),
                seg(500, 600, 50.0),
                seg(-1300, -1200, 100.0),
                seg(-260, -110, 0.0),
            ],
            ProgramMode::TutBeast => [
                seg(150, 250, 20.0),
                seg(500, 600, 50.0),
                seg(-1300, -1200, 100.0),
                seg(-260, -110, 0.0),
            ],
            ProgramMode::EccentricOnly => [
                seg(50, 550, 50.0),
                seg(650, 750, 10.0),
                seg(-1300, -1200, 100.0),
                seg(-260, -110, 0.0),
            ],
        };
        Self { segments }
    }

    /// Look a profile block back up in the table
    #[must_use]
    pub fn mode(&self) -> Option<ProgramMode> {
        ProgramMode::ALL
            .into_iter()
            .find(|mode| Self::for_mode(*mode) == *self)
    }

    fn write(&self, buf: &mut BytesMut) {
        for segment in &self.segments {
            buf.put_i16_le(segment.start);
            buf.put_i16_le(segment.end);
            buf.put_f32_le(segment.rate);
        }
    }

    fn read(mut buf: &[u8]) -> Self {
        let mut segments = [seg(0, 0, 0.0); 4];
        for segment in &mut segments {
            segment.start = buf.get_i16_le();
            segment.end = buf.get_i16_le();
            segment.rate = buf.get_f32_le();
        }
        Self { segments }
    }
}

/// Rep count as carried on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepTarget {
    /// Fixed number of reps
    Count(u8),
    /// No target (`0xFF`)
    Unlimited,
}

impl RepTarget {
    /// Clamp a count into the representable range, keeping `0xFF` for the sentinel
    #[must_use]
    pub fn clamped(count: u32) -> Self {
        Self::Count(u8::try_from(count.min(u32::from(UNLIMITED_REPS - 1))).unwrap_or(0xFE))
    }

    const fn to_byte(self) -> u8 {
        match self {
            Self::Count(count) => count,
            Self::Unlimited => UNLIMITED_REPS,
        }
    }

    const fn from_byte(value: u8) -> Self {
        if value == UNLIMITED_REPS {
            Self::Unlimited
        } else {
            Self::Count(value)
        }
    }
}

/// Echo mode parameters written to the ECHO frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EchoParams {
    /// Eccentric load percentage
    pub eccentric_pct: i16,
    /// Concentric load percentage
    pub concentric_pct: i16,
    /// Smoothing factor
    pub smoothing: f32,
    /// Gain
    pub gain: f32,
    /// Load cap
    pub cap: f32,
    /// Load floor
    pub floor: f32,
    /// Negative limit
    pub negative_limit: f32,
}

impl EchoParams {
    /// Parameters for an intensity level
    #[must_use]
    pub fn for_level(level: EchoLevel, eccentric_pct: u16) -> Self {
        let (gain, cap) = match level {
            EchoLevel::Hard => (1.0, 50.0),
            EchoLevel::Harder => (1.25, 40.0),
            EchoLevel::Hardest => (1.667, 30.0),
            EchoLevel::Epic => (3.333, 15.0),
        };

        Self {
            eccentric_pct: i16::try_from(eccentric_pct).unwrap_or(i16::MAX),
            concentric_pct: 50,
            smoothing: 0.1,
            gain,
            cap,
            floor: 0.0,
            negative_limit: -100.0,
        }
    }

    /// Intensity level whose gain/cap pair matches these parameters
    #[must_use]
    pub fn level(&self) -> Option<EchoLevel> {
        [
            EchoLevel::Hard,
            EchoLevel::Harder,
            EchoLevel::Hardest,
            EchoLevel::Epic,
        ]
        .into_iter()
        .find(|level| {
            let reference = Self::for_level(*level, 0);
            reference.gain.to_bits() == self.gain.to_bits()
                && reference.cap.to_bits() == self.cap.to_bits()
        })
    }
}

/// Decoded PROGRAM frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgramFrame {
    /// Total reps (warm-up + working)
    pub reps: RepTarget,
    /// Profile block
    pub profile: ModeProfile,
    /// Mode whose profile matches the block, if any
    pub mode: Option<ProgramMode>,
    /// Weight plus the fixed offset (kg)
    pub effective_weight_kg: f32,
    /// Weight per cable after progression adjustment (kg)
    pub weight_per_cable_kg: f32,
    /// Progression/regression delta (kg)
    pub progression_kg: f32,
}

/// Decoded ECHO frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EchoFrame {
    /// Warm-up reps
    pub warmup_reps: u8,
    /// Working reps
    pub reps: RepTarget,
    /// Echo parameters
    pub params: EchoParams,
}

/// Any outgoing frame, decoded
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// INIT/RESET
    Init,
    /// START
    Start,
    /// Primary STOP
    Stop,
    /// Soft-stop / clear fault
    OfficialStop,
    /// PROGRAM configuration
    Program(ProgramFrame),
    /// ECHO configuration
    Echo(EchoFrame),
    /// LED colour scheme
    ColorScheme(ColorScheme),
}

/// Encode INIT/RESET
#[must_use]
pub fn encode_init() -> Bytes {
    Bytes::from_static(&INIT_FRAME)
}

/// Encode START
#[must_use]
pub fn encode_start() -> Bytes {
    Bytes::from_static(&START_FRAME)
}

/// Encode the primary STOP
#[must_use]
pub fn encode_stop() -> Bytes {
    Bytes::from_static(&STOP_FRAME)
}

/// Encode the soft-stop that also clears a fault
#[must_use]
pub fn encode_official_stop() -> Bytes {
    Bytes::from_static(&OFFICIAL_STOP_FRAME)
}

/// Encode the configuration frame matching the workout mode
#[must_use]
pub fn encode_workout_config(params: &WorkoutParameters) -> Bytes {
    match params.mode {
        WorkoutMode::Program(mode) => encode_program(mode, params),
        WorkoutMode::Echo {
            level,
            eccentric_pct,
        } => encode_echo(level, eccentric_pct, params),
    }
}

/// Encode a PROGRAM frame
///
/// Layout:
/// - `0x00`: command id (u32)
/// - `0x04`: warm-up + working reps, or `0xFF` for just-lift/AMRAP
/// - `0x05..0x30`: fixed header
/// - `0x30..0x50`: mode profile
/// - `0x54`: effective weight (weight + 10 kg, f32)
/// - `0x58`: weight per cable (f32)
/// - `0x5C`: progression delta (f32)
///
/// When a progression offset is active the weight written is the configured
/// weight minus the offset, so the first rep starts at the base load.
#[must_use]
pub fn encode_program(mode: ProgramMode, params: &WorkoutParameters) -> Bytes {
    let mut buf = BytesMut::with_capacity(PROGRAM_FRAME_LEN);

    buf.put_u32_le(u32::from(CommandId::Program as u8));
    buf.put_u8(reps_byte(
        u32::from(params.warmup_reps) + u32::from(params.reps),
        params,
    ));
    buf.extend_from_slice(&PROGRAM_HEADER);

    ModeProfile::for_mode(mode).write(&mut buf);

    buf.put_bytes(0, WEIGHT_OFFSET - buf.len());

    let weight = if params.progression_kg == 0.0 {
        params.weight_per_cable_kg
    } else {
        params.weight_per_cable_kg - params.progression_kg
    };
    buf.put_f32_le(weight + EFFECTIVE_WEIGHT_OFFSET_KG);
    buf.put_f32_le(weight);
    buf.put_f32_le(params.progression_kg);

    buf.freeze()
}

/// Encode an ECHO frame
#[must_use]
pub fn encode_echo(level: EchoLevel, eccentric_pct: u16, params: &WorkoutParameters) -> Bytes {
    let echo = EchoParams::for_level(level, eccentric_pct);
    let mut buf = BytesMut::with_capacity(ECHO_FRAME_LEN);

    buf.put_u32_le(u32::from(CommandId::Echo as u8));
    buf.put_u8(params.warmup_reps);
    buf.put_u8(reps_byte(u32::from(params.reps), params));
    buf.put_u16_le(0);
    buf.put_i16_le(echo.eccentric_pct);
    buf.put_i16_le(echo.concentric_pct);
    buf.put_f32_le(echo.smoothing);
    buf.put_f32_le(echo.gain);
    buf.put_f32_le(echo.cap);
    buf.put_f32_le(echo.floor);
    buf.put_f32_le(echo.negative_limit);

    buf.freeze()
}

/// Encode a COLOR SCHEME frame
#[must_use]
pub fn encode_color_scheme(scheme: &ColorScheme) -> Bytes {
    let mut buf = BytesMut::with_capacity(COLOR_FRAME_LEN);

    buf.put_u32_le(u32::from(CommandId::ColorScheme as u8));
    buf.put_u32_le(0);
    buf.put_u32_le(0);
    buf.put_f32_le(scheme.brightness);
    for group in &scheme.colors {
        for color in group {
            buf.put_u8(color.r);
            buf.put_u8(color.g);
            buf.put_u8(color.b);
        }
    }

    buf.freeze()
}

fn reps_byte(count: u32, params: &WorkoutParameters) -> u8 {
    if params.is_unlimited() {
        RepTarget::Unlimited.to_byte()
    } else {
        RepTarget::clamped(count).to_byte()
    }
}

/// Decode any outgoing frame
///
/// # Errors
///
/// Returns [`DecodeError::WrongLength`] if the length matches no frame and
/// [`DecodeError::UnknownCommand`] if the id does not match the length.
pub fn decode_command(data: &[u8]) -> Result<Command, DecodeError> {
    match data.len() {
        2 => {
            if data == OFFICIAL_STOP_FRAME {
                Ok(Command::OfficialStop)
            } else {
                Err(DecodeError::UnknownCommand(u32::from(data[0])))
            }
        }
        4 => {
            let id = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
            match CommandId::from_u32(id) {
                Some(CommandId::Init) => Ok(Command::Init),
                Some(CommandId::Start) => Ok(Command::Start),
                Some(CommandId::Stop) => Ok(Command::Stop),
                _ => Err(DecodeError::UnknownCommand(id)),
            }
        }
        PROGRAM_FRAME_LEN => decode_program(data).map(Command::Program),
        ECHO_FRAME_LEN => decode_echo(data).map(Command::Echo),
        COLOR_FRAME_LEN => decode_color_scheme(data).map(Command::ColorScheme),
        actual => Err(DecodeError::WrongLength {
            frame: "command",
            expected: "2, 4, 32, 34 or 96",
            actual,
        }),
    }
}

fn expect_id(buf: &mut &[u8], id: CommandId) -> Result<(), DecodeError> {
    let value = buf.get_u32_le();
    if value == u32::from(id as u8) {
        Ok(())
    } else {
        Err(DecodeError::UnknownCommand(value))
    }
}

/// Decode a PROGRAM frame
///
/// # Errors
///
/// Returns [`DecodeError::WrongLength`] or [`DecodeError::UnknownCommand`].
pub fn decode_program(data: &[u8]) -> Result<ProgramFrame, DecodeError> {
    if data.len() != PROGRAM_FRAME_LEN {
        return Err(DecodeError::WrongLength {
            frame: "program",
            expected: "96",
            actual: data.len(),
        });
    }

    let mut buf = data;
    expect_id(&mut buf, CommandId::Program)?;
    let reps = RepTarget::from_byte(buf.get_u8());

    let profile = ModeProfile::read(&data[PROFILE_OFFSET..PROFILE_OFFSET + PROFILE_LEN]);

    let mut weights = &data[WEIGHT_OFFSET..];
    let effective_weight_kg = weights.get_f32_le();
    let weight_per_cable_kg = weights.get_f32_le();
    let progression_kg = weights.get_f32_le();

    Ok(ProgramFrame {
        reps,
        profile,
        mode: profile.mode(),
        effective_weight_kg,
        weight_per_cable_kg,
        progression_kg,
    })
}

/// Decode an ECHO frame
///
/// # Errors
///
/// Returns [`DecodeError::WrongLength`] or [`DecodeError::UnknownCommand`].
pub fn decode_echo(data: &[u8]) -> Result<EchoFrame, DecodeError> {
    if data.len() != ECHO_FRAME_LEN {
        return Err(DecodeError::WrongLength {
            frame: "echo",
            expected: "32",
            actual: data.len(),
        });
    }

    let mut buf = data;
    expect_id(&mut buf, CommandId::Echo)?;
    let warmup_reps = buf.get_u8();
    let reps = RepTarget::from_byte(buf.get_u8());
    buf.advance(2);

    let params = EchoParams {
        eccentric_pct: buf.get_i16_le(),
        concentric_pct: buf.get_i16_le(),
        smoothing: buf.get_f32_le(),
        gain: buf.get_f32_le(),
        cap: buf.get_f32_le(),
        floor: buf.get_f32_le(),
        negative_limit: buf.get_f32_le(),
    };

    Ok(EchoFrame {
        warmup_reps,
        reps,
        params,
    })
}

/// Decode a COLOR SCHEME frame
///
/// # Errors
///
/// Returns [`DecodeError::WrongLength`] or [`DecodeError::UnknownCommand`].
pub fn decode_color_scheme(data: &[u8]) -> Result<ColorScheme, DecodeError> {
    if data.len() != COLOR_FRAME_LEN {
        return Err(DecodeError::WrongLength {
            frame: "color scheme",
            expected: "34",
            actual: data.len(),
        });
    }

    let mut buf = data;
    expect_id(&mut buf, CommandId::ColorScheme)?;
    buf.advance(8);
    let brightness = buf.get_f32_le();

    let mut colors = [[Rgb::default(); 3]; 2];
    for group in &mut colors {
        for color in group.iter_mut() {
            *color = Rgb::new(buf.get_u8(), buf.get_u8(), buf.get_u8());
        }
    }

    Ok(ColorScheme { brightness, colors })
}

/// Positions travel as signed tenths of a millimetre; negatives read as zero.
fn position_mm(raw: i16) -> f32 {
    (f32::from(raw) / 10.0).max(0.0)
}

fn position_raw(mm: f32) -> i16 {
    #[allow(clippy::cast_possible_truncation)]
    let raw = (mm * 10.0).round().clamp(0.0, f32::from(i16::MAX)) as i16;
    raw
}

fn load_raw(kg: f32) -> u16 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let raw = (kg * 100.0).round().clamp(0.0, f32::from(u16::MAX)) as u16;
    raw
}

/// Decode a monitor (telemetry) frame
///
/// Layout:
/// - `0x00`: ticks (u32)
/// - `0x04`: position A, 0.1 mm (i16)
/// - `0x08`: load A, 0.01 kg (u16)
/// - `0x0A`: position B, 0.1 mm (i16)
/// - `0x0E`: load B, 0.01 kg (u16)
/// - `0x10`: status bitmask (u16, 18-byte frames only)
///
/// Velocities are not on the wire; they are left at zero here and derived
/// from consecutive samples with [`TelemetrySample::with_velocity_from`].
///
/// # Errors
///
/// Returns [`DecodeError::WrongLength`] for anything but 16 or 18 bytes.
pub fn decode_telemetry(data: &[u8], timestamp_ms: u64) -> Result<TelemetrySample, DecodeError> {
    if data.len() != MONITOR_FRAME_LEN && data.len() != MONITOR_FRAME_LEGACY_LEN {
        return Err(DecodeError::WrongLength {
            frame: "monitor",
            expected: "16 or 18",
            actual: data.len(),
        });
    }

    let mut buf = data;
    let ticks = buf.get_u32_le();
    let position_a = position_mm(buf.get_i16_le());
    buf.advance(2);
    let load_a = f32::from(buf.get_u16_le()) / 100.0;
    let position_b = position_mm(buf.get_i16_le());
    buf.advance(2);
    let load_b = f32::from(buf.get_u16_le()) / 100.0;
    let status = if buf.remaining() >= 2 {
        StatusFlags(buf.get_u16_le())
    } else {
        StatusFlags::default()
    };

    Ok(TelemetrySample {
        timestamp_ms,
        ticks,
        position_a,
        position_b,
        load_a,
        load_b,
        velocity_a: 0.0,
        velocity_b: 0.0,
        status,
    })
}

/// Encode a monitor frame, as the trainer would send it
///
/// Used by simulators and replay tooling.
#[must_use]
pub fn encode_telemetry(sample: &TelemetrySample) -> Bytes {
    let mut buf = BytesMut::with_capacity(MONITOR_FRAME_LEN);
    buf.put_u32_le(sample.ticks);
    buf.put_i16_le(position_raw(sample.position_a));
    buf.put_u16_le(0);
    buf.put_u16_le(load_raw(sample.load_a));
    buf.put_i16_le(position_raw(sample.position_b));
    buf.put_u16_le(0);
    buf.put_u16_le(load_raw(sample.load_b));
    buf.put_u16_le(sample.status.0);
    buf.freeze()
}

/// Decode a rep notification
///
/// A 6-byte frame is the legacy format (`up`, `down`, one position). A 24-byte
/// frame is the modern format with explicit warm-up and working counters.
///
/// # Errors
///
/// Returns [`DecodeError::WrongLength`] for any other length.
pub fn decode_rep_notification(data: &[u8]) -> Result<RepNotification, DecodeError> {
    let mut buf = data;
    match data.len() {
        REPS_LEGACY_LEN => Ok(RepNotification {
            up: buf.get_u16_le(),
            down: buf.get_u16_le(),
            position_a: position_mm(buf.get_i16_le()),
            position_b: None,
            machine: None,
        }),
        REPS_MODERN_LEN => {
            let up = buf.get_u16_le();
            let down = buf.get_u16_le();
            let position_a = position_mm(buf.get_i16_le());
            let position_b = Some(position_mm(buf.get_i16_le()));
            let range_top = buf.get_f32_le();
            let range_bottom = buf.get_f32_le();
            let machine = MachineRepCounters {
                warmup_count: buf.get_u16_le(),
                warmup_target: buf.get_u16_le(),
                working_count: buf.get_u16_le(),
                working_target: buf.get_u16_le(),
                range_top,
                range_bottom,
            };

            Ok(RepNotification {
                up,
                down,
                position_a,
                position_b,
                machine: Some(machine),
            })
        }
        actual => Err(DecodeError::WrongLength {
            frame: "reps",
            expected: "6 or 24",
            actual,
        }),
    }
}

/// Encode a rep notification, as the trainer would send it
///
/// Used by simulators and replay tooling.
#[must_use]
pub fn encode_rep_notification(notification: &RepNotification) -> Bytes {
    let mut buf = BytesMut::with_capacity(REPS_MODERN_LEN);
    buf.put_u16_le(notification.up);
    buf.put_u16_le(notification.down);
    buf.put_i16_le(position_raw(notification.position_a));

    if let Some(machine) = notification.machine {
        buf.put_i16_le(position_raw(notification.position_b.unwrap_or(0.0)));
        buf.put_f32_le(machine.range_top);
        buf.put_f32_le(machine.range_bottom);
        buf.put_u16_le(machine.warmup_count);
        buf.put_u16_le(machine.warmup_target);
        buf.put_u16_le(machine.working_count);
        buf.put_u16_le(machine.working_target);
    }

    buf.freeze()
}

/// A decoded notification, routed by characteristic
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Notification {
    /// Monitor characteristic sample
    Telemetry(TelemetrySample),
    /// Reps characteristic notification
    Reps(RepNotification),
}

impl Notification {
    /// Decode bytes received on `characteristic`
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnknownCharacteristic`] for characteristics that
    /// carry neither telemetry nor rep notifications, or the decoder's error.
    pub fn decode(
        characteristic: Uuid,
        data: &[u8],
        timestamp_ms: u64,
    ) -> Result<Self, DecodeError> {
        if characteristic == MONITOR_CHAR_UUID {
            decode_telemetry(data, timestamp_ms).map(Self::Telemetry)
        } else if characteristic == REPS_CHAR_UUID {
            decode_rep_notification(data).map(Self::Reps)
        } else {
            Err(DecodeError::UnknownCharacteristic(characteristic))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counted(reps: u8, warmup_reps: u8) -> WorkoutParameters {
        WorkoutParameters {
            reps,
            warmup_reps,
            weight_per_cable_kg: 22.5,
            ..Default::default()
        }
    }

    #[test]
    fn test_control_frames() {
        assert_eq!(&encode_init()[..], &[0x0A, 0, 0, 0]);
        assert_eq!(&encode_start()[..], &[0x03, 0, 0, 0]);
        assert_eq!(&encode_stop()[..], &[0x05, 0, 0, 0]);
        assert_eq!(&encode_official_stop()[..], &[0x50, 0x00]);

        assert_eq!(decode_command(&encode_init()), Ok(Command::Init));
        assert_eq!(decode_command(&encode_start()), Ok(Command::Start));
        assert_eq!(decode_command(&encode_stop()), Ok(Command::Stop));
        assert_eq!(
            decode_command(&encode_official_stop()),
            Ok(Command::OfficialStop)
        );
    }

    #[test]
    fn test_program_frame_layout() {
        let frame = encode_program(ProgramMode::OldSchool, &counted(10, 3));

        assert_eq!(frame.len(), PROGRAM_FRAME_LEN);
        assert_eq!(&frame[0..4], &[0x04, 0, 0, 0]);
        assert_eq!(frame[0x04], 13);
        assert_eq!(&frame[0x14..0x1C], &[0xFA, 0x00, 0xFA, 0x00, 0xC8, 0x00, 0x1E, 0x00]);
        assert_eq!(&frame[0x08..0x0C], &5.0f32.to_le_bytes());

        // First profile segment of Old School: 0, 20, 3.0
        assert_eq!(&frame[0x30..0x32], &0i16.to_le_bytes());
        assert_eq!(&frame[0x32..0x34], &20i16.to_le_bytes());
        assert_eq!(&frame[0x34..0x38], &3.0f32.to_le_bytes());
        // Third segment starts at 0x40: -1300
        assert_eq!(&frame[0x40..0x42], &(-1300i16).to_le_bytes());

        assert_eq!(&frame[0x54..0x58], &32.5f32.to_le_bytes());
        assert_eq!(&frame[0x58..0x5C], &22.5f32.to_le_bytes());
        assert_eq!(&frame[0x5C..0x60], &0.0f32.to_le_bytes());
    }

    #[test]
    fn test_program_frame_round_trip() {
        for mode in ProgramMode::ALL {
            let params = counted(8, 2);
            let decoded = decode_program(&encode_program(mode, &params)).unwrap();

            assert_eq!(decoded.reps, RepTarget::Count(10));
            assert_eq!(decoded.mode, Some(mode));
            assert_eq!(decoded.profile, ModeProfile::for_mode(mode));
            assert!((decoded.weight_per_cable_kg - 22.5).abs() < f32::EPSILON);
            assert!((decoded.effective_weight_kg - 32.5).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn test_program_frame_progression_offset() {
        let params = WorkoutParameters {
            weight_per_cable_kg: 20.0,
            progression_kg: 2.5,
            ..Default::default()
        };
        let decoded = decode_program(&encode_program(ProgramMode::Pump, &params)).unwrap();

        assert!((decoded.weight_per_cable_kg - 17.5).abs() < f32::EPSILON);
        assert!((decoded.effective_weight_kg - 27.5).abs() < f32::EPSILON);
        assert!((decoded.progression_kg - 2.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_unlimited_reps_sentinel() {
        let just_lift = WorkoutParameters {
            is_just_lift: true,
            ..Default::default()
        };
        let amrap = WorkoutParameters {
            is_amrap: true,
            ..Default::default()
        };

        assert_eq!(encode_program(ProgramMode::OldSchool, &just_lift)[0x04], 0xFF);
        assert_eq!(encode_program(ProgramMode::OldSchool, &amrap)[0x04], 0xFF);
        assert_eq!(encode_echo(EchoLevel::Hard, 75, &amrap)[0x05], 0xFF);

        let decoded = decode_program(&encode_program(ProgramMode::OldSchool, &amrap)).unwrap();
        assert_eq!(decoded.reps, RepTarget::Unlimited);
    }

    #[test]
    fn test_rep_count_clamped_below_sentinel() {
        let frame = encode_program(ProgramMode::Tut, &counted(250, 10));
        assert_eq!(frame[0x04], 0xFE);
    }

    #[test]
    fn test_echo_frame_round_trip() {
        let params = counted(12, 3);
        let frame = encode_echo(EchoLevel::Hardest, 120, &params);
        assert_eq!(frame.len(), ECHO_FRAME_LEN);
        assert_eq!(&frame[0..4], &[0x4E, 0, 0, 0]);
        assert_eq!(frame[0x04], 3);
        assert_eq!(frame[0x05], 12);

        let decoded = decode_echo(&frame).unwrap();
        assert_eq!(decoded.warmup_reps, 3);
        assert_eq!(decoded.reps, RepTarget::Count(12));
        assert_eq!(decoded.params, EchoParams::for_level(EchoLevel::Hardest, 120));
        assert_eq!(decoded.params.level(), Some(EchoLevel::Hardest));
    }

    #[test]
    fn test_echo_level_table() {
        let epic = EchoParams::for_level(EchoLevel::Epic, 75);
        assert!((epic.gain - 3.333).abs() < f32::EPSILON);
        assert!((epic.cap - 15.0).abs() < f32::EPSILON);
        assert_eq!(epic.concentric_pct, 50);
        assert!((epic.negative_limit + 100.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_color_scheme_round_trip() {
        let frame = encode_color_scheme(&ColorScheme::GREEN);
        assert_eq!(frame.len(), COLOR_FRAME_LEN);
        assert_eq!(&frame[0..4], &[0x11, 0, 0, 0]);

        assert_eq!(
            decode_command(&frame),
            Ok(Command::ColorScheme(ColorScheme::GREEN))
        );
    }

    #[test]
    fn test_workout_config_dispatch() {
        let echo = WorkoutParameters {
            mode: WorkoutMode::Echo {
                level: EchoLevel::Harder,
                eccentric_pct: 100,
            },
            ..Default::default()
        };
        assert_eq!(encode_workout_config(&echo).len(), ECHO_FRAME_LEN);
        assert_eq!(
            encode_workout_config(&WorkoutParameters::default()).len(),
            PROGRAM_FRAME_LEN
        );
    }

    #[test]
    fn test_decode_command_errors() {
        assert!(matches!(
            decode_command(&[0x03, 0x00, 0x00]),
            Err(DecodeError::WrongLength { actual: 3, .. })
        ));
        assert_eq!(
            decode_command(&[0x77, 0, 0, 0]),
            Err(DecodeError::UnknownCommand(0x77))
        );

        let mut frame = encode_program(ProgramMode::Pump, &counted(5, 0)).to_vec();
        frame[0] = 0x09;
        assert_eq!(decode_program(&frame), Err(DecodeError::UnknownCommand(0x09)));
    }

    #[test]
    fn test_unknown_profile_passes_through() {
        let mut frame = encode_program(ProgramMode::Pump, &counted(5, 0)).to_vec();
        frame[0x30] = 0x7F;

        let decoded = decode_program(&frame).unwrap();
        assert_eq!(decoded.mode, None);
        assert_eq!(decoded.profile.segments[0].start, 0x7F);
    }

    #[test]
    fn test_decode_telemetry() {
        let mut frame = BytesMut::new();
        frame.put_u32_le(1234);
        frame.put_i16_le(1505); // 150.5 mm
        frame.put_u16_le(0);
        frame.put_u16_le(2250); // 22.5 kg
        frame.put_i16_le(-20); // below zero reads as zero
        frame.put_u16_le(0);
        frame.put_u16_le(1000);
        frame.put_u16_le(StatusFlags::DELOAD_WARNING | 0x4000);

        let sample = decode_telemetry(&frame, 99).unwrap();
        assert_eq!(sample.ticks, 1234);
        assert_eq!(sample.timestamp_ms, 99);
        assert!((sample.position_a - 150.5).abs() < 0.001);
        assert!(sample.position_b.abs() < f32::EPSILON);
        assert!((sample.load_a - 22.5).abs() < 0.001);
        assert!((sample.load_b - 10.0).abs() < 0.001);
        assert!(sample.status.deload_warning());
        assert_eq!(sample.status.0 & 0x4000, 0x4000);
        assert!(sample.velocity_a.abs() < f32::EPSILON);

        let legacy = decode_telemetry(&frame[..MONITOR_FRAME_LEGACY_LEN], 0).unwrap();
        assert_eq!(legacy.status, StatusFlags::default());

        assert!(matches!(
            decode_telemetry(&frame[..10], 0),
            Err(DecodeError::WrongLength { actual: 10, .. })
        ));
    }

    #[test]
    fn test_decode_rep_notifications() {
        let legacy = decode_rep_notification(&[0x05, 0x00, 0x04, 0x00, 0xE8, 0x03]).unwrap();
        assert!(legacy.is_legacy_format());
        assert_eq!(legacy.up, 5);
        assert_eq!(legacy.down, 4);
        assert!((legacy.position_a - 100.0).abs() < f32::EPSILON);

        let modern = RepNotification {
            up: 0xFFFF,
            down: 0xFFFE,
            position_a: 420.0,
            position_b: Some(415.5),
            machine: Some(MachineRepCounters {
                warmup_count: 3,
                warmup_target: 3,
                working_count: 7,
                working_target: 10,
                range_top: 600.0,
                range_bottom: 80.0,
            }),
        };
        let frame = encode_rep_notification(&modern);
        assert_eq!(frame.len(), REPS_MODERN_LEN);
        assert_eq!(decode_rep_notification(&frame), Ok(modern));

        assert!(matches!(
            decode_rep_notification(&[0; 10]),
            Err(DecodeError::WrongLength { actual: 10, .. })
        ));
    }

    #[test]
    fn test_telemetry_frame_round_trip() {
        let sample = TelemetrySample {
            timestamp_ms: 42,
            ticks: 9_001,
            position_a: 150.5,
            position_b: 98.0,
            load_a: 22.5,
            load_b: 10.0,
            velocity_a: 0.0,
            velocity_b: 0.0,
            status: StatusFlags(StatusFlags::DELOAD_OCCURRED),
        };

        let frame = encode_telemetry(&sample);
        assert_eq!(frame.len(), MONITOR_FRAME_LEN);
        assert_eq!(decode_telemetry(&frame, 42), Ok(sample));
    }

    #[test]
    fn test_legacy_rep_frame_round_trip() {
        let legacy = RepNotification {
            up: 5,
            down: 4,
            position_a: 100.0,
            position_b: None,
            machine: None,
        };

        let frame = encode_rep_notification(&legacy);
        assert_eq!(frame.len(), REPS_LEGACY_LEN);
        assert_eq!(frame.as_ref(), &[0x05, 0x00, 0x04, 0x00, 0xE8, 0x03]);
        assert_eq!(decode_rep_notification(&frame), Ok(legacy));
    }

    #[test]
    fn test_notification_routing() {
        let frame = [0x01, 0x00, 0x01, 0x00, 0x00, 0x00];
        assert!(matches!(
            Notification::decode(REPS_CHAR_UUID, &frame, 0),
            Ok(Notification::Reps(_))
        ));
        assert!(matches!(
            Notification::decode(crate::COMMAND_CHAR_UUID, &frame, 0),
            Err(DecodeError::UnknownCharacteristic(_))
        ));
    }
}
