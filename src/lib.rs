#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

//! # Vitruvian Link
//!
//! Real-time control core for Vitruvian cable trainers.
//!
//! The trainer talks over Bluetooth Low Energy using a small set of fixed-size,
//! little-endian binary frames. This crate sits between the raw notification
//! bytes and the rest of an application:
//!
//! - **Frame codec** ([`protocol`]): encode command/configuration frames, decode
//!   monitor (telemetry) and rep notifications in both the legacy 6-byte and the
//!   modern 24-byte layout
//! - **Rep counting** ([`rep_counter`]): reconcile 16-bit wrapping machine counters
//!   into warm-up and working reps, track movement phase and calibrate range of motion
//! - **Handle detection** ([`handle`]): rest / released / grabbed detection with a
//!   rest-timeout escape and a debounced enable
//! - **Hands-free start** ([`auto_start`]): countdown with a generation-token guard
//!   so a stale countdown never issues START
//! - **Hands-free stop** ([`auto_stop`]): stall and range-edge detection
//!
//! The radio stack is not part of this crate. With the default `tokio` feature,
//! [`session::TrainerSession`] drives all components from a notification stream
//! and writes frames through a caller-supplied [`session::Transport`].
//!
//! ## Safety Warning
//!
//! ⚠️ **Important**: This library drives physical exercise equipment under load.
//! Automatic start and stop are conveniences, not safety systems. Always keep the
//! machine's own deload and stop mechanisms available to the user.
//!
//! ## Quick Start
//!
//! ```
//! use vitruvian_link::protocol::{decode_rep_notification, encode_workout_config};
//! use vitruvian_link::rep_counter::RepCounter;
//! use vitruvian_link::WorkoutParameters;
//!
//! let params = WorkoutParameters::default();
//! let frame = encode_workout_config(&params);
//! assert_eq!(frame.len(), 96);
//!
//! let mut counter = RepCounter::new();
//! counter.configure_from(&params);
//!
//! let notification = decode_rep_notification(&[0x01, 0x00, 0x00, 0x00, 0xE8, 0x03])?;
//! let events = counter.process(&notification, 100.0, 100.0);
//! assert!(events.is_empty()); // first notification only sets the counter baseline
//! # Ok::<(), vitruvian_link::DecodeError>(())
//! ```

use uuid::Uuid;

/// Hands-free start controller
pub mod auto_start;
/// Hands-free stop controller
pub mod auto_stop;
/// Error types and handling
pub mod error;
/// Handle rest/grab detection
pub mod handle;
/// Wire frame encoding and decoding
pub mod protocol;
/// Rep counting and range-of-motion calibration
pub mod rep_counter;
/// Session driver tying the components to a transport
#[cfg(feature = "tokio")]
pub mod session;
/// Type definitions and data structures
pub mod types;

pub use error::{DecodeError, Result, TrainerError};
pub use types::{
    AutoStartConfig, AutoStopConfig, CableRange, ColorScheme, ControllerConfig, EchoLevel,
    HandleConfig, HandleState, ProgramMode, RepCount, RepCounterConfig, RepEvent,
    RepNotification, RepPhase, RepRanges, StatusFlags, TelemetrySample, WorkoutMode,
    WorkoutParameters,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Trainer GATT service (Nordic UART Service)
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x6e40_0001_b5a3_f393_e0a9_e50e_24dc_ca9e);

/// Characteristic the app writes command frames to
pub const COMMAND_CHAR_UUID: Uuid = Uuid::from_u128(0x6e40_0002_b5a3_f393_e0a9_e50e_24dc_ca9e);

/// Characteristic carrying monitor (telemetry) frames
pub const MONITOR_CHAR_UUID: Uuid = Uuid::from_u128(0x90e9_91a6_c548_44ed_969b_eb54_1014_eae3);

/// Characteristic carrying rep notifications
pub const REPS_CHAR_UUID: Uuid = Uuid::from_u128(0x8308_f2a6_0875_4a94_a86f_5c5c_5e1b_068a);
