use thiserror::Error;

/// Errors produced while decoding frames received from (or destined for) the trainer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Frame length does not match any layout for this frame type
    #[error("{frame} frame has wrong length: {actual} bytes, expected {expected}")]
    WrongLength {
        /// Frame type being decoded
        frame: &'static str,
        /// Length(s) accepted for this frame type
        expected: &'static str,
        /// Length actually received
        actual: usize,
    },

    /// Leading command id is not one this codec knows
    #[error("Unrecognized command id: {0:#04X}")]
    UnknownCommand(u32),

    /// Notification arrived on a characteristic that carries no decodable frames
    #[error("Unknown notification characteristic: {0}")]
    UnknownCharacteristic(uuid::Uuid),
}

/// Errors that can occur when driving a trainer session
#[derive(Error, Debug)]
pub enum TrainerError {
    /// Frame decode failure
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The transport failed to deliver a frame to the trainer
    #[error("Failed to write frame: {0}")]
    WriteFailed(String),

    /// Transport is gone
    ///
    /// Returned by `Transport` implementations once the link has dropped.
    #[error("Trainer disconnected")]
    Disconnected,

    /// Invalid workout or command parameters
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// Operation requires configured workout parameters
    #[error("Workout not configured")]
    NotConfigured,

    /// Operation is not valid in the current session state
    #[error("Invalid session state: {state}")]
    InvalidState {
        /// Current state description
        state: String,
    },

    /// IO error
    ///
    /// For `Transport` implementations built on sockets, serial ports or
    /// replay files; `?` on an [`std::io::Error`] converts into this.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for trainer operations
pub type Result<T> = std::result::Result<T, TrainerError>;

impl TrainerError {
    /// Check if this error came from the transport rather than this crate's logic
    #[must_use]
    pub const fn is_transport_error(&self) -> bool {
        matches!(self, Self::WriteFailed(_) | Self::Disconnected | Self::Io(_))
    }

    /// Check if this error is recoverable by the caller without reconnecting
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Decode(_)
                | Self::InvalidParameters(_)
                | Self::NotConfigured
                | Self::InvalidState { .. }
        )
    }
}
