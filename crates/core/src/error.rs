//! Error types for the AVDECC entity library.

use std::fmt;

use crate::codec::header::CONTROL_DATA_LENGTH_MAX;

/// Errors that can occur in the AVDECC entity library.
///
/// These are local failures. Protocol outcomes that are owed to a peer
/// (`NOT_IMPLEMENTED`, `LISTENER_EXCLUSIVE`, ...) are status codes carried in
/// the response PDU and never show up here.
///
/// - **Codec**: [`Codec`](Self::Codec) for short buffers, foreign subtypes and
///   oversized PDUs.
/// - **Transport**: [`Io`](Self::Io), [`SendFailed`](Self::SendFailed),
///   [`NoInterfaces`](Self::NoInterfaces).
/// - **Entity model**: [`UnknownDescriptor`](Self::UnknownDescriptor),
///   [`Config`](Self::Config).
/// - **Station**: [`NotStarted`](Self::NotStarted),
///   [`AlreadyRunning`](Self::AlreadyRunning).
#[derive(Debug, thiserror::Error)]
pub enum AvdeccError {
    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A PDU could not be encoded into or decoded from a byte buffer.
    #[error("codec error: {kind}")]
    Codec { kind: CodecErrorKind },

    /// No descriptor builder is registered for this descriptor type.
    #[error("no descriptor registered for type {0:#06x}")]
    UnknownDescriptor(u16),

    /// The descriptor configuration file could not be parsed.
    #[error("invalid descriptor configuration: {0}")]
    Config(#[from] serde_yaml::Error),

    /// The transport refused or failed to put a frame on the wire.
    #[error("failed to send frame: {0}")]
    SendFailed(String),

    /// A send was attempted with no interface attached.
    #[error("no network interface available")]
    NoInterfaces,

    /// A MAC address string did not have the `aa:bb:cc:dd:ee:ff` form.
    #[error("invalid MAC address: {0}")]
    InvalidMacAddress(String),

    /// [`EndStation::start`](crate::EndStation::start) has not been called yet.
    #[error("station not started")]
    NotStarted,

    /// [`EndStation::start`](crate::EndStation::start) was called while already running.
    #[error("station already running")]
    AlreadyRunning,
}

/// Specific kind of codec failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecErrorKind {
    /// The buffer is shorter than the structure being read or written.
    BufferTooShort { needed: usize, available: usize },
    /// The AVTP subtype does not belong to the expected protocol.
    WrongSubtype { expected: u8, found: u8 },
    /// The message type is reserved or not defined for this protocol.
    UnknownMessageType(u8),
    /// More control data than the 11-bit `control_data_length` can carry.
    ControlDataTooLong(usize),
}

impl fmt::Display for CodecErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferTooShort { needed, available } => {
                write!(f, "buffer too short (needed {needed}, have {available})")
            }
            Self::WrongSubtype { expected, found } => {
                write!(f, "wrong subtype (expected {expected:#04x}, found {found:#04x})")
            }
            Self::UnknownMessageType(value) => write!(f, "unknown message type {value}"),
            Self::ControlDataTooLong(length) => {
                write!(f, "control data length {length} exceeds {CONTROL_DATA_LENGTH_MAX}")
            }
        }
    }
}

impl AvdeccError {
    pub(crate) fn control_data_too_long(length: usize) -> Self {
        Self::Codec {
            kind: CodecErrorKind::ControlDataTooLong(length),
        }
    }

    pub(crate) fn too_short(needed: usize, available: usize) -> Self {
        Self::Codec {
            kind: CodecErrorKind::BufferTooShort { needed, available },
        }
    }
}

/// Convenience alias for `Result<T, AvdeccError>`.
pub type Result<T> = std::result::Result<T, AvdeccError>;
