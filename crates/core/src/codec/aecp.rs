use std::fmt;

use super::header::{
    CONTROL_DATA_LENGTH_MAX, ControlHeader, HEADER_LEN, checked_control_data_length,
};
use super::{SUBTYPE_AECP, ensure_len, get_u16, get_u64, put_bytes, put_u16, put_u64};
use crate::error::{AvdeccError, CodecErrorKind, Result};

/// Length of the AECP common fields (header + controller id + sequence id).
pub const AECPDU_COMMON_LEN: usize = 22;

/// Length of an AEM AECPDU without command-specific payload.
pub const AEM_HEADER_LEN: usize = 24;

/// Largest command-specific payload an AEM AECPDU can carry.
pub const AEM_PAYLOAD_MAX: usize = CONTROL_DATA_LENGTH_MAX - (AEM_HEADER_LEN - HEADER_LEN);

const UNSOLICITED_BIT: u16 = 0x8000;

/// AECP message types handled by the entity model (IEEE 1722.1-2021 Table 9-1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AecpMessageType {
    AemCommand = 0,
    AemResponse = 1,
}

/// AEM status codes (IEEE 1722.1-2021 Table 7-156).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AemStatus(pub u8);

impl AemStatus {
    pub const SUCCESS: Self = Self(0);
    pub const NOT_IMPLEMENTED: Self = Self(1);
    pub const NO_SUCH_DESCRIPTOR: Self = Self(2);
    pub const ENTITY_LOCKED: Self = Self(3);
    pub const ENTITY_ACQUIRED: Self = Self(4);
    pub const NOT_AUTHENTICATED: Self = Self(5);
    pub const AUTHENTICATION_DISABLED: Self = Self(6);
    pub const BAD_ARGUMENTS: Self = Self(7);
    pub const NO_RESOURCES: Self = Self(8);
    pub const IN_PROGRESS: Self = Self(9);
    pub const ENTITY_MISBEHAVING: Self = Self(10);
    pub const NOT_SUPPORTED: Self = Self(11);
    pub const STREAM_IS_RUNNING: Self = Self(12);
}

impl fmt::Display for AemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.0 {
            0 => "SUCCESS",
            1 => "NOT_IMPLEMENTED",
            2 => "NO_SUCH_DESCRIPTOR",
            3 => "ENTITY_LOCKED",
            4 => "ENTITY_ACQUIRED",
            5 => "NOT_AUTHENTICATED",
            6 => "AUTHENTICATION_DISABLED",
            7 => "BAD_ARGUMENTS",
            8 => "NO_RESOURCES",
            9 => "IN_PROGRESS",
            10 => "ENTITY_MISBEHAVING",
            11 => "NOT_SUPPORTED",
            12 => "STREAM_IS_RUNNING",
            other => return write!(f, "RESERVED({other})"),
        };
        f.write_str(name)
    }
}

impl fmt::Debug for AemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// AEM command types (IEEE 1722.1-2021 Table 7-126). Only the ones the
/// entity model reacts to are named.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AemCommandType(pub u16);

impl AemCommandType {
    pub const ACQUIRE_ENTITY: Self = Self(0x0000);
    pub const LOCK_ENTITY: Self = Self(0x0001);
    pub const ENTITY_AVAILABLE: Self = Self(0x0002);
    pub const CONTROLLER_AVAILABLE: Self = Self(0x0003);
    pub const READ_DESCRIPTOR: Self = Self(0x0004);
    pub const WRITE_DESCRIPTOR: Self = Self(0x0005);
    pub const SET_CONFIGURATION: Self = Self(0x0006);
    pub const GET_CONFIGURATION: Self = Self(0x0007);
    pub const SET_STREAM_FORMAT: Self = Self(0x0008);
    pub const GET_STREAM_FORMAT: Self = Self(0x0009);
    pub const REGISTER_UNSOLICITED_NOTIFICATION: Self = Self(0x0024);
    pub const DEREGISTER_UNSOLICITED_NOTIFICATION: Self = Self(0x0025);
    pub const IDENTIFY_NOTIFICATION: Self = Self(0x0026);
    pub const GET_AVB_INFO: Self = Self(0x0027);
    pub const GET_AS_PATH: Self = Self(0x0028);
    pub const GET_COUNTERS: Self = Self(0x0029);
    pub const REBOOT: Self = Self(0x002A);
    pub const GET_AUDIO_MAP: Self = Self(0x002B);
}

impl fmt::Debug for AemCommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Self::ACQUIRE_ENTITY => "ACQUIRE_ENTITY",
            Self::LOCK_ENTITY => "LOCK_ENTITY",
            Self::ENTITY_AVAILABLE => "ENTITY_AVAILABLE",
            Self::CONTROLLER_AVAILABLE => "CONTROLLER_AVAILABLE",
            Self::READ_DESCRIPTOR => "READ_DESCRIPTOR",
            Self::REGISTER_UNSOLICITED_NOTIFICATION => "REGISTER_UNSOLICITED_NOTIFICATION",
            Self::DEREGISTER_UNSOLICITED_NOTIFICATION => "DEREGISTER_UNSOLICITED_NOTIFICATION",
            Self::GET_AVB_INFO => "GET_AVB_INFO",
            Self::GET_AS_PATH => "GET_AS_PATH",
            Self::GET_COUNTERS => "GET_COUNTERS",
            Self::GET_AUDIO_MAP => "GET_AUDIO_MAP",
            _ => return write!(f, "AemCommandType({:#06x})", self.0),
        };
        f.write_str(name)
    }
}

/// AECP PDU carrying an AEM command or response.
///
/// ```text
/// offset  field
///   0     common control header (target_entity_id at 4)
///  12     controller_entity_id
///  20     sequence_id
///  22     u (1 bit) | command_type (15 bits)
///  24     command specific payload
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AemPdu {
    pub message_type: AecpMessageType,
    pub status: AemStatus,
    pub target_entity_id: u64,
    pub controller_entity_id: u64,
    pub sequence_id: u16,
    pub unsolicited: bool,
    pub command_type: AemCommandType,
    pub payload: Vec<u8>,
}

impl AemPdu {
    pub fn command(
        target_entity_id: u64,
        controller_entity_id: u64,
        sequence_id: u16,
        command_type: AemCommandType,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            message_type: AecpMessageType::AemCommand,
            status: AemStatus::SUCCESS,
            target_entity_id,
            controller_entity_id,
            sequence_id,
            unsolicited: false,
            command_type,
            payload,
        }
    }

    /// Response to this command with the given status and payload.
    #[must_use]
    pub fn respond(&self, status: AemStatus, payload: Vec<u8>) -> Self {
        Self {
            message_type: AecpMessageType::AemResponse,
            status,
            unsolicited: false,
            payload,
            ..self.clone()
        }
    }

    pub fn len(&self) -> usize {
        AEM_HEADER_LEN + self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Fails without writing when the payload exceeds [`AEM_PAYLOAD_MAX`].
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let total = self.len();
        let control_data_length = checked_control_data_length(total - HEADER_LEN)?;
        ensure_len(buf, total)?;

        ControlHeader::control(
            SUBTYPE_AECP,
            self.message_type as u8,
            self.status.0,
            control_data_length,
            self.target_entity_id,
        )
        .encode(buf)?;

        let command_type = if self.unsolicited {
            self.command_type.0 | UNSOLICITED_BIT
        } else {
            self.command_type.0 & !UNSOLICITED_BIT
        };

        put_u64(buf, 12, self.controller_entity_id)?;
        put_u16(buf, 20, self.sequence_id)?;
        put_u16(buf, 22, command_type)?;
        put_bytes(buf, AEM_HEADER_LEN, &self.payload)?;
        Ok(total)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        checked_control_data_length(self.len() - HEADER_LEN)?;
        let mut buf = vec![0u8; self.len()];
        self.encode(&mut buf)?;
        Ok(buf)
    }

    /// Decode an AEM PDU. The payload extends to `control_data_length`,
    /// bounded by the buffer (Ethernet padding is dropped).
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let header = ControlHeader::decode_expecting(buf, SUBTYPE_AECP)?;
        ensure_len(buf, AEM_HEADER_LEN)?;
        let message_type = match header.message_type {
            0 => AecpMessageType::AemCommand,
            1 => AecpMessageType::AemResponse,
            other => {
                return Err(AvdeccError::Codec {
                    kind: CodecErrorKind::UnknownMessageType(other),
                });
            }
        };

        let end = (HEADER_LEN + usize::from(header.control_data_length))
            .clamp(AEM_HEADER_LEN, buf.len());
        let raw_command_type = get_u16(buf, 22);

        Ok(Self {
            message_type,
            status: AemStatus(header.status),
            target_entity_id: header.stream_id,
            controller_entity_id: get_u64(buf, 12),
            sequence_id: get_u16(buf, 20),
            unsolicited: raw_command_type & UNSOLICITED_BIT != 0,
            command_type: AemCommandType(raw_command_type & !UNSOLICITED_BIT),
            payload: buf[AEM_HEADER_LEN..end].to_vec(),
        })
    }
}
