use std::fmt;

use super::header::{ControlHeader, HEADER_LEN};
use super::{
    MacAddr, SUBTYPE_ACMP, ensure_len, get_mac, get_u16, get_u64, put_mac, put_u16, put_u64,
};
use crate::error::{AvdeccError, CodecErrorKind, Result};

/// Total length of an ACMPDU.
pub const ACMPDU_LEN: usize = 56;

/// `control_data_length` of an ACMPDU.
pub const ACMPDU_CONTROL_DATA_LENGTH: u16 = (ACMPDU_LEN - HEADER_LEN) as u16;

/// ACMP message types (IEEE 1722.1-2021 Table 8-1).
///
/// Every command is an even value and its response is `command + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AcmpMessageType {
    ConnectTxCommand = 0,
    ConnectTxResponse = 1,
    DisconnectTxCommand = 2,
    DisconnectTxResponse = 3,
    GetTxStateCommand = 4,
    GetTxStateResponse = 5,
    ConnectRxCommand = 6,
    ConnectRxResponse = 7,
    DisconnectRxCommand = 8,
    DisconnectRxResponse = 9,
    GetRxStateCommand = 10,
    GetRxStateResponse = 11,
    GetTxConnectionCommand = 12,
    GetTxConnectionResponse = 13,
}

impl AcmpMessageType {
    pub fn from_u8(value: u8) -> Option<Self> {
        use AcmpMessageType::*;
        Some(match value {
            0 => ConnectTxCommand,
            1 => ConnectTxResponse,
            2 => DisconnectTxCommand,
            3 => DisconnectTxResponse,
            4 => GetTxStateCommand,
            5 => GetTxStateResponse,
            6 => ConnectRxCommand,
            7 => ConnectRxResponse,
            8 => DisconnectRxCommand,
            9 => DisconnectRxResponse,
            10 => GetRxStateCommand,
            11 => GetRxStateResponse,
            12 => GetTxConnectionCommand,
            13 => GetTxConnectionResponse,
            _ => return None,
        })
    }

    pub fn is_command(self) -> bool {
        (self as u8) % 2 == 0
    }

    /// The response type paired with a command (`messageType + 1`).
    pub fn response(self) -> Self {
        if self.is_command() {
            Self::from_u8(self as u8 + 1).unwrap_or(self)
        } else {
            self
        }
    }
}

/// ACMP status codes (IEEE 1722.1-2021 Table 8-3).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AcmpStatus(pub u8);

impl AcmpStatus {
    pub const SUCCESS: Self = Self(0);
    pub const LISTENER_UNKNOWN_ID: Self = Self(1);
    pub const TALKER_UNKNOWN_ID: Self = Self(2);
    pub const TALKER_DEST_MAC_FAIL: Self = Self(3);
    pub const TALKER_NO_STREAM_INDEX: Self = Self(4);
    pub const TALKER_NO_BANDWIDTH: Self = Self(5);
    pub const TALKER_EXCLUSIVE: Self = Self(6);
    pub const LISTENER_TALKER_TIMEOUT: Self = Self(7);
    pub const LISTENER_EXCLUSIVE: Self = Self(8);
    pub const STATE_UNAVAILABLE: Self = Self(9);
    pub const NOT_CONNECTED: Self = Self(10);
    pub const NO_SUCH_CONNECTION: Self = Self(11);
    pub const COULD_NOT_SEND_MESSAGE: Self = Self(12);
    pub const TALKER_MISBEHAVING: Self = Self(13);
    pub const LISTENER_MISBEHAVING: Self = Self(14);
    pub const CONTROLLER_NOT_AUTHORIZED: Self = Self(16);
    pub const INCOMPATIBLE_REQUEST: Self = Self(17);
    pub const NOT_SUPPORTED: Self = Self(31);

    fn name(self) -> Option<&'static str> {
        Some(match self.0 {
            0 => "SUCCESS",
            1 => "LISTENER_UNKNOWN_ID",
            2 => "TALKER_UNKNOWN_ID",
            3 => "TALKER_DEST_MAC_FAIL",
            4 => "TALKER_NO_STREAM_INDEX",
            5 => "TALKER_NO_BANDWIDTH",
            6 => "TALKER_EXCLUSIVE",
            7 => "LISTENER_TALKER_TIMEOUT",
            8 => "LISTENER_EXCLUSIVE",
            9 => "STATE_UNAVAILABLE",
            10 => "NOT_CONNECTED",
            11 => "NO_SUCH_CONNECTION",
            12 => "COULD_NOT_SEND_MESSAGE",
            13 => "TALKER_MISBEHAVING",
            14 => "LISTENER_MISBEHAVING",
            16 => "CONTROLLER_NOT_AUTHORIZED",
            17 => "INCOMPATIBLE_REQUEST",
            31 => "NOT_SUPPORTED",
            _ => return None,
        })
    }
}

impl fmt::Display for AcmpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "RESERVED({})", self.0),
        }
    }
}

impl fmt::Debug for AcmpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// ATDECC Connection Management Protocol Data Unit.
///
/// Commands and responses share this layout; `status` is only meaningful
/// on responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acmpdu {
    pub message_type: AcmpMessageType,
    pub status: AcmpStatus,
    pub stream_id: u64,
    pub controller_entity_id: u64,
    pub talker_entity_id: u64,
    pub listener_entity_id: u64,
    pub talker_unique_id: u16,
    pub listener_unique_id: u16,
    pub stream_dest_mac: MacAddr,
    pub connection_count: u16,
    pub sequence_id: u16,
    pub flags: u16,
    pub stream_vlan_id: u16,
}

impl Acmpdu {
    /// A zeroed PDU of the given type.
    pub fn new(message_type: AcmpMessageType) -> Self {
        Self {
            message_type,
            status: AcmpStatus::SUCCESS,
            stream_id: 0,
            controller_entity_id: 0,
            talker_entity_id: 0,
            listener_entity_id: 0,
            talker_unique_id: 0,
            listener_unique_id: 0,
            stream_dest_mac: MacAddr::ZERO,
            connection_count: 0,
            sequence_id: 0,
            flags: 0,
            stream_vlan_id: 0,
        }
    }

    /// Copy of this PDU retyped as `message_type` with `status`.
    #[must_use]
    pub fn with_type(&self, message_type: AcmpMessageType, status: AcmpStatus) -> Self {
        Self {
            message_type,
            status,
            ..self.clone()
        }
    }

    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        ControlHeader::control(
            SUBTYPE_ACMP,
            self.message_type as u8,
            self.status.0,
            ACMPDU_CONTROL_DATA_LENGTH,
            self.stream_id,
        )
        .encode(buf)?;

        put_u64(buf, 12, self.controller_entity_id)?;
        put_u64(buf, 20, self.talker_entity_id)?;
        put_u64(buf, 28, self.listener_entity_id)?;
        put_u16(buf, 36, self.talker_unique_id)?;
        put_u16(buf, 38, self.listener_unique_id)?;
        put_mac(buf, 40, self.stream_dest_mac)?;
        put_u16(buf, 46, self.connection_count)?;
        put_u16(buf, 48, self.sequence_id)?;
        put_u16(buf, 50, self.flags)?;
        put_u16(buf, 52, self.stream_vlan_id)?;
        put_u16(buf, 54, 0)?;
        Ok(ACMPDU_LEN)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; ACMPDU_LEN];
        self.encode(&mut buf)?;
        Ok(buf)
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let header = ControlHeader::decode_expecting(buf, SUBTYPE_ACMP)?;
        ensure_len(buf, ACMPDU_LEN)?;
        let message_type = AcmpMessageType::from_u8(header.message_type).ok_or(AvdeccError::Codec {
            kind: CodecErrorKind::UnknownMessageType(header.message_type),
        })?;

        Ok(Self {
            message_type,
            status: AcmpStatus(header.status),
            stream_id: header.stream_id,
            controller_entity_id: get_u64(buf, 12),
            talker_entity_id: get_u64(buf, 20),
            listener_entity_id: get_u64(buf, 28),
            talker_unique_id: get_u16(buf, 36),
            listener_unique_id: get_u16(buf, 38),
            stream_dest_mac: get_mac(buf, 40),
            connection_count: get_u16(buf, 46),
            sequence_id: get_u16(buf, 48),
            flags: get_u16(buf, 50),
            stream_vlan_id: get_u16(buf, 52),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connect_rx() -> Acmpdu {
        Acmpdu {
            stream_id: 0x0102_0304_0506_0708,
            controller_entity_id: 44,
            talker_entity_id: 43,
            listener_entity_id: 42,
            talker_unique_id: 1,
            listener_unique_id: 0,
            stream_dest_mac: MacAddr([0x91, 0xE0, 0xF0, 0x00, 0x12, 0x34]),
            connection_count: 0,
            sequence_id: 0xBEEF,
            flags: 0x0002,
            stream_vlan_id: 2,
            ..Acmpdu::new(AcmpMessageType::ConnectRxCommand)
        }
    }

    #[test]
    fn response_is_command_plus_one() {
        assert_eq!(
            AcmpMessageType::ConnectTxCommand.response(),
            AcmpMessageType::ConnectTxResponse
        );
        assert_eq!(
            AcmpMessageType::GetTxConnectionCommand.response(),
            AcmpMessageType::GetTxConnectionResponse
        );
        assert!(!AcmpMessageType::ConnectRxResponse.is_command());
    }

    #[test]
    fn encode_layout() {
        let bytes = connect_rx().to_bytes().unwrap();
        assert_eq!(bytes.len(), ACMPDU_LEN);
        assert_eq!(bytes[0], 0x80 | SUBTYPE_ACMP);
        assert_eq!(bytes[1] & 0x0F, 6);
        assert_eq!(u16::from(bytes[2] & 0x07) << 8 | u16::from(bytes[3]), 44);
        assert_eq!(&bytes[28..36], &42u64.to_be_bytes());
        assert_eq!(&bytes[48..50], &[0xBE, 0xEF]);
    }

    #[test]
    fn decode_inverts_encode() {
        let pdu = connect_rx().with_type(
            AcmpMessageType::ConnectRxResponse,
            AcmpStatus::LISTENER_TALKER_TIMEOUT,
        );
        assert_eq!(Acmpdu::decode(&pdu.to_bytes().unwrap()).unwrap(), pdu);
    }

    #[test]
    fn reserved_message_type_is_rejected() {
        let mut bytes = connect_rx().to_bytes().unwrap();
        bytes[1] = (bytes[1] & 0xF0) | 14;
        assert!(Acmpdu::decode(&bytes).is_err());
    }

    #[test]
    fn status_display() {
        assert_eq!(AcmpStatus::LISTENER_EXCLUSIVE.to_string(), "LISTENER_EXCLUSIVE");
        assert_eq!(AcmpStatus(15).to_string(), "RESERVED(15)");
    }
}
