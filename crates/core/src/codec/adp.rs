use super::header::{ControlHeader, HEADER_LEN};
use super::{SUBTYPE_ADP, ensure_len, get_u16, get_u32, get_u64, put_u16, put_u32, put_u64, put_u8};
use crate::error::{AvdeccError, CodecErrorKind, Result};

/// Total length of an ADPDU.
pub const ADPDU_LEN: usize = 68;

/// `control_data_length` of an ADPDU (everything after the entity id).
pub const ADPDU_CONTROL_DATA_LENGTH: u16 = (ADPDU_LEN - HEADER_LEN) as u16;

/// ADP message types (IEEE 1722.1-2021 Table 6-1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AdpMessageType {
    EntityAvailable = 0,
    EntityDeparting = 1,
    EntityDiscover = 2,
}

impl AdpMessageType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::EntityAvailable),
            1 => Some(Self::EntityDeparting),
            2 => Some(Self::EntityDiscover),
            _ => None,
        }
    }
}

/// Encode an advertised valid time (seconds) into the 5-bit header field.
///
/// The field counts 2-second units: `clamp(round(valid_time / 2), 1, 31)`.
pub fn valid_time_field(valid_time: u32) -> u8 {
    (valid_time.saturating_add(1) / 2).clamp(1, 31) as u8
}

/// ATDECC Discovery Protocol Data Unit.
///
/// `valid_time` is the raw 5-bit header value, in 2-second units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adpdu {
    pub message_type: AdpMessageType,
    pub valid_time: u8,
    pub entity_id: u64,
    pub entity_model_id: u64,
    pub entity_capabilities: u32,
    pub talker_stream_sources: u16,
    pub talker_capabilities: u16,
    pub listener_stream_sinks: u16,
    pub listener_capabilities: u16,
    pub controller_capabilities: u32,
    pub available_index: u32,
    pub gptp_grandmaster_id: u64,
    pub gptp_domain_number: u8,
    pub current_configuration_index: u16,
    pub identify_control_index: u16,
    pub interface_index: u16,
    pub association_id: u64,
}

impl Adpdu {
    /// An ENTITY_DISCOVER request. `entity_id == 0` addresses every entity.
    pub fn discover(entity_id: u64) -> Self {
        Self {
            message_type: AdpMessageType::EntityDiscover,
            valid_time: 0,
            entity_id,
            entity_model_id: 0,
            entity_capabilities: 0,
            talker_stream_sources: 0,
            talker_capabilities: 0,
            listener_stream_sinks: 0,
            listener_capabilities: 0,
            controller_capabilities: 0,
            available_index: 0,
            gptp_grandmaster_id: 0,
            gptp_domain_number: 0,
            current_configuration_index: 0,
            identify_control_index: 0,
            interface_index: 0,
            association_id: 0,
        }
    }

    /// Advertised validity in seconds.
    pub fn valid_time_secs(&self) -> u32 {
        u32::from(self.valid_time) * 2
    }

    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        ControlHeader::control(
            SUBTYPE_ADP,
            self.message_type as u8,
            self.valid_time,
            ADPDU_CONTROL_DATA_LENGTH,
            self.entity_id,
        )
        .encode(buf)?;

        put_u64(buf, 12, self.entity_model_id)?;
        put_u32(buf, 20, self.entity_capabilities)?;
        put_u16(buf, 24, self.talker_stream_sources)?;
        put_u16(buf, 26, self.talker_capabilities)?;
        put_u16(buf, 28, self.listener_stream_sinks)?;
        put_u16(buf, 30, self.listener_capabilities)?;
        put_u32(buf, 32, self.controller_capabilities)?;
        put_u32(buf, 36, self.available_index)?;
        put_u64(buf, 40, self.gptp_grandmaster_id)?;
        put_u8(buf, 48, self.gptp_domain_number)?;
        put_u8(buf, 49, 0)?;
        put_u16(buf, 50, self.current_configuration_index)?;
        put_u16(buf, 52, self.identify_control_index)?;
        put_u16(buf, 54, self.interface_index)?;
        put_u64(buf, 56, self.association_id)?;
        put_u32(buf, 64, 0)?;
        Ok(ADPDU_LEN)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; ADPDU_LEN];
        self.encode(&mut buf)?;
        Ok(buf)
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let header = ControlHeader::decode_expecting(buf, SUBTYPE_ADP)?;
        ensure_len(buf, ADPDU_LEN)?;
        let message_type = AdpMessageType::from_u8(header.message_type).ok_or(AvdeccError::Codec {
            kind: CodecErrorKind::UnknownMessageType(header.message_type),
        })?;

        Ok(Self {
            message_type,
            valid_time: header.status,
            entity_id: header.stream_id,
            entity_model_id: get_u64(buf, 12),
            entity_capabilities: get_u32(buf, 20),
            talker_stream_sources: get_u16(buf, 24),
            talker_capabilities: get_u16(buf, 26),
            listener_stream_sinks: get_u16(buf, 28),
            listener_capabilities: get_u16(buf, 30),
            controller_capabilities: get_u32(buf, 32),
            available_index: get_u32(buf, 36),
            gptp_grandmaster_id: get_u64(buf, 40),
            gptp_domain_number: buf[48],
            current_configuration_index: get_u16(buf, 50),
            identify_control_index: get_u16(buf, 52),
            interface_index: get_u16(buf, 54),
            association_id: get_u64(buf, 56),
        })
    }
}
