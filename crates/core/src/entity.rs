//! Advertised identity of a locally hosted ATDECC entity (IEEE 1722.1-2021 §6.2.2).

use std::sync::Arc;

use parking_lot::RwLock;

use crate::codec::adp::{AdpMessageType, Adpdu, valid_time_field};
use crate::codec::{MacAddr, entity_id_from_mac};

pub const ENTITY_CAP_EFU_MODE: u32 = 0x0000_0001;
pub const ENTITY_CAP_ADDRESS_ACCESS_SUPPORTED: u32 = 0x0000_0002;
pub const ENTITY_CAP_GATEWAY_ENTITY: u32 = 0x0000_0004;
pub const ENTITY_CAP_AEM_SUPPORTED: u32 = 0x0000_0008;
pub const ENTITY_CAP_LEGACY_AVC: u32 = 0x0000_0010;
pub const ENTITY_CAP_ASSOCIATION_ID_SUPPORTED: u32 = 0x0000_0020;
pub const ENTITY_CAP_ASSOCIATION_ID_VALID: u32 = 0x0000_0040;
pub const ENTITY_CAP_VENDOR_UNIQUE_SUPPORTED: u32 = 0x0000_0080;
pub const ENTITY_CAP_CLASS_A_SUPPORTED: u32 = 0x0000_0100;
pub const ENTITY_CAP_CLASS_B_SUPPORTED: u32 = 0x0000_0200;
pub const ENTITY_CAP_GPTP_SUPPORTED: u32 = 0x0000_0400;

pub const TALKER_CAP_IMPLEMENTED: u16 = 0x0001;
pub const TALKER_CAP_AUDIO_SOURCE: u16 = 0x4000;

pub const LISTENER_CAP_IMPLEMENTED: u16 = 0x0001;
pub const LISTENER_CAP_AUDIO_SINK: u16 = 0x4000;

/// Default advertised validity in seconds.
pub const DEFAULT_VALID_TIME: u32 = 62;

/// One record per locally hosted entity.
///
/// Everything here is set by the host except `available_index`, which only
/// the advertising engine touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityInfo {
    /// Advertised validity in seconds.
    pub valid_time: u32,
    pub entity_id: u64,
    pub entity_model_id: u64,
    pub entity_capabilities: u32,
    /// Maximum number of streams the talker can source simultaneously.
    pub talker_stream_sources: u16,
    pub talker_capabilities: u16,
    /// Maximum number of streams the listener can sink simultaneously.
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
    /// MAC of the primary interface; default for the AVB_INTERFACE descriptor.
    pub mac_address: MacAddr,
}

impl Default for EntityInfo {
    fn default() -> Self {
        Self {
            valid_time: DEFAULT_VALID_TIME,
            entity_id: 0,
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
            mac_address: MacAddr::ZERO,
        }
    }
}

impl EntityInfo {
    pub fn new(entity_id: u64) -> Self {
        Self {
            entity_id,
            ..Self::default()
        }
    }

    /// Entity whose id is derived from the interface MAC.
    pub fn from_mac(mac_address: MacAddr) -> Self {
        Self {
            entity_id: entity_id_from_mac(mac_address),
            mac_address,
            ..Self::default()
        }
    }

    /// Build an ADPDU announcing this entity.
    pub fn to_adpdu(&self, message_type: AdpMessageType) -> Adpdu {
        Adpdu {
            message_type,
            valid_time: valid_time_field(self.valid_time),
            entity_id: self.entity_id,
            entity_model_id: self.entity_model_id,
            entity_capabilities: self.entity_capabilities,
            talker_stream_sources: self.talker_stream_sources,
            talker_capabilities: self.talker_capabilities,
            listener_stream_sinks: self.listener_stream_sinks,
            listener_capabilities: self.listener_capabilities,
            controller_capabilities: self.controller_capabilities,
            available_index: self.available_index,
            gptp_grandmaster_id: self.gptp_grandmaster_id,
            gptp_domain_number: self.gptp_domain_number,
            current_configuration_index: self.current_configuration_index,
            identify_control_index: self.identify_control_index,
            interface_index: self.interface_index,
            association_id: self.association_id,
        }
    }
}

/// Entity record shared between the engines and the host.
pub type SharedEntityInfo = Arc<RwLock<EntityInfo>>;

pub fn shared(info: EntityInfo) -> SharedEntityInfo {
    Arc::new(RwLock::new(info))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adpdu_carries_halved_valid_time() {
        let info = EntityInfo {
            valid_time: 10,
            ..EntityInfo::new(42)
        };
        let pdu = info.to_adpdu(AdpMessageType::EntityAvailable);
        assert_eq!(pdu.valid_time, 5);
        assert_eq!(pdu.entity_id, 42);
        assert_eq!(pdu.message_type, AdpMessageType::EntityAvailable);
    }

    #[test]
    fn default_valid_time_saturates_field() {
        let pdu = EntityInfo::new(1).to_adpdu(AdpMessageType::EntityDeparting);
        assert_eq!(pdu.valid_time, 31);
    }

    #[test]
    fn from_mac_derives_id() {
        let info = EntityInfo::from_mac(MacAddr([0x00, 0x1b, 0x21, 0x0a, 0x0b, 0x0c]));
        assert_eq!(info.entity_id, 0x021b_21ff_f00a_0b0c);
        assert_eq!(info.available_index, 0);
    }
}
