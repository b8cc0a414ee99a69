use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::Ownership;
use crate::aem::{self, DescriptorType, EntityConfig};
use crate::codec::aecp::AEM_PAYLOAD_MAX;
use crate::codec::{
    AecpMessageType, AemCommandType, AemPdu, AemStatus, EntityId, MacAddr, ensure_len, get_u16,
    get_u32, get_u64,
};
use crate::entity::SharedEntityInfo;
use crate::error::Result;
use crate::mailbox::{Mailbox, Next, TICK};
use crate::transport::{Handler, Inbound, Pdu, Protocol, Registrations, Transport, send_all};

/// ACQUIRE_ENTITY flag: release instead of acquire.
pub const ACQUIRE_FLAG_RELEASE: u32 = 0x8000_0000;
/// ACQUIRE_ENTITY flag: persistent acquisition. Accepted and ignored.
pub const ACQUIRE_FLAG_PERSISTENT: u32 = 0x0000_0001;

const ACQUIRE_PAYLOAD_LEN: usize = 16;
const READ_DESCRIPTOR_PAYLOAD_LEN: usize = 8;
/// The record follows configuration_index and a reserved field.
const READ_DESCRIPTOR_RECORD_AT: usize = 4;
const COUNTERS: usize = 32;

/// Work for the entity-model loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityModelEvent {
    /// An AEM command addressed to this entity and the MAC it came from.
    Received { source: MacAddr, command: AemPdu },
}

/// Entity-model entity state machine (IEEE 1722.1-2021, 9.3.5).
///
/// Answers AEM commands. Every response goes back to the MAC the command
/// came from. Ownership changes are also pushed to the controllers that
/// registered for unsolicited notifications.
pub struct EntityModelStateMachine {
    info: SharedEntityInfo,
    config: Arc<EntityConfig>,
    ownership: Ownership,
    transports: Vec<Arc<dyn Transport>>,
    unsolicited: HashMap<u64, MacAddr>,
    unsolicited_sequence_id: u16,
}

impl EntityModelStateMachine {
    pub fn new(
        info: SharedEntityInfo,
        config: Arc<EntityConfig>,
        ownership: Ownership,
        transports: Vec<Arc<dyn Transport>>,
    ) -> Self {
        Self {
            info,
            config,
            ownership,
            transports,
            unsolicited: HashMap::new(),
            unsolicited_sequence_id: 0,
        }
    }

    pub fn entity_id(&self) -> u64 {
        self.info.read().entity_id
    }

    pub fn owner_entity_id(&self) -> u64 {
        self.ownership.owner()
    }

    /// Controllers registered for unsolicited notifications.
    pub fn is_registered(&self, controller_entity_id: u64) -> bool {
        self.unsolicited.contains_key(&controller_entity_id)
    }

    /// Answer one command and push any ownership change.
    pub fn handle(&mut self, source: MacAddr, command: &AemPdu) {
        tracing::debug!(
            command_type = ?command.command_type,
            controller = %EntityId(command.controller_entity_id),
            sequence_id = command.sequence_id,
            "AEM command"
        );
        let owner_before = self.ownership.owner();
        let response = self.process(source, command);
        self.tx_response(source, &response);

        if command.command_type == AemCommandType::ACQUIRE_ENTITY
            && self.ownership.owner() != owner_before
        {
            self.notify_unsolicited(&response, command.controller_entity_id);
        }
    }

    /// Build the response to `command`, updating state on the way.
    pub fn process(&mut self, source: MacAddr, command: &AemPdu) -> AemPdu {
        let result = match command.command_type {
            AemCommandType::ACQUIRE_ENTITY => self.acquire_entity(command),
            AemCommandType::LOCK_ENTITY => Ok(self.lock_entity(command)),
            AemCommandType::ENTITY_AVAILABLE => {
                Ok(command.respond(AemStatus::NOT_IMPLEMENTED, Vec::new()))
            }
            AemCommandType::REGISTER_UNSOLICITED_NOTIFICATION => {
                Ok(self.register_unsolicited(source, command))
            }
            AemCommandType::DEREGISTER_UNSOLICITED_NOTIFICATION => {
                Ok(self.deregister_unsolicited(command))
            }
            AemCommandType::READ_DESCRIPTOR => self.read_descriptor(command),
            AemCommandType::GET_AVB_INFO => self.get_avb_info(command),
            AemCommandType::GET_AS_PATH => self.get_as_path(command),
            AemCommandType::GET_AUDIO_MAP => self.get_audio_map(command),
            AemCommandType::GET_COUNTERS => self.get_counters(command),
            _ => Ok(command.respond(AemStatus::NOT_IMPLEMENTED, Vec::new())),
        };
        result.unwrap_or_else(|e| {
            tracing::warn!(
                command_type = ?command.command_type,
                error = %e,
                "malformed AEM command"
            );
            command.respond(AemStatus::BAD_ARGUMENTS, Vec::new())
        })
    }

    fn acquire_entity(&mut self, command: &AemPdu) -> Result<AemPdu> {
        let payload = &command.payload;
        ensure_len(payload, ACQUIRE_PAYLOAD_LEN)?;
        let flags = get_u32(payload, 0);
        let descriptor_type = get_u16(payload, 12);
        let descriptor_index = get_u16(payload, 14);
        let controller = command.controller_entity_id;
        let owner = self.ownership.owner();

        let status = if descriptor_type != DescriptorType::Entity as u16 {
            AemStatus::NOT_IMPLEMENTED
        } else if flags & ACQUIRE_FLAG_RELEASE != 0 {
            if owner == controller {
                self.ownership.set(0);
                tracing::info!(controller = %EntityId(controller), "entity released");
                AemStatus::SUCCESS
            } else {
                AemStatus::BAD_ARGUMENTS
            }
        } else if owner != 0 {
            AemStatus::ENTITY_ACQUIRED
        } else {
            self.ownership.set(controller);
            tracing::info!(controller = %EntityId(controller), "entity acquired");
            AemStatus::SUCCESS
        };

        let mut body = Vec::with_capacity(ACQUIRE_PAYLOAD_LEN);
        body.extend_from_slice(&flags.to_be_bytes());
        body.extend_from_slice(&self.ownership.owner().to_be_bytes());
        body.extend_from_slice(&descriptor_type.to_be_bytes());
        body.extend_from_slice(&descriptor_index.to_be_bytes());
        Ok(command.respond(status, body))
    }

    fn lock_entity(&self, command: &AemPdu) -> AemPdu {
        command.respond(AemStatus::NOT_IMPLEMENTED, command.payload.clone())
    }

    fn register_unsolicited(&mut self, source: MacAddr, command: &AemPdu) -> AemPdu {
        self.unsolicited.insert(command.controller_entity_id, source);
        tracing::debug!(
            controller = %EntityId(command.controller_entity_id),
            %source,
            "registered for unsolicited notifications"
        );
        command.respond(AemStatus::SUCCESS, 0u32.to_be_bytes().to_vec())
    }

    fn deregister_unsolicited(&mut self, command: &AemPdu) -> AemPdu {
        let status = match self.unsolicited.remove(&command.controller_entity_id) {
            Some(_) => {
                tracing::debug!(
                    controller = %EntityId(command.controller_entity_id),
                    "deregistered from unsolicited notifications"
                );
                AemStatus::SUCCESS
            }
            None => AemStatus::BAD_ARGUMENTS,
        };
        command.respond(status, 0u32.to_be_bytes().to_vec())
    }

    fn read_descriptor(&self, command: &AemPdu) -> Result<AemPdu> {
        let payload = &command.payload;
        ensure_len(payload, READ_DESCRIPTOR_PAYLOAD_LEN)?;
        let descriptor_type = get_u16(payload, 4);
        let descriptor_index = get_u16(payload, 6);

        let encoded = {
            let info = self.info.read();
            aem::build(descriptor_type, descriptor_index, &info, &self.config)
                .and_then(|d| d.encode())
        };
        match encoded {
            Ok(record) if READ_DESCRIPTOR_RECORD_AT + record.len() <= AEM_PAYLOAD_MAX => {
                tracing::debug!(
                    descriptor_type,
                    descriptor_index,
                    len = record.len(),
                    "READ_DESCRIPTOR"
                );
                // configuration_index, reserved
                let mut body = vec![0u8; READ_DESCRIPTOR_RECORD_AT];
                body.extend_from_slice(&record);
                Ok(command.respond(AemStatus::SUCCESS, body))
            }
            Ok(record) => {
                tracing::warn!(
                    descriptor_type,
                    descriptor_index,
                    len = record.len(),
                    "descriptor does not fit in one AEM response"
                );
                Ok(command.respond(AemStatus::NOT_IMPLEMENTED, payload.clone()))
            }
            Err(e) => {
                tracing::debug!(
                    descriptor_type,
                    descriptor_index,
                    error = %e,
                    "READ_DESCRIPTOR not available"
                );
                Ok(command.respond(AemStatus::NOT_IMPLEMENTED, payload.clone()))
            }
        }
    }

    /// gPTP is not modelled; the grandmaster and domain come from the
    /// entity record and there are no MSRP mappings.
    fn get_avb_info(&self, command: &AemPdu) -> Result<AemPdu> {
        let payload = &command.payload;
        ensure_len(payload, 4)?;
        let info = self.info.read();
        let mut body = payload[..4].to_vec();
        body.extend_from_slice(&info.gptp_grandmaster_id.to_be_bytes());
        body.extend_from_slice(&0u32.to_be_bytes());
        body.push(info.gptp_domain_number);
        body.push(0);
        body.extend_from_slice(&0u16.to_be_bytes());
        Ok(command.respond(AemStatus::SUCCESS, body))
    }

    fn get_as_path(&self, command: &AemPdu) -> Result<AemPdu> {
        let payload = &command.payload;
        ensure_len(payload, 2)?;
        let mut body = payload[..2].to_vec();
        body.extend_from_slice(&1u16.to_be_bytes());
        body.extend_from_slice(&self.entity_id().to_be_bytes());
        Ok(command.respond(AemStatus::NOT_IMPLEMENTED, body))
    }

    fn get_audio_map(&self, command: &AemPdu) -> Result<AemPdu> {
        let payload = &command.payload;
        ensure_len(payload, 6)?;
        let mut body = payload[..6].to_vec();
        for value in [2u16, 8, 0] {
            body.extend_from_slice(&value.to_be_bytes());
        }
        Ok(command.respond(AemStatus::NOT_IMPLEMENTED, body))
    }

    fn get_counters(&self, command: &AemPdu) -> Result<AemPdu> {
        let payload = &command.payload;
        ensure_len(payload, 4)?;
        let mut body = payload[..4].to_vec();
        body.extend_from_slice(&0u32.to_be_bytes());
        body.extend_from_slice(&[0u8; COUNTERS * 4]);
        Ok(command.respond(AemStatus::NOT_IMPLEMENTED, body))
    }

    /// Push an unsolicited copy of `response` to every registered
    /// controller except `requester`.
    fn notify_unsolicited(&mut self, response: &AemPdu, requester: u64) {
        let targets: Vec<(u64, MacAddr)> = self
            .unsolicited
            .iter()
            .filter(|(id, _)| **id != requester)
            .map(|(id, mac)| (*id, *mac))
            .collect();
        for (controller, mac) in targets {
            let notification = AemPdu {
                message_type: AecpMessageType::AemResponse,
                controller_entity_id: controller,
                sequence_id: self.unsolicited_sequence_id,
                unsolicited: true,
                ..response.clone()
            };
            self.unsolicited_sequence_id = self.unsolicited_sequence_id.wrapping_add(1);
            tracing::debug!(
                controller = %EntityId(controller),
                sequence_id = notification.sequence_id,
                "unsolicited notification"
            );
            self.tx_response(mac, &notification);
        }
    }

    fn tx_response(&self, destination: MacAddr, response: &AemPdu) {
        if let Err(e) = send_all(&self.transports, destination, &Pdu::Aem(response.clone())) {
            tracing::warn!(
                command_type = ?response.command_type,
                error = %e,
                "could not send AEM response"
            );
        }
    }

    /// Transport callback posting AEM commands for `entity_id` to `mailbox`.
    pub fn callback(entity_id: u64, mailbox: Arc<Mailbox<EntityModelEvent>>) -> Handler {
        Arc::new(move |inbound: &Inbound| {
            if let Pdu::Aem(pdu) = &inbound.pdu {
                if pdu.message_type == AecpMessageType::AemCommand
                    && pdu.target_entity_id == entity_id
                {
                    mailbox.post(EntityModelEvent::Received {
                        source: inbound.source,
                        command: pdu.clone(),
                    });
                }
            }
        })
    }

    /// Run the entity model on its own thread until `mailbox` is terminated.
    pub fn spawn(self, mailbox: Arc<Mailbox<EntityModelEvent>>) -> Result<JoinHandle<()>> {
        let registrations = Registrations::register_all(
            &self.transports,
            Protocol::Aecp,
            Self::callback(self.entity_id(), mailbox.clone()),
        );
        let handle = thread::Builder::new()
            .name("aecp-entity-model".to_string())
            .spawn(move || {
                self.run(&mailbox);
                drop(registrations);
            })?;
        Ok(handle)
    }

    fn run(mut self, mailbox: &Mailbox<EntityModelEvent>) {
        let entity_id = self.entity_id();
        tracing::info!(entity_id = %EntityId(entity_id), "AEM entity model started");

        loop {
            match mailbox.recv_timeout(TICK) {
                Next::Event(EntityModelEvent::Received { source, command }) => {
                    self.handle(source, &command)
                }
                Next::Timeout => {}
                Next::Terminate => break,
            }
        }
        tracing::info!(entity_id = %EntityId(entity_id), "AEM entity model stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aem::descriptors::ENTITY_LEN;
    use crate::codec::aecp::AEM_HEADER_LEN;
    use crate::entity::{EntityInfo, shared};
    use crate::transport::LoopbackPort;

    const ENTITY: u64 = 42;
    const MAC_43: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 0x43]);
    const MAC_44: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 0x44]);

    fn setup() -> (EntityModelStateMachine, Arc<LoopbackPort>) {
        let port = LoopbackPort::standalone("lo0", MacAddr([0x02, 0, 0, 0, 0, 0x42]));
        let info = EntityInfo {
            gptp_grandmaster_id: 0xAABB,
            gptp_domain_number: 3,
            ..EntityInfo::new(ENTITY)
        };
        let machine = EntityModelStateMachine::new(
            shared(info),
            Arc::new(EntityConfig::default()),
            Ownership::new(),
            vec![port.clone()],
        );
        (machine, port)
    }

    fn acquire(controller: u64, flags: u32, descriptor_type: u16) -> AemPdu {
        let mut payload = flags.to_be_bytes().to_vec();
        payload.extend_from_slice(&0u64.to_be_bytes());
        payload.extend_from_slice(&descriptor_type.to_be_bytes());
        payload.extend_from_slice(&0u16.to_be_bytes());
        AemPdu::command(ENTITY, controller, 1, AemCommandType::ACQUIRE_ENTITY, payload)
    }

    fn simple(controller: u64, command_type: AemCommandType, payload: Vec<u8>) -> AemPdu {
        AemPdu::command(ENTITY, controller, 9, command_type, payload)
    }

    fn read_descriptor(descriptor_type: u16, index: u16) -> AemPdu {
        let mut payload = vec![0u8; 4];
        payload.extend_from_slice(&descriptor_type.to_be_bytes());
        payload.extend_from_slice(&index.to_be_bytes());
        simple(43, AemCommandType::READ_DESCRIPTOR, payload)
    }

    fn sent(port: &LoopbackPort) -> Vec<(MacAddr, AemPdu)> {
        port.take_sent()
            .into_iter()
            .map(|frame| (frame.destination, AemPdu::decode(&frame.payload).unwrap()))
            .collect()
    }

    #[test]
    fn acquire_is_single_owner() {
        let (mut machine, _) = setup();

        let response = machine.process(MAC_43, &acquire(43, 0, 0));
        assert_eq!(response.status, AemStatus::SUCCESS);
        assert_eq!(response.message_type, AecpMessageType::AemResponse);
        assert_eq!(machine.owner_entity_id(), 43);
        assert_eq!(get_u64(&response.payload, 4), 43);

        let response = machine.process(MAC_44, &acquire(44, 0, 0));
        assert_eq!(response.status, AemStatus::ENTITY_ACQUIRED);
        assert_eq!(get_u64(&response.payload, 4), 43);
        assert_eq!(machine.owner_entity_id(), 43);
    }

    #[test]
    fn only_the_owner_can_release() {
        let (mut machine, _) = setup();
        machine.process(MAC_43, &acquire(43, 0, 0));

        let response = machine.process(MAC_44, &acquire(44, ACQUIRE_FLAG_RELEASE, 0));
        assert_eq!(response.status, AemStatus::BAD_ARGUMENTS);
        assert_eq!(machine.owner_entity_id(), 43);

        let response = machine.process(MAC_43, &acquire(43, ACQUIRE_FLAG_RELEASE, 0));
        assert_eq!(response.status, AemStatus::SUCCESS);
        assert_eq!(get_u32(&response.payload, 0), ACQUIRE_FLAG_RELEASE);
        assert_eq!(machine.owner_entity_id(), 0);
    }

    #[test]
    fn acquire_of_sub_descriptor_is_not_implemented() {
        let (mut machine, _) = setup();
        let command = acquire(43, ACQUIRE_FLAG_PERSISTENT, DescriptorType::StreamInput as u16);
        let response = machine.process(MAC_43, &command);
        assert_eq!(response.status, AemStatus::NOT_IMPLEMENTED);
        assert_eq!(machine.owner_entity_id(), 0);
    }

    #[test]
    fn lock_and_entity_available_are_not_implemented() {
        let (mut machine, _) = setup();
        for command_type in [AemCommandType::LOCK_ENTITY, AemCommandType::ENTITY_AVAILABLE] {
            let response = machine.process(MAC_43, &simple(43, command_type, Vec::new()));
            assert_eq!(response.status, AemStatus::NOT_IMPLEMENTED);
        }
    }

    #[test]
    fn deregister_requires_registration() {
        let (mut machine, _) = setup();
        let deregister =
            simple(43, AemCommandType::DEREGISTER_UNSOLICITED_NOTIFICATION, Vec::new());
        assert_eq!(machine.process(MAC_43, &deregister).status, AemStatus::BAD_ARGUMENTS);

        let register = simple(43, AemCommandType::REGISTER_UNSOLICITED_NOTIFICATION, Vec::new());
        let response = machine.process(MAC_43, &register);
        assert_eq!(response.status, AemStatus::SUCCESS);
        assert_eq!(response.payload, vec![0, 0, 0, 0]);
        assert!(machine.is_registered(43));

        assert_eq!(machine.process(MAC_43, &deregister).status, AemStatus::SUCCESS);
        assert!(!machine.is_registered(43));
    }

    #[test]
    fn ownership_change_notifies_other_registered_controllers() {
        let (mut machine, port) = setup();
        for (controller, mac) in [(43, MAC_43), (44, MAC_44)] {
            let register =
                simple(controller, AemCommandType::REGISTER_UNSOLICITED_NOTIFICATION, Vec::new());
            machine.handle(mac, &register);
        }
        port.take_sent();

        machine.handle(MAC_43, &acquire(43, 0, 0));
        let frames = sent(&port);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].0, MAC_43);
        assert!(!frames[0].1.unsolicited);
        assert_eq!(frames[1].0, MAC_44);
        assert!(frames[1].1.unsolicited);
        assert_eq!(frames[1].1.controller_entity_id, 44);
        assert_eq!(frames[1].1.command_type, AemCommandType::ACQUIRE_ENTITY);
        assert_eq!(frames[1].1.sequence_id, 0);

        // A refused acquire changes nothing and notifies nobody.
        machine.handle(MAC_44, &acquire(44, 0, 0));
        assert_eq!(sent(&port).len(), 1);
    }

    #[test]
    fn read_entity_descriptor() {
        let (mut machine, port) = setup();
        machine.handle(MAC_43, &read_descriptor(DescriptorType::Entity as u16, 0));
        let frames = sent(&port);
        assert_eq!(frames.len(), 1);
        let (destination, response) = &frames[0];
        assert_eq!(*destination, MAC_43);
        assert_eq!(response.status, AemStatus::SUCCESS);
        assert_eq!(response.payload.len(), 4 + ENTITY_LEN);
        assert_eq!(&response.payload[..4], &[0, 0, 0, 0]);
        assert_eq!(get_u16(&response.payload, 4), DescriptorType::Entity as u16);
        assert_eq!(get_u64(&response.payload, 8), ENTITY);
    }

    #[test]
    fn read_unknown_descriptor_is_not_implemented() {
        let (mut machine, _) = setup();
        let response = machine.process(MAC_43, &read_descriptor(0x0003, 0));
        assert_eq!(response.status, AemStatus::NOT_IMPLEMENTED);
    }

    fn with_audio_mappings(count: u16) -> (EntityModelStateMachine, Arc<LoopbackPort>) {
        let port = LoopbackPort::standalone("lo0", MacAddr([0x02, 0, 0, 0, 0, 0x42]));
        let mut config = EntityConfig::default();
        config.audio_map.number_of_mappings = Some(count);
        let machine = EntityModelStateMachine::new(
            shared(EntityInfo::new(ENTITY)),
            Arc::new(config),
            Ownership::new(),
            vec![port.clone()],
        );
        (machine, port)
    }

    #[test]
    fn descriptor_larger_than_a_response_is_not_implemented() {
        let (mut machine, port) = with_audio_mappings(300);
        let command = read_descriptor(DescriptorType::AudioMap as u16, 0);
        machine.handle(MAC_43, &command);

        let frames = sent(&port);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].1.status, AemStatus::NOT_IMPLEMENTED);
        assert_eq!(frames[0].1.payload, command.payload);

        let (mut machine, _) = with_audio_mappings(200);
        let response = machine.process(MAC_43, &command);
        assert_eq!(response.status, AemStatus::SUCCESS);
        assert!(response.to_bytes().is_ok());
    }

    #[test]
    fn short_payload_is_bad_arguments() {
        let (mut machine, _) = setup();
        let command = simple(43, AemCommandType::READ_DESCRIPTOR, vec![0, 0]);
        let response = machine.process(MAC_43, &command);
        assert_eq!(response.status, AemStatus::BAD_ARGUMENTS);
    }

    #[test]
    fn placeholder_bodies() {
        let (mut machine, _) = setup();
        let target = vec![0x00, 0x09, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00];
        let query = |command_type| simple(43, command_type, target.clone());

        let avb = machine.process(MAC_43, &query(AemCommandType::GET_AVB_INFO));
        assert_eq!(avb.status, AemStatus::SUCCESS);
        assert_eq!(avb.payload.len(), 20);
        assert_eq!(get_u64(&avb.payload, 4), 0xAABB);
        assert_eq!(avb.payload[16], 3);

        let path = machine.process(MAC_43, &query(AemCommandType::GET_AS_PATH));
        assert_eq!(path.status, AemStatus::NOT_IMPLEMENTED);
        assert_eq!(get_u16(&path.payload, 2), 1);
        assert_eq!(get_u64(&path.payload, 4), ENTITY);

        let map = machine.process(MAC_43, &query(AemCommandType::GET_AUDIO_MAP));
        assert_eq!(map.payload.len(), 12);
        assert_eq!(get_u16(&map.payload, 6), 2);
        assert_eq!(get_u16(&map.payload, 8), 8);

        let counters = machine.process(MAC_43, &query(AemCommandType::GET_COUNTERS));
        assert_eq!(counters.payload.len(), 8 + 128);
    }

    #[test]
    fn unknown_command_gets_bare_header() {
        let (mut machine, port) = setup();
        machine.handle(MAC_43, &simple(43, AemCommandType::REBOOT, vec![1, 2, 3, 4]));
        let frames = port.take_sent();
        assert_eq!(frames[0].payload.len(), AEM_HEADER_LEN);
        let response = AemPdu::decode(&frames[0].payload).unwrap();
        assert_eq!(response.status, AemStatus::NOT_IMPLEMENTED);
        assert_eq!(response.sequence_id, 9);
    }

    #[test]
    fn callback_accepts_only_commands_for_us() {
        let mailbox = Arc::new(Mailbox::new());
        let callback = EntityModelStateMachine::callback(ENTITY, mailbox.clone());
        let command = simple(43, AemCommandType::READ_DESCRIPTOR, Vec::new());
        let response = command.respond(AemStatus::SUCCESS, Vec::new());
        let foreign = AemPdu {
            target_entity_id: 7,
            ..command.clone()
        };
        for pdu in [response, foreign, command.clone()] {
            callback(&Inbound { source: MAC_43, pdu: Pdu::Aem(pdu) });
        }
        assert_eq!(
            mailbox.try_recv(),
            Some(EntityModelEvent::Received { source: MAC_43, command })
        );
        assert!(mailbox.is_empty());
    }
}
