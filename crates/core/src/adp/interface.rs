use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::ADP_DESTINATION;
use crate::codec::{AdpMessageType, Adpdu, EntityId};
use crate::entity::SharedEntityInfo;
use crate::error::Result;
use crate::mailbox::{Mailbox, Next, TICK};
use crate::transport::{Handler, Inbound, Pdu, Protocol, Registrations, Transport};

/// Work for an interface loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterfaceEvent {
    /// Send ENTITY_AVAILABLE on the next step.
    Advertise,
    /// An ENTITY_DISCOVER seen on this interface.
    Received(Adpdu),
}

/// Advertising and discovery interface state machine for one interface
/// (IEEE 1722.1-2021, 6.2.5 and 6.2.6).
pub struct InterfaceStateMachine {
    info: SharedEntityInfo,
    transport: Arc<dyn Transport>,
    do_advertise: bool,
    last_link_is_up: bool,
    advertised_grandmaster_id: u64,
    advertised_configuration_index: Option<u16>,
}

impl InterfaceStateMachine {
    pub fn new(info: SharedEntityInfo, transport: Arc<dyn Transport>) -> Self {
        Self {
            info,
            transport,
            do_advertise: false,
            last_link_is_up: false,
            advertised_grandmaster_id: 0,
            advertised_configuration_index: None,
        }
    }

    pub fn do_advertise(&self) -> bool {
        self.do_advertise
    }

    pub fn perform_advertise(&mut self) {
        self.do_advertise = true;
    }

    /// One loop iteration: absorb `event`, look for state changes worth an
    /// announcement, and announce if anything asked for it.
    pub fn step(&mut self, event: Option<InterfaceEvent>) {
        match event {
            Some(InterfaceEvent::Advertise) => self.perform_advertise(),
            Some(InterfaceEvent::Received(pdu)) => self.rx_discover(&pdu),
            None => {}
        }
        self.check_changes();

        if self.do_advertise {
            self.do_advertise = false;
            self.tx_entity_available();
        }
    }

    fn rx_discover(&mut self, pdu: &Adpdu) {
        if pdu.message_type != AdpMessageType::EntityDiscover {
            return;
        }
        let entity_id = self.info.read().entity_id;
        if pdu.entity_id == 0 || pdu.entity_id == entity_id {
            tracing::debug!(
                interface = self.transport.name(),
                entity_id = %EntityId(pdu.entity_id),
                "ENTITY_DISCOVER"
            );
            self.perform_advertise();
        }
    }

    fn check_changes(&mut self) {
        let (grandmaster_id, configuration_index) = {
            let info = self.info.read();
            (info.gptp_grandmaster_id, info.current_configuration_index)
        };

        if grandmaster_id != self.advertised_grandmaster_id {
            tracing::debug!(grandmaster = %EntityId(grandmaster_id), "gPTP grandmaster changed");
            self.advertised_grandmaster_id = grandmaster_id;
            self.perform_advertise();
        }

        let link_is_up = self.transport.link_is_up();
        if link_is_up && !self.last_link_is_up {
            tracing::debug!(interface = self.transport.name(), "link up");
            self.perform_advertise();
        }
        self.last_link_is_up = link_is_up;

        if self.advertised_configuration_index != Some(configuration_index) {
            self.advertised_configuration_index = Some(configuration_index);
            self.perform_advertise();
        }
    }

    pub fn tx_entity_available(&mut self) {
        let pdu = {
            let mut info = self.info.write();
            let pdu = info.to_adpdu(AdpMessageType::EntityAvailable);
            info.available_index = info.available_index.wrapping_add(1);
            pdu
        };
        tracing::debug!(
            interface = self.transport.name(),
            entity_id = %EntityId(pdu.entity_id),
            available_index = pdu.available_index,
            "ENTITY_AVAILABLE"
        );
        self.send(&pdu);
    }

    pub fn tx_entity_departing(&mut self) {
        let pdu = {
            let mut info = self.info.write();
            let pdu = info.to_adpdu(AdpMessageType::EntityDeparting);
            info.available_index = 0;
            pdu
        };
        tracing::debug!(
            interface = self.transport.name(),
            entity_id = %EntityId(pdu.entity_id),
            "ENTITY_DEPARTING"
        );
        self.send(&pdu);
    }

    fn send(&self, pdu: &Adpdu) {
        let result = pdu
            .to_bytes()
            .and_then(|bytes| self.transport.send(ADP_DESTINATION, &bytes));
        if let Err(e) = result {
            tracing::warn!(
                interface = self.transport.name(),
                message_type = ?pdu.message_type,
                error = %e,
                "could not send ADPDU"
            );
        }
    }

    /// Transport callback posting ENTITY_DISCOVER requests to `mailbox`.
    pub fn callback(mailbox: Arc<Mailbox<InterfaceEvent>>) -> Handler {
        Arc::new(move |inbound: &Inbound| {
            if let Pdu::Adp(pdu) = &inbound.pdu {
                if pdu.message_type == AdpMessageType::EntityDiscover {
                    mailbox.post(InterfaceEvent::Received(pdu.clone()));
                }
            }
        })
    }

    /// Run the interface loop on its own thread until `mailbox` is
    /// terminated. ENTITY_DEPARTING goes out exactly once on the way out.
    pub fn spawn(self, mailbox: Arc<Mailbox<InterfaceEvent>>) -> Result<JoinHandle<()>> {
        let registration = Registrations::register_all(
            std::slice::from_ref(&self.transport),
            Protocol::Adp,
            Self::callback(mailbox.clone()),
        );
        let handle = thread::Builder::new()
            .name(format!("adp-interface-{}", self.transport.name()))
            .spawn(move || {
                self.run(&mailbox);
                drop(registration);
            })?;
        Ok(handle)
    }

    fn run(mut self, mailbox: &Mailbox<InterfaceEvent>) {
        let transport = self.transport.clone();
        tracing::info!(interface = transport.name(), "ADP interface started");

        loop {
            match mailbox.recv_timeout(TICK) {
                Next::Event(event) => self.step(Some(event)),
                Next::Timeout => self.step(None),
                Next::Terminate => break,
            }
        }

        self.tx_entity_departing();
        tracing::info!(interface = transport.name(), "ADP interface stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::MacAddr;
    use crate::entity::{EntityInfo, shared};
    use crate::transport::LoopbackPort;

    fn setup() -> (InterfaceStateMachine, Arc<LoopbackPort>, SharedEntityInfo) {
        let port = LoopbackPort::standalone("lo0", MacAddr([0x02, 0, 0, 0, 0, 0x42]));
        let info = shared(EntityInfo::new(42));
        let machine = InterfaceStateMachine::new(info.clone(), port.clone());
        (machine, port, info)
    }

    /// Run the first step so link and configuration are considered advertised.
    fn settled() -> (InterfaceStateMachine, Arc<LoopbackPort>, SharedEntityInfo) {
        let (mut machine, port, info) = setup();
        machine.step(None);
        port.take_sent();
        (machine, port, info)
    }

    fn sent(port: &LoopbackPort) -> Vec<Adpdu> {
        port.take_sent()
            .into_iter()
            .map(|frame| Adpdu::decode(&frame.payload).unwrap())
            .collect()
    }

    #[test]
    fn first_step_announces() {
        let (mut machine, port, info) = setup();
        machine.step(None);
        let frames = sent(&port);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].message_type, AdpMessageType::EntityAvailable);
        assert_eq!(frames[0].available_index, 0);
        assert_eq!(info.read().available_index, 1);
        assert!(!machine.do_advertise());
    }

    #[test]
    fn idle_step_is_silent() {
        let (mut machine, port, _) = settled();
        machine.step(None);
        assert!(port.sent_frames().is_empty());
    }

    #[test]
    fn advertise_request_increments_available_index() {
        let (mut machine, port, _) = settled();
        machine.step(Some(InterfaceEvent::Advertise));
        machine.step(Some(InterfaceEvent::Advertise));
        let indexes: Vec<u32> = sent(&port).iter().map(|pdu| pdu.available_index).collect();
        assert_eq!(indexes, vec![1, 2]);
    }

    #[test]
    fn discover_for_us_or_everyone_triggers_announcement() {
        let (mut machine, port, _) = settled();
        for target in [42, 0] {
            machine.step(Some(InterfaceEvent::Received(Adpdu::discover(target))));
            assert_eq!(sent(&port).len(), 1);
        }
        machine.step(Some(InterfaceEvent::Received(Adpdu::discover(41))));
        assert!(port.sent_frames().is_empty());
    }

    #[test]
    fn grandmaster_and_configuration_changes_trigger_announcement() {
        let (mut machine, port, info) = settled();
        info.write().gptp_grandmaster_id = 1;
        machine.step(None);
        assert_eq!(sent(&port)[0].gptp_grandmaster_id, 1);

        info.write().current_configuration_index = 1;
        machine.step(None);
        assert_eq!(sent(&port)[0].current_configuration_index, 1);
    }

    #[test]
    fn only_link_up_transition_triggers_announcement() {
        let (mut machine, port, _) = settled();
        port.set_link_up(false);
        machine.step(None);
        assert!(port.sent_frames().is_empty());

        port.set_link_up(true);
        machine.step(None);
        assert_eq!(sent(&port).len(), 1);
    }

    #[test]
    fn departing_resets_available_index() {
        let (mut machine, port, info) = settled();
        machine.tx_entity_departing();
        let frames = sent(&port);
        assert_eq!(frames[0].message_type, AdpMessageType::EntityDeparting);
        assert_eq!(frames[0].available_index, 1);
        assert_eq!(info.read().available_index, 0);
    }

    #[test]
    fn loop_departs_exactly_once() {
        let (machine, port, _) = settled();
        let mailbox = Arc::new(Mailbox::new());
        mailbox.terminate();
        machine.spawn(mailbox).unwrap().join().unwrap();

        let frames = sent(&port);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].message_type, AdpMessageType::EntityDeparting);
    }

    #[test]
    fn handler_is_registered_when_spawn_returns() {
        let (machine, port, _) = settled();
        let mailbox = Arc::new(Mailbox::new());
        let handle = machine.spawn(mailbox.clone()).unwrap();
        assert_eq!(port.handler_count(), 1);

        mailbox.terminate();
        handle.join().unwrap();
        assert_eq!(port.handler_count(), 0);
    }
}
