use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::RwLock;

use super::ADP_DESTINATION;
use crate::codec::{AdpMessageType, Adpdu, EntityId, MacAddr};
use crate::error::Result;
use crate::mailbox::{EngineClock, Mailbox, Next, TICK};
use crate::transport::{Handler, Inbound, Pdu, Protocol, Registrations, Transport, send_all};

/// A remote entity seen through its ENTITY_AVAILABLE announcements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredEntity {
    pub info: Adpdu,
    /// MAC the last announcement came from.
    pub source: MacAddr,
    /// Engine time (ms) after which the entity is forgotten.
    pub timeout: u64,
}

/// Read handle on the discovery table. Clones share the table.
#[derive(Debug, Clone, Default)]
pub struct DiscoveredEntities {
    entities: Arc<RwLock<HashMap<u64, DiscoveredEntity>>>,
}

impl DiscoveredEntities {
    pub fn get(&self, entity_id: u64) -> Option<DiscoveredEntity> {
        self.entities.read().get(&entity_id).cloned()
    }

    pub fn contains(&self, entity_id: u64) -> bool {
        self.entities.read().contains_key(&entity_id)
    }

    pub fn len(&self) -> usize {
        self.entities.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Known entity ids, sorted.
    pub fn ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.entities.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    Received { source: MacAddr, pdu: Adpdu },
    /// Send ENTITY_DISCOVER for one entity, or everyone with `0`.
    Discover(u64),
}

/// Discovery state machine (IEEE 1722.1-2021, 6.2.6), controller side.
pub struct DiscoveryStateMachine {
    entity_id: u64,
    transports: Vec<Arc<dyn Transport>>,
    entities: DiscoveredEntities,
}

impl DiscoveryStateMachine {
    /// `entity_id` is our own id; announcements carrying it are ignored.
    pub fn new(entity_id: u64, transports: Vec<Arc<dyn Transport>>) -> Self {
        Self {
            entity_id,
            transports,
            entities: DiscoveredEntities::default(),
        }
    }

    pub fn entities(&self) -> DiscoveredEntities {
        self.entities.clone()
    }

    pub fn have_entity(&self, entity_id: u64) -> bool {
        self.entities.contains(entity_id)
    }

    pub fn add_entity(&mut self, source: MacAddr, info: Adpdu, now_ms: u64) {
        tracing::info!(
            entity_id = %EntityId(info.entity_id),
            entity_model_id = %EntityId(info.entity_model_id),
            %source,
            "entity discovered"
        );
        self.insert(source, info, now_ms);
    }

    pub fn update_entity(&mut self, source: MacAddr, info: Adpdu, now_ms: u64) {
        tracing::trace!(
            entity_id = %EntityId(info.entity_id),
            available_index = info.available_index,
            "entity refreshed"
        );
        self.insert(source, info, now_ms);
    }

    pub fn remove_entity(&mut self, entity_id: u64) {
        if self.entities.entities.write().remove(&entity_id).is_some() {
            tracing::info!(entity_id = %EntityId(entity_id), "entity removed");
        }
    }

    /// Send ENTITY_DISCOVER on every interface. `0` asks everyone.
    pub fn tx_discover(&self, entity_id: u64) -> Result<usize> {
        tracing::debug!(entity_id = %EntityId(entity_id), "ENTITY_DISCOVER");
        send_all(&self.transports, ADP_DESTINATION, &Pdu::Adp(Adpdu::discover(entity_id)))
    }

    pub fn handle(&mut self, event: DiscoveryEvent, now_ms: u64) {
        match event {
            DiscoveryEvent::Received { source, pdu } => self.rx_adpdu(source, pdu, now_ms),
            DiscoveryEvent::Discover(entity_id) => {
                if let Err(e) = self.tx_discover(entity_id) {
                    tracing::warn!(error = %e, "could not send ENTITY_DISCOVER");
                }
            }
        }
    }

    /// Forget every entity whose announcement has expired.
    pub fn remove_expired(&mut self, now_ms: u64) {
        let expired: Vec<u64> = self
            .entities
            .entities
            .read()
            .iter()
            .filter(|(_, entity)| now_ms >= entity.timeout)
            .map(|(id, _)| *id)
            .collect();
        for entity_id in expired {
            tracing::debug!(entity_id = %EntityId(entity_id), "entity timed out");
            self.remove_entity(entity_id);
        }
    }

    fn rx_adpdu(&mut self, source: MacAddr, pdu: Adpdu, now_ms: u64) {
        if pdu.entity_id == self.entity_id {
            return;
        }
        match pdu.message_type {
            AdpMessageType::EntityAvailable => {
                if self.have_entity(pdu.entity_id) {
                    self.update_entity(source, pdu, now_ms);
                } else {
                    self.add_entity(source, pdu, now_ms);
                }
            }
            AdpMessageType::EntityDeparting => self.remove_entity(pdu.entity_id),
            AdpMessageType::EntityDiscover => {}
        }
    }

    fn insert(&mut self, source: MacAddr, info: Adpdu, now_ms: u64) {
        // The header field is half the validity, the entry lives for twice
        // the field.
        let timeout = now_ms + u64::from(info.valid_time_secs()) * 1000;
        self.entities.entities.write().insert(
            info.entity_id,
            DiscoveredEntity {
                info,
                source,
                timeout,
            },
        );
    }

    /// Transport callback posting every received ADPDU to `mailbox`.
    pub fn callback(mailbox: Arc<Mailbox<DiscoveryEvent>>) -> Handler {
        Arc::new(move |inbound: &Inbound| {
            if let Pdu::Adp(pdu) = &inbound.pdu {
                mailbox.post(DiscoveryEvent::Received {
                    source: inbound.source,
                    pdu: pdu.clone(),
                });
            }
        })
    }

    pub fn spawn(self, mailbox: Arc<Mailbox<DiscoveryEvent>>) -> Result<JoinHandle<()>> {
        let registrations = Registrations::register_all(
            &self.transports,
            Protocol::Adp,
            Self::callback(mailbox.clone()),
        );
        let handle = thread::Builder::new()
            .name("adp-discovery".to_string())
            .spawn(move || {
                self.run(&mailbox);
                drop(registrations);
            })?;
        Ok(handle)
    }

    fn run(mut self, mailbox: &Mailbox<DiscoveryEvent>) {
        tracing::info!("ADP discovery started");

        let clock = EngineClock::start();
        loop {
            let next = mailbox.recv_timeout(TICK);
            let now_ms = clock.now_ms();
            match next {
                Next::Event(event) => self.handle(event, now_ms),
                Next::Timeout => {}
                Next::Terminate => break,
            }
            self.remove_expired(now_ms);
        }
        tracing::info!(known = self.entities.len(), "ADP discovery stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityInfo;
    use crate::transport::LoopbackPort;

    const PEER_MAC: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 0x43]);

    fn announcement(entity_id: u64, message_type: AdpMessageType) -> DiscoveryEvent {
        let info = EntityInfo {
            valid_time: 10,
            ..EntityInfo::new(entity_id)
        };
        DiscoveryEvent::Received {
            source: PEER_MAC,
            pdu: info.to_adpdu(message_type),
        }
    }

    fn setup() -> (DiscoveryStateMachine, Arc<LoopbackPort>) {
        let port = LoopbackPort::standalone("lo0", MacAddr([0x02, 0, 0, 0, 0, 0x42]));
        (DiscoveryStateMachine::new(42, vec![port.clone()]), port)
    }

    #[test]
    fn available_adds_then_refreshes() {
        let (mut machine, _) = setup();
        let view = machine.entities();

        machine.handle(announcement(43, AdpMessageType::EntityAvailable), 0);
        assert!(machine.have_entity(43));
        assert_eq!(view.get(43).unwrap().timeout, 10_000);
        assert_eq!(view.get(43).unwrap().source, PEER_MAC);

        machine.handle(announcement(43, AdpMessageType::EntityAvailable), 4_000);
        assert_eq!(view.get(43).unwrap().timeout, 14_000);
        assert_eq!(view.len(), 1);
    }

    #[test]
    fn departing_removes() {
        let (mut machine, _) = setup();
        machine.handle(announcement(43, AdpMessageType::EntityAvailable), 0);
        machine.handle(announcement(43, AdpMessageType::EntityDeparting), 1);
        assert!(!machine.have_entity(43));
    }

    #[test]
    fn own_announcements_are_ignored() {
        let (mut machine, _) = setup();
        machine.handle(announcement(42, AdpMessageType::EntityAvailable), 0);
        assert!(machine.entities().is_empty());
    }

    #[test]
    fn expired_entities_are_dropped() {
        let (mut machine, _) = setup();
        machine.handle(announcement(43, AdpMessageType::EntityAvailable), 0);
        machine.handle(announcement(44, AdpMessageType::EntityAvailable), 5_000);

        machine.remove_expired(9_999);
        assert_eq!(machine.entities().ids(), vec![43, 44]);
        machine.remove_expired(10_000);
        assert_eq!(machine.entities().ids(), vec![44]);
    }

    #[test]
    fn discover_request_goes_out() {
        let (mut machine, port) = setup();
        machine.handle(DiscoveryEvent::Discover(0), 0);
        let frames = port.take_sent();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].destination, ADP_DESTINATION);
        let pdu = Adpdu::decode(&frames[0].payload).unwrap();
        assert_eq!(pdu.message_type, AdpMessageType::EntityDiscover);
        assert_eq!(pdu.entity_id, 0);
    }
}
