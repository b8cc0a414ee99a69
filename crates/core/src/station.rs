use std::sync::Arc;
use std::thread::JoinHandle;

use crate::acmp::{ListenerEvent, ListenerStateMachine};
use crate::adp::{
    AdvertiseEvent, AdvertisingEntityStateMachine, DiscoveredEntities, DiscoveryEvent,
    DiscoveryStateMachine, InterfaceEvent, InterfaceStateMachine,
};
use crate::aecp::{EntityModelEvent, EntityModelStateMachine, Ownership};
use crate::aem::EntityConfig;
use crate::codec::EntityId;
use crate::entity::{EntityInfo, SharedEntityInfo, shared};
use crate::error::{AvdeccError, Result};
use crate::mailbox::Mailbox;
use crate::transport::Transport;

/// Everything needed to host one entity.
#[derive(Debug, Clone, Default)]
pub struct StationConfig {
    pub info: EntityInfo,
    /// Descriptor overrides served through READ_DESCRIPTOR.
    pub config: EntityConfig,
    /// Also run the controller-side discovery engine.
    pub discover: bool,
}

/// Mailboxes and threads of a running station.
#[derive(Default)]
struct Engines {
    advertise: Option<Arc<Mailbox<AdvertiseEvent>>>,
    interfaces: Vec<Arc<Mailbox<InterfaceEvent>>>,
    listener: Option<Arc<Mailbox<ListenerEvent>>>,
    entity_model: Option<Arc<Mailbox<EntityModelEvent>>>,
    discovery: Option<Arc<Mailbox<DiscoveryEvent>>>,
    handles: Vec<JoinHandle<()>>,
}

impl Engines {
    /// Terminate every loop and wait for it. The advertising timer goes
    /// first so nothing asks for an announcement after the departure.
    fn shutdown(self) {
        if let Some(mailbox) = &self.advertise {
            mailbox.terminate();
        }
        for mailbox in &self.interfaces {
            mailbox.terminate();
        }
        if let Some(mailbox) = &self.listener {
            mailbox.terminate();
        }
        if let Some(mailbox) = &self.entity_model {
            mailbox.terminate();
        }
        if let Some(mailbox) = &self.discovery {
            mailbox.terminate();
        }
        for handle in self.handles {
            let name = handle.thread().name().unwrap_or("engine").to_string();
            if handle.join().is_err() {
                tracing::warn!(thread = %name, "engine thread panicked");
            }
        }
    }
}

/// An ATDECC end station hosting one entity.
///
/// Owns the engines and the threads they run on:
///
/// - one ADP interface loop per transport, plus the advertising timer;
/// - the ACMP listener;
/// - the AEM entity model;
/// - optionally, ADP discovery of other entities.
///
/// The host keeps a handle on the shared [`EntityInfo`] and can update it
/// while the station runs. A changed grandmaster or configuration index
/// triggers a new announcement.
pub struct EndStation {
    info: SharedEntityInfo,
    config: Arc<EntityConfig>,
    discover: bool,
    transports: Vec<Arc<dyn Transport>>,
    ownership: Ownership,
    discovered: DiscoveredEntities,
    engines: Option<Engines>,
}

impl EndStation {
    pub fn new(config: StationConfig, transports: Vec<Arc<dyn Transport>>) -> Self {
        Self {
            info: shared(config.info),
            config: Arc::new(config.config),
            discover: config.discover,
            transports,
            ownership: Ownership::new(),
            discovered: DiscoveredEntities::default(),
            engines: None,
        }
    }

    pub fn start(&mut self) -> Result<()> {
        if self.engines.is_some() {
            return Err(AvdeccError::AlreadyRunning);
        }
        if self.transports.is_empty() {
            return Err(AvdeccError::NoInterfaces);
        }

        let mut engines = Engines::default();
        match self.spawn_engines(&mut engines) {
            Ok(()) => {
                tracing::info!(
                    entity_id = %EntityId(self.entity_id()),
                    interfaces = self.transports.len(),
                    discover = self.discover,
                    "end station started"
                );
                self.engines = Some(engines);
                Ok(())
            }
            Err(e) => {
                engines.shutdown();
                Err(e)
            }
        }
    }

    fn spawn_engines(&mut self, engines: &mut Engines) -> Result<()> {
        let (entity_id, listener_stream_sinks) = {
            let info = self.info.read();
            (info.entity_id, info.listener_stream_sinks)
        };

        // Each engine registers its handlers before its spawn returns, so
        // nothing sent once start() returns is missed.
        for transport in &self.transports {
            let mailbox = Arc::new(Mailbox::new());
            let machine = InterfaceStateMachine::new(self.info.clone(), transport.clone());
            engines.handles.push(machine.spawn(mailbox.clone())?);
            engines.interfaces.push(mailbox);
        }

        let mailbox = Arc::new(Mailbox::new());
        let listener = ListenerStateMachine::new(
            entity_id,
            listener_stream_sinks,
            self.ownership.clone(),
            self.transports.clone(),
        );
        engines.handles.push(listener.spawn(mailbox.clone())?);
        engines.listener = Some(mailbox);

        let mailbox = Arc::new(Mailbox::new());
        let entity_model = EntityModelStateMachine::new(
            self.info.clone(),
            self.config.clone(),
            self.ownership.clone(),
            self.transports.clone(),
        );
        engines.handles.push(entity_model.spawn(mailbox.clone())?);
        engines.entity_model = Some(mailbox);

        if self.discover {
            let mailbox = Arc::new(Mailbox::new());
            let discovery = DiscoveryStateMachine::new(entity_id, self.transports.clone());
            self.discovered = discovery.entities();
            engines.handles.push(discovery.spawn(mailbox.clone())?);
            engines.discovery = Some(mailbox);
        }

        let mailbox = Arc::new(Mailbox::new());
        let advertise =
            AdvertisingEntityStateMachine::new(self.info.clone(), engines.interfaces.clone());
        engines.handles.push(advertise.spawn(mailbox.clone())?);
        engines.advertise = Some(mailbox);
        Ok(())
    }

    /// Stop every engine. Each interface sends ENTITY_DEPARTING once.
    pub fn stop(&mut self) {
        if let Some(engines) = self.engines.take() {
            engines.shutdown();
            tracing::info!(entity_id = %EntityId(self.entity_id()), "end station stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.engines.is_some()
    }

    /// Announce now instead of waiting for the next cycle.
    pub fn advertise(&self) -> Result<()> {
        let mailbox = self
            .engines
            .as_ref()
            .and_then(|engines| engines.advertise.as_ref())
            .ok_or(AvdeccError::NotStarted)?;
        mailbox.post(AdvertiseEvent::Advertise);
        Ok(())
    }

    /// Send ENTITY_DISCOVER for `entity_id`, or for everyone with `0`.
    ///
    /// Fails with [`AvdeccError::NotStarted`] unless the station runs with
    /// discovery enabled.
    pub fn discover(&self, entity_id: u64) -> Result<()> {
        let mailbox = self
            .engines
            .as_ref()
            .and_then(|engines| engines.discovery.as_ref())
            .ok_or(AvdeccError::NotStarted)?;
        mailbox.post(DiscoveryEvent::Discover(entity_id));
        Ok(())
    }

    pub fn entity_id(&self) -> u64 {
        self.info.read().entity_id
    }

    pub fn info(&self) -> SharedEntityInfo {
        self.info.clone()
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership.clone()
    }

    /// Entities seen by the discovery engine. Empty unless discovery runs.
    pub fn discovered(&self) -> DiscoveredEntities {
        self.discovered.clone()
    }
}

impl Drop for EndStation {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{AdpMessageType, Adpdu, MacAddr};
    use crate::transport::LoopbackPort;

    fn station(discover: bool) -> (EndStation, Arc<LoopbackPort>) {
        let port = LoopbackPort::standalone("lo0", MacAddr([0x02, 0, 0, 0, 0, 0x42]));
        let config = StationConfig {
            info: EntityInfo::new(42),
            discover,
            ..StationConfig::default()
        };
        (EndStation::new(config, vec![port.clone()]), port)
    }

    #[test]
    fn requests_before_start_fail() {
        let (station, _) = station(true);
        assert!(!station.is_running());
        assert!(matches!(station.advertise(), Err(AvdeccError::NotStarted)));
        assert!(matches!(station.discover(0), Err(AvdeccError::NotStarted)));
    }

    #[test]
    fn start_twice_is_rejected() {
        let (mut station, _) = station(false);
        station.start().unwrap();
        assert!(matches!(station.start(), Err(AvdeccError::AlreadyRunning)));
        station.stop();
        assert!(!station.is_running());
    }

    #[test]
    fn discover_needs_discovery_enabled() {
        let (mut station, _) = station(false);
        station.start().unwrap();
        assert!(station.advertise().is_ok());
        assert!(matches!(station.discover(0), Err(AvdeccError::NotStarted)));
    }

    #[test]
    fn handlers_are_in_place_when_start_returns() {
        let (mut station, port) = station(true);
        station.start().unwrap();
        // ADP interface, ACMP listener, AEM entity model and ADP discovery.
        assert_eq!(port.handler_count(), 4);
        station.stop();
        assert_eq!(port.handler_count(), 0);
    }

    #[test]
    fn no_transports_is_an_error() {
        let mut station = EndStation::new(StationConfig::default(), Vec::new());
        assert!(matches!(station.start(), Err(AvdeccError::NoInterfaces)));
    }

    #[test]
    fn stop_departs_once() {
        let (mut station, port) = station(false);
        station.start().unwrap();
        station.stop();
        station.stop();

        let departing = port
            .sent_frames()
            .iter()
            .filter_map(|frame| Adpdu::decode(&frame.payload).ok())
            .filter(|pdu| pdu.message_type == AdpMessageType::EntityDeparting)
            .count();
        assert_eq!(departing, 1);
    }
}
