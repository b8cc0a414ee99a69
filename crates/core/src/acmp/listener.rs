use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::inflight::{Inflight, InflightCommand};
use super::{ACMP_DESTINATION, timeout_ms};
use crate::aecp::Ownership;
use crate::codec::{AcmpMessageType, AcmpStatus, Acmpdu, EntityId, MacAddr};
use crate::error::Result;
use crate::mailbox::{EngineClock, Mailbox, Next, TICK};
use crate::transport::{Handler, Inbound, Pdu, Protocol, Registrations, Transport, send_all};

/// Connection state of one listener stream sink.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListenerStreamInfo {
    pub talker_entity_id: u64,
    pub talker_unique_id: u16,
    pub connected: bool,
    pub pending_connection: bool,
    pub stream_id: u64,
    pub stream_dest_mac: MacAddr,
    pub controller_entity_id: u64,
    pub flags: u16,
    pub stream_vlan_id: u16,
}

impl ListenerStreamInfo {
    fn is_talker(&self, pdu: &Acmpdu) -> bool {
        self.talker_entity_id == pdu.talker_entity_id
            && self.talker_unique_id == pdu.talker_unique_id
    }
}

/// Work for the listener loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerEvent {
    Received(Acmpdu),
}

/// Listener state machine (IEEE 1722.1-2021, 8.2.4).
///
/// Pure state: every method that depends on time takes `now_ms`, the
/// engine clock in milliseconds. [`spawn`](Self::spawn) wraps it in a
/// thread fed by a [`Mailbox`].
pub struct ListenerStateMachine {
    entity_id: u64,
    listener_stream_sinks: u16,
    ownership: Ownership,
    transports: Vec<Arc<dyn Transport>>,
    streams: HashMap<u16, ListenerStreamInfo>,
    inflight: Inflight,
    sequence_id: u16,
}

impl ListenerStateMachine {
    pub fn new(
        entity_id: u64,
        listener_stream_sinks: u16,
        ownership: Ownership,
        transports: Vec<Arc<dyn Transport>>,
    ) -> Self {
        Self {
            entity_id,
            listener_stream_sinks,
            ownership,
            transports,
            streams: HashMap::new(),
            inflight: Inflight::new(),
            sequence_id: 0,
        }
    }

    pub fn entity_id(&self) -> u64 {
        self.entity_id
    }

    pub fn stream_info(&self, listener_unique_id: u16) -> Option<&ListenerStreamInfo> {
        self.streams.get(&listener_unique_id)
    }

    pub fn inflight(&self) -> &Inflight {
        &self.inflight
    }

    /// Dispatch one received PDU.
    ///
    /// Protocol refusals are answered on the wire. An error means a
    /// response or a forwarded command could not be sent at all.
    pub fn handle(&mut self, pdu: &Acmpdu, now_ms: u64) -> Result<()> {
        tracing::debug!(
            message_type = ?pdu.message_type,
            status = %pdu.status,
            controller = %EntityId(pdu.controller_entity_id),
            talker = %EntityId(pdu.talker_entity_id),
            listener_unique_id = pdu.listener_unique_id,
            "ACMP received"
        );
        match pdu.message_type {
            AcmpMessageType::ConnectRxCommand => self.handle_connect_rx_command(pdu, now_ms),
            AcmpMessageType::ConnectTxResponse => self.handle_connect_tx_response(pdu),
            AcmpMessageType::GetRxStateCommand => self.handle_get_rx_state_command(pdu),
            AcmpMessageType::DisconnectRxCommand => self.handle_disconnect_rx_command(pdu, now_ms),
            AcmpMessageType::DisconnectTxResponse => self.handle_disconnect_tx_response(pdu),
            other => {
                tracing::debug!(message_type = ?other, "ACMP message ignored");
                Ok(())
            }
        }
    }

    /// Retry or fail every in-flight command whose deadline has passed.
    ///
    /// Entries that were retried go back to the front of the ledger in the
    /// order they expired. Every expired entry is handled even when one of
    /// them fails; the last failure is returned.
    pub fn sweep_timeouts(&mut self, now_ms: u64) -> Result<()> {
        let mut retried = Vec::new();
        let mut outcome = Ok(());
        while let Some(mut entry) = self.inflight.pop_expired(now_ms) {
            tracing::trace!(
                message_type = ?entry.command.message_type,
                retried = entry.retried,
                deadline = entry.timeout,
                now_ms,
                "in-flight command expired"
            );
            let result = match entry.command.message_type {
                AcmpMessageType::ConnectTxCommand | AcmpMessageType::DisconnectTxCommand => {
                    if entry.retried {
                        self.talker_timed_out(entry)
                    } else {
                        match self.retry_command(&mut entry, now_ms) {
                            Ok(true) => {
                                retried.push(entry);
                                Ok(())
                            }
                            Ok(false) => Ok(()),
                            Err(e) => Err(e),
                        }
                    }
                }
                _ => Ok(()),
            };
            if let Err(e) = result {
                outcome = Err(e);
            }
        }
        self.inflight.requeue_front(retried);
        outcome
    }

    /// Time until the next in-flight deadline, if any.
    pub fn next_deadline_in(&self, now_ms: u64) -> Option<Duration> {
        self.inflight
            .iter()
            .next()
            .map(|front| Duration::from_millis(front.timeout.saturating_sub(now_ms)))
    }

    fn handle_connect_rx_command(&mut self, command: &Acmpdu, now_ms: u64) -> Result<()> {
        let status = if !self.valid_listener_unique(command.listener_unique_id) {
            AcmpStatus::LISTENER_UNKNOWN_ID
        } else if self.listener_is_acquired_or_locked_by_other(command) {
            AcmpStatus::CONTROLLER_NOT_AUTHORIZED
        } else if self.listener_is_connected(command) {
            AcmpStatus::LISTENER_EXCLUSIVE
        } else {
            if self.tx_command(AcmpMessageType::ConnectTxCommand, command, now_ms)? {
                let slot = self.streams.entry(command.listener_unique_id).or_default();
                slot.talker_entity_id = command.talker_entity_id;
                slot.talker_unique_id = command.talker_unique_id;
                slot.controller_entity_id = command.controller_entity_id;
                slot.pending_connection = true;
                tracing::info!(
                    listener_unique_id = command.listener_unique_id,
                    talker = %EntityId(command.talker_entity_id),
                    talker_unique_id = command.talker_unique_id,
                    "connection pending"
                );
            }
            return Ok(());
        };
        self.tx_response(AcmpMessageType::ConnectRxResponse, command, status)
    }

    fn handle_connect_tx_response(&mut self, response: &Acmpdu) -> Result<()> {
        if !self.valid_listener_unique(response.listener_unique_id) {
            tracing::debug!(
                listener_unique_id = response.listener_unique_id,
                "CONNECT_TX_RESPONSE for unknown sink"
            );
            return Ok(());
        }

        let status = if response.status == AcmpStatus::SUCCESS {
            self.connect_listener(response)
        } else {
            response.status
        };
        self.clear_pending(response.listener_unique_id);

        let reply = self.with_original_sequence_id(response);
        self.inflight.cancel_timeout(response);
        self.inflight.remove(response);
        self.tx_response(AcmpMessageType::ConnectRxResponse, &reply, status)
    }

    fn handle_get_rx_state_command(&mut self, command: &Acmpdu) -> Result<()> {
        if !self.valid_listener_unique(command.listener_unique_id) {
            return self.tx_response(
                AcmpMessageType::GetRxStateResponse,
                command,
                AcmpStatus::LISTENER_UNKNOWN_ID,
            );
        }
        let state = self.get_state(command);
        self.tx_response(AcmpMessageType::GetRxStateResponse, &state, AcmpStatus::SUCCESS)
    }

    fn handle_disconnect_rx_command(&mut self, command: &Acmpdu, now_ms: u64) -> Result<()> {
        if !self.valid_listener_unique(command.listener_unique_id) {
            self.tx_response(
                AcmpMessageType::DisconnectRxResponse,
                command,
                AcmpStatus::LISTENER_UNKNOWN_ID,
            )
        } else if self.listener_is_connected_to(command) {
            self.disconnect_listener(command);
            self.tx_command(AcmpMessageType::DisconnectTxCommand, command, now_ms)
                .map(|_| ())
        } else {
            self.tx_response(
                AcmpMessageType::DisconnectRxResponse,
                command,
                AcmpStatus::NOT_CONNECTED,
            )
        }
    }

    fn handle_disconnect_tx_response(&mut self, response: &Acmpdu) -> Result<()> {
        if !self.valid_listener_unique(response.listener_unique_id) {
            tracing::debug!(
                listener_unique_id = response.listener_unique_id,
                "DISCONNECT_TX_RESPONSE for unknown sink"
            );
            return Ok(());
        }
        let reply = self.with_original_sequence_id(response);
        self.inflight.cancel_timeout(response);
        self.inflight.remove(response);
        self.tx_response(AcmpMessageType::DisconnectRxResponse, &reply, response.status)
    }

    fn valid_listener_unique(&self, listener_unique_id: u16) -> bool {
        listener_unique_id < self.listener_stream_sinks
    }

    /// Connected or pending to a talker other than the one in `command`.
    ///
    /// A request naming the talker the slot already has is let through, so
    /// a controller can re-establish a stream after the talker vanished.
    pub fn listener_is_connected(&self, command: &Acmpdu) -> bool {
        self.streams
            .get(&command.listener_unique_id)
            .is_some_and(|slot| {
                (slot.connected || slot.pending_connection) && !slot.is_talker(command)
            })
    }

    pub fn listener_is_connected_to(&self, command: &Acmpdu) -> bool {
        self.streams
            .get(&command.listener_unique_id)
            .is_some_and(|slot| slot.connected && slot.is_talker(command))
    }

    fn listener_is_acquired_or_locked_by_other(&self, command: &Acmpdu) -> bool {
        self.ownership.held_by_other(command.controller_entity_id)
    }

    fn connect_listener(&mut self, response: &Acmpdu) -> AcmpStatus {
        let slot = self.streams.entry(response.listener_unique_id).or_default();
        slot.talker_entity_id = response.talker_entity_id;
        slot.talker_unique_id = response.talker_unique_id;
        slot.connected = true;
        slot.stream_id = response.stream_id;
        slot.stream_dest_mac = response.stream_dest_mac;
        slot.stream_vlan_id = response.stream_vlan_id;
        slot.flags = response.flags;
        slot.controller_entity_id = response.controller_entity_id;
        tracing::info!(
            listener_unique_id = response.listener_unique_id,
            stream_id = %EntityId(response.stream_id),
            dest_mac = %response.stream_dest_mac,
            "listener connected"
        );
        AcmpStatus::SUCCESS
    }

    fn disconnect_listener(&mut self, command: &Acmpdu) -> AcmpStatus {
        if let Some(slot) = self.streams.get_mut(&command.listener_unique_id) {
            *slot = ListenerStreamInfo::default();
        }
        tracing::info!(listener_unique_id = command.listener_unique_id, "listener disconnected");
        AcmpStatus::SUCCESS
    }

    fn get_state(&self, command: &Acmpdu) -> Acmpdu {
        let slot = self
            .streams
            .get(&command.listener_unique_id)
            .cloned()
            .unwrap_or_default();
        Acmpdu {
            stream_id: slot.stream_id,
            stream_dest_mac: slot.stream_dest_mac,
            stream_vlan_id: slot.stream_vlan_id,
            flags: slot.flags,
            talker_entity_id: slot.talker_entity_id,
            talker_unique_id: slot.talker_unique_id,
            connection_count: u16::from(slot.connected),
            ..command.clone()
        }
    }

    /// Copy of `response` carrying the sequence id of the controller
    /// command it answers, when one is in flight.
    fn with_original_sequence_id(&self, response: &Acmpdu) -> Acmpdu {
        let mut reply = response.clone();
        if let Some(entry) = self.inflight.find(response) {
            reply.sequence_id = entry.original_sequence_id;
        }
        reply
    }

    fn next_sequence_id(&mut self) -> u16 {
        let id = self.sequence_id;
        self.sequence_id = self.sequence_id.wrapping_add(1);
        id
    }

    /// Forward a controller command to the talker as `message_type` and
    /// track it in the ledger.
    ///
    /// `Ok(false)` when the talker could not be reached and the controller
    /// got COULD_NOT_SEND_MESSAGE instead.
    fn tx_command(
        &mut self,
        message_type: AcmpMessageType,
        command: &Acmpdu,
        now_ms: u64,
    ) -> Result<bool> {
        let Some(offset) = timeout_ms(message_type) else {
            return Ok(false);
        };
        let mut outgoing = command.with_type(message_type, AcmpStatus::SUCCESS);
        outgoing.sequence_id = self.next_sequence_id();

        match self.send(&outgoing) {
            Ok(()) => {
                self.inflight.push(InflightCommand {
                    command: outgoing,
                    original_sequence_id: command.sequence_id,
                    retried: false,
                    timeout: now_ms + offset,
                });
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(?message_type, error = %e, "could not send ACMP command");
                self.tx_response(
                    message_type.response(),
                    command,
                    AcmpStatus::COULD_NOT_SEND_MESSAGE,
                )?;
                Ok(false)
            }
        }
    }

    /// Resend an expired entry once, updating it in place.
    ///
    /// `Ok(false)` when the resend failed and the entry is finished.
    fn retry_command(&mut self, entry: &mut InflightCommand, now_ms: u64) -> Result<bool> {
        let message_type = entry.command.message_type;
        let Some(offset) = timeout_ms(message_type) else {
            return Ok(false);
        };
        tracing::debug!(
            ?message_type,
            talker = %EntityId(entry.command.talker_entity_id),
            "retrying"
        );

        match self.send(&entry.command) {
            Ok(()) => {
                entry.retried = true;
                entry.timeout = now_ms + offset;
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(?message_type, error = %e, "could not resend ACMP command");
                if message_type == AcmpMessageType::ConnectTxCommand {
                    self.clear_pending(entry.command.listener_unique_id);
                }
                let mut reply = entry.command.clone();
                reply.sequence_id = entry.original_sequence_id;
                self.tx_response(
                    message_type.response(),
                    &reply,
                    AcmpStatus::COULD_NOT_SEND_MESSAGE,
                )?;
                Ok(false)
            }
        }
    }

    /// The retry timed out too: give up and tell the controller.
    fn talker_timed_out(&mut self, entry: InflightCommand) -> Result<()> {
        let rx_response = match entry.command.message_type {
            AcmpMessageType::ConnectTxCommand => {
                self.clear_pending(entry.command.listener_unique_id);
                AcmpMessageType::ConnectRxResponse
            }
            _ => AcmpMessageType::DisconnectRxResponse,
        };
        tracing::info!(
            talker = %EntityId(entry.command.talker_entity_id),
            listener_unique_id = entry.command.listener_unique_id,
            "talker did not respond"
        );
        let mut reply = entry.command;
        reply.sequence_id = entry.original_sequence_id;
        self.tx_response(rx_response, &reply, AcmpStatus::LISTENER_TALKER_TIMEOUT)
    }

    fn clear_pending(&mut self, listener_unique_id: u16) {
        if let Some(slot) = self.streams.get_mut(&listener_unique_id) {
            slot.pending_connection = false;
        }
    }

    fn tx_response(
        &self,
        message_type: AcmpMessageType,
        command: &Acmpdu,
        status: AcmpStatus,
    ) -> Result<()> {
        let response = command.with_type(message_type, status);
        tracing::debug!(
            ?message_type,
            %status,
            sequence_id = response.sequence_id,
            "ACMP response"
        );
        self.send(&response)
    }

    fn send(&self, pdu: &Acmpdu) -> Result<()> {
        send_all(&self.transports, ACMP_DESTINATION, &Pdu::Acmp(pdu.clone())).map(|_| ())
    }

    /// Transport callback posting this listener's ACMP traffic to `mailbox`.
    pub fn callback(entity_id: u64, mailbox: Arc<Mailbox<ListenerEvent>>) -> Handler {
        Arc::new(move |inbound: &Inbound| {
            if let Pdu::Acmp(pdu) = &inbound.pdu {
                if pdu.listener_entity_id == entity_id {
                    mailbox.post(ListenerEvent::Received(pdu.clone()));
                }
            }
        })
    }

    /// Run the listener on its own thread until `mailbox` is terminated.
    ///
    /// The callback is registered before this returns.
    pub fn spawn(self, mailbox: Arc<Mailbox<ListenerEvent>>) -> Result<JoinHandle<()>> {
        let registrations = Registrations::register_all(
            &self.transports,
            Protocol::Acmp,
            Self::callback(self.entity_id, mailbox.clone()),
        );
        let handle = thread::Builder::new()
            .name("acmp-listener".to_string())
            .spawn(move || {
                self.run(&mailbox);
                drop(registrations);
            })?;
        Ok(handle)
    }

    fn run(mut self, mailbox: &Mailbox<ListenerEvent>) {
        tracing::info!(
            entity_id = %EntityId(self.entity_id),
            sinks = self.listener_stream_sinks,
            "ACMP listener started"
        );

        let clock = EngineClock::start();
        loop {
            let wait = self
                .next_deadline_in(clock.now_ms())
                .map_or(TICK, |deadline| deadline.min(TICK));
            let next = mailbox.recv_timeout(wait);
            if matches!(next, Next::Terminate) {
                break;
            }
            let now_ms = clock.now_ms();
            if let Err(e) = self.sweep_timeouts(now_ms) {
                tracing::warn!(error = %e, "ACMP timeout not reported");
            }
            if let Next::Event(ListenerEvent::Received(pdu)) = next {
                if let Err(e) = self.handle(&pdu, now_ms) {
                    tracing::warn!(
                        message_type = ?pdu.message_type,
                        error = %e,
                        "ACMP message not answered"
                    );
                }
            }
        }
        tracing::info!(entity_id = %EntityId(self.entity_id), "ACMP listener stopped");
    }
}
