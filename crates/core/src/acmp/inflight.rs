use std::collections::VecDeque;

use crate::codec::Acmpdu;

/// A command sent to a talker and still waiting for its response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InflightCommand {
    /// The command as sent, carrying our own sequence id.
    pub command: Acmpdu,
    /// Sequence id of the controller command that caused it.
    pub original_sequence_id: u16,
    pub retried: bool,
    /// Absolute deadline in engine milliseconds.
    pub timeout: u64,
}

impl InflightCommand {
    /// Whether `pdu` refers to the same connection as this command.
    ///
    /// Talkers are not required to echo our sequence id, so matching is by
    /// connection identity.
    pub fn matches(&self, pdu: &Acmpdu) -> bool {
        let c = &self.command;
        c.controller_entity_id == pdu.controller_entity_id
            && c.talker_entity_id == pdu.talker_entity_id
            && c.talker_unique_id == pdu.talker_unique_id
            && c.listener_entity_id == pdu.listener_entity_id
            && c.listener_unique_id == pdu.listener_unique_id
    }
}

/// Ordered ledger of in-flight commands.
///
/// New entries go to the back. Since every deadline is the insertion time
/// plus a per-type constant, the front entry is always the next to expire.
#[derive(Debug, Default)]
pub struct Inflight {
    entries: VecDeque<InflightCommand>,
}

impl Inflight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InflightCommand> {
        self.entries.iter()
    }

    pub fn push(&mut self, entry: InflightCommand) {
        self.entries.push_back(entry);
    }

    /// First entry matching `pdu`.
    pub fn find(&self, pdu: &Acmpdu) -> Option<&InflightCommand> {
        self.entries.iter().find(|entry| entry.matches(pdu))
    }

    pub fn find_mut(&mut self, pdu: &Acmpdu) -> Option<&mut InflightCommand> {
        self.entries.iter_mut().find(|entry| entry.matches(pdu))
    }

    /// Disarm the first matching entry. Returns false if none matched.
    pub fn cancel_timeout(&mut self, pdu: &Acmpdu) -> bool {
        match self.find_mut(pdu) {
            Some(entry) => {
                entry.timeout = 0;
                true
            }
            None => false,
        }
    }

    /// Remove and return the first matching entry.
    pub fn remove(&mut self, pdu: &Acmpdu) -> Option<InflightCommand> {
        let position = self.entries.iter().position(|entry| entry.matches(pdu))?;
        self.entries.remove(position)
    }

    /// Pop the front entry if its deadline has passed.
    pub fn pop_expired(&mut self, now_ms: u64) -> Option<InflightCommand> {
        match self.entries.front() {
            Some(front) if now_ms >= front.timeout => self.entries.pop_front(),
            _ => None,
        }
    }

    /// Put `entries` back at the front, keeping their order.
    pub fn requeue_front(&mut self, entries: Vec<InflightCommand>) {
        for entry in entries.into_iter().rev() {
            self.entries.push_front(entry);
        }
    }
}
