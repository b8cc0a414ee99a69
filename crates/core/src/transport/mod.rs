//! Link-layer transport port.
//!
//! The engines never open sockets. They talk to a [`Transport`], which
//! sends AVTPDUs to a destination MAC and hands received PDUs to
//! per-protocol callbacks:
//!
//! - **Loopback** ([`loopback`]): an in-memory hub connecting several
//!   ports, used for tests and in-process simulation.
//!
//! - **UDP** ([`udp`]): tunnels AVTP frames through an IPv4 multicast
//!   group, so entities on ordinary hosts can find each other without raw
//!   sockets.
//!
//! Decoding happens once per frame in a [`Dispatcher`]. Callbacks get an
//! owned, decoded [`Inbound`] and do their own entity-id filtering.

pub mod loopback;
pub mod udp;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::codec::header::subtype_of;
use crate::codec::{
    AVTP_ETHERTYPE, Acmpdu, Adpdu, AemPdu, MacAddr, SUBTYPE_ACMP, SUBTYPE_ADP, SUBTYPE_AECP,
};
use crate::error::{AvdeccError, CodecErrorKind, Result};

pub use loopback::{LoopbackHub, LoopbackPort};
pub use udp::{UdpConfig, UdpTransport};

/// The three AVDECC protocols a callback can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Adp,
    Acmp,
    Aecp,
}

/// A decoded AVDECC PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pdu {
    Adp(Adpdu),
    Acmp(Acmpdu),
    Aem(AemPdu),
}

impl Pdu {
    pub fn protocol(&self) -> Protocol {
        match self {
            Pdu::Adp(_) => Protocol::Adp,
            Pdu::Acmp(_) => Protocol::Acmp,
            Pdu::Aem(_) => Protocol::Aecp,
        }
    }

    /// Decode an AVTPDU, picking the codec from its subtype.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        match subtype_of(buf) {
            Some(SUBTYPE_ADP) => Ok(Pdu::Adp(Adpdu::decode(buf)?)),
            Some(SUBTYPE_ACMP) => Ok(Pdu::Acmp(Acmpdu::decode(buf)?)),
            Some(SUBTYPE_AECP) => Ok(Pdu::Aem(AemPdu::decode(buf)?)),
            Some(found) => Err(AvdeccError::Codec {
                kind: CodecErrorKind::WrongSubtype {
                    expected: SUBTYPE_ADP,
                    found,
                },
            }),
            None => Err(AvdeccError::too_short(1, 0)),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Pdu::Adp(pdu) => pdu.to_bytes(),
            Pdu::Acmp(pdu) => pdu.to_bytes(),
            Pdu::Aem(pdu) => pdu.to_bytes(),
        }
    }
}

/// A received PDU and the MAC it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub source: MacAddr,
    pub pdu: Pdu,
}

/// Callback invoked for every received PDU of the registered protocol.
pub type Handler = Arc<dyn Fn(&Inbound) + Send + Sync>;

/// Token returned by [`Transport::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// One network interface as seen by the engines.
pub trait Transport: Send + Sync {
    /// Interface name, for logging.
    fn name(&self) -> &str;

    fn mac_address(&self) -> MacAddr;

    /// Whether the link is currently up.
    fn link_is_up(&self) -> bool {
        true
    }

    /// Put one AVTPDU on the wire towards `destination`.
    fn send(&self, destination: MacAddr, pdu: &[u8]) -> Result<()>;

    fn register(&self, protocol: Protocol, handler: Handler) -> HandlerId;

    fn unregister(&self, id: HandlerId);
}

/// Send an encoded PDU on every interface.
///
/// Returns how many interfaces accepted it. Fails only when none did.
pub fn send_all(
    transports: &[Arc<dyn Transport>],
    destination: MacAddr,
    pdu: &Pdu,
) -> Result<usize> {
    if transports.is_empty() {
        return Err(AvdeccError::NoInterfaces);
    }
    let bytes = pdu.to_bytes()?;
    let mut accepted = 0;
    let mut last_error = None;
    for transport in transports {
        match transport.send(destination, &bytes) {
            Ok(()) => accepted += 1,
            Err(e) => {
                tracing::warn!(interface = transport.name(), error = %e, "send failed");
                last_error = Some(e);
            }
        }
    }
    match (accepted, last_error) {
        (0, Some(e)) => Err(e),
        _ => Ok(accepted),
    }
}

/// Handlers registered on a set of transports, unregistered on drop.
///
/// Engines register from the spawning thread so nothing sent after
/// `spawn` returns is missed, then move the guard into the worker.
pub(crate) struct Registrations {
    entries: Vec<(Arc<dyn Transport>, HandlerId)>,
}

impl Registrations {
    pub(crate) fn register_all(
        transports: &[Arc<dyn Transport>],
        protocol: Protocol,
        handler: Handler,
    ) -> Self {
        let entries = transports
            .iter()
            .map(|transport| (transport.clone(), transport.register(protocol, handler.clone())))
            .collect();
        Self { entries }
    }
}

impl Drop for Registrations {
    fn drop(&mut self) {
        for (transport, id) in self.entries.drain(..) {
            transport.unregister(id);
        }
    }
}

/// Per-transport callback registry.
///
/// Decodes each frame once and fans it out to every handler registered
/// for its protocol. Malformed frames are dropped with a debug log.
pub struct Dispatcher {
    handlers: RwLock<Vec<(HandlerId, Protocol, Handler)>>,
    next_id: AtomicU64,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn register(&self, protocol: Protocol, handler: Handler) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.handlers.write().push((id, protocol, handler));
        tracing::trace!(?protocol, handler = id.0, "handler registered");
        id
    }

    pub fn unregister(&self, id: HandlerId) {
        self.handlers.write().retain(|(handler_id, _, _)| *handler_id != id);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Decode `frame` and invoke the matching handlers.
    pub fn dispatch(&self, source: MacAddr, frame: &[u8]) {
        let pdu = match Pdu::decode(frame) {
            Ok(pdu) => pdu,
            Err(e) => {
                tracing::debug!(%source, error = %e, "dropping undecodable frame");
                return;
            }
        };
        let inbound = Inbound { source, pdu };
        let protocol = inbound.pdu.protocol();

        // Handlers may register or unregister from inside a callback.
        let matching: Vec<Handler> = self
            .handlers
            .read()
            .iter()
            .filter(|(_, p, _)| *p == protocol)
            .map(|(_, _, handler)| handler.clone())
            .collect();

        for handler in matching {
            handler(&inbound);
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Ethernet II framing around an AVTPDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub destination: MacAddr,
    pub source: MacAddr,
    pub ethertype: u16,
    pub payload: Vec<u8>,
}

/// Length of the Ethernet II header (no VLAN tag).
pub const ETHERNET_HEADER_LEN: usize = 14;

impl Frame {
    pub fn avtp(destination: MacAddr, source: MacAddr, payload: &[u8]) -> Self {
        Self {
            destination,
            source,
            ethertype: AVTP_ETHERTYPE,
            payload: payload.to_vec(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(ETHERNET_HEADER_LEN + self.payload.len());
        bytes.extend_from_slice(&self.destination.0);
        bytes.extend_from_slice(&self.source.0);
        bytes.extend_from_slice(&self.ethertype.to_be_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        crate::codec::ensure_len(bytes, ETHERNET_HEADER_LEN)?;
        let mut destination = [0u8; 6];
        let mut source = [0u8; 6];
        destination.copy_from_slice(&bytes[0..6]);
        source.copy_from_slice(&bytes[6..12]);
        Ok(Self {
            destination: MacAddr(destination),
            source: MacAddr(source),
            ethertype: u16::from_be_bytes([bytes[12], bytes[13]]),
            payload: bytes[ETHERNET_HEADER_LEN..].to_vec(),
        })
    }
}
