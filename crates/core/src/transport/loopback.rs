use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use super::{Dispatcher, Frame, Handler, HandlerId, Protocol, Transport};
use crate::codec::MacAddr;
use crate::error::{AvdeccError, Result};

type PortList = RwLock<Vec<Weak<LoopbackPort>>>;

/// In-memory Ethernet segment.
///
/// Every frame sent by one port is delivered synchronously to the other
/// ports whose MAC matches the destination, or to all of them for
/// multicast destinations. A port never receives its own frames.
#[derive(Clone, Default)]
pub struct LoopbackHub {
    ports: Arc<PortList>,
}

impl LoopbackHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new port to the segment.
    pub fn port(&self, name: &str, mac: MacAddr) -> Arc<LoopbackPort> {
        let port = Arc::new(LoopbackPort::build(name, mac, Some(Arc::downgrade(&self.ports))));
        let mut ports = self.ports.write();
        ports.retain(|p| p.strong_count() > 0);
        ports.push(Arc::downgrade(&port));
        port
    }

    pub fn port_count(&self) -> usize {
        self.ports.read().iter().filter(|p| p.strong_count() > 0).count()
    }
}

/// One interface on a [`LoopbackHub`].
///
/// Every frame it sends is also recorded so tests can inspect the wire.
pub struct LoopbackPort {
    name: String,
    mac: MacAddr,
    hub: Option<Weak<PortList>>,
    dispatcher: Dispatcher,
    link_up: AtomicBool,
    fail_sends: AtomicBool,
    sent: Mutex<Vec<Frame>>,
}

impl LoopbackPort {
    fn build(name: &str, mac: MacAddr, hub: Option<Weak<PortList>>) -> Self {
        Self {
            name: name.to_string(),
            mac,
            hub,
            dispatcher: Dispatcher::new(),
            link_up: AtomicBool::new(true),
            fail_sends: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// A port attached to nothing: sends are only recorded.
    pub fn standalone(name: &str, mac: MacAddr) -> Arc<Self> {
        Arc::new(Self::build(name, mac, None))
    }

    pub fn set_link_up(&self, up: bool) {
        self.link_up.store(up, Ordering::SeqCst);
    }

    /// Make every subsequent send fail, as a downed NIC would.
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Deliver a frame to this port's handlers as if it came off the wire.
    pub fn inject(&self, source: MacAddr, pdu: &[u8]) {
        self.dispatcher.dispatch(source, pdu);
    }

    /// Handlers currently registered on this port.
    pub fn handler_count(&self) -> usize {
        self.dispatcher.handler_count()
    }

    /// Frames sent so far.
    pub fn sent_frames(&self) -> Vec<Frame> {
        self.sent.lock().clone()
    }

    /// Drain the record of sent frames.
    pub fn take_sent(&self) -> Vec<Frame> {
        std::mem::take(&mut *self.sent.lock())
    }

    fn receive(&self, frame: &Frame) {
        if frame.destination == self.mac || frame.destination.is_multicast() {
            self.dispatcher.dispatch(frame.source, &frame.payload);
        }
    }
}

impl Transport for LoopbackPort {
    fn name(&self) -> &str {
        &self.name
    }

    fn mac_address(&self) -> MacAddr {
        self.mac
    }

    fn link_is_up(&self) -> bool {
        self.link_up.load(Ordering::SeqCst)
    }

    fn send(&self, destination: MacAddr, pdu: &[u8]) -> Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(AvdeccError::SendFailed(format!("{} is refusing frames", self.name)));
        }
        let frame = Frame::avtp(destination, self.mac, pdu);
        self.sent.lock().push(frame.clone());

        let Some(ports) = self.hub.as_ref().and_then(Weak::upgrade) else {
            return Ok(());
        };
        let peers: Vec<Arc<LoopbackPort>> = ports.read().iter().filter_map(Weak::upgrade).collect();
        for peer in peers {
            if !std::ptr::eq(Arc::as_ptr(&peer), self) {
                peer.receive(&frame);
            }
        }
        Ok(())
    }

    fn register(&self, protocol: Protocol, handler: Handler) -> HandlerId {
        self.dispatcher.register(protocol, handler)
    }

    fn unregister(&self, id: HandlerId) {
        self.dispatcher.unregister(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{AcmpMessageType, Acmpdu, Adpdu};
    use crate::transport::{Inbound, Pdu};

    const A: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 0x0A]);
    const B: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 0x0B]);
    const C: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 0x0C]);

    fn collector(port: &LoopbackPort, protocol: Protocol) -> Arc<Mutex<Vec<Inbound>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        port.register(
            protocol,
            Arc::new(move |inbound: &Inbound| sink.lock().push(inbound.clone())),
        );
        seen
    }

    #[test]
    fn multicast_reaches_every_other_port() {
        let hub = LoopbackHub::new();
        let a = hub.port("a", A);
        let b = hub.port("b", B);
        let c = hub.port("c", C);
        let seen_a = collector(&a, Protocol::Adp);
        let seen_b = collector(&b, Protocol::Adp);
        let seen_c = collector(&c, Protocol::Adp);

        let bytes = Adpdu::discover(0).to_bytes().unwrap();
        a.send(MacAddr::ADP_ACMP_MULTICAST, &bytes).unwrap();

        assert!(seen_a.lock().is_empty());
        assert_eq!(seen_b.lock().len(), 1);
        assert_eq!(seen_c.lock()[0].source, A);
        assert_eq!(a.sent_frames().len(), 1);
    }

    #[test]
    fn unicast_reaches_only_its_destination() {
        let hub = LoopbackHub::new();
        let a = hub.port("a", A);
        let b = hub.port("b", B);
        let c = hub.port("c", C);
        let seen_b = collector(&b, Protocol::Acmp);
        let seen_c = collector(&c, Protocol::Acmp);

        let bytes = Acmpdu::new(AcmpMessageType::GetRxStateCommand).to_bytes().unwrap();
        a.send(B, &bytes).unwrap();

        assert!(matches!(seen_b.lock()[0].pdu, Pdu::Acmp(_)));
        assert!(seen_c.lock().is_empty());
    }

    #[test]
    fn failing_port_reports_error_and_records_nothing() {
        let port = LoopbackPort::standalone("x", A);
        port.set_fail_sends(true);
        assert!(port.send(B, &[0u8; 4]).is_err());
        assert!(port.take_sent().is_empty());
    }

    #[test]
    fn dropped_ports_leave_the_hub() {
        let hub = LoopbackHub::new();
        let a = hub.port("a", A);
        {
            let _b = hub.port("b", B);
            assert_eq!(hub.port_count(), 2);
        }
        assert_eq!(hub.port_count(), 1);
        a.send(MacAddr::ADP_ACMP_MULTICAST, &[0u8; 4]).unwrap();
    }

    #[test]
    fn link_state_is_reported() {
        let port = LoopbackPort::standalone("x", A);
        assert!(port.link_is_up());
        port.set_link_up(false);
        assert!(!port.link_is_up());
    }
}
