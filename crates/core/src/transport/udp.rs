use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use socket2::{Domain, Socket, Type};

use super::{Dispatcher, Frame, Handler, HandlerId, Protocol, Transport};
use crate::codec::{AVTP_ETHERTYPE, MacAddr};
use crate::error::Result;

/// Default multicast group carrying tunnelled AVTP frames.
pub const DEFAULT_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 22, 240);
/// Default UDP port of the tunnel.
pub const DEFAULT_PORT: u16 = 17220;

const SEQUENCE_LEN: usize = 4;
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Where the tunnel lives.
#[derive(Debug, Clone)]
pub struct UdpConfig {
    pub group: Ipv4Addr,
    pub port: u16,
    /// Local interface address used to join the group.
    pub interface: Ipv4Addr,
    /// Deliver our own datagrams back to sockets on this host. Needed when
    /// several entities share one machine.
    pub multicast_loop: bool,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            group: DEFAULT_GROUP,
            port: DEFAULT_PORT,
            interface: Ipv4Addr::UNSPECIFIED,
            multicast_loop: true,
        }
    }
}

/// AVTP over UDP multicast.
///
/// Each datagram carries one Ethernet frame behind a 4-byte sequence
/// number:
///
/// ```text
/// | seq (4) | dst MAC (6) | src MAC (6) | ethertype (2) | AVTPDU |
/// ```
///
/// Everything goes to the group. Receivers drop frames from their own
/// MAC and unicast frames addressed to someone else, which reproduces
/// Ethernet delivery closely enough for discovery and control.
pub struct UdpTransport {
    name: String,
    mac: MacAddr,
    socket: Arc<UdpSocket>,
    target: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    running: Arc<AtomicBool>,
    sequence: AtomicU32,
    receiver: Mutex<Option<JoinHandle<()>>>,
}

impl UdpTransport {
    /// Join the group and start the receive loop.
    pub fn bind(name: &str, mac: MacAddr, config: &UdpConfig) -> Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(socket2::Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.port);
        socket.bind(&SocketAddr::V4(bind_addr).into())?;

        let socket: UdpSocket = socket.into();
        socket.join_multicast_v4(&config.group, &config.interface)?;
        socket.set_multicast_loop_v4(config.multicast_loop)?;
        socket.set_read_timeout(Some(POLL_INTERVAL))?;

        let socket = Arc::new(socket);
        let dispatcher = Arc::new(Dispatcher::new());
        let running = Arc::new(AtomicBool::new(true));

        let handle = {
            let socket = socket.clone();
            let dispatcher = dispatcher.clone();
            let running = running.clone();
            thread::Builder::new()
                .name(format!("udp-rx-{name}"))
                .spawn(move || receive_loop(&socket, mac, &dispatcher, &running))?
        };

        tracing::info!(
            interface = name,
            %mac,
            group = %config.group,
            port = config.port,
            "AVTP tunnel bound"
        );

        Ok(Self {
            name: name.to_string(),
            mac,
            socket,
            target: SocketAddr::V4(SocketAddrV4::new(config.group, config.port)),
            dispatcher,
            running,
            sequence: AtomicU32::new(0),
            receiver: Mutex::new(Some(handle)),
        })
    }

    /// Stop the receive loop and wait for it.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.receiver.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Transport for UdpTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn mac_address(&self) -> MacAddr {
        self.mac
    }

    fn send(&self, destination: MacAddr, pdu: &[u8]) -> Result<()> {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let mut datagram = Vec::with_capacity(SEQUENCE_LEN + pdu.len() + 14);
        datagram.extend_from_slice(&sequence.to_be_bytes());
        datagram.extend_from_slice(&Frame::avtp(destination, self.mac, pdu).to_bytes());
        self.socket.send_to(&datagram, self.target)?;
        Ok(())
    }

    fn register(&self, protocol: Protocol, handler: Handler) -> HandlerId {
        self.dispatcher.register(protocol, handler)
    }

    fn unregister(&self, id: HandlerId) {
        self.dispatcher.unregister(id);
    }
}

/// Blocking receive loop.
///
/// Checks the `running` flag between reads; the socket's read timeout
/// bounds how long [`UdpTransport::stop`] waits.
fn receive_loop(socket: &UdpSocket, mac: MacAddr, dispatcher: &Dispatcher, running: &AtomicBool) {
    let mut buf = [0u8; 1522];
    while running.load(Ordering::SeqCst) {
        match socket.recv_from(&mut buf) {
            Ok((len, _)) => {
                if let Some(frame) = accept_datagram(&buf[..len], mac) {
                    dispatcher.dispatch(frame.source, &frame.payload);
                }
            }
            Err(ref e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) => {}
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    tracing::warn!(error = %e, "UDP receive error");
                }
            }
        }
    }
    tracing::debug!(%mac, "receive loop exited");
}

/// Unwrap a tunnel datagram, applying Ethernet delivery rules for `mac`.
fn accept_datagram(datagram: &[u8], mac: MacAddr) -> Option<Frame> {
    let frame = Frame::parse(datagram.get(SEQUENCE_LEN..)?).ok()?;
    if frame.ethertype != AVTP_ETHERTYPE || frame.source == mac {
        return None;
    }
    if !frame.destination.is_multicast() && frame.destination != mac {
        return None;
    }
    Some(frame)
}
