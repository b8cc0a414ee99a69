pub mod acmp;
pub mod adp;
pub mod aecp;
pub mod aem;
pub mod codec;
pub mod entity;
pub mod error;
pub mod mailbox;
pub mod station;
pub mod transport;

pub use aem::EntityConfig;
pub use codec::{EntityId, MacAddr};
pub use entity::{EntityInfo, SharedEntityInfo};
pub use error::{AvdeccError, Result};
pub use station::{EndStation, StationConfig};
pub use transport::{LoopbackHub, Transport, UdpConfig, UdpTransport};
