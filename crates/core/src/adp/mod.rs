//! ATDECC Discovery Protocol.
//!
//! Advertising is split the way IEEE 1722.1-2021 section 6.2.4 splits it:
//!
//! ```text
//!  AdvertisingEntityStateMachine        (one per entity)
//!        │ random delay, then every valid_time/2
//!        ▼ InterfaceEvent::Advertise
//!  InterfaceStateMachine ── ENTITY_AVAILABLE / ENTITY_DEPARTING ──> wire
//!        ▲ ENTITY_DISCOVER, gPTP / link / configuration changes
//! ```
//!
//! [`DiscoveryStateMachine`] is the controller-side view: it tracks the
//! other entities announcing themselves and can send ENTITY_DISCOVER.

pub mod advertise;
pub mod discovery;
pub mod interface;

use crate::codec::MacAddr;

pub use advertise::{AdvertiseEvent, AdvertisingEntityStateMachine};
pub use discovery::{DiscoveredEntities, DiscoveredEntity, DiscoveryEvent, DiscoveryStateMachine};
pub use interface::{InterfaceEvent, InterfaceStateMachine};

/// Destination of every ADP frame.
pub const ADP_DESTINATION: MacAddr = MacAddr::ADP_ACMP_MULTICAST;
