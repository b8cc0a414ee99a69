//! ATDECC Connection Management Protocol, listener side.
//!
//! A controller asks a listener to connect (`CONNECT_RX_COMMAND`). The
//! listener forwards the request to the talker (`CONNECT_TX_COMMAND`),
//! waits for its answer, and reports back to the controller:
//!
//! ```text
//! controller            listener                     talker
//!     │ CONNECT_RX_COMMAND  │                            │
//!     ├────────────────────>│ CONNECT_TX_COMMAND         │
//!     │                     ├───────────────────────────>│
//!     │                     │    (retry once on timeout) │
//!     │                     │ CONNECT_TX_RESPONSE        │
//!     │ CONNECT_RX_RESPONSE │<───────────────────────────┤
//!     │<────────────────────┤                            │
//! ```
//!
//! Outstanding talker commands live in the [`inflight::Inflight`] ledger
//! until a response arrives or the retry has also timed out.

pub mod inflight;
pub mod listener;

use crate::codec::{AcmpMessageType, MacAddr};

pub use inflight::{Inflight, InflightCommand};
pub use listener::{ListenerEvent, ListenerStateMachine, ListenerStreamInfo};

/// How long to wait for the response to an ACMP command, in milliseconds
/// (IEEE 1722.1-2021 Table 8-2). `None` for responses.
pub fn timeout_ms(message_type: AcmpMessageType) -> Option<u64> {
    use AcmpMessageType::*;
    match message_type {
        ConnectTxCommand => Some(2000),
        DisconnectTxCommand => Some(200),
        GetTxStateCommand => Some(200),
        ConnectRxCommand => Some(4500),
        DisconnectRxCommand => Some(500),
        GetRxStateCommand => Some(200),
        GetTxConnectionCommand => Some(200),
        _ => None,
    }
}

/// Destination of every ACMP frame.
pub const ACMP_DESTINATION: MacAddr = MacAddr::ADP_ACMP_MULTICAST;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_have_timeouts_responses_do_not() {
        assert_eq!(timeout_ms(AcmpMessageType::ConnectTxCommand), Some(2000));
        assert_eq!(timeout_ms(AcmpMessageType::DisconnectTxCommand), Some(200));
        assert_eq!(timeout_ms(AcmpMessageType::ConnectRxCommand), Some(4500));
        assert_eq!(timeout_ms(AcmpMessageType::DisconnectRxCommand), Some(500));
        assert_eq!(timeout_ms(AcmpMessageType::ConnectTxResponse), None);
    }
}
