//! IEEE 1722.1 wire codec.
//!
//! Every AVDECC PDU starts with the 12-byte AVTP common control header
//! ([`header`]), followed by fixed-offset fields that depend on the
//! protocol:
//!
//! - **ADP** ([`adp`]): entity advertisement and discovery, 68 bytes.
//! - **ACMP** ([`acmp`]): stream connection management, 56 bytes.
//! - **AECP AEM** ([`aecp`]): entity model commands, 24 bytes + payload.
//!
//! All multi-octet fields are big-endian. Encoders check the destination
//! length before each field write and return
//! [`CodecErrorKind::BufferTooShort`](crate::error::CodecErrorKind::BufferTooShort)
//! instead of panicking.

pub mod acmp;
pub mod adp;
pub mod aecp;
pub mod header;

use std::fmt;
use std::str::FromStr;

use crate::error::{AvdeccError, Result};

pub use acmp::{AcmpMessageType, AcmpStatus, Acmpdu};
pub use adp::{AdpMessageType, Adpdu};
pub use aecp::{AecpMessageType, AemCommandType, AemPdu, AemStatus};
pub use header::{ControlHeader, HEADER_LEN};

/// Ethertype of IEEE 1722 AVTP frames.
pub const AVTP_ETHERTYPE: u16 = 0x22F0;

/// AVTP subtype of ADP PDUs.
pub const SUBTYPE_ADP: u8 = 0x7A;
/// AVTP subtype of AECP PDUs.
pub const SUBTYPE_AECP: u8 = 0x7B;
/// AVTP subtype of ACMP PDUs.
pub const SUBTYPE_ACMP: u8 = 0x7C;

/// 48-bit IEEE MAC address (EUI-48).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// Destination of ADP and ACMP multicast traffic (IEEE 1722.1 Annex B).
    pub const ADP_ACMP_MULTICAST: MacAddr = MacAddr([0x91, 0xE0, 0xF0, 0x01, 0x00, 0x00]);

    pub const ZERO: MacAddr = MacAddr([0; 6]);

    /// Group bit of the first octet.
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    /// The address as the low 48 bits of a `u64`.
    pub fn to_u64(&self) -> u64 {
        self.0
            .iter()
            .fold(0u64, |acc, &octet| (acc << 8) | u64::from(octet))
    }

    /// Build an address from the low 48 bits of a `u64`.
    pub fn from_u64(value: u64) -> Self {
        let bytes = value.to_be_bytes();
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&bytes[2..8]);
        MacAddr(mac)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for MacAddr {
    type Err = AvdeccError;

    /// Parse `aa:bb:cc:dd:ee:ff` (`-` is accepted as separator too).
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || AvdeccError::InvalidMacAddress(s.to_string());
        let mut mac = [0u8; 6];
        let mut parts = s.trim().split(|c| c == ':' || c == '-');
        for octet in mac.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(MacAddr(mac))
    }
}

/// Display wrapper for 64-bit entity and stream ids (`0x%016X`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

/// Derive an EUI-64 entity id from an interface MAC address.
///
/// The locally administered bit of the first octet is flipped and
/// `FF:F0` is inserted between the OUI and the NIC-specific part.
pub fn entity_id_from_mac(mac: MacAddr) -> u64 {
    let [m0, m1, m2, m3, m4, m5] = mac.0;
    u64::from_be_bytes([m0 ^ 0x02, m1, m2, 0xFF, 0xF0, m3, m4, m5])
}

pub(crate) fn ensure_len(buf: &[u8], needed: usize) -> Result<()> {
    if buf.len() < needed {
        return Err(AvdeccError::too_short(needed, buf.len()));
    }
    Ok(())
}

pub(crate) fn put_u8(buf: &mut [u8], pos: usize, value: u8) -> Result<()> {
    ensure_len(buf, pos + 1)?;
    buf[pos] = value;
    Ok(())
}

pub(crate) fn put_u16(buf: &mut [u8], pos: usize, value: u16) -> Result<()> {
    ensure_len(buf, pos + 2)?;
    buf[pos..pos + 2].copy_from_slice(&value.to_be_bytes());
    Ok(())
}

pub(crate) fn put_u32(buf: &mut [u8], pos: usize, value: u32) -> Result<()> {
    ensure_len(buf, pos + 4)?;
    buf[pos..pos + 4].copy_from_slice(&value.to_be_bytes());
    Ok(())
}

pub(crate) fn put_u64(buf: &mut [u8], pos: usize, value: u64) -> Result<()> {
    ensure_len(buf, pos + 8)?;
    buf[pos..pos + 8].copy_from_slice(&value.to_be_bytes());
    Ok(())
}

pub(crate) fn put_mac(buf: &mut [u8], pos: usize, mac: MacAddr) -> Result<()> {
    ensure_len(buf, pos + 6)?;
    buf[pos..pos + 6].copy_from_slice(&mac.0);
    Ok(())
}

pub(crate) fn put_bytes(buf: &mut [u8], pos: usize, bytes: &[u8]) -> Result<()> {
    ensure_len(buf, pos + bytes.len())?;
    buf[pos..pos + bytes.len()].copy_from_slice(bytes);
    Ok(())
}

// Getters assume the caller already ran `ensure_len` over the whole layout.

pub(crate) fn get_u16(buf: &[u8], pos: usize) -> u16 {
    u16::from_be_bytes([buf[pos], buf[pos + 1]])
}

pub(crate) fn get_u32(buf: &[u8], pos: usize) -> u32 {
    u32::from_be_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]])
}

pub(crate) fn get_u64(buf: &[u8], pos: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[pos..pos + 8]);
    u64::from_be_bytes(bytes)
}

pub(crate) fn get_mac(buf: &[u8], pos: usize) -> MacAddr {
    let mut mac = [0u8; 6];
    mac.copy_from_slice(&buf[pos..pos + 6]);
    MacAddr(mac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_from_mac_inserts_fff0() {
        let mac = MacAddr([0xb0, 0xd5, 0xcc, 0xfc, 0x4d, 0x94]);
        assert_eq!(entity_id_from_mac(mac), 0xb2d5_ccff_f0fc_4d94);
    }

    #[test]
    fn mac_parse_and_display() {
        let mac: MacAddr = "b0:d5:cc:fc:4d:94".parse().unwrap();
        assert_eq!(mac.to_u64(), 0xb0d5_ccfc_4d94);
        assert_eq!(mac.to_string(), "b0:d5:cc:fc:4d:94");
        assert_eq!(MacAddr::from_u64(0xb0d5_ccfc_4d94), mac);
    }

    #[test]
    fn mac_parse_rejects_garbage() {
        assert!("b0:d5:cc:fc:4d".parse::<MacAddr>().is_err());
        assert!("b0:d5:cc:fc:4d:94:00".parse::<MacAddr>().is_err());
        assert!("zz:d5:cc:fc:4d:94".parse::<MacAddr>().is_err());
    }

    #[test]
    fn multicast_bit() {
        assert!(MacAddr::ADP_ACMP_MULTICAST.is_multicast());
        assert!(!MacAddr([0xb0, 0xd5, 0xcc, 0xfc, 0x4d, 0x94]).is_multicast());
    }

    #[test]
    fn put_checks_bounds() {
        let mut buf = [0u8; 3];
        assert!(put_u16(&mut buf, 1, 0xBEEF).is_ok());
        assert_eq!(buf, [0, 0xBE, 0xEF]);
        assert!(put_u32(&mut buf, 0, 1).is_err());
        assert!(put_u8(&mut buf, 3, 1).is_err());
    }

    #[test]
    fn entity_id_display() {
        assert_eq!(EntityId(42).to_string(), "0x000000000000002A");
    }
}
