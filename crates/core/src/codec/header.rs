use super::{ensure_len, get_u64, put_u64, put_u8};
use crate::error::{AvdeccError, CodecErrorKind, Result};

/// Length of the AVTP common control header.
pub const HEADER_LEN: usize = 12;

/// Largest value the 11-bit `control_data_length` field holds.
pub const CONTROL_DATA_LENGTH_MAX: usize = 0x07FF;

/// AVTP common control header (IEEE 1722-2016 §4.4.4.2).
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |C|   subtype   |S| ver | msg_t |  status |  control_data_length|
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                                                               |
/// +                      stream_id / entity_id                    +
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// `status` is 5 bits wide and carries `valid_time` in ADP PDUs.
/// `control_data_length` is 11 bits split across bytes 2 and 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlHeader {
    pub cd: bool,
    pub subtype: u8,
    pub sv: bool,
    pub version: u8,
    pub message_type: u8,
    pub status: u8,
    pub control_data_length: u16,
    pub stream_id: u64,
}

impl ControlHeader {
    /// A control (`cd = 1`), version 0 header for the given subtype.
    pub fn control(
        subtype: u8,
        message_type: u8,
        status: u8,
        control_data_length: u16,
        stream_id: u64,
    ) -> Self {
        Self {
            cd: true,
            subtype,
            sv: false,
            version: 0,
            message_type,
            status,
            control_data_length,
            stream_id,
        }
    }

    /// Serialize the header into the first 12 bytes of `buf`.
    ///
    /// Nothing is written when `buf` is short or `control_data_length`
    /// does not fit its 11 bits. Other fields are masked to their width.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        ensure_len(buf, HEADER_LEN)?;
        let length = checked_control_data_length(usize::from(self.control_data_length))?;

        let [length_high, length_low] = length.to_be_bytes();
        put_u8(buf, 0, ((self.cd as u8) << 7) | (self.subtype & 0x7F))?;
        put_u8(
            buf,
            1,
            ((self.sv as u8) << 7) | ((self.version & 0x07) << 4) | (self.message_type & 0x0F),
        )?;
        put_u8(buf, 2, ((self.status & 0x1F) << 3) | length_high)?;
        put_u8(buf, 3, length_low)?;
        put_u64(buf, 4, self.stream_id)?;
        Ok(HEADER_LEN)
    }

    /// Parse the first 12 bytes of `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        ensure_len(buf, HEADER_LEN)?;
        Ok(Self {
            cd: buf[0] & 0x80 != 0,
            subtype: buf[0] & 0x7F,
            sv: buf[1] & 0x80 != 0,
            version: (buf[1] >> 4) & 0x07,
            message_type: buf[1] & 0x0F,
            status: buf[2] >> 3,
            control_data_length: (u16::from(buf[2] & 0x07) << 8) | u16::from(buf[3]),
            stream_id: get_u64(buf, 4),
        })
    }

    /// Parse a header and require a specific subtype.
    pub(crate) fn decode_expecting(buf: &[u8], subtype: u8) -> Result<Self> {
        let header = Self::decode(buf)?;
        if header.subtype != subtype {
            return Err(AvdeccError::Codec {
                kind: CodecErrorKind::WrongSubtype {
                    expected: subtype,
                    found: header.subtype,
                },
            });
        }
        Ok(header)
    }
}

/// `length` as a `control_data_length` value, if it fits.
pub(crate) fn checked_control_data_length(length: usize) -> Result<u16> {
    if length > CONTROL_DATA_LENGTH_MAX {
        return Err(AvdeccError::control_data_too_long(length));
    }
    // At most 11 bits here.
    Ok(length as u16)
}

/// Peek at the AVTP subtype of a frame without decoding it.
pub fn subtype_of(buf: &[u8]) -> Option<u8> {
    buf.first().map(|byte| byte & 0x7F)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ControlHeader {
        ControlHeader {
            cd: true,
            subtype: 0x7C,
            sv: true,
            version: 5,
            message_type: 0x0B,
            status: 0x15,
            control_data_length: 0x5A3,
            stream_id: 0x0011_2233_4455_6677,
        }
    }

    #[test]
    fn bit_layout() {
        let mut buf = [0u8; HEADER_LEN];
        ControlHeader::control(0x7A, 0, 31, 56, 42).encode(&mut buf).unwrap();
        assert_eq!(buf[0], 0xFA);
        assert_eq!(buf[1], 0x00);
        assert_eq!(buf[2], 31 << 3);
        assert_eq!(buf[3], 56);
        assert_eq!(&buf[4..12], &42u64.to_be_bytes());
    }

    #[test]
    fn control_data_length_spans_two_bytes() {
        let mut buf = [0u8; HEADER_LEN];
        sample().encode(&mut buf).unwrap();
        assert_eq!(buf[2] & 0x07, 0x05);
        assert_eq!(buf[3], 0xA3);
        assert_eq!(buf[2] >> 3, 0x15);
    }

    #[test]
    fn decode_inverts_encode() {
        let mut buf = [0u8; 20];
        let header = sample();
        assert_eq!(header.encode(&mut buf).unwrap(), HEADER_LEN);
        assert_eq!(ControlHeader::decode(&buf).unwrap(), header);
    }

    #[test]
    fn encode_rejects_short_buffer() {
        let mut buf = [0u8; 11];
        assert!(sample().encode(&mut buf).is_err());
        assert_eq!(buf, [0u8; 11]);
        assert!(ControlHeader::decode(&buf).is_err());
    }

    #[test]
    fn oversized_control_data_length_is_an_error() {
        let mut buf = [0u8; HEADER_LEN];
        let header = ControlHeader {
            control_data_length: 0x0800,
            ..sample()
        };
        assert!(matches!(
            header.encode(&mut buf),
            Err(AvdeccError::Codec {
                kind: CodecErrorKind::ControlDataTooLong(0x0800)
            })
        ));
        assert_eq!(buf, [0u8; HEADER_LEN]);

        let header = ControlHeader {
            control_data_length: 0x07FF,
            ..sample()
        };
        header.encode(&mut buf).unwrap();
        assert_eq!(ControlHeader::decode(&buf).unwrap().control_data_length, 0x07FF);
    }

    #[test]
    fn wrong_subtype_is_rejected() {
        let mut buf = [0u8; HEADER_LEN];
        sample().encode(&mut buf).unwrap();
        assert!(ControlHeader::decode_expecting(&buf, 0x7A).is_err());
        assert_eq!(subtype_of(&buf), Some(0x7C));
    }
}
