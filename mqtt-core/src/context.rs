//! Incremental read context and fixed-header codec.
//!
//! `ReadContext` is the literal state a suspended read needs to resume: how
//! many bytes of this field have already been consumed (`sequence`), its
//! scratch slots, and the remaining-length budget for the packet body. It is
//! the same shape `terraqtt::protocol::io::reader` keeps across coroutine
//! suspension points, kept here as plain fields instead of a coroutine frame
//! because Rust has no native support for suspending a function mid-call the
//! way cooperative C++20 coroutines do.

use crate::primitives::{decode_u8, decode_varint, VarIntScratch};
use crate::{Error, FixedHeader, PacketType};

/// Resumable decoder for the two-to-five byte fixed header shared by every
/// packet.
#[derive(Debug, Clone, Copy)]
pub struct FixedHeaderDecoder {
    sequence: u8,
    first_byte: u8,
    varint: VarIntScratch,
}

impl Default for FixedHeaderDecoder {
    fn default() -> Self {
        FixedHeaderDecoder {
            sequence: 0,
            first_byte: 0,
            varint: VarIntScratch::default(),
        }
    }
}

impl FixedHeaderDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds more bytes into the fixed header decode. Returns the number of
    /// bytes consumed and, once both the type/flags byte and the
    /// remaining-length varint have arrived, the parsed header.
    pub fn feed(&mut self, input: &[u8]) -> Result<(usize, Option<FixedHeader>), Error> {
        let mut consumed = 0;

        if self.sequence == 0 {
            let (n, byte) = decode_u8(&input[consumed..]);
            consumed += n;
            match byte {
                None => return Ok((consumed, None)),
                Some(b) => {
                    self.first_byte = b;
                    self.sequence = 1;
                }
            }
        }

        let (n, result) = decode_varint(&mut self.varint, &input[consumed..]);
        consumed += n;
        match result? {
            None => Ok((consumed, None)),
            Some(remaining_length) => {
                let packet_type = PacketType::try_from(self.first_byte >> 4)
                    .map_err(|_| Error::BadPacketType)?;
                let flags = self.first_byte & 0x0F;
                *self = FixedHeaderDecoder::default();
                Ok((
                    consumed,
                    Some(FixedHeader {
                        packet_type,
                        flags,
                        remaining_length: remaining_length as usize,
                    }),
                ))
            }
        }
    }
}

pub fn encode_fixed_header(header: &FixedHeader, out: &mut Vec<u8>) -> Result<(), Error> {
    out.push(((header.packet_type as u8) << 4) | (header.flags & 0x0F));
    crate::primitives::encode_varint(header.remaining_length as u32, out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_single_byte_fixed_header() {
        // PINGREQ, remaining length 0.
        let mut decoder = FixedHeaderDecoder::new();
        let (consumed, header) = decoder.feed(&[0xC0, 0x00]).unwrap();
        assert_eq!(consumed, 2);
        let header = header.unwrap();
        assert_eq!(header.packet_type, PacketType::PingReq);
        assert_eq!(header.flags, 0);
        assert_eq!(header.remaining_length, 0);
    }

    #[test]
    fn resumes_across_byte_at_a_time_feeds() {
        // DISCONNECT, remaining length 0.
        let mut decoder = FixedHeaderDecoder::new();
        let (n1, h1) = decoder.feed(&[0xE0]).unwrap();
        assert_eq!((n1, h1), (1, None));
        let (n2, h2) = decoder.feed(&[0x00]).unwrap();
        assert_eq!(n2, 1);
        assert_eq!(h2.unwrap().packet_type, PacketType::Disconnect);
    }

    #[test]
    fn rejects_unknown_packet_type() {
        let mut decoder = FixedHeaderDecoder::new();
        let result = decoder.feed(&[0x00, 0x00]);
        assert_eq!(result, Err(Error::BadPacketType));
    }

    #[test]
    fn encode_matches_decode() {
        let header = FixedHeader {
            packet_type: PacketType::Publish,
            flags: 0b0010,
            remaining_length: 321,
        };
        let mut out = Vec::new();
        encode_fixed_header(&header, &mut out).unwrap();

        let mut decoder = FixedHeaderDecoder::new();
        let (consumed, decoded) = decoder.feed(&out).unwrap();
        assert_eq!(consumed, out.len());
        assert_eq!(decoded.unwrap(), header);
    }
}
