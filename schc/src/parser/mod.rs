//! Raw bytes -> ordered field-buffer sequence.
//!
//! Each protocol submodule exposes a `parse(data, offset) -> (fields,
//! next_offset, hint)` function; [`StreamingParser`] follows the chain
//! of `hint`s (next-header / destination-port) to compose them into a
//! stack, the way RFC 8724 deployments typically see IPv6 -> UDP ->
//! CoAP. No semantic interpretation happens here: every field comes out
//! as a raw bit range in on-wire form.

mod coap;
mod ipv4;
mod ipv6;
mod sctp;
mod udp;

use crate::buffer::Buffer;
use crate::error::ParseError;
use crate::field::{Direction, FieldDescriptor, FieldId};

/// What comes next while walking the protocol stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProtocolHint {
    Ipv4,
    Ipv6,
    Ipv6Ext(u8),
    Udp,
    Sctp,
    Coap,
    /// Nothing more to parse; the remaining bytes are opaque payload.
    Payload,
}

/// The result of parsing: an ordered sequence of named field buffers,
/// plus the trailing, uninterpreted payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketDescriptor {
    pub fields: Vec<(FieldDescriptor, Buffer)>,
    pub payload: Buffer,
}

impl PacketDescriptor {
    /// Field values only, in on-wire order, dropping the descriptors.
    /// This is what the Ruler zips against a rule's field descriptors.
    pub fn field_values(&self) -> Vec<Buffer> {
        self.fields.iter().map(|(_, v)| v.clone()).collect()
    }

    /// Re-serialise the descriptor back to raw bytes by concatenating
    /// every field buffer, in order, followed by the payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut acc = Buffer::from_bytes(Vec::new());
        for (_, value) in &self.fields {
            acc = acc.concat(value);
        }
        acc = acc.concat(&self.payload);
        acc.pad(crate::buffer::Padding::Right).content().to_vec()
    }
}

/// Confirms `nbytes` bytes are available at `offset`, or reports
/// [`ParseError::Truncated`] against `field`.
fn require(data: &[u8], offset: usize, nbytes: usize, field: FieldId) -> Result<(), ParseError> {
    let available = data.len().saturating_sub(offset);
    if available < nbytes {
        return Err(ParseError::Truncated {
            field,
            needed: nbytes * 8,
            available: available * 8,
        });
    }
    Ok(())
}

/// A whole byte region as a byte-aligned [`Buffer`], used as the source
/// every protocol parser slices fields out of.
fn region(data: &[u8], offset: usize, nbytes: usize) -> Buffer {
    Buffer::from_bytes(data[offset..offset + nbytes].to_vec())
}

fn field(id: FieldId, length: usize) -> FieldDescriptor {
    FieldDescriptor::new(id, length, 0, Direction::Bidirectional)
}

fn field_at(id: FieldId, length: usize, position: u8) -> FieldDescriptor {
    FieldDescriptor::new(id, length, position, Direction::Bidirectional)
}

/// Incrementally parses a single packet, walking the protocol stack once
/// and caching the resulting fields until [`StreamingParser::into_descriptor`]
/// hands them off.
struct StreamingParser<'a> {
    data: &'a [u8],
    #[allow(dead_code)]
    direction: Direction,
    fields: Vec<(FieldDescriptor, Buffer)>,
    payload: Buffer,
    parsed: bool,
}

impl<'a> StreamingParser<'a> {
    fn new(data: &'a [u8], direction: Direction) -> Result<Self, ParseError> {
        if data.is_empty() {
            return Err(ParseError::Truncated {
                field: FieldId::Ipv4Version,
                needed: 4,
                available: 0,
            });
        }
        Ok(StreamingParser {
            data,
            direction,
            fields: Vec::new(),
            payload: Buffer::from_bytes(Vec::new()),
            parsed: false,
        })
    }

    fn ensure_parsed(&mut self) -> Result<(), ParseError> {
        if self.parsed {
            return Ok(());
        }
        self.run()?;
        self.parsed = true;
        Ok(())
    }

    fn run(&mut self) -> Result<(), ParseError> {
        let version_nibble = self.data[0] >> 4;
        let mut hint = match version_nibble {
            4 => ProtocolHint::Ipv4,
            6 => ProtocolHint::Ipv6,
            other => {
                return Err(ParseError::Malformed {
                    field: FieldId::Ipv4Version,
                    reason: format!("unrecognised IP version nibble {other}"),
                })
            }
        };
        let mut offset = 0usize;
        let mut ext_header_hops = 0u8;

        loop {
            let (fields, next_offset, next_hint) = match hint {
                ProtocolHint::Ipv4 => ipv4::parse(self.data, offset)?,
                ProtocolHint::Ipv6 => ipv6::parse(self.data, offset)?,
                ProtocolHint::Ipv6Ext(next_header) => {
                    ext_header_hops += 1;
                    if ext_header_hops > 8 {
                        return Err(ParseError::Malformed {
                            field: FieldId::Ipv6ExtNextHeader,
                            reason: "too many chained IPv6 extension headers".into(),
                        });
                    }
                    ipv6::parse_extension(self.data, offset, next_header, ext_header_hops - 1)?
                }
                ProtocolHint::Udp => udp::parse(self.data, offset)?,
                ProtocolHint::Sctp => sctp::parse(self.data, offset)?,
                ProtocolHint::Coap => coap::parse(self.data, offset)?,
                ProtocolHint::Payload => break,
            };
            self.fields.extend(fields);
            offset = next_offset;
            hint = next_hint;
        }

        self.payload = Buffer::from_bytes(self.data[offset..].to_vec());
        Ok(())
    }

    fn into_descriptor(mut self) -> Result<PacketDescriptor, ParseError> {
        self.ensure_parsed()?;
        Ok(PacketDescriptor {
            fields: self.fields,
            payload: self.payload,
        })
    }
}

/// Parse `data` (no link-layer framing; the first byte's high nibble is
/// the IP version) into a [`PacketDescriptor`].
pub fn parse(data: &[u8], direction: Direction) -> Result<PacketDescriptor, ParseError> {
    StreamingParser::new(data, direction)?.into_descriptor()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ipv6_udp_coap_packet() -> Vec<u8> {
        let mut pkt = Vec::new();
        // IPv6 fixed header
        pkt.push(0x60); // version 6, traffic class high nibble 0
        pkt.push(0x00); // traffic class low nibble + flow label top 4 bits
        pkt.push(0x00);
        pkt.push(0x00); // flow label rest
        let coap = [0x40, 0x01, 0x00, 0x01]; // ver1 type0 tkl0, GET, mid=1
        let udp_len = 8 + coap.len() as u16;
        pkt.extend_from_slice(&udp_len.to_be_bytes()); // placeholder for payload_length, fixed below
        pkt.push(17); // next_header = UDP
        pkt.push(64); // hop limit
        pkt.extend_from_slice(&[0x20, 0x01, 0x0d, 0xb8, 0, 0x0a, 0, 0, 0, 0, 0, 0, 0, 0, 0, 3]); // src
        pkt.extend_from_slice(&[0x20, 0x01, 0x0d, 0xb8, 0, 0x0a, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x20]); // dst
        // UDP header
        pkt.extend_from_slice(&5683u16.to_be_bytes()); // src port
        pkt.extend_from_slice(&5683u16.to_be_bytes()); // dst port
        pkt.extend_from_slice(&udp_len.to_be_bytes());
        pkt.extend_from_slice(&0u16.to_be_bytes()); // checksum
        pkt.extend_from_slice(&coap);
        pkt
    }

    #[test]
    fn s3_ipv6_field_order() {
        let pkt = ipv6_udp_coap_packet();
        let descriptor = parse(&pkt, Direction::Up).unwrap();
        let ids: Vec<FieldId> = descriptor.fields.iter().map(|(fd, _)| fd.id).collect();
        assert_eq!(
            &ids[0..8],
            &[
                FieldId::Ipv6Version,
                FieldId::Ipv6TrafficClass,
                FieldId::Ipv6FlowLabel,
                FieldId::Ipv6PayloadLength,
                FieldId::Ipv6NextHeader,
                FieldId::Ipv6HopLimit,
                FieldId::Ipv6SrcAddress,
                FieldId::Ipv6DstAddress,
            ]
        );
        let src_addr = &descriptor.fields[6].1;
        assert_eq!(src_addr.length(), 128);
    }

    #[test]
    fn round_trips_to_original_bytes() {
        let pkt = ipv6_udp_coap_packet();
        let descriptor = parse(&pkt, Direction::Up).unwrap();
        assert_eq!(descriptor.to_bytes(), pkt);
    }

    #[test]
    fn truncated_packet_is_reported() {
        let pkt = vec![0x60, 0x00, 0x00];
        assert!(matches!(
            parse(&pkt, Direction::Up),
            Err(ParseError::Truncated { .. })
        ));
    }
}
