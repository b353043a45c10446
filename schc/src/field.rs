//! Field identity: which slot of a packet a value came from, and which
//! way the packet was travelling when it was observed.

use serde::{Deserialize, Serialize};

/// Direction of packet travel relative to the constrained device: `Up`
/// towards the network, `Down` towards the device, or `Bidirectional`
/// when a rule field applies regardless of direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Bidirectional,
}

impl Direction {
    /// Whether a rule field descriptor carrying `self` as its direction
    /// applies to a packet observed travelling in `packet_direction`.
    pub fn compatible_with(self, packet_direction: Direction) -> bool {
        match self {
            Direction::Bidirectional => true,
            _ => self == packet_direction,
        }
    }
}

/// Identifies every field the bundled protocol parsers can emit.
///
/// Field identity is purely syntactic: CoAP options are split at
/// Delta/Length/Value without computing absolute option numbers, and IP
/// extension headers are exposed as their wire sub-fields. This keeps
/// the parser symmetric with the serialiser the decompressor drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldId {
    // IPv4
    Ipv4Version,
    Ipv4Ihl,
    Ipv4Dscp,
    Ipv4Ecn,
    Ipv4TotalLength,
    Ipv4Identification,
    Ipv4Flags,
    Ipv4FragmentOffset,
    Ipv4Ttl,
    Ipv4Protocol,
    Ipv4HeaderChecksum,
    Ipv4SrcAddress,
    Ipv4DstAddress,
    Ipv4Options,

    // IPv6
    Ipv6Version,
    Ipv6TrafficClass,
    Ipv6FlowLabel,
    Ipv6PayloadLength,
    Ipv6NextHeader,
    Ipv6HopLimit,
    Ipv6SrcAddress,
    Ipv6DstAddress,

    // IPv6 extension headers (Hop-by-Hop, Routing, Destination Options)
    Ipv6ExtNextHeader,
    Ipv6ExtHeaderLength,
    Ipv6ExtOptions,

    // UDP
    UdpSrcPort,
    UdpDstPort,
    UdpLength,
    UdpChecksum,

    // SCTP common header
    SctpSrcPort,
    SctpDstPort,
    SctpVerificationTag,
    SctpChecksum,

    // CoAP
    CoapVersion,
    CoapType,
    CoapTokenLength,
    CoapCode,
    CoapMessageId,
    CoapToken,
    CoapOptionDelta,
    CoapOptionDeltaExt,
    CoapOptionLength,
    CoapOptionLengthExt,
    CoapOptionValue,
    CoapPayloadMarker,

    /// A protocol-opaque payload; always the last field of a
    /// `PacketDescriptor`, never part of a rule's field descriptors.
    Payload,

    /// The rule ID itself, used only to tag errors raised while reading
    /// the rule ID prefix off a compressed stream. Never appears in a
    /// `PacketDescriptor` or a rule's field descriptors.
    RuleId,
}

/// Identifies one slot in a packet.
///
/// `position` disambiguates repeated occurrences of the same `id`, such
/// as successive CoAP options: the first Option-Value field in a packet
/// has `position == 0`, the second `position == 1`, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub id: FieldId,
    /// Length in bits, or `0` for a variable-length field whose actual
    /// length is only known once parsed.
    pub length: usize,
    pub position: u8,
    pub direction: Direction,
}

impl FieldDescriptor {
    pub fn new(id: FieldId, length: usize, position: u8, direction: Direction) -> Self {
        FieldDescriptor {
            id,
            length,
            position,
            direction,
        }
    }

    pub fn is_variable_length(&self) -> bool {
        self.length == 0
    }
}
