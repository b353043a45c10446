//! Static Context Header Compression (RFC 8724) over IPv4, IPv6, UDP,
//! SCTP and CoAP.
//!
//! Four subsystems, each in its own module, cooperate to turn a raw
//! packet into a compressed residue stream and back:
//!
//! - [`buffer`] -- the bit-exact, padding-aware container everything
//!   else is built from.
//! - [`parser`] -- syntactic decomposition of raw bytes into an ordered
//!   sequence of field buffers (the Parser).
//! - [`tree`] -- first-match rule selection against a compiled ruleset
//!   (the Ruler).
//! - [`compressor`] / [`decompressor`] -- the compression/decompression
//!   actions that turn matched fields into residues and back.
//!
//! [`rule`] and [`field`] hold the data model those subsystems share;
//! [`wire`] holds the variable-length-field framing and bit cursor both
//! directions need; [`checksum`] holds the length/checksum
//! recomputation the decompressor's post-pass relies on.

pub mod buffer;
pub mod checksum;
pub mod compressor;
pub mod decompressor;
pub mod error;
pub mod field;
pub mod parser;
pub mod rule;
pub mod tree;
pub mod wire;

pub use buffer::{Buffer, Padding, ShiftMode, Value, ValueKind};
pub use compressor::{compress, compress_packet, CompressResult};
pub use decompressor::{decompress, decompress_packet, DecompressResult};
pub use error::{BufferError, CompressError, DecompressError, MatchError, ParseError};
pub use field::{Direction, FieldDescriptor, FieldId};
pub use parser::{parse, PacketDescriptor};
pub use rule::{CompressionAction, Context, MatchingOperator, Rule, RuleFieldDescriptor, RuleNature, RuleSet, TargetValue};
pub use tree::{build_tree, display_tree, find_rule_by_id, select_rule, TreeNode};

#[cfg(test)]
mod tests {
    use super::*;

    fn ipv6_udp_coap_packet(checksum: u16) -> Vec<u8> {
        let mut pkt = Vec::new();
        pkt.push(0x60);
        pkt.push(0x00);
        pkt.push(0x00);
        pkt.push(0x00);
        let coap = [0x40, 0x01, 0x00, 0x01];
        let udp_len = 8 + coap.len() as u16;
        pkt.extend_from_slice(&udp_len.to_be_bytes());
        pkt.push(17);
        pkt.push(64);
        pkt.extend_from_slice(&[0x20, 0x01, 0x0d, 0xb8, 0, 0x0a, 0, 0, 0, 0, 0, 0, 0, 0, 0, 3]);
        pkt.extend_from_slice(&[0x20, 0x01, 0x0d, 0xb8, 0, 0x0a, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x20]);
        pkt.extend_from_slice(&5683u16.to_be_bytes());
        pkt.extend_from_slice(&5683u16.to_be_bytes());
        pkt.extend_from_slice(&udp_len.to_be_bytes());
        pkt.extend_from_slice(&checksum.to_be_bytes());
        pkt.extend_from_slice(&coap);
        pkt
    }

    fn coap_over_ipv6_rule() -> Rule {
        use buffer::Padding;
        let ignore16 = || TargetValue::Single(rule::HexBuffer(Buffer::zeros(16, Padding::Right)));
        let exact = |v: u128, len: usize| TargetValue::Single(rule::HexBuffer(Buffer::from_u128(v, len, Padding::Right)));
        let fd = |id: FieldId, length: usize| FieldDescriptor::new(id, length, 0, Direction::Bidirectional);
        let f = |id, length, target, mo, action| RuleFieldDescriptor {
            field: fd(id, length),
            target_value: target,
            matching_operator: mo,
            compression_action: action,
        };
        use CompressionAction as CA;
        use MatchingOperator as MO;

        Rule {
            rule_id: 1,
            rule_id_length: 4,
            nature: RuleNature::Compression,
            field_descriptors: vec![
                f(FieldId::Ipv6Version, 4, exact(6, 4), MO::Equal, CA::NotSent),
                f(FieldId::Ipv6TrafficClass, 8, exact(0, 8), MO::Equal, CA::NotSent),
                f(FieldId::Ipv6FlowLabel, 20, exact(0, 20), MO::Equal, CA::NotSent),
                f(
                    FieldId::Ipv6PayloadLength,
                    16,
                    ignore16(),
                    MO::Ignore,
                    CA::ComputeIpv6PayloadLength,
                ),
                f(FieldId::Ipv6NextHeader, 8, exact(17, 8), MO::Equal, CA::NotSent),
                f(FieldId::Ipv6HopLimit, 8, exact(64, 8), MO::Equal, CA::NotSent),
                f(
                    FieldId::Ipv6SrcAddress,
                    128,
                    exact(0x2001_0db8_000a_0000_0000_0000_0000_0003, 128),
                    MO::Equal,
                    CA::NotSent,
                ),
                f(
                    FieldId::Ipv6DstAddress,
                    128,
                    exact(0x2001_0db8_000a_0000_0000_0000_0000_0020, 128),
                    MO::Equal,
                    CA::NotSent,
                ),
                f(FieldId::UdpSrcPort, 16, exact(5683, 16), MO::Equal, CA::NotSent),
                f(FieldId::UdpDstPort, 16, exact(5683, 16), MO::Equal, CA::NotSent),
                f(FieldId::UdpLength, 16, ignore16(), MO::Ignore, CA::ComputeUdpLength),
                f(FieldId::UdpChecksum, 16, ignore16(), MO::Ignore, CA::ComputeUdpChecksum),
                f(FieldId::CoapVersion, 2, exact(1, 2), MO::Equal, CA::NotSent),
                f(FieldId::CoapType, 2, exact(0, 2), MO::Equal, CA::NotSent),
                f(FieldId::CoapTokenLength, 4, exact(0, 4), MO::Equal, CA::NotSent),
                f(FieldId::CoapCode, 8, exact(1, 8), MO::Equal, CA::NotSent),
                f(
                    FieldId::CoapMessageId,
                    16,
                    TargetValue::Single(rule::HexBuffer(Buffer::zeros(16, Padding::Right))),
                    MO::Ignore,
                    CA::ValueSent,
                ),
            ],
            comment: Some("GET over the canonical CoAP port, fixed addresses".to_string()),
        }
    }

    #[test]
    fn full_stack_round_trips_with_recomputed_checksum() {
        let pkt = ipv6_udp_coap_packet(0xBEEF); // wrong on purpose; decompression must fix it
        let rule = coap_over_ipv6_rule();
        let context = Context {
            id: "test".to_string(),
            interface_id: "eth0".to_string(),
            parser_id: "default".to_string(),
            ruleset: RuleSet {
                rules: vec![rule.clone()],
            },
        };
        let tree = build_tree(&context.ruleset.rules);

        let compressed = compress_packet(&tree, &pkt, Direction::Up, &context.ruleset.rules, false).unwrap();
        // Everything but the message ID and the computed fields is
        // not-sent: rule id (4 bits) + message id (16 bits) = 20 bits.
        assert_eq!(compressed.compressed_header_bits, 20);

        let restored = decompress(&compressed.data, &context, Direction::Up).unwrap();
        let mut expected = pkt.clone();
        // The checksum we deliberately corrupted must come back correct.
        let correct_checksum = {
            let src = &expected[8..24];
            let dst = &expected[24..40];
            let mut segment = expected[40..].to_vec();
            segment[6..8].copy_from_slice(&[0, 0]); // zero the checksum before summing, per RFC 768
            checksum::udp_checksum_ipv6(src, dst, &segment)
        };
        expected[46..48].copy_from_slice(&correct_checksum.to_be_bytes());
        assert_eq!(restored.full_data, expected);
    }

    /// Same scenario as [`full_stack_round_trips_with_recomputed_checksum`]
    /// but with a non-empty CoAP payload after the `0xFF` marker, so the
    /// recomputed UDP length, IPv6 payload length and UDP checksum must
    /// all account for bytes that never appear in any rule field.
    #[test]
    fn full_stack_round_trips_with_trailing_application_payload() {
        let body = [0xCA, 0xFE, 0xBA, 0xBE, 0x01];
        let mut pkt = ipv6_udp_coap_packet(0);
        pkt.push(0xFF);
        pkt.extend_from_slice(&body);

        // Fix up the lengths the helper baked in for the no-payload case.
        let extra = 1 + body.len();
        let udp_len = u16::from_be_bytes([pkt[44], pkt[45]]) + extra as u16;
        pkt[44..46].copy_from_slice(&udp_len.to_be_bytes());
        pkt[4..6].copy_from_slice(&udp_len.to_be_bytes());

        // The payload marker is itself a rule field (it must be there for
        // the decompressor to know a payload follows); the opaque body
        // after it is not -- that part lives in `PacketDescriptor::payload`.
        let mut rule = coap_over_ipv6_rule();
        rule.field_descriptors.push(RuleFieldDescriptor {
            field: FieldDescriptor::new(FieldId::CoapPayloadMarker, 8, 0, Direction::Bidirectional),
            target_value: TargetValue::Single(rule::HexBuffer(Buffer::from_u128(0xFF, 8, Padding::Right))),
            matching_operator: MatchingOperator::Equal,
            compression_action: CompressionAction::NotSent,
        });

        let context = Context {
            id: "test".to_string(),
            interface_id: "eth0".to_string(),
            parser_id: "default".to_string(),
            ruleset: RuleSet {
                rules: vec![rule],
            },
        };
        let tree = build_tree(&context.ruleset.rules);

        let compressed = compress_packet(&tree, &pkt, Direction::Up, &context.ruleset.rules, false).unwrap();
        let restored = decompress(&compressed.data, &context, Direction::Up).unwrap();

        assert_eq!(restored.full_data, pkt);
        let restored_udp_len = u16::from_be_bytes([restored.full_data[44], restored.full_data[45]]);
        assert_eq!(restored_udp_len as usize, 8 + 4 + 1 + body.len());
    }
}
