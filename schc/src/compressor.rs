//! The Compressor: turns a matched rule and a parsed packet into the
//! on-wire residue stream.
//!
//! For each field, in rule order, the field's compression action
//! decides what (if anything) gets sent. The residues are concatenated
//! behind the rule ID and the whole header is right-padded to a byte
//! boundary before the payload is appended, per RFC 8724 section 7.

use crate::buffer::{Buffer, Padding};
use crate::error::CompressError;
use crate::field::Direction;
use crate::parser::PacketDescriptor;
use crate::rule::{CompressionAction, Rule, RuleFieldDescriptor};
use crate::wire::{mapping_index_bits, with_length_prefix};

/// The compressed form of a packet, plus the bookkeeping an observer
/// needs to report savings without re-deriving them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressResult {
    /// `rule_id ++ residues ++ payload`, byte-aligned.
    pub data: Vec<u8>,
    /// `rule_id ++ residues` only, byte-aligned; `data` without the
    /// trailing payload.
    pub header: Vec<u8>,
    pub rule_id: u32,
    pub rule_id_length: u8,
    /// Bit length of the original, uncompressed header fields (the
    /// packet's fields before compression, excluding payload).
    pub original_header_bits: usize,
    /// Bit length of `rule_id ++ residues` before the final byte pad.
    pub compressed_header_bits: usize,
}

impl CompressResult {
    pub fn savings_bits(&self) -> usize {
        self.original_header_bits.saturating_sub(self.compressed_header_bits)
    }
}

/// Compress `descriptor` against `rule` for a packet travelling in
/// `direction`. The caller is expected to have already selected `rule`
/// via [`crate::tree::select_rule`]; this function does not re-check
/// that fields actually satisfy the rule's matching operators.
pub fn compress(
    descriptor: &PacketDescriptor,
    rule: &Rule,
    direction: Direction,
) -> Result<CompressResult, CompressError> {
    let applicable = rule.fields_for_direction(direction);
    if !rule.is_default() && applicable.len() != descriptor.fields.len() {
        return Err(CompressError::FieldCountMismatch {
            rule_id: rule.rule_id,
            rule_id_length: rule.rule_id_length,
            rule_fields: applicable.len(),
            packet_fields: descriptor.fields.len(),
        });
    }

    let mut original_header_bits = 0usize;

    // The default rule has no field descriptors and so no CDAs to apply --
    // it matches `select_rule`'s own exception for `is_default()` in
    // `tree.rs` by carrying every field through unchanged, byte-aligned
    // behind the rule ID. The decompressor's symmetric treatment of a rule
    // with no fields reads exactly the rule ID and treats everything after
    // it as opaque payload, so nothing here may shift that byte boundary --
    // unlike the compressed case below, the rule ID itself is padded to a
    // byte before the (already byte-aligned) header fields are appended.
    let (header, compressed_header_bits) = if rule.is_default() {
        let mut body = Buffer::from_bytes(Vec::new());
        for (_, value) in &descriptor.fields {
            original_header_bits += value.length();
            body = body.concat(value);
        }
        // The fields summed to the original, byte-aligned header, so `body`
        // is already a whole number of bytes; padding is a no-op here and
        // only makes that invariant explicit.
        let mut header = rule.id_buffer().pad(Padding::Right).content().to_vec();
        header.extend_from_slice(body.pad(Padding::Right).content());
        (header, rule.id_buffer().length())
    } else {
        let mut stream = rule.id_buffer();
        for (rule_field, (_, value)) in applicable.iter().zip(descriptor.fields.iter()) {
            original_header_bits += value.length();
            let residue = compress_field(rule_field, value)?;
            stream = stream.concat(&residue);
        }
        (stream.pad(Padding::Right).content().to_vec(), stream.length())
    };

    let mut data = header.clone();
    data.extend_from_slice(descriptor.payload.content());

    Ok(CompressResult {
        data,
        header,
        rule_id: rule.rule_id,
        rule_id_length: rule.rule_id_length,
        original_header_bits,
        compressed_header_bits,
    })
}

/// Parse, match and compress `bytes` in one call -- the convenience
/// entry point most callers reach for.
pub fn compress_packet(
    tree: &crate::tree::TreeNode,
    bytes: &[u8],
    direction: Direction,
    rules: &[Rule],
    debug: bool,
) -> Result<CompressResult, CompressError> {
    let _ = rules; // rule lookup happens via `tree`; kept for call-shape parity with decompress_packet
    let descriptor = crate::parser::parse(bytes, direction)?;
    let rule = crate::tree::select_rule(tree, &descriptor.field_values(), direction)?;
    let result = compress(&descriptor, rule, direction)?;
    if debug {
        println!(
            "schc compress: rule {}/{} matched for {:?}, {} header bits -> {} header bits ({} saved)",
            result.rule_id,
            result.rule_id_length,
            direction,
            result.original_header_bits,
            result.compressed_header_bits,
            result.savings_bits(),
        );
    }
    Ok(result)
}

fn compress_field(rule_field: &RuleFieldDescriptor, value: &Buffer) -> Result<Buffer, CompressError> {
    match rule_field.compression_action {
        CompressionAction::NotSent => Ok(Buffer::zeros(0, Padding::Right)),

        CompressionAction::ValueSent => {
            if rule_field.field.is_variable_length() {
                Ok(with_length_prefix(value))
            } else {
                Ok(value.clone())
            }
        }

        CompressionAction::MappingSent => {
            let list = rule_field
                .target_value
                .as_mapping()
                .ok_or(CompressError::MappingNotFound {
                    field: rule_field.field.id,
                })?;
            let index = list
                .iter()
                .position(|candidate| &candidate.0 == value)
                .ok_or(CompressError::MappingNotFound {
                    field: rule_field.field.id,
                })?;
            let bits = mapping_index_bits(list.len());
            Ok(Buffer::from_u128(index as u128, bits, Padding::Left))
        }

        CompressionAction::Lsb(x) => {
            let remainder = value.slice(x as isize, value.length() as isize)?;
            if rule_field.field.is_variable_length() {
                Ok(with_length_prefix(&remainder))
            } else {
                Ok(remainder)
            }
        }

        action if action.is_computed() => Ok(Buffer::zeros(0, Padding::Right)),

        _ => unreachable!("every CompressionAction variant is handled above"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Padding;
    use crate::decompressor::decompress_packet;
    use crate::field::{FieldDescriptor, FieldId};
    use crate::rule::{HexBuffer, MatchingOperator, RuleNature, TargetValue};
    use crate::tree::build_tree;

    fn field(id: FieldId, length: usize) -> FieldDescriptor {
        FieldDescriptor::new(id, length, 0, Direction::Bidirectional)
    }

    #[test]
    fn not_sent_and_value_sent_round_trip_through_concat() {
        let descriptor = PacketDescriptor {
            fields: vec![
                (field(FieldId::UdpSrcPort, 16), Buffer::from_u128(5683, 16, Padding::Right)),
                (field(FieldId::UdpDstPort, 16), Buffer::from_u128(61616, 16, Padding::Right)),
            ],
            payload: Buffer::from_bytes(vec![0xAB]),
        };
        let rule = Rule {
            rule_id: 3,
            rule_id_length: 4,
            nature: RuleNature::Compression,
            field_descriptors: vec![
                RuleFieldDescriptor {
                    field: field(FieldId::UdpSrcPort, 16),
                    target_value: TargetValue::Single(HexBuffer(Buffer::from_u128(5683, 16, Padding::Right))),
                    matching_operator: MatchingOperator::Equal,
                    compression_action: CompressionAction::NotSent,
                },
                RuleFieldDescriptor {
                    field: field(FieldId::UdpDstPort, 16),
                    target_value: TargetValue::Single(HexBuffer(Buffer::zeros(16, Padding::Right))),
                    matching_operator: MatchingOperator::Ignore,
                    compression_action: CompressionAction::ValueSent,
                },
            ],
            comment: None,
        };

        let result = compress(&descriptor, &rule, Direction::Up).unwrap();
        // rule id (4 bits) + not-sent (0 bits) + value-sent port (16 bits) = 20 bits -> 3 bytes header.
        assert_eq!(result.compressed_header_bits, 20);
        assert_eq!(result.header.len(), 3);
        assert_eq!(result.data.len(), 4);
        assert_eq!(result.original_header_bits, 32);
        assert_eq!(result.savings_bits(), 12);
    }

    #[test]
    fn mapping_sent_picks_the_list_index() {
        let descriptor = PacketDescriptor {
            fields: vec![(field(FieldId::Ipv4Protocol, 8), Buffer::from_u128(17, 8, Padding::Right))],
            payload: Buffer::from_bytes(Vec::new()),
        };
        let mapping = vec![1, 6, 17, 58, 132]
            .into_iter()
            .map(|v| HexBuffer(Buffer::from_u128(v, 8, Padding::Right)))
            .collect();
        let rule = Rule {
            rule_id: 1,
            rule_id_length: 4,
            nature: RuleNature::Compression,
            field_descriptors: vec![RuleFieldDescriptor {
                field: field(FieldId::Ipv4Protocol, 8),
                target_value: TargetValue::Mapping(mapping),
                matching_operator: MatchingOperator::MatchMapping,
                compression_action: CompressionAction::MappingSent,
            }],
            comment: None,
        };

        let result = compress(&descriptor, &rule, Direction::Up).unwrap();
        // 5 entries -> ceil(log2(5)) == 3 index bits, plus the 4-bit rule id.
        assert_eq!(result.compressed_header_bits, 7);
    }

    fn ipv4_udp_packet() -> Vec<u8> {
        let payload = [0xDE, 0xAD, 0xBE];
        let udp_len = 8 + payload.len() as u16;
        let total_len = 20 + udp_len;
        let mut pkt = vec![
            0x45, 0x00, // version 4, IHL 5 (shares one byte); DSCP/ECN 0
        ];
        pkt.extend_from_slice(&total_len.to_be_bytes());
        pkt.extend_from_slice(&0x1234u16.to_be_bytes()); // identification
        pkt.extend_from_slice(&0u16.to_be_bytes()); // flags + fragment offset
        pkt.push(64); // ttl
        pkt.push(17); // protocol = UDP
        pkt.extend_from_slice(&0xBEEFu16.to_be_bytes()); // header checksum (unvalidated)
        pkt.extend_from_slice(&[10, 0, 0, 1]); // src
        pkt.extend_from_slice(&[10, 0, 0, 2]); // dst
        pkt.extend_from_slice(&12345u16.to_be_bytes()); // udp src port
        pkt.extend_from_slice(&54321u16.to_be_bytes()); // udp dst port (not 5683, so no CoAP hint)
        pkt.extend_from_slice(&udp_len.to_be_bytes());
        pkt.extend_from_slice(&0u16.to_be_bytes()); // udp checksum (unvalidated)
        pkt.extend_from_slice(&payload);
        pkt
    }

    /// A ruleset whose only specific rule requires a field count the
    /// packet never has, so every packet falls through to the default
    /// rule -- `compress_packet` must carry it through uncompressed
    /// instead of erroring with `FieldCountMismatch`, matching
    /// `select_rule`'s own `is_default()` exception in `tree.rs`.
    #[test]
    fn compress_packet_falls_back_to_default_rule() {
        let specific = Rule {
            rule_id: 1,
            rule_id_length: 4,
            nature: RuleNature::Compression,
            field_descriptors: vec![RuleFieldDescriptor {
                field: field(FieldId::UdpDstPort, 16),
                target_value: TargetValue::Single(HexBuffer(Buffer::from_u128(5683, 16, Padding::Right))),
                matching_operator: MatchingOperator::Equal,
                compression_action: CompressionAction::NotSent,
            }],
            comment: None,
        };
        let default_rule = Rule {
            rule_id: 0,
            rule_id_length: 4,
            nature: RuleNature::NoCompression,
            field_descriptors: Vec::new(),
            comment: Some("fallback: carry uncompressed".to_string()),
        };
        let rules = vec![specific, default_rule];
        let tree = build_tree(&rules);

        let pkt = ipv4_udp_packet();
        let result = compress_packet(&tree, &pkt, Direction::Up, &rules, false).unwrap();

        assert_eq!(result.rule_id, 0);
        // Rule ID alone, byte-padded -- no CDAs run for the default rule.
        assert_eq!(result.compressed_header_bits, 4);
        assert_eq!(result.header.len(), 1);
        // 1 rule-id byte + the untouched header (28 bytes) + app payload.
        assert_eq!(result.data.len(), pkt.len() + 1);

        let restored = decompress_packet(&result.data, &rules, Direction::Up, Some(4)).unwrap();
        assert_eq!(restored.full_data, pkt);
    }
}
