//! The Decompressor: the inverse of [`crate::compressor`].
//!
//! The rule ID is read off the front of the stream to find the rule,
//! then each field is reconstructed by inverting its compression
//! action. Fields whose action is `compute-*` are filled in afterwards,
//! once the whole header and payload are known, per RFC 8724 section 7
//! and RFC 8200 section 8.1.

use crate::buffer::{Buffer, Padding};
use crate::checksum::{udp_checksum_ipv4, udp_checksum_ipv6};
use crate::error::DecompressError;
use crate::field::{Direction, FieldDescriptor, FieldId};
use crate::parser::PacketDescriptor;
use crate::rule::{CompressionAction, Context, Rule, RuleFieldDescriptor};
use crate::wire::BitReader;

/// The reconstructed packet, plus the bookkeeping an observer needs
/// without re-deriving it from `descriptor`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecompressResult {
    pub descriptor: PacketDescriptor,
    /// Bits consumed from the compressed stream for the rule ID and
    /// residues, before rounding up to the payload's byte boundary.
    pub bits_consumed: usize,
    /// The full reconstructed packet, header and payload together.
    pub full_data: Vec<u8>,
    /// The reconstructed header only, byte-aligned.
    pub header_data: Vec<u8>,
    pub rule_id: u32,
}

/// Decompress `compressed` using `context`'s ruleset for a packet
/// travelling in `direction`.
pub fn decompress(
    compressed: &[u8],
    context: &Context,
    direction: Direction,
) -> Result<DecompressResult, DecompressError> {
    let rule_id_length = context
        .rule_id_length()
        .ok_or(DecompressError::Match(crate::error::MatchError::NoRule))?;

    let mut reader = BitReader::new(compressed);
    let rule_id = reader.read(rule_id_length as usize, FieldId::RuleId)?.value_unsigned()? as u32;
    let rule = crate::tree::find_rule_by_id(&context.ruleset.rules, rule_id, rule_id_length)?;

    decompress_with_rule(&mut reader, rule, direction, compressed)
}

/// Parse a rule ID, find the rule in `rules`, and decompress -- the
/// shape mirrors [`crate::compressor::compress_packet`] for callers
/// that keep a compiled [`crate::tree::TreeNode`] around instead of a
/// [`Context`].
pub fn decompress_packet(
    compressed: &[u8],
    rules: &[Rule],
    direction: Direction,
    rule_id_length: Option<u8>,
) -> Result<DecompressResult, DecompressError> {
    let rule_id_length = rule_id_length
        .or_else(|| rules.first().map(|r| r.rule_id_length))
        .ok_or(DecompressError::Match(crate::error::MatchError::NoRule))?;

    let mut reader = BitReader::new(compressed);
    let rule_id = reader.read(rule_id_length as usize, FieldId::RuleId)?.value_unsigned()? as u32;
    let rule = crate::tree::find_rule_by_id(rules, rule_id, rule_id_length)?;

    decompress_with_rule(&mut reader, rule, direction, compressed)
}

fn decompress_with_rule(
    reader: &mut BitReader,
    rule: &Rule,
    direction: Direction,
    compressed: &[u8],
) -> Result<DecompressResult, DecompressError> {
    let mut fields: Vec<(FieldDescriptor, Buffer)> = Vec::new();
    for rule_field in rule.fields_for_direction(direction) {
        let value = decompress_field(reader, rule_field)?;
        fields.push((rule_field.field, value));
    }

    let bits_consumed = reader.position();
    let header_bytes_consumed = bits_consumed.div_ceil(8).min(compressed.len());
    let payload = Buffer::from_bytes(compressed[header_bytes_consumed..].to_vec());

    run_post_pass(&mut fields, payload.content())?;

    let mut header_buf = Buffer::from_bytes(Vec::new());
    for (_, value) in &fields {
        header_buf = header_buf.concat(value);
    }
    let header_data = header_buf.pad(Padding::Right).content().to_vec();

    let mut full_data = header_data.clone();
    full_data.extend_from_slice(payload.content());

    Ok(DecompressResult {
        descriptor: PacketDescriptor { fields, payload },
        bits_consumed,
        full_data,
        header_data,
        rule_id: rule.rule_id,
    })
}

fn decompress_field(reader: &mut BitReader, rule_field: &RuleFieldDescriptor) -> Result<Buffer, DecompressError> {
    let id = rule_field.field.id;
    match rule_field.compression_action {
        CompressionAction::NotSent => {
            let target = rule_field
                .target_value
                .as_single()
                .cloned()
                .unwrap_or_else(|| Buffer::zeros(rule_field.field.length, Padding::Right));
            Ok(target)
        }

        CompressionAction::ValueSent => {
            if rule_field.field.is_variable_length() {
                let byte_len = reader.read_length_prefix(id)?;
                reader.read(byte_len * 8, id)
            } else {
                reader.read(rule_field.field.length, id)
            }
        }

        CompressionAction::MappingSent => {
            let list = rule_field
                .target_value
                .as_mapping()
                .ok_or(DecompressError::MappingOutOfRange {
                    field: id,
                    index: 0,
                    mapping_len: 0,
                })?;
            let bits = crate::wire::mapping_index_bits(list.len());
            let index = reader.read(bits, id)?.value_unsigned()? as usize;
            list.get(index)
                .map(|hex| hex.0.clone())
                .ok_or(DecompressError::MappingOutOfRange {
                    field: id,
                    index,
                    mapping_len: list.len(),
                })
        }

        CompressionAction::Lsb(x) => {
            let target = rule_field
                .target_value
                .as_single()
                .ok_or(DecompressError::LengthPrefixInvalid { field: id })?;
            let msb_len = x;
            let msb = if msb_len > 0 {
                target.slice(0, msb_len as isize)?
            } else {
                Buffer::zeros(0, Padding::Right)
            };
            let lsb = if rule_field.field.is_variable_length() {
                let byte_len = reader.read_length_prefix(id)?;
                reader.read(byte_len * 8, id)?
            } else {
                let lsb_len = rule_field.field.length.saturating_sub(msb_len);
                reader.read(lsb_len, id)?
            };
            Ok(msb.concat(&lsb))
        }

        action if action.is_computed() => Ok(Buffer::zeros(rule_field.field.length, Padding::Right)),

        _ => unreachable!("every CompressionAction variant is handled above"),
    }
}

fn find_index(fields: &[(FieldDescriptor, Buffer)], id: FieldId) -> Option<usize> {
    fields.iter().position(|(fd, _)| fd.id == id)
}

/// Byte length of every field from `start` (inclusive) to the end of
/// `fields`. Uses each field's *reconstructed* bit length rather than
/// the rule's declared length, since variable-length fields (CoAP
/// token, option value, ...) declare `0` in the rule but carry their
/// actual length once decompressed. Every group of fields we sum here
/// begins and ends on a byte boundary, so dividing by 8 is exact.
fn bytes_from(fields: &[(FieldDescriptor, Buffer)], start: usize) -> usize {
    fields[start..].iter().map(|(_, v)| v.length()).sum::<usize>() / 8
}

/// Fill in every `compute-*` field once the rest of the header (and the
/// payload) is known. `payload` is the opaque application payload
/// trailing the reconstructed header fields -- its bytes count towards
/// every length/checksum computed here exactly as they would have
/// counted on the wire. Order matters: IPv4/IPv6 length fields must be
/// resolved before the UDP checksum, since the checksum's pseudo-header
/// needs the UDP length.
fn run_post_pass(fields: &mut Vec<(FieldDescriptor, Buffer)>, payload: &[u8]) -> Result<(), DecompressError> {
    if let Some(idx) = find_index(fields, FieldId::Ipv6PayloadLength) {
        let dst_idx = find_index(fields, FieldId::Ipv6DstAddress).expect("Ipv6PayloadLength implies an IPv6 header");
        let payload_length = bytes_from(fields, dst_idx + 1) + payload.len();
        fields[idx].1 = Buffer::from_u128(payload_length as u128, 16, Padding::Right);
    }

    if let Some(idx) = find_index(fields, FieldId::Ipv4TotalLength) {
        let total_length = bytes_from(fields, 0) + payload.len();
        fields[idx].1 = Buffer::from_u128(total_length as u128, 16, Padding::Right);
    }

    if let Some(idx) = find_index(fields, FieldId::UdpLength) {
        let src_idx = find_index(fields, FieldId::UdpSrcPort).expect("UdpLength implies a UDP header");
        let udp_length = bytes_from(fields, src_idx) + payload.len();
        fields[idx].1 = Buffer::from_u128(udp_length as u128, 16, Padding::Right);
    }

    if let Some(idx) = find_index(fields, FieldId::UdpChecksum) {
        let src_port_idx = find_index(fields, FieldId::UdpSrcPort).expect("UdpChecksum implies a UDP header");
        let udp_segment = {
            let mut buf = Buffer::from_bytes(Vec::new());
            for (fd, v) in &fields[src_port_idx..] {
                if fd.id == FieldId::UdpChecksum {
                    buf = buf.concat(&Buffer::zeros(16, Padding::Right));
                } else {
                    buf = buf.concat(v);
                }
            }
            let mut bytes = buf.pad(Padding::Right).content().to_vec();
            bytes.extend_from_slice(payload);
            bytes
        };

        let checksum = if let Some(ipv6_idx) = find_index(fields, FieldId::Ipv6SrcAddress) {
            let src = fields[ipv6_idx].1.content().to_vec();
            let dst_idx = find_index(fields, FieldId::Ipv6DstAddress).expect("paired with Ipv6SrcAddress");
            let dst = fields[dst_idx].1.content().to_vec();
            udp_checksum_ipv6(&src, &dst, &udp_segment)
        } else if let Some(ipv4_idx) = find_index(fields, FieldId::Ipv4SrcAddress) {
            let src = fields[ipv4_idx].1.content().to_vec();
            let dst_idx = find_index(fields, FieldId::Ipv4DstAddress).expect("paired with Ipv4SrcAddress");
            let dst = fields[dst_idx].1.content().to_vec();
            udp_checksum_ipv4(&src, &dst, &udp_segment)
        } else {
            return Err(DecompressError::LengthPrefixInvalid {
                field: FieldId::UdpChecksum,
            });
        };
        fields[idx].1 = Buffer::from_u128(checksum as u128, 16, Padding::Right);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Padding;
    use crate::field::FieldDescriptor;
    use crate::rule::{HexBuffer, MatchingOperator, RuleNature, TargetValue};

    fn field(id: FieldId, length: usize) -> FieldDescriptor {
        FieldDescriptor::new(id, length, 0, Direction::Bidirectional)
    }

    #[test]
    fn not_sent_field_is_restored_from_the_target_value() {
        let rule_field = RuleFieldDescriptor {
            field: field(FieldId::UdpDstPort, 16),
            target_value: TargetValue::Single(HexBuffer(Buffer::from_u128(5683, 16, Padding::Right))),
            matching_operator: MatchingOperator::Equal,
            compression_action: CompressionAction::NotSent,
        };
        let mut reader = BitReader::new(&[]);
        let value = decompress_field(&mut reader, &rule_field).unwrap();
        assert_eq!(value.value_unsigned().unwrap(), 5683);
    }

    #[test]
    fn lsb_reassembles_msb_from_target_and_lsb_from_stream() {
        // 8-bit field, Lsb(4): top nibble comes from the rule's target
        // value, bottom nibble comes off the wire.
        let rule_field = RuleFieldDescriptor {
            field: field(FieldId::Ipv4Ttl, 8),
            target_value: TargetValue::Single(HexBuffer(Buffer::from_u128(0b1010_0000, 8, Padding::Right))),
            matching_operator: MatchingOperator::Msb(4),
            compression_action: CompressionAction::Lsb(4),
        };
        let mut reader = BitReader::new(&[0b0000_1101]); // carries the low nibble, 0xD
        let value = decompress_field(&mut reader, &rule_field).unwrap();
        assert_eq!(value.value_unsigned().unwrap(), 0b1010_1101);
    }

    #[test]
    fn post_pass_fills_udp_length_and_checksum() {
        let mut fields = vec![
            (field(FieldId::Ipv6SrcAddress, 128), Buffer::from_bytes(vec![0; 16])),
            (field(FieldId::Ipv6DstAddress, 128), Buffer::from_bytes(vec![1; 16])),
            (field(FieldId::UdpSrcPort, 16), Buffer::from_u128(5683, 16, Padding::Right)),
            (field(FieldId::UdpDstPort, 16), Buffer::from_u128(5683, 16, Padding::Right)),
            (field(FieldId::UdpLength, 16), Buffer::zeros(16, Padding::Right)),
            (field(FieldId::UdpChecksum, 16), Buffer::zeros(16, Padding::Right)),
        ];
        run_post_pass(&mut fields, &[]).unwrap();
        let udp_length_idx = find_index(&fields, FieldId::UdpLength).unwrap();
        assert_eq!(fields[udp_length_idx].1.value_unsigned().unwrap(), 8);
        let checksum_idx = find_index(&fields, FieldId::UdpChecksum).unwrap();
        assert_ne!(fields[checksum_idx].1.value_unsigned().unwrap(), 0);
    }

    #[test]
    fn post_pass_counts_the_trailing_payload_into_every_length() {
        let payload = vec![0xDE, 0xAD, 0xBE, 0xEF];
        let mut fields = vec![
            (field(FieldId::Ipv6SrcAddress, 128), Buffer::from_bytes(vec![0; 16])),
            (field(FieldId::Ipv6DstAddress, 128), Buffer::from_bytes(vec![1; 16])),
            (field(FieldId::UdpSrcPort, 16), Buffer::from_u128(5683, 16, Padding::Right)),
            (field(FieldId::UdpDstPort, 16), Buffer::from_u128(5683, 16, Padding::Right)),
            (field(FieldId::UdpLength, 16), Buffer::zeros(16, Padding::Right)),
            (field(FieldId::UdpChecksum, 16), Buffer::zeros(16, Padding::Right)),
        ];
        let mut fields_no_payload = fields.clone();

        run_post_pass(&mut fields, &payload).unwrap();
        run_post_pass(&mut fields_no_payload, &[]).unwrap();

        let udp_length_idx = find_index(&fields, FieldId::UdpLength).unwrap();
        // 8-byte UDP header plus the 4-byte payload.
        assert_eq!(fields[udp_length_idx].1.value_unsigned().unwrap(), 12);

        let checksum_idx = find_index(&fields, FieldId::UdpChecksum).unwrap();
        let checksum_no_payload_idx = find_index(&fields_no_payload, FieldId::UdpChecksum).unwrap();
        assert_ne!(
            fields[checksum_idx].1.value_unsigned().unwrap(),
            fields_no_payload[checksum_no_payload_idx].1.value_unsigned().unwrap(),
            "the checksum must change when the payload it's computed over changes"
        );
    }
}
