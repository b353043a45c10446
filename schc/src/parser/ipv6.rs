use super::{field, field_at, region, require, ProtocolHint};
use crate::buffer::Buffer;
use crate::error::ParseError;
use crate::field::{FieldDescriptor, FieldId};

const FIXED_HEADER_BYTES: usize = 40;

fn hint_for_next_header(next_header: u8) -> ProtocolHint {
    match next_header {
        0 | 43 | 44 | 60 => ProtocolHint::Ipv6Ext(next_header),
        17 => ProtocolHint::Udp,
        132 => ProtocolHint::Sctp,
        _ => ProtocolHint::Payload,
    }
}

pub(super) fn parse(
    data: &[u8],
    offset: usize,
) -> Result<(Vec<(FieldDescriptor, Buffer)>, usize, ProtocolHint), ParseError> {
    require(data, offset, FIXED_HEADER_BYTES, FieldId::Ipv6Version)?;

    let header = region(data, offset, FIXED_HEADER_BYTES);
    let mut fields = Vec::new();
    fields.push((field(FieldId::Ipv6Version, 4), header.slice(0, 4).unwrap()));
    fields.push((
        field(FieldId::Ipv6TrafficClass, 8),
        header.slice(4, 12).unwrap(),
    ));
    fields.push((
        field(FieldId::Ipv6FlowLabel, 20),
        header.slice(12, 32).unwrap(),
    ));
    fields.push((
        field(FieldId::Ipv6PayloadLength, 16),
        header.slice(32, 48).unwrap(),
    ));
    let next_header = header.slice(48, 56).unwrap();
    fields.push((field(FieldId::Ipv6NextHeader, 8), next_header.clone()));
    fields.push((field(FieldId::Ipv6HopLimit, 8), header.slice(56, 64).unwrap()));
    fields.push((
        field(FieldId::Ipv6SrcAddress, 128),
        header.slice(64, 192).unwrap(),
    ));
    fields.push((
        field(FieldId::Ipv6DstAddress, 128),
        header.slice(192, 320).unwrap(),
    ));

    let next_offset = offset + FIXED_HEADER_BYTES;
    let hint = hint_for_next_header(next_header.value_unsigned().unwrap() as u8);
    Ok((fields, next_offset, hint))
}

/// Parse one chained extension header: `next_header(8) | hdr_ext_len(8) |
/// options((hdr_ext_len + 1) * 8 - 16 bits)`.
///
/// `position` is this header's index in the chain (0 for the first
/// extension header after the fixed IPv6 header), so repeated chained
/// headers don't collide on field identity.
pub(super) fn parse_extension(
    data: &[u8],
    offset: usize,
    _current_next_header: u8,
    position: u8,
) -> Result<(Vec<(FieldDescriptor, Buffer)>, usize, ProtocolHint), ParseError> {
    require(data, offset, 2, FieldId::Ipv6ExtHeaderLength)?;
    let hdr_ext_len = data[offset + 1] as usize;
    let total_bytes = (hdr_ext_len + 1) * 8;
    require(data, offset, total_bytes, FieldId::Ipv6ExtOptions)?;

    let header = region(data, offset, total_bytes);
    let next_header = header.slice(0, 8).unwrap();
    let mut fields = vec![
        (field_at(FieldId::Ipv6ExtNextHeader, 8, position), next_header.clone()),
        (field_at(FieldId::Ipv6ExtHeaderLength, 8, position), header.slice(8, 16).unwrap()),
    ];
    let options_bits = total_bytes * 8 - 16;
    if options_bits > 0 {
        fields.push((
            field_at(FieldId::Ipv6ExtOptions, options_bits, position),
            header.slice(16, total_bytes as isize * 8).unwrap(),
        ));
    }

    let next_offset = offset + total_bytes;
    let hint = hint_for_next_header(next_header.value_unsigned().unwrap() as u8);
    Ok((fields, next_offset, hint))
}
