use super::{field, region, require, ProtocolHint};
use crate::buffer::Buffer;
use crate::error::ParseError;
use crate::field::{FieldDescriptor, FieldId};

const FIXED_HEADER_BYTES: usize = 20;

pub(super) fn parse(
    data: &[u8],
    offset: usize,
) -> Result<(Vec<(FieldDescriptor, Buffer)>, usize, ProtocolHint), ParseError> {
    require(data, offset, FIXED_HEADER_BYTES, FieldId::Ipv4Version)?;

    let ihl = (data[offset] & 0x0F) as usize;
    let header_bytes = ihl * 4;
    if header_bytes < FIXED_HEADER_BYTES {
        return Err(ParseError::Malformed {
            field: FieldId::Ipv4Ihl,
            reason: format!("IHL {ihl} implies a header shorter than the fixed 20 bytes"),
        });
    }
    require(data, offset, header_bytes, FieldId::Ipv4Options)?;

    let fixed = region(data, offset, FIXED_HEADER_BYTES);
    let mut fields = Vec::new();
    fields.push((field(FieldId::Ipv4Version, 4), fixed.slice(0, 4).unwrap()));
    fields.push((field(FieldId::Ipv4Ihl, 4), fixed.slice(4, 8).unwrap()));
    fields.push((field(FieldId::Ipv4Dscp, 6), fixed.slice(8, 14).unwrap()));
    fields.push((field(FieldId::Ipv4Ecn, 2), fixed.slice(14, 16).unwrap()));
    fields.push((
        field(FieldId::Ipv4TotalLength, 16),
        fixed.slice(16, 32).unwrap(),
    ));
    fields.push((
        field(FieldId::Ipv4Identification, 16),
        fixed.slice(32, 48).unwrap(),
    ));
    fields.push((field(FieldId::Ipv4Flags, 3), fixed.slice(48, 51).unwrap()));
    fields.push((
        field(FieldId::Ipv4FragmentOffset, 13),
        fixed.slice(51, 64).unwrap(),
    ));
    fields.push((field(FieldId::Ipv4Ttl, 8), fixed.slice(64, 72).unwrap()));
    let protocol = fixed.slice(72, 80).unwrap();
    fields.push((field(FieldId::Ipv4Protocol, 8), protocol.clone()));
    fields.push((
        field(FieldId::Ipv4HeaderChecksum, 16),
        fixed.slice(80, 96).unwrap(),
    ));
    fields.push((
        field(FieldId::Ipv4SrcAddress, 32),
        fixed.slice(96, 128).unwrap(),
    ));
    fields.push((
        field(FieldId::Ipv4DstAddress, 32),
        fixed.slice(128, 160).unwrap(),
    ));

    let options_bytes = header_bytes - FIXED_HEADER_BYTES;
    if options_bytes > 0 {
        let options = region(data, offset + FIXED_HEADER_BYTES, options_bytes);
        fields.push((field(FieldId::Ipv4Options, options_bytes * 8), options));
    }

    let next_offset = offset + header_bytes;
    let hint = match protocol.value_unsigned().unwrap() {
        17 => ProtocolHint::Udp,
        132 => ProtocolHint::Sctp,
        _ => ProtocolHint::Payload,
    };
    Ok((fields, next_offset, hint))
}
