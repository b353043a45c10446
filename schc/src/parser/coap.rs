use super::{field_at, region, require, ProtocolHint};
use crate::buffer::Buffer;
use crate::error::ParseError;
use crate::field::{FieldDescriptor, FieldId};

const FIXED_HEADER_BYTES: usize = 4;
const PAYLOAD_MARKER: u8 = 0xFF;

/// Parse a CoAP message: the 4-byte fixed header, the token, and the
/// option sequence, stopping at the payload marker or end of data.
/// Option numbers are never computed -- only delta/length/value are
/// exposed, at the syntactic level RFC 7252 defines on the wire.
pub(super) fn parse(
    data: &[u8],
    offset: usize,
) -> Result<(Vec<(FieldDescriptor, Buffer)>, usize, ProtocolHint), ParseError> {
    require(data, offset, FIXED_HEADER_BYTES, FieldId::CoapVersion)?;

    let header = region(data, offset, FIXED_HEADER_BYTES);
    let token_length = header.slice(4, 8).unwrap().value_unsigned().unwrap() as usize;
    if token_length > 8 {
        return Err(ParseError::Malformed {
            field: FieldId::CoapTokenLength,
            reason: format!("token length {token_length} exceeds the 8-byte maximum"),
        });
    }

    let mut fields = vec![
        (field_at(FieldId::CoapVersion, 2, 0), header.slice(0, 2).unwrap()),
        (field_at(FieldId::CoapType, 2, 0), header.slice(2, 4).unwrap()),
        (
            field_at(FieldId::CoapTokenLength, 4, 0),
            header.slice(4, 8).unwrap(),
        ),
        (field_at(FieldId::CoapCode, 8, 0), header.slice(8, 16).unwrap()),
        (
            field_at(FieldId::CoapMessageId, 16, 0),
            header.slice(16, 32).unwrap(),
        ),
    ];

    let mut cursor = offset + FIXED_HEADER_BYTES;
    if token_length > 0 {
        require(data, cursor, token_length, FieldId::CoapToken)?;
        fields.push((
            field_at(FieldId::CoapToken, token_length * 8, 0),
            region(data, cursor, token_length),
        ));
        cursor += token_length;
    }

    let mut position = 0u8;
    loop {
        if cursor >= data.len() {
            break;
        }
        if data[cursor] == PAYLOAD_MARKER {
            fields.push((
                field_at(FieldId::CoapPayloadMarker, 8, 0),
                region(data, cursor, 1),
            ));
            cursor += 1;
            break;
        }

        require(data, cursor, 1, FieldId::CoapOptionDelta)?;
        let delta_nibble = data[cursor] >> 4;
        let length_nibble = data[cursor] & 0x0F;
        if delta_nibble == 15 || length_nibble == 15 {
            return Err(ParseError::Malformed {
                field: FieldId::CoapOptionDelta,
                reason: "reserved option delta/length nibble 15 outside the payload marker".into(),
            });
        }

        let option_byte = region(data, cursor, 1);
        fields.push((
            field_at(FieldId::CoapOptionDelta, 4, position),
            option_byte.slice(0, 4).unwrap(),
        ));
        fields.push((
            field_at(FieldId::CoapOptionLength, 4, position),
            option_byte.slice(4, 8).unwrap(),
        ));
        cursor += 1;

        let delta_ext_bytes = match delta_nibble {
            13 => 1,
            14 => 2,
            _ => 0,
        };
        if delta_ext_bytes > 0 {
            require(data, cursor, delta_ext_bytes, FieldId::CoapOptionDeltaExt)?;
            fields.push((
                field_at(FieldId::CoapOptionDeltaExt, delta_ext_bytes * 8, position),
                region(data, cursor, delta_ext_bytes),
            ));
            cursor += delta_ext_bytes;
        }

        let length_ext_bytes = match length_nibble {
            13 => 1,
            14 => 2,
            _ => 0,
        };
        if length_ext_bytes > 0 {
            require(data, cursor, length_ext_bytes, FieldId::CoapOptionLengthExt)?;
            fields.push((
                field_at(FieldId::CoapOptionLengthExt, length_ext_bytes * 8, position),
                region(data, cursor, length_ext_bytes),
            ));
            cursor += length_ext_bytes;
        }

        let option_length = resolve_extended(length_nibble, data, cursor - length_ext_bytes, length_ext_bytes);
        if option_length > 0 {
            require(data, cursor, option_length, FieldId::CoapOptionValue)?;
            fields.push((
                field_at(FieldId::CoapOptionValue, option_length * 8, position),
                region(data, cursor, option_length),
            ));
            cursor += option_length;
        }

        position = position.saturating_add(1);
    }

    Ok((fields, cursor, ProtocolHint::Payload))
}

fn resolve_extended(nibble: u8, data: &[u8], ext_offset: usize, ext_bytes: usize) -> usize {
    match (nibble, ext_bytes) {
        (n, 0) => n as usize,
        (_, 1) => 13 + data[ext_offset] as usize,
        (_, 2) => 269 + u16::from_be_bytes([data[ext_offset], data[ext_offset + 1]]) as usize,
        _ => unreachable!("extension byte count is always 0, 1 or 2"),
    }
}
