use super::{field, region, require, ProtocolHint};
use crate::buffer::Buffer;
use crate::error::ParseError;
use crate::field::{FieldDescriptor, FieldId};

const HEADER_BYTES: usize = 8;
const COAP_DEFAULT_PORT: u128 = 5683;

pub(super) fn parse(
    data: &[u8],
    offset: usize,
) -> Result<(Vec<(FieldDescriptor, Buffer)>, usize, ProtocolHint), ParseError> {
    require(data, offset, HEADER_BYTES, FieldId::UdpSrcPort)?;

    let header = region(data, offset, HEADER_BYTES);
    let src_port = header.slice(0, 16).unwrap();
    let dst_port = header.slice(16, 32).unwrap();
    let fields = vec![
        (field(FieldId::UdpSrcPort, 16), src_port.clone()),
        (field(FieldId::UdpDstPort, 16), dst_port.clone()),
        (field(FieldId::UdpLength, 16), header.slice(32, 48).unwrap()),
        (field(FieldId::UdpChecksum, 16), header.slice(48, 64).unwrap()),
    ];

    let next_offset = offset + HEADER_BYTES;
    let is_coap = src_port.value_unsigned().unwrap() == COAP_DEFAULT_PORT
        || dst_port.value_unsigned().unwrap() == COAP_DEFAULT_PORT;
    let hint = if is_coap {
        ProtocolHint::Coap
    } else {
        ProtocolHint::Payload
    };
    Ok((fields, next_offset, hint))
}
