use super::{field, region, require, ProtocolHint};
use crate::buffer::Buffer;
use crate::error::ParseError;
use crate::field::{FieldDescriptor, FieldId};

const COMMON_HEADER_BYTES: usize = 12;

/// Only the SCTP common header is decomposed into fields; chunk-level
/// structure is left as opaque payload. RFC 8724 applies SCHC at the
/// common header in the same way it does for UDP, and the chunk space
/// is open-ended enough that interpreting it belongs to a higher layer.
pub(super) fn parse(
    data: &[u8],
    offset: usize,
) -> Result<(Vec<(FieldDescriptor, Buffer)>, usize, ProtocolHint), ParseError> {
    require(data, offset, COMMON_HEADER_BYTES, FieldId::SctpSrcPort)?;

    let header = region(data, offset, COMMON_HEADER_BYTES);
    let fields = vec![
        (field(FieldId::SctpSrcPort, 16), header.slice(0, 16).unwrap()),
        (field(FieldId::SctpDstPort, 16), header.slice(16, 32).unwrap()),
        (
            field(FieldId::SctpVerificationTag, 32),
            header.slice(32, 64).unwrap(),
        ),
        (field(FieldId::SctpChecksum, 32), header.slice(64, 96).unwrap()),
    ];

    let next_offset = offset + COMMON_HEADER_BYTES;
    Ok((fields, next_offset, ProtocolHint::Payload))
}
