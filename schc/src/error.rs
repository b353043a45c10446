use thiserror::Error;

/// Errors raised by [`crate::Buffer`] operations.
///
/// These indicate a programming error (an out-of-range index, a length
/// mismatch between operands) rather than anything recoverable from
/// untrusted input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BufferError {
    #[error("bit index {index} out of range for buffer of length {length}")]
    OutOfRange { index: isize, length: usize },

    #[error("length mismatch: expected {expected} bits, got {actual} bits")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("slice bounds {start}..{end} invalid for buffer of length {length}")]
    InvalidSlice {
        start: usize,
        end: usize,
        length: usize,
    },

    #[error("value of {length} bits does not fit the requested integer representation")]
    ValueTooWide { length: usize },

    #[error("length {length} bits exceeds buffer capacity of {capacity} bits")]
    InvalidLength { length: usize, capacity: usize },
}

/// Errors raised while decomposing raw bytes into a [`crate::parser::PacketDescriptor`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("packet truncated while parsing field {field:?}: needed {needed} bits, had {available} bits remaining")]
    Truncated {
        field: crate::field::FieldId,
        needed: usize,
        available: usize,
    },

    #[error("malformed packet at field {field:?}: {reason}")]
    Malformed {
        field: crate::field::FieldId,
        reason: String,
    },

    #[error("no parser registered for next-header/port hint {hint}")]
    UnknownProtocol { hint: u16 },

    #[error("field {field:?} was not present in this packet")]
    FieldNotPresent { field: crate::field::FieldId },
}

/// Errors raised while selecting a rule for a packet (the Ruler).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("no rule in the context matched the packet and no default rule is configured")]
    NoRule,

    #[error("rule id of length {length} bits not found in context")]
    UnknownRuleId { length: usize },
}

/// Errors raised while compressing a matched packet.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompressError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    Buffer(#[from] BufferError),

    #[error("field {field:?} matched by `match-mapping` has no corresponding entry in the target value list")]
    MappingNotFound { field: crate::field::FieldId },

    #[error("rule {rule_id}/{rule_id_length} has {rule_fields} field descriptors but the packet has {packet_fields} fields after direction resolution")]
    FieldCountMismatch {
        rule_id: u32,
        rule_id_length: u8,
        rule_fields: usize,
        packet_fields: usize,
    },
}

/// Errors raised while decompressing a compressed bitstream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecompressError {
    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    Buffer(#[from] BufferError),

    #[error("ran out of residue bits while reconstructing field {field:?}: needed {needed}, had {available}")]
    ResidueUnderrun {
        field: crate::field::FieldId,
        needed: usize,
        available: usize,
    },

    #[error("mapping index {index} out of range for {field:?} (mapping has {mapping_len} entries)")]
    MappingOutOfRange {
        field: crate::field::FieldId,
        index: usize,
        mapping_len: usize,
    },

    #[error("invalid length prefix while reading variable-length field {field:?}")]
    LengthPrefixInvalid { field: crate::field::FieldId },
}
