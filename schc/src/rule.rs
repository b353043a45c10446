//! Rule storage: the pre-shared description of an expected header
//! structure, its target field values, and how each field should be
//! matched and compressed.

use crate::buffer::{Buffer, Padding};
use crate::field::{Direction, FieldDescriptor};
use serde::{Deserialize, Deserializer, Serialize};

/// What a rule field expects to see: a single value, or (for
/// `match-mapping`) an ordered list of candidate values. The list order
/// is significant -- its index is what `mapping-sent` transmits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetValue {
    Single(HexBuffer),
    Mapping(Vec<HexBuffer>),
}

impl TargetValue {
    pub fn as_single(&self) -> Option<&Buffer> {
        match self {
            TargetValue::Single(b) => Some(&b.0),
            TargetValue::Mapping(_) => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&[HexBuffer]> {
        match self {
            TargetValue::Mapping(list) => Some(list),
            TargetValue::Single(_) => None,
        }
    }
}

/// A [`Buffer`] serialised as a `{hex, length}` pair in rule files, since
/// `Buffer` itself has no canonical string form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HexBuffer(#[serde(with = "hex_buffer")] pub Buffer);

mod hex_buffer {
    use crate::buffer::{Buffer, Padding};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use serde_with::serde_as;

    #[serde_as]
    #[derive(Serialize, Deserialize)]
    struct Repr {
        #[serde_as(as = "serde_with::hex::Hex")]
        hex: Vec<u8>,
        length: usize,
    }

    pub fn serialize<S: Serializer>(buf: &Buffer, s: S) -> Result<S::Ok, S::Error> {
        Repr {
            hex: buf.content().to_vec(),
            length: buf.length(),
        }
        .serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Buffer, D::Error> {
        let repr = Repr::deserialize(d)?;
        Buffer::new(repr.hex, repr.length, Padding::Right).map_err(serde::de::Error::custom)
    }
}

/// Predicate deciding whether a field value is acceptable for a rule.
///
/// Serialised as a bare kebab-case string (`"equal"`, `"match-mapping"`)
/// for the parameterless variants, matching rule files that list
/// matching operators the way RFC 8724 deployments typically do; the
/// one variant that carries a width is instead a single-key object
/// (`{"msb": 8}`), via the `msb_object` serde module below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchingOperator {
    Ignore,
    Equal,
    Msb(usize),
    MatchMapping,
}

impl Serialize for MatchingOperator {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            MatchingOperator::Ignore => s.serialize_str("ignore"),
            MatchingOperator::Equal => s.serialize_str("equal"),
            MatchingOperator::MatchMapping => s.serialize_str("match-mapping"),
            MatchingOperator::Msb(bits) => msb_object::serialize("msb", *bits, s),
        }
    }
}

impl<'de> Deserialize<'de> for MatchingOperator {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        match StringOrWidth::deserialize(d)? {
            StringOrWidth::Tag(tag) => match tag.as_str() {
                "ignore" => Ok(MatchingOperator::Ignore),
                "equal" => Ok(MatchingOperator::Equal),
                "match-mapping" => Ok(MatchingOperator::MatchMapping),
                other => Err(serde::de::Error::unknown_variant(
                    other,
                    &["ignore", "equal", "match-mapping", "msb"],
                )),
            },
            StringOrWidth::Width { msb, lsb: _ } => msb
                .map(MatchingOperator::Msb)
                .ok_or_else(|| serde::de::Error::custom("expected a `msb` key")),
        }
    }
}

/// The per-field function producing the residue (compression) and its
/// inverse (decompression). Serialised the same way as
/// [`MatchingOperator`]: a bare string for parameterless CDAs, a
/// single-key `{"lsb": 8}` object for the one that carries a width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionAction {
    NotSent,
    ValueSent,
    MappingSent,
    Lsb(usize),
    ComputeUdpChecksum,
    ComputeUdpLength,
    ComputeIpv4TotalLength,
    ComputeIpv6PayloadLength,
}

impl Serialize for CompressionAction {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            CompressionAction::NotSent => s.serialize_str("not-sent"),
            CompressionAction::ValueSent => s.serialize_str("value-sent"),
            CompressionAction::MappingSent => s.serialize_str("mapping-sent"),
            CompressionAction::ComputeUdpChecksum => s.serialize_str("compute-udp-checksum"),
            CompressionAction::ComputeUdpLength => s.serialize_str("compute-udp-length"),
            CompressionAction::ComputeIpv4TotalLength => s.serialize_str("compute-ipv4-total-length"),
            CompressionAction::ComputeIpv6PayloadLength => s.serialize_str("compute-ipv6-payload-length"),
            CompressionAction::Lsb(bits) => msb_object::serialize("lsb", *bits, s),
        }
    }
}

impl<'de> Deserialize<'de> for CompressionAction {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        match StringOrWidth::deserialize(d)? {
            StringOrWidth::Tag(tag) => match tag.as_str() {
                "not-sent" => Ok(CompressionAction::NotSent),
                "value-sent" => Ok(CompressionAction::ValueSent),
                "mapping-sent" => Ok(CompressionAction::MappingSent),
                "compute-udp-checksum" => Ok(CompressionAction::ComputeUdpChecksum),
                "compute-udp-length" => Ok(CompressionAction::ComputeUdpLength),
                "compute-ipv4-total-length" => Ok(CompressionAction::ComputeIpv4TotalLength),
                "compute-ipv6-payload-length" => Ok(CompressionAction::ComputeIpv6PayloadLength),
                other => Err(serde::de::Error::unknown_variant(
                    other,
                    &[
                        "not-sent",
                        "value-sent",
                        "mapping-sent",
                        "compute-udp-checksum",
                        "compute-udp-length",
                        "compute-ipv4-total-length",
                        "compute-ipv6-payload-length",
                        "lsb",
                    ],
                )),
            },
            StringOrWidth::Width { msb: _, lsb } => lsb
                .map(CompressionAction::Lsb)
                .ok_or_else(|| serde::de::Error::custom("expected an `lsb` key")),
        }
    }
}

/// Either a bare tag string or a single-key `{"msb": N}` / `{"lsb": N}`
/// object, shared by [`MatchingOperator`] and [`CompressionAction`]'s
/// manual (de)serialization.
#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrWidth {
    Tag(String),
    Width {
        #[serde(default)]
        msb: Option<usize>,
        #[serde(default)]
        lsb: Option<usize>,
    },
}

mod msb_object {
    use serde::ser::SerializeMap;
    use serde::Serializer;

    pub(super) fn serialize<S: Serializer>(key: &str, bits: usize, s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(1))?;
        map.serialize_entry(key, &bits)?;
        map.end()
    }
}

impl CompressionAction {
    pub fn is_computed(self) -> bool {
        matches!(
            self,
            CompressionAction::ComputeUdpChecksum
                | CompressionAction::ComputeUdpLength
                | CompressionAction::ComputeIpv4TotalLength
                | CompressionAction::ComputeIpv6PayloadLength
        )
    }
}

/// A [`FieldDescriptor`] plus the rule's expectation for that field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFieldDescriptor {
    #[serde(flatten)]
    pub field: FieldDescriptor,
    pub target_value: TargetValue,
    pub matching_operator: MatchingOperator,
    pub compression_action: CompressionAction,
}

/// Whether a rule describes a compressible header shape, or merely
/// passes packets through uncompressed (used for the default rule).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleNature {
    Compression,
    NoCompression,
}

/// An ordered list of field descriptors, keyed by a rule ID.
///
/// `field_descriptors` must be listed in on-wire field order: residues
/// are concatenated and demultiplexed in this order, not by field name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub rule_id: u32,
    pub rule_id_length: u8,
    pub nature: RuleNature,
    pub field_descriptors: Vec<RuleFieldDescriptor>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl Rule {
    /// A rule with no field descriptors, matching any packet. Must be
    /// last in a [`RuleSet`].
    pub fn is_default(&self) -> bool {
        self.field_descriptors.is_empty()
    }

    /// The rule ID as a right-aligned, left-zero-padded buffer, per RFC
    /// 8724's wire framing.
    pub fn id_buffer(&self) -> Buffer {
        Buffer::from_u128(self.rule_id as u128, self.rule_id_length as usize, Padding::Left)
    }

    /// Field descriptors whose direction is compatible with
    /// `packet_direction`. When a field is listed more than once for
    /// different directions, only the compatible one is kept here.
    pub fn fields_for_direction(&self, packet_direction: Direction) -> Vec<&RuleFieldDescriptor> {
        self.field_descriptors
            .iter()
            .filter(|f| f.field.direction.compatible_with(packet_direction))
            .collect()
    }
}

/// An ordered, first-match ruleset plus its identity. A context is
/// immutable once loaded: rules never change during operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
}

impl RuleSet {
    /// Load a ruleset from a JSON file of the `{"rules": [...]}` shape.
    pub fn from_file(path: &str) -> anyhow::Result<RuleSet> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn from_json(text: &str) -> anyhow::Result<RuleSet> {
        Ok(serde_json::from_str(text)?)
    }

    /// Rule-ID length, in bits, shared by every rule in this set. SCHC
    /// contexts use a single rule-ID width; mixed widths are rejected so
    /// the Ruler can read a fixed prefix off the wire during lookup.
    pub fn rule_id_length(&self) -> Option<u8> {
        self.rules.first().map(|r| r.rule_id_length)
    }

    pub fn find(&self, rule_id: u32, rule_id_length: u8) -> Option<&Rule> {
        self.rules
            .iter()
            .find(|r| r.rule_id == rule_id && r.rule_id_length == rule_id_length)
    }

    pub fn default_rule(&self) -> Option<&Rule> {
        self.rules.iter().find(|r| r.is_default())
    }
}

/// A named ruleset plus its associated parser and interface identity.
/// Contexts are configuration-time objects, read-only during operation,
/// and may be shared freely across engine instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    pub id: String,
    pub interface_id: String,
    pub parser_id: String,
    pub ruleset: RuleSet,
}

impl Context {
    pub fn from_file(path: &str) -> anyhow::Result<Context> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn rule_id_length(&self) -> Option<u8> {
        self.ruleset.rule_id_length()
    }
}
