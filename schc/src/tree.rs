//! Rule storage + rule selection (the "Ruler").
//!
//! `build_tree` compiles a ruleset into a [`TreeNode`] -- today a thin,
//! ordered wrapper rather than a branching decision tree, since RFC
//! 8724 rulesets are typically a handful of entries and the dominant
//! cost is header parsing, not rule dispatch. The type stays distinct
//! from `&[Rule]` so a future revision can branch on distinguishing
//! fields without changing the `compress_packet`/`display_tree` call
//! sites.

use crate::buffer::Buffer;
use crate::error::MatchError;
use crate::field::Direction;
use crate::rule::{MatchingOperator, Rule, RuleFieldDescriptor};

/// A compiled, first-match-ordered view of a ruleset.
#[derive(Debug, Clone)]
pub struct TreeNode {
    rules: Vec<Rule>,
}

impl TreeNode {
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

/// Compile `rules` into a [`TreeNode`], preserving declaration order.
/// The default rule, if present, must already be last -- this is a
/// ruleset-construction invariant, not something `build_tree` enforces.
pub fn build_tree(rules: &[Rule]) -> TreeNode {
    TreeNode {
        rules: rules.to_vec(),
    }
}

/// Print the compiled ruleset, one line per rule, in matching order.
pub fn display_tree(tree: &TreeNode) {
    for (i, rule) in tree.rules.iter().enumerate() {
        let label = if rule.is_default() {
            "default".to_string()
        } else {
            format!("{} fields", rule.field_descriptors.len())
        };
        println!(
            "  [{i}] rule {}/{} ({:?}, {label}){}",
            rule.rule_id,
            rule.rule_id_length,
            rule.nature,
            rule.comment
                .as_ref()
                .map(|c| format!(" -- {c}"))
                .unwrap_or_default()
        );
    }
}

/// Whether `value` satisfies `rule_field`'s matching operator.
pub fn field_matches(rule_field: &RuleFieldDescriptor, value: &Buffer) -> bool {
    match rule_field.matching_operator {
        MatchingOperator::Ignore => true,
        MatchingOperator::Equal => rule_field
            .target_value
            .as_single()
            .is_some_and(|target| target == value),
        MatchingOperator::Msb(x) => {
            let Some(target) = rule_field.target_value.as_single() else {
                return false;
            };
            if value.length() < x || target.length() < x {
                return false;
            }
            // Negative indices would still work here since x <= both
            // lengths, but spelling out 0..x keeps the intent literal.
            value.slice(0, x as isize) == target.slice(0, x as isize)
        }
        MatchingOperator::MatchMapping => rule_field
            .target_value
            .as_mapping()
            .is_some_and(|list| list.iter().any(|candidate| &candidate.0 == value)),
    }
}

/// Select the first rule in `tree` that matches `fields` travelling in
/// `direction`, per RFC 8724 first-match-wins semantics.
///
/// `fields` must be in on-wire order, matching how the packet was
/// parsed; it excludes the trailing payload.
pub fn select_rule<'a>(
    tree: &'a TreeNode,
    fields: &[Buffer],
    direction: Direction,
) -> Result<&'a Rule, MatchError> {
    'rules: for rule in &tree.rules {
        if rule.is_default() {
            return Ok(rule);
        }

        let applicable = rule.fields_for_direction(direction);
        if applicable.len() != fields.len() {
            continue;
        }

        for (rule_field, value) in applicable.iter().zip(fields.iter()) {
            if !field_matches(rule_field, value) {
                continue 'rules;
            }
        }
        return Ok(rule);
    }
    Err(MatchError::NoRule)
}

/// Look up a rule by its wire ID during decompression. The caller has
/// already read `rule_id_length` bits off the stream's MSB side; this
/// just indexes the context's ruleset.
pub fn find_rule_by_id(rules: &[Rule], rule_id: u32, rule_id_length: u8) -> Result<&Rule, MatchError> {
    rules
        .iter()
        .find(|r| r.rule_id == rule_id && r.rule_id_length == rule_id_length)
        .ok_or(MatchError::UnknownRuleId {
            length: rule_id_length as usize,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Padding;
    use crate::field::{FieldDescriptor, FieldId};
    use crate::rule::{CompressionAction, HexBuffer, RuleNature, TargetValue};

    fn rule_field(
        id: FieldId,
        length: usize,
        mo: MatchingOperator,
        target: TargetValue,
    ) -> RuleFieldDescriptor {
        RuleFieldDescriptor {
            field: FieldDescriptor::new(id, length, 0, Direction::Bidirectional),
            target_value: target,
            matching_operator: mo,
            compression_action: CompressionAction::NotSent,
        }
    }

    #[test]
    fn first_match_wins() {
        let always = Rule {
            rule_id: 1,
            rule_id_length: 4,
            nature: RuleNature::Compression,
            field_descriptors: vec![rule_field(
                FieldId::UdpDstPort,
                16,
                MatchingOperator::Ignore,
                TargetValue::Single(HexBuffer(Buffer::zeros(16, Padding::Right))),
            )],
            comment: None,
        };
        let specific = Rule {
            rule_id: 2,
            rule_id_length: 4,
            nature: RuleNature::Compression,
            field_descriptors: vec![rule_field(
                FieldId::UdpDstPort,
                16,
                MatchingOperator::Equal,
                TargetValue::Single(HexBuffer(Buffer::from_u128(5683, 16, Padding::Right))),
            )],
            comment: None,
        };
        // `always` is listed first, so it should win even though
        // `specific` would also match.
        let tree = build_tree(&[always, specific]);
        let port = Buffer::from_u128(5683, 16, Padding::Right);
        let matched = select_rule(&tree, &[port], Direction::Up).unwrap();
        assert_eq!(matched.rule_id, 1);
    }

    #[test]
    fn no_match_without_default_errors() {
        let rule = Rule {
            rule_id: 1,
            rule_id_length: 4,
            nature: RuleNature::Compression,
            field_descriptors: vec![rule_field(
                FieldId::UdpDstPort,
                16,
                MatchingOperator::Equal,
                TargetValue::Single(HexBuffer(Buffer::from_u128(1, 16, Padding::Right))),
            )],
            comment: None,
        };
        let tree = build_tree(&[rule]);
        let port = Buffer::from_u128(99, 16, Padding::Right);
        assert!(matches!(
            select_rule(&tree, &[port], Direction::Up),
            Err(MatchError::NoRule)
        ));
    }
}
