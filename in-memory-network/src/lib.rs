//! In-memory network simulation harness.
//!
//! The SCHC integration modules are thin clients of the [`schc`] core
//! engine -- the crate's own [`RuleSet`]/[`TreeNode`]/`compress_packet`/
//! `decompress_packet` API -- adapting simulated UDP payloads into the
//! synthetic IPv4/UDP headers SCHC expects, and back.
//!
//! [`RuleSet`]: schc::RuleSet
//! [`TreeNode`]: schc::TreeNode

#[cfg(feature = "schc-observer")]
pub mod schc_observer;

#[cfg(feature = "schc-compressor")]
pub mod schc_compressor;
