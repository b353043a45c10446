//! SCHC Compressor Mode
//!
//! Provides actual header compression and decompression for transmitted packets.
//! Compresses IPv4/UDP headers, carrying the remainder of the datagram (e.g.
//! a QUIC packet) through as opaque SCHC payload.

use parking_lot::RwLock;
use pnet_packet::ip::IpNextHeaderProtocol;
use pnet_packet::ipv4::MutableIpv4Packet;
use pnet_packet::udp::MutableUdpPacket;
use pnet_packet::{ipv4, udp};
use schc::{build_tree, compress_packet, decompress_packet, Direction, Rule, RuleSet, TreeNode};
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const IPV4_HEADER_BYTES: usize = 20;
const UDP_HEADER_BYTES: usize = 8;

/// Statistics from SCHC compression operations
#[derive(Debug, Default)]
pub struct SchcCompressorStats {
    pub packets_compressed: AtomicUsize,
    pub packets_decompressed: AtomicUsize,
    pub compression_failures: AtomicUsize,
    pub decompression_failures: AtomicUsize,
    /// Total original header bits (IP+UDP headers)
    pub total_original_header_bits: AtomicUsize,
    /// Total compressed header bits
    pub total_compressed_header_bits: AtomicUsize,
}

impl SchcCompressorStats {
    pub fn report(&self) {
        let compressed = self.packets_compressed.load(Ordering::Relaxed);
        let decompressed = self.packets_decompressed.load(Ordering::Relaxed);
        let comp_failures = self.compression_failures.load(Ordering::Relaxed);
        let decomp_failures = self.decompression_failures.load(Ordering::Relaxed);
        let original = self.total_original_header_bits.load(Ordering::Relaxed);
        let compressed_bits = self.total_compressed_header_bits.load(Ordering::Relaxed);
        let saved = original.saturating_sub(compressed_bits);

        println!("--- SCHC Compressor Statistics ---");
        println!("* Packets compressed: {}", compressed);
        println!("* Packets decompressed: {}", decompressed);
        println!("* Compression failures: {}", comp_failures);
        println!("* Decompression failures: {}", decomp_failures);
        println!(
            "* Total original header: {} bits ({:.1} bytes)",
            original,
            original as f64 / 8.0
        );
        println!(
            "* Total compressed header: {} bits ({:.1} bytes)",
            compressed_bits,
            compressed_bits as f64 / 8.0
        );
        if original > 0 {
            println!(
                "* Compression savings: {} bits ({:.1}%, ratio {:.2}:1)",
                saved,
                100.0 * saved as f64 / original as f64,
                original as f64 / compressed_bits.max(1) as f64
            );
        }
    }
}

/// Result of compressing a packet
#[derive(Debug, Clone)]
pub struct CompressResult {
    /// Combined SCHC data (rule ID + residues) + original payload
    pub compressed_packet: Vec<u8>,
    /// Size of original IP+UDP headers in bytes
    pub original_header_size: usize,
    /// Size of compressed SCHC data in bytes
    pub compressed_header_size: usize,
    /// Rule ID that matched
    pub rule_id: u32,
    /// Whether compression was successful
    pub success: bool,
}

/// Result of decompressing a packet
#[derive(Debug, Clone)]
pub struct DecompressResult {
    /// Reconstructed IP+UDP headers + upper-layer payload
    pub decompressed_packet: Vec<u8>,
    /// Rule ID that was used
    pub rule_id: u32,
}

/// SCHC Compressor for actual packet compression/decompression.
///
/// The ruleset and compiled tree are read-only once loaded, matching the
/// Context immutability the core engine assumes; the locks here only guard
/// against concurrent access from the simulation's node tasks, not mutation.
pub struct SchcCompressor {
    tree: RwLock<TreeNode>,
    rules: RwLock<Vec<Rule>>,
    stats: SchcCompressorStats,
    debug: bool,
}

impl SchcCompressor {
    /// Create a new SCHC compressor from a rules file.
    ///
    /// # Arguments
    /// * `rules_path` - Path to the SCHC rules JSON file
    /// * `debug` - Enable debug output
    pub fn from_files(rules_path: &str, debug: bool) -> anyhow::Result<Self> {
        let ruleset = RuleSet::from_file(rules_path)?;
        let tree = build_tree(&ruleset.rules);

        if debug {
            println!("\n--- SCHC Compressor Rule Tree ---");
            schc::display_tree(&tree);
        }

        Ok(Self {
            tree: RwLock::new(tree),
            rules: RwLock::new(ruleset.rules),
            stats: SchcCompressorStats::default(),
            debug,
        })
    }

    /// Compress a UDP payload (e.g. a QUIC datagram).
    ///
    /// Builds a synthetic IPv4/UDP header around `payload`, compresses the
    /// IP+UDP headers, and returns the SCHC residue stream followed by the
    /// payload untouched -- SCHC never interprets what it carries. Matches
    /// RFC 8724's placement of SCHC below the IP layer: no link-layer
    /// framing is part of the bytes handed to the core engine.
    pub fn compress(
        &self,
        payload: &[u8],
        source_addr: SocketAddr,
        dest_addr: SocketAddr,
        is_outgoing: bool,
        node_id: &str,
    ) -> CompressResult {
        let synthetic_packet = build_synthetic_packet(payload, source_addr, dest_addr);
        let direction = if is_outgoing { Direction::Up } else { Direction::Down };

        if self.debug {
            let dir_str = if is_outgoing { "UP" } else { "DOWN" };
            println!(
                "\n[SCHC Compress] {} -> {} [{}] payload: {} bytes",
                source_addr,
                dest_addr,
                dir_str,
                payload.len()
            );
        }

        let tree = self.tree.read();
        let rules = self.rules.read();

        match compress_packet(&tree, &synthetic_packet, direction, &rules, self.debug) {
            Ok(result) => {
                drop(tree);
                drop(rules);

                let original_header_bytes = result.original_header_bits.div_ceil(8);
                let compressed_header_bytes = result.compressed_header_bits.div_ceil(8);
                let upper_layer_start = (IPV4_HEADER_BYTES + UDP_HEADER_BYTES).min(synthetic_packet.len());
                let upper_layer_payload = &synthetic_packet[upper_layer_start..];

                let mut compressed_packet = result.data.clone();
                compressed_packet.extend_from_slice(upper_layer_payload);

                self.stats.packets_compressed.fetch_add(1, Ordering::Relaxed);
                self.stats
                    .total_original_header_bits
                    .fetch_add(result.original_header_bits, Ordering::Relaxed);
                self.stats
                    .total_compressed_header_bits
                    .fetch_add(result.compressed_header_bits, Ordering::Relaxed);

                let dir_str = if is_outgoing { "UP" } else { "DOWN" };
                let saved_bytes = original_header_bytes.saturating_sub(compressed_header_bytes);
                println!(
                    "[SCHC Compress @ {}] [{}] header: {} -> {} bytes (saved {} bytes)",
                    node_id, dir_str, original_header_bytes, compressed_header_bytes, saved_bytes
                );

                CompressResult {
                    compressed_packet,
                    original_header_size: original_header_bytes,
                    compressed_header_size: compressed_header_bytes,
                    rule_id: result.rule_id,
                    success: true,
                }
            }
            Err(e) => {
                drop(tree);
                drop(rules);
                self.stats.compression_failures.fetch_add(1, Ordering::Relaxed);
                if self.debug {
                    println!("[SCHC Compress] Failed: {:?}", e);
                }
                CompressResult {
                    compressed_packet: payload.to_vec(),
                    original_header_size: 0,
                    compressed_header_size: 0,
                    rule_id: 0,
                    success: false,
                }
            }
        }
    }

    /// Decompress a SCHC packet back to a UDP payload.
    pub fn decompress(
        &self,
        compressed_data: &[u8],
        is_outgoing: bool,
        node_id: &str,
    ) -> Result<DecompressResult, String> {
        let direction = if is_outgoing { Direction::Up } else { Direction::Down };
        let rules = self.rules.read();

        match decompress_packet(compressed_data, &rules, direction, None) {
            Ok(result) => {
                let schc_bytes = result.bits_consumed.div_ceil(8);
                let payload_start = schc_bytes.min(compressed_data.len());
                let original_payload = &compressed_data[payload_start..];

                let upper_layer_start = (IPV4_HEADER_BYTES + UDP_HEADER_BYTES).min(result.full_data.len());
                let upper_layer_header = &result.full_data[upper_layer_start..];

                let mut decompressed_packet = upper_layer_header.to_vec();
                decompressed_packet.extend_from_slice(original_payload);

                self.stats.packets_decompressed.fetch_add(1, Ordering::Relaxed);

                let dir_str = if is_outgoing { "UP" } else { "DOWN" };
                let compressed_bytes = schc_bytes;
                let restored_bytes = result.header_data.len();
                let restored_saved = restored_bytes.saturating_sub(compressed_bytes);
                println!(
                    "[SCHC Decompress @ {}] [{}] header: {} -> {} bytes (restored {} bytes)",
                    node_id, dir_str, compressed_bytes, restored_bytes, restored_saved
                );

                Ok(DecompressResult {
                    decompressed_packet,
                    rule_id: result.rule_id,
                })
            }
            Err(e) => {
                self.stats.decompression_failures.fetch_add(1, Ordering::Relaxed);
                if self.debug {
                    println!("[SCHC Decompress] Failed: {:?}", e);
                }
                Err(format!("Decompression failed: {:?}", e))
            }
        }
    }

    /// Get statistics
    pub fn stats(&self) -> &SchcCompressorStats {
        &self.stats
    }
}

/// Build a synthetic IPv4+UDP header around `payload` for SCHC compression,
/// using the simulation's actual source/destination addresses.
fn build_synthetic_packet(payload: &[u8], source_addr: SocketAddr, dest_addr: SocketAddr) -> Vec<u8> {
    let IpAddr::V4(source_ip) = source_addr.ip() else {
        panic!("SCHC compressor only supports IPv4");
    };
    let IpAddr::V4(dest_ip) = dest_addr.ip() else {
        panic!("SCHC compressor only supports IPv4");
    };

    let mut buffer = vec![0u8; UDP_HEADER_BYTES + payload.len()];
    let udp_packet_length = (UDP_HEADER_BYTES + payload.len()) as u16;
    {
        let mut udp_writer = MutableUdpPacket::new(&mut buffer).unwrap();
        udp_writer.set_source(source_addr.port());
        udp_writer.set_destination(dest_addr.port());
        udp_writer.set_length(udp_packet_length);
        udp_writer.set_payload(payload);
        let checksum = udp::ipv4_checksum(&udp_writer.to_immutable(), &source_ip, &dest_ip);
        udp_writer.set_checksum(checksum);
    }
    let udp_packet = buffer;

    let ip_packet_length = IPV4_HEADER_BYTES as u16 + udp_packet_length;
    let mut ip_buffer = vec![0u8; ip_packet_length as usize];
    {
        let mut ip_writer = MutableIpv4Packet::new(&mut ip_buffer).unwrap();
        ip_writer.set_version(4);
        ip_writer.set_header_length(5);
        ip_writer.set_dscp(0);
        ip_writer.set_ecn(0);
        ip_writer.set_total_length(ip_packet_length);
        ip_writer.set_identification(0);
        ip_writer.set_flags(0b010);
        ip_writer.set_fragment_offset(0);
        ip_writer.set_ttl(64);
        ip_writer.set_next_level_protocol(IpNextHeaderProtocol::new(17));
        ip_writer.set_source(source_ip);
        ip_writer.set_destination(dest_ip);
        ip_writer.set_payload(&udp_packet);
        let checksum = ipv4::checksum(&ip_writer.to_immutable());
        ip_writer.set_checksum(checksum);
    }

    ip_buffer
}

/// Thread-safe wrapper for SCHC compressor
pub type SharedSchcCompressor = Arc<SchcCompressor>;
