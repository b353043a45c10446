//! Length and checksum recomputation for fields whose compression
//! action is `compute-*`. These values are never sent on the wire; the
//! decompressor derives them from the reconstructed header and payload,
//! per RFC 768 and RFC 8200 section 8.1.

/// The one's-complement sum used by both the IPv4 header checksum and
/// the UDP checksum, folding carries back into the low 16 bits.
fn ones_complement_sum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut chunks = data.chunks_exact(2);
    for word in &mut chunks {
        sum += u16::from_be_bytes([word[0], word[1]]) as u32;
    }
    if let [last] = chunks.remainder() {
        sum += (*last as u32) << 8;
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}

/// UDP checksum over an IPv4 pseudo-header, per RFC 768. A result of
/// zero is transmitted as zero: IPv4 treats that as "no checksum
/// computed", unlike IPv6.
pub fn udp_checksum_ipv4(src: &[u8], dst: &[u8], udp_segment: &[u8]) -> u16 {
    let mut pseudo = Vec::with_capacity(12 + udp_segment.len());
    pseudo.extend_from_slice(src);
    pseudo.extend_from_slice(dst);
    pseudo.push(0);
    pseudo.push(17); // UDP
    pseudo.extend_from_slice(&(udp_segment.len() as u16).to_be_bytes());
    pseudo.extend_from_slice(udp_segment);
    ones_complement_sum(&pseudo)
}

/// UDP checksum over an IPv6 pseudo-header, per RFC 8200 section 8.1.
/// A result of zero is transmitted as `0xFFFF`, since IPv6 UDP
/// checksums are mandatory and zero means "the checksum wasn't
/// computed" would otherwise be indistinguishable from "the checksum
/// computed to zero".
pub fn udp_checksum_ipv6(src: &[u8], dst: &[u8], udp_segment: &[u8]) -> u16 {
    let mut pseudo = Vec::with_capacity(40 + udp_segment.len());
    pseudo.extend_from_slice(src);
    pseudo.extend_from_slice(dst);
    pseudo.extend_from_slice(&(udp_segment.len() as u32).to_be_bytes());
    pseudo.extend_from_slice(&[0, 0, 0]);
    pseudo.push(17); // UDP as the upper-layer next header
    pseudo.extend_from_slice(udp_segment);
    match ones_complement_sum(&pseudo) {
        0 => 0xFFFF,
        checksum => checksum,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_checksum_sums_to_zero() {
        let src = [0x20, 0x01, 0x0d, 0xb8, 0, 0x0a, 0, 0, 0, 0, 0, 0, 0, 0, 0, 3];
        let dst = [0x20, 0x01, 0x0d, 0xb8, 0, 0x0a, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x20];
        let mut segment = vec![0x16, 0x33, 0x16, 0x33, 0x00, 0x08, 0x00, 0x00];
        let checksum = udp_checksum_ipv6(&src, &dst, &segment);
        segment[6..8].copy_from_slice(&checksum.to_be_bytes());

        let mut pseudo = Vec::new();
        pseudo.extend_from_slice(&src);
        pseudo.extend_from_slice(&dst);
        pseudo.extend_from_slice(&(segment.len() as u32).to_be_bytes());
        pseudo.extend_from_slice(&[0, 0, 0, 17]);
        pseudo.extend_from_slice(&segment);
        assert_eq!(ones_complement_sum(&pseudo), 0);
    }

    #[test]
    fn ipv4_zero_checksum_is_not_remapped() {
        // Words chosen so the one's-complement sum is exactly 0xFFFF,
        // i.e. the checksum itself computes to zero. IPv4 (unlike
        // IPv6) leaves that zero as-is rather than rewriting to 0xFFFF.
        let data = [0x12, 0x34, 0xED, 0xCB];
        assert_eq!(ones_complement_sum(&data), 0);
    }
}
