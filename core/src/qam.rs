//! 64-QAM Gray-coded constellation mapper/demapper (spec §4.5).
//!
//! Generalizes the teacher's BPSK amplitude convention in `ofdm_cp.rs`
//! (`amplitude = if bit { 1.0 } else { -1.0 }`) from one bit per subcarrier to
//! six, split across the two axes of a complex point.

use num_complex::Complex32;

/// `1/sqrt(42)`, the scale giving the 8x8 {-7..7} grid unit average energy:
/// `mean((2k-7)^2) for k in 0..8 == 21`, and `21+21 == 42` across both axes.
const SCALE: f32 = 0.154_303_35;

const GRAY: [u8; 8] = [0, 1, 3, 2, 6, 7, 5, 4];
const GRAY_INV: [u8; 8] = inverse_gray();

const fn inverse_gray() -> [u8; 8] {
    let mut inv = [0u8; 8];
    let mut i = 0;
    while i < 8 {
        inv[GRAY[i] as usize] = i as u8;
        i += 1;
    }
    inv
}

fn axis_level(three_bits: u8) -> f32 {
    let gray_index = GRAY[three_bits as usize] as i32;
    (2 * gray_index - 7) as f32
}

fn nearest_axis_label(level: f32) -> u8 {
    // Levels are {-7,-5,...,7}; invert `level = 2*k - 7` to find the natural
    // binary index k, clamp to the valid grid, then undo the Gray mapping.
    let k = ((level + 7.0) / 2.0).round().clamp(0.0, 7.0) as usize;
    GRAY_INV[k]
}

/// Maps one 6-bit group (bits 5..0, MSB first) to a unit-energy constellation
/// point. The top 3 bits select the real axis, the bottom 3 the imaginary.
pub fn map_symbol(bits6: u8) -> Complex32 {
    debug_assert!(bits6 < 64);
    let i_bits = (bits6 >> 3) & 0x07;
    let q_bits = bits6 & 0x07;
    let i = axis_level(i_bits) * SCALE;
    let q = axis_level(q_bits) * SCALE;
    Complex32::new(i, q)
}

/// Demaps an equalized complex sample back to its nearest 6-bit label. An
/// exact tie between two levels is nudged down before rounding so it breaks
/// toward the lower bit label, per spec §4.5.
pub fn demap_symbol(point: Complex32) -> u8 {
    let i_label = nearest_axis_label(point.re / SCALE - 1e-6);
    let q_label = nearest_axis_label(point.im / SCALE - 1e-6);
    (i_label << 3) | q_label
}

/// Splits a byte chunk into `k` 6-bit groups, MSB-first (spec §3's "OFDM
/// payload stream"). `chunk.len() * 8` must equal `k * 6`.
pub fn bytes_to_groups(chunk: &[u8], k: usize) -> Vec<u8> {
    let mut groups = Vec::with_capacity(k);
    let mut bit_pos = 0usize;
    for _ in 0..k {
        let mut value = 0u8;
        for _ in 0..6 {
            let byte = chunk[bit_pos / 8];
            let bit = (byte >> (7 - (bit_pos % 8))) & 1;
            value = (value << 1) | bit;
            bit_pos += 1;
        }
        groups.push(value);
    }
    groups
}

/// Inverse of [`bytes_to_groups`]: packs 6-bit groups back into bytes.
pub fn groups_to_bytes(groups: &[u8]) -> Vec<u8> {
    let total_bits = groups.len() * 6;
    let mut out = vec![0u8; total_bits.div_ceil(8)];
    let mut bit_pos = 0usize;
    for &group in groups {
        for i in (0..6).rev() {
            if (group >> i) & 1 != 0 {
                out[bit_pos / 8] |= 1 << (7 - (bit_pos % 8));
            }
            bit_pos += 1;
        }
    }
    out
}
