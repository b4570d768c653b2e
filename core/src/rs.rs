//! Reed-Solomon(255,223) over GF(2^8), true error correction (not erasure-only).
//!
//! Primitive polynomial x^8+x^4+x^3+x^2+1 (0x11D), generator alpha = 2.
//! Corrects up to 16 byte errors per 255-byte block at unknown positions via
//! Berlekamp-Massey, Chien search and Forney's formula.

use std::sync::OnceLock;

use crate::error::{CodecError, Result};

pub const RS_DATA_BYTES: usize = 223;
pub const RS_PARITY_BYTES: usize = 32;
pub const RS_TOTAL_BYTES: usize = RS_DATA_BYTES + RS_PARITY_BYTES;
const PRIMITIVE_POLY: u16 = 0x11D;
const GENERATOR: u8 = 2;

struct GfTables {
    exp: [u8; 512],
    log: [u8; 256],
}

static TABLES: OnceLock<GfTables> = OnceLock::new();

fn tables() -> &'static GfTables {
    TABLES.get_or_init(|| {
        let mut exp = [0u8; 512];
        let mut log = [0u8; 256];
        let mut x: u16 = 1;
        for i in 0..255 {
            exp[i] = x as u8;
            log[x as usize] = i as u8;
            x <<= 1;
            if x & 0x100 != 0 {
                x ^= PRIMITIVE_POLY;
            }
        }
        for i in 255..512 {
            exp[i] = exp[i - 255];
        }
        GfTables { exp, log }
    })
}

fn gf_mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    let t = tables();
    let sum = t.log[a as usize] as usize + t.log[b as usize] as usize;
    t.exp[sum]
}

fn gf_div(a: u8, b: u8) -> u8 {
    debug_assert!(b != 0, "gf_div by zero");
    if a == 0 {
        return 0;
    }
    let t = tables();
    let diff = t.log[a as usize] as usize + 255 - t.log[b as usize] as usize;
    t.exp[diff % 255]
}

fn gf_pow(a: u8, power: i32) -> u8 {
    if a == 0 {
        return 0;
    }
    let t = tables();
    let p = power.rem_euclid(255) as usize;
    let e = (t.log[a as usize] as usize * p) % 255;
    t.exp[e]
}

fn gf_inv(a: u8) -> u8 {
    gf_div(1, a)
}

/// Polynomials are stored highest-degree-coefficient first, matching the
/// convention of the classic Reed-Solomon tutorials this is grounded on.
fn poly_mul(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; a.len() + b.len() - 1];
    for (i, &ac) in a.iter().enumerate() {
        if ac == 0 {
            continue;
        }
        for (j, &bc) in b.iter().enumerate() {
            out[i + j] ^= gf_mul(ac, bc);
        }
    }
    out
}

fn poly_eval(p: &[u8], x: u8) -> u8 {
    let mut y = p[0];
    for &coeff in &p[1..] {
        y = gf_mul(y, x) ^ coeff;
    }
    y
}

fn generator_poly(nsym: usize) -> Vec<u8> {
    let mut g = vec![1u8];
    for i in 0..nsym {
        g = poly_mul(&g, &[1, gf_pow(GENERATOR, i as i32)]);
    }
    g
}

fn poly_div_remainder(dividend: &[u8], divisor: &[u8]) -> Vec<u8> {
    let mut msg_out = dividend.to_vec();
    for i in 0..(dividend.len() - (divisor.len() - 1)) {
        let coeff = msg_out[i];
        if coeff == 0 {
            continue;
        }
        for j in 1..divisor.len() {
            if divisor[j] != 0 {
                msg_out[i + j] ^= gf_mul(divisor[j], coeff);
            }
        }
    }
    let sep = dividend.len() - (divisor.len() - 1);
    msg_out[sep..].to_vec()
}

/// Encodes exactly `RS_DATA_BYTES` data bytes into an `RS_TOTAL_BYTES` codeword.
pub fn encode_block(data: &[u8]) -> Vec<u8> {
    debug_assert_eq!(data.len(), RS_DATA_BYTES);
    let gen = generator_poly(RS_PARITY_BYTES);
    let mut padded = data.to_vec();
    padded.extend(std::iter::repeat(0u8).take(RS_PARITY_BYTES));
    let remainder = poly_div_remainder(&padded, &gen);
    let mut codeword = data.to_vec();
    codeword.extend(remainder);
    codeword
}

fn syndromes(codeword: &[u8]) -> Vec<u8> {
    (0..RS_PARITY_BYTES)
        .map(|i| poly_eval(codeword, gf_pow(GENERATOR, i as i32)))
        .collect()
}

/// Berlekamp-Massey: finds the shortest LFSR (error locator polynomial)
/// generating the syndrome sequence.
/// All arrays in this function and everything downstream of it (chien_search,
/// Forney) are lowest-degree-first: index `j` holds the coefficient of `x^j`.
/// Returns `(sigma, l)` where `l` is the linear complexity (true error count
/// the locator claims), since `sigma`'s array length can exceed `l + 1` with
/// harmless trailing zero coefficients.
fn berlekamp_massey(syn: &[u8]) -> (Vec<u8>, usize) {
    let mut c = vec![1u8];
    let mut b = vec![1u8];
    let mut l = 0usize;
    let mut m = 1usize;
    let mut bb = 1u8;

    for n in 0..syn.len() {
        let mut delta = syn[n];
        for i in 1..=l {
            delta ^= gf_mul(c[i], syn[n - i]);
        }
        if delta == 0 {
            m += 1;
        } else if 2 * l <= n {
            let t = c.clone();
            let coeff = gf_div(delta, bb);
            let mut shifted = vec![0u8; m];
            shifted.extend(b.iter().map(|&x| gf_mul(x, coeff)));
            c = xor_polys_lowfirst(&c, &shifted);
            l = n + 1 - l;
            b = t;
            bb = delta;
            m = 1;
        } else {
            let coeff = gf_div(delta, bb);
            let mut shifted = vec![0u8; m];
            shifted.extend(b.iter().map(|&x| gf_mul(x, coeff)));
            c = xor_polys_lowfirst(&c, &shifted);
            m += 1;
        }
    }
    (c, l)
}

fn xor_polys_lowfirst(a: &[u8], b: &[u8]) -> Vec<u8> {
    let len = a.len().max(b.len());
    let mut out = vec![0u8; len];
    for (i, &v) in a.iter().enumerate() {
        out[i] ^= v;
    }
    for (i, &v) in b.iter().enumerate() {
        out[i] ^= v;
    }
    out
}

fn poly_eval_lowfirst(p: &[u8], x: u8) -> u8 {
    let mut y = 0u8;
    let mut xp = 1u8;
    for &coeff in p {
        y ^= gf_mul(coeff, xp);
        xp = gf_mul(xp, x);
    }
    y
}

/// Chien search: evaluates the error locator at every inverse field element
/// to find error positions as roots of sigma(x). `sigma` is lowest-degree-first.
fn chien_search(sigma: &[u8], codeword_len: usize) -> Vec<usize> {
    let mut positions = Vec::new();
    for i in 0..codeword_len {
        let x_inv = gf_pow(GENERATOR, -(i as i32));
        if poly_eval_lowfirst(sigma, x_inv) == 0 {
            positions.push(codeword_len - 1 - i);
        }
    }
    positions
}

/// Formal derivative over GF(2^m): only odd-degree terms survive (2*a = 0).
fn poly_formal_derivative_lowfirst(p: &[u8]) -> Vec<u8> {
    if p.len() <= 1 {
        return Vec::new();
    }
    let mut out = vec![0u8; p.len() - 1];
    for j in (1..p.len()).step_by(2) {
        out[j - 1] = p[j];
    }
    out
}

/// Attempts to correct up to `RS_PARITY_BYTES/2` byte errors at unknown
/// positions in-place. Returns the number of corrected errors, or an error
/// if the block is uncorrectable.
pub fn decode_block(codeword: &mut [u8], block_index: usize) -> Result<usize> {
    debug_assert_eq!(codeword.len(), RS_TOTAL_BYTES);
    let syn = syndromes(codeword);
    if syn.iter().all(|&s| s == 0) {
        return Ok(0);
    }

    // syn is oldest-syndrome-first (S_0, S_1, ..., S_{nsym-1}), which is also
    // the lowest-degree-first representation of S(x) = sum S_i x^i.
    let (sigma, errors_capacity) = berlekamp_massey(&syn);
    if errors_capacity > RS_PARITY_BYTES / 2 {
        return Err(CodecError::UncorrectableFec {
            block_index,
            error_count: errors_capacity,
        });
    }

    let error_positions = chien_search(&sigma, codeword.len());
    if error_positions.len() != errors_capacity || error_positions.is_empty() {
        return Err(CodecError::UncorrectableFec {
            block_index,
            error_count: error_positions.len().max(errors_capacity),
        });
    }

    // Error evaluator polynomial Omega(x) = [S(x) * sigma(x)] mod x^nsym,
    // all lowest-degree-first (poly_mul is convolution, agnostic to term
    // ordering as long as both operands agree).
    let mut omega = poly_mul(&syn, &sigma);
    omega.truncate(RS_PARITY_BYTES);

    let sigma_deriv = poly_formal_derivative_lowfirst(&sigma);

    for &pos in &error_positions {
        let i = codeword.len() - 1 - pos;
        let x_inv = gf_pow(GENERATOR, -(i as i32));
        let omega_val = poly_eval_lowfirst(&omega, x_inv);
        let sigma_deriv_val = poly_eval_lowfirst(&sigma_deriv, x_inv);
        if sigma_deriv_val == 0 {
            return Err(CodecError::UncorrectableFec {
                block_index,
                error_count: error_positions.len(),
            });
        }
        let x_val = gf_inv(x_inv);
        let magnitude = gf_mul(x_val, gf_div(omega_val, sigma_deriv_val));
        codeword[pos] ^= magnitude;
    }

    let verify = syndromes(codeword);
    if !verify.iter().all(|&s| s == 0) {
        return Err(CodecError::UncorrectableFec {
            block_index,
            error_count: error_positions.len(),
        });
    }

    Ok(error_positions.len())
}

/// Encodes an arbitrary byte stream as a sequence of RS(255,223) blocks,
/// zero-padding the final block. Returns `(codewords, pad_len)`.
pub fn encode_stream(data: &[u8]) -> (Vec<u8>, u8) {
    let pad_len = (RS_DATA_BYTES - (data.len() % RS_DATA_BYTES)) % RS_DATA_BYTES;
    let mut padded = data.to_vec();
    padded.extend(std::iter::repeat(0u8).take(pad_len));

    let mut out = Vec::with_capacity(padded.len() / RS_DATA_BYTES * RS_TOTAL_BYTES);
    for chunk in padded.chunks(RS_DATA_BYTES) {
        out.extend(encode_block(chunk));
    }
    (out, pad_len as u8)
}

/// Decodes a sequence of RS(255,223) blocks, correcting errors block by
/// block, and strips the trailing zero padding recorded by the framer.
pub fn decode_stream(codewords: &[u8], pad_len: u8) -> Result<Vec<u8>> {
    if codewords.len() % RS_TOTAL_BYTES != 0 {
        return Err(CodecError::InvalidConfig(format!(
            "RS stream length {} is not a multiple of {}",
            codewords.len(),
            RS_TOTAL_BYTES
        )));
    }
    let mut out = Vec::with_capacity(codewords.len() / RS_TOTAL_BYTES * RS_DATA_BYTES);
    for (block_index, chunk) in codewords.chunks(RS_TOTAL_BYTES).enumerate() {
        let mut block = chunk.to_vec();
        let corrected = decode_block(&mut block, block_index)?;
        if corrected > 0 {
            log::debug!("rs: corrected {corrected} byte errors in block {block_index}");
        }
        out.extend_from_slice(&block[..RS_DATA_BYTES]);
    }
    let new_len = out.len().saturating_sub(pad_len as usize);
    out.truncate(new_len);
    Ok(out)
}
