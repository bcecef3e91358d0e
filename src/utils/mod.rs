//! Small encoding helpers shared by the signature encoders and the heaps.

use sha1::{Digest, Sha1};

/// Writes an ECMA-335 compressed unsigned integer (II.23.2).
///
/// Values up to `0x7F` take one byte, values up to `0x3FFF` take two bytes and
/// values up to `0x1FFF_FFFF` take four bytes, all big-endian with the size encoded
/// in the top bits of the first byte.
///
/// # Arguments
///
/// * `value` - The value to encode, must not exceed `0x1FFF_FFFF`
/// * `buffer` - Output buffer the encoded bytes are appended to
pub fn write_compressed_uint(value: u32, buffer: &mut Vec<u8>) {
    if value <= 0x7F {
        buffer.push(value as u8);
    } else if value <= 0x3FFF {
        buffer.push(((value >> 8) as u8) | 0x80);
        buffer.push(value as u8);
    } else {
        buffer.push(((value >> 24) as u8 & 0x1F) | 0xC0);
        buffer.push((value >> 16) as u8);
        buffer.push((value >> 8) as u8);
        buffer.push(value as u8);
    }
}

/// Writes an ECMA-335 compressed signed integer (II.23.2), used for array lower bounds.
///
/// # Arguments
///
/// * `value` - The value to encode
/// * `buffer` - Output buffer the encoded bytes are appended to
pub fn write_compressed_int(value: i32, buffer: &mut Vec<u8>) {
    let sign = u32::from(value < 0);

    // rotate left by one within the chosen width, sign bit ends up in bit 0
    if (-64..64).contains(&value) {
        let rotated = (((value as u32) << 1) & 0x7F) | sign;
        buffer.push(rotated as u8);
    } else if (-8192..8192).contains(&value) {
        let rotated = (((value as u32) << 1) & 0x3FFF) | sign;
        buffer.push(((rotated >> 8) as u8) | 0x80);
        buffer.push(rotated as u8);
    } else {
        let rotated = (((value as u32) << 1) & 0x1FFF_FFFF) | sign;
        buffer.push(((rotated >> 24) as u8 & 0x1F) | 0xC0);
        buffer.push((rotated >> 16) as u8);
        buffer.push((rotated >> 8) as u8);
        buffer.push(rotated as u8);
    }
}

/// Computes the public key token of a strong-name public key.
///
/// The token is the last eight bytes of the SHA-1 hash of the key, in reverse order
/// (ECMA-335 II.6.2.1.3).
#[must_use]
pub fn public_key_token(public_key: &[u8]) -> [u8; 8] {
    let digest = Sha1::digest(public_key);
    let mut token = [0_u8; 8];
    for (i, byte) in digest[digest.len() - 8..].iter().rev().enumerate() {
        token[i] = *byte;
    }
    token
}
