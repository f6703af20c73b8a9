//! Entry-table and resource decryption.
//!
//! Two fixed transforms are used by PAK archives, both built on unsigned
//! big-integer arithmetic over little-endian operands:
//!
//! - The entry table is XORed with a keystream derived from a 128-byte key
//!   blob raised to `0x10001` modulo a 1024-bit modulus.
//! - Individual resources are stored as 128-byte blocks, each holding a
//!   64-byte key and a 64-byte value. The value is divided by
//!   `key^E mod N` to recover eight plaintext bytes.
//!
//! These are legacy obfuscation schemes, not ciphers with security
//! guarantees. The constants are baked into the game client.

use num_bigint::BigUint;

use crate::{Error, Result};

/// Modulus for the entry-table key (1024-bit, little-endian).
const KEY_MODULUS: [u8; 128] = [
    0x7D, 0x0B, 0xF8, 0xC1, 0x7C, 0x23, 0xFD, 0x3B, 0xD4, 0x75, 0x16, 0xD2, 0x33, 0x21, 0xD8, 0x10,
    0x71, 0xF9, 0x7C, 0xD1, 0x34, 0x93, 0xBA, 0x77, 0x26, 0xFC, 0xAB, 0x2C, 0xEE, 0xDA, 0xD9, 0x1C,
    0x89, 0xE7, 0x29, 0x7B, 0xDD, 0x8A, 0xAE, 0x50, 0x39, 0xB6, 0x01, 0x6D, 0x21, 0x89, 0x5D, 0xA5,
    0xA1, 0x3E, 0xA2, 0xC0, 0x8C, 0x93, 0x13, 0x36, 0x65, 0xEB, 0xE8, 0xDF, 0x06, 0x17, 0x67, 0x96,
    0x06, 0x2B, 0xAC, 0x23, 0xED, 0x8C, 0xB7, 0x8B, 0x90, 0xAD, 0xEA, 0x71, 0xC4, 0x40, 0x44, 0x9D,
    0x1C, 0x7B, 0xBA, 0xC4, 0xB6, 0x2D, 0xD6, 0xD2, 0x4B, 0x62, 0xD6, 0x26, 0xFC, 0x74, 0x20, 0x07,
    0xEC, 0xE3, 0x59, 0x9A, 0xE6, 0xAF, 0xB9, 0xA8, 0x35, 0x8B, 0xE0, 0xE8, 0xD3, 0xCD, 0x45, 0x65,
    0xB0, 0x91, 0xC4, 0x95, 0x1B, 0xF3, 0x23, 0x1E, 0xC6, 0x71, 0xCF, 0x3E, 0x35, 0x2D, 0x6B, 0xE3,
];

/// Public exponent for the entry-table key.
const KEY_EXPONENT: u32 = 0x0001_0001;

/// Modulus for resource blocks (256-bit, little-endian).
const RESOURCE_MODULUS: [u8; 32] = [
    0x13, 0xD7, 0x9C, 0x89, 0x88, 0x91, 0x48, 0x10, 0xD7, 0xAA, 0x78, 0xAE, 0xF8, 0x59, 0xDF, 0x7D,
    0x3C, 0x43, 0xA0, 0xD0, 0xBB, 0x36, 0x77, 0xB5, 0xF0, 0x5C, 0x02, 0xAF, 0x65, 0xD8, 0x77, 0x03,
];

/// Exponent for resource blocks (256-bit, little-endian).
const RESOURCE_EXPONENT: [u8; 32] = [
    0xC0, 0xC2, 0x77, 0x1F, 0x5B, 0x34, 0x6A, 0x01, 0xC7, 0xD4, 0xD7, 0x85, 0x2E, 0x42, 0x2B, 0x3B,
    0x16, 0x3A, 0x17, 0x13, 0x16, 0xEA, 0x83, 0x30, 0x30, 0xDF, 0x3F, 0xF4, 0x25, 0x93, 0x20, 0x01,
];

/// Size of the encrypted table key and of the recovered keystream.
pub const KEY_SIZE: usize = 128;

/// Size of one encrypted resource block.
pub const RESOURCE_BLOCK_SIZE: usize = 128;

/// Size of each big-integer operand inside a resource block.
const RESOURCE_OPERAND_SIZE: usize = 64;

/// Plaintext bytes produced per resource block.
const RESOURCE_OUTPUT_STRIDE: usize = 8;

/// Recover the entry-table keystream from its encrypted blob.
///
/// Computes `key^0x10001 mod n` and zero-extends the result to 128 bytes.
pub fn decrypt_key(key: &[u8; KEY_SIZE]) -> [u8; KEY_SIZE] {
    let modulus = BigUint::from_bytes_le(&KEY_MODULUS);
    let exponent = BigUint::from(KEY_EXPONENT);
    let value = BigUint::from_bytes_le(key).modpow(&exponent, &modulus);

    let mut out = [0u8; KEY_SIZE];
    let bytes = value.to_bytes_le();
    // Always < n, so at most 128 bytes.
    out[..bytes.len()].copy_from_slice(&bytes);
    out
}

/// XOR the entry table with the keystream derived from `key`, in place.
///
/// The transform is its own inverse.
pub fn apply_table_keystream(buffer: &mut [u8], key: &[u8; KEY_SIZE]) {
    for (i, byte) in buffer.iter_mut().enumerate() {
        let mask = (i as u8).wrapping_add(key[i % 32].wrapping_mul(key[i % 29]));
        *byte ^= mask;
    }
}

/// Decrypt a resource payload.
///
/// The first 8 bytes hold the little-endian plaintext size; the output is
/// one byte longer than that. Each following 128-byte block yields up to
/// eight bytes at offset `block * 8`.
pub fn decrypt_resource(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 8 || (data.len() - 8) % RESOURCE_BLOCK_SIZE != 0 {
        return Err(Error::MalformedResource(format!(
            "length {} is not 8 + 128 * n",
            data.len()
        )));
    }

    let mut size_bytes = [0u8; 8];
    size_bytes.copy_from_slice(&data[..8]);
    let decrypted_size = i64::from_le_bytes(size_bytes);

    // Each block fills at most one 8-byte slot.
    let capacity = (data.len() - 8) / RESOURCE_BLOCK_SIZE * RESOURCE_OUTPUT_STRIDE;
    let output_len = usize::try_from(decrypted_size)
        .ok()
        .filter(|&size| size <= capacity)
        .map(|size| size + 1)
        .ok_or_else(|| {
            Error::MalformedResource(format!(
                "invalid decrypted size {decrypted_size} for {capacity} bytes of blocks"
            ))
        })?;

    let modulus = BigUint::from_bytes_le(&RESOURCE_MODULUS);
    let exponent = BigUint::from_bytes_le(&RESOURCE_EXPONENT);
    let mut output = vec![0u8; output_len];

    for (index, block) in data[8..].chunks_exact(RESOURCE_BLOCK_SIZE).enumerate() {
        let (key, value) = block.split_at(RESOURCE_OPERAND_SIZE);
        let key = BigUint::from_bytes_le(key);
        let value = BigUint::from_bytes_le(value);

        let divisor = key.modpow(&exponent, &modulus);
        if divisor.bits() == 0 {
            return Err(Error::MalformedResource(format!(
                "block {index} has a zero divisor"
            )));
        }

        let plain = (value / divisor).to_bytes_le();
        // to_bytes_le() yields [0] for zero; the slot is already zeroed.
        if plain == [0] {
            continue;
        }

        let start = index * RESOURCE_OUTPUT_STRIDE;
        let end = start + plain.len();
        if plain.len() > RESOURCE_OUTPUT_STRIDE || end > output.len() {
            return Err(Error::MalformedResource(format!(
                "block {index} decodes to {} bytes past the output buffer",
                plain.len()
            )));
        }
        output[start..end].copy_from_slice(&plain);
    }

    Ok(output)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Encrypt `plain` into the resource block layout using `key_seed + i`
    /// as the key of block `i`.
    pub(crate) fn encrypt_resource(plain: &[u8], key_seed: u64) -> Vec<u8> {
        let modulus = BigUint::from_bytes_le(&RESOURCE_MODULUS);
        let exponent = BigUint::from_bytes_le(&RESOURCE_EXPONENT);

        let mut out = (plain.len() as i64).to_le_bytes().to_vec();
        for (i, chunk) in plain.chunks(RESOURCE_OUTPUT_STRIDE).enumerate() {
            let key = BigUint::from(key_seed + i as u64);
            let divisor = key.modpow(&exponent, &modulus);
            assert!(divisor.bits() != 0, "degenerate test key");

            let value = BigUint::from_bytes_le(chunk) * divisor;
            out.extend_from_slice(&padded(&key.to_bytes_le(), RESOURCE_OPERAND_SIZE));
            out.extend_from_slice(&padded(&value.to_bytes_le(), RESOURCE_OPERAND_SIZE));
        }
        out
    }

    fn padded(bytes: &[u8], len: usize) -> Vec<u8> {
        let mut v = bytes.to_vec();
        assert!(v.len() <= len);
        v.resize(len, 0);
        v
    }

    fn key_from_u64(value: u64) -> [u8; KEY_SIZE] {
        let mut key = [0u8; KEY_SIZE];
        key[..8].copy_from_slice(&value.to_le_bytes());
        key
    }

    #[test]
    fn test_decrypt_key_fixed_points() {
        assert_eq!(decrypt_key(&[0u8; KEY_SIZE]), [0u8; KEY_SIZE]);
        assert_eq!(decrypt_key(&key_from_u64(1)), key_from_u64(1));
    }

    #[test]
    fn test_decrypt_key_minus_one() {
        // (n - 1)^odd = n - 1 (mod n)
        let n_minus_one = BigUint::from_bytes_le(&KEY_MODULUS) - 1u32;
        let mut blob = [0u8; KEY_SIZE];
        let bytes = n_minus_one.to_bytes_le();
        blob[..bytes.len()].copy_from_slice(&bytes);

        assert_eq!(decrypt_key(&blob), blob);
    }

    #[test]
    fn test_decrypt_key_small_value() {
        let expected = BigUint::from(2u32)
            .modpow(&BigUint::from(KEY_EXPONENT), &BigUint::from_bytes_le(&KEY_MODULUS));
        let out = decrypt_key(&key_from_u64(2));
        assert_eq!(BigUint::from_bytes_le(&out), expected);
        assert_ne!(out, key_from_u64(2));
    }

    #[test]
    fn test_keystream_is_involution() {
        let key = decrypt_key(&key_from_u64(0xDEAD_BEEF));
        let original: Vec<u8> = (0..300u32).map(|i| (i * 7) as u8).collect();

        let mut buffer = original.clone();
        apply_table_keystream(&mut buffer, &key);
        assert_ne!(buffer, original);
        apply_table_keystream(&mut buffer, &key);
        assert_eq!(buffer, original);
    }

    #[test]
    fn test_keystream_formula() {
        let mut key = [0u8; KEY_SIZE];
        key[0] = 3;
        key[1] = 5;
        let mut buffer = [0u8; 2];
        apply_table_keystream(&mut buffer, &key);
        assert_eq!(buffer[0], 9); // 0 + 3 * 3
        assert_eq!(buffer[1], 26); // 1 + 5 * 5
    }

    #[test]
    fn test_resource_identity_key() {
        // key = 1 makes the divisor 1, so the value passes through.
        let mut data = 5i64.to_le_bytes().to_vec();
        let mut block = vec![0u8; RESOURCE_BLOCK_SIZE];
        block[0] = 1;
        block[RESOURCE_OPERAND_SIZE..RESOURCE_OPERAND_SIZE + 5].copy_from_slice(b"hello");
        data.extend_from_slice(&block);

        let out = decrypt_resource(&data).unwrap();
        assert_eq!(out.len(), 6);
        assert_eq!(&out[..5], b"hello");
    }

    #[test]
    fn test_resource_roundtrip() {
        let plain = b"The quick brown fox jumps over the lazy dog".to_vec();
        let encrypted = encrypt_resource(&plain, 0x1_0001);
        assert_eq!(encrypted.len(), 8 + 6 * RESOURCE_BLOCK_SIZE);

        let out = decrypt_resource(&encrypted).unwrap();
        assert_eq!(out.len(), plain.len() + 1);
        assert_eq!(&out[..plain.len()], &plain[..]);
    }

    #[test]
    fn test_resource_bad_length() {
        assert!(matches!(
            decrypt_resource(&[0u8; 7]),
            Err(Error::MalformedResource(_))
        ));
        assert!(matches!(
            decrypt_resource(&[0u8; 8 + 127]),
            Err(Error::MalformedResource(_))
        ));
    }

    #[test]
    fn test_resource_size_beyond_blocks() {
        for size in [i64::MAX, -1, 9] {
            let mut data = size.to_le_bytes().to_vec();
            data.extend_from_slice(&[0u8; RESOURCE_BLOCK_SIZE]);
            assert!(
                matches!(decrypt_resource(&data), Err(Error::MalformedResource(_))),
                "size {size}"
            );
        }
    }

    /// `decrypt_key` of the blob `(i * 37 + 11) as u8`, computed with an
    /// independent big-integer implementation.
    const KEY_VECTOR_OUT: [u8; KEY_SIZE] = [
        0xDD, 0xC6, 0x91, 0x7A, 0x05, 0x93, 0x63, 0x2F, 0x0E, 0xFC, 0x80, 0x6B, 0x26, 0xFC, 0xBA, 0x99,
        0xA1, 0xDA, 0x31, 0xD4, 0x67, 0x78, 0x03, 0xA0, 0x42, 0x56, 0x81, 0xDA, 0x2A, 0x5A, 0x55, 0xD9,
        0x35, 0x1D, 0x1A, 0x1A, 0x38, 0xE8, 0xE6, 0x64, 0x22, 0xDD, 0x62, 0xB2, 0x78, 0x66, 0xC7, 0xE1,
        0x8F, 0x95, 0x3A, 0x85, 0x7C, 0x35, 0x0E, 0x27, 0x89, 0x54, 0x02, 0x15, 0x9D, 0x32, 0xA0, 0x6F,
        0x1F, 0x4C, 0x26, 0xCA, 0xAB, 0x8C, 0x2C, 0xBB, 0xFC, 0xE4, 0x2E, 0xA1, 0xBF, 0xE6, 0xD9, 0x1F,
        0xDA, 0xA4, 0x0C, 0x14, 0x44, 0xE9, 0x46, 0x68, 0x42, 0x64, 0xDD, 0x39, 0x62, 0x24, 0x29, 0x30,
        0x56, 0xF6, 0x79, 0x89, 0xB1, 0xBA, 0xF4, 0xC6, 0x11, 0xFC, 0xFD, 0xC2, 0xA7, 0x16, 0x03, 0x6B,
        0xA5, 0xC0, 0x8F, 0x33, 0x80, 0x3E, 0x13, 0xCF, 0xA9, 0x88, 0x61, 0x8D, 0xC9, 0x73, 0x58, 0x69,
    ];

    #[test]
    fn test_decrypt_key_vector() {
        let blob: [u8; KEY_SIZE] =
            std::array::from_fn(|i| (i as u8).wrapping_mul(37).wrapping_add(11));
        let key = decrypt_key(&blob);
        assert_eq!(key, KEY_VECTOR_OUT);

        let mut table = [0u8; 16];
        apply_table_keystream(&mut table, &key);
        assert_eq!(
            table,
            [
                0xC9, 0x25, 0x23, 0x27, 0x1D, 0x6E, 0x4F, 0xA8,
                0xCC, 0x19, 0x0A, 0xC4, 0xB0, 0x1D, 0x32, 0x80,
            ]
        );
    }

    #[test]
    fn test_resource_block_vector() {
        // key `(i * 13 + 5) as u8`; value is b"KPKAblok" times key^E mod N.
        let mut data = 8i64.to_le_bytes().to_vec();
        data.extend(
            (0..RESOURCE_OPERAND_SIZE).map(|i| (i as u8).wrapping_mul(13).wrapping_add(5)),
        );
        let value: [u8; 39] = [
            0x9E, 0x3E, 0x20, 0xA8, 0x43, 0x08, 0x39, 0x8F, 0x27, 0x52, 0x78, 0x44, 0x14, 0x32,
            0x44, 0xC2, 0x48, 0xAC, 0x8C, 0xD6, 0xE0, 0xCC, 0xD9, 0x74, 0x14, 0x40, 0xC2, 0xC3,
            0xA1, 0xF9, 0x6E, 0x96, 0x27, 0x8A, 0x48, 0xCD, 0xC8, 0x76, 0x7F,
        ];
        data.extend_from_slice(&value);
        data.resize(8 + RESOURCE_BLOCK_SIZE, 0);

        let out = decrypt_resource(&data).unwrap();
        assert_eq!(out, b"KPKAblok\0");
    }

    #[test]
    fn test_resource_zero_key_rejected() {
        let mut data = 8i64.to_le_bytes().to_vec();
        data.extend_from_slice(&[0u8; RESOURCE_BLOCK_SIZE]);
        assert!(matches!(
            decrypt_resource(&data),
            Err(Error::MalformedResource(_))
        ));
    }
}
