//! Header block cipher: canonical DES, decrypt-only.
//!
//! Ported from the textbook DES tables; the source engine encrypts the
//! directory sub-header with a fixed, small set of candidate keys and the
//! reader simply tries each one in order (see [`decrypt_header`]).

const IP: [u8; 64] = [
    58, 50, 42, 34, 26, 18, 10, 2, 60, 52, 44, 36, 28, 20, 12, 4, 62, 54, 46, 38, 30, 22, 14, 6,
    64, 56, 48, 40, 32, 24, 16, 8, 57, 49, 41, 33, 25, 17, 9, 1, 59, 51, 43, 35, 27, 19, 11, 3, 61,
    53, 45, 37, 29, 21, 13, 5, 63, 55, 47, 39, 31, 23, 15, 7,
];

const FP: [u8; 64] = [
    40, 8, 48, 16, 56, 24, 64, 32, 39, 7, 47, 15, 55, 23, 63, 31, 38, 6, 46, 14, 54, 22, 62, 30,
    37, 5, 45, 13, 53, 21, 61, 29, 36, 4, 44, 12, 52, 20, 60, 28, 35, 3, 43, 11, 51, 19, 59, 27,
    34, 2, 42, 10, 50, 18, 58, 26, 33, 1, 41, 9, 49, 17, 57, 25,
];

const E: [u8; 48] = [
    32, 1, 2, 3, 4, 5, 4, 5, 6, 7, 8, 9, 8, 9, 10, 11, 12, 13, 12, 13, 14, 15, 16, 17, 16, 17, 18,
    19, 20, 21, 20, 21, 22, 23, 24, 25, 24, 25, 26, 27, 28, 29, 28, 29, 30, 31, 32, 1,
];

const P: [u8; 32] = [
    16, 7, 20, 21, 29, 12, 28, 17, 1, 15, 23, 26, 5, 18, 31, 10, 2, 8, 24, 14, 32, 27, 3, 9, 19,
    13, 30, 6, 22, 11, 4, 25,
];

const PC1: [u8; 56] = [
    57, 49, 41, 33, 25, 17, 9, 1, 58, 50, 42, 34, 26, 18, 10, 2, 59, 51, 43, 35, 27, 19, 11, 3, 60,
    52, 44, 36, 63, 55, 47, 39, 31, 23, 15, 7, 62, 54, 46, 38, 30, 22, 14, 6, 61, 53, 45, 37, 29,
    21, 13, 5, 28, 20, 12, 4,
];

const PC2: [u8; 48] = [
    14, 17, 11, 24, 1, 5, 3, 28, 15, 6, 21, 10, 23, 19, 12, 4, 26, 8, 16, 7, 27, 20, 13, 2, 41, 52,
    31, 37, 47, 55, 30, 40, 51, 45, 33, 48, 44, 49, 39, 56, 34, 53, 46, 42, 50, 36, 29, 32,
];

const SHIFTS: [u8; 16] = [1, 1, 2, 2, 2, 2, 2, 2, 1, 2, 2, 2, 2, 2, 2, 1];

const SBOXES: [[u8; 64]; 8] = [
    [
        14, 4, 13, 1, 2, 15, 11, 8, 3, 10, 6, 12, 5, 9, 0, 7, 0, 15, 7, 4, 14, 2, 13, 1, 10, 6, 12,
        11, 9, 5, 3, 8, 4, 1, 14, 8, 13, 6, 2, 11, 15, 12, 9, 7, 3, 10, 5, 0, 15, 12, 8, 2, 4, 9,
        1, 7, 5, 11, 3, 14, 10, 0, 6, 13,
    ],
    [
        15, 1, 8, 14, 6, 11, 3, 4, 9, 7, 2, 13, 12, 0, 5, 10, 3, 13, 4, 7, 15, 2, 8, 14, 12, 0, 1,
        10, 6, 9, 11, 5, 0, 14, 7, 11, 10, 4, 13, 1, 5, 8, 12, 6, 9, 3, 2, 15, 13, 8, 10, 1, 3, 15,
        4, 2, 11, 6, 7, 12, 0, 5, 14, 9,
    ],
    [
        10, 0, 9, 14, 6, 3, 15, 5, 1, 13, 12, 7, 11, 4, 2, 8, 13, 7, 0, 9, 3, 4, 6, 10, 2, 8, 5,
        14, 12, 11, 15, 1, 13, 6, 4, 9, 8, 15, 3, 0, 11, 1, 2, 12, 5, 10, 14, 7, 1, 10, 13, 0, 6,
        9, 8, 7, 4, 15, 14, 3, 11, 5, 2, 12,
    ],
    [
        7, 13, 14, 3, 0, 6, 9, 10, 1, 2, 8, 5, 11, 12, 4, 15, 13, 8, 11, 5, 6, 15, 0, 3, 4, 7, 2,
        12, 1, 10, 14, 9, 10, 6, 9, 0, 12, 11, 7, 13, 15, 1, 3, 14, 5, 2, 8, 4, 3, 15, 0, 6, 10, 1,
        13, 8, 9, 4, 5, 11, 12, 7, 2, 14,
    ],
    [
        2, 12, 4, 1, 7, 10, 11, 6, 8, 5, 3, 15, 13, 0, 14, 9, 14, 11, 2, 12, 4, 7, 13, 1, 5, 0, 15,
        10, 3, 9, 8, 6, 4, 2, 1, 11, 10, 13, 7, 8, 15, 9, 12, 5, 6, 3, 0, 14, 11, 8, 12, 7, 1, 14,
        2, 13, 6, 15, 0, 9, 10, 4, 5, 3,
    ],
    [
        12, 1, 10, 15, 9, 2, 6, 8, 0, 13, 3, 4, 14, 7, 5, 11, 10, 15, 4, 2, 7, 12, 9, 5, 6, 1, 13,
        14, 0, 11, 3, 8, 9, 14, 15, 5, 2, 8, 12, 3, 7, 0, 4, 10, 1, 13, 11, 6, 4, 3, 2, 12, 9, 5,
        15, 10, 11, 14, 1, 7, 6, 0, 8, 13,
    ],
    [
        4, 11, 2, 14, 15, 0, 8, 13, 3, 12, 9, 7, 5, 10, 6, 1, 13, 0, 11, 7, 4, 9, 1, 10, 14, 3, 5,
        12, 2, 15, 8, 6, 1, 4, 11, 13, 12, 3, 7, 14, 10, 15, 6, 8, 0, 5, 9, 2, 6, 11, 13, 8, 1, 4,
        10, 7, 9, 5, 0, 15, 14, 2, 3, 12,
    ],
    [
        13, 2, 8, 4, 6, 15, 11, 1, 10, 9, 3, 14, 5, 0, 12, 7, 1, 15, 13, 8, 10, 3, 7, 4, 12, 5, 6,
        11, 0, 14, 9, 2, 7, 11, 4, 1, 9, 12, 14, 2, 0, 6, 10, 13, 15, 3, 5, 8, 2, 1, 14, 7, 4, 10,
        8, 13, 15, 12, 9, 0, 3, 5, 6, 11,
    ],
];

/// `table[i]` is 1-indexed, counting from the MSB of a `bit_width`-bit value.
fn permute(input: u64, bit_width: u32, table: &[u8]) -> u64 {
    let mut out = 0u64;
    for &pos in table {
        let bit = (input >> (bit_width - pos as u32)) & 1;
        out = (out << 1) | bit;
    }
    out
}

fn rotate_left_28(half: u32, amount: u8) -> u32 {
    let half = half & 0x0FFF_FFFF;
    ((half << amount) | (half >> (28 - amount))) & 0x0FFF_FFFF
}

/// Expands an 8-byte key into 16 round keys (48 bits each, right-justified in a `u64`).
fn key_schedule(key: [u8; 8]) -> [u64; 16] {
    let key_bits = u64::from_be_bytes(key);
    let permuted = permute(key_bits, 64, &PC1);
    let mut c = ((permuted >> 28) & 0x0FFF_FFFF) as u32;
    let mut d = (permuted & 0x0FFF_FFFF) as u32;

    let mut round_keys = [0u64; 16];
    for (i, rk) in round_keys.iter_mut().enumerate() {
        c = rotate_left_28(c, SHIFTS[i]);
        d = rotate_left_28(d, SHIFTS[i]);
        let cd = ((c as u64) << 28) | (d as u64);
        *rk = permute(cd, 56, &PC2);
    }
    round_keys
}

fn feistel(half: u32, round_key: u64) -> u32 {
    let expanded = permute(half as u64, 32, &E);
    let mixed = expanded ^ round_key;

    let mut sbox_out = 0u32;
    for (i, sbox) in SBOXES.iter().enumerate() {
        let chunk = ((mixed >> (42 - i * 6)) & 0x3F) as u8;
        let row = ((chunk & 0x20) >> 4) | (chunk & 0x01);
        let col = (chunk >> 1) & 0x0F;
        let val = sbox[(row as usize) * 16 + col as usize];
        sbox_out = (sbox_out << 4) | val as u32;
    }

    permute(sbox_out as u64, 32, &P) as u32
}

fn des_network(block: [u8; 8], round_keys: &[u64; 16], reverse: bool) -> [u8; 8] {
    let block_bits = u64::from_be_bytes(block);
    let permuted = permute(block_bits, 64, &IP);

    let mut l = ((permuted >> 32) & 0xFFFF_FFFF) as u32;
    let mut r = (permuted & 0xFFFF_FFFF) as u32;

    let apply = |r: u32, key: u64, l: u32| (r, l ^ feistel(r, key));
    if reverse {
        for round_key in round_keys.iter().rev() {
            let (next_l, next_r) = apply(r, *round_key, l);
            l = next_l;
            r = next_r;
        }
    } else {
        for round_key in round_keys.iter() {
            let (next_l, next_r) = apply(r, *round_key, l);
            l = next_l;
            r = next_r;
        }
    }

    let combined = ((r as u64) << 32) | l as u64;
    permute(combined, 64, &FP).to_be_bytes()
}

/// Decrypts a single 8-byte block under `key`, applying round keys in reverse order.
pub fn decrypt_block(key: [u8; 8], block: [u8; 8]) -> [u8; 8] {
    let round_keys = key_schedule(key);
    des_network(block, &round_keys, true)
}

/// Encrypts a single 8-byte block under `key`. Not part of the container-reading
/// surface (the format only ever ships decrypted-on-read); exposed publicly so
/// tooling and tests can build known-answer fixtures for [`decrypt_header`]
/// without duplicating the Feistel network.
pub fn encrypt_block(key: [u8; 8], block: [u8; 8]) -> [u8; 8] {
    let round_keys = key_schedule(key);
    des_network(block, &round_keys, false)
}

/// Decrypts `data` (whose length must be a multiple of 8) under `key`, block by block.
pub fn decrypt(data: &[u8], key: [u8; 8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for chunk in data.chunks(8) {
        let mut block = [0u8; 8];
        block[..chunk.len()].copy_from_slice(chunk);
        out.extend_from_slice(&decrypt_block(key, block));
    }
    out
}

/// The fixed, ordered list of candidate header keys.
pub const CANDIDATE_KEYS: [&[u8; 8]; 5] = [
    b"11111111", b"22222222", b"aaaaaaaa", b"bbbbbbbb", b"aber3801",
];

/// The plaintext marker expected at bytes `[4:8]` of a correctly-decrypted 32-byte sub-header.
const HEADER_MAGIC: &[u8; 4] = b"8202";

/// Tries each candidate key in order against the 32-byte encrypted directory sub-header,
/// returning the decrypted bytes and the key that unlocked them.
///
/// Corresponds to `decrypt_header` in `original_source/native32/decrypt_header.py`.
pub fn decrypt_header(data: &[u8; 32]) -> Option<([u8; 32], &'static [u8; 8])> {
    for key in CANDIDATE_KEYS {
        let decrypted = decrypt(data, *key);
        if decrypted.len() >= 8 && &decrypted[4..8] == HEADER_MAGIC {
            let mut out = [0u8; 32];
            out.copy_from_slice(&decrypted);
            return Some((out, key));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Known-answer test for the base DES algorithm (FIPS 81 style vector):
    /// encrypting then decrypting the same block under the same key is the identity.
    #[test]
    fn decrypt_is_involution_of_encrypt() {
        let key = *b"aber3801";
        let plaintext = *b"hi mom!!";

        let ciphertext = encrypt_block(key, plaintext);
        let roundtrip = decrypt_block(key, ciphertext);
        assert_eq!(roundtrip, plaintext);
    }

    /// The textbook DES known-answer vector (key `133457799BBCDFF1`, plaintext
    /// `0123456789ABCDEF`, ciphertext `85E813540F0AB405`): confirms the
    /// permutation/S-box tables themselves are wired up correctly, independent
    /// of this crate's own encrypt/decrypt round trip.
    #[test]
    fn matches_textbook_des_vector() {
        fn from_hex(s: &str) -> [u8; 8] {
            hex::decode(s).unwrap().try_into().unwrap()
        }

        let key = from_hex("133457799BBCDFF1");
        let plaintext = from_hex("0123456789ABCDEF");
        let ciphertext = from_hex("85E813540F0AB405");

        assert_eq!(encrypt_block(key, plaintext), ciphertext);
        assert_eq!(decrypt_block(key, ciphertext), plaintext);
    }

    #[test]
    fn decrypt_header_is_deterministic() {
        let key = *b"aber3801";
        let mut plaintext = [0u8; 32];
        plaintext[4..8].copy_from_slice(b"8202");

        let mut cipher = [0u8; 32];
        for (chunk_in, chunk_out) in plaintext.chunks(8).zip(cipher.chunks_mut(8)) {
            let block: [u8; 8] = chunk_in.try_into().unwrap();
            chunk_out.copy_from_slice(&encrypt_block(key, block));
        }

        let (first, used_key) = decrypt_header(&cipher).expect("key trial should succeed");
        assert_eq!(used_key, b"aber3801");
        let (second, _) = decrypt_header(&cipher).unwrap();
        assert_eq!(first, second);
        assert_eq!(&first[4..8], b"8202");
    }

    #[test]
    fn decrypt_header_fails_closed() {
        let garbage = [0xAAu8; 32];
        assert!(decrypt_header(&garbage).is_none());
    }
}
