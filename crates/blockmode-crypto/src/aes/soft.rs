//! Software AES (FIPS 197).
//!
//! Byte-oriented S-box implementation. It is the reference key schedule
//! used by the tests and the command-line tool; production callers can
//! plug a hardware backend in through [`BlockCipher`](crate::provider::BlockCipher).

use blockmode_types::CryptoError;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Round-key words for the largest key size (AES-256: 15 round keys).
const MAX_ROUND_WORDS: usize = 60;

// Forward S-box (FIPS 197).
const SBOX: [u8; 256] = [
    0x63, 0x7c, 0x77, 0x7b, 0xf2, 0x6b, 0x6f, 0xc5, 0x30, 0x01, 0x67, 0x2b, 0xfe, 0xd7, 0xab, 0x76,
    0xca, 0x82, 0xc9, 0x7d, 0xfa, 0x59, 0x47, 0xf0, 0xad, 0xd4, 0xa2, 0xaf, 0x9c, 0xa4, 0x72, 0xc0,
    0xb7, 0xfd, 0x93, 0x26, 0x36, 0x3f, 0xf7, 0xcc, 0x34, 0xa5, 0xe5, 0xf1, 0x71, 0xd8, 0x31, 0x15,
    0x04, 0xc7, 0x23, 0xc3, 0x18, 0x96, 0x05, 0x9a, 0x07, 0x12, 0x80, 0xe2, 0xeb, 0x27, 0xb2, 0x75,
    0x09, 0x83, 0x2c, 0x1a, 0x1b, 0x6e, 0x5a, 0xa0, 0x52, 0x3b, 0xd6, 0xb3, 0x29, 0xe3, 0x2f, 0x84,
    0x53, 0xd1, 0x00, 0xed, 0x20, 0xfc, 0xb1, 0x5b, 0x6a, 0xcb, 0xbe, 0x39, 0x4a, 0x4c, 0x58, 0xcf,
    0xd0, 0xef, 0xaa, 0xfb, 0x43, 0x4d, 0x33, 0x85, 0x45, 0xf9, 0x02, 0x7f, 0x50, 0x3c, 0x9f, 0xa8,
    0x51, 0xa3, 0x40, 0x8f, 0x92, 0x9d, 0x38, 0xf5, 0xbc, 0xb6, 0xda, 0x21, 0x10, 0xff, 0xf3, 0xd2,
    0xcd, 0x0c, 0x13, 0xec, 0x5f, 0x97, 0x44, 0x17, 0xc4, 0xa7, 0x7e, 0x3d, 0x64, 0x5d, 0x19, 0x73,
    0x60, 0x81, 0x4f, 0xdc, 0x22, 0x2a, 0x90, 0x88, 0x46, 0xee, 0xb8, 0x14, 0xde, 0x5e, 0x0b, 0xdb,
    0xe0, 0x32, 0x3a, 0x0a, 0x49, 0x06, 0x24, 0x5c, 0xc2, 0xd3, 0xac, 0x62, 0x91, 0x95, 0xe4, 0x79,
    0xe7, 0xc8, 0x37, 0x6d, 0x8d, 0xd5, 0x4e, 0xa9, 0x6c, 0x56, 0xf4, 0xea, 0x65, 0x7a, 0xae, 0x08,
    0xba, 0x78, 0x25, 0x2e, 0x1c, 0xa6, 0xb4, 0xc6, 0xe8, 0xdd, 0x74, 0x1f, 0x4b, 0xbd, 0x8b, 0x8a,
    0x70, 0x3e, 0xb5, 0x66, 0x48, 0x03, 0xf6, 0x0e, 0x61, 0x35, 0x57, 0xb9, 0x86, 0xc1, 0x1d, 0x9e,
    0xe1, 0xf8, 0x98, 0x11, 0x69, 0xd9, 0x8e, 0x94, 0x9b, 0x1e, 0x87, 0xe9, 0xce, 0x55, 0x28, 0xdf,
    0x8c, 0xa1, 0x89, 0x0d, 0xbf, 0xe6, 0x42, 0x68, 0x41, 0x99, 0x2d, 0x0f, 0xb0, 0x54, 0xbb, 0x16,
];

// Inverse S-box.
const INV_SBOX: [u8; 256] = [
    0x52, 0x09, 0x6a, 0xd5, 0x30, 0x36, 0xa5, 0x38, 0xbf, 0x40, 0xa3, 0x9e, 0x81, 0xf3, 0xd7, 0xfb,
    0x7c, 0xe3, 0x39, 0x82, 0x9b, 0x2f, 0xff, 0x87, 0x34, 0x8e, 0x43, 0x44, 0xc4, 0xde, 0xe9, 0xcb,
    0x54, 0x7b, 0x94, 0x32, 0xa6, 0xc2, 0x23, 0x3d, 0xee, 0x4c, 0x95, 0x0b, 0x42, 0xfa, 0xc3, 0x4e,
    0x08, 0x2e, 0xa1, 0x66, 0x28, 0xd9, 0x24, 0xb2, 0x76, 0x5b, 0xa2, 0x49, 0x6d, 0x8b, 0xd1, 0x25,
    0x72, 0xf8, 0xf6, 0x64, 0x86, 0x68, 0x98, 0x16, 0xd4, 0xa4, 0x5c, 0xcc, 0x5d, 0x65, 0xb6, 0x92,
    0x6c, 0x70, 0x48, 0x50, 0xfd, 0xed, 0xb9, 0xda, 0x5e, 0x15, 0x46, 0x57, 0xa7, 0x8d, 0x9d, 0x84,
    0x90, 0xd8, 0xab, 0x00, 0x8c, 0xbc, 0xd3, 0x0a, 0xf7, 0xe4, 0x58, 0x05, 0xb8, 0xb3, 0x45, 0x06,
    0xd0, 0x2c, 0x1e, 0x8f, 0xca, 0x3f, 0x0f, 0x02, 0xc1, 0xaf, 0xbd, 0x03, 0x01, 0x13, 0x8a, 0x6b,
    0x3a, 0x91, 0x11, 0x41, 0x4f, 0x67, 0xdc, 0xea, 0x97, 0xf2, 0xcf, 0xce, 0xf0, 0xb4, 0xe6, 0x73,
    0x96, 0xac, 0x74, 0x22, 0xe7, 0xad, 0x35, 0x85, 0xe2, 0xf9, 0x37, 0xe8, 0x1c, 0x75, 0xdf, 0x6e,
    0x47, 0xf1, 0x1a, 0x71, 0x1d, 0x29, 0xc5, 0x89, 0x6f, 0xb7, 0x62, 0x0e, 0xaa, 0x18, 0xbe, 0x1b,
    0xfc, 0x56, 0x3e, 0x4b, 0xc6, 0xd2, 0x79, 0x20, 0x9a, 0xdb, 0xc0, 0xfe, 0x78, 0xcd, 0x5a, 0xf4,
    0x1f, 0xdd, 0xa8, 0x33, 0x88, 0x07, 0xc7, 0x31, 0xb1, 0x12, 0x10, 0x59, 0x27, 0x80, 0xec, 0x5f,
    0x60, 0x51, 0x7f, 0xa9, 0x19, 0xb5, 0x4a, 0x0d, 0x2d, 0xe5, 0x7a, 0x9f, 0x93, 0xc9, 0x9c, 0xef,
    0xa0, 0xe0, 0x3b, 0x4d, 0xae, 0x2a, 0xf5, 0xb0, 0xc8, 0xeb, 0xbb, 0x3c, 0x83, 0x53, 0x99, 0x61,
    0x17, 0x2b, 0x04, 0x7e, 0xba, 0x77, 0xd6, 0x26, 0xe1, 0x69, 0x14, 0x63, 0x55, 0x21, 0x0c, 0x7d,
];

// Round constants for key expansion.
const RCON: [u32; 10] = [
    0x01000000, 0x02000000, 0x04000000, 0x08000000, 0x10000000, 0x20000000, 0x40000000, 0x80000000,
    0x1b000000, 0x36000000,
];

#[inline]
fn xtime(x: u8) -> u8 {
    (x << 1) ^ (0x1b & 0u8.wrapping_sub(x >> 7))
}

fn gf_mul(a: u8, b: u8) -> u8 {
    let (mut a, mut b, mut acc) = (a, b, 0u8);
    while b != 0 {
        acc ^= a & 0u8.wrapping_sub(b & 1);
        a = xtime(a);
        b >>= 1;
    }
    acc
}

fn sub_word(w: u32) -> u32 {
    let [b0, b1, b2, b3] = w.to_be_bytes();
    u32::from_be_bytes([
        SBOX[b0 as usize],
        SBOX[b1 as usize],
        SBOX[b2 as usize],
        SBOX[b3 as usize],
    ])
}

/// Expanded AES key schedule (S-box table lookup).
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub(crate) struct SoftAesKey {
    round_keys: [u32; MAX_ROUND_WORDS],
    rounds: usize,
    key_len: usize,
}

impl SoftAesKey {
    /// Expand a 16, 24 or 32 byte key.
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        let nk = match key.len() {
            16 | 24 | 32 => key.len() / 4,
            _ => return Err(CryptoError::InvalidKey),
        };
        let rounds = nk + 6;
        let words = 4 * (rounds + 1);
        let mut w = [0u32; MAX_ROUND_WORDS];

        for (i, chunk) in key.chunks_exact(4).enumerate() {
            w[i] = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        for i in nk..words {
            let mut temp = w[i - 1];
            if i % nk == 0 {
                temp = sub_word(temp.rotate_left(8)) ^ RCON[i / nk - 1];
            } else if nk > 6 && i % nk == 4 {
                temp = sub_word(temp);
            }
            w[i] = w[i - nk] ^ temp;
        }

        Ok(Self {
            round_keys: w,
            rounds,
            key_len: key.len(),
        })
    }

    pub fn encrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        let mut s = load_state(block)?;
        self.add_round_key(&mut s, 0);
        for r in 1..self.rounds {
            sub_bytes(&mut s, &SBOX);
            shift_rows(&mut s);
            mix_columns(&mut s);
            self.add_round_key(&mut s, r);
        }
        sub_bytes(&mut s, &SBOX);
        shift_rows(&mut s);
        self.add_round_key(&mut s, self.rounds);
        block.copy_from_slice(&s);
        s.zeroize();
        Ok(())
    }

    pub fn decrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        let mut s = load_state(block)?;
        self.add_round_key(&mut s, self.rounds);
        for r in (1..self.rounds).rev() {
            inv_shift_rows(&mut s);
            sub_bytes(&mut s, &INV_SBOX);
            self.add_round_key(&mut s, r);
            inv_mix_columns(&mut s);
        }
        inv_shift_rows(&mut s);
        sub_bytes(&mut s, &INV_SBOX);
        self.add_round_key(&mut s, 0);
        block.copy_from_slice(&s);
        s.zeroize();
        Ok(())
    }

    pub fn key_len(&self) -> usize {
        self.key_len
    }

    fn add_round_key(&self, s: &mut [u8; 16], round: usize) {
        for (col, word) in self.round_keys[round * 4..round * 4 + 4].iter().enumerate() {
            for (b, k) in s[col * 4..col * 4 + 4].iter_mut().zip(word.to_be_bytes()) {
                *b ^= k;
            }
        }
    }
}

fn load_state(block: &[u8]) -> Result<[u8; 16], CryptoError> {
    block.try_into().map_err(|_| CryptoError::InvalidArg)
}

fn sub_bytes(s: &mut [u8; 16], table: &[u8; 256]) {
    for b in s.iter_mut() {
        *b = table[*b as usize];
    }
}

// State layout is column-major: s[row + 4 * col]. Row r rotates left by r.
fn shift_rows(s: &mut [u8; 16]) {
    let t = *s;
    for row in 1..4 {
        for col in 0..4 {
            s[row + 4 * col] = t[row + 4 * ((col + row) % 4)];
        }
    }
}

fn inv_shift_rows(s: &mut [u8; 16]) {
    let t = *s;
    for row in 1..4 {
        for col in 0..4 {
            s[row + 4 * ((col + row) % 4)] = t[row + 4 * col];
        }
    }
}

fn mix_columns(s: &mut [u8; 16]) {
    for col in s.chunks_exact_mut(4) {
        let (a0, a1, a2, a3) = (col[0], col[1], col[2], col[3]);
        let all = a0 ^ a1 ^ a2 ^ a3;
        col[0] ^= all ^ xtime(a0 ^ a1);
        col[1] ^= all ^ xtime(a1 ^ a2);
        col[2] ^= all ^ xtime(a2 ^ a3);
        col[3] ^= all ^ xtime(a3 ^ a0);
    }
}

fn inv_mix_columns(s: &mut [u8; 16]) {
    for col in s.chunks_exact_mut(4) {
        let (a0, a1, a2, a3) = (col[0], col[1], col[2], col[3]);
        col[0] = gf_mul(a0, 0x0e) ^ gf_mul(a1, 0x0b) ^ gf_mul(a2, 0x0d) ^ gf_mul(a3, 0x09);
        col[1] = gf_mul(a0, 0x09) ^ gf_mul(a1, 0x0e) ^ gf_mul(a2, 0x0b) ^ gf_mul(a3, 0x0d);
        col[2] = gf_mul(a0, 0x0d) ^ gf_mul(a1, 0x09) ^ gf_mul(a2, 0x0e) ^ gf_mul(a3, 0x0b);
        col[3] = gf_mul(a0, 0x0b) ^ gf_mul(a1, 0x0d) ^ gf_mul(a2, 0x09) ^ gf_mul(a3, 0x0e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(s: &str) -> Vec<u8> {
        hex::decode(s).unwrap()
    }

    /// FIPS 197 Appendix B.
    #[test]
    fn aes128_fips197_appendix_b() {
        let aes = SoftAesKey::new(&hex("2b7e151628aed2a6abf7158809cf4f3c")).unwrap();
        let mut block = hex("3243f6a8885a308d313198a2e0370734");
        aes.encrypt_block(&mut block).unwrap();
        assert_eq!(block, hex("3925841d02dc09fbdc118597196a0b32"));
        aes.decrypt_block(&mut block).unwrap();
        assert_eq!(block, hex("3243f6a8885a308d313198a2e0370734"));
    }

    /// FIPS 197 Appendix C.1 - C.3.
    #[test]
    fn aes_fips197_appendix_c() {
        let pt = hex("00112233445566778899aabbccddeeff");
        let cases = [
            ("000102030405060708090a0b0c0d0e0f", "69c4e0d86a7b0430d8cdb78070b4c55a"),
            (
                "000102030405060708090a0b0c0d0e0f1011121314151617",
                "dda97ca4864cdfe06eaf70a0ec0d7191",
            ),
            (
                "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f",
                "8ea2b7ca516745bfeafc49904b496089",
            ),
        ];
        for (key, ct) in cases {
            let aes = SoftAesKey::new(&hex(key)).unwrap();
            let mut block = pt.clone();
            aes.encrypt_block(&mut block).unwrap();
            assert_eq!(hex::encode(&block), ct);
            aes.decrypt_block(&mut block).unwrap();
            assert_eq!(block, pt);
        }
    }

    #[test]
    fn invalid_key_length_rejected() {
        for len in [0, 15, 17, 33] {
            assert!(SoftAesKey::new(&vec![0u8; len]).is_err());
        }
    }

    #[test]
    fn invalid_block_size_rejected() {
        let aes = SoftAesKey::new(&[0u8; 16]).unwrap();
        assert!(aes.encrypt_block(&mut [0u8; 8]).is_err());
        assert!(aes.decrypt_block(&mut [0u8; 32]).is_err());
    }

    #[test]
    fn sbox_inv_sbox_are_inverses() {
        for i in 0..=255u8 {
            assert_eq!(INV_SBOX[SBOX[i as usize] as usize], i);
        }
    }

    #[test]
    fn shift_rows_inverse() {
        let mut s: [u8; 16] = core::array::from_fn(|i| i as u8);
        shift_rows(&mut s);
        assert_eq!(s[1], 5);
        assert_eq!(s[2], 10);
        assert_eq!(s[3], 15);
        inv_shift_rows(&mut s);
        assert_eq!(s, core::array::from_fn(|i| i as u8));
    }
}
