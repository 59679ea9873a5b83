//! GHASH multiplication in GF(2^128) (NIST SP 800-38D, Section 6.4).
//!
//! Uses Shoup's table method. The default build keeps a 16-entry table
//! indexed by nibble; the `ghash-table8` feature switches to a 256-entry
//! table indexed by byte. Both tables hash identically.

use zeroize::Zeroize;

/// The reduction polynomial's top byte, positioned at bit 127.
const R: u64 = 0xe100000000000000;

// Reduction table for 4-bit GHASH: TABLE_P4[i] = i * R >> 120, where R = 0xE1 << 120.
#[cfg(not(feature = "ghash-table8"))]
const TABLE_P4: [u64; 16] = [
    0x0000000000000000,
    0x1c20000000000000,
    0x3840000000000000,
    0x2460000000000000,
    0x7080000000000000,
    0x6ca0000000000000,
    0x48c0000000000000,
    0x54e0000000000000,
    0xe100000000000000,
    0xfd20000000000000,
    0xd940000000000000,
    0xc560000000000000,
    0x9180000000000000,
    0x8da0000000000000,
    0xa9c0000000000000,
    0xb5e0000000000000,
];

/// Reduction table for 8-bit GHASH: the high word produced by shifting the
/// byte `i` out of the bottom of a field element.
#[cfg(feature = "ghash-table8")]
const TABLE_P8: [u64; 256] = build_rem8();

#[cfg(feature = "ghash-table8")]
const fn build_rem8() -> [u64; 256] {
    let mut out = [0u64; 256];
    let mut i = 0;
    while i < 256 {
        let mut h = 0u64;
        let mut l = i as u64;
        let mut k = 0;
        while k < 8 {
            let carry = l & 1;
            l = (l >> 1) | (h << 63);
            h >>= 1;
            if carry != 0 {
                h ^= R;
            }
            k += 1;
        }
        out[i] = h;
        i += 1;
    }
    out
}

#[cfg(not(feature = "ghash-table8"))]
const TABLE_LEN: usize = 16;
#[cfg(feature = "ghash-table8")]
const TABLE_LEN: usize = 256;

/// GF(2^128) element as (high, low) u64 pair.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug, Zeroize)]
pub(crate) struct Gf128 {
    h: u64,
    l: u64,
}

impl Gf128 {
    pub(crate) fn from_bytes(b: &[u8; 16]) -> Self {
        let mut hi = [0u8; 8];
        let mut lo = [0u8; 8];
        hi.copy_from_slice(&b[..8]);
        lo.copy_from_slice(&b[8..]);
        Self {
            h: u64::from_be_bytes(hi),
            l: u64::from_be_bytes(lo),
        }
    }

    pub(crate) fn to_bytes(self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[..8].copy_from_slice(&self.h.to_be_bytes());
        out[8..].copy_from_slice(&self.l.to_be_bytes());
        out
    }

    fn xor(self, other: Self) -> Self {
        Self {
            h: self.h ^ other.h,
            l: self.l ^ other.l,
        }
    }

    /// Multiply by x (one right shift in GCM's reflected bit order).
    fn mul_x(self) -> Self {
        let carry = self.l & 1;
        let mut out = Self {
            h: self.h >> 1,
            l: (self.l >> 1) | (self.h << 63),
        };
        // Constant-time conditional reduction.
        out.h ^= R & 0u64.wrapping_sub(carry);
        out
    }

    #[cfg(not(feature = "ghash-table8"))]
    fn shr4(self) -> Self {
        Self {
            h: self.h >> 4,
            l: (self.l >> 4) | (self.h << 60),
        }
    }

    #[cfg(feature = "ghash-table8")]
    fn shr8(self) -> Self {
        Self {
            h: self.h >> 8,
            l: (self.l >> 8) | (self.h << 56),
        }
    }
}

/// Precomputed multiples of the hash key H.
pub(crate) struct GhashTable {
    table: [Gf128; TABLE_LEN],
}

impl GhashTable {
    pub(crate) fn new(h: &[u8; 16]) -> Self {
        let mut table = [Gf128::default(); TABLE_LEN];
        let top = TABLE_LEN >> 1;
        table[top] = Gf128::from_bytes(h);

        // Single-bit entries: table[top >> k] = H * x^k.
        let mut idx = top >> 1;
        while idx > 0 {
            table[idx] = table[idx << 1].mul_x();
            idx >>= 1;
        }

        // Every other entry is the XOR of its single-bit components.
        for i in 2..TABLE_LEN {
            if !i.is_power_of_two() {
                let msb = 1usize << (usize::BITS - 1 - i.leading_zeros());
                table[i] = table[msb].xor(table[i ^ msb]);
            }
        }

        Self { table }
    }

    /// Multiply `x` by H.
    #[cfg(not(feature = "ghash-table8"))]
    fn mul(&self, x: Gf128) -> Gf128 {
        let mut z = Gf128::default();
        for &byte in x.to_bytes().iter().rev() {
            // Low nibble first: it carries the higher powers of x.
            for nibble in [byte & 0x0f, byte >> 4] {
                let rem = (z.l & 0x0f) as usize;
                z = z.shr4();
                z.h ^= TABLE_P4[rem];
                z = z.xor(self.table[nibble as usize]);
            }
        }
        z
    }

    #[cfg(feature = "ghash-table8")]
    fn mul(&self, x: Gf128) -> Gf128 {
        let mut z = Gf128::default();
        for &byte in x.to_bytes().iter().rev() {
            let rem = (z.l & 0xff) as usize;
            z = z.shr8();
            z.h ^= TABLE_P8[rem];
            z = z.xor(self.table[byte as usize]);
        }
        z
    }

    /// Xi = Xi * H, with Xi kept as bytes.
    pub(crate) fn gmult(&self, xi: &mut [u8; 16]) {
        *xi = self.mul(Gf128::from_bytes(xi)).to_bytes();
    }

    /// GHASH step: state = (state XOR block) * H.
    pub(crate) fn ghash_block(&self, state: &mut Gf128, block: &[u8; 16]) {
        *state = self.mul(state.xor(Gf128::from_bytes(block)));
    }

    /// GHASH over variable-length data (pad to block boundary).
    pub(crate) fn ghash_data(&self, state: &mut Gf128, data: &[u8]) {
        for chunk in data.chunks(16) {
            let mut block = [0u8; 16];
            block[..chunk.len()].copy_from_slice(chunk);
            self.ghash_block(state, &block);
        }
    }
}

impl Drop for GhashTable {
    fn drop(&mut self) {
        self.table.zeroize();
    }
}
