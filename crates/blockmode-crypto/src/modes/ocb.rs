//! OCB (Offset Codebook) authenticated encryption, RFC 7253.
//!
//! Key-dependent precomputation lives in [`OcbKey`], which is immutable
//! once built and can back any number of concurrent [`Ocb`] sessions.

use crate::provider::{xor_in_place, BlockCipher, BLOCK_SIZE};
use blockmode_types::CryptoError;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

/// Number of precomputed `L_i` values. Block indices are `u64`, so
/// `ntz(i) < 64` always.
const L_TABLE: usize = 64;

const MAX_NONCE_LEN: usize = 15;
const MAX_TAG_LEN: usize = 16;

/// Multiply by x in GF(2^128) with the OCB polynomial (big-endian).
fn double(block: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
    let v = u128::from_be_bytes(*block);
    let carry = (v >> 127) as u8;
    let mut out = (v << 1).to_be_bytes();
    out[BLOCK_SIZE - 1] ^= 0x87 & 0u8.wrapping_sub(carry);
    out
}

/// Per-key OCB state: `L_*`, `L_$` and `L_0 .. L_63`.
pub struct OcbKey<'k, C: BlockCipher + ?Sized> {
    cipher: &'k C,
    l_star: [u8; BLOCK_SIZE],
    l_dollar: [u8; BLOCK_SIZE],
    l: [[u8; BLOCK_SIZE]; L_TABLE],
}

impl<'k, C: BlockCipher + ?Sized> OcbKey<'k, C> {
    pub fn new(cipher: &'k C) -> Result<Self, CryptoError> {
        let mut l_star = [0u8; BLOCK_SIZE];
        cipher.encrypt_block(&mut l_star)?;
        let l_dollar = double(&l_star);
        let mut l = [[0u8; BLOCK_SIZE]; L_TABLE];
        l[0] = double(&l_dollar);
        for i in 1..L_TABLE {
            l[i] = double(&l[i - 1]);
        }
        Ok(Self {
            cipher,
            l_star,
            l_dollar,
            l,
        })
    }

    fn l_for(&self, index: u64) -> &[u8; BLOCK_SIZE] {
        &self.l[index.trailing_zeros() as usize]
    }
}

impl<C: BlockCipher + ?Sized> Clone for OcbKey<'_, C> {
    fn clone(&self) -> Self {
        Self {
            cipher: self.cipher,
            l_star: self.l_star,
            l_dollar: self.l_dollar,
            l: self.l,
        }
    }
}

impl<C: BlockCipher + ?Sized> Drop for OcbKey<'_, C> {
    fn drop(&mut self) {
        self.l_star.zeroize();
        self.l_dollar.zeroize();
        self.l.zeroize();
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum State {
    NoIv,
    Active,
    Finished,
    Poisoned,
}

/// One OCB message in progress.
pub struct Ocb<'a, 'k, C: BlockCipher + ?Sized> {
    key: &'a OcbKey<'k, C>,
    offset: [u8; BLOCK_SIZE],
    offset_aad: [u8; BLOCK_SIZE],
    sum: [u8; BLOCK_SIZE],
    checksum: [u8; BLOCK_SIZE],
    blocks_hashed: u64,
    blocks_processed: u64,
    aad_closed: bool,
    msg_closed: bool,
    tag_len: usize,
    state: State,
}

impl<'a, 'k, C: BlockCipher + ?Sized> Ocb<'a, 'k, C> {
    pub fn new(key: &'a OcbKey<'k, C>) -> Self {
        Self {
            key,
            offset: [0u8; BLOCK_SIZE],
            offset_aad: [0u8; BLOCK_SIZE],
            sum: [0u8; BLOCK_SIZE],
            checksum: [0u8; BLOCK_SIZE],
            blocks_hashed: 0,
            blocks_processed: 0,
            aad_closed: false,
            msg_closed: false,
            tag_len: MAX_TAG_LEN,
            state: State::NoIv,
        }
    }

    /// Start a message with a 1..=15 byte nonce and a 1..=16 byte tag.
    pub fn set_iv(&mut self, nonce: &[u8], tag_len: usize) -> Result<(), CryptoError> {
        if nonce.is_empty() || nonce.len() > MAX_NONCE_LEN {
            return Err(CryptoError::InvalidIvLength);
        }
        if tag_len == 0 || tag_len > MAX_TAG_LEN {
            return Err(CryptoError::InvalidTagLength);
        }

        let mut block = [0u8; BLOCK_SIZE];
        block[0] = (((tag_len * 8) % 128) as u8) << 1;
        block[BLOCK_SIZE - 1 - nonce.len()] |= 1;
        block[BLOCK_SIZE - nonce.len()..].copy_from_slice(nonce);
        let bottom = (block[BLOCK_SIZE - 1] & 0x3f) as u32;
        block[BLOCK_SIZE - 1] &= 0xc0;

        let mut ktop = block;
        self.key.cipher.encrypt_block(&mut ktop)?;

        // Stretch = Ktop || (Ktop[0..8] ^ Ktop[1..9]); take 128 bits from `bottom`.
        let hi = u128::from_be_bytes(ktop);
        let mut tail = [0u8; 8];
        for (i, t) in tail.iter_mut().enumerate() {
            *t = ktop[i] ^ ktop[i + 1];
        }
        let lo = u64::from_be_bytes(tail);
        let offset = if bottom == 0 {
            hi
        } else {
            (hi << bottom) | (lo >> (64 - bottom)) as u128
        };
        ktop.zeroize();

        self.offset = offset.to_be_bytes();
        self.offset_aad = [0u8; BLOCK_SIZE];
        self.sum = [0u8; BLOCK_SIZE];
        self.checksum = [0u8; BLOCK_SIZE];
        self.blocks_hashed = 0;
        self.blocks_processed = 0;
        self.aad_closed = false;
        self.msg_closed = false;
        self.tag_len = tag_len;
        self.state = State::Active;
        Ok(())
    }

    fn require_active(&self) -> Result<(), CryptoError> {
        match self.state {
            State::Active => Ok(()),
            _ => Err(CryptoError::SequenceViolation),
        }
    }

    /// Hash associated data. A partial final block closes the AAD.
    pub fn aad(&mut self, data: &[u8]) -> Result<(), CryptoError> {
        self.require_active()?;
        if self.aad_closed {
            return Err(CryptoError::SequenceViolation);
        }
        let cipher = self.key.cipher;

        let mut blocks = data.chunks_exact(BLOCK_SIZE);
        for block in &mut blocks {
            self.blocks_hashed += 1;
            xor_in_place(&mut self.offset_aad, self.key.l_for(self.blocks_hashed));
            let mut tmp = self.offset_aad;
            xor_in_place(&mut tmp, block);
            cipher.encrypt_block(&mut tmp)?;
            xor_in_place(&mut self.sum, &tmp);
        }

        let last = blocks.remainder();
        if !last.is_empty() {
            xor_in_place(&mut self.offset_aad, &self.key.l_star);
            let mut tmp = [0u8; BLOCK_SIZE];
            tmp[..last.len()].copy_from_slice(last);
            tmp[last.len()] = 0x80;
            xor_in_place(&mut tmp, &self.offset_aad);
            cipher.encrypt_block(&mut tmp)?;
            xor_in_place(&mut self.sum, &tmp);
            self.aad_closed = true;
        }
        Ok(())
    }

    /// Encrypt in place. A partial final block closes the message.
    pub fn encrypt(&mut self, data: &mut [u8]) -> Result<(), CryptoError> {
        self.crypt(data, true)
    }

    /// Decrypt in place. A partial final block closes the message.
    pub fn decrypt(&mut self, data: &mut [u8]) -> Result<(), CryptoError> {
        self.crypt(data, false)
    }

    fn crypt(&mut self, data: &mut [u8], encrypting: bool) -> Result<(), CryptoError> {
        self.require_active()?;
        if self.msg_closed {
            return Err(CryptoError::SequenceViolation);
        }
        let cipher = self.key.cipher;

        let mut blocks = data.chunks_exact_mut(BLOCK_SIZE);
        for block in &mut blocks {
            self.blocks_processed += 1;
            xor_in_place(&mut self.offset, self.key.l_for(self.blocks_processed));
            if encrypting {
                xor_in_place(&mut self.checksum, block);
            }
            xor_in_place(block, &self.offset);
            if encrypting {
                cipher.encrypt_block(block)?;
            } else {
                cipher.decrypt_block(block)?;
            }
            xor_in_place(block, &self.offset);
            if !encrypting {
                xor_in_place(&mut self.checksum, block);
            }
        }

        let last = blocks.into_remainder();
        if !last.is_empty() {
            xor_in_place(&mut self.offset, &self.key.l_star);
            let mut pad = self.offset;
            cipher.encrypt_block(&mut pad)?;
            if encrypting {
                xor_in_place(&mut self.checksum, last);
            }
            xor_in_place(last, &pad);
            if !encrypting {
                xor_in_place(&mut self.checksum, last);
            }
            self.checksum[last.len()] ^= 0x80;
            pad.zeroize();
            self.msg_closed = true;
        }
        Ok(())
    }

    fn compute_tag(&mut self) -> Result<[u8; BLOCK_SIZE], CryptoError> {
        match self.state {
            State::Active | State::Finished => {}
            State::NoIv | State::Poisoned => return Err(CryptoError::SequenceViolation),
        }
        let mut tag = self.checksum;
        xor_in_place(&mut tag, &self.offset);
        xor_in_place(&mut tag, &self.key.l_dollar);
        self.key.cipher.encrypt_block(&mut tag)?;
        xor_in_place(&mut tag, &self.sum);
        self.state = State::Finished;
        Ok(tag)
    }

    /// Write `min(tag_len, out.len())` tag bytes; returns how many.
    pub fn tag(&mut self, out: &mut [u8]) -> Result<usize, CryptoError> {
        let computed = self.compute_tag()?;
        let n = out.len().min(self.tag_len);
        out[..n].copy_from_slice(&computed[..n]);
        Ok(n)
    }

    /// Verify a `tag_len`-byte tag in constant time.
    ///
    /// On mismatch the session is poisoned until the next `set_iv`.
    pub fn finish(&mut self, tag: &[u8]) -> Result<(), CryptoError> {
        if tag.len() != self.tag_len {
            return Err(CryptoError::InvalidTagLength);
        }
        let computed = self.compute_tag()?;
        if computed[..self.tag_len].ct_eq(tag).unwrap_u8() != 1 {
            self.state = State::Poisoned;
            return Err(CryptoError::AeadTagVerifyFail);
        }
        Ok(())
    }
}

impl<C: BlockCipher + ?Sized> Drop for Ocb<'_, '_, C> {
    fn drop(&mut self) {
        self.offset.zeroize();
        self.offset_aad.zeroize();
        self.sum.zeroize();
        self.checksum.zeroize();
    }
}
