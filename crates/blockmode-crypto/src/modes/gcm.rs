//! GCM (Galois/Counter Mode) authenticated encryption.
//!
//! Implements GCM as defined in NIST SP 800-38D.
//! Provides authenticated encryption with associated data (AEAD).
//! Supports AES-GCM and SM4-GCM via the `BlockCipher` trait.
//!
//! [`Gcm`] is a streaming context: `set_iv`, any number of `aad` calls,
//! any number of `encrypt` (or `decrypt`) calls, then `finish` or `tag`.
//! Decrypted bytes must not be released until `finish` has succeeded.

use super::ghash::{Gf128, GhashTable};
use crate::aes::AesKey;
use crate::provider::{inc32, xor_in_place, BlockCipher, BLOCK_SIZE};
use blockmode_types::CryptoError;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

const GCM_TAG_SIZE: usize = 16;

/// Shortest tag `finish` will verify.
pub const GCM_MIN_TAG_SIZE: usize = 4;

/// Upper bound on associated data per message, in bytes (2^64 bits).
const MAX_AAD_LEN: u64 = 1 << 61;

/// Upper bound on message length, in bytes (2^39 - 256 bits).
const MAX_MSG_LEN: u64 = (1 << 36) - 32;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum State {
    NoIv,
    Active,
    Finished,
    Poisoned,
}

/// Streaming GCM context bound to a block cipher.
pub struct Gcm<'k, C: BlockCipher + ?Sized> {
    cipher: &'k C,
    table: GhashTable,
    yi: [u8; BLOCK_SIZE],
    eki: [u8; BLOCK_SIZE],
    ek0: [u8; BLOCK_SIZE],
    xi: [u8; BLOCK_SIZE],
    tag: [u8; GCM_TAG_SIZE],
    len_aad: u64,
    len_msg: u64,
    ares: usize,
    mres: usize,
    state: State,
}

impl<'k, C: BlockCipher + ?Sized> Gcm<'k, C> {
    /// Derive the hash key H = E(0^128) and build its table.
    pub fn new(cipher: &'k C) -> Result<Self, CryptoError> {
        let mut h = [0u8; BLOCK_SIZE];
        cipher.encrypt_block(&mut h)?;
        let table = GhashTable::new(&h);
        h.zeroize();
        Ok(Self {
            cipher,
            table,
            yi: [0u8; BLOCK_SIZE],
            eki: [0u8; BLOCK_SIZE],
            ek0: [0u8; BLOCK_SIZE],
            xi: [0u8; BLOCK_SIZE],
            tag: [0u8; GCM_TAG_SIZE],
            len_aad: 0,
            len_msg: 0,
            ares: 0,
            mres: 0,
            state: State::NoIv,
        })
    }

    /// Start a new message. Any IV length except zero is accepted; 12-byte
    /// IVs take the fast path.
    pub fn set_iv(&mut self, iv: &[u8]) -> Result<(), CryptoError> {
        if iv.is_empty() {
            return Err(CryptoError::InvalidIvLength);
        }
        self.xi = [0u8; BLOCK_SIZE];
        self.len_aad = 0;
        self.len_msg = 0;
        self.ares = 0;
        self.mres = 0;

        let mut y0 = [0u8; BLOCK_SIZE];
        if iv.len() == 12 {
            y0[..12].copy_from_slice(iv);
            y0[15] = 1;
        } else {
            let mut state = Gf128::default();
            self.table.ghash_data(&mut state, iv);
            let mut len_block = [0u8; BLOCK_SIZE];
            len_block[8..].copy_from_slice(&((iv.len() as u64).wrapping_mul(8)).to_be_bytes());
            self.table.ghash_block(&mut state, &len_block);
            y0 = state.to_bytes();
        }

        self.ek0 = y0;
        self.cipher.encrypt_block(&mut self.ek0)?;
        inc32(&mut y0);
        self.yi = y0;
        self.state = State::Active;
        Ok(())
    }

    fn require_active(&self) -> Result<(), CryptoError> {
        match self.state {
            State::Active => Ok(()),
            _ => Err(CryptoError::SequenceViolation),
        }
    }

    /// Absorb associated data. Must precede all message bytes.
    pub fn aad(&mut self, data: &[u8]) -> Result<(), CryptoError> {
        self.require_active()?;
        if self.len_msg != 0 {
            return Err(CryptoError::SequenceViolation);
        }
        let total = self.len_aad + data.len() as u64;
        if total > MAX_AAD_LEN {
            return Err(CryptoError::InputOverflow);
        }
        self.len_aad = total;

        let mut rest = data;
        let mut n = self.ares;
        if n != 0 {
            while n != 0 && !rest.is_empty() {
                self.xi[n] ^= rest[0];
                rest = &rest[1..];
                n = (n + 1) % BLOCK_SIZE;
            }
            if n == 0 {
                self.table.gmult(&mut self.xi);
            } else {
                self.ares = n;
                return Ok(());
            }
        }

        let mut blocks = rest.chunks_exact(BLOCK_SIZE);
        for block in &mut blocks {
            xor_in_place(&mut self.xi, block);
            self.table.gmult(&mut self.xi);
        }
        let tail = blocks.remainder();
        xor_in_place(&mut self.xi, tail);
        self.ares = tail.len();
        Ok(())
    }

    /// Encrypt in place and hash the produced ciphertext.
    pub fn encrypt(&mut self, data: &mut [u8]) -> Result<(), CryptoError> {
        self.crypt(data, true, false)
    }

    /// Hash the ciphertext and decrypt it in place.
    pub fn decrypt(&mut self, data: &mut [u8]) -> Result<(), CryptoError> {
        self.crypt(data, false, false)
    }

    /// [`Gcm::encrypt`] with whole blocks sent through
    /// [`BlockCipher::ctr32_encrypt_blocks`].
    pub fn encrypt_ctr32(&mut self, data: &mut [u8]) -> Result<(), CryptoError> {
        self.crypt(data, true, true)
    }

    /// [`Gcm::decrypt`] with whole blocks sent through
    /// [`BlockCipher::ctr32_encrypt_blocks`].
    pub fn decrypt_ctr32(&mut self, data: &mut [u8]) -> Result<(), CryptoError> {
        self.crypt(data, false, true)
    }

    fn crypt(&mut self, data: &mut [u8], encrypting: bool, bulk: bool) -> Result<(), CryptoError> {
        self.require_active()?;
        if data.is_empty() {
            return Ok(());
        }
        let total = self.len_msg + data.len() as u64;
        if total > MAX_MSG_LEN {
            return Err(CryptoError::InputOverflow);
        }
        self.len_msg = total;

        // First message byte closes the AAD.
        if self.ares != 0 {
            self.table.gmult(&mut self.xi);
            self.ares = 0;
        }

        let mut rest = data;
        let mut n = self.mres;
        if n != 0 {
            while n != 0 && !rest.is_empty() {
                self.crypt_byte(&mut rest[0], n, encrypting);
                rest = &mut core::mem::take(&mut rest)[1..];
                n = (n + 1) % BLOCK_SIZE;
            }
            if n == 0 {
                self.table.gmult(&mut self.xi);
            } else {
                self.mres = n;
                return Ok(());
            }
        }

        let whole = rest.len() / BLOCK_SIZE * BLOCK_SIZE;
        let (blocks, tail) = rest.split_at_mut(whole);
        if bulk {
            self.bulk_blocks(blocks, encrypting)?;
        } else {
            for block in blocks.chunks_exact_mut(BLOCK_SIZE) {
                self.eki = self.yi;
                self.cipher.encrypt_block(&mut self.eki)?;
                inc32(&mut self.yi);
                if !encrypting {
                    xor_in_place(&mut self.xi, block);
                }
                xor_in_place(block, &self.eki);
                if encrypting {
                    xor_in_place(&mut self.xi, block);
                }
                self.table.gmult(&mut self.xi);
            }
        }

        if !tail.is_empty() {
            self.eki = self.yi;
            self.cipher.encrypt_block(&mut self.eki)?;
            inc32(&mut self.yi);
            for (i, byte) in tail.iter_mut().enumerate() {
                self.crypt_byte(byte, i, encrypting);
            }
        }
        self.mres = tail.len();
        Ok(())
    }

    fn crypt_byte(&mut self, byte: &mut u8, n: usize, encrypting: bool) {
        let input = *byte;
        *byte = input ^ self.eki[n];
        self.xi[n] ^= if encrypting { *byte } else { input };
    }

    fn bulk_blocks(&mut self, blocks: &mut [u8], encrypting: bool) -> Result<(), CryptoError> {
        if blocks.is_empty() {
            return Ok(());
        }
        if !encrypting {
            self.hash_blocks(blocks);
        }
        self.cipher.ctr32_encrypt_blocks(blocks, &self.yi)?;
        if encrypting {
            self.hash_blocks(blocks);
        }
        let count = (blocks.len() / BLOCK_SIZE) as u32;
        let ctr = u32::from_be_bytes([self.yi[12], self.yi[13], self.yi[14], self.yi[15]])
            .wrapping_add(count);
        self.yi[12..].copy_from_slice(&ctr.to_be_bytes());
        Ok(())
    }

    fn hash_blocks(&mut self, blocks: &[u8]) {
        for block in blocks.chunks_exact(BLOCK_SIZE) {
            xor_in_place(&mut self.xi, block);
            self.table.gmult(&mut self.xi);
        }
    }

    /// Fold the length block exactly once and cache the full tag.
    fn compute_tag(&mut self) -> Result<[u8; GCM_TAG_SIZE], CryptoError> {
        match self.state {
            State::Finished => return Ok(self.tag),
            State::Active => {}
            State::NoIv | State::Poisoned => return Err(CryptoError::SequenceViolation),
        }
        if self.ares != 0 || self.mres != 0 {
            self.table.gmult(&mut self.xi);
            self.ares = 0;
            self.mres = 0;
        }
        let mut len_block = [0u8; BLOCK_SIZE];
        len_block[..8].copy_from_slice(&(self.len_aad << 3).to_be_bytes());
        len_block[8..].copy_from_slice(&(self.len_msg << 3).to_be_bytes());
        xor_in_place(&mut self.xi, &len_block);
        self.table.gmult(&mut self.xi);

        let mut tag = self.xi;
        xor_in_place(&mut tag, &self.ek0);
        self.tag = tag;
        self.state = State::Finished;
        Ok(tag)
    }

    /// Verify `tag` (4 to 16 bytes) in constant time.
    ///
    /// On mismatch the context is poisoned until the next `set_iv`.
    pub fn finish(&mut self, tag: &[u8]) -> Result<(), CryptoError> {
        if !(GCM_MIN_TAG_SIZE..=GCM_TAG_SIZE).contains(&tag.len()) {
            return Err(CryptoError::InvalidTagLength);
        }
        let computed = self.compute_tag()?;
        if computed[..tag.len()].ct_eq(tag).unwrap_u8() != 1 {
            self.state = State::Poisoned;
            return Err(CryptoError::AeadTagVerifyFail);
        }
        Ok(())
    }

    /// Write up to 16 tag bytes into `out`; returns how many were written.
    pub fn tag(&mut self, out: &mut [u8]) -> Result<usize, CryptoError> {
        let computed = self.compute_tag()?;
        let n = out.len().min(GCM_TAG_SIZE);
        out[..n].copy_from_slice(&computed[..n]);
        Ok(n)
    }
}

impl<C: BlockCipher + ?Sized> Drop for Gcm<'_, C> {
    fn drop(&mut self) {
        self.eki.zeroize();
        self.ek0.zeroize();
        self.xi.zeroize();
        self.tag.zeroize();
    }
}

/// Internal one-shot GCM encrypt/decrypt (generic over block cipher).
fn gcm_crypt_generic<C: BlockCipher + ?Sized>(
    cipher: &C,
    nonce: &[u8],
    aad: &[u8],
    input: &[u8],
    encrypting: bool,
) -> Result<(Vec<u8>, [u8; GCM_TAG_SIZE]), CryptoError> {
    let mut gcm = Gcm::new(cipher)?;
    gcm.set_iv(nonce)?;
    gcm.aad(aad)?;
    let mut output = input.to_vec();
    if encrypting {
        gcm.encrypt_ctr32(&mut output)?;
    } else {
        gcm.decrypt_ctr32(&mut output)?;
    }
    let mut tag = [0u8; GCM_TAG_SIZE];
    gcm.tag(&mut tag)?;
    Ok((output, tag))
}

fn gcm_open<C: BlockCipher + ?Sized>(
    cipher: &C,
    nonce: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.len() < GCM_TAG_SIZE {
        return Err(CryptoError::InvalidArg);
    }
    let ct_len = ciphertext.len() - GCM_TAG_SIZE;
    let (ct_data, received_tag) = ciphertext.split_at(ct_len);

    let (mut plaintext, computed_tag) = gcm_crypt_generic(cipher, nonce, aad, ct_data, false)?;

    // Constant-time tag comparison
    if computed_tag[..].ct_eq(received_tag).unwrap_u8() != 1 {
        plaintext.zeroize();
        return Err(CryptoError::AeadTagVerifyFail);
    }

    Ok(plaintext)
}

/// Encrypt and authenticate data using AES-GCM.
/// Returns ciphertext || 16-byte tag.
pub fn gcm_encrypt(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = AesKey::new(key)?;
    let (mut ct, tag) = gcm_crypt_generic(&cipher, nonce, aad, plaintext, true)?;
    ct.extend_from_slice(&tag);
    Ok(ct)
}

/// Decrypt and verify data using AES-GCM.
/// `ciphertext` includes the appended 16-byte tag.
/// Returns plaintext on success, or error if authentication fails.
pub fn gcm_decrypt(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = AesKey::new(key)?;
    gcm_open(&cipher, nonce, aad, ciphertext)
}

/// Encrypt and authenticate data using SM4-GCM.
/// Returns ciphertext || 16-byte tag.
#[cfg(feature = "sm4")]
pub fn sm4_gcm_encrypt(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = crate::sm4::Sm4Key::new(key)?;
    let (mut ct, tag) = gcm_crypt_generic(&cipher, nonce, aad, plaintext, true)?;
    ct.extend_from_slice(&tag);
    Ok(ct)
}

/// Decrypt and verify data using SM4-GCM.
/// `ciphertext` includes the appended 16-byte tag.
#[cfg(feature = "sm4")]
pub fn sm4_gcm_decrypt(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = crate::sm4::Sm4Key::new(key)?;
    gcm_open(&cipher, nonce, aad, ciphertext)
}
