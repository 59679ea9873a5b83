//! XTS (XEX-based Tweaked-codebook mode with ciphertext Stealing).
//!
//! XTS mode is designed for disk encryption and operates on data units
//! (typically 512-byte sectors). It requires two keys of equal size: one
//! encrypts the data, the other turns the 16-byte data unit number into
//! the initial tweak (IEEE Std 1619-2007).

use crate::aes::AesKey;
use crate::provider::{xor_in_place, BlockCipher, BLOCK_SIZE};
use blockmode_types::CryptoError;
use zeroize::Zeroize;

/// Multiply the tweak by the primitive element alpha (little-endian).
fn mul_alpha(tweak: &mut [u8; BLOCK_SIZE]) {
    let v = u128::from_le_bytes(*tweak);
    let carry = (v >> 127) as u8;
    *tweak = (v << 1).to_le_bytes();
    tweak[0] ^= 0x87 & 0u8.wrapping_sub(carry);
}

/// XTS context over a data key and a tweak key.
pub struct Xts<'k, C: BlockCipher + ?Sized> {
    data_key: &'k C,
    tweak_key: &'k C,
}

impl<'k, C: BlockCipher + ?Sized> Xts<'k, C> {
    pub fn new(data_key: &'k C, tweak_key: &'k C) -> Self {
        Self {
            data_key,
            tweak_key,
        }
    }

    /// Encrypt one data unit in place. `data` must be at least 16 bytes.
    pub fn encrypt(&self, tweak: &[u8; BLOCK_SIZE], data: &mut [u8]) -> Result<(), CryptoError> {
        self.process(tweak, data, true)
    }

    /// Decrypt one data unit in place. `data` must be at least 16 bytes.
    pub fn decrypt(&self, tweak: &[u8; BLOCK_SIZE], data: &mut [u8]) -> Result<(), CryptoError> {
        self.process(tweak, data, false)
    }

    fn crypt_block(
        &self,
        t: &[u8; BLOCK_SIZE],
        block: &mut [u8],
        encrypting: bool,
    ) -> Result<(), CryptoError> {
        xor_in_place(block, t);
        if encrypting {
            self.data_key.encrypt_block(block)?;
        } else {
            self.data_key.decrypt_block(block)?;
        }
        xor_in_place(block, t);
        Ok(())
    }

    fn process(
        &self,
        tweak: &[u8; BLOCK_SIZE],
        data: &mut [u8],
        encrypting: bool,
    ) -> Result<(), CryptoError> {
        let len = data.len();
        if len < BLOCK_SIZE {
            return Err(CryptoError::InvalidArg);
        }
        let residue = len % BLOCK_SIZE;

        let mut t = *tweak;
        self.tweak_key.encrypt_block(&mut t)?;

        // When stealing on decrypt, the last full block is handled with the
        // stealing step below.
        let full = if residue != 0 && !encrypting {
            len - residue - BLOCK_SIZE
        } else {
            len - residue
        };
        let mut first = true;
        for block in data[..full].chunks_exact_mut(BLOCK_SIZE) {
            if !first {
                mul_alpha(&mut t);
            }
            first = false;
            self.crypt_block(&t, block, encrypting)?;
        }

        if residue != 0 {
            if encrypting {
                // C(m-1) is already in place; steal its head for the tail.
                mul_alpha(&mut t);
                let (head, tail) = data.split_at_mut(len - residue);
                let prev = &mut head[len - residue - BLOCK_SIZE..];
                for (p, c) in prev.iter_mut().zip(tail.iter_mut()) {
                    core::mem::swap(p, c);
                }
                self.crypt_block(&t, prev, true)?;
            } else {
                let mut t_last = t;
                if !first {
                    mul_alpha(&mut t_last);
                }
                let mut t_steal = t_last;
                mul_alpha(&mut t_steal);

                let (head, tail) = data.split_at_mut(len - residue);
                let prev = &mut head[len - residue - BLOCK_SIZE..];
                self.crypt_block(&t_steal, prev, false)?;
                for (p, c) in prev.iter_mut().zip(tail.iter_mut()) {
                    core::mem::swap(p, c);
                }
                self.crypt_block(&t_last, prev, false)?;
                t_last.zeroize();
                t_steal.zeroize();
            }
        }
        t.zeroize();
        Ok(())
    }
}

/// Encrypt a data unit using XTS mode with AES.
pub fn xts_encrypt(
    key1: &[u8],
    key2: &[u8],
    tweak: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let tweak: &[u8; BLOCK_SIZE] = tweak
        .try_into()
        .map_err(|_| CryptoError::InvalidIvLength)?;
    let k1 = AesKey::new(key1)?;
    let k2 = AesKey::new(key2)?;
    let mut out = plaintext.to_vec();
    Xts::new(&k1, &k2).encrypt(tweak, &mut out)?;
    Ok(out)
}

/// Decrypt a data unit using XTS mode with AES.
pub fn xts_decrypt(
    key1: &[u8],
    key2: &[u8],
    tweak: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let tweak: &[u8; BLOCK_SIZE] = tweak
        .try_into()
        .map_err(|_| CryptoError::InvalidIvLength)?;
    let k1 = AesKey::new(key1)?;
    let k2 = AesKey::new(key2)?;
    let mut out = ciphertext.to_vec();
    Xts::new(&k1, &k2).decrypt(tweak, &mut out)?;
    Ok(out)
}
