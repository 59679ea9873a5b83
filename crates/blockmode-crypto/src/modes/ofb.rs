//! OFB (Output Feedback) mode of operation (NIST SP 800-38A §6.4).

use crate::aes::AesKey;
use crate::provider::{BlockCipher, BLOCK_SIZE};
use blockmode_types::CryptoError;
use zeroize::Zeroize;

/// Streaming OFB context. Encryption and decryption are the same operation.
pub struct Ofb<'k, C: BlockCipher + ?Sized> {
    cipher: &'k C,
    iv: [u8; BLOCK_SIZE],
    num: usize,
}

impl<'k, C: BlockCipher + ?Sized> Ofb<'k, C> {
    pub fn new(cipher: &'k C, iv: &[u8]) -> Result<Self, CryptoError> {
        if iv.len() != BLOCK_SIZE {
            return Err(CryptoError::InvalidIvLength);
        }
        let mut reg = [0u8; BLOCK_SIZE];
        reg.copy_from_slice(iv);
        Ok(Self {
            cipher,
            iv: reg,
            num: 0,
        })
    }

    /// Output register (the current keystream block once `num > 0`).
    pub fn iv(&self) -> &[u8; BLOCK_SIZE] {
        &self.iv
    }

    /// Keystream bytes of the current register already used.
    pub fn num(&self) -> usize {
        self.num
    }

    /// XOR `data` with the keystream in place.
    pub fn apply(&mut self, data: &mut [u8]) -> Result<(), CryptoError> {
        let mut rest = data;

        while self.num != 0 && !rest.is_empty() {
            rest[0] ^= self.iv[self.num];
            self.num = (self.num + 1) % BLOCK_SIZE;
            rest = &mut core::mem::take(&mut rest)[1..];
        }

        let mut blocks = rest.chunks_exact_mut(BLOCK_SIZE);
        for block in &mut blocks {
            self.cipher.encrypt_block(&mut self.iv)?;
            for (d, &k) in block.iter_mut().zip(self.iv.iter()) {
                *d ^= k;
            }
        }

        let tail = blocks.into_remainder();
        if !tail.is_empty() {
            self.cipher.encrypt_block(&mut self.iv)?;
            for (d, &k) in tail.iter_mut().zip(self.iv.iter()) {
                *d ^= k;
            }
            self.num = tail.len();
        }
        Ok(())
    }
}

impl<C: BlockCipher + ?Sized> Drop for Ofb<'_, C> {
    fn drop(&mut self) {
        self.iv.zeroize();
    }
}

/// Encrypt or decrypt data using OFB mode with AES (symmetric operation).
pub fn ofb_crypt(key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<(), CryptoError> {
    let cipher = AesKey::new(key)?;
    let mut ofb = Ofb::new(&cipher, iv)?;
    ofb.apply(data)
}
