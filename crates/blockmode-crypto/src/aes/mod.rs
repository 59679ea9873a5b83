//! AES (Advanced Encryption Standard) block cipher.
//!
//! Provides AES-128, AES-192, and AES-256 single-block operations. For
//! modes of operation (CBC, GCM, CTR, etc.) see the [`modes`](crate::modes)
//! module.

mod soft;

use crate::provider::BlockCipher;
use blockmode_types::CryptoError;

/// AES block size in bytes (128 bits).
pub const AES_BLOCK_SIZE: usize = 16;

/// An AES key with precomputed round keys.
#[derive(Clone)]
pub struct AesKey {
    inner: soft::SoftAesKey,
}

impl AesKey {
    /// Create a new AES key from raw bytes.
    ///
    /// Accepts 16, 24, or 32-byte keys for AES-128, AES-192, and AES-256.
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self {
            inner: soft::SoftAesKey::new(key)?,
        })
    }

    /// Encrypt a single 16-byte block in place.
    pub fn encrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        self.inner.encrypt_block(block)
    }

    /// Decrypt a single 16-byte block in place.
    pub fn decrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        self.inner.decrypt_block(block)
    }

    /// Return the key length in bytes.
    pub fn key_len(&self) -> usize {
        self.inner.key_len()
    }
}

impl BlockCipher for AesKey {
    fn encrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        self.inner.encrypt_block(block)
    }

    fn decrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        self.inner.decrypt_block(block)
    }
}

impl core::fmt::Debug for AesKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AesKey")
            .field("key_len", &self.key_len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trait_and_inherent_agree() {
        let key = AesKey::new(&[0x11u8; 32]).unwrap();
        let mut a = [0x22u8; 16];
        let mut b = a;
        key.encrypt_block(&mut a).unwrap();
        BlockCipher::encrypt_block(&key, &mut b).unwrap();
        assert_eq!(a, b);
        assert_eq!(key.key_len(), 32);
    }

    #[test]
    fn test_debug_hides_round_keys() {
        let key = AesKey::new(&[0u8; 16]).unwrap();
        let s = format!("{key:?}");
        assert!(s.contains("key_len: 16"));
        assert!(!s.contains("round_keys"));
    }
}
