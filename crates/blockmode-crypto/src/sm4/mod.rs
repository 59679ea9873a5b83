//! SM4 block cipher.
//!
//! SM4 is a 128-bit block cipher standardized by the Chinese government
//! (GB/T 32907-2016). It uses a 128-bit key and is the cipher behind the
//! `AYCF-SM4-GCM` container format. The key schedule and round function
//! come from the RustCrypto `sm4` crate; this module adapts it to
//! [`BlockCipher`].

use crate::provider::BlockCipher;
use blockmode_types::CryptoError;
use sm4::cipher::generic_array::GenericArray;
use sm4::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};

/// SM4 block size in bytes (128 bits).
pub const SM4_BLOCK_SIZE: usize = 16;

/// SM4 key size in bytes (128 bits).
pub const SM4_KEY_SIZE: usize = 16;

/// An SM4 key with precomputed round keys.
#[derive(Clone)]
pub struct Sm4Key {
    inner: sm4::Sm4,
}

impl Sm4Key {
    /// Create a new SM4 key from 16 raw bytes.
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        if key.len() != SM4_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: SM4_KEY_SIZE,
                got: key.len(),
            });
        }
        let inner = sm4::Sm4::new_from_slice(key).map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self { inner })
    }

    /// Encrypt a single 16-byte block in place.
    pub fn encrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        if block.len() != SM4_BLOCK_SIZE {
            return Err(CryptoError::InvalidArg);
        }
        self.inner
            .encrypt_block(GenericArray::from_mut_slice(block));
        Ok(())
    }

    /// Decrypt a single 16-byte block in place.
    pub fn decrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        if block.len() != SM4_BLOCK_SIZE {
            return Err(CryptoError::InvalidArg);
        }
        self.inner
            .decrypt_block(GenericArray::from_mut_slice(block));
        Ok(())
    }
}

impl BlockCipher for Sm4Key {
    fn encrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        Sm4Key::encrypt_block(self, block)
    }

    fn decrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        Sm4Key::decrypt_block(self, block)
    }
}

impl core::fmt::Debug for Sm4Key {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Sm4Key").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // GB/T 32907-2016 Appendix A, example 1.
    #[test]
    fn test_sm4_standard_vector() {
        let key = hex::decode("0123456789abcdeffedcba9876543210").unwrap();
        let sm4 = Sm4Key::new(&key).unwrap();
        let mut block = key.clone();
        sm4.encrypt_block(&mut block).unwrap();
        assert_eq!(hex::encode(&block), "681edf34d206965e86b3e94f536e4246");
        sm4.decrypt_block(&mut block).unwrap();
        assert_eq!(block, key);
    }

    #[test]
    fn test_sm4_rejects_bad_lengths() {
        assert!(matches!(
            Sm4Key::new(&[0u8; 15]),
            Err(CryptoError::InvalidKeyLength {
                expected: 16,
                got: 15
            })
        ));
        let sm4 = Sm4Key::new(&[0u8; 16]).unwrap();
        assert!(sm4.encrypt_block(&mut [0u8; 15]).is_err());
        assert!(sm4.decrypt_block(&mut [0u8; 17]).is_err());
    }
}
