//! Trait-based provider mechanism for block ciphers.
//!
//! Modes of operation never hold key material themselves. They borrow a
//! key schedule through [`BlockCipher`], so a software, hardware or
//! vectorised backend can be swapped in without touching the modes.

use blockmode_types::CryptoError;

/// Block size in bytes of every cipher driven by this crate.
pub const BLOCK_SIZE: usize = 16;

/// A 128-bit block cipher bound to an expanded key (e.g., AES, SM4).
pub trait BlockCipher: Send + Sync {
    /// Block size in bytes.
    fn block_size(&self) -> usize {
        BLOCK_SIZE
    }

    /// Encrypt a single block in-place.
    fn encrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError>;

    /// Decrypt a single block in-place.
    fn decrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError>;

    /// XOR whole blocks of `data` with `E(counter + i)`.
    ///
    /// Only the low 32 bits of the counter (bytes 12..16, big-endian)
    /// advance and they wrap at 2^32; bytes 0..12 are never modified.
    /// `counter` itself is left untouched. Backends with a multi-block CTR
    /// primitive should override this.
    fn ctr32_encrypt_blocks(&self, data: &mut [u8], counter: &[u8; 16]) -> Result<(), CryptoError> {
        if data.len() % BLOCK_SIZE != 0 {
            return Err(CryptoError::InvalidArg);
        }
        let mut ctr = *counter;
        for chunk in data.chunks_exact_mut(BLOCK_SIZE) {
            let mut ks = ctr;
            self.encrypt_block(&mut ks)?;
            xor_in_place(chunk, &ks);
            inc32(&mut ctr);
        }
        Ok(())
    }

    /// CCM bulk encryption: for each whole block, fold the plaintext into
    /// `cmac` (CBC-MAC) and then XOR it with `E(counter + i)`.
    ///
    /// The counter advances in its low 64 bits. `counter` itself is left
    /// untouched.
    fn ccm64_encrypt_blocks(
        &self,
        data: &mut [u8],
        counter: &[u8; 16],
        cmac: &mut [u8; 16],
    ) -> Result<(), CryptoError> {
        if data.len() % BLOCK_SIZE != 0 {
            return Err(CryptoError::InvalidArg);
        }
        let mut ctr = *counter;
        for chunk in data.chunks_exact_mut(BLOCK_SIZE) {
            xor_in_place(cmac, chunk);
            self.encrypt_block(cmac)?;
            let mut ks = ctr;
            self.encrypt_block(&mut ks)?;
            xor_in_place(chunk, &ks);
            inc64(&mut ctr);
        }
        Ok(())
    }

    /// CCM bulk decryption: XOR each whole block with `E(counter + i)` and
    /// fold the recovered plaintext into `cmac`.
    fn ccm64_decrypt_blocks(
        &self,
        data: &mut [u8],
        counter: &[u8; 16],
        cmac: &mut [u8; 16],
    ) -> Result<(), CryptoError> {
        if data.len() % BLOCK_SIZE != 0 {
            return Err(CryptoError::InvalidArg);
        }
        let mut ctr = *counter;
        for chunk in data.chunks_exact_mut(BLOCK_SIZE) {
            let mut ks = ctr;
            self.encrypt_block(&mut ks)?;
            xor_in_place(chunk, &ks);
            xor_in_place(cmac, chunk);
            self.encrypt_block(cmac)?;
            inc64(&mut ctr);
        }
        Ok(())
    }
}

impl<T: BlockCipher + ?Sized> BlockCipher for &T {
    fn block_size(&self) -> usize {
        (**self).block_size()
    }

    fn encrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        (**self).encrypt_block(block)
    }

    fn decrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        (**self).decrypt_block(block)
    }

    fn ctr32_encrypt_blocks(&self, data: &mut [u8], counter: &[u8; 16]) -> Result<(), CryptoError> {
        (**self).ctr32_encrypt_blocks(data, counter)
    }

    fn ccm64_encrypt_blocks(
        &self,
        data: &mut [u8],
        counter: &[u8; 16],
        cmac: &mut [u8; 16],
    ) -> Result<(), CryptoError> {
        (**self).ccm64_encrypt_blocks(data, counter, cmac)
    }

    fn ccm64_decrypt_blocks(
        &self,
        data: &mut [u8],
        counter: &[u8; 16],
        cmac: &mut [u8; 16],
    ) -> Result<(), CryptoError> {
        (**self).ccm64_decrypt_blocks(data, counter, cmac)
    }
}

/// XOR `src` into the front of `dst` (`dst.len() >= src.len()` is not
/// required; the shorter length wins).
#[inline]
pub(crate) fn xor_in_place(dst: &mut [u8], src: &[u8]) {
    for (d, &s) in dst.iter_mut().zip(src.iter()) {
        *d ^= s;
    }
}

/// Increment the last 4 bytes of a 16-byte counter (big-endian INC32).
#[inline]
pub(crate) fn inc32(counter: &mut [u8; 16]) {
    let ctr =
        u32::from_be_bytes([counter[12], counter[13], counter[14], counter[15]]).wrapping_add(1);
    counter[12..16].copy_from_slice(&ctr.to_be_bytes());
}

/// Increment the last 8 bytes of a 16-byte counter (big-endian INC64).
#[inline]
pub(crate) fn inc64(counter: &mut [u8; 16]) {
    let mut lo = [0u8; 8];
    lo.copy_from_slice(&counter[8..16]);
    let ctr = u64::from_be_bytes(lo).wrapping_add(1);
    counter[8..16].copy_from_slice(&ctr.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Toy cipher: XOR with a constant. Enough to exercise the provided
    /// multi-block methods against their per-block definitions.
    struct XorCipher(u8);

    impl BlockCipher for XorCipher {
        fn encrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
            if block.len() != BLOCK_SIZE {
                return Err(CryptoError::InvalidArg);
            }
            block.iter_mut().for_each(|b| *b ^= self.0);
            Ok(())
        }

        fn decrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
            self.encrypt_block(block)
        }
    }

    #[test]
    fn test_inc32_wraps_without_carry() {
        let mut ctr = [0xffu8; 16];
        inc32(&mut ctr);
        assert_eq!(&ctr[..12], &[0xffu8; 12]);
        assert_eq!(&ctr[12..], &[0u8; 4]);
    }

    #[test]
    fn test_inc64_wraps_without_carry() {
        let mut ctr = [0xffu8; 16];
        inc64(&mut ctr);
        assert_eq!(&ctr[..8], &[0xffu8; 8]);
        assert_eq!(&ctr[8..], &[0u8; 8]);
    }

    #[test]
    fn test_ctr32_blocks_leaves_counter() {
        let cipher = XorCipher(0x5a);
        let counter = [0u8; 16];
        let mut data = [0u8; 48];
        cipher.ctr32_encrypt_blocks(&mut data, &counter).unwrap();
        // Block i keystream is (counter + i) ^ 0x5a.
        for (i, block) in data.chunks(16).enumerate() {
            assert_eq!(block[15], (i as u8) ^ 0x5a);
            assert_eq!(block[0], 0x5a);
        }
        assert!(cipher.ctr32_encrypt_blocks(&mut [0u8; 15], &counter).is_err());
    }

    #[test]
    fn test_ccm64_blocks_inverse() {
        let cipher = XorCipher(0x33);
        let counter = [7u8; 16];
        let original = [0xa5u8; 32];
        let mut data = original;
        let mut mac_enc = [0u8; 16];
        cipher
            .ccm64_encrypt_blocks(&mut data, &counter, &mut mac_enc)
            .unwrap();
        let mut mac_dec = [0u8; 16];
        cipher
            .ccm64_decrypt_blocks(&mut data, &counter, &mut mac_dec)
            .unwrap();
        assert_eq!(data, original);
        assert_eq!(mac_enc, mac_dec);
    }

    #[test]
    fn test_reference_forwarding() {
        let cipher = XorCipher(1);
        let by_ref: &dyn BlockCipher = &cipher;
        let mut block = [0u8; 16];
        (&by_ref).encrypt_block(&mut block).unwrap();
        assert_eq!(block, [1u8; 16]);
        assert_eq!(by_ref.block_size(), 16);
    }
}
