//! CBC (Cipher Block Chaining) mode of operation.
//!
//! [`Cbc`] is the raw, unpadded mode over whole blocks (NIST SP 800-38A
//! §6.2). [`cbc_pkcs7_encrypt`] and [`cbc_pkcs7_decrypt`] add PKCS#7
//! padding on top of it for one-shot use.

use crate::provider::{xor_in_place, BlockCipher, BLOCK_SIZE};
use blockmode_types::CryptoError;
use subtle::ConstantTimeEq;

/// Streaming CBC context.
///
/// The running IV is the last ciphertext block produced or consumed, so a
/// message may be split across calls at any block boundary.
pub struct Cbc<'k, C: BlockCipher + ?Sized> {
    cipher: &'k C,
    iv: [u8; BLOCK_SIZE],
}

impl<'k, C: BlockCipher + ?Sized> Cbc<'k, C> {
    pub fn new(cipher: &'k C, iv: &[u8]) -> Result<Self, CryptoError> {
        if iv.len() != BLOCK_SIZE {
            return Err(CryptoError::InvalidIvLength);
        }
        let mut reg = [0u8; BLOCK_SIZE];
        reg.copy_from_slice(iv);
        Ok(Self { cipher, iv: reg })
    }

    /// Current chaining value.
    pub fn iv(&self) -> &[u8; BLOCK_SIZE] {
        &self.iv
    }

    /// Encrypt whole blocks in place.
    pub fn encrypt(&mut self, data: &mut [u8]) -> Result<(), CryptoError> {
        if data.len() % BLOCK_SIZE != 0 {
            return Err(CryptoError::InvalidArg);
        }
        for chunk in data.chunks_exact_mut(BLOCK_SIZE) {
            xor_in_place(chunk, &self.iv);
            self.cipher.encrypt_block(chunk)?;
            self.iv.copy_from_slice(chunk);
        }
        Ok(())
    }

    /// Decrypt whole blocks in place.
    pub fn decrypt(&mut self, data: &mut [u8]) -> Result<(), CryptoError> {
        if data.len() % BLOCK_SIZE != 0 {
            return Err(CryptoError::InvalidArg);
        }
        let mut ct = [0u8; BLOCK_SIZE];
        for chunk in data.chunks_exact_mut(BLOCK_SIZE) {
            ct.copy_from_slice(chunk);
            self.cipher.decrypt_block(chunk)?;
            xor_in_place(chunk, &self.iv);
            self.iv = ct;
        }
        Ok(())
    }
}

/// Encrypt with CBC and PKCS#7 padding. Always appends 1..=16 pad bytes.
pub fn cbc_pkcs7_encrypt<C: BlockCipher + ?Sized>(
    cipher: &C,
    iv: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let mut cbc = Cbc::new(cipher, iv)?;

    let pad_len = BLOCK_SIZE - (plaintext.len() % BLOCK_SIZE);
    let mut data = Vec::with_capacity(plaintext.len() + pad_len);
    data.extend_from_slice(plaintext);
    data.resize(plaintext.len() + pad_len, pad_len as u8);

    cbc.encrypt(&mut data)?;
    Ok(data)
}

/// Decrypt CBC and strip PKCS#7 padding (constant-time check).
pub fn cbc_pkcs7_decrypt<C: BlockCipher + ?Sized>(
    cipher: &C,
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.len() % BLOCK_SIZE != 0 || ciphertext.is_empty() {
        return Err(CryptoError::InvalidArg);
    }
    let mut cbc = Cbc::new(cipher, iv)?;
    let mut output = ciphertext.to_vec();
    cbc.decrypt(&mut output)?;

    let pad_val = *output.last().ok_or(CryptoError::InvalidPadding)? as usize;
    if pad_val == 0 || pad_val > BLOCK_SIZE {
        return Err(CryptoError::InvalidPadding);
    }
    let pad_byte = pad_val as u8;
    let mut valid = 1u8;
    for &b in &output[output.len() - pad_val..] {
        valid &= b.ct_eq(&pad_byte).unwrap_u8();
    }
    if valid != 1 {
        return Err(CryptoError::InvalidPadding);
    }
    output.truncate(output.len() - pad_val);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aes::AesKey;

    const KEY: &str = "2b7e151628aed2a6abf7158809cf4f3c";
    const IV: &str = "000102030405060708090a0b0c0d0e0f";
    const PT: &str = "6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e5130c81c46a35ce411e5fbc1191a0a52eff69f2445df4f9b17ad2b417be66c3710";

    fn aes() -> AesKey {
        AesKey::new(&hex::decode(KEY).unwrap()).unwrap()
    }

    // NIST SP 800-38A F.2.1 / F.2.2: CBC-AES128
    #[test]
    fn test_cbc_aes128_nist_vector() {
        let key = aes();
        let iv = hex::decode(IV).unwrap();
        let expected = "7649abac8119b246cee98e9b12e9197d5086cb9b507219ee95db113a917678b273bed6b8e3c1743b7116e69e222295163ff1caa1681fac09120eca307586e1a7";

        let mut data = hex::decode(PT).unwrap();
        Cbc::new(&key, &iv).unwrap().encrypt(&mut data).unwrap();
        assert_eq!(hex::encode(&data), expected);

        Cbc::new(&key, &iv).unwrap().decrypt(&mut data).unwrap();
        assert_eq!(hex::encode(&data), PT);
    }

    #[test]
    fn test_cbc_split_calls_match_single_call() {
        let key = aes();
        let iv = hex::decode(IV).unwrap();
        let pt = hex::decode(PT).unwrap();

        let mut whole = pt.clone();
        Cbc::new(&key, &iv).unwrap().encrypt(&mut whole).unwrap();

        let mut split = pt.clone();
        let mut cbc = Cbc::new(&key, &iv).unwrap();
        let (a, b) = split.split_at_mut(16);
        cbc.encrypt(a).unwrap();
        cbc.encrypt(b).unwrap();
        assert_eq!(split, whole);
        assert_eq!(cbc.iv()[..], whole[48..]);
    }

    #[test]
    fn test_cbc_rejects_partial_block() {
        let key = aes();
        let mut cbc = Cbc::new(&key, &[0u8; 16]).unwrap();
        assert_eq!(cbc.encrypt(&mut [0u8; 17]), Err(CryptoError::InvalidArg));
        assert_eq!(cbc.decrypt(&mut [0u8; 15]), Err(CryptoError::InvalidArg));
        assert!(cbc.encrypt(&mut []).is_ok());
    }

    #[test]
    fn test_cbc_invalid_iv() {
        let key = aes();
        assert!(matches!(
            Cbc::new(&key, &[0u8; 15]),
            Err(CryptoError::InvalidIvLength)
        ));
    }

    #[test]
    fn test_cbc_padding_short() {
        let key = aes();
        let iv = hex::decode(IV).unwrap();
        let pt = b"Hello, World!"; // 13 bytes, needs 3 bytes padding

        let ct = cbc_pkcs7_encrypt(&key, &iv, pt).unwrap();
        assert_eq!(ct.len(), 16);
        let decrypted = cbc_pkcs7_decrypt(&key, &iv, &ct).unwrap();
        assert_eq!(decrypted, pt);
    }

    #[test]
    fn test_cbc_padding_aligned() {
        let key = aes();
        let iv = hex::decode(IV).unwrap();
        let pt = [0xaau8; 16];

        let ct = cbc_pkcs7_encrypt(&key, &iv, &pt).unwrap();
        assert_eq!(ct.len(), 32);
        let decrypted = cbc_pkcs7_decrypt(&key, &iv, &ct).unwrap();
        assert_eq!(decrypted, pt);
    }

    #[test]
    fn test_cbc_empty() {
        let key = aes();
        let iv = hex::decode(IV).unwrap();
        let ct = cbc_pkcs7_encrypt(&key, &iv, b"").unwrap();
        assert_eq!(ct.len(), 16);
        assert!(cbc_pkcs7_decrypt(&key, &iv, &ct).unwrap().is_empty());
    }

    #[test]
    fn test_cbc_bad_padding() {
        let key = aes();
        let iv = [0u8; 16];
        let mut block = [0x05u8; 16];
        block[15] = 0x11; // pad byte larger than a block
        Cbc::new(&key, &iv).unwrap().encrypt(&mut block).unwrap();
        assert_eq!(
            cbc_pkcs7_decrypt(&key, &iv, &block),
            Err(CryptoError::InvalidPadding)
        );

        let mut block = [0x00u8; 16];
        block[15] = 0x03;
        block[14] = 0x03;
        Cbc::new(&key, &iv).unwrap().encrypt(&mut block).unwrap();
        assert_eq!(
            cbc_pkcs7_decrypt(&key, &iv, &block),
            Err(CryptoError::InvalidPadding)
        );
    }
}
