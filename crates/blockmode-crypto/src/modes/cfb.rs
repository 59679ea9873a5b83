//! CFB (Cipher Feedback) mode of operation.
//!
//! Implements CFB-128, CFB-8 and CFB-1 as defined in NIST SP 800-38A §6.3.
//! All three work with any 128-bit [`BlockCipher`] and accept arbitrary
//! input lengths; calls may split a message anywhere.

use crate::aes::AesKey;
use crate::provider::{BlockCipher, BLOCK_SIZE};
use blockmode_types::CryptoError;
use zeroize::Zeroize;

fn load_iv(iv: &[u8]) -> Result<[u8; BLOCK_SIZE], CryptoError> {
    if iv.len() != BLOCK_SIZE {
        return Err(CryptoError::InvalidIvLength);
    }
    let mut reg = [0u8; BLOCK_SIZE];
    reg.copy_from_slice(iv);
    Ok(reg)
}

/// CFB with a full 128-bit feedback segment.
///
/// The register holds `E(previous ciphertext)` XORed byte by byte into the
/// ciphertext as it is produced; `num` is the position inside it.
pub struct Cfb128<'k, C: BlockCipher + ?Sized> {
    cipher: &'k C,
    iv: [u8; BLOCK_SIZE],
    num: usize,
}

impl<'k, C: BlockCipher + ?Sized> Cfb128<'k, C> {
    pub fn new(cipher: &'k C, iv: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self {
            cipher,
            iv: load_iv(iv)?,
            num: 0,
        })
    }

    /// Feedback register.
    pub fn iv(&self) -> &[u8; BLOCK_SIZE] {
        &self.iv
    }

    /// Bytes of the current register already consumed.
    pub fn num(&self) -> usize {
        self.num
    }

    pub fn encrypt(&mut self, data: &mut [u8]) -> Result<(), CryptoError> {
        self.process(data, true)
    }

    pub fn decrypt(&mut self, data: &mut [u8]) -> Result<(), CryptoError> {
        self.process(data, false)
    }

    fn process(&mut self, data: &mut [u8], encrypting: bool) -> Result<(), CryptoError> {
        for byte in data.iter_mut() {
            if self.num == 0 {
                self.cipher.encrypt_block(&mut self.iv)?;
            }
            let input = *byte;
            *byte = input ^ self.iv[self.num];
            self.iv[self.num] = if encrypting { *byte } else { input };
            self.num = (self.num + 1) % BLOCK_SIZE;
        }
        Ok(())
    }
}

/// CFB with an 8-bit feedback segment: one block cipher call per byte.
pub struct Cfb8<'k, C: BlockCipher + ?Sized> {
    cipher: &'k C,
    iv: [u8; BLOCK_SIZE],
    ks: [u8; BLOCK_SIZE],
}

impl<'k, C: BlockCipher + ?Sized> Cfb8<'k, C> {
    pub fn new(cipher: &'k C, iv: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self {
            cipher,
            iv: load_iv(iv)?,
            ks: [0u8; BLOCK_SIZE],
        })
    }

    /// Shift register.
    pub fn iv(&self) -> &[u8; BLOCK_SIZE] {
        &self.iv
    }

    /// Always zero: every byte consumes a whole block.
    pub fn num(&self) -> usize {
        0
    }

    pub fn encrypt(&mut self, data: &mut [u8]) -> Result<(), CryptoError> {
        self.process(data, true)
    }

    pub fn decrypt(&mut self, data: &mut [u8]) -> Result<(), CryptoError> {
        self.process(data, false)
    }

    fn process(&mut self, data: &mut [u8], encrypting: bool) -> Result<(), CryptoError> {
        for byte in data.iter_mut() {
            self.ks = self.iv;
            self.cipher.encrypt_block(&mut self.ks)?;
            let input = *byte;
            *byte = input ^ self.ks[0];
            let fed = if encrypting { *byte } else { input };
            self.iv.copy_within(1.., 0);
            self.iv[BLOCK_SIZE - 1] = fed;
        }
        Ok(())
    }
}

impl<C: BlockCipher + ?Sized> Drop for Cfb8<'_, C> {
    fn drop(&mut self) {
        self.ks.zeroize();
    }
}

/// CFB with a 1-bit feedback segment.
///
/// Bits are taken most-significant first within each byte.
pub struct Cfb1<'k, C: BlockCipher + ?Sized> {
    cipher: &'k C,
    iv: [u8; BLOCK_SIZE],
    ks: [u8; BLOCK_SIZE],
}

impl<'k, C: BlockCipher + ?Sized> Cfb1<'k, C> {
    pub fn new(cipher: &'k C, iv: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self {
            cipher,
            iv: load_iv(iv)?,
            ks: [0u8; BLOCK_SIZE],
        })
    }

    /// Shift register.
    pub fn iv(&self) -> &[u8; BLOCK_SIZE] {
        &self.iv
    }

    /// Encrypt the first `bits` bits of `data` in place. Trailing bits of
    /// the last touched byte are left as they were.
    pub fn encrypt_bits(&mut self, data: &mut [u8], bits: usize) -> Result<(), CryptoError> {
        self.process(data, bits, true)
    }

    /// Decrypt the first `bits` bits of `data` in place.
    pub fn decrypt_bits(&mut self, data: &mut [u8], bits: usize) -> Result<(), CryptoError> {
        self.process(data, bits, false)
    }

    fn process(&mut self, data: &mut [u8], bits: usize, encrypting: bool) -> Result<(), CryptoError> {
        if bits > data.len().saturating_mul(8) {
            return Err(CryptoError::InvalidArg);
        }
        for i in 0..bits {
            let mask = 0x80u8 >> (i % 8);
            let byte = &mut data[i / 8];

            self.ks = self.iv;
            self.cipher.encrypt_block(&mut self.ks)?;

            let in_bit = (*byte & mask) != 0;
            let out_bit = in_bit ^ (self.ks[0] & 0x80 != 0);
            if out_bit {
                *byte |= mask;
            } else {
                *byte &= !mask;
            }
            let fed = if encrypting { out_bit } else { in_bit };
            self.shift_in(fed);
        }
        Ok(())
    }

    fn shift_in(&mut self, bit: bool) {
        for i in 0..BLOCK_SIZE - 1 {
            self.iv[i] = (self.iv[i] << 1) | (self.iv[i + 1] >> 7);
        }
        self.iv[BLOCK_SIZE - 1] = (self.iv[BLOCK_SIZE - 1] << 1) | bit as u8;
    }
}

impl<C: BlockCipher + ?Sized> Drop for Cfb1<'_, C> {
    fn drop(&mut self) {
        self.ks.zeroize();
    }
}

/// Encrypt data using CFB-128 mode with AES.
///
/// No padding needed; handles arbitrary-length plaintext.
pub fn cfb_encrypt(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = AesKey::new(key)?;
    let mut out = plaintext.to_vec();
    Cfb128::new(&cipher, iv)?.encrypt(&mut out)?;
    Ok(out)
}

/// Decrypt data using CFB-128 mode with AES.
pub fn cfb_decrypt(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = AesKey::new(key)?;
    let mut out = ciphertext.to_vec();
    Cfb128::new(&cipher, iv)?.decrypt(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "2b7e151628aed2a6abf7158809cf4f3c";
    const IV: &str = "000102030405060708090a0b0c0d0e0f";

    fn aes() -> AesKey {
        AesKey::new(&hex::decode(KEY).unwrap()).unwrap()
    }

    // NIST SP 800-38A F.3.13: CFB128-AES128
    #[test]
    fn test_cfb128_nist_vector() {
        let pt = hex::decode("6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e5130c81c46a35ce411e5fbc1191a0a52eff69f2445df4f9b17ad2b417be66c3710").unwrap();
        let expected = "3b3fd92eb72dad20333449f8e83cfb4ac8a64537a0b3a93fcde3cdad9f1ce58b26751f67a3cbb140b1808cf187a4f4dfc04b05357c5d1c0eeac4c66f9ff7f2e6";

        let ct = cfb_encrypt(&hex::decode(KEY).unwrap(), &hex::decode(IV).unwrap(), &pt).unwrap();
        assert_eq!(hex::encode(&ct), expected);

        let decrypted =
            cfb_decrypt(&hex::decode(KEY).unwrap(), &hex::decode(IV).unwrap(), &ct).unwrap();
        assert_eq!(decrypted, pt);
    }

    #[test]
    fn test_cfb128_resumes_mid_block() {
        let key = aes();
        let iv = hex::decode(IV).unwrap();
        let pt: Vec<u8> = (0..53u8).collect();

        let mut whole = pt.clone();
        Cfb128::new(&key, &iv).unwrap().encrypt(&mut whole).unwrap();

        let mut pieces = pt.clone();
        let mut cfb = Cfb128::new(&key, &iv).unwrap();
        let (a, rest) = pieces.split_at_mut(5);
        let (b, c) = rest.split_at_mut(20);
        cfb.encrypt(a).unwrap();
        assert_eq!(cfb.num(), 5);
        cfb.encrypt(b).unwrap();
        cfb.encrypt(c).unwrap();
        assert_eq!(pieces, whole);

        let mut dec = Cfb128::new(&key, &iv).unwrap();
        let (x, y) = pieces.split_at_mut(7);
        dec.decrypt(x).unwrap();
        dec.decrypt(y).unwrap();
        assert_eq!(pieces, pt);
    }

    // NIST SP 800-38A F.3.7: CFB8-AES128
    #[test]
    fn test_cfb8_nist_vector() {
        let key = aes();
        let iv = hex::decode(IV).unwrap();
        let pt = hex::decode("6bc1bee22e409f96e93d7e117393172aae2d").unwrap();

        let mut data = pt.clone();
        let mut cfb = Cfb8::new(&key, &iv).unwrap();
        let (a, b) = data.split_at_mut(3);
        cfb.encrypt(a).unwrap();
        cfb.encrypt(b).unwrap();
        assert_eq!(hex::encode(&data), "3b79424c9c0dd436bace9e0ed4586a4f32b9");
        assert_eq!(cfb.num(), 0);

        Cfb8::new(&key, &iv).unwrap().decrypt(&mut data).unwrap();
        assert_eq!(data, pt);
    }

    // NIST SP 800-38A F.3.1: CFB1-AES128, first 16 segments
    #[test]
    fn test_cfb1_nist_vector() {
        let key = aes();
        let iv = hex::decode(IV).unwrap();

        let mut data = [0x6b, 0xc1];
        Cfb1::new(&key, &iv).unwrap().encrypt_bits(&mut data, 16).unwrap();
        assert_eq!(data, [0x68, 0xb3]);

        Cfb1::new(&key, &iv).unwrap().decrypt_bits(&mut data, 16).unwrap();
        assert_eq!(data, [0x6b, 0xc1]);
    }

    #[test]
    fn test_cfb1_partial_byte_untouched() {
        let key = aes();
        let iv = hex::decode(IV).unwrap();
        let mut data = [0x6b, 0xc1];
        Cfb1::new(&key, &iv).unwrap().encrypt_bits(&mut data, 12).unwrap();
        // First 12 bits match the full run; the low nibble keeps its input.
        assert_eq!(data, [0x68, 0xb1]);
        assert!(Cfb1::new(&key, &iv)
            .unwrap()
            .encrypt_bits(&mut data, 17)
            .is_err());
    }

    #[test]
    fn test_cfb_invalid_iv() {
        let key = aes();
        assert!(Cfb128::new(&key, &[0u8; 8]).is_err());
        assert!(Cfb8::new(&key, &[0u8; 17]).is_err());
        assert!(Cfb1::new(&key, &[]).is_err());
    }

    #[test]
    fn test_cfb_partial_block() {
        let key = [0x42u8; 16];
        let iv = [0u8; 16];
        let pt = b"Hello, CFB!"; // 11 bytes, not block-aligned

        let ct = cfb_encrypt(&key, &iv, pt).unwrap();
        assert_eq!(ct.len(), pt.len());
        assert_eq!(cfb_decrypt(&key, &iv, &ct).unwrap(), pt);
    }
}
