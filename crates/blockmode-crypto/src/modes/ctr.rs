//! CTR (Counter) mode of operation.
//!
//! Two counter disciplines are provided:
//!
//! * [`Ctr128`] increments the whole 16-byte block as one big-endian
//!   integer (NIST SP 800-38A §B.1 with m = 128).
//! * [`Ctr32`] increments only the last four bytes and leaves the first
//!   twelve fixed, as GCM does. Whole blocks are handed to
//!   [`BlockCipher::ctr32_encrypt_blocks`] so an accelerated backend can
//!   take the bulk.

use crate::aes::{AesKey, AES_BLOCK_SIZE};
use crate::provider::{inc32, BlockCipher, BLOCK_SIZE};
use blockmode_types::CryptoError;
use zeroize::Zeroize;

const CTR32_SPAN: u64 = 1 << 32;

/// Increment a 128-bit big-endian counter by 1.
fn increment_counter(counter: &mut [u8]) {
    for byte in counter.iter_mut().rev() {
        *byte = byte.wrapping_add(1);
        if *byte != 0 {
            break;
        }
    }
}

fn load_counter(iv: &[u8]) -> Result<[u8; BLOCK_SIZE], CryptoError> {
    if iv.len() != BLOCK_SIZE {
        return Err(CryptoError::InvalidIvLength);
    }
    let mut ctr = [0u8; BLOCK_SIZE];
    ctr.copy_from_slice(iv);
    Ok(ctr)
}

fn low32(counter: &[u8; BLOCK_SIZE]) -> u32 {
    u32::from_be_bytes([counter[12], counter[13], counter[14], counter[15]])
}

/// Streaming CTR with a full 128-bit counter.
pub struct Ctr128<'k, C: BlockCipher + ?Sized> {
    cipher: &'k C,
    counter: [u8; BLOCK_SIZE],
    ecount: [u8; BLOCK_SIZE],
    num: usize,
}

impl<'k, C: BlockCipher + ?Sized> Ctr128<'k, C> {
    pub fn new(cipher: &'k C, iv: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self {
            cipher,
            counter: load_counter(iv)?,
            ecount: [0u8; BLOCK_SIZE],
            num: 0,
        })
    }

    /// Counter of the next keystream block.
    pub fn counter(&self) -> &[u8; BLOCK_SIZE] {
        &self.counter
    }

    /// Keystream bytes of the current block already used.
    pub fn num(&self) -> usize {
        self.num
    }

    /// XOR `data` with the keystream in place.
    pub fn apply(&mut self, data: &mut [u8]) -> Result<(), CryptoError> {
        for byte in data.iter_mut() {
            if self.num == 0 {
                self.ecount = self.counter;
                self.cipher.encrypt_block(&mut self.ecount)?;
                increment_counter(&mut self.counter);
            }
            *byte ^= self.ecount[self.num];
            self.num = (self.num + 1) % BLOCK_SIZE;
        }
        Ok(())
    }
}

impl<C: BlockCipher + ?Sized> Drop for Ctr128<'_, C> {
    fn drop(&mut self) {
        self.ecount.zeroize();
    }
}

/// Streaming CTR with a 32-bit counter in the last four bytes.
///
/// A context built with [`Ctr32::new`] wraps silently from `0xFFFFFFFF` to
/// `0`. One built with [`Ctr32::strict`] refuses to use a counter past the
/// wrap with [`CryptoError::CounterExhausted`] until
/// [`Ctr32::acknowledge_wrap`] is called; each acknowledgement covers a
/// single crossing.
pub struct Ctr32<'k, C: BlockCipher + ?Sized> {
    cipher: &'k C,
    counter: [u8; BLOCK_SIZE],
    ecount: [u8; BLOCK_SIZE],
    num: usize,
    strict: bool,
    wrap_acknowledged: bool,
    // The last increment wrapped and the counter has not been used since.
    at_wrap: bool,
}

impl<'k, C: BlockCipher + ?Sized> Ctr32<'k, C> {
    /// Context that wraps the counter without complaint.
    pub fn new(cipher: &'k C, iv: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self {
            cipher,
            counter: load_counter(iv)?,
            ecount: [0u8; BLOCK_SIZE],
            num: 0,
            strict: false,
            wrap_acknowledged: false,
            at_wrap: false,
        })
    }

    /// Context that stops at the 32-bit wrap boundary.
    pub fn strict(cipher: &'k C, iv: &[u8]) -> Result<Self, CryptoError> {
        let mut ctx = Self::new(cipher, iv)?;
        ctx.strict = true;
        Ok(ctx)
    }

    /// Allow the counter to cross the wrap boundary once.
    pub fn acknowledge_wrap(&mut self) {
        self.wrap_acknowledged = true;
    }

    /// Counter of the next keystream block.
    pub fn counter(&self) -> &[u8; BLOCK_SIZE] {
        &self.counter
    }

    /// Keystream bytes of the current block already used.
    pub fn num(&self) -> usize {
        self.num
    }

    /// Check that `blocks` more counter values may be consumed and record
    /// the resulting counter position.
    fn reserve(&mut self, blocks: u64) -> Result<(), CryptoError> {
        if blocks == 0 {
            return Ok(());
        }
        let start = low32(&self.counter) as u64;
        let crossings = self.at_wrap as u64 + (start + blocks - 1) / CTR32_SPAN;
        if self.strict && crossings > 0 {
            if crossings > 1 || !self.wrap_acknowledged {
                return Err(CryptoError::CounterExhausted);
            }
            self.wrap_acknowledged = false;
        }
        self.at_wrap = (start + blocks) % CTR32_SPAN == 0;
        Ok(())
    }

    fn advance(&mut self, blocks: u64) {
        let next = (low32(&self.counter) as u64 + blocks) as u32;
        self.counter[12..].copy_from_slice(&next.to_be_bytes());
    }

    /// XOR `data` with the keystream in place.
    ///
    /// In strict mode the whole call is rejected up front if it would need
    /// an unacknowledged wrap; no bytes are processed in that case.
    pub fn apply(&mut self, data: &mut [u8]) -> Result<(), CryptoError> {
        let lead = if self.num == 0 {
            0
        } else {
            (BLOCK_SIZE - self.num).min(data.len())
        };
        let bulk = (data.len() - lead) / BLOCK_SIZE * BLOCK_SIZE;
        let tail = data.len() - lead - bulk;
        self.reserve((bulk / BLOCK_SIZE) as u64 + (tail > 0) as u64)?;

        let (head, rest) = data.split_at_mut(lead);
        for byte in head.iter_mut() {
            *byte ^= self.ecount[self.num];
            self.num = (self.num + 1) % BLOCK_SIZE;
        }

        let (blocks, tail) = rest.split_at_mut(bulk);
        if !blocks.is_empty() {
            self.cipher.ctr32_encrypt_blocks(blocks, &self.counter)?;
            self.advance((bulk / BLOCK_SIZE) as u64);
        }

        if !tail.is_empty() {
            self.ecount = self.counter;
            self.cipher.encrypt_block(&mut self.ecount)?;
            inc32(&mut self.counter);
            for (d, &k) in tail.iter_mut().zip(self.ecount.iter()) {
                *d ^= k;
            }
            self.num = tail.len();
        }
        Ok(())
    }
}

impl<C: BlockCipher + ?Sized> Drop for Ctr32<'_, C> {
    fn drop(&mut self) {
        self.ecount.zeroize();
    }
}

/// Encrypt or decrypt data using CTR mode with AES.
/// `nonce` must be 16 bytes (used as the initial counter value).
pub fn ctr_crypt(key: &[u8], nonce: &[u8], data: &mut [u8]) -> Result<(), CryptoError> {
    if nonce.len() != AES_BLOCK_SIZE {
        return Err(CryptoError::InvalidIvLength);
    }
    if data.is_empty() {
        return Ok(());
    }
    let cipher = AesKey::new(key)?;
    let mut ctr = Ctr128::new(&cipher, nonce)?;
    ctr.apply(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "2b7e151628aed2a6abf7158809cf4f3c";
    const NONCE: &str = "f0f1f2f3f4f5f6f7f8f9fafbfcfdfeff";
    const PT: &str = "6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e5130c81c46a35ce411e5fbc1191a0a52eff69f2445df4f9b17ad2b417be66c3710";
    const CT: &str = "874d6191b620e3261bef6864990db6ce9806f66b7970fdff8617187bb9fffdff5ae4df3edbd5d35e5b4f09020db03eab1e031dda2fbe03d1792170a0f3009cee";

    fn aes() -> AesKey {
        AesKey::new(&hex::decode(KEY).unwrap()).unwrap()
    }

    // NIST SP 800-38A F.5.1: AES-128 CTR
    #[test]
    fn test_ctr_aes128() {
        let key = hex::decode(KEY).unwrap();
        let nonce = hex::decode(NONCE).unwrap();
        let mut data = hex::decode(PT).unwrap();
        ctr_crypt(&key, &nonce, &mut data).unwrap();
        assert_eq!(hex::encode(&data), CT);

        ctr_crypt(&key, &nonce, &mut data).unwrap();
        assert_eq!(hex::encode(&data), PT);
    }

    #[test]
    fn test_ctr32_matches_ctr128_without_wrap() {
        let cipher = aes();
        let nonce = hex::decode(NONCE).unwrap();
        let pt = hex::decode(PT).unwrap();

        // The SP 800-38A counter never carries out of the low word here.
        let mut data = pt.clone();
        let mut ctr = Ctr32::new(&cipher, &nonce).unwrap();
        let (a, rest) = data.split_at_mut(3);
        let (b, c) = rest.split_at_mut(30);
        ctr.apply(a).unwrap();
        ctr.apply(b).unwrap();
        ctr.apply(c).unwrap();
        assert_eq!(hex::encode(&data), CT);
        assert_eq!(ctr.num(), 0);
    }

    #[test]
    fn test_ctr128_carries_into_high_bytes() {
        let cipher = aes();
        let mut iv = [0u8; 16];
        iv[8..].copy_from_slice(&[0xff; 8]);
        let mut ctr = Ctr128::new(&cipher, &iv).unwrap();
        ctr.apply(&mut [0u8; 16]).unwrap();
        let mut expected = [0u8; 16];
        expected[7] = 1;
        assert_eq!(ctr.counter(), &expected);

        // Full wrap of all 128 bits.
        let mut ctr = Ctr128::new(&cipher, &[0xff; 16]).unwrap();
        ctr.apply(&mut [0u8; 1]).unwrap();
        assert_eq!(ctr.counter(), &[0u8; 16]);
        assert_eq!(ctr.num(), 1);
    }

    #[test]
    fn test_ctr32_wraps_low_word_only() {
        let cipher = aes();
        let mut iv = [0xabu8; 16];
        iv[12..].copy_from_slice(&0xffff_fffeu32.to_be_bytes());

        let mut ctr = Ctr32::new(&cipher, &iv).unwrap();
        ctr.apply(&mut [0u8; 32]).unwrap();
        assert_eq!(&ctr.counter()[..12], &[0xabu8; 12]);
        assert_eq!(&ctr.counter()[12..], &[0u8; 4]);

        // The keystream for the wrapped block is E(prefix || 0).
        let mut ks = [0u8; 16];
        ctr.apply(&mut ks).unwrap();
        let mut expected = [0xabu8; 16];
        expected[12..].copy_from_slice(&[0u8; 4]);
        cipher.encrypt_block(&mut expected).unwrap();
        assert_eq!(ks, expected);
    }

    #[test]
    fn test_ctr32_strict_requires_acknowledgement() {
        let cipher = aes();
        let mut iv = [0u8; 16];
        iv[12..].copy_from_slice(&0xffff_fffeu32.to_be_bytes());

        let mut ctr = Ctr32::strict(&cipher, &iv).unwrap();
        ctr.apply(&mut [0u8; 32]).unwrap();
        assert_eq!(&ctr.counter()[12..], &[0u8; 4]);

        let mut block = [0u8; 16];
        assert_eq!(ctr.apply(&mut block), Err(CryptoError::CounterExhausted));
        assert_eq!(block, [0u8; 16]);

        ctr.acknowledge_wrap();
        ctr.apply(&mut block).unwrap();
        ctr.apply(&mut [0u8; 64]).unwrap();
        assert_eq!(&ctr.counter()[12..], &5u32.to_be_bytes());
    }

    #[test]
    fn test_ctr32_strict_rejects_crossing_call() {
        let cipher = aes();
        let mut iv = [0u8; 16];
        iv[12..].copy_from_slice(&0xffff_ffffu32.to_be_bytes());

        let mut ctr = Ctr32::strict(&cipher, &iv).unwrap();
        let mut data = [0u8; 20];
        assert_eq!(ctr.apply(&mut data), Err(CryptoError::CounterExhausted));
        assert_eq!(data, [0u8; 20]);

        ctr.acknowledge_wrap();
        ctr.apply(&mut data).unwrap();
        assert_eq!(&ctr.counter()[12..], &1u32.to_be_bytes());
        assert_eq!(ctr.num(), 4);
    }

    #[test]
    fn test_ctr_invalid_nonce() {
        let key = hex::decode(KEY).unwrap();
        let mut data = [0u8; 4];
        assert!(ctr_crypt(&key, &[0u8; 15], &mut data).is_err());
        assert!(Ctr32::new(&aes(), &[0u8; 12]).is_err());
    }
}
