//! CCM (Counter with CBC-MAC) authenticated encryption.
//!
//! Implements CCM mode as defined in NIST SP 800-38C and RFC 3610.
//! Supports AES and SM4 as the underlying block cipher.
//!
//! [`Ccm`] is a streaming context. The message length is fixed up front
//! by `set_iv` because it is part of the first CBC-MAC block; associated
//! data is supplied in a single `aad` call; the payload may then be
//! encrypted or decrypted in pieces of any size.

use crate::aes::AesKey;
use crate::provider::{inc64, xor_in_place, BlockCipher, BLOCK_SIZE};
use blockmode_types::CryptoError;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

/// Block cipher invocations allowed per message.
const MAX_BLOCKS: u64 = 1 << 61;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum State {
    NoIv,
    Active,
    Finished,
    Poisoned,
}

/// Streaming CCM context with tag length `M` and length-field size `L`.
pub struct Ccm<'k, C: BlockCipher + ?Sized> {
    cipher: &'k C,
    m: usize,
    l: usize,
    b0: [u8; BLOCK_SIZE],
    ctr: [u8; BLOCK_SIZE],
    s0: [u8; BLOCK_SIZE],
    ks: [u8; BLOCK_SIZE],
    cmac: [u8; BLOCK_SIZE],
    tag: [u8; BLOCK_SIZE],
    mlen: u64,
    processed: u64,
    blocks: u64,
    mres: usize,
    mac_started: bool,
    aad_done: bool,
    state: State,
}

impl<'k, C: BlockCipher + ?Sized> Ccm<'k, C> {
    /// `m` is the tag length (4, 6, ..., 16); `l` the size in bytes of the
    /// length field (2 to 8), which fixes the nonce length at `15 - l`.
    pub fn new(cipher: &'k C, m: usize, l: usize) -> Result<Self, CryptoError> {
        if !(4..=16).contains(&m) || m % 2 != 0 {
            return Err(CryptoError::InvalidTagLength);
        }
        if !(2..=8).contains(&l) {
            return Err(CryptoError::InvalidArg);
        }
        Ok(Self {
            cipher,
            m,
            l,
            b0: [0u8; BLOCK_SIZE],
            ctr: [0u8; BLOCK_SIZE],
            s0: [0u8; BLOCK_SIZE],
            ks: [0u8; BLOCK_SIZE],
            cmac: [0u8; BLOCK_SIZE],
            tag: [0u8; BLOCK_SIZE],
            mlen: 0,
            processed: 0,
            blocks: 0,
            mres: 0,
            mac_started: false,
            aad_done: false,
            state: State::NoIv,
        })
    }

    /// Tag length in bytes.
    pub fn tag_len(&self) -> usize {
        self.m
    }

    /// Start a message of exactly `mlen` bytes under `nonce`.
    pub fn set_iv(&mut self, nonce: &[u8], mlen: u64) -> Result<(), CryptoError> {
        let l = self.l;
        if nonce.len() != 15 - l {
            return Err(CryptoError::InvalidIvLength);
        }
        if l < 8 && mlen >> (8 * l) != 0 {
            return Err(CryptoError::InputOverflow);
        }

        let mut b0 = [0u8; BLOCK_SIZE];
        b0[0] = ((((self.m - 2) / 2) as u8) << 3) | (l - 1) as u8;
        b0[1..BLOCK_SIZE - l].copy_from_slice(nonce);
        b0[BLOCK_SIZE - l..].copy_from_slice(&mlen.to_be_bytes()[8 - l..]);

        // A_0 = (L-1) || nonce || 0, then S_0 = E(A_0) and counting starts at 1.
        let mut ctr = b0;
        ctr[0] = (l - 1) as u8;
        ctr[BLOCK_SIZE - l..].fill(0);
        self.s0 = ctr;
        self.cipher.encrypt_block(&mut self.s0)?;
        ctr[BLOCK_SIZE - 1] = 1;

        self.b0 = b0;
        self.ctr = ctr;
        self.cmac = [0u8; BLOCK_SIZE];
        self.mlen = mlen;
        self.processed = 0;
        self.blocks = 1;
        self.mres = 0;
        self.mac_started = false;
        self.aad_done = false;
        self.state = State::Active;
        Ok(())
    }

    fn require_active(&self) -> Result<(), CryptoError> {
        match self.state {
            State::Active => Ok(()),
            _ => Err(CryptoError::SequenceViolation),
        }
    }

    fn start_mac(&mut self) -> Result<(), CryptoError> {
        if !self.mac_started {
            self.cmac = self.b0;
            self.cipher.encrypt_block(&mut self.cmac)?;
            self.blocks += 1;
            self.mac_started = true;
        }
        Ok(())
    }

    /// Authenticate associated data. Allowed once, before any payload.
    pub fn aad(&mut self, data: &[u8]) -> Result<(), CryptoError> {
        self.require_active()?;
        if data.is_empty() {
            return Ok(());
        }
        if self.aad_done || self.mac_started {
            return Err(CryptoError::SequenceViolation);
        }
        let calls = 2 + data.len() as u64 / BLOCK_SIZE as u64;
        if self.blocks.saturating_add(calls) > MAX_BLOCKS {
            return Err(CryptoError::CounterExhausted);
        }

        self.b0[0] |= 0x40;
        self.start_mac()?;
        self.aad_done = true;

        let alen = data.len() as u64;
        let mut prefix = [0u8; 10];
        let plen = if alen < 0xff00 {
            prefix[..2].copy_from_slice(&(alen as u16).to_be_bytes());
            2
        } else if alen < 1 << 32 {
            prefix[..2].copy_from_slice(&[0xff, 0xfe]);
            prefix[2..6].copy_from_slice(&(alen as u32).to_be_bytes());
            6
        } else {
            prefix[..2].copy_from_slice(&[0xff, 0xff]);
            prefix[2..10].copy_from_slice(&alen.to_be_bytes());
            10
        };
        xor_in_place(&mut self.cmac, &prefix[..plen]);

        let mut i = plen;
        let mut rest = data;
        loop {
            let take = (BLOCK_SIZE - i).min(rest.len());
            xor_in_place(&mut self.cmac[i..], &rest[..take]);
            rest = &rest[take..];
            self.cipher.encrypt_block(&mut self.cmac)?;
            self.blocks += 1;
            i = 0;
            if rest.is_empty() {
                break;
            }
        }
        Ok(())
    }

    /// MAC the plaintext, then encrypt it in place.
    pub fn encrypt(&mut self, data: &mut [u8]) -> Result<(), CryptoError> {
        self.crypt(data, true, false)
    }

    /// Decrypt in place, then MAC the recovered plaintext.
    pub fn decrypt(&mut self, data: &mut [u8]) -> Result<(), CryptoError> {
        self.crypt(data, false, false)
    }

    /// [`Ccm::encrypt`] with whole blocks sent through
    /// [`BlockCipher::ccm64_encrypt_blocks`].
    pub fn encrypt_ccm64(&mut self, data: &mut [u8]) -> Result<(), CryptoError> {
        self.crypt(data, true, true)
    }

    /// [`Ccm::decrypt`] with whole blocks sent through
    /// [`BlockCipher::ccm64_decrypt_blocks`].
    pub fn decrypt_ccm64(&mut self, data: &mut [u8]) -> Result<(), CryptoError> {
        self.crypt(data, false, true)
    }

    fn crypt(&mut self, data: &mut [u8], encrypting: bool, bulk: bool) -> Result<(), CryptoError> {
        self.require_active()?;
        let total = self.processed + data.len() as u64;
        if total > self.mlen {
            return Err(CryptoError::InputOverflow);
        }
        let calls = 2 * (data.len() as u64 / BLOCK_SIZE as u64 + 1) + 1;
        if self.blocks.saturating_add(calls) > MAX_BLOCKS {
            return Err(CryptoError::CounterExhausted);
        }
        self.start_mac()?;
        self.processed = total;

        let mut rest = data;
        let mut n = self.mres;
        while n != 0 && !rest.is_empty() {
            self.crypt_byte(&mut rest[0], n, encrypting);
            rest = &mut core::mem::take(&mut rest)[1..];
            n = (n + 1) % BLOCK_SIZE;
            if n == 0 {
                self.cipher.encrypt_block(&mut self.cmac)?;
                self.blocks += 1;
            }
        }
        self.mres = n;
        if n != 0 {
            return Ok(());
        }

        let whole = rest.len() / BLOCK_SIZE * BLOCK_SIZE;
        let (blocks, tail) = rest.split_at_mut(whole);
        let count = (whole / BLOCK_SIZE) as u64;
        if bulk {
            if count > 0 {
                if encrypting {
                    self.cipher
                        .ccm64_encrypt_blocks(blocks, &self.ctr, &mut self.cmac)?;
                } else {
                    self.cipher
                        .ccm64_decrypt_blocks(blocks, &self.ctr, &mut self.cmac)?;
                }
                for _ in 0..count {
                    inc64(&mut self.ctr);
                }
                self.blocks += 2 * count;
            }
        } else {
            for block in blocks.chunks_exact_mut(BLOCK_SIZE) {
                self.next_keystream()?;
                if encrypting {
                    xor_in_place(&mut self.cmac, block);
                    xor_in_place(block, &self.ks);
                } else {
                    xor_in_place(block, &self.ks);
                    xor_in_place(&mut self.cmac, block);
                }
                self.cipher.encrypt_block(&mut self.cmac)?;
                self.blocks += 1;
            }
        }

        if !tail.is_empty() {
            self.next_keystream()?;
            for (i, byte) in tail.iter_mut().enumerate() {
                self.crypt_byte(byte, i, encrypting);
            }
            self.mres = tail.len();
        }
        Ok(())
    }

    fn next_keystream(&mut self) -> Result<(), CryptoError> {
        self.ks = self.ctr;
        self.cipher.encrypt_block(&mut self.ks)?;
        inc64(&mut self.ctr);
        self.blocks += 1;
        Ok(())
    }

    fn crypt_byte(&mut self, byte: &mut u8, n: usize, encrypting: bool) {
        if encrypting {
            self.cmac[n] ^= *byte;
            *byte ^= self.ks[n];
        } else {
            *byte ^= self.ks[n];
            self.cmac[n] ^= *byte;
        }
    }

    fn compute_tag(&mut self) -> Result<[u8; BLOCK_SIZE], CryptoError> {
        match self.state {
            State::Finished => return Ok(self.tag),
            State::Active => {}
            State::NoIv | State::Poisoned => return Err(CryptoError::SequenceViolation),
        }
        if self.processed != self.mlen {
            return Err(CryptoError::SequenceViolation);
        }
        self.start_mac()?;
        if self.mres != 0 {
            self.cipher.encrypt_block(&mut self.cmac)?;
            self.blocks += 1;
            self.mres = 0;
        }
        let mut tag = self.cmac;
        xor_in_place(&mut tag, &self.s0);
        self.tag = tag;
        self.state = State::Finished;
        Ok(tag)
    }

    /// Write `min(M, out.len())` tag bytes; returns how many were written.
    ///
    /// The whole message must have been processed.
    pub fn tag(&mut self, out: &mut [u8]) -> Result<usize, CryptoError> {
        let computed = self.compute_tag()?;
        let n = out.len().min(self.m);
        out[..n].copy_from_slice(&computed[..n]);
        Ok(n)
    }

    /// Verify an `M`-byte tag in constant time.
    ///
    /// On mismatch the context is poisoned until the next `set_iv`.
    pub fn finish(&mut self, tag: &[u8]) -> Result<(), CryptoError> {
        if tag.len() != self.m {
            return Err(CryptoError::InvalidTagLength);
        }
        let computed = self.compute_tag()?;
        if computed[..self.m].ct_eq(tag).unwrap_u8() != 1 {
            self.state = State::Poisoned;
            return Err(CryptoError::AeadTagVerifyFail);
        }
        Ok(())
    }
}

impl<C: BlockCipher + ?Sized> Drop for Ccm<'_, C> {
    fn drop(&mut self) {
        self.s0.zeroize();
        self.ks.zeroize();
        self.cmac.zeroize();
        self.tag.zeroize();
    }
}

// ---------------------------------------------------------------------------
// AES-CCM public API
// ---------------------------------------------------------------------------

/// Encrypt and authenticate data using AES-CCM mode.
///
/// # Parameters
/// - `key`: AES key (16, 24, or 32 bytes).
/// - `nonce`: Nonce (7-13 bytes; 12 is typical for TLS).
/// - `aad`: Additional authenticated data.
/// - `plaintext`: Data to encrypt.
/// - `tag_len`: Desired tag length (4, 6, 8, 10, 12, 14, or 16).
///
/// # Returns
/// Ciphertext || tag.
pub fn ccm_encrypt(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    plaintext: &[u8],
    tag_len: usize,
) -> Result<Vec<u8>, CryptoError> {
    let cipher = AesKey::new(key)?;
    ccm_encrypt_impl(&cipher, nonce, aad, plaintext, tag_len)
}

/// Decrypt and verify data using AES-CCM mode.
pub fn ccm_decrypt(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
    tag_len: usize,
) -> Result<Vec<u8>, CryptoError> {
    let cipher = AesKey::new(key)?;
    ccm_decrypt_impl(&cipher, nonce, aad, ciphertext, tag_len)
}

// ---------------------------------------------------------------------------
// SM4-CCM public API
// ---------------------------------------------------------------------------

/// Encrypt and authenticate data using SM4-CCM mode. Returns ciphertext || tag.
#[cfg(feature = "sm4")]
pub fn sm4_ccm_encrypt(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    plaintext: &[u8],
    tag_len: usize,
) -> Result<Vec<u8>, CryptoError> {
    let cipher = crate::sm4::Sm4Key::new(key)?;
    ccm_encrypt_impl(&cipher, nonce, aad, plaintext, tag_len)
}

/// Decrypt and verify data using SM4-CCM mode.
#[cfg(feature = "sm4")]
pub fn sm4_ccm_decrypt(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
    tag_len: usize,
) -> Result<Vec<u8>, CryptoError> {
    let cipher = crate::sm4::Sm4Key::new(key)?;
    ccm_decrypt_impl(&cipher, nonce, aad, ciphertext, tag_len)
}

// ---------------------------------------------------------------------------
// Generic one-shot helpers
// ---------------------------------------------------------------------------

fn one_shot<'k, C: BlockCipher + ?Sized>(
    cipher: &'k C,
    nonce: &[u8],
    aad: &[u8],
    mlen: usize,
    tag_len: usize,
) -> Result<Ccm<'k, C>, CryptoError> {
    // Nonce length: 7-13 bytes
    if nonce.len() < 7 || nonce.len() > 13 {
        return Err(CryptoError::InvalidIvLength);
    }
    let mut ccm = Ccm::new(cipher, tag_len, 15 - nonce.len())?;
    ccm.set_iv(nonce, mlen as u64)?;
    ccm.aad(aad)?;
    Ok(ccm)
}

fn ccm_encrypt_impl<C: BlockCipher + ?Sized>(
    cipher: &C,
    nonce: &[u8],
    aad: &[u8],
    plaintext: &[u8],
    tag_len: usize,
) -> Result<Vec<u8>, CryptoError> {
    let mut ccm = one_shot(cipher, nonce, aad, plaintext.len(), tag_len)?;
    let mut out = Vec::with_capacity(plaintext.len() + tag_len);
    out.extend_from_slice(plaintext);
    ccm.encrypt_ccm64(&mut out)?;
    let mut tag = [0u8; BLOCK_SIZE];
    let n = ccm.tag(&mut tag)?;
    out.extend_from_slice(&tag[..n]);
    Ok(out)
}

fn ccm_decrypt_impl<C: BlockCipher + ?Sized>(
    cipher: &C,
    nonce: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
    tag_len: usize,
) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.len() < tag_len {
        return Err(CryptoError::InvalidArg);
    }
    let ct_len = ciphertext.len() - tag_len;
    let (ct_data, received_tag) = ciphertext.split_at(ct_len);

    let mut ccm = one_shot(cipher, nonce, aad, ct_len, tag_len)?;
    let mut plaintext = ct_data.to_vec();
    ccm.decrypt_ccm64(&mut plaintext)?;
    if let Err(e) = ccm.finish(received_tag) {
        plaintext.zeroize();
        return Err(e);
    }
    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex_to_bytes(s: &str) -> Vec<u8> {
        hex::decode(s).unwrap()
    }

    const KEY: &str = "404142434445464748494a4b4c4d4e4f";

    // NIST SP 800-38C Example 1
    #[test]
    fn test_ccm_nist_example1() {
        let key = hex_to_bytes(KEY);
        let nonce = hex_to_bytes("10111213141516");
        let aad = hex_to_bytes("0001020304050607");
        let pt = hex_to_bytes("20212223");

        let ct = ccm_encrypt(&key, &nonce, &aad, &pt, 4).unwrap();
        assert_eq!(hex::encode(&ct), "7162015b4dac255d");

        let decrypted = ccm_decrypt(&key, &nonce, &aad, &ct, 4).unwrap();
        assert_eq!(decrypted, pt);
    }

    // NIST SP 800-38C Example 2
    #[test]
    fn test_ccm_nist_example2() {
        let key = hex_to_bytes(KEY);
        let nonce = hex_to_bytes("1011121314151617");
        let aad = hex_to_bytes("000102030405060708090a0b0c0d0e0f");
        let pt = hex_to_bytes("202122232425262728292a2b2c2d2e2f");

        let ct = ccm_encrypt(&key, &nonce, &aad, &pt, 6).unwrap();
        assert_eq!(
            hex::encode(&ct),
            "d2a1f0e051ea5f62081a7792073d593d1fc64fbfaccd"
        );

        let decrypted = ccm_decrypt(&key, &nonce, &aad, &ct, 6).unwrap();
        assert_eq!(decrypted, pt);
    }

    // NIST SP 800-38C Example 3, streamed in uneven pieces.
    #[test]
    fn test_ccm_nist_example3_streaming() {
        let cipher = AesKey::new(&hex_to_bytes(KEY)).unwrap();
        let nonce = hex_to_bytes("101112131415161718191a1b");
        let aad = hex_to_bytes("000102030405060708090a0b0c0d0e0f10111213");
        let pt = hex_to_bytes("202122232425262728292a2b2c2d2e2f3031323334353637");
        let expected_ct = "e3b201a9f5b71a7a9b1ceaeccd97e70b6176aad9a4428aa5";
        let expected_tag = "484392fbc1b09951";

        for split in [0usize, 1, 5, 16, 17, 24] {
            let mut ccm = Ccm::new(&cipher, 8, 3).unwrap();
            ccm.set_iv(&nonce, pt.len() as u64).unwrap();
            ccm.aad(&aad).unwrap();
            let mut data = pt.clone();
            let (a, b) = data.split_at_mut(split);
            ccm.encrypt(a).unwrap();
            ccm.encrypt_ccm64(b).unwrap();
            let mut tag = [0u8; 16];
            assert_eq!(ccm.tag(&mut tag).unwrap(), 8);
            assert_eq!(hex::encode(&data), expected_ct, "split {split}");
            assert_eq!(hex::encode(&tag[..8]), expected_tag, "split {split}");

            let mut ccm = Ccm::new(&cipher, 8, 3).unwrap();
            ccm.set_iv(&nonce, pt.len() as u64).unwrap();
            ccm.aad(&aad).unwrap();
            let (a, b) = data.split_at_mut(split);
            ccm.decrypt_ccm64(a).unwrap();
            ccm.decrypt(b).unwrap();
            ccm.finish(&tag[..8]).unwrap();
            assert_eq!(data, pt);
        }
    }

    #[test]
    fn test_ccm_tag_length_per_m() {
        let cipher = AesKey::new(&[0x24u8; 16]).unwrap();
        let nonce = [0x11u8; 13];
        for m in (4..=16).step_by(2) {
            let mut ccm = Ccm::new(&cipher, m, 2).unwrap();
            ccm.set_iv(&nonce, 3).unwrap();
            ccm.encrypt(&mut [1, 2, 3]).unwrap();
            let mut tag = [0u8; 16];
            assert_eq!(ccm.tag(&mut tag).unwrap(), m);
            assert_eq!(ccm.tag(&mut tag[..2]).unwrap(), 2);
        }
        for bad in [0usize, 3, 5, 18] {
            assert!(matches!(
                Ccm::new(&cipher, bad, 2),
                Err(CryptoError::InvalidTagLength)
            ));
        }
        assert!(matches!(Ccm::new(&cipher, 8, 1), Err(CryptoError::InvalidArg)));
        assert!(matches!(Ccm::new(&cipher, 8, 9), Err(CryptoError::InvalidArg)));
    }

    #[test]
    fn test_ccm_different_m_fails() {
        let key = [0x42u8; 16];
        let nonce = [0u8; 12];
        let ct = ccm_encrypt(&key, &nonce, b"aad", b"payload", 8).unwrap();
        // Same bytes reinterpreted with a 6-byte tag must not verify.
        assert!(ccm_decrypt(&key, &nonce, b"aad", &ct, 6).is_err());
        // Truncating the tag does not produce a valid shorter tag either.
        assert!(ccm_decrypt(&key, &nonce, b"aad", &ct[..ct.len() - 2], 6).is_err());
    }

    #[test]
    fn test_ccm_nonce_must_match_l() {
        let cipher = AesKey::new(&[0u8; 16]).unwrap();
        let mut ccm = Ccm::new(&cipher, 16, 3).unwrap();
        assert_eq!(ccm.set_iv(&[0u8; 11], 0), Err(CryptoError::InvalidIvLength));
        assert_eq!(ccm.set_iv(&[0u8; 13], 0), Err(CryptoError::InvalidIvLength));
        // L = 3 caps the message at 2^24 - 1 bytes.
        assert_eq!(ccm.set_iv(&[0u8; 12], 1 << 24), Err(CryptoError::InputOverflow));
        assert!(ccm.set_iv(&[0u8; 12], (1 << 24) - 1).is_ok());
    }

    #[test]
    fn test_ccm_sequencing() {
        let cipher = AesKey::new(&[0u8; 16]).unwrap();
        let mut ccm = Ccm::new(&cipher, 16, 2).unwrap();
        assert_eq!(ccm.aad(b"x"), Err(CryptoError::SequenceViolation));

        ccm.set_iv(&[0u8; 13], 4).unwrap();
        ccm.aad(b"").unwrap();
        ccm.aad(b"header").unwrap();
        assert_eq!(ccm.aad(b"again"), Err(CryptoError::SequenceViolation));

        let mut data = [0u8; 5];
        assert_eq!(ccm.encrypt(&mut data), Err(CryptoError::InputOverflow));
        ccm.encrypt(&mut data[..3]).unwrap();
        let mut tag = [0u8; 16];
        assert_eq!(ccm.tag(&mut tag), Err(CryptoError::SequenceViolation));
        ccm.encrypt(&mut data[3..4]).unwrap();
        assert_eq!(ccm.tag(&mut tag).unwrap(), 16);
    }

    #[test]
    fn test_ccm_aad_after_payload_rejected() {
        let cipher = AesKey::new(&[0u8; 16]).unwrap();
        let mut ccm = Ccm::new(&cipher, 16, 2).unwrap();
        ccm.set_iv(&[0u8; 13], 4).unwrap();
        ccm.encrypt(&mut [0u8; 2]).unwrap();
        assert_eq!(ccm.aad(b"late"), Err(CryptoError::SequenceViolation));
    }

    #[test]
    fn test_ccm_long_aad_prefix() {
        // 0xFF00 bytes of AAD switch to the FF FE + 4-byte encoding.
        let key = [0x42u8; 16];
        let nonce = [0u8; 12];
        let aad = vec![0xa5u8; 0xff00];
        let ct = ccm_encrypt(&key, &nonce, &aad, b"pt", 16).unwrap();
        assert_eq!(ccm_decrypt(&key, &nonce, &aad, &ct, 16).unwrap(), b"pt");

        let short = vec![0xa5u8; 0xfeff];
        let ct_short = ccm_encrypt(&key, &nonce, &short, b"pt", 16).unwrap();
        assert_ne!(ct_short[2..], ct[2..]);
    }

    #[test]
    fn test_ccm_failure_poisons_context() {
        let cipher = AesKey::new(&[9u8; 16]).unwrap();
        let mut ccm = Ccm::new(&cipher, 8, 2).unwrap();
        ccm.set_iv(&[1u8; 13], 0).unwrap();
        assert_eq!(ccm.finish(&[0u8; 4]), Err(CryptoError::InvalidTagLength));
        assert_eq!(ccm.finish(&[0u8; 8]), Err(CryptoError::AeadTagVerifyFail));
        let mut tag = [0u8; 8];
        assert_eq!(ccm.tag(&mut tag), Err(CryptoError::SequenceViolation));
    }

    #[test]
    fn test_ccm_counter_exhaustion() {
        let cipher = AesKey::new(&[9u8; 16]).unwrap();
        let mut ccm = Ccm::new(&cipher, 8, 8).unwrap();
        ccm.set_iv(&[1u8; 7], 64).unwrap();
        ccm.blocks = MAX_BLOCKS - 2;
        assert_eq!(
            ccm.encrypt(&mut [0u8; 32]),
            Err(CryptoError::CounterExhausted)
        );
    }

    #[test]
    fn test_ccm_auth_failure() {
        let key = [0x42u8; 16];
        let nonce = [0u8; 12];
        let aad = b"authenticated data";
        let pt = b"secret message";

        let mut ct = ccm_encrypt(&key, &nonce, aad, pt, 16).unwrap();
        ct[0] ^= 0xff;
        assert_eq!(
            ccm_decrypt(&key, &nonce, aad, &ct, 16),
            Err(CryptoError::AeadTagVerifyFail)
        );
    }

    #[test]
    fn test_ccm_empty_plaintext() {
        let key = [0u8; 16];
        let nonce = [0u8; 12];
        let ct = ccm_encrypt(&key, &nonce, b"aad", &[], 8).unwrap();
        assert_eq!(ct.len(), 8); // tag only
        let pt = ccm_decrypt(&key, &nonce, b"aad", &ct, 8).unwrap();
        assert!(pt.is_empty());
    }

    #[cfg(feature = "sm4")]
    #[test]
    fn test_sm4_ccm_roundtrip() {
        let key = [0x42u8; 16];
        let nonce = [0x01u8; 12];
        let aad = b"additional data";
        let plaintext = b"hello SM4-CCM";

        let ct = sm4_ccm_encrypt(&key, &nonce, aad, plaintext, 16).unwrap();
        assert_eq!(ct.len(), plaintext.len() + 16);

        let pt = sm4_ccm_decrypt(&key, &nonce, aad, &ct, 16).unwrap();
        assert_eq!(pt, plaintext);
    }
}
