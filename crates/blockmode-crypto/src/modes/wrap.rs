//! Key Wrap (RFC 3394) and Key Wrap with Padding (RFC 5649).
//!
//! Both variants are generic over any 128-bit [`BlockCipher`]; the
//! `key_wrap`/`key_unwrap` helpers bind them to AES.

use crate::aes::AesKey;
use crate::provider::BlockCipher;
use blockmode_types::CryptoError;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

/// Default initial value for RFC 3394 wrapping.
pub const DEFAULT_IV: [u8; 8] = [0xA6; 8];

/// Default alternative initial value prefix for RFC 5649 wrapping.
pub const DEFAULT_AIV: [u8; 4] = [0xA6, 0x59, 0x59, 0xA6];

/// Largest input accepted by either variant.
const WRAP_MAX: usize = 1 << 31;

fn xor_counter(a: &mut [u8; 8], t: u64) {
    for (x, y) in a.iter_mut().zip(t.to_be_bytes()) {
        *x ^= y;
    }
}

/// Core RFC 3394 wrap of `out[8..]` in place, writing the final `A` to
/// `out[..8]`.
fn wrap_raw<C: BlockCipher + ?Sized>(
    cipher: &C,
    iv: &[u8; 8],
    out: &mut [u8],
) -> Result<(), CryptoError> {
    let n = (out.len() - 8) / 8;
    let mut a = *iv;
    let mut b = [0u8; 16];
    let mut t = 1u64;
    for _ in 0..6 {
        for i in 0..n {
            let r = &mut out[8 + 8 * i..16 + 8 * i];
            b[..8].copy_from_slice(&a);
            b[8..].copy_from_slice(r);
            cipher.encrypt_block(&mut b)?;
            a.copy_from_slice(&b[..8]);
            xor_counter(&mut a, t);
            r.copy_from_slice(&b[8..]);
            t += 1;
        }
    }
    out[..8].copy_from_slice(&a);
    b.zeroize();
    Ok(())
}

/// Core RFC 3394 unwrap. Writes the recovered data to `out` (which must be
/// `input.len() - 8` bytes) and returns the recovered integrity value.
fn unwrap_raw<C: BlockCipher + ?Sized>(
    cipher: &C,
    input: &[u8],
    out: &mut [u8],
) -> Result<[u8; 8], CryptoError> {
    let n = out.len() / 8;
    let mut a = [0u8; 8];
    a.copy_from_slice(&input[..8]);
    out.copy_from_slice(&input[8..]);
    let mut b = [0u8; 16];
    let mut t = 6 * n as u64;
    for _ in 0..6 {
        for i in (0..n).rev() {
            let r = &mut out[8 * i..8 * i + 8];
            xor_counter(&mut a, t);
            b[..8].copy_from_slice(&a);
            b[8..].copy_from_slice(r);
            cipher.decrypt_block(&mut b)?;
            a.copy_from_slice(&b[..8]);
            r.copy_from_slice(&b[8..]);
            t -= 1;
        }
    }
    b.zeroize();
    Ok(a)
}

/// Wrap `data` (a multiple of 8 bytes, at least 16) under `cipher`.
///
/// Output is 8 bytes longer than the input. `iv` defaults to
/// [`DEFAULT_IV`].
pub fn wrap<C: BlockCipher + ?Sized>(
    cipher: &C,
    iv: Option<&[u8; 8]>,
    data: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if data.len() % 8 != 0 || data.len() < 16 || data.len() > WRAP_MAX {
        return Err(CryptoError::InvalidArg);
    }
    let mut out = vec![0u8; data.len() + 8];
    out[8..].copy_from_slice(data);
    wrap_raw(cipher, iv.unwrap_or(&DEFAULT_IV), &mut out)?;
    Ok(out)
}

/// Unwrap `data` produced by [`wrap`] and verify the integrity value.
///
/// On mismatch nothing is returned and the intermediate plaintext is
/// wiped.
pub fn unwrap<C: BlockCipher + ?Sized>(
    cipher: &C,
    iv: Option<&[u8; 8]>,
    data: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if data.len() % 8 != 0 || data.len() < 24 || data.len() - 8 > WRAP_MAX {
        return Err(CryptoError::InvalidArg);
    }
    let mut out = vec![0u8; data.len() - 8];
    let mut a = unwrap_raw(cipher, data, &mut out)?;
    let ok = a[..].ct_eq(&iv.unwrap_or(&DEFAULT_IV)[..]);
    a.zeroize();
    if !bool::from(ok) {
        out.zeroize();
        return Err(CryptoError::WrapIntegrityFail);
    }
    Ok(out)
}

/// Wrap `data` of any length from 1 byte using the RFC 5649 padding
/// scheme. `icv` defaults to [`DEFAULT_AIV`].
pub fn wrap_pad<C: BlockCipher + ?Sized>(
    cipher: &C,
    icv: Option<&[u8; 4]>,
    data: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if data.is_empty() || data.len() >= WRAP_MAX {
        return Err(CryptoError::InvalidArg);
    }
    let padded_len = data.len().div_ceil(8) * 8;

    let mut aiv = [0u8; 8];
    aiv[..4].copy_from_slice(icv.unwrap_or(&DEFAULT_AIV));
    aiv[4..].copy_from_slice(&(data.len() as u32).to_be_bytes());

    let mut out = vec![0u8; padded_len + 8];
    out[8..8 + data.len()].copy_from_slice(data);
    if padded_len == 8 {
        // A single padded block is enciphered directly.
        out[..8].copy_from_slice(&aiv);
        cipher.encrypt_block(&mut out)?;
    } else {
        wrap_raw(cipher, &aiv, &mut out)?;
    }
    Ok(out)
}

/// Unwrap `data` produced by [`wrap_pad`], checking the integrity value,
/// the declared length and that the padding bytes are zero.
pub fn unwrap_pad<C: BlockCipher + ?Sized>(
    cipher: &C,
    icv: Option<&[u8; 4]>,
    data: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if data.len() % 8 != 0 || data.len() < 16 || data.len() >= WRAP_MAX + 8 {
        return Err(CryptoError::InvalidArg);
    }
    let padded_len = data.len() - 8;
    let n = padded_len / 8;

    let mut out = vec![0u8; padded_len];
    let mut aiv = if data.len() == 16 {
        let mut block = [0u8; 16];
        block.copy_from_slice(data);
        cipher.decrypt_block(&mut block)?;
        out.copy_from_slice(&block[8..]);
        let mut aiv = [0u8; 8];
        aiv.copy_from_slice(&block[..8]);
        block.zeroize();
        aiv
    } else {
        unwrap_raw(cipher, data, &mut out)?
    };

    let icv_ok = aiv[..4].ct_eq(&icv.unwrap_or(&DEFAULT_AIV)[..]);
    let mli = u32::from_be_bytes([aiv[4], aiv[5], aiv[6], aiv[7]]) as usize;
    aiv.zeroize();
    let len_ok = mli > 8 * (n - 1) && mli <= 8 * n;

    let mut valid = bool::from(icv_ok) && len_ok;
    if valid {
        let mut pad = 0u8;
        for &b in &out[mli..] {
            pad |= b;
        }
        valid = bool::from(pad.ct_eq(&0));
    }
    if !valid {
        out.zeroize();
        return Err(CryptoError::WrapIntegrityFail);
    }
    out.truncate(mli);
    Ok(out)
}

/// Wrap a key using AES Key Wrap (RFC 3394).
pub fn key_wrap(kek: &[u8], plaintext_key: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = AesKey::new(kek)?;
    wrap(&cipher, None, plaintext_key)
}

/// Unwrap a key using AES Key Wrap (RFC 3394).
pub fn key_unwrap(kek: &[u8], wrapped_key: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = AesKey::new(kek)?;
    unwrap(&cipher, None, wrapped_key)
}

/// Wrap a key of any length using AES Key Wrap with Padding (RFC 5649).
pub fn key_wrap_pad(kek: &[u8], plaintext_key: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = AesKey::new(kek)?;
    wrap_pad(&cipher, None, plaintext_key)
}

/// Unwrap a key using AES Key Wrap with Padding (RFC 5649).
pub fn key_unwrap_pad(kek: &[u8], wrapped_key: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = AesKey::new(kek)?;
    unwrap_pad(&cipher, None, wrapped_key)
}
