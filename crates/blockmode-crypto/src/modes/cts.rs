//! CBC with ciphertext stealing.
//!
//! Two output orderings are supported:
//!
//! * [`cts_encrypt`] / [`cts_decrypt`]: the last two ciphertext blocks are
//!   always swapped (NIST SP 800-38A Addendum CS3, RFC 3962 Kerberos
//!   ordering). Input must be longer than one block.
//! * [`nist_cts_encrypt`] / [`nist_cts_decrypt`]: the truncated
//!   penultimate block comes first (CS1). Aligned input is plain CBC.
//!   Input must be at least one block.
//!
//! All functions work in place, chain through `iv` the way CBC does, and
//! return the number of bytes processed.

use super::cbc::Cbc;
use crate::provider::{xor_in_place, BlockCipher, BLOCK_SIZE};
use blockmode_types::CryptoError;

fn cbc_encrypt_run<C: BlockCipher + ?Sized>(
    cipher: &C,
    iv: &mut [u8; BLOCK_SIZE],
    data: &mut [u8],
) -> Result<(), CryptoError> {
    let mut cbc = Cbc::new(cipher, &iv[..])?;
    cbc.encrypt(data)?;
    *iv = *cbc.iv();
    Ok(())
}

fn cbc_decrypt_run<C: BlockCipher + ?Sized>(
    cipher: &C,
    iv: &mut [u8; BLOCK_SIZE],
    data: &mut [u8],
) -> Result<(), CryptoError> {
    let mut cbc = Cbc::new(cipher, &iv[..])?;
    cbc.decrypt(data)?;
    *iv = *cbc.iv();
    Ok(())
}

fn copy_block(src: &[u8]) -> [u8; BLOCK_SIZE] {
    let mut out = [0u8; BLOCK_SIZE];
    out.copy_from_slice(&src[..BLOCK_SIZE]);
    out
}

/// `out` holds `Cn ‖ C(n-1)[..residue]`; overwrite it with `P(n-1) ‖ Pn`.
fn steal_back<C: BlockCipher + ?Sized>(
    cipher: &C,
    iv: &mut [u8; BLOCK_SIZE],
    cn: [u8; BLOCK_SIZE],
    out: &mut [u8],
) -> Result<(), CryptoError> {
    let residue = out.len() - BLOCK_SIZE;

    // D(Cn) = C(n-1) ^ (Pn ‖ 0), so its tail completes C(n-1).
    let mut dn = cn;
    cipher.decrypt_block(&mut dn)?;
    let mut prev = dn;
    prev[..residue].copy_from_slice(&out[BLOCK_SIZE..]);

    let mut p_prev = prev;
    cipher.decrypt_block(&mut p_prev)?;
    xor_in_place(&mut p_prev, iv);

    for (o, &d) in out[BLOCK_SIZE..].iter_mut().zip(dn.iter()) {
        *o ^= d;
    }
    out[..BLOCK_SIZE].copy_from_slice(&p_prev);
    *iv = cn;
    Ok(())
}

/// Encrypt with CS3 ordering: `C1 … C(n-2) ‖ Cn ‖ C(n-1)[..residue]`.
pub fn cts_encrypt<C: BlockCipher + ?Sized>(
    cipher: &C,
    iv: &mut [u8; BLOCK_SIZE],
    data: &mut [u8],
) -> Result<usize, CryptoError> {
    let len = data.len();
    if len <= BLOCK_SIZE {
        return Err(CryptoError::InvalidArg);
    }
    let residue = match len % BLOCK_SIZE {
        0 => BLOCK_SIZE,
        r => r,
    };
    let head = len - residue;
    cbc_encrypt_run(cipher, iv, &mut data[..head])?;

    let mut cn = *iv;
    xor_in_place(&mut cn, &data[head..]);
    cipher.encrypt_block(&mut cn)?;

    let prev = copy_block(&data[head - BLOCK_SIZE..]);
    data[head..].copy_from_slice(&prev[..residue]);
    data[head - BLOCK_SIZE..head].copy_from_slice(&cn);
    *iv = cn;
    Ok(len)
}

/// Decrypt CS3-ordered ciphertext produced by [`cts_encrypt`].
pub fn cts_decrypt<C: BlockCipher + ?Sized>(
    cipher: &C,
    iv: &mut [u8; BLOCK_SIZE],
    data: &mut [u8],
) -> Result<usize, CryptoError> {
    let len = data.len();
    if len <= BLOCK_SIZE {
        return Err(CryptoError::InvalidArg);
    }
    let residue = match len % BLOCK_SIZE {
        0 => BLOCK_SIZE,
        r => r,
    };
    let head = len - BLOCK_SIZE - residue;
    cbc_decrypt_run(cipher, iv, &mut data[..head])?;

    let cn = copy_block(&data[head..]);
    steal_back(cipher, iv, cn, &mut data[head..])?;
    Ok(len)
}

/// Encrypt with CS1 ordering: `C1 … C(n-2) ‖ C(n-1)[..residue] ‖ Cn`.
pub fn nist_cts_encrypt<C: BlockCipher + ?Sized>(
    cipher: &C,
    iv: &mut [u8; BLOCK_SIZE],
    data: &mut [u8],
) -> Result<usize, CryptoError> {
    let len = data.len();
    if len < BLOCK_SIZE {
        return Err(CryptoError::InvalidArg);
    }
    let residue = len % BLOCK_SIZE;
    let head = len - residue;
    cbc_encrypt_run(cipher, iv, &mut data[..head])?;
    if residue == 0 {
        return Ok(len);
    }

    let mut cn = *iv;
    xor_in_place(&mut cn, &data[head..]);
    cipher.encrypt_block(&mut cn)?;

    // C(n-1)[..residue] is already in place; Cn overwrites the rest.
    data[head - BLOCK_SIZE + residue..].copy_from_slice(&cn);
    *iv = cn;
    Ok(len)
}

/// Decrypt CS1-ordered ciphertext produced by [`nist_cts_encrypt`].
pub fn nist_cts_decrypt<C: BlockCipher + ?Sized>(
    cipher: &C,
    iv: &mut [u8; BLOCK_SIZE],
    data: &mut [u8],
) -> Result<usize, CryptoError> {
    let len = data.len();
    if len < BLOCK_SIZE {
        return Err(CryptoError::InvalidArg);
    }
    let residue = len % BLOCK_SIZE;
    if residue == 0 {
        cbc_decrypt_run(cipher, iv, data)?;
        return Ok(len);
    }
    let head = len - BLOCK_SIZE - residue;
    cbc_decrypt_run(cipher, iv, &mut data[..head])?;

    // Rotate into CS3 order, then share the CS3 tail logic.
    let tail = &mut data[head..];
    let cn = copy_block(&tail[residue..]);
    tail.copy_within(..residue, BLOCK_SIZE);
    tail[..BLOCK_SIZE].copy_from_slice(&cn);
    steal_back(cipher, iv, cn, tail)?;
    Ok(len)
}
