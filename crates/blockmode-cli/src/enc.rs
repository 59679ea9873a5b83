//! Container seal/open commands.
//!
//! Supported ciphers: sm4 (the container's native cipher), aes-128,
//! aes-192, aes-256.

use blockmode_crypto::aes::AesKey;
use blockmode_crypto::container::GcmFile;
use blockmode_crypto::sm4::Sm4Key;
use blockmode_crypto::BlockCipher;
use blockmode_types::{BlockCipherId, ContainerError, CryptoError};
use tracing::info;
use zeroize::Zeroizing;

fn build_cipher(name: &str, key: &[u8]) -> Result<Box<dyn BlockCipher>, Box<dyn std::error::Error>> {
    let id = BlockCipherId::from_name(name).ok_or_else(|| {
        format!("cipher '{name}' not supported. Supported: sm4, aes-128, aes-192, aes-256")
    })?;
    if key.len() != id.key_len() {
        return Err(format!(
            "key must be {} bytes ({} hex chars)",
            id.key_len(),
            id.key_len() * 2
        )
        .into());
    }
    let cipher: Box<dyn BlockCipher> = match id {
        BlockCipherId::Sm4 => Box::new(Sm4Key::new(key)?),
        BlockCipherId::Aes128 | BlockCipherId::Aes192 | BlockCipherId::Aes256 => {
            Box::new(AesKey::new(key)?)
        }
    };
    Ok(cipher)
}

/// Status code of a failed seal/open, when it came from the engine.
#[derive(Debug, PartialEq, Eq)]
pub struct Failure {
    pub code: i32,
    /// The container was rejected as forged or corrupted.
    pub integrity: bool,
}

pub fn classify(e: &(dyn std::error::Error + 'static)) -> Option<Failure> {
    if let Some(err) = e.downcast_ref::<ContainerError>() {
        let integrity = matches!(err, ContainerError::Crypto(c) if c.is_integrity_failure());
        return Some(Failure {
            code: err.code(),
            integrity,
        });
    }
    e.downcast_ref::<CryptoError>().map(|err| Failure {
        code: err.code(),
        integrity: err.is_integrity_failure(),
    })
}

fn decode_hex(what: &str, s: &str) -> Result<Zeroizing<Vec<u8>>, Box<dyn std::error::Error>> {
    hex::decode(s.trim())
        .map(Zeroizing::new)
        .map_err(|e| format!("invalid {what} hex: {e}").into())
}

pub fn seal(
    cipher: &str,
    key_hex: &str,
    iv_hex: &str,
    input: &str,
    output: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let key = decode_hex("key", key_hex)?;
    let iv = decode_hex("iv", iv_hex)?;
    let block = build_cipher(cipher, &key)?;

    let mut file = GcmFile::new(&*block);
    file.set_iv(&iv)?;
    let n = file.encrypt_file(input, output)?;
    info!(cipher, bytes = n, input, output, "sealed");
    Ok(())
}

pub fn open(
    cipher: &str,
    key_hex: &str,
    iv_hex: &str,
    input: &str,
    output: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let key = decode_hex("key", key_hex)?;
    let iv = decode_hex("iv", iv_hex)?;
    let block = build_cipher(cipher, &key)?;

    let mut file = GcmFile::new(&*block);
    file.set_iv(&iv)?;
    let n = file.decrypt_file(input, output)?;
    info!(cipher, bytes = n, input, output, "opened");
    Ok(())
}
