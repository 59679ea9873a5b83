//! Authenticated file container (`AYCF-SM4-GCM`).
//!
//! A sealed file is a fixed header followed by the GCM ciphertext:
//!
//! ```text
//! MAGIC (12) | VERSION (1) | TAG (16) | SIZE (8, LE) | CIPHERTEXT
//! ```
//!
//! The tag and size are only known once the whole payload has been
//! streamed, so sealing writes placeholders and patches them afterwards.
//! Opening authenticates the whole payload before any plaintext is
//! written out. The decrypting pass re-checks the tag and size and stages
//! its output, so a source that changes between passes releases nothing.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, warn};
use zeroize::Zeroize;

use crate::modes::gcm::Gcm;
use crate::provider::BlockCipher;
use blockmode_types::{ContainerError, CryptoError};

/// Container magic.
pub const MAGIC: &[u8; 12] = b"AYCF-SM4-GCM";
/// Only format version understood.
pub const VERSION: u8 = 1;
/// Tag length stored in the header.
pub const TAG_LEN: usize = 16;
/// Total header length.
pub const HEADER_LEN: usize = MAGIC.len() + 1 + TAG_LEN + 8;

const TAG_OFFSET: u64 = (MAGIC.len() + 1) as u64;
const CHUNK_LEN: usize = 128;

struct Header {
    tag: [u8; TAG_LEN],
    size: u64,
}

impl Header {
    fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[..MAGIC.len()].copy_from_slice(MAGIC);
        out[MAGIC.len()] = VERSION;
        out[MAGIC.len() + 1..MAGIC.len() + 1 + TAG_LEN].copy_from_slice(&self.tag);
        out[HEADER_LEN - 8..].copy_from_slice(&self.size.to_le_bytes());
        out
    }

    fn read_from<R: Read>(reader: &mut R) -> Result<Self, ContainerError> {
        let mut raw = [0u8; HEADER_LEN];
        reader.read_exact(&mut raw).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => ContainerError::Truncated,
            _ => ContainerError::Io(e),
        })?;
        if &raw[..MAGIC.len()] != MAGIC {
            return Err(ContainerError::BadMagic);
        }
        let version = raw[MAGIC.len()];
        if version != VERSION {
            return Err(ContainerError::UnsupportedVersion(version));
        }
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&raw[MAGIC.len() + 1..MAGIC.len() + 1 + TAG_LEN]);
        let mut size = [0u8; 8];
        size.copy_from_slice(&raw[HEADER_LEN - 8..]);
        Ok(Self {
            tag,
            size: u64::from_le_bytes(size),
        })
    }
}

/// Fill `buf` as far as the reader allows; returns the byte count, which is
/// short only at end of input.
fn read_chunk<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Seals and opens `AYCF-SM4-GCM` containers under one block cipher key.
pub struct GcmFile<'k, C: BlockCipher + ?Sized> {
    cipher: &'k C,
    iv: Option<Vec<u8>>,
}

impl<'k, C: BlockCipher + ?Sized> GcmFile<'k, C> {
    pub fn new(cipher: &'k C) -> Self {
        Self { cipher, iv: None }
    }

    /// Set the IV used by subsequent seal/open calls. Any non-empty length
    /// is accepted; 12 bytes is recommended.
    pub fn set_iv(&mut self, iv: &[u8]) -> Result<(), CryptoError> {
        if iv.is_empty() {
            return Err(CryptoError::InvalidIvLength);
        }
        self.iv = Some(iv.to_vec());
        Ok(())
    }

    fn start(&self) -> Result<Gcm<'k, C>, CryptoError> {
        let iv = self.iv.as_deref().ok_or(CryptoError::SequenceViolation)?;
        let mut gcm = Gcm::new(self.cipher)?;
        gcm.set_iv(iv)?;
        Ok(gcm)
    }

    /// Seal everything `reader` yields into `writer`, starting at the
    /// writer's current position. Returns the payload length.
    pub fn encrypt_stream<R, W>(&self, mut reader: R, mut writer: W) -> Result<u64, ContainerError>
    where
        R: Read,
        W: Write + Seek,
    {
        let mut gcm = self.start()?;
        let start = writer.stream_position()?;
        let placeholder = Header {
            tag: [0u8; TAG_LEN],
            size: 0,
        };
        writer.write_all(&placeholder.encode())?;
        debug!(offset = start, "container header reserved");

        let mut buf = [0u8; CHUNK_LEN];
        let mut total = 0u64;
        loop {
            let n = read_chunk(&mut reader, &mut buf)?;
            if n == 0 {
                break;
            }
            gcm.encrypt(&mut buf[..n])?;
            writer.write_all(&buf[..n])?;
            total += n as u64;
        }
        buf.zeroize();

        let mut header = Header {
            tag: [0u8; TAG_LEN],
            size: total,
        };
        gcm.tag(&mut header.tag)?;
        let end = writer.stream_position()?;
        writer.seek(SeekFrom::Start(start + TAG_OFFSET))?;
        writer.write_all(&header.encode()[TAG_OFFSET as usize..])?;
        writer.seek(SeekFrom::Start(end))?;
        writer.flush()?;

        debug!(bytes = total, "container sealed");
        Ok(total)
    }

    /// Seal the file at `in_path` into a new file at `out_path`.
    pub fn encrypt_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        in_path: P,
        out_path: Q,
    ) -> Result<u64, ContainerError> {
        let input = BufReader::new(File::open(in_path)?);
        let output = BufWriter::new(File::create(out_path)?);
        self.encrypt_stream(input, output)
    }

    /// Parse the header and authenticate the payload without releasing any
    /// plaintext. Leaves `reader` positioned at the start of the payload.
    fn authenticate<R: Read + Seek>(&self, reader: &mut R) -> Result<Header, ContainerError> {
        let header = Header::read_from(reader)?;
        debug!(declared = header.size, "container header parsed");
        let body = reader.stream_position()?;

        let mut gcm = self.start()?;
        let mut buf = [0u8; CHUNK_LEN];
        let mut actual = 0u64;
        loop {
            let n = read_chunk(reader, &mut buf)?;
            if n == 0 {
                break;
            }
            gcm.decrypt(&mut buf[..n])?;
            actual += n as u64;
        }
        buf.zeroize();

        if actual != header.size {
            warn!(
                declared = header.size,
                actual, "container payload size mismatch"
            );
            return Err(ContainerError::SizeMismatch {
                declared: header.size,
                actual,
            });
        }
        if let Err(e) = gcm.finish(&header.tag) {
            warn!("container authentication failed");
            return Err(e.into());
        }
        reader.seek(SeekFrom::Start(body))?;
        Ok(header)
    }

    /// Decrypt an authenticated payload into `writer`, verifying size and
    /// tag again over the bytes actually read. `reader` is at the payload
    /// start. On error, whatever reached `writer` must be discarded.
    fn decrypt_body<R: Read, W: Write>(
        &self,
        reader: &mut R,
        writer: &mut W,
        header: &Header,
    ) -> Result<u64, ContainerError> {
        let mut gcm = self.start()?;
        let mut buf = [0u8; CHUNK_LEN];
        let mut total = 0u64;
        loop {
            let n = read_chunk(reader, &mut buf)?;
            if n == 0 {
                break;
            }
            gcm.decrypt(&mut buf[..n])?;
            writer.write_all(&buf[..n])?;
            total += n as u64;
        }
        buf.zeroize();

        if total != header.size {
            warn!(
                declared = header.size,
                actual = total,
                "container payload changed between passes"
            );
            return Err(ContainerError::SizeMismatch {
                declared: header.size,
                actual: total,
            });
        }
        if let Err(e) = gcm.finish(&header.tag) {
            warn!("container payload changed between passes");
            return Err(e.into());
        }
        writer.flush()?;
        Ok(total)
    }

    /// Open a container read from `reader` into `writer`.
    ///
    /// The payload is authenticated in a first pass; nothing is written to
    /// `writer` unless the tag verifies. Returns the plaintext length.
    pub fn decrypt_stream<R, W>(&self, mut reader: R, mut writer: W) -> Result<u64, ContainerError>
    where
        R: Read + Seek,
        W: Write,
    {
        let header = self.authenticate(&mut reader)?;

        // Plaintext is spooled to an unlinked file until the second pass
        // has verified too.
        let mut spool = BufWriter::new(tempfile::tempfile()?);
        let total = self.decrypt_body(&mut reader, &mut spool, &header)?;
        let mut spool = spool.into_inner().map_err(|e| e.into_error())?;
        spool.seek(SeekFrom::Start(0))?;
        io::copy(&mut spool, &mut writer)?;
        writer.flush()?;
        debug!(bytes = total, "container opened");
        Ok(total)
    }

    /// Open the container at `in_path`. `out_path` appears only once both
    /// passes have verified; until then plaintext goes to a temporary file
    /// in the same directory, removed on failure.
    pub fn decrypt_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        in_path: P,
        out_path: Q,
    ) -> Result<u64, ContainerError> {
        let out_path = out_path.as_ref();
        let mut input = BufReader::new(File::open(in_path)?);
        let header = self.authenticate(&mut input)?;

        let dir = match out_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut staged = BufWriter::new(NamedTempFile::new_in(dir)?);
        let total = self.decrypt_body(&mut input, &mut staged, &header)?;
        let staged = staged.into_inner().map_err(|e| e.into_error())?;
        staged.persist(out_path).map_err(|e| e.error)?;
        debug!(bytes = total, "container opened");
        Ok(total)
    }
}
