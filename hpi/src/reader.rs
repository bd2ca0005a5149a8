//! Obfuscating stream reader.
//!
//! Every directory and data read in an HPI archive is XOR-obfuscated with
//! a key derived from the header, mixed with each byte's own absolute
//! stream position. Reads that land at the same offset always decrypt
//! identically, regardless of granularity, so the scheme is safe to layer
//! under random-access parsing.

use std::io::{Read, Seek, SeekFrom};

use crate::Result;

/// Derive the 8-bit obfuscation key from the header's `header_key` field.
///
/// Takes the low byte and rotates it left by two. A derived key of zero
/// means the archive is stored in clear.
pub fn derive_key(header_key: u32) -> u8 {
    let h = header_key as u8;
    (h << 2) | (h >> 6)
}

/// Decrypt `buf` in place, where `seed` is the stream position of its
/// first byte truncated to 8 bits. A key of zero leaves the buffer
/// untouched.
pub fn decrypt_in_place(key: u8, seed: u8, buf: &mut [u8]) {
    if key == 0 {
        return;
    }

    for (i, byte) in buf.iter_mut().enumerate() {
        let pos = seed.wrapping_add(i as u8);
        *byte ^= pos ^ key;
    }
}

/// Random-access reader layering position-keyed XOR decryption on top of
/// an underlying stream.
#[derive(Debug)]
pub struct CipherReader<R> {
    inner: R,
    key: u8,
}

impl<R: Read + Seek> CipherReader<R> {
    /// Wrap a stream. The key starts at zero, so reads pass through until
    /// [`set_key`](Self::set_key) is called with the derived key.
    pub fn new(inner: R) -> Self {
        Self { inner, key: 0 }
    }

    /// Install the derived obfuscation key.
    pub fn set_key(&mut self, key: u8) {
        self.key = key;
    }

    /// The active obfuscation key; zero when the archive is in clear.
    pub fn key(&self) -> u8 {
        self.key
    }

    /// Seek to an absolute stream offset.
    pub fn seek_to(&mut self, offset: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    /// Current absolute stream position.
    pub fn position(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    /// Read without decryption.
    pub fn read_exact_raw(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf)?;
        Ok(())
    }

    /// Read and decrypt. The seed must be captured before the underlying
    /// read so it reflects the position of the first byte.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let seed = self.inner.stream_position()? as u8;
        self.inner.read_exact(buf)?;
        decrypt_in_place(self.key, seed, buf);
        Ok(())
    }

    /// Read and decrypt a little-endian `u32`.
    pub fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }
}
