//! Fixed-layout header records.
//!
//! The archive opens with two clear-text records (magic + version, then
//! directory geometry and key); every compressed chunk opens with a
//! "SQSH"-tagged framing header. All fields are little-endian and packed.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Read;
use tracing::debug;

use crate::error::{Error, Result};
use crate::{CHUNK_MAGIC, HPI_MAGIC, HPI_VERSION};

/// The archive-level header: directory geometry plus the raw key field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveHeader {
    /// Size of the directory blob in bytes, including the unreferenced
    /// prefix before `directory_start`.
    pub directory_size: u32,
    /// Raw key field; the obfuscation key is derived from its low byte.
    pub header_key: u32,
    /// Absolute offset of the root directory record.
    pub directory_start: u32,
}

impl ArchiveHeader {
    /// On-disk size of the version record plus the header record.
    pub const SIZE: usize = 20;

    /// Parse the version and header records from the start of the stream.
    /// Both are stored in clear.
    pub fn parse<R: Read>(f: &mut R) -> Result<Self> {
        let magic = f.read_u32::<LittleEndian>()?;
        if magic != HPI_MAGIC {
            return Err(Error::BadMagic {
                expected: HPI_MAGIC,
                actual: magic,
            });
        }

        let version = f.read_u32::<LittleEndian>()?;
        if version != HPI_VERSION {
            // Covers the "BANK" saved-game marker as well.
            return Err(Error::UnsupportedVersion(version));
        }

        let directory_size = f.read_u32::<LittleEndian>()?;
        let header_key = f.read_u32::<LittleEndian>()?;
        let directory_start = f.read_u32::<LittleEndian>()?;

        debug!(directory_size, header_key, directory_start, "parsed archive header");

        Ok(Self {
            directory_size,
            header_key,
            directory_start,
        })
    }
}

/// Framing header in front of every compressed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub version: u8,
    /// Compression of this chunk's payload; independent of the file-level
    /// flag.
    pub compression: u8,
    /// Nonzero when the payload carries the index-keyed byte scramble.
    pub encoded: u8,
    pub compressed_size: u32,
    pub decompressed_size: u32,
    /// 32-bit sum of the payload bytes as stored (before unscrambling).
    pub checksum: u32,
}

impl ChunkHeader {
    /// On-disk size: a packed u32, three u8 flags and three u32 fields.
    pub const SIZE: usize = 19;

    /// Parse a chunk header from already-decrypted bytes.
    pub fn parse<R: Read>(f: &mut R) -> Result<Self> {
        let magic = f.read_u32::<LittleEndian>()?;
        if magic != CHUNK_MAGIC {
            return Err(Error::BadMagic {
                expected: CHUNK_MAGIC,
                actual: magic,
            });
        }

        let version = f.read_u8()?;
        let compression = f.read_u8()?;
        let encoded = f.read_u8()?;
        let compressed_size = f.read_u32::<LittleEndian>()?;
        let decompressed_size = f.read_u32::<LittleEndian>()?;
        let checksum = f.read_u32::<LittleEndian>()?;

        Ok(Self {
            version,
            compression,
            encoded,
            compressed_size,
            decompressed_size,
            checksum,
        })
    }
}
