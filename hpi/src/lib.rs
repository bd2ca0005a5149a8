//! Reader for the HPI archive container format.
//!
//! HPI is a flat-file game-asset archive: a tree of files and directories
//! with per-chunk compression, wrapped in a key-derived XOR obfuscation
//! layer. This crate parses the directory tree, resolves entries by
//! case-insensitive path and extracts file contents, transparently
//! decrypting and decompressing as required.
//!
//! ```no_run
//! use std::fs::File;
//! use std::io::BufReader;
//! use hpi::HpiArchive;
//!
//! # fn main() -> hpi::Result<()> {
//! let stream = BufReader::new(File::open("totala1.hpi")?);
//! let archive = HpiArchive::open(stream)?;
//!
//! if let Some(file) = archive.find_file("gamedata/ARMOR.TDF") {
//!     let mut contents = vec![0u8; file.size as usize];
//!     archive.extract(file, &mut contents)?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod decompress;
pub mod directory;
pub mod error;
pub mod header;
pub mod reader;

pub use archive::HpiArchive;
pub use directory::{Directory, Entry, EntryKind, File};
pub use error::{Error, Result};
pub use header::{ArchiveHeader, ChunkHeader};
pub use reader::CipherReader;

/// Magic number at the start of every HPI archive ("HAPI").
pub const HPI_MAGIC: u32 = 0x4950_4148;

/// Version field value for standard archives.
pub const HPI_VERSION: u32 = 0x0001_0000;

/// Version field value used by saved-game files ("BANK"); not supported.
pub const HPI_BANK_VERSION: u32 = 0x4B4E_4142;

/// Magic number at the start of every compressed chunk ("SQSH").
pub const CHUNK_MAGIC: u32 = 0x4853_5153;

/// Maximum number of decompressed bytes covered by a single chunk.
pub const CHUNK_SIZE: u32 = 65536;

/// Compression schemes used by HPI files and chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionType {
    /// Stored as-is (type 0)
    None = 0,
    /// LZ77 with a 4 KiB sliding window (type 1)
    Lz77 = 1,
    /// DEFLATE with a zlib wrapper (type 2)
    Zlib = 2,
}

impl CompressionType {
    /// Parse a compression type from its on-disk byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::None),
            1 => Some(Self::Lz77),
            2 => Some(Self::Zlib),
            _ => None,
        }
    }

    /// Get the on-disk byte representation.
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}
