//! Archive façade: open, path lookup and extraction.

use std::cell::RefCell;
use std::io::{Cursor, Read, Seek};

use tracing::{debug, trace};

use crate::decompress::{decode_chunk, decompress_chunk};
use crate::directory::{self, Directory, File};
use crate::error::{Error, Result};
use crate::header::{ArchiveHeader, ChunkHeader};
use crate::reader::{derive_key, CipherReader};
use crate::{CompressionType, CHUNK_SIZE};

/// An opened HPI archive: the parsed directory tree plus the stream that
/// file contents are read from lazily.
///
/// The tree is immutable after [`open`](Self::open). Extraction seeks the
/// underlying stream, so a single handle must not be shared across
/// threads; the stream sits behind a `RefCell` so lookups (which borrow
/// the tree) and extraction compose on a shared reference.
pub struct HpiArchive<R> {
    reader: RefCell<CipherReader<R>>,
    root: Directory,
}

impl<R: Read + Seek> HpiArchive<R> {
    /// Parse the archive headers and directory tree from `stream`.
    ///
    /// The stream must stay valid for the archive's lifetime; file
    /// contents are only read when extracted.
    pub fn open(stream: R) -> Result<Self> {
        let mut reader = CipherReader::new(stream);

        let header = {
            let mut head = [0u8; ArchiveHeader::SIZE];
            reader.seek_to(0)?;
            reader.read_exact_raw(&mut head)?;
            ArchiveHeader::parse(&mut Cursor::new(&head))?
        };

        reader.set_key(derive_key(header.header_key));
        debug!(key = reader.key(), "derived obfuscation key");

        if header.directory_start > header.directory_size {
            return Err(Error::OutOfBoundsOffset {
                context: "directory start",
                end: header.directory_start.into(),
                limit: header.directory_size.into(),
            });
        }

        // Offsets inside directory records are absolute within the blob,
        // so the decrypted region lands at its own offset. The prefix
        // stays zeroed and is never referenced.
        let mut blob = vec![0u8; header.directory_size as usize];
        reader.seek_to(header.directory_start.into())?;
        reader.read_exact(&mut blob[header.directory_start as usize..])?;

        let root = directory::parse_root(&blob, header.directory_start)?;
        debug!(entries = root.entries().len(), "parsed directory tree");

        Ok(Self {
            reader: RefCell::new(reader),
            root,
        })
    }

    /// The root directory of the archive.
    pub fn root(&self) -> &Directory {
        &self.root
    }

    /// Look up a file by `/`-separated path, matching each component
    /// ASCII case-insensitively.
    ///
    /// Returns `None` when any component is missing, an intermediate
    /// component is not a directory, or the final component is not a
    /// file.
    pub fn find_file(&self, path: &str) -> Option<&File> {
        let (dir, last) = self.descend(path)?;
        dir.child(last)?.as_file()
    }

    /// Walk all but the last component of `path` and return the directory
    /// reached.
    ///
    /// The final component is not consumed: `find_path("a/b/c")` returns
    /// the directory `b`. Downstream tooling relies on this shape.
    pub fn find_path(&self, path: &str) -> Option<&Directory> {
        let (dir, _) = self.descend(path)?;
        Some(dir)
    }

    fn descend<'a>(&self, path: &'a str) -> Option<(&Directory, &'a str)> {
        let mut components = path.split('/');
        let last = components.next_back()?;

        let mut dir = &self.root;
        for component in components {
            dir = dir.child(component)?.as_directory()?;
        }

        Some((dir, last))
    }

    /// Extract `file` into `out`, decrypting and decompressing as needed.
    ///
    /// `out` must hold at least `file.size` bytes; exactly the leading
    /// `file.size` bytes are written. On error the buffer contents are
    /// indeterminate, but the archive handle stays usable.
    pub fn extract(&self, file: &File, out: &mut [u8]) -> Result<()> {
        if (out.len() as u64) < file.size {
            return Err(Error::OutputOverflow {
                context: "output buffer smaller than the file",
            });
        }

        let out = &mut out[..file.size as usize];
        let mut reader = self.reader.borrow_mut();

        debug!(
            offset = file.offset,
            size = file.size,
            compression = ?file.compression,
            "extracting file"
        );

        match file.compression {
            CompressionType::None => {
                reader.seek_to(file.offset)?;
                reader.read_exact(out)?;
                Ok(())
            }
            CompressionType::Lz77 | CompressionType::Zlib => {
                Self::extract_chunked(&mut reader, file, out)
            }
        }
    }

    fn extract_chunked(reader: &mut CipherReader<R>, file: &File, out: &mut [u8]) -> Result<()> {
        let chunk_count = file.size.div_ceil(u64::from(CHUNK_SIZE)) as usize;

        reader.seek_to(file.offset)?;

        // Per-chunk compressed lengths. Framing truth comes from each
        // chunk's own header; this table only sequences the stream.
        let mut chunk_lengths = Vec::with_capacity(chunk_count);
        for _ in 0..chunk_count {
            chunk_lengths.push(reader.read_u32()?);
        }
        trace!(?chunk_lengths, "read chunk length table");

        let mut payload = Vec::new();
        let mut buffer_offset = 0usize;

        for index in 0..chunk_count {
            let header = {
                let mut head = [0u8; ChunkHeader::SIZE];
                reader.read_exact(&mut head)?;
                ChunkHeader::parse(&mut Cursor::new(&head))?
            };

            let decompressed = header.decompressed_size as usize;
            if buffer_offset + decompressed > out.len() {
                return Err(Error::SizeMismatch {
                    expected: out.len() as u64,
                    actual: (buffer_offset + decompressed) as u64,
                });
            }

            payload.clear();
            payload.resize(header.compressed_size as usize, 0);
            reader.read_exact(&mut payload)?;

            let checksum = payload
                .iter()
                .fold(0u32, |sum, &byte| sum.wrapping_add(byte.into()));
            if checksum != header.checksum {
                return Err(Error::ChunkChecksumMismatch {
                    index,
                    expected: header.checksum,
                    actual: checksum,
                });
            }

            if header.encoded != 0 {
                decode_chunk(&mut payload);
            }

            decompress_chunk(
                &header,
                &payload,
                &mut out[buffer_offset..buffer_offset + decompressed],
            )?;
            buffer_offset += decompressed;

            trace!(
                index,
                compressed = header.compressed_size,
                decompressed,
                "chunk decompressed"
            );
        }

        if buffer_offset as u64 != file.size {
            return Err(Error::SizeMismatch {
                expected: file.size,
                actual: buffer_offset as u64,
            });
        }

        Ok(())
    }
}

impl<R> std::fmt::Debug for HpiArchive<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HpiArchive")
            .field("entries", &self.root.entries().len())
            .finish()
    }
}
