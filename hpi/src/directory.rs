//! Directory blob parsing and the in-memory archive tree.
//!
//! The decrypted directory region is interpreted as a graph of packed
//! records whose offsets are absolute within the blob. Parsing copies
//! everything out into an owned tree; nothing in the tree points back into
//! the blob.

use tracing::trace;

use crate::error::{Error, Result};
use crate::CompressionType;

/// On-disk size of a directory record (`entry_count`, `entry_list_offset`).
const PATH_RECORD_SIZE: u32 = 8;
/// On-disk size of an entry record (`name_offset`, `data_offset`, `is_path`).
const ENTRY_RECORD_SIZE: u32 = 9;
/// On-disk size of a file record (`data_offset`, `file_size`, `compression_type`).
const FILE_RECORD_SIZE: u32 = 9;

/// A directory in the archive tree: an ordered list of entries, mirroring
/// on-disk order.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    entries: Vec<Entry>,
}

/// A named node in the archive tree.
#[derive(Debug, Clone)]
pub struct Entry {
    pub name: String,
    pub kind: EntryKind,
}

/// Entry payload: each entry is exactly one of a file or a directory.
#[derive(Debug, Clone)]
pub enum EntryKind {
    File(File),
    Directory(Directory),
}

/// Descriptor of a file inside the archive. Contents stay on disk until
/// extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct File {
    /// Absolute stream offset of the file's data region.
    pub offset: u64,
    /// Decompressed size in bytes.
    pub size: u64,
    /// Compression applied to the data region.
    pub compression: CompressionType,
}

impl Directory {
    /// Entries in on-disk order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Look up a direct child by name, ASCII case-insensitively.
    pub fn child(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.name.eq_ignore_ascii_case(name))
    }
}

impl Entry {
    /// The file descriptor, if this entry is a file.
    pub fn as_file(&self) -> Option<&File> {
        match &self.kind {
            EntryKind::File(file) => Some(file),
            EntryKind::Directory(_) => None,
        }
    }

    /// The directory, if this entry is one.
    pub fn as_directory(&self) -> Option<&Directory> {
        match &self.kind {
            EntryKind::Directory(dir) => Some(dir),
            EntryKind::File(_) => None,
        }
    }
}

/// Parse the root directory record of a decrypted directory blob.
///
/// `start` is the offset of the root record. The blob prefix `[0..start)`
/// is never referenced; offsets inside records are absolute within the
/// blob.
pub fn parse_root(blob: &[u8], start: u32) -> Result<Directory> {
    check_bounds("root directory record", start, PATH_RECORD_SIZE.into(), blob)?;
    parse_directory(blob, start)
}

fn parse_directory(blob: &[u8], offset: u32) -> Result<Directory> {
    let entry_count = read_u32(blob, offset);
    let entry_list_offset = read_u32(blob, offset + 4);

    check_bounds(
        "directory entry list",
        entry_list_offset,
        u64::from(entry_count) * u64::from(ENTRY_RECORD_SIZE),
        blob,
    )?;

    trace!(offset, entry_count, entry_list_offset, "parsing directory");

    let mut entries = Vec::with_capacity(entry_count as usize);
    for i in 0..entry_count {
        entries.push(parse_entry(blob, entry_list_offset + i * ENTRY_RECORD_SIZE)?);
    }

    Ok(Directory { entries })
}

fn parse_entry(blob: &[u8], offset: u32) -> Result<Entry> {
    let name_offset = read_u32(blob, offset);
    let data_offset = read_u32(blob, offset + 4);
    let is_path = blob[offset as usize + 8];

    let name = read_name(blob, name_offset)?;

    let kind = if is_path != 0 {
        check_bounds("directory record", data_offset, PATH_RECORD_SIZE.into(), blob)?;
        EntryKind::Directory(parse_directory(blob, data_offset)?)
    } else {
        check_bounds("file record", data_offset, FILE_RECORD_SIZE.into(), blob)?;
        EntryKind::File(parse_file(blob, data_offset)?)
    };

    Ok(Entry { name, kind })
}

fn parse_file(blob: &[u8], offset: u32) -> Result<File> {
    let data_offset = read_u32(blob, offset);
    let file_size = read_u32(blob, offset + 4);
    let compression_byte = blob[offset as usize + 8];

    let compression = CompressionType::from_byte(compression_byte)
        .ok_or(Error::InvalidCompressionType(compression_byte))?;

    Ok(File {
        offset: data_offset.into(),
        size: file_size.into(),
        compression,
    })
}

/// Decode a NUL-terminated name, scanning no further than the end of the
/// blob. Bytes map to the code point of the same value (names are 8-bit,
/// Latin-1 in practice).
fn read_name(blob: &[u8], offset: u32) -> Result<String> {
    let rest = blob
        .get(offset as usize..)
        .ok_or(Error::TruncatedName(offset))?;
    let len = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or(Error::TruncatedName(offset))?;

    Ok(rest[..len].iter().map(|&b| b as char).collect())
}

fn check_bounds(context: &'static str, offset: u32, len: u64, blob: &[u8]) -> Result<()> {
    let end = u64::from(offset) + len;
    if end > blob.len() as u64 {
        return Err(Error::OutOfBoundsOffset {
            context,
            end,
            limit: blob.len() as u64,
        });
    }
    Ok(())
}

fn read_u32(blob: &[u8], offset: u32) -> u32 {
    let o = offset as usize;
    u32::from_le_bytes([blob[o], blob[o + 1], blob[o + 2], blob[o + 3]])
}
