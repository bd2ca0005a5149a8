//! Chunk payload decoding: the LZ77 decoder, the index-keyed chunk-byte
//! transform and the zlib inflate adaptor.

use flate2::{Decompress, FlushDecompress, Status};
use tracing::trace;

use crate::error::{Error, Result};
use crate::header::ChunkHeader;
use crate::CompressionType;

/// Size of the LZ77 sliding window.
const WINDOW_SIZE: usize = 4096;

/// Decompress one LZ77 chunk into `out`, returning the number of bytes
/// emitted.
///
/// The scheme packs eight flag bits per tag byte, LSB first: a clear bit
/// is a literal, a set bit a 16-bit back-reference carrying a 12-bit
/// window offset and a 4-bit count stored minus two. The window write
/// cursor starts at one; offset zero is the end-of-stream sentinel, and
/// input past the sentinel is ignored. Self-referential copies (offset
/// just behind the write cursor) are legal and produce RLE-style runs.
pub fn decompress_lz77(input: &[u8], out: &mut [u8]) -> Result<usize> {
    let mut window = [0u8; WINDOW_SIZE];
    let mut window_pos = 1usize;
    let mut in_pos = 0usize;
    let mut out_pos = 0usize;

    loop {
        if in_pos >= input.len() {
            return Err(Error::TruncatedInput {
                context: "expected tag, got end of input",
            });
        }

        let mut tag = input[in_pos];
        in_pos += 1;

        for _ in 0..8 {
            if tag & 1 == 0 {
                // literal byte
                if in_pos >= input.len() {
                    return Err(Error::TruncatedInput {
                        context: "expected literal, got end of input",
                    });
                }
                if out_pos >= out.len() {
                    return Err(Error::OutputOverflow {
                        context: "literal past end of output buffer",
                    });
                }

                let byte = input[in_pos];
                in_pos += 1;

                out[out_pos] = byte;
                out_pos += 1;
                window[window_pos] = byte;
                window_pos = (window_pos + 1) & (WINDOW_SIZE - 1);
            } else {
                // back-reference into the window
                if in_pos + 2 > input.len() {
                    return Err(Error::TruncatedInput {
                        context: "expected back-reference, got end of input",
                    });
                }

                let packed = u16::from_le_bytes([input[in_pos], input[in_pos + 1]]);
                in_pos += 2;

                let mut offset = usize::from(packed >> 4);
                let count = usize::from(packed & 0x0F) + 2;

                if offset == 0 {
                    return Ok(out_pos);
                }

                if out_pos + count > out.len() {
                    return Err(Error::OutputOverflow {
                        context: "back-reference past end of output buffer",
                    });
                }

                for _ in 0..count {
                    let byte = window[offset];
                    out[out_pos] = byte;
                    out_pos += 1;
                    window[window_pos] = byte;
                    offset = (offset + 1) & (WINDOW_SIZE - 1);
                    window_pos = (window_pos + 1) & (WINDOW_SIZE - 1);
                }
            }

            tag >>= 1;
        }
    }
}

/// Undo the per-byte scramble applied to payloads whose chunk header sets
/// the `encoded` flag: `plain[i] = (cipher[i] - i) ^ i`, arithmetic mod
/// 256. Keyed only by the intra-chunk index; distinct from the
/// archive-level obfuscation.
pub fn decode_chunk(buf: &mut [u8]) {
    for (i, byte) in buf.iter_mut().enumerate() {
        let pos = i as u8;
        *byte = byte.wrapping_sub(pos) ^ pos;
    }
}

/// One-shot zlib inflate: must consume all of `input` and fill all of
/// `out`.
pub fn inflate(input: &[u8], out: &mut [u8]) -> Result<()> {
    let mut decoder = Decompress::new(true);

    let status = decoder
        .decompress(input, out, FlushDecompress::Finish)
        .map_err(|e| Error::InflateError(e.to_string()))?;

    match status {
        Status::StreamEnd => {}
        _ if decoder.total_out() == out.len() as u64 => {
            return Err(Error::OutputOverflow {
                context: "zlib stream larger than the declared size",
            });
        }
        _ => {
            return Err(Error::InflateError(format!(
                "inflate stopped early with {status:?}"
            )));
        }
    }

    if decoder.total_out() != out.len() as u64 {
        return Err(Error::TruncatedInput {
            context: "zlib stream shorter than the declared size",
        });
    }
    if decoder.total_in() != input.len() as u64 {
        return Err(Error::InflateError("trailing bytes after zlib stream".into()));
    }

    Ok(())
}

/// Decompress a single framed chunk payload into `out` according to the
/// chunk header's compression type. `payload` must already be decrypted
/// and unscrambled; `out` must be exactly `decompressed_size` long.
pub fn decompress_chunk(header: &ChunkHeader, payload: &[u8], out: &mut [u8]) -> Result<()> {
    let compression = CompressionType::from_byte(header.compression)
        .ok_or(Error::InvalidCompressionType(header.compression))?;

    match compression {
        CompressionType::None => {
            if header.compressed_size != header.decompressed_size {
                return Err(Error::SizeMismatch {
                    expected: header.decompressed_size.into(),
                    actual: header.compressed_size.into(),
                });
            }
            out.copy_from_slice(payload);
        }
        CompressionType::Lz77 => {
            let emitted = decompress_lz77(payload, out)?;
            trace!(emitted, expected = out.len(), "lz77 chunk decompressed");
        }
        CompressionType::Zlib => inflate(payload, out)?,
    }

    Ok(())
}
