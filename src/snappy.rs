//! Snappy decompression for iWork IWA fragments
//!
//! iWork uses a Snappy variant with its own framing:
//! - The stream opens with a one-byte `0x78` signature, or with the pair
//!   `1f 8b` written by early application versions. A method byte follows;
//!   method `0` means the remainder of the stream is stored verbatim.
//! - Compressed streams are a sequence of blocks, each prefixed with a
//!   varint block length. Inside a block, a varint uncompressed length is
//!   followed by the Snappy tag stream.
//! - Back-references never reach before the start of the current block.
//!
//! Damage inside one block stops decompression but keeps the output of the
//! blocks decoded before it.

use tracing::debug;

use crate::stream::MemoryStream;
use crate::varint::decode_uvar;
use crate::{Error, Result};

const SIGNATURE: u8 = 0x78;
const LEGACY_SIGNATURE: [u8; 2] = [0x1F, 0x8B];
const METHOD_STORED: u8 = 0;

/// Decompressed view of an IWA fragment.
#[derive(Debug)]
pub struct SnappyStream {
    decompressed: Vec<u8>,
}

impl SnappyStream {
    /// Decompress a complete fragment.
    ///
    /// An empty input yields an empty stream. Inputs that carry neither
    /// signature fail with [`Error::Snappy`].
    pub fn decompress(input: &[u8]) -> Result<Self> {
        if input.is_empty() {
            return Ok(Self {
                decompressed: Vec::new(),
            });
        }

        let mut pos = if input[0] == SIGNATURE {
            1
        } else if input.len() >= 2 && input[..2] == LEGACY_SIGNATURE {
            2
        } else {
            return Err(Error::Snappy(format!(
                "unrecognized signature byte 0x{:02x}",
                input[0]
            )));
        };

        let Some(&method) = input.get(pos) else {
            return Ok(Self {
                decompressed: Vec::new(),
            });
        };
        pos += 1;

        if method == METHOD_STORED {
            return Ok(Self {
                decompressed: input[pos..].to_vec(),
            });
        }

        let mut decompressed = Vec::new();
        while pos < input.len() {
            let (block_len, consumed) = match decode_uvar(&input[pos..]) {
                Ok(header) => header,
                Err(_) => {
                    debug!("SnappyStream::decompress: bad block length, stopping");
                    break;
                }
            };
            pos += consumed;

            let take = (block_len as usize).min(input.len() - pos);
            let block = &input[pos..pos + take];
            pos += take;

            match decompress_block(block) {
                Ok(data) => decompressed.extend_from_slice(&data),
                Err(e) => {
                    debug!("SnappyStream::decompress: damaged block dropped: {}", e);
                    break;
                }
            }
        }

        Ok(Self { decompressed })
    }

    /// The decompressed data as a slice.
    pub fn data(&self) -> &[u8] {
        &self.decompressed
    }

    /// Consume self and return the decompressed data.
    pub fn into_data(self) -> Vec<u8> {
        self.decompressed
    }

    /// Consume self and return a seekable stream over the decompressed data.
    pub fn into_stream(self) -> MemoryStream {
        MemoryStream::new(self.decompressed)
    }
}

impl AsRef<[u8]> for SnappyStream {
    fn as_ref(&self) -> &[u8] {
        self.data()
    }
}

/// Decode a single block's tag stream. Back-references are resolved within
/// the block only, so the block decodes into its own buffer.
fn decompress_block(block: &[u8]) -> Result<Vec<u8>> {
    let (uncompressed_len, mut pos) = decode_uvar(block)?;
    let uncompressed_len = uncompressed_len as usize;

    let mut out = Vec::new();
    out.reserve((2 * block.len()).min(uncompressed_len));

    while pos < block.len() {
        let tag = block[pos];
        pos += 1;

        match tag & 0x3 {
            0 => {
                // a run of literals
                let run_len = if (tag & 0xF0) == 0xF0 {
                    let count = ((tag >> 2) & 0x3) as usize;
                    if pos + count > block.len() {
                        return Err(Error::EndOfStream);
                    }
                    let mut len = 0usize;
                    for (i, &byte) in block[pos..pos + count].iter().enumerate() {
                        len |= (byte as usize) << (8 * i);
                    }
                    pos += count;
                    len
                } else {
                    ((tag >> 2) + 1) as usize
                };

                if pos + run_len > block.len() {
                    return Err(Error::EndOfStream);
                }
                out.extend_from_slice(&block[pos..pos + run_len]);
                pos += run_len;
            }
            1 => {
                // near copy
                let run_len = (((tag >> 2) & 0x7) + 4) as usize;
                let low = *block.get(pos).ok_or(Error::EndOfStream)?;
                pos += 1;
                let offset = ((tag as usize) >> 5) << 8 | low as usize;
                append_copy(&mut out, offset, run_len)?;
            }
            2 => {
                // far copy
                if pos + 2 > block.len() {
                    return Err(Error::EndOfStream);
                }
                let offset = u16::from_le_bytes([block[pos], block[pos + 1]]) as usize;
                pos += 2;
                let run_len = ((tag >> 2) + 1) as usize;
                append_copy(&mut out, offset, run_len)?;
            }
            _ => {
                return Err(Error::Format("reserved copy tag 3".to_string()));
            }
        }
    }

    if out.len() != uncompressed_len {
        return Err(Error::Snappy(format!(
            "block decoded to {} bytes, declared {}",
            out.len(),
            uncompressed_len
        )));
    }

    Ok(out)
}

/// Append `length` bytes copied from `offset` bytes back. When the offset
/// is smaller than the length the run self-overlaps and the offset-sized
/// suffix repeats until the copy is complete.
fn append_copy(out: &mut Vec<u8>, offset: usize, length: usize) -> Result<()> {
    if offset == 0 {
        return Err(Error::Format("copy with zero offset".to_string()));
    }
    if offset > out.len() {
        return Err(Error::Format(format!(
            "copy offset {} reaches before the block start",
            offset
        )));
    }

    for _ in 0..length {
        let byte = out[out.len() - offset];
        out.push(byte);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::varint::encode_uvar;
    use proptest::prelude::*;

    /// Reference encoder: a single literal-only block per call. Only the
    /// decode side ships; this exists to state the round-trip law.
    fn encode(data: &[u8]) -> Vec<u8> {
        let mut body = encode_uvar(data.len() as u64);
        for chunk in data.chunks(60) {
            body.push(((chunk.len() as u8 - 1) << 2) & !0x3);
            body.extend_from_slice(chunk);
        }

        let mut out = vec![SIGNATURE, 1];
        out.extend(encode_uvar(body.len() as u64));
        out.extend(body);
        out
    }

    fn block(uncompressed_len: usize, tags: &[u8]) -> Vec<u8> {
        let mut body = encode_uvar(uncompressed_len as u64);
        body.extend_from_slice(tags);
        let mut out = encode_uvar(body.len() as u64);
        out.extend(body);
        out
    }

    #[test]
    fn test_empty_stream() {
        let stream = SnappyStream::decompress(&[]).unwrap();
        assert_eq!(stream.data().len(), 0);
    }

    #[test]
    fn test_bad_signature() {
        let result = SnappyStream::decompress(&[0x42, 0x00, 0x00]);
        assert!(matches!(result, Err(Error::Snappy(_))));
    }

    #[test]
    fn test_stored_verbatim() {
        let input = [SIGNATURE, METHOD_STORED, b'r', b'a', b'w'];
        let stream = SnappyStream::decompress(&input).unwrap();
        assert_eq!(stream.data(), b"raw");
    }

    #[test]
    fn test_legacy_signature() {
        let mut input = vec![0x1F, 0x8B, 1];
        input.extend(block(2, &[0x04, b'o', b'k']));
        let stream = SnappyStream::decompress(&input).unwrap();
        assert_eq!(stream.data(), b"ok");
    }

    #[test]
    fn test_round_trip() {
        let data = b"the quick brown fox jumps over the lazy dog";
        let stream = SnappyStream::decompress(&encode(data)).unwrap();
        assert_eq!(stream.data(), data);
    }

    #[test]
    fn test_two_blocks_concatenate() {
        let mut input = vec![SIGNATURE, 1];
        input.extend(block(5, &[0x10, b'h', b'e', b'l', b'l', b'o']));
        input.extend(block(6, &[0x14, b' ', b'w', b'o', b'r', b'l', b'd']));

        let stream = SnappyStream::decompress(&input).unwrap();
        assert_eq!(stream.data(), b"hello world");
    }

    #[test]
    fn test_damaged_second_block_keeps_first() {
        let mut input = vec![SIGNATURE, 1];
        input.extend(block(5, &[0x10, b'h', b'e', b'l', b'l', b'o']));
        let mut bad = block(6, &[0x14, b' ', b'w', b'o', b'r', b'l', b'd']);
        // flip a bit in the second block's tag byte: 0x14 becomes the
        // reserved copy form
        let tag_at = bad.len() - 7;
        bad[tag_at] |= 0x3;
        input.extend(bad);

        let stream = SnappyStream::decompress(&input).unwrap();
        assert_eq!(stream.data(), b"hello");
    }

    #[test]
    fn test_near_copy_self_overlap() {
        // literal "ab", then a copy of 6 bytes from offset 2: the two-byte
        // run repeats itself
        let tags = [0x04, b'a', b'b', 0x09, 0x02];
        let mut input = vec![SIGNATURE, 1];
        input.extend(block(8, &tags));

        let stream = SnappyStream::decompress(&input).unwrap();
        assert_eq!(stream.data(), b"abababab");
    }

    #[test]
    fn test_copy_offset_equals_length() {
        // literal "abcd", then a copy of 4 bytes from offset 4
        let tags = [0x0C, b'a', b'b', b'c', b'd', 0x01, 0x04];
        let mut input = vec![SIGNATURE, 1];
        input.extend(block(8, &tags));

        let stream = SnappyStream::decompress(&input).unwrap();
        assert_eq!(stream.data(), b"abcdabcd");
    }

    #[test]
    fn test_far_copy() {
        // literal "abcd", then a far copy of 3 bytes from offset 3
        let tags = [0x0C, b'a', b'b', b'c', b'd', 0x0A, 0x03, 0x00];
        let mut input = vec![SIGNATURE, 1];
        input.extend(block(7, &tags));

        let stream = SnappyStream::decompress(&input).unwrap();
        assert_eq!(stream.data(), b"abcdbcd");
    }

    #[test]
    fn test_copy_with_zero_offset_fails_block() {
        let tags = [0x04, b'a', b'b', 0x09, 0x00];
        let mut input = vec![SIGNATURE, 1];
        input.extend(block(8, &tags));

        // the damaged block contributes nothing
        let stream = SnappyStream::decompress(&input).unwrap();
        assert_eq!(stream.data(), b"");
    }

    #[test]
    fn test_copy_before_block_start_fails_block() {
        let mut input = vec![SIGNATURE, 1];
        input.extend(block(5, &[0x10, b'h', b'e', b'l', b'l', b'o']));
        // second block tries to copy from the first block's output
        input.extend(block(3, &[0x09, 0x03]));

        let stream = SnappyStream::decompress(&input).unwrap();
        assert_eq!(stream.data(), b"hello");
    }

    #[test]
    fn test_declared_length_mismatch_fails_block() {
        let mut input = vec![SIGNATURE, 1];
        input.extend(block(4, &[0x04, b'a', b'b']));
        let stream = SnappyStream::decompress(&input).unwrap();
        assert_eq!(stream.data(), b"");
    }

    proptest! {
        #[test]
        fn prop_encode_decode_round_trip(data: Vec<u8>) {
            let stream = SnappyStream::decompress(&encode(&data)).unwrap();
            prop_assert_eq!(stream.data(), data.as_slice());
        }
    }
}
