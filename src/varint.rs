//! Variable-length integer encoding/decoding
//!
//! The IWA wire format uses Protocol Buffers variable-length encoding for
//! integers: 7 bits per byte, least significant group first, with the most
//! significant bit of each byte indicating continuation. Signed values use
//! ZigZag encoding on top of that.
//!
//! A 64-bit value occupies at most 10 bytes. Longer encodings, and
//! encodings whose value would not fit in 64 bits, are rejected with
//! [`Error::Range`] rather than truncated.

use crate::stream::MemoryStream;
use crate::{Error, Result};

/// Longest valid encoding of a 64-bit value.
const MAX_VARINT_LEN: u32 = 10;

/// Decode an unsigned variable-length integer from a stream.
pub fn read_uvar(stream: &mut MemoryStream) -> Result<u64> {
    let mut value: u64 = 0;
    let mut shift: u32 = 0;

    loop {
        let byte = stream.read_u8()?;

        // The tenth byte may only carry the single remaining bit
        if shift == 7 * (MAX_VARINT_LEN - 1) && (byte & 0xFE) != 0 {
            return Err(Error::Range);
        }

        value |= u64::from(byte & 0x7F) << shift;

        if (byte & 0x80) == 0 {
            return Ok(value);
        }

        shift += 7;
        if shift >= 7 * MAX_VARINT_LEN {
            return Err(Error::Range);
        }
    }
}

/// Decode a ZigZag-encoded signed variable-length integer from a stream.
pub fn read_svar(stream: &mut MemoryStream) -> Result<i64> {
    let unsigned = read_uvar(stream)?;
    Ok(decode_zigzag(unsigned))
}

/// Decode an unsigned variable-length integer from a byte slice, returning
/// the value and the number of bytes consumed.
pub fn decode_uvar(data: &[u8]) -> Result<(u64, usize)> {
    let mut value: u64 = 0;
    let mut shift: u32 = 0;
    let mut consumed = 0usize;

    for &byte in data {
        if shift == 7 * (MAX_VARINT_LEN - 1) && (byte & 0xFE) != 0 {
            return Err(Error::Range);
        }

        value |= u64::from(byte & 0x7F) << shift;
        consumed += 1;

        if (byte & 0x80) == 0 {
            return Ok((value, consumed));
        }

        shift += 7;
        if shift >= 7 * MAX_VARINT_LEN {
            return Err(Error::Range);
        }
    }

    Err(Error::EndOfStream)
}

/// Encode a u64 value as a variable-length integer.
pub fn encode_uvar(mut value: u64) -> Vec<u8> {
    let mut buf = Vec::new();
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
    buf
}

/// Encode a signed integer using ZigZag encoding.
pub fn encode_svar(value: i64) -> Vec<u8> {
    encode_uvar(((value << 1) ^ (value >> 63)) as u64)
}

fn decode_zigzag(unsigned: u64) -> i64 {
    ((unsigned >> 1) as i64) ^ -((unsigned & 1) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn decode_all(bytes: &[u8]) -> Result<u64> {
        read_uvar(&mut MemoryStream::new(bytes.to_vec()))
    }

    #[test]
    fn test_uvar_decoding() {
        let test_cases = vec![
            (vec![0x00], 0u64),
            (vec![0x01], 1u64),
            (vec![0x7F], 127u64),
            (vec![0x80, 0x01], 128u64),
            (vec![0xAC, 0x02], 300u64),
            (vec![0x80, 0x80, 0x01], 16384u64),
        ];

        for (bytes, expected) in test_cases {
            assert_eq!(decode_all(&bytes).unwrap(), expected);
            let (value, consumed) = decode_uvar(&bytes).unwrap();
            assert_eq!(value, expected);
            assert_eq!(consumed, bytes.len());
        }
    }

    #[test]
    fn test_uvar_max_value() {
        let encoded = encode_uvar(u64::MAX);
        assert_eq!(encoded.len(), 10);
        assert_eq!(decode_all(&encoded).unwrap(), u64::MAX);
    }

    #[test]
    fn test_uvar_overflow_is_range_error() {
        // ten continuation bytes
        let bytes = vec![0x80; 10];
        assert!(matches!(decode_all(&bytes), Err(Error::Range)));

        // value exceeding 64 bits in the tenth byte
        let bytes = vec![0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x02];
        assert!(matches!(decode_all(&bytes), Err(Error::Range)));
    }

    #[test]
    fn test_uvar_empty_input_is_end_of_stream() {
        assert!(matches!(decode_all(&[]), Err(Error::EndOfStream)));
        assert!(matches!(decode_uvar(&[]), Err(Error::EndOfStream)));
    }

    #[test]
    fn test_uvar_truncated_input() {
        // continuation bit set but no next byte
        assert!(matches!(decode_all(&[0x80]), Err(Error::EndOfStream)));
    }

    #[test]
    fn test_svar_decoding() {
        let test_cases = vec![
            (vec![0x00], 0i64),
            (vec![0x01], -1i64),
            (vec![0x02], 1i64),
            (vec![0x03], -2i64),
            (vec![0x7E], 63i64),
            (vec![0x7F], -64i64),
            (vec![0x80, 0x01], 64i64),
        ];

        for (bytes, expected) in test_cases {
            let decoded = read_svar(&mut MemoryStream::new(bytes.clone())).unwrap();
            assert_eq!(decoded, expected, "decoding failed for {:?}", bytes);
            assert_eq!(encode_svar(expected), bytes);
        }
    }

    proptest! {
        #[test]
        fn prop_uvar_round_trip(value: u64) {
            let encoded = encode_uvar(value);
            prop_assert!(encoded.len() <= 10);
            prop_assert_eq!(decode_all(&encoded).unwrap(), value);
        }

        #[test]
        fn prop_svar_round_trip(value: i64) {
            let encoded = encode_svar(value);
            let decoded = read_svar(&mut MemoryStream::new(encoded)).unwrap();
            prop_assert_eq!(decoded, value);
        }
    }
}
