//! MsgPack codec using `rmp-serde`.
//!
//! Always encodes with `to_vec_named`: structs become maps keyed by field
//! name, so a receiver built from a different revision of a parameter struct
//! still decodes the fields it knows.
//!
//! Control buffers have a fixed length that both ends agree on. The encoded
//! value goes at the start and the remainder is zero-filled; decoding reads
//! one value and ignores the padding.
//!
//! # Example
//!
//! ```
//! use txnwire::codec::MsgPackCodec;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Query {
//!     handle: u32,
//!     offset: u64,
//! }
//!
//! let query = Query { handle: 7, offset: 512 };
//! let encoded = MsgPackCodec::encode(&query).unwrap();
//! let decoded: Query = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, query);
//! ```

use crate::error::{Result, TxnWireError};

/// MessagePack codec for control payloads.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Encode a value into a fixed-size control buffer.
    ///
    /// Returns the number of bytes the encoded value occupies. Bytes after it
    /// are zeroed. The buffer is left untouched on error.
    ///
    /// # Errors
    ///
    /// Returns `LengthMismatch` if the encoded value does not fit `buf`.
    pub fn encode_into<T: serde::Serialize>(value: &T, buf: &mut [u8]) -> Result<usize> {
        let encoded = Self::encode(value)?;
        if encoded.len() > buf.len() {
            return Err(TxnWireError::LengthMismatch {
                expected: buf.len(),
                actual: encoded.len(),
            });
        }
        let (head, tail) = buf.split_at_mut(encoded.len());
        head.copy_from_slice(&encoded);
        tail.fill(0);
        Ok(encoded.len())
    }

    /// Decode MsgPack bytes to a value.
    ///
    /// Trailing bytes after the first value are ignored.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes cannot be deserialized to type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct ReadParams {
        handle: u32,
        offset: u64,
        length: u32,
    }

    #[test]
    fn test_encode_decode_struct() {
        let original = ReadParams {
            handle: 3,
            offset: 4096,
            length: 512,
        };

        let encoded = MsgPackCodec::encode(&original).unwrap();
        let decoded: ReadParams = MsgPackCodec::decode(&encoded).unwrap();

        assert_eq!(decoded, original);
    }

    #[test]
    fn test_to_vec_named_produces_map_format() {
        let params = ReadParams {
            handle: 1,
            offset: 0,
            length: 0,
        };

        let encoded = MsgPackCodec::encode(&params).unwrap();

        // fixmap with 3 entries, not fixarray (0x93)
        assert_eq!(encoded[0], 0x83);
    }

    #[test]
    fn test_encode_into_zero_fills_tail() {
        let mut buf = [0xAAu8; 16];
        let used = MsgPackCodec::encode_into(&7u8, &mut buf).unwrap();

        assert_eq!(used, 1);
        assert_eq!(buf[0], 7);
        assert!(buf[1..].iter().all(|&b| b == 0));

        let decoded: u8 = MsgPackCodec::decode(&buf).unwrap();
        assert_eq!(decoded, 7);
    }

    #[test]
    fn test_encode_into_padded_struct_decodes() {
        let params = ReadParams {
            handle: 9,
            offset: 1 << 40,
            length: 64,
        };
        let mut buf = [0u8; 64];
        MsgPackCodec::encode_into(&params, &mut buf).unwrap();

        let decoded: ReadParams = MsgPackCodec::decode(&buf).unwrap();
        assert_eq!(decoded, params);
    }

    #[test]
    fn test_encode_into_too_small() {
        let mut buf = *b"keep";
        let err = MsgPackCodec::encode_into(&"a long string value", &mut buf).unwrap_err();

        assert!(matches!(err, TxnWireError::LengthMismatch { expected: 4, .. }));
        assert_eq!(&buf, b"keep");
    }

    #[test]
    fn test_decode_error_on_invalid_data() {
        let invalid = b"not valid msgpack";
        let result: Result<ReadParams> = MsgPackCodec::decode(invalid);
        assert!(matches!(result, Err(TxnWireError::MsgPackDecode(_))));
    }

    #[test]
    fn test_encode_decode_option() {
        let none_val: Option<u32> = None;
        let encoded = MsgPackCodec::encode(&none_val).unwrap();
        assert_eq!(encoded, vec![0xc0]);

        let decoded: Option<u32> = MsgPackCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, None);
    }
}
