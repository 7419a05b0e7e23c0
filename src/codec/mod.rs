//! Codec module - typed control payloads.
//!
//! The control buffer of a request is a fixed-size byte region that crosses
//! the boundary verbatim. [`MsgPackCodec`] lets both ends treat it as a
//! serde value instead of hand-packed bytes.
//!
//! # Example
//!
//! ```
//! use txnwire::codec::MsgPackCodec;
//!
//! let mut control = [0u8; 32];
//! MsgPackCodec::encode_into(&("read", 4096u32), &mut control).unwrap();
//! let (op, len): (String, u32) = MsgPackCodec::decode(&control).unwrap();
//! assert_eq!(op, "read");
//! assert_eq!(len, 4096);
//! ```

mod msgpack;

pub use msgpack::MsgPackCodec;
