//! Wire format encoding and decoding.
//!
//! Every transaction starts with a fixed 64-byte header:
//! ```text
//! ┌────────┬──────────────────────────┬──────┐
//! │ Offset │ Field                    │ Type │
//! ├────────┼──────────────────────────┼──────┤
//! │ 0      │ buffer_length            │ u32  │
//! │ 4      │ class_id                 │ u32  │
//! │ 8      │ object_id                │ u32  │
//! │ 12     │ service_id               │ u32  │
//! │ 16     │ package_id               │ u32  │
//! │ 20     │ attributes               │ u32  │
//! │ 24     │ opcode                   │ u32  │
//! │ 28     │ sg_element_count         │ u32  │
//! │ 32     │ packet status code       │ u32  │
//! │ 36     │ packet status qualifier  │ u32  │
//! │ 40     │ control status           │ u32  │
//! │ 44     │ control qualifier        │ u32  │
//! │ 48     │ key_handle               │ u64  │
//! │ 56     │ spare (receiver-local)   │ u64  │
//! └────────┴──────────────────────────┴──────┘
//! ```
//!
//! All multi-byte integers are Little Endian. The header is followed by
//! `buffer_length` control bytes, `sg_element_count` u32 fragment counts and
//! finally the concatenated fragment data.

use crate::error::{Result, TxnWireError};

/// Header size in bytes (fixed, exactly 64).
pub const HEADER_SIZE: usize = 64;

/// Width of one entry in the SG count table.
pub const SG_COUNT_SIZE: usize = 4;

/// Default upper bound on fragments in one SG list.
pub const DEFAULT_MAX_SG_FRAGMENTS: usize = 32_768;

/// Default maximum serialized transaction size (64 MB).
pub const DEFAULT_MAX_TRANSACTION_SIZE: usize = 64 * 1024 * 1024;

/// Byte offsets of the header fields.
pub mod offsets {
    pub const BUFFER_LENGTH: usize = 0;
    pub const CLASS_ID: usize = 4;
    pub const OBJECT_ID: usize = 8;
    pub const SERVICE_ID: usize = 12;
    pub const PACKAGE_ID: usize = 16;
    pub const ATTRIBUTES: usize = 20;
    pub const OPCODE: usize = 24;
    pub const SG_ELEMENT_COUNT: usize = 28;
    pub const PACKET_STATUS: usize = 32;
    pub const PACKET_QUALIFIER: usize = 36;
    pub const CONTROL_STATUS: usize = 40;
    pub const CONTROL_QUALIFIER: usize = 44;
    pub const KEY_HANDLE: usize = 48;
    pub const SPARE: usize = 56;
}

/// Request attribute flags carried in the header.
pub mod attributes {
    /// The originator armed a completion notification for this request.
    ///
    /// Only honored on the receiver when a local completion primitive exists.
    pub const COMPLETION_ARMED: u32 = 0x0000_0001;

    /// Check if a specific flag is set.
    #[inline]
    pub fn has_flag(attributes: u32, flag: u32) -> bool {
        attributes & flag != 0
    }
}

/// 32-bit status code, NT-style: the top bit marks an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Status(pub u32);

impl Status {
    /// Operation completed.
    pub const SUCCESS: Status = Status(0);
    /// Generic failure; also the seed value of every fresh transaction.
    pub const UNSUCCESSFUL: Status = Status(0xC000_0001);
    /// No handler is registered for the opcode.
    pub const NOT_IMPLEMENTED: Status = Status(0xC000_0002);

    /// Check if this status denotes success.
    #[inline]
    pub fn is_success(self) -> bool {
        self.0 & 0x8000_0000 == 0
    }
}

/// Packet-level status: a code plus a free-form qualifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketStatus {
    pub code: Status,
    pub qualifier: u32,
}

impl PacketStatus {
    /// Create a packet status.
    pub fn new(code: Status, qualifier: u32) -> Self {
        Self { code, qualifier }
    }

    /// Fail-closed seed written by the serializer.
    pub const fn unsuccessful() -> Self {
        Self {
            code: Status::UNSUCCESSFUL,
            qualifier: 0,
        }
    }
}

/// Routing identifiers of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Addressing {
    pub class_id: u32,
    pub object_id: u32,
    pub service_id: u32,
    pub package_id: u32,
}

/// Decoded transaction header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Length of the embedded control buffer.
    pub buffer_length: u32,
    pub addressing: Addressing,
    /// Attribute flags (see `attributes` module).
    pub attributes: u32,
    pub opcode: u32,
    /// Number of SG fragments (entries in the count table).
    pub sg_element_count: u32,
    pub packet_status: PacketStatus,
    pub control_status: Status,
    pub control_qualifier: u32,
    /// Opaque key handle, passed through by value.
    pub key_handle: u64,
    /// Receiver-local slot. Zero on the wire.
    pub spare: u64,
}

impl Header {
    /// Encode header to bytes (Little Endian).
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Encode header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if buffer is smaller than `HEADER_SIZE` (64 bytes).
    pub fn encode_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= HEADER_SIZE);
        put_u32(buf, offsets::BUFFER_LENGTH, self.buffer_length);
        put_u32(buf, offsets::CLASS_ID, self.addressing.class_id);
        put_u32(buf, offsets::OBJECT_ID, self.addressing.object_id);
        put_u32(buf, offsets::SERVICE_ID, self.addressing.service_id);
        put_u32(buf, offsets::PACKAGE_ID, self.addressing.package_id);
        put_u32(buf, offsets::ATTRIBUTES, self.attributes);
        put_u32(buf, offsets::OPCODE, self.opcode);
        put_u32(buf, offsets::SG_ELEMENT_COUNT, self.sg_element_count);
        write_status(
            buf,
            self.packet_status,
            self.control_status,
            self.control_qualifier,
        );
        put_u64(buf, offsets::KEY_HANDLE, self.key_handle);
        put_u64(buf, offsets::SPARE, self.spare);
    }

    /// Decode header from bytes (Little Endian).
    ///
    /// Returns `None` if buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            buffer_length: get_u32(buf, offsets::BUFFER_LENGTH),
            addressing: Addressing {
                class_id: get_u32(buf, offsets::CLASS_ID),
                object_id: get_u32(buf, offsets::OBJECT_ID),
                service_id: get_u32(buf, offsets::SERVICE_ID),
                package_id: get_u32(buf, offsets::PACKAGE_ID),
            },
            attributes: get_u32(buf, offsets::ATTRIBUTES),
            opcode: get_u32(buf, offsets::OPCODE),
            sg_element_count: get_u32(buf, offsets::SG_ELEMENT_COUNT),
            packet_status: PacketStatus {
                code: Status(get_u32(buf, offsets::PACKET_STATUS)),
                qualifier: get_u32(buf, offsets::PACKET_QUALIFIER),
            },
            control_status: Status(get_u32(buf, offsets::CONTROL_STATUS)),
            control_qualifier: get_u32(buf, offsets::CONTROL_QUALIFIER),
            key_handle: get_u64(buf, offsets::KEY_HANDLE),
            spare: get_u64(buf, offsets::SPARE),
        })
    }

    /// Decode a header, reporting a short buffer as a protocol error.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        Self::decode(buf).ok_or_else(|| {
            TxnWireError::Protocol(format!(
                "Buffer of {} bytes is shorter than the {}-byte header",
                buf.len(),
                HEADER_SIZE
            ))
        })
    }

    /// Validate the header against the configured limits.
    ///
    /// Checks:
    /// - Fragment count doesn't exceed `max_sg_fragments`
    /// - Fixed part (header + control + count table) fits `max_transaction_size`
    pub fn validate(&self, max_sg_fragments: usize, max_transaction_size: usize) -> Result<()> {
        if self.sg_element_count as usize > max_sg_fragments {
            return Err(TxnWireError::Protocol(format!(
                "SG element count {} exceeds maximum {}",
                self.sg_element_count, max_sg_fragments
            )));
        }

        let fixed = self.fixed_size();
        if fixed > max_transaction_size {
            return Err(TxnWireError::TransactionTooLarge {
                size: fixed,
                max: max_transaction_size,
            });
        }

        Ok(())
    }

    /// Size of header, control buffer and count table (everything but SG data).
    #[inline]
    pub fn fixed_size(&self) -> usize {
        HEADER_SIZE + self.buffer_length as usize + self.count_table_size()
    }

    /// Size of the SG count table.
    #[inline]
    pub fn count_table_size(&self) -> usize {
        self.sg_element_count as usize * SG_COUNT_SIZE
    }

    /// Offset of the first count table entry.
    #[inline]
    pub fn count_table_offset(&self) -> usize {
        HEADER_SIZE + self.buffer_length as usize
    }

    /// Check if the completion-armed attribute is set.
    #[inline]
    pub fn is_completion_armed(&self) -> bool {
        attributes::has_flag(self.attributes, attributes::COMPLETION_ARMED)
    }
}

/// Overwrite the four status fields of an encoded header in place.
pub fn write_status(
    buf: &mut [u8],
    packet_status: PacketStatus,
    control_status: Status,
    control_qualifier: u32,
) {
    put_u32(buf, offsets::PACKET_STATUS, packet_status.code.0);
    put_u32(buf, offsets::PACKET_QUALIFIER, packet_status.qualifier);
    put_u32(buf, offsets::CONTROL_STATUS, control_status.0);
    put_u32(buf, offsets::CONTROL_QUALIFIER, control_qualifier);
}

/// Overwrite the spare slot of an encoded header in place.
#[inline]
pub fn write_spare(buf: &mut [u8], spare: u64) {
    put_u64(buf, offsets::SPARE, spare);
}

#[inline]
pub(crate) fn get_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

#[inline]
pub(crate) fn put_u32(buf: &mut [u8], off: usize, value: u32) {
    buf[off..off + 4].copy_from_slice(&value.to_le_bytes());
}

#[inline]
fn get_u64(buf: &[u8], off: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&buf[off..off + 8]);
    u64::from_le_bytes(raw)
}

#[inline]
fn put_u64(buf: &mut [u8], off: usize, value: u64) {
    buf[off..off + 8].copy_from_slice(&value.to_le_bytes());
}
