//! Protocol module - wire format, SG packing, and transaction buffers.
//!
//! This module implements the binary layout of one transaction:
//! - 64-byte header encoding/decoding
//! - SG count table and data packing, descriptor reconstruction
//! - Transaction buffer with validated region accessors
//! - Reassembly buffer for stream transports

mod sg;
mod transaction;
mod transaction_buffer;
mod wire_format;

pub use sg::{
    counts, data_size, live_fragments, live_fragments_mut, measure, pack, unpack_descriptors,
    SgArea, SgDescriptor,
};
pub use transaction::{expected_len, split_sections, Sections, SerializedTransaction};
pub use transaction_buffer::TransactionBuffer;
pub use wire_format::{
    attributes, offsets, write_spare, write_status, Addressing, Header, PacketStatus, Status,
    DEFAULT_MAX_SG_FRAGMENTS, DEFAULT_MAX_TRANSACTION_SIZE, HEADER_SIZE, SG_COUNT_SIZE,
};
