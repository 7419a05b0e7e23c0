//! Serialized transaction buffer with typed accessors.
//!
//! A [`SerializedTransaction`] owns one contiguous wire buffer:
//! ```text
//! [header][control buffer][sg count table][sg data]
//! ```
//! It is produced by the serializer, handed to the transport, and returned
//! (repacked by the receiver) for merge.

use bytes::Bytes;

use super::sg;
use super::wire_format::Header;
use crate::error::{Result, TxnWireError};

/// Borrowed view of the four regions of a validated wire buffer.
#[derive(Debug, Clone, Copy)]
pub struct Sections<'a> {
    pub header: Header,
    pub control: &'a [u8],
    pub count_table: &'a [u8],
    pub sg_data: &'a [u8],
}

impl<'a> Sections<'a> {
    /// Iterate the transmitted fragment counts.
    pub fn counts(&self) -> impl Iterator<Item = u32> + 'a {
        sg::counts(self.count_table)
    }
}

/// Total size implied by a header and its count table.
///
/// Also rejects zero counts, so the result is only meaningful for a
/// well-formed table.
pub fn expected_len(header: &Header, count_table: &[u8]) -> Result<usize> {
    let data = sg::data_size(count_table)?;
    header
        .fixed_size()
        .checked_add(data)
        .ok_or_else(|| TxnWireError::Protocol("Transaction size overflows usize".to_string()))
}

/// Split a wire buffer into its regions, validating the layout.
///
/// The buffer length must match the header and count table exactly.
pub fn split_sections(buf: &[u8]) -> Result<Sections<'_>> {
    let header = Header::parse(buf)?;
    let fixed = header.fixed_size();
    if buf.len() < fixed {
        return Err(TxnWireError::Protocol(format!(
            "Buffer of {} bytes is shorter than its fixed part ({} bytes)",
            buf.len(),
            fixed
        )));
    }

    let table_start = header.count_table_offset();
    let count_table = &buf[table_start..fixed];
    let expected = expected_len(&header, count_table)?;
    if buf.len() != expected {
        return Err(TxnWireError::Protocol(format!(
            "Buffer of {} bytes does not match the {} bytes its header describes",
            buf.len(),
            expected
        )));
    }

    Ok(Sections {
        header,
        control: &buf[super::HEADER_SIZE..table_start],
        count_table,
        sg_data: &buf[fixed..],
    })
}

/// One serialized request/reply transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedTransaction {
    buf: Vec<u8>,
}

impl SerializedTransaction {
    /// Allocate a zeroed buffer, surfacing allocation failure.
    pub(crate) fn allocate(size: usize) -> Result<Self> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(size)
            .map_err(|_| TxnWireError::AllocationFailed { bytes: size })?;
        buf.resize(size, 0);
        Ok(Self { buf })
    }

    /// Wrap bytes received from a transport.
    pub fn from_vec(buf: Vec<u8>) -> Self {
        Self { buf }
    }

    /// Decode the header.
    pub fn header(&self) -> Result<Header> {
        Header::parse(&self.buf)
    }

    /// Validated view of the regions.
    pub fn sections(&self) -> Result<Sections<'_>> {
        split_sections(&self.buf)
    }

    /// Total size in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    #[inline]
    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }

    /// Convert into `Bytes` for transports that share buffers.
    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.buf)
    }
}

impl From<Vec<u8>> for SerializedTransaction {
    fn from(buf: Vec<u8>) -> Self {
        Self::from_vec(buf)
    }
}

impl AsRef<[u8]> for SerializedTransaction {
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}
