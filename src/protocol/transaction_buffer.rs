//! Reassembly buffer for transactions arriving over a byte stream.
//!
//! Uses `bytes::BytesMut` for buffer management. A transaction's total size
//! is not in its header: it depends on the count table, so parsing runs a
//! three-state machine:
//! - `WaitingForHeader`: need 64 bytes
//! - `WaitingForCountTable`: header parsed, need header + control + counts
//! - `WaitingForBody`: total size known, need all of it
//!
//! Nothing is consumed until a whole transaction is present; the header is
//! part of the transaction bytes handed on.
//!
//! # Example
//!
//! ```ignore
//! use txnwire::protocol::TransactionBuffer;
//!
//! let mut buffer = TransactionBuffer::new();
//! for txn in buffer.push(&chunk)? {
//!     registry.dispatch(txn.as_mut_bytes(), None)?;
//! }
//! ```

use bytes::BytesMut;

use super::transaction::{expected_len, SerializedTransaction};
use super::wire_format::{Header, DEFAULT_MAX_SG_FRAGMENTS, DEFAULT_MAX_TRANSACTION_SIZE};
use crate::error::{Result, TxnWireError};

/// State machine for transaction parsing.
#[derive(Debug, Clone)]
enum State {
    /// Waiting for a complete header.
    WaitingForHeader,
    /// Header parsed, waiting for control buffer and count table.
    WaitingForCountTable { header: Header },
    /// Total size known, waiting for SG data.
    WaitingForBody { total: usize },
}

/// Buffer for accumulating incoming bytes and extracting whole transactions.
pub struct TransactionBuffer {
    /// Accumulated bytes from stream reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    max_sg_fragments: usize,
    max_transaction_size: usize,
}

impl TransactionBuffer {
    /// Create a buffer with default limits.
    ///
    /// Default capacity: 64KB, max transaction: 64MB.
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_SG_FRAGMENTS, DEFAULT_MAX_TRANSACTION_SIZE)
    }

    /// Create a buffer with custom limits.
    pub fn with_limits(max_sg_fragments: usize, max_transaction_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            state: State::WaitingForHeader,
            max_sg_fragments,
            max_transaction_size,
        }
    }

    /// Push data into the buffer and extract all complete transactions.
    ///
    /// Partial data is kept for the next push.
    ///
    /// # Errors
    ///
    /// Returns error if a header exceeds the configured limits or a count
    /// table is malformed. The buffer should be cleared afterwards.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<SerializedTransaction>> {
        self.buffer.extend_from_slice(data);

        let mut transactions = Vec::new();
        while let Some(txn) = self.try_extract_one()? {
            transactions.push(txn);
        }

        Ok(transactions)
    }

    /// Try to extract a single transaction.
    ///
    /// Returns:
    /// - `Ok(Some(txn))` if a complete transaction was extracted
    /// - `Ok(None)` if more data is needed
    /// - `Err(...)` on a protocol violation
    pub(crate) fn try_extract_one(&mut self) -> Result<Option<SerializedTransaction>> {
        loop {
            match &self.state {
                State::WaitingForHeader => {
                    let Some(header) = Header::decode(&self.buffer) else {
                        return Ok(None);
                    };
                    header.validate(self.max_sg_fragments, self.max_transaction_size)?;
                    self.state = State::WaitingForCountTable { header };
                }

                State::WaitingForCountTable { header } => {
                    if self.buffer.len() < header.fixed_size() {
                        return Ok(None);
                    }

                    let table = &self.buffer[header.count_table_offset()..header.fixed_size()];
                    let total = expected_len(header, table)?;
                    if total > self.max_transaction_size {
                        return Err(TxnWireError::TransactionTooLarge {
                            size: total,
                            max: self.max_transaction_size,
                        });
                    }
                    self.state = State::WaitingForBody { total };
                }

                State::WaitingForBody { total } => {
                    let total = *total;
                    if self.buffer.len() < total {
                        return Ok(None);
                    }

                    let bytes = self.buffer.split_to(total);
                    self.state = State::WaitingForHeader;
                    return Ok(Some(SerializedTransaction::from_vec(bytes.to_vec())));
                }
            }
        }
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForHeader;
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::WaitingForHeader => "WaitingForHeader",
            State::WaitingForCountTable { .. } => "WaitingForCountTable",
            State::WaitingForBody { .. } => "WaitingForBody",
        }
    }
}

impl Default for TransactionBuffer {
    fn default() -> Self {
        Self::new()
    }
}
