//! Transactions over byte streams.
//!
//! A transaction is written as its wire bytes, unmodified; the header and
//! count table are enough for the reader to find where it ends.
//!
//! - [`write_transaction`] / [`read_transaction`] move exactly one
//!   transaction and never read past it (request/reply use).
//! - [`TransactionReader`] reassembles any number of back-to-back
//!   transactions from arbitrary read sizes.
//! - [`serve`] is the receiver loop: read, dispatch, write the reply.
//! - [`call`] is the originator side: serialize, write, read, merge.
//!
//! # Example
//!
//! ```ignore
//! let (client_io, server_io) = tokio::io::duplex(64 * 1024);
//! let (server_read, server_write) = tokio::io::split(server_io);
//! tokio::spawn(async move { serve(server_read, server_write, &registry).await });
//!
//! let (mut reader, mut writer) = tokio::io::split(client_io);
//! call(&marshaler, &mut reader, &mut writer, &mut request).await?;
//! ```

use std::collections::VecDeque;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::MarshalConfig;
use crate::error::{Result, TxnWireError};
use crate::handler::HandlerRegistry;
use crate::marshal::Marshaler;
use crate::protocol::{
    expected_len, Header, SerializedTransaction, TransactionBuffer, HEADER_SIZE,
};
use crate::request::Request;

/// Read chunk size for [`TransactionReader`].
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Write one transaction and flush.
pub async fn write_transaction<W>(writer: &mut W, txn: &SerializedTransaction) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(txn.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Read exactly one transaction.
///
/// # Errors
///
/// - `ConnectionClosed` if the stream ends before the transaction is complete
/// - limit and layout errors from the header and count table
pub async fn read_transaction<R>(
    reader: &mut R,
    config: &MarshalConfig,
) -> Result<SerializedTransaction>
where
    R: AsyncRead + Unpin,
{
    let mut header_bytes = [0u8; HEADER_SIZE];
    read_exact(reader, &mut header_bytes).await?;
    let header = Header::parse(&header_bytes)?;
    header.validate(config.max_sg_fragments, config.max_transaction_size)?;

    let fixed = header.fixed_size();
    let mut buf = Vec::new();
    buf.try_reserve_exact(fixed)
        .map_err(|_| TxnWireError::AllocationFailed { bytes: fixed })?;
    buf.extend_from_slice(&header_bytes);
    buf.resize(fixed, 0);
    read_exact(reader, &mut buf[HEADER_SIZE..]).await?;

    let total = expected_len(&header, &buf[header.count_table_offset()..])?;
    if total > config.max_transaction_size {
        return Err(TxnWireError::TransactionTooLarge {
            size: total,
            max: config.max_transaction_size,
        });
    }
    buf.try_reserve_exact(total - fixed)
        .map_err(|_| TxnWireError::AllocationFailed { bytes: total })?;
    buf.resize(total, 0);
    read_exact(reader, &mut buf[fixed..]).await?;

    Ok(SerializedTransaction::from_vec(buf))
}

async fn read_exact<R>(reader: &mut R, buf: &mut [u8]) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(TxnWireError::ConnectionClosed)
        }
        Err(e) => Err(TxnWireError::Io(e)),
    }
}

/// Buffered reader for a stream of back-to-back transactions.
pub struct TransactionReader<R> {
    reader: R,
    buffer: TransactionBuffer,
    ready: VecDeque<SerializedTransaction>,
    chunk: Vec<u8>,
}

impl<R> TransactionReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R, config: &MarshalConfig) -> Self {
        Self {
            reader,
            buffer: TransactionBuffer::with_limits(
                config.max_sg_fragments,
                config.max_transaction_size,
            ),
            ready: VecDeque::new(),
            chunk: vec![0u8; READ_CHUNK_SIZE],
        }
    }

    /// Next whole transaction, or `None` on a clean end of stream.
    ///
    /// # Errors
    ///
    /// - `ConnectionClosed` if the stream ends inside a transaction
    /// - limit and layout errors; buffered bytes are discarded
    pub async fn read_next(&mut self) -> Result<Option<SerializedTransaction>> {
        loop {
            if let Some(txn) = self.ready.pop_front() {
                return Ok(Some(txn));
            }

            let n = self.reader.read(&mut self.chunk).await?;
            if n == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                tracing::debug!(
                    "Stream closed with {} bytes of a partial transaction",
                    self.buffer.len()
                );
                return Err(TxnWireError::ConnectionClosed);
            }

            match self.buffer.push(&self.chunk[..n]) {
                Ok(txns) => self.ready.extend(txns),
                Err(e) => {
                    // Byte boundaries past a rejected header are unknown.
                    self.buffer.clear();
                    return Err(e);
                }
            }
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Receiver loop: dispatch every incoming transaction and write its reply.
///
/// Returns `Ok(())` when the peer closes the stream between transactions.
pub async fn serve<R, W>(reader: R, mut writer: W, registry: &HandlerRegistry) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = TransactionReader::new(reader, registry.marshaler().config());

    while let Some(mut txn) = reader.read_next().await? {
        if let Err(e) = registry.dispatch(txn.as_mut_bytes(), None) {
            tracing::error!("Failed to unpack received transaction: {}", e);
            return Err(e);
        }
        write_transaction(&mut writer, &txn).await?;
    }

    tracing::debug!("Peer closed transaction stream");
    Ok(())
}

/// Originator side of one request over a stream.
///
/// The request is untouched unless the whole reply arrives and validates.
pub async fn call<R, W>(
    marshaler: &Marshaler,
    reader: &mut R,
    writer: &mut W,
    request: &mut Request<'_>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let wire = marshaler.serialize(request)?;
    write_transaction(writer, &wire).await?;
    drop(wire);

    let reply = read_transaction(reader, marshaler.config()).await?;
    marshaler.merge(reply.as_bytes(), request)?;
    request.signal_completion();
    Ok(())
}
