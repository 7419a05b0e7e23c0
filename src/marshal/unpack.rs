//! Wire buffer to request (receiver side), and repack.
//!
//! The unpacked request borrows the received buffer: its control buffer and
//! every SG descriptor are disjoint mutable slices of that buffer, so a
//! handler works in place and no payload byte is copied. The descriptor
//! array is owned by [`SgDescriptors`], which cannot outlive the buffer.

use super::Marshaler;
use crate::error::{Result, TxnWireError};
use crate::protocol::{
    attributes, expected_len, unpack_descriptors, write_spare, write_status, Header,
    SgDescriptor, HEADER_SIZE,
};
use crate::request::{Completion, ControlOp, Request};
use crate::tracker::DescriptorGuard;

/// Owned SG descriptor array of one unpacked transaction.
///
/// Holds `n + 1` entries; the last one is the zero-count terminator.
#[derive(Debug)]
pub struct SgDescriptors<'w> {
    entries: Vec<SgDescriptor<'w>>,
    guard: DescriptorGuard,
}

impl<'w> SgDescriptors<'w> {
    /// Number of fragments (terminator excluded).
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len() - 1
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries, terminator included.
    #[inline]
    pub fn entries(&self) -> &[SgDescriptor<'w>] {
        &self.entries
    }

    /// Fragment `index` as a mutable slice of the wire buffer.
    pub fn fragment_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        self.entries.get_mut(index).and_then(|d| d.data_mut())
    }

    /// Fragments in list order.
    pub fn fragments(&self) -> Vec<&[u8]> {
        self.entries.iter().filter_map(|d| d.data()).collect()
    }

    /// Receiver-local token stored in the spare slot while unpacked.
    #[inline]
    pub fn token(&self) -> u64 {
        self.guard.token()
    }

    fn release(self) {
        let Self { entries, guard } = self;
        drop(entries);
        guard.release();
    }
}

/// A received transaction, rebuilt in place and ready for its handler.
///
/// Call [`repack`](Self::repack) once the handler has run. Dropping it
/// instead still frees the descriptor array and clears the spare slot, but
/// the header keeps its failure seed and the tracker counts the array as
/// abandoned.
#[derive(Debug)]
pub struct UnpackedTransaction<'w> {
    header_bytes: &'w mut [u8],
    header: Header,
    request: Request<'w>,
    descriptors: Option<SgDescriptors<'w>>,
}

impl<'w> UnpackedTransaction<'w> {
    /// Header as received, with honored attributes and the local spare.
    #[inline]
    pub fn header(&self) -> &Header {
        &self.header
    }

    #[inline]
    pub fn opcode(&self) -> u32 {
        self.header.opcode
    }

    #[inline]
    pub fn request(&self) -> &Request<'w> {
        &self.request
    }

    #[inline]
    pub fn request_mut(&mut self) -> &mut Request<'w> {
        &mut self.request
    }

    /// Control buffer, in place inside the wire buffer.
    #[inline]
    pub fn control_buffer_mut(&mut self) -> &mut [u8] {
        self.request.control_mut().buffer_mut()
    }

    /// Descriptor array; `None` when the request carried no SG list.
    #[inline]
    pub fn descriptors(&self) -> Option<&SgDescriptors<'w>> {
        self.descriptors.as_ref()
    }

    #[inline]
    pub fn descriptors_mut(&mut self) -> Option<&mut SgDescriptors<'w>> {
        self.descriptors.as_mut()
    }

    /// SG fragment `index`, in place inside the wire buffer.
    pub fn fragment_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        self.descriptors.as_mut()?.fragment_mut(index)
    }

    /// Number of SG fragments.
    pub fn fragment_count(&self) -> usize {
        self.descriptors.as_ref().map_or(0, |d| d.len())
    }

    /// Write final status into the header and release the descriptor array.
    ///
    /// Overwrites packet status, its qualifier, control status and control
    /// qualifier with the request's values and clears the spare slot. The
    /// wire buffer itself stays with the caller. Returns the header as it
    /// now reads on the wire.
    pub fn repack(mut self) -> Header {
        let packet_status = self.request.status();
        let control = self.request.control();
        let (control_status, control_qualifier) = (control.status, control.qualifier);
        write_status(self.header_bytes, packet_status, control_status, control_qualifier);
        write_spare(self.header_bytes, 0);

        if let Some(descriptors) = self.descriptors.take() {
            debug_assert_eq!(self.header.spare, descriptors.token());
            descriptors.release();
        }

        let header = &mut self.header;
        header.packet_status = packet_status;
        header.control_status = control_status;
        header.control_qualifier = control_qualifier;
        header.spare = 0;

        tracing::trace!(
            "Repacked opcode {:#x} with status {:#x}/{:#x}",
            header.opcode,
            packet_status.code.0,
            control_status.0
        );

        self.header
    }
}

impl Drop for UnpackedTransaction<'_> {
    fn drop(&mut self) {
        // The local token must not travel back on the wire.
        write_spare(self.header_bytes, 0);
    }
}

impl Marshaler {
    /// Rebuild a request over a received wire buffer.
    ///
    /// The control operation references the embedded control region. For a
    /// non-empty SG list a descriptor array of `n + 1` entries is allocated
    /// whose entries borrow consecutive pieces of the SG data region, and its
    /// token is recorded in the spare slot. Whatever spare value the sender
    /// put there is discarded.
    ///
    /// The `COMPLETION_ARMED` attribute is kept only when `completion` is
    /// supplied; a remote bit is never turned into a live primitive.
    ///
    /// # Errors
    ///
    /// Malformed buffers (short, inconsistent sizes, zero counts, limits
    /// exceeded) and `AllocationFailed` abort before anything is attached or
    /// written to the buffer.
    pub fn unpack<'w>(
        &self,
        wire: &'w mut [u8],
        completion: Option<Completion>,
    ) -> Result<UnpackedTransaction<'w>> {
        let header = Header::parse(wire)?;
        header.validate(self.config.max_sg_fragments, self.config.max_transaction_size)?;

        let fixed = header.fixed_size();
        if wire.len() < fixed {
            return Err(TxnWireError::Protocol(format!(
                "Buffer of {} bytes is shorter than its fixed part ({} bytes)",
                wire.len(),
                fixed
            )));
        }
        let expected = expected_len(&header, &wire[header.count_table_offset()..fixed])?;
        if expected > self.config.max_transaction_size {
            return Err(TxnWireError::TransactionTooLarge {
                size: expected,
                max: self.config.max_transaction_size,
            });
        }
        if wire.len() != expected {
            return Err(TxnWireError::Protocol(format!(
                "Buffer of {} bytes does not match the {} bytes its header describes",
                wire.len(),
                expected
            )));
        }

        if header.spare != 0 {
            tracing::warn!(
                "Ignoring spare value {:#x} received for opcode {:#x}",
                header.spare,
                header.opcode
            );
        }

        let (header_bytes, rest) = wire.split_at_mut(HEADER_SIZE);
        let (control, rest) = rest.split_at_mut(header.buffer_length as usize);
        let (table, data) = rest.split_at_mut(header.count_table_size());

        let descriptors = if header.sg_element_count > 0 {
            let entries = unpack_descriptors(table, data, fixed)?;
            Some(SgDescriptors {
                entries,
                guard: self.tracker.acquire(),
            })
        } else {
            None
        };

        let spare = descriptors.as_ref().map_or(0, |d| d.token());
        write_spare(header_bytes, spare);

        let mut honored = header.attributes;
        let armed = attributes::has_flag(honored, attributes::COMPLETION_ARMED);
        if armed && completion.is_none() {
            tracing::debug!(
                "No local completion for opcode {:#x}, dropping armed attribute",
                header.opcode
            );
            honored &= !attributes::COMPLETION_ARMED;
        }

        let mut control_op = ControlOp::new(header.opcode, control);
        control_op.set_status(header.control_status, header.control_qualifier);

        let mut request = Request::new(control_op)
            .with_addressing(header.addressing)
            .with_attributes(honored)
            .with_key_handle(header.key_handle);
        request.set_status(header.packet_status);
        if let (true, Some(completion)) = (armed, completion) {
            request.arm_completion(completion);
        }

        tracing::trace!(
            "Unpacked opcode {:#x}: {} control bytes, {} fragments",
            header.opcode,
            header.buffer_length,
            header.sg_element_count
        );

        Ok(UnpackedTransaction {
            header_bytes,
            header: Header {
                attributes: honored,
                spare,
                ..header
            },
            request,
            descriptors,
        })
    }
}
