//! Returned wire buffer back into the originating request.

use super::Marshaler;
use crate::error::{Result, TxnWireError};
use crate::protocol::{live_fragments, live_fragments_mut, split_sections};
use crate::request::Request;

impl Marshaler {
    /// Copy a repacked reply into the request it was serialized from.
    ///
    /// The reply must describe exactly the original layout: same opcode,
    /// same control length, same fragment count and the same count for every
    /// fragment. Everything is checked before the first byte is written, so a
    /// rejected reply leaves the request untouched.
    ///
    /// On success the control buffer and every fragment are overwritten in
    /// place (using the original counts), followed by packet status and
    /// control status/qualifier. Nothing is allocated.
    ///
    /// # Errors
    ///
    /// - `Protocol` for a malformed buffer, opcode or element count mismatch
    /// - `LengthMismatch` if the control length changed
    /// - `FragmentMismatch` if any fragment count changed
    pub fn merge(&self, wire: &[u8], original: &mut Request<'_>) -> Result<()> {
        let sections = split_sections(wire)?;
        let header = sections.header;
        let max_fragments = self.config.max_sg_fragments;

        if header.opcode != original.control().opcode {
            return Err(TxnWireError::Protocol(format!(
                "Reply opcode {:#x} does not match request opcode {:#x}",
                header.opcode,
                original.control().opcode
            )));
        }

        let expected = original.control().len();
        if sections.control.len() != expected {
            return Err(TxnWireError::LengthMismatch {
                expected,
                actual: sections.control.len(),
            });
        }

        let originals: &[_] = match original.sg() {
            Some(list) => live_fragments(list, max_fragments)?,
            None => &[],
        };
        if header.sg_element_count as usize != originals.len() {
            return Err(TxnWireError::Protocol(format!(
                "Reply carries {} SG fragments, request has {}",
                header.sg_element_count,
                originals.len()
            )));
        }
        for (index, (fragment, count)) in originals.iter().zip(sections.counts()).enumerate() {
            if fragment.count() != count as usize {
                return Err(TxnWireError::FragmentMismatch {
                    index,
                    expected: fragment.count(),
                    actual: count as usize,
                });
            }
        }

        original
            .control_mut()
            .buffer_mut()
            .copy_from_slice(sections.control);

        if let Some(list) = original.sg_mut() {
            let mut cursor = 0usize;
            for fragment in live_fragments_mut(list, max_fragments)? {
                let count = fragment.count();
                fragment
                    .data_mut()
                    .copy_from_slice(&sections.sg_data[cursor..cursor + count]);
                cursor += count;
            }
        }

        original.set_status(header.packet_status);
        original
            .control_mut()
            .set_status(header.control_status, header.control_qualifier);

        tracing::trace!(
            "Merged opcode {:#x} with status {:#x}",
            header.opcode,
            header.packet_status.code.0
        );

        Ok(())
    }
}
