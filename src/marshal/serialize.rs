//! Request to wire buffer.

use super::Marshaler;
use crate::error::{Result, TxnWireError};
use crate::protocol::{
    live_fragments, measure, pack, Header, PacketStatus, SerializedTransaction, Status,
    HEADER_SIZE,
};
use crate::request::Request;

impl Marshaler {
    /// Serialize a request into one contiguous wire buffer.
    ///
    /// Layout: `[header][control buffer][sg count table][sg data]`. Only
    /// values are written; no address from the request reaches the buffer.
    /// Packet and control status are seeded to [`Status::UNSUCCESSFUL`] so a
    /// reply that never gets repacked reads as a failure.
    ///
    /// # Errors
    ///
    /// - `UnterminatedSgList` if the SG list exceeds `max_sg_fragments`
    /// - `TransactionTooLarge` if the result would exceed `max_transaction_size`
    /// - `AllocationFailed` if the buffer cannot be allocated
    ///
    /// Nothing is allocated when validation fails.
    pub fn serialize(&self, request: &Request<'_>) -> Result<SerializedTransaction> {
        let max_fragments = self.config.max_sg_fragments;
        let area = measure(request.sg(), max_fragments)?;

        let control = request.control();
        let buffer_length = u32::try_from(control.len()).map_err(|_| {
            TxnWireError::Protocol(format!(
                "Control buffer of {} bytes does not fit a u32 length",
                control.len()
            ))
        })?;

        let total = HEADER_SIZE
            .checked_add(control.len())
            .and_then(|n| n.checked_add(area.size()))
            .ok_or_else(|| TxnWireError::Protocol("Transaction size overflows usize".to_string()))?;
        if total > self.config.max_transaction_size {
            return Err(TxnWireError::TransactionTooLarge {
                size: total,
                max: self.config.max_transaction_size,
            });
        }

        let header = Header {
            buffer_length,
            addressing: request.addressing(),
            attributes: request.attributes(),
            opcode: control.opcode,
            sg_element_count: area.element_count as u32,
            packet_status: PacketStatus::unsuccessful(),
            control_status: Status::UNSUCCESSFUL,
            control_qualifier: 0,
            key_handle: request.key_handle(),
            spare: 0,
        };

        let mut txn = SerializedTransaction::allocate(total)?;
        let buf = txn.as_mut_bytes();
        header.encode_into(&mut buf[..HEADER_SIZE]);

        let (control_area, sg_area) = buf[HEADER_SIZE..].split_at_mut(control.len());
        control_area.copy_from_slice(control.buffer());

        if let Some(list) = request.sg() {
            pack(live_fragments(list, max_fragments)?, area, sg_area);
        }

        tracing::debug!(
            "Serialized opcode {:#x}: {} control bytes, {} fragments ({} bytes), {} total",
            header.opcode,
            control.len(),
            area.element_count,
            area.data_bytes,
            total
        );

        Ok(txn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MarshalConfig;
    use crate::protocol::{attributes, Addressing, SG_COUNT_SIZE};
    use crate::request::{ControlOp, SgList};

    #[test]
    fn test_concrete_layout() {
        let mut control = *b"0123456789ABCDEF";
        let mut a = *b"AAAAAAAA";
        let mut b = *b"BBBB";
        let mut sg = SgList::new();
        sg.push(&mut a).push(&mut b);
        let request = Request::new(ControlOp::new(0x42, &mut control)).with_sg(sg);

        let txn = Marshaler::default().serialize(&request).unwrap();

        assert_eq!(txn.len(), HEADER_SIZE + 36);
        let bytes = txn.as_bytes();
        assert_eq!(&bytes[HEADER_SIZE..HEADER_SIZE + 16], b"0123456789ABCDEF");
        assert_eq!(&bytes[HEADER_SIZE + 16..HEADER_SIZE + 20], &8u32.to_le_bytes());
        assert_eq!(&bytes[HEADER_SIZE + 20..HEADER_SIZE + 24], &4u32.to_le_bytes());
        assert_eq!(&bytes[HEADER_SIZE + 24..HEADER_SIZE + 32], b"AAAAAAAA");
        assert_eq!(&bytes[HEADER_SIZE + 32..], b"BBBB");
    }

    #[test]
    fn test_size_law() {
        let mut control = [7u8; 5];
        let mut f1 = [1u8; 3];
        let mut f2 = [2u8; 11];
        let mut f3 = [3u8; 1];
        let sg: SgList<'_> = vec![&mut f1[..], &mut f2[..], &mut f3[..]]
            .into_iter()
            .collect();
        let request = Request::new(ControlOp::new(1, &mut control)).with_sg(sg);

        let txn = Marshaler::default().serialize(&request).unwrap();
        assert_eq!(txn.len(), HEADER_SIZE + 5 + SG_COUNT_SIZE * 3 + (3 + 11 + 1));
    }

    #[test]
    fn test_fail_closed_seed() {
        let mut control = [0u8; 4];
        let mut request = Request::new(ControlOp::new(1, &mut control));
        // Caller-side success values must not leak into a fresh transaction.
        request.set_status(PacketStatus::new(Status::SUCCESS, 1));
        request.control_mut().set_status(Status::SUCCESS, 2);

        let txn = Marshaler::default().serialize(&request).unwrap();
        let header = txn.header().unwrap();

        assert_eq!(header.packet_status, PacketStatus::unsuccessful());
        assert_eq!(header.control_status, Status::UNSUCCESSFUL);
        assert_eq!(header.control_qualifier, 0);
        assert_eq!(header.spare, 0);
    }

    #[test]
    fn test_header_values_copied() {
        let mut control = [0u8; 2];
        let addressing = Addressing {
            class_id: 1,
            object_id: 2,
            service_id: 3,
            package_id: 4,
        };
        let request = Request::new(ControlOp::new(0xABCD, &mut control))
            .with_addressing(addressing)
            .with_attributes(attributes::COMPLETION_ARMED | 0x100)
            .with_key_handle(0x1122_3344_5566_7788);

        let header = Marshaler::default()
            .serialize(&request)
            .unwrap()
            .header()
            .unwrap();

        assert_eq!(header.opcode, 0xABCD);
        assert_eq!(header.addressing, addressing);
        assert_eq!(header.attributes, attributes::COMPLETION_ARMED | 0x100);
        assert_eq!(header.key_handle, 0x1122_3344_5566_7788);
        assert_eq!(header.buffer_length, 2);
        assert_eq!(header.sg_element_count, 0);
    }

    #[test]
    fn test_empty_sg_list_has_no_sg_area() {
        let mut control = [0u8; 8];
        let request = Request::new(ControlOp::new(1, &mut control)).with_sg(SgList::new());

        let txn = Marshaler::default().serialize(&request).unwrap();
        assert_eq!(txn.len(), HEADER_SIZE + 8);
        assert_eq!(txn.header().unwrap().sg_element_count, 0);
    }

    #[test]
    fn test_fragments_after_terminator_not_sent() {
        let mut control = [0u8; 1];
        let mut a = *b"keep";
        let mut dropped = *b"drop";
        let mut sg = SgList::new();
        sg.push(&mut a).terminate().push(&mut dropped);
        let request = Request::new(ControlOp::new(1, &mut control)).with_sg(sg);

        let txn = Marshaler::default().serialize(&request).unwrap();
        let sections = txn.sections().unwrap();
        assert_eq!(sections.header.sg_element_count, 1);
        assert_eq!(sections.sg_data, b"keep");
    }

    #[test]
    fn test_unterminated_sg_list_rejected() {
        let mut control = [0u8; 1];
        let mut storage = vec![1u8; 10];
        let sg: SgList<'_> = storage.chunks_mut(1).collect();
        let request = Request::new(ControlOp::new(1, &mut control)).with_sg(sg);

        let marshaler = Marshaler::new(MarshalConfig {
            max_sg_fragments: 8,
            ..MarshalConfig::default()
        });
        let err = marshaler.serialize(&request).unwrap_err();
        assert!(matches!(err, TxnWireError::UnterminatedSgList { limit: 8 }));
    }

    #[test]
    fn test_transaction_too_large() {
        let mut control = [0u8; 100];
        let request = Request::new(ControlOp::new(1, &mut control));

        let marshaler = Marshaler::new(MarshalConfig {
            max_transaction_size: HEADER_SIZE + 99,
            ..MarshalConfig::default()
        });
        let err = marshaler.serialize(&request).unwrap_err();
        assert!(matches!(
            err,
            TxnWireError::TransactionTooLarge { size, .. } if size == HEADER_SIZE + 100
        ));
    }
}
