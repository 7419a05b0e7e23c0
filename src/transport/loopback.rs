//! In-process transport.

use std::sync::Arc;

use super::Transport;
use crate::error::{Result, TxnWireError};
use crate::handler::HandlerRegistry;
use crate::protocol::SerializedTransaction;

/// Transport that runs the receiver in the calling thread.
///
/// Each exchange copies the request into a fresh buffer before dispatch, so
/// the receiver never sees memory owned by the originator.
#[derive(Clone)]
pub struct Loopback {
    registry: Arc<HandlerRegistry>,
}

impl Loopback {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    #[inline]
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }
}

impl Transport for Loopback {
    fn exchange(&mut self, request: SerializedTransaction) -> Result<SerializedTransaction> {
        let max = self.registry.marshaler().config().max_transaction_size;
        if request.len() > max {
            return Err(TxnWireError::TransactionTooLarge {
                size: request.len(),
                max,
            });
        }

        let mut received = SerializedTransaction::allocate(request.len())?;
        received.as_mut_bytes().copy_from_slice(request.as_bytes());
        drop(request);

        let header = self.registry.dispatch(received.as_mut_bytes(), None)?;
        tracing::trace!(
            "Loopback reply for opcode {:#x}: {:#x}",
            header.opcode,
            header.packet_status.code.0
        );

        Ok(received)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MarshalConfig;
    use crate::marshal::Marshaler;
    use crate::protocol::{Header, Status, HEADER_SIZE};
    use crate::request::{ControlOp, Request};

    fn registry() -> Arc<HandlerRegistry> {
        let mut registry = HandlerRegistry::new();
        registry.register(1, |txn| {
            txn.control_buffer_mut().reverse();
            Ok(())
        });
        Arc::new(registry)
    }

    #[test]
    fn test_exchange_dispatches_copy() {
        let mut transport = Loopback::new(registry());
        let mut control = *b"abc";
        let request = Request::new(ControlOp::new(1, &mut control));
        let wire = Marshaler::default().serialize(&request).unwrap();
        let sent = wire.clone();

        let reply = transport.exchange(wire).unwrap();

        assert_eq!(&reply.as_bytes()[HEADER_SIZE..], b"cba");
        assert!(reply.header().unwrap().packet_status.code.is_success());
        // The originator's bytes were never touched.
        assert_eq!(&sent.as_bytes()[HEADER_SIZE..], b"abc");
        assert!(transport.registry().marshaler().tracker().is_balanced());
    }

    #[test]
    fn test_exchange_unknown_opcode_still_replies() {
        let mut transport = Loopback::new(registry());
        let mut control = [0u8; 2];
        let request = Request::new(ControlOp::new(2, &mut control));
        let wire = Marshaler::default().serialize(&request).unwrap();

        let reply = transport.exchange(wire).unwrap();
        let header: Header = reply.header().unwrap();
        assert_eq!(header.packet_status.code, Status::NOT_IMPLEMENTED);
    }

    #[test]
    fn test_exchange_rejects_oversized() {
        let config = MarshalConfig {
            max_transaction_size: HEADER_SIZE + 2,
            ..MarshalConfig::default()
        };
        let registry = HandlerRegistry::with_marshaler(Marshaler::new(config));
        let mut transport = Loopback::new(Arc::new(registry));

        let mut control = [0u8; 3];
        let request = Request::new(ControlOp::new(1, &mut control));
        let wire = Marshaler::default().serialize(&request).unwrap();

        let err = transport.exchange(wire).unwrap_err();
        assert!(matches!(err, TxnWireError::TransactionTooLarge { .. }));
    }
}
