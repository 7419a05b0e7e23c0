//! Handler registry for dispatching received transactions by opcode.
//!
//! # Example
//!
//! ```
//! use txnwire::handler::HandlerRegistry;
//! use txnwire::protocol::Status;
//!
//! let mut registry = HandlerRegistry::new();
//!
//! registry.register(0x10, |txn| {
//!     txn.control_buffer_mut().fill(0xFF);
//!     txn.request_mut().control_mut().set_status(Status::SUCCESS, 0);
//!     Ok(())
//! });
//!
//! assert!(registry.contains(0x10));
//! ```

use std::collections::HashMap;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;

use crate::codec::MsgPackCodec;
use crate::error::{Result, TxnWireError};
use crate::marshal::{Marshaler, UnpackedTransaction};
use crate::protocol::{Header, PacketStatus, Status};
use crate::request::Completion;

/// Result type for handler functions.
pub type HandlerResult = Result<()>;

/// Trait for handler functions.
///
/// A handler works on the unpacked transaction in place: the control buffer
/// and SG fragments it writes are the bytes that travel back.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, txn: &mut UnpackedTransaction<'_>) -> HandlerResult;
}

/// Wrapper around a plain closure.
pub struct FnHandler<F> {
    handler: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&mut UnpackedTransaction<'_>) -> HandlerResult + Send + Sync + 'static,
{
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(&mut UnpackedTransaction<'_>) -> HandlerResult + Send + Sync + 'static,
{
    fn call(&self, txn: &mut UnpackedTransaction<'_>) -> HandlerResult {
        (self.handler)(txn)
    }
}

/// Wrapper that decodes the control buffer before calling the handler.
pub struct TypedHandler<F, T>
where
    F: Fn(T, &mut UnpackedTransaction<'_>) -> HandlerResult + Send + Sync + 'static,
    T: DeserializeOwned + 'static,
{
    handler: F,
    _phantom: PhantomData<fn(T)>,
}

impl<F, T> TypedHandler<F, T>
where
    F: Fn(T, &mut UnpackedTransaction<'_>) -> HandlerResult + Send + Sync + 'static,
    T: DeserializeOwned + 'static,
{
    /// Create a new typed handler.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<F, T> Handler for TypedHandler<F, T>
where
    F: Fn(T, &mut UnpackedTransaction<'_>) -> HandlerResult + Send + Sync + 'static,
    T: DeserializeOwned + 'static,
{
    fn call(&self, txn: &mut UnpackedTransaction<'_>) -> HandlerResult {
        let params: T = MsgPackCodec::decode(txn.request().control().buffer())?;
        (self.handler)(params, txn)
    }
}

/// Registry mapping opcodes to handlers.
///
/// Owns the receiver-side [`Marshaler`], so every dispatch unpacks and
/// repacks under the same limits and reports into the same tracker.
pub struct HandlerRegistry {
    handlers: HashMap<u32, Box<dyn Handler>>,
    marshaler: Marshaler,
}

impl HandlerRegistry {
    /// Create an empty registry with default limits.
    pub fn new() -> Self {
        Self::with_marshaler(Marshaler::default())
    }

    /// Create an empty registry around an existing marshaler.
    pub fn with_marshaler(marshaler: Marshaler) -> Self {
        Self {
            handlers: HashMap::new(),
            marshaler,
        }
    }

    #[inline]
    pub fn marshaler(&self) -> &Marshaler {
        &self.marshaler
    }

    /// Register a closure for `opcode`, replacing any previous handler.
    pub fn register<F>(&mut self, opcode: u32, handler: F)
    where
        F: Fn(&mut UnpackedTransaction<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        self.register_handler(opcode, FnHandler::new(handler));
    }

    /// Register a handler whose control buffer holds MsgPack parameters.
    pub fn register_typed<F, T>(&mut self, opcode: u32, handler: F)
    where
        F: Fn(T, &mut UnpackedTransaction<'_>) -> HandlerResult + Send + Sync + 'static,
        T: DeserializeOwned + 'static,
    {
        self.register_handler(opcode, TypedHandler::new(handler));
    }

    /// Register any [`Handler`] implementation.
    pub fn register_handler<H: Handler>(&mut self, opcode: u32, handler: H) {
        if self.handlers.insert(opcode, Box::new(handler)).is_some() {
            tracing::debug!("Replaced handler for opcode {:#x}", opcode);
        }
    }

    /// Get the handler for an opcode.
    pub fn get_handler(&self, opcode: u32) -> Result<&dyn Handler> {
        self.handlers
            .get(&opcode)
            .map(|h| h.as_ref())
            .ok_or(TxnWireError::HandlerNotFound(opcode))
    }

    pub fn contains(&self, opcode: u32) -> bool {
        self.handlers.contains_key(&opcode)
    }

    /// Number of registered opcodes.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run one received transaction: unpack, handler, repack.
    ///
    /// The wire buffer is updated in place and holds the reply afterwards.
    /// Handler outcomes travel only through status fields:
    ///
    /// - no handler: packet status `NOT_IMPLEMENTED`
    /// - handler `Err`: packet status `UNSUCCESSFUL`
    /// - handler `Ok`: packet status `SUCCESS`, unless the handler set its own
    ///
    /// An armed completion is signaled after the handler, before repack.
    ///
    /// # Errors
    ///
    /// Only unpack failures (malformed buffer, allocation failure) are
    /// returned; in that case the buffer is not a valid reply.
    pub fn dispatch(&self, wire: &mut [u8], completion: Option<Completion>) -> Result<Header> {
        let mut txn = self.marshaler.unpack(wire, completion)?;
        let opcode = txn.opcode();

        match self.get_handler(opcode) {
            Ok(handler) => match handler.call(&mut txn) {
                Ok(()) => {
                    if txn.request().status() == PacketStatus::unsuccessful() {
                        txn.request_mut()
                            .set_status(PacketStatus::new(Status::SUCCESS, 0));
                    }
                }
                Err(e) => {
                    tracing::error!("Handler for opcode {:#x} failed: {}", opcode, e);
                    txn.request_mut().set_status(PacketStatus::unsuccessful());
                }
            },
            Err(e) => {
                tracing::warn!("{}, replying NOT_IMPLEMENTED", e);
                txn.request_mut()
                    .set_status(PacketStatus::new(Status::NOT_IMPLEMENTED, 0));
            }
        }

        txn.request().signal_completion();
        Ok(txn.repack())
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    use crate::protocol::HEADER_SIZE;
    use crate::request::{ControlOp, Request, SgList};

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Fill {
        byte: u8,
    }

    fn wire_for(opcode: u32, control: &mut [u8], fragment: Option<&mut [u8]>) -> Vec<u8> {
        let mut request = Request::new(ControlOp::new(opcode, control));
        if let Some(fragment) = fragment {
            let mut sg = SgList::new();
            sg.push(fragment);
            request = request.with_sg(sg);
        }
        Marshaler::default().serialize(&request).unwrap().into_vec()
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = HandlerRegistry::new();
        assert!(registry.is_empty());

        registry.register(1, |_txn| Ok(()));
        registry.register(2, |_txn| Ok(()));

        assert_eq!(registry.len(), 2);
        assert!(registry.contains(1));
        assert!(registry.get_handler(2).is_ok());
    }

    #[test]
    fn test_handler_not_found() {
        let registry = HandlerRegistry::new();

        let err = registry.get_handler(0x99).err().unwrap();
        assert!(matches!(err, TxnWireError::HandlerNotFound(0x99)));
        assert_eq!(err.to_string(), "Handler not found for opcode: 0x99");
    }

    #[test]
    fn test_dispatch_success_writes_in_place() {
        let mut registry = HandlerRegistry::new();
        registry.register(7, |txn| {
            txn.control_buffer_mut().copy_from_slice(b"pong");
            txn.fragment_mut(0).unwrap().fill(b'z');
            txn.request_mut().control_mut().set_status(Status::SUCCESS, 4);
            Ok(())
        });

        let mut control = *b"ping";
        let mut data = [0u8; 3];
        let mut wire = wire_for(7, &mut control, Some(&mut data));

        let header = registry.dispatch(&mut wire, None).unwrap();

        assert_eq!(header.packet_status, PacketStatus::new(Status::SUCCESS, 0));
        assert_eq!(header.control_status, Status::SUCCESS);
        assert_eq!(header.control_qualifier, 4);
        assert_eq!(header.spare, 0);
        assert_eq!(&wire[HEADER_SIZE..HEADER_SIZE + 4], b"pong");
        assert_eq!(&wire[wire.len() - 3..], b"zzz");
        assert!(registry.marshaler().tracker().is_balanced());
    }

    #[test]
    fn test_dispatch_keeps_handler_packet_status() {
        let mut registry = HandlerRegistry::new();
        registry.register(1, |txn| {
            txn.request_mut()
                .set_status(PacketStatus::new(Status(0x4000_0005), 9));
            Ok(())
        });

        let mut control = [0u8; 1];
        let mut wire = wire_for(1, &mut control, None);
        let header = registry.dispatch(&mut wire, None).unwrap();

        assert_eq!(header.packet_status, PacketStatus::new(Status(0x4000_0005), 9));
    }

    #[test]
    fn test_dispatch_unknown_opcode() {
        let registry = HandlerRegistry::new();
        let mut control = [0u8; 2];
        let mut data = [1u8; 2];
        let mut wire = wire_for(0x55, &mut control, Some(&mut data));

        let header = registry.dispatch(&mut wire, None).unwrap();

        assert_eq!(header.packet_status.code, Status::NOT_IMPLEMENTED);
        assert_eq!(header.control_status, Status::UNSUCCESSFUL);
        assert_eq!(Header::decode(&wire).unwrap(), header);
        assert!(registry.marshaler().tracker().is_balanced());
    }

    #[test]
    fn test_dispatch_handler_error() {
        let mut registry = HandlerRegistry::new();
        registry.register(3, |txn| {
            txn.request_mut()
                .set_status(PacketStatus::new(Status::SUCCESS, 0));
            Err(TxnWireError::Protocol("device gone".to_string()))
        });

        let mut control = [0u8; 1];
        let mut wire = wire_for(3, &mut control, None);
        let header = registry.dispatch(&mut wire, None).unwrap();

        assert_eq!(header.packet_status, PacketStatus::unsuccessful());
    }

    #[test]
    fn test_dispatch_typed_handler() {
        let mut registry = HandlerRegistry::new();
        registry.register_typed(9, |fill: Fill, txn| {
            if let Some(fragment) = txn.fragment_mut(0) {
                fragment.fill(fill.byte);
            }
            MsgPackCodec::encode_into(&"filled", txn.control_buffer_mut())?;
            txn.request_mut().control_mut().set_status(Status::SUCCESS, 0);
            Ok(())
        });

        let mut control = [0u8; 16];
        MsgPackCodec::encode_into(&Fill { byte: 0x5A }, &mut control).unwrap();
        let mut data = [0u8; 4];
        let mut wire = wire_for(9, &mut control, Some(&mut data));

        let header = registry.dispatch(&mut wire, None).unwrap();
        assert!(header.packet_status.code.is_success());

        let reply: String =
            MsgPackCodec::decode(&wire[HEADER_SIZE..HEADER_SIZE + 16]).unwrap();
        assert_eq!(reply, "filled");
        assert_eq!(&wire[wire.len() - 4..], &[0x5A; 4]);
    }

    #[test]
    fn test_dispatch_typed_decode_failure() {
        let mut registry = HandlerRegistry::new();
        registry.register_typed(9, |_fill: Fill, _txn| Ok(()));

        let mut control = *b"garbage!";
        let mut wire = wire_for(9, &mut control, None);
        let header = registry.dispatch(&mut wire, None).unwrap();

        assert_eq!(header.packet_status, PacketStatus::unsuccessful());
    }

    #[test]
    fn test_dispatch_malformed_wire() {
        let registry = HandlerRegistry::new();
        let mut wire = vec![0u8; HEADER_SIZE + 1];

        assert!(registry.dispatch(&mut wire, None).is_err());
    }

    #[tokio::test]
    async fn test_dispatch_signals_armed_completion() {
        let mut registry = HandlerRegistry::new();
        registry.register(1, |_txn| Ok(()));

        let mut control = [0u8; 1];
        let request = Request::new(ControlOp::new(1, &mut control))
            .with_completion(Completion::new());
        let mut wire = Marshaler::default().serialize(&request).unwrap().into_vec();

        let local = Completion::new();
        registry.dispatch(&mut wire, Some(local.clone())).unwrap();

        // Permit stored by the dispatch.
        local.wait().await;
    }
}
