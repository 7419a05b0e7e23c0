//! Transport module - moving wire buffers across the boundary.
//!
//! Provides:
//! - [`Transport`] - synchronous request/reply exchange used by the client
//! - [`Loopback`] - in-process transport that dispatches into a
//!   [`HandlerRegistry`](crate::handler::HandlerRegistry) on a private copy
//!   of the bytes
//! - [`stream`] - framing helpers over tokio `AsyncRead`/`AsyncWrite`

mod loopback;
pub mod stream;

pub use loopback::Loopback;

use crate::error::Result;
use crate::protocol::SerializedTransaction;

/// Carries one serialized request to a receiver and returns its reply.
///
/// The transport owns the request buffer once called and releases it after
/// the reply exists; the reply is handed back for merge.
pub trait Transport {
    fn exchange(&mut self, request: SerializedTransaction) -> Result<SerializedTransaction>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn exchange(&mut self, request: SerializedTransaction) -> Result<SerializedTransaction> {
        (**self).exchange(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn exchange(&mut self, request: SerializedTransaction) -> Result<SerializedTransaction> {
        (**self).exchange(request)
    }
}
