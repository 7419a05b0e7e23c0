//! Originator-side client.
//!
//! The [`ClientBuilder`] configures marshaling limits; the [`Client`] runs one
//! request through its whole originator lifecycle:
//! 1. Serialize the request into a wire buffer
//! 2. Hand the buffer to the transport and wait for the reply
//! 3. Merge the reply back into the request
//! 4. Signal the request's completion, if armed
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use txnwire::handler::HandlerRegistry;
//! use txnwire::protocol::Status;
//! use txnwire::request::{ControlOp, Request};
//! use txnwire::transport::Loopback;
//! use txnwire::Client;
//!
//! let mut registry = HandlerRegistry::new();
//! registry.register(1, |txn| {
//!     txn.control_buffer_mut().copy_from_slice(b"pong");
//!     Ok(())
//! });
//!
//! let mut client = Client::builder()
//!     .max_sg_fragments(64)
//!     .build(Loopback::new(Arc::new(registry)))
//!     .unwrap();
//!
//! let mut control = *b"ping";
//! let mut request = Request::new(ControlOp::new(1, &mut control));
//! client.call(&mut request).unwrap();
//! assert_eq!(request.status().code, Status::SUCCESS);
//! drop(request);
//! assert_eq!(&control, b"pong");
//! ```

use crate::config::MarshalConfig;
use crate::error::Result;
use crate::marshal::Marshaler;
use crate::request::Request;
use crate::tracker::DescriptorTracker;
use crate::transport::Transport;

/// Builder for configuring and creating a client.
#[derive(Debug, Default)]
pub struct ClientBuilder {
    config: MarshalConfig,
    tracker: Option<DescriptorTracker>,
}

impl ClientBuilder {
    /// Create a new client builder with default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all limits at once.
    pub fn config(mut self, config: MarshalConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the fragment bound for outgoing SG lists.
    pub fn max_sg_fragments(mut self, limit: usize) -> Self {
        self.config.max_sg_fragments = limit;
        self
    }

    /// Set the maximum serialized transaction size.
    pub fn max_transaction_size(mut self, limit: usize) -> Self {
        self.config.max_transaction_size = limit;
        self
    }

    /// Share a descriptor tracker with other marshalers.
    pub fn tracker(mut self, tracker: DescriptorTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Validate the limits and create the client.
    pub fn build<T: Transport>(self, transport: T) -> Result<Client<T>> {
        self.config.validate()?;
        let marshaler = match self.tracker {
            Some(tracker) => Marshaler::with_tracker(self.config, tracker),
            None => Marshaler::new(self.config),
        };
        Ok(Client {
            marshaler,
            transport,
        })
    }
}

/// Runs requests over a transport.
pub struct Client<T> {
    marshaler: Marshaler,
    transport: T,
}

impl Client<()> {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }
}

impl<T: Transport> Client<T> {
    /// Send one request and merge its reply.
    ///
    /// On success the request's control buffer, SG fragments and status
    /// fields hold the receiver's results. The outcome of the remote
    /// operation is in those status fields, not in the returned `Result`.
    ///
    /// # Errors
    ///
    /// Serialize errors abort before anything is sent. Transport errors and
    /// merge errors leave the request untouched.
    pub fn call(&mut self, request: &mut Request<'_>) -> Result<()> {
        let opcode = request.control().opcode;
        let wire = self.marshaler.serialize(request)?;
        let reply = self.transport.exchange(wire)?;
        self.marshaler.merge(reply.as_bytes(), request)?;
        request.signal_completion();

        tracing::debug!(
            "Completed opcode {:#x} with status {:#x}",
            opcode,
            request.status().code.0
        );
        Ok(())
    }

    #[inline]
    pub fn marshaler(&self) -> &Marshaler {
        &self.marshaler
    }

    #[inline]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[inline]
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }
}
