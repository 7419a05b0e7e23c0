//! Handler module - receiver-side dispatch.
//!
//! Provides:
//! - [`HandlerRegistry`] - maps opcodes to handlers and runs unpack, handler
//!   and repack for one received wire buffer
//! - [`Handler`] - the handler trait, with closure ([`FnHandler`]) and
//!   MsgPack-decoding ([`TypedHandler`]) wrappers
//!
//! # Example
//!
//! ```
//! use serde::Deserialize;
//! use txnwire::handler::HandlerRegistry;
//! use txnwire::protocol::Status;
//!
//! #[derive(Deserialize)]
//! struct Seek {
//!     position: u64,
//! }
//!
//! let mut registry = HandlerRegistry::new();
//! registry.register_typed(0x20, |seek: Seek, txn| {
//!     txn.request_mut()
//!         .control_mut()
//!         .set_status(Status::SUCCESS, seek.position as u32);
//!     Ok(())
//! });
//! ```

mod registry;

pub use registry::{FnHandler, Handler, HandlerRegistry, HandlerResult, TypedHandler};
