//! # txnwire
//!
//! Marshaling of request/reply transactions across an address-space
//! boundary.
//!
//! A request is a control operation (opcode plus a fixed-size control buffer)
//! with an optional scatter/gather list of data fragments. This crate turns
//! one into a single contiguous, pointer-free wire buffer, rebuilds it in
//! place on the receiver, writes the receiver's results back into the same
//! buffer, and finally copies them into the original request.
//!
//! ## Architecture
//!
//! - **Protocol** ([`protocol`]): 64-byte little-endian header, SG count
//!   table and data packing, stream reassembly
//! - **Marshal** ([`Marshaler`]): serialize, unpack, repack, merge
//! - **Dispatch** ([`handler`]): opcode-keyed handlers on the receiver
//! - **Transport** ([`transport`]): in-process loopback and tokio streams
//!
//! ## Example
//!
//! ```
//! use txnwire::protocol::{PacketStatus, Status};
//! use txnwire::request::{ControlOp, Request, SgList};
//! use txnwire::Marshaler;
//!
//! let marshaler = Marshaler::default();
//!
//! let mut control = *b"0123456789ABCDEF";
//! let mut a = *b"AAAAAAAA";
//! let mut b = *b"BBBB";
//! let mut sg = SgList::new();
//! sg.push(&mut a).push(&mut b);
//! let mut request = Request::new(ControlOp::new(0x42, &mut control)).with_sg(sg);
//!
//! // Originator
//! let mut wire = marshaler.serialize(&request).unwrap().into_vec();
//!
//! // Receiver
//! let mut txn = marshaler.unpack(&mut wire, None).unwrap();
//! txn.fragment_mut(1).unwrap().copy_from_slice(b"bbbb");
//! txn.request_mut().set_status(PacketStatus::new(Status::SUCCESS, 0));
//! txn.repack();
//!
//! // Originator
//! marshaler.merge(&wire, &mut request).unwrap();
//! assert!(request.status().code.is_success());
//! drop(request);
//! assert_eq!(&b, b"bbbb");
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod marshal;
pub mod protocol;
pub mod request;
pub mod tracker;
pub mod transport;

mod client;

pub use client::{Client, ClientBuilder};
pub use config::MarshalConfig;
pub use error::{Result, TxnWireError};
pub use handler::HandlerRegistry;
pub use marshal::{Marshaler, SgDescriptors, UnpackedTransaction};
pub use protocol::{SerializedTransaction, Status};
pub use request::{Completion, ControlOp, Request, SgList};
pub use tracker::DescriptorTracker;
