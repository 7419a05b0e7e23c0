//! Loopback - one request through the whole marshaling lifecycle.
//!
//! This example demonstrates:
//! - Building a request with a control buffer and an SG list
//! - Serializing it into a single wire buffer
//! - Dispatching it in-process through a handler registry
//! - Merging the reply back into the original buffers
//!
//! ```text
//! cargo run --example loopback
//! ```

use std::sync::Arc;

use txnwire::handler::HandlerRegistry;
use txnwire::request::{ControlOp, Request, SgList};
use txnwire::transport::{Loopback, Transport};
use txnwire::Marshaler;

const OP_UPPERCASE: u32 = 0x10;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Receiver: uppercase every fragment, report how many bytes changed
    let mut registry = HandlerRegistry::new();
    registry.register(OP_UPPERCASE, |txn| {
        let mut changed = 0u32;
        for i in 0..txn.fragment_count() {
            if let Some(fragment) = txn.fragment_mut(i) {
                changed += fragment.iter().filter(|b| b.is_ascii_lowercase()).count() as u32;
                fragment.make_ascii_uppercase();
            }
        }
        txn.control_buffer_mut().copy_from_slice(&changed.to_le_bytes());
        Ok(())
    });
    let mut transport = Loopback::new(Arc::new(registry));

    // Originator
    let marshaler = Marshaler::default();
    let mut control = [0u8; 4];
    let mut greeting = *b"hello, ";
    let mut subject = *b"world";
    {
        let mut sg = SgList::new();
        sg.push(&mut greeting).push(&mut subject);
        let mut request = Request::new(ControlOp::new(OP_UPPERCASE, &mut control)).with_sg(sg);

        let wire = marshaler.serialize(&request)?;
        println!("Sending {} bytes", wire.len());

        let reply = transport.exchange(wire)?;
        marshaler.merge(reply.as_bytes(), &mut request)?;
        println!("Packet status: {:#x}", request.status().code.0);
    }

    println!(
        "{}{} ({} bytes changed)",
        String::from_utf8_lossy(&greeting),
        String::from_utf8_lossy(&subject),
        u32::from_le_bytes(control)
    );

    Ok(())
}
