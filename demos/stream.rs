//! Stream - requests and replies over a byte stream.
//!
//! This example demonstrates:
//! - Running the receiver loop with `stream::serve`
//! - Sending requests with `stream::call`
//! - Typed MsgPack parameters in the control buffer
//!
//! The two ends talk over an in-memory `tokio::io::duplex` pipe; any
//! `AsyncRead`/`AsyncWrite` pair works the same way.
//!
//! ```text
//! cargo run --example stream
//! ```

use serde::{Deserialize, Serialize};
use txnwire::codec::MsgPackCodec;
use txnwire::handler::HandlerRegistry;
use txnwire::request::{ControlOp, Request, SgList};
use txnwire::transport::stream;
use txnwire::Marshaler;

const OP_SUM: u32 = 1;

/// Control buffer contents for `OP_SUM`.
#[derive(Serialize, Deserialize, Debug)]
struct Sum {
    seed: u64,
    total: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut registry = HandlerRegistry::new();
    registry.register_typed(OP_SUM, |params: Sum, txn| {
        let mut total = params.seed;
        for i in 0..txn.fragment_count() {
            if let Some(fragment) = txn.fragment_mut(i) {
                total += fragment.iter().map(|&b| b as u64).sum::<u64>();
            }
        }
        MsgPackCodec::encode_into(&Sum { total, ..params }, txn.control_buffer_mut())?;
        Ok(())
    });

    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let server = tokio::spawn(async move {
        let (reader, writer) = tokio::io::split(server_io);
        stream::serve(reader, writer, &registry).await
    });

    let marshaler = Marshaler::default();
    let (mut reader, mut writer) = tokio::io::split(client_io);

    for seed in [0u64, 100, 1000] {
        // Sized for the reply, which carries a larger total than the request.
        let mut control = vec![0u8; 32];
        MsgPackCodec::encode_into(&Sum { seed, total: 0 }, &mut control)?;
        let mut data = vec![1u8; 10];
        let mut sg = SgList::new();
        sg.push(&mut data);
        let mut request = Request::new(ControlOp::new(OP_SUM, &mut control)).with_sg(sg);

        stream::call(&marshaler, &mut reader, &mut writer, &mut request).await?;
        let reply: Sum = MsgPackCodec::decode(request.control().buffer())?;
        println!(
            "seed {} -> total {} (status {:#x})",
            seed,
            reply.total,
            request.status().code.0
        );
    }

    // Closing our end lets the receiver loop finish cleanly
    drop(reader);
    drop(writer);
    server.await??;

    Ok(())
}
