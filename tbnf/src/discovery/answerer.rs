//! Listens for discovery queries and answers them with a fixed descriptor (§4.8).

use crate::config::{BROADCAST_HEADER, DISCOVERY_PORT};
use crate::discovery::descriptor::DiscoverableEndpointDescriptor;
use socket2::{Domain, Socket, Type};
use std::io;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

/// Answers discovery queries on [`DISCOVERY_PORT`] with a fixed descriptor until cancelled.
///
/// Binds with `SO_REUSEADDR` (via `socket2`) so more than one answerer can share the port on
/// the same host — useful when running several test instances on one machine, and harmless
/// in production since only one will normally be present per host.
pub struct DiscoveryAnswerer {
    descriptor: DiscoverableEndpointDescriptor,
}

impl DiscoveryAnswerer {
    pub fn new(descriptor: DiscoverableEndpointDescriptor) -> DiscoveryAnswerer {
        DiscoveryAnswerer { descriptor }
    }

    /// Runs the answer loop until `cancel` fires. Each query is answered directly back to its
    /// sender, never re-broadcast.
    pub async fn listen(&self, cancel: CancellationToken) -> io::Result<()> {
        let socket = bind_reusable(DISCOVERY_PORT)?;

        let mut buf = [0u8; 512];
        loop {
            let recv = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                result = socket.recv_from(&mut buf) => result,
            };

            let (len, peer) = match recv {
                Ok(pair) => pair,
                Err(_) => continue,
            };

            if !is_valid_query(&buf[..len]) {
                continue;
            }

            let mut answer = Vec::new();
            if self.descriptor.encode(&mut answer).is_ok() {
                let _ = socket.send_to(&answer, peer).await;
            }
        }
    }
}

/// Matches `BroadcastHeader` case-insensitively against the start of the datagram (§4.8).
fn is_valid_query(bytes: &[u8]) -> bool {
    bytes.len() >= BROADCAST_HEADER.len() && bytes[..BROADCAST_HEADER.len()].eq_ignore_ascii_case(BROADCAST_HEADER.as_bytes())
}

fn bind_reusable(port: u16) -> io::Result<UdpSocket> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, None)?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    UdpSocket::from_std(socket.into())
}
