//! Broadcasts a discovery query and collects every matching answer received within a short
//! window (§4.8).

use crate::config::{BROADCAST_HEADER, DISCOVERY_PORT, DISCOVERY_QUERY_WINDOW};
use crate::discovery::descriptor::DiscoverableEndpointDescriptor;
use std::io;
use tokio::net::UdpSocket;

/// Sends one broadcast query and returns every host that answered before
/// [`DISCOVERY_QUERY_WINDOW`] elapsed, filtered by `game_identifier` (`None` accepts every
/// answer regardless of the game it advertises). Hosts that answer late, or not at all, are
/// silently absent from the result — there is no retry, matching the fire-and-forget nature
/// of LAN discovery (§4.8, §8 scenario 6).
pub async fn discover(game_identifier: Option<&str>) -> io::Result<Vec<DiscoverableEndpointDescriptor>> {
    let socket = UdpSocket::bind(("0.0.0.0", 0)).await?;
    socket.set_broadcast(true)?;
    socket.send_to(BROADCAST_HEADER.as_bytes(), (std::net::Ipv4Addr::BROADCAST, DISCOVERY_PORT)).await?;

    let mut found = Vec::new();
    let mut buf = [0u8; 512];
    let deadline = tokio::time::Instant::now() + DISCOVERY_QUERY_WINDOW;

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }

        let recv = tokio::time::timeout(remaining, socket.recv_from(&mut buf)).await;
        let (len, _peer) = match recv {
            Ok(Ok(pair)) => pair,
            Ok(Err(_)) => continue, // transient per-datagram I/O error (e.g. ICMP port-unreachable); keep waiting out the window
            Err(_) => break,        // the collection window itself elapsed
        };

        if let Ok(descriptor) = DiscoverableEndpointDescriptor::decode(&mut &buf[..len]) {
            match game_identifier {
                Some(wanted) if descriptor.game_identifier != wanted => continue,
                _ => found.push(descriptor),
            }
        }
    }

    Ok(found)
}
