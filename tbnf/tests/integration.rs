//! Cross-component scenarios that a single module's `#[cfg(test)]` block can't exercise: two
//! independently driven tokio tasks talking over real loopback sockets (§8). Everything else
//! lives next to the code it tests; this file is reserved for the handful of seed scenarios
//! that genuinely span client, host and discovery.

use std::net::{Ipv4Addr, TcpListener as StdTcpListener};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use slog::Discard;
use tbnf::prelude::*;

fn test_logger() -> slog::Logger {
    slog::Logger::root(Discard, slog::o!())
}

/// Grabs an ephemeral port by binding and immediately dropping a std listener. Small TOCTOU
/// window; acceptable for tests run on a single machine.
fn free_port() -> u16 {
    StdTcpListener::bind(("127.0.0.1", 0)).unwrap().local_addr().unwrap().port()
}

fn fast_config() -> EndpointConfig {
    EndpointConfig::new(Duration::from_millis(200), Duration::from_secs(2))
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct PingMessage {
    sequence: u8,
}

impl WireMessage for PingMessage {
    const CANONICAL_NAME: &'static str = "tbnf::tests::integration::PingMessage";
    const AUTHOR: PermittedAuthor = PermittedAuthor::Client;

    fn write_payload(&self, w: &mut dyn std::io::Write) -> Result<(), tbnf::error::CodecError> {
        w.write_all(&[self.sequence]).map_err(|_| tbnf::error::CodecError::Malformed("ping"))
    }

    fn read_payload(r: &mut dyn std::io::Read) -> Result<Self, tbnf::error::CodecError> {
        let mut byte = [0u8; 1];
        r.read_exact(&mut byte).map_err(|_| tbnf::error::CodecError::Malformed("ping"))?;
        Ok(PingMessage { sequence: byte[0] })
    }
}

/// A client connects, identifies itself, and receives `NetworkIdentifier = 0` as the first
/// registered client (§8 scenario 3, §9 "prior size" rule).
#[tokio::test]
async fn first_client_receives_network_identifier_zero() {
    let registry = Arc::new(MessageRegistry::build(Vec::new()).unwrap());
    let port = free_port();
    let addr = ([127, 0, 0, 1], port).into();

    let authenticator = EndpointAuthenticator::new(
        registry.clone(),
        fast_config(),
        HandlerDispatchBuilder::<EndpointHandle>::new(registry.clone()).build(),
        |_address| LifecycleHooks::default(),
        |_address, _handle| {},
        test_logger(),
    );
    tokio::spawn(authenticator.clone().listen(addr));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let client = ClientEndpoint::new(
        registry.clone(),
        fast_config(),
        LifecycleHooks::default(),
        HandlerDispatchBuilder::<EndpointHandle>::new(registry).build(),
        addr,
        ClientAddress::new([1, 2, 3, 4, 5, 6], 0),
        test_logger(),
    );
    let handle = client.start();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(handle.network_identifier(), Some(0));

    handle.dispose();
    authenticator.stop();
}

/// A forced disconnection drives the client's reconnect loop, and the identifier the host
/// assigned on first contact survives the reattachment unchanged (§8 scenario 3, §4.7).
#[tokio::test]
async fn reconnect_preserves_network_identifier() {
    let registry = Arc::new(MessageRegistry::build(Vec::new()).unwrap());
    let port = free_port();
    let addr = ([127, 0, 0, 1], port).into();

    let authenticator = EndpointAuthenticator::new(
        registry.clone(),
        fast_config(),
        HandlerDispatchBuilder::<EndpointHandle>::new(registry.clone()).build(),
        |_address| LifecycleHooks::default(),
        |_address, _handle| {},
        test_logger(),
    );
    tokio::spawn(authenticator.clone().listen(addr));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let client = ClientEndpoint::new(
        registry.clone(),
        fast_config(),
        LifecycleHooks::default(),
        HandlerDispatchBuilder::<EndpointHandle>::new(registry).build(),
        addr,
        ClientAddress::new([9, 9, 9, 9, 9, 9], 0),
        test_logger(),
    );
    let handle = client.start();
    tokio::time::sleep(Duration::from_millis(200)).await;
    let first = handle.network_identifier();
    assert_eq!(first, Some(0));

    handle.force_disconnection();
    // The client's reconnect loop backs off for a couple seconds between attempts.
    tokio::time::sleep(Duration::from_millis(3500)).await;
    assert_eq!(handle.network_identifier(), first);

    handle.dispose();
    authenticator.stop();
}

/// A message enqueued on the client is delivered to the host's bound handler, proving the
/// queue and dispatch tables actually talk to each other end to end (§4.3, §4.4, §8 scenario 4).
#[tokio::test]
async fn enqueued_message_reaches_the_host_handler() {
    let user_descriptors = vec![MessageDescriptor::of::<PingMessage>()];
    let registry = Arc::new(MessageRegistry::build(user_descriptors).unwrap());
    let port = free_port();
    let addr = ([127, 0, 0, 1], port).into();

    let received: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
    let received_for_handler = received.clone();

    let host_dispatch = HandlerDispatchBuilder::<EndpointHandle>::new(registry.clone())
        .on::<PingMessage, _>(move |_handle, ping| {
            received_for_handler.lock().unwrap().push(ping.sequence);
        })
        .unwrap()
        .build();

    let authenticator = EndpointAuthenticator::new(
        registry.clone(),
        fast_config(),
        host_dispatch,
        |_address| LifecycleHooks::default(),
        |_address, _handle| {},
        test_logger(),
    );
    tokio::spawn(authenticator.clone().listen(addr));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let client = ClientEndpoint::new(
        registry.clone(),
        fast_config(),
        LifecycleHooks::default(),
        HandlerDispatchBuilder::<EndpointHandle>::new(registry).build(),
        addr,
        ClientAddress::new([2, 2, 2, 2, 2, 2], 0),
        test_logger(),
    );
    let handle = client.start();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(handle.enqueue(PingMessage { sequence: 7 }));
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(*received.lock().unwrap(), vec![7]);

    handle.dispose();
    authenticator.stop();
}

/// Messages enqueued while the client has no host to connect to are held, not dropped, and are
/// delivered in order once a connection is finally established (§4.4 "Messages enqueued while
/// disconnected are held", §8 scenario 4).
#[tokio::test]
async fn queued_messages_survive_until_the_host_comes_up() {
    let user_descriptors = vec![MessageDescriptor::of::<PingMessage>()];
    let registry = Arc::new(MessageRegistry::build(user_descriptors).unwrap());
    let port = free_port();
    let addr = ([127, 0, 0, 1], port).into();

    let received: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
    let received_for_handler = received.clone();

    let client = ClientEndpoint::new(
        registry.clone(),
        fast_config(),
        LifecycleHooks::default(),
        HandlerDispatchBuilder::<EndpointHandle>::new(registry.clone()).build(),
        addr,
        ClientAddress::new([4, 4, 4, 4, 4, 4], 0),
        test_logger(),
    );
    let handle = client.start();

    // No host is listening yet: these three sit in the queue rather than being dropped.
    assert!(handle.enqueue(PingMessage { sequence: 1 }));
    assert!(handle.enqueue(PingMessage { sequence: 2 }));
    assert!(handle.enqueue(PingMessage { sequence: 3 }));
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(received.lock().unwrap().is_empty());

    let host_dispatch = HandlerDispatchBuilder::<EndpointHandle>::new(registry.clone())
        .on::<PingMessage, _>(move |_handle, ping| {
            received_for_handler.lock().unwrap().push(ping.sequence);
        })
        .unwrap()
        .build();

    let authenticator = EndpointAuthenticator::new(
        registry,
        fast_config(),
        host_dispatch,
        |_address| LifecycleHooks::default(),
        |_address, _handle| {},
        test_logger(),
    );
    tokio::spawn(authenticator.clone().listen(addr));

    // The client's reconnect loop backs off for a couple seconds between failed attempts, so
    // the next attempt (the one that actually succeeds, now that the host is listening) only
    // fires on its own schedule rather than immediately after the host comes up.
    tokio::time::sleep(Duration::from_millis(3000)).await;
    assert_eq!(*received.lock().unwrap(), vec![1, 2, 3]);

    handle.dispose();
    authenticator.stop();
}

/// An idle send loop injects an `InactivityCheckMessage` on its own, without user traffic, once
/// the configured interval elapses (§4.4, §8 scenario 5).
#[tokio::test]
async fn idle_connection_receives_an_inactivity_probe() {
    let registry = Arc::new(MessageRegistry::build(Vec::new()).unwrap());
    let port = free_port();
    let addr = ([127, 0, 0, 1], port).into();

    let probes: Arc<AtomicU8> = Arc::new(AtomicU8::new(0));
    let probes_for_hook = probes.clone();

    let host_dispatch = HandlerDispatchBuilder::<EndpointHandle>::new(registry.clone())
        .ignore::<InactivityCheckMessage>()
        .unwrap()
        .build();

    let authenticator = EndpointAuthenticator::new(
        registry.clone(),
        fast_config(),
        host_dispatch,
        |_address| LifecycleHooks::default(),
        |_address, _handle| {},
        test_logger(),
    );
    tokio::spawn(authenticator.clone().listen(addr));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut hooks = LifecycleHooks::default();
    hooks.on_raw_message_received = Some(Box::new(move |_tag| {
        probes_for_hook.fetch_add(1, Ordering::SeqCst);
    }));

    let client = ClientEndpoint::new(
        registry.clone(),
        fast_config(),
        hooks,
        HandlerDispatchBuilder::<EndpointHandle>::new(registry).build(),
        addr,
        ClientAddress::new([3, 3, 3, 3, 3, 3], 0),
        test_logger(),
    );
    let handle = client.start();

    // `fast_config` sets a 200ms inactivity interval; wait comfortably past a couple of them.
    tokio::time::sleep(Duration::from_millis(800)).await;
    assert!(probes.load(Ordering::SeqCst) >= 1);

    handle.dispose();
    authenticator.stop();
}

/// A discoverer filtering by `GameIdentifier` only collects answers from hosts advertising that
/// exact identifier (§4.8, §8 scenario 6).
#[tokio::test]
async fn discovery_filters_by_game_identifier() {
    let descriptor = DiscoverableEndpointDescriptor::new("test-host", "tbnf-integration-alpha", Ipv4Addr::LOCALHOST.into(), 9000);
    let answerer = DiscoveryAnswerer::new(descriptor);
    let cancel = tokio_util::sync::CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move { let _ = answerer.listen(cancel).await; }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let matching = discover(Some("tbnf-integration-alpha")).await.unwrap();
    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0].name, "test-host");

    let non_matching = discover(Some("tbnf-integration-beta")).await.unwrap();
    assert!(non_matching.is_empty());

    cancel.cancel();
}
