//! Endpoint (abstract base): owns one replaceable TCP socket, runs the concurrent send and
//! receive loops, and raises lifecycle events (§4.4).
//!
//! [`EndpointCore`] holds the state every endpoint flavor shares. [`ClientEndpoint`] and
//! [`RemoteEndpoint`] each wrap an [`EndpointHandle`] (a cheap `Arc` clone of the core) and
//! supply their own [`Handshake`] implementation, per §4.5/§4.6.

use crate::config::EndpointConfig;
use crate::dispatch::HandlerDispatch;
use crate::identity::NetworkIdentifier;
use crate::message::InactivityCheckMessage;
use crate::net::frame;
use crate::registry::{MessageRegistry, PackagedFrame, TypeTag};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use slog::Logger;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use super::queue::MessageQueue;

/// Lifecycle callbacks (§4.4). Every hook is optional; unset hooks are no-ops. Shared (via
/// `Arc`) between the send loop, the receive loop and the handshake path for one endpoint.
#[derive(Default)]
pub struct LifecycleHooks {
    pub on_connection_success: Option<Box<dyn Fn() + Send + Sync>>,
    pub on_connection_failure: Option<Box<dyn Fn() + Send + Sync>>,
    pub on_disconnection: Option<Box<dyn Fn() + Send + Sync>>,
    pub on_raw_message_sent: Option<Box<dyn Fn(TypeTag) + Send + Sync>>,
    pub on_raw_message_received: Option<Box<dyn Fn(Option<TypeTag>) + Send + Sync>>,
}

impl LifecycleHooks {
    fn fire_success(&self) {
        if let Some(f) = &self.on_connection_success {
            f();
        }
    }
    fn fire_failure(&self) {
        if let Some(f) = &self.on_connection_failure {
            f();
        }
    }
    fn fire_disconnection(&self) {
        if let Some(f) = &self.on_disconnection {
            f();
        }
    }
    fn fire_sent(&self, tag: TypeTag) {
        if let Some(f) = &self.on_raw_message_sent {
            f(tag);
        }
    }
    fn fire_received(&self, tag: Option<TypeTag>) {
        if let Some(f) = &self.on_raw_message_received {
            f(tag);
        }
    }
}

/// Variant-specific handshake performed immediately after a socket connects (§4.5, §4.6).
#[async_trait]
pub trait Handshake: Send + Sync + 'static {
    async fn perform(&self, stream: &mut TcpStream, core: &EndpointCore, cancel: &CancellationToken) -> bool;
}

struct ActiveSocket {
    cancel: CancellationToken,
}

/// Shared endpoint state: the replaceable socket, message queue, configuration, cancellation
/// scope and lifecycle hooks (§3, §4.4).
pub struct EndpointCore {
    pub(crate) registry: Arc<MessageRegistry>,
    queue: MessageQueue,
    config: EndpointConfig,
    global_cancel: CancellationToken,
    current: Mutex<Option<ActiveSocket>>,
    last_activity: Mutex<Instant>,
    network_identifier: Mutex<Option<NetworkIdentifier>>,
    disposed: AtomicBool,
    hooks: Arc<LifecycleHooks>,
    log: Logger,
}

impl EndpointCore {
    pub fn new(registry: Arc<MessageRegistry>, config: EndpointConfig, hooks: LifecycleHooks, log: Logger) -> EndpointCore {
        EndpointCore {
            registry,
            queue: MessageQueue::new(),
            config,
            global_cancel: CancellationToken::new(),
            current: Mutex::new(None),
            last_activity: Mutex::new(Instant::now()),
            network_identifier: Mutex::new(None),
            disposed: AtomicBool::new(false),
            hooks: Arc::new(hooks),
            log,
        }
    }

    pub fn config(&self) -> EndpointConfig {
        self.config
    }

    pub fn registry(&self) -> &MessageRegistry {
        &self.registry
    }

    pub fn network_identifier(&self) -> Option<NetworkIdentifier> {
        *self.network_identifier.lock().unwrap()
    }

    /// Sets the network identifier exactly once (§3: "set once... thereafter read-only").
    /// A second call with a different value panics — that would indicate a broken handshake
    /// or a reattached identity mismatch, both programmer errors, not recoverable network
    /// conditions.
    pub(crate) fn set_network_identifier(&self, value: NetworkIdentifier) {
        let mut slot = self.network_identifier.lock().unwrap();
        match *slot {
            Some(existing) => assert_eq!(existing, value, "network identifier must not change across reconnects"),
            None => *slot = Some(value),
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// A fresh cancellation scope, child of the endpoint's global scope, for one connection
    /// attempt (and the session it produces).
    pub(crate) fn child_scope(&self) -> CancellationToken {
        self.global_cancel.child_token()
    }

    pub(crate) fn global_cancel(&self) -> CancellationToken {
        self.global_cancel.clone()
    }

    pub fn logger(&self) -> &Logger {
        &self.log
    }
}

/// Cheap, cloneable handle to an endpoint's shared state. This is the `Endpoint` context type
/// handed to user message handlers (§4.3: `(Endpoint, MessageVariant) -> void`).
#[derive(Clone)]
pub struct EndpointHandle {
    core: Arc<EndpointCore>,
}

impl EndpointHandle {
    pub(crate) fn new(core: Arc<EndpointCore>) -> EndpointHandle {
        EndpointHandle { core }
    }

    pub(crate) fn core(&self) -> &Arc<EndpointCore> {
        &self.core
    }

    pub fn network_identifier(&self) -> Option<NetworkIdentifier> {
        self.core.network_identifier()
    }

    pub fn logger(&self) -> &Logger {
        self.core.logger()
    }

    /// Enqueues `message`. Non-blocking; safe from multiple producers (§4.4). Returns `false`
    /// without queuing anything if the packed frame exceeds the 65535-byte maximum (§7).
    pub fn enqueue<M: crate::message::WireMessage>(&self, message: M) -> bool {
        match PackagedFrame::pack(&self.core.registry, &message) {
            Ok(frame) => self.core.queue.enqueue(frame),
            Err(_) => false,
        }
    }

    /// Closes the current socket, provoking a reconnect cycle. Used by tests and to simulate
    /// a network drop (§4.4).
    pub fn force_disconnection(&self) {
        if let Some(active) = self.core.current.lock().unwrap().take() {
            active.cancel.cancel();
        }
    }

    /// Cancels the endpoint's global scope and tears down the current socket. No further
    /// lifecycle events are emitted, and no task for this endpoint remains runnable, once this
    /// returns (§4.4, §8).
    pub fn dispose(&self) {
        self.core.disposed.store(true, Ordering::SeqCst);
        self.core.global_cancel.cancel();
        self.force_disconnection();
    }

    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }
}

/// Spawns a cancel-after task that cancels `token` once `duration` elapses — the idiomatic
/// tokio stand-in for the reference design's `CancellationTokenSource.CancelAfter`.
pub(crate) fn cancel_after(token: CancellationToken, duration: Duration) {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(duration) => token.cancel(),
        }
    });
}

/// The common `HandleEndConnection` hook (§4.4): runs the handshake, and on success installs
/// the new socket as current (cancelling and replacing whatever was there), then spawns the
/// send and receive loops bound to a fresh per-socket cancellation scope.
///
/// `attempt_cancel` bounds only the handshake itself — callers race it against
/// `ConnectionTimeout` (§4.5, §4.6, §5: "every connection attempt races against a
/// `ConnectionTimeout`"), so a handshake that stalls (e.g. a full send buffer with a peer that
/// never reads) fails instead of hanging the task forever. `scope` is the longer-lived,
/// untimed endpoint scope that `socket_cancel` is derived from once the handshake succeeds, so
/// an established session is never torn down just because the attempt that created it has since
/// aged past `ConnectionTimeout` — it is cancelled only by disposal or replacement.
///
/// Returns the new socket's cancellation token on success, so callers (the client's reconnect
/// loop, the authenticator's registration path) can await it to learn when the session ends.
pub(crate) async fn handle_end_connection<H: Handshake>(
    core: Arc<EndpointCore>,
    handshake: Arc<H>,
    mut stream: TcpStream,
    attempt_cancel: CancellationToken,
    scope: CancellationToken,
    dispatch: Arc<HandlerDispatch<EndpointHandle>>,
    handle: EndpointHandle,
) -> Option<CancellationToken> {
    if !handshake.perform(&mut stream, &core, &attempt_cancel).await {
        slog::warn!(core.log, "handshake failed"; "peer" => ?stream.peer_addr().ok());
        core.hooks.fire_failure();
        return None;
    }

    *core.last_activity.lock().unwrap() = Instant::now();
    slog::info!(core.log, "connection established"; "peer" => ?stream.peer_addr().ok());
    core.hooks.fire_success();

    let socket_cancel = scope.child_token();
    {
        let mut current = core.current.lock().unwrap();
        if let Some(previous) = current.take() {
            previous.cancel.cancel();
        }
        *current = Some(ActiveSocket { cancel: socket_cancel.clone() });
    }

    let (reader, writer) = stream.into_split();
    tokio::spawn(send_loop(core.clone(), writer, socket_cancel.clone()));
    tokio::spawn(receive_loop(core, reader, socket_cancel.clone(), dispatch, handle));

    Some(socket_cancel)
}

async fn send_loop(core: Arc<EndpointCore>, mut writer: OwnedWriteHalf, socket_cancel: CancellationToken) {
    loop {
        if socket_cancel.is_cancelled() {
            break;
        }

        let elapsed = core.last_activity.lock().unwrap().elapsed();
        let timeout = core.config.inactivity_check_interval.checked_sub(elapsed).unwrap_or(Duration::from_secs(0));

        let signalled = tokio::select! {
            _ = socket_cancel.cancelled() => break,
            signalled = core.queue.wait(timeout) => signalled,
        };

        if signalled {
            let frame = match core.queue.try_peek() {
                Some(frame) => frame,
                None => continue,
            };

            if frame::write_message(&mut writer, &frame, &socket_cancel).await {
                core.queue.try_dequeue();
                *core.last_activity.lock().unwrap() = Instant::now();
                core.hooks.fire_sent(frame.type_tag());
            } else if socket_cancel.is_cancelled() {
                break;
            } else {
                socket_cancel.cancel();
                break;
            }
        } else {
            let idle = core.last_activity.lock().unwrap().elapsed();
            if idle > core.config.inactivity_check_interval {
                let probe = PackagedFrame::pack(&core.registry, &InactivityCheckMessage)
                    .expect("the built-in InactivityCheckMessage always packs");

                if frame::write_message(&mut writer, &probe, &socket_cancel).await {
                    *core.last_activity.lock().unwrap() = Instant::now();
                } else if socket_cancel.is_cancelled() {
                    break;
                } else {
                    socket_cancel.cancel();
                    break;
                }
            }
        }
    }

    slog::info!(core.log, "connection ended");
    core.hooks.fire_disconnection();
}

async fn receive_loop(
    core: Arc<EndpointCore>,
    mut reader: OwnedReadHalf,
    socket_cancel: CancellationToken,
    dispatch: Arc<HandlerDispatch<EndpointHandle>>,
    handle: EndpointHandle,
) {
    loop {
        if socket_cancel.is_cancelled() {
            break;
        }

        let outcome = frame::read_message(&mut reader, &core.registry, &socket_cancel).await;
        if let Some(envelope) = &outcome.envelope {
            slog::debug!(core.log, "message received"; "tag" => envelope.tag);
        }
        core.hooks.fire_received(outcome.envelope.as_ref().map(|e| e.tag));
        dispatch.handle(&handle, outcome.envelope);

        if outcome.closed {
            socket_cancel.cancel();
            break;
        }
    }
}
