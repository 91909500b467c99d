//! Client Endpoint: connects outward to a host, identifies itself by hardware address, and
//! reconnects automatically on disconnection (§4.5).

use crate::config::EndpointConfig;
use crate::dispatch::HandlerDispatch;
use crate::identity::ClientAddress;
use crate::message::{IdentificationMessage, LoginConfirmationMessage};
use crate::net::endpoint::{cancel_after, handle_end_connection, EndpointCore, EndpointHandle, Handshake, LifecycleHooks};
use crate::net::frame;
use crate::registry::MessageRegistry;
use async_trait::async_trait;
use slog::Logger;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

/// Sends this client's [`ClientAddress`] and awaits the host's `LoginConfirmationMessage`
/// (§4.5). On success the assigned `NetworkIdentifier` is recorded on the endpoint core.
struct ClientHandshake {
    address: ClientAddress,
}

#[async_trait]
impl Handshake for ClientHandshake {
    async fn perform(&self, stream: &mut TcpStream, core: &EndpointCore, cancel: &CancellationToken) -> bool {
        let identify = crate::registry::PackagedFrame::pack(
            core.registry(),
            &IdentificationMessage { hardware_address: self.address.hardware_address },
        );
        let frame = match identify {
            Ok(frame) => frame,
            Err(_) => return false,
        };

        if !frame::write_message(stream, &frame, cancel).await {
            return false;
        }

        let read = frame::read_message(stream, core.registry(), cancel).await;
        if read.closed {
            return false;
        }

        match read.envelope.and_then(|envelope| envelope.payload.downcast::<LoginConfirmationMessage>().ok()) {
            Some(confirmation) => {
                core.set_network_identifier(confirmation.network_identifier);
                true
            }
            None => false,
        }
    }
}

/// Outward-connecting, self-reconnecting endpoint identified by hardware address (§4.5).
pub struct ClientEndpoint {
    core: Arc<EndpointCore>,
    dispatch: Arc<HandlerDispatch<EndpointHandle>>,
    handshake: Arc<ClientHandshake>,
    host: SocketAddr,
}

impl ClientEndpoint {
    pub fn new(
        registry: Arc<MessageRegistry>,
        config: EndpointConfig,
        hooks: LifecycleHooks,
        dispatch: HandlerDispatch<EndpointHandle>,
        host: SocketAddr,
        address: ClientAddress,
        log: Logger,
    ) -> ClientEndpoint {
        ClientEndpoint {
            core: Arc::new(EndpointCore::new(registry, config, hooks, log)),
            dispatch: Arc::new(dispatch),
            handshake: Arc::new(ClientHandshake { address }),
            host,
        }
    }

    /// Starts the reconnect-driving background task and returns a handle for enqueuing
    /// messages and observing the endpoint's lifecycle. The returned handle's `dispose()`
    /// stops the reconnect loop (§4.4, §4.5).
    pub fn start(self) -> EndpointHandle {
        let handle = EndpointHandle::new(self.core.clone());
        let core = self.core;
        let dispatch = self.dispatch;
        let handshake = self.handshake;
        let host = self.host;
        let driver_handle = handle.clone();

        tokio::spawn(async move {
            const RECONNECT_BACKOFF: Duration = Duration::from_secs(2);

            while !core.is_disposed() {
                let scope = core.child_scope();
                let session = connect_once(core.clone(), handshake.clone(), host, scope.clone(), dispatch.clone(), driver_handle.clone()).await;

                match session {
                    Some(socket_cancel) => socket_cancel.cancelled().await,
                    None => {}
                }

                if core.is_disposed() {
                    break;
                }

                tokio::select! {
                    _ = core.global_cancel().cancelled() => break,
                    _ = tokio::time::sleep(RECONNECT_BACKOFF) => {}
                }
            }
        });

        handle
    }
}

async fn connect_once(
    core: Arc<EndpointCore>,
    handshake: Arc<ClientHandshake>,
    host: SocketAddr,
    scope: CancellationToken,
    dispatch: Arc<HandlerDispatch<EndpointHandle>>,
    handle: EndpointHandle,
) -> Option<CancellationToken> {
    let attempt_cancel = scope.child_token();
    cancel_after(attempt_cancel.clone(), core.config().connection_timeout);

    let connect = async {
        tokio::select! {
            _ = attempt_cancel.cancelled() => None,
            result = TcpStream::connect(host) => result.ok(),
        }
    };

    let stream = match connect.await {
        Some(stream) => stream,
        None => return None,
    };

    // `attempt_cancel` keeps bounding the subsequent handshake too, by `ConnectionTimeout` —
    // the dial and the handshake together are "a single connection attempt" per §4.5/§5.
    handle_end_connection(core, handshake, stream, attempt_cancel, scope, dispatch, handle).await
}
