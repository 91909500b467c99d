//! Remote Endpoint: the host-side representative of one connected client (§4.6).
//!
//! Unlike [`crate::net::client::ClientEndpoint`], a `RemoteEndpoint` never dials out — the
//! [`crate::net::authenticator::EndpointAuthenticator`] owns the listening socket, performs the
//! identification handshake, and hands each accepted (and reattached) stream to `attach`.

use crate::config::EndpointConfig;
use crate::dispatch::HandlerDispatch;
use crate::message::LoginConfirmationMessage;
use crate::net::endpoint::{cancel_after, handle_end_connection, EndpointCore, EndpointHandle, Handshake, LifecycleHooks};
use crate::net::frame;
use crate::registry::MessageRegistry;
use async_trait::async_trait;
use slog::Logger;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

/// Sends the already-assigned `NetworkIdentifier` back to the client. Identification itself
/// happens earlier, in the authenticator's accept loop, before a stream ever reaches here.
struct RemoteHandshake;

#[async_trait]
impl Handshake for RemoteHandshake {
    async fn perform(&self, stream: &mut TcpStream, core: &EndpointCore, cancel: &CancellationToken) -> bool {
        let identifier = match core.network_identifier() {
            Some(identifier) => identifier,
            None => return false,
        };

        let frame = match crate::registry::PackagedFrame::pack(
            core.registry(),
            &LoginConfirmationMessage { network_identifier: identifier },
        ) {
            Ok(frame) => frame,
            Err(_) => return false,
        };

        frame::write_message(stream, &frame, cancel).await
    }
}

/// Host-side peer for one logical client, reattached across reconnects by hardware address
/// (§4.6). Holds the same `EndpointCore`/`EndpointHandle` machinery a `ClientEndpoint` does,
/// minus the outbound dialing.
pub struct RemoteEndpoint {
    core: Arc<EndpointCore>,
    dispatch: Arc<HandlerDispatch<EndpointHandle>>,
    handshake: Arc<RemoteHandshake>,
}

impl RemoteEndpoint {
    pub fn new(
        registry: Arc<MessageRegistry>,
        config: EndpointConfig,
        hooks: LifecycleHooks,
        dispatch: Arc<HandlerDispatch<EndpointHandle>>,
        log: Logger,
    ) -> RemoteEndpoint {
        RemoteEndpoint {
            core: Arc::new(EndpointCore::new(registry, config, hooks, log)),
            dispatch,
            handshake: Arc::new(RemoteHandshake),
        }
    }

    pub fn handle(&self) -> EndpointHandle {
        EndpointHandle::new(self.core.clone())
    }

    /// Installs `stream` as this endpoint's current socket, running the confirmation
    /// handshake and spawning its send/receive loop pair. Called by the authenticator both
    /// for a brand-new client and for a reconnecting one (§4.6, §4.7).
    ///
    /// The handshake is raced against `ConnectionTimeout` via `attempt_cancel`, mirroring
    /// `ClientEndpoint::connect_once` (§4.6: "Immediately invokes `HandleEndConnection` under a
    /// scoped-linked `CancelAfter(ConnectionTimeout)`") — a stalled peer (full send buffer, no
    /// reader) fails the attempt instead of hanging it forever. `scope` itself is left
    /// untimed so the resulting session isn't torn down once the attempt that created it ages
    /// past `ConnectionTimeout`.
    pub(crate) async fn attach(&self, stream: TcpStream) -> Option<CancellationToken> {
        let scope = self.core.child_scope();
        let attempt_cancel = scope.child_token();
        cancel_after(attempt_cancel.clone(), self.core.config().connection_timeout);

        let handle = self.handle();
        handle_end_connection(self.core.clone(), self.handshake.clone(), stream, attempt_cancel, scope, self.dispatch.clone(), handle).await
    }
}
