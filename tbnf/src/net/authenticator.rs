//! Endpoint Authenticator: the host's TCP listener. Identifies each incoming client by
//! hardware address, assigns a `NetworkIdentifier` on first contact, and reattaches
//! reconnecting clients to their existing [`RemoteEndpoint`] (§4.7).

use crate::config::{EndpointConfig, IDENTIFICATION_TIMEOUT};
use crate::dispatch::HandlerDispatch;
use crate::identity::{ClientAddress, NetworkIdentifier};
use crate::message::IdentificationMessage;
use crate::net::endpoint::{EndpointHandle, LifecycleHooks};
use crate::net::frame;
use crate::net::remote::RemoteEndpoint;
use crate::registry::MessageRegistry;
use slog::Logger;
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

type HooksFactory = dyn Fn(ClientAddress) -> LifecycleHooks + Send + Sync;
type NewClientHook = dyn Fn(ClientAddress, EndpointHandle) + Send + Sync;

/// Accepts client connections, identifies them, and owns the table of
/// hardware-address-keyed [`RemoteEndpoint`]s (§4.7).
pub struct EndpointAuthenticator {
    registry: Arc<MessageRegistry>,
    config: EndpointConfig,
    dispatch: Arc<HandlerDispatch<EndpointHandle>>,
    hooks_factory: Arc<HooksFactory>,
    on_new_client: Arc<NewClientHook>,
    clients: Mutex<HashMap<[u8; 6], Arc<RemoteEndpoint>>>,
    next_identifier: AtomicU8,
    cancel: CancellationToken,
    log: Logger,
}

impl EndpointAuthenticator {
    pub fn new(
        registry: Arc<MessageRegistry>,
        config: EndpointConfig,
        dispatch: HandlerDispatch<EndpointHandle>,
        hooks_factory: impl Fn(ClientAddress) -> LifecycleHooks + Send + Sync + 'static,
        on_new_client: impl Fn(ClientAddress, EndpointHandle) + Send + Sync + 'static,
        log: Logger,
    ) -> Arc<EndpointAuthenticator> {
        Arc::new(EndpointAuthenticator {
            registry,
            config,
            dispatch: Arc::new(dispatch),
            hooks_factory: Arc::new(hooks_factory),
            on_new_client: Arc::new(on_new_client),
            clients: Mutex::new(HashMap::new()),
            next_identifier: AtomicU8::new(0),
            cancel: CancellationToken::new(),
            log,
        })
    }

    /// Stops the accept loop and disposes every `RemoteEndpoint` it has spawned (§4.7).
    pub fn stop(&self) {
        self.cancel.cancel();
        for remote in self.clients.lock().unwrap().values() {
            remote.handle().dispose();
        }
    }

    /// Binds `addr` and accepts connections until [`Self::stop`] is called. One task is
    /// spawned per accepted connection so a slow or hostile client cannot block others from
    /// identifying (§4.7, §5).
    pub async fn listen(self: Arc<Self>, addr: SocketAddr) -> io::Result<()> {
        let listener = TcpListener::bind(addr).await?;

        loop {
            let accept = tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                result = listener.accept() => result,
            };

            let (stream, _peer) = match accept {
                Ok(pair) => pair,
                Err(_) => continue,
            };

            let this = self.clone();
            tokio::spawn(async move {
                this.identify_and_register(stream).await;
            });
        }
    }

    /// Reads the client's `IdentificationMessage` within [`IDENTIFICATION_TIMEOUT`], then
    /// either registers a brand-new `RemoteEndpoint` or reattaches the stream to an existing
    /// one for the same hardware address (§4.7).
    async fn identify_and_register(&self, mut stream: TcpStream) {
        let read = tokio::time::timeout(IDENTIFICATION_TIMEOUT, frame::read_message(&mut stream, &self.registry, &self.cancel)).await;

        let hardware_address = match read {
            Ok(outcome) => match outcome.envelope.and_then(|e| e.payload.downcast::<IdentificationMessage>().ok()) {
                Some(identification) => identification.hardware_address,
                None => return,
            },
            Err(_) => return, // timed out waiting for identification
        };

        let address = ClientAddress::new(hardware_address, 0);

        let remote = {
            let mut clients = self.clients.lock().unwrap();
            if let Some(existing) = clients.get(&hardware_address) {
                slog::info!(self.log, "client reconnected"; "address" => %address);
                existing.clone()
            } else {
                let identifier: NetworkIdentifier = self.next_identifier.fetch_add(1, Ordering::SeqCst);
                slog::info!(self.log, "client registered"; "address" => %address, "identifier" => identifier);
                let hooks = (self.hooks_factory)(address);
                let client_log = self.log.new(slog::o!("client" => address.to_string()));
                let remote = Arc::new(RemoteEndpoint::new(self.registry.clone(), self.config, hooks, self.dispatch.clone(), client_log));
                remote.handle().core().set_network_identifier(identifier);
                clients.insert(hardware_address, remote.clone());
                (self.on_new_client)(address, remote.handle());
                remote
            }
        };

        remote.attach(stream).await;
    }
}
