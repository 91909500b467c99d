pub use crate::{default_logger, load_logger_or_default};
pub use crate::config::EndpointConfig;
pub use crate::discovery::{discover, DiscoverableEndpointDescriptor, DiscoveryAnswerer};
pub use crate::dispatch::{HandlerDispatch, HandlerDispatchBuilder};
pub use crate::identity::{local_hardware_address, ClientAddress, NetworkIdentifier};
pub use crate::message::{IdentificationMessage, InactivityCheckMessage, LoginConfirmationMessage, PermittedAuthor, WireMessage};
pub use crate::net::authenticator::EndpointAuthenticator;
pub use crate::net::client::ClientEndpoint;
pub use crate::net::remote::RemoteEndpoint;
pub use crate::net::{EndpointHandle, Handshake, LifecycleHooks};
pub use crate::registry::{MessageDescriptor, MessageRegistry, PackagedFrame, TypeTag};
