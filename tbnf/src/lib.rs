//! TBNF: a small, LAN-oriented networking framework for client/host applications such as
//! local multiplayer games.
//!
//! A process registers its message variants once via [`registry::MessageRegistry::build`],
//! builds a [`dispatch::HandlerDispatch`] to route them, and then runs either a
//! [`net::client::ClientEndpoint`] (dials out, reconnects automatically) or an
//! [`net::authenticator::EndpointAuthenticator`] fronting one [`net::remote::RemoteEndpoint`]
//! per connected client.

#![allow(clippy::new_without_default)]

pub mod codec;
pub mod config;
pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod identity;
pub mod message;
pub mod net;
pub mod registry;

pub mod prelude;

/// Re-exported so a binary built against this crate doesn't need a direct `tbnf-support`
/// dependency just to hand `ClientEndpoint`/`EndpointAuthenticator` a logger.
pub use tbnf_support::logging::{default_logger, load_or_default as load_logger_or_default};
